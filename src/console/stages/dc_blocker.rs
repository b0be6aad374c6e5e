use std::f32::consts::PI;

use crate::console::stages::common::flush_denormal;
use crate::console::stages::{Frame, Stage};

/// Corner of the DC blocker. Low enough to leave bass untouched.
pub const DC_CUTOFF_HZ: f32 = 5.0;

/// DC blocker using a first-order high-pass filter.
///
/// `y[n] = x[n] - x[n-1] + R * y[n-1]`
///
/// Reference: <https://ccrma.stanford.edu/~jos/fp/DC_Blocker.html>
#[derive(Clone, Debug)]
pub struct DcBlocker {
    x_prev: f32,
    y_prev: f32,
    coeff: f32,
}

impl DcBlocker {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        Self {
            x_prev: 0.0,
            y_prev: 0.0,
            coeff: Self::pole(cutoff_hz, sample_rate),
        }
    }

    /// `R = exp(-2π fc / fs)`, always strictly inside (0, 1).
    pub fn pole(cutoff_hz: f32, sample_rate: f32) -> f32 {
        (-2.0 * PI * cutoff_hz / sample_rate).exp().clamp(0.0, 0.999_999)
    }

    pub const fn coeff(&self) -> f32 {
        self.coeff
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = flush_denormal(self.coeff.mul_add(self.y_prev, input - self.x_prev));
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    pub const fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }
}

pub struct DcBlockerStage {
    channels: [DcBlocker; 2],
}

impl DcBlockerStage {
    pub fn new(sample_rate: f32) -> Self {
        let blocker = DcBlocker::new(DC_CUTOFF_HZ, sample_rate);
        Self {
            channels: [blocker.clone(), blocker],
        }
    }
}

impl Stage for DcBlockerStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        let [left, right] = &mut self.channels;
        Frame::new(left.process(frame.left), right.process(frame.right))
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}
