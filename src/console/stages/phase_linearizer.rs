use std::f64::consts::PI;

use crate::console::stages::common::flush_denormal;
use crate::console::stages::{Frame, Stage};

pub const DEFAULT_LINEARIZER_HZ: f32 = 150.0;
pub const MIN_LINEARIZER_HZ: f32 = 20.0;
pub const MAX_LINEARIZER_HZ: f32 = 800.0;

/// First-order all-pass sections in the cascade.
const SECTIONS: usize = 2;

/// Keeps the corner clear of Nyquist whatever the sample rate.
const MAX_CORNER_RATIO: f32 = 0.45;

/// Low-frequency phase compensation built from cascaded first-order all-pass
/// sections sharing one corner frequency.
///
/// Each section is `H(z) = (a + z^-1) / (1 + a z^-1)` with
/// `a = (tan(π fc / fs) - 1) / (tan(π fc / fs) + 1)`, so the magnitude is
/// exactly one at every frequency and only the phase turns, by 90° per
/// section at the corner.
pub struct PhaseLinearizerStage {
    coeff: f32,
    frequency: f32,
    sample_rate: f32,
    state: [[f32; SECTIONS]; 2],
}

impl PhaseLinearizerStage {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        let mut stage = Self {
            coeff: 0.0,
            frequency: 0.0,
            sample_rate,
            state: [[0.0; SECTIONS]; 2],
        };
        stage.set_frequency(frequency);
        stage
    }

    /// Re-derive the section coefficient for a new corner. Filter state is kept
    /// so a change between buffers does not click.
    pub fn set_frequency(&mut self, frequency: f32) {
        let ceiling = MAX_LINEARIZER_HZ
            .min(self.sample_rate * MAX_CORNER_RATIO)
            .max(MIN_LINEARIZER_HZ);
        self.frequency = frequency.clamp(MIN_LINEARIZER_HZ, ceiling);
        self.coeff = Self::calculate_coefficient(self.frequency, self.sample_rate);
    }

    fn calculate_coefficient(frequency: f32, sample_rate: f32) -> f32 {
        let t = (PI * f64::from(frequency) / f64::from(sample_rate)).tan();
        ((t - 1.0) / (t + 1.0)) as f32
    }

    pub const fn frequency(&self) -> f32 {
        self.frequency
    }

    pub const fn coeff(&self) -> f32 {
        self.coeff
    }

    /// Magnitude and phase (radians) of the whole cascade at `freq_hz`.
    pub fn response(&self, freq_hz: f32) -> (f64, f64) {
        let w = 2.0 * PI * f64::from(freq_hz) / f64::from(self.sample_rate);
        let a = f64::from(self.coeff);
        let (sin_w, cos_w) = w.sin_cos();

        // Numerator a + e^{-jw}, denominator 1 + a e^{-jw}.
        let (num_re, num_im) = (a + cos_w, -sin_w);
        let (den_re, den_im) = (a.mul_add(cos_w, 1.0), -a * sin_w);

        let magnitude = num_re.hypot(num_im) / den_re.hypot(den_im);
        let phase = num_im.atan2(num_re) - den_im.atan2(den_re);

        (magnitude.powi(SECTIONS as i32), phase * SECTIONS as f64)
    }

    #[inline]
    fn run(coeff: f32, registers: &mut [f32; SECTIONS], input: f32) -> f32 {
        let mut signal = input;
        for z1 in registers.iter_mut() {
            // y[n] = a*x[n] + x[n-1] - a*y[n-1]
            let output = coeff.mul_add(signal, *z1);
            *z1 = flush_denormal((-coeff).mul_add(output, signal));
            signal = output;
        }
        signal
    }
}

impl Stage for PhaseLinearizerStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        let [left, right] = &mut self.state;
        Frame::new(
            Self::run(self.coeff, left, frame.left),
            Self::run(self.coeff, right, frame.right),
        )
    }

    fn reset(&mut self) {
        self.state = [[0.0; SECTIONS]; 2];
    }
}
