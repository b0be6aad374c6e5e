use crate::console::stages::{Frame, Stage};

/// The slew amount is defined per sample at this rate and rescaled for others.
const REFERENCE_SAMPLE_RATE: f32 = 44_100.0;

pub const MIN_SLEW_AMOUNT: f32 = 1.0e-5;
/// Amount at which the limiter switches off.
pub const SLEW_DISABLED: f32 = 1.0;

/// Caps the per-sample change of each channel.
///
/// `y[n] = clamp(x[n], y[n-1] - max_delta, y[n-1] + max_delta)` with
/// `max_delta = amount * 44100 / sample_rate`.
pub struct SlewLimiterStage {
    amount: f32,
    max_delta: f32,
    sample_rate: f32,
    prev: [f32; 2],
}

impl SlewLimiterStage {
    pub fn new(amount: f32, sample_rate: f32) -> Self {
        let mut stage = Self {
            amount: SLEW_DISABLED,
            max_delta: 0.0,
            sample_rate,
            prev: [0.0; 2],
        };
        stage.set_amount(amount);
        stage
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(MIN_SLEW_AMOUNT, SLEW_DISABLED);
        self.max_delta = self.amount * REFERENCE_SAMPLE_RATE / self.sample_rate;
    }

    pub fn is_active(&self) -> bool {
        self.amount < SLEW_DISABLED
    }

    pub const fn max_delta(&self) -> f32 {
        self.max_delta
    }

    #[inline]
    fn limit(prev: &mut f32, input: f32, max_delta: f32) -> f32 {
        let output = input.clamp(*prev - max_delta, *prev + max_delta);
        *prev = output;
        output
    }
}

impl Stage for SlewLimiterStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        if !self.is_active() {
            // Keep history current so re-enabling does not ramp from stale values.
            self.prev = [frame.left, frame.right];
            return frame;
        }

        let [left, right] = &mut self.prev;
        Frame::new(
            Self::limit(left, frame.left, self.max_delta),
            Self::limit(right, frame.right, self.max_delta),
        )
    }

    fn reset(&mut self) {
        self.prev = [0.0; 2];
    }
}
