pub mod common;
pub mod compressor;
pub mod crosstalk;
pub mod dc_blocker;
pub mod level;
pub mod limiter;
pub mod phase_linearizer;
pub mod saturator;
pub mod slew;

/// One stereo sample pair in normalized amplitude units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Apply the same mono function to both channels.
    #[inline]
    pub fn map(self, mut f: impl FnMut(f32) -> f32) -> Self {
        Self {
            left: f(self.left),
            right: f(self.right),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }

    /// Larger of the two channel magnitudes.
    #[inline]
    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }
}

// The core trait that all processing stages implement.
//
// Stages own their per-channel filter state; the chain sets any per-sample
// parameters on a stage before calling `process`.
pub trait Stage: Send + 'static {
    // Process one stereo frame through this stage
    fn process(&mut self, frame: Frame) -> Frame;

    // Zero all filter state, keeping coefficients
    fn reset(&mut self) {}

    // Process a block of frames through this stage
    fn process_block(&mut self, frames: &mut [Frame]) {
        for frame in frames.iter_mut() {
            *frame = self.process(*frame);
        }
    }
}
