use crate::console::stages::{Frame, Stage};

/// Simultaneous cross-feed: each channel picks up `amount` of the other
/// channel's value from the same instant.
pub struct CrosstalkStage {
    amount: f32,
}

impl CrosstalkStage {
    pub fn new(amount: f32) -> Self {
        Self {
            amount: amount.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 1.0);
    }
}

impl Stage for CrosstalkStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        // Both reads happen before either write.
        let Frame { left, right } = frame;
        Frame::new(
            self.amount.mul_add(right, left),
            self.amount.mul_add(left, right),
        )
    }
}
