use crate::console::stages::common::db_to_lin;
use crate::console::stages::{Frame, Stage};

/// Stateless linear gain, used for both the drive and the output trim.
pub struct LevelStage {
    gain: f32,
}

impl LevelStage {
    pub fn new(gain_db: f32) -> Self {
        Self {
            gain: db_to_lin(gain_db),
        }
    }

    #[inline]
    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain = db_to_lin(gain_db);
    }

    pub const fn gain(&self) -> f32 {
        self.gain
    }
}

impl Stage for LevelStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        frame.map(|s| s * self.gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_stage() {
        let mut stage = LevelStage::new(0.0);
        assert_eq!(stage.process(Frame::new(1.0, -1.0)), Frame::new(1.0, -1.0));

        stage.set_gain_db(20.0);
        assert_eq!(stage.gain(), 10.0f32.powf(1.0));
        let out = stage.process(Frame::new(0.5, 0.25));
        assert!((out.left - 5.0).abs() < 1e-5);
        assert!((out.right - 2.5).abs() < 1e-5);
    }

    #[test]
    fn gain_matches_decibel_formula_exactly() {
        for &db in &[-24.0f32, -6.0, -0.5, 0.0, 3.0, 12.5, 36.0] {
            let mut stage = LevelStage::new(db);
            for &x in &[-1.0f32, -0.3, 0.0, 1e-6, 0.7, 123.0] {
                let out = stage.process(Frame::new(x, -x));
                assert_eq!(out.left, x * 10f32.powf(db / 20.0));
                assert_eq!(out.right, -x * 10f32.powf(db / 20.0));
            }
        }
    }
}
