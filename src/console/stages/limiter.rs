use crate::console::stages::{Frame, Stage};

/// Full scale in normalized units.
pub const CEILING: f32 = 1.0;

/// Brick-wall safety clamp at 0 dBFS.
///
/// Instantaneous, no look-ahead: anything over the ceiling is flattened, which
/// clips hard on purpose. It keeps levels safe rather than sounding transparent.
pub struct HardLimiterStage {
    enabled: bool,
}

impl HardLimiterStage {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Stage for HardLimiterStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        if self.enabled {
            frame.map(|s| s.clamp(-CEILING, CEILING))
        } else {
            frame
        }
    }
}
