use crate::console::stages::common::{EnvelopeFollower, LinearSmoother, db_to_lin, lin_to_db};
use crate::console::stages::{Frame, Stage};

pub const ATTACK_MS: f32 = 15.0;
pub const RELEASE_MS: f32 = 200.0;
/// Fade time when the compressor is switched in or out.
pub const ENGAGE_MS: f32 = 20.0;

pub const MIN_THRESHOLD_DB: f32 = -60.0;
pub const MAX_THRESHOLD_DB: f32 = 0.0;
pub const MIN_RATIO: f32 = 1.0;
pub const MAX_RATIO: f32 = 20.0;

/// Stereo-linked automatic level stabilizer.
///
/// A single envelope follows the louder channel, so both channels always get
/// the same gain and the stereo image does not shift. Gain reduction is
/// computed in the log domain:
///
/// `reduction_db = max(0, env_db - threshold_db) * (1 - 1 / ratio)`
///
/// Switching in or out fades the reduction over [`ENGAGE_MS`] instead of
/// jumping between the compressed gain and unity.
pub struct CompressorStage {
    enabled: bool,
    threshold_db: f32,
    ratio: f32,
    envelope: EnvelopeFollower,
    engage: LinearSmoother,
    gain: f32,
}

impl CompressorStage {
    pub fn new(threshold_db: f32, ratio: f32, sample_rate: f32) -> Self {
        Self {
            enabled: true,
            threshold_db: threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB),
            ratio: ratio.clamp(MIN_RATIO, MAX_RATIO),
            envelope: EnvelopeFollower::from_ms(ATTACK_MS, RELEASE_MS, sample_rate),
            engage: Self::engage_smoother(1.0, sample_rate),
            gain: 1.0,
        }
    }

    fn engage_smoother(value: f32, sample_rate: f32) -> LinearSmoother {
        let mut engage = LinearSmoother::new(value);
        engage.set_ramp_ms(ENGAGE_MS, sample_rate);
        engage
    }

    /// Turning the compressor on after it has fully faded out starts from an
    /// empty detector.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled && self.engage.current() <= 0.0 {
            self.envelope.reset();
        }
        self.enabled = enabled;
        self.engage.set_target(if enabled { 1.0 } else { 0.0 });
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(MIN_RATIO, MAX_RATIO);
    }

    /// Linear gain applied to the most recent frame.
    pub const fn gain(&self) -> f32 {
        self.gain
    }

    /// Gain reduction applied to the most recent frame, as a positive dB value.
    pub fn gain_reduction_db(&self) -> f32 {
        if self.gain >= 1.0 {
            0.0
        } else {
            -lin_to_db(self.gain)
        }
    }

    pub const fn envelope(&self) -> f32 {
        self.envelope.value()
    }

    #[inline]
    fn compute_gain(&self, envelope: f32, engage: f32) -> f32 {
        let over_db = lin_to_db(envelope) - self.threshold_db;
        if over_db <= 0.0 {
            return 1.0;
        }
        let reduction_db = over_db * (1.0 - self.ratio.recip()) * engage;
        db_to_lin(-reduction_db)
    }
}

impl Stage for CompressorStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        if !self.enabled && self.engage.is_settled() {
            self.gain = 1.0;
            return frame;
        }

        let engage = self.engage.next();
        let envelope = self.envelope.process(frame.peak());
        self.gain = self.compute_gain(envelope, engage);
        frame.map(|s| s * self.gain)
    }

    /// Clears the detector and finishes any fade in progress.
    fn reset(&mut self) {
        self.envelope.reset();
        self.engage.snap();
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn ms_to_samples(ms: f32) -> usize {
        (ms * 0.001 * SAMPLE_RATE) as usize
    }

    #[test]
    fn below_threshold_is_untouched() {
        let mut comp = CompressorStage::new(-18.0, 4.0, SAMPLE_RATE);
        let level = db_to_lin(-30.0);
        for _ in 0..ms_to_samples(500.0) {
            let out = comp.process(Frame::new(level, -level));
            assert_eq!(out, Frame::new(level, -level));
        }
        assert_eq!(comp.gain_reduction_db(), 0.0);
        assert!(comp.gain_reduction_db().is_sign_positive());
    }

    #[test]
    fn step_settles_on_slope_reduction_without_jumps() {
        let mut comp = CompressorStage::new(-18.0, 4.0, SAMPLE_RATE);
        let quiet = db_to_lin(-40.0);
        let loud = db_to_lin(-6.0);

        for _ in 0..ms_to_samples(500.0) {
            comp.process(Frame::new(quiet, quiet));
        }
        assert_abs_diff_eq!(comp.gain(), 1.0);

        // (-6 - -18) * (1 - 1/4) = 9 dB
        let target_db = 9.0;
        let mut prev_gain = comp.gain();
        let mut max_step = 0.0f32;
        let mut prev_reduction = 0.0f32;

        for _ in 0..ms_to_samples(RELEASE_MS) {
            comp.process(Frame::new(loud, loud));
            max_step = max_step.max((comp.gain() - prev_gain).abs());
            prev_gain = comp.gain();

            let reduction = comp.gain_reduction_db();
            assert!(reduction >= prev_reduction - 1e-4, "reduction went backwards");
            assert!(reduction <= target_db + 1e-3, "overshoot: {reduction}");
            prev_reduction = reduction;
        }

        assert_abs_diff_eq!(comp.gain_reduction_db(), target_db, epsilon = 0.05);
        assert!(max_step < 0.01, "gain jumped by {max_step} in one sample");
    }

    #[test]
    fn releases_back_to_unity() {
        let mut comp = CompressorStage::new(-18.0, 4.0, SAMPLE_RATE);
        let loud = db_to_lin(-3.0);
        for _ in 0..ms_to_samples(200.0) {
            comp.process(Frame::new(loud, loud));
        }
        assert!(comp.gain_reduction_db() > 5.0);

        for _ in 0..ms_to_samples(2_000.0) {
            comp.process(Frame::default());
        }
        assert_abs_diff_eq!(comp.gain(), 1.0);
    }

    #[test]
    fn channels_share_one_gain() {
        let mut comp = CompressorStage::new(-24.0, 8.0, SAMPLE_RATE);
        let mut out = Frame::default();
        for _ in 0..ms_to_samples(100.0) {
            out = comp.process(Frame::new(0.9, 0.1));
        }
        assert_abs_diff_eq!(out.left / 0.9, out.right / 0.1, epsilon = 1e-6);
        assert!(out.left < 0.9);
    }

    #[test]
    fn gain_stays_positive_and_finite_for_huge_input() {
        let mut comp = CompressorStage::new(MIN_THRESHOLD_DB, MAX_RATIO, SAMPLE_RATE);
        for _ in 0..ms_to_samples(100.0) {
            let out = comp.process(Frame::new(1.0e4, -1.0e4));
            assert!(out.is_finite());
            assert!(comp.gain() > 0.0 && comp.gain() <= 1.0);
        }
    }

    #[test]
    fn disabled_is_passthrough_and_enable_starts_fresh() {
        let mut comp = CompressorStage::new(-40.0, 10.0, SAMPLE_RATE);
        for _ in 0..ms_to_samples(100.0) {
            comp.process(Frame::new(1.0, 1.0));
        }
        comp.set_enabled(false);
        assert!(!comp.is_enabled());
        for _ in 0..ms_to_samples(ENGAGE_MS + 1.0) {
            comp.process(Frame::new(1.0, 1.0));
        }
        assert_eq!(comp.process(Frame::new(0.7, 0.2)), Frame::new(0.7, 0.2));
        assert_eq!(comp.gain_reduction_db(), 0.0);

        comp.set_enabled(true);
        assert!(comp.is_enabled());
        assert_eq!(comp.envelope(), 0.0);
    }

    #[test]
    fn switching_out_fades_the_reduction() {
        let mut comp = CompressorStage::new(-40.0, 20.0, SAMPLE_RATE);
        for _ in 0..ms_to_samples(300.0) {
            comp.process(Frame::new(0.5, 0.5));
        }
        let mut prev_db = comp.gain_reduction_db();
        assert!(prev_db > 30.0);

        comp.set_enabled(false);
        for _ in 0..ms_to_samples(ENGAGE_MS + 1.0) {
            comp.process(Frame::new(0.5, 0.5));
            let reduction = comp.gain_reduction_db();
            assert!(
                (prev_db - reduction).abs() < 0.1,
                "gain stepped from {prev_db} dB to {reduction} dB"
            );
            prev_db = reduction;
        }
        assert_eq!(comp.gain(), 1.0);
    }

    #[test]
    fn parameters_are_clamped() {
        let mut comp = CompressorStage::new(-100.0, 0.5, SAMPLE_RATE);
        comp.set_ratio(-3.0);
        comp.set_threshold_db(12.0);
        for _ in 0..ms_to_samples(100.0) {
            let out = comp.process(Frame::new(2.0, 2.0));
            // Ratio floors at 1:1, so nothing is reduced.
            assert_eq!(out, Frame::new(2.0, 2.0));
        }
    }
}
