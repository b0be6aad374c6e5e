use crate::console::stages::common::LinearSmoother;
use crate::console::stages::compressor::CompressorStage;
use crate::console::stages::crosstalk::CrosstalkStage;
use crate::console::stages::dc_blocker::DcBlockerStage;
use crate::console::stages::level::LevelStage;
use crate::console::stages::limiter::HardLimiterStage;
use crate::console::stages::phase_linearizer::PhaseLinearizerStage;
use crate::console::stages::saturator::SaturatorStage;
use crate::console::stages::slew::SlewLimiterStage;
use crate::console::stages::{Frame, Stage};
use crate::params::ConsoleParams;

/// Ramp time for continuously variable parameters.
pub const SMOOTHING_MS: f32 = 20.0;

/// Host input is bounded to ±this (+80 dBFS) before it enters the chain.
pub const INPUT_LIMIT: f32 = 1.0e4;

#[inline]
fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-INPUT_LIMIT, INPUT_LIMIT)
    } else {
        0.0
    }
}

/// The frame the chain actually sees for a given host frame: non-finite
/// samples become silence and the rest is bounded to ±[`INPUT_LIMIT`].
#[inline]
pub fn sanitize_input(frame: Frame) -> Frame {
    frame.map(sanitize)
}

struct Smoothers {
    drive_db: LinearSmoother,
    crosstalk: LinearSmoother,
    threshold_db: LinearSmoother,
    ratio: LinearSmoother,
    mix: LinearSmoother,
    output_db: LinearSmoother,
}

impl Smoothers {
    fn new(params: &ConsoleParams, sample_rate: f32) -> Self {
        let mut smoothers = Self {
            drive_db: LinearSmoother::new(params.drive_db),
            crosstalk: LinearSmoother::new(params.crosstalk),
            threshold_db: LinearSmoother::new(params.compressor_threshold_db),
            ratio: LinearSmoother::new(params.compressor_ratio),
            mix: LinearSmoother::new(params.mix),
            output_db: LinearSmoother::new(params.output_gain_db),
        };
        for smoother in smoothers.iter_mut() {
            smoother.set_ramp_ms(SMOOTHING_MS, sample_rate);
        }
        smoothers
    }

    fn iter_mut(&mut self) -> [&mut LinearSmoother; 6] {
        [
            &mut self.drive_db,
            &mut self.crosstalk,
            &mut self.threshold_db,
            &mut self.ratio,
            &mut self.mix,
            &mut self.output_db,
        ]
    }

    fn set_targets(&mut self, params: &ConsoleParams) {
        self.drive_db.set_target(params.drive_db);
        self.crosstalk.set_target(params.crosstalk);
        self.threshold_db.set_target(params.compressor_threshold_db);
        self.ratio.set_target(params.compressor_ratio);
        self.mix.set_target(params.mix);
        self.output_db.set_target(params.output_gain_db);
    }

    fn snap(&mut self) {
        for smoother in self.iter_mut() {
            smoother.snap();
        }
    }
}

/// Advance a smoother and hand the new value to its stage, skipping the
/// stage update entirely once the ramp has finished.
#[inline]
fn tick(smoother: &mut LinearSmoother, apply: impl FnOnce(f32)) {
    if !smoother.is_settled() {
        apply(smoother.next());
    }
}

/// The fixed console signal path.
///
/// drive → saturator → crosstalk → DC blocker → phase linearizer → slew →
/// compressor → dry/wet blend → output gain → hard limiter
pub struct ConsoleChain {
    drive: LevelStage,
    saturator: SaturatorStage,
    crosstalk: CrosstalkStage,
    dc_blocker: DcBlockerStage,
    linearizer: PhaseLinearizerStage,
    slew: SlewLimiterStage,
    compressor: CompressorStage,
    output: LevelStage,
    limiter: HardLimiterStage,
    mix: f32,
    smoothers: Smoothers,
    params: ConsoleParams,
    sample_rate: f32,
}

impl ConsoleChain {
    /// Derive every coefficient for `sample_rate` and start from silence with
    /// all smoothers already sitting on `params`.
    pub fn new(params: &ConsoleParams, sample_rate: f32) -> Self {
        let params = params.sanitized();
        let mut compressor = CompressorStage::new(
            params.compressor_threshold_db,
            params.compressor_ratio,
            sample_rate,
        );
        compressor.set_enabled(params.compressor_enabled);
        compressor.reset();

        Self {
            drive: LevelStage::new(params.drive_db),
            saturator: SaturatorStage::new(params.saturation_mode, sample_rate),
            crosstalk: CrosstalkStage::new(params.crosstalk),
            dc_blocker: DcBlockerStage::new(sample_rate),
            linearizer: PhaseLinearizerStage::new(params.linearizer_hz, sample_rate),
            slew: SlewLimiterStage::new(params.slew_limit, sample_rate),
            compressor,
            output: LevelStage::new(params.output_gain_db),
            limiter: HardLimiterStage::new(params.limiter_enabled),
            mix: params.mix,
            smoothers: Smoothers::new(&params, sample_rate),
            params,
            sample_rate,
        }
    }

    pub const fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// The snapshot most recently applied.
    pub const fn params(&self) -> &ConsoleParams {
        &self.params
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.compressor.gain_reduction_db()
    }

    /// Take on a new snapshot at a buffer boundary. Continuous values start
    /// ramping and the compressor fades in or out. Other switches and modes
    /// change immediately.
    pub fn apply(&mut self, params: &ConsoleParams) {
        let params = params.sanitized();
        if params == self.params {
            return;
        }

        self.smoothers.set_targets(&params);
        self.saturator.set_mode(params.saturation_mode);
        self.slew.set_amount(params.slew_limit);
        self.compressor.set_enabled(params.compressor_enabled);
        self.limiter.set_enabled(params.limiter_enabled);
        if params.linearizer_hz != self.params.linearizer_hz {
            self.linearizer.set_frequency(params.linearizer_hz);
        }

        self.params = params;
        self.sync_smoothed();
    }

    /// Push every smoother's current value into its stage.
    fn sync_smoothed(&mut self) {
        self.drive.set_gain_db(self.smoothers.drive_db.current());
        self.crosstalk.set_amount(self.smoothers.crosstalk.current());
        self.compressor
            .set_threshold_db(self.smoothers.threshold_db.current());
        self.compressor.set_ratio(self.smoothers.ratio.current());
        self.mix = self.smoothers.mix.current();
        self.output.set_gain_db(self.smoothers.output_db.current());
    }

    #[inline]
    fn advance_smoothers(&mut self) {
        let s = &mut self.smoothers;
        tick(&mut s.drive_db, |v| self.drive.set_gain_db(v));
        tick(&mut s.crosstalk, |v| self.crosstalk.set_amount(v));
        tick(&mut s.threshold_db, |v| self.compressor.set_threshold_db(v));
        tick(&mut s.ratio, |v| self.compressor.set_ratio(v));
        tick(&mut s.mix, |v| self.mix = v);
        tick(&mut s.output_db, |v| self.output.set_gain_db(v));
    }
}

impl Stage for ConsoleChain {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        self.advance_smoothers();

        let dry = sanitize_input(frame);

        let mut wet = self.drive.process(dry);
        wet = self.saturator.process(wet);
        wet = self.crosstalk.process(wet);
        wet = self.dc_blocker.process(wet);
        wet = self.linearizer.process(wet);
        wet = self.slew.process(wet);
        wet = self.compressor.process(wet);

        let mixed = if self.mix >= 1.0 {
            wet
        } else {
            let dry_amount = 1.0 - self.mix;
            Frame::new(
                dry_amount.mul_add(dry.left, self.mix * wet.left),
                dry_amount.mul_add(dry.right, self.mix * wet.right),
            )
        };

        let out = self.output.process(mixed);
        self.limiter.process(out)
    }

    /// Zero every stage's filter state and settle all ramps on their targets.
    /// Coefficients are left as they are.
    fn reset(&mut self) {
        self.saturator.reset();
        self.dc_blocker.reset();
        self.linearizer.reset();
        self.slew.reset();
        self.compressor.reset();
        self.smoothers.snap();
        self.sync_smoothed();
    }
}
