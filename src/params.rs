use serde::{Deserialize, Serialize};

use crate::console::stages::compressor::{MAX_RATIO, MAX_THRESHOLD_DB, MIN_RATIO, MIN_THRESHOLD_DB};
use crate::console::stages::phase_linearizer::{
    DEFAULT_LINEARIZER_HZ, MAX_LINEARIZER_HZ, MIN_LINEARIZER_HZ,
};
use crate::console::stages::slew::{MIN_SLEW_AMOUNT, SLEW_DISABLED};

pub use crate::console::stages::saturator::SaturationMode;

pub const MIN_DRIVE_DB: f32 = -24.0;
pub const MAX_DRIVE_DB: f32 = 36.0;
pub const MIN_OUTPUT_DB: f32 = -24.0;
pub const MAX_OUTPUT_DB: f32 = 24.0;

/// Everything the control side can set, published to the audio thread as one
/// immutable snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleParams {
    pub drive_db: f32,
    pub saturation_mode: SaturationMode,
    /// Fraction of each channel bled into the other.
    pub crosstalk: f32,
    /// Slew amount; 1.0 switches the limiter off.
    pub slew_limit: f32,
    pub compressor_enabled: bool,
    pub compressor_threshold_db: f32,
    pub compressor_ratio: f32,
    pub output_gain_db: f32,
    pub limiter_enabled: bool,
    /// Dry/wet balance of the coloration, 1.0 = fully processed.
    pub mix: f32,
    /// Corner of the phase linearizer's all-pass network.
    pub linearizer_hz: f32,
}

impl Default for ConsoleParams {
    fn default() -> Self {
        Self {
            drive_db: 0.0,
            saturation_mode: SaturationMode::Tape,
            crosstalk: 0.03,
            slew_limit: 0.8,
            compressor_enabled: false,
            compressor_threshold_db: -18.0,
            compressor_ratio: 4.0,
            output_gain_db: 0.0,
            limiter_enabled: false,
            mix: 1.0,
            linearizer_hz: DEFAULT_LINEARIZER_HZ,
        }
    }
}

/// Clamp to range, falling back to `default` for NaN and infinities.
fn clamp_or(value: f32, min: f32, max: f32, default: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        default
    }
}

impl ConsoleParams {
    /// A copy with every field pulled into its valid range.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            drive_db: clamp_or(self.drive_db, MIN_DRIVE_DB, MAX_DRIVE_DB, d.drive_db),
            saturation_mode: self.saturation_mode,
            crosstalk: clamp_or(self.crosstalk, 0.0, 1.0, d.crosstalk),
            slew_limit: clamp_or(self.slew_limit, MIN_SLEW_AMOUNT, SLEW_DISABLED, d.slew_limit),
            compressor_enabled: self.compressor_enabled,
            compressor_threshold_db: clamp_or(
                self.compressor_threshold_db,
                MIN_THRESHOLD_DB,
                MAX_THRESHOLD_DB,
                d.compressor_threshold_db,
            ),
            compressor_ratio: clamp_or(self.compressor_ratio, MIN_RATIO, MAX_RATIO, d.compressor_ratio),
            output_gain_db: clamp_or(self.output_gain_db, MIN_OUTPUT_DB, MAX_OUTPUT_DB, d.output_gain_db),
            limiter_enabled: self.limiter_enabled,
            mix: clamp_or(self.mix, 0.0, 1.0, d.mix),
            linearizer_hz: clamp_or(
                self.linearizer_hz,
                MIN_LINEARIZER_HZ,
                MAX_LINEARIZER_HZ,
                d.linearizer_hz,
            ),
        }
    }

    /// Every optional and nonlinear stage switched off: only the two gains,
    /// the DC blocker and the phase linearizer remain in the path.
    pub fn transparent() -> Self {
        Self {
            saturation_mode: SaturationMode::Bypass,
            crosstalk: 0.0,
            slew_limit: SLEW_DISABLED,
            compressor_enabled: false,
            limiter_enabled: false,
            mix: 1.0,
            ..Self::default()
        }
    }
}

impl std::fmt::Display for ConsoleParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Drive: {:.2} dB", self.drive_db)?;
        writeln!(f, "Saturation: {}", self.saturation_mode)?;
        writeln!(f, "Crosstalk: {:.3}", self.crosstalk)?;
        if self.slew_limit < SLEW_DISABLED {
            writeln!(f, "Slew: {:.5}", self.slew_limit)?;
        } else {
            writeln!(f, "Slew: off")?;
        }
        writeln!(
            f,
            "Compressor: {} ({:.1} dB, {:.1}:1)",
            if self.compressor_enabled { "on" } else { "off" },
            self.compressor_threshold_db,
            self.compressor_ratio
        )?;
        writeln!(f, "Output: {:.2} dB", self.output_gain_db)?;
        writeln!(f, "Limiter: {}", if self.limiter_enabled { "on" } else { "off" })?;
        writeln!(f, "Mix: {:.0}%", self.mix * 100.0)?;
        writeln!(f, "Linearizer: {:.0} Hz", self.linearizer_hz)
    }
}
