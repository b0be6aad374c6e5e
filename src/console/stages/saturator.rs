use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::console::stages::common::EnvelopeFollower;
use crate::console::stages::{Frame, Stage};

/// Ceiling of the Tube curve's negative half-cycle (positive half reaches 1.0).
const TUBE_NEGATIVE_CEILING: f32 = 0.7;

/// Knee exponent for the Transistor curve; higher is more abrupt.
const TRANSISTOR_HARDNESS: f32 = 4.0;
/// Operating-point offset that skews the Transistor curve.
const TRANSISTOR_BIAS: f32 = 0.1;
/// Beyond this the Transistor curve is flat to within f32 precision.
const TRANSISTOR_RAIL: f32 = 1.0e4;

const LDR_ATTACK_MS: f32 = 5.0;
const LDR_RELEASE_MS: f32 = 60.0;
/// How strongly the cell's resistance responds to the tracked level.
const LDR_SENSITIVITY: f32 = 2.0;

#[derive(ValueEnum, Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SaturationMode {
    #[default]
    Tape, // Smooth odd-symmetric tanh knee
    Tube,       // Asymmetric, even harmonics (adds DC)
    Transistor, // Near-linear then abrupt, biased
    Ldr,        // Program-dependent gain from a light-dependent resistor
    Bypass,
}

impl std::fmt::Display for SaturationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tape => write!(f, "Tape"),
            Self::Tube => write!(f, "Tube"),
            Self::Transistor => write!(f, "Transistor"),
            Self::Ldr => write!(f, "LDR"),
            Self::Bypass => write!(f, "Bypass"),
        }
    }
}

/// Tape: `tanh`, approaching but never reaching ±1.
#[inline]
pub fn tape(x: f32) -> f32 {
    x.tanh()
}

/// Tube: exponential saturation with a lower negative ceiling.
///
/// ```text
/// f(x) = 1 - exp(-x)            x >= 0
/// f(x) = -c (1 - exp(x / c))    x < 0,  c = 0.7
/// ```
///
/// Both branches have unit slope at the origin, so the curve is smooth there
/// while compressing the negative half-cycle harder.
#[inline]
pub fn tube(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 - (-x).exp()
    } else {
        -TUBE_NEGATIVE_CEILING * (1.0 - (x / TUBE_NEGATIVE_CEILING).exp())
    }
}

/// Symmetric hard-knee shaper `u / (1 + |u|^p)^(1/p)`.
#[inline]
fn transistor_shape(u: f32) -> f32 {
    let u = u.clamp(-TRANSISTOR_RAIL, TRANSISTOR_RAIL);
    u / (1.0 + u.abs().powf(TRANSISTOR_HARDNESS)).powf(TRANSISTOR_HARDNESS.recip())
}

/// Transistor: the hard-knee shaper evaluated around a biased operating point
/// and re-centred so silence stays silent.
#[inline]
pub fn transistor(x: f32) -> f32 {
    transistor_shape(x + TRANSISTOR_BIAS) - transistor_shape(TRANSISTOR_BIAS)
}

/// Per-channel state for the LDR mode.
#[derive(Clone, Debug)]
struct LdrCell {
    level: EnvelopeFollower,
}

impl LdrCell {
    fn new(sample_rate: f32) -> Self {
        Self {
            level: EnvelopeFollower::from_ms(LDR_ATTACK_MS, LDR_RELEASE_MS, sample_rate),
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        // Brighter light, lower resistance, less gain.
        let level = self.level.process(x);
        let gain = 1.0 / LDR_SENSITIVITY.mul_add(level, 1.0);
        (x * gain).tanh()
    }

    fn reset(&mut self) {
        self.level.reset();
    }
}

pub struct SaturatorStage {
    mode: SaturationMode,
    ldr: [LdrCell; 2],
}

impl SaturatorStage {
    pub fn new(mode: SaturationMode, sample_rate: f32) -> Self {
        Self {
            mode,
            ldr: [LdrCell::new(sample_rate), LdrCell::new(sample_rate)],
        }
    }

    pub const fn mode(&self) -> SaturationMode {
        self.mode
    }

    /// Switch curves. Entering LDR starts from a dark cell.
    pub fn set_mode(&mut self, mode: SaturationMode) {
        if mode != self.mode {
            self.mode = mode;
            for cell in &mut self.ldr {
                cell.reset();
            }
        }
    }
}

impl Stage for SaturatorStage {
    #[inline]
    fn process(&mut self, frame: Frame) -> Frame {
        match self.mode {
            SaturationMode::Tape => frame.map(tape),
            SaturationMode::Tube => frame.map(tube),
            SaturationMode::Transistor => frame.map(transistor),
            SaturationMode::Ldr => {
                let [left, right] = &mut self.ldr;
                Frame::new(left.process(frame.left), right.process(frame.right))
            }
            SaturationMode::Bypass => frame,
        }
    }

    fn reset(&mut self) {
        for cell in &mut self.ldr {
            cell.reset();
        }
    }
}
