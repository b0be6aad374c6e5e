use crossbeam::atomic::AtomicCell;
use std::sync::Arc;

use crate::console::stages::Frame;
use crate::console::stages::common::{flush_denormal, lin_to_db};

const CLIP_THRESHOLD: f32 = 0.95;
const SILENCE_DB: f32 = -100.0;

/// Meter fall time: 12 dB (a factor of four) every 100 ms.
const DECAY_FACTOR: f32 = 0.25;
const DECAY_WINDOW_SECONDS: f32 = 0.1;

#[derive(Default)]
struct MeterCells {
    input_peak: AtomicCell<f32>,
    output_peak: AtomicCell<f32>,
    gain_reduction_db: AtomicCell<f32>,
}

/// Audio-thread side of the console meters.
///
/// Peaks fall back at a fixed rate per sample and are published once per
/// buffer through lock-free cells, so reading them never blocks processing.
pub struct PeakMeter {
    input_peak: f32,
    output_peak: f32,
    decay: f32,
    cells: Arc<MeterCells>,
}

#[derive(Clone)]
pub struct PeakMeterHandle {
    cells: Arc<MeterCells>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakMeterInfo {
    pub input_db: f32,
    pub output_db: f32,
    pub gain_reduction_db: f32,
    pub is_clipping: bool,
}

impl Default for PeakMeterInfo {
    fn default() -> Self {
        Self {
            input_db: SILENCE_DB,
            output_db: SILENCE_DB,
            gain_reduction_db: 0.0,
            is_clipping: false,
        }
    }
}

fn to_db(peak: f32) -> f32 {
    if peak > 1e-5 { lin_to_db(peak) } else { SILENCE_DB }
}

fn decay_per_sample(sample_rate: f32) -> f32 {
    DECAY_FACTOR.powf((sample_rate * DECAY_WINDOW_SECONDS).recip())
}

impl PeakMeter {
    pub fn new(sample_rate: f32) -> (Self, PeakMeterHandle) {
        let cells = Arc::new(MeterCells::default());

        (
            Self {
                input_peak: 0.0,
                output_peak: 0.0,
                decay: decay_per_sample(sample_rate),
                cells: Arc::clone(&cells),
            },
            PeakMeterHandle { cells },
        )
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.decay = decay_per_sample(sample_rate);
    }

    /// Fold one input/output frame pair into the running peaks. A non-finite
    /// sample is not a level and is ignored, so one bad frame cannot pin the
    /// meter.
    #[inline]
    pub fn track(&mut self, input: Frame, output: Frame) {
        self.input_peak = Self::fall(self.input_peak, self.decay, input);
        self.output_peak = Self::fall(self.output_peak, self.decay, output);
    }

    #[inline]
    fn fall(held: f32, decay: f32, frame: Frame) -> f32 {
        let peak = frame.peak();
        let peak = if peak.is_finite() { peak } else { 0.0 };
        flush_denormal((held * decay).max(peak))
    }

    /// Make the current peaks visible to the handle.
    pub fn publish(&self, gain_reduction_db: f32) {
        self.cells.input_peak.store(self.input_peak);
        self.cells.output_peak.store(self.output_peak);
        self.cells.gain_reduction_db.store(gain_reduction_db);
    }

    pub fn reset(&mut self) {
        self.input_peak = 0.0;
        self.output_peak = 0.0;
        self.publish(0.0);
    }
}

impl PeakMeterHandle {
    pub fn get_info(&self) -> PeakMeterInfo {
        let output_peak = self.cells.output_peak.load();
        PeakMeterInfo {
            input_db: to_db(self.cells.input_peak.load()),
            output_db: to_db(output_peak),
            gain_reduction_db: self.cells.gain_reduction_db.load(),
            is_clipping: output_peak >= CLIP_THRESHOLD,
        }
    }
}
