use anyhow::{Result, bail, ensure};
use arc_swap::ArcSwap;
use assert_no_alloc::assert_no_alloc;
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use std::sync::Arc;

use crate::audio::peak_meter::{PeakMeter, PeakMeterHandle, PeakMeterInfo};
use crate::console::chain::{ConsoleChain, sanitize_input};
use crate::console::stages::{Frame, Stage};
use crate::params::ConsoleParams;

pub const MIN_SAMPLE_RATE: f32 = 8_000.0;
pub const MAX_SAMPLE_RATE: f32 = 768_000.0;

const MESSAGE_CAPACITY: usize = 8;

pub enum EngineMessage {
    Reset,
}

struct Prepared {
    sample_rate: f32,
    max_block_size: usize,
    chain: ConsoleChain,
}

enum State {
    Unprepared,
    Prepared(Box<Prepared>),
}

/// Audio-thread half of the console.
///
/// Owns every stage's filter state. Nothing here blocks, locks or allocates
/// once `prepare` has returned.
pub struct Console {
    state: State,
    params: Arc<ArcSwap<ConsoleParams>>,
    rx_updates: Receiver<EngineMessage>,
    meter: PeakMeter,
}

/// Control-thread half of the console: publishes parameter snapshots,
/// schedules resets and reads the meters.
#[derive(Clone)]
pub struct ConsoleHandle {
    params: Arc<ArcSwap<ConsoleParams>>,
    tx_updates: Sender<EngineMessage>,
    meter: PeakMeterHandle,
}

impl Console {
    pub fn new(params: ConsoleParams) -> (Self, ConsoleHandle) {
        let params = Arc::new(ArcSwap::from_pointee(params.sanitized()));
        let (tx_updates, rx_updates) = bounded(MESSAGE_CAPACITY);
        let (meter, meter_handle) = PeakMeter::new(MIN_SAMPLE_RATE);

        (
            Self {
                state: State::Unprepared,
                params: Arc::clone(&params),
                rx_updates,
                meter,
            },
            ConsoleHandle {
                params,
                tx_updates,
                meter: meter_handle,
            },
        )
    }

    /// Derive every sample-rate-dependent coefficient and start from silence.
    ///
    /// Calling this again with a different rate rebuilds the chain; calling it
    /// with the same rate behaves like `reset`.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<()> {
        ensure!(
            sample_rate.is_finite(),
            "sample rate must be finite, got {sample_rate}"
        );
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            bail!(
                "sample rate {sample_rate} Hz is outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE} Hz"
            );
        }
        ensure!(max_block_size > 0, "max block size must be at least one frame");

        if let State::Prepared(prepared) = &self.state
            && prepared.sample_rate != sample_rate
        {
            debug!(
                "Sample rate changed from {} Hz, re-deriving coefficients",
                prepared.sample_rate
            );
        }

        // Drain anything queued before preparation; the chain starts fresh anyway.
        while self.rx_updates.try_recv().is_ok() {}

        let params = **self.params.load();
        self.state = State::Prepared(Box::new(Prepared {
            sample_rate,
            max_block_size,
            chain: ConsoleChain::new(&params, sample_rate),
        }));
        self.meter.set_sample_rate(sample_rate);
        self.meter.reset();

        info!("Console prepared at {sample_rate} Hz, max block {max_block_size} frames");
        Ok(())
    }

    /// Zero all filter state, keeping coefficients. A no-op while unprepared.
    pub fn reset(&mut self) {
        let params = **self.params.load();
        if let State::Prepared(prepared) = &mut self.state {
            prepared.chain.apply(&params);
            prepared.chain.reset();
            self.meter.reset();
        }
    }

    pub const fn is_prepared(&self) -> bool {
        matches!(self.state, State::Prepared(_))
    }

    pub fn sample_rate(&self) -> Option<f32> {
        match &self.state {
            State::Prepared(prepared) => Some(prepared.sample_rate),
            State::Unprepared => None,
        }
    }

    pub fn max_block_size(&self) -> Option<usize> {
        match &self.state {
            State::Prepared(prepared) => Some(prepared.max_block_size),
            State::Unprepared => None,
        }
    }

    /// Process planar stereo in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        ensure!(
            left.len() == right.len(),
            "channel lengths differ: {} left, {} right",
            left.len(),
            right.len()
        );
        let Self {
            state,
            params,
            rx_updates,
            meter,
        } = self;
        let chain = begin_block(state, params, rx_updates, meter, left.len())?;

        assert_no_alloc(|| {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let input = sanitize_input(Frame::new(*l, *r));
                let output = chain.process(input);
                meter.track(input, output);
                *l = output.left;
                *r = output.right;
            }
        });

        meter.publish(chain.gain_reduction_db());
        Ok(())
    }

    /// Process interleaved `L R L R ...` stereo in place.
    pub fn process_interleaved(&mut self, samples: &mut [f32]) -> Result<()> {
        ensure!(
            samples.len() % 2 == 0,
            "interleaved stereo buffer has odd length {}",
            samples.len()
        );
        let Self {
            state,
            params,
            rx_updates,
            meter,
        } = self;
        let chain = begin_block(state, params, rx_updates, meter, samples.len() / 2)?;

        assert_no_alloc(|| {
            for pair in samples.chunks_exact_mut(2) {
                let input = sanitize_input(Frame::new(pair[0], pair[1]));
                let output = chain.process(input);
                meter.track(input, output);
                pair[0] = output.left;
                pair[1] = output.right;
            }
        });

        meter.publish(chain.gain_reduction_db());
        Ok(())
    }
}

/// Check preconditions, then take on pending control messages and the
/// current parameter snapshot at the buffer boundary.
fn begin_block<'a>(
    state: &'a mut State,
    params: &ArcSwap<ConsoleParams>,
    rx_updates: &Receiver<EngineMessage>,
    meter: &mut PeakMeter,
    frames: usize,
) -> Result<&'a mut ConsoleChain> {
    let State::Prepared(prepared) = state else {
        bail!("process called before prepare");
    };
    ensure!(
        frames <= prepared.max_block_size,
        "block of {frames} frames exceeds prepared maximum of {}",
        prepared.max_block_size
    );

    let params = **params.load();
    let mut reset = false;
    while let Ok(message) = rx_updates.try_recv() {
        match message {
            EngineMessage::Reset => reset = true,
        }
    }

    let chain = &mut prepared.chain;
    chain.apply(&params);
    if reset {
        chain.reset();
        meter.reset();
    }
    Ok(chain)
}

impl ConsoleHandle {
    /// Publish a new snapshot. Values are clamped into range here, so the
    /// audio thread only ever sees valid parameters.
    pub fn set_parameters(&self, params: ConsoleParams) {
        let sanitized = params.sanitized();
        if sanitized != params {
            debug!("Parameters clamped into range");
        }
        self.params.store(Arc::new(sanitized));
    }

    /// The most recently published snapshot.
    pub fn parameters(&self) -> ConsoleParams {
        **self.params.load()
    }

    /// Ask the audio thread to reset at the start of its next buffer.
    pub fn request_reset(&self) {
        match self.tx_updates.try_send(EngineMessage::Reset) {
            Ok(()) => debug!("Reset requested"),
            Err(TrySendError::Full(_)) => debug!("Reset already pending"),
            Err(TrySendError::Disconnected(_)) => warn!("Console dropped, reset ignored"),
        }
    }

    pub fn meter(&self) -> PeakMeterInfo {
        self.meter.get_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprepared_process_is_rejected() {
        let (mut console, _handle) = Console::new(ConsoleParams::default());
        let mut left = [0.1; 16];
        let mut right = [0.1; 16];
        assert!(console.process(&mut left, &mut right).is_err());
        assert_eq!(left, [0.1; 16]);
        assert!(!console.is_prepared());
    }

    #[test]
    fn prepare_validates_configuration() {
        let (mut console, _handle) = Console::new(ConsoleParams::default());
        assert!(console.prepare(0.0, 256).is_err());
        assert!(console.prepare(f32::NAN, 256).is_err());
        assert!(console.prepare(1.0e6, 256).is_err());
        assert!(console.prepare(48_000.0, 0).is_err());
        assert!(!console.is_prepared());

        console.prepare(48_000.0, 256).unwrap();
        assert_eq!(console.sample_rate(), Some(48_000.0));
        assert_eq!(console.max_block_size(), Some(256));
    }

    #[test]
    fn malformed_blocks_are_rejected() {
        let (mut console, _handle) = Console::new(ConsoleParams::default());
        console.prepare(44_100.0, 64).unwrap();

        let mut left = [0.0; 64];
        let mut right = [0.0; 63];
        assert!(console.process(&mut left, &mut right).is_err());

        let mut too_long = [0.0; 130];
        assert!(console.process_interleaved(&mut too_long).is_err());

        let mut odd = [0.0; 7];
        assert!(console.process_interleaved(&mut odd).is_err());

        let mut empty: [f32; 0] = [];
        assert!(console.process_interleaved(&mut empty).is_ok());
    }

    #[test]
    fn handle_clamps_published_parameters() {
        let (_console, handle) = Console::new(ConsoleParams::default());
        handle.set_parameters(ConsoleParams {
            drive_db: 99.0,
            mix: f32::NAN,
            ..ConsoleParams::default()
        });
        let published = handle.parameters();
        assert_eq!(published.drive_db, crate::params::MAX_DRIVE_DB);
        assert_eq!(published.mix, 1.0);
    }

    #[test]
    fn reset_requests_do_not_block_when_queue_is_full() {
        let (_console, handle) = Console::new(ConsoleParams::default());
        for _ in 0..MESSAGE_CAPACITY * 4 {
            handle.request_reset();
        }
    }
}
