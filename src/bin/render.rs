use analog_console::audio::Console;
use analog_console::params::{ConsoleParams, SaturationMode};
use analog_console::settings::Settings;
use anyhow::{Context, Result, bail};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info};
use std::path::{Path, PathBuf};

#[cfg(debug_assertions)]
#[global_allocator]
static ALLOCATOR: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "console-render")]
#[command(version)]
#[command(about = "Runs a WAV file through the analog console chain.")]
struct Args {
    #[arg(help = "Input WAV file (mono or stereo)")]
    input: PathBuf,
    #[arg(help = "Output WAV file, written as 32-bit float stereo")]
    output: PathBuf,
    #[arg(
        long,
        env = "CONSOLE_SETTINGS",
        help = "Settings file to start from [default: XDG config path]"
    )]
    settings: Option<PathBuf>,
    #[arg(long, help = "Write the effective settings to this file")]
    save_settings: Option<PathBuf>,
    #[arg(long, env = "CONSOLE_BLOCK_SIZE", help = "Frames per processing call")]
    block_size: Option<usize>,

    #[arg(long, allow_hyphen_values = true, help = "Drive in dB")]
    drive_db: Option<f32>,
    #[arg(long, value_enum, help = "Saturation character")]
    mode: Option<SaturationMode>,
    #[arg(long, help = "Channel bleed, 0..1")]
    crosstalk: Option<f32>,
    #[arg(long, help = "Slew limit amount, 1 disables")]
    slew: Option<f32>,
    #[arg(long, help = "Enable the auto compressor")]
    compressor: Option<bool>,
    #[arg(long, allow_hyphen_values = true, help = "Compressor threshold in dB")]
    threshold_db: Option<f32>,
    #[arg(long, help = "Compressor ratio")]
    ratio: Option<f32>,
    #[arg(long, allow_hyphen_values = true, help = "Output gain in dB")]
    output_db: Option<f32>,
    #[arg(long, help = "Enable the 0 dBFS hard limiter")]
    limiter: Option<bool>,
    #[arg(long, help = "Dry/wet mix, 0..1")]
    mix: Option<f32>,
    #[arg(long, help = "Phase linearizer corner frequency in Hz")]
    linearizer_hz: Option<f32>,
}

impl Args {
    fn apply_overrides(&self, settings: &mut Settings) {
        let p: &mut ConsoleParams = &mut settings.params;
        macro_rules! overlay {
            ($($arg:ident => $field:ident),* $(,)?) => {
                $(if let Some(value) = self.$arg {
                    p.$field = value;
                })*
            };
        }
        overlay! {
            drive_db => drive_db,
            mode => saturation_mode,
            crosstalk => crosstalk,
            slew => slew_limit,
            compressor => compressor_enabled,
            threshold_db => compressor_threshold_db,
            ratio => compressor_ratio,
            output_db => output_gain_db,
            limiter => limiter_enabled,
            mix => mix,
            linearizer_hz => linearizer_hz,
        }
        if let Some(block_size) = self.block_size {
            settings.block_size = block_size;
        }
    }
}

/// Read a WAV file as interleaved stereo floats.
fn read_stereo(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open input '{}'", path.display()))?;
    let spec = reader.spec();
    debug!("Input spec: {spec:?}");

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8..=32 => ((1u64 << (spec.bits_per_sample - 1)) as f32).recip(),
                bits => bail!("unsupported bit depth: {bits}"),
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|sample| sample as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let stereo = match spec.channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => bail!("only mono and stereo input is supported, got {n} channels"),
    };
    Ok((stereo, spec.sample_rate))
}

fn write_stereo(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create output '{}'", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("failed to finalize output WAV")?;
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    info!("console-render v{}", env!("CARGO_PKG_VERSION"));
    debug!("Args: {args:?}");

    let settings_path = args.settings.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)?;
    args.apply_overrides(&mut settings);
    settings.params = settings.params.sanitized();
    info!("Settings:\n{settings}");

    if let Some(path) = &args.save_settings {
        settings.save(path)?;
        info!("Saved settings to {}", path.display());
    }

    let (mut samples, sample_rate) = read_stereo(&args.input)?;
    info!(
        "Read {} frames at {sample_rate} Hz from {}",
        samples.len() / 2,
        args.input.display()
    );

    let (mut console, handle) = Console::new(settings.params);
    console
        .prepare(sample_rate as f32, settings.block_size)
        .context("failed to prepare console")?;

    for block in samples.chunks_mut(settings.block_size * 2) {
        console.process_interleaved(block)?;
    }

    let meter = handle.meter();
    info!(
        "Final meters: in {:.1} dBFS, out {:.1} dBFS, gain reduction {:.1} dB",
        meter.input_db, meter.output_db, meter.gain_reduction_db
    );

    write_stereo(&args.output, &samples, sample_rate)?;
    info!("Wrote {}", args.output.display());
    Ok(())
}
