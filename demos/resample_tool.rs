//! Converts a 16-bit WAV file (or a generated test tone) to another rate.
//!
//! Run with:
//! ```
//! cargo run --release --example resample_tool -- --output-rate 48000 --quality high \
//!     --input in.wav --output out.wav
//! cargo run --release --example resample_tool -- --input-rate 44100 --profile 200
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{info, metadata::LevelFilter};
use tracing_subscriber::EnvFilter;

use submix::fixed::{accumulator_to_i16, gain_from_f32};
use submix::provider::BufferProvider;
use submix::{wav_from_file, wav_to_file, ConverterBuilder, Quality, SampleRateConverter};

/// Frames converted per `resample` call, one mixer period.
const PERIOD_FRAMES: usize = 480;

#[derive(Debug, Parser)]
#[command(about = "Fixed-point sample rate conversion of 16-bit PCM")]
struct Args {
    /// Input rate in Hz. Taken from the file header when `--input` is given.
    #[arg(long, default_value_t = 44_100)]
    input_rate: u32,

    /// Output rate in Hz.
    #[arg(long, default_value_t = 48_000)]
    output_rate: u32,

    /// Input channels, 1 or 2. Taken from the file header when `--input` is given.
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// low, medium, high, very_high or default.
    #[arg(long, default_value = "default")]
    quality: Quality,

    /// Linear gain applied to both output channels.
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// 16-bit PCM WAV to convert. A two second 1 kHz tone is used otherwise.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Where to write the stereo result.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Convert this many times and report throughput instead of writing.
    #[arg(long)]
    profile: Option<u32>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy()
                .add_directive("submix=debug".parse()?),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let (input_rate, channels, samples) = match &args.input {
        Some(path) => {
            let wav = wav_from_file(path)?;
            info!(path = %path.display(), rate = wav.sample_rate, channels = wav.channels, "loaded input");
            (wav.sample_rate, wav.channels, wav.samples)
        }
        None => (
            args.input_rate,
            args.channels,
            tone(args.input_rate, args.channels),
        ),
    };
    let input_frames = samples.len() / usize::from(channels.max(1));
    let output_frames = (input_frames as u64 * u64::from(args.output_rate)
        / u64::from(input_rate.max(1))) as usize;

    let build = || {
        let mut converter = ConverterBuilder::new(args.output_rate)
            .input_rate(input_rate)
            .channels(channels)
            .quality(args.quality)
            .build()?;
        let gain = gain_from_f32(args.volume);
        converter.set_volume(gain, gain);
        Ok::<_, submix::ConfigError>(converter)
    };

    let converter = build()?;
    info!(
        quality = %converter.quality(),
        ratio = %converter.ratio(),
        latency_frames = converter.latency_frames(),
        "converter ready"
    );

    if let Some(runs) = args.profile {
        drop(converter);
        let start = Instant::now();
        for _ in 0..runs {
            let mut converter = build()?;
            convert(&mut converter, &samples, channels, output_frames);
        }
        let elapsed = start.elapsed().as_secs_f64();
        let frames = output_frames as f64 * f64::from(runs);
        info!(
            runs,
            seconds = elapsed,
            frames_per_second = frames / elapsed,
            realtime_factor = frames / elapsed / f64::from(args.output_rate),
            "profile finished"
        );
        return Ok(());
    }

    let mut converter = converter;
    let output = convert(&mut converter, &samples, channels, output_frames);
    match &args.output {
        Some(path) => {
            wav_to_file(args.output_rate, 2, &output, path)?;
            info!(path = %path.display(), frames = output.len() / 2, "wrote output");
        }
        None => info!(frames = output.len() / 2, "converted, pass --output to keep the result"),
    }
    Ok(())
}

fn convert(
    converter: &mut SampleRateConverter,
    samples: &[i16],
    channels: u16,
    output_frames: usize,
) -> Vec<i16> {
    let mut provider = BufferProvider::new(channels, samples.to_vec());
    let mut mix = vec![0i32; 2 * output_frames];
    for period in mix.chunks_mut(2 * PERIOD_FRAMES) {
        converter.resample(period, &mut provider);
    }
    mix.into_iter().map(accumulator_to_i16).collect()
}

fn tone(rate: u32, channels: u16) -> Vec<i16> {
    let frames = 2 * rate as usize;
    (0..frames)
        .flat_map(|n| {
            let t = n as f64 / f64::from(rate);
            let value = (12_000.0 * (std::f64::consts::TAU * 1_000.0 * t).sin()) as i16;
            std::iter::repeat(value).take(usize::from(channels))
        })
        .collect()
}
