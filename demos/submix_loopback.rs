//! An application thread writes 22.05 kHz mono into a pipe while a mixer
//! thread pulls it through a converter into 48 kHz stereo periods, the way a
//! remote submix output feeds a capture stream.

use std::error::Error;
use std::thread;
use std::time::Duration;

use submix::fixed::{accumulator_to_i16, UNITY_GAIN};
use submix::pipe::{PipeBuilder, PipeFormat, PipeProvider, WriteMode};
use submix::{Quality, SampleRateConverter};

const PERIOD_FRAMES: usize = 480;

fn main() -> Result<(), Box<dyn Error>> {
    let format = PipeFormat::new(1, 22_050);
    let (mut writer, reader, control) = PipeBuilder::new(format)
        .capacity(2048)
        .write_mode(WriteMode::Blocking)
        .write_timeout(Some(Duration::from_millis(500)))
        .build::<i16>();

    let app = thread::spawn(move || {
        let tone: Vec<i16> = (0..22_050)
            .map(|n| {
                let t = f64::from(n) / 22_050.0;
                (10_000.0 * (std::f64::consts::TAU * 440.0 * t).sin()) as i16
            })
            .collect();
        for chunk in tone.chunks(256) {
            if writer.write(chunk).is_err() {
                break;
            }
        }
        // Dropping the writer ends the stream once the mixer drained it.
    });

    let mut provider = PipeProvider::new(reader, format)?;
    let mut converter = SampleRateConverter::new(16, 1, 48_000, Quality::Medium)?;
    converter.set_sample_rate(format.sample_rate())?;
    converter.set_volume(UNITY_GAIN, UNITY_GAIN / 2);

    let mut periods = 0;
    let mut peak = 0i16;
    while !provider.is_eof() {
        let mut mix = vec![0i32; 2 * PERIOD_FRAMES];
        converter.resample(&mut mix, &mut provider);
        peak = mix
            .iter()
            .map(|&s| accumulator_to_i16(s).saturating_abs())
            .fold(peak, i16::max);
        periods += 1;
        // A real mixer would wait for the next hardware period here.
        thread::sleep(Duration::from_millis(2));
    }
    control.shutdown(true);
    app.join().map_err(|_| "application thread panicked")?;

    println!("mixed {periods} periods of {PERIOD_FRAMES} frames, peak {peak}");
    Ok(())
}
