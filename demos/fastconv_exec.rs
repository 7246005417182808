//! # Streaming Convolution Driver
//!
//! Convolves a mono audio file with a mono impulse response by streaming it
//! through the engine in fixed-size reads, then appends the flushed tail.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example fastconv_exec -- <input.wav> <ir.wav> [block_length] [strategy] [output.wav]
//! ```
//!
//! `strategy` is one of `direct`, `partitioned-direct`, `partitioned-fft`.
//!
//! ## Example
//!
//! ```bash
//! cargo run --release --example fastconv_exec -- vocals.wav hall_ir.wav 8192 partitioned-fft vocals_hall.wav
//! ```

use anyhow::{Context, Result};
use fastconv::{utils::calculate_peak, EngineConfig, FastConv, Strategy, DEFAULT_BLOCK_LENGTH};
use hound::{WavReader, WavSpec, WavWriter};
use std::env;
use std::time::Instant;

/// Samples handed to `process` per call, independent of the engine block length
const READ_SIZE: usize = 1024;

/// Read WAV samples and convert to f32, supporting 16/24/32-bit integer and 32-bit float
fn read_wav_samples(reader: &mut WavReader<std::io::BufReader<std::fs::File>>) -> Result<Vec<f32>> {
    let spec = reader.spec();

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => Ok(reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 16-bit samples")?
            .into_iter()
            .map(|s| (s as f32) / 32768.0)
            .collect()),
        (hound::SampleFormat::Int, 24) => {
            Ok(reader
                .samples::<i32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read 24-bit samples")?
                .into_iter()
                .map(|s| (s as f32) / 8388608.0) // 2^23
                .collect())
        }
        (hound::SampleFormat::Int, 32) => {
            Ok(reader
                .samples::<i32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read 32-bit samples")?
                .into_iter()
                .map(|s| (s as f32) / 2147483648.0) // 2^31
                .collect())
        }
        (hound::SampleFormat::Float, 32) => Ok(reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 32-bit float samples")?),
        _ => {
            anyhow::bail!(
                "Unsupported audio format: {} bits, {:?}",
                spec.bits_per_sample,
                spec.sample_format
            )
        }
    }
}

/// Open a mono WAV file and return its spec and samples
fn read_mono(path: &str) -> Result<(WavSpec, Vec<f32>)> {
    let mut reader = WavReader::open(path).with_context(|| format!("Failed to open {}", path))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        anyhow::bail!(
            "{} has {} channels; only mono files are supported",
            path,
            spec.channels
        );
    }
    let samples = read_wav_samples(&mut reader)?;
    Ok((spec, samples))
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 || args.len() > 6 {
        eprintln!(
            "Usage: {} <input.wav> <ir.wav> [block_length] [strategy] [output.wav]",
            args[0]
        );
        eprintln!("Streams a mono file through partitioned convolution with a mono IR");
        std::process::exit(1);
    }

    let audio_path = &args[1];
    let ir_path = &args[2];
    let block_length = match args.get(3) {
        Some(value) => value
            .parse::<usize>()
            .with_context(|| format!("Invalid block length: {}", value))?,
        None => DEFAULT_BLOCK_LENGTH,
    };
    let strategy = match args.get(4) {
        Some(value) => value
            .parse::<Strategy>()
            .with_context(|| format!("Unknown strategy: {}", value))?,
        None => Strategy::default(),
    };
    let output_path = args.get(5).map(String::as_str).unwrap_or("output_conv.wav");

    println!("Streaming Convolution");
    println!("Audio: {}", audio_path);
    println!("IR: {}", ir_path);
    println!("Output: {}", output_path);
    println!();

    let (audio_spec, audio_samples) = read_mono(audio_path)?;
    let (ir_spec, ir_samples) = read_mono(ir_path)?;

    println!(
        "Audio: {} Hz, {} samples ({:.2}s)",
        audio_spec.sample_rate,
        audio_samples.len(),
        (audio_samples.len() as f32) / (audio_spec.sample_rate as f32)
    );
    println!(
        "IR: {} Hz, {} samples ({:.2}s)",
        ir_spec.sample_rate,
        ir_samples.len(),
        (ir_samples.len() as f32) / (ir_spec.sample_rate as f32)
    );

    if audio_spec.sample_rate != ir_spec.sample_rate {
        anyhow::bail!(
            "Sample rate mismatch: audio is {} Hz but IR is {} Hz",
            audio_spec.sample_rate,
            ir_spec.sample_rate
        );
    }

    let mut engine = FastConv::new();
    engine
        .init_with_config(
            &ir_samples,
            &EngineConfig {
                block_length,
                strategy,
            },
        )
        .context("Failed to initialize convolution engine")?;

    println!(
        "\nProcessing with {} (block length {})...",
        strategy.name(),
        engine.block_length().unwrap_or(block_length)
    );

    let start = Instant::now();

    let mut output = vec![0.0; audio_samples.len()];
    for (input, out) in audio_samples
        .chunks(READ_SIZE)
        .zip(output.chunks_mut(READ_SIZE))
    {
        engine.process(input, out)?;
    }
    let tail = engine.flush()?;
    output.extend_from_slice(&tail);

    println!(
        "Convolution: {:.3} seconds",
        start.elapsed().as_secs_f64()
    );

    // Normalize output only if it would clip
    let max_amplitude = calculate_peak(&output);
    if max_amplitude > 1.0 {
        println!("Normalizing output (peak was {:.2})", max_amplitude);
        for sample in &mut output {
            *sample /= max_amplitude;
        }
    }

    let output_spec = WavSpec {
        channels: 1,
        sample_rate: audio_spec.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(output_path, output_spec)
        .with_context(|| format!("Failed to create {}", output_path))?;

    for &sample in &output {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(sample_i16)?;
    }

    writer.finalize()?;

    println!(
        "\nOutput: {} samples ({:.2}s, tail {} samples)",
        output.len(),
        (output.len() as f32) / (audio_spec.sample_rate as f32),
        tail.len()
    );
    println!("Saved: {}", output_path);

    Ok(())
}
