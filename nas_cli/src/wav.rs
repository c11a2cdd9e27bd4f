//! WAV source reading.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use nas_core::{SampleBuffer, SampleMatrix};

/// Element type requested from the WAV reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dtype {
    /// Normalised to [-1, 1); narrowed to float32 by the encoder
    Float64,
    /// Normalised to [-1, 1)
    Float32,
    /// Full-scale 32-bit PCM
    Int32,
    /// Full-scale 16-bit PCM
    Int16,
}

enum Pcm {
    Int { samples: Vec<i32>, bits: u32 },
    Float(Vec<f32>),
}

/// Read a WAV file into an interleaved sample matrix plus its sample rate.
pub fn read_wav(path: &Path, dtype: Dtype) -> Result<(SampleMatrix, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("failed to load WAV: {:?}", path))?;
    let spec = reader.spec();

    let pcm = match spec.sample_format {
        hound::SampleFormat::Int => Pcm::Int {
            samples: reader
                .samples::<i32>()
                .collect::<Result<_, _>>()
                .with_context(|| format!("reading samples from {:?}", path))?,
            bits: spec.bits_per_sample as u32,
        },
        hound::SampleFormat::Float => Pcm::Float(
            reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .with_context(|| format!("reading samples from {:?}", path))?,
        ),
    };

    tracing::debug!(
        "read {:?}: {} channels, {} Hz, {} bits",
        path,
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample
    );

    let matrix = SampleMatrix::from_buffer(spec.channels as usize, convert(pcm, dtype))?;
    Ok((matrix, spec.sample_rate))
}

fn convert(pcm: Pcm, dtype: Dtype) -> SampleBuffer {
    match pcm {
        Pcm::Int { samples, bits } => {
            let scale = (1u64 << (bits - 1)) as f64;
            match dtype {
                Dtype::Float64 => {
                    SampleBuffer::F64(samples.into_iter().map(|s| s as f64 / scale).collect())
                }
                Dtype::Float32 => SampleBuffer::F32(
                    samples.into_iter().map(|s| (s as f64 / scale) as f32).collect(),
                ),
                Dtype::Int32 => SampleBuffer::I32(
                    samples
                        .into_iter()
                        .map(|s| ((s as i64) << (32 - bits)) as i32)
                        .collect(),
                ),
                Dtype::Int16 => SampleBuffer::I16(
                    samples
                        .into_iter()
                        .map(|s| {
                            if bits <= 16 {
                                (s << (16 - bits)) as i16
                            } else {
                                (s >> (bits - 16)) as i16
                            }
                        })
                        .collect(),
                ),
            }
        }
        Pcm::Float(samples) => match dtype {
            Dtype::Float64 => SampleBuffer::F64(samples.into_iter().map(f64::from).collect()),
            Dtype::Float32 => SampleBuffer::F32(samples),
            Dtype::Int32 => SampleBuffer::I32(
                samples
                    .into_iter()
                    .map(|x| (f64::from(x).clamp(-1.0, 1.0) * i32::MAX as f64).round() as i32)
                    .collect(),
            ),
            Dtype::Int16 => SampleBuffer::I16(
                samples
                    .into_iter()
                    .map(|x| (x.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
                    .collect(),
            ),
        },
    }
}
