//! I/Q capture files: raw interleaved `f32` pairs and two-channel WAV.

use std::fs;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rustfft::num_complex::Complex;

use crate::error::LoraError;

/// Read a raw capture of interleaved little-endian f32 I/Q pairs.
pub fn read_cf32<P: AsRef<Path>>(path: P) -> Result<Vec<Complex<f32>>, LoraError> {
    let bytes = fs::read(path).map_err(|e| LoraError::Capture(format!("read error: {}", e)))?;
    if bytes.len() % 8 != 0 {
        return Err(LoraError::Capture(format!(
            "raw capture length {} is not a whole number of I/Q pairs",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(8)
        .map(|pair| {
            let re = f32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
            let im = f32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
            Complex::new(re, im)
        })
        .collect())
}

/// Write samples as interleaved little-endian f32 I/Q pairs.
pub fn write_cf32<P: AsRef<Path>>(path: P, samples: &[Complex<f32>]) -> Result<(), LoraError> {
    let mut bytes = Vec::with_capacity(samples.len() * 8);
    for s in samples {
        bytes.extend_from_slice(&s.re.to_le_bytes());
        bytes.extend_from_slice(&s.im.to_le_bytes());
    }
    fs::write(path, bytes).map_err(|e| LoraError::Capture(format!("write error: {}", e)))
}

/// Read a two-channel WAV capture (I = channel 0, Q = channel 1).
/// Returns (samples, sample_rate).
pub fn read_iq_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<Complex<f32>>, u32), LoraError> {
    let reader =
        WavReader::open(path).map_err(|e| LoraError::Capture(format!("WAV read error: {}", e)))?;

    let spec = reader.spec();
    if spec.channels != 2 {
        return Err(LoraError::Capture(format!(
            "I/Q capture needs 2 channels, file has {}",
            spec.channels
        )));
    }
    let sample_rate = spec.sample_rate;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(|e| LoraError::Capture(format!("WAV sample error: {}", e))))
            .collect::<Result<Vec<f32>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 / max_val)
                        .map_err(|e| LoraError::Capture(format!("WAV sample error: {}", e)))
                })
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    let samples = interleaved
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect();

    Ok((samples, sample_rate))
}

/// Write samples as a two-channel float WAV capture.
pub fn write_iq_wav<P: AsRef<Path>>(
    path: P,
    samples: &[Complex<f32>],
    sample_rate: u32,
) -> Result<(), LoraError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| LoraError::Capture(format!("WAV write error: {}", e)))?;

    for s in samples {
        writer
            .write_sample(s.re)
            .and_then(|_| writer.write_sample(s.im))
            .map_err(|e| LoraError::Capture(format!("WAV sample write error: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| LoraError::Capture(format!("WAV finalize error: {}", e)))
}

/// Read a capture by extension: `.wav` as two-channel WAV, anything else
/// as raw f32 I/Q. The sample rate of a raw capture comes from the
/// caller.
pub fn read_capture<P: AsRef<Path>>(
    path: P,
    raw_sample_rate: f32,
) -> Result<(Vec<Complex<f32>>, f32), LoraError> {
    let is_wav = path
        .as_ref()
        .extension()
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        let (samples, rate) = read_iq_wav(path)?;
        Ok((samples, rate as f32))
    } else {
        Ok((read_cf32(path)?, raw_sample_rate))
    }
}
