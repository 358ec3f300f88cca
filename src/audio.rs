//! Mono waveforms and the WAV files they are persisted as.
//!
//! Everything the assembler writes is 16-bit PCM mono at [`SAMPLE_RATE`].
//! Reading is more lenient: any PCM or float WAV is accepted and downmixed,
//! since reference clips come from users.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::GenerationError;

/// Sample rate of every waveform the engine produces and the assembler writes.
pub const SAMPLE_RATE: u32 = 24_000;

/// A mono waveform: `f32` samples in `[-1.0, 1.0]` at `sample_rate` Hz.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Concatenate `parts` along the time axis, first part first.
    ///
    /// All parts must share one sample rate.
    pub fn concat<'a>(
        parts: impl IntoIterator<Item = &'a Waveform>,
    ) -> Result<Waveform, GenerationError> {
        let parts: Vec<&Waveform> = parts.into_iter().collect();
        let Some(first) = parts.first() else {
            return Err(GenerationError::Audio("no waveforms to concatenate".into()));
        };
        let sample_rate = first.sample_rate;
        if let Some((i, odd)) =
            parts.iter().enumerate().find(|(_, p)| p.sample_rate != sample_rate)
        {
            return Err(GenerationError::Audio(format!(
                "part {} has sample rate {} Hz, expected {} Hz",
                i, odd.sample_rate, sample_rate
            )));
        }

        let total = parts.iter().map(|p| p.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for part in parts {
            samples.extend_from_slice(&part.samples);
        }
        Ok(Waveform { samples, sample_rate })
    }
}

/// Write `wave` as a 16-bit PCM mono WAV file.
///
/// Samples outside `[-1.0, 1.0]` are clamped.
pub fn write_wav(path: &Path, wave: &Waveform) -> hound::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: wave.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in &wave.samples {
        let s16 = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(s16)?;
    }
    writer.finalize()
}

/// Read any PCM or float WAV file, averaging channels down to mono.
pub fn read_wav(path: &Path) -> hound::Result<Waveform> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<hound::Result<_>>()?,
        SampleFormat::Int => {
            let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<hound::Result<_>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(Waveform { samples, sample_rate: spec.sample_rate })
}

/// Header facts about a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Frames per channel.
    pub frames: u32,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f32 / self.sample_rate as f32
    }
}

/// Inspect a WAV file without decoding its samples.
pub fn wav_info(path: &Path) -> hound::Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn wave(samples: &[f32]) -> Waveform {
        Waveform::new(samples.to_vec(), SAMPLE_RATE)
    }

    #[test]
    fn concat_preserves_order() {
        let a = wave(&[0.1, 0.2]);
        let b = wave(&[0.3]);
        let c = wave(&[0.4, 0.5]);
        let ab_c = Waveform::concat(&[a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(ab_c.samples, vec![0.1, 0.2, 0.3, 0.4, 0.5]);

        let swapped = Waveform::concat(&[c, b, a]).unwrap();
        assert_eq!(swapped.samples, vec![0.4, 0.5, 0.3, 0.1, 0.2]);
    }

    #[test]
    fn concat_single_part_is_identity() {
        let a = wave(&[0.25, -0.25, 0.5]);
        assert_eq!(Waveform::concat(std::slice::from_ref(&a)).unwrap(), a);
    }

    #[test]
    fn concat_rejects_mixed_rates() {
        let a = wave(&[0.1]);
        let b = Waveform::new(vec![0.2], 16_000);
        assert!(matches!(Waveform::concat(&[a, b]), Err(GenerationError::Audio(_))));
    }

    #[test]
    fn concat_rejects_empty_input() {
        assert!(Waveform::concat(Vec::<&Waveform>::new()).is_err());
    }

    #[test]
    fn written_file_is_pcm16_mono_at_model_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &wave(&[0.0; 2400])).unwrap();

        let info = wav_info(&path).unwrap();
        assert_eq!(info.sample_rate, 24_000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.frames, 2400);
        assert!((info.duration_secs() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn write_clamps_out_of_range_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loud.wav");
        write_wav(&path, &wave(&[2.0, -2.0])).unwrap();
        let back = read_wav(&path).unwrap();
        assert!((back.samples[0] - 1.0).abs() < 1e-3);
        assert!((back.samples[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn read_downmixes_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut w = WavWriter::create(&path, spec).unwrap();
        for s in [0.5f32, -0.5, 1.0, 0.0] {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();

        let back = read_wav(&path).unwrap();
        assert_eq!(back.sample_rate, 22_050);
        assert_eq!(back.samples, vec![0.0, 0.5]);
    }
}
