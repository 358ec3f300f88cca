//! Per-segment synthesis and assembly of the combined clip.
//!
//! Segments are synthesized strictly in order, one engine call at a time.
//! Each result is written to `<out>/<index>.wav` as soon as it exists, and
//! once every segment has succeeded the waveforms are concatenated into
//! `<out>/combined.wav`. A failure aborts the request; files already written
//! are left where they are.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    audio::{write_wav, Waveform, SAMPLE_RATE},
    engine::{Preset, SpeechEngine, SynthesisParams, VoiceConditioning},
    error::GenerationError,
    segment::TextSegment,
};

/// File name of the concatenated clip inside the output directory.
pub const COMBINED_FILE: &str = "combined.wav";

/// Engine candidates requested per segment.
const CANDIDATES: usize = 1;

/// Where a generation request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Segmenting,
    Synthesizing { index: usize, total: usize },
    Concatenating,
    Persisted,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Persisted | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("idle"),
            Stage::Segmenting => f.write_str("segmenting"),
            Stage::Synthesizing { index, total } => {
                write!(f, "synthesizing {}/{}", index + 1, total)
            }
            Stage::Concatenating => f.write_str("concatenating"),
            Stage::Persisted => f.write_str("persisted"),
            Stage::Failed => f.write_str("failed"),
        }
    }
}

/// One synthesized segment and the file it was written to.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub index: usize,
    pub waveform: Waveform,
    pub path: PathBuf,
}

/// The final artifact of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAudio {
    pub waveform: Waveform,
    /// `<out>/combined.wav`.
    pub path: PathBuf,
    /// `<out>/0.wav`, `<out>/1.wav`, … in segment order.
    pub segment_paths: Vec<PathBuf>,
}

/// Drives an engine over a segment list.
pub struct AudioAssembler<'a> {
    engine: &'a dyn SpeechEngine,
    preset: Preset,
}

impl<'a> AudioAssembler<'a> {
    pub fn new(engine: &'a dyn SpeechEngine, preset: Preset) -> Self {
        Self { engine, preset }
    }

    pub fn assemble(
        &self,
        segments: &[TextSegment],
        voice: &VoiceConditioning,
        out_dir: &Path,
        seed: u64,
    ) -> Result<CombinedAudio, GenerationError> {
        self.assemble_with_progress(segments, voice, out_dir, seed, &mut |_: Stage| {})
    }

    /// Like [`assemble`](Self::assemble), reporting every stage change to `progress`.
    ///
    /// `progress` sees `Synthesizing` once per segment, then `Concatenating`
    /// and `Persisted`, or `Failed` on the first error.
    pub fn assemble_with_progress(
        &self,
        segments: &[TextSegment],
        voice: &VoiceConditioning,
        out_dir: &Path,
        seed: u64,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<CombinedAudio, GenerationError> {
        let result = self.run(segments, voice, out_dir, seed, progress);
        match &result {
            Ok(combined) => {
                progress(Stage::Persisted);
                tracing::info!(
                    path = %combined.path.display(),
                    segments = combined.segment_paths.len(),
                    seconds = combined.waveform.duration_secs(),
                    "combined audio persisted"
                );
            }
            Err(e) => {
                progress(Stage::Failed);
                tracing::error!(error = %e, "assembly failed");
            }
        }
        result
    }

    fn run(
        &self,
        segments: &[TextSegment],
        voice: &VoiceConditioning,
        out_dir: &Path,
        seed: u64,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<CombinedAudio, GenerationError> {
        voice.validate().map_err(|reason| GenerationError::VoiceUnavailable {
            voice: voice.voice.clone(),
            reason,
        })?;
        if segments.is_empty() {
            return Err(GenerationError::EmptyText);
        }
        let engine_rate = self.engine.sample_rate();
        if engine_rate != SAMPLE_RATE {
            return Err(GenerationError::Audio(format!(
                "engine produces {engine_rate} Hz audio, output must be {SAMPLE_RATE} Hz"
            )));
        }

        std::fs::create_dir_all(out_dir).map_err(|e| GenerationError::io(out_dir, e))?;

        let total = segments.len();
        let mut parts = Vec::with_capacity(total);
        for (index, segment) in segments.iter().enumerate() {
            let stage = Stage::Synthesizing { index, total };
            progress(stage);
            tracing::info!(%stage, "synthesizing segment");
            tracing::debug!(index, text = %segment.text, "segment text");

            let params = SynthesisParams {
                text: &segment.text,
                voice,
                seed,
                preset: self.preset,
                candidates: CANDIDATES,
            };
            let waveform = self
                .engine
                .synthesize(&params)
                .map_err(|e| GenerationError::SynthesisFailed { index, reason: e.to_string() })?;
            if waveform.sample_rate != engine_rate {
                return Err(GenerationError::SynthesisFailed {
                    index,
                    reason: format!(
                        "engine returned {} Hz audio, expected {} Hz",
                        waveform.sample_rate, engine_rate
                    ),
                });
            }

            let path = out_dir.join(format!("{index}.wav"));
            write_wav(&path, &waveform).map_err(|e| wav_error(&path, e))?;
            tracing::info!(
                index,
                path = %path.display(),
                samples = waveform.len(),
                "segment saved"
            );
            parts.push(AudioSegment { index, waveform, path });
        }

        progress(Stage::Concatenating);
        tracing::info!(stage = %Stage::Concatenating, parts = parts.len(), "joining segments");
        let waveform = Waveform::concat(parts.iter().map(|p| &p.waveform))?;
        let path = out_dir.join(COMBINED_FILE);
        write_wav(&path, &waveform).map_err(|e| wav_error(&path, e))?;

        Ok(CombinedAudio {
            waveform,
            path,
            segment_paths: parts.into_iter().map(|p| p.path).collect(),
        })
    }
}

fn wav_error(path: &Path, err: hound::Error) -> GenerationError {
    match err {
        hound::Error::IoError(source) => GenerationError::io(path, source),
        other => GenerationError::Audio(format!("{}: {}", path.display(), other)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
