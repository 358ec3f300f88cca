//! One generation request, start to finish.
//!
//! A [`GenerationRequest`] carries everything a run needs (voice, text,
//! seed) and is built fresh for every request. [`Generator`] holds what is
//! shared across requests: the engine, the segmenter and the output layout.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    assemble::{AudioAssembler, CombinedAudio, Stage},
    config::{output_dir, Config},
    engine::{Preset, SpeechEngine, VoiceConditioning},
    error::GenerationError,
    segment::{Segmenter, TextSegment},
    voice::VoiceProfile,
};

/// Seconds since the Unix epoch, the default seed of a request.
pub fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The transient unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub voice: VoiceProfile,
    pub text: String,
    pub seed: u64,
}

impl GenerationRequest {
    /// Build a request seeded from the wall clock.
    ///
    /// Blank text is rejected here, before anything downstream runs.
    pub fn new(voice: VoiceProfile, text: impl Into<String>) -> Result<Self, GenerationError> {
        let text = text.into();
        if text.trim().is_empty() {
            tracing::warn!(voice = %voice.name, "rejected blank input text");
            return Err(GenerationError::EmptyText);
        }
        Ok(Self { voice, text, seed: wall_clock_seed() })
    }

    /// Replace the wall-clock seed, e.g. to reproduce an earlier run.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Shared, per-process generation driver.
pub struct Generator {
    engine: Arc<dyn SpeechEngine>,
    segmenter: Segmenter,
    results_root: PathBuf,
    preset: Preset,
    /// Reference clips a voice needs before it is handed to the engine.
    reference_clips: usize,
}

impl Generator {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: &Config) -> Self {
        Self {
            engine,
            segmenter: Segmenter::new(config.segmenter.clone()),
            results_root: config.results_root.clone(),
            preset: config.preset,
            reference_clips: config.reference_clips,
        }
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Where output for `voice` is written.
    pub fn output_dir(&self, voice: &str) -> PathBuf {
        output_dir(&self.results_root, voice)
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<CombinedAudio, GenerationError> {
        self.generate_with_progress(request, &mut |_: Stage| {})
    }

    /// Segment, check and load the voice, then synthesize and assemble.
    ///
    /// `progress` sees `Idle` first. The voice is checked and loaded before
    /// the output directory is touched, so an unusable voice leaves no trace
    /// on disk.
    pub fn generate_with_progress(
        &self,
        request: &GenerationRequest,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<CombinedAudio, GenerationError> {
        let span =
            tracing::info_span!("generate", voice = %request.voice.name, seed = request.seed);
        let _guard = span.enter();

        progress(Stage::Idle);
        let (segments, conditioning) = match self.prepare(request, progress) {
            Ok(prepared) => prepared,
            Err(e) => {
                progress(Stage::Failed);
                tracing::error!(error = %e, "generation failed");
                return Err(e);
            }
        };

        let out_dir = self.output_dir(&request.voice.name);
        AudioAssembler::new(self.engine.as_ref(), self.preset).assemble_with_progress(
            &segments,
            &conditioning,
            &out_dir,
            request.seed,
            progress,
        )
    }

    fn prepare(
        &self,
        request: &GenerationRequest,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<(Vec<TextSegment>, VoiceConditioning), GenerationError> {
        progress(Stage::Segmenting);
        let segments = self.segmenter.split(&request.text)?;
        tracing::info!(
            segments = segments.len(),
            policy = ?self.segmenter.policy_for(&request.text),
            "text segmented"
        );

        let unavailable = |reason: String| GenerationError::VoiceUnavailable {
            voice: request.voice.name.clone(),
            reason,
        };
        request
            .voice
            .check(self.reference_clips)
            .map_err(|e| unavailable(e.to_string()))?;
        let conditioning = self
            .engine
            .load_voice(&request.voice)
            .map_err(|e| unavailable(e.to_string()))?;
        tracing::info!(clips = conditioning.references.len(), "voice loaded");

        Ok((segments, conditioning))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
