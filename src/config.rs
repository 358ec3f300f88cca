//! Process-wide settings, read from a JSON file.
//!
//! Every field has a default so an empty object (`{}`) is a valid config.
//!
//! ```json
//! {
//!   "results_root": "results",
//!   "voices_dir": "voices",
//!   "preset": "fast",
//!   "segmenter": { "desired_length": 200, "max_length": 300 },
//!   "engine": { "program": "python3", "args": ["synth.py", "--voice-dir", "{voice_dir}", "--out", "{output}"] }
//! }
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{engine::Preset, error::ConfigError, segment::SegmenterConfig};

/// Sub-directory of `results_root` that long-form output lands in.
pub const LONGFORM_DIR: &str = "longform";

/// Deserialised config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root under which `longform/<voice>/` output directories are created.
    pub results_root: PathBuf,

    /// Directory scanned for voices; each sub-directory is one voice.
    pub voices_dir: PathBuf,

    /// Quality preset passed on every synthesis call.
    pub preset: Preset,

    /// Number of reference clips a voice must have.
    pub reference_clips: usize,

    pub segmenter: SegmenterConfig,

    /// Optional fixed name → directory map, used instead of scanning `voices_dir`.
    pub fixed_voices: BTreeMap<String, PathBuf>,

    pub engine: EngineConfig,
}

/// External synthesis program, see [`CommandEngine`](crate::engine::CommandEngine).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results_root: PathBuf::from("results"),
            voices_dir: PathBuf::from("voices"),
            preset: Preset::Fast,
            reference_clips: 2,
            segmenter: SegmenterConfig::default(),
            fixed_voices: BTreeMap::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Config = serde_json::from_slice(&bytes)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmenter;
        if seg.desired_length == 0 {
            return Err(ConfigError::Invalid("segmenter.desired_length must be positive".into()));
        }
        if seg.max_length < seg.desired_length {
            return Err(ConfigError::Invalid(format!(
                "segmenter.max_length ({}) is below desired_length ({})",
                seg.max_length, seg.desired_length
            )));
        }
        if seg.separator.is_whitespace() {
            return Err(ConfigError::Invalid("segmenter.separator cannot be whitespace".into()));
        }
        if self.reference_clips == 0 {
            return Err(ConfigError::Invalid("reference_clips must be positive".into()));
        }
        Ok(())
    }

    /// Output directory for `voice`: `<results_root>/longform/<voice with _ for spaces>`.
    pub fn output_dir(&self, voice: &str) -> PathBuf {
        output_dir(&self.results_root, voice)
    }
}

/// `<results_root>/longform/<voice name with spaces replaced by underscores>`.
pub fn output_dir(results_root: &Path, voice: &str) -> PathBuf {
    results_root.join(LONGFORM_DIR).join(voice.replace(' ', "_"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
