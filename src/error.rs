//! Error types for every stage of a generation request.
//!
//! Each layer has its own enum; [`GenerationError`] is the one callers see at
//! the top of a request and the one the presentation layers turn into a
//! user-visible message.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`SpeechEngine`](crate::engine::SpeechEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Conditioning data for a voice could not be produced.
    #[error("voice could not be loaded: {0}")]
    Voice(String),

    /// The synthesis call itself failed.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine produced unreadable audio: {0}")]
    Wav(#[from] hound::Error),
}

/// Failures while listing, resolving or storing voices.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice '{name}' not found (available: {available:?})")]
    NotFound { name: String, available: Vec<String> },

    #[error("invalid voice name '{0}'")]
    InvalidName(String),

    #[error("voice needs exactly {expected} reference clips, got {actual}")]
    WrongClipCount { expected: usize, actual: usize },

    #[error("reference clip {index} is not a readable WAV file: {reason}")]
    BadClip { index: usize, reason: String },

    #[error("voice I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while loading or validating a [`Config`](crate::config::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The single error type surfaced at the top of a generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("input text is empty")]
    EmptyText,

    #[error("voice '{voice}' is unavailable: {reason}")]
    VoiceUnavailable { voice: String, reason: String },

    #[error("synthesis of segment {index} failed: {reason}")]
    SynthesisFailed { index: usize, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio error: {0}")]
    Audio(String),
}

impl GenerationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

impl From<VoiceError> for GenerationError {
    fn from(err: VoiceError) -> Self {
        let voice = match &err {
            VoiceError::NotFound { name, .. } | VoiceError::InvalidName(name) => name.clone(),
            _ => String::new(),
        };
        Self::VoiceUnavailable { voice, reason: err.to_string() }
    }
}
