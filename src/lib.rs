//! # longform-tts
//!
//! Long-form voice-cloning text-to-speech driver. The speech model lives
//! outside this crate behind [`SpeechEngine`]; this crate picks the voice,
//! cuts the text into engine-sized segments, runs the engine once per
//! segment and stitches the results into one clip.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use longform_tts::{CommandEngine, Config, GenerationRequest, Generator, VoiceSource, VoiceStore};
//!
//! let config = Config::default();
//! let engine = CommandEngine::new(
//!     "python3",
//!     vec!["synth.py".into(), "--voice-dir".into(), "{voice_dir}".into(), "--out".into(), "{output}".into()],
//! );
//! let generator = Generator::new(Arc::new(engine), &config);
//!
//! let voices = VoiceStore::new(&config.voices_dir, config.reference_clips);
//! let voice = voices.resolve("martin").unwrap();
//!
//! // `|` marks explicit segment boundaries.
//! let request = GenerationRequest::new(voice, "Hello there|General Kenobi").unwrap();
//! let combined = generator.generate(&request).unwrap();
//! println!("wrote {}", combined.path.display());
//! ```
//!
//! ## Pipeline
//! 1. **Validation**: blank text is rejected when the request is built.
//! 2. **Segmentation**: split on `|`, or sentence-aware split-and-recombine.
//! 3. **Voice loading**: the clip count is checked, then the engine turns
//!    reference clips into conditioning.
//! 4. **Synthesis**: one blocking engine call per segment, in order.
//! 5. **Persistence**: `results/longform/<voice>/<i>.wav` per segment.
//! 6. **Concat**: segment waveforms joined in order into `combined.wav`.

pub mod assemble;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod request;
pub mod segment;
pub mod voice;

// HTTP front end, behind the `server` feature.
#[cfg(feature = "server")]
pub mod server;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use assemble::{AudioAssembler, AudioSegment, CombinedAudio, Stage};
pub use audio::{Waveform, SAMPLE_RATE};
pub use config::Config;
pub use engine::{CommandEngine, Preset, SpeechEngine, SynthesisParams, VoiceConditioning};
pub use error::{ConfigError, EngineError, GenerationError, VoiceError};
pub use request::{GenerationRequest, Generator};
pub use segment::{Segmenter, TextSegment};
pub use voice::{FixedVoices, VoiceProfile, VoiceSource, VoiceStore};
