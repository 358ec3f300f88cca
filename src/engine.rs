//! The seam to the external speech engine.
//!
//! Voice conditioning and waveform generation happen outside this crate.
//! [`SpeechEngine`] is the contract the assembler drives; [`CommandEngine`]
//! is a ready-made implementation that runs any synthesis program as a
//! subprocess, once per segment.
//!
//! Engines are expensive to build. Construct one per process and share it
//! behind an `Arc`.

use std::{
    fmt,
    io::{ErrorKind, Write},
    path::PathBuf,
    process::{Command, Stdio},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    audio::{read_wav, Waveform, SAMPLE_RATE},
    error::EngineError,
    voice::VoiceProfile,
};

/// Engine quality/speed trade-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    UltraFast,
    #[default]
    Fast,
    Standard,
    HighQuality,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Preset::UltraFast => "ultra_fast",
            Preset::Fast => "fast",
            Preset::Standard => "standard",
            Preset::HighQuality => "high_quality",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "ultra_fast" => Ok(Preset::UltraFast),
            "fast" => Ok(Preset::Fast),
            "standard" => Ok(Preset::Standard),
            "high_quality" => Ok(Preset::HighQuality),
            other => Err(format!(
                "unknown preset '{other}' (expected ultra_fast, fast, standard or high_quality)"
            )),
        }
    }
}

/// What an engine needs to speak in a given voice.
///
/// Opaque to the assembler beyond [`validate`](Self::validate).
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConditioning {
    pub voice: String,
    /// Directory the reference clips were read from.
    pub dir: PathBuf,
    pub references: Vec<Waveform>,
    /// Precomputed conditioning latents, for engines that produce them.
    pub latents: Option<Vec<f32>>,
}

impl VoiceConditioning {
    /// Reject conditioning data no engine could use.
    pub fn validate(&self) -> Result<(), String> {
        if self.references.is_empty() {
            return Err("no reference clips".into());
        }
        if let Some(i) = self.references.iter().position(|r| r.is_empty() || r.sample_rate == 0) {
            return Err(format!("reference clip {i} is empty"));
        }
        if let Some(latents) = &self.latents {
            if latents.is_empty() || latents.iter().any(|v| !v.is_finite()) {
                return Err("conditioning latents are empty or not finite".into());
            }
        }
        Ok(())
    }
}

/// Arguments of one synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisParams<'a> {
    pub text: &'a str,
    pub voice: &'a VoiceConditioning,
    pub seed: u64,
    pub preset: Preset,
    /// Candidates the engine should generate; the first is returned.
    pub candidates: usize,
}

/// A blocking text-to-speech engine with voice cloning.
pub trait SpeechEngine: Send + Sync {
    /// Rate of every waveform [`synthesize`](Self::synthesize) returns.
    ///
    /// The assembler refuses engines whose rate is not [`SAMPLE_RATE`].
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Turn a voice's reference clips into conditioning data.
    fn load_voice(&self, profile: &VoiceProfile) -> Result<VoiceConditioning, EngineError> {
        load_reference_voice(profile)
    }

    /// Speak `params.text`. Must be deterministic for a fixed seed.
    fn synthesize(&self, params: &SynthesisParams<'_>) -> Result<Waveform, EngineError>;
}

/// Read every reference clip of `profile` into a [`VoiceConditioning`]
/// without latents.
pub fn load_reference_voice(profile: &VoiceProfile) -> Result<VoiceConditioning, EngineError> {
    let files = profile
        .reference_files()
        .map_err(|e| EngineError::Voice(e.to_string()))?;
    if files.is_empty() {
        return Err(EngineError::Voice(format!(
            "no reference clips in {}",
            profile.dir.display()
        )));
    }

    let references = files
        .iter()
        .map(|path| {
            read_wav(path)
                .map_err(|e| EngineError::Voice(format!("cannot read {}: {}", path.display(), e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(voice = %profile.name, clips = references.len(), "reference clips loaded");
    Ok(VoiceConditioning {
        voice: profile.name.clone(),
        dir: profile.dir.clone(),
        references,
        latents: None,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// CommandEngine
// ─────────────────────────────────────────────────────────────────────────────

/// Runs an external synthesis program once per segment.
///
/// The segment text is written to the program's stdin. These placeholders
/// are substituted inside every argument:
///
/// | Placeholder    | Value                                   |
/// |----------------|-----------------------------------------|
/// | `{text}`       | segment text                            |
/// | `{voice}`      | voice name                              |
/// | `{voice_dir}`  | directory holding the reference clips   |
/// | `{seed}`       | deterministic seed                      |
/// | `{preset}`     | `ultra_fast`, `fast`, …                 |
/// | `{candidates}` | sample count                            |
/// | `{output}`     | WAV path the program must write         |
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    fn expand_args(&self, params: &SynthesisParams<'_>, output: &str) -> Vec<String> {
        let voice_dir = params.voice.dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                // {text} goes last so placeholders inside user text stay literal.
                arg.replace("{voice_dir}", &voice_dir)
                    .replace("{voice}", &params.voice.voice)
                    .replace("{seed}", &params.seed.to_string())
                    .replace("{preset}", params.preset.as_str())
                    .replace("{candidates}", &params.candidates.to_string())
                    .replace("{output}", output)
                    .replace("{text}", params.text)
            })
            .collect()
    }
}

impl SpeechEngine for CommandEngine {
    fn synthesize(&self, params: &SynthesisParams<'_>) -> Result<Waveform, EngineError> {
        let scratch = tempfile::Builder::new()
            .prefix("longform-segment-")
            .suffix(".wav")
            .tempfile()?;
        let output = scratch.path().to_string_lossy().into_owned();
        let args = self.expand_args(params, &output);

        tracing::debug!(program = %self.program, ?args, "spawning engine");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Synthesis(format!("failed to launch '{}': {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Programs that take the text as an argument may never read stdin.
            match stdin.write_all(params.text.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }

        let result = child.wait_with_output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(EngineError::Synthesis(format!(
                "'{}' exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        let wave = read_wav(scratch.path())?;
        if wave.is_empty() {
            return Err(EngineError::Synthesis(format!("'{}' wrote no audio", self.program)));
        }
        Ok(wave)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
