//! `longform-tts`: long-form voice-cloning text-to-speech from the shell.
//!
//! ```bash
//! # Voices under ./voices
//! longform-tts voices
//!
//! # Store a voice from two reference clips
//! longform-tts add-voice martin a.wav b.wav
//!
//! # Preview how text will be cut
//! longform-tts segment --text "Hello there|General Kenobi"
//!
//! # Generate; everything after `--` is the engine command line
//! longform-tts generate --voice martin --text "Hello there|General Kenobi" \
//!     -- python3 synth.py --voice-dir {voice_dir} --seed {seed} --out {output}
//!
//! # Inspect WAV files
//! longform-tts info results/longform/martin/combined.wav
//! ```
//!
//! Logging honours `RUST_LOG` (default `info`).

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use longform_tts::{
    audio::wav_info,
    voice::source_from_config,
    CommandEngine, Config, GenerationRequest, Generator, Preset, Segmenter, Stage, VoiceStore,
};

#[derive(Debug, Parser)]
#[command(name = "longform-tts", version, about = "Long-form voice-cloning text-to-speech")]
struct Cli {
    /// JSON config file; flags given on the command line win.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available voices.
    Voices {
        #[arg(long)]
        voices_dir: Option<PathBuf>,
    },

    /// Store a new voice from its reference clips.
    AddVoice {
        name: String,
        /// WAV reference clips, in order.
        #[arg(required = true)]
        clips: Vec<PathBuf>,
        #[arg(long)]
        voices_dir: Option<PathBuf>,
    },

    /// Synthesize text in a voice and write the combined clip.
    Generate {
        #[arg(long)]
        voice: String,
        #[command(flatten)]
        input: TextInput,
        /// Fixed seed; defaults to the current Unix time.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        preset: Option<Preset>,
        #[arg(long)]
        results_root: Option<PathBuf>,
        #[arg(long)]
        voices_dir: Option<PathBuf>,
        /// Engine program and its arguments (placeholders like `{output}` are expanded).
        #[arg(last = true)]
        engine: Vec<String>,
    },

    /// Print the segments text would be cut into.
    Segment {
        #[command(flatten)]
        input: TextInput,
    },

    /// Print sample rate, channels and duration of WAV files.
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct TextInput {
    #[arg(long)]
    text: Option<String>,
    /// Read the text from a file.
    #[arg(long)]
    file: Option<PathBuf>,
}

impl TextInput {
    fn read(&self) -> Result<String> {
        match (&self.text, &self.file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            (None, None) => bail!("either --text or --file is required"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Voices { voices_dir } => {
            if let Some(dir) = voices_dir {
                config.voices_dir = dir;
            }
            let voices = source_from_config(&config).list()?;
            if voices.is_empty() {
                eprintln!("no voices found in {}", config.voices_dir.display());
            }
            for name in voices {
                println!("{name}");
            }
        }

        Command::AddVoice { name, clips, voices_dir } => {
            if let Some(dir) = voices_dir {
                config.voices_dir = dir;
            }
            let bytes = clips
                .iter()
                .map(|p| {
                    std::fs::read(p).with_context(|| format!("Failed to read {}", p.display()))
                })
                .collect::<Result<Vec<_>>>()?;
            let store = VoiceStore::new(&config.voices_dir, config.reference_clips);
            let profile = store.add_voice(&name, &bytes)?;
            println!("stored voice '{}' in {}", profile.name, profile.dir.display());
        }

        Command::Generate { voice, input, seed, preset, results_root, voices_dir, engine } => {
            if let Some(root) = results_root {
                config.results_root = root;
            }
            if let Some(dir) = voices_dir {
                config.voices_dir = dir;
            }
            if let Some(preset) = preset {
                config.preset = preset;
            }
            let engine = build_engine(&config, engine)?;
            let text = input.read()?;

            let profile = source_from_config(&config).resolve(&voice)?;
            let mut request = GenerationRequest::new(profile, text)?;
            if let Some(seed) = seed {
                request = request.with_seed(seed);
            }

            let generator = Generator::new(Arc::new(engine), &config);
            let combined = generator
                .generate_with_progress(&request, &mut |stage: Stage| eprintln!("[{stage}]"))
                .with_context(|| format!("Generation for voice '{voice}' failed"))?;

            for path in &combined.segment_paths {
                println!("{}", path.display());
            }
            println!(
                "{} ({:.2}s, seed {})",
                combined.path.display(),
                combined.waveform.duration_secs(),
                request.seed
            );
        }

        Command::Segment { input } => {
            config.validate()?;
            let text = input.read()?;
            let segmenter = Segmenter::new(config.segmenter.clone());
            eprintln!("policy: {:?}", segmenter.policy_for(&text));
            for segment in segmenter.split(&text)? {
                println!("{}\t{}", segment.index, segment.text);
            }
        }

        Command::Info { files } => {
            for path in &files {
                print_info(path)?;
            }
        }
    }

    Ok(())
}

/// The engine from trailing arguments, falling back to the config file.
fn build_engine(config: &Config, mut command: Vec<String>) -> Result<CommandEngine> {
    if !command.is_empty() {
        let program = command.remove(0);
        return Ok(CommandEngine::new(program, command));
    }
    match &config.engine.program {
        Some(program) => Ok(CommandEngine::new(program.clone(), config.engine.args.clone())),
        None => bail!(
            "no engine given: pass `-- <program> [args…]` or set engine.program in the config"
        ),
    }
}

fn print_info(path: &Path) -> Result<()> {
    let info = wav_info(path).with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{}", path.display());
    println!("  sample rate: {} Hz", info.sample_rate);
    println!("  channels:    {}", info.channels);
    println!("  bits:        {}", info.bits_per_sample);
    println!("  duration:    {:.2}s", info.duration_secs());
    Ok(())
}
