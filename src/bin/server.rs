//! `longform-tts-server`: HTTP front end for long-form generation.
//!
//! ```bash
//! longform-tts-server --bind 0.0.0.0:8080 --config longform.json
//! longform-tts-server -- python3 synth.py --voice-dir {voice_dir} --out {output}
//! ```
//!
//! See [`longform_tts::server`] for the routes.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;

use longform_tts::{
    server::{serve, AppState},
    CommandEngine, Config, Generator,
};

#[derive(Debug, Parser)]
#[command(name = "longform-tts-server", version, about = "Long-form TTS over HTTP")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine program and its arguments; overrides `engine` in the config.
    #[arg(last = true)]
    engine: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let mut args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let engine = if args.engine.is_empty() {
        match &config.engine.program {
            Some(program) => CommandEngine::new(program.clone(), config.engine.args.clone()),
            None => bail!(
                "no engine given: pass `-- <program> [args…]` or set engine.program in the config"
            ),
        }
    } else {
        let program = args.engine.remove(0);
        CommandEngine::new(program, args.engine)
    };

    tracing::info!(
        results_root = %config.results_root.display(),
        voices_dir = %config.voices_dir.display(),
        preset = %config.preset,
        "starting"
    );

    let generator = Generator::new(Arc::new(engine), &config);
    let state = Arc::new(AppState::new(generator, &config));
    serve(args.bind, state)
        .await
        .with_context(|| format!("Server on {} failed", args.bind))
}
