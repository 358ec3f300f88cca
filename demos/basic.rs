//! Basic long-form example: split text, synthesize it with an external
//! engine and write `results/longform/<voice>/combined.wav`.
//!
//! Usage:
//!   cargo run --example basic -- --voice martin --text "Hello there|General Kenobi" \
//!       -- python3 synth.py --voice-dir {voice_dir} --seed {seed} --out {output}
//!
//! Requirements:
//!   - `voices/<voice>/` holding the voice's reference WAV clips
//!   - an engine program that writes a 24 kHz WAV to `{output}`

use std::sync::Arc;

use longform_tts::{
    CommandEngine, Config, GenerationRequest, Generator, Stage, VoiceSource, VoiceStore,
};

fn main() -> anyhow::Result<()> {
    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1);

    let mut voice = "martin".to_string();
    let mut text = "Hello there|General Kenobi".to_string();
    let mut seed: Option<u64> = None;
    let mut engine: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--voice" => { if let Some(v) = args.next() { voice = v; } }
            "--text"  => { if let Some(v) = args.next() { text  = v; } }
            "--seed"  => { if let Some(v) = args.next() { seed  = v.parse().ok(); } }
            "--" => { engine = args.by_ref().collect(); }
            "--help" => {
                println!("Usage: basic [--voice NAME] [--text TEXT] [--seed N] -- PROGRAM [ARGS…]");
                return Ok(());
            }
            other => eprintln!("Unknown argument: {other}"),
        }
    }

    if engine.is_empty() {
        anyhow::bail!("pass the engine command after `--`");
    }
    let program = engine.remove(0);

    // ── Wire the pipeline ────────────────────────────────────────────────────
    let config = Config::default();
    let generator = Generator::new(Arc::new(CommandEngine::new(program, engine)), &config);

    let voices = VoiceStore::new(&config.voices_dir, config.reference_clips);
    println!("Available voices: {:?}", voices.list()?);
    let profile = voices.resolve(&voice)?;

    let mut request = GenerationRequest::new(profile, text)?;
    if let Some(seed) = seed {
        request = request.with_seed(seed);
    }

    for segment in generator.segmenter().split(&request.text)? {
        println!("  [{}] {}", segment.index, segment.text);
    }

    // ── Generate ─────────────────────────────────────────────────────────────
    let t0 = std::time::Instant::now();
    let combined =
        generator.generate_with_progress(&request, &mut |stage: Stage| println!("{stage}"))?;

    println!(
        "Saved {} ({:.2}s of audio, {} segments) in {:.2}s",
        combined.path.display(),
        combined.waveform.duration_secs(),
        combined.segment_paths.len(),
        t0.elapsed().as_secs_f32()
    );
    Ok(())
}
