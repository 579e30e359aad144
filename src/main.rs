use anyhow::{Context, Result};
use clap::Parser;
use latgen::audio::WavAudio;
use latgen::cli::{Cli, Utterance};
use latgen::config::{Config, ResourcePaths};
use latgen::defaults;
use latgen::{LatgenError, Recognizer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version exit 0
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprint!("{}", err);
            std::process::exit(latgen::error::EXIT_CONFIG);
        }
    };

    init_logging(&cli);

    if let Err(err) = run(&cli) {
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<LatgenError>()
            .map_or(latgen::error::EXIT_SETUP, LatgenError::exit_code);
        std::process::exit(code);
    }
}

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else if let Some(default_path) = Config::default_path() {
        Config::load_or_default(&default_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    let paths = ResourcePaths::from_args(&cli.positional_args())?;
    let utterances = cli.utterances()?;

    let started = Instant::now();
    let mut recognizer = Recognizer::setup(&config, &paths)?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "Setup complete");

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let (mut decoded, mut failed) = (0usize, 0usize);
    for utterance in &utterances {
        match decode_utterance(&mut recognizer, utterance, &config, cli.batch_samples) {
            Ok(words) => {
                writeln!(out, "{} {}", utterance.name, words.join(" "))?;
                decoded += 1;
            }
            Err(err) => {
                warn!(utterance = %utterance.name, "Skipping: {:#}", err);
                failed += 1;
            }
        }
        recognizer.reset(false);
    }
    out.flush()?;

    info!(
        decoded,
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(())
}

/// Stream one file through the recognizer as a live source would deliver it.
fn decode_utterance(
    recognizer: &mut Recognizer,
    utterance: &Utterance,
    config: &Config,
    batch_samples: usize,
) -> Result<Vec<String>> {
    let audio = WavAudio::open(&utterance.path, config.audio.sample_rate)
        .with_context(|| format!("reading {}", utterance.path.display()))?;

    for chunk in audio.pcm_chunks(batch_samples) {
        recognizer.feed_audio(&chunk);
        while recognizer.decode(defaults::DECODE_BATCH_FRAMES) > 0 {}
    }
    recognizer.input_finished();
    while recognizer.decode(defaults::DECODE_BATCH_FRAMES) > 0 {}
    recognizer.prune_final();

    let Some(best) = recognizer.best_path() else {
        warn!(utterance = %utterance.name, "No surviving path; emitting empty hypothesis");
        return Ok(Vec::new());
    };
    debug!(
        utterance = %utterance.name,
        frames = best.num_frames,
        graph_cost = best.weight.graph,
        acoustic_cost = best.weight.acoustic,
        trailing_silence = recognizer.trailing_silence_frames(&best),
        "Best path"
    );
    Ok(recognizer.words(&best))
}
