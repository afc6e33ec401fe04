use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;

mod api;
mod arranger;
mod compose;
mod config;
mod continuation;
mod error;
mod midi;
mod params;
mod scale;
mod theory;
mod types;

use api::WorkerClient;
use compose::Arrangement;
use config::AppConfig;
use error::ComposeError;
use params::{CompositionParams, CompositionRequest};
use types::{RunMetadata, TrackOutcome};

const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Parser)]
#[command(name = "cadenza", about = "Generate a four-track MIDI arrangement")]
struct Cli {
    /// Path to the JSON parameter document, or "-" for stdin.
    #[arg(long, default_value = "-")]
    params: String,

    /// Output directory for the four .mid files (overrides config).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seed for pattern selection, for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the worker health check before generating.
    #[arg(long)]
    skip_health_check: bool,

    /// Print the built-in scale library and exit.
    #[arg(long)]
    list_scales: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing()?;
    let cli = Cli::parse();

    if cli.list_scales {
        for scale in theory::SCALES {
            println!("{:<20} {:<18} {:?}", scale.name, scale.origin, scale.intervals);
        }
        return Ok(());
    }

    let config = AppConfig::load()?;

    let request = read_request(&cli.params)?;
    let params = request.validate()?;
    let output_dir = cli.output.unwrap_or_else(|| config.output_dir().clone());

    let client = WorkerClient::new(
        config.worker_url(),
        Duration::from_secs(config.request_timeout_secs()),
        config.max_attempts(),
    )?;
    if !cli.skip_health_check {
        client
            .health_check()
            .await
            .with_context(|| format!("continuation worker at {} is unreachable", client.base_url()))?;
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let arrangement = compose::compose(&params, &client, &mut rng).await?;
    let outcomes = write_arrangement(&arrangement, &output_dir)?;
    write_metadata(&output_dir, &params, &arrangement, outcomes)?;

    let failed = arrangement.failed_tracks();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|track| track.label()).collect();
        bail!(
            "wrote {} of 4 tracks to {}; failed: {}",
            arrangement.tracks.len(),
            output_dir.display(),
            names.join(", ")
        );
    }

    info!("wrote 4 tracks to {}", output_dir.display());
    Ok(())
}

fn read_request(source: &str) -> Result<CompositionRequest> {
    let contents = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read parameters from stdin")?;
        buf
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("failed to read parameter file {source}"))?
    };
    serde_json::from_str(&contents).context("failed to parse composition parameters")
}

fn write_arrangement(arrangement: &Arrangement, output_dir: &Path) -> Result<Vec<TrackOutcome>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let mut outcomes = Vec::new();
    for (kind, sequence) in &arrangement.tracks {
        let path = output_dir.join(kind.file_name());
        midi::write_track(sequence, &path)
            .map_err(|cause| ComposeError::Io { track: *kind, cause })?;
        info!("wrote {} ({} notes)", path.display(), sequence.notes.len());
        outcomes.push(TrackOutcome {
            track: *kind,
            file: Some(kind.file_name().to_string()),
            note_count: Some(sequence.notes.len()),
            error: None,
        });
    }
    for failure in &arrangement.failures {
        if let ComposeError::Generative { track, cause } = failure {
            outcomes.push(TrackOutcome {
                track: *track,
                file: None,
                note_count: None,
                error: Some(format!("{cause:#}")),
            });
        }
    }
    Ok(outcomes)
}

fn write_metadata(
    output_dir: &Path,
    params: &CompositionParams,
    arrangement: &Arrangement,
    tracks: Vec<TrackOutcome>,
) -> Result<()> {
    let metadata = RunMetadata {
        generated_at: Utc::now(),
        params: params.clone(),
        melody_instrument: theory::instrument_name(params.melody_program, theory::MELODY_INSTRUMENTS)
            .map(str::to_string),
        chord_instrument: theory::instrument_name(params.chord_program, theory::CHORD_INSTRUMENTS)
            .map(str::to_string),
        bass_pattern: arrangement.bass_pattern.label().to_string(),
        chord_rhythm: arrangement.chord_rhythm.label().to_string(),
        tracks,
    };
    let path = output_dir.join(METADATA_FILE_NAME);
    let json = serde_json::to_vec_pretty(&metadata).context("failed to encode run metadata")?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write metadata at {}", path.display()))?;
    Ok(())
}

fn setup_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .map_err(|err| anyhow!("failed to initialise tracing: {err}"))
}
