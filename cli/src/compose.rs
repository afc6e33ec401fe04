use crate::api::ContinuationBackend;
use crate::arranger::{BassPattern, ChordRhythm, TrackArranger};
use crate::continuation;
use crate::error::ComposeError;
use crate::params::CompositionParams;
use crate::scale::{build_scale_pitches, MAX_PITCH, MIN_PITCH};
use crate::types::{NoteSequence, TrackKind};
use rand::Rng;
use tracing::{error, info};

/// The finished run: every track that could be produced, in output order,
/// plus the failures the partial-result policy tolerated.
#[derive(Debug)]
pub struct Arrangement {
    pub tracks: Vec<(TrackKind, NoteSequence)>,
    pub failures: Vec<ComposeError>,
    pub bass_pattern: BassPattern,
    pub chord_rhythm: ChordRhythm,
}

impl Arrangement {
    pub fn failed_tracks(&self) -> Vec<TrackKind> {
        self.failures
            .iter()
            .filter_map(|failure| match failure {
                ComposeError::Generative { track, .. } => Some(*track),
                _ => None,
            })
            .collect()
    }
}

/// Generate all four tracks against one scale and one timing grid. Bass and
/// chords are pure; melody and drums await the continuation worker
/// concurrently. A worker failure downs only its own track.
pub async fn compose(
    params: &CompositionParams,
    backend: &impl ContinuationBackend,
    rng: &mut impl Rng,
) -> Result<Arrangement, ComposeError> {
    let scale = build_scale_pitches(params.root_pc, &params.intervals, MIN_PITCH, MAX_PITCH)?;
    info!(
        "composing in {} ({} scale tones, {} chords, {} BPM)",
        params.root,
        scale.pitches().len(),
        params.chords.len(),
        params.tempo
    );

    let arranger = TrackArranger::new(params, &scale);
    let (bass, bass_pattern) = arranger.bass_track(rng);
    let (chords, chord_rhythm) = arranger.chord_track(rng);
    info!("bass pattern: {}, chord rhythm: {}", bass_pattern.label(), chord_rhythm.label());

    let (melody, drums) = tokio::join!(
        continuation::melody_track(backend, params, &scale),
        continuation::drum_track(backend, params),
    );

    let mut tracks = Vec::with_capacity(4);
    let mut failures = Vec::new();
    for (kind, outcome) in [(TrackKind::Melody, melody), (TrackKind::Drums, drums)] {
        match outcome {
            Ok(sequence) => tracks.push((kind, sequence)),
            Err(source) => {
                error!("{kind} track failed: {source:#}");
                failures.push(ComposeError::Generative { track: kind, cause: source });
            }
        }
    }
    tracks.push((TrackKind::Bass, bass));
    tracks.push((TrackKind::Chords, chords));

    Ok(Arrangement { tracks, failures, bass_pattern, chord_rhythm })
}
