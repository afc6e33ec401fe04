use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tick resolution shared by every sequence that crosses the worker boundary.
pub const TICKS_PER_QUARTER: u16 = 220;
pub const STEPS_PER_QUARTER: u32 = 4;
pub const BARS: u32 = 4;
pub const BEATS_PER_BAR: u32 = 4;
pub const TOTAL_BEATS: u32 = BARS * BEATS_PER_BAR;
pub const TOTAL_STEPS: u32 = TOTAL_BEATS * STEPS_PER_QUARTER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Melody,
    Drums,
    Bass,
    Chords,
}

impl TrackKind {
    pub const ALL: [TrackKind; 4] =
        [TrackKind::Melody, TrackKind::Drums, TrackKind::Bass, TrackKind::Chords];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Melody => "melody.mid",
            Self::Drums => "drums.mid",
            Self::Bass => "bass.mid",
            Self::Chords => "chords.mid",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Melody => "melody",
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Chords => "chords",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { numerator: 4, denominator: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start_time: f64,
    pub end_time: f64,
    pub velocity: u8,
    pub program: u8,
    #[serde(default)]
    pub is_percussion: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub ticks_per_quarter: u16,
    pub tempo_qpm: f64,
    #[serde(default)]
    pub time_signature: TimeSignature,
    pub total_time: f64,
    pub notes: Vec<NoteEvent>,
}

impl NoteSequence {
    pub fn new(tempo_qpm: f64) -> Self {
        Self {
            ticks_per_quarter: TICKS_PER_QUARTER,
            tempo_qpm,
            time_signature: TimeSignature::default(),
            total_time: 0.0,
            notes: Vec::new(),
        }
    }

    /// Latest note-off in the sequence, 0.0 when empty.
    pub fn last_note_end(&self) -> f64 {
        self.notes.iter().fold(0.0, |acc, note| acc.max(note.end_time))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinuationRequest {
    pub model_id: String,
    pub seed: NoteSequence,
    pub steps: u32,
    pub steps_per_quarter: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord_conditioning: Option<Vec<String>>,
}

/// Notes coming back from the worker may omit velocity; the adapter defaults it.
#[derive(Debug, Clone, Deserialize)]
pub struct ContinuationNote {
    pub pitch: u8,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub velocity: Option<u8>,
    #[serde(default)]
    pub is_percussion: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContinuationResponse {
    #[serde(default)]
    pub total_time: f64,
    pub notes: Vec<ContinuationNote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackOutcome {
    pub track: TrackKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub params: crate::params::CompositionParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melody_instrument: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord_instrument: Option<String>,
    pub bass_pattern: String,
    pub chord_rhythm: String,
    pub tracks: Vec<TrackOutcome>,
}
