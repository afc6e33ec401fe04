use crate::params::CompositionParams;
use crate::scale::ScalePitches;
use crate::theory;
use crate::types::{NoteEvent, NoteSequence, TOTAL_BEATS};
use rand::Rng;

const BASS_PROGRAM: u8 = 32;
const BASS_RANGE_LOW: u8 = 36;
const BASS_RANGE_HIGH: u8 = 60;
const BASS_OCTAVE: i32 = 2;
const CHORD_OCTAVE: i32 = 4;
const BEAT_NOTE_FRACTION: f64 = 0.9;
const NOTE_OFF_GAP_SECONDS: f64 = 0.05;
const COMP_OFFSETS: [f64; 3] = [0.0, 1.5, 3.0];
const COMP_VELOCITIES: [u8; 3] = [85, 70, 70];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassPattern {
    RootFifth,
    Walking,
    Syncopated,
}

impl BassPattern {
    pub const ALL: [BassPattern; 3] =
        [BassPattern::RootFifth, BassPattern::Walking, BassPattern::Syncopated];

    pub fn label(&self) -> &'static str {
        match self {
            Self::RootFifth => "root-fifth",
            Self::Walking => "walking",
            Self::Syncopated => "syncopated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordRhythm {
    Whole,
    Half,
    Comp,
}

impl ChordRhythm {
    pub const ALL: [ChordRhythm; 3] = [ChordRhythm::Whole, ChordRhythm::Half, ChordRhythm::Comp];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Whole => "whole",
            Self::Half => "half",
            Self::Comp => "comp",
        }
    }
}

/// Timing context shared by the bass and chord generators: a fixed 16-beat
/// grid divided evenly among the chord segments.
#[derive(Debug, Clone, Copy)]
pub struct SegmentGrid {
    seconds_per_beat: f64,
    beats_per_segment: f64,
}

impl SegmentGrid {
    pub fn new(tempo_qpm: f64, segment_count: usize) -> Self {
        Self {
            seconds_per_beat: 60.0 / tempo_qpm,
            beats_per_segment: TOTAL_BEATS as f64 / segment_count as f64,
        }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        self.seconds_per_beat
    }

    pub fn beats_per_segment(&self) -> f64 {
        self.beats_per_segment
    }

    /// Whole beats that fit inside one segment. Per-beat patterns truncate
    /// the fractional remainder of uneven segments.
    pub fn whole_beats(&self) -> u32 {
        self.beats_per_segment as u32
    }

    pub fn segment_start_beat(&self, index: usize) -> f64 {
        index as f64 * self.beats_per_segment
    }

    pub fn segment_start(&self, index: usize) -> f64 {
        self.segment_start_beat(index) * self.seconds_per_beat
    }

    pub fn segment_end(&self, index: usize) -> f64 {
        (self.segment_start_beat(index) + self.beats_per_segment) * self.seconds_per_beat
    }

    pub fn total_time(&self) -> f64 {
        TOTAL_BEATS as f64 * self.seconds_per_beat
    }
}

/// Generates the two programmatic tracks against one grid and one scale.
#[derive(Debug)]
pub struct TrackArranger<'a> {
    params: &'a CompositionParams,
    scale: &'a ScalePitches,
    bass_pool: ScalePitches,
    grid: SegmentGrid,
}

impl<'a> TrackArranger<'a> {
    pub fn new(params: &'a CompositionParams, scale: &'a ScalePitches) -> Self {
        // The bass pool choice is made once here, not re-checked per note.
        let bass_pool = scale
            .restricted(BASS_RANGE_LOW, BASS_RANGE_HIGH)
            .unwrap_or_else(|| scale.clone());
        let grid = SegmentGrid::new(params.tempo, params.chords.len());
        Self { params, scale, bass_pool, grid }
    }

    pub fn grid(&self) -> &SegmentGrid {
        &self.grid
    }

    pub fn bass_track(&self, rng: &mut impl Rng) -> (NoteSequence, BassPattern) {
        let pattern = BassPattern::ALL[rng.gen_range(0..BassPattern::ALL.len())];
        (self.bass_track_with_pattern(pattern), pattern)
    }

    pub fn chord_track(&self, rng: &mut impl Rng) -> (NoteSequence, ChordRhythm) {
        let rhythm = ChordRhythm::ALL[rng.gen_range(0..ChordRhythm::ALL.len())];
        (self.chord_track_with_rhythm(rhythm), rhythm)
    }

    pub fn bass_track_with_pattern(&self, pattern: BassPattern) -> NoteSequence {
        let mut notes = Vec::new();
        for (index, symbol) in self.params.chords.iter().enumerate() {
            let (root, fifth) = self.segment_bass_pitches(symbol);
            match pattern {
                BassPattern::RootFifth => self.root_fifth_segment(index, root, fifth, &mut notes),
                BassPattern::Walking => self.walking_segment(index, root, fifth, &mut notes),
                BassPattern::Syncopated => {
                    self.syncopated_segment(index, root, fifth, &mut notes)
                }
            }
        }
        self.finished_sequence(notes)
    }

    pub fn chord_track_with_rhythm(&self, rhythm: ChordRhythm) -> NoteSequence {
        let mut notes = Vec::new();
        for (index, symbol) in self.params.chords.iter().enumerate() {
            // Unresolved symbols contribute nothing; the track goes on.
            let Some(chord) = theory::resolve_chord(symbol) else {
                tracing::warn!("skipping unresolved chord symbol '{symbol}'");
                continue;
            };
            let pitches: Vec<u8> = chord
                .pitch_classes
                .iter()
                .map(|&pc| self.scale.quantize(theory::note_pitch(pc, CHORD_OCTAVE)))
                .collect();
            match rhythm {
                ChordRhythm::Whole => self.whole_segment(index, &pitches, &mut notes),
                ChordRhythm::Half => self.half_segment(index, &pitches, &mut notes),
                ChordRhythm::Comp => self.comp_segment(index, &pitches, &mut notes),
            }
        }
        self.finished_sequence(notes)
    }

    /// Quantized root and fifth for one chord segment. An unresolved symbol
    /// falls back to the progression's declared root pitch class.
    fn segment_bass_pitches(&self, symbol: &str) -> (u8, u8) {
        let tonic = theory::resolve_chord(symbol)
            .map(|chord| chord.tonic)
            .unwrap_or(self.params.root_pc);
        let root = self.bass_pool.quantize(theory::note_pitch(tonic, BASS_OCTAVE));
        let fifth = self.bass_pool.quantize(root as i32 + 7);
        (root, fifth)
    }

    fn root_fifth_segment(&self, index: usize, root: u8, fifth: u8, notes: &mut Vec<NoteEvent>) {
        let start_beat = self.grid.segment_start_beat(index);
        let spb = self.grid.seconds_per_beat();
        for beat in 0..self.grid.whole_beats() {
            let pitch = if beat % 2 == 0 { root } else { fifth };
            let start = (start_beat + beat as f64) * spb;
            notes.push(bass_note(pitch, start, start + spb * BEAT_NOTE_FRACTION, 100));
        }
    }

    fn walking_segment(&self, index: usize, root: u8, fifth: u8, notes: &mut Vec<NoteEvent>) {
        let cell = [
            self.bass_pool.quantize(root as i32),
            self.bass_pool.quantize(root as i32 + 2),
            self.bass_pool.quantize(fifth as i32),
            self.bass_pool.quantize(fifth as i32 - 2),
        ];
        let start_beat = self.grid.segment_start_beat(index);
        let spb = self.grid.seconds_per_beat();
        for beat in 0..self.grid.whole_beats() {
            let pitch = cell[beat as usize % cell.len()];
            let start = (start_beat + beat as f64) * spb;
            notes.push(bass_note(pitch, start, start + spb * BEAT_NOTE_FRACTION, 100));
        }
    }

    fn syncopated_segment(&self, index: usize, root: u8, fifth: u8, notes: &mut Vec<NoteEvent>) {
        let start_beat = self.grid.segment_start_beat(index);
        let spb = self.grid.seconds_per_beat();
        let segment_end = self.grid.segment_end(index);

        let start = start_beat * spb;
        let end = ((start_beat + 1.5) * spb).min(segment_end);
        notes.push(bass_note(root, start, end, 100));

        if self.grid.beats_per_segment() >= 3.0 {
            let start = (start_beat + 2.5) * spb;
            let end = ((start_beat + 3.5) * spb).min(segment_end);
            notes.push(bass_note(fifth, start, end, 90));
        }
    }

    fn whole_segment(&self, index: usize, pitches: &[u8], notes: &mut Vec<NoteEvent>) {
        let start = self.grid.segment_start(index);
        let end = self.grid.segment_end(index) - NOTE_OFF_GAP_SECONDS;
        for &pitch in pitches {
            notes.push(self.chord_note(pitch, start, end, 80));
        }
    }

    fn half_segment(&self, index: usize, pitches: &[u8], notes: &mut Vec<NoteEvent>) {
        let start_beat = self.grid.segment_start_beat(index);
        let half = self.grid.beats_per_segment() / 2.0;
        let spb = self.grid.seconds_per_beat();
        for h in 0..2 {
            let start = (start_beat + h as f64 * half) * spb;
            let end = (start_beat + (h + 1) as f64 * half) * spb - NOTE_OFF_GAP_SECONDS;
            let velocity = if h == 0 { 80 } else { 70 };
            for &pitch in pitches {
                notes.push(self.chord_note(pitch, start, end, velocity));
            }
        }
    }

    fn comp_segment(&self, index: usize, pitches: &[u8], notes: &mut Vec<NoteEvent>) {
        let start_beat = self.grid.segment_start_beat(index);
        let spb = self.grid.seconds_per_beat();
        let segment_end = self.grid.segment_end(index);
        for (offset, velocity) in COMP_OFFSETS.iter().zip(COMP_VELOCITIES) {
            if *offset >= self.grid.beats_per_segment() {
                break;
            }
            let start = (start_beat + offset) * spb;
            let end = (start + spb).min(segment_end) - NOTE_OFF_GAP_SECONDS;
            for &pitch in pitches {
                notes.push(self.chord_note(pitch, start, end, velocity));
            }
        }
    }

    fn chord_note(&self, pitch: u8, start: f64, end: f64, velocity: u8) -> NoteEvent {
        NoteEvent {
            pitch,
            start_time: start,
            end_time: end,
            velocity,
            program: self.params.chord_program,
            is_percussion: false,
        }
    }

    fn finished_sequence(&self, notes: Vec<NoteEvent>) -> NoteSequence {
        let mut sequence = NoteSequence::new(self.params.tempo);
        sequence.total_time = self.grid.total_time();
        sequence.notes = notes;
        sequence
    }
}

fn bass_note(pitch: u8, start: f64, end: f64, velocity: u8) -> NoteEvent {
    NoteEvent {
        pitch,
        start_time: start,
        end_time: end,
        velocity,
        program: BASS_PROGRAM,
        is_percussion: false,
    }
}
