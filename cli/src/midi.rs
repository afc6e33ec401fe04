//! Standard MIDI File output. Each track renders as SMF Format 1: a tempo
//! track followed by one note track. Percussion notes land on channel 10.

use crate::types::NoteSequence;
use anyhow::{Context, Result};
use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::fs;
use std::path::Path;

const DRUM_CHANNEL: u8 = 9;
const MICROSECONDS_PER_MINUTE: u32 = 60_000_000;

pub fn write_track(sequence: &NoteSequence, path: &Path) -> Result<()> {
    let smf = sequence_to_smf(sequence);
    let mut buf = Vec::new();
    smf.write_std(&mut buf).context("failed to encode MIDI")?;
    fs::write(path, &buf).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn sequence_to_smf(sequence: &NoteSequence) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(sequence.ticks_per_quarter)),
    ));

    let mut tempo_track: Track<'static> = Vec::new();
    let tempo_microseconds = (MICROSECONDS_PER_MINUTE as f64 / sequence.tempo_qpm) as u32;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
            sequence.time_signature.numerator,
            denominator_power(sequence.time_signature.denominator),
            24,
            8,
        )),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    smf.tracks.push(note_track(sequence));
    smf
}

fn note_track(sequence: &NoteSequence) -> Track<'static> {
    let mut track: Track<'static> = Vec::new();

    if let Some(note) = sequence.notes.iter().find(|note| !note.is_percussion) {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::ProgramChange { program: u7::new(note.program.min(127)) },
            },
        });
    }

    // (tick, order, channel, key, velocity, is_on); note-offs sort before
    // note-ons at the same tick so retriggered pitches never hang.
    let mut events: Vec<(u32, u8, u8, u8, u8, bool)> = Vec::new();
    for note in &sequence.notes {
        let channel = if note.is_percussion { DRUM_CHANNEL } else { 0 };
        let on_tick = seconds_to_ticks(note.start_time, sequence);
        let off_tick = seconds_to_ticks(note.end_time, sequence).max(on_tick);
        events.push((on_tick, 1, channel, note.pitch.min(127), note.velocity.min(127), true));
        events.push((off_tick, 0, channel, note.pitch.min(127), 0, false));
    }
    events.sort_by_key(|&(tick, order, ..)| (tick, order));

    let mut last_tick = 0u32;
    for (tick, _, channel, key, velocity, is_on) in events {
        let message = if is_on {
            MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(velocity) }
        } else {
            MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(velocity) }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel: u4::new(channel), message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn seconds_to_ticks(seconds: f64, sequence: &NoteSequence) -> u32 {
    let ticks_per_second = sequence.tempo_qpm / 60.0 * sequence.ticks_per_quarter as f64;
    (seconds.max(0.0) * ticks_per_second).round() as u32
}

fn denominator_power(denominator: u8) -> u8 {
    match denominator {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NoteEvent, NoteSequence};

    fn sequence_with_notes(notes: Vec<NoteEvent>) -> NoteSequence {
        let mut sequence = NoteSequence::new(120.0);
        sequence.total_time = 8.0;
        sequence.notes = notes;
        sequence
    }

    fn note(pitch: u8, start: f64, end: f64, is_percussion: bool) -> NoteEvent {
        NoteEvent {
            pitch,
            start_time: start,
            end_time: end,
            velocity: 100,
            program: 32,
            is_percussion,
        }
    }

    #[test]
    fn encodes_a_tempo_track_and_a_note_track() {
        let sequence = sequence_with_notes(vec![note(60, 0.0, 0.5, false)]);
        let smf = sequence_to_smf(&sequence);
        assert_eq!(smf.tracks.len(), 2);
        assert_eq!(smf.header.format, Format::Parallel);
        let has_tempo = smf.tracks[0]
            .iter()
            .any(|event| matches!(event.kind, TrackEventKind::Meta(MetaMessage::Tempo(_))));
        assert!(has_tempo);
        // Program change + note on + note off + end of track.
        assert_eq!(smf.tracks[1].len(), 4);
    }

    #[test]
    fn routes_percussion_to_the_drum_channel() {
        let sequence = sequence_with_notes(vec![note(36, 0.0, 0.5, true)]);
        let smf = sequence_to_smf(&sequence);
        let channels: Vec<u8> = smf.tracks[1]
            .iter()
            .filter_map(|event| match event.kind {
                TrackEventKind::Midi { channel, .. } => Some(channel.as_int()),
                _ => None,
            })
            .collect();
        assert!(!channels.is_empty());
        assert!(channels.iter().all(|&channel| channel == DRUM_CHANNEL));
    }

    #[test]
    fn orders_note_offs_before_note_ons_at_the_same_tick() {
        let sequence =
            sequence_with_notes(vec![note(60, 0.0, 1.0, false), note(60, 1.0, 2.0, false)]);
        let smf = sequence_to_smf(&sequence);
        let messages: Vec<bool> = smf.tracks[1]
            .iter()
            .filter_map(|event| match event.kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. } => Some(true),
                TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. } => Some(false),
                _ => None,
            })
            .collect();
        // on, off, on, off: the second on never precedes the first off.
        assert_eq!(messages, vec![true, false, true, false]);
    }

    #[test]
    fn writes_a_parseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bass.mid");
        let sequence = sequence_with_notes(vec![note(40, 0.0, 0.45, false)]);
        write_track(&sequence, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        let parsed = Smf::parse(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 2);
    }
}
