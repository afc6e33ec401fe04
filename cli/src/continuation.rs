use crate::api::ContinuationBackend;
use crate::params::CompositionParams;
use crate::scale::ScalePitches;
use crate::theory;
use crate::types::{
    ContinuationRequest, ContinuationResponse, NoteEvent, NoteSequence, STEPS_PER_QUARTER,
    TOTAL_BEATS, TOTAL_STEPS,
};
use anyhow::Result;

pub const IMPROV_MODEL: &str = "chord_pitches_improv";
pub const DRUMS_MODEL: &str = "drum_kit_rnn";

const SEED_SECONDS: f64 = 0.5;
const MELODY_SEED_OCTAVE: i32 = 4;
const KICK: u8 = 36;
const CLOSED_HIHAT: u8 = 42;
const DEFAULT_VELOCITY: u8 = 100;

/// One scale-quantized root note as the melody seed phrase.
pub fn melody_seed(params: &CompositionParams, scale: &ScalePitches) -> NoteSequence {
    let pitch = scale.quantize(theory::note_pitch(params.root_pc, MELODY_SEED_OCTAVE));
    let mut seed = NoteSequence::new(params.tempo);
    seed.total_time = SEED_SECONDS;
    seed.notes.push(NoteEvent {
        pitch,
        start_time: 0.0,
        end_time: SEED_SECONDS,
        velocity: DEFAULT_VELOCITY,
        program: params.melody_program,
        is_percussion: false,
    });
    seed
}

/// Kick plus closed hi-hat on the downbeat as the drum seed phrase.
pub fn drum_seed(tempo: f64) -> NoteSequence {
    let mut seed = NoteSequence::new(tempo);
    seed.total_time = SEED_SECONDS;
    for (pitch, velocity) in [(KICK, 100), (CLOSED_HIHAT, 80)] {
        seed.notes.push(NoteEvent {
            pitch,
            start_time: 0.0,
            end_time: SEED_SECONDS,
            velocity,
            program: 0,
            is_percussion: true,
        });
    }
    seed
}

pub async fn melody_track(
    backend: &impl ContinuationBackend,
    params: &CompositionParams,
    scale: &ScalePitches,
) -> Result<NoteSequence> {
    let request = ContinuationRequest {
        model_id: IMPROV_MODEL.to_string(),
        seed: melody_seed(params, scale),
        steps: TOTAL_STEPS,
        steps_per_quarter: STEPS_PER_QUARTER,
        temperature: params.temperature,
        chord_conditioning: Some(params.chords.clone()),
    };
    let response = backend.continue_sequence(&request).await?;
    Ok(finish_melody(response, params, scale))
}

pub async fn drum_track(
    backend: &impl ContinuationBackend,
    params: &CompositionParams,
) -> Result<NoteSequence> {
    let request = ContinuationRequest {
        model_id: DRUMS_MODEL.to_string(),
        seed: drum_seed(params.tempo),
        steps: TOTAL_STEPS,
        steps_per_quarter: STEPS_PER_QUARTER,
        temperature: params.temperature,
        chord_conditioning: None,
    };
    let response = backend.continue_sequence(&request).await?;
    Ok(finish_drums(response, params.tempo))
}

/// Pull the continuation back inside the scale, default velocities, and
/// stamp the requested melody instrument and run tempo.
fn finish_melody(
    response: ContinuationResponse,
    params: &CompositionParams,
    scale: &ScalePitches,
) -> NoteSequence {
    let reported = response.total_time;
    let mut sequence = NoteSequence::new(params.tempo);
    sequence.notes = response
        .notes
        .into_iter()
        .map(|note| NoteEvent {
            pitch: scale.quantize(note.pitch as i32),
            start_time: note.start_time,
            end_time: note.end_time,
            velocity: default_velocity(note.velocity),
            program: params.melody_program,
            is_percussion: false,
        })
        .collect();
    sequence.total_time = grid_seconds(params.tempo).max(sequence.last_note_end()).max(reported);
    sequence
}

/// Drums keep their pitches (drum map semantics) but every note is forced
/// onto the percussion flag.
fn finish_drums(response: ContinuationResponse, tempo: f64) -> NoteSequence {
    let reported = response.total_time;
    let mut sequence = NoteSequence::new(tempo);
    sequence.notes = response
        .notes
        .into_iter()
        .map(|note| NoteEvent {
            pitch: note.pitch,
            start_time: note.start_time,
            end_time: note.end_time,
            velocity: default_velocity(note.velocity),
            program: 0,
            is_percussion: true,
        })
        .collect();
    sequence.total_time = grid_seconds(tempo).max(sequence.last_note_end()).max(reported);
    sequence
}

fn grid_seconds(tempo: f64) -> f64 {
    TOTAL_BEATS as f64 * (60.0 / tempo)
}

fn default_velocity(velocity: Option<u8>) -> u8 {
    match velocity {
        Some(v) if v > 0 => v,
        _ => DEFAULT_VELOCITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CompositionRequest;
    use crate::scale::{build_scale_pitches, MAX_PITCH, MIN_PITCH};
    use crate::types::ContinuationNote;

    fn test_params() -> CompositionParams {
        CompositionRequest {
            root: "C".into(),
            scale: None,
            scale_intervals: Some(vec![0, 2, 4, 5, 7, 9, 11]),
            tempo: 100.0,
            chords: vec!["Cmaj7".into(), "Fmaj7".into()],
            temperature: 1.0,
            melody_instrument: Some(73),
            chord_instrument: Some(0),
            description: None,
        }
        .validate()
        .unwrap()
    }

    fn test_scale(params: &CompositionParams) -> ScalePitches {
        build_scale_pitches(params.root_pc, &params.intervals, MIN_PITCH, MAX_PITCH).unwrap()
    }

    #[test]
    fn melody_seed_is_one_scale_tone_at_octave_four() {
        let params = test_params();
        let scale = test_scale(&params);
        let seed = melody_seed(&params, &scale);
        assert_eq!(seed.notes.len(), 1);
        assert_eq!(seed.notes[0].pitch, 60);
        assert_eq!(seed.total_time, 0.5);
        assert_eq!(seed.tempo_qpm, 100.0);
    }

    #[test]
    fn drum_seed_is_a_simultaneous_kick_and_hat() {
        let seed = drum_seed(100.0);
        assert_eq!(seed.notes.len(), 2);
        assert!(seed.notes.iter().all(|note| note.start_time == 0.0));
        assert!(seed.notes.iter().all(|note| note.is_percussion));
        assert_eq!(seed.notes[0].pitch, KICK);
        assert_eq!(seed.notes[1].pitch, CLOSED_HIHAT);
    }

    #[test]
    fn finishing_melody_quantizes_and_stamps_the_instrument() {
        let params = test_params();
        let scale = test_scale(&params);
        let response = ContinuationResponse {
            total_time: 2.0,
            notes: vec![
                ContinuationNote {
                    pitch: 61,
                    start_time: 0.0,
                    end_time: 0.5,
                    velocity: None,
                    is_percussion: false,
                },
                ContinuationNote {
                    pitch: 64,
                    start_time: 0.5,
                    end_time: 1.0,
                    velocity: Some(90),
                    is_percussion: false,
                },
            ],
        };
        let sequence = finish_melody(response, &params, &scale);
        assert_eq!(sequence.notes[0].pitch, 60);
        assert_eq!(sequence.notes[0].velocity, 100);
        assert_eq!(sequence.notes[1].pitch, 64);
        assert_eq!(sequence.notes[1].velocity, 90);
        assert!(sequence.notes.iter().all(|note| note.program == 73));
        // 16 beats at 0.6 s/beat.
        assert!((sequence.total_time - 9.6).abs() < 1e-9);
    }

    #[test]
    fn finishing_drums_forces_percussion_and_defaults_velocity() {
        let response = ContinuationResponse {
            total_time: 1.0,
            notes: vec![ContinuationNote {
                pitch: 38,
                start_time: 0.25,
                end_time: 0.5,
                velocity: Some(0),
                is_percussion: false,
            }],
        };
        let sequence = finish_drums(response, 120.0);
        assert!(sequence.notes[0].is_percussion);
        assert_eq!(sequence.notes[0].velocity, 100);
        assert!((sequence.total_time - 8.0).abs() < 1e-9);
    }
}
