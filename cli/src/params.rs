use crate::error::ComposeError;
use crate::theory;
use serde::{Deserialize, Serialize};
use tracing::warn;

const MIN_TEMPO: f64 = 40.0;
const MAX_TEMPO: f64 = 200.0;
const MIN_TEMPERATURE: f64 = 0.5;
const MAX_TEMPERATURE: f64 = 1.5;
const DEFAULT_MELODY_PROGRAM: u8 = 73;
const DEFAULT_CHORD_PROGRAM: u8 = 0;

fn default_temperature() -> f64 {
    1.0
}

/// Raw parameter document as read from a file or stdin. Mirrors the JSON
/// contract of the generation request; `validate` turns it into the
/// engine-facing `CompositionParams`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositionRequest {
    pub root: String,
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub scale_intervals: Option<Vec<i32>>,
    pub tempo: f64,
    pub chords: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub melody_instrument: Option<u8>,
    #[serde(default)]
    pub chord_instrument: Option<u8>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositionParams {
    pub root: String,
    #[serde(skip)]
    pub root_pc: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    pub intervals: Vec<i32>,
    pub tempo: f64,
    pub chords: Vec<String>,
    pub temperature: f64,
    pub melody_program: u8,
    pub chord_program: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CompositionRequest {
    /// Check the fatal invariants and clamp the recoverable ones. Out-of-range
    /// tempo/temperature and out-of-library instruments are corrected with a
    /// warning rather than rejected, matching the generation contract.
    pub fn validate(self) -> Result<CompositionParams, ComposeError> {
        let root_pc = theory::parse_pitch_class(&self.root).ok_or_else(|| {
            ComposeError::Configuration(format!("unknown root pitch class '{}'", self.root))
        })?;

        let intervals = match (&self.scale_intervals, &self.scale) {
            (Some(intervals), _) if !intervals.is_empty() => intervals.clone(),
            (_, Some(name)) => theory::find_scale(name)
                .map(|scale| scale.intervals.to_vec())
                .ok_or_else(|| {
                    ComposeError::Configuration(format!("unknown scale '{name}'"))
                })?,
            _ => {
                return Err(ComposeError::Configuration(
                    "no scale intervals and no scale name given".into(),
                ))
            }
        };

        if self.tempo <= 0.0 || !self.tempo.is_finite() {
            return Err(ComposeError::Configuration(format!(
                "tempo must be positive, got {}",
                self.tempo
            )));
        }
        let tempo = self.tempo.clamp(MIN_TEMPO, MAX_TEMPO);
        if tempo != self.tempo {
            warn!("clamped tempo {} to {tempo}", self.tempo);
        }

        if self.chords.is_empty() {
            return Err(ComposeError::Configuration("chord progression is empty".into()));
        }

        if self.temperature <= 0.0 || !self.temperature.is_finite() {
            return Err(ComposeError::Configuration(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        let temperature = self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        if temperature != self.temperature {
            warn!("clamped temperature {} to {temperature}", self.temperature);
        }

        let melody_program = snap_program(
            self.melody_instrument.unwrap_or(DEFAULT_MELODY_PROGRAM),
            theory::MELODY_INSTRUMENTS,
            "melody",
        );
        let chord_program = snap_program(
            self.chord_instrument.unwrap_or(DEFAULT_CHORD_PROGRAM),
            theory::CHORD_INSTRUMENTS,
            "chord",
        );

        Ok(CompositionParams {
            root: self.root,
            root_pc,
            scale: self.scale,
            intervals,
            tempo,
            chords: self.chords,
            temperature,
            melody_program,
            chord_program,
            description: self.description,
        })
    }
}

fn snap_program(requested: u8, library: &[theory::Instrument], role: &str) -> u8 {
    if theory::library_contains(requested, library) {
        return requested;
    }
    match theory::closest_program(requested, library) {
        Some(program) => {
            warn!("{role} instrument {requested} not in library, using {program}");
            program
        }
        None => requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompositionRequest {
        CompositionRequest {
            root: "D".into(),
            scale: Some("Hirajoshi".into()),
            scale_intervals: None,
            tempo: 95.0,
            chords: vec!["Dm".into(), "Am".into(), "Em".into(), "Dm".into()],
            temperature: 1.2,
            melody_instrument: Some(73),
            chord_instrument: Some(0),
            description: Some("test run".into()),
        }
    }

    #[test]
    fn validates_a_well_formed_request() {
        let params = request().validate().expect("valid request");
        assert_eq!(params.root_pc, 2);
        assert_eq!(params.intervals, vec![0, 4, 6, 7, 11]);
        assert_eq!(params.tempo, 95.0);
        assert_eq!(params.melody_program, 73);
    }

    #[test]
    fn explicit_intervals_override_the_named_scale() {
        let mut req = request();
        req.scale_intervals = Some(vec![0, 3, 7]);
        let params = req.validate().unwrap();
        assert_eq!(params.intervals, vec![0, 3, 7]);
        assert_eq!(params.scale.as_deref(), Some("Hirajoshi"));
    }

    #[test]
    fn rejects_unknown_roots_scales_and_empty_progressions() {
        let mut bad_root = request();
        bad_root.root = "X".into();
        assert!(bad_root.validate().is_err());

        let mut bad_scale = request();
        bad_scale.scale = Some("Nonexistent Scale".into());
        assert!(bad_scale.validate().is_err());

        let mut no_scale = request();
        no_scale.scale = None;
        assert!(no_scale.validate().is_err());

        let mut no_chords = request();
        no_chords.chords = Vec::new();
        assert!(no_chords.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_tempo_and_temperature() {
        let mut zero_tempo = request();
        zero_tempo.tempo = 0.0;
        assert!(zero_tempo.validate().is_err());

        let mut negative_temperature = request();
        negative_temperature.temperature = -1.0;
        assert!(negative_temperature.validate().is_err());
    }

    #[test]
    fn clamps_out_of_range_tempo_and_temperature() {
        let mut hot = request();
        hot.tempo = 300.0;
        hot.temperature = 9.0;
        let params = hot.validate().unwrap();
        assert_eq!(params.tempo, 200.0);
        assert_eq!(params.temperature, 1.5);
    }

    #[test]
    fn snaps_unknown_instruments_to_the_nearest_library_program() {
        let mut odd = request();
        odd.melody_instrument = Some(65);
        odd.chord_instrument = Some(18);
        let params = odd.validate().unwrap();
        assert_eq!(params.melody_program, 64);
        assert_eq!(params.chord_program, 19);
    }

    #[test]
    fn defaults_instruments_and_temperature_from_json() {
        let params: CompositionRequest = serde_json::from_str(
            r#"{"root":"C","scale":"Major","tempo":120,"chords":["Cmaj","G7"]}"#,
        )
        .unwrap();
        assert_eq!(params.temperature, 1.0);
        let validated = params.validate().unwrap();
        assert_eq!(validated.melody_program, DEFAULT_MELODY_PROGRAM);
        assert_eq!(validated.chord_program, DEFAULT_CHORD_PROGRAM);
    }
}
