use crate::error::ComposeError;

pub const MIN_PITCH: u8 = 36;
pub const MAX_PITCH: u8 = 96;
const OCTAVE_SPAN: i32 = 10;

/// Sorted, deduplicated absolute pitches belonging to a scale within a
/// bounded range. Non-empty by construction, so quantization is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalePitches {
    pitches: Vec<u8>,
}

/// Expand a root pitch class and interval set into every matching pitch in
/// `[min_pitch, max_pitch]`, walking octaves 0..=9 from the root at octave 0.
pub fn build_scale_pitches(
    root_pc: u8,
    intervals: &[i32],
    min_pitch: u8,
    max_pitch: u8,
) -> Result<ScalePitches, ComposeError> {
    if intervals.is_empty() {
        return Err(ComposeError::Configuration("scale interval set is empty".into()));
    }

    let root = crate::theory::note_pitch(root_pc, 0);
    let mut pitches = Vec::new();
    for octave in 0..OCTAVE_SPAN {
        for &interval in intervals {
            let pitch = root + octave * 12 + interval;
            if pitch >= min_pitch as i32 && pitch <= max_pitch as i32 {
                pitches.push(pitch as u8);
            }
        }
    }
    pitches.sort_unstable();
    pitches.dedup();

    if pitches.is_empty() {
        return Err(ComposeError::Configuration(format!(
            "no scale pitches fall within [{min_pitch}, {max_pitch}]"
        )));
    }
    Ok(ScalePitches { pitches })
}

impl ScalePitches {
    /// Snap a pitch to the nearest member. The scan runs ascending and only
    /// a strictly smaller distance replaces the running best, so the lower
    /// candidate wins ties. That tie-break is observable in generated output
    /// and must not change.
    pub fn quantize(&self, pitch: i32) -> u8 {
        let mut closest = self.pitches[0];
        let mut min_distance = (pitch - closest as i32).abs();
        for &candidate in &self.pitches {
            let distance = (pitch - candidate as i32).abs();
            if distance < min_distance {
                min_distance = distance;
                closest = candidate;
            }
        }
        closest
    }

    /// Members within `[low, high]`, or None when nothing falls inside.
    pub fn restricted(&self, low: u8, high: u8) -> Option<ScalePitches> {
        let pitches: Vec<u8> =
            self.pitches.iter().copied().filter(|&p| p >= low && p <= high).collect();
        if pitches.is_empty() {
            None
        } else {
            Some(ScalePitches { pitches })
        }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.pitches.binary_search(&pitch).is_ok()
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::SCALES;

    #[test]
    fn builds_sorted_unique_bounded_pitches_for_every_root_and_scale() {
        for root_pc in 0..12u8 {
            for scale in SCALES {
                let built = build_scale_pitches(root_pc, scale.intervals, MIN_PITCH, MAX_PITCH)
                    .expect("library scales always produce pitches");
                let pitches = built.pitches();
                assert!(!pitches.is_empty());
                assert!(pitches.windows(2).all(|pair| pair[0] < pair[1]));
                assert!(pitches.iter().all(|&p| (MIN_PITCH..=MAX_PITCH).contains(&p)));
            }
        }
    }

    #[test]
    fn builds_identical_output_for_identical_input() {
        let intervals = [0, 2, 4, 5, 7, 9, 11];
        let first = build_scale_pitches(0, &intervals, MIN_PITCH, MAX_PITCH).unwrap();
        let second = build_scale_pitches(0, &intervals, MIN_PITCH, MAX_PITCH).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_empty_intervals_and_empty_ranges() {
        assert!(build_scale_pitches(0, &[], MIN_PITCH, MAX_PITCH).is_err());
        // Range below every reachable pitch for this root/interval combo.
        assert!(build_scale_pitches(0, &[0], 0, 5).is_err());
    }

    #[test]
    fn quantizes_to_the_nearest_member() {
        let scale = build_scale_pitches(0, &[0, 2, 4, 5, 7, 9, 11], MIN_PITCH, MAX_PITCH).unwrap();
        assert_eq!(scale.quantize(60), 60);
        assert_eq!(scale.quantize(61), 60);
        assert_eq!(scale.quantize(63), 62);
        assert!(scale.contains(scale.quantize(200)));
        assert!(scale.contains(scale.quantize(-50)));
    }

    #[test]
    fn quantize_prefers_the_lower_candidate_on_ties() {
        // C and E only: 62 sits exactly between 60 and 64.
        let scale = build_scale_pitches(0, &[0, 4], 60, 64).unwrap();
        assert_eq!(scale.pitches(), &[60, 64]);
        assert_eq!(scale.quantize(62), 60);
    }

    #[test]
    fn restricts_to_subranges_and_reports_empty_ones() {
        let scale = build_scale_pitches(0, &[0, 2, 4, 5, 7, 9, 11], MIN_PITCH, MAX_PITCH).unwrap();
        let bass = scale.restricted(36, 60).expect("bass range is populated");
        assert!(bass.pitches().iter().all(|&p| (36..=60).contains(&p)));
        assert!(scale.restricted(97, 120).is_none());
    }
}
