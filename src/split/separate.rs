//! Copy-and-prune voice separation
//!
//! For each target voice the whole source document is deep-copied, every
//! lane and part except the target's is deleted, and any remaining
//! multi-staff structure is collapsed into one staff. A measure left empty
//! by pruning receives a full-measure rest sized from the active time
//! signature; an empty measure is never left as a gap.

use serde::{Deserialize, Serialize};

use crate::models::{
    Measure, Part, ScoreDocument, TimeSignature, TimedElement, VoiceLane,
};

use super::errors::{ProcessingError, StaffSimplificationError, VoiceRemovalError};
use super::guard;
use super::identify::VoiceMapping;
use super::settings::SplitSettings;
use super::VoicePart;

/// One separated voice: a score document reduced to a single part
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExtractedVoiceScore {
    pub voice: VoicePart,
    pub name: String,
    pub document: ScoreDocument,
}

/// Result of the separation stage
#[derive(Debug, Clone)]
pub struct SeparationOutcome {
    pub voices: Vec<ExtractedVoiceScore>,
    pub warnings: Vec<String>,
}

/// Separate the source document into one single-part score per voice.
///
/// Each extraction works on its own private deep copy; the source is
/// never mutated.
pub fn separate(
    source: &ScoreDocument,
    mapping: &VoiceMapping,
    settings: &SplitSettings,
) -> Result<SeparationOutcome, ProcessingError> {
    let mut voices = Vec::with_capacity(VoicePart::ALL.len());
    let mut warnings = Vec::new();

    for voice in VoicePart::ALL {
        let (extracted, voice_warnings) = extract_voice(source, voice, mapping, settings)?;
        log::info!(
            "separated {} ({} measures)",
            extracted.name,
            extracted.document.measure_count()
        );
        voices.push(extracted);
        warnings.extend(voice_warnings);
    }

    Ok(SeparationOutcome { voices, warnings })
}

fn extract_voice(
    source: &ScoreDocument,
    voice: VoicePart,
    mapping: &VoiceMapping,
    settings: &SplitSettings,
) -> Result<(ExtractedVoiceScore, Vec<String>), ProcessingError> {
    let location = mapping.get(voice);
    let name = settings.voice_name(voice).to_string();
    let mut warnings = Vec::new();

    let mut copy = source.clone();

    // Spanner references point into pruned content; reconciliation builds
    // fresh ones, so the copy starts with none.
    copy.spanners.clear();

    if location.part_index >= copy.parts.len() {
        return Err(VoiceRemovalError::MissingPart {
            part_index: location.part_index,
            part_count: copy.parts.len(),
        }
        .into());
    }

    let mut part = copy.parts.remove(location.part_index);
    copy.parts.clear();

    let lane_rank = mapping.lane_rank(voice);
    let mut active_time = TimeSignature::common_time();

    for measure in &mut part.measures {
        if let Some(time) = measure.time {
            active_time = time;
        }

        let kept_lane_id = prune_measure(measure, location.voice_id.as_deref(), lane_rank, &name, &mut warnings);

        if measure.element_count() == 0 {
            // Silence-fill: exactly one rest spanning the nominal duration
            let rest = TimedElement::rest(copy.allocate_id(), 0.0, active_time.measure_duration());
            guard::guarded_insert(
                measure,
                kept_lane_id.as_deref(),
                rest,
                settings.offset_tolerance,
            )?;
        }
    }

    copy.parts.push(part);

    if copy.parts.len() > 1 {
        merge_into_single_part(&mut copy)?;
    }

    let part = &mut copy.parts[0];
    part.id = "P1".to_string();
    part.name = name.clone();
    part.clef = location.clef;

    Ok((
        ExtractedVoiceScore {
            voice,
            name,
            document: copy,
        },
        warnings,
    ))
}

/// Keep only the target lane in a measure, returning the id of the kept
/// lane (if any). Falls back to the positional lane when the mapped id is
/// absent, which is a warning rather than an error.
fn prune_measure(
    measure: &mut Measure,
    voice_id: Option<&str>,
    lane_rank: usize,
    voice_name: &str,
    warnings: &mut Vec<String>,
) -> Option<String> {
    if measure.lanes.is_empty() {
        // Unlayered measure: the bare elements are the voice's content
        return None;
    }

    let kept_index = match voice_id {
        Some(id) => match measure.lanes.iter().position(|l| l.id == id) {
            Some(index) => index,
            None => {
                let fallback = lane_rank.min(measure.lanes.len() - 1);
                warnings.push(format!(
                    "{}: lane \"{}\" absent from measure {}, using lane \"{}\" by position",
                    voice_name, id, measure.number, measure.lanes[fallback].id
                ));
                log::warn!(
                    "{}: lane \"{}\" absent from measure {}, positional fallback",
                    voice_name,
                    id,
                    measure.number
                );
                fallback
            }
        },
        None => {
            // Mapped to bare content but the measure is layered: take the
            // positional lane.
            let fallback = lane_rank.min(measure.lanes.len() - 1);
            warnings.push(format!(
                "{}: measure {} is layered, using lane \"{}\" by position",
                voice_name, measure.number, measure.lanes[fallback].id
            ));
            fallback
        }
    };

    let kept: VoiceLane = measure.lanes.swap_remove(kept_index);
    let kept_id = kept.id.clone();
    measure.lanes.clear();
    measure.lanes.push(kept);
    Some(kept_id)
}

/// Collapse a document that still has several parts into one staff.
///
/// Measures are merged index-aligned by measure number. Elements from the
/// merged parts land in the base measure's bare element list; two elements
/// at identical offsets across merged parts are a collision and an error,
/// never silently resolved.
pub fn merge_into_single_part(doc: &mut ScoreDocument) -> Result<(), StaffSimplificationError> {
    if doc.parts.len() <= 1 {
        return Ok(());
    }

    let mut base = doc.parts.remove(0);
    let others: Vec<Part> = doc.parts.drain(..).collect();

    for other in others {
        if other.measures.len() != base.measures.len() {
            return Err(StaffSimplificationError::MeasureCountMismatch {
                left: base.measures.len(),
                right: other.measures.len(),
            });
        }

        for (base_measure, other_measure) in base.measures.iter_mut().zip(other.measures) {
            let incoming: Vec<TimedElement> = other_measure
                .lanes
                .into_iter()
                .flat_map(|l| l.elements)
                .chain(other_measure.elements)
                .collect();

            for element in incoming {
                let collision = base_measure
                    .all_elements()
                    .any(|e| (e.offset - element.offset).abs() < f64::EPSILON);
                if collision {
                    return Err(StaffSimplificationError::OffsetCollision {
                        measure: base_measure.number,
                        offset: element.offset,
                    });
                }
                base_measure.insert_element(None, element);
            }

            base_measure.directions.extend(other_measure.directions);
        }
    }

    doc.parts.clear();
    doc.parts.push(base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clef, Pitch, TimeSignature};
    use crate::split::identify::analyze;

    fn pitch(step: u8, octave: i8) -> Pitch {
        Pitch::new(step, 0, octave).unwrap()
    }

    /// Two-part closed score with lanes {"1","2"}; measure 2 of the lower
    /// part is missing lane "2" to exercise the positional fallback.
    fn fixture() -> ScoreDocument {
        let mut doc = ScoreDocument::new();

        let mut upper = Part::new("P1", "Upper", Clef::Treble);
        let mut lower = Part::new("P2", "Lower", Clef::Bass);

        for number in 1..=2u32 {
            let mut measure = Measure::new(number);
            if number == 1 {
                measure.time = Some(TimeSignature::new(4, 4).unwrap());
            }
            let id = doc.allocate_id();
            measure.insert_element(Some("1"), TimedElement::note(id, pitch(0, 5), 0.0, 4.0));
            let id = doc.allocate_id();
            measure.insert_element(Some("2"), TimedElement::note(id, pitch(5, 4), 0.0, 4.0));
            upper.measures.push(measure);
        }

        for number in 1..=2u32 {
            let mut measure = Measure::new(number);
            if number == 1 {
                measure.time = Some(TimeSignature::new(4, 4).unwrap());
            }
            let id = doc.allocate_id();
            measure.insert_element(Some("1"), TimedElement::note(id, pitch(2, 3), 0.0, 4.0));
            if number == 1 {
                let id = doc.allocate_id();
                measure.insert_element(Some("2"), TimedElement::note(id, pitch(0, 3), 0.0, 4.0));
            }
            lower.measures.push(measure);
        }

        doc.parts.push(upper);
        doc.parts.push(lower);
        doc
    }

    fn run_separation(doc: &ScoreDocument) -> SeparationOutcome {
        let settings = SplitSettings::default();
        let mapping = analyze(doc, &settings).unwrap();
        separate(doc, &mapping, &settings).unwrap()
    }

    #[test]
    fn test_each_voice_gets_one_part() {
        let doc = fixture();
        let outcome = run_separation(&doc);

        assert_eq!(outcome.voices.len(), 4);
        for extracted in &outcome.voices {
            assert_eq!(extracted.document.parts.len(), 1);
            assert_eq!(
                extracted.document.measure_count(),
                doc.measure_count(),
                "{} lost measures",
                extracted.name
            );
        }
        assert_eq!(outcome.voices[0].name, "Soprano");
        assert_eq!(outcome.voices[0].document.parts[0].name, "Soprano");
        assert_eq!(outcome.voices[3].document.parts[0].clef, Clef::Bass);
    }

    #[test]
    fn test_duration_conservation() {
        let doc = fixture();
        let outcome = run_separation(&doc);

        for extracted in &outcome.voices {
            for measure in &extracted.document.parts[0].measures {
                assert!(
                    (measure.total_duration() - 4.0).abs() < 1e-9,
                    "{} measure {} sums to {}",
                    extracted.name,
                    measure.number,
                    measure.total_duration()
                );
            }
        }
    }

    #[test]
    fn test_missing_lane_falls_back_positionally_with_warning() {
        let doc = fixture();
        let outcome = run_separation(&doc);

        // Bass maps to lane "2" of the lower part, absent in measure 2
        assert!(
            outcome.warnings.iter().any(|w| w.contains("Bass")),
            "expected a positional-fallback warning, got {:?}",
            outcome.warnings
        );
    }

    #[test]
    fn test_empty_measure_is_silence_filled() {
        let mut doc = fixture();
        // Lower part measure 2 now has an empty extra lane "2"
        doc.parts[1].measures[1].lanes.push(VoiceLane::new("2"));
        let outcome = run_separation(&doc);

        let bass = &outcome.voices[3];
        let measure = &bass.document.parts[0].measures[1];
        assert_eq!(measure.element_count(), 1);
        let rest = measure.all_elements().next().unwrap();
        assert!(rest.is_rest());
        assert_eq!(rest.duration, 4.0);
        assert_eq!(rest.offset, 0.0);
    }

    #[test]
    fn test_silence_fill_respects_time_signature() {
        let mut doc = fixture();
        doc.parts[1].measures[0].time = Some(TimeSignature::new(3, 4).unwrap());
        doc.parts[1].measures[0].lanes[1].elements.clear();
        doc.parts[1].measures[1].lanes.push(VoiceLane::new("2"));
        let outcome = run_separation(&doc);

        let bass = &outcome.voices[3];
        let first = bass.document.parts[0].measures[0]
            .all_elements()
            .next()
            .unwrap();
        assert!(first.is_rest());
        assert_eq!(first.duration, 3.0, "rest sized from the 3/4 signature");
    }

    #[test]
    fn test_source_document_untouched() {
        let doc = fixture();
        let before = doc.clone();
        let _ = run_separation(&doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_merge_collision_is_an_error() {
        let mut doc = ScoreDocument::new();
        for part_no in 0..2 {
            let mut part = Part::new(format!("P{}", part_no + 1), "staff", Clef::Treble);
            let mut measure = Measure::new(1);
            let id = doc.allocate_id();
            measure.insert_element(None, TimedElement::note(id, pitch(0, 4), 0.0, 4.0));
            part.measures.push(measure);
            doc.parts.push(part);
        }

        let err = merge_into_single_part(&mut doc).unwrap_err();
        assert!(matches!(
            err,
            StaffSimplificationError::OffsetCollision { measure: 1, .. }
        ));
    }

    #[test]
    fn test_merge_interleaves_offsets() {
        let mut doc = ScoreDocument::new();
        for (part_no, offsets) in [(0usize, [0.0, 2.0]), (1, [1.0, 3.0])] {
            let mut part = Part::new(format!("P{}", part_no + 1), "staff", Clef::Treble);
            let mut measure = Measure::new(1);
            for offset in offsets {
                let id = doc.allocate_id();
                measure.insert_element(None, TimedElement::note(id, pitch(0, 4), offset, 1.0));
            }
            part.measures.push(measure);
            doc.parts.push(part);
        }

        merge_into_single_part(&mut doc).unwrap();
        assert_eq!(doc.parts.len(), 1);
        let offsets: Vec<f64> = doc.parts[0].measures[0]
            .elements
            .iter()
            .map(|e| e.offset)
            .collect();
        assert_eq!(offsets, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_merge_measure_count_mismatch() {
        let mut doc = ScoreDocument::new();
        let mut a = Part::new("P1", "a", Clef::Treble);
        a.measures.push(Measure::new(1));
        a.measures.push(Measure::new(2));
        let mut b = Part::new("P2", "b", Clef::Bass);
        b.measures.push(Measure::new(1));
        doc.parts.push(a);
        doc.parts.push(b);

        assert!(matches!(
            merge_into_single_part(&mut doc),
            Err(StaffSimplificationError::MeasureCountMismatch { left: 2, right: 1 })
        ));
    }
}
