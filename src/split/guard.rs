//! Timing guard around measure-content mutations
//!
//! The engine's floating-offset insertion primitive has an observed defect
//! class: inserting an element inside the span of a longer note can split
//! or rest-ify that note. Every content mutation in the pipeline therefore
//! goes through this guard: snapshot the measure's timing tuples, mutate,
//! compare, and revert + fail rather than let corruption propagate.

use crate::models::{Direction, ElementContent, ElementId, Measure, TimedElement};
use crate::utils::offsets_match;

use super::errors::TimingCorruption;

/// One element's timing identity inside a snapshot
#[derive(Debug, Clone, PartialEq)]
struct TimingEntry {
    id: ElementId,
    kind: &'static str,
    offset: f64,
    duration: f64,
    pitch_count: usize,
}

fn kind_tag(content: &ElementContent) -> &'static str {
    match content {
        ElementContent::Note { .. } => "note",
        ElementContent::Chord { .. } => "chord",
        ElementContent::Rest => "rest",
    }
}

/// Ordered timing state of one measure, captured before a mutation
#[derive(Debug, Clone)]
pub struct MeasureSnapshot {
    measure_number: u32,
    entries: Vec<TimingEntry>,
}

impl MeasureSnapshot {
    pub fn capture(measure: &Measure) -> Self {
        let entries = measure
            .all_elements()
            .map(|e| TimingEntry {
                id: e.id,
                kind: kind_tag(&e.content),
                offset: e.offset,
                duration: e.duration,
                pitch_count: e.pitches().len(),
            })
            .collect();
        Self {
            measure_number: measure.number,
            entries,
        }
    }

    /// Compare against the post-mutation state. Every pre-existing element
    /// must survive with unchanged kind, offset, and duration (within
    /// tolerance); the only admissible difference is the intended insertion.
    pub fn verify(
        &self,
        measure: &Measure,
        inserted: Option<ElementId>,
        tolerance: f64,
    ) -> Result<(), TimingCorruption> {
        let after: Vec<TimingEntry> = MeasureSnapshot::capture(measure)
            .entries
            .into_iter()
            .filter(|e| Some(e.id) != inserted)
            .collect();

        if after.len() != self.entries.len() {
            return Err(self.corruption(format!(
                "element count changed from {} to {} beyond the intended insertion",
                self.entries.len(),
                after.len()
            )));
        }

        for before in &self.entries {
            let Some(found) = after.iter().find(|e| e.id == before.id) else {
                return Err(self.corruption(format!("element {} disappeared", before.id)));
            };
            if found.kind != before.kind || found.pitch_count != before.pitch_count {
                return Err(self.corruption(format!(
                    "element {} changed kind from {} to {}",
                    before.id, before.kind, found.kind
                )));
            }
            if !offsets_match(found.offset, before.offset, tolerance) {
                return Err(self.corruption(format!(
                    "element {} moved from offset {} to {}",
                    before.id, before.offset, found.offset
                )));
            }
            if !offsets_match(found.duration, before.duration, tolerance) {
                return Err(self.corruption(format!(
                    "element {} changed duration from {} to {}",
                    before.id, before.duration, found.duration
                )));
            }
        }

        Ok(())
    }

    fn corruption(&self, detail: String) -> TimingCorruption {
        TimingCorruption {
            measure: self.measure_number,
            detail,
        }
    }
}

/// Insert a timed element under guard: on corruption the measure is
/// restored to its pre-mutation state and the error surfaces.
pub fn guarded_insert(
    measure: &mut Measure,
    lane_id: Option<&str>,
    element: TimedElement,
    tolerance: f64,
) -> Result<(), TimingCorruption> {
    let snapshot = MeasureSnapshot::capture(measure);
    let saved = measure.clone();
    let inserted = element.id;

    measure.insert_element(lane_id, element);

    if let Err(err) = snapshot.verify(measure, Some(inserted), tolerance) {
        *measure = saved;
        log::error!(
            "timing guard reverted insertion into measure {}: {}",
            err.measure,
            err.detail
        );
        return Err(err);
    }
    Ok(())
}

/// Append a measure-scoped direction under guard. Directions carry no
/// duration, but the bracket still proves the timed elements were left
/// untouched.
pub fn guarded_push_direction(
    measure: &mut Measure,
    direction: Direction,
    tolerance: f64,
) -> Result<(), TimingCorruption> {
    let snapshot = MeasureSnapshot::capture(measure);
    let saved = measure.clone();

    measure.directions.push(direction);

    if let Err(err) = snapshot.verify(measure, None, tolerance) {
        *measure = saved;
        log::error!(
            "timing guard reverted direction insert into measure {}: {}",
            err.measure,
            err.detail
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pitch;

    fn note(id: ElementId, offset: f64, duration: f64) -> TimedElement {
        TimedElement::note(id, Pitch::new(4, 0, 4).unwrap(), offset, duration)
    }

    fn populated_measure() -> Measure {
        let mut measure = Measure::new(3);
        measure.insert_element(Some("1"), note(1, 0.0, 2.0));
        measure.insert_element(Some("1"), note(2, 2.0, 2.0));
        measure
    }

    #[test]
    fn test_clean_insert_passes() {
        let mut measure = populated_measure();
        let result = guarded_insert(&mut measure, Some("1"), note(3, 1.0, 1.0), 0.1);
        assert!(result.is_ok());
        assert_eq!(measure.element_count(), 3);
    }

    #[test]
    fn test_detects_shifted_element() {
        let mut measure = populated_measure();
        let snapshot = MeasureSnapshot::capture(&measure);

        // Simulate the defect: an insertion that also shifts a neighbor
        measure.insert_element(Some("1"), note(3, 1.0, 1.0));
        measure.lane_mut("1").unwrap().elements[2].offset = 2.5;

        let err = snapshot.verify(&measure, Some(3), 0.1).unwrap_err();
        assert_eq!(err.measure, 3);
        assert!(err.detail.contains("moved"), "got: {}", err.detail);
    }

    #[test]
    fn test_detects_restified_note() {
        let mut measure = populated_measure();
        let snapshot = MeasureSnapshot::capture(&measure);

        // Simulate the defect: a note silently replaced by a rest
        let lane = measure.lane_mut("1").unwrap();
        lane.elements[0] = TimedElement::rest(1, 0.0, 2.0);

        let err = snapshot.verify(&measure, None, 0.1).unwrap_err();
        assert!(err.detail.contains("kind"), "got: {}", err.detail);
    }

    #[test]
    fn test_detects_split_note() {
        let mut measure = populated_measure();
        let snapshot = MeasureSnapshot::capture(&measure);

        // Simulate the defect: a long note split into two shorter ones
        let lane = measure.lane_mut("1").unwrap();
        lane.elements[0].duration = 1.0;
        lane.elements.insert(1, note(9, 1.0, 1.0));

        let err = snapshot.verify(&measure, None, 0.1).unwrap_err();
        assert!(err.detail.contains("count"), "got: {}", err.detail);
    }

    #[test]
    fn test_direction_push_leaves_elements_alone() {
        let mut measure = populated_measure();
        let direction = Direction::dynamic(0.0, crate::models::DynamicMark::F);
        assert!(guarded_push_direction(&mut measure, direction, 0.1).is_ok());
        assert_eq!(measure.directions.len(), 1);
        assert_eq!(measure.element_count(), 2);
    }
}
