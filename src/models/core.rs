//! Core document structures: score, parts, measures, voice lanes
//!
//! A [`ScoreDocument`] is the root of the element graph. It owns its parts
//! and the document-wide spanner list, and allocates element identities.
//! Documents are deep-copied with `Clone`; the separation pipeline only
//! ever mutates private copies.

use serde::{Deserialize, Serialize};

use super::attributes::{Clef, KeySignature, TimeSignature};
use super::elements::{Direction, ElementId, TimedElement};
use super::notation::Spanner;

/// Root of the score graph
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ScoreDocument {
    pub title: Option<String>,
    pub parts: Vec<Part>,

    /// Document-wide spanner annotations over element identities
    pub spanners: Vec<Spanner>,

    next_element_id: ElementId,
}

impl ScoreDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh element identity, unique within this document
    pub fn allocate_id(&mut self) -> ElementId {
        self.next_element_id += 1;
        self.next_element_id
    }

    /// Locate an element by identity anywhere in the document
    pub fn find_element(&self, id: ElementId) -> Option<ElementLocation<'_>> {
        for (part_index, part) in self.parts.iter().enumerate() {
            for measure in &part.measures {
                for lane in &measure.lanes {
                    if let Some(element) = lane.elements.iter().find(|e| e.id == id) {
                        return Some(ElementLocation {
                            part_index,
                            measure_number: measure.number,
                            lane_id: Some(lane.id.as_str()),
                            element,
                        });
                    }
                }
                if let Some(element) = measure.elements.iter().find(|e| e.id == id) {
                    return Some(ElementLocation {
                        part_index,
                        measure_number: measure.number,
                        lane_id: None,
                        element,
                    });
                }
            }
        }
        None
    }

    /// Number of measures in the longest part
    pub fn measure_count(&self) -> usize {
        self.parts
            .iter()
            .map(|p| p.measures.len())
            .max()
            .unwrap_or(0)
    }

    /// Total number of timed elements across all parts
    pub fn element_count(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|p| &p.measures)
            .map(|m| m.element_count())
            .sum()
    }
}

/// Where an element lives inside a document
#[derive(Debug, Clone, Copy)]
pub struct ElementLocation<'a> {
    pub part_index: usize,
    pub measure_number: u32,
    pub lane_id: Option<&'a str>,
    pub element: &'a TimedElement,
}

/// One staff of the score: an ordered list of measures with a clef designation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Part {
    /// MusicXML part id ("P1", "P2", ...)
    pub id: String,
    pub name: String,
    pub clef: Clef,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: impl Into<String>, name: impl Into<String>, clef: Clef) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            clef,
            measures: Vec::new(),
        }
    }
}

/// A named concurrent melodic line within a measure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoiceLane {
    pub id: String,
    pub elements: Vec<TimedElement>,
}

impl VoiceLane {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elements: Vec::new(),
        }
    }
}

/// A fixed time window of one part.
///
/// Content is either layered into named voice lanes or, when the source is
/// unlayered, held as bare timed elements. Measure-scoped annotations
/// (dynamics, tempo, words) live in `directions` and belong to no lane.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Measure {
    /// 1-based measure number
    pub number: u32,

    pub lanes: Vec<VoiceLane>,

    /// Bare timed elements when the measure is unlayered
    pub elements: Vec<TimedElement>,

    pub directions: Vec<Direction>,

    /// Attribute changes effective from this measure
    pub clef: Option<Clef>,
    pub key: Option<KeySignature>,
    pub time: Option<TimeSignature>,
}

impl Measure {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            lanes: Vec::new(),
            elements: Vec::new(),
            directions: Vec::new(),
            clef: None,
            key: None,
            time: None,
        }
    }

    pub fn is_layered(&self) -> bool {
        !self.lanes.is_empty()
    }

    pub fn lane(&self, id: &str) -> Option<&VoiceLane> {
        self.lanes.iter().find(|l| l.id == id)
    }

    pub fn lane_mut(&mut self, id: &str) -> Option<&mut VoiceLane> {
        self.lanes.iter_mut().find(|l| l.id == id)
    }

    /// Get or create the lane with the given id, preserving declaration order
    pub fn lane_entry(&mut self, id: &str) -> &mut VoiceLane {
        if let Some(pos) = self.lanes.iter().position(|l| l.id == id) {
            &mut self.lanes[pos]
        } else {
            self.lanes.push(VoiceLane::new(id));
            self.lanes.last_mut().unwrap()
        }
    }

    /// All timed elements of the measure, lanes first, then bare elements
    pub fn all_elements(&self) -> impl Iterator<Item = &TimedElement> {
        self.lanes
            .iter()
            .flat_map(|l| l.elements.iter())
            .chain(self.elements.iter())
    }

    pub fn all_elements_mut(&mut self) -> impl Iterator<Item = &mut TimedElement> {
        self.lanes
            .iter_mut()
            .flat_map(|l| l.elements.iter_mut())
            .chain(self.elements.iter_mut())
    }

    pub fn element_count(&self) -> usize {
        self.lanes.iter().map(|l| l.elements.len()).sum::<usize>() + self.elements.len()
    }

    /// Sum of the durations of every timed element in the measure
    pub fn total_duration(&self) -> f64 {
        self.all_elements().map(|e| e.duration).sum()
    }

    /// Insert a timed element at its floating offset, keeping the target
    /// sequence ordered by offset.
    ///
    /// This is the mutation primitive the timing guard brackets: callers
    /// that modify already-populated measures go through
    /// [`guard`](crate::split::guard) instead of calling this directly.
    pub fn insert_element(&mut self, lane_id: Option<&str>, element: TimedElement) {
        let target = match lane_id {
            Some(id) => &mut self.lane_entry(id).elements,
            None => &mut self.elements,
        };
        let position = target
            .iter()
            .position(|e| e.offset > element.offset)
            .unwrap_or(target.len());
        target.insert(position, element);
    }
}
