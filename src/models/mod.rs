//! Data model for the score document engine
//!
//! This module contains the in-memory representation of a score: parts,
//! measures, voice lanes, timed elements, and spanner annotations.

pub mod attributes;
pub mod core;
pub mod elements;
pub mod notation;
pub mod pitch;

// Re-export commonly used types
pub use attributes::{Clef, KeySignature, Mode, Rational, TimeSignature};
pub use core::{ElementLocation, Measure, Part, ScoreDocument, VoiceLane};
pub use elements::{
    Direction, DirectionKind, DynamicMark, ElementContent, ElementId, Lyric, Placement, Syllabic,
    TempoMark, Tie, TimedElement,
};
pub use notation::{Spanner, SpannerKind};
pub use pitch::Pitch;
