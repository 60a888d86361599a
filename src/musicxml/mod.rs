//! MusicXML interchange layer
//!
//! Parses `score-partwise` documents into the in-memory model and
//! serializes documents back out. The separation pipeline itself never
//! touches XML; it works on [`ScoreDocument`](crate::models::ScoreDocument)
//! values produced and consumed here.

pub mod export;
pub mod import;

pub use export::{serialize_musicxml, ExportError};
pub use import::{parse_musicxml, ImportError, ImportOutcome, SkippedElement};
