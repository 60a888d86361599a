//! Closed-score voice separation
//!
//! Takes a "closed" vocal score (several independent melodic lines
//! condensed onto one or two staves) and produces one independent,
//! single-voice score per line, preserving dynamics, slurs, ties,
//! crescendo marks, and lyrics.
//!
//! Typical use:
//!
//! ```ignore
//! let outcome = satb_split::musicxml::parse_musicxml(&xml)?;
//! let settings = satb_split::SplitSettings::default();
//! let split = satb_split::split_score(&outcome.document, &settings)?;
//! for voice in &split.voices {
//!     let xml = satb_split::musicxml::serialize_musicxml(&voice.document)?;
//!     // hand off to the embedder for writing
//! }
//! ```

pub mod models;
pub mod musicxml;
pub mod split;
pub mod utils;

// Re-export commonly used types
pub use models::core::*;
pub use models::elements::*;
pub use models::notation::*;
pub use split::{
    split_score, ExtractedVoiceScore, ProcessingError, SplitOutcome, SplitSettings, VoiceMapping,
    VoicePart,
};
