//! Voice-separation pipeline
//!
//! Turns one closed score into four independent single-voice scores:
//!
//! - `identify`: propose a mapping from voices to (part, lane) locations
//! - `separate`: copy-and-prune one document per voice
//! - `spanners`: re-resolve cross-reference annotations per voice
//! - `unify`: propagate ensemble-wide annotations across the voices
//! - `guard`: timing-corruption bracket around content mutations
//!
//! Data flows strictly left to right; `pipeline` orchestrates the stages
//! and aggregates their reports.

pub mod errors;
pub mod guard;
pub mod identify;
pub mod pipeline;
pub mod separate;
pub mod settings;
pub mod spanners;
pub mod unify;

use serde::{Deserialize, Serialize};

// Re-export the public surface
pub use errors::{
    ProcessingError, StaffSimplificationError, TimingCorruption, UnificationError,
    VoiceDetectionError, VoiceRemovalError,
};
pub use identify::{ScoreLayout, VoiceLocation, VoiceMapping};
pub use pipeline::{split_score, SplitOutcome, StageKind, StageReport};
pub use separate::ExtractedVoiceScore;
pub use settings::SplitSettings;
pub use spanners::ReconciliationReport;
pub use unify::UnificationReport;

/// The four target voices, high to low
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoicePart {
    Soprano,
    Alto,
    Tenor,
    Bass,
}

impl VoicePart {
    pub const ALL: [VoicePart; 4] = [
        VoicePart::Soprano,
        VoicePart::Alto,
        VoicePart::Tenor,
        VoicePart::Bass,
    ];

    /// Position in soprano-to-bass order
    pub fn index(self) -> usize {
        match self {
            VoicePart::Soprano => 0,
            VoicePart::Alto => 1,
            VoicePart::Tenor => 2,
            VoicePart::Bass => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_order() {
        for (i, voice) in VoicePart::ALL.iter().enumerate() {
            assert_eq!(voice.index(), i);
        }
    }
}
