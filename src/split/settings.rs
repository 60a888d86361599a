//! Configuration consumed by the separation pipeline
//!
//! Settings are assembled upstream (CLI or embedding application) and
//! passed in; the core never parses configuration itself. The numeric
//! thresholds are empirical heuristics and are expected to need
//! corpus-specific tuning.

use serde::{Deserialize, Serialize};

use super::VoicePart;

/// Configuration options for a split run
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SplitSettings {
    /// Display names for the four target voices, high to low
    pub voice_names: [String; 4],

    /// Voice whose annotations seed lyric and dynamics propagation
    pub lead_voice: VoicePart,

    /// Minimum coverage ratio for a spanner to be considered relevant
    /// to a voice
    pub coverage_threshold: f64,

    /// Lead syllable count must exceed this multiple of every other
    /// voice's count before lyrics are propagated
    pub lyric_dominance: f64,

    /// Tolerance for offset comparisons, in quarter-note units
    pub offset_tolerance: f64,

    /// Minimum detector confidence for a layout to be accepted
    pub acceptance_threshold: f64,

    /// Accept the best mapping even below the acceptance threshold
    pub allow_low_confidence: bool,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            voice_names: [
                "Soprano".to_string(),
                "Alto".to_string(),
                "Tenor".to_string(),
                "Bass".to_string(),
            ],
            lead_voice: VoicePart::Soprano,
            coverage_threshold: 0.1,
            lyric_dominance: 3.0,
            offset_tolerance: 0.1,
            acceptance_threshold: 0.6,
            allow_low_confidence: false,
        }
    }
}

impl SplitSettings {
    /// Configured display name for a voice
    pub fn voice_name(&self, voice: VoicePart) -> &str {
        &self.voice_names[voice.index()]
    }
}
