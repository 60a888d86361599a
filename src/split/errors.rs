//! Error taxonomy for the separation pipeline
//!
//! Each stage has its own error domain; `ProcessingError` wraps them all
//! and names the failing stage. Expected degraded conditions (an
//! unrepairable spanner for one voice, a missing lane with a positional
//! fallback) are reported as warnings, not errors.

use thiserror::Error;

/// Voice-layout identification failures
#[derive(Debug, Clone, Error)]
pub enum VoiceDetectionError {
    #[error("score has no parts to analyze")]
    EmptyScore,

    #[error("no layout detector produced a valid voice mapping")]
    Unrecognized,

    #[error(
        "best layout confidence {best:.2} is below the acceptance threshold {threshold:.2}"
    )]
    BelowThreshold { best: f64, threshold: f64 },
}

/// Lane/part pruning failures during separation
#[derive(Debug, Clone, Error)]
pub enum VoiceRemovalError {
    #[error("mapped part index {part_index} does not exist (document has {part_count} parts)")]
    MissingPart {
        part_index: usize,
        part_count: usize,
    },
}

/// Multi-staff merge failures
#[derive(Debug, Clone, Error)]
pub enum StaffSimplificationError {
    #[error("cannot merge parts with different measure counts ({left} vs {right})")]
    MeasureCountMismatch { left: usize, right: usize },

    #[error("merge collision in measure {measure}: elements at identical offset {offset}")]
    OffsetCollision { measure: u32, offset: f64 },
}

/// Cross-voice unification failures
#[derive(Debug, Clone, Error)]
pub enum UnificationError {
    #[error("unification expects {expected} voices, got {found}")]
    VoiceCountMismatch { expected: usize, found: usize },

    #[error("voices disagree on measure count ({0} vs {1})")]
    MeasureCountMismatch(usize, usize),
}

/// Timing corruption caught by the guard around a content mutation.
///
/// Always fatal: the mutation has been reverted, and the run must not
/// proceed as if it had succeeded.
#[derive(Debug, Clone, Error)]
#[error("timing corruption in measure {measure}: {detail}")]
pub struct TimingCorruption {
    pub measure: u32,
    pub detail: String,
}

/// Top-level error wrapping any stage failure
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("voice identification failed: {0}")]
    Detection(#[from] VoiceDetectionError),

    #[error("voice removal failed: {0}")]
    Removal(#[from] VoiceRemovalError),

    #[error("staff simplification failed: {0}")]
    Simplification(#[from] StaffSimplificationError),

    #[error("unification failed: {0}")]
    Unification(#[from] UnificationError),

    #[error("timing guard aborted the run: {0}")]
    Timing(#[from] TimingCorruption),
}

impl ProcessingError {
    /// Name of the pipeline stage this error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            ProcessingError::Detection(_) => "identification",
            ProcessingError::Removal(_) | ProcessingError::Simplification(_) => "separation",
            ProcessingError::Unification(_) => "unification",
            ProcessingError::Timing(_) => "timing-guard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let err: ProcessingError = VoiceDetectionError::EmptyScore.into();
        assert_eq!(err.stage(), "identification");

        let err: ProcessingError = StaffSimplificationError::MeasureCountMismatch {
            left: 3,
            right: 4,
        }
        .into();
        assert_eq!(err.stage(), "separation");

        let err: ProcessingError = TimingCorruption {
            measure: 5,
            detail: "element shifted".to_string(),
        }
        .into();
        assert_eq!(err.stage(), "timing-guard");
    }

    #[test]
    fn test_error_messages_name_the_condition() {
        let err = VoiceDetectionError::BelowThreshold {
            best: 0.5,
            threshold: 0.6,
        };
        let message = err.to_string();
        assert!(message.contains("0.50"));
        assert!(message.contains("0.60"));
    }
}
