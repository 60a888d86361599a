//! Pipeline orchestration
//!
//! Runs identification, separation, reconciliation, and unification in
//! order, catching each stage's failures at the stage boundary and
//! aggregating warnings and errors into per-stage reports. A run with
//! only warnings still emits all voices; a run with an error aborts
//! before serialization and names the failing stage.

use serde::{Deserialize, Serialize};

use crate::models::ScoreDocument;

use super::errors::ProcessingError;
use super::identify::{self, VoiceMapping};
use super::separate::{self, ExtractedVoiceScore};
use super::settings::SplitSettings;
use super::spanners::{self, ReconciliationReport};
use super::unify::{self, UnificationReport};

/// Pipeline stage names, in execution order
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Identification,
    Separation,
    Reconciliation,
    Unification,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::Identification => "identification",
            StageKind::Separation => "separation",
            StageKind::Reconciliation => "reconciliation",
            StageKind::Unification => "unification",
        };
        write!(f, "{}", name)
    }
}

/// Per-stage outcome
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StageReport {
    pub stage: StageKind,
    pub success: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl StageReport {
    fn ok(stage: StageKind, warnings: Vec<String>) -> Self {
        Self {
            stage,
            success: true,
            warnings,
            errors: Vec::new(),
        }
    }
}

/// Result of a whole split run
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub voices: Vec<ExtractedVoiceScore>,
    pub mapping: VoiceMapping,
    pub stages: Vec<StageReport>,
    pub reconciliation: ReconciliationReport,
    pub unification: UnificationReport,
}

impl SplitOutcome {
    /// Overall success: zero errors across stages, warnings notwithstanding
    pub fn success(&self) -> bool {
        self.stages.iter().all(|s| s.errors.is_empty())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .flat_map(|s| s.warnings.iter().map(String::as_str))
    }

    /// Diagnostic report as pretty-printed JSON
    pub fn report_json(&self) -> serde_json::Result<String> {
        let report = SplitReport {
            mapping: &self.mapping,
            stages: &self.stages,
            preservation_rate: self.reconciliation.preservation_rate(),
            reconciliation: &self.reconciliation,
            unification: &self.unification,
        };
        serde_json::to_string_pretty(&report)
    }
}

/// Serializable view of the outcome, without the voice documents
#[derive(Serialize)]
struct SplitReport<'a> {
    mapping: &'a VoiceMapping,
    stages: &'a [StageReport],
    preservation_rate: f64,
    reconciliation: &'a ReconciliationReport,
    unification: &'a UnificationReport,
}

/// Run the full voice-separation pipeline on a source document.
///
/// The source and its spanners are read-only throughout; each voice is
/// built in its own private copy.
pub fn split_score(
    source: &ScoreDocument,
    settings: &SplitSettings,
) -> Result<SplitOutcome, ProcessingError> {
    let mut stages = Vec::with_capacity(4);

    log::info!(
        "splitting \"{}\" ({} parts, {} measures)",
        source.title.as_deref().unwrap_or("untitled"),
        source.parts.len(),
        source.measure_count()
    );

    let mapping = identify::analyze(source, settings).map_err(|err| {
        log::error!("identification failed: {}", err);
        ProcessingError::from(err)
    })?;
    stages.push(StageReport::ok(StageKind::Identification, Vec::new()));

    let separation = separate::separate(source, &mapping, settings).inspect_err(|err| {
        log::error!("separation failed: {}", err);
    })?;
    stages.push(StageReport::ok(
        StageKind::Separation,
        separation.warnings.clone(),
    ));
    let mut voices = separation.voices;

    let reconciliation = spanners::reconcile(source, &mut voices, settings);
    stages.push(StageReport::ok(
        StageKind::Reconciliation,
        reconciliation.warnings.clone(),
    ));

    let unification = unify::unify(&mut voices, settings).inspect_err(|err| {
        log::error!("unification failed: {}", err);
    })?;
    stages.push(StageReport::ok(
        StageKind::Unification,
        unification.warnings.clone(),
    ));

    Ok(SplitOutcome {
        voices,
        mapping,
        stages,
        reconciliation,
        unification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clef, Measure, Part, Pitch, TimedElement};

    fn closed_score() -> ScoreDocument {
        let mut doc = ScoreDocument::new();
        doc.title = Some("Test chorale".to_string());
        let specs = [(Clef::Treble, [(0u8, 5i8), (5, 4)]), (Clef::Bass, [(2, 3), (0, 3)])];
        for (part_no, (clef, lanes)) in specs.iter().enumerate() {
            let mut part = Part::new(format!("P{}", part_no + 1), "Staff", *clef);
            for number in 1..=3u32 {
                let mut measure = Measure::new(number);
                for (lane_no, (step, octave)) in lanes.iter().enumerate() {
                    let id = doc.allocate_id();
                    let pitch = Pitch::new(*step, 0, *octave).unwrap();
                    measure.insert_element(
                        Some(&format!("{}", lane_no + 1)),
                        TimedElement::note(id, pitch, 0.0, 4.0),
                    );
                }
                part.measures.push(measure);
            }
            doc.parts.push(part);
        }
        doc
    }

    #[test]
    fn test_full_pipeline_emits_four_voices() {
        let doc = closed_score();
        let outcome = split_score(&doc, &SplitSettings::default()).unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.voices.len(), 4);
        assert_eq!(outcome.stages.len(), 4);
        for voice in &outcome.voices {
            assert_eq!(voice.document.parts.len(), 1);
            assert_eq!(voice.document.measure_count(), 3);
        }
    }

    #[test]
    fn test_detection_failure_names_the_stage() {
        let doc = ScoreDocument::new();
        let err = split_score(&doc, &SplitSettings::default()).unwrap_err();
        assert_eq!(err.stage(), "identification");
    }

    #[test]
    fn test_report_serializes_to_json() {
        let doc = closed_score();
        let outcome = split_score(&doc, &SplitSettings::default()).unwrap();
        let json = outcome.report_json().unwrap();
        assert!(json.contains("preservation_rate"));
        assert!(json.contains("Identification"));
    }
}
