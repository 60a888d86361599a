//! Spanner reconciliation across separated voices
//!
//! Spanner references are identities inside the source document; after a
//! voice is copied and pruned those identities are dangling. Instead of
//! patching pointers, every original spanner is re-resolved symbolically
//! against each separated voice: elements are matched by pitch class and
//! octave, owning measure number, offset, and duration, and a fresh
//! spanner is built over the matches. Nothing is dropped silently; every
//! drop, skip, and fallback is recorded with a reason.

use serde::{Deserialize, Serialize};

use crate::models::{ElementId, Pitch, ScoreDocument, Spanner, SpannerKind};
use crate::utils::offsets_match;

use super::separate::ExtractedVoiceScore;
use super::settings::SplitSettings;

/// How much of the ensemble an original spanner turned out to touch
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpannerComplexity {
    /// No voice reaches the relevance threshold
    Unmatched,
    /// One relevant voice, at most one distinct matched element
    Simple,
    /// One relevant voice, several distinct matched elements
    ComplexSingleVoice,
    /// Several relevant voices on a non-structural kind
    CrossVoice,
    /// Tempo/pedal-like kinds, regardless of coverage
    Structural,
}

/// Repair strategy, selected from the complexity class
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    Basic,
    Contextual,
    Selective,
    Duplicate,
    Fallback,
}

impl RepairStrategy {
    fn for_complexity(complexity: SpannerComplexity) -> Option<Self> {
        match complexity {
            SpannerComplexity::Unmatched => None,
            SpannerComplexity::Simple => Some(RepairStrategy::Basic),
            SpannerComplexity::ComplexSingleVoice => Some(RepairStrategy::Contextual),
            SpannerComplexity::CrossVoice => Some(RepairStrategy::Selective),
            SpannerComplexity::Structural => Some(RepairStrategy::Duplicate),
        }
    }
}

/// One recorded drop/skip with its reason; nothing disappears silently
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DropRecord {
    pub spanner: String,
    /// Voice name, or `None` when the spanner was dropped everywhere
    pub voice: Option<String>,
    pub reason: String,
}

/// Outcome of the reconciliation stage
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub spanner_count: usize,
    pub voice_count: usize,
    /// Successfully attached (spanner, voice) pairs
    pub preserved: usize,
    /// Repairs that had to fall back to whole-voice anchoring
    pub fallbacks: usize,
    pub dropped: Vec<DropRecord>,
    pub warnings: Vec<String>,
}

impl ReconciliationReport {
    /// preserved / (spanner_count x voice_count)
    pub fn preservation_rate(&self) -> f64 {
        let total = self.spanner_count * self.voice_count;
        if total == 0 {
            return 1.0;
        }
        self.preserved as f64 / total as f64
    }
}

/// A source spanner reference resolved to its content key
#[derive(Debug, Clone)]
struct RefDescriptor {
    pitches: Vec<Pitch>,
    measure: u32,
    offset: f64,
    duration: f64,
}

/// One matchable element of a separated voice
#[derive(Debug, Clone)]
struct IndexedElement {
    id: ElementId,
    measure: u32,
    offset: f64,
    duration: f64,
    pitches: Vec<Pitch>,
}

/// Flat, matchable view of one voice's elements, with used-marking so two
/// references can never collapse onto the same element during one repair.
struct VoiceIndex {
    elements: Vec<IndexedElement>,
}

impl VoiceIndex {
    fn build(voice: &ExtractedVoiceScore) -> Self {
        let mut elements = Vec::new();
        for part in &voice.document.parts {
            for measure in &part.measures {
                for element in measure.all_elements() {
                    if element.is_rest() {
                        continue;
                    }
                    elements.push(IndexedElement {
                        id: element.id,
                        measure: measure.number,
                        offset: element.offset,
                        duration: element.duration,
                        pitches: element.pitches().to_vec(),
                    });
                }
            }
        }
        Self { elements }
    }

    fn matches_ref(&self, reference: &RefDescriptor) -> bool {
        self.elements
            .iter()
            .any(|e| pitch_overlap(&e.pitches, &reference.pitches))
    }

    /// Distinct elements matched by any reference of the spanner
    fn matched_element_count(&self, refs: &[RefDescriptor]) -> usize {
        self.elements
            .iter()
            .filter(|e| refs.iter().any(|r| pitch_overlap(&e.pitches, &r.pitches)))
            .count()
    }

    fn first_element(&self) -> Option<&IndexedElement> {
        self.elements.first()
    }

    fn last_element(&self) -> Option<&IndexedElement> {
        self.elements.last()
    }
}

fn pitch_overlap(element_pitches: &[Pitch], ref_pitches: &[Pitch]) -> bool {
    ref_pitches
        .iter()
        .any(|rp| element_pitches.iter().any(|ep| ep.sounds_like(rp)))
}

/// Re-resolve every source spanner against each separated voice and attach
/// the repaired copies. Originals are read-only templates; each attached
/// spanner is a fresh object owned by its voice's document.
pub fn reconcile(
    source: &ScoreDocument,
    voices: &mut [ExtractedVoiceScore],
    settings: &SplitSettings,
) -> ReconciliationReport {
    let mut report = ReconciliationReport {
        spanner_count: source.spanners.len(),
        voice_count: voices.len(),
        ..Default::default()
    };

    let indexes: Vec<VoiceIndex> = voices.iter().map(VoiceIndex::build).collect();

    for spanner in &source.spanners {
        reconcile_one(spanner, source, voices, &indexes, settings, &mut report);
    }

    log::info!(
        "spanner reconciliation: {}/{} pairs preserved ({:.0}%), {} dropped",
        report.preserved,
        report.spanner_count * report.voice_count,
        report.preservation_rate() * 100.0,
        report.dropped.len()
    );
    report
}

fn reconcile_one(
    spanner: &Spanner,
    source: &ScoreDocument,
    voices: &mut [ExtractedVoiceScore],
    indexes: &[VoiceIndex],
    settings: &SplitSettings,
    report: &mut ReconciliationReport,
) {
    let refs = resolve_refs(spanner, source, report);
    if refs.is_empty() {
        report.dropped.push(DropRecord {
            spanner: spanner.kind.label().to_string(),
            voice: None,
            reason: "no reference could be resolved in the source".to_string(),
        });
        return;
    }

    // Coverage ratio per voice: matched references over total references
    let coverage: Vec<f64> = indexes
        .iter()
        .map(|index| {
            refs.iter().filter(|r| index.matches_ref(r)).count() as f64 / refs.len() as f64
        })
        .collect();

    let relevant: Vec<usize> = coverage
        .iter()
        .enumerate()
        .filter(|(_, c)| **c >= settings.coverage_threshold)
        .map(|(i, _)| i)
        .collect();

    let complexity = classify(spanner, &refs, &relevant, indexes);

    if complexity == SpannerComplexity::Unmatched {
        log::debug!("{} matches no voice, dropped everywhere", spanner.kind.label());
        report.dropped.push(DropRecord {
            spanner: spanner.kind.label().to_string(),
            voice: None,
            reason: "no relevant voice (coverage below threshold)".to_string(),
        });
        return;
    }

    // Structural spanners are ensemble-wide and are duplicated into every
    // voice; all other classes repair only into their relevant voices.
    let targets: Vec<usize> = if complexity == SpannerComplexity::Structural {
        (0..voices.len()).collect()
    } else {
        relevant
    };

    let Some(strategy) = RepairStrategy::for_complexity(complexity) else {
        return;
    };

    for voice_index in targets {
        let outcome = repair(
            spanner,
            &refs,
            &indexes[voice_index],
            strategy,
            settings.offset_tolerance,
        );
        match outcome {
            Repaired::Attached { refs, used_fallback } => {
                let fresh = Spanner {
                    kind: spanner.kind.clone(),
                    refs,
                };
                voices[voice_index].document.spanners.push(fresh);
                report.preserved += 1;
                if used_fallback {
                    report.fallbacks += 1;
                    report.warnings.push(format!(
                        "{}: {} anchored to whole voice after unresolved reference",
                        voices[voice_index].name,
                        spanner.kind.label()
                    ));
                }
            }
            Repaired::Skipped(reason) => {
                log::debug!(
                    "{} skipped for {}: {}",
                    spanner.kind.label(),
                    voices[voice_index].name,
                    reason
                );
                report.dropped.push(DropRecord {
                    spanner: spanner.kind.label().to_string(),
                    voice: Some(voices[voice_index].name.clone()),
                    reason,
                });
            }
        }
    }
}

/// Resolve a spanner's identity references to content keys against the
/// source document. Unresolvable references are recorded and skipped.
fn resolve_refs(
    spanner: &Spanner,
    source: &ScoreDocument,
    report: &mut ReconciliationReport,
) -> Vec<RefDescriptor> {
    let mut refs = Vec::with_capacity(spanner.refs.len());
    for id in &spanner.refs {
        match source.find_element(*id) {
            Some(location) => refs.push(RefDescriptor {
                pitches: location.element.pitches().to_vec(),
                measure: location.measure_number,
                offset: location.element.offset,
                duration: location.element.duration,
            }),
            None => {
                report.warnings.push(format!(
                    "{}: reference {} not found in source document",
                    spanner.kind.label(),
                    id
                ));
            }
        }
    }
    refs
}

fn classify(
    spanner: &Spanner,
    refs: &[RefDescriptor],
    relevant: &[usize],
    indexes: &[VoiceIndex],
) -> SpannerComplexity {
    if spanner.kind.is_structural() {
        return SpannerComplexity::Structural;
    }
    match relevant.len() {
        0 => SpannerComplexity::Unmatched,
        1 => {
            let matched = indexes[relevant[0]].matched_element_count(refs);
            if matched <= 1 {
                SpannerComplexity::Simple
            } else {
                SpannerComplexity::ComplexSingleVoice
            }
        }
        _ => SpannerComplexity::CrossVoice,
    }
}

enum Repaired {
    Attached {
        refs: Vec<ElementId>,
        used_fallback: bool,
    },
    Skipped(String),
}

fn repair(
    spanner: &Spanner,
    refs: &[RefDescriptor],
    index: &VoiceIndex,
    strategy: RepairStrategy,
    tolerance: f64,
) -> Repaired {
    match strategy {
        RepairStrategy::Basic => repair_basic(refs, index),
        RepairStrategy::Contextual => repair_contextual(refs, index, tolerance),
        RepairStrategy::Selective => repair_selective(spanner, refs, index, tolerance),
        RepairStrategy::Duplicate => repair_duplicate(index),
        RepairStrategy::Fallback => repair_fallback(index),
    }
}

/// Basic repair: each reference binds to the unique same-pitch element,
/// preferring one that also shares the measure number.
fn repair_basic(refs: &[RefDescriptor], index: &VoiceIndex) -> Repaired {
    let mut bound = Vec::with_capacity(refs.len());
    for reference in refs {
        let candidates: Vec<&IndexedElement> = index
            .elements
            .iter()
            .filter(|e| pitch_overlap(&e.pitches, &reference.pitches))
            .collect();

        let chosen = match candidates.len() {
            0 => return Repaired::Skipped("a reference has no same-pitch element".to_string()),
            1 => candidates[0],
            _ => {
                let same_measure: Vec<&&IndexedElement> = candidates
                    .iter()
                    .filter(|e| e.measure == reference.measure)
                    .collect();
                match same_measure.len() {
                    1 => *same_measure[0],
                    _ => {
                        return Repaired::Skipped(
                            "a reference has no unique same-pitch element".to_string(),
                        )
                    }
                }
            }
        };
        bound.push(chosen.id);
    }

    bound.dedup();
    Repaired::Attached {
        refs: bound,
        used_fallback: false,
    }
}

/// Contextual repair: walk references in order, greedily binding each to
/// the best still-unused matching element. Marking elements as used keeps
/// two references from collapsing onto one element. An unresolved
/// reference degrades the whole repair to the fallback strategy.
fn repair_contextual(refs: &[RefDescriptor], index: &VoiceIndex, tolerance: f64) -> Repaired {
    let mut used: Vec<ElementId> = Vec::new();
    let mut bound = Vec::with_capacity(refs.len());

    for reference in refs {
        let best = index
            .elements
            .iter()
            .filter(|e| !used.contains(&e.id))
            .filter(|e| pitch_overlap(&e.pitches, &reference.pitches))
            .min_by(|a, b| candidate_rank(a, reference, tolerance)
                .partial_cmp(&candidate_rank(b, reference, tolerance))
                .unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some(element) => {
                used.push(element.id);
                bound.push(element.id);
            }
            None => {
                return match repair_fallback(index) {
                    Repaired::Attached { refs, .. } => Repaired::Attached {
                        refs,
                        used_fallback: true,
                    },
                    skipped => skipped,
                };
            }
        }
    }

    Repaired::Attached {
        refs: bound,
        used_fallback: false,
    }
}

/// Ranking key: same measure first, then offset difference within the
/// tolerance, then raw offset difference.
fn candidate_rank(element: &IndexedElement, reference: &RefDescriptor, tolerance: f64) -> (u8, u8, f64) {
    let measure_penalty = u8::from(element.measure != reference.measure);
    let delta = (element.offset - reference.offset).abs();
    let beyond_tolerance = u8::from(!offsets_match(element.offset, reference.offset, tolerance));
    (measure_penalty, beyond_tolerance, delta)
}

/// Selective repair for cross-voice spanners: keep only the matched
/// subsequence of references, in original order.
fn repair_selective(
    spanner: &Spanner,
    refs: &[RefDescriptor],
    index: &VoiceIndex,
    tolerance: f64,
) -> Repaired {
    let mut used: Vec<ElementId> = Vec::new();
    let mut bound = Vec::new();

    for reference in refs {
        let best = index
            .elements
            .iter()
            .filter(|e| !used.contains(&e.id))
            .filter(|e| pitch_overlap(&e.pitches, &reference.pitches))
            .min_by(|a, b| candidate_rank(a, reference, tolerance)
                .partial_cmp(&candidate_rank(b, reference, tolerance))
                .unwrap_or(std::cmp::Ordering::Equal));
        if let Some(element) = best {
            used.push(element.id);
            bound.push(element.id);
        }
    }

    match bound.len() {
        0 => Repaired::Skipped(format!(
            "{} has no matched subsequence in this voice",
            spanner.kind.label()
        )),
        _ => Repaired::Attached {
            refs: bound,
            used_fallback: false,
        },
    }
}

/// Structural repair: anchor to the voice's first available element
fn repair_duplicate(index: &VoiceIndex) -> Repaired {
    match index.first_element() {
        Some(first) => Repaired::Attached {
            refs: vec![first.id],
            used_fallback: false,
        },
        None => Repaired::Skipped("voice has no elements to anchor to".to_string()),
    }
}

/// Last resort: anchor start/end to the voice's first/last element
fn repair_fallback(index: &VoiceIndex) -> Repaired {
    match (index.first_element(), index.last_element()) {
        (Some(first), Some(last)) if first.id != last.id => Repaired::Attached {
            refs: vec![first.id, last.id],
            used_fallback: false,
        },
        (Some(first), _) => Repaired::Attached {
            refs: vec![first.id],
            used_fallback: false,
        },
        _ => Repaired::Skipped("voice has no elements to anchor to".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clef, Measure, Part, TimedElement};
    use crate::split::identify::analyze;
    use crate::split::separate::separate;
    use crate::split::VoicePart;

    fn pitch(step: u8, octave: i8) -> Pitch {
        Pitch::new(step, 0, octave).unwrap()
    }

    /// Closed score where measure 10 of the upper staff carries a G4-A4
    /// pair in the alto lane.
    fn fixture() -> (ScoreDocument, ElementId, ElementId) {
        let mut doc = ScoreDocument::new();
        let mut upper = Part::new("P1", "Upper", Clef::Treble);
        let mut lower = Part::new("P2", "Lower", Clef::Bass);
        let mut slur_start = 0;
        let mut slur_stop = 0;

        for number in 1..=10u32 {
            let mut up = Measure::new(number);
            let id = doc.allocate_id();
            up.insert_element(Some("1"), TimedElement::note(id, pitch(0, 5), 0.0, 4.0));
            if number == 10 {
                slur_start = doc.allocate_id();
                up.insert_element(
                    Some("2"),
                    TimedElement::note(slur_start, pitch(4, 4), 0.0, 1.0),
                );
                slur_stop = doc.allocate_id();
                up.insert_element(
                    Some("2"),
                    TimedElement::note(slur_stop, pitch(5, 4), 1.0, 3.0),
                );
            } else {
                let id = doc.allocate_id();
                up.insert_element(Some("2"), TimedElement::note(id, pitch(2, 4), 0.0, 4.0));
            }
            upper.measures.push(up);

            let mut low = Measure::new(number);
            let id = doc.allocate_id();
            low.insert_element(Some("1"), TimedElement::note(id, pitch(2, 3), 0.0, 4.0));
            let id = doc.allocate_id();
            low.insert_element(Some("2"), TimedElement::note(id, pitch(0, 3), 0.0, 4.0));
            lower.measures.push(low);
        }

        doc.parts.push(upper);
        doc.parts.push(lower);
        (doc, slur_start, slur_stop)
    }

    fn separated(doc: &ScoreDocument) -> Vec<ExtractedVoiceScore> {
        let settings = SplitSettings::default();
        let mapping = analyze(doc, &settings).unwrap();
        separate(doc, &mapping, &settings).unwrap().voices
    }

    #[test]
    fn test_single_voice_slur_stays_in_its_voice() {
        let (mut doc, start, stop) = fixture();
        doc.spanners
            .push(Spanner::new(SpannerKind::Slur, vec![start, stop]).unwrap());

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        let alto = &voices[VoicePart::Alto.index()];
        let slurs: Vec<&Spanner> = alto
            .document
            .spanners
            .iter()
            .filter(|s| s.kind == SpannerKind::Slur)
            .collect();
        assert_eq!(slurs.len(), 1, "alto should own the slur");

        for other in [VoicePart::Soprano, VoicePart::Tenor, VoicePart::Bass] {
            assert!(
                voices[other.index()].document.spanners.is_empty(),
                "{:?} should not receive the alto slur",
                other
            );
        }
        assert_eq!(report.preserved, 1);
    }

    #[test]
    fn test_two_refs_repair_to_distinct_endpoints() {
        let (mut doc, start, stop) = fixture();
        doc.spanners
            .push(Spanner::new(SpannerKind::Slur, vec![start, stop]).unwrap());

        let mut voices = separated(&doc);
        reconcile(&doc, &mut voices, &SplitSettings::default());

        let alto = &voices[VoicePart::Alto.index()];
        let slur = &alto.document.spanners[0];
        assert_eq!(slur.refs.len(), 2);
        assert_ne!(
            slur.refs[0], slur.refs[1],
            "endpoints must never collapse onto one element"
        );

        let first = alto.document.find_element(slur.refs[0]).unwrap();
        let second = alto.document.find_element(slur.refs[1]).unwrap();
        assert_eq!(first.measure_number, 10);
        assert_eq!(second.measure_number, 10);
        assert_eq!(first.element.offset, 0.0);
        assert_eq!(second.element.offset, 1.0);
    }

    #[test]
    fn test_unmatchable_spanner_dropped_with_reason() {
        let (mut doc, _, _) = fixture();
        // Measure 11 carries the usual lanes plus a lane "9" whose B8
        // pitches survive in no separated voice.
        let mut ghost = Measure::new(11);
        let id = doc.allocate_id();
        ghost.insert_element(Some("1"), TimedElement::note(id, pitch(0, 5), 0.0, 4.0));
        let id = doc.allocate_id();
        ghost.insert_element(Some("2"), TimedElement::note(id, pitch(2, 4), 0.0, 4.0));
        let a = doc.allocate_id();
        ghost.insert_element(Some("9"), TimedElement::note(a, pitch(6, 8), 0.0, 2.0));
        let b = doc.allocate_id();
        ghost.insert_element(Some("9"), TimedElement::note(b, pitch(6, 8), 2.0, 2.0));
        doc.spanners
            .push(Spanner::new(SpannerKind::Slur, vec![a, b]).unwrap());
        doc.parts[0].measures.push(ghost);

        let mut low = Measure::new(11);
        let id = doc.allocate_id();
        low.insert_element(Some("1"), TimedElement::note(id, pitch(2, 3), 0.0, 4.0));
        let id = doc.allocate_id();
        low.insert_element(Some("2"), TimedElement::note(id, pitch(0, 3), 0.0, 4.0));
        doc.parts[1].measures.push(low);

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        assert_eq!(report.preserved, 0);
        assert_eq!(report.dropped.len(), 1);
        assert!(report.dropped[0].reason.contains("no relevant voice"));
        assert_eq!(report.dropped[0].voice, None, "dropped everywhere");
    }

    #[test]
    fn test_simple_spanner_binds_unique_element() {
        let (mut doc, start, _) = fixture();
        // Both references resolve to the single alto G4: one distinct
        // matched element, so the basic strategy applies and the bound
        // references collapse to a single anchor.
        doc.spanners
            .push(Spanner::new(SpannerKind::Tie, vec![start, start]).unwrap());

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        let alto = &voices[VoicePart::Alto.index()];
        assert_eq!(alto.document.spanners.len(), 1);
        assert_eq!(alto.document.spanners[0].refs.len(), 1);
        assert_eq!(report.preserved, 1);
    }

    #[test]
    fn test_unresolved_reference_falls_back_to_whole_voice() {
        let (mut doc, start, stop) = fixture();
        // Third reference repeats the G4; after greedy binding marks both
        // alto matches used, it cannot resolve and the repair degrades to
        // whole-voice anchoring.
        doc.spanners
            .push(Spanner::new(SpannerKind::Slur, vec![start, stop, start]).unwrap());

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.preserved, 1);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("anchored to whole voice")));

        let alto = &voices[VoicePart::Alto.index()];
        let spanner = &alto.document.spanners[0];
        assert_eq!(spanner.refs.len(), 2);
        let first = alto.document.find_element(spanner.refs[0]).unwrap();
        let last = alto.document.find_element(spanner.refs[1]).unwrap();
        assert_eq!(first.measure_number, 1);
        assert_eq!(last.measure_number, 10);
    }

    #[test]
    fn test_cross_voice_spanner_keeps_matched_subsequence() {
        let (mut doc, start, stop) = fixture();
        // Soprano sings C5 everywhere; a wedge from the alto G4 through two
        // soprano C5s is relevant to both voices.
        let soprano_m1 = doc.parts[0].measures[0].lanes[0].elements[0].id;
        let soprano_m2 = doc.parts[0].measures[1].lanes[0].elements[0].id;
        doc.spanners.push(
            Spanner::new(
                SpannerKind::Crescendo,
                vec![soprano_m1, start, soprano_m2, stop],
            )
            .unwrap(),
        );

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        let soprano = &voices[VoicePart::Soprano.index()];
        let wedge = soprano
            .document
            .spanners
            .iter()
            .find(|s| s.kind == SpannerKind::Crescendo)
            .expect("soprano keeps its subsequence");
        assert_eq!(wedge.refs.len(), 2);

        let alto = &voices[VoicePart::Alto.index()];
        let alto_wedge = alto
            .document
            .spanners
            .iter()
            .find(|s| s.kind == SpannerKind::Crescendo)
            .expect("alto keeps its subsequence");
        assert_eq!(alto_wedge.refs.len(), 2);

        assert_eq!(report.preserved, 2);
    }

    #[test]
    fn test_structural_spanner_duplicated_to_every_voice() {
        let (mut doc, start, stop) = fixture();
        doc.spanners.push(
            Spanner::new(SpannerKind::Other("pedal".to_string()), vec![start, stop]).unwrap(),
        );

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        for voice in &voices {
            assert_eq!(
                voice.document.spanners.len(),
                1,
                "{} should carry the pedal anchor",
                voice.name
            );
            assert_eq!(voice.document.spanners[0].refs.len(), 1);
        }
        assert_eq!(report.preserved, 4);
        assert_eq!(report.preservation_rate(), 1.0);
    }

    #[test]
    fn test_preservation_rate_counts_pairs() {
        let (mut doc, start, stop) = fixture();
        doc.spanners
            .push(Spanner::new(SpannerKind::Slur, vec![start, stop]).unwrap());

        let mut voices = separated(&doc);
        let report = reconcile(&doc, &mut voices, &SplitSettings::default());

        assert_eq!(report.spanner_count, 1);
        assert_eq!(report.voice_count, 4);
        assert_eq!(report.preservation_rate(), 0.25);
    }

    #[test]
    fn test_originals_never_mutated() {
        let (mut doc, start, stop) = fixture();
        doc.spanners
            .push(Spanner::new(SpannerKind::Slur, vec![start, stop]).unwrap());
        let before = doc.clone();

        let mut voices = separated(&doc);
        reconcile(&doc, &mut voices, &SplitSettings::default());
        assert_eq!(doc, before);
    }
}
