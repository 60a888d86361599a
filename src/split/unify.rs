//! Cross-voice unification of shared annotations
//!
//! After separation and reconciliation each voice only carries what its
//! own staff carried in the source. Dynamics, lyrics, and tempo marks are
//! conceptually ensemble-wide: this stage propagates them across the four
//! voices. All three rules are idempotent; re-applying them to an
//! already-unified set changes nothing, because every insertion is gated
//! on the annotation being absent.

use serde::{Deserialize, Serialize};

use crate::models::{
    Direction, DirectionKind, DynamicMark, ElementId, Lyric, SpannerKind, TempoMark,
};
use crate::utils::{offsets_match, within_window};

use super::errors::{ProcessingError, TimingCorruption, UnificationError};
use super::guard;
use super::separate::ExtractedVoiceScore;
use super::settings::SplitSettings;
use super::VoicePart;

/// Outcome of the unification stage
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UnificationReport {
    pub dynamics_added: usize,
    pub lyrics_added: usize,
    pub tempos_added: usize,
    pub warnings: Vec<String>,
}

/// Propagate ensemble-wide annotations across all voices.
///
/// Must run only after every voice has completed separation and
/// reconciliation: it reads and writes across all of them.
pub fn unify(
    voices: &mut [ExtractedVoiceScore],
    settings: &SplitSettings,
) -> Result<UnificationReport, ProcessingError> {
    if voices.len() != VoicePart::ALL.len() {
        return Err(UnificationError::VoiceCountMismatch {
            expected: VoicePart::ALL.len(),
            found: voices.len(),
        }
        .into());
    }
    let measure_counts: Vec<usize> = voices
        .iter()
        .map(|v| v.document.measure_count())
        .collect();
    if let Some(&first) = measure_counts.first() {
        if let Some(&bad) = measure_counts.iter().find(|&&c| c != first) {
            return Err(UnificationError::MeasureCountMismatch(first, bad).into());
        }
    }

    let mut report = UnificationReport::default();
    unify_dynamics(voices, settings, &mut report)?;
    unify_lyrics(voices, settings, &mut report);
    unify_tempo(voices, settings, &mut report)?;

    log::info!(
        "unification: {} dynamics, {} lyrics, {} tempo marks propagated",
        report.dynamics_added,
        report.lyrics_added,
        report.tempos_added
    );
    Ok(report)
}

/// A dynamic occurrence key: measure number, offset, mark
#[derive(Debug, Clone, Copy, PartialEq)]
struct DynamicKey {
    measure: u32,
    offset: f64,
    mark: DynamicMark,
}

fn collect_dynamics(voice: &ExtractedVoiceScore) -> Vec<DynamicKey> {
    let mut keys = Vec::new();
    for part in &voice.document.parts {
        for measure in &part.measures {
            for direction in &measure.directions {
                if let DirectionKind::Dynamic(mark) = &direction.kind {
                    keys.push(DynamicKey {
                        measure: measure.number,
                        offset: direction.offset,
                        mark: *mark,
                    });
                }
            }
        }
    }
    keys
}

fn has_dynamic(voice: &ExtractedVoiceScore, key: &DynamicKey, tolerance: f64) -> bool {
    collect_dynamics(voice).iter().any(|k| {
        k.measure == key.measure
            && k.mark == key.mark
            && offsets_match(k.offset, key.offset, tolerance)
    })
}

/// Dynamics rule: a (measure, offset, value) triple present in at least
/// two voices, or present only in the lead voice, is copied into every
/// voice lacking it at that key.
fn unify_dynamics(
    voices: &mut [ExtractedVoiceScore],
    settings: &SplitSettings,
    report: &mut UnificationReport,
) -> Result<(), TimingCorruption> {
    let tolerance = settings.offset_tolerance;
    let lead = settings.lead_voice.index();

    // Candidate keys, deduplicated within tolerance
    let mut candidates: Vec<DynamicKey> = Vec::new();
    for voice in voices.iter() {
        for key in collect_dynamics(voice) {
            let seen = candidates.iter().any(|k| {
                k.measure == key.measure
                    && k.mark == key.mark
                    && offsets_match(k.offset, key.offset, tolerance)
            });
            if !seen {
                candidates.push(key);
            }
        }
    }

    for key in candidates {
        let holders = voices
            .iter()
            .filter(|v| has_dynamic(v, &key, tolerance))
            .count();
        let lead_has = has_dynamic(&voices[lead], &key, tolerance);
        if holders < 2 && !lead_has {
            continue;
        }

        log::debug!(
            "propagating dynamic {} at measure {} offset {}",
            key.mark.as_str(),
            key.measure,
            key.offset
        );

        for voice in voices.iter_mut() {
            if has_dynamic(voice, &key, tolerance) {
                continue;
            }
            let measure = voice.document.parts[0]
                .measures
                .iter_mut()
                .find(|m| m.number == key.measure);
            if let Some(measure) = measure {
                guard::guarded_push_direction(
                    measure,
                    Direction::dynamic(key.offset, key.mark),
                    tolerance,
                )?;
                report.dynamics_added += 1;
            }
        }
    }

    Ok(())
}

/// Total lyric syllable count of one voice
fn syllable_count(voice: &ExtractedVoiceScore) -> usize {
    voice.document.parts[0]
        .measures
        .iter()
        .flat_map(|m| m.all_elements())
        .map(|e| e.lyrics.len())
        .sum()
}

/// Element ids that are non-initial members of a slur in this voice
fn non_initial_slur_members(voice: &ExtractedVoiceScore) -> Vec<ElementId> {
    voice
        .document
        .spanners
        .iter()
        .filter(|s| s.kind == SpannerKind::Slur)
        .flat_map(|s| s.refs.iter().skip(1).copied())
        .collect()
}

/// Lyrics rule: when the lead voice dominates (syllable count at least
/// `lyric_dominance` times every other voice), each lead syllable is
/// offered to the other voices. A target note must lack a lyric, start
/// within the syllable's time window, and not be a non-initial slur
/// member. Existing lyrics are never overwritten.
fn unify_lyrics(
    voices: &mut [ExtractedVoiceScore],
    settings: &SplitSettings,
    report: &mut UnificationReport,
) {
    let lead = settings.lead_voice.index();
    let lead_count = syllable_count(&voices[lead]);
    let max_other = voices
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != lead)
        .map(|(_, v)| syllable_count(v))
        .max()
        .unwrap_or(0);

    if lead_count == 0 || (lead_count as f64) < settings.lyric_dominance * max_other as f64 {
        log::debug!(
            "lyric propagation inactive (lead {} syllables, max other {})",
            lead_count,
            max_other
        );
        return;
    }

    // (measure number, offset, duration, lyrics) per lead syllable carrier
    let lead_syllables: Vec<(u32, f64, f64, Vec<Lyric>)> = voices[lead].document.parts[0]
        .measures
        .iter()
        .flat_map(|m| {
            m.all_elements()
                .filter(|e| !e.lyrics.is_empty())
                .map(|e| (m.number, e.offset, e.duration, e.lyrics.clone()))
                .collect::<Vec<_>>()
        })
        .collect();

    for (index, voice) in voices.iter_mut().enumerate() {
        if index == lead {
            continue;
        }
        let blocked = non_initial_slur_members(voice);

        for (measure_number, offset, duration, lyrics) in &lead_syllables {
            let Some(measure) = voice.document.parts[0]
                .measures
                .iter_mut()
                .find(|m| m.number == *measure_number)
            else {
                continue;
            };

            // Best candidate: longest duration, then earliest offset
            let candidate = measure
                .all_elements_mut()
                .filter(|e| !e.is_rest())
                .filter(|e| e.lyrics.is_empty())
                .filter(|e| within_window(e.offset, *offset, *duration))
                .filter(|e| !blocked.contains(&e.id))
                .max_by(|a, b| {
                    a.duration
                        .total_cmp(&b.duration)
                        .then(b.offset.total_cmp(&a.offset))
                });

            if let Some(element) = candidate {
                element.lyrics = lyrics.clone();
                report.lyrics_added += 1;
            }
        }
    }
}

/// A tempo occurrence key: measure number and offset
fn collect_tempos(voice: &ExtractedVoiceScore) -> Vec<(u32, f64, TempoMark)> {
    let mut keys = Vec::new();
    for part in &voice.document.parts {
        for measure in &part.measures {
            for direction in &measure.directions {
                if let DirectionKind::Tempo(mark) = &direction.kind {
                    keys.push((measure.number, direction.offset, mark.clone()));
                }
            }
        }
    }
    keys
}

fn has_tempo_at(voice: &ExtractedVoiceScore, measure: u32, offset: f64, tolerance: f64) -> bool {
    collect_tempos(voice)
        .iter()
        .any(|(m, o, _)| *m == measure && offsets_match(*o, offset, tolerance))
}

/// Tempo rule: any tempo marking at (measure, offset) is copied to voices
/// lacking one there.
fn unify_tempo(
    voices: &mut [ExtractedVoiceScore],
    settings: &SplitSettings,
    report: &mut UnificationReport,
) -> Result<(), TimingCorruption> {
    let tolerance = settings.offset_tolerance;

    let mut candidates: Vec<(u32, f64, TempoMark)> = Vec::new();
    for voice in voices.iter() {
        for (measure, offset, mark) in collect_tempos(voice) {
            let seen = candidates
                .iter()
                .any(|(m, o, _)| *m == measure && offsets_match(*o, offset, tolerance));
            if !seen {
                candidates.push((measure, offset, mark));
            }
        }
    }

    for (measure_number, offset, mark) in candidates {
        for voice in voices.iter_mut() {
            if has_tempo_at(voice, measure_number, offset, tolerance) {
                continue;
            }
            let measure = voice.document.parts[0]
                .measures
                .iter_mut()
                .find(|m| m.number == measure_number);
            if let Some(measure) = measure {
                guard::guarded_push_direction(
                    measure,
                    Direction::tempo(offset, mark.clone()),
                    tolerance,
                )?;
                report.tempos_added += 1;
            }
        }
    }

    Ok(())
}
