//! Voice-layout identification
//!
//! Inspects the staff/voice-lane layout of the source document and proposes
//! a mapping from the four target voices to (part, lane) locations. Each
//! layout detector independently yields an optional mapping with a
//! confidence; the highest-confidence valid candidate wins. Lanes are
//! always assigned by rank within their part (declaration order,
//! corroborated by mean pitch), never by a literal lane-id string.

use serde::{Deserialize, Serialize};

use crate::models::{Clef, ScoreDocument};

use super::errors::VoiceDetectionError;
use super::settings::SplitSettings;
use super::VoicePart;

/// Statistics for one voice lane of a part
#[derive(Debug, Clone)]
pub struct LaneProfile {
    /// Lane identifier; `None` for unlayered (bare) content
    pub id: Option<String>,
    pub note_count: usize,
    /// Mean MIDI pitch over the lane's notes, if it has any
    pub mean_pitch: Option<f64>,
}

/// Per-part layout information
#[derive(Debug, Clone)]
pub struct PartProfile {
    pub index: usize,
    pub name: String,
    pub clef: Clef,
    /// Lanes in declaration order (order of first appearance)
    pub lanes: Vec<LaneProfile>,
    pub note_count: usize,
    pub mean_pitch: Option<f64>,
    /// Lowest and highest MIDI pitch present
    pub pitch_range: Option<(i32, i32)>,
}

/// Location of one voice in the source document
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoiceLocation {
    pub part_index: usize,
    /// Lane identifier within the part; `None` selects unlayered content
    pub voice_id: Option<String>,
    pub clef: Clef,
    pub confidence: f64,
}

/// Recognized score layout
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreLayout {
    ClosedScore,
    OpenScore,
    SingleStaff,
    Positional,
}

/// Mapping from the four target voices to source locations
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoiceMapping {
    pub soprano: VoiceLocation,
    pub alto: VoiceLocation,
    pub tenor: VoiceLocation,
    pub bass: VoiceLocation,
    pub confidence: f64,
    pub layout: ScoreLayout,
}

impl VoiceMapping {
    pub fn get(&self, voice: VoicePart) -> &VoiceLocation {
        match voice {
            VoicePart::Soprano => &self.soprano,
            VoicePart::Alto => &self.alto,
            VoicePart::Tenor => &self.tenor,
            VoicePart::Bass => &self.bass,
        }
    }

    pub fn entries(&self) -> [(VoicePart, &VoiceLocation); 4] {
        [
            (VoicePart::Soprano, &self.soprano),
            (VoicePart::Alto, &self.alto),
            (VoicePart::Tenor, &self.tenor),
            (VoicePart::Bass, &self.bass),
        ]
    }

    /// A mapping is valid iff no two voices share the same
    /// (part_index, voice_id) location.
    pub fn is_valid(&self) -> bool {
        let entries = self.entries();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let a = entries[i].1;
                let b = entries[j].1;
                if a.part_index == b.part_index && a.voice_id == b.voice_id {
                    return false;
                }
            }
        }
        true
    }

    /// Rank of a voice among the mapping entries that share its part,
    /// in soprano-to-bass order. Used as the positional fallback index
    /// when the mapped lane is absent from a measure.
    pub fn lane_rank(&self, voice: VoicePart) -> usize {
        let part_index = self.get(voice).part_index;
        self.entries()
            .iter()
            .filter(|(_, loc)| loc.part_index == part_index)
            .position(|(v, _)| *v == voice)
            .unwrap_or(0)
    }
}

fn record_lane(
    key: Option<&str>,
    pitches: &[crate::models::Pitch],
    lane_order: &mut Vec<Option<String>>,
    lane_stats: &mut Vec<(i64, usize)>,
) {
    let pos = match lane_order.iter().position(|k| k.as_deref() == key) {
        Some(pos) => pos,
        None => {
            lane_order.push(key.map(str::to_string));
            lane_stats.push((0, 0));
            lane_order.len() - 1
        }
    };
    for pitch in pitches {
        lane_stats[pos].0 += pitch.midi_number() as i64;
        lane_stats[pos].1 += 1;
    }
}

/// Compute layout profiles for every part of the document
pub fn profile_parts(doc: &ScoreDocument) -> Vec<PartProfile> {
    doc.parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            // Lane declaration order: order of first appearance across measures
            let mut lane_order: Vec<Option<String>> = Vec::new();
            let mut lane_stats: Vec<(i64, usize)> = Vec::new(); // (midi sum, note count)

            let mut min_pitch = i32::MAX;
            let mut max_pitch = i32::MIN;
            let mut total_notes = 0usize;
            let mut midi_sum = 0i64;

            for measure in &part.measures {
                for lane in &measure.lanes {
                    record_lane(Some(&lane.id), &[], &mut lane_order, &mut lane_stats);
                    for element in &lane.elements {
                        record_lane(
                            Some(&lane.id),
                            element.pitches(),
                            &mut lane_order,
                            &mut lane_stats,
                        );
                    }
                }
                for element in &measure.elements {
                    record_lane(None, element.pitches(), &mut lane_order, &mut lane_stats);
                }
            }

            for measure in &part.measures {
                for element in measure.all_elements() {
                    for pitch in element.pitches() {
                        let midi = pitch.midi_number();
                        min_pitch = min_pitch.min(midi);
                        max_pitch = max_pitch.max(midi);
                        midi_sum += midi as i64;
                        total_notes += 1;
                    }
                }
            }

            let lanes = lane_order
                .into_iter()
                .zip(lane_stats)
                .map(|(id, (sum, count))| LaneProfile {
                    id,
                    note_count: count,
                    mean_pitch: (count > 0).then(|| sum as f64 / count as f64),
                })
                .collect();

            PartProfile {
                index,
                name: part.name.clone(),
                clef: part.clef,
                lanes,
                note_count: total_notes,
                mean_pitch: (total_notes > 0).then(|| midi_sum as f64 / total_notes as f64),
                pitch_range: (total_notes > 0).then_some((min_pitch, max_pitch)),
            }
        })
        .collect()
}

/// Analyze the document layout and propose a voice mapping
pub fn analyze(
    doc: &ScoreDocument,
    settings: &SplitSettings,
) -> Result<VoiceMapping, VoiceDetectionError> {
    if doc.parts.is_empty() {
        return Err(VoiceDetectionError::EmptyScore);
    }

    let profiles = profile_parts(doc);

    let candidates: Vec<VoiceMapping> = [
        detect_closed_score(&profiles),
        detect_open_score(&profiles),
        detect_single_staff(&profiles),
        detect_positional(&profiles),
    ]
    .into_iter()
    .flatten()
    .filter(VoiceMapping::is_valid)
    .collect();

    let best = candidates
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .ok_or(VoiceDetectionError::Unrecognized)?;

    log::info!(
        "layout detection: {:?} at confidence {:.2}",
        best.layout,
        best.confidence
    );

    if best.confidence < settings.acceptance_threshold {
        if settings.allow_low_confidence {
            log::warn!(
                "accepting low-confidence mapping {:.2} (threshold {:.2})",
                best.confidence,
                settings.acceptance_threshold
            );
            return Ok(best);
        }
        return Err(VoiceDetectionError::BelowThreshold {
            best: best.confidence,
            threshold: settings.acceptance_threshold,
        });
    }

    Ok(best)
}

/// Pick the first two lanes by declaration order, swapping the pair when
/// their mean pitches contradict the ranking.
fn ranked_lane_pair(profile: &PartProfile) -> Option<(&LaneProfile, &LaneProfile)> {
    if profile.lanes.len() < 2 {
        return None;
    }
    let (upper, lower) = (&profile.lanes[0], &profile.lanes[1]);
    if let (Some(a), Some(b)) = (upper.mean_pitch, lower.mean_pitch) {
        if a < b {
            log::warn!(
                "lane ranking in part {} contradicted by pitch (means {:.1} < {:.1}); swapping",
                profile.index,
                a,
                b
            );
            return Some((lower, upper));
        }
    }
    Some((upper, lower))
}

fn location(profile: &PartProfile, lane: &LaneProfile, confidence: f64) -> VoiceLocation {
    VoiceLocation {
        part_index: profile.index,
        voice_id: lane.id.clone(),
        clef: profile.clef,
        confidence,
    }
}

/// Closed score: two staves, each carrying two voices as lanes
fn detect_closed_score(profiles: &[PartProfile]) -> Option<VoiceMapping> {
    if profiles.len() != 2 {
        return None;
    }
    if profiles.iter().any(|p| p.lanes.len() < 2) {
        return None;
    }

    let treble = profiles.iter().find(|p| p.clef.is_treble_family())?;
    let bass = profiles.iter().find(|p| p.clef.is_bass_family())?;
    if treble.index == bass.index {
        return None;
    }

    let confidence = 0.9;
    let (soprano_lane, alto_lane) = ranked_lane_pair(treble)?;
    let (tenor_lane, bass_lane) = ranked_lane_pair(bass)?;

    Some(VoiceMapping {
        soprano: location(treble, soprano_lane, confidence),
        alto: location(treble, alto_lane, confidence),
        tenor: location(bass, tenor_lane, confidence),
        bass: location(bass, bass_lane, confidence),
        confidence,
        layout: ScoreLayout::ClosedScore,
    })
}

/// Open score: four single-lane parts, ranked by descending mean pitch
fn detect_open_score(profiles: &[PartProfile]) -> Option<VoiceMapping> {
    if profiles.len() != 4 {
        return None;
    }
    if profiles.iter().any(|p| p.lanes.len() > 1 || p.note_count == 0) {
        return None;
    }

    let mut ranked: Vec<&PartProfile> = profiles.iter().collect();
    ranked.sort_by(|a, b| {
        b.mean_pitch
            .unwrap_or(f64::MIN)
            .total_cmp(&a.mean_pitch.unwrap_or(f64::MIN))
    });

    let confidence = 0.8;
    let locate = |profile: &PartProfile| VoiceLocation {
        part_index: profile.index,
        voice_id: profile.lanes.first().and_then(|l| l.id.clone()),
        clef: profile.clef,
        confidence,
    };

    Some(VoiceMapping {
        soprano: locate(ranked[0]),
        alto: locate(ranked[1]),
        tenor: locate(ranked[2]),
        bass: locate(ranked[3]),
        confidence,
        layout: ScoreLayout::OpenScore,
    })
}

/// Single staff carrying all four voices as lanes, in declaration order
fn detect_single_staff(profiles: &[PartProfile]) -> Option<VoiceMapping> {
    if profiles.len() != 1 {
        return None;
    }
    let profile = &profiles[0];
    if profile.lanes.len() < 4 {
        return None;
    }

    let confidence = 0.7;
    Some(VoiceMapping {
        soprano: location(profile, &profile.lanes[0], confidence),
        alto: location(profile, &profile.lanes[1], confidence),
        tenor: location(profile, &profile.lanes[2], confidence),
        bass: location(profile, &profile.lanes[3], confidence),
        confidence,
        layout: ScoreLayout::SingleStaff,
    })
}

/// Positional assumption: walk (part, lane) slots in order and take the
/// first four, regardless of clefs.
fn detect_positional(profiles: &[PartProfile]) -> Option<VoiceMapping> {
    let confidence = 0.5;
    let mut slots: Vec<VoiceLocation> = Vec::new();
    for profile in profiles {
        if profile.lanes.is_empty() {
            // A part that never declares lanes still offers its bare content
            slots.push(VoiceLocation {
                part_index: profile.index,
                voice_id: None,
                clef: profile.clef,
                confidence,
            });
            continue;
        }
        for lane in &profile.lanes {
            slots.push(location(profile, lane, confidence));
        }
    }
    if slots.len() < 4 {
        return None;
    }
    let mut iter = slots.into_iter();
    Some(VoiceMapping {
        soprano: iter.next().unwrap(),
        alto: iter.next().unwrap(),
        tenor: iter.next().unwrap(),
        bass: iter.next().unwrap(),
        confidence,
        layout: ScoreLayout::Positional,
    })
}
