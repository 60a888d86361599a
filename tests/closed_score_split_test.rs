// End-to-end separation of a two-staff closed score

use satb_split::models::DynamicMark;
use satb_split::musicxml::parse_musicxml;
use satb_split::split::identify::ScoreLayout;
use satb_split::{split_score, SplitSettings, VoicePart};

mod common;

fn split() -> satb_split::SplitOutcome {
    let outcome = parse_musicxml(common::CLOSED_SATB_SCORE).expect("fixture should parse");
    split_score(&outcome.document, &SplitSettings::default()).expect("split should succeed")
}

#[test]
fn test_closed_score_layout_detected() {
    let outcome = split();
    let mapping = &outcome.mapping;

    assert_eq!(mapping.layout, ScoreLayout::ClosedScore);
    assert_eq!(mapping.confidence, 0.9);
    assert_eq!(mapping.soprano.part_index, 0);
    assert_eq!(mapping.soprano.voice_id.as_deref(), Some("1"));
    assert_eq!(mapping.alto.part_index, 0);
    assert_eq!(mapping.alto.voice_id.as_deref(), Some("2"));
    assert_eq!(mapping.tenor.part_index, 1);
    assert_eq!(mapping.tenor.voice_id.as_deref(), Some("1"));
    assert_eq!(mapping.bass.part_index, 1);
    assert_eq!(mapping.bass.voice_id.as_deref(), Some("2"));
}

#[test]
fn test_four_single_part_voices_emitted() {
    let outcome = split();

    assert!(outcome.success());
    assert_eq!(outcome.voices.len(), 4);
    let names: Vec<&str> = outcome.voices.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["Soprano", "Alto", "Tenor", "Bass"]);

    for voice in &outcome.voices {
        assert_eq!(voice.document.parts.len(), 1);
        assert_eq!(voice.document.parts[0].measures.len(), 3);
        assert_eq!(voice.document.parts[0].name, voice.name);
    }
}

#[test]
fn test_every_measure_fills_its_nominal_duration() {
    let outcome = split();

    for voice in &outcome.voices {
        for measure in &voice.document.parts[0].measures {
            assert!(
                (measure.total_duration() - 4.0).abs() < 1e-9,
                "{} measure {} covers {} quarters",
                voice.name,
                measure.number,
                measure.total_duration()
            );
            assert!(measure.element_count() > 0, "no measure may be left empty");
        }
    }
}

#[test]
fn test_voices_carry_only_their_own_notes() {
    let outcome = split();

    let soprano = &outcome.voices[VoicePart::Soprano.index()];
    let m1 = &soprano.document.parts[0].measures[0];
    let steps: Vec<&str> = m1
        .all_elements()
        .flat_map(|e| e.pitches())
        .map(|p| p.step_name())
        .collect();
    assert_eq!(steps, vec!["C", "D"], "soprano keeps its lane only");

    let bass = &outcome.voices[VoicePart::Bass.index()];
    let octaves: Vec<i8> = bass.document.parts[0].measures[0]
        .all_elements()
        .flat_map(|e| e.pitches())
        .map(|p| p.octave)
        .collect();
    assert_eq!(octaves, vec![2], "bass keeps the lower lane");
}

#[test]
fn test_dynamics_unified_across_all_voices() {
    let outcome = split();

    for voice in &outcome.voices {
        let forte_count: usize = voice.document.parts[0].measures[0]
            .directions
            .iter()
            .filter(|d| {
                matches!(
                    d.kind,
                    satb_split::models::DirectionKind::Dynamic(DynamicMark::F)
                )
            })
            .count();
        assert_eq!(
            forte_count, 1,
            "{} should end with exactly one forte in measure 1",
            voice.name
        );
    }
}

#[test]
fn test_tempo_unified_across_all_voices() {
    let outcome = split();

    for voice in &outcome.voices {
        let tempo_count: usize = voice.document.parts[0].measures[0]
            .directions
            .iter()
            .filter(|d| matches!(d.kind, satb_split::models::DirectionKind::Tempo(_)))
            .count();
        assert_eq!(
            tempo_count, 1,
            "{} should carry the metronome mark once",
            voice.name
        );
    }
}
