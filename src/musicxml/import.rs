//! MusicXML parser
//!
//! Converts `score-partwise` MusicXML into a [`ScoreDocument`] using
//! roxmltree. Voice-laned notes, chords, ties, lyrics, directions, and
//! slur/tied/wedge notations are all captured; anything unsupported is
//! recorded as a skipped element with a reason, never silently discarded.

use std::collections::HashMap;

use roxmltree::{Document as XmlDocument, Node};
use thiserror::Error;

use crate::models::{
    Clef, Direction, DirectionKind, DynamicMark, ElementContent, ElementId, KeySignature, Lyric,
    Measure, Mode, Part, Pitch, Placement, Rational, ScoreDocument, Spanner, SpannerKind, Syllabic,
    TempoMark, Tie, TimeSignature, TimedElement,
};

/// Result type for MusicXML parsing operations
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that can occur during MusicXML parsing
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("invalid XML: {0}")]
    InvalidXml(String),

    #[error("unsupported MusicXML format: {0}")]
    UnsupportedFormat(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("invalid value '{value}' for element '{element}': {reason}")]
    InvalidValue {
        element: String,
        value: String,
        reason: String,
    },
}

/// Information about a skipped/unsupported element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedElement {
    pub element_type: String,
    pub measure_number: Option<u32>,
    pub part_id: Option<String>,
    pub reason: String,
}

/// Parsed document plus the skip records accumulated along the way
#[derive(Debug)]
pub struct ImportOutcome {
    pub document: ScoreDocument,
    pub skipped: Vec<SkippedElement>,
}

fn get_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.tag_name().name() == name)
}

fn get_child_text<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<&'a str> {
    get_child(node, name).and_then(|n| n.text())
}

fn parse_number<T: std::str::FromStr>(element: &str, text: &str) -> ImportResult<T> {
    text.trim().parse().map_err(|_| ImportError::InvalidValue {
        element: element.to_string(),
        value: text.to_string(),
        reason: "expected a number".to_string(),
    })
}

/// State threaded through one part's measures
struct PartContext {
    part_id: String,
    divisions: u32,
    measure_number: u32,
    skipped: Vec<SkippedElement>,
    /// Slur number -> start element
    open_slurs: HashMap<u8, ElementId>,
    /// Tied starts awaiting their stop, by pitch
    open_ties: Vec<(Pitch, ElementId)>,
    /// Wedge/dashes number -> (kind, start measure, start offset)
    open_wedges: HashMap<u8, (SpannerKind, u32, f64)>,
    /// Finished wedges awaiting anchor resolution:
    /// (kind, start measure, start offset, stop measure, stop offset)
    closed_wedges: Vec<(SpannerKind, u32, f64, u32, f64)>,
    spanners: Vec<Spanner>,
}

impl PartContext {
    fn new(part_id: String) -> Self {
        Self {
            part_id,
            divisions: 1,
            measure_number: 0,
            skipped: Vec::new(),
            open_slurs: HashMap::new(),
            open_ties: Vec::new(),
            open_wedges: HashMap::new(),
            closed_wedges: Vec::new(),
            spanners: Vec::new(),
        }
    }

    fn add_skipped(&mut self, element_type: &str, reason: &str) {
        self.skipped.push(SkippedElement {
            element_type: element_type.to_string(),
            measure_number: (self.measure_number > 0).then_some(self.measure_number),
            part_id: Some(self.part_id.clone()),
            reason: reason.to_string(),
        });
    }

    /// Convert a division count to quarter-note units, exactly
    fn to_quarters(&self, divisions_value: i64) -> f64 {
        let exact = Rational::new(divisions_value as i32, self.divisions as i32);
        *exact.numer() as f64 / *exact.denom() as f64
    }
}

/// Parse a MusicXML string into a score document
pub fn parse_musicxml(xml: &str) -> ImportResult<ImportOutcome> {
    let xml_doc =
        XmlDocument::parse(xml).map_err(|e| ImportError::InvalidXml(e.to_string()))?;
    let root = xml_doc.root_element();

    match root.tag_name().name() {
        "score-partwise" => {}
        "score-timewise" => {
            return Err(ImportError::UnsupportedFormat(
                "score-timewise (use score-partwise instead)".to_string(),
            ))
        }
        other => {
            return Err(ImportError::InvalidValue {
                element: "root".to_string(),
                value: other.to_string(),
                reason: "expected <score-partwise>".to_string(),
            })
        }
    }

    let mut document = ScoreDocument::new();
    document.title = get_child_text(root, "movement-title")
        .or_else(|| get_child(root, "work").and_then(|w| get_child_text(w, "work-title")))
        .map(str::to_string);

    let part_list = get_child(root, "part-list")
        .ok_or_else(|| ImportError::MissingElement("part-list".to_string()))?;
    let part_names = parse_part_list(part_list);

    let mut skipped = Vec::new();

    for part_node in root.children().filter(|n| n.tag_name().name() == "part") {
        let part_id = part_node
            .attribute("id")
            .ok_or_else(|| ImportError::MissingElement("part id attribute".to_string()))?;
        let name = part_names
            .get(part_id)
            .cloned()
            .unwrap_or_else(|| format!("Part {}", document.parts.len() + 1));

        let (part, part_spanners, part_skipped) =
            parse_part(part_node, part_id, &name, &mut document)?;
        document.parts.push(part);
        document.spanners.extend(part_spanners);
        skipped.extend(part_skipped);
    }

    log::info!(
        "imported \"{}\": {} parts, {} measures, {} spanners, {} skipped elements",
        document.title.as_deref().unwrap_or("untitled"),
        document.parts.len(),
        document.measure_count(),
        document.spanners.len(),
        skipped.len()
    );

    Ok(ImportOutcome { document, skipped })
}

fn parse_part_list(part_list: Node) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for score_part in part_list
        .children()
        .filter(|n| n.tag_name().name() == "score-part")
    {
        if let Some(id) = score_part.attribute("id") {
            let name = get_child_text(score_part, "part-name").unwrap_or("Unnamed Part");
            names.insert(id.to_string(), name.to_string());
        }
    }
    names
}

fn parse_part(
    part_node: Node,
    part_id: &str,
    name: &str,
    document: &mut ScoreDocument,
) -> ImportResult<(Part, Vec<Spanner>, Vec<SkippedElement>)> {
    let mut part = Part::new(part_id, name, Clef::Treble);
    let mut context = PartContext::new(part_id.to_string());
    let mut clef_assigned = false;
    let mut fallback_number = 0u32;

    for measure_node in part_node
        .children()
        .filter(|n| n.tag_name().name() == "measure")
    {
        fallback_number += 1;
        let number = measure_node
            .attribute("number")
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(fallback_number);
        context.measure_number = number;

        let measure = parse_measure(measure_node, number, &mut context, document)?;

        if !clef_assigned {
            if let Some(clef) = measure.clef {
                part.clef = clef;
                clef_assigned = true;
            }
        }
        part.measures.push(measure);
    }

    for (number, _) in context.open_slurs.drain() {
        log::warn!("part {}: slur {} never closed", part_id, number);
    }
    resolve_wedge_anchors(&part, &mut context);

    Ok((part, context.spanners, context.skipped))
}

fn parse_measure(
    measure_node: Node,
    number: u32,
    context: &mut PartContext,
    document: &mut ScoreDocument,
) -> ImportResult<Measure> {
    let mut measure = Measure::new(number);
    // Cursor in division units; backup/forward move it
    let mut cursor: i64 = 0;
    // Last non-chord note, for <chord/> merging: (lane key, element id)
    let mut last_note: Option<(Option<String>, ElementId)> = None;

    for child in measure_node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "attributes" => parse_attributes(child, &mut measure, context)?,
            "note" => {
                parse_note(child, &mut measure, &mut cursor, &mut last_note, context, document)?;
            }
            "backup" => {
                if let Some(text) = get_child_text(child, "duration") {
                    cursor -= parse_number::<i64>("backup duration", text)?;
                }
            }
            "forward" => {
                if let Some(text) = get_child_text(child, "duration") {
                    cursor += parse_number::<i64>("forward duration", text)?;
                }
            }
            "direction" => parse_direction(child, &mut measure, cursor, context)?,
            "sound" => {
                if let Some(tempo) = child.attribute("tempo") {
                    if let Ok(bpm) = tempo.trim().parse::<f64>() {
                        let mark = TempoMark {
                            text: None,
                            bpm: Some(bpm.round() as u16),
                            beat_unit: None,
                        };
                        measure
                            .directions
                            .push(Direction::tempo(context.to_quarters(cursor), mark));
                    }
                }
            }
            "print" => {
                if child.attribute("new-system") == Some("yes")
                    || child.attribute("new-page") == Some("yes")
                {
                    measure.directions.push(Direction {
                        offset: 0.0,
                        kind: DirectionKind::LayoutBreak,
                        placement: Placement::Above,
                    });
                }
            }
            "barline" => {}
            other => {
                context.add_skipped(other, "unsupported measure-level element");
            }
        }
    }

    Ok(measure)
}

fn parse_attributes(
    attr_node: Node,
    measure: &mut Measure,
    context: &mut PartContext,
) -> ImportResult<()> {
    for child in attr_node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "divisions" => {
                if let Some(text) = child.text() {
                    context.divisions = parse_number("divisions", text)?;
                    if context.divisions == 0 {
                        return Err(ImportError::InvalidValue {
                            element: "divisions".to_string(),
                            value: text.to_string(),
                            reason: "must be positive".to_string(),
                        });
                    }
                }
            }
            "key" => {
                if let Some(text) = get_child_text(child, "fifths") {
                    let fifths: i8 = parse_number("fifths", text)?;
                    let mode = match get_child_text(child, "mode") {
                        Some("minor") => Mode::Minor,
                        _ => Mode::Major,
                    };
                    measure.key = KeySignature::new(fifths, mode).ok();
                }
            }
            "time" => {
                let beats = get_child_text(child, "beats");
                let beat_type = get_child_text(child, "beat-type");
                if let (Some(b), Some(bt)) = (beats, beat_type) {
                    let beats: u8 = parse_number("beats", b)?;
                    let beat_type: u8 = parse_number("beat-type", bt)?;
                    measure.time = TimeSignature::new(beats, beat_type).ok();
                }
            }
            "clef" => {
                let sign = get_child_text(child, "sign").unwrap_or("G");
                let line = get_child_text(child, "line").and_then(|t| t.trim().parse().ok());
                let octave_change = get_child_text(child, "clef-octave-change")
                    .and_then(|t| t.trim().parse().ok())
                    .unwrap_or(0);
                measure.clef = Clef::from_sign(sign, line, octave_change);
                if measure.clef.is_none() {
                    context.add_skipped("clef", "unrecognized clef sign");
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_note(
    note_node: Node,
    measure: &mut Measure,
    cursor: &mut i64,
    last_note: &mut Option<(Option<String>, ElementId)>,
    context: &mut PartContext,
    document: &mut ScoreDocument,
) -> ImportResult<()> {
    if get_child(note_node, "grace").is_some() {
        context.add_skipped("grace", "grace notes are not represented");
        return Ok(());
    }

    let duration_divs: i64 = match get_child_text(note_node, "duration") {
        Some(text) => parse_number("duration", text)?,
        None => {
            return Err(ImportError::MissingElement(format!(
                "duration (note in measure {})",
                measure.number
            )))
        }
    };
    let duration = context.to_quarters(duration_divs);
    let is_chord = get_child(note_node, "chord").is_some();
    let voice = get_child_text(note_node, "voice").map(str::to_string);
    let is_rest = get_child(note_node, "rest").is_some();

    let pitch = if is_rest {
        None
    } else {
        let pitch_node = get_child(note_node, "pitch")
            .ok_or_else(|| ImportError::MissingElement("pitch".to_string()))?;
        let step = get_child_text(pitch_node, "step")
            .ok_or_else(|| ImportError::MissingElement("step".to_string()))?;
        let alter: i8 = match get_child_text(pitch_node, "alter") {
            Some(text) => parse_number::<f32>("alter", text)?.round() as i8,
            None => 0,
        };
        let octave: i8 = parse_number(
            "octave",
            get_child_text(pitch_node, "octave")
                .ok_or_else(|| ImportError::MissingElement("octave".to_string()))?,
        )?;
        Some(
            Pitch::from_step_name(step.trim(), alter, octave).map_err(|reason| {
                ImportError::InvalidValue {
                    element: "pitch".to_string(),
                    value: format!("{}{}", step, octave),
                    reason,
                }
            })?,
        )
    };

    // A <chord/> note joins the previous note instead of advancing time
    if is_chord {
        if let (Some(pitch), Some((lane_key, id))) = (pitch, last_note.as_ref()) {
            let target = match lane_key {
                Some(lane) => measure
                    .lane_mut(lane)
                    .and_then(|l| l.elements.iter_mut().find(|e| e.id == *id)),
                None => measure.elements.iter_mut().find(|e| e.id == *id),
            };
            if let Some(element) = target {
                element.content = match element.content.clone() {
                    ElementContent::Note { pitch: first } => ElementContent::Chord {
                        pitches: vec![first, pitch],
                    },
                    ElementContent::Chord { mut pitches } => {
                        pitches.push(pitch);
                        ElementContent::Chord { pitches }
                    }
                    ElementContent::Rest => ElementContent::Rest,
                };
                return Ok(());
            }
        }
        context.add_skipped("chord", "chord note without a preceding note");
        return Ok(());
    }

    let offset = context.to_quarters(*cursor);
    let id = document.allocate_id();
    let mut element = match pitch {
        Some(pitch) => TimedElement::note(id, pitch, offset, duration),
        None => TimedElement::rest(id, offset, duration),
    };

    for tie_node in note_node
        .children()
        .filter(|n| n.tag_name().name() == "tie")
    {
        element.tie = match (element.tie, tie_node.attribute("type")) {
            (Some(Tie::Start), Some("stop")) | (Some(Tie::Stop), Some("start")) => {
                Some(Tie::Continue)
            }
            (_, Some("start")) => Some(Tie::Start),
            (_, Some("stop")) => Some(Tie::Stop),
            (current, _) => current,
        };
    }

    for lyric_node in note_node
        .children()
        .filter(|n| n.tag_name().name() == "lyric")
    {
        let number = lyric_node
            .attribute("number")
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(1);
        let syllabic = match get_child_text(lyric_node, "syllabic") {
            Some("begin") => Syllabic::Begin,
            Some("middle") => Syllabic::Middle,
            Some("end") => Syllabic::End,
            _ => Syllabic::Single,
        };
        if let Some(text) = get_child_text(lyric_node, "text") {
            element.lyrics.push(Lyric::new(number, text, syllabic));
        }
    }

    if let Some(notations) = get_child(note_node, "notations") {
        parse_notations(notations, id, pitch, context);
    }

    measure.insert_element(voice.as_deref(), element);
    *last_note = Some((voice, id));
    *cursor += duration_divs;
    Ok(())
}

/// Slur and tied notations open and close spanners over element ids
fn parse_notations(
    notations: Node,
    element_id: ElementId,
    pitch: Option<Pitch>,
    context: &mut PartContext,
) {
    for child in notations.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "slur" => {
                let number: u8 = child
                    .attribute("number")
                    .and_then(|t| t.trim().parse().ok())
                    .unwrap_or(1);
                match child.attribute("type") {
                    Some("start") => {
                        context.open_slurs.insert(number, element_id);
                    }
                    Some("stop") => match context.open_slurs.remove(&number) {
                        Some(start) => {
                            if let Ok(slur) =
                                Spanner::new(SpannerKind::Slur, vec![start, element_id])
                            {
                                context.spanners.push(slur);
                            }
                        }
                        None => {
                            context.add_skipped("slur", "slur stop without a matching start");
                        }
                    },
                    _ => {}
                }
            }
            "tied" => match child.attribute("type") {
                Some("start") => {
                    if let Some(pitch) = pitch {
                        context.open_ties.push((pitch, element_id));
                    }
                }
                Some("stop") => {
                    if let Some(pitch) = pitch {
                        if let Some(pos) = context
                            .open_ties
                            .iter()
                            .position(|(p, _)| p.sounds_like(&pitch))
                        {
                            let (_, start) = context.open_ties.remove(pos);
                            if let Ok(tie) =
                                Spanner::new(SpannerKind::Tie, vec![start, element_id])
                            {
                                context.spanners.push(tie);
                            }
                        } else {
                            context.add_skipped("tied", "tie stop without a matching start");
                        }
                    }
                }
                _ => {}
            },
            "articulations" | "ornaments" => {
                context.add_skipped(child.tag_name().name(), "notation class not carried");
            }
            _ => {}
        }
    }
}

fn parse_direction(
    direction_node: Node,
    measure: &mut Measure,
    cursor: i64,
    context: &mut PartContext,
) -> ImportResult<()> {
    let mut offset_divs: i64 = 0;
    if let Some(text) = get_child_text(direction_node, "offset") {
        offset_divs = parse_number("offset", text)?;
    }
    let offset = context.to_quarters(cursor + offset_divs);

    for direction_type in direction_node
        .children()
        .filter(|n| n.tag_name().name() == "direction-type")
    {
        for child in direction_type.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "dynamics" => {
                    let mark = child
                        .children()
                        .find(|n| n.is_element())
                        .and_then(|n| DynamicMark::parse(n.tag_name().name()));
                    match mark {
                        Some(mark) => measure.directions.push(Direction::dynamic(offset, mark)),
                        None => context.add_skipped("dynamics", "unrecognized dynamic mark"),
                    }
                }
                "words" => {
                    if let Some(text) = child.text() {
                        if !text.trim().is_empty() {
                            measure.directions.push(Direction::words(offset, text.trim()));
                        }
                    }
                }
                "metronome" => {
                    let beat_unit = get_child_text(child, "beat-unit").map(str::to_string);
                    let bpm = get_child_text(child, "per-minute")
                        .and_then(|t| t.trim().parse::<f64>().ok())
                        .map(|v| v.round() as u16);
                    if let Ok(mark) = TempoMark::new(None, bpm, beat_unit) {
                        measure.directions.push(Direction::tempo(offset, mark));
                    } else {
                        context.add_skipped("metronome", "metronome without per-minute");
                    }
                }
                "wedge" => {
                    let number: u8 = child
                        .attribute("number")
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or(1);
                    match child.attribute("type") {
                        Some("crescendo") => {
                            context.open_wedges.insert(
                                number,
                                (SpannerKind::Crescendo, measure.number, offset),
                            );
                        }
                        Some("diminuendo") => {
                            context.open_wedges.insert(
                                number,
                                (SpannerKind::Diminuendo, measure.number, offset),
                            );
                        }
                        Some("stop") => match context.open_wedges.remove(&number) {
                            Some((kind, start_measure, start_offset)) => {
                                context.closed_wedges.push((
                                    kind,
                                    start_measure,
                                    start_offset,
                                    measure.number,
                                    offset,
                                ));
                            }
                            None => {
                                context.add_skipped("wedge", "wedge stop without a start");
                            }
                        },
                        _ => {}
                    }
                }
                "dashes" => {
                    let number: u8 = child
                        .attribute("number")
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or(1);
                    match child.attribute("type") {
                        Some("start") => {
                            context
                                .open_wedges
                                .insert(number, (SpannerKind::Dashes, measure.number, offset));
                        }
                        Some("stop") => match context.open_wedges.remove(&number) {
                            Some((kind, start_measure, start_offset)) => {
                                context.closed_wedges.push((
                                    kind,
                                    start_measure,
                                    start_offset,
                                    measure.number,
                                    offset,
                                ));
                            }
                            None => context.add_skipped("dashes", "dashes stop without a start"),
                        },
                        _ => {}
                    }
                }
                other => {
                    context.add_skipped(other, "unsupported direction type");
                }
            }
        }
    }
    Ok(())
}

/// Wedges and dashes arrive as paired directions at time positions, not as
/// note references. Anchor each to the note nearest its start and stop
/// positions so the spanner carries resolvable references.
fn resolve_wedge_anchors(part: &Part, context: &mut PartContext) {
    let closed = std::mem::take(&mut context.closed_wedges);
    for (kind, start_measure, start_offset, stop_measure, stop_offset) in closed {
        let start = nearest_element(part, start_measure, start_offset);
        let stop = nearest_element(part, stop_measure, stop_offset);
        match (start, stop) {
            (Some(a), Some(b)) if a != b => {
                if let Ok(spanner) = Spanner::new(kind, vec![a, b]) {
                    context.spanners.push(spanner);
                }
            }
            (Some(a), _) => {
                context.spanners.push(Spanner::single_anchor(kind, a));
            }
            _ => {
                context.add_skipped("wedge", "no note to anchor the wedge to");
            }
        }
    }
}

fn nearest_element(part: &Part, measure_number: u32, offset: f64) -> Option<ElementId> {
    let measure = part.measures.iter().find(|m| m.number == measure_number)?;
    measure
        .all_elements()
        .filter(|e| !e.is_rest())
        .min_by(|a, b| {
            (a.offset - offset)
                .abs()
                .total_cmp(&(b.offset - offset).abs())
        })
        .map(|e| e.id)
}
