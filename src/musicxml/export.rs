//! MusicXML serializer
//!
//! Emits `score-partwise` MusicXML from a [`ScoreDocument`]. Slur and tie
//! spanners become `<notations>` marks on their endpoint notes; wedge and
//! dashes spanners become paired `<direction>` elements around theirs.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::models::{
    Direction, DirectionKind, ElementId, Measure, Part, Placement, ScoreDocument, SpannerKind,
    Syllabic, Tie, TimedElement,
};

/// Divisions per quarter note in emitted documents
const DIVISIONS: i64 = 480;

/// Errors that can occur during serialization
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("XML writing failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("i/o failure while writing: {0}")]
    Io(#[from] std::io::Error),

    #[error("emitted document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Note type names by duration in quarter-note units, longest first
static NOTE_TYPES: Lazy<Vec<(f64, &'static str, u8)>> = Lazy::new(|| {
    vec![
        (8.0, "breve", 0),
        (6.0, "whole", 1),
        (4.0, "whole", 0),
        (3.0, "half", 1),
        (2.0, "half", 0),
        (1.5, "quarter", 1),
        (1.0, "quarter", 0),
        (0.75, "eighth", 1),
        (0.5, "eighth", 0),
        (0.375, "16th", 1),
        (0.25, "16th", 0),
        (0.125, "32nd", 0),
    ]
});

fn note_type_for(duration: f64) -> Option<(&'static str, u8)> {
    NOTE_TYPES
        .iter()
        .find(|(d, _, _)| (d - duration).abs() < 1e-6)
        .map(|(_, name, dots)| (*name, *dots))
}

fn to_divisions(duration: f64) -> i64 {
    (duration * DIVISIONS as f64).round() as i64
}

/// Where each spanner's endpoints land during emission
#[derive(Default)]
struct NotationPlan {
    slur_start: HashMap<ElementId, Vec<u8>>,
    slur_stop: HashMap<ElementId, Vec<u8>>,
    tied_start: HashSet<ElementId>,
    tied_stop: HashSet<ElementId>,
    wedge_start: HashMap<ElementId, Vec<SpannerKind>>,
    wedge_stop: HashMap<ElementId, Vec<SpannerKind>>,
}

fn plan_notations(doc: &ScoreDocument) -> NotationPlan {
    let mut plan = NotationPlan::default();
    let mut slur_number: u8 = 0;

    for spanner in &doc.spanners {
        let (Some(first), Some(last)) = (spanner.first_ref(), spanner.last_ref()) else {
            continue;
        };
        match &spanner.kind {
            SpannerKind::Slur => {
                slur_number = slur_number % 6 + 1;
                plan.slur_start.entry(first).or_default().push(slur_number);
                plan.slur_stop.entry(last).or_default().push(slur_number);
            }
            SpannerKind::Tie => {
                plan.tied_start.insert(first);
                plan.tied_stop.insert(last);
            }
            SpannerKind::Crescendo | SpannerKind::Diminuendo | SpannerKind::Dashes => {
                plan.wedge_start
                    .entry(first)
                    .or_default()
                    .push(spanner.kind.clone());
                plan.wedge_stop
                    .entry(last)
                    .or_default()
                    .push(spanner.kind.clone());
            }
            SpannerKind::Other(tag) => {
                log::debug!("spanner kind \"{}\" has no MusicXML emission", tag);
            }
        }
    }
    plan
}

/// Thin wrapper around the quick-xml writer with MusicXML-shaped helpers
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(&mut self, tag: &str) -> Result<(), ExportError> {
        self.writer.write_event(Event::Start(BytesStart::new(tag)))?;
        Ok(())
    }

    fn start_with(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        let mut start = BytesStart::new(tag);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn end(&mut self, tag: &str) -> Result<(), ExportError> {
        self.writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn leaf(&mut self, tag: &str, text: &str) -> Result<(), ExportError> {
        self.start(tag)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(tag)
    }

    fn empty(&mut self, tag: &str) -> Result<(), ExportError> {
        self.writer.write_event(Event::Empty(BytesStart::new(tag)))?;
        Ok(())
    }

    fn empty_with(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        let mut start = BytesStart::new(tag);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn finish(self) -> Result<String, ExportError> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}

/// Serialize a score document to `score-partwise` MusicXML
pub fn serialize_musicxml(doc: &ScoreDocument) -> Result<String, ExportError> {
    let plan = plan_notations(doc);
    let mut out = XmlOut::new();

    out.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.writer.write_event(Event::DocType(BytesText::from_escaped(
        "score-partwise PUBLIC \"-//Recordare//DTD MusicXML 3.1 Partwise//EN\" \
         \"http://www.musicxml.org/dtds/partwise.dtd\"",
    )))?;

    out.start_with("score-partwise", &[("version", "3.1")])?;

    if let Some(title) = &doc.title {
        out.leaf("movement-title", title)?;
    }

    out.start("part-list")?;
    for part in &doc.parts {
        out.start_with("score-part", &[("id", part.id.as_str())])?;
        out.leaf("part-name", &part.name)?;
        out.end("score-part")?;
    }
    out.end("part-list")?;

    for part in &doc.parts {
        write_part(&mut out, part, &plan)?;
    }

    out.end("score-partwise")?;
    out.finish()
}

fn write_part(out: &mut XmlOut, part: &Part, plan: &NotationPlan) -> Result<(), ExportError> {
    out.start_with("part", &[("id", part.id.as_str())])?;

    for (index, measure) in part.measures.iter().enumerate() {
        out.start_with("measure", &[("number", measure.number.to_string().as_str())])?;
        write_attributes(out, part, measure, index == 0)?;

        for direction in &measure.directions {
            write_direction(out, direction)?;
        }

        // Each lane restarts from the measure origin; backup rewinds by
        // the extent of whatever was written since then.
        let mut written_span: Option<i64> = None;
        for lane in &measure.lanes {
            if let Some(span) = written_span {
                write_backup(out, span)?;
            }
            for element in &lane.elements {
                write_element(out, element, Some(&lane.id), plan)?;
            }
            written_span = Some(stream_span(&lane.elements));
        }

        if !measure.elements.is_empty() {
            if let Some(span) = written_span {
                write_backup(out, span)?;
            }
            for element in &measure.elements {
                write_element(out, element, None, plan)?;
            }
        }

        out.end("measure")?;
    }

    out.end("part")?;
    Ok(())
}

/// Division extent of one element stream within its measure
fn stream_span(elements: &[TimedElement]) -> i64 {
    elements
        .iter()
        .map(|e| to_divisions(e.end_offset()))
        .max()
        .unwrap_or(0)
}

fn write_attributes(
    out: &mut XmlOut,
    part: &Part,
    measure: &Measure,
    first_measure: bool,
) -> Result<(), ExportError> {
    let clef = measure.clef.or(if first_measure { Some(part.clef) } else { None });
    if !first_measure && measure.key.is_none() && measure.time.is_none() && clef.is_none() {
        return Ok(());
    }

    out.start("attributes")?;
    if first_measure {
        out.leaf("divisions", &DIVISIONS.to_string())?;
    }
    if let Some(key) = measure.key {
        out.start("key")?;
        out.leaf("fifths", &key.fifths.to_string())?;
        out.end("key")?;
    }
    if let Some(time) = measure.time {
        out.start("time")?;
        out.leaf("beats", &time.beats.to_string())?;
        out.leaf("beat-type", &time.beat_type.to_string())?;
        out.end("time")?;
    }
    if let Some(clef) = clef {
        out.start("clef")?;
        out.leaf("sign", clef.sign())?;
        out.leaf("line", &clef.line().to_string())?;
        if clef.octave_change() != 0 {
            out.leaf("clef-octave-change", &clef.octave_change().to_string())?;
        }
        out.end("clef")?;
    }
    out.end("attributes")?;
    Ok(())
}

fn write_direction(out: &mut XmlOut, direction: &Direction) -> Result<(), ExportError> {
    if matches!(direction.kind, DirectionKind::LayoutBreak) {
        return out.empty_with("print", &[("new-system", "yes")]);
    }

    let placement = match direction.placement {
        Placement::Above => "above",
        Placement::Below => "below",
    };
    out.start_with("direction", &[("placement", placement)])?;
    out.start("direction-type")?;
    match &direction.kind {
        DirectionKind::Dynamic(mark) => {
            out.start("dynamics")?;
            out.empty(mark.as_str())?;
            out.end("dynamics")?;
        }
        DirectionKind::Tempo(mark) => {
            if let Some(bpm) = mark.bpm {
                out.start("metronome")?;
                out.leaf("beat-unit", mark.beat_unit.as_deref().unwrap_or("quarter"))?;
                out.leaf("per-minute", &bpm.to_string())?;
                out.end("metronome")?;
            } else if let Some(text) = &mark.text {
                out.leaf("words", text)?;
            }
        }
        DirectionKind::Words(text) => {
            out.leaf("words", text)?;
        }
        DirectionKind::LayoutBreak => {}
    }
    out.end("direction-type")?;
    if direction.offset != 0.0 {
        out.leaf("offset", &to_divisions(direction.offset).to_string())?;
    }
    out.end("direction")?;
    Ok(())
}

fn write_backup(out: &mut XmlOut, divisions: i64) -> Result<(), ExportError> {
    out.start("backup")?;
    out.leaf("duration", &divisions.to_string())?;
    out.end("backup")?;
    Ok(())
}

fn write_wedge_directions(
    out: &mut XmlOut,
    kinds: &[SpannerKind],
    stop: bool,
) -> Result<(), ExportError> {
    for kind in kinds {
        out.start("direction")?;
        out.start("direction-type")?;
        let wedge_type = if stop {
            "stop"
        } else {
            match kind {
                SpannerKind::Diminuendo => "diminuendo",
                _ => "crescendo",
            }
        };
        match kind {
            SpannerKind::Dashes => {
                out.empty_with("dashes", &[("type", if stop { "stop" } else { "start" })])?;
            }
            _ => {
                out.empty_with("wedge", &[("type", wedge_type)])?;
            }
        }
        out.end("direction-type")?;
        out.end("direction")?;
    }
    Ok(())
}

fn write_element(
    out: &mut XmlOut,
    element: &TimedElement,
    voice: Option<&str>,
    plan: &NotationPlan,
) -> Result<(), ExportError> {
    if let Some(kinds) = plan.wedge_start.get(&element.id) {
        write_wedge_directions(out, kinds, false)?;
    }

    let pitches = element.pitches();
    if element.is_rest() {
        write_note(out, element, None, false, voice, plan)?;
    } else {
        for (i, pitch) in pitches.iter().enumerate() {
            write_note(out, element, Some(pitch), i > 0, voice, plan)?;
        }
    }

    if let Some(kinds) = plan.wedge_stop.get(&element.id) {
        write_wedge_directions(out, kinds, true)?;
    }
    Ok(())
}

fn write_note(
    out: &mut XmlOut,
    element: &TimedElement,
    pitch: Option<&crate::models::Pitch>,
    chord_member: bool,
    voice: Option<&str>,
    plan: &NotationPlan,
) -> Result<(), ExportError> {
    out.start("note")?;
    if chord_member {
        out.empty("chord")?;
    }

    match pitch {
        Some(pitch) => {
            out.start("pitch")?;
            out.leaf("step", pitch.step_name())?;
            if pitch.alteration != 0 {
                out.leaf("alter", &pitch.alteration.to_string())?;
            }
            out.leaf("octave", &pitch.octave.to_string())?;
            out.end("pitch")?;
        }
        None => out.empty("rest")?,
    }

    out.leaf("duration", &to_divisions(element.duration).to_string())?;

    if let Some(tie) = element.tie {
        match tie {
            Tie::Start => out.empty_with("tie", &[("type", "start")])?,
            Tie::Stop => out.empty_with("tie", &[("type", "stop")])?,
            Tie::Continue => {
                out.empty_with("tie", &[("type", "stop")])?;
                out.empty_with("tie", &[("type", "start")])?;
            }
        }
    }

    if let Some(voice) = voice {
        out.leaf("voice", voice)?;
    }

    if let Some((name, dots)) = note_type_for(element.duration) {
        out.leaf("type", name)?;
        for _ in 0..dots {
            out.empty("dot")?;
        }
    }

    // Notations only on the primary note of a chord
    if !chord_member {
        let slur_starts = plan.slur_start.get(&element.id);
        let slur_stops = plan.slur_stop.get(&element.id);
        let tied_start = plan.tied_start.contains(&element.id);
        let tied_stop = plan.tied_stop.contains(&element.id);

        if slur_starts.is_some() || slur_stops.is_some() || tied_start || tied_stop {
            out.start("notations")?;
            if tied_stop {
                out.empty_with("tied", &[("type", "stop")])?;
            }
            if tied_start {
                out.empty_with("tied", &[("type", "start")])?;
            }
            if let Some(numbers) = slur_stops {
                for number in numbers {
                    out.empty_with(
                        "slur",
                        &[("type", "stop"), ("number", number.to_string().as_str())],
                    )?;
                }
            }
            if let Some(numbers) = slur_starts {
                for number in numbers {
                    out.empty_with(
                        "slur",
                        &[("type", "start"), ("number", number.to_string().as_str())],
                    )?;
                }
            }
            out.end("notations")?;
        }
    }

    for lyric in &element.lyrics {
        out.start_with("lyric", &[("number", lyric.number.to_string().as_str())])?;
        let syllabic = match lyric.syllabic {
            Syllabic::Single => "single",
            Syllabic::Begin => "begin",
            Syllabic::Middle => "middle",
            Syllabic::End => "end",
        };
        out.leaf("syllabic", syllabic)?;
        out.leaf("text", &lyric.text)?;
        out.end("lyric")?;
    }

    out.end("note")?;
    Ok(())
}
