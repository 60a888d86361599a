//! Timed elements and measure-scoped annotations
//!
//! A timed element is anything that occupies a span of time inside a
//! measure: a note, a chord, or a rest. Offsets and durations are in
//! quarter-note units relative to the start of the owning measure.

use serde::{Deserialize, Serialize};

use super::pitch::Pitch;

/// Identity of a timed element within one document.
///
/// Ids are allocated by the owning [`ScoreDocument`](super::core::ScoreDocument)
/// and are meaningless across documents: a deep copy keeps the ids of its
/// source, but annotations are never resolved by id across document
/// boundaries.
pub type ElementId = u64;

/// Content variant of a timed element
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ElementContent {
    Note { pitch: Pitch },
    Chord { pitches: Vec<Pitch> },
    Rest,
}

/// A note, chord, or rest placed at an offset inside a measure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TimedElement {
    pub id: ElementId,
    pub content: ElementContent,

    /// Offset from the start of the owning measure, in quarter-note units
    pub offset: f64,

    /// Sounding length in quarter-note units
    pub duration: f64,

    /// Ordered lyric syllables attached to this element
    pub lyrics: Vec<Lyric>,

    /// Tie flag carried over from the source notation
    pub tie: Option<Tie>,
}

impl TimedElement {
    pub fn note(id: ElementId, pitch: Pitch, offset: f64, duration: f64) -> Self {
        Self {
            id,
            content: ElementContent::Note { pitch },
            offset,
            duration,
            lyrics: Vec::new(),
            tie: None,
        }
    }

    pub fn rest(id: ElementId, offset: f64, duration: f64) -> Self {
        Self {
            id,
            content: ElementContent::Rest,
            offset,
            duration,
            lyrics: Vec::new(),
            tie: None,
        }
    }

    pub fn chord(
        id: ElementId,
        pitches: Vec<Pitch>,
        offset: f64,
        duration: f64,
    ) -> Result<Self, String> {
        if pitches.len() < 2 {
            return Err("Chord must have at least 2 notes".to_string());
        }
        Ok(Self {
            id,
            content: ElementContent::Chord { pitches },
            offset,
            duration,
            lyrics: Vec::new(),
            tie: None,
        })
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.content, ElementContent::Rest)
    }

    /// All pitches sounding in this element (empty for rests)
    pub fn pitches(&self) -> &[Pitch] {
        match &self.content {
            ElementContent::Note { pitch } => std::slice::from_ref(pitch),
            ElementContent::Chord { pitches } => pitches,
            ElementContent::Rest => &[],
        }
    }

    /// Whether any pitch of this element sounds like the given pitch
    pub fn has_pitch(&self, pitch: &Pitch) -> bool {
        self.pitches().iter().any(|p| p.sounds_like(pitch))
    }

    pub fn end_offset(&self) -> f64 {
        self.offset + self.duration
    }
}

/// Tie information
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tie {
    Start,
    Stop,
    Continue,
}

/// Syllable position within a word
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syllabic {
    Single,
    Begin,
    Middle,
    End,
}

/// One lyric syllable attached to a timed element
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Lyric {
    /// Verse number (1-based)
    pub number: u8,
    pub text: String,
    pub syllabic: Syllabic,
}

impl Lyric {
    pub fn new(number: u8, text: impl Into<String>, syllabic: Syllabic) -> Self {
        Self {
            number,
            text: text.into(),
            syllabic,
        }
    }
}

/// Dynamic marks
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DynamicMark {
    Ppp,
    Pp,
    P,
    Mp,
    Mf,
    F,
    Ff,
    Fff,
    Fp,
    Sf,
    Sfz,
}

impl DynamicMark {
    /// Parse a MusicXML dynamics tag name ("pp", "mf", ...)
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ppp" => Some(DynamicMark::Ppp),
            "pp" => Some(DynamicMark::Pp),
            "p" => Some(DynamicMark::P),
            "mp" => Some(DynamicMark::Mp),
            "mf" => Some(DynamicMark::Mf),
            "f" => Some(DynamicMark::F),
            "ff" => Some(DynamicMark::Ff),
            "fff" => Some(DynamicMark::Fff),
            "fp" => Some(DynamicMark::Fp),
            "sf" => Some(DynamicMark::Sf),
            "sfz" => Some(DynamicMark::Sfz),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DynamicMark::Ppp => "ppp",
            DynamicMark::Pp => "pp",
            DynamicMark::P => "p",
            DynamicMark::Mp => "mp",
            DynamicMark::Mf => "mf",
            DynamicMark::F => "f",
            DynamicMark::Ff => "ff",
            DynamicMark::Fff => "fff",
            DynamicMark::Fp => "fp",
            DynamicMark::Sf => "sf",
            DynamicMark::Sfz => "sfz",
        }
    }
}

/// Tempo marking
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TempoMark {
    pub text: Option<String>,
    pub bpm: Option<u16>,
    /// Note type carrying the beat ("quarter", "half", ...)
    pub beat_unit: Option<String>,
}

impl TempoMark {
    pub fn new(
        text: Option<String>,
        bpm: Option<u16>,
        beat_unit: Option<String>,
    ) -> Result<Self, String> {
        if text.is_none() && bpm.is_none() {
            return Err("TempoMark must have either text or bpm".to_string());
        }
        Ok(Self {
            text,
            bpm,
            beat_unit,
        })
    }
}

/// Placement relative to the staff
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Above,
    Below,
}

/// Kind of a measure-scoped annotation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum DirectionKind {
    Dynamic(DynamicMark),
    Tempo(TempoMark),
    Words(String),
    LayoutBreak,
}

/// A measure-scoped annotation not owned by any voice lane
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Direction {
    /// Offset from the start of the owning measure, in quarter-note units
    pub offset: f64,
    pub kind: DirectionKind,
    pub placement: Placement,
}

impl Direction {
    pub fn dynamic(offset: f64, mark: DynamicMark) -> Self {
        Self {
            offset,
            kind: DirectionKind::Dynamic(mark),
            placement: Placement::Below,
        }
    }

    pub fn tempo(offset: f64, mark: TempoMark) -> Self {
        Self {
            offset,
            kind: DirectionKind::Tempo(mark),
            placement: Placement::Above,
        }
    }

    pub fn words(offset: f64, text: impl Into<String>) -> Self {
        Self {
            offset,
            kind: DirectionKind::Words(text.into()),
            placement: Placement::Above,
        }
    }
}
