//! Pitch representation for the score document model
//!
//! Pitches follow the MusicXML convention: a diatonic step, a chromatic
//! alteration, and an octave number (octave 4 contains middle C).

use serde::{Deserialize, Serialize};

/// Semitone offset of each diatonic step above C
const STEP_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Musical pitch representation
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pitch {
    /// Diatonic step (0=C, 1=D, 2=E, 3=F, 4=G, 5=A, 6=B)
    pub step: u8,

    /// Chromatic alteration (-2=double flat, -1=flat, 0=natural, +1=sharp, +2=double sharp)
    pub alteration: i8,

    /// Octave number (4 = middle C octave)
    pub octave: i8,
}

impl Pitch {
    /// Create a new pitch with validation
    pub fn new(step: u8, alteration: i8, octave: i8) -> Result<Self, String> {
        if step > 6 {
            return Err(format!("Invalid step: {} (must be 0-6)", step));
        }
        if !(-2..=2).contains(&alteration) {
            return Err(format!(
                "Invalid alteration: {} (must be -2 to +2)",
                alteration
            ));
        }
        if !(-1..=9).contains(&octave) {
            return Err(format!("Invalid octave: {} (must be -1 to 9)", octave));
        }
        Ok(Self {
            step,
            alteration,
            octave,
        })
    }

    /// Create a pitch from a MusicXML step letter ("C".."B")
    pub fn from_step_name(name: &str, alteration: i8, octave: i8) -> Result<Self, String> {
        let step = match name {
            "C" => 0,
            "D" => 1,
            "E" => 2,
            "F" => 3,
            "G" => 4,
            "A" => 5,
            "B" => 6,
            other => return Err(format!("Invalid step name: {}", other)),
        };
        Self::new(step, alteration, octave)
    }

    /// MusicXML step letter for this pitch
    pub fn step_name(&self) -> &'static str {
        ["C", "D", "E", "F", "G", "A", "B"][self.step as usize]
    }

    /// Chromatic pitch class (0-11, C=0)
    pub fn chroma(&self) -> u8 {
        let semis = STEP_SEMITONES[self.step as usize] + self.alteration as i32;
        semis.rem_euclid(12) as u8
    }

    /// MIDI note number (middle C = 60)
    pub fn midi_number(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + STEP_SEMITONES[self.step as usize] + self.alteration as i32
    }

    /// Whether two pitches sound in the same place: same pitch class and octave.
    ///
    /// This is the matching key used when annotations are re-resolved against
    /// a pruned copy of the document, so enharmonic spellings compare equal.
    pub fn sounds_like(&self, other: &Pitch) -> bool {
        self.chroma() == other.chroma() && self.octave == other.octave
    }
}

impl std::fmt::Display for Pitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let accidental = match self.alteration {
            -2 => "bb",
            -1 => "b",
            1 => "#",
            2 => "##",
            _ => "",
        };
        write!(f, "{}{}{}", self.step_name(), accidental, self.octave)
    }
}
