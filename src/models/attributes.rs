//! Staff attribute value objects: clefs, key signatures, time signatures
//!
//! These are copied verbatim between documents; the pipeline never
//! reinterprets them beyond clef-family checks and meter arithmetic.

use num_rational::Rational32;
use serde::{Deserialize, Serialize};

/// Rational type for exact duration calculations
pub type Rational = Rational32;

/// Clef types
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clef {
    Treble,
    /// Treble clef sounding an octave lower (tenor vocal parts)
    TrebleOctaveDown,
    Bass,
    Alto,
    Tenor,
    Soprano,
    Percussion,
}

impl Clef {
    /// Build a clef from MusicXML sign/line/octave-change attributes
    pub fn from_sign(sign: &str, line: Option<u8>, octave_change: i8) -> Option<Self> {
        match (sign, line, octave_change) {
            ("G", _, 0) => Some(Clef::Treble),
            ("G", _, -1) => Some(Clef::TrebleOctaveDown),
            ("F", _, _) => Some(Clef::Bass),
            ("C", Some(3), _) => Some(Clef::Alto),
            ("C", Some(4), _) => Some(Clef::Tenor),
            ("C", Some(1), _) => Some(Clef::Soprano),
            ("C", _, _) => Some(Clef::Alto),
            ("percussion", _, _) => Some(Clef::Percussion),
            _ => None,
        }
    }

    /// MusicXML sign for this clef
    pub fn sign(&self) -> &'static str {
        match self {
            Clef::Treble | Clef::TrebleOctaveDown => "G",
            Clef::Bass => "F",
            Clef::Alto | Clef::Tenor | Clef::Soprano => "C",
            Clef::Percussion => "percussion",
        }
    }

    /// MusicXML staff line for this clef
    pub fn line(&self) -> u8 {
        match self {
            Clef::Treble | Clef::TrebleOctaveDown => 2,
            Clef::Bass => 4,
            Clef::Alto => 3,
            Clef::Tenor => 4,
            Clef::Soprano => 1,
            Clef::Percussion => 3,
        }
    }

    /// Octave transposition baked into the clef
    pub fn octave_change(&self) -> i8 {
        match self {
            Clef::TrebleOctaveDown => -1,
            _ => 0,
        }
    }

    /// Whether this clef belongs to the upper-staff family
    pub fn is_treble_family(&self) -> bool {
        matches!(self, Clef::Treble | Clef::TrebleOctaveDown | Clef::Soprano)
    }

    /// Whether this clef belongs to the lower-staff family
    pub fn is_bass_family(&self) -> bool {
        matches!(self, Clef::Bass | Clef::Tenor)
    }
}

/// Musical mode
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Major,
    Minor,
}

/// Key signature
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySignature {
    /// Position on circle of fifths (-7 to +7, flats to sharps)
    pub fifths: i8,
    pub mode: Mode,
}

impl KeySignature {
    pub fn new(fifths: i8, mode: Mode) -> Result<Self, String> {
        if !(-7..=7).contains(&fifths) {
            return Err(format!("Invalid fifths: {} (must be -7 to +7)", fifths));
        }
        Ok(Self { fifths, mode })
    }
}

/// Time signature
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    /// Number of beats per measure
    pub beats: u8,
    /// Beat unit (2, 4, 8, 16, etc.)
    pub beat_type: u8,
}

impl TimeSignature {
    pub fn new(beats: u8, beat_type: u8) -> Result<Self, String> {
        if beats == 0 {
            return Err("Beats must be greater than 0".to_string());
        }
        if !beat_type.is_power_of_two() {
            return Err(format!("Beat type must be power of 2, got {}", beat_type));
        }
        Ok(Self { beats, beat_type })
    }

    /// Common time, the fallback meter when a score declares none
    pub fn common_time() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }

    /// Nominal measure length as an exact fraction of a whole note times four,
    /// i.e. in quarter-note units: beats * 4 / beat_type.
    pub fn measure_duration_exact(&self) -> Rational {
        Rational::new(self.beats as i32 * 4, self.beat_type as i32)
    }

    /// Nominal measure length in quarter-note units
    pub fn measure_duration(&self) -> f64 {
        let exact = self.measure_duration_exact();
        *exact.numer() as f64 / *exact.denom() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_duration() {
        assert_eq!(TimeSignature::new(4, 4).unwrap().measure_duration(), 4.0);
        assert_eq!(TimeSignature::new(3, 4).unwrap().measure_duration(), 3.0);
        assert_eq!(TimeSignature::new(6, 8).unwrap().measure_duration(), 3.0);
        assert_eq!(TimeSignature::new(2, 2).unwrap().measure_duration(), 4.0);
    }

    #[test]
    fn test_invalid_time_signatures() {
        assert!(TimeSignature::new(0, 4).is_err());
        assert!(TimeSignature::new(4, 3).is_err());
    }

    #[test]
    fn test_clef_families() {
        assert!(Clef::Treble.is_treble_family());
        assert!(Clef::TrebleOctaveDown.is_treble_family());
        assert!(Clef::Bass.is_bass_family());
        assert!(!Clef::Bass.is_treble_family());
    }

    #[test]
    fn test_clef_from_sign() {
        assert_eq!(Clef::from_sign("G", Some(2), 0), Some(Clef::Treble));
        assert_eq!(Clef::from_sign("G", Some(2), -1), Some(Clef::TrebleOctaveDown));
        assert_eq!(Clef::from_sign("F", Some(4), 0), Some(Clef::Bass));
        assert_eq!(Clef::from_sign("C", Some(4), 0), Some(Clef::Tenor));
        assert_eq!(Clef::from_sign("X", None, 0), None);
    }
}
