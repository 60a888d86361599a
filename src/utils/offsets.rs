//! Offset comparison helpers
//!
//! Offsets and durations are f64 quarter-note units derived from exact
//! rational division at import time; comparisons always go through a
//! tolerance to absorb the conversion.

/// Whether two offsets coincide within the given tolerance
pub fn offsets_match(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Whether `offset` falls inside the half-open window [start, start + length)
pub fn within_window(offset: f64, start: f64, length: f64) -> bool {
    offset >= start && offset < start + length
}
