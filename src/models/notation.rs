//! Spanner annotations: notations that extend across timed elements
//!
//! A spanner references its member elements by identity. References are
//! only meaningful within the document that owns both the spanner and the
//! elements; reconciliation builds fresh spanners for each separated copy.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::elements::ElementId;

lazy_static! {
    /// Tags of `Other` spanners that carry ensemble-wide structure rather
    /// than voice-local phrasing (tempo/pedal-like notations).
    static ref STRUCTURAL_TAGS: HashSet<&'static str> = {
        let mut tags = HashSet::new();
        tags.insert("pedal");
        tags.insert("tempo");
        tags.insert("octave-shift");
        tags.insert("rehearsal");
        tags
    };
}

/// Typed spanner annotation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum SpannerKind {
    Slur,
    Tie,
    Crescendo,
    Diminuendo,
    Dashes,
    Other(String),
}

impl SpannerKind {
    /// Whether this kind is structural: tempo/pedal-like notations that
    /// belong to the whole ensemble rather than to one voice.
    pub fn is_structural(&self) -> bool {
        match self {
            SpannerKind::Other(tag) => STRUCTURAL_TAGS.contains(tag.as_str()),
            _ => false,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SpannerKind::Slur => "slur",
            SpannerKind::Tie => "tie",
            SpannerKind::Crescendo => "crescendo",
            SpannerKind::Diminuendo => "diminuendo",
            SpannerKind::Dashes => "dashes",
            SpannerKind::Other(tag) => tag,
        }
    }
}

/// An annotation spanning two or more timed elements (slur, tie, wedge,
/// dashed extender). A repaired spanner may legally degrade to a single
/// anchor; fresh spanners always start with at least two references.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Spanner {
    pub kind: SpannerKind,

    /// Ordered references to member elements, by identity
    pub refs: Vec<ElementId>,
}

impl Spanner {
    /// Create a spanner over two or more elements
    pub fn new(kind: SpannerKind, refs: Vec<ElementId>) -> Result<Self, String> {
        if refs.len() < 2 {
            return Err(format!(
                "Spanner needs at least 2 references, got {}",
                refs.len()
            ));
        }
        Ok(Self { kind, refs })
    }

    /// Create a degraded spanner anchored to a single element
    pub fn single_anchor(kind: SpannerKind, anchor: ElementId) -> Self {
        Self {
            kind,
            refs: vec![anchor],
        }
    }

    pub fn first_ref(&self) -> Option<ElementId> {
        self.refs.first().copied()
    }

    pub fn last_ref(&self) -> Option<ElementId> {
        self.refs.last().copied()
    }
}
