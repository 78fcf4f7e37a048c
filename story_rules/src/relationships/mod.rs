//! The relationship graph: one bounded record per unordered character pair.
//!
//! Deltas land on the spotlighted pair first. Every other tracked pair then receives
//! a fixed-strength ripple:
//! - **Compersion**: positive attraction/comfort on the primary pair lifts the same
//!   dimension elsewhere.
//! - **Jealousy**: tension on the primary pair above a small threshold raises tension
//!   and erodes trust elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{CharacterId, PairKey, PairRecord, RelationshipDelta};

/// Fraction of the primary delta that ripples out to other pairs.
pub const RIPPLE_FRACTION: f32 = 0.1;

/// Primary tension delta above which jealousy ripples.
pub const JEALOUSY_TENSION_THRESHOLD: f32 = 0.05;

/// Flat, serializable view of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairSnapshot {
    pub a: CharacterId,
    pub b: CharacterId,
    pub record: PairRecord,
}

/// What one line did to the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RippleReport {
    /// Ripple delta handed to every non-primary pair.
    pub ripple: RelationshipDelta,
    /// Number of pairs that received it.
    pub pairs_touched: usize,
}

/// Relationship state for every pair in the cast.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    pairs: BTreeMap<PairKey, PairRecord>,
}

impl RelationshipGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph with every pair of `cast` at the baseline record.
    pub fn for_cast(cast: &[CharacterId]) -> Self {
        let mut graph = Self::new();
        for (i, a) in cast.iter().enumerate() {
            for b in cast.iter().skip(i + 1) {
                if a != b {
                    graph.pairs.insert(PairKey::new(*a, *b), PairRecord::baseline());
                }
            }
        }
        graph
    }

    /// Get the record for a pair.
    pub fn get(&self, a: CharacterId, b: CharacterId) -> Option<&PairRecord> {
        self.pairs.get(&PairKey::new(a, b))
    }

    /// Replace a pair's record outright, e.g. from imported context.
    pub fn set(&mut self, a: CharacterId, b: CharacterId, record: PairRecord) {
        // Re-clamp through the constructor in case the caller built it by hand.
        let record =
            PairRecord::new(record.attraction, record.trust, record.tension, record.comfort);
        self.pairs.insert(PairKey::new(a, b), record);
    }

    /// Apply a line's delta to the primary pair, then ripple to every other pair.
    pub fn apply_line(
        &mut self,
        a: CharacterId,
        b: CharacterId,
        delta: &RelationshipDelta,
    ) -> RippleReport {
        let primary = PairKey::new(a, b);
        self.pairs.entry(primary).or_default().apply(delta);

        let ripple = ripple_for(delta);
        if ripple == RelationshipDelta::zero() {
            return RippleReport::default();
        }

        let mut pairs_touched = 0;
        for (key, record) in self.pairs.iter_mut() {
            if *key == primary {
                continue;
            }
            record.apply(&ripple);
            pairs_touched += 1;
        }

        RippleReport {
            ripple,
            pairs_touched,
        }
    }

    /// Iterate over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &PairRecord)> {
        self.pairs.iter()
    }

    /// Get the total number of tracked pairs.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Flat snapshot of every pair, in key order.
    pub fn snapshot(&self) -> Vec<PairSnapshot> {
        self.pairs
            .iter()
            .map(|(key, record)| {
                let (a, b) = key.members();
                PairSnapshot {
                    a,
                    b,
                    record: *record,
                }
            })
            .collect()
    }
}

/// Ripple delta for the watchers of a primary-pair change.
pub fn ripple_for(delta: &RelationshipDelta) -> RelationshipDelta {
    let mut ripple = RelationshipDelta::zero();

    // Compersion
    if delta.attraction > 0.0 {
        ripple.attraction += delta.attraction * RIPPLE_FRACTION;
    }
    if delta.comfort > 0.0 {
        ripple.comfort += delta.comfort * RIPPLE_FRACTION;
    }

    // Jealousy
    if delta.tension > JEALOUSY_TENSION_THRESHOLD {
        ripple.tension += delta.tension * RIPPLE_FRACTION;
        ripple.trust -= delta.tension * RIPPLE_FRACTION;
    }

    ripple
}
