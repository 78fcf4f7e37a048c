//! Relationship components: the per-pair record and the deltas applied to it.

use serde::{Deserialize, Serialize};

/// The four affinity dimensions tracked for every pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Attraction,
    Trust,
    Tension,
    Comfort,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Attraction,
        Dimension::Trust,
        Dimension::Tension,
        Dimension::Comfort,
    ];
}

/// A change to a pair's relationship, as carried by a spoken line or a nudge bias.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationshipDelta {
    #[serde(default)]
    pub attraction: f32,
    #[serde(default)]
    pub trust: f32,
    #[serde(default)]
    pub tension: f32,
    #[serde(default)]
    pub comfort: f32,
}

impl RelationshipDelta {
    pub fn new(attraction: f32, trust: f32, tension: f32, comfort: f32) -> Self {
        Self {
            attraction,
            trust,
            tension,
            comfort,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Read a single dimension.
    pub fn get(&self, dimension: Dimension) -> f32 {
        match dimension {
            Dimension::Attraction => self.attraction,
            Dimension::Trust => self.trust,
            Dimension::Tension => self.tension,
            Dimension::Comfort => self.comfort,
        }
    }

    /// Mean absolute value across all four dimensions.
    pub fn mean_abs(&self) -> f32 {
        (self.attraction.abs() + self.trust.abs() + self.tension.abs() + self.comfort.abs()) / 4.0
    }

    /// Euclidean length of the delta.
    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &RelationshipDelta) -> f32 {
        self.attraction * other.attraction
            + self.trust * other.trust
            + self.tension * other.tension
            + self.comfort * other.comfort
    }

    /// Cosine similarity, or `None` when either vector is zero.
    pub fn cosine(&self, other: &RelationshipDelta) -> Option<f32> {
        let denom = self.norm() * other.norm();
        if denom <= f32::EPSILON {
            None
        } else {
            Some((self.dot(other) / denom).clamp(-1.0, 1.0))
        }
    }

    pub fn is_finite(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.get(*d).is_finite())
    }
}

impl std::ops::Add for RelationshipDelta {
    type Output = RelationshipDelta;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            attraction: self.attraction + rhs.attraction,
            trust: self.trust + rhs.trust,
            tension: self.tension + rhs.tension,
            comfort: self.comfort + rhs.comfort,
        }
    }
}

/// Relationship state for one unordered pair. Every field stays within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub attraction: f32,
    pub trust: f32,
    pub tension: f32,
    pub comfort: f32,
}

impl Default for PairRecord {
    fn default() -> Self {
        Self::baseline()
    }
}

impl PairRecord {
    /// Create a record, clamping every value into [0, 1].
    pub fn new(attraction: f32, trust: f32, tension: f32, comfort: f32) -> Self {
        let mut record = Self {
            attraction,
            trust,
            tension,
            comfort,
        };
        record.clamp();
        record
    }

    /// Low starting values for strangers at the top of an episode.
    pub fn baseline() -> Self {
        Self {
            attraction: 0.1,
            trust: 0.2,
            tension: 0.1,
            comfort: 0.2,
        }
    }

    pub fn get(&self, dimension: Dimension) -> f32 {
        match dimension {
            Dimension::Attraction => self.attraction,
            Dimension::Trust => self.trust,
            Dimension::Tension => self.tension,
            Dimension::Comfort => self.comfort,
        }
    }

    /// Add a delta and clamp.
    pub fn apply(&mut self, delta: &RelationshipDelta) {
        self.attraction += delta.attraction;
        self.trust += delta.trust;
        self.tension += delta.tension;
        self.comfort += delta.comfort;
        self.clamp();
    }

    fn clamp(&mut self) {
        // NaN would survive `clamp`, so it collapses to zero first.
        for value in [
            &mut self.attraction,
            &mut self.trust,
            &mut self.tension,
            &mut self.comfort,
        ] {
            if value.is_nan() {
                *value = 0.0;
            }
            *value = value.clamp(0.0, 1.0);
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        Dimension::ALL
            .iter()
            .all(|d| (0.0..=1.0).contains(&self.get(*d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clamps() {
        let mut record = PairRecord::new(0.95, 0.05, 0.5, 0.5);
        record.apply(&RelationshipDelta::new(0.2, -0.2, 0.0, 0.0));

        assert_eq!(record.attraction, 1.0);
        assert_eq!(record.trust, 0.0);
        assert!(record.is_within_bounds());
    }

    #[test]
    fn test_new_clamps_and_rejects_nan() {
        let record = PairRecord::new(1.5, -0.3, f32::NAN, 0.4);
        assert_eq!(record.attraction, 1.0);
        assert_eq!(record.trust, 0.0);
        assert_eq!(record.tension, 0.0);
        assert!(record.is_within_bounds());
    }

    #[test]
    fn test_mean_abs() {
        let delta = RelationshipDelta::new(0.1, -0.1, 0.2, 0.0);
        assert!((delta.mean_abs() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_cosine() {
        let a = RelationshipDelta::new(1.0, 0.0, 0.0, 0.0);
        let b = RelationshipDelta::new(-1.0, 0.0, 0.0, 0.0);
        assert_eq!(a.cosine(&a), Some(1.0));
        assert_eq!(a.cosine(&b), Some(-1.0));
        assert_eq!(a.cosine(&RelationshipDelta::zero()), None);
    }
}
