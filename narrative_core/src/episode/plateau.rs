//! Plateau detection - notices when the story stops moving.
//!
//! The detector only counts. Reaching the threshold makes the evaluator favour
//! freshness; it never ends a scene or changes the act on its own.

use std::collections::HashSet;
use story_rules::normalize;

use super::SpokenLine;
use crate::config::PlateauConfig;

/// Outcome of one plateau check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateauObservation {
    /// Not enough lines yet to judge.
    Insufficient,
    /// Lines are flat or repetitive; the counter went up.
    Stalled { counter: u32 },
    /// The story moved; the counter was reset.
    Moving,
}

#[derive(Debug, Clone)]
pub struct PlateauDetector {
    config: PlateauConfig,
    counter: u32,
}

impl PlateauDetector {
    pub fn new(config: PlateauConfig) -> Self {
        Self { config, counter: 0 }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn threshold(&self) -> u32 {
        self.config.threshold
    }

    pub fn is_plateauing(&self) -> bool {
        self.counter >= self.config.threshold
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Inspect the most recent lines (oldest first) after a line is produced.
    pub fn observe(&mut self, recent: &[&SpokenLine]) -> PlateauObservation {
        let window = self.config.window.max(2);
        if recent.len() < window {
            return PlateauObservation::Insufficient;
        }
        let lines = &recent[recent.len() - window..];

        let magnitude =
            lines.iter().map(|l| l.deltas.mean_abs()).sum::<f32>() / lines.len() as f32;
        let flat = magnitude < self.config.min_magnitude;
        let repetitive = any_near_duplicate(lines, self.config.similarity);

        if flat || repetitive {
            self.counter += 1;
            tracing::debug!(counter = self.counter, flat, repetitive, "plateau detected");
            PlateauObservation::Stalled {
                counter: self.counter,
            }
        } else {
            self.counter = 0;
            PlateauObservation::Moving
        }
    }
}

fn any_near_duplicate(lines: &[&SpokenLine], threshold: f32) -> bool {
    let sets: Vec<HashSet<String>> = lines.iter().map(|l| word_set(&l.text)).collect();
    for (i, a) in sets.iter().enumerate() {
        for b in sets.iter().skip(i + 1) {
            if word_overlap(a, b) > threshold {
                return true;
            }
        }
    }
    false
}

/// Normalized word set of a text.
pub fn word_set(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of two word sets; two empty sets count as identical.
pub fn word_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
