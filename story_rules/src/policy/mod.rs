//! Policy tables - the static, data-only rules an episode is steered by.
//!
//! Three tables are kept separately so each can be tuned on its own:
//! - **Act gates**: which nudge kinds each act allows or blocks
//! - **Checkpoints**: the predicate that advances each act to the next
//! - **Catalog**: what every nudge kind biases toward and its cooldown
//!
//! Because they are independent they can disagree, so [`PolicyTables::validate`]
//! cross-checks them and every runtime constructor refuses tables that fail.

mod catalog;
mod checkpoints;
mod cues;
mod gates;

pub use catalog::*;
pub use checkpoints::*;
pub use cues::*;
pub use gates::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{Dimension, PairRecord};
use crate::mechanics::{Act, NudgeKind};

/// Errors from loading or validating policy tables.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No gate defined for {0}")]
    MissingGate(Act),

    #[error("More than one gate defined for {0}")]
    DuplicateGate(Act),

    #[error("Gate for {act} both allows and blocks '{kind}'")]
    GateConflict { act: Act, kind: NudgeKind },

    #[error("Gate for {act} has invalid coherence weight {weight}")]
    InvalidWeight { act: Act, weight: f32 },

    #[error("No checkpoint leaves {0}")]
    MissingCheckpoint(Act),

    #[error("More than one checkpoint leaves {0}")]
    DuplicateCheckpoint(Act),

    #[error("Checkpoint '{name}' goes from {from} to {to}; acts must advance by exactly one")]
    NonSequentialCheckpoint { name: String, from: Act, to: Act },

    #[error("Checkpoint '{name}' has out-of-range bound {value}")]
    ThresholdOutOfRange { name: String, value: f32 },

    #[error("Checkpoint '{name}' has no thresholds and no evidence, so it always fires")]
    TrivialCheckpoint { name: String },

    #[error(
        "Checkpoint '{name}' needs {dimension:?} to rise, but {act} permits no nudge that raises it"
    )]
    UnreachableCheckpoint {
        name: String,
        act: Act,
        dimension: Dimension,
    },

    #[error("Catalog has no entry for '{0}'")]
    MissingCatalogEntry(NudgeKind),

    #[error("Catalog has more than one entry for '{0}'")]
    DuplicateCatalogEntry(NudgeKind),

    #[error("Catalog lists '{kind}' for {act}, but that act's gate does not permit it")]
    CatalogActBlocked { kind: NudgeKind, act: Act },

    #[error("Catalog bias for '{0}' is not finite")]
    InvalidBias(NudgeKind),
}

/// All three policy tables together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTables {
    pub gates: Vec<ActGate>,
    pub checkpoints: Vec<CheckpointRule>,
    pub catalog: Vec<NudgeDefinition>,
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self::standard()
    }
}

impl PolicyTables {
    /// The built-in tables.
    pub fn standard() -> Self {
        Self {
            gates: standard_gates(),
            checkpoints: standard_checkpoints(),
            catalog: standard_catalog(),
        }
    }

    /// Parse tables from TOML and validate them.
    pub fn from_toml_str(source: &str) -> Result<Self, PolicyError> {
        let tables: PolicyTables = toml::from_str(source)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Get the gate for an act.
    pub fn gate(&self, act: Act) -> Option<&ActGate> {
        self.gates.iter().find(|g| g.act == act)
    }

    /// Get the checkpoint leaving an act.
    pub fn checkpoint_from(&self, act: Act) -> Option<&CheckpointRule> {
        self.checkpoints.iter().find(|c| c.from == act)
    }

    /// Get the catalog entry for a kind.
    pub fn definition(&self, kind: NudgeKind) -> Option<&NudgeDefinition> {
        self.catalog.iter().find(|d| d.kind == kind)
    }

    /// A kind is usable in an act when the gate permits it and the catalog lists the act.
    pub fn permits(&self, act: Act, kind: NudgeKind) -> bool {
        let gate_ok = self.gate(act).is_some_and(|g| g.permits(kind));
        let catalog_ok = self.definition(kind).is_some_and(|d| d.permitted_in(act));
        gate_ok && catalog_ok
    }

    /// Cross-check all three tables.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let result = self
            .validate_gates()
            .and_then(|_| self.validate_catalog())
            .and_then(|_| self.validate_checkpoints());

        if let Err(e) = &result {
            tracing::warn!(error = %e, "policy tables rejected");
        }
        result
    }

    fn validate_gates(&self) -> Result<(), PolicyError> {
        for act in Act::ALL {
            match self.gates.iter().filter(|g| g.act == act).count() {
                0 => return Err(PolicyError::MissingGate(act)),
                1 => {}
                _ => return Err(PolicyError::DuplicateGate(act)),
            }
        }

        for gate in &self.gates {
            if !gate.base_coherence_weight.is_finite() || gate.base_coherence_weight <= 0.0 {
                return Err(PolicyError::InvalidWeight {
                    act: gate.act,
                    weight: gate.base_coherence_weight,
                });
            }
            if let Some(kind) = gate.allowed.iter().find(|k| gate.blocked.contains(k)) {
                return Err(PolicyError::GateConflict {
                    act: gate.act,
                    kind: *kind,
                });
            }
        }
        Ok(())
    }

    fn validate_catalog(&self) -> Result<(), PolicyError> {
        for kind in NudgeKind::ALL {
            match self.catalog.iter().filter(|d| d.kind == kind).count() {
                0 => return Err(PolicyError::MissingCatalogEntry(kind)),
                1 => {}
                _ => return Err(PolicyError::DuplicateCatalogEntry(kind)),
            }
        }

        for definition in &self.catalog {
            if !definition.bias.is_finite() {
                return Err(PolicyError::InvalidBias(definition.kind));
            }
            for act in definition.acts.iter().flatten() {
                let gate_permits = self.gate(*act).is_some_and(|g| g.permits(definition.kind));
                if !gate_permits {
                    return Err(PolicyError::CatalogActBlocked {
                        kind: definition.kind,
                        act: *act,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_checkpoints(&self) -> Result<(), PolicyError> {
        for act in Act::ALL.iter().filter(|a| !a.is_final()) {
            match self.checkpoints.iter().filter(|c| c.from == *act).count() {
                0 => return Err(PolicyError::MissingCheckpoint(*act)),
                1 => {}
                _ => return Err(PolicyError::DuplicateCheckpoint(*act)),
            }
        }

        let baseline = PairRecord::baseline();
        for rule in &self.checkpoints {
            if rule.from.next() != Some(rule.to) {
                return Err(PolicyError::NonSequentialCheckpoint {
                    name: rule.name.clone(),
                    from: rule.from,
                    to: rule.to,
                });
            }

            let thresholds = rule.condition.thresholds();
            if thresholds.is_empty() && rule.condition.any_of.is_empty() {
                return Err(PolicyError::TrivialCheckpoint {
                    name: rule.name.clone(),
                });
            }

            let evidence_bounds = rule.condition.any_of.iter().filter_map(|e| match e {
                Evidence::TrustDelta { above } | Evidence::TensionDelta { above } => Some(*above),
                _ => None,
            });
            for value in thresholds.iter().map(|(_, v)| *v).chain(evidence_bounds) {
                if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                    return Err(PolicyError::ThresholdOutOfRange {
                        name: rule.name.clone(),
                        value,
                    });
                }
            }

            // A threshold above the baseline must be reachable with moves the act permits.
            for (dimension, min) in thresholds {
                if min < 0.0 {
                    return Err(PolicyError::ThresholdOutOfRange {
                        name: rule.name.clone(),
                        value: min,
                    });
                }
                if min <= baseline.get(dimension) {
                    continue;
                }
                let reachable = self.catalog.iter().any(|d| {
                    d.bias.get(dimension) > 0.0 && self.permits(rule.from, d.kind)
                });
                if !reachable {
                    return Err(PolicyError::UnreachableCheckpoint {
                        name: rule.name.clone(),
                        act: rule.from,
                        dimension,
                    });
                }
            }
        }
        Ok(())
    }
}
