//! Cast member definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::CharacterId;

/// A character taking part in an episode.
///
/// The narrative runtime only reads this data; it never holds a reference back into
/// whatever system authored the character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub id: CharacterId,
    pub name: String,
    pub archetype: Option<String>,

    pub persona_traits: Vec<String>,
    /// Lines the character will not cross; surfaced to the generator.
    pub boundaries: Vec<String>,

    // Additional capability data in a flexible map
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CastMember {
    /// Create a new cast member with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            archetype: None,
            persona_traits: Vec::new(),
            boundaries: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Set the archetype.
    pub fn with_archetype(mut self, archetype: impl Into<String>) -> Self {
        self.archetype = Some(archetype.into());
        self
    }

    /// Add a persona trait.
    pub fn with_trait(mut self, persona_trait: impl Into<String>) -> Self {
        self.persona_traits.push(persona_trait.into());
        self
    }

    /// Add a boundary.
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundaries.push(boundary.into());
        self
    }
}
