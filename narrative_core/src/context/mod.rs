//! Generation context - the structural snapshot handed to dialogue generation.
//!
//! A request is assembled from the episode once per tick:
//! 1. **Structure**: act, scene, vibe, setting and content constraints
//! 2. **Spotlight**: the pair driving the scene plus the ordered speaker list
//! 3. **History**: the most recent lines, oldest first
//! 4. **Steering**: bias flags from pending nudges and recovery state
//! 5. **Continuity**: callback tokens still open

mod bias;

pub use bias::*;

use serde::{Deserialize, Serialize};
use story_rules::{Act, CastMember, CharacterId, PairRecord};

use crate::config::ContentConstraints;
use crate::episode::{EpisodeId, SpokenLine};

/// Everything the dialogue generator is told about the next exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub episode: EpisodeId,
    /// Exchange being generated.
    pub exchange: u64,
    pub act: Act,
    pub scene_index: u32,
    pub vibe: String,
    pub setting: String,
    pub constraints: ContentConstraints,

    /// Full cast, for persona and boundary lookups.
    pub cast: Vec<CastMember>,
    pub spotlight: (CharacterId, CharacterId),
    /// Who should speak, in order.
    pub speakers: Vec<CharacterId>,
    /// Current record for the spotlighted pair.
    pub pair: PairRecord,

    pub recent_lines: Vec<SpokenLine>,
    pub bias: BiasFlags,
    pub open_callbacks: Vec<String>,
}

impl GenerationRequest {
    /// Look up a cast member by id.
    pub fn member(&self, id: CharacterId) -> Option<&CastMember> {
        self.cast.iter().find(|c| c.id == id)
    }

    fn name_of(&self, id: CharacterId) -> &str {
        self.member(id).map(|c| c.name.as_str()).unwrap_or("Unknown")
    }

    /// Format the request as a prompt string.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Structure\n");
        prompt.push_str(&format!(
            "{}, scene {}, exchange {}\nVibe: {}\nSetting: {}\n",
            self.act, self.scene_index, self.exchange, self.vibe, self.setting
        ));
        prompt.push_str(&format!(
            "Content: {}, lines under {:.0}s\n\n",
            if self.constraints.pg13 {
                "PG-13"
            } else {
                "unrestricted"
            },
            self.constraints.max_line_seconds
        ));

        prompt.push_str("## Spotlight\n");
        prompt.push_str(&format!(
            "{} and {}: attraction {:.2}, trust {:.2}, tension {:.2}, comfort {:.2}\n",
            self.name_of(self.spotlight.0),
            self.name_of(self.spotlight.1),
            self.pair.attraction,
            self.pair.trust,
            self.pair.tension,
            self.pair.comfort
        ));
        for id in [self.spotlight.0, self.spotlight.1] {
            if let Some(member) = self.member(id) {
                if !member.persona_traits.is_empty() {
                    prompt.push_str(&format!(
                        "- {}: {}\n",
                        member.name,
                        member.persona_traits.join(", ")
                    ));
                }
                if !member.boundaries.is_empty() {
                    prompt.push_str(&format!(
                        "- {} will not: {}\n",
                        member.name,
                        member.boundaries.join("; ")
                    ));
                }
            }
        }
        let order: Vec<_> = self.speakers.iter().map(|id| self.name_of(*id)).collect();
        prompt.push_str(&format!("Speaking order: {}\n\n", order.join(", ")));

        if !self.recent_lines.is_empty() {
            prompt.push_str("## Recent Lines\n");
            for line in &self.recent_lines {
                prompt.push_str(&format!("{}: {}\n", line.speaker_name, line.text));
            }
            prompt.push('\n');
        }

        let steering = self.bias.describe();
        if !steering.is_empty() {
            prompt.push_str("## Steering\n");
            for hint in steering {
                prompt.push_str(&format!("- {}\n", hint));
            }
            prompt.push('\n');
        }

        if !self.open_callbacks.is_empty() {
            prompt.push_str("## Open Callbacks\n");
            for token in &self.open_callbacks {
                prompt.push_str(&format!("- {}\n", token));
            }
            prompt.push('\n');
        }

        prompt
    }
}
