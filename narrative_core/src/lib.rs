//! # Narrative Core (The Director)
//!
//! Real-time runtime for ensemble dialogue episodes. This crate drives an episode
//! through the five-act structure defined in `story_rules`, gates the nudges an
//! operator may inject, and scores whether an intervention is worth making at all.
//!
//! ## Core Components
//!
//! - **episode**: The episode state machine - scenes, lines, plateau and cadence tracking
//! - **evaluation**: Freshness/coherence scoring with a fragility-weighted trade-off
//! - **session**: Caller-owned handle that serializes ticks and nudges per episode
//! - **context**: Generation requests handed to the dialogue collaborator
//! - **threads**: Callback threads opened and recalled across scenes
//! - **events**: Telemetry events and the outbound stream
//!
//! ## Design Philosophy
//!
//! - **Bounded**: Every relationship value stays within [0, 1] after every exchange
//! - **Gated**: Nudges pass act policy, cadence and safety before they touch a scene
//! - **Restrained**: The evaluator abstains unless an intervention clearly pays off

pub mod collaborators;
pub mod config;
pub mod context;
pub mod episode;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod export;
pub mod session;
pub mod snapshot;
pub mod testing;
pub mod threads;

pub use collaborators::*;
pub use config::*;
pub use context::*;
pub use episode::*;
pub use error::*;
pub use evaluation::*;
pub use events::*;
pub use export::*;
pub use session::*;
pub use snapshot::*;
pub use threads::*;
