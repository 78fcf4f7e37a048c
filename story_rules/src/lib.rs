//! # Story Rules
//!
//! The "Story Bible" crate - contains the dramatic rules every episode is played by:
//! the cast and relationship model, the five-act structure, and the static steering
//! policy (act gates, checkpoints, nudge catalog). This crate holds no runtime state
//! and does not call into any generation or evaluation logic.

pub mod entities;
pub mod mechanics;
pub mod policy;
pub mod relationships;

pub use entities::*;
pub use mechanics::*;
pub use policy::*;
pub use relationships::*;
