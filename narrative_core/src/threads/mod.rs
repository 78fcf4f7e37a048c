//! Callback threads - dormant story elements that can be brought back later.
//!
//! The ledger records:
//! - **Threads**: a callback token plus when it was opened and last touched
//! - **Recalls**: every time a line brings a token back
//! - **Resolution**: tokens that have been paid off and are no longer open

mod ledger;
mod thread;

pub use ledger::*;
pub use thread::*;
