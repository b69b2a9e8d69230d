//! # Adapters
//!
//! - `memory` - in-process hub of simulated contexts
//! - `time` - system clock

pub mod memory;
mod time;

pub use memory::{ContextId, HubEndpoint, MessageHub};
pub use time::SystemTimeSource;
