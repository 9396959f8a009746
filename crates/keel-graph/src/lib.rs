//! Turn state machine
//!
//! One turn flows classify -> dispatch -> agent -> scan, ending either
//! terminal (a plain reply) or suspended (the agent asked the user a
//! question). Suspended turns are checkpointed per thread and resumed
//! with the user's answer.

mod checkpoint;
mod error;
mod state;
mod workflow;

pub use checkpoint::{CheckpointStore, MemorySaver};
pub use error::{Error, Result};
pub use state::TurnState;
pub use workflow::{TurnGraph, TurnOutcome};
