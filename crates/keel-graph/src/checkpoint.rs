//! Checkpoint store for suspend/resume
//!
//! State is addressed purely by thread id. Callers must use a fresh
//! thread id per conversation and never drive one thread id from two
//! callers at once.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::state::TurnState;

/// Persistence boundary for turn state.
///
/// The in-memory implementation is enough for a single session. A
/// durable implementation is only needed if suspended turns must
/// survive process restarts.
pub trait CheckpointStore: Send + Sync {
    /// Persist the state for a thread, replacing any prior checkpoint
    fn save(&self, thread_id: &str, state: &TurnState);

    /// Retrieve the latest checkpoint for a thread
    fn load(&self, thread_id: &str) -> Option<TurnState>;

    /// Drop a thread's checkpoint entirely
    fn discard(&self, thread_id: &str);
}

/// In-memory checkpoint store
#[derive(Default)]
pub struct MemorySaver {
    threads: RwLock<HashMap<String, TurnState>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads currently checkpointed
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

impl CheckpointStore for MemorySaver {
    fn save(&self, thread_id: &str, state: &TurnState) {
        self.threads
            .write()
            .insert(thread_id.to_string(), state.clone());
    }

    fn load(&self, thread_id: &str) -> Option<TurnState> {
        self.threads.read().get(thread_id).cloned()
    }

    fn discard(&self, thread_id: &str) {
        self.threads.write().remove(thread_id);
    }
}
