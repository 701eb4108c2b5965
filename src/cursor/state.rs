//! Per-stream checkpoint storage.
//!
//! Values stored here are the in-flight (unconverted) cursor values; the
//! durable representation is produced by the value converter only when a
//! state message is emitted. Seedable so an incremental sync resumes from
//! the prior run's checkpoint.

use crate::protocol::StreamKey;
use serde_json::Value;
use std::collections::HashMap;

/// In-memory per-stream checkpoint store. Coordinator-exclusive.
#[derive(Debug, Default)]
pub struct StreamStateStore {
    checkpoints: HashMap<StreamKey, Value>,
}

impl StreamStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with checkpoints from a previous sync.
    pub fn seed(&mut self, initial: HashMap<StreamKey, Value>) {
        self.checkpoints.extend(initial);
    }

    pub fn get(&self, stream: &StreamKey) -> Option<&Value> {
        self.checkpoints.get(stream)
    }

    pub fn set(&mut self, stream: StreamKey, value: Value) {
        self.checkpoints.insert(stream, value);
    }

    /// Final checkpoints for all streams, for callers that want the end
    /// state rather than the incremental state messages.
    pub fn snapshot(&self) -> HashMap<StreamKey, Value> {
        self.checkpoints.clone()
    }
}
