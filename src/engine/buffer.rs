//! Thread-safe message buffer between worker threads and the coordinator.

use crate::protocol::Message;
use std::mem;
use std::sync::Mutex;

/// Ordered, unbounded, append-only message buffer. Any thread may `emit`;
/// only the coordinator thread calls `consume_all`, so the output sink
/// sees messages in causal production order.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    inner: Mutex<Vec<Message>>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Callable concurrently.
    pub fn emit(&self, message: Message) {
        self.inner
            .lock()
            .expect("message buffer poisoned")
            .push(message);
    }

    /// Atomically drain all buffered messages in insertion order.
    pub fn consume_all(&self) -> Vec<Message> {
        mem::take(&mut *self.inner.lock().expect("message buffer poisoned"))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("message buffer poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
