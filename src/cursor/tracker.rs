//! Per-stream checkpoint state machine.
//!
//! Two exclusive regimes per stream:
//!
//! - **Boundary-driven**: the stream declares slice boundary fields, any
//!   number of partitions may close in any order, and the checkpoint is the
//!   max of closed partitions' upper bounds. Record contents never move the
//!   watermark here.
//! - **Content-driven**: no boundary fields, at most one partition, and the
//!   checkpoint is the max cursor value observed in its records. Closing a
//!   second partition is an invariant violation.
//!
//! `observe` is callable from worker threads through the shared
//! [`ObservedValues`] handle; everything else runs on the coordinator
//! thread only.

use crate::cursor::convert::CursorValueConverter;
use crate::cursor::state::StreamStateStore;
use crate::engine::buffer::MessageBuffer;
use crate::error::{Result, SyncError};
use crate::protocol::{Message, StreamKey};
use crate::stream::{Partition, SliceBoundaries, Stream};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Compare two cursor values. Numbers compare numerically, strings
/// lexicographically (which is correct for ISO-8601 timestamps). Mixed or
/// non-scalar values are not comparable.
pub fn cmp_cursor_values(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return Ok(xi.cmp(&yi));
            }
            let (xf, yf) = (x.as_f64(), y.as_f64());
            match (xf, yf) {
                (Some(xf), Some(yf)) => xf.partial_cmp(&yf).ok_or_else(|| {
                    SyncError::Invariant(format!("cursor values are not comparable: {a} vs {b}"))
                }),
                _ => Err(SyncError::Invariant(format!(
                    "cursor values are not comparable: {a} vs {b}"
                ))),
            }
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(SyncError::Invariant(format!(
            "cursor values are not comparable: {a} vs {b}"
        ))),
    }
}

/// Shared handle through which read tasks report cursor values seen in
/// records. Keeps only the per-stream maximum. Never emits anything.
#[derive(Debug, Clone, Default)]
pub struct ObservedValues {
    inner: Arc<Mutex<HashMap<StreamKey, Value>>>,
}

impl ObservedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cursor value seen in a record of `stream`, keeping the max.
    /// Incomparable values are skipped with a warning rather than failing
    /// the hot read path.
    pub fn observe(&self, stream: &StreamKey, value: &Value) {
        let mut inner = self.inner.lock().expect("observed values poisoned");
        match inner.get(stream) {
            Some(best) => match cmp_cursor_values(value, best) {
                Ok(Ordering::Greater) => {
                    inner.insert(stream.clone(), value.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(stream = %stream, error = %e, "skipping incomparable cursor value");
                }
            },
            None => {
                inner.insert(stream.clone(), value.clone());
            }
        }
    }

    /// Take the best value observed so far for `stream`, if any.
    pub fn take(&self, stream: &StreamKey) -> Option<Value> {
        self.inner
            .lock()
            .expect("observed values poisoned")
            .remove(stream)
    }
}

/// Per-stream cursor declaration, captured at registration time.
struct CursorSpec {
    cursor_field: Vec<String>,
    boundaries: Option<SliceBoundaries>,
}

/// The checkpoint state machine. Owned and driven by the coordinator.
pub struct CursorTracker {
    state: StreamStateStore,
    converter: Arc<dyn CursorValueConverter>,
    observed: ObservedValues,
    specs: HashMap<StreamKey, CursorSpec>,
    content_closed: HashSet<StreamKey>,
}

impl CursorTracker {
    pub fn new(converter: Arc<dyn CursorValueConverter>, state: StreamStateStore) -> Self {
        Self {
            state,
            converter,
            observed: ObservedValues::new(),
            specs: HashMap::new(),
            content_closed: HashSet::new(),
        }
    }

    /// Register a stream's cursor declaration before any of its partitions
    /// are closed.
    pub fn register(&mut self, stream: &dyn Stream) {
        self.specs.insert(
            stream.key().clone(),
            CursorSpec {
                cursor_field: stream.cursor_field().to_vec(),
                boundaries: stream.slice_boundaries().cloned(),
            },
        );
    }

    /// Handle for read tasks to report observed cursor values.
    pub fn observer(&self) -> ObservedValues {
        self.observed.clone()
    }

    /// Final checkpoints after the sync.
    pub fn snapshot(&self) -> HashMap<StreamKey, Value> {
        self.state.snapshot()
    }

    /// Close a partition and, if the stream's watermark advanced, push a
    /// state message onto the buffer. The only operation that mutates
    /// durable checkpoint state.
    pub fn close_partition(
        &mut self,
        partition: &dyn Partition,
        buffer: &MessageBuffer,
    ) -> Result<()> {
        let stream = partition.stream().clone();
        let spec = self.specs.get(&stream).ok_or_else(|| {
            SyncError::Config(format!("stream '{stream}' was never registered"))
        })?;
        let cursor_field = spec.cursor_field.clone();
        let boundaries = spec.boundaries.clone();

        match boundaries {
            Some(bounds) => {
                let slice = partition.slice().ok_or_else(|| SyncError::MissingBoundary {
                    stream: stream.to_string(),
                    detail: "partition carries no slice descriptor".to_string(),
                })?;
                if !slice.contains_key(&bounds.lower) {
                    return Err(SyncError::MissingBoundary {
                        stream: stream.to_string(),
                        detail: format!("slice lacks lower-bound field '{}'", bounds.lower),
                    });
                }
                let upper = slice
                    .get(&bounds.upper)
                    .ok_or_else(|| SyncError::MissingBoundary {
                        stream: stream.to_string(),
                        detail: format!("slice lacks upper-bound field '{}'", bounds.upper),
                    })?
                    .clone();

                // Observed record values are deliberately ignored here; the
                // upper bound is what makes advancing safe under
                // out-of-order completion.
                let state_field = if cursor_field.is_empty() {
                    bounds.upper.clone()
                } else {
                    cursor_field.join(".")
                };
                self.advance(&stream, &state_field, upper, buffer)?;
            }
            None => {
                if !self.content_closed.insert(stream.clone()) {
                    return Err(SyncError::Invariant(format!(
                        "stream '{stream}' has no slice boundaries but closed a second partition"
                    )));
                }
                match self.observed.take(&stream) {
                    Some(best) => {
                        let state_field = cursor_field.join(".");
                        self.advance(&stream, &state_field, best, buffer)?;
                    }
                    None => {
                        debug!(stream = %stream, "no records observed; checkpoint unchanged");
                    }
                }
            }
        }
        Ok(())
    }

    /// Raise the stream's checkpoint to `candidate` if it is higher, and
    /// emit a state message for the new watermark. No-op (and no message)
    /// when the candidate does not advance the checkpoint.
    fn advance(
        &mut self,
        stream: &StreamKey,
        state_field: &str,
        candidate: Value,
        buffer: &MessageBuffer,
    ) -> Result<()> {
        let advanced = match self.state.get(stream) {
            Some(current) => cmp_cursor_values(&candidate, current)? == Ordering::Greater,
            None => true,
        };
        if !advanced {
            return Ok(());
        }

        self.state.set(stream.clone(), candidate.clone());
        let converted = self.converter.to_state(&candidate)?;
        let mut state = serde_json::Map::new();
        state.insert(state_field.to_string(), converted);
        debug!(stream = %stream, checkpoint = %candidate, "checkpoint advanced");
        buffer.emit(Message::state(stream.clone(), Value::Object(state)));
        Ok(())
    }
}
