//! Stream and partition capabilities.
//!
//! A [`Stream`] is a named, independently-checkpointed source of records.
//! It enumerates [`Partition`]s — independently fetchable slices of its
//! data — which are read concurrently by the worker pool. Partition
//! enumeration and record reads both hand back lazy, single-pass,
//! non-restartable sequences: a slow consumer throttles the producer.

pub mod mem;

pub use mem::{MemoryPartition, MemoryStream, SinglePartitionStream};

use crate::error::Result;
use crate::protocol::{Record, StreamKey};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Opaque key-value slice descriptor (a date range, a page cursor, ...).
pub type SliceDescriptor = serde_json::Map<String, Value>;

/// The pair of descriptor keys denoting a partition's covered range.
/// When a stream declares these, its checkpoint advances from closed
/// partitions' upper bounds instead of from record contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceBoundaries {
    pub lower: String,
    pub upper: String,
}

impl SliceBoundaries {
    pub fn new(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.into(),
        }
    }
}

/// Lazy, single-pass sequence of partitions.
pub type PartitionIter<'a> =
    Box<dyn Iterator<Item = Result<std::sync::Arc<dyn Partition>>> + Send + 'a>;

/// Lazy, single-pass sequence of records.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<Record>> + Send + 'a>;

/// A named source of records, read exactly once per sync.
pub trait Stream: Send + Sync {
    fn key(&self) -> &StreamKey;

    /// Cursor field path (possibly nested); empty means no cursor.
    fn cursor_field(&self) -> &[String];

    /// Primary key field names; empty means none declared.
    fn primary_key(&self) -> &[String];

    /// Slice boundary fields. `Some` enables boundary-driven checkpointing
    /// (partitions may close in any order); `None` means the stream is
    /// content-driven and allows at most one partition.
    fn slice_boundaries(&self) -> Option<&SliceBoundaries>;

    /// Lazily enumerate this stream's partitions.
    fn generate_partitions(&self) -> Result<PartitionIter<'_>>;
}

/// One independently fetchable unit of a stream's data.
///
/// Created by a generation task, read by exactly one read task, and closed
/// once its records are exhausted. `close` is idempotent.
pub trait Partition: Send + Sync {
    fn stream(&self) -> &StreamKey;

    /// Produce this partition's records. Single-pass: calling `read` a
    /// second time yields an invariant error.
    fn read(&self) -> RecordIter<'_>;

    fn slice(&self) -> Option<&SliceDescriptor>;

    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Slice identity: stream name plus a hash of the slice descriptor.
    fn key(&self) -> String {
        partition_key(self.stream(), self.slice())
    }
}

/// Hash a partition's identity from its stream and slice descriptor.
pub fn partition_key(stream: &StreamKey, slice: Option<&SliceDescriptor>) -> String {
    let mut hasher = DefaultHasher::new();
    stream.name.hash(&mut hasher);
    if let Some(ns) = &stream.namespace {
        ns.hash(&mut hasher);
    }
    if let Some(slice) = slice {
        // Map serialization preserves insertion order, which is stable for
        // a given partition instance.
        serde_json::to_string(slice)
            .unwrap_or_default()
            .hash(&mut hasher);
    }
    format!("{}:{:x}", stream, hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slice(lower: i64, upper: i64) -> SliceDescriptor {
        let mut map = SliceDescriptor::new();
        map.insert("lower".to_string(), json!(lower));
        map.insert("upper".to_string(), json!(upper));
        map
    }

    #[test]
    fn test_partition_key_distinguishes_slices() {
        let stream = StreamKey::new("events");
        let a = partition_key(&stream, Some(&slice(0, 10)));
        let b = partition_key(&stream, Some(&slice(10, 20)));
        assert_ne!(a, b);
        assert!(a.starts_with("events:"));
    }

    #[test]
    fn test_partition_key_distinguishes_streams() {
        let sl = slice(0, 10);
        let a = partition_key(&StreamKey::new("events"), Some(&sl));
        let b = partition_key(&StreamKey::new("users"), Some(&sl));
        assert_ne!(a, b);
    }

    #[test]
    fn test_partition_key_stable() {
        let stream = StreamKey::with_namespace("events", "public");
        let sl = slice(5, 6);
        assert_eq!(
            partition_key(&stream, Some(&sl)),
            partition_key(&stream, Some(&sl))
        );
    }
}
