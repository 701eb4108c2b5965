//! In-memory stream and partition implementations.
//!
//! [`SinglePartitionStream`] is the degenerate implementation for sources
//! that cannot be partitioned: one partition, no slice descriptor. The
//! general [`MemoryStream`]/[`MemoryPartition`] pair backs tests and small
//! static sources.

use super::{Partition, PartitionIter, RecordIter, SliceBoundaries, SliceDescriptor, Stream};
use crate::error::{Result, SyncError};
use crate::protocol::{Record, StreamKey};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A partition over a fixed set of records.
///
/// Records are taken on the first `read()` call, honoring the single-pass
/// contract. Failure injection: each element is a `Result`, so tests can
/// place partition-local errors between records.
pub struct MemoryPartition {
    stream: StreamKey,
    slice: Option<SliceDescriptor>,
    records: Mutex<Option<Vec<Result<Record>>>>,
    closed: AtomicBool,
}

impl MemoryPartition {
    pub fn new(stream: StreamKey, slice: Option<SliceDescriptor>, records: Vec<Value>) -> Self {
        let records = records
            .into_iter()
            .map(|data| Ok(Record::new(stream.clone(), data)))
            .collect();
        Self::from_results(stream, slice, records)
    }

    /// Build a partition whose read sequence includes injected errors.
    pub fn from_results(
        stream: StreamKey,
        slice: Option<SliceDescriptor>,
        records: Vec<Result<Record>>,
    ) -> Self {
        Self {
            stream,
            slice,
            records: Mutex::new(Some(records)),
            closed: AtomicBool::new(false),
        }
    }
}

impl Partition for MemoryPartition {
    fn stream(&self) -> &StreamKey {
        &self.stream
    }

    fn read(&self) -> RecordIter<'_> {
        let taken = self
            .records
            .lock()
            .expect("memory partition poisoned")
            .take();
        match taken {
            Some(records) => Box::new(records.into_iter()),
            None => Box::new(std::iter::once(Err(SyncError::Invariant(format!(
                "partition {} read twice",
                self.key()
            ))))),
        }
    }

    fn slice(&self) -> Option<&SliceDescriptor> {
        self.slice.as_ref()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A stream over a fixed list of pre-built partitions.
pub struct MemoryStream {
    key: StreamKey,
    cursor_field: Vec<String>,
    primary_key: Vec<String>,
    boundaries: Option<SliceBoundaries>,
    partitions: Mutex<Option<Vec<Arc<dyn Partition>>>>,
}

impl MemoryStream {
    pub fn new(key: StreamKey, partitions: Vec<Arc<dyn Partition>>) -> Self {
        Self {
            key,
            cursor_field: Vec::new(),
            primary_key: Vec::new(),
            boundaries: None,
            partitions: Mutex::new(Some(partitions)),
        }
    }

    pub fn with_cursor_field(mut self, field: impl Into<String>) -> Self {
        self.cursor_field = vec![field.into()];
        self
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = vec![key.into()];
        self
    }

    pub fn with_boundaries(mut self, boundaries: SliceBoundaries) -> Self {
        self.boundaries = Some(boundaries);
        self
    }
}

impl Stream for MemoryStream {
    fn key(&self) -> &StreamKey {
        &self.key
    }

    fn cursor_field(&self) -> &[String] {
        &self.cursor_field
    }

    fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    fn slice_boundaries(&self) -> Option<&SliceBoundaries> {
        self.boundaries.as_ref()
    }

    fn generate_partitions(&self) -> Result<PartitionIter<'_>> {
        let taken = self
            .partitions
            .lock()
            .expect("memory stream poisoned")
            .take();
        match taken {
            Some(partitions) => Ok(Box::new(partitions.into_iter().map(Ok))),
            None => Err(SyncError::Invariant(format!(
                "stream {} generated partitions twice",
                self.key
            ))),
        }
    }
}

/// Degenerate stream for non-partitioned sources: exactly one partition
/// carrying no slice descriptor, checkpointed from observed record content.
pub struct SinglePartitionStream {
    inner: MemoryStream,
}

impl SinglePartitionStream {
    pub fn new(key: StreamKey, records: Vec<Value>) -> Self {
        let partition: Arc<dyn Partition> =
            Arc::new(MemoryPartition::new(key.clone(), None, records));
        Self {
            inner: MemoryStream::new(key, vec![partition]),
        }
    }

    pub fn with_cursor_field(mut self, field: impl Into<String>) -> Self {
        self.inner = self.inner.with_cursor_field(field);
        self
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.inner = self.inner.with_primary_key(key);
        self
    }
}

impl Stream for SinglePartitionStream {
    fn key(&self) -> &StreamKey {
        self.inner.key()
    }

    fn cursor_field(&self) -> &[String] {
        self.inner.cursor_field()
    }

    fn primary_key(&self) -> &[String] {
        self.inner.primary_key()
    }

    fn slice_boundaries(&self) -> Option<&SliceBoundaries> {
        None
    }

    fn generate_partitions(&self) -> Result<PartitionIter<'_>> {
        self.inner.generate_partitions()
    }
}
