//! Partition generation task.
//!
//! Enumerates one stream's partitions lazily, posting a discovery event
//! for each so the coordinator can start reading before enumeration
//! finishes (streams may have very large or unbounded partition counts).
//! Posts exactly one generation-complete event at exhaustion, including
//! for streams with zero partitions.

use crate::engine::queue::{EventSender, QueueEvent};
use crate::error::{Result, SyncError};
use crate::stream::Stream;
use std::sync::Arc;
use tracing::debug;

pub struct GenerationTask {
    stream: Arc<dyn Stream>,
    events: EventSender,
}

impl GenerationTask {
    pub fn new(stream: Arc<dyn Stream>, events: EventSender) -> Self {
        Self { stream, events }
    }

    pub fn run(self) -> Result<()> {
        let key = self.stream.key().clone();
        debug!(stream = %key, "generating partitions");

        let mut count = 0u64;
        for partition in self.stream.generate_partitions()? {
            let partition = partition?;
            self.events
                .send(QueueEvent::PartitionDiscovered(partition))
                .map_err(|_| SyncError::Pool("completion queue closed".to_string()))?;
            count += 1;
        }

        debug!(stream = %key, partitions = count, "generation complete");
        self.events
            .send(QueueEvent::GenerationComplete(key))
            .map_err(|_| SyncError::Pool("completion queue closed".to_string()))
    }
}
