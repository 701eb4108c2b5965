//! Partition read task.
//!
//! Reads one partition's records, forwarding each into the message buffer
//! and (content-driven regime only) reporting its cursor value to the
//! tracker's observe side. Failure isolation is per partition: non-fatal
//! read errors become error logs and the partition still completes, so
//! sibling partitions and other streams are unaffected. Fatal errors
//! propagate and take the sync down.

use crate::cursor::tracker::ObservedValues;
use crate::engine::buffer::MessageBuffer;
use crate::engine::queue::{EventSender, QueueEvent};
use crate::error::{Result, SyncError};
use crate::protocol::{LogLevel, Message, StreamKey};
use crate::stream::Partition;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ReadTask {
    partition: Arc<dyn Partition>,
    buffer: Arc<MessageBuffer>,
    /// Present only for content-driven streams.
    observer: Option<ObservedValues>,
    cursor_field: Vec<String>,
    events: EventSender,
}

impl ReadTask {
    pub fn new(
        partition: Arc<dyn Partition>,
        buffer: Arc<MessageBuffer>,
        observer: Option<ObservedValues>,
        cursor_field: Vec<String>,
        events: EventSender,
    ) -> Self {
        Self {
            partition,
            buffer,
            observer,
            cursor_field,
            events,
        }
    }

    pub fn run(self) -> Result<()> {
        let stream = self.partition.stream().clone();

        match self.read_records(&stream) {
            Ok(count) => {
                debug!(stream = %stream, partition = %self.partition.key(), records = count, "partition read");
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(stream = %stream, partition = %self.partition.key(), error = %e, "partition failed");
                self.buffer.emit(Message::log(
                    LogLevel::Error,
                    format!("partition {} failed: {e}", self.partition.key()),
                ));
            }
        }

        self.partition.close();
        self.events
            .send(QueueEvent::PartitionComplete(Arc::clone(&self.partition)))
            .map_err(|_| SyncError::Pool("completion queue closed".to_string()))
    }

    fn read_records(&self, stream: &StreamKey) -> Result<u64> {
        let mut count = 0u64;
        for item in self.partition.read() {
            let record = match item {
                Ok(record) => record,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Record-level failure: log and keep reading
                    self.buffer.emit(Message::log(
                        LogLevel::Error,
                        format!(
                            "skipping bad record in partition {}: {e}",
                            self.partition.key()
                        ),
                    ));
                    continue;
                }
            };

            if let Some(observer) = &self.observer {
                if let Some(value) = record.field(&self.cursor_field) {
                    observer.observe(stream, value);
                }
            }

            self.buffer
                .emit(Message::record(record, Utc::now().timestamp_millis()));
            count += 1;
        }
        Ok(count)
    }
}
