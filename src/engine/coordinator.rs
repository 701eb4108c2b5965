//! Completion-queue coordinator.
//!
//! Single-consumer loop draining the completion queue and driving every
//! side effect: submitting read tasks for discovered partitions, closing
//! partitions through the cursor tracker, starting the next stream's
//! generation, emitting stream status, and draining the message buffer to
//! the output sink.
//!
//! All bookkeeping here (partition registries, generating set, record
//! counters, cursor state) is owned exclusively by this loop and mutated
//! only in response to dequeued events; the single-writer discipline is
//! what makes it safe without locks.

use crate::config::SyncConfig;
use crate::cursor::CursorTracker;
use crate::engine::buffer::MessageBuffer;
use crate::engine::generator::GenerationTask;
use crate::engine::pool::WorkerPool;
use crate::engine::queue::{EventReceiver, EventSender, QueueEvent};
use crate::engine::reader::ReadTask;
use crate::error::{Result, SyncError};
use crate::protocol::{Message, OutputSink, StreamKey, StreamStatus};
use crate::stream::{Partition, Stream};
use crossbeam_channel::RecvTimeoutError;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// How often the loop wakes from an empty queue to poll for task failures.
const FAILURE_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Coordinator {
    config: SyncConfig,
    pool: WorkerPool,
    events_tx: EventSender,
    events_rx: EventReceiver,
    buffer: Arc<MessageBuffer>,
    tracker: CursorTracker,

    streams: HashMap<StreamKey, Arc<dyn Stream>>,
    pending: VecDeque<StreamKey>,
    generating: HashSet<StreamKey>,
    generation_done: HashSet<StreamKey>,
    partitions: HashMap<StreamKey, Vec<Arc<dyn Partition>>>,
    /// Discovered partitions whose completion event has not been handled
    /// yet. A stream is not done while any of its reads are unacknowledged,
    /// even if the partitions themselves already flipped to closed.
    pending_completion: HashMap<StreamKey, usize>,
    record_counts: HashMap<StreamKey, u64>,
    done: HashSet<StreamKey>,
}

impl Coordinator {
    pub fn new(
        config: SyncConfig,
        streams: Vec<Arc<dyn Stream>>,
        tracker: CursorTracker,
        pool: WorkerPool,
        buffer: Arc<MessageBuffer>,
        events_tx: EventSender,
        events_rx: EventReceiver,
    ) -> Self {
        let pending: VecDeque<StreamKey> = streams.iter().map(|s| s.key().clone()).collect();
        let streams = streams
            .into_iter()
            .map(|s| (s.key().clone(), s))
            .collect();
        Self {
            config,
            pool,
            events_tx,
            events_rx,
            buffer,
            tracker,
            streams,
            pending,
            generating: HashSet::new(),
            generation_done: HashSet::new(),
            partitions: HashMap::new(),
            pending_completion: HashMap::new(),
            record_counts: HashMap::new(),
            done: HashSet::new(),
        }
    }

    /// Drive the sync to a terminal state. Always shuts the pool down
    /// before returning, so no task outlives the coordinator.
    pub fn run(
        mut self,
        sink: &mut dyn OutputSink,
    ) -> Result<(HashMap<StreamKey, u64>, HashMap<StreamKey, Value>)> {
        let result = self.run_loop(sink);
        match result {
            Ok(()) => {
                self.pool.shutdown();
                Ok((self.record_counts, self.tracker.snapshot()))
            }
            Err(e) => {
                // Fail fast: drop queued work, let in-flight tasks finish,
                // and stop draining the queue. No further checkpoints are
                // emitted past the point of failure.
                self.pool.abort();
                error!(class = ?e.classify(), error = %e, "sync failed");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        self.start_pending_generation(sink)?;

        while self.done.len() < self.streams.len() {
            if let Some(failure) = self.pool.take_failure() {
                return Err(failure);
            }
            match self.events_rx.recv_timeout(FAILURE_POLL_INTERVAL) {
                Ok(event) => self.handle_event(event, sink)?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SyncError::Pool(
                        "completion queue disconnected before sync finished".to_string(),
                    ))
                }
            }
        }

        // A worker may have failed after posting its last event
        if let Some(failure) = self.pool.take_failure() {
            return Err(failure);
        }
        self.drain(sink)
    }

    fn handle_event(&mut self, event: QueueEvent, sink: &mut dyn OutputSink) -> Result<()> {
        match event {
            QueueEvent::PartitionDiscovered(partition) => {
                self.on_partition_discovered(partition)?;
            }
            QueueEvent::PartitionComplete(partition) => {
                self.on_partition_complete(partition, sink)?;
            }
            QueueEvent::GenerationComplete(stream) => {
                self.on_generation_complete(stream, sink)?;
            }
        }
        self.drain(sink)
    }

    fn on_partition_discovered(&mut self, partition: Arc<dyn Partition>) -> Result<()> {
        let key = partition.stream().clone();
        if self.config.verbose_slice_logging {
            debug!(stream = %key, partition = %partition.key(), slice = ?partition.slice(), "partition discovered");
        }

        let stream = self
            .streams
            .get(&key)
            .ok_or_else(|| SyncError::Config(format!("partition for unknown stream '{key}'")))?;

        self.partitions
            .entry(key.clone())
            .or_default()
            .push(Arc::clone(&partition));
        *self.pending_completion.entry(key).or_default() += 1;

        // Observation only feeds the checkpoint in the content-driven regime
        let observer = if stream.slice_boundaries().is_none() {
            Some(self.tracker.observer())
        } else {
            None
        };
        let task = ReadTask::new(
            partition,
            Arc::clone(&self.buffer),
            observer,
            stream.cursor_field().to_vec(),
            self.events_tx.clone(),
        );
        self.pool.submit(move || task.run())
    }

    fn on_partition_complete(
        &mut self,
        partition: Arc<dyn Partition>,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        partition.close();
        self.tracker.close_partition(partition.as_ref(), &self.buffer)?;
        let key = partition.stream().clone();
        if let Some(pending) = self.pending_completion.get_mut(&key) {
            *pending = pending.saturating_sub(1);
        }
        self.finish_stream_if_done(&key, sink)
    }

    fn on_generation_complete(
        &mut self,
        key: StreamKey,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        self.generating.remove(&key);
        self.generation_done.insert(key.clone());
        self.finish_stream_if_done(&key, sink)?;
        self.start_pending_generation(sink)
    }

    /// Top up generation slots from the pending list, emitting a started
    /// status for each stream whose generation begins.
    fn start_pending_generation(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        while self.generating.len() < self.config.max_concurrent_generators {
            let Some(key) = self.pending.pop_front() else {
                break;
            };
            let stream = Arc::clone(self.streams.get(&key).ok_or_else(|| {
                SyncError::Config(format!("pending stream '{key}' is unknown"))
            })?);
            self.generating.insert(key.clone());

            let task = GenerationTask::new(stream, self.events_tx.clone());
            self.pool.submit(move || task.run())?;

            info!(stream = %key, "stream started");
            sink.accept(Message::status(key, StreamStatus::Started))?;
        }
        Ok(())
    }

    fn stream_is_done(&self, key: &StreamKey) -> bool {
        self.generation_done.contains(key)
            && !self.generating.contains(key)
            && self.pending_completion.get(key).map_or(true, |&n| n == 0)
            && self
                .partitions
                .get(key)
                .map_or(true, |ps| ps.iter().all(|p| p.is_closed()))
    }

    /// Emit the stream-complete status exactly once, after generation has
    /// completed and every produced partition has closed. Buffered
    /// messages are flushed first so records and the final state message
    /// precede the status.
    fn finish_stream_if_done(
        &mut self,
        key: &StreamKey,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        if !self.stream_is_done(key) || !self.done.insert(key.clone()) {
            return Ok(());
        }
        self.drain(sink)?;
        let records = self.record_counts.get(key).copied().unwrap_or(0);
        info!(stream = %key, records, "stream complete");
        sink.accept(Message::status(key.clone(), StreamStatus::Complete))
    }

    /// Drain the message buffer into the sink, counting records per stream
    /// along the way (diagnostics only).
    fn drain(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        for message in self.buffer.consume_all() {
            if let Message::Record(record) = &message {
                *self.record_counts.entry(record.stream.clone()).or_default() += 1;
            }
            sink.accept(message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{IdentityConverter, StreamStateStore};
    use crate::engine::queue::completion_queue;
    use crate::protocol::CollectSink;
    use crate::stream::{MemoryPartition, MemoryStream, SliceBoundaries, SliceDescriptor};
    use serde_json::json;

    fn slice(lower: i64, upper: i64) -> SliceDescriptor {
        let mut map = SliceDescriptor::new();
        map.insert("lower".to_string(), json!(lower));
        map.insert("upper".to_string(), json!(upper));
        map
    }

    fn complete_count(sink: &CollectSink, key: &StreamKey) -> usize {
        sink.messages
            .iter()
            .filter(|m| {
                matches!(m, Message::StreamStatus(s)
                    if &s.stream == key && s.status == StreamStatus::Complete)
            })
            .count()
    }

    /// Feeds the event handler a scripted sequence: three partitions are
    /// discovered, generation finishes, then the closes are handled in
    /// order second, first, third. The complete status must appear only
    /// once the third close has been handled, independent of the order
    /// the read tasks actually finished in.
    #[test]
    fn test_complete_waits_for_last_close_regardless_of_order() {
        let key = StreamKey::new("events");
        let partitions: Vec<Arc<dyn Partition>> = (0..3)
            .map(|i| {
                Arc::new(MemoryPartition::new(
                    key.clone(),
                    Some(slice(i * 10, (i + 1) * 10)),
                    vec![],
                )) as Arc<dyn Partition>
            })
            .collect();
        let stream = Arc::new(
            MemoryStream::new(key.clone(), partitions)
                .with_cursor_field("updated_at")
                .with_boundaries(SliceBoundaries::new("lower", "upper")),
        ) as Arc<dyn Stream>;

        let mut tracker =
            CursorTracker::new(Arc::new(IdentityConverter), StreamStateStore::new());
        tracker.register(stream.as_ref());

        let config = SyncConfig {
            workers: 2,
            ..Default::default()
        };
        let pool = WorkerPool::new(config.workers).unwrap();
        let buffer = Arc::new(MessageBuffer::new());
        let (events_tx, events_rx) = completion_queue();
        let mut coordinator = Coordinator::new(
            config,
            vec![stream],
            tracker,
            pool,
            buffer,
            events_tx,
            events_rx,
        );
        let mut sink = CollectSink::new();

        coordinator.start_pending_generation(&mut sink).unwrap();

        // The generation task runs on the pool; pull its events off the
        // queue, submitting a read task per discovery. Read tasks post
        // their own completion events, which are stashed for later.
        let mut discovered = 0;
        let mut generation_done = None;
        let mut completes: Vec<Arc<dyn Partition>> = Vec::new();
        while discovered < 3 || generation_done.is_none() {
            let event = coordinator
                .events_rx
                .recv_timeout(Duration::from_secs(5))
                .unwrap();
            match event {
                QueueEvent::PartitionDiscovered(p) => {
                    discovered += 1;
                    coordinator
                        .handle_event(QueueEvent::PartitionDiscovered(p), &mut sink)
                        .unwrap();
                }
                QueueEvent::GenerationComplete(k) => generation_done = Some(k),
                QueueEvent::PartitionComplete(p) => completes.push(p),
            }
        }

        coordinator
            .handle_event(
                QueueEvent::GenerationComplete(generation_done.unwrap()),
                &mut sink,
            )
            .unwrap();
        assert_eq!(complete_count(&sink, &key), 0);

        while completes.len() < 3 {
            match coordinator
                .events_rx
                .recv_timeout(Duration::from_secs(5))
                .unwrap()
            {
                QueueEvent::PartitionComplete(p) => completes.push(p),
                other => panic!("unexpected event {other:?}"),
            }
        }
        completes.sort_by_key(|p| {
            p.slice()
                .and_then(|s| s.get("lower"))
                .and_then(Value::as_i64)
        });

        // Close order: second, first, third
        for p in [Arc::clone(&completes[1]), Arc::clone(&completes[0])] {
            coordinator
                .handle_event(QueueEvent::PartitionComplete(p), &mut sink)
                .unwrap();
            assert_eq!(complete_count(&sink, &key), 0);
        }
        coordinator
            .handle_event(
                QueueEvent::PartitionComplete(Arc::clone(&completes[2])),
                &mut sink,
            )
            .unwrap();

        assert_eq!(complete_count(&sink, &key), 1);
        assert!(matches!(
            sink.messages.last(),
            Some(Message::StreamStatus(s)) if s.status == StreamStatus::Complete
        ));
        assert_eq!(coordinator.tracker.snapshot().get(&key), Some(&json!(30)));
    }
}
