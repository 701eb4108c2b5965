//! Top-level sync driver.
//!
//! Wires together the worker pool, completion queue, message buffer,
//! cursor tracker, and coordinator for one sync run, then hands the
//! coordinator the set of streams to read.

use crate::config::SyncConfig;
use crate::cursor::{CursorTracker, CursorValueConverter, IdentityConverter, StreamStateStore};
use crate::engine::buffer::MessageBuffer;
use crate::engine::coordinator::Coordinator;
use crate::engine::pool::WorkerPool;
use crate::engine::queue::completion_queue;
use crate::error::{Result, SyncError};
use crate::protocol::{CollectSink, Message, OutputSink, StreamKey};
use crate::stream::Stream;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome of a completed sync.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// Records emitted per stream.
    pub records: HashMap<StreamKey, u64>,
    /// Final checkpoint per stream (in-flight representation).
    pub final_state: HashMap<StreamKey, Value>,
    pub streams_completed: usize,
    pub duration: Duration,
}

pub struct SyncEngine {
    config: SyncConfig,
    converter: Arc<dyn CursorValueConverter>,
    initial_state: HashMap<StreamKey, Value>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            converter: Arc::new(IdentityConverter),
            initial_state: HashMap::new(),
        }
    }

    /// Use a custom converter for durable state values.
    pub fn with_converter(mut self, converter: Arc<dyn CursorValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Resume from checkpoints produced by a previous sync.
    pub fn with_initial_state(mut self, state: HashMap<StreamKey, Value>) -> Self {
        self.initial_state = state;
        self
    }

    /// Read every stream once, pushing output messages to `sink`
    /// incrementally as they are produced.
    pub fn sync(
        &self,
        streams: Vec<Arc<dyn Stream>>,
        sink: &mut dyn OutputSink,
    ) -> Result<SyncSummary> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for stream in &streams {
            if !seen.insert(stream.key().clone()) {
                return Err(SyncError::Config(format!(
                    "stream '{}' supplied more than once",
                    stream.key()
                )));
            }
        }

        let mut state = StreamStateStore::new();
        state.seed(self.initial_state.clone());
        let mut tracker = CursorTracker::new(Arc::clone(&self.converter), state);
        for stream in &streams {
            tracker.register(stream.as_ref());
        }

        let pool = WorkerPool::new(self.config.workers)?;
        let buffer = Arc::new(MessageBuffer::new());
        let (events_tx, events_rx) = completion_queue();

        info!(
            streams = streams.len(),
            workers = self.config.workers,
            generators = self.config.max_concurrent_generators,
            "starting sync"
        );

        let start = Instant::now();
        let coordinator = Coordinator::new(
            self.config.clone(),
            streams,
            tracker,
            pool,
            buffer,
            events_tx,
            events_rx,
        );
        let (records, final_state) = coordinator.run(sink)?;
        let duration = start.elapsed();

        // Every stream has reached done state by the time run() returns Ok
        let summary = SyncSummary {
            streams_completed: seen.len(),
            records,
            final_state,
            duration,
        };
        info!(
            streams = summary.streams_completed,
            duration_ms = duration.as_millis() as u64,
            "sync finished"
        );
        Ok(summary)
    }

    /// Convenience: run a sync and collect the full ordered message
    /// sequence in memory.
    pub fn sync_to_vec(
        &self,
        streams: Vec<Arc<dyn Stream>>,
    ) -> Result<(SyncSummary, Vec<Message>)> {
        let mut sink = CollectSink::new();
        let summary = self.sync(streams, &mut sink)?;
        Ok((summary, sink.messages))
    }
}
