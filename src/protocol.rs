//! Typed output messages for the sync engine.
//!
//! The engine's entire externally visible output is an ordered sequence of
//! these messages: records, logs, per-stream state checkpoints, and stream
//! lifecycle status. Consumers see them incrementally through an
//! [`OutputSink`], in the causal order they were produced.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Stream identity
// =============================================================================

/// Identity of a logical data stream: name plus optional namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub name: String,
    pub namespace: Option<String>,
}

impl StreamKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A single record read from a partition. `data` is a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub stream: StreamKey,
    pub data: Value,
}

impl Record {
    pub fn new(stream: StreamKey, data: Value) -> Self {
        Self { stream, data }
    }

    /// Resolve a (possibly nested) field path against the record data.
    /// An empty path resolves to nothing.
    pub fn field(&self, path: &[String]) -> Option<&Value> {
        let mut current = &self.data;
        if path.is_empty() {
            return None;
        }
        for segment in path {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

// =============================================================================
// Message types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Stream lifecycle status, emitted by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    Started,
    Complete,
}

/// Record message: one record plus its emission timestamp (epoch millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub stream: StreamKey,
    pub data: Value,
    pub emitted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// State message: the durable checkpoint for one stream, with the cursor
/// value already run through the configured value converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub stream: StreamKey,
    pub state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub stream: StreamKey,
    pub status: StreamStatus,
}

/// The closed union of everything the engine emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Record(RecordMessage),
    Log(LogMessage),
    State(StateMessage),
    StreamStatus(StatusMessage),
}

impl Message {
    pub fn record(record: Record, emitted_at: i64) -> Self {
        Message::Record(RecordMessage {
            stream: record.stream,
            data: record.data,
            emitted_at,
        })
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Message::Log(LogMessage {
            level,
            message: message.into(),
        })
    }

    pub fn state(stream: StreamKey, state: Value) -> Self {
        Message::State(StateMessage { stream, state })
    }

    pub fn status(stream: StreamKey, status: StreamStatus) -> Self {
        Message::StreamStatus(StatusMessage { stream, status })
    }
}

// =============================================================================
// Output sink
// =============================================================================

/// Destination for the engine's ordered message sequence. Called only from
/// the coordinator thread, in causal production order, incrementally as the
/// sync progresses.
pub trait OutputSink {
    fn accept(&mut self, message: Message) -> Result<()>;
}

/// Sink that collects all messages in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub messages: Vec<Message>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All record messages for one stream, in emission order.
    pub fn records_for(&self, stream: &StreamKey) -> Vec<&RecordMessage> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record(r) if &r.stream == stream => Some(r),
                _ => None,
            })
            .collect()
    }

    /// All state messages for one stream, in emission order.
    pub fn states_for(&self, stream: &StreamKey) -> Vec<&StateMessage> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State(s) if &s.stream == stream => Some(s),
                _ => None,
            })
            .collect()
    }

    /// All status messages for one stream, in emission order.
    pub fn statuses_for(&self, stream: &StreamKey) -> Vec<StreamStatus> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::StreamStatus(s) if &s.stream == stream => Some(s.status),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for CollectSink {
    fn accept(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        Ok(())
    }
}
