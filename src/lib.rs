//! streamsync - concurrent partition-based sync engine.
//!
//! Reads a set of logical data streams by splitting each into
//! independently fetchable partitions, executing partition work on a
//! bounded worker pool, and funneling all completion events through a
//! single ordered queue so per-stream progress and checkpoint state stay
//! consistent despite out-of-order, multi-threaded completion.
//!
//! Connector-specific concerns (pagination, parsing, auth) live behind
//! the [`stream::Stream`] and [`stream::Partition`] traits; everything
//! the engine emits flows through a [`protocol::OutputSink`] as typed
//! messages.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use streamsync::config::SyncConfig;
//! use streamsync::engine::SyncEngine;
//! use streamsync::protocol::StreamKey;
//! use streamsync::stream::{SinglePartitionStream, Stream};
//!
//! let stream = SinglePartitionStream::new(
//!     StreamKey::new("users"),
//!     vec![json!({"id": 1, "updated_at": 5})],
//! )
//! .with_cursor_field("updated_at");
//!
//! let engine = SyncEngine::new(SyncConfig::default());
//! let (summary, messages) = engine
//!     .sync_to_vec(vec![Arc::new(stream) as Arc<dyn Stream>])
//!     .unwrap();
//! assert_eq!(summary.records[&StreamKey::new("users")], 1);
//! assert!(!messages.is_empty());
//! ```

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod stream;

pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncSummary};
pub use error::{FailureClass, Result, SyncError};
pub use protocol::{CollectSink, Message, OutputSink, Record, StreamKey, StreamStatus};
