//! The concurrent sync engine.
//!
//! Worker threads run generation and read tasks in parallel; one
//! coordinator thread consumes the completion queue and owns all
//! bookkeeping.
//!
//! # Architecture
//!
//! ```text
//! +-----------+  partitions   +-------------+  records   +---------+
//! | Generator | ------------> | Read tasks  | ---------> | Buffer  |
//! | (1 task/  |   via queue   | (N workers) |            +---------+
//! |  stream)  |               +-------------+                 |
//! +-----------+                      |                        v drain
//!       |        completion events   v                 +-------------+
//!       +---------------------> [completion queue] --> | Coordinator | --> sink
//!                                                      +-------------+
//! ```

pub mod buffer;
pub mod coordinator;
pub mod generator;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod reader;

pub use buffer::MessageBuffer;
pub use coordinator::Coordinator;
pub use generator::GenerationTask;
pub use orchestrator::{SyncEngine, SyncSummary};
pub use pool::WorkerPool;
pub use queue::{completion_queue, EventReceiver, EventSender, QueueEvent};
pub use reader::ReadTask;
