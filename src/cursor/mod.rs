//! Checkpoint (cursor) tracking.
//!
//! The tracker is the only component allowed to advance durable per-stream
//! checkpoint state, and it does so exclusively from the coordinator
//! thread. Workers contribute through the lock-light [`ObservedValues`]
//! handle.

pub mod convert;
pub mod state;
pub mod tracker;

pub use convert::{CursorValueConverter, EpochSecondsConverter, IdentityConverter};
pub use state::StreamStateStore;
pub use tracker::{CursorTracker, ObservedValues};
