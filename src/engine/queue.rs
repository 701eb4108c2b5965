//! Completion-queue event types.
//!
//! Worker threads post events; exactly one coordinator thread consumes
//! them in arrival order. The event union is closed so the coordinator's
//! dispatch is exhaustive.

use crate::protocol::StreamKey;
use crate::stream::Partition;
use std::fmt;
use std::sync::Arc;

/// An event on the completion queue.
pub enum QueueEvent {
    /// A generation task produced a new partition.
    PartitionDiscovered(Arc<dyn Partition>),

    /// A read task exhausted a partition's records.
    PartitionComplete(Arc<dyn Partition>),

    /// A generation task finished enumerating a stream's partitions.
    GenerationComplete(StreamKey),
}

impl fmt::Debug for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEvent::PartitionDiscovered(p) => {
                write!(f, "PartitionDiscovered({})", p.key())
            }
            QueueEvent::PartitionComplete(p) => write!(f, "PartitionComplete({})", p.key()),
            QueueEvent::GenerationComplete(s) => write!(f, "GenerationComplete({s})"),
        }
    }
}

/// Producer half of the completion queue, cloned into every task.
pub type EventSender = crossbeam_channel::Sender<QueueEvent>;

/// Consumer half, held only by the coordinator.
pub type EventReceiver = crossbeam_channel::Receiver<QueueEvent>;

/// Create the completion queue. Unbounded: producers must never block on
/// the coordinator, or a full queue could deadlock shutdown.
pub fn completion_queue() -> (EventSender, EventReceiver) {
    crossbeam_channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryPartition;

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, rx) = completion_queue();
        let partition: Arc<dyn Partition> = Arc::new(MemoryPartition::new(
            StreamKey::new("users"),
            None,
            vec![],
        ));

        tx.send(QueueEvent::PartitionDiscovered(Arc::clone(&partition)))
            .unwrap();
        tx.send(QueueEvent::PartitionComplete(partition)).unwrap();
        tx.send(QueueEvent::GenerationComplete(StreamKey::new("users")))
            .unwrap();

        assert!(matches!(
            rx.recv().unwrap(),
            QueueEvent::PartitionDiscovered(_)
        ));
        assert!(matches!(
            rx.recv().unwrap(),
            QueueEvent::PartitionComplete(_)
        ));
        assert!(matches!(
            rx.recv().unwrap(),
            QueueEvent::GenerationComplete(_)
        ));
    }
}
