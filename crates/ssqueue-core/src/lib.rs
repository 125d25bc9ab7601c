// Queue engine for ssqueue: per-topic FIFOs with long-poll consumers.
// The registry lazily creates one queue per topic name and owns the
// process readiness gate; queues can be snapshotted and restored as a whole.
mod error;
mod item;
mod queue;
mod registry;
mod snapshot;

pub use error::QueueError;
pub use item::{Item, mint_id};
pub use queue::{ConsumerGuard, TopicQueue};
pub use registry::Registry;

pub type Result<T> = std::result::Result<T, QueueError>;
