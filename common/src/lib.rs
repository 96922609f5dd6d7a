//! Shared building blocks for the tick feed: the lock-free SPSC queue, the
//! mutex baseline, the producer/consumer termination protocol, timing,
//! logging and the tick record itself.

pub mod lf_queue;
pub mod logging;
pub mod mutex_queue;
pub mod queue;
pub mod termination;
pub mod time;
pub mod types;

pub use queue::{QueueConsumer, QueueProducer};
pub use types::*;
