//! Queue endpoint traits shared by the lock-free and mutex queues.
//!
//! The termination protocol and the benchmark harness are generic over these
//! traits, so the same consumer loop drives either queue with static
//! dispatch.

/// The push side of a single-producer queue.
pub trait QueueProducer<T>: Send {
    /// Appends a value. Never fails and never waits on the consumer.
    fn push(&self, value: T);
}

/// The pop side of a single-consumer queue.
pub trait QueueConsumer<T>: Send {
    /// Takes the oldest value, or `None` when nothing is available.
    fn pop(&self) -> Option<T>;

    /// Advisory emptiness snapshot.
    fn is_empty(&self) -> bool;
}
