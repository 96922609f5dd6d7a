// Mutex-protected queue
//
// Baseline for comparing against the lock-free queue. Same endpoint shape
// and interface, but every operation takes a lock on a shared VecDeque.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::queue::{QueueConsumer, QueueProducer};

type Shared<T> = Arc<Mutex<VecDeque<T>>>;

#[inline]
fn lock<T>(shared: &Mutex<VecDeque<T>>) -> MutexGuard<'_, VecDeque<T>> {
    // VecDeque operations cannot leave the deque half-updated, so a poisoned
    // lock still guards a consistent queue.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Creates a mutex-backed queue and returns its two endpoints.
///
/// # Example
/// ```
/// use common::mutex_queue;
///
/// let (tx, rx) = mutex_queue::channel::<u32>();
/// tx.push(7);
/// assert_eq!(rx.pop(), Some(7));
/// ```
pub fn channel<T>() -> (MutexProducer<T>, MutexConsumer<T>) {
    let shared: Shared<T> = Arc::new(Mutex::new(VecDeque::new()));
    (
        MutexProducer {
            shared: Arc::clone(&shared),
        },
        MutexConsumer { shared },
    )
}

/// Push side of the mutex queue.
pub struct MutexProducer<T> {
    shared: Shared<T>,
}

impl<T> MutexProducer<T> {
    #[inline]
    pub fn push(&self, value: T) {
        lock(&self.shared).push_back(value);
    }
}

/// Pop side of the mutex queue.
pub struct MutexConsumer<T> {
    shared: Shared<T>,
}

impl<T> MutexConsumer<T> {
    #[inline]
    pub fn pop(&self) -> Option<T> {
        lock(&self.shared).pop_front()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        lock(&self.shared).is_empty()
    }
}

impl<T: Send> QueueProducer<T> for MutexProducer<T> {
    #[inline]
    fn push(&self, value: T) {
        MutexProducer::push(self, value)
    }
}

impl<T: Send> QueueConsumer<T> for MutexConsumer<T> {
    #[inline]
    fn pop(&self) -> Option<T> {
        MutexConsumer::pop(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        MutexConsumer::is_empty(self)
    }
}
