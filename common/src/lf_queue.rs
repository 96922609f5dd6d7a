// Lock-free unbounded SPSC queue
//
// A single-producer single-consumer linked queue for moving market ticks
// between exactly two threads. Push never fails and never waits on the
// consumer; pop is a single non-blocking attempt. Node pointers are handed
// across threads with release stores paired with acquire loads on the same
// location, so a consumer that sees a node also sees its payload.

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::queue::{QueueConsumer, QueueProducer};

/// A heap-allocated link in the queue.
///
/// The value is uninitialized for the sentinel and for every node whose
/// value has already been moved out by the consumer.
struct Node<T> {
    value: MaybeUninit<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Self {
        Self::alloc(MaybeUninit::uninit())
    }

    fn with_value(value: T) -> *mut Self {
        Self::alloc(MaybeUninit::new(value))
    }

    fn alloc(value: MaybeUninit<T>) -> *mut Self {
        #[cfg(test)]
        tests::LIVE_NODES.with(|n| n.set(n.get() + 1));

        Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

#[cfg(test)]
impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        tests::LIVE_NODES.with(|n| n.set(n.get() - 1));
    }
}

/// Shared state of the queue.
///
/// # Ownership
/// - `tail` is written only by the producer
/// - `head` is written only by the consumer
/// - every node reachable from `head` is owned by the queue and freed by
///   the consumer right after its successor's value is taken
struct SpscQueue<T> {
    /// Most recently retired node (the sentinel). Consumer side.
    head: CachePadded<AtomicPtr<Node<T>>>,
    /// Most recently appended node. Producer side.
    tail: CachePadded<AtomicPtr<Node<T>>>,
}

// SAFETY: values of T are moved from the producer thread to the consumer
// thread and never shared, so T: Send is sufficient. The endpoint handles
// guarantee at most one pusher and one popper.
unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
    fn new() -> Self {
        let sentinel = Node::sentinel();
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    /// # Safety
    /// Must only be called by the single producer.
    #[inline]
    unsafe fn push(&self, value: T) {
        // The new node is private until the release store below publishes it.
        let node = Node::with_value(value);

        // Only the producer writes tail.
        let tail = self.tail.load(Ordering::Relaxed);

        // SAFETY: the tail node is never freed by the consumer. It only frees
        // a node after reading a non-null successor, and tail has none.
        (*tail).next.store(node, Ordering::Release);
        self.tail.store(node, Ordering::Release);
    }

    /// # Safety
    /// Must only be called by the single consumer (or with exclusive access).
    #[inline]
    unsafe fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Acquire);

        // SAFETY: head is always a live node owned by the consumer side.
        let next = (*head).next.load(Ordering::Acquire);
        if next.is_null() {
            return None;
        }

        // SAFETY: the acquire load of `next` synchronizes with the producer's
        // release store, so the value is fully initialized. It is read exactly
        // once: from here on `next` is the sentinel and its value is dead.
        let value = (*next).value.assume_init_read();

        self.head.store(next, Ordering::Release);

        // SAFETY: the producer has already finished its last access to the old
        // head (the link store we just observed), and its value was taken
        // when it was a successor.
        drop(Box::from_raw(head));

        Some(value)
    }

    /// # Safety
    /// Must only be called by the single consumer.
    #[inline]
    unsafe fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        (*head).next.load(Ordering::Acquire).is_null()
    }
}

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        // SAFETY: &mut self means both endpoints are gone.
        unsafe { while self.pop().is_some() {} }

        let sentinel = *self.head.get_mut();
        // SAFETY: after draining, head is the only remaining node.
        unsafe { drop(Box::from_raw(sentinel)) };
    }
}

/// Creates an unbounded SPSC queue and returns its two endpoints.
///
/// The sentinel node is allocated here, before either endpoint is handed to
/// another thread.
///
/// # Example
/// ```
/// use common::lf_queue;
///
/// let (tx, rx) = lf_queue::channel::<u32>();
/// tx.push(42);
/// assert_eq!(rx.pop(), Some(42));
/// assert_eq!(rx.pop(), None);
/// ```
pub fn channel<T>() -> (Producer<T>, Consumer<T>) {
    let queue = Arc::new(SpscQueue::new());
    (
        Producer {
            queue: Arc::clone(&queue),
            _not_sync: PhantomData,
        },
        Consumer {
            queue,
            _not_sync: PhantomData,
        },
    )
}

/// The push side of the queue.
///
/// There is exactly one per queue. It can be moved to another thread but
/// not shared (`!Sync`) or cloned, so two concurrent pushers cannot exist.
pub struct Producer<T> {
    queue: Arc<SpscQueue<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Producer<T> {
    /// Appends a value at the tail.
    ///
    /// Allocates one node and performs two release stores. Never blocks and
    /// never looks at consumer state.
    #[inline]
    pub fn push(&self, value: T) {
        // SAFETY: this handle is the only producer and is not Sync.
        unsafe { self.queue.push(value) }
    }
}

/// The pop side of the queue.
///
/// There is exactly one per queue; `!Sync` and not `Clone`.
pub struct Consumer<T> {
    queue: Arc<SpscQueue<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Consumer<T> {
    /// Takes the oldest value, or returns `None` if nothing is visible yet.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        // SAFETY: this handle is the only consumer and is not Sync.
        unsafe { self.queue.pop() }
    }

    /// Snapshot of emptiness. A concurrent push may make it stale at once.
    #[inline]
    pub fn is_empty(&self) -> bool {
        // SAFETY: as above; only the consumer dereferences head.
        unsafe { self.queue.is_empty() }
    }
}

impl<T: Send> QueueProducer<T> for Producer<T> {
    #[inline]
    fn push(&self, value: T) {
        Producer::push(self, value)
    }
}

impl<T: Send> QueueConsumer<T> for Consumer<T> {
    #[inline]
    fn pop(&self) -> Option<T> {
        Consumer::pop(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        Consumer::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    thread_local! {
        // Nodes allocated minus nodes freed on the current thread.
        pub(super) static LIVE_NODES: Cell<isize> = const { Cell::new(0) };
    }

    fn live_nodes() -> isize {
        LIVE_NODES.with(|n| n.get())
    }

    /// Pushes `n` sequence numbers from one thread and pops them on another,
    /// checking order. Returns how many values the consumer saw.
    fn run_concurrent(n: u64) -> u64 {
        let (tx, rx) = channel::<u64>();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let producer_done = Arc::clone(&done);
        let producer = thread::spawn(move || {
            for i in 0..n {
                tx.push(i);
            }
            producer_done.store(true, Ordering::Release);
        });

        let consumer = thread::spawn(move || {
            let mut expected = 0u64;
            loop {
                match rx.pop() {
                    Some(v) => {
                        assert_eq!(v, expected, "out of order");
                        expected += 1;
                    }
                    None => {
                        if done.load(Ordering::Acquire) && rx.is_empty() {
                            break;
                        }
                        thread::yield_now();
                    }
                }
            }
            expected
        });

        producer.join().unwrap();
        consumer.join().unwrap()
    }

    #[test]
    fn test_new_queue_is_empty() {
        let (_tx, rx) = channel::<u32>();
        assert!(rx.is_empty());
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_single_push_pop() {
        let (tx, rx) = channel();

        tx.push(42u32);
        assert!(!rx.is_empty());

        assert_eq!(rx.pop(), Some(42));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let (tx, rx) = channel::<u32>();
        assert_eq!(rx.pop(), None);
        assert_eq!(rx.pop(), None);

        tx.push(1);
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = channel();

        for i in 0..1000u32 {
            tx.push(i);
        }
        for i in 0..1000u32 {
            assert_eq!(rx.pop(), Some(i));
        }
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_interleaved_push_pop() {
        let (tx, rx) = channel();

        tx.push(1);
        tx.push(2);
        assert_eq!(rx.pop(), Some(1));
        tx.push(3);
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), Some(3));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_with_string_type() {
        let (tx, rx) = channel();

        tx.push("hello".to_string());
        tx.push("world".to_string());

        assert_eq!(rx.pop().as_deref(), Some("hello"));
        assert_eq!(rx.pop().as_deref(), Some("world"));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_with_struct_type() {
        #[derive(Debug, PartialEq, Clone)]
        struct TestStruct {
            id: u64,
            value: f64,
        }

        let (tx, rx) = channel();

        let item1 = TestStruct { id: 1, value: 1.5 };
        let item2 = TestStruct { id: 2, value: 2.5 };

        tx.push(item1.clone());
        tx.push(item2.clone());

        assert_eq!(rx.pop(), Some(item1));
        assert_eq!(rx.pop(), Some(item2));
    }

    #[test]
    fn test_drop_cleans_up_pending_values() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter;

        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        {
            let (tx, rx) = channel();
            tx.push(DropCounter);
            tx.push(DropCounter);
            tx.push(DropCounter);

            // Popped value is dropped here, exactly once.
            drop(rx.pop());
            assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);
        }

        // Remaining two dropped by teardown; the sentinels never drop a value.
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_node_leak() {
        let before = live_nodes();
        {
            let (tx, rx) = channel();
            assert_eq!(live_nodes() - before, 1, "sentinel only");

            for i in 0..10u32 {
                tx.push(i);
            }
            assert_eq!(live_nodes() - before, 11);

            for _ in 0..4 {
                rx.pop();
            }
            assert_eq!(live_nodes() - before, 7);
        }
        assert_eq!(live_nodes(), before);
    }

    #[test]
    fn test_teardown_after_drain_frees_sentinel() {
        let before = live_nodes();
        {
            let (tx, rx) = channel();
            tx.push(1u8);
            assert_eq!(rx.pop(), Some(1));
            assert_eq!(rx.pop(), None);
            assert_eq!(live_nodes() - before, 1);
        }
        assert_eq!(live_nodes(), before);
    }

    #[test]
    fn test_endpoints_drop_in_either_order() {
        let (tx, rx) = channel();
        tx.push(String::from("a"));
        drop(rx);
        tx.push(String::from("b"));
        drop(tx);

        let (tx, rx) = channel();
        tx.push(String::from("a"));
        drop(tx);
        assert_eq!(rx.pop().as_deref(), Some("a"));
    }

    #[test]
    fn test_concurrent_zero_items() {
        assert_eq!(run_concurrent(0), 0);
    }

    #[test]
    fn test_concurrent_single_item() {
        assert_eq!(run_concurrent(1), 1);
    }

    #[test]
    fn test_concurrent_thousand_items_repeated() {
        for _ in 0..50 {
            assert_eq!(run_concurrent(1000), 1000);
        }
    }

    #[test]
    fn test_concurrent_million_items() {
        assert_eq!(run_concurrent(1_000_000), 1_000_000);
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn test_endpoints_are_send() {
        assert_send::<Producer<String>>();
        assert_send::<Consumer<String>>();
    }

    proptest! {
        #[test]
        fn prop_push_all_then_pop_all_is_fifo(values in prop::collection::vec(any::<u32>(), 0..512)) {
            let (tx, rx) = channel();
            for &v in &values {
                tx.push(v);
            }
            let mut popped = Vec::with_capacity(values.len());
            while let Some(v) = rx.pop() {
                popped.push(v);
            }
            prop_assert_eq!(popped, values);
        }

        #[test]
        fn prop_interleaved_ops_match_vecdeque(ops in prop::collection::vec(any::<Option<u16>>(), 0..512)) {
            // Some(v) pushes v, None pops.
            let (tx, rx) = channel();
            let mut model = VecDeque::new();
            for op in ops {
                match op {
                    Some(v) => {
                        tx.push(v);
                        model.push_back(v);
                    }
                    None => prop_assert_eq!(rx.pop(), model.pop_front()),
                }
                prop_assert_eq!(rx.is_empty(), model.is_empty());
            }
        }
    }
}
