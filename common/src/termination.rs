//! Producer/consumer termination protocol.
//!
//! The producer pushes its whole workload and then raises a shared
//! [`DoneFlag`] with a release store. The consumer keeps popping; when a pop
//! comes back empty it reads the flag (acquire) and, if set, checks the queue
//! for emptiness once more before stopping. The flag's release/acquire pair
//! makes every push that preceded it visible by the time the flag is seen,
//! so the second check cannot miss the final record.
//!
//! Waiting between failed pops is an explicit [`IdleStrategy`]. Nothing here
//! blocks on a lock or condition variable, and nothing here times out: a
//! caller that needs a deadline checks it between [`ConsumerLoop::step`]
//! calls.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::queue::{QueueConsumer, QueueProducer};

/// Shared "producer finished" flag.
///
/// Cloning yields another handle on the same flag.
#[derive(Debug, Clone, Default)]
pub struct DoneFlag {
    flag: Arc<AtomicBool>,
}

impl DoneFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the producer as finished. Call strictly after the last push.
    #[inline]
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once [`signal`](Self::signal) has been observed.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// What the consumer does after a pop finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleStrategy {
    /// Spin-loop hint only. Lowest wake-up latency, burns a full core.
    Spin,
    /// Yield the time slice to the scheduler.
    #[default]
    Yield,
    /// Spin, then yield, then sleep, as the idle streak grows.
    Backoff {
        spin_iters: u32,
        yield_iters: u32,
        sleep: Duration,
    },
}

impl IdleStrategy {
    /// Progressive backoff: 100 spins, 1000 yields, then 100µs sleeps.
    pub const fn backoff() -> Self {
        IdleStrategy::Backoff {
            spin_iters: 100,
            yield_iters: 1000,
            sleep: Duration::from_micros(100),
        }
    }

    /// Waits once. `idle_count` is the number of consecutive empty polls
    /// before this one.
    #[inline]
    pub fn idle(&self, idle_count: u32) {
        match *self {
            IdleStrategy::Spin => std::hint::spin_loop(),
            IdleStrategy::Yield => thread::yield_now(),
            IdleStrategy::Backoff {
                spin_iters,
                yield_iters,
                sleep,
            } => {
                if idle_count < spin_iters {
                    std::hint::spin_loop();
                } else if idle_count < spin_iters.saturating_add(yield_iters) {
                    thread::yield_now();
                } else {
                    thread::sleep(sleep);
                }
            }
        }
    }
}

/// Consumer-side protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Producer not yet observed as finished.
    Running,
    /// Producer observed as finished; remaining records are being drained.
    Draining,
    /// Queue drained after the producer finished. Terminal.
    Done,
}

/// Outcome of a single [`ConsumerLoop::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A record was popped and handed to the callback.
    Processed,
    /// Nothing was available; the idle strategy ran once.
    Idle,
    /// Terminal state reached. Further steps do nothing.
    Done,
}

/// Drives one consumer through the termination protocol.
///
/// # Example
/// ```
/// use common::lf_queue;
/// use common::termination::{produce, ConsumerLoop, DoneFlag, IdleStrategy};
///
/// let (tx, rx) = lf_queue::channel::<u32>();
/// let done = DoneFlag::new();
/// produce(&tx, 0..10, &done);
///
/// let mut sum = 0;
/// let processed = ConsumerLoop::new(&rx, &done, IdleStrategy::Yield).run(|v| sum += v);
/// assert_eq!(processed, 10);
/// assert_eq!(sum, 45);
/// ```
pub struct ConsumerLoop<'a, T, C> {
    consumer: &'a C,
    done: &'a DoneFlag,
    idle: IdleStrategy,
    state: ConsumerState,
    idle_count: u32,
    processed: u64,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T, C: QueueConsumer<T>> ConsumerLoop<'a, T, C> {
    pub fn new(consumer: &'a C, done: &'a DoneFlag, idle: IdleStrategy) -> Self {
        Self {
            consumer,
            done,
            idle,
            state: ConsumerState::Running,
            idle_count: 0,
            processed: 0,
            _item: PhantomData,
        }
    }

    /// Makes one pop attempt and advances the state machine.
    #[inline]
    pub fn step<F: FnMut(T)>(&mut self, mut on_item: F) -> Step {
        if self.state == ConsumerState::Done {
            return Step::Done;
        }

        if let Some(item) = self.consumer.pop() {
            on_item(item);
            self.processed += 1;
            self.idle_count = 0;
            return Step::Processed;
        }

        if self.done.is_set() {
            self.state = ConsumerState::Draining;
            // The flag read above happens-after every push, so this check
            // sees the final record if one is still queued.
            if self.consumer.is_empty() {
                self.state = ConsumerState::Done;
                return Step::Done;
            }
        }

        self.idle.idle(self.idle_count);
        self.idle_count = self.idle_count.saturating_add(1);
        Step::Idle
    }

    /// Steps until the terminal state and returns the number of records
    /// processed over the lifetime of this loop.
    pub fn run<F: FnMut(T)>(&mut self, mut on_item: F) -> u64 {
        while self.step(&mut on_item) != Step::Done {}
        self.processed
    }

    #[inline]
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

/// Pushes every item in order, then signals `done`. Returns the number of
/// items pushed.
pub fn produce<T, P, I>(producer: &P, items: I, done: &DoneFlag) -> u64
where
    P: QueueProducer<T>,
    I: IntoIterator<Item = T>,
{
    let mut pushed = 0u64;
    for item in items {
        producer.push(item);
        pushed += 1;
    }
    done.signal();
    pushed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lf_queue, mutex_queue};
    use std::cell::Cell;

    /// Consumer whose single record stays invisible to the first pop but is
    /// already reported by `is_empty`, like a push whose link store has not
    /// propagated yet.
    struct LateVisibility {
        pending: Cell<Option<u32>>,
        hidden: Cell<bool>,
        pops: Cell<u32>,
    }

    impl LateVisibility {
        fn new(value: u32) -> Self {
            Self {
                pending: Cell::new(Some(value)),
                hidden: Cell::new(true),
                pops: Cell::new(0),
            }
        }
    }

    impl QueueConsumer<u32> for LateVisibility {
        fn pop(&self) -> Option<u32> {
            self.pops.set(self.pops.get() + 1);
            if self.hidden.replace(false) {
                None
            } else {
                self.pending.take()
            }
        }

        fn is_empty(&self) -> bool {
            self.pending.get().is_none()
        }
    }

    fn run_threads<P, C>(tx: P, rx: C, n: u64, idle: IdleStrategy) -> Vec<u64>
    where
        P: QueueProducer<u64> + 'static,
        C: QueueConsumer<u64> + 'static,
    {
        let done = DoneFlag::new();
        let producer_done = done.clone();

        let producer = thread::spawn(move || produce(&tx, 0..n, &producer_done));
        let consumer = thread::spawn(move || {
            let mut seen = Vec::with_capacity(n as usize);
            let processed = ConsumerLoop::new(&rx, &done, idle).run(|v| seen.push(v));
            assert_eq!(processed, seen.len() as u64);
            seen
        });

        assert_eq!(producer.join().unwrap(), n);
        consumer.join().unwrap()
    }

    #[test]
    fn test_done_flag_starts_clear() {
        let done = DoneFlag::new();
        assert!(!done.is_set());

        let other = done.clone();
        other.signal();
        assert!(done.is_set());
    }

    #[test]
    fn test_idle_strategy_default_is_yield() {
        assert_eq!(IdleStrategy::default(), IdleStrategy::Yield);
    }

    #[test]
    fn test_backoff_idle_returns() {
        let idle = IdleStrategy::Backoff {
            spin_iters: 1,
            yield_iters: 1,
            sleep: Duration::from_micros(1),
        };
        for count in 0..4 {
            idle.idle(count);
        }
        IdleStrategy::Spin.idle(0);
        IdleStrategy::Yield.idle(0);
    }

    #[test]
    fn test_running_while_producer_active() {
        let (tx, rx) = lf_queue::channel();
        let done = DoneFlag::new();
        let mut lp = ConsumerLoop::new(&rx, &done, IdleStrategy::Spin);

        assert_eq!(lp.step(|_: u32| {}), Step::Idle);
        assert_eq!(lp.state(), ConsumerState::Running);

        tx.push(5);
        let mut got = None;
        assert_eq!(lp.step(|v| got = Some(v)), Step::Processed);
        assert_eq!(got, Some(5));
        assert_eq!(lp.state(), ConsumerState::Running);

        assert_eq!(lp.step(|_| {}), Step::Idle);
        assert_eq!(lp.state(), ConsumerState::Running);
    }

    #[test]
    fn test_drains_everything_before_done() {
        let (tx, rx) = lf_queue::channel();
        let done = DoneFlag::new();
        assert_eq!(produce(&tx, [1u32, 2, 3], &done), 3);

        let mut lp = ConsumerLoop::new(&rx, &done, IdleStrategy::Spin);
        let mut seen = Vec::new();
        for _ in 0..3 {
            assert_eq!(lp.step(|v| seen.push(v)), Step::Processed);
        }
        assert_eq!(lp.step(|v| seen.push(v)), Step::Done);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(lp.state(), ConsumerState::Done);
        assert_eq!(lp.processed(), 3);
    }

    #[test]
    fn test_recheck_after_flag_keeps_draining() {
        let rx = LateVisibility::new(9);
        let done = DoneFlag::new();
        done.signal();

        let mut lp = ConsumerLoop::new(&rx, &done, IdleStrategy::Spin);
        let mut seen = Vec::new();

        assert_eq!(lp.step(|v| seen.push(v)), Step::Idle);
        assert_eq!(lp.state(), ConsumerState::Draining);

        assert_eq!(lp.step(|v| seen.push(v)), Step::Processed);
        assert_eq!(lp.state(), ConsumerState::Draining);

        assert_eq!(lp.step(|v| seen.push(v)), Step::Done);
        assert_eq!(seen, vec![9]);
    }

    #[test]
    fn test_done_is_terminal() {
        let (tx, rx) = lf_queue::channel::<u32>();
        let done = DoneFlag::new();
        done.signal();

        let mut lp = ConsumerLoop::new(&rx, &done, IdleStrategy::Spin);
        assert_eq!(lp.run(|_| {}), 0);

        // A late push is never consumed once Done was reached.
        tx.push(1);
        assert_eq!(lp.step(|_| panic!("stepped after done")), Step::Done);
        assert_eq!(rx.pop(), Some(1));
    }

    #[test]
    fn test_done_never_polls_again() {
        let rx = LateVisibility::new(1);
        rx.hidden.set(false);
        let done = DoneFlag::new();
        done.signal();

        let mut lp = ConsumerLoop::new(&rx, &done, IdleStrategy::Spin);
        assert_eq!(lp.run(|_| {}), 1);
        let pops = rx.pops.get();

        for _ in 0..10 {
            assert_eq!(lp.step(|_| {}), Step::Done);
        }
        assert_eq!(rx.pops.get(), pops);
    }

    #[test]
    fn test_threads_zero_items() {
        let (tx, rx) = lf_queue::channel();
        assert!(run_threads(tx, rx, 0, IdleStrategy::Yield).is_empty());
    }

    #[test]
    fn test_threads_single_item() {
        let (tx, rx) = lf_queue::channel();
        assert_eq!(run_threads(tx, rx, 1, IdleStrategy::Yield), vec![0]);
    }

    #[test]
    fn test_threads_thousand_items_repeated() {
        let expected: Vec<u64> = (0..1000).collect();
        for round in 0..50 {
            let idle = match round % 3 {
                0 => IdleStrategy::Spin,
                1 => IdleStrategy::Yield,
                _ => IdleStrategy::backoff(),
            };
            let (tx, rx) = lf_queue::channel();
            assert_eq!(run_threads(tx, rx, 1000, idle), expected, "round {}", round);
        }
    }

    #[test]
    fn test_threads_million_items() {
        let (tx, rx) = lf_queue::channel();
        let seen = run_threads(tx, rx, 1_000_000, IdleStrategy::Yield);
        assert_eq!(seen.len(), 1_000_000);
        assert!(seen.iter().enumerate().all(|(i, &v)| i as u64 == v));
    }

    #[test]
    fn test_threads_mutex_queue() {
        let (tx, rx) = mutex_queue::channel();
        let seen = run_threads(tx, rx, 10_000, IdleStrategy::Yield);
        assert_eq!(seen, (0..10_000).collect::<Vec<u64>>());
    }
}
