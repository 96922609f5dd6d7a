//! Producer/consumer benchmark harness.
//!
//! One run spawns exactly two threads: the producer generates ticks and
//! pushes them, then raises the done flag; the consumer drives a
//! [`ConsumerLoop`] and, per tick, records latency, updates analytics and
//! counts throughput. The harness is generic over the queue, so the
//! lock-free and mutex queues go through identical code.

use crate::analytics::AnalyticsEngine;
use crate::metrics::{LatencyTracker, ThroughputMeter};
use crate::report::BenchmarkResults;
use crate::tick_generator::{TickGenerator, TickGeneratorConfig};

use common::termination::{produce, ConsumerLoop, DoneFlag, IdleStrategy, Step};
use common::time::{latency_micros, now_nanos};
use common::{lf_queue, mutex_queue, MarketTick, QueueConsumer, QueueProducer};

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Upper bound on latency samples reserved before a run starts. Larger runs
/// grow the buffer as ticks arrive.
pub const MAX_PRESIZED_SAMPLES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("{name}: consumer deadline exceeded after {processed} of {expected} ticks")]
    Timeout {
        name: String,
        processed: u64,
        expected: u64,
    },
    #[error("{name}: {role} thread panicked")]
    ThreadPanicked { name: String, role: &'static str },
    #[error("failed to spawn benchmark thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Which queue a run goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    LockFree,
    Mutex,
}

impl QueueKind {
    /// Run label, e.g. "Lock-Free SPSC (1000)".
    pub fn label(&self, num_ticks: u64) -> String {
        match self {
            QueueKind::LockFree => format!("Lock-Free SPSC ({})", num_ticks),
            QueueKind::Mutex => format!("Mutex Queue ({})", num_ticks),
        }
    }

    /// Builds a fresh queue of this kind and runs one benchmark through it.
    pub fn run(&self, num_ticks: u64, config: &BenchmarkConfig) -> Result<BenchmarkRun, BenchmarkError> {
        let name = self.label(num_ticks);
        match self {
            QueueKind::LockFree => {
                let (tx, rx) = lf_queue::channel();
                run_benchmark(&name, num_ticks, tx, rx, config)
            }
            QueueKind::Mutex => {
                let (tx, rx) = mutex_queue::channel();
                run_benchmark(&name, num_ticks, tx, rx, config)
            }
        }
    }
}

/// Parameters shared by every run in a sweep.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkConfig {
    pub generator: TickGeneratorConfig,
    /// Rolling average window, in ticks.
    pub rolling_window: usize,
    /// What the consumer does when the queue is empty.
    pub idle: IdleStrategy,
    /// Upper bound on how long the consumer waits for an unfinished
    /// producer. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            generator: TickGeneratorConfig::default(),
            rolling_window: 100,
            idle: IdleStrategy::Yield,
            timeout: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn with_generator(mut self, generator: TickGeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_rolling_window(mut self, rolling_window: usize) -> Self {
        self.rolling_window = rolling_window;
        self
    }

    pub fn with_idle(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Results of one run plus the consumer's final analytics.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub results: BenchmarkResults,
    pub analytics: AnalyticsEngine,
}

/// Everything the consumer thread hands back.
struct ConsumerOutput {
    latency: LatencyTracker,
    throughput: ThroughputMeter,
    analytics: AnalyticsEngine,
    timed_out: bool,
}

/// Consumer thread body: drain ticks until the protocol reports done, or
/// until the deadline passes while the queue is idle.
fn consume<C>(
    consumer: &C,
    done: &DoneFlag,
    config: &BenchmarkConfig,
    expected: u64,
) -> ConsumerOutput
where
    C: QueueConsumer<MarketTick>,
{
    let presized = usize::try_from(expected).map_or(MAX_PRESIZED_SAMPLES, |n| n.min(MAX_PRESIZED_SAMPLES));
    let mut latency = LatencyTracker::with_capacity(presized);
    let mut analytics = AnalyticsEngine::new(config.rolling_window);
    let mut throughput = ThroughputMeter::new();
    let deadline = config.timeout.map(|t| Instant::now() + t);
    let mut timed_out = false;

    throughput.start();
    let mut ticks = ConsumerLoop::new(consumer, done, config.idle);

    loop {
        let step = ticks.step(|tick: MarketTick| {
            latency.record(latency_micros(tick.timestamp, now_nanos()));
            analytics.process_tick(&tick);
            throughput.add_item();
        });

        match step {
            Step::Processed => {}
            Step::Idle => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    timed_out = true;
                    break;
                }
            }
            Step::Done => break,
        }
    }
    throughput.stop();

    ConsumerOutput {
        latency,
        throughput,
        analytics,
        timed_out,
    }
}

/// Runs one producer thread and one consumer thread over the given queue.
pub fn run_benchmark<P, C>(
    name: &str,
    num_ticks: u64,
    producer: P,
    consumer: C,
    config: &BenchmarkConfig,
) -> Result<BenchmarkRun, BenchmarkError>
where
    P: QueueProducer<MarketTick> + 'static,
    C: QueueConsumer<MarketTick> + 'static,
{
    let done = DoneFlag::new();

    let producer_done = done.clone();
    let generator_config = config.generator;
    let producer_thread = thread::Builder::new()
        .name("feed-producer".to_string())
        .spawn(move || {
            let mut generator = TickGenerator::new(generator_config);
            produce(&producer, (0..num_ticks).map(|_| generator.generate_tick()), &producer_done)
        })?;

    let consumer_config = *config;
    let consumer_thread = thread::Builder::new()
        .name("feed-consumer".to_string())
        .spawn(move || consume(&consumer, &done, &consumer_config, num_ticks))?;

    let producer_result = producer_thread.join();
    let consumer_result = consumer_thread.join();

    if producer_result.is_err() {
        return Err(BenchmarkError::ThreadPanicked {
            name: name.to_string(),
            role: "producer",
        });
    }
    let output = consumer_result.map_err(|_| BenchmarkError::ThreadPanicked {
        name: name.to_string(),
        role: "consumer",
    })?;

    if output.timed_out {
        return Err(BenchmarkError::Timeout {
            name: name.to_string(),
            processed: output.throughput.item_count(),
            expected: num_ticks,
        });
    }

    let results = BenchmarkResults {
        name: name.to_string(),
        ticks_processed: output.latency.count() as u64,
        throughput_tps: output.throughput.throughput(),
        latency_mean: output.latency.mean(),
        latency_p50: output.latency.p50(),
        latency_p99: output.latency.p99(),
        latency_p999: output.latency.p999(),
        latency_min: output.latency.min(),
        latency_max: output.latency.max(),
        elapsed_seconds: output.throughput.elapsed_seconds(),
    };

    Ok(BenchmarkRun {
        results,
        analytics: output.analytics,
    })
}

/// Runs `num_ticks` through a fresh lock-free SPSC queue.
pub fn run_lock_free(num_ticks: u64, config: &BenchmarkConfig) -> Result<BenchmarkRun, BenchmarkError> {
    QueueKind::LockFree.run(num_ticks, config)
}

/// Runs `num_ticks` through a fresh mutex queue.
pub fn run_mutex(num_ticks: u64, config: &BenchmarkConfig) -> Result<BenchmarkRun, BenchmarkError> {
    QueueKind::Mutex.run(num_ticks, config)
}
