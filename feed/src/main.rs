//! Market feed benchmark entry point.
//!
//! Sweeps a list of workload sizes. For each size the same generated tick
//! stream is pushed through the lock-free SPSC queue and then through the
//! mutex queue, and the two runs are compared. All results are exported to
//! CSV at the end.

use clap::{Parser, ValueEnum};
use common::logging::{LogLevel, Logger};
use common::termination::IdleStrategy;
use common::{log_debug, log_error, log_info, log_warn};
use feed::benchmark::{BenchmarkConfig, BenchmarkRun, QueueKind};
use feed::report::{export_csv, BenchmarkResults, Comparison};
use feed::tick_generator::TickGeneratorConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the consumer does while the queue is empty
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Idle {
    /// Busy-spin with a CPU pause hint
    Spin,
    /// Yield the thread to the scheduler
    Yield,
    /// Spin, then yield, then sleep
    Backoff,
}

impl From<Idle> for IdleStrategy {
    fn from(idle: Idle) -> Self {
        match idle {
            Idle::Spin => IdleStrategy::Spin,
            Idle::Yield => IdleStrategy::Yield,
            Idle::Backoff => IdleStrategy::backoff(),
        }
    }
}

/// Lock-free vs mutex queue benchmark over synthetic market ticks
#[derive(Parser, Debug)]
#[command(name = "feed")]
#[command(about = "SPSC market tick queue benchmark")]
struct Args {
    /// Workload sizes (ticks per run), comma separated
    #[arg(long, value_delimiter = ',', default_value = "10000,50000,100000,500000,1000000")]
    sizes: Vec<u64>,

    /// Ticker symbol (up to 8 bytes)
    #[arg(long, default_value = "SPY")]
    symbol: String,

    /// Starting price of the random walk
    #[arg(long, default_value_t = 100.0)]
    base_price: f64,

    /// Maximum price change per tick
    #[arg(long, default_value_t = 0.01)]
    price_step: f64,

    /// Minimum tick volume
    #[arg(long, default_value_t = 100)]
    min_volume: u32,

    /// Maximum tick volume
    #[arg(long, default_value_t = 1000)]
    max_volume: u32,

    /// RNG seed (0 seeds from OS entropy)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Rolling average window in ticks
    #[arg(short, long, default_value_t = 100)]
    window: usize,

    /// Consumer idle strategy
    #[arg(long, value_enum, default_value_t = Idle::Yield)]
    idle: Idle,

    /// Give up on a run if the consumer sits idle this long past its start
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// CSV output path
    #[arg(short, long, default_value = "benchmark_results.csv")]
    output: PathBuf,

    /// Minimum log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
}

fn main() {
    let args = Args::parse();
    let logger = Logger::with_level(args.log_level);

    println!("Lock-Free SPSC Queue vs Mutex Queue");
    println!("  Symbol: {}", args.symbol);
    println!("  Sizes: {:?}", args.sizes);
    println!("  Idle strategy: {:?}", args.idle);
    println!("  Rolling window: {}", args.window);

    let generator = TickGeneratorConfig::new(&args.symbol)
        .with_base_price(args.base_price)
        .with_price_step(args.price_step)
        .with_volume_range(args.min_volume, args.max_volume)
        .with_seed(args.seed);

    let mut config = BenchmarkConfig::default()
        .with_generator(generator)
        .with_rolling_window(args.window)
        .with_idle(args.idle.into());
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    // Set up graceful shutdown between runs
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nShutdown signal received, finishing current run...");
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Failed to set Ctrl-C handler: {}", e);
        std::process::exit(1);
    }

    let mut all_results: Vec<BenchmarkResults> = Vec::with_capacity(args.sizes.len() * 2);

    for &size in &args.sizes {
        if !running.load(Ordering::SeqCst) {
            log_warn!(logger, "sweep interrupted before size", size);
            break;
        }

        println!("\n--- Benchmarking with {} ticks ---", size);
        log_info!(logger, "starting lock-free run", size);

        let lock_free = run_or_exit(&logger, QueueKind::LockFree, size, &config);
        println!("{}\n", lock_free.results);
        log_debug!(logger, "lock-free vwap", lock_free.analytics.vwap());

        if !running.load(Ordering::SeqCst) {
            all_results.push(lock_free.results);
            log_warn!(logger, "sweep interrupted before mutex run", size);
            break;
        }

        log_info!(logger, "starting mutex run", size);
        let mutex = run_or_exit(&logger, QueueKind::Mutex, size, &config);
        println!("{}\n", mutex.results);
        log_debug!(logger, "mutex vwap", mutex.analytics.vwap());

        println!("Comparison ({} ticks):", size);
        println!("{}", Comparison::new(&lock_free.results, &mutex.results));

        all_results.push(lock_free.results);
        all_results.push(mutex.results);
    }

    println!("\n=== Summary ===");
    for result in &all_results {
        println!("{}\n", result);
    }

    if let Err(e) = export_csv(&args.output, &all_results) {
        log_error!(logger, "csv export failed", &e);
        logger.flush();
        eprintln!("Failed to write {}: {}", args.output.display(), e);
        std::process::exit(1);
    }
    println!("Results exported to {}", args.output.display());

    log_info!(logger, "runs completed", all_results.len());
    logger.flush();
}

/// Runs one benchmark, or reports the failure and exits.
fn run_or_exit(logger: &Logger, kind: QueueKind, size: u64, config: &BenchmarkConfig) -> BenchmarkRun {
    match kind.run(size, config) {
        Ok(run) => run,
        Err(e) => {
            log_error!(logger, "benchmark failed", &e);
            logger.flush();
            eprintln!("Benchmark failed: {}", e);
            std::process::exit(1);
        }
    }
}
