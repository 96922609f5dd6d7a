// Low-latency logger
//
// Logging on the hot path must not take a lock or do I/O. Entries are pushed
// into an unbounded SPSC queue and a background thread formats and writes
// them to stderr:
// 1. Lock-free hand-off through lf_queue
// 2. Lazy formatting - string formatting happens on the background thread
// 3. Background I/O - actual writes happen off the critical path
// 4. Shutdown through the same done-flag protocol as the tick consumer,
//    so nothing logged before drop is lost

use crate::lf_queue::{self, Consumer, Producer};
use crate::termination::{ConsumerLoop, DoneFlag, IdleStrategy, Step};
use crate::time::{now_nanos, Nanos};

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    /// Returns the string representation of the log level
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{0}' (expected debug, info, warn or error)")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

/// Log message payloads. Formatting of the static variants is deferred to
/// the writer thread, keeping the hot path allocation-free apart from the
/// queue node.
pub enum LogMessage {
    /// A static string message
    Static(&'static str),
    /// A static message with an i64 value
    StaticWithI64(&'static str, i64),
    /// A static message with a u64 value
    StaticWithU64(&'static str, u64),
    /// A static message with an f64 value
    StaticWithF64(&'static str, f64),
    /// A pre-formatted string (rare cases where allocation is unavoidable)
    Formatted(String),
}

impl LogMessage {
    #[inline]
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            LogMessage::Static(s) => write!(writer, "{}", s),
            LogMessage::StaticWithI64(s, v) => write!(writer, "{}: {}", s, v),
            LogMessage::StaticWithU64(s, v) => write!(writer, "{}: {}", s, v),
            LogMessage::StaticWithF64(s, v) => write!(writer, "{}: {:.6}", s, v),
            LogMessage::Formatted(s) => write!(writer, "{}", s),
        }
    }
}

/// A single log entry
pub struct LogEntry {
    pub timestamp: Nanos,
    pub level: LogLevel,
    pub message: LogMessage,
}

/// Flush handshake between `Logger::flush` and the writer thread.
///
/// Each flush takes a ticket; the writer publishes the highest ticket whose
/// entries are all written.
#[derive(Default)]
struct FlushState {
    requested: AtomicU64,
    complete: AtomicU64,
}

/// Low-latency logger that offloads I/O to a background thread
///
/// The logger owns the producer end of its queue, so it can be moved to
/// another thread but not shared between threads.
///
/// # Example
/// ```
/// use common::logging::{LogLevel, Logger};
///
/// let logger = Logger::with_level(LogLevel::Warn);
/// logger.log(LogLevel::Error, "System started");
/// logger.log_with_i64(LogLevel::Debug, "filtered", 42);
/// logger.flush();
/// ```
pub struct Logger {
    producer: Producer<LogEntry>,
    done: DoneFlag,
    flush_state: Arc<FlushState>,
    writer_thread: Option<JoinHandle<()>>,
    /// Minimum log level to record
    min_level: LogLevel,
}

impl Logger {
    /// Creates a new Logger with a background writer thread
    pub fn new() -> Self {
        Self::with_level(LogLevel::Debug)
    }

    /// Creates a new Logger with a specified minimum log level
    pub fn with_level(min_level: LogLevel) -> Self {
        let (producer, consumer) = lf_queue::channel();
        let done = DoneFlag::new();
        let flush_state = Arc::new(FlushState::default());

        let writer_done = done.clone();
        let writer_flush = Arc::clone(&flush_state);
        let writer_thread = thread::spawn(move || {
            Self::writer_loop(consumer, writer_done, writer_flush);
        });

        Self {
            producer,
            done,
            flush_state,
            writer_thread: Some(writer_thread),
            min_level,
        }
    }

    /// Background thread main loop
    fn writer_loop(consumer: Consumer<LogEntry>, done: DoneFlag, flush: Arc<FlushState>) {
        // Lock stderr per entry or per flush batch only. Holding it across
        // idle waits blocks every other writer to stderr in the process.
        let stderr = std::io::stderr();
        let mut entries = ConsumerLoop::new(&consumer, &done, IdleStrategy::backoff());

        loop {
            match entries.step(|entry| Self::write_entry(&mut stderr.lock(), &entry)) {
                Step::Processed => {}
                Step::Idle => {
                    let ticket = flush.requested.load(Ordering::Acquire);
                    if ticket > flush.complete.load(Ordering::Relaxed) {
                        let mut out = stderr.lock();
                        // Everything pushed before the ticket was taken is visible now.
                        while let Some(entry) = consumer.pop() {
                            Self::write_entry(&mut out, &entry);
                        }
                        let _ = out.flush();
                        drop(out);
                        flush.complete.store(ticket, Ordering::Release);
                    }
                }
                Step::Done => break,
            }
        }

        let _ = stderr.lock().flush();
    }

    /// Format: [timestamp_ns] LEVEL message
    #[inline]
    fn write_entry<W: Write>(writer: &mut W, entry: &LogEntry) {
        let _ = write!(
            writer,
            "[{:016}] {:5} ",
            entry.timestamp.as_u64(),
            entry.level.as_str()
        );
        let _ = entry.message.write_to(writer);
        let _ = writeln!(writer);
    }

    #[inline]
    fn enqueue(&self, level: LogLevel, message: LogMessage) {
        self.producer.push(LogEntry {
            timestamp: now_nanos(),
            level,
            message,
        });
    }

    /// Log a static message
    ///
    /// This is the fastest logging path - no formatting.
    #[inline]
    pub fn log(&self, level: LogLevel, msg: &'static str) {
        if level < self.min_level {
            return;
        }
        self.enqueue(level, LogMessage::Static(msg));
    }

    /// Log a static message with an i64 value
    #[inline]
    pub fn log_with_i64(&self, level: LogLevel, msg: &'static str, value: i64) {
        if level < self.min_level {
            return;
        }
        self.enqueue(level, LogMessage::StaticWithI64(msg, value));
    }

    /// Log a static message with a u64 value
    #[inline]
    pub fn log_with_u64(&self, level: LogLevel, msg: &'static str, value: u64) {
        if level < self.min_level {
            return;
        }
        self.enqueue(level, LogMessage::StaticWithU64(msg, value));
    }

    /// Log a static message with an f64 value
    #[inline]
    pub fn log_with_f64(&self, level: LogLevel, msg: &'static str, value: f64) {
        if level < self.min_level {
            return;
        }
        self.enqueue(level, LogMessage::StaticWithF64(msg, value));
    }

    /// Log a message with a value that implements Display
    ///
    /// This formats on the calling thread, so keep it off the hot path.
    #[inline]
    pub fn log_with_value<T: std::fmt::Display>(&self, level: LogLevel, msg: &'static str, value: T) {
        if level < self.min_level {
            return;
        }
        self.enqueue(level, LogMessage::Formatted(format!("{}: {}", msg, value)));
    }

    /// Flush all pending log entries
    ///
    /// Blocks until every entry logged before this call has been written.
    pub fn flush(&self) {
        let ticket = self.flush_state.requested.fetch_add(1, Ordering::AcqRel) + 1;

        while self.flush_state.complete.load(Ordering::Acquire) < ticket {
            thread::yield_now();
        }
    }

    /// Set the minimum log level
    #[inline]
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Get the current minimum log level
    #[inline]
    pub fn level(&self) -> LogLevel {
        self.min_level
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // Every entry was pushed before this signal, so the writer drains
        // them all before reaching Done.
        self.done.signal();

        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}

// Convenience macros for logging

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Debug, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_value($crate::logging::LogLevel::Debug, $msg, $val)
    };
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Info, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_value($crate::logging::LogLevel::Info, $msg, $val)
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Warn, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_value($crate::logging::LogLevel::Warn, $msg, $val)
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Error, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_value($crate::logging::LogLevel::Error, $msg, $val)
    };
}
