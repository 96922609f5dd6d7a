//! Latency and throughput measurement for the consumer side.

use std::time::{Duration, Instant};

/// Records every producer-to-consumer latency sample, in microseconds.
///
/// Unlike a running min/max/mean tracker this keeps the full sample set so
/// percentiles can be read at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: Vec<f64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes the sample buffer so recording does not reallocate.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Record one latency sample in microseconds
    #[inline]
    pub fn record(&mut self, latency_micros: f64) {
        self.samples.push(latency_micros);
    }

    /// Latency at `percentile` (0.0 to 1.0).
    ///
    /// Sorts ascending and returns the element at index
    /// `floor(percentile × count)`, clamped to the last element. Returns 0.0
    /// with no samples.
    pub fn percentile(&self, percentile: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile * sorted.len() as f64) as usize).min(sorted.len() - 1);
        sorted[index]
    }

    #[inline]
    pub fn p50(&self) -> f64 {
        self.percentile(0.50)
    }

    #[inline]
    pub fn p99(&self) -> f64 {
        self.percentile(0.99)
    }

    #[inline]
    pub fn p999(&self) -> f64 {
        self.percentile(0.999)
    }

    /// Mean latency, 0.0 with no samples
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Minimum latency, 0.0 with no samples
    pub fn min(&self) -> f64 {
        self.samples.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    /// Maximum latency, 0.0 with no samples
    pub fn max(&self) -> f64 {
        self.samples.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Samples that fit without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Items processed over a wall-clock span.
#[derive(Debug, Clone, Default)]
pub struct ThroughputMeter {
    item_count: u64,
    start: Option<Instant>,
    end: Option<Instant>,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) measuring and clears the item count.
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
        self.end = None;
        self.item_count = 0;
    }

    pub fn stop(&mut self) {
        if self.start.is_some() && self.end.is_none() {
            self.end = Some(Instant::now());
        }
    }

    #[inline]
    pub fn add_item(&mut self) {
        self.item_count += 1;
    }

    #[inline]
    pub fn add_items(&mut self, count: u64) {
        self.item_count += count;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.start.is_some() && self.end.is_none()
    }

    /// Measured span. Reads the live clock while running.
    pub fn elapsed(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    #[inline]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Items per second, 0.0 with no items or a zero span.
    pub fn throughput(&self) -> f64 {
        if self.item_count == 0 {
            return 0.0;
        }
        let seconds = self.elapsed_seconds();
        if seconds == 0.0 {
            return 0.0;
        }
        self.item_count as f64 / seconds
    }

    #[inline]
    pub fn item_count(&self) -> u64 {
        self.item_count
    }
}
