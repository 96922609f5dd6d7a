//! Running analytics over the consumed tick stream.
//!
//! Every calculator here is single-threaded and updates in O(1) per tick.
//! Ticks must be fed in arrival order; the consumer thread owns one
//! [`AnalyticsEngine`] and calls [`AnalyticsEngine::process_tick`] for each
//! popped record.

use common::{MarketTick, Price, Side};
use std::collections::VecDeque;

/// Volume-weighted average price.
///
/// VWAP = Σ(price × volume) / Σ(volume)
#[derive(Debug, Clone, Default)]
pub struct VwapCalculator {
    /// Σ(price × volume)
    total_price_volume: f64,
    /// Σ(volume)
    total_volume: i64,
}

impl VwapCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_tick(&mut self, tick: &MarketTick) {
        self.total_price_volume += tick.price * tick.volume as f64;
        self.total_volume += tick.volume as i64;
    }

    /// Returns the current VWAP, or 0.0 if no volume has been seen.
    #[inline]
    pub fn vwap(&self) -> f64 {
        if self.total_volume == 0 {
            return 0.0;
        }
        self.total_price_volume / self.total_volume as f64
    }

    #[inline]
    pub fn total_volume(&self) -> i64 {
        self.total_volume
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Signed trade imbalance: buy volume minus sell volume.
#[derive(Debug, Clone, Default)]
pub struct TradeImbalanceCalculator {
    buy_volume: i64,
    sell_volume: i64,
}

impl TradeImbalanceCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_tick(&mut self, tick: &MarketTick) {
        match tick.side {
            Side::Buy => self.buy_volume += tick.volume as i64,
            Side::Sell => self.sell_volume += tick.volume as i64,
        }
    }

    /// Positive values indicate buy pressure, negative values sell pressure.
    #[inline]
    pub fn imbalance(&self) -> i64 {
        self.buy_volume - self.sell_volume
    }

    #[inline]
    pub fn buy_volume(&self) -> i64 {
        self.buy_volume
    }

    #[inline]
    pub fn sell_volume(&self) -> i64 {
        self.sell_volume
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Arithmetic mean of the last `window` prices.
///
/// Keeps a running sum so each update is O(1): add the new price, and once
/// the window is full subtract the price that falls out.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    prices: VecDeque<Price>,
    window: usize,
    sum: f64,
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl RollingAverage {
    /// Default number of ticks averaged over.
    pub const DEFAULT_WINDOW: usize = 100;

    /// Creates a rolling average over `window` prices.
    /// A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            prices: VecDeque::with_capacity(window + 1),
            window,
            sum: 0.0,
        }
    }

    #[inline]
    pub fn add_tick(&mut self, tick: &MarketTick) {
        self.add_price(tick.price);
    }

    #[inline]
    pub fn add_price(&mut self, price: Price) {
        self.prices.push_back(price);
        self.sum += price;

        if self.prices.len() > self.window {
            if let Some(oldest) = self.prices.pop_front() {
                self.sum -= oldest;
            }
        }
    }

    /// Mean of the last min(count, window) prices, or 0.0 when empty.
    #[inline]
    pub fn average(&self) -> f64 {
        if self.prices.is_empty() {
            return 0.0;
        }
        self.sum / self.prices.len() as f64
    }

    /// Number of prices currently in the window.
    #[inline]
    pub fn count(&self) -> usize {
        self.prices.len()
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn reset(&mut self) {
        self.prices.clear();
        self.sum = 0.0;
    }
}

/// All analytics the consumer maintains, updated together per tick.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    vwap: VwapCalculator,
    imbalance: TradeImbalanceCalculator,
    rolling_avg: RollingAverage,
    tick_count: u64,
}

impl AnalyticsEngine {
    /// Creates an engine whose rolling average spans `rolling_window` ticks.
    pub fn new(rolling_window: usize) -> Self {
        Self {
            vwap: VwapCalculator::new(),
            imbalance: TradeImbalanceCalculator::new(),
            rolling_avg: RollingAverage::new(rolling_window),
            tick_count: 0,
        }
    }

    /// Feeds one tick through every calculator.
    #[inline]
    pub fn process_tick(&mut self, tick: &MarketTick) {
        self.vwap.add_tick(tick);
        self.imbalance.add_tick(tick);
        self.rolling_avg.add_tick(tick);
        self.tick_count += 1;
    }

    #[inline]
    pub fn vwap(&self) -> f64 {
        self.vwap.vwap()
    }

    #[inline]
    pub fn imbalance(&self) -> i64 {
        self.imbalance.imbalance()
    }

    #[inline]
    pub fn rolling_average(&self) -> f64 {
        self.rolling_avg.average()
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    #[inline]
    pub fn buy_volume(&self) -> i64 {
        self.imbalance.buy_volume()
    }

    #[inline]
    pub fn sell_volume(&self) -> i64 {
        self.imbalance.sell_volume()
    }

    pub fn reset(&mut self) {
        self.vwap.reset();
        self.imbalance.reset();
        self.rolling_avg.reset();
        self.tick_count = 0;
    }
}
