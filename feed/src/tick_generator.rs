//! Synthetic market tick generation.
//!
//! Prices follow a bounded random walk around a base price; volume and side
//! are drawn uniformly. The producer thread pulls one tick per call and
//! stamps it with the creation time used for latency measurement.

use common::time::now_nanos;
use common::{MarketTick, Price, Side, Symbol, Volume};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lowest price the walk can reach.
pub const MIN_PRICE: Price = 0.01;

/// Configuration for a [`TickGenerator`].
#[derive(Debug, Clone, Copy)]
pub struct TickGeneratorConfig {
    pub symbol: Symbol,
    /// Starting price of the walk.
    pub base_price: Price,
    /// Maximum absolute price change per tick.
    pub price_step: Price,
    pub min_volume: Volume,
    pub max_volume: Volume,
    /// RNG seed. Zero seeds from OS entropy; anything else is reproducible.
    pub seed: u64,
}

impl Default for TickGeneratorConfig {
    fn default() -> Self {
        Self {
            symbol: Symbol::new("SPY"),
            base_price: 100.0,
            price_step: 0.01,
            min_volume: 100,
            max_volume: 1000,
            seed: 0,
        }
    }
}

impl TickGeneratorConfig {
    /// Creates a config for a specific symbol with default parameters.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            ..Default::default()
        }
    }

    /// Builder method to set the starting price.
    pub fn with_base_price(mut self, base_price: Price) -> Self {
        self.base_price = base_price;
        self
    }

    /// Builder method to set the maximum price change per tick.
    pub fn with_price_step(mut self, price_step: Price) -> Self {
        self.price_step = price_step;
        self
    }

    /// Builder method to set the volume range (inclusive).
    pub fn with_volume_range(mut self, min_volume: Volume, max_volume: Volume) -> Self {
        self.min_volume = min_volume;
        self.max_volume = max_volume;
        self
    }

    /// Builder method to set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Stateful random-walk tick source.
pub struct TickGenerator {
    symbol: Symbol,
    current_price: Price,
    price_step: Price,
    rng: StdRng,
    price_dist: Uniform<f64>,
    volume_dist: Uniform<Volume>,
}

impl TickGenerator {
    pub fn new(config: TickGeneratorConfig) -> Self {
        let rng = if config.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(config.seed)
        };

        // Tolerate a reversed range rather than panicking in Uniform.
        let lo = config.min_volume.min(config.max_volume);
        let hi = config.min_volume.max(config.max_volume);

        Self {
            symbol: config.symbol,
            current_price: config.base_price.max(MIN_PRICE),
            price_step: config.price_step.abs(),
            rng,
            price_dist: Uniform::new(-1.0, 1.0),
            volume_dist: Uniform::new_inclusive(lo, hi),
        }
    }

    /// Advances the walk by one step and returns a tick stamped now.
    pub fn generate_tick(&mut self) -> MarketTick {
        let price_change = self.price_dist.sample(&mut self.rng) * self.price_step;
        self.current_price = (self.current_price + price_change).max(MIN_PRICE);

        let volume = self.volume_dist.sample(&mut self.rng);
        let side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };

        MarketTick::new(self.symbol, self.current_price, volume, side, now_nanos())
    }

    /// Generates `count` consecutive ticks.
    pub fn generate_ticks(&mut self, count: usize) -> Vec<MarketTick> {
        (0..count).map(|_| self.generate_tick()).collect()
    }

    #[inline]
    pub fn current_price(&self) -> Price {
        self.current_price
    }

    /// Restarts the walk from `base_price`.
    pub fn reset_price(&mut self, base_price: Price) {
        self.current_price = base_price.max(MIN_PRICE);
    }
}

impl Iterator for TickGenerator {
    type Item = MarketTick;

    fn next(&mut self) -> Option<MarketTick> {
        Some(self.generate_tick())
    }
}
