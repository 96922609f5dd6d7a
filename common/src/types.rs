// Core type definitions for the tick feed

use crate::time::Nanos;
use std::fmt;

// Type aliases
pub type Price = f64;   // Dollars
pub type Volume = u32;  // Shares

/// Maximum symbol length stored inline in a tick.
pub const SYMBOL_LEN: usize = 8;

/// Represents the aggressor side of a trade
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy = 1,
    Sell = -1,
}

impl Side {
    /// Returns the single-character code ('B' or 'S')
    #[inline]
    pub const fn as_char(&self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

/// Ticker symbol stored inline so a tick stays `Copy` and fixed-size.
///
/// Symbols longer than [`SYMBOL_LEN`] bytes are truncated at a character
/// boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol {
    bytes: [u8; SYMBOL_LEN],
    len: u8,
}

impl Symbol {
    pub fn new(symbol: &str) -> Self {
        let mut len = symbol.len().min(SYMBOL_LEN);
        while !symbol.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; SYMBOL_LEN];
        bytes[..len].copy_from_slice(&symbol.as_bytes()[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // Always a char-boundary prefix of a valid &str.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

/// A single trade print moving through the feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketTick {
    pub symbol: Symbol,
    pub price: Price,
    pub volume: Volume,
    pub side: Side,
    /// Creation time, used for producer-to-consumer latency.
    pub timestamp: Nanos,
}

impl MarketTick {
    pub fn new(symbol: Symbol, price: Price, volume: Volume, side: Side, timestamp: Nanos) -> Self {
        Self {
            symbol,
            price,
            volume,
            side,
            timestamp,
        }
    }
}

impl fmt::Display for MarketTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ ${:.2} vol:{} side:{} ts:{}",
            self.symbol,
            self.price,
            self.volume,
            self.side.as_char(),
            self.timestamp.as_u64()
        )
    }
}
