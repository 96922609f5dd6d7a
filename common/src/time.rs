// Tick timestamps and latency arithmetic
//
// Producer and consumer stamp against one process-wide Instant, so a tick's
// creation time and its consumption time can be subtracted directly.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process-wide epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Nanos(pub u64);

impl Nanos {
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Saturating: an earlier minus a later timestamp is 0.
impl std::ops::Sub for Nanos {
    type Output = u64;

    #[inline]
    fn sub(self, rhs: Self) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

/// Monotonic timestamp. The epoch is fixed by the first call in the process.
#[inline]
pub fn now_nanos() -> Nanos {
    let epoch = EPOCH.get_or_init(Instant::now);
    Nanos(epoch.elapsed().as_nanos() as u64)
}

/// Microseconds from `start` to `end`, 0.0 if `end` is earlier.
#[inline]
pub fn latency_micros(start: Nanos, end: Nanos) -> f64 {
    (end - start) as f64 / 1_000.0
}
