//! Wall-clock sources for token bookkeeping
//!
//! Expiry timestamps are epoch milliseconds. Timers are driven by tokio, so a
//! clock that reads tokio's instant keeps both in lockstep when the runtime
//! clock is paused in tests.

use chrono::Utc;
use tokio::time::Instant;

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync + 'static {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock anchored to the tokio runtime's instant
#[derive(Debug, Clone)]
pub struct RuntimeClock {
    epoch_ms: i64,
    origin: Instant,
}

impl RuntimeClock {
    /// Anchor the clock at the current wall time
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    /// Anchor the clock at an explicit epoch timestamp
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            origin: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn runtime_clock_follows_paused_time() {
        let clock = RuntimeClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.now_ms(), 6_000);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
