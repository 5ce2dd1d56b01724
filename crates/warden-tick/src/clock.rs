//! Fixed-rate clock that drives the main thread.
//!
//! The main thread does its work in ticks: every tick it runs whatever
//! delayed tasks fell due. Delays throughout Warden are expressed in ticks
//! (60 ticks = 3 s at the default 20 Hz), so the clock is the single place
//! that turns ticks into wall time.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Configuration for the main-thread clock.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// Ticks per second. Clamped to `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    /// Fraction of the tick budget (0.0–1.0) above which a tick's work is
    /// reported as slow.
    pub budget_warn_threshold: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            budget_warn_threshold: 0.80,
        }
    }
}

impl ClockConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Unlike a game loop, the main thread can't be event-driven: deferred
    /// tasks need ticks to fire. A rate of 0 is therefore raised to 1.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            warn!("tick_rate_hz of 0 is not supported on the main thread, using 1");
            self.tick_rate_hz = 1;
        }
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

/// The main-thread clock.
///
/// Overruns are handled by skipping: if the thread falls behind, the next
/// tick is scheduled from "now" rather than replaying every missed tick.
pub struct TickClock {
    config: ClockConfig,
    tick_duration: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    tick_start: Option<Instant>,
    overruns: u64,
}

impl TickClock {
    pub fn new(config: ClockConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = tick_duration.as_secs_f64() * 1000.0,
            "main thread clock created"
        );
        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick: TokioInstant::now() + tick_duration,
            tick_start: None,
            overruns: 0,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(ClockConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due and returns its number (starting at 1).
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the clock
    /// untouched, so it can sit in a `tokio::select!` next to a command
    /// channel.
    pub async fn wait_for_tick(&mut self) -> u64 {
        time::sleep_until(self.next_tick).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(self.next_tick);
        if late_by > self.tick_duration {
            self.overruns += 1;
            let skipped = late_by.as_nanos() / self.tick_duration.as_nanos().max(1);
            warn!(
                tick = self.tick_count + 1,
                skipped = skipped as u64,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "main thread fell behind, skipping ahead"
            );
            self.next_tick = now + self.tick_duration;
        } else {
            self.next_tick += self.tick_duration;
        }

        self.tick_count += 1;
        self.tick_start = Some(Instant::now());
        trace!(tick = self.tick_count, "tick");
        self.tick_count
    }

    /// Records that the current tick's work has finished, warning if it
    /// used too much of the budget.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.tick_duration.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.tick_duration.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick approaching budget limit"
            );
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// Number of times the clock had to skip ahead.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_zero_rate_becomes_one() {
        let cfg = ClockConfig::with_rate(0).validated();
        assert_eq!(cfg.tick_rate_hz, 1);
    }

    #[test]
    fn test_validated_clamps_to_max() {
        let cfg = ClockConfig::with_rate(1000).validated();
        assert_eq!(cfg.tick_rate_hz, ClockConfig::MAX_TICK_RATE_HZ);
    }

    #[test]
    fn test_default_rate_is_twenty_hz() {
        let cfg = ClockConfig::default();
        assert_eq!(cfg.tick_rate_hz, 20);
        assert_eq!(cfg.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_record_tick_end_without_tick_is_noop() {
        let mut clock = TickClock::with_rate(20);
        clock.record_tick_end();
        assert_eq!(clock.tick_count(), 0);
    }
}
