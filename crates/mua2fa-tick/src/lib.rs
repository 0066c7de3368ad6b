//! Fixed-rate server tick for MUA2FA.
//!
//! The dedicated server sweeps timed-out configuration sessions once per
//! tick, the way a game server runs its post-tick handlers. The default
//! rate is the game's 20 Hz.
//!
//! A rate of 0 disables ticking: [`TickScheduler::wait_for_tick`] then
//! pends forever, which `tokio::select!` treats as a branch that never
//! fires.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* handle */ }
//!         _ = ticks.wait_for_tick() => sessions.sweep(Utc::now()),
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Game server tick rate.
pub const DEFAULT_TICK_RATE_HZ: u32 = 20;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. 0 disables ticking.
    pub tick_rate_hz: u32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self { tick_rate_hz }
    }

    /// Caps the rate at [`Self::MAX_TICK_RATE_HZ`].
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self
    }

    /// Length of one tick, or `None` when ticking is disabled.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What [`TickScheduler::wait_for_tick`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Whole ticks that were skipped because the loop woke up late.
    pub ticks_skipped: u64,
}

/// Fires at a fixed rate; late wakeups skip ahead instead of bursting.
pub struct TickScheduler {
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        match tick_duration {
            Some(d) => debug!(rate_hz = config.tick_rate_hz, tick_ms = d.as_secs_f64() * 1000.0, "tick scheduler created"),
            None => debug!("tick scheduler created with ticking disabled"),
        }
        Self {
            tick_duration,
            tick_count: 0,
            next_tick: tick_duration.map(|d| Instant::now() + d),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// Pends forever when ticking is disabled.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (Some(next), Some(tick_dur)) = (self.next_tick, self.tick_duration) else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let ticks_skipped = (late_by.as_nanos() / tick_dur.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }
        // Schedule from now, not from the missed deadline.
        self.next_tick = Some(now + tick_dur);

        TickInfo {
            tick: self.tick_count,
            ticks_skipped,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.tick_duration.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
