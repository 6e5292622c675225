//! Client-side liveness pings.
//!
//! The emitter only tracks *when* a ping is due. The session controller owns
//! the connection and decides whether the tick turns into a `ping` envelope.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::timer::TimerSlot;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20_000);

#[derive(Debug, Clone)]
pub struct Heartbeat {
    period: Duration,
    slot: TimerSlot,
}

impl Heartbeat {
    /// A zero period is clamped to one millisecond.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            slot: TimerSlot::new(),
        }
    }

    /// Begin ticking; the first tick lands one period after `now`.
    pub fn start(&mut self, now: Instant) {
        self.slot.arm(now + self.period);
    }

    /// Cancel the periodic timer. Required on every transition out of an
    /// open connection.
    pub fn stop(&mut self) {
        self.slot.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.slot.is_armed()
    }

    #[must_use]
    pub fn next_tick(&self) -> Option<Instant> {
        self.slot.deadline()
    }

    /// Advance the schedule. Returns `true` when a ping should be sent.
    ///
    /// A due tick on a closed connection is skipped without error or retry;
    /// the schedule still advances so skipped ticks do not pile up.
    pub fn poll(&mut self, now: Instant, connection_open: bool) -> bool {
        let Some(due) = self.slot.take_due(now) else {
            return false;
        };

        self.slot.arm(next_tick_after(due, now, self.period));

        if !connection_open {
            debug!("heartbeat: connection not open; skipping tick");
        }
        connection_open
    }
}

/// First tick on the `due + k * period` grid strictly after `now`.
///
/// Periods missed while suspended are skipped in one step.
fn next_tick_after(due: Instant, now: Instant, period: Duration) -> Instant {
    let periods = now.saturating_duration_since(due).as_nanos() / period.as_nanos() + 1;
    match u64::try_from(period.as_nanos() * periods) {
        Ok(nanos) => due.checked_add(Duration::from_nanos(nanos)).unwrap_or(now + period),
        Err(_) => now + period,
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

#[cfg(test)]
#[path = "heartbeat_test.rs"]
mod tests;
