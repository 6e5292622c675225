//! Local typing-state debouncer.
//!
//! Raw keystroke activity becomes a two-edge signal: `true` when the user
//! starts typing and `false` after a quiet period or an explicit send.
//!
//! STATE MACHINE
//! =============
//! - Idle + input     -> emit true, Typing, arm idle timer
//! - Typing + input   -> re-arm idle timer (re-emit true in `EveryKeystroke`)
//! - Typing + timeout -> emit false, Idle
//! - any + cancel     -> disarm, emit false, Idle
//!
//! The debouncer never looks at the connection. The session controller only
//! feeds it while the connection is active.

use std::time::{Duration, Instant};

use crate::timer::TimerSlot;

pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_millis(2_000);

/// How often `typing{isTyping:true}` goes on the wire during a burst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypingEmission {
    /// Only on the Idle -> Typing edge.
    #[default]
    Edge,
    /// On every input event, for peers that expect a refreshed signal.
    EveryKeystroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingPhase {
    Idle,
    Typing,
}

#[derive(Debug, Clone)]
pub struct TypingDebouncer {
    phase: TypingPhase,
    idle_after: Duration,
    emission: TypingEmission,
    idle_timer: TimerSlot,
}

impl TypingDebouncer {
    #[must_use]
    pub fn new(idle_after: Duration, emission: TypingEmission) -> Self {
        Self {
            phase: TypingPhase::Idle,
            idle_after,
            emission,
            idle_timer: TimerSlot::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> TypingPhase {
        self.phase
    }

    #[must_use]
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_timer.deadline()
    }

    /// Record input activity. Returns the signal to transmit, if any.
    pub fn on_input(&mut self, now: Instant) -> Option<bool> {
        self.idle_timer.arm(now + self.idle_after);
        match (self.phase, self.emission) {
            (TypingPhase::Idle, _) => {
                self.phase = TypingPhase::Typing;
                Some(true)
            }
            (TypingPhase::Typing, TypingEmission::EveryKeystroke) => Some(true),
            (TypingPhase::Typing, TypingEmission::Edge) => None,
        }
    }

    /// Fire the idle timer if due. Returns `Some(false)` on the trailing edge.
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        self.idle_timer.take_due(now)?;
        self.phase = TypingPhase::Idle;
        Some(false)
    }

    /// Explicit stop on message send.
    ///
    /// Always yields the stopped signal and leaves no timer behind, so the
    /// idle timeout cannot emit a second `false`.
    pub fn cancel(&mut self) -> bool {
        self.idle_timer.cancel();
        self.phase = TypingPhase::Idle;
        false
    }

    /// Drop all state without emitting anything.
    pub fn reset(&mut self) {
        self.idle_timer.cancel();
        self.phase = TypingPhase::Idle;
    }
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_IDLE, TypingEmission::default())
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
