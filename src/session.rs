//! Session controller: connection lifecycle, join handshake and dispatch.
//!
//! LIFECYCLE
//! =========
//! 1. `join`         -> Connecting (name resolved, driver opens the socket)
//! 2. `on_open`      -> Joining    (`join{name}` queued)
//! 3. `on_join_sent` -> Active     (heartbeat armed)
//! 4. `on_close`     -> Lost       (heartbeat cancelled, one notice, restart armed)
//! 5. `poll` returns `Poll::Restart` once the restart delay elapses; the
//!    driver discards this controller and starts a fresh one.
//!
//! DESIGN
//! ======
//! The controller is sans-IO. It never touches the socket or the clock; the
//! driver feeds it events with explicit `Instant`s and drains the outbox onto
//! the wire. All outbound traffic goes through `transmit`, which drops
//! envelopes unless the connection is open.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use envelope::{ClientEnvelope, ServerEnvelope};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::heartbeat::Heartbeat;
use crate::history::{HistoryEntry, MessageHistory};
use crate::presence::Presence;
use crate::timer::{TimerSlot, earliest};
use crate::typing::TypingDebouncer;
use crate::view::ChatView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Joining,
    Active,
    Lost,
}

/// What the driver should do after firing due timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Continue,
    /// The restart delay elapsed; tear down and start a new session.
    Restart,
}

/// Trim the chosen name, falling back to `Guest_<0..=999>` when empty.
pub fn resolve_display_name<R: Rng>(raw: &str, rng: &mut R) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Guest_{}", rng.random_range(0..1000_u32))
    } else {
        trimmed.to_owned()
    }
}

pub struct SessionController<V> {
    local_name: String,
    state: ConnectionState,
    settings: SessionSettings,
    history: MessageHistory,
    presence: Presence,
    typing: TypingDebouncer,
    heartbeat: Heartbeat,
    restart: TimerSlot,
    outbox: VecDeque<ClientEnvelope>,
    view: V,
}

impl<V: ChatView> SessionController<V> {
    /// Start a session for `raw_name`. The returned controller is
    /// `Connecting`; the caller is expected to open the connection next.
    pub fn join(raw_name: &str, settings: SessionSettings, view: V) -> Self {
        Self::join_with_rng(raw_name, settings, view, &mut rand::rng())
    }

    pub fn join_with_rng<R: Rng>(
        raw_name: &str,
        settings: SessionSettings,
        mut view: V,
        rng: &mut R,
    ) -> Self {
        let local_name = resolve_display_name(raw_name, rng);
        view.show_display_name(&local_name);

        let mut session = Self {
            local_name,
            state: ConnectionState::Disconnected,
            settings,
            history: MessageHistory::new(settings.history_capacity),
            presence: Presence::new(),
            typing: TypingDebouncer::new(settings.typing_idle, settings.typing_emission),
            heartbeat: Heartbeat::new(settings.heartbeat_interval),
            restart: TimerSlot::new(),
            outbox: VecDeque::new(),
            view,
        };
        info!(name = %session.local_name, "session: joining");
        session.transition(ConnectionState::Connecting);
        session
    }

    // =========================================================================
    // CONNECTION EVENTS
    // =========================================================================

    /// The transport connected. Queues the join handshake.
    pub fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            warn!(state = ?self.state, "session: open event in unexpected state");
            return;
        }
        self.transition(ConnectionState::Joining);
        self.transmit(ClientEnvelope::Join { name: self.local_name.clone() });
    }

    /// The join envelope reached the transport. Starts the heartbeat.
    pub fn on_join_sent(&mut self, now: Instant) {
        if self.state != ConnectionState::Joining {
            return;
        }
        self.transition(ConnectionState::Active);
        self.heartbeat.start(now);
        info!(name = %self.local_name, "session: active");
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed frames are logged and dropped; the session carries on.
    pub fn on_text(&mut self, raw: &str) {
        let envelope = match envelope::decode_server(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = raw.len(), "session: dropping malformed frame");
                return;
            }
        };
        debug!(kind = envelope.tag(), "session: recv envelope");

        match envelope {
            ServerEnvelope::Users(users) => {
                self.presence.replace_users(users.list);
                self.view.render_user_list(self.presence.users());
            }
            ServerEnvelope::Typing(typing) => self.apply_remote_typing(&typing.user, typing.is_typing),
            ServerEnvelope::System(system) => self.append(HistoryEntry::system(system.text)),
            ServerEnvelope::Message(chat) => self.append(HistoryEntry::Chat(chat.into())),
            ServerEnvelope::Other(other) => self.append(HistoryEntry::Chat(other.into())),
        }
    }

    /// The transport closed or failed.
    ///
    /// Emits exactly one notice per session and arms the fixed-delay restart.
    pub fn on_close(&mut self, now: Instant) {
        if matches!(self.state, ConnectionState::Lost | ConnectionState::Disconnected) {
            debug!(state = ?self.state, "session: ignoring close");
            return;
        }
        let previous = self.state;
        self.transition(ConnectionState::Lost);

        self.heartbeat.stop();
        self.typing.reset();
        self.outbox.clear();

        let delay = self.settings.restart_delay;
        self.append(HistoryEntry::system(format!(
            "Connection lost. Refreshing in {}...",
            format_delay(delay)
        )));
        self.restart.arm(now + delay);
        info!(
            from = ?previous,
            restart_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "session: connection lost; restart scheduled"
        );
    }

    // =========================================================================
    // USER ACTIONS
    // =========================================================================

    /// Raw input activity in the message box.
    pub fn input(&mut self, now: Instant) {
        if self.state != ConnectionState::Active {
            return;
        }
        if let Some(is_typing) = self.typing.on_input(now) {
            self.transmit(ClientEnvelope::Typing { is_typing });
        }
    }

    /// Send a chat line. Returns whether anything was sent.
    ///
    /// Sending always ends the local typing state, immediately.
    pub fn send(&mut self, text: &str) -> bool {
        let text = text.trim();
        if self.state != ConnectionState::Active || text.is_empty() {
            return false;
        }

        self.transmit(ClientEnvelope::Message { text: text.to_owned() });
        self.view.clear_input();
        let is_typing = self.typing.cancel();
        self.transmit(ClientEnvelope::Typing { is_typing });
        true
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Fire every timer due at `now`.
    pub fn poll(&mut self, now: Instant) -> Poll {
        if self.heartbeat.poll(now, self.is_open()) {
            self.transmit(ClientEnvelope::Ping);
        }

        if let Some(is_typing) = self.typing.poll(now) {
            if self.state == ConnectionState::Active {
                self.transmit(ClientEnvelope::Typing { is_typing });
            }
        }

        if self.restart.take_due(now).is_some() {
            info!(name = %self.local_name, "session: restart due");
            return Poll::Restart;
        }
        Poll::Continue
    }

    /// Earliest armed timer, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(&[
            self.heartbeat.next_tick(),
            self.typing.idle_deadline(),
            self.restart.deadline(),
        ])
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Take queued envelopes in send order.
    pub fn drain_outbox(&mut self) -> impl Iterator<Item = ClientEnvelope> + '_ {
        self.outbox.drain(..)
    }

    fn transmit(&mut self, envelope: ClientEnvelope) {
        if !self.is_open() {
            debug!(kind = %envelope.kind(), state = ?self.state, "session: connection not open; dropping envelope");
            return;
        }
        self.outbox.push_back(envelope);
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state, ConnectionState::Joining | ConnectionState::Active)
    }

    #[must_use]
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    #[must_use]
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    #[must_use]
    pub fn restart_deadline(&self) -> Option<Instant> {
        self.restart.deadline()
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Hand the view back for the next session.
    pub fn into_view(self) -> V {
        self.view
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "session: state change");
        self.state = next;
    }

    fn append(&mut self, entry: HistoryEntry) {
        let evicted = self.history.append(entry);
        if let Some(latest) = self.history.latest() {
            self.view.render_message(latest);
        }
        if evicted > 0 {
            self.view.evict_messages(evicted);
        }
    }

    fn apply_remote_typing(&mut self, user: &str, is_typing: bool) {
        // The server echoes our own typing edges back; never show them.
        if user == self.local_name {
            return;
        }
        if let Some(visible) = self.presence.set_typing(user, is_typing) {
            self.view.set_typing_indicator(user, visible);
        }
    }
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{}ms", delay.as_millis())
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
