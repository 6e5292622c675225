use rand::SeedableRng;
use rand::rngs::StdRng;

use super::*;
use crate::history::ChatMessage;

// =============================================================================
// TEST VIEW
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewEvent {
    DisplayName(String),
    Users(Vec<String>),
    Message(HistoryEntry),
    Evicted(usize),
    Typing(String, bool),
    ClearInput,
}

#[derive(Default)]
struct RecordingView {
    events: Vec<ViewEvent>,
}

impl RecordingView {
    fn messages(&self) -> Vec<&HistoryEntry> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Message(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    fn typing_events(&self) -> Vec<(String, bool)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Typing(user, visible) => Some((user.clone(), *visible)),
                _ => None,
            })
            .collect()
    }
}

impl ChatView for RecordingView {
    fn prompt_for_name(&mut self) -> String {
        String::new()
    }

    fn render_user_list(&mut self, users: &[String]) {
        self.events.push(ViewEvent::Users(users.to_vec()));
    }

    fn render_message(&mut self, entry: &HistoryEntry) {
        self.events.push(ViewEvent::Message(entry.clone()));
    }

    fn set_typing_indicator(&mut self, user: &str, visible: bool) {
        self.events.push(ViewEvent::Typing(user.to_owned(), visible));
    }

    fn evict_messages(&mut self, count: usize) {
        self.events.push(ViewEvent::Evicted(count));
    }

    fn show_display_name(&mut self, name: &str) {
        self.events.push(ViewEvent::DisplayName(name.to_owned()));
    }

    fn clear_input(&mut self) {
        self.events.push(ViewEvent::ClearInput);
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn active_session(name: &str, start: Instant) -> SessionController<RecordingView> {
    let mut session = SessionController::join(name, SessionSettings::default(), RecordingView::default());
    session.on_open();
    session.on_join_sent(start);
    session.drain_outbox().for_each(drop);
    session
}

fn outbox(session: &mut SessionController<RecordingView>) -> Vec<ClientEnvelope> {
    session.drain_outbox().collect()
}

fn typing(is_typing: bool) -> ClientEnvelope {
    ClientEnvelope::Typing { is_typing }
}

// =============================================================================
// NAME RESOLUTION
// =============================================================================

#[test]
fn trims_chosen_name() {
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(resolve_display_name("Alice ", &mut rng), "Alice");
    assert_eq!(resolve_display_name("  Bob\t", &mut rng), "Bob");
}

#[test]
fn blank_name_becomes_guest_in_range() {
    let mut rng = StdRng::seed_from_u64(7);
    for raw in ["", "   ", "\t\n"] {
        for _ in 0..200 {
            let name = resolve_display_name(raw, &mut rng);
            let suffix = name.strip_prefix("Guest_").expect("guest prefix");
            let n: u32 = suffix.parse().expect("numeric suffix");
            assert!(n <= 999, "{name} out of range");
        }
    }
}

#[test]
fn join_shows_resolved_name_and_starts_connecting() {
    let session = SessionController::join("Alice ", SessionSettings::default(), RecordingView::default());
    assert_eq!(session.local_name(), "Alice");
    assert_eq!(session.state(), ConnectionState::Connecting);
    assert_eq!(session.view().events, vec![ViewEvent::DisplayName("Alice".to_owned())]);
}

// =============================================================================
// HANDSHAKE
// =============================================================================

#[test]
fn open_queues_join_with_resolved_name() {
    let mut session = SessionController::join(" Alice", SessionSettings::default(), RecordingView::default());
    session.on_open();

    assert_eq!(session.state(), ConnectionState::Joining);
    assert_eq!(outbox(&mut session), vec![ClientEnvelope::Join { name: "Alice".to_owned() }]);
    assert!(!session.heartbeat_running());
}

#[test]
fn join_sent_activates_and_starts_heartbeat() {
    let start = Instant::now();
    let mut session = SessionController::join("Alice", SessionSettings::default(), RecordingView::default());
    session.on_open();
    session.on_join_sent(start);

    assert_eq!(session.state(), ConnectionState::Active);
    assert!(session.heartbeat_running());
    assert_eq!(session.next_deadline(), Some(start + ms(20_000)));
}

#[test]
fn open_twice_does_not_resend_join() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    session.on_open();
    assert!(outbox(&mut session).is_empty());
    assert_eq!(session.state(), ConnectionState::Active);
}

// =============================================================================
// INBOUND DISPATCH
// =============================================================================

#[test]
fn users_replace_list_and_render() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"users","list":["Alice","Bob"]}"#);
    session.on_text(r#"{"type":"users","list":["Carol"]}"#);

    assert_eq!(session.presence().users(), ["Carol".to_owned()]);
    assert!(session.view().events.contains(&ViewEvent::Users(vec!["Carol".to_owned()])));
    assert!(session.history().is_empty());
}

#[test]
fn chat_and_system_are_appended_in_order() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"system","text":"Bob joined"}"#);
    session.on_text(r#"{"type":"message","user":"Bob","text":"hi","timestamp":"10:00"}"#);

    let entries: Vec<&HistoryEntry> = session.history().iter().collect();
    assert_eq!(
        entries,
        vec![
            &HistoryEntry::system("Bob joined"),
            &HistoryEntry::Chat(ChatMessage {
                user: "Bob".to_owned(),
                text: "hi".to_owned(),
                timestamp: Some("10:00".to_owned()),
            }),
        ]
    );
    assert_eq!(session.view().messages().len(), 2);
}

#[test]
fn unknown_type_is_appended_as_chat() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"announcement","text":"maintenance at noon"}"#);

    let latest = session.history().latest().expect("entry");
    assert_eq!(latest.text(), "maintenance at noon");
    assert!(!latest.is_system());
}

#[test]
fn known_types_with_missing_fields_are_still_rendered() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"message","text":"hi"}"#);
    session.on_text(r#"{"type":"system"}"#);
    session.on_text(r#"{"type":"message","user":42,"text":"yo"}"#);

    assert_eq!(session.history().len(), 3);
    let texts: Vec<&str> = session.history().iter().map(HistoryEntry::text).collect();
    assert_eq!(texts, vec!["hi", "", "yo"]);
    assert_eq!(session.view().messages().len(), 3);
    assert!(session.history().iter().nth(1).is_some_and(HistoryEntry::is_system));
}

#[test]
fn malformed_frame_is_dropped_without_side_effects() {
    let mut session = active_session("Alice", Instant::now());
    let before = session.view().events.len();

    session.on_text("{not json");
    session.on_text(r#"{"type":"typing","isTyping":true}"#);
    session.on_text("42");

    assert_eq!(session.state(), ConnectionState::Active);
    assert!(session.history().is_empty());
    assert_eq!(session.view().events.len(), before);
    assert!(outbox(&mut session).is_empty());
}

#[test]
fn history_window_evicts_and_notifies_view() {
    let mut session = active_session("Alice", Instant::now());
    for n in 0..52 {
        session.on_text(&format!(r#"{{"type":"message","user":"Bob","text":"m{n}"}}"#));
    }

    assert_eq!(session.history().len(), 50);
    assert_eq!(session.history().iter().next().map(HistoryEntry::text), Some("m2"));
    let evictions: usize = session
        .view()
        .events
        .iter()
        .map(|event| match event {
            ViewEvent::Evicted(n) => *n,
            _ => 0,
        })
        .sum();
    assert_eq!(evictions, 2);
}

// =============================================================================
// REMOTE TYPING
// =============================================================================

#[test]
fn repeated_remote_typing_shows_one_indicator() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"typing","user":"Bob","isTyping":true}"#);
    session.on_text(r#"{"type":"typing","user":"Bob","isTyping":true}"#);

    assert_eq!(session.view().typing_events(), vec![("Bob".to_owned(), true)]);
    assert!(session.presence().is_typing("Bob"));
}

#[test]
fn remote_stop_removes_indicator_once() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"typing","user":"Bob","isTyping":true}"#);
    session.on_text(r#"{"type":"typing","user":"Bob","isTyping":false}"#);
    session.on_text(r#"{"type":"typing","user":"Bob","isTyping":false}"#);

    assert_eq!(
        session.view().typing_events(),
        vec![("Bob".to_owned(), true), ("Bob".to_owned(), false)]
    );
}

#[test]
fn self_typing_echo_is_ignored() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"typing","user":"Alice","isTyping":true}"#);
    session.on_text(r#"{"type":"typing","user":"Alice","isTyping":false}"#);

    assert!(session.view().typing_events().is_empty());
    assert!(!session.presence().is_typing("Alice"));
}

// =============================================================================
// SEND
// =============================================================================

#[test]
fn send_queues_message_then_stopped_typing() {
    let mut session = active_session("Alice", Instant::now());
    assert!(session.send("  hello  "));

    assert_eq!(
        outbox(&mut session),
        vec![ClientEnvelope::Message { text: "hello".to_owned() }, typing(false)]
    );
    assert_eq!(session.view().events.last(), Some(&ViewEvent::ClearInput));
}

#[test]
fn blank_send_is_suppressed() {
    let mut session = active_session("Alice", Instant::now());
    assert!(!session.send("   "));
    assert!(outbox(&mut session).is_empty());
    assert!(!session.view().events.contains(&ViewEvent::ClearInput));
}

#[test]
fn send_before_active_is_noop() {
    let mut session = SessionController::join("Alice", SessionSettings::default(), RecordingView::default());
    assert!(!session.send("hello"));
    session.on_open();
    assert!(!session.send("hello"));
    assert_eq!(outbox(&mut session), vec![ClientEnvelope::Join { name: "Alice".to_owned() }]);
}

#[test]
fn send_cancels_pending_typing_timer() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    session.input(start);
    session.input(start + ms(500));
    assert!(session.send("done"));
    assert_eq!(
        outbox(&mut session),
        vec![typing(true), ClientEnvelope::Message { text: "done".to_owned() }, typing(false)]
    );

    // Well past the old idle deadline: no second stop signal.
    assert_eq!(session.poll(start + ms(10_000)), Poll::Continue);
    let after: Vec<ClientEnvelope> = outbox(&mut session)
        .into_iter()
        .filter(|env| matches!(env, ClientEnvelope::Typing { .. }))
        .collect();
    assert!(after.is_empty());
}

// =============================================================================
// LOCAL TYPING
// =============================================================================

#[test]
fn typing_burst_emits_one_start_and_one_stop() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    for i in 0..10 {
        session.input(start + ms(i * 1_500));
        session.poll(start + ms(i * 1_500));
    }
    assert_eq!(outbox(&mut session), vec![typing(true)]);

    let last_input = start + ms(9 * 1_500);
    session.poll(last_input + ms(1_999));
    assert!(outbox(&mut session).is_empty());

    session.poll(last_input + ms(2_000));
    assert_eq!(outbox(&mut session), vec![typing(false)]);

    session.poll(last_input + ms(9_000));
    assert!(!outbox(&mut session).contains(&typing(false)));
}

#[test]
fn input_ignored_unless_active() {
    let start = Instant::now();
    let mut session = SessionController::join("Alice", SessionSettings::default(), RecordingView::default());
    session.input(start);
    session.on_open();
    session.input(start);
    assert_eq!(outbox(&mut session), vec![ClientEnvelope::Join { name: "Alice".to_owned() }]);
}

#[test]
fn every_keystroke_mode_repeats_typing_true() {
    let start = Instant::now();
    let settings = SessionSettings {
        typing_emission: crate::typing::TypingEmission::EveryKeystroke,
        ..SessionSettings::default()
    };
    let mut session = SessionController::join("Alice", settings, RecordingView::default());
    session.on_open();
    session.on_join_sent(start);
    session.drain_outbox().for_each(drop);

    session.input(start);
    session.input(start + ms(100));
    assert_eq!(outbox(&mut session), vec![typing(true), typing(true)]);
}

// =============================================================================
// HEARTBEAT
// =============================================================================

#[test]
fn heartbeat_pings_every_period_while_active() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);

    session.poll(start + ms(19_999));
    assert!(outbox(&mut session).is_empty());
    session.poll(start + ms(20_000));
    assert_eq!(outbox(&mut session), vec![ClientEnvelope::Ping]);
    session.poll(start + ms(40_000));
    assert_eq!(outbox(&mut session), vec![ClientEnvelope::Ping]);
}

// =============================================================================
// CONNECTION LOSS
// =============================================================================

#[test]
fn close_appends_one_notice_and_schedules_restart() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    let lost_at = start + ms(5_000);

    session.on_close(lost_at);
    session.on_close(lost_at + ms(10));

    assert_eq!(session.state(), ConnectionState::Lost);
    let notices: Vec<&HistoryEntry> = session.history().iter().filter(|e| e.is_system()).collect();
    assert_eq!(notices, vec![&HistoryEntry::system("Connection lost. Refreshing in 3s...")]);
    assert_eq!(session.restart_deadline(), Some(lost_at + ms(3_000)));
}

#[test]
fn close_stops_heartbeat_and_typing() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    session.input(start);
    session.drain_outbox().for_each(drop);

    session.on_close(start + ms(100));
    assert!(!session.heartbeat_running());
    assert_eq!(session.next_deadline(), Some(start + ms(3_100)));

    assert_eq!(session.poll(start + ms(60_000)), Poll::Restart);
    assert!(outbox(&mut session).is_empty());
}

#[test]
fn restart_fires_exactly_at_delay_and_only_once() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    session.on_close(start);

    assert_eq!(session.poll(start + ms(2_999)), Poll::Continue);
    assert_eq!(session.poll(start + ms(3_000)), Poll::Restart);
    assert_eq!(session.poll(start + ms(6_000)), Poll::Continue);
    assert_eq!(session.next_deadline(), None);
}

#[test]
fn close_while_connecting_still_schedules_restart() {
    let start = Instant::now();
    let mut session = SessionController::join("Alice", SessionSettings::default(), RecordingView::default());
    session.on_close(start);

    assert_eq!(session.state(), ConnectionState::Lost);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.restart_deadline(), Some(start + ms(3_000)));
}

#[test]
fn actions_after_loss_send_nothing() {
    let start = Instant::now();
    let mut session = active_session("Alice", start);
    session.on_close(start);

    assert!(!session.send("hello"));
    session.input(start + ms(10));
    assert!(outbox(&mut session).is_empty());
}

#[test]
fn sub_second_restart_delay_is_reported_in_millis() {
    let start = Instant::now();
    let settings = SessionSettings {
        restart_delay: ms(250),
        ..SessionSettings::default()
    };
    let mut session = SessionController::join("Alice", settings, RecordingView::default());
    session.on_close(start);
    assert_eq!(
        session.history().latest().map(HistoryEntry::text),
        Some("Connection lost. Refreshing in 250ms...")
    );
}

#[test]
fn into_view_returns_recorded_events() {
    let mut session = active_session("Alice", Instant::now());
    session.on_text(r#"{"type":"system","text":"welcome"}"#);
    let view = session.into_view();
    assert_eq!(view.messages(), vec![&HistoryEntry::system("welcome")]);
}
