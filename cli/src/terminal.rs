//! Line-oriented terminal view and raw-mode key reader.
//!
//! Messages scroll above a single prompt line. The prompt line is shared
//! between the view (which prints messages and typing indicators) and the
//! key reader thread (which edits the input buffer), so both redraw it from
//! the same [`PromptLine`].

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use chatroom::{ChatView, Command, HistoryEntry};
use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use tokio::sync::mpsc;
use tracing::warn;

// =============================================================================
// RAW MODE
// =============================================================================

/// Enables raw mode for its lifetime.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "terminal: failed to restore cooked mode");
        }
    }
}

// =============================================================================
// PROMPT LINE
// =============================================================================

#[derive(Debug, Default)]
pub struct PromptLine {
    input: String,
    typing: BTreeSet<String>,
}

pub type SharedPrompt = Arc<Mutex<PromptLine>>;

impl PromptLine {
    /// "Bob is typing..." / "Bob, Carol are typing...", or nothing.
    fn status(&self) -> Option<String> {
        match self.typing.len() {
            0 => None,
            1 => self.typing.iter().next().map(|user| format!("{user} is typing...")),
            _ => {
                let users: Vec<&str> = self.typing.iter().map(String::as_str).collect();
                Some(format!("{} are typing...", users.join(", ")))
            }
        }
    }

    fn draw(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        if let Some(status) = self.status() {
            queue!(out, Print(format!("({status}) ")))?;
        }
        queue!(out, Print("> "), Print(&self.input))?;
        out.flush()
    }
}

fn lock(prompt: &SharedPrompt) -> MutexGuard<'_, PromptLine> {
    prompt.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply one key press to the input buffer.
fn apply_key(line: &mut PromptLine, key: KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c' | 'd')).then_some(Command::Quit);
    }
    match key.code {
        KeyCode::Char(c) => {
            line.input.push(c);
            Some(Command::Input)
        }
        KeyCode::Backspace => line.input.pop().map(|_| Command::Input),
        KeyCode::Enter => Some(Command::Send(line.input.clone())),
        KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Read keys on a dedicated thread and forward them as commands.
///
/// The thread exits after forwarding `Quit` or when the receiver is gone.
pub fn spawn_key_reader(prompt: SharedPrompt, commands: mpsc::UnboundedSender<Command>) {
    thread::spawn(move || {
        loop {
            let event = match event::read() {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "terminal: key read failed");
                    if commands.send(Command::Quit).is_err() {
                        warn!("terminal: client already stopped");
                    }
                    return;
                }
            };
            let Event::Key(key) = event else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let command = {
                let mut line = lock(&prompt);
                let command = apply_key(&mut line, key);
                if let Err(e) = line.draw(&mut io::stdout()) {
                    warn!(error = %e, "terminal: redraw failed");
                }
                command
            };

            if let Some(command) = command {
                let quit = command == Command::Quit;
                if commands.send(command).is_err() || quit {
                    return;
                }
            }
        }
    });
}

// =============================================================================
// VIEW
// =============================================================================

pub struct TerminalView {
    /// Name entered at startup; offered again on every restart.
    remembered_name: String,
    prompt: SharedPrompt,
}

impl TerminalView {
    pub fn new(remembered_name: String, prompt: SharedPrompt) -> Self {
        Self { remembered_name, prompt }
    }

    fn print_line(&self, text: &str) {
        let line = lock(&self.prompt);
        let mut out = io::stdout();
        let result = queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(text),
            Print("\r\n")
        )
        .and_then(|()| line.draw(&mut out));
        if let Err(e) = result {
            warn!(error = %e, "terminal: write failed");
        }
    }

    fn redraw(&self) {
        if let Err(e) = lock(&self.prompt).draw(&mut io::stdout()) {
            warn!(error = %e, "terminal: redraw failed");
        }
    }
}

fn format_entry(entry: &HistoryEntry) -> String {
    match entry {
        HistoryEntry::Chat(msg) => format!("[{}] {}: {}", msg.display_timestamp(), msg.user, msg.text),
        HistoryEntry::System { text } => format!("*** {text}"),
    }
}

impl ChatView for TerminalView {
    fn prompt_for_name(&mut self) -> String {
        self.remembered_name.clone()
    }

    fn show_display_name(&mut self, name: &str) {
        self.print_line(&format!("*** You are {name}"));
    }

    fn render_user_list(&mut self, users: &[String]) {
        self.print_line(&format!("*** Online ({}): {}", users.len(), users.join(", ")));
    }

    fn render_message(&mut self, entry: &HistoryEntry) {
        self.print_line(&format_entry(entry));
    }

    fn set_typing_indicator(&mut self, user: &str, visible: bool) {
        {
            let mut line = lock(&self.prompt);
            if visible {
                line.typing.insert(user.to_owned());
            } else {
                line.typing.remove(user);
            }
        }
        self.redraw();
    }

    fn clear_input(&mut self) {
        lock(&self.prompt).input.clear();
        self.redraw();
    }
}

#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;
