//! Rendering boundary between the session core and whatever displays it.
//!
//! The core never draws anything itself. Implementations are expected to
//! keep the newest message in view after every `render_message`.

use crate::history::HistoryEntry;

pub trait ChatView {
    /// Ask the user for a display name. May return an empty string.
    fn prompt_for_name(&mut self) -> String;

    fn render_user_list(&mut self, users: &[String]);

    fn render_message(&mut self, entry: &HistoryEntry);

    /// Show or hide the "<user> is typing..." indicator for a remote user.
    fn set_typing_indicator(&mut self, user: &str, visible: bool);

    /// The oldest `count` rendered messages fell out of the history window.
    fn evict_messages(&mut self, _count: usize) {}

    fn show_display_name(&mut self, _name: &str) {}

    /// The pending message was sent; reset the input line.
    fn clear_input(&mut self) {}
}
