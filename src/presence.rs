//! Connected-user list and remote typing indicators.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Presence {
    users: Vec<String>,
    typing: BTreeSet<String>,
}

impl Presence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the user list wholesale; the server always sends the full set.
    pub fn replace_users(&mut self, list: Vec<String>) {
        self.users = list;
    }

    #[must_use]
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Apply a remote typing edge.
    ///
    /// Returns `Some(visible)` when an indicator was created or removed and
    /// `None` for redundant signals.
    pub fn set_typing(&mut self, user: &str, is_typing: bool) -> Option<bool> {
        let changed = if is_typing {
            self.typing.insert(user.to_owned())
        } else {
            self.typing.remove(user)
        };
        changed.then_some(is_typing)
    }

    #[must_use]
    pub fn is_typing(&self, user: &str) -> bool {
        self.typing.contains(user)
    }

    pub fn typing_users(&self) -> impl Iterator<Item = &str> {
        self.typing.iter().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
