//! Terminal-agnostic core of the chat room client.
//!
//! A session joins a single shared chat room over a WebSocket, keeps a
//! bounded message history and the online user list, tells the room when the
//! local user is typing, heartbeats to keep the connection alive, and starts
//! over from scratch a few seconds after the connection drops.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Sans-IO [`session::SessionController`]: lifecycle, dispatch, outbox |
//! | [`client`] | tokio-tungstenite driver that runs sessions back to back |
//! | [`typing`] | Typing debouncer (edge or every-keystroke emission) |
//! | [`heartbeat`] | Fixed-period ping scheduler |
//! | [`history`] | Bounded message history |
//! | [`presence`] | Online users and remote typing indicators |
//! | [`timer`] | Single-slot deadline used by every timer above |
//! | [`view`] | [`view::ChatView`] rendering boundary |
//! | [`config`] | Environment-driven configuration |
//!
//! Wire envelopes live in the `envelope` crate.

pub mod client;
pub mod config;
pub mod heartbeat;
pub mod history;
pub mod presence;
pub mod session;
pub mod timer;
pub mod typing;
pub mod view;

pub use client::{ChatClient, ClientError, Command};
pub use config::{ClientConfig, ConfigError, SessionSettings};
pub use history::{ChatMessage, HistoryEntry};
pub use session::{ConnectionState, SessionController};
pub use typing::TypingEmission;
pub use view::ChatView;
