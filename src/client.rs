//! WebSocket driver for a [`SessionController`].
//!
//! The driver owns the socket. Per session it runs one `select!` loop over
//! three event sources:
//! - inbound WS frames -> `on_text` / `on_close`
//! - user commands     -> `input` / `send` / quit
//! - next timer        -> `poll`
//!
//! After every event the controller's outbox is flushed onto the socket.
//!
//! RESTART
//! =======
//! Losing the connection (or failing to connect at all) is never returned as
//! an error. The controller posts its notice and arms a fixed-delay restart;
//! when that fires the driver drops the controller and starts over with a
//! fresh session, a fresh connection and a new `join`. There is no backoff
//! and no retry cap.

use std::time::Instant;

use envelope::ClientEnvelope;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::{CHAT_PATH, ClientConfig};
use crate::session::{ConnectionState, Poll, SessionController};
use crate::view::ChatView;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The base URL could not be converted to a WebSocket URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// The WebSocket connection or handshake failed.
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    /// Writing a frame to the socket failed.
    #[error("websocket send failed: {0}")]
    WsSend(Box<tokio_tungstenite::tungstenite::Error>),
}

/// User intent forwarded from the input collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Input activity in the message box (a keystroke or edit).
    Input,
    /// Submit the message box contents.
    Send(String),
    /// Close the connection and stop the client.
    Quit,
}

enum Outcome {
    Restart,
    Quit,
}

pub struct ChatClient<V> {
    config: ClientConfig,
    view: V,
}

impl<V: ChatView> ChatClient<V> {
    pub fn new(config: ClientConfig, view: V) -> Self {
        Self { config, view }
    }

    /// Run sessions back to back until `Quit` arrives or the command channel
    /// closes. Returns the view.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if the configured base URL has
    /// an unsupported scheme. Transport failures restart the session instead.
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<V, ClientError> {
        let Self { config, mut view } = self;
        let url = ws_url(&config.base_url)?;
        let mut sessions = 0_u64;

        loop {
            let raw_name = match &config.name {
                Some(name) => name.clone(),
                None => view.prompt_for_name(),
            };
            sessions += 1;
            info!(%url, session = sessions, "client: starting session");

            let mut session = SessionController::join(&raw_name, config.session, view);
            let outcome = drive_session(&url, &mut session, &mut commands).await;
            view = session.into_view();

            match outcome {
                Outcome::Quit => {
                    info!(session = sessions, "client: quit");
                    return Ok(view);
                }
                Outcome::Restart => info!(session = sessions, "client: reinitializing"),
            }
        }
    }
}

/// Open the chat WebSocket.
///
/// # Errors
///
/// Returns [`ClientError::WsConnect`] if the TCP connect or WS handshake fails.
pub async fn connect(url: &str) -> Result<WsStream, ClientError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| ClientError::WsConnect(Box::new(e)))?;
    Ok(stream)
}

/// Convert a base URL into the chat endpoint URL.
///
/// # Errors
///
/// Returns [`ClientError::InvalidBaseUrl`] unless the scheme is `http`,
/// `https`, `ws` or `wss`.
pub fn ws_url(base_url: &str) -> Result<String, ClientError> {
    let trimmed = base_url.trim().trim_end_matches('/');

    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{CHAT_PATH}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{CHAT_PATH}"));
    }
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(format!("{trimmed}{CHAT_PATH}"));
    }

    Err(ClientError::InvalidBaseUrl(base_url.to_owned()))
}

async fn drive_session<V: ChatView>(
    url: &str,
    session: &mut SessionController<V>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Outcome {
    match connect(url).await {
        Ok(stream) => {
            info!(%url, name = session.local_name(), "ws: connected");
            session.on_open();
            if let Some(outcome) = run_connection(stream, session, commands).await {
                return outcome;
            }
        }
        Err(e) => {
            warn!(%url, error = %e, "ws: connect failed");
            session.on_close(Instant::now());
        }
    }

    wait_for_restart(session, commands).await
}

/// Pump one live connection. Returns `None` when the connection is lost.
async fn run_connection<V: ChatView>(
    mut stream: WsStream,
    session: &mut SessionController<V>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<Outcome> {
    loop {
        if let Err(e) = flush_outbox(&mut stream, session).await {
            warn!(error = %e, "ws: send failed");
            session.on_close(Instant::now());
            return None;
        }
        if session.state() == ConnectionState::Joining {
            session.on_join_sent(Instant::now());
            continue;
        }

        let deadline = session.next_deadline();
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => session.on_text(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "ws: closed by server");
                        session.on_close(Instant::now());
                        return None;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "ws: recv error");
                        session.on_close(Instant::now());
                        return None;
                    }
                    None => {
                        info!("ws: stream ended");
                        session.on_close(Instant::now());
                        return None;
                    }
                }
            }
            cmd = commands.recv() => {
                if apply_command(session, cmd) {
                    if let Err(e) = stream.close(None).await {
                        debug!(error = %e, "ws: close handshake failed");
                    }
                    return Some(Outcome::Quit);
                }
            }
            () = sleep_until(deadline) => {
                if session.poll(Instant::now()) == Poll::Restart {
                    return Some(Outcome::Restart);
                }
            }
        }
    }
}

/// Idle in `Lost` until the restart deadline fires or the user quits.
async fn wait_for_restart<V: ChatView>(
    session: &mut SessionController<V>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Outcome {
    loop {
        let deadline = session.next_deadline();
        tokio::select! {
            cmd = commands.recv() => {
                if apply_command(session, cmd) {
                    return Outcome::Quit;
                }
            }
            () = sleep_until(deadline) => {
                if session.poll(Instant::now()) == Poll::Restart {
                    return Outcome::Restart;
                }
            }
        }
    }
}

/// Feed a command to the session. Returns `true` when the client should quit.
fn apply_command<V: ChatView>(session: &mut SessionController<V>, cmd: Option<Command>) -> bool {
    match cmd {
        Some(Command::Input) => {
            session.input(Instant::now());
            false
        }
        Some(Command::Send(text)) => {
            if !session.send(&text) {
                debug!(state = ?session.state(), "client: send suppressed");
            }
            false
        }
        Some(Command::Quit) | None => true,
    }
}

async fn flush_outbox<V: ChatView>(
    stream: &mut WsStream,
    session: &mut SessionController<V>,
) -> Result<(), ClientError> {
    let pending: Vec<ClientEnvelope> = session.drain_outbox().collect();
    for outgoing in pending {
        debug!(kind = %outgoing.kind(), "ws: send envelope");
        stream
            .send(Message::Text(envelope::encode_client(&outgoing).into()))
            .await
            .map_err(|e| ClientError::WsSend(Box::new(e)))?;
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
