//! Wire envelope model and JSON codec for the chat transport.
//!
//! This crate owns the wire representation shared by the session core and
//! anything that talks to the chat server. Every WebSocket text frame carries
//! exactly one JSON object tagged by its `type` field.
//!
//! Outbound and inbound envelopes are modelled as separate enums because the
//! two directions carry different fields for the same tag (`message` goes out
//! as `{text}` and comes back as `{user, text, timestamp?}`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Error returned by [`decode_server`] and [`decode_client`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame text is not valid JSON.
    #[error("failed to parse envelope json: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame is valid JSON but not an object.
    #[error("envelope is not a json object")]
    NotAnObject,
    /// A recognised envelope type carried missing or mistyped fields.
    #[error("invalid {kind} envelope: {source}")]
    InvalidPayload {
        kind: EnvelopeKind,
        #[source]
        source: serde_json::Error,
    },
}

/// The `type` tag of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Join,
    Message,
    System,
    Typing,
    Users,
    Ping,
}

impl EnvelopeKind {
    /// Wire spelling of the tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Message => "message",
            Self::System => "system",
            Self::Typing => "typing",
            Self::Users => "users",
            Self::Ping => "ping",
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// An envelope sent from the client to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEnvelope {
    /// Announce the display name for this connection.
    Join { name: String },
    /// Post a chat line.
    Message { text: String },
    /// Local typing state edge.
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    /// Liveness signal.
    Ping,
}

impl ClientEnvelope {
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Join { .. } => EnvelopeKind::Join,
            Self::Message { .. } => EnvelopeKind::Message,
            Self::Typing { .. } => EnvelopeKind::Typing,
            Self::Ping => EnvelopeKind::Ping,
        }
    }
}

/// Encode an outbound envelope as a JSON text frame.
#[must_use]
pub fn encode_client(envelope: &ClientEnvelope) -> String {
    // Serializing a derive-only enum of strings and bools cannot fail.
    serde_json::to_string(envelope).unwrap_or_default()
}

/// Decode a client envelope, as a server or test peer would.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text or an unknown tag.
pub fn decode_client(text: &str) -> Result<ClientEnvelope, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// INBOUND
// =============================================================================

/// A chat line broadcast by the server.
///
/// Missing or non-string `user`/`text` decode as text rather than failing;
/// the line is still shown with whatever the server sent.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatPayload {
    #[serde(default, deserialize_with = "lenient_text")]
    pub user: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
}

/// A server notice.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SystemPayload {
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
}

/// A remote user's typing edge.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TypingPayload {
    pub user: String,
    #[serde(rename = "isTyping")]
    pub is_typing: bool,
}

/// Full replacement of the connected user list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UsersPayload {
    pub list: Vec<String>,
}

/// An envelope whose `type` is missing or not one the client dispatches on.
///
/// Such frames are still shown in the history, so whatever displayable
/// fields they carry are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OtherPayload {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
}

/// An envelope received from the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEnvelope {
    Message(ChatPayload),
    System(SystemPayload),
    Typing(TypingPayload),
    Users(UsersPayload),
    Other(OtherPayload),
}

impl ServerEnvelope {
    /// Wire tag for logging; unrecognised tags are reported verbatim.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Message(_) => EnvelopeKind::Message.as_str(),
            Self::System(_) => EnvelopeKind::System.as_str(),
            Self::Typing(_) => EnvelopeKind::Typing.as_str(),
            Self::Users(_) => EnvelopeKind::Users.as_str(),
            Self::Other(other) => other.kind.as_deref().unwrap_or("<untagged>"),
        }
    }
}

/// Decode one inbound text frame.
///
/// `message` and `system` decode leniently so every displayable frame
/// reaches the history. `typing` and `users` drive state and must carry
/// their fields. Anything else becomes [`ServerEnvelope::Other`].
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text, [`CodecError::NotAnObject`]
/// for non-object JSON and [`CodecError::InvalidPayload`] when a `typing` or
/// `users` envelope has missing or mistyped fields.
pub fn decode_server(text: &str) -> Result<ServerEnvelope, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }

    let kind = match value.get("type").and_then(Value::as_str) {
        Some("message") => Some(EnvelopeKind::Message),
        Some("system") => Some(EnvelopeKind::System),
        Some("typing") => Some(EnvelopeKind::Typing),
        Some("users") => Some(EnvelopeKind::Users),
        _ => None,
    };

    match kind {
        Some(EnvelopeKind::Message) => payload(EnvelopeKind::Message, value).map(ServerEnvelope::Message),
        Some(EnvelopeKind::System) => payload(EnvelopeKind::System, value).map(ServerEnvelope::System),
        Some(EnvelopeKind::Typing) => payload(EnvelopeKind::Typing, value).map(ServerEnvelope::Typing),
        Some(EnvelopeKind::Users) => payload(EnvelopeKind::Users, value).map(ServerEnvelope::Users),
        _ => Ok(ServerEnvelope::Other(serde_json::from_value(value)?)),
    }
}

fn payload<T>(kind: EnvelopeKind, value: Value) -> Result<T, CodecError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value).map_err(|source| CodecError::InvalidPayload { kind, source })
}

/// Accept string or numeric timestamps; anything else counts as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// [`lenient_string`], with an absent value read as empty text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(Option::unwrap_or_default)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
