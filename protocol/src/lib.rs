//! Shared event model and text packet codec for the chat socket.
//!
//! This crate owns the wire representation spoken between the browser client
//! and the chat server. Events ride on Socket.IO `EVENT` packets wrapped in
//! Engine.IO v4 `message` packets, so a chat message on the wire looks like
//! `42["new message","hello"]`. Only text packets are supported; the chat
//! protocol never sends binary attachments.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`decode_packet`] and [`ServerEvent::from_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The packet had no type byte at all.
    #[error("empty packet")]
    Empty,
    /// The leading Engine.IO type byte is not a known packet type.
    #[error("unknown engine packet type: {0:?}")]
    UnknownEnginePacket(char),
    /// The Socket.IO type byte inside a `message` packet is not known.
    #[error("unknown socket packet type: {0:?}")]
    UnknownSocketPacket(char),
    /// Packet type is valid but not handled by this client (binary, acks).
    #[error("unsupported packet: {0}")]
    Unsupported(&'static str),
    /// The JSON body could not be parsed.
    #[error("invalid packet JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// An `EVENT` body was not a non-empty array starting with a string name.
    #[error("malformed event body")]
    MalformedEvent,
    /// The event name is not part of the chat protocol.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// The event name is known but its payload has the wrong shape.
    #[error("invalid payload for {event}: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Events the client emits to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// Announce the local username; sent at login and after every reconnect.
    AddUser(String),
    /// Broadcast an already-escaped chat message.
    NewMessage(String),
    /// The local user started typing.
    Typing,
    /// The local user stopped typing.
    StopTyping,
}

impl ClientEvent {
    /// Event name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddUser(_) => "add user",
            Self::NewMessage(_) => "new message",
            Self::Typing => "typing",
            Self::StopTyping => "stop typing",
        }
    }

    /// Positional event arguments following the name.
    #[must_use]
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::AddUser(text) | Self::NewMessage(text) => vec![Value::String(text.clone())],
            Self::Typing | Self::StopTyping => Vec::new(),
        }
    }
}

/// Payload of the server `login` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    /// Participants currently in the room, including the local user.
    pub num_users: u32,
}

/// Payload of a broadcast chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub username: String,
    pub message: String,
}

/// Payload of `user joined` / `user left`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub username: String,
    pub num_users: u32,
}

/// Payload of `typing` / `stop typing`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub username: String,
}

/// Events delivered to the client.
///
/// The last three variants describe the connection itself and are raised by
/// the socket loop rather than decoded from the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Login(LoginPayload),
    NewMessage(ChatPayload),
    UserJoined(PresencePayload),
    UserLeft(PresencePayload),
    Typing(TypingPayload),
    StopTyping(TypingPayload),
    Disconnect,
    Reconnect,
    ReconnectError,
}

impl ServerEvent {
    /// Decode a wire event from its name and positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownEvent`] for names outside the chat
    /// protocol and [`CodecError::InvalidPayload`] when the first argument
    /// does not match the event's payload shape.
    pub fn from_event(name: &str, args: &[Value]) -> Result<Self, CodecError> {
        match name {
            "login" => payload(name, args).map(Self::Login),
            "new message" => payload(name, args).map(Self::NewMessage),
            "user joined" => payload(name, args).map(Self::UserJoined),
            "user left" => payload(name, args).map(Self::UserLeft),
            "typing" => payload(name, args).map(Self::Typing),
            "stop typing" => payload(name, args).map(Self::StopTyping),
            other => Err(CodecError::UnknownEvent(other.to_owned())),
        }
    }

    /// Event name used for logging and dispatch.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::NewMessage(_) => "new message",
            Self::UserJoined(_) => "user joined",
            Self::UserLeft(_) => "user left",
            Self::Typing(_) => "typing",
            Self::StopTyping(_) => "stop typing",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
            Self::ReconnectError => "reconnect_error",
        }
    }
}

fn payload<T: DeserializeOwned>(name: &str, args: &[Value]) -> Result<T, CodecError> {
    let first = args.first().cloned().unwrap_or(Value::Null);
    serde_json::from_value(first).map_err(|source| CodecError::InvalidPayload {
        event: name.to_owned(),
        source,
    })
}

/// Engine.IO `open` handshake body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

/// A single text packet on the socket.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Engine.IO `open` with the session handshake.
    Open(Handshake),
    /// Engine.IO `close`.
    Close,
    /// Engine.IO heartbeat sent by the server.
    Ping,
    /// Engine.IO heartbeat reply.
    Pong,
    /// Engine.IO `noop` (also used for `upgrade`, which this client never requests).
    Noop,
    /// Socket.IO `CONNECT` to the default namespace.
    Connect(Option<Value>),
    /// Socket.IO `DISCONNECT`.
    Disconnect,
    /// Socket.IO `EVENT`.
    Event { name: String, args: Vec<Value> },
    /// Socket.IO `CONNECT_ERROR`.
    ConnectError(Value),
}

/// Encode a packet into its text form.
#[must_use]
pub fn encode_packet(packet: &Packet) -> String {
    match packet {
        Packet::Open(handshake) => {
            let body = serde_json::json!({
                "sid": handshake.sid,
                "pingInterval": handshake.ping_interval,
                "pingTimeout": handshake.ping_timeout,
            });
            format!("0{body}")
        }
        Packet::Close => "1".to_owned(),
        Packet::Ping => "2".to_owned(),
        Packet::Pong => "3".to_owned(),
        Packet::Noop => "6".to_owned(),
        Packet::Connect(None) => "40".to_owned(),
        Packet::Connect(Some(body)) => format!("40{body}"),
        Packet::Disconnect => "41".to_owned(),
        Packet::Event { name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            format!("42{}", Value::Array(items))
        }
        Packet::ConnectError(body) => format!("44{body}"),
    }
}

/// Encode an outbound chat event as a Socket.IO `EVENT` packet.
#[must_use]
pub fn encode_client_event(event: &ClientEvent) -> String {
    encode_packet(&Packet::Event { name: event.name().to_owned(), args: event.args() })
}

/// Decode one text packet.
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first structural problem found.
pub fn decode_packet(raw: &str) -> Result<Packet, CodecError> {
    let mut chars = raw.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        '5' | '6' => Ok(Packet::Noop),
        other => Err(CodecError::UnknownEnginePacket(other)),
    }
}

fn decode_socket_packet(raw: &str) -> Result<Packet, CodecError> {
    let mut chars = raw.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let body = strip_ack_id(strip_namespace(chars.as_str()));
    match kind {
        '0' if body.is_empty() => Ok(Packet::Connect(None)),
        '0' => Ok(Packet::Connect(Some(serde_json::from_str(body)?))),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body),
        '3' => Err(CodecError::Unsupported("ack")),
        '4' => Ok(Packet::ConnectError(serde_json::from_str(body)?)),
        '5' | '6' => Err(CodecError::Unsupported("binary")),
        other => Err(CodecError::UnknownSocketPacket(other)),
    }
}

fn strip_namespace(body: &str) -> &str {
    if !body.starts_with('/') {
        return body;
    }
    body.split_once(',').map_or("", |(_, rest)| rest)
}

fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> Result<Packet, CodecError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut items) = value else {
        return Err(CodecError::MalformedEvent);
    };
    if items.is_empty() {
        return Err(CodecError::MalformedEvent);
    }
    let Value::String(name) = items.remove(0) else {
        return Err(CodecError::MalformedEvent);
    };
    Ok(Packet::Event { name, args: items })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
