//! Push-channel frames emitted by the marketplace server.
//!
//! The server pushes over Socket.IO. Each WebSocket text frame carries one
//! Engine.IO packet whose first character is the packet type; Socket.IO
//! packets ride inside Engine.IO `message` packets (`4`). The frames this
//! client deals with:
//!
//! | frame                      | meaning                                  |
//! |----------------------------|------------------------------------------|
//! | `0{"sid":..,"pingInterval":..}` | transport open handshake            |
//! | `2` / `3`                  | ping from the server / our pong          |
//! | `40` / `40{"sid":..}`      | join the default namespace / joined      |
//! | `42["vote_update",{..}]`   | a named event with one payload           |
//! | `41`, `1`                  | namespace or transport closed            |

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Meme, MemeId};

/// Reply to an Engine.IO ping.
pub const PONG_FRAME: &str = "3";
/// Request to join the default Socket.IO namespace.
pub const CONNECT_FRAME: &str = "40";

/// Silence tolerated before the server has told us its ping schedule
/// (the Socket.IO defaults, 25 s interval plus 20 s timeout).
pub const DEFAULT_LIVENESS: Duration = Duration::from_millis(45_000);

/// Body of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for our pong.
    #[serde(default)]
    pub ping_timeout: u64,
}

impl OpenHandshake {
    /// How long the connection may stay silent before it is presumed dead.
    pub fn liveness(&self) -> Duration {
        if self.ping_interval == 0 {
            return DEFAULT_LIVENESS;
        }
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// One decoded push-channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenHandshake),
    /// Transport closed by the server.
    Close,
    Ping,
    Pong,
    Noop,
    /// The server accepted our namespace join.
    Connect,
    /// The server dropped us from the namespace.
    Disconnect,
    Event { name: String, payload: Value },
    /// The server refused the namespace join.
    ConnectError(String),
    /// Acks, binary attachments and transport upgrades; unused here.
    Ignored,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("event frame is not [name, payload]")]
    MalformedEvent,
    #[error("frame is not an event")]
    NotAnEvent,
    #[error("invalid frame payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authoritative upvote count for one meme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteUpdate {
    #[serde(alias = "id")]
    pub meme_id: MemeId,
    #[serde(deserialize_with = "crate::models::non_negative_count")]
    pub upvotes: u64,
}

/// A bid as accepted by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidUpdate {
    #[serde(alias = "id")]
    pub meme_id: MemeId,
    pub credits: u64,
    #[serde(rename = "user_id", alias = "bidder_id")]
    pub bidder_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    #[serde(rename = "meme_created", alias = "created")]
    Created(Meme),
    #[serde(rename = "vote_update")]
    VoteUpdate(VoteUpdate),
    #[serde(rename = "bid_update")]
    BidUpdate(BidUpdate),
}

/// Subscription key for push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    VoteUpdate,
    BidUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Created, EventKind::VoteUpdate, EventKind::BidUpdate];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Created => "meme_created",
            EventKind::VoteUpdate => "vote_update",
            EventKind::BidUpdate => "bid_update",
        })
    }
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::Created(_) => EventKind::Created,
            PushEvent::VoteUpdate(_) => EventKind::VoteUpdate,
            PushEvent::BidUpdate(_) => EventKind::BidUpdate,
        }
    }

    pub fn meme_id(&self) -> &MemeId {
        match self {
            PushEvent::Created(meme) => &meme.id,
            PushEvent::VoteUpdate(update) => &update.meme_id,
            PushEvent::BidUpdate(update) => &update.meme_id,
        }
    }
}

impl PushEvent {
    /// Build an event from a Socket.IO event name and its first argument.
    ///
    /// Unknown names and payloads without a meme id are errors.
    pub fn from_named(name: &str, payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "type": name, "data": payload }))
    }

    /// The `42[...]` frame a server emits for this event.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        Ok(format!("42{}", serde_json::json!([value["type"], value["data"]])))
    }
}

/// Decode one text frame.
pub fn decode_packet(text: &str) -> Result<Packet, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = chars.as_str();
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(body)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(body),
        '5' => Ok(Packet::Ignored),
        '6' => Ok(Packet::Noop),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_socket_packet(text: &str) -> Result<Packet, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = strip_namespace_and_ack(chars.as_str());
    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let mut args = serde_json::from_str::<Vec<Value>>(body)?.into_iter();
            let Some(Value::String(name)) = args.next() else {
                return Err(FrameError::MalformedEvent);
            };
            let payload = args.next().unwrap_or(Value::Null);
            Ok(Packet::Event { name, payload })
        }
        '3' | '5' | '6' => Ok(Packet::Ignored),
        '4' => {
            let reason = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            Ok(Packet::ConnectError(reason))
        }
        other => Err(FrameError::UnknownType(other)),
    }
}

/// `/ns,12[...]` and `12[...]` both become `[...]`.
fn strip_namespace_and_ack(body: &str) -> &str {
    let body = match body.strip_prefix('/') {
        Some(namespaced) => namespaced.split_once(',').map_or("", |(_, rest)| rest),
        None => body,
    };
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Decode a frame that must be a marketplace event.
pub fn decode_event_frame(text: &str) -> Result<PushEvent, FrameError> {
    match decode_packet(text)? {
        Packet::Event { name, payload } => Ok(PushEvent::from_named(&name, payload)?),
        _ => Err(FrameError::NotAnEvent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_server_event_names() {
        let frame = r#"42["bid_update",{"meme_id":"m1","credits":50,"user_id":"alice"}]"#;
        assert_eq!(
            decode_event_frame(frame).unwrap(),
            PushEvent::BidUpdate(BidUpdate {
                meme_id: MemeId::new("m1").unwrap(),
                credits: 50,
                bidder_id: "alice".into(),
            })
        );
    }

    #[test]
    fn accepts_short_aliases_and_numeric_ids() {
        let created = decode_event_frame(r#"42["created",{"id":1,"title":"Doge","upvotes":0}]"#).unwrap();
        assert_eq!(created.kind(), EventKind::Created);
        assert_eq!(created.meme_id().as_str(), "1");

        let vote = decode_event_frame(r#"42["vote_update",{"id":7,"upvotes":-2}]"#).unwrap();
        assert_eq!(
            vote,
            PushEvent::VoteUpdate(VoteUpdate {
                meme_id: MemeId::from(7),
                upvotes: 0,
            })
        );
    }

    #[test]
    fn event_frames_round_trip_through_the_server_encoding() {
        let event = PushEvent::VoteUpdate(VoteUpdate {
            meme_id: MemeId::new("9").unwrap(),
            upvotes: 4,
        });
        let frame = event.to_frame().unwrap();
        assert_eq!(frame, r#"42["vote_update",{"meme_id":"9","upvotes":4}]"#);
        assert_eq!(decode_event_frame(&frame).unwrap(), event);
    }

    #[test]
    fn decodes_transport_packets() {
        let open = decode_packet(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#)
            .unwrap();
        let Packet::Open(handshake) = open else {
            panic!("expected open, got {open:?}");
        };
        assert_eq!(handshake.sid, "abc");
        assert_eq!(handshake.liveness(), Duration::from_secs(30));

        assert_eq!(decode_packet("2").unwrap(), Packet::Ping);
        assert_eq!(decode_packet("40").unwrap(), Packet::Connect);
        assert_eq!(decode_packet(r#"40{"sid":"xyz"}"#).unwrap(), Packet::Connect);
        assert_eq!(decode_packet("41").unwrap(), Packet::Disconnect);
        assert_eq!(decode_packet("1").unwrap(), Packet::Close);
        assert_eq!(
            decode_packet(r#"44{"message":"not authorized"}"#).unwrap(),
            Packet::ConnectError("not authorized".into())
        );
    }

    #[test]
    fn strips_namespace_and_ack_id() {
        let packet = decode_packet(r#"42/memes,17["vote_update",{"meme_id":1,"upvotes":2}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Event {
                name: "vote_update".into(),
                payload: json!({"meme_id": 1, "upvotes": 2}),
            }
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            decode_event_frame(r#"42["meme_deleted",{"id":1}]"#),
            Err(FrameError::Json(_))
        ));
        assert!(matches!(
            decode_event_frame(r#"42["vote_update",{"upvotes":3}]"#),
            Err(FrameError::Json(_))
        ));
        assert!(matches!(decode_event_frame("42[7]"), Err(FrameError::MalformedEvent)));
        assert!(matches!(decode_event_frame("2"), Err(FrameError::NotAnEvent)));
        assert!(matches!(decode_event_frame(""), Err(FrameError::Empty)));
        assert!(matches!(decode_event_frame("not json"), Err(FrameError::UnknownType('n'))));
    }
}
