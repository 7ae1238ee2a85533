//! Wire protocol shared by the relay, producers and consumers
//!
//! Connections declare their role and session token in the query string:
//! `ws://host:port/?role=producer&token=abc`. Producers send raw encoded
//! image bytes; the relay sends consumers JSON [`FrameMessage`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::NetworkError;

/// `type` value of a frame message
pub const FRAME_TYPE: &str = "frame";

/// Role declared by a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
    /// Any other role: accepted, but never sent traffic
    Other(String),
}

impl Role {
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("producer") => Role::Producer,
            Some("consumer") => Role::Consumer,
            Some(other) => Role::Other(other.to_string()),
            None => Role::Other(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
            Role::Other(name) => name,
        }
    }

    /// Producers and consumers must name a session
    pub fn requires_token(&self) -> bool {
        matches!(self, Role::Producer | Role::Consumer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters of the relay's WebSocket endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    pub role: Option<String>,
    pub token: Option<String>,
}

/// Frame broadcast by the relay to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64 JPEG (or whatever text a legacy producer sent)
    pub data: String,
    /// Unix milliseconds at which the relay received the frame
    pub timestamp: u64,
    /// 1-based, per session
    pub frame_id: u64,
}

impl FrameMessage {
    pub fn new(frame_id: u64, timestamp: u64, data: String) -> Self {
        Self {
            kind: FRAME_TYPE.to_string(),
            data,
            timestamp,
            frame_id,
        }
    }
}

/// Loosely-typed view of any relay message, so unknown types can be skipped
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: Option<String>,
    timestamp: Option<u64>,
    frame_id: Option<u64>,
}

/// A parsed relay → consumer message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Frame(FrameMessage),
    /// Unrecognized `type`, or a frame without data
    Ignored(String),
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope {
            Envelope {
                kind,
                data: Some(data),
                timestamp,
                frame_id,
            } if kind == FRAME_TYPE && !data.is_empty() => Ok(ServerMessage::Frame(FrameMessage {
                kind,
                data,
                timestamp: timestamp.unwrap_or_default(),
                frame_id: frame_id.unwrap_or_default(),
            })),
            Envelope { kind, .. } => Ok(ServerMessage::Ignored(kind)),
        }
    }
}

/// Build the WebSocket URL for a role and session token
pub fn connect_url(server_url: &str, role: &Role, token: &str) -> Result<Url, NetworkError> {
    let mut url = Url::parse(server_url).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", server_url, e)))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(NetworkError::InvalidUrl(format!(
                "unsupported scheme {} in {}",
                other, server_url
            )))
        }
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("role", role.as_str())
        .append_pair("token", token);
    Ok(url)
}

/// Generate a fresh session token (32 lowercase hex characters)
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_param(Some("producer")), Role::Producer);
        assert_eq!(Role::from_param(Some("consumer")), Role::Consumer);
        assert_eq!(Role::from_param(Some("admin")), Role::Other("admin".into()));
        assert!(!Role::from_param(None).requires_token());
    }

    #[test]
    fn test_frame_wire_format() {
        let msg = FrameMessage::new(7, 1_700_000_000_000, "AAEC".into());
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "frame");
        assert_eq!(json["frameId"], 7);
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
        assert_eq!(json["data"], "AAEC");
    }

    #[test]
    fn test_unknown_type_ignored() {
        let parsed = ServerMessage::parse(r#"{"type":"stats","viewers":3}"#).unwrap();
        assert_eq!(parsed, ServerMessage::Ignored("stats".into()));

        let parsed = ServerMessage::parse(r#"{"type":"frame","frameId":2}"#).unwrap();
        assert_eq!(parsed, ServerMessage::Ignored("frame".into()));
    }

    #[test]
    fn test_parse_frame() {
        let text = r#"{"type":"frame","data":"/9j/","timestamp":5,"frameId":3}"#;
        match ServerMessage::parse(text).unwrap() {
            ServerMessage::Frame(frame) => {
                assert_eq!(frame.frame_id, 3);
                assert_eq!(frame.data, "/9j/");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(ServerMessage::parse("not json").is_err());
    }

    #[test]
    fn test_connect_url() {
        let url = connect_url("ws://localhost:3001", &Role::Consumer, "a b&c").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3001/?role=consumer&token=a+b%26c");

        assert!(connect_url("http://localhost:3001", &Role::Producer, "t").is_err());
        assert!(connect_url("not a url", &Role::Producer, "t").is_err());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
