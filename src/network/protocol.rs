//! Protocol Messages
//!
//! Wire format for state-sync traffic. Every message travels in a JSON
//! envelope:
//!
//! ```json
//! {"type": "input",    "payload": {"tick": 12, "inputs": ["right", "jump"]}}
//! {"type": "snapshot", "payload": {"tick": 12, "snapshot_data": {...}}}
//! {"type": "ack",      "payload": {"tick": 12, "received_ts": "2024-..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sim::InputToken;
use crate::sync::snapshot::{self, SimulationSnapshot, SnapshotError};

use super::transport::TransportError;

/// Envelope for every message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    /// Inputs a peer applied on a tick.
    Input(InputMessage),

    /// Authoritative state for a tick.
    Snapshot(SnapshotMessage),

    /// Receipt for a tick.
    Ack(AckMessage),
}

/// Inputs for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    /// Tick the inputs belong to.
    pub tick: u64,
    /// Active tokens.
    pub inputs: Vec<InputToken>,
}

/// Serialized snapshot for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    /// Snapshot tick.
    pub tick: u64,
    /// Output of [`snapshot::serialize`].
    pub snapshot_data: serde_json::Value,
}

impl SnapshotMessage {
    /// Decode the carried snapshot.
    pub fn snapshot(&self) -> Result<SimulationSnapshot, SnapshotError> {
        snapshot::deserialize(&self.snapshot_data)
    }
}

/// Acknowledgement of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    /// Acknowledged tick.
    pub tick: u64,
    /// When the ack was produced.
    pub received_ts: DateTime<Utc>,
}

impl Message {
    /// Tick the message refers to.
    pub fn tick(&self) -> u64 {
        match self {
            Message::Input(m) => m.tick,
            Message::Snapshot(m) => m.tick,
            Message::Ack(m) => m.tick,
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let msg = Message::Input(InputMessage {
            tick: 12,
            inputs: vec![InputToken::Right, InputToken::Jump],
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "input");
        assert_eq!(value["payload"]["tick"], 12);
        assert_eq!(value["payload"]["inputs"], serde_json::json!(["right", "jump"]));
    }

    #[test]
    fn test_parse_foreign_json() {
        let json = r#"{"type": "snapshot", "payload": {"tick": 4, "snapshot_data": {"tick": 4}}}"#;
        let msg = Message::from_json(json).unwrap();

        assert_eq!(msg.tick(), 4);
        let Message::Snapshot(snap) = msg else {
            panic!("expected snapshot message");
        };
        assert_eq!(snap.snapshot().unwrap().tick, 4);
    }

    #[test]
    fn test_ack_timestamp_roundtrip() {
        let msg = Message::Ack(AckMessage {
            tick: 9,
            received_ts: Utc::now(),
        });
        assert_eq!(Message::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type": "chat", "payload": {"text": "hi"}}"#;
        assert!(matches!(Message::from_json(json), Err(TransportError::Codec(_))));
    }
}
