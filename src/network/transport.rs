//! Transport abstraction.
//!
//! The sync layer only needs "send a message" and "take the next received
//! message". [`LoopbackTransport`] satisfies that in-process, encoding and
//! decoding every message so tests exercise the real wire format.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::trace;

use crate::sync::snapshot::SnapshotError;

use super::protocol::Message;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Message could not be encoded or decoded.
    #[error("message codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Snapshot payload could not be built.
    #[error("snapshot payload error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The peer is gone.
    #[error("transport closed")]
    Closed,
}

/// A message channel to a peer.
pub trait Transport {
    /// Queue a message for the peer.
    fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Next received message, or `None` if nothing is pending.
    fn receive(&mut self) -> Result<Option<Message>, TransportError>;
}

/// In-process transport that delivers to itself.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    queue: VecDeque<Message>,
    closed: bool,
}

impl LoopbackTransport {
    /// Empty open loopback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting to be received.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Refuse further sends. Pending messages can still be received.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let json = message.to_json()?;
        trace!(bytes = json.len(), tick = message.tick(), "Loopback send");
        self.queue.push_back(Message::from_json(&json)?);
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Message>, TransportError> {
        Ok(self.queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::InputMessage;

    fn input(tick: u64) -> Message {
        Message::Input(InputMessage {
            tick,
            inputs: vec![],
        })
    }

    #[test]
    fn test_fifo_delivery() {
        let mut transport = LoopbackTransport::new();
        transport.send(&input(1)).unwrap();
        transport.send(&input(2)).unwrap();
        assert_eq!(transport.pending(), 2);

        assert_eq!(transport.receive().unwrap(), Some(input(1)));
        assert_eq!(transport.receive().unwrap(), Some(input(2)));
        assert_eq!(transport.receive().unwrap(), None);
    }

    #[test]
    fn test_closed_rejects_send() {
        let mut transport = LoopbackTransport::new();
        transport.send(&input(1)).unwrap();
        transport.close();

        assert!(matches!(transport.send(&input(2)), Err(TransportError::Closed)));
        assert_eq!(transport.receive().unwrap(), Some(input(1)));
    }
}
