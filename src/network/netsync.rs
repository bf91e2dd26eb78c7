//! Network sync service.
//!
//! Thin typed layer over a [`Transport`]: builds envelopes for inputs,
//! snapshots and acks, and drains whatever has arrived.

use chrono::Utc;
use tracing::debug;

use crate::sim::InputToken;
use crate::sync::snapshot::{self, SimulationSnapshot};

use super::protocol::{AckMessage, InputMessage, Message, SnapshotMessage};
use super::transport::{Transport, TransportError};

/// Sends and receives sync messages over a transport.
#[derive(Debug)]
pub struct NetSyncService<T: Transport> {
    transport: T,
}

impl<T: Transport> NetSyncService<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send the inputs applied on `tick`.
    pub fn send_input(&mut self, tick: u64, inputs: &[InputToken]) -> Result<(), TransportError> {
        self.transport.send(&Message::Input(InputMessage {
            tick,
            inputs: inputs.to_vec(),
        }))
    }

    /// Send a snapshot in its serialized JSON form.
    pub fn send_snapshot(&mut self, snap: &SimulationSnapshot) -> Result<(), TransportError> {
        let snapshot_data = snapshot::serialize(snap)?;
        self.transport.send(&Message::Snapshot(SnapshotMessage {
            tick: snap.tick,
            snapshot_data,
        }))
    }

    /// Acknowledge `tick`, stamped with the current time.
    pub fn send_ack(&mut self, tick: u64) -> Result<(), TransportError> {
        self.transport.send(&Message::Ack(AckMessage {
            tick,
            received_ts: Utc::now(),
        }))
    }

    /// Drain every pending message, in arrival order.
    pub fn process_messages(&mut self) -> Result<Vec<Message>, TransportError> {
        let mut messages = Vec::new();
        while let Some(message) = self.transport.receive()? {
            messages.push(message);
        }
        if !messages.is_empty() {
            debug!(count = messages.len(), "Received sync messages");
        }
        Ok(messages)
    }
}
