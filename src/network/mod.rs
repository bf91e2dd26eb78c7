//! Network Layer
//!
//! Message envelope, transport abstraction and remote-entity interpolation.
//! This layer is **non-deterministic** (wall-clock acks, arrival order);
//! simulation state only changes through `sync/`.

pub mod interpolation;
pub mod netsync;
pub mod protocol;
pub mod transport;

pub use interpolation::{interpolate_entity, InterpolatedState, SnapshotHistory, Surrounding};
pub use netsync::NetSyncService;
pub use protocol::{AckMessage, InputMessage, Message, SnapshotMessage};
pub use transport::{LoopbackTransport, Transport, TransportError};
