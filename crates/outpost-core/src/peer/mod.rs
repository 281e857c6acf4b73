//! Outbound queues for raw (non-player) peer connections.
//!
//! The transport layer hands accepted connections to the registry; game
//! code enqueues byte buffers which are chunked and drained on the host
//! loop's cadence, subject to a per-peer throttle. Disconnects flush
//! everything first, then flag the entry for a later housekeeping sweep.

mod registry;
mod transport;

pub use registry::{ConnectionId, PeerHandler, PeerRegistry};
pub use transport::{PeerTransport, TcpPeerTransport};
