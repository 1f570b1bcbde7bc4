//! SRTLA - SRT Link Aggregation
//!
//! High-level Rust API for the SRTLA receiver: one SRT stream bonded across
//! several client UDP paths, forwarded to a downstream SRT server.

pub use srtla_io as io;
pub use srtla_protocol as protocol;
pub use srtla_relay as relay;

// Re-export commonly used types
pub use protocol::{classify, GroupId, PacketKind};
pub use relay::{resolve_downstream, SrtlaReceiver};
