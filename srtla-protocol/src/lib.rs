//! SRTLA Wire Format
//!
//! This crate implements the SRTLA link-aggregation wire format as seen by a
//! receiver: classification of inbound datagrams, the registration and
//! liveness control frames, group identifiers, and the SRT induction
//! handshake probe.

pub mod control;
pub mod handshake;
pub mod id;
pub mod packet;

pub use control::{ACK_LEN, ACK_WINDOW};
pub use handshake::HANDSHAKE_LEN;
pub use id::{GroupId, CLIENT_ID_LEN, GROUP_ID_LEN};
pub use packet::{classify, packet_type, srt_data_seq, PacketKind, MTU, SRT_MIN_LEN};
