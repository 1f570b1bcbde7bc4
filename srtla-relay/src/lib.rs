//! SRTLA Receiver Core
//!
//! This crate implements the receiver side of SRTLA link aggregation: it
//! accepts one logical SRT stream spread across several client UDP paths,
//! forwards the reassembled byte stream to a downstream SRT server, and
//! carries the server's ACKs and NAKs back over every surviving path so the
//! sender can judge per-path health.

pub mod downstream;
pub mod group;
pub mod receiver;
pub mod registry;

pub use downstream::{resolve_downstream, RECV_BUF_SIZE, SEND_BUF_SIZE};
pub use group::{
    AddrBinding, Group, Path, PathSweep, GROUP_TIMEOUT, MAX_PATHS_PER_GROUP,
    PATH_KEEPALIVE_AFTER, PATH_TIMEOUT,
};
pub use receiver::{SrtlaReceiver, CLEANUP_PERIOD};
pub use registry::{ReapOutcome, RegisterError, Registry, MAX_GROUPS};
