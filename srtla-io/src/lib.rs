//! SRTLA I/O Abstraction
//!
//! UDP socket wrapper used by the relay for the public listener, the
//! per-group downstream sockets and the startup probe.

pub mod socket;

pub use socket::{RelaySocket, SocketError};
