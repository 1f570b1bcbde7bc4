//! SRT induction handshake probe
//!
//! The receiver never completes an SRT handshake itself; the downstream SRT
//! endpoint does that with the sender through the relayed byte stream. The
//! only handshake the receiver builds is the fixed 64-byte induction request
//! used at startup to find out which of the SRT host's addresses actually
//! answers.

use crate::packet::SRT_TYPE_HANDSHAKE;
use bytes::{BufMut, Bytes, BytesMut};

/// Induction handshake packet length: 16-byte SRT header + 48-byte
/// handshake body (version, enc/ext fields, initial seq, MTU, MFW,
/// handshake type, source id, SYN cookie, peer IP).
pub const HANDSHAKE_LEN: usize = 64;

/// UDT handshake version used for induction
const HANDSHAKE_VERSION: u32 = 4;

/// Extension field magic for an induction request
const HANDSHAKE_EXT_FIELD: u16 = 2;

/// Handshake type: induction
const HANDSHAKE_TYPE_INDUCTION: u32 = 1;

/// Build the induction request sent to each candidate downstream address.
pub fn induction_request() -> Bytes {
    let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
    buf.put_u16(SRT_TYPE_HANDSHAKE);
    buf.put_u16(0); // header: subtype
    buf.put_u32(0); // header: type-specific info
    buf.put_u32(0); // header: timestamp
    buf.put_u32(0); // header: destination socket id
    buf.put_u32(HANDSHAKE_VERSION);
    buf.put_u16(0); // encryption field
    buf.put_u16(HANDSHAKE_EXT_FIELD);
    buf.put_u32(0); // initial sequence number
    buf.put_u32(0); // MTU
    buf.put_u32(0); // max flow window
    buf.put_u32(HANDSHAKE_TYPE_INDUCTION);
    buf.put_u32(0); // source socket id
    buf.put_u32(0); // SYN cookie
    buf.put_slice(&[0u8; 16]); // peer IP
    buf.freeze()
}
