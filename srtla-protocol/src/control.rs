//! SRTLA control frame assembly
//!
//! All frames the receiver originates: registration replies, keepalives and
//! the per-path SRTLA ACK. Everything is big-endian on the wire.

use crate::id::GroupId;
use crate::packet::{
    REG2_LEN, REG3_LEN, SRTLA_TYPE_ACK, SRTLA_TYPE_KEEPALIVE, SRTLA_TYPE_REG2, SRTLA_TYPE_REG3,
    SRTLA_TYPE_REG_ERR, SRTLA_TYPE_REG_NGP,
};
use bytes::{BufMut, Bytes, BytesMut};

const REG3_FRAME: [u8; REG3_LEN] = SRTLA_TYPE_REG3.to_be_bytes();
const REG_ERR_FRAME: [u8; 2] = SRTLA_TYPE_REG_ERR.to_be_bytes();
const REG_NGP_FRAME: [u8; 2] = SRTLA_TYPE_REG_NGP.to_be_bytes();
const KEEPALIVE_FRAME: [u8; 2] = SRTLA_TYPE_KEEPALIVE.to_be_bytes();

/// Number of SRT data sequence numbers carried by one SRTLA ACK.
///
/// The path's receive log fills to exactly this count before an ACK is
/// emitted and the log resets.
pub const ACK_WINDOW: usize = 10;

/// SRTLA ACK frame length: 32-bit type word + one u32 per logged sequence
pub const ACK_LEN: usize = 4 + 4 * ACK_WINDOW;

/// REG2 reply: type + the full group id.
pub fn reg2(id: &GroupId) -> Bytes {
    let mut buf = BytesMut::with_capacity(REG2_LEN);
    buf.put_u16(SRTLA_TYPE_REG2);
    buf.put_slice(id.as_bytes());
    buf.freeze()
}

/// REG3 reply: path accepted.
pub fn reg3() -> Bytes {
    Bytes::from_static(&REG3_FRAME)
}

/// Registration rejected.
pub fn reg_err() -> Bytes {
    Bytes::from_static(&REG_ERR_FRAME)
}

/// Registration rejected: the presented id matches no group.
pub fn reg_ngp() -> Bytes {
    Bytes::from_static(&REG_NGP_FRAME)
}

/// Bare keepalive frame, as sent by the janitor to quiet paths.
pub fn keepalive() -> Bytes {
    Bytes::from_static(&KEEPALIVE_FRAME)
}

/// SRTLA ACK frame for one full receive log.
///
/// The first word carries the type in its upper 16 bits with the lower 16
/// bits zero; the sequence numbers follow in the order they arrived on the
/// path.
pub fn ack(seqs: &[u32; ACK_WINDOW]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ACK_LEN);
    buf.put_u32((SRTLA_TYPE_ACK as u32) << 16);
    for &seq in seqs {
        buf.put_u32(seq);
    }
    buf.freeze()
}
