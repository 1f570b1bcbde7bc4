//! SRTLA and SRT packet classification
//!
//! SRTLA multiplexes two families of traffic over one UDP port: its own
//! registration/liveness frames (types 0x90xx-0x92xx) and opaque SRT packets
//! that are relayed without interpretation. Classification only ever inspects
//! the first four bytes of a datagram; everything past the SRT header word is
//! payload that belongs to the downstream SRT endpoint.

use crate::id::GROUP_ID_LEN;

/// SRT induction/conclusion handshake control packet
pub const SRT_TYPE_HANDSHAKE: u16 = 0x8000;
/// SRT full acknowledgement
pub const SRT_TYPE_ACK: u16 = 0x8002;
/// SRT loss report
pub const SRT_TYPE_NAK: u16 = 0x8003;
/// SRT shutdown
pub const SRT_TYPE_SHUTDOWN: u16 = 0x8005;

/// SRTLA keepalive, echoed verbatim by the receiver
pub const SRTLA_TYPE_KEEPALIVE: u16 = 0x9000;
/// SRTLA per-path acknowledgement carrying received SRT sequence numbers
pub const SRTLA_TYPE_ACK: u16 = 0x9100;
/// Client proposes a new group (carries the client id half)
pub const SRTLA_TYPE_REG1: u16 = 0x9200;
/// Server acknowledges a group / client attaches a path (carries the full id)
pub const SRTLA_TYPE_REG2: u16 = 0x9201;
/// Server acknowledges a path
pub const SRTLA_TYPE_REG3: u16 = 0x9202;
/// Registration rejected
pub const SRTLA_TYPE_REG_ERR: u16 = 0x9210;
/// Registration rejected: no such group
pub const SRTLA_TYPE_REG_NGP: u16 = 0x9211;

/// Shortest valid SRT packet: the 16-byte header with no payload
pub const SRT_MIN_LEN: usize = 16;

/// Largest datagram the relay ever reads or writes
pub const MTU: usize = 1500;

/// Control packet flag: bit 31 of the first header word
const CONTROL_FLAG: u32 = 0x8000_0000;

/// Mask for the 31-bit SRT data sequence number
const SEQ_MASK: u32 = 0x7FFF_FFFF;

/// REG1 frame length: type + 256-byte id field
pub const REG1_LEN: usize = 2 + GROUP_ID_LEN;
/// REG2 frame length: type + 256-byte id field
pub const REG2_LEN: usize = 2 + GROUP_ID_LEN;
/// REG3 frame length: bare type
pub const REG3_LEN: usize = 2;

/// Classification of one inbound datagram.
///
/// Registration frames are matched on exact length as well as type, so a
/// truncated REG1/REG2 falls through to `Unknown` rather than corrupting the
/// registry with a short id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// SRTLA REG1: propose a group
    Reg1,
    /// SRTLA REG2: attach a path to a group
    Reg2,
    /// SRTLA keepalive, any length
    Keepalive,
    /// SRT handshake control packet
    SrtHandshake,
    /// SRT acknowledgement
    SrtAck,
    /// SRT loss report
    SrtNak,
    /// SRT shutdown
    SrtShutdown,
    /// SRT data packet with its 31-bit sequence number
    SrtData { seq: u32 },
    /// Anything else
    Unknown,
}

/// Read the 16-bit big-endian type word, if present.
#[inline]
pub fn packet_type(pkt: &[u8]) -> Option<u16> {
    if pkt.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([pkt[0], pkt[1]]))
}

/// Extract the sequence number from an SRT data packet.
///
/// Returns `None` for control packets (bit 31 set) and for datagrams shorter
/// than the SRT header.
#[inline]
pub fn srt_data_seq(pkt: &[u8]) -> Option<u32> {
    if pkt.len() < SRT_MIN_LEN {
        return None;
    }
    let word = u32::from_be_bytes([pkt[0], pkt[1], pkt[2], pkt[3]]);
    if word & CONTROL_FLAG == 0 {
        Some(word & SEQ_MASK)
    } else {
        None
    }
}

/// Classify one datagram by its first bytes.
pub fn classify(pkt: &[u8]) -> PacketKind {
    let ty = match packet_type(pkt) {
        Some(ty) => ty,
        None => return PacketKind::Unknown,
    };

    if pkt.len() == REG1_LEN && ty == SRTLA_TYPE_REG1 {
        return PacketKind::Reg1;
    }
    if pkt.len() == REG2_LEN && ty == SRTLA_TYPE_REG2 {
        return PacketKind::Reg2;
    }
    if ty == SRTLA_TYPE_KEEPALIVE {
        return PacketKind::Keepalive;
    }

    match ty {
        SRT_TYPE_HANDSHAKE => PacketKind::SrtHandshake,
        SRT_TYPE_ACK => PacketKind::SrtAck,
        SRT_TYPE_NAK => PacketKind::SrtNak,
        SRT_TYPE_SHUTDOWN => PacketKind::SrtShutdown,
        _ => match srt_data_seq(pkt) {
            Some(seq) => PacketKind::SrtData { seq },
            None => PacketKind::Unknown,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed_frame(ty: u16, len: usize) -> Vec<u8> {
        let mut pkt = vec![0u8; len];
        pkt[..2].copy_from_slice(&ty.to_be_bytes());
        pkt
    }

    #[test]
    fn test_classify_reg1_reg2() {
        assert_eq!(classify(&typed_frame(SRTLA_TYPE_REG1, REG1_LEN)), PacketKind::Reg1);
        assert_eq!(classify(&typed_frame(SRTLA_TYPE_REG2, REG2_LEN)), PacketKind::Reg2);
    }

    #[test]
    fn test_truncated_reg_is_unknown() {
        // A REG1 that lost bytes in transit must not be treated as one.
        assert_eq!(
            classify(&typed_frame(SRTLA_TYPE_REG1, REG1_LEN - 1)),
            PacketKind::Unknown
        );
        assert_eq!(classify(&typed_frame(SRTLA_TYPE_REG2, 2)), PacketKind::Unknown);
    }

    #[test]
    fn test_classify_keepalive_any_length() {
        assert_eq!(classify(&typed_frame(SRTLA_TYPE_KEEPALIVE, 2)), PacketKind::Keepalive);
        // Senders may append an opaque body (e.g. a timestamp); still a keepalive.
        assert_eq!(classify(&typed_frame(SRTLA_TYPE_KEEPALIVE, 10)), PacketKind::Keepalive);
    }

    #[test]
    fn test_classify_srt_control() {
        assert_eq!(classify(&typed_frame(SRT_TYPE_ACK, 44)), PacketKind::SrtAck);
        assert_eq!(classify(&typed_frame(SRT_TYPE_NAK, 24)), PacketKind::SrtNak);
        assert_eq!(classify(&typed_frame(SRT_TYPE_SHUTDOWN, 16)), PacketKind::SrtShutdown);
        assert_eq!(classify(&typed_frame(SRT_TYPE_HANDSHAKE, 64)), PacketKind::SrtHandshake);
    }

    #[test]
    fn test_classify_srt_data() {
        let mut pkt = vec![0u8; SRT_MIN_LEN];
        pkt[..4].copy_from_slice(&1234u32.to_be_bytes());
        assert_eq!(classify(&pkt), PacketKind::SrtData { seq: 1234 });

        // Maximum 31-bit sequence number
        let mut pkt = vec![0u8; 100];
        pkt[..4].copy_from_slice(&SEQ_MASK.to_be_bytes());
        assert_eq!(classify(&pkt), PacketKind::SrtData { seq: SEQ_MASK });
    }

    #[test]
    fn test_short_data_is_unknown() {
        let mut pkt = vec![0u8; SRT_MIN_LEN - 1];
        pkt[..4].copy_from_slice(&1234u32.to_be_bytes());
        assert_eq!(classify(&pkt), PacketKind::Unknown);
    }

    #[test]
    fn test_unrecognized_control_type() {
        // Control bit set but not a type the relay ever inspects
        assert_eq!(classify(&typed_frame(0x8004, 16)), PacketKind::Unknown);
    }

    #[test]
    fn test_empty_and_tiny() {
        assert_eq!(classify(&[]), PacketKind::Unknown);
        assert_eq!(classify(&[0x92]), PacketKind::Unknown);
    }

    #[test]
    fn test_srt_data_seq_masks_control_bit() {
        let mut pkt = vec![0u8; SRT_MIN_LEN];
        pkt[..4].copy_from_slice(&0x8000_0001u32.to_be_bytes());
        assert_eq!(srt_data_seq(&pkt), None);
    }
}
