//! Group identifiers
//!
//! A group id is 256 opaque bytes. The client proposes the first half in its
//! REG1; the receiver fills the second half with fresh randomness and returns
//! the full id in REG2. The client must then present the complete id in every
//! REG2 it sends to attach a path, which is what ties all of its uplinks to
//! the same group.

use rand::RngCore;
use std::fmt;
use subtle::ConstantTimeEq;

/// Full group id length in bytes
pub const GROUP_ID_LEN: usize = 256;

/// Length of the client-proposed half of the id
pub const CLIENT_ID_LEN: usize = GROUP_ID_LEN / 2;

/// A 256-byte group identifier.
#[derive(Clone)]
pub struct GroupId([u8; GROUP_ID_LEN]);

impl GroupId {
    /// Build a full id from the client-proposed half of a REG1 payload.
    ///
    /// Only the first [`CLIENT_ID_LEN`] bytes of `client_half` are used; a
    /// shorter slice is zero-padded. The server half is drawn from the
    /// OS-seeded generator, which is what makes ids probabilistically unique
    /// across groups.
    pub fn from_client_half(client_half: &[u8]) -> Self {
        let mut id = [0u8; GROUP_ID_LEN];
        let n = client_half.len().min(CLIENT_ID_LEN);
        id[..n].copy_from_slice(&client_half[..n]);
        rand::thread_rng().fill_bytes(&mut id[CLIENT_ID_LEN..]);
        GroupId(id)
    }

    /// The full 256-byte id.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; GROUP_ID_LEN] {
        &self.0
    }

    /// The client-proposed half.
    #[inline]
    pub fn client_half(&self) -> &[u8] {
        &self.0[..CLIENT_ID_LEN]
    }

    /// Compare against a candidate id in constant time.
    ///
    /// Lookup by id runs over every registered group; a timing-uniform
    /// comparison keeps the match position from leaking to a remote prober.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        if candidate.len() != GROUP_ID_LEN {
            return false;
        }
        self.0[..].ct_eq(candidate).into()
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough of a prefix to tell groups apart in logs
        write!(
            f,
            "GroupId({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_half_preserved() {
        let half = [0xABu8; CLIENT_ID_LEN];
        let id = GroupId::from_client_half(&half);
        assert_eq!(id.client_half(), &half[..]);
    }

    #[test]
    fn test_short_half_zero_padded() {
        let id = GroupId::from_client_half(&[0x01, 0x02]);
        assert_eq!(&id.as_bytes()[..2], &[0x01, 0x02]);
        assert!(id.as_bytes()[2..CLIENT_ID_LEN].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_server_half_randomized() {
        let half = [0u8; CLIENT_ID_LEN];
        let a = GroupId::from_client_half(&half);
        let b = GroupId::from_client_half(&half);
        // Same client half, different server halves
        assert_ne!(&a.as_bytes()[CLIENT_ID_LEN..], &b.as_bytes()[CLIENT_ID_LEN..]);
    }

    #[test]
    fn test_matches() {
        let id = GroupId::from_client_half(&[7u8; CLIENT_ID_LEN]);
        assert!(id.matches(id.as_bytes()));

        let mut other = *id.as_bytes();
        other[GROUP_ID_LEN - 1] ^= 1;
        assert!(!id.matches(&other));

        assert!(!id.matches(&other[..GROUP_ID_LEN - 1]));
    }
}
