//! Group and path state
//!
//! A group is one logical SRT stream arriving over several client uplinks.
//! Each uplink is a [`Path`]: a client UDP address with a liveness stamp and
//! a short log of received SRT sequence numbers that drives SRTLA ACKs. The
//! group also owns the lazily-created downstream socket and the address of
//! whichever uplink most recently carried real traffic, which is where
//! downstream unicast replies are routed.

use parking_lot::Mutex;
use srtla_io::RelaySocket;
use srtla_protocol::{GroupId, ACK_WINDOW};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum uplinks per group
pub const MAX_PATHS_PER_GROUP: usize = 16;

/// A path is reaped after this much inbound silence
pub const PATH_TIMEOUT: Duration = Duration::from_secs(4);

/// A quiet path gets a keepalive after this much inbound silence
pub const PATH_KEEPALIVE_AFTER: Duration = Duration::from_secs(1);

/// A group with no paths is reaped once it is older than this
pub const GROUP_TIMEOUT: Duration = Duration::from_secs(4);

/// One client uplink within a group.
pub struct Path {
    addr: SocketAddr,
    last_rcvd: Instant,
    recv_log: [u32; ACK_WINDOW],
    recv_idx: usize,
}

impl Path {
    /// The client address this path belongs to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn new(addr: SocketAddr, now: Instant) -> Self {
        Path {
            addr,
            last_rcvd: now,
            recv_log: [0; ACK_WINDOW],
            recv_idx: 0,
        }
    }

    /// Log one received SRT data sequence number.
    ///
    /// Returns the full log, in arrival order, exactly when the window
    /// fills; the log then restarts from empty.
    fn record_data(&mut self, seq: u32) -> Option<[u32; ACK_WINDOW]> {
        self.recv_log[self.recv_idx] = seq;
        self.recv_idx += 1;
        if self.recv_idx == ACK_WINDOW {
            self.recv_idx = 0;
            Some(self.recv_log)
        } else {
            None
        }
    }
}

/// Where an address matches within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrBinding {
    /// The address is a registered path
    Path,
    /// The address only matches the reserved/last-active address
    LastAddr,
}

/// Outcome of a liveness sweep over one group's paths.
#[derive(Debug, Default)]
pub struct PathSweep {
    /// Paths removed for exceeding [`PATH_TIMEOUT`]
    pub expired: Vec<SocketAddr>,
    /// Surviving paths quiet for at least [`PATH_KEEPALIVE_AFTER`]
    pub idle: Vec<SocketAddr>,
}

struct GroupState {
    paths: Vec<Path>,
    last_addr: Option<SocketAddr>,
    srt_sock: Option<Arc<RelaySocket>>,
}

/// One logical upstream stream and its uplinks.
pub struct Group {
    id: GroupId,
    created_at: Instant,
    state: Mutex<GroupState>,
}

impl Group {
    /// Create a group with no paths.
    ///
    /// `reserved_addr` is recorded as the last-active address right away so
    /// that no other group can register from the same client address while
    /// the REG2/REG3 exchange is still in flight.
    pub fn new(id: GroupId, reserved_addr: SocketAddr) -> Arc<Self> {
        Arc::new(Group {
            id,
            created_at: Instant::now(),
            state: Mutex::new(GroupState {
                paths: Vec::new(),
                last_addr: Some(reserved_addr),
                srt_sock: None,
            }),
        })
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// How `addr` relates to this group, if at all.
    pub fn binding(&self, addr: SocketAddr) -> Option<AddrBinding> {
        let state = self.state.lock();
        if state.paths.iter().any(|p| p.addr == addr) {
            Some(AddrBinding::Path)
        } else if state.last_addr == Some(addr) {
            Some(AddrBinding::LastAddr)
        } else {
            None
        }
    }

    pub fn has_path(&self, addr: SocketAddr) -> bool {
        self.binding(addr) == Some(AddrBinding::Path)
    }

    pub fn path_count(&self) -> usize {
        self.state.lock().paths.len()
    }

    /// Snapshot of all path addresses, for ACK/NAK fan-out.
    pub fn path_addrs(&self) -> Vec<SocketAddr> {
        self.state.lock().paths.iter().map(|p| p.addr).collect()
    }

    /// Append a path for `addr` unless one already exists.
    pub fn add_path(&self, addr: SocketAddr, now: Instant) {
        let mut state = self.state.lock();
        if !state.paths.iter().any(|p| p.addr == addr) {
            state.paths.push(Path::new(addr, now));
        }
    }

    /// Refresh the liveness stamp of the path for `addr`.
    ///
    /// Returns false if no such path exists (it may have been reaped between
    /// lookup and touch).
    pub fn touch_path(&self, addr: SocketAddr, now: Instant) -> bool {
        let mut state = self.state.lock();
        match state.paths.iter_mut().find(|p| p.addr == addr) {
            Some(path) => {
                path.last_rcvd = now;
                true
            }
            None => false,
        }
    }

    /// Log a data sequence number on the path for `addr`; yields a full
    /// receive log when it is time to emit an SRTLA ACK.
    pub fn record_data(&self, addr: SocketAddr, seq: u32) -> Option<[u32; ACK_WINDOW]> {
        let mut state = self.state.lock();
        state
            .paths
            .iter_mut()
            .find(|p| p.addr == addr)
            .and_then(|p| p.record_data(seq))
    }

    pub fn last_addr(&self) -> Option<SocketAddr> {
        self.state.lock().last_addr
    }

    pub fn set_last_addr(&self, addr: SocketAddr) {
        self.state.lock().last_addr = Some(addr);
    }

    /// Drop expired paths and report which survivors want a keepalive.
    pub fn sweep_paths(&self, now: Instant) -> PathSweep {
        let mut sweep = PathSweep::default();
        let mut state = self.state.lock();
        state.paths.retain(|p| {
            let silence = now.saturating_duration_since(p.last_rcvd);
            if silence >= PATH_TIMEOUT {
                sweep.expired.push(p.addr);
                false
            } else {
                if silence >= PATH_KEEPALIVE_AFTER {
                    sweep.idle.push(p.addr);
                }
                true
            }
        });
        sweep
    }

    /// Whether the janitor should reap this group: no paths left and old
    /// enough that a fresh registration still waiting for its first REG2 is
    /// not caught.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.state.lock().paths.is_empty() && self.age(now) > GROUP_TIMEOUT
    }

    /// The downstream socket, if one has been created.
    pub fn sock(&self) -> Option<Arc<RelaySocket>> {
        self.state.lock().srt_sock.clone()
    }

    /// Install a freshly-created downstream socket unless another thread got
    /// there first.
    ///
    /// Returns the socket to use and whether `sock` was the one installed;
    /// when it was not, the caller's socket is simply dropped.
    pub fn install_sock(&self, sock: Arc<RelaySocket>) -> (Arc<RelaySocket>, bool) {
        let mut state = self.state.lock();
        match &state.srt_sock {
            Some(existing) => (Arc::clone(existing), false),
            None => {
                state.srt_sock = Some(Arc::clone(&sock));
                (sock, true)
            }
        }
    }

    /// Close the downstream socket, unblocking the group's reader thread.
    pub fn close(&self) {
        let sock = self.state.lock().srt_sock.take();
        if let Some(sock) = sock {
            sock.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srtla_protocol::CLIENT_ID_LEN;

    fn test_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn test_group(reserved: SocketAddr) -> Arc<Group> {
        Group::new(GroupId::from_client_half(&[1u8; CLIENT_ID_LEN]), reserved)
    }

    #[test]
    fn test_reserved_addr_binding() {
        let group = test_group(test_addr(9000));
        assert_eq!(group.binding(test_addr(9000)), Some(AddrBinding::LastAddr));
        assert_eq!(group.binding(test_addr(9001)), None);
        assert_eq!(group.path_count(), 0);
    }

    #[test]
    fn test_add_path_idempotent() {
        let group = test_group(test_addr(9000));
        let now = Instant::now();

        group.add_path(test_addr(9001), now);
        group.add_path(test_addr(9001), now);
        assert_eq!(group.path_count(), 1);
        assert_eq!(group.binding(test_addr(9001)), Some(AddrBinding::Path));
    }

    #[test]
    fn test_touch_missing_path() {
        let group = test_group(test_addr(9000));
        assert!(!group.touch_path(test_addr(9001), Instant::now()));
    }

    #[test]
    fn test_record_data_window() {
        let group = test_group(test_addr(9000));
        let addr = test_addr(9001);
        group.add_path(addr, Instant::now());

        for seq in 100..109 {
            assert_eq!(group.record_data(addr, seq), None);
        }
        let window = group.record_data(addr, 109).expect("window should fill");
        assert_eq!(window, [100, 101, 102, 103, 104, 105, 106, 107, 108, 109]);

        // The log restarts after emitting
        for seq in 0..9 {
            assert_eq!(group.record_data(addr, seq), None);
        }
        assert!(group.record_data(addr, 9).is_some());
    }

    #[test]
    fn test_record_data_arrival_order() {
        let group = test_group(test_addr(9000));
        let addr = test_addr(9001);
        group.add_path(addr, Instant::now());

        let seqs = [5u32, 3, 9, 1, 7, 0, 8, 2, 6, 4];
        let mut window = None;
        for &seq in &seqs {
            window = group.record_data(addr, seq);
        }
        assert_eq!(window.unwrap(), seqs);
    }

    #[test]
    fn test_sweep_paths() {
        let group = test_group(test_addr(9000));
        let now = Instant::now();

        group.add_path(test_addr(9001), now);
        group.add_path(test_addr(9002), now);

        // Fresh paths: nothing expired, nothing idle
        let sweep = group.sweep_paths(now);
        assert!(sweep.expired.is_empty());
        assert!(sweep.idle.is_empty());

        // Past the keepalive threshold but not the timeout
        let sweep = group.sweep_paths(now + Duration::from_secs(2));
        assert!(sweep.expired.is_empty());
        assert_eq!(sweep.idle, vec![test_addr(9001), test_addr(9002)]);

        // One path stays fresh, the other times out
        group.touch_path(test_addr(9001), now + Duration::from_secs(4));
        let sweep = group.sweep_paths(now + Duration::from_secs(5));
        assert_eq!(sweep.expired, vec![test_addr(9002)]);
        assert_eq!(group.path_count(), 1);
    }

    #[test]
    fn test_stale_group() {
        let group = test_group(test_addr(9000));
        let now = Instant::now();

        // Pathless but still within the registration grace period
        assert!(!group.is_stale(now));
        // Old and empty
        assert!(group.is_stale(now + Duration::from_secs(5)));

        // A group with a live path is never stale
        group.add_path(test_addr(9001), now + Duration::from_secs(5));
        assert!(!group.is_stale(now + Duration::from_secs(6)));
    }

    #[test]
    fn test_install_sock_once() {
        let group = test_group(test_addr(9000));
        let peer = RelaySocket::bind(test_addr(0)).unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let first = Arc::new(RelaySocket::connect(peer_addr).unwrap());
        let second = Arc::new(RelaySocket::connect(peer_addr).unwrap());

        let (installed, was_new) = group.install_sock(Arc::clone(&first));
        assert!(was_new);
        assert!(Arc::ptr_eq(&installed, &first));

        // The loser of the race gets the existing socket back
        let (existing, was_new) = group.install_sock(second);
        assert!(!was_new);
        assert!(Arc::ptr_eq(&existing, &first));

        group.close();
        assert!(group.sock().is_none());
    }
}
