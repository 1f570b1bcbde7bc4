//! Downstream SRT socket management
//!
//! Each group lazily opens one connected UDP socket towards the SRT server
//! the first time it has something to forward, and a dedicated reader thread
//! carries the server's replies back to the uplinks: ACK/NAK to every path,
//! anything else to the most recently active address. Any downstream failure
//! terminates the whole group; the client recovers by re-registering.
//!
//! Also home to the startup probe that picks which of the SRT host's
//! resolved addresses actually answers an induction handshake.

use crate::group::Group;
use crate::receiver::SrtlaReceiver;
use srtla_io::{RelaySocket, SocketError};
use srtla_protocol::{classify, handshake, PacketKind, HANDSHAKE_LEN, MTU, SRT_MIN_LEN};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Downstream and listener send buffer size (100 MiB)
pub const SEND_BUF_SIZE: usize = 100 * 1024 * 1024;

/// Downstream and listener receive buffer size (100 MiB)
pub const RECV_BUF_SIZE: usize = 100 * 1024 * 1024;

/// Deadline for one induction probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

impl SrtlaReceiver {
    /// Hand out the group's downstream socket, creating it on first use.
    ///
    /// Creation failure is fatal to the group; `None` means the group is
    /// gone and the caller should drop the packet.
    pub(crate) fn ensure_downstream(&self, group: &Arc<Group>) -> Option<Arc<RelaySocket>> {
        if let Some(sock) = group.sock() {
            return Some(sock);
        }

        let sock = match self.open_downstream() {
            Ok(sock) => Arc::new(sock),
            Err(e) => {
                warn!(id = ?group.id(), error = %e, "failed to create SRT socket, terminating group");
                self.destroy_group(group);
                return None;
            }
        };

        let (sock, installed) = group.install_sock(sock);
        if installed {
            debug!(id = ?group.id(), local = ?sock.local_addr().ok(), "created SRT socket");
            let receiver = self.clone();
            let reader_group = Arc::clone(group);
            let reader_sock = Arc::clone(&sock);
            thread::spawn(move || receiver.downstream_reader(reader_group, reader_sock));
        }
        Some(sock)
    }

    fn open_downstream(&self) -> Result<RelaySocket, SocketError> {
        let sock = RelaySocket::connect(self.inner.srt_addr)?;
        sock.set_recv_buffer_size(RECV_BUF_SIZE)?;
        sock.set_send_buffer_size(SEND_BUF_SIZE)?;
        Ok(sock)
    }

    /// Per-group reader: runs until the socket errors, returns something
    /// shorter than an SRT header, or is shut down by group destruction.
    fn downstream_reader(&self, group: Arc<Group>, sock: Arc<RelaySocket>) {
        let mut buf = [0u8; MTU];
        loop {
            match sock.recv(&mut buf) {
                Ok(n) if n >= SRT_MIN_LEN => self.forward_downstream(&group, &buf[..n]),
                Ok(n) => {
                    // Zero-length reads also land here when the group was
                    // destroyed out from under us
                    if group.sock().is_some() {
                        warn!(id = ?group.id(), len = n, "short read from SRT socket, terminating group");
                    }
                    self.destroy_group(&group);
                    return;
                }
                Err(e) => {
                    if group.sock().is_some() {
                        warn!(id = ?group.id(), error = %e, "failed to read SRT socket, terminating group");
                    }
                    self.destroy_group(&group);
                    return;
                }
            }
        }
    }

    /// Apply the fan-out rule to one packet from the SRT server.
    fn forward_downstream(&self, group: &Group, pkt: &[u8]) {
        match classify(pkt) {
            PacketKind::SrtAck | PacketKind::SrtNak => {
                // Feedback must reach the sender even over a dying uplink:
                // copy to every path, tolerate individual failures
                for addr in group.path_addrs() {
                    if let Err(e) = self.inner.listener.send_to(pkt, addr) {
                        debug!(%addr, error = %e, "failed to forward SRT ACK/NAK");
                    }
                }
            }
            _ => {
                if let Some(addr) = group.last_addr() {
                    if let Err(e) = self.inner.listener.send_to(pkt, addr) {
                        debug!(%addr, error = %e, "failed to forward SRT packet");
                    }
                }
            }
        }
    }
}

/// Resolve the SRT host and pick the first address that answers an
/// induction handshake.
///
/// When nothing answers, the first resolved address is used anyway: the SRT
/// server may simply not be up yet, and the receiver must still start.
pub fn resolve_downstream(host: &str, port: u16) -> Result<SocketAddr, SocketError> {
    let candidates: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let first = *candidates.first().ok_or_else(|| {
        SocketError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no addresses found for host {host}"),
        ))
    })?;

    for &addr in &candidates {
        info!(%addr, "probing downstream SRT server");
        match probe_candidate(addr) {
            Ok(true) => return Ok(addr),
            Ok(false) => debug!(%addr, "unexpected induction response"),
            Err(e) => debug!(%addr, error = %e, "induction probe failed"),
        }
    }

    warn!("could not confirm the SRT server is reachable, proceeding with the first address");
    Ok(first)
}

fn probe_candidate(addr: SocketAddr) -> Result<bool, SocketError> {
    let sock = RelaySocket::connect(addr)?;
    sock.set_read_timeout(Some(PROBE_TIMEOUT))?;
    sock.send(&handshake::induction_request())?;

    let mut buf = [0u8; MTU];
    let n = sock.recv(&mut buf)?;
    Ok(n == HANDSHAKE_LEN)
}
