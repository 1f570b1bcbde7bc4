//! SRTLA ingress and registration
//!
//! One receiver owns the public UDP listener, the resolved downstream SRT
//! address and the group registry, and runs the protocol from the uplink
//! side: REG1/REG2 registration, keepalive echoes, per-path SRT sequence
//! accounting with SRTLA ACKs, and forwarding into each group's downstream
//! socket. A janitor pass expires silent paths and empty groups; it is
//! driven by [`SrtlaReceiver::sweep`] so tests can supply their own clock.

use crate::downstream::{RECV_BUF_SIZE, SEND_BUF_SIZE};
use crate::group::{AddrBinding, Group, MAX_PATHS_PER_GROUP};
use crate::registry::{RegisterError, Registry, MAX_GROUPS};
use srtla_io::{RelaySocket, SocketError};
use srtla_protocol::{classify, control, GroupId, PacketKind, CLIENT_ID_LEN, MTU, SRT_MIN_LEN};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Janitor period
pub const CLEANUP_PERIOD: Duration = Duration::from_secs(3);

pub(crate) struct Inner {
    pub(crate) listener: RelaySocket,
    pub(crate) srt_addr: SocketAddr,
    pub(crate) registry: Registry,
}

/// The SRTLA receiver: public listener, registry and downstream target.
///
/// Cloning is cheap and shares all state; the ingress loop, the janitor and
/// every per-group downstream reader run on clones of the same receiver.
#[derive(Clone)]
pub struct SrtlaReceiver {
    pub(crate) inner: Arc<Inner>,
}

impl SrtlaReceiver {
    /// Bind the public listener and set up an empty registry.
    ///
    /// `srt_addr` is the already-resolved downstream SRT server (see
    /// [`crate::downstream::resolve_downstream`]).
    pub fn bind(listen: SocketAddr, srt_addr: SocketAddr) -> Result<Self, SocketError> {
        let listener = RelaySocket::bind(listen)?;

        // Large kernel buffers absorb multi-second cellular uplink stalls
        if let Err(e) = listener.set_recv_buffer_size(RECV_BUF_SIZE) {
            debug!(error = %e, "could not size listener receive buffer");
        }
        if let Err(e) = listener.set_send_buffer_size(SEND_BUF_SIZE) {
            debug!(error = %e, "could not size listener send buffer");
        }

        Ok(SrtlaReceiver {
            inner: Arc::new(Inner {
                listener,
                srt_addr,
                registry: Registry::new(),
            }),
        })
    }

    /// The listener's bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner.listener.local_addr()
    }

    /// Number of registered groups.
    pub fn group_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Run the ingress loop on the calling thread. Never returns.
    pub fn run(&self) {
        let mut buf = [0u8; MTU];
        loop {
            match self.inner.listener.recv_from(&mut buf) {
                Ok((n, addr)) => self.handle_datagram(&buf[..n], addr),
                Err(e) => error!(error = %e, "listener read error"),
            }
        }
    }

    /// Run the ingress loop on a background thread.
    pub fn spawn_ingress(&self) -> thread::JoinHandle<()> {
        let receiver = self.clone();
        thread::spawn(move || receiver.run())
    }

    /// Run the janitor on a background thread.
    pub fn spawn_janitor(&self) -> thread::JoinHandle<()> {
        let receiver = self.clone();
        thread::spawn(move || loop {
            thread::sleep(CLEANUP_PERIOD);
            receiver.sweep(Instant::now());
        })
    }

    /// Dispatch one inbound datagram.
    fn handle_datagram(&self, pkt: &[u8], addr: SocketAddr) {
        let now = Instant::now();
        let kind = classify(pkt);

        match kind {
            PacketKind::Reg1 => return self.register_group(addr, pkt),
            PacketKind::Reg2 => return self.register_conn(addr, pkt),
            _ => {}
        }

        let group = match self.inner.registry.find_by_addr(addr) {
            Some((group, AddrBinding::Path)) => group,
            // Reserved-only addresses and strangers alike
            _ => return,
        };

        if !group.touch_path(addr, now) {
            // Reaped between lookup and touch
            return;
        }

        if kind == PacketKind::Keepalive {
            // Echo verbatim; keepalives never steer unicast routing
            if let Err(e) = self.inner.listener.send_to(pkt, addr) {
                debug!(%addr, error = %e, "failed to echo keepalive");
            }
            return;
        }

        if pkt.len() < SRT_MIN_LEN {
            return;
        }

        group.set_last_addr(addr);

        if let PacketKind::SrtData { seq } = kind {
            if let Some(window) = group.record_data(addr, seq) {
                if let Err(e) = self.inner.listener.send_to(&control::ack(&window), addr) {
                    warn!(%addr, error = %e, "failed to send SRTLA ACK");
                }
            }
        }

        let sock = match self.ensure_downstream(&group) {
            Some(sock) => sock,
            None => return,
        };

        if let Err(e) = sock.send(pkt) {
            warn!(id = ?group.id(), error = %e, "failed to forward to SRT, terminating group");
            self.destroy_group(&group);
        }
    }

    fn register_group(&self, addr: SocketAddr, pkt: &[u8]) {
        match self.try_register_group(addr, pkt) {
            Ok(group) => info!(%addr, id = ?group.id(), "group registered"),
            Err(err) => {
                warn!(%addr, %err, "group registration failed");
                self.reject(addr, &err);
            }
        }
    }

    fn try_register_group(
        &self,
        addr: SocketAddr,
        pkt: &[u8],
    ) -> Result<Arc<Group>, RegisterError> {
        let registry = &self.inner.registry;

        if registry.len() >= MAX_GROUPS {
            return Err(RegisterError::capacity_exceeded());
        }
        if registry.find_by_addr(addr).is_some() {
            return Err(RegisterError::AddressAlreadyBound(addr));
        }

        let id = GroupId::from_client_half(&pkt[2..2 + CLIENT_ID_LEN]);
        let group = Group::new(id, addr);

        // Send-then-commit: a client that never sees the REG2 retries a
        // fresh REG1 and must not find a half-registered group in its way.
        self.inner
            .listener
            .send_to(&control::reg2(group.id()), addr)?;
        registry.insert(Arc::clone(&group))?;

        Ok(group)
    }

    fn register_conn(&self, addr: SocketAddr, pkt: &[u8]) {
        match self.try_register_conn(addr, pkt) {
            Ok(group) => {
                info!(%addr, id = ?group.id(), paths = group.path_count(), "path registered")
            }
            Err(err) => {
                warn!(%addr, %err, "path registration failed");
                self.reject(addr, &err);
            }
        }
    }

    fn try_register_conn(&self, addr: SocketAddr, pkt: &[u8]) -> Result<Arc<Group>, RegisterError> {
        let registry = &self.inner.registry;

        let group = registry
            .find_by_id(&pkt[2..])
            .ok_or(RegisterError::UnknownGroup)?;

        if let Some((other, _)) = registry.find_by_addr(addr) {
            if !Arc::ptr_eq(&other, &group) {
                return Err(RegisterError::AddressAlreadyBound(addr));
            }
        }

        let existing = group.has_path(addr);
        if !existing && group.path_count() >= MAX_PATHS_PER_GROUP {
            return Err(RegisterError::path_limit());
        }

        // The path is only committed once the REG3 went out; a client that
        // never received it retries without leaving orphan state behind.
        self.inner.listener.send_to(&control::reg3(), addr)?;

        if !existing {
            group.add_path(addr, Instant::now());
        }
        group.set_last_addr(addr);

        Ok(group)
    }

    /// Map a registration failure to its wire reply.
    fn reject(&self, addr: SocketAddr, err: &RegisterError) {
        let frame = match err {
            RegisterError::UnknownGroup => control::reg_ngp(),
            // Nothing to say if we could not even send the accept
            RegisterError::Socket(_) => return,
            _ => control::reg_err(),
        };
        if let Err(e) = self.inner.listener.send_to(&frame, addr) {
            debug!(%addr, error = %e, "failed to send registration reject");
        }
    }

    /// One janitor pass at the supplied clock reading.
    pub fn sweep(&self, now: Instant) {
        let outcome = self.inner.registry.reap(now);

        let keepalive = control::keepalive();
        for addr in &outcome.idle_paths {
            if let Err(e) = self.inner.listener.send_to(&keepalive, *addr) {
                debug!(addr = %addr, error = %e, "failed to send keepalive");
            }
        }
        for (group, addr) in &outcome.expired_paths {
            info!(addr = %addr, id = ?group.id(), "path removed (timed out)");
        }
        for group in outcome.removed_groups {
            info!(id = ?group.id(), "group removed (no paths)");
            group.close();
        }
    }

    /// Remove a group from the registry and close its downstream socket.
    ///
    /// Safe to call from several threads; only the first caller observes the
    /// removal.
    pub(crate) fn destroy_group(&self, group: &Arc<Group>) {
        let removed = self.inner.registry.remove(group);
        group.close();
        if removed {
            info!(id = ?group.id(), "group destroyed");
        }
    }
}
