//! UDP socket wrapper for the SRTLA relay
//!
//! Wraps a `socket2` datagram socket with the options the relay needs: a
//! dual-stack public listener, connected sockets towards the downstream SRT
//! server, large kernel buffers for bursty cellular uplinks, and shutdown,
//! which is how a group's downstream reader thread gets unblocked when the
//! group is destroyed.
//!
//! Sockets are blocking; each is only ever read by a single dedicated thread.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,
}

/// Relay UDP socket
pub struct RelaySocket {
    inner: Socket,
}

impl RelaySocket {
    /// Create a new socket bound to the given address.
    ///
    /// Binding an IPv6 address clears `IPV6_V6ONLY` first, so listening on
    /// `[::]` accepts IPv4 clients as well.
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        if addr.is_ipv6() {
            // Best effort; some platforms fix this at bind time
            let _ = socket.set_only_v6(false);
        }
        socket.bind(&addr.into())?;

        Ok(RelaySocket { inner: socket })
    }

    /// Create an unbound socket connected to `remote`.
    ///
    /// The relay uses one of these per group for the downstream SRT server,
    /// and a transient one per candidate address during the startup probe.
    pub fn connect(remote: SocketAddr) -> Result<Self, SocketError> {
        let domain = if remote.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.connect(&remote.into())?;

        Ok(RelaySocket { inner: socket })
    }

    /// Set the send buffer size
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_send_buffer_size(size)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Set or clear the read deadline
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), SocketError> {
        self.inner.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Send data to the given address
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, &target.into())?)
    }

    /// Send data on a connected socket
    pub fn send(&self, buf: &[u8]) -> Result<usize, SocketError> {
        Ok(self.inner.send(buf)?)
    }

    /// Receive data and the source address
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        // socket2 wants a MaybeUninit buffer; reuse the caller's initialized
        // slice rather than zeroing a fresh one per datagram.
        use std::mem::MaybeUninit;
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        let (n, addr) = self.inner.recv_from(uninit_buf)?;
        Ok((n, addr.as_socket().ok_or(SocketError::InvalidAddress)?))
    }

    /// Receive data on a connected socket
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        use std::mem::MaybeUninit;
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        Ok(self.inner.recv(uninit_buf)?)
    }

    /// Shut the socket down in both directions.
    ///
    /// On a connected UDP socket this unblocks a thread parked in `recv`,
    /// which then observes an error or zero-length read and exits.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown(Shutdown::Both);
    }
}
