//! Process-wide group registry
//!
//! Holds every active group, bounded to [`MAX_GROUPS`]. Lookups by id use a
//! constant-time byte comparison; lookups by address scan paths and reserved
//! addresses so that one client address can never be bound to two groups.
//!
//! Lock order is registry before group, never the other way around.

use crate::group::{AddrBinding, Group, PathSweep, MAX_PATHS_PER_GROUP};
use parking_lot::RwLock;
use srtla_io::SocketError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Maximum concurrently registered groups
pub const MAX_GROUPS: usize = 200;

/// Registration failures, each mapped to a wire reply by the receiver
#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("registry is full (max {max} groups)")]
    CapacityExceeded { max: usize },

    #[error("address {0} is already bound to a group")]
    AddressAlreadyBound(SocketAddr),

    #[error("no group matches the presented id")]
    UnknownGroup,

    #[error("group is full (max {max} paths)")]
    PathLimit { max: usize },

    #[error("socket error: {0}")]
    Socket(#[from] SocketError),
}

impl RegisterError {
    pub fn path_limit() -> Self {
        RegisterError::PathLimit {
            max: MAX_PATHS_PER_GROUP,
        }
    }

    pub fn capacity_exceeded() -> Self {
        RegisterError::CapacityExceeded { max: MAX_GROUPS }
    }
}

/// What one janitor pass removed and who needs a keepalive.
#[derive(Default)]
pub struct ReapOutcome {
    /// Groups removed from the registry; the caller closes them
    pub removed_groups: Vec<Arc<Group>>,
    /// Paths dropped for inbound silence, with their group
    pub expired_paths: Vec<(Arc<Group>, SocketAddr)>,
    /// Surviving paths quiet long enough to warrant a keepalive
    pub idle_paths: Vec<SocketAddr>,
}

/// Index of all active groups.
#[derive(Default)]
pub struct Registry {
    groups: RwLock<Vec<Arc<Group>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Find the group whose 256-byte id equals `id`.
    ///
    /// Every registered id is compared in constant time regardless of where
    /// (or whether) the match occurs.
    pub fn find_by_id(&self, id: &[u8]) -> Option<Arc<Group>> {
        let groups = self.groups.read();
        let mut found = None;
        for group in groups.iter() {
            if group.id().matches(id) {
                found = Some(Arc::clone(group));
            }
        }
        found
    }

    /// Find the group that `addr` is bound to, either as a registered path
    /// or as a reserved/last-active address.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<(Arc<Group>, AddrBinding)> {
        let groups = self.groups.read();
        for group in groups.iter() {
            if let Some(binding) = group.binding(addr) {
                return Some((Arc::clone(group), binding));
            }
        }
        None
    }

    /// Insert a group, re-checking capacity under the write lock.
    pub fn insert(&self, group: Arc<Group>) -> Result<(), RegisterError> {
        let mut groups = self.groups.write();
        if groups.len() >= MAX_GROUPS {
            return Err(RegisterError::capacity_exceeded());
        }
        groups.push(group);
        Ok(())
    }

    /// Remove a specific group. Returns false if it was already gone, which
    /// makes concurrent destruction (janitor vs reader vs ingress) a no-op
    /// for everyone but the first caller.
    pub fn remove(&self, group: &Arc<Group>) -> bool {
        let mut groups = self.groups.write();
        match groups.iter().position(|g| Arc::ptr_eq(g, group)) {
            Some(idx) => {
                groups.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// One janitor pass: expire silent paths, then drop groups that have
    /// been empty for longer than the registration grace period.
    ///
    /// Runs under the registry write lock; the removed groups' sockets are
    /// closed by the caller after the lock is released.
    pub fn reap(&self, now: Instant) -> ReapOutcome {
        let mut outcome = ReapOutcome::default();
        let mut groups = self.groups.write();

        groups.retain(|group| {
            let PathSweep { expired, idle } = group.sweep_paths(now);
            outcome
                .expired_paths
                .extend(expired.into_iter().map(|addr| (Arc::clone(group), addr)));
            outcome.idle_paths.extend(idle);

            if group.is_stale(now) {
                outcome.removed_groups.push(Arc::clone(group));
                false
            } else {
                true
            }
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srtla_protocol::{GroupId, CLIENT_ID_LEN};
    use std::time::Duration;

    fn test_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn test_group(seed: u8, reserved: SocketAddr) -> Arc<Group> {
        Group::new(GroupId::from_client_half(&[seed; CLIENT_ID_LEN]), reserved)
    }

    #[test]
    fn test_insert_and_capacity() {
        let registry = Registry::new();
        for i in 0..MAX_GROUPS {
            registry
                .insert(test_group(i as u8, test_addr(10_000 + i as u16)))
                .unwrap();
        }
        assert_eq!(registry.len(), MAX_GROUPS);

        let overflow = test_group(0xFF, test_addr(20_000));
        assert!(matches!(
            registry.insert(overflow),
            Err(RegisterError::CapacityExceeded { .. })
        ));
        assert_eq!(registry.len(), MAX_GROUPS);
    }

    #[test]
    fn test_find_by_id() {
        let registry = Registry::new();
        let group = test_group(1, test_addr(9000));
        let id = *group.id().as_bytes();
        registry.insert(Arc::clone(&group)).unwrap();
        registry.insert(test_group(2, test_addr(9001))).unwrap();

        let found = registry.find_by_id(&id).expect("group should be found");
        assert!(Arc::ptr_eq(&found, &group));

        let mut wrong = id;
        wrong[0] ^= 1;
        assert!(registry.find_by_id(&wrong).is_none());
    }

    #[test]
    fn test_find_by_addr_bindings() {
        let registry = Registry::new();
        let group = test_group(1, test_addr(9000));
        group.add_path(test_addr(9001), Instant::now());
        registry.insert(Arc::clone(&group)).unwrap();

        // Reserved address matches without a path
        let (found, binding) = registry.find_by_addr(test_addr(9000)).unwrap();
        assert!(Arc::ptr_eq(&found, &group));
        assert_eq!(binding, AddrBinding::LastAddr);

        // Registered path matches as a path
        let (_, binding) = registry.find_by_addr(test_addr(9001)).unwrap();
        assert_eq!(binding, AddrBinding::Path);

        assert!(registry.find_by_addr(test_addr(9002)).is_none());
    }

    #[test]
    fn test_remove_idempotent() {
        let registry = Registry::new();
        let group = test_group(1, test_addr(9000));
        registry.insert(Arc::clone(&group)).unwrap();

        assert!(registry.remove(&group));
        assert!(!registry.remove(&group));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reap_expired_paths_and_stale_groups() {
        let registry = Registry::new();
        let now = Instant::now();

        let active = test_group(1, test_addr(9000));
        active.add_path(test_addr(9001), now);
        registry.insert(Arc::clone(&active)).unwrap();

        let dying = test_group(2, test_addr(9100));
        dying.add_path(test_addr(9101), now);
        registry.insert(Arc::clone(&dying)).unwrap();

        // Keep one path alive past the sweep horizon
        let later = now + Duration::from_secs(5);
        active.touch_path(test_addr(9001), later);

        let outcome = registry.reap(later);

        // The dying group's path expired; the group itself is now empty and
        // past the grace period, so it went with it.
        assert_eq!(outcome.expired_paths.len(), 1);
        assert_eq!(outcome.expired_paths[0].1, test_addr(9101));
        assert_eq!(outcome.removed_groups.len(), 1);
        assert!(Arc::ptr_eq(&outcome.removed_groups[0], &dying));
        assert_eq!(registry.len(), 1);
        assert!(outcome.idle_paths.is_empty());
    }

    #[test]
    fn test_reap_spares_fresh_empty_group() {
        let registry = Registry::new();
        let now = Instant::now();

        // Registered moments ago, no paths yet: shielded by the grace period
        registry.insert(test_group(1, test_addr(9000))).unwrap();
        let outcome = registry.reap(now + Duration::from_secs(1));
        assert!(outcome.removed_groups.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reap_reports_idle_paths() {
        let registry = Registry::new();
        let now = Instant::now();

        let group = test_group(1, test_addr(9000));
        group.add_path(test_addr(9001), now);
        registry.insert(group).unwrap();

        let outcome = registry.reap(now + Duration::from_secs(2));
        assert_eq!(outcome.idle_paths, vec![test_addr(9001)]);
        assert!(outcome.expired_paths.is_empty());
        assert!(outcome.removed_groups.is_empty());
    }
}
