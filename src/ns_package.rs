// package identity and the process-wide identifier pool

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::ns_interface::PackageId;

/// Identifier pool with reclamation.
///
/// Freed identifiers are handed out again smallest-first; only when the
/// freed set is empty does the pool grow past the highest id ever assigned.
#[derive(Debug, Default)]
pub struct IdPool {
    freed: BTreeSet<PackageId>,
    next: PackageId,
}

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> PackageId {
        if let Some(id) = self.freed.iter().next().copied() {
            self.freed.remove(&id);
            id
        } else {
            let id = self.next;
            self.next += 1;
            id
        }
    }

    pub fn release(&mut self, id: PackageId) {
        if id < self.next {
            self.freed.insert(id);
        }
    }

    /// Number of ids currently handed out.
    pub fn live_count(&self) -> usize {
        self.next as usize - self.freed.len()
    }

    pub fn reset(&mut self) {
        self.freed.clear();
        self.next = 0;
    }
}

// Package construction is the only place ids are acquired and Drop the only
// place they are released, so a concurrent caller cannot observe a torn pool.
static ID_POOL: Mutex<IdPool> = Mutex::new(IdPool {
    freed: BTreeSet::new(),
    next: 0,
});

fn pool() -> std::sync::MutexGuard<'static, IdPool> {
    // a poisoned pool is still structurally valid
    ID_POOL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reset the process-wide pool. Test lifecycle only; calling this while
/// packages are live re-issues their ids.
pub fn reset_id_pool() {
    pool().reset();
}

/// A unit of flow through the network.
///
/// Deliberately not `Clone`: a package is owned by exactly one buffer or
/// stockpile at any time, and its identifier returns to the pool when it is
/// dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct Package {
    id: PackageId,
}

impl Package {
    pub fn new() -> Self {
        Self {
            id: pool().acquire(),
        }
    }

    pub fn id(&self) -> PackageId {
        self.id
    }
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Package {
    fn drop(&mut self) {
        pool().release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_assigns_monotonically_when_nothing_freed() {
        let mut pool = IdPool::new();
        assert_eq!(pool.acquire(), 0);
        assert_eq!(pool.acquire(), 1);
        assert_eq!(pool.acquire(), 2);
        assert_eq!(pool.live_count(), 3);
    }

    #[test]
    fn pool_reuses_smallest_freed_id() {
        let mut pool = IdPool::new();
        for _ in 0..5 {
            pool.acquire();
        }
        pool.release(3);
        pool.release(1);
        assert_eq!(pool.acquire(), 1);
        assert_eq!(pool.acquire(), 3);
        // freed set exhausted, back to growing
        assert_eq!(pool.acquire(), 5);
    }

    #[test]
    fn pool_never_hands_out_a_live_id() {
        let mut pool = IdPool::new();
        let mut live = std::collections::HashSet::new();
        for _ in 0..50 {
            assert!(live.insert(pool.acquire()));
        }
        // free every other id and reacquire
        for id in (0..50).step_by(2) {
            pool.release(id);
            live.remove(&id);
        }
        for _ in 0..25 {
            assert!(live.insert(pool.acquire()));
        }
        assert_eq!(pool.live_count(), 50);
    }

    #[test]
    fn pool_ignores_release_of_unassigned_id() {
        let mut pool = IdPool::new();
        pool.release(42);
        assert_eq!(pool.acquire(), 0);
    }

    #[test]
    fn live_packages_have_distinct_ids() {
        // other tests share the process pool, so only relative properties
        // are asserted here
        let packages: Vec<Package> = (0..64).map(|_| Package::new()).collect();
        let ids: std::collections::HashSet<PackageId> =
            packages.iter().map(|p| p.id()).collect();
        assert_eq!(ids.len(), packages.len());
    }

    #[test]
    fn dropped_package_id_never_collides_with_live_ones() {
        let keep: Vec<Package> = (0..8).map(|_| Package::new()).collect();
        drop(Package::new());
        // the freed id is available again, but never while someone holds it
        let fresh = Package::new();
        assert!(keep.iter().all(|p| p.id() != fresh.id()));
    }
}
