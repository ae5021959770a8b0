//! Pointer ownership table: which tier a live block came from.
//!
//! Sharded by page so that concurrent callers on different blocks rarely
//! contend.

use std::collections::HashMap;

use memtier_core::TierId;
use parking_lot::Mutex;

/// Number of shards (power of 2).
const NUM_SHARDS: usize = 16;

/// A live block handed out through a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub tier: TierId,
    /// Requested size, as accounted to the tier.
    pub size: usize,
}

pub struct OwnershipTable {
    shards: Box<[Mutex<HashMap<usize, Allocation>>]>,
}

impl OwnershipTable {
    #[must_use]
    pub fn new() -> Self {
        let shards: Vec<_> = (0..NUM_SHARDS)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards: shards.into_boxed_slice(),
        }
    }

    #[inline]
    fn shard(&self, addr: usize) -> &Mutex<HashMap<usize, Allocation>> {
        &self.shards[(addr >> 12) % NUM_SHARDS]
    }

    pub fn insert(&self, addr: usize, allocation: Allocation) {
        self.shard(addr).lock().insert(addr, allocation);
    }

    #[must_use]
    pub fn get(&self, addr: usize) -> Option<Allocation> {
        self.shard(addr).lock().get(&addr).copied()
    }

    pub fn remove(&self, addr: usize) -> Option<Allocation> {
        self.shard(addr).lock().remove(&addr)
    }

    /// Number of live blocks across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OwnershipTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OwnershipTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipTable")
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove() {
        let table = OwnershipTable::new();
        let a = Allocation {
            tier: TierId(1),
            size: 64,
        };
        table.insert(0x7000_1000, a);
        table.insert(0x7000_2000, Allocation { tier: TierId(0), size: 8 });
        assert_eq!(table.get(0x7000_1000), Some(a));
        assert_eq!(table.len(), 2);
        assert_eq!(table.remove(0x7000_1000), Some(a));
        assert_eq!(table.remove(0x7000_1000), None);
        assert_eq!(table.get(0xdead_beef), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn concurrent_disjoint_inserts() {
        let table = std::sync::Arc::new(OwnershipTable::new());
        let handles: Vec<_> = (0..4usize)
            .map(|t| {
                let table = std::sync::Arc::clone(&table);
                std::thread::spawn(move || {
                    for i in 0..1000usize {
                        let addr = (t << 32) | (i << 4);
                        table.insert(addr, Allocation { tier: TierId(t), size: i });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 4000);
        assert_eq!(
            table.get((3 << 32) | (999 << 4)),
            Some(Allocation {
                tier: TierId(3),
                size: 999
            })
        );
    }
}
