//! The allocation operations of the tiering layer.
//!
//! Fresh allocations ask the policy for a tier; resize and release resolve
//! the owning tier from the ownership table. Pointers the table does not
//! know are foreign (native blocks from before initialization or from nested
//! calls) and go straight to the native allocator without accounting.

use std::ffi::{c_int, c_void};

use memtier_core::message::{AllocEvent, Ptr};
use memtier_core::{PolicyKind, TierId, TierPolicy};
use parking_lot::Mutex;

use crate::kind::{DramKind, Kind};
use crate::logger::Logger;
use crate::ownership::{Allocation, OwnershipTable};
use crate::registry::{TierRegistry, TierRuntime};

/// Smallest alignment `memalign` hands to a kind.
const MIN_ALIGNMENT: usize = 16;

/// `memalign` alignment as glibc treats it: at least [`MIN_ALIGNMENT`],
/// rounded up to a power of two. `None` when no such alignment exists.
fn normalize_alignment(alignment: usize) -> Option<usize> {
    alignment.max(MIN_ALIGNMENT).checked_next_power_of_two()
}

#[derive(Debug)]
pub struct MemTiering {
    logger: Logger,
    registry: TierRegistry,
    policy: Mutex<TierPolicy>,
    /// Whether the policy consumes usage feedback; fixed at construction.
    adaptive: bool,
    ownership: OwnershipTable,
    passthrough: DramKind,
}

impl MemTiering {
    pub fn new(logger: Logger, registry: TierRegistry, policy: TierPolicy) -> Self {
        Self {
            logger,
            registry,
            adaptive: policy.kind() == PolicyKind::DynamicThreshold,
            policy: Mutex::new(policy),
            ownership: OwnershipTable::new(),
            passthrough: DramKind,
        }
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    #[must_use]
    pub fn registry(&self) -> &TierRegistry {
        &self.registry
    }

    /// Requested bytes currently live in `tier`.
    #[must_use]
    pub fn allocated_size(&self, tier: TierId) -> usize {
        self.registry.allocated(tier)
    }

    /// Tier that owns `ptr`, if it is a live tiered block.
    #[must_use]
    pub fn owner_of(&self, ptr: *mut c_void) -> Option<TierId> {
        self.ownership.get(ptr as usize).map(|a| a.tier)
    }

    /// Number of live tiered blocks.
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.ownership.len()
    }

    // -----------------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------------

    fn select(&self, size: usize) -> Option<(TierId, &Kind)> {
        let tier = self.policy.lock().select(size, &self.registry);
        self.kind_of(tier).map(|kind| (tier, kind))
    }

    fn kind_of(&self, tier: TierId) -> Option<&Kind> {
        self.registry.get(tier).map(TierRuntime::kind)
    }

    fn track(&self, tier: TierId, ptr: *mut c_void, size: usize) {
        if !ptr.is_null() {
            self.ownership.insert(ptr as usize, Allocation { tier, size });
            self.registry.record_alloc(tier, size);
        }
    }

    fn observe(&self) {
        if self.adaptive {
            self.policy.lock().observe(&self.registry);
        }
    }

    fn trace(&self, event: AllocEvent) {
        self.logger.debug(&event);
    }

    fn allocate_with(&self, size: usize, alloc: impl FnOnce(&Kind) -> *mut c_void) -> *mut c_void {
        let Some((tier, kind)) = self.select(size) else {
            return std::ptr::null_mut();
        };
        let ptr = alloc(kind);
        self.track(tier, ptr, size);
        self.observe();
        ptr
    }

    // -----------------------------------------------------------------------
    // operations
    // -----------------------------------------------------------------------

    pub fn malloc(&self, size: usize) -> *mut c_void {
        let ptr = self.allocate_with(size, |kind| kind.allocate(size));
        self.trace(AllocEvent::Malloc {
            size,
            result: Ptr(ptr as usize),
        });
        ptr
    }

    /// Zeroed array allocation; null if `num * size` overflows.
    pub fn calloc(&self, num: usize, size: usize) -> *mut c_void {
        let ptr = match num.checked_mul(size) {
            Some(total) => self.allocate_with(total, |kind| kind.allocate_zeroed(total)),
            None => std::ptr::null_mut(),
        };
        self.trace(AllocEvent::Calloc {
            num,
            size,
            result: Ptr(ptr as usize),
        });
        ptr
    }

    /// # Safety
    ///
    /// `ptr` must be null or a live block returned by this layer (or by the
    /// native allocator). On success it must no longer be used.
    pub unsafe fn realloc(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        // SAFETY: forwarded caller contract.
        let result = unsafe { self.realloc_inner(ptr, size) };
        self.trace(AllocEvent::Realloc {
            ptr: Ptr(ptr as usize),
            size,
            result: Ptr(result as usize),
        });
        result
    }

    unsafe fn realloc_inner(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        if ptr.is_null() {
            return self.allocate_with(size, |kind| kind.allocate(size));
        }
        if size == 0 {
            // SAFETY: forwarded caller contract.
            unsafe { self.release(ptr) };
            return std::ptr::null_mut();
        }
        let Some(owner) = self.ownership.get(ptr as usize) else {
            // SAFETY: foreign pointers are native blocks.
            return unsafe { self.passthrough.reallocate(ptr, size) };
        };

        let Some(kind) = self.kind_of(owner.tier) else {
            return std::ptr::null_mut();
        };
        // The entry goes before the kind can hand the address to another
        // thread, and comes back only if the old block is still live.
        self.ownership.remove(ptr as usize);
        // SAFETY: `ptr` is a live block of `kind` per the ownership table.
        let moved = unsafe { kind.reallocate(ptr, size) };
        if moved.is_null() {
            self.ownership.insert(ptr as usize, owner);
        } else {
            self.ownership.insert(
                moved as usize,
                Allocation {
                    tier: owner.tier,
                    size,
                },
            );
            self.registry.record_free(owner.tier, owner.size);
            self.registry.record_alloc(owner.tier, size);
        }
        self.observe();
        moved
    }

    /// Aligned allocation. Any alignment is accepted: it is raised to at
    /// least 16 and rounded up to a power of two, so `memalign(0, n)` behaves
    /// like `malloc(n)`. Null only when the kind fails or the rounded
    /// alignment does not fit in `usize`.
    pub fn memalign(&self, alignment: usize, size: usize) -> *mut c_void {
        let ptr = match normalize_alignment(alignment) {
            Some(align) => self.allocate_with(size, |kind| kind.allocate_aligned(align, size)),
            None => std::ptr::null_mut(),
        };
        self.trace(AllocEvent::Memalign {
            alignment,
            size,
            result: Ptr(ptr as usize),
        });
        ptr
    }

    /// Returns the block, or `EINVAL`/`ENOMEM`.
    pub fn posix_memalign(&self, alignment: usize, size: usize) -> Result<*mut c_void, c_int> {
        let result = if !alignment.is_power_of_two()
            || alignment % std::mem::size_of::<usize>() != 0
        {
            Err(libc::EINVAL)
        } else {
            let ptr = self.allocate_with(size, |kind| kind.allocate_aligned(alignment, size));
            if ptr.is_null() {
                Err(libc::ENOMEM)
            } else {
                Ok(ptr)
            }
        };
        self.trace(AllocEvent::PosixMemalign {
            alignment,
            size,
            result: Ptr(result.map_or(0, |p| p as usize)),
        });
        result
    }

    /// # Safety
    ///
    /// `ptr` must be null or a live block returned by this layer (or by the
    /// native allocator), and must not be used afterwards.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        if !ptr.is_null() {
            // SAFETY: forwarded caller contract.
            unsafe { self.release(ptr) };
        }
        self.trace(AllocEvent::Free {
            ptr: Ptr(ptr as usize),
        });
    }

    unsafe fn release(&self, ptr: *mut c_void) {
        match self.ownership.remove(ptr as usize) {
            Some(owner) => {
                if let Some(kind) = self.kind_of(owner.tier) {
                    // SAFETY: `ptr` is a live block of this tier's kind.
                    unsafe { kind.free(ptr) };
                }
                self.registry.record_free(owner.tier, owner.size);
                self.observe();
            }
            // SAFETY: foreign pointers are native blocks.
            None => unsafe { self.passthrough.free(ptr) },
        }
    }

    /// # Safety
    ///
    /// `ptr` must be null or a live block returned by this layer (or by the
    /// native allocator).
    pub unsafe fn usable_size(&self, ptr: *mut c_void) -> usize {
        if ptr.is_null() {
            return 0;
        }
        match self
            .ownership
            .get(ptr as usize)
            .and_then(|owner| self.kind_of(owner.tier))
        {
            // SAFETY: `ptr` is a live block of this tier's kind.
            Some(kind) => unsafe { kind.usable_size(ptr) },
            // SAFETY: foreign pointers are native blocks.
            None => unsafe { self.passthrough.usable_size(ptr) },
        }
    }
}
