//! Memory kinds: the backends a tier allocates from.

use std::ffi::c_void;
use std::path::Path;

use memtier_core::{KindName, TierSpec};
use thiserror::Error;

use crate::fsdax::FsDaxKind;
use crate::native;

#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("Unsupported pmem_path: {path} is not a directory")]
    PmemPath { path: String },
    #[error("pmem_size below minimum of 16M: {size}")]
    PmemSizeTooSmall { size: u64 },
    #[error("pmem_size exceeds address space: {size}")]
    PmemSizeTooLarge { size: u64 },
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Ordinary memory from the process's native allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DramKind;

impl DramKind {
    pub fn allocate(&self, size: usize) -> *mut c_void {
        native::malloc(size)
    }

    pub fn allocate_zeroed(&self, size: usize) -> *mut c_void {
        native::calloc(1, size)
    }

    pub fn allocate_aligned(&self, alignment: usize, size: usize) -> *mut c_void {
        native::memalign(alignment, size)
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of the native allocator.
    pub unsafe fn reallocate(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        // SAFETY: forwarded caller contract.
        unsafe { native::realloc(ptr, size) }
    }

    /// # Safety
    ///
    /// `ptr` must be null or a live block of the native allocator.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        // SAFETY: forwarded caller contract.
        unsafe { native::free(ptr) }
    }

    /// # Safety
    ///
    /// `ptr` must be null or a live block of the native allocator.
    pub unsafe fn usable_size(&self, ptr: *mut c_void) -> usize {
        // SAFETY: forwarded caller contract.
        unsafe { native::usable_size(ptr) }
    }
}

/// A constructed memory kind. Allocation failure is always a null pointer.
#[derive(Debug)]
pub enum Kind {
    Dram(DramKind),
    FsDax(FsDaxKind),
}

impl Kind {
    /// Construct the kind a tier declares.
    pub fn build(spec: &TierSpec) -> Result<Self, ConstructionError> {
        match spec {
            TierSpec::Dram { .. } => Ok(Self::Dram(DramKind)),
            TierSpec::FsDax { path, size, .. } => {
                FsDaxKind::open(Path::new(path), size.bytes()).map(Self::FsDax)
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> KindName {
        match self {
            Self::Dram(_) => KindName::Dram,
            Self::FsDax(_) => KindName::FsDax,
        }
    }

    pub fn allocate(&self, size: usize) -> *mut c_void {
        match self {
            Self::Dram(k) => k.allocate(size),
            Self::FsDax(k) => k.allocate(size),
        }
    }

    pub fn allocate_zeroed(&self, size: usize) -> *mut c_void {
        match self {
            Self::Dram(k) => k.allocate_zeroed(size),
            Self::FsDax(k) => k.allocate_zeroed(size),
        }
    }

    /// `alignment` must be a power of two.
    pub fn allocate_aligned(&self, alignment: usize, size: usize) -> *mut c_void {
        match self {
            Self::Dram(k) => k.allocate_aligned(alignment, size),
            Self::FsDax(k) => k.allocate_aligned(alignment, size),
        }
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of this kind.
    pub unsafe fn reallocate(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        // SAFETY: forwarded caller contract.
        unsafe {
            match self {
                Self::Dram(k) => k.reallocate(ptr, size),
                Self::FsDax(k) => k.reallocate(ptr, size),
            }
        }
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of this kind.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        // SAFETY: forwarded caller contract.
        unsafe {
            match self {
                Self::Dram(k) => k.free(ptr),
                Self::FsDax(k) => k.free(ptr),
            }
        }
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of this kind.
    pub unsafe fn usable_size(&self, ptr: *mut c_void) -> usize {
        match self {
            // SAFETY: forwarded caller contract.
            Self::Dram(k) => unsafe { k.usable_size(ptr) },
            Self::FsDax(k) => k.usable_size(ptr),
        }
    }
}
