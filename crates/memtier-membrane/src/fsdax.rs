//! File-backed persistent-memory region.
//!
//! The region is an unlinked temporary file inside the configured directory,
//! mapped `MAP_SHARED`. A fixed size truncates the file to that size up
//! front; an unlimited size reserves a large `MAP_NORESERVE` window and
//! extends the file in fixed steps as the bump pointer advances.
//!
//! Blocks come from a coalescing first-fit free list, then from the bump
//! pointer. All bookkeeping lives on the regular heap, never inside the
//! mapping.

use std::collections::{BTreeMap, HashMap};
use std::ffi::{CString, c_int, c_void};
use std::path::Path;

use parking_lot::Mutex;

use crate::kind::ConstructionError;

/// Smallest accepted fixed capacity.
pub const MIN_PMEM_SIZE: u64 = 16 << 20;

/// Address-space reservation for a growable region.
pub const GROWABLE_RESERVATION: usize = 64 << 30;

/// File extension granularity for a growable region.
pub const GROW_STEP: usize = 32 << 20;

/// Every block size is a multiple of this, and so is every block offset.
pub const BLOCK_ALIGN: usize = 16;

const TEMPFILE_NAME: &str = "memtier.XXXXXX";

#[inline]
fn round_up(value: usize, align: usize) -> Option<usize> {
    Some(value.checked_add(align - 1)? & !(align - 1))
}

struct Region {
    base: *mut u8,
    fd: c_int,
    reserved: usize,
    committed: usize,
    growable: bool,
    bump: usize,
    // offset -> length, non-adjacent.
    free: BTreeMap<usize, usize>,
    // offset -> length of live blocks.
    live: HashMap<usize, usize>,
}

// SAFETY: the mapping is process-wide; all access to `Region` goes through
// the owning mutex.
unsafe impl Send for Region {}

impl Region {
    fn open(dir: &Path, capacity: Option<u64>) -> Result<Self, ConstructionError> {
        let (reserved, growable) = match capacity {
            None | Some(0) => (GROWABLE_RESERVATION, true),
            Some(bytes) if bytes < MIN_PMEM_SIZE => {
                return Err(ConstructionError::PmemSizeTooSmall { size: bytes });
            }
            Some(bytes) => {
                let bytes = usize::try_from(bytes)
                    .ok()
                    .and_then(|b| round_up(b, page_size()))
                    .ok_or(ConstructionError::PmemSizeTooLarge { size: bytes })?;
                (bytes, false)
            }
        };
        let committed = if growable { 0 } else { reserved };

        let fd = create_unlinked_tempfile(dir)?;
        if committed > 0 && let Err(err) = truncate(fd, committed) {
            // SAFETY: `fd` is owned here and not yet shared.
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let mut flags = libc::MAP_SHARED;
        if growable {
            flags |= libc::MAP_NORESERVE;
        }
        // SAFETY: fresh mapping of an owned descriptor; the kernel picks the
        // address.
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                reserved,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                fd,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            let source = std::io::Error::last_os_error();
            // SAFETY: `fd` is owned here and not yet shared.
            unsafe { libc::close(fd) };
            return Err(ConstructionError::Io { op: "mmap", source });
        }

        Ok(Self {
            base: base.cast(),
            fd,
            reserved,
            committed,
            growable,
            bump: 0,
            free: BTreeMap::new(),
            live: HashMap::new(),
        })
    }

    fn offset_of(&self, ptr: *mut c_void) -> Option<usize> {
        let addr = ptr as usize;
        let base = self.base as usize;
        (addr >= base && addr < base + self.reserved).then(|| addr - base)
    }

    fn ensure_committed(&mut self, end: usize) -> bool {
        if end <= self.committed {
            return true;
        }
        if !self.growable || end > self.reserved {
            return false;
        }
        let Some(target) = round_up(end, GROW_STEP).map(|t| t.min(self.reserved)) else {
            return false;
        };
        if truncate(self.fd, target).is_err() {
            return false;
        }
        self.committed = target;
        true
    }

    fn allocate(&mut self, align: usize, size: usize) -> Option<usize> {
        let align = align.max(BLOCK_ALIGN);
        let len = round_up(size.max(1), BLOCK_ALIGN)?;
        let base = self.base as usize;

        let fit = self.free.iter().find_map(|(&off, &flen)| {
            let start = round_up(base + off, align)? - base;
            let pad = start - off;
            (pad.checked_add(len)? <= flen).then_some((off, flen, start, pad))
        });
        if let Some((off, flen, start, pad)) = fit {
            self.free.remove(&off);
            if pad > 0 {
                self.free.insert(off, pad);
            }
            let tail = flen - pad - len;
            if tail > 0 {
                self.free.insert(start + len, tail);
            }
            self.live.insert(start, len);
            return Some(start);
        }

        let start = round_up(base + self.bump, align)? - base;
        let end = start.checked_add(len)?;
        if !self.ensure_committed(end) {
            return None;
        }
        if start > self.bump {
            self.release(self.bump, start - self.bump);
        }
        self.bump = end;
        self.live.insert(start, len);
        Some(start)
    }

    /// Return `[off, off + len)` to the free list, merging with neighbours
    /// and pulling the bump pointer back when the range ends at it.
    fn release(&mut self, mut off: usize, mut len: usize) {
        if let Some((&prev, &plen)) = self.free.range(..off).next_back()
            && prev + plen == off
        {
            self.free.remove(&prev);
            off = prev;
            len += plen;
        }
        if let Some(next_len) = self.free.remove(&(off + len)) {
            len += next_len;
        }
        if off + len == self.bump {
            self.bump = off;
        } else {
            self.free.insert(off, len);
        }
    }

    fn free(&mut self, off: usize) -> bool {
        match self.live.remove(&off) {
            Some(len) => {
                self.release(off, len);
                true
            }
            None => false,
        }
    }

    /// Resize in place when possible, otherwise move.
    fn reallocate(&mut self, off: usize, size: usize) -> Option<usize> {
        let old = *self.live.get(&off)?;
        let len = round_up(size.max(1), BLOCK_ALIGN)?;

        if len <= old {
            if len < old {
                self.live.insert(off, len);
                self.release(off + len, old - len);
            }
            return Some(off);
        }

        let grow = len - old;
        let end = off + old;
        if end == self.bump {
            if self.ensure_committed(off.checked_add(len)?) {
                self.bump = off + len;
                self.live.insert(off, len);
                return Some(off);
            }
        } else if let Some(&next_len) = self.free.get(&end)
            && next_len >= grow
        {
            self.free.remove(&end);
            if next_len > grow {
                self.free.insert(end + grow, next_len - grow);
            }
            self.live.insert(off, len);
            return Some(off);
        }

        let new_off = self.allocate(BLOCK_ALIGN, size)?;
        // SAFETY: both ranges lie inside the committed mapping and belong to
        // distinct live blocks.
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.add(off), self.base.add(new_off), old);
        }
        self.free(off);
        Some(new_off)
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: `base`/`reserved` describe the mapping created in `open`
        // and `fd` is owned by this region.
        unsafe {
            libc::munmap(self.base.cast(), self.reserved);
            libc::close(self.fd);
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(size).unwrap_or(4096)
}

fn truncate(fd: c_int, len: usize) -> Result<(), ConstructionError> {
    let len = libc::off_t::try_from(len).map_err(|_| ConstructionError::Io {
        op: "ftruncate",
        source: std::io::Error::from_raw_os_error(libc::EFBIG),
    })?;
    // SAFETY: `fd` is an open descriptor owned by the caller.
    if unsafe { libc::ftruncate(fd, len) } != 0 {
        return Err(ConstructionError::Io {
            op: "ftruncate",
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

fn create_unlinked_tempfile(dir: &Path) -> Result<c_int, ConstructionError> {
    let invalid_path = || ConstructionError::PmemPath {
        path: dir.display().to_string(),
    };
    if !dir.is_dir() {
        return Err(invalid_path());
    }
    let template = dir.join(TEMPFILE_NAME);
    let template = CString::new(template.into_os_string().into_encoded_bytes())
        .map_err(|_| invalid_path())?;
    let mut template = template.into_bytes_with_nul();

    // SAFETY: `template` is a writable NUL-terminated buffer ending in XXXXXX.
    let fd = unsafe { libc::mkstemp(template.as_mut_ptr().cast()) };
    if fd < 0 {
        return Err(ConstructionError::Io {
            op: "mkstemp",
            source: std::io::Error::last_os_error(),
        });
    }
    // SAFETY: `template` now holds the NUL-terminated name mkstemp created.
    if unsafe { libc::unlink(template.as_ptr().cast()) } != 0 {
        let source = std::io::Error::last_os_error();
        // SAFETY: `fd` was just opened and is owned here.
        unsafe { libc::close(fd) };
        return Err(ConstructionError::Io {
            op: "unlink",
            source,
        });
    }
    Ok(fd)
}

/// Persistent-memory kind backed by a file in `path`.
pub struct FsDaxKind {
    region: Mutex<Region>,
}

impl FsDaxKind {
    /// Create the backing file in `dir`. `capacity` of `None` or `Some(0)`
    /// makes the region growable.
    pub fn open(dir: &Path, capacity: Option<u64>) -> Result<Self, ConstructionError> {
        Ok(Self {
            region: Mutex::new(Region::open(dir, capacity)?),
        })
    }

    /// Bytes of backing file currently committed.
    #[must_use]
    pub fn committed(&self) -> usize {
        self.region.lock().committed
    }

    #[must_use]
    pub fn is_growable(&self) -> bool {
        self.region.lock().growable
    }

    /// True if `ptr` lies inside this kind's mapping.
    #[must_use]
    pub fn contains(&self, ptr: *mut c_void) -> bool {
        self.region.lock().offset_of(ptr).is_some()
    }

    pub fn allocate(&self, size: usize) -> *mut c_void {
        self.allocate_aligned(BLOCK_ALIGN, size)
    }

    pub fn allocate_zeroed(&self, size: usize) -> *mut c_void {
        let ptr = self.allocate(size);
        if !ptr.is_null() {
            // SAFETY: fresh block of at least `size` committed bytes.
            unsafe { std::ptr::write_bytes(ptr.cast::<u8>(), 0, size) };
        }
        ptr
    }

    /// `alignment` must be a power of two.
    pub fn allocate_aligned(&self, alignment: usize, size: usize) -> *mut c_void {
        let mut region = self.region.lock();
        match region.allocate(alignment, size) {
            // SAFETY: offset is inside the mapping.
            Some(off) => unsafe { region.base.add(off).cast() },
            None => std::ptr::null_mut(),
        }
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of this kind. On success the old pointer
    /// must no longer be used.
    pub unsafe fn reallocate(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        let mut region = self.region.lock();
        let moved = region
            .offset_of(ptr)
            .and_then(|off| region.reallocate(off, size));
        match moved {
            // SAFETY: offset is inside the mapping.
            Some(off) => unsafe { region.base.add(off).cast() },
            None => std::ptr::null_mut(),
        }
    }

    /// # Safety
    ///
    /// `ptr` must be a live block of this kind.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        let mut region = self.region.lock();
        if let Some(off) = region.offset_of(ptr) {
            region.free(off);
        }
    }

    /// Usable bytes of a live block, or 0 if `ptr` is not one.
    pub fn usable_size(&self, ptr: *mut c_void) -> usize {
        let region = self.region.lock();
        region
            .offset_of(ptr)
            .and_then(|off| region.live.get(&off).copied())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for FsDaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let region = self.region.lock();
        f.debug_struct("FsDaxKind")
            .field("reserved", &region.reserved)
            .field("committed", &region.committed)
            .field("live", &region.live.len())
            .finish()
    }
}
