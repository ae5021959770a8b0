//! Exported allocation entrypoints.
//!
//! Each entry takes the thread-local reentry guard first. A call that finds
//! the guard already held comes from inside memtier itself (bootstrap, the
//! logger, the ownership table) and goes to the native allocator untouched;
//! so does every call made while the tiering instance is unavailable. Blocks
//! served that way are foreign to the ownership table and are later released
//! natively.

use std::cell::Cell;
use std::ffi::{c_int, c_void};

use libc::{EINVAL, ENOMEM};
use memtier_membrane::native;

use crate::state;

thread_local! {
    static ALLOCATOR_REENTRY_DEPTH: Cell<u32> = const { Cell::new(0) };
}

struct AllocatorReentryGuard;

impl Drop for AllocatorReentryGuard {
    fn drop(&mut self) {
        ALLOCATOR_REENTRY_DEPTH.with(|depth| {
            let current = depth.get();
            depth.set(current.saturating_sub(1));
        });
    }
}

#[inline]
fn enter_allocator_reentry_guard() -> Option<AllocatorReentryGuard> {
    // try_with: allocations made while this thread's TLS is being torn down
    // see no guard and go native.
    ALLOCATOR_REENTRY_DEPTH
        .try_with(|depth| {
            let current = depth.get();
            if current > 0 {
                None
            } else {
                depth.set(current + 1);
                Some(AllocatorReentryGuard)
            }
        })
        .ok()
        .flatten()
}

#[inline]
fn set_errno(code: c_int) {
    // SAFETY: __errno_location returns this thread's errno slot.
    unsafe { *libc::__errno_location() = code };
}

// ---------------------------------------------------------------------------
// load-time initialization
// ---------------------------------------------------------------------------

// Release builds bootstrap when the library is loaded so the banner and any
// configuration error appear before the application's own output.
#[cfg(not(debug_assertions))]
#[used]
#[unsafe(link_section = ".init_array")]
static MEMTIER_INIT: extern "C" fn() = memtier_init;

#[cfg(not(debug_assertions))]
extern "C" fn memtier_init() {
    let Some(_reentry_guard) = enter_allocator_reentry_guard() else {
        return;
    };
    let _ = state::tiering();
}

// ---------------------------------------------------------------------------
// malloc
// ---------------------------------------------------------------------------

/// `malloc` routed through the active tiering policy.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    let Some(_reentry_guard) = enter_allocator_reentry_guard() else {
        return native::malloc(size);
    };
    match state::tiering() {
        Some(tiering) => tiering.malloc(size),
        None => native::malloc(size),
    }
}

// ---------------------------------------------------------------------------
// calloc
// ---------------------------------------------------------------------------

/// `calloc`; null when `nmemb * size` overflows.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    let Some(_reentry_guard) = enter_allocator_reentry_guard() else {
        return native::calloc(nmemb, size);
    };
    match state::tiering() {
        Some(tiering) => tiering.calloc(nmemb, size),
        None => native::calloc(nmemb, size),
    }
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

/// `realloc`. A tiered block is resized inside the tier that owns it.
///
/// # Safety
///
/// `ptr` must be null or a live block from this allocator family.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    let Some(_reentry_guard) = enter_allocator_reentry_guard() else {
        // SAFETY: caller contract.
        return unsafe { native::realloc(ptr, size) };
    };
    match state::tiering() {
        // SAFETY: caller contract.
        Some(tiering) => unsafe { tiering.realloc(ptr, size) },
        // SAFETY: without a tiering instance no block can be tiered.
        None => unsafe { native::realloc(ptr, size) },
    }
}

// ---------------------------------------------------------------------------
// memalign / posix_memalign
// ---------------------------------------------------------------------------

/// `memalign`; sets `errno` to `EINVAL` when the alignment cannot be rounded
/// up to a power of two and `ENOMEM` when the tier cannot serve the request.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn memalign(alignment: usize, size: usize) -> *mut c_void {
    let Some(_reentry_guard) = enter_allocator_reentry_guard() else {
        return native::memalign(alignment, size);
    };
    let Some(tiering) = state::tiering() else {
        return native::memalign(alignment, size);
    };
    let out = tiering.memalign(alignment, size);
    if out.is_null() {
        set_errno(if alignment > (usize::MAX >> 1) + 1 { EINVAL } else { ENOMEM });
    }
    out
}

/// `posix_memalign`: stores the block in `*memptr` and returns 0, or
/// returns `EINVAL`/`ENOMEM` leaving `*memptr` untouched.
///
/// # Safety
///
/// `memptr` must point to writable storage for one pointer.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn posix_memalign(
    memptr: *mut *mut c_void,
    alignment: usize,
    size: usize,
) -> c_int {
    if memptr.is_null() {
        return EINVAL;
    }
    let result = match enter_allocator_reentry_guard() {
        None => native::posix_memalign(alignment, size),
        Some(_reentry_guard) => match state::tiering() {
            Some(tiering) => tiering.posix_memalign(alignment, size),
            None => native::posix_memalign(alignment, size),
        },
    };
    match result {
        Ok(ptr) => {
            // SAFETY: caller guarantees `memptr` points to writable `*mut c_void`.
            unsafe { *memptr = ptr };
            0
        }
        Err(code) => code,
    }
}

// ---------------------------------------------------------------------------
// free
// ---------------------------------------------------------------------------

/// `free`. Null is a no-op (logged at DEBUG when tiering is active).
///
/// # Safety
///
/// `ptr` must be null or a live block from this allocator family, released
/// at most once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    let Some(_reentry_guard) = enter_allocator_reentry_guard() else {
        // SAFETY: caller contract.
        unsafe { native::free(ptr) };
        return;
    };
    match state::tiering() {
        // SAFETY: caller contract.
        Some(tiering) => unsafe { tiering.free(ptr) },
        // SAFETY: caller contract.
        None => unsafe { native::free(ptr) },
    }
}
