//! Direct bindings to glibc's own allocator entry points.
//!
//! The versioned `__libc_*` symbols are resolved past any interposed
//! `malloc`, so calling them never re-enters the tiering layer.

use std::ffi::{c_int, c_void};

unsafe extern "C" {
    #[link_name = "__libc_malloc@GLIBC_2.2.5"]
    fn native_libc_malloc_sym(size: usize) -> *mut c_void;
    #[link_name = "__libc_calloc@GLIBC_2.2.5"]
    fn native_libc_calloc_sym(nmemb: usize, size: usize) -> *mut c_void;
    #[link_name = "__libc_realloc@GLIBC_2.2.5"]
    fn native_libc_realloc_sym(ptr: *mut c_void, size: usize) -> *mut c_void;
    #[link_name = "__libc_free@GLIBC_2.2.5"]
    fn native_libc_free_sym(ptr: *mut c_void);
    #[link_name = "__libc_memalign@GLIBC_2.2.5"]
    fn native_libc_memalign_sym(alignment: usize, size: usize) -> *mut c_void;
    #[link_name = "posix_memalign@GLIBC_2.2.5"]
    fn native_libc_posix_memalign_sym(
        memptr: *mut *mut c_void,
        alignment: usize,
        size: usize,
    ) -> c_int;
}

#[inline]
pub fn malloc(size: usize) -> *mut c_void {
    // SAFETY: libc malloc accepts any size and reports failure as null.
    unsafe { native_libc_malloc_sym(size) }
}

#[inline]
pub fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    // SAFETY: libc calloc checks `nmemb * size` for overflow itself.
    unsafe { native_libc_calloc_sym(nmemb, size) }
}

/// # Safety
///
/// `ptr` must be null or a live block from the native allocator.
#[inline]
pub unsafe fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    unsafe { native_libc_realloc_sym(ptr, size) }
}

/// # Safety
///
/// `ptr` must be null or a live block from the native allocator.
#[inline]
pub unsafe fn free(ptr: *mut c_void) {
    // SAFETY: forwarded caller contract.
    unsafe { native_libc_free_sym(ptr) }
}

#[inline]
pub fn memalign(alignment: usize, size: usize) -> *mut c_void {
    // SAFETY: libc memalign validates the alignment and reports failure as null.
    unsafe { native_libc_memalign_sym(alignment, size) }
}

/// Returns the block, or the errno value `posix_memalign` reported.
#[inline]
pub fn posix_memalign(alignment: usize, size: usize) -> Result<*mut c_void, c_int> {
    let mut out: *mut c_void = std::ptr::null_mut();
    // SAFETY: `out` is a valid, writable pointer slot.
    let rc = unsafe { native_libc_posix_memalign_sym(&mut out, alignment, size) };
    if rc == 0 { Ok(out) } else { Err(rc) }
}

/// # Safety
///
/// `ptr` must be null or a live block from the native allocator.
#[inline]
pub unsafe fn usable_size(ptr: *mut c_void) -> usize {
    if ptr.is_null() {
        return 0;
    }
    // SAFETY: forwarded caller contract.
    unsafe { libc::malloc_usable_size(ptr) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_round_trip() {
        let p = malloc(100);
        assert!(!p.is_null());
        // SAFETY: `p` is a live native block.
        unsafe {
            assert!(usable_size(p) >= 100);
            let q = realloc(p, 4000);
            assert!(!q.is_null());
            free(q);
        }
    }

    #[test]
    fn native_calloc_zeroes() {
        let p = calloc(16, 8).cast::<u8>();
        assert!(!p.is_null());
        // SAFETY: 128 readable bytes.
        let bytes = unsafe { std::slice::from_raw_parts(p, 128) };
        assert!(bytes.iter().all(|b| *b == 0));
        // SAFETY: live native block.
        unsafe { free(p.cast()) };
    }

    #[test]
    fn native_aligned() {
        let p = memalign(256, 10);
        assert_eq!(p as usize % 256, 0);
        // SAFETY: live native block.
        unsafe { free(p) };

        let p = posix_memalign(64, 10).unwrap();
        assert_eq!(p as usize % 64, 0);
        // SAFETY: live native block.
        unsafe { free(p) };
        assert_eq!(posix_memalign(3, 10), Err(libc::EINVAL));
    }
}
