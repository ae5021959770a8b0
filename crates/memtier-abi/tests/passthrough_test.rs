//! Without a tiering configuration every export behaves like the native
//! allocator. This binary never sets MEMKIND_MEM_TIERING_CONFIG.

use std::ffi::c_void;
use std::ptr;

use memtier::malloc_abi::{calloc, free, malloc, memalign, posix_memalign, realloc};
use memtier::state::{self, Lifecycle};

#[test]
fn missing_config_disables_tiering() {
    // SAFETY: plain allocate/release pair.
    unsafe {
        let p = malloc(32);
        assert!(!p.is_null());
        free(p);
    }
    assert_eq!(state::lifecycle(), Lifecycle::Disabled);
    assert!(state::tiering().is_none());
}

#[test]
fn passthrough_round_trip() {
    // SAFETY: every block is released exactly once and written within bounds.
    unsafe {
        let p = malloc(64).cast::<u8>();
        assert!(!p.is_null());
        ptr::write_bytes(p, 0x5A, 64);

        let q = realloc(p.cast(), 4096).cast::<u8>();
        assert!(!q.is_null());
        assert_eq!(*q.add(63), 0x5A);

        let z = calloc(16, 16).cast::<u8>();
        assert!(!z.is_null());
        assert!((0..256).all(|i| *z.add(i) == 0));

        free(q.cast());
        free(z.cast());
        free(ptr::null_mut());
    }
}

#[test]
fn aligned_passthrough() {
    // SAFETY: `out` is a valid slot; blocks are released once.
    unsafe {
        let a = memalign(256, 100);
        assert!(!a.is_null());
        assert_eq!(a as usize % 256, 0);
        free(a);

        let mut out: *mut c_void = ptr::null_mut();
        assert_eq!(posix_memalign(&mut out, 64, 10), 0);
        assert_eq!(out as usize % 64, 0);
        free(out);

        let mut untouched: *mut c_void = ptr::null_mut();
        assert_eq!(posix_memalign(&mut untouched, 3, 10), libc::EINVAL);
        assert!(untouched.is_null());
        assert_eq!(posix_memalign(ptr::null_mut(), 64, 10), libc::EINVAL);
    }
}

#[test]
fn native_blocks_are_interchangeable() {
    // SAFETY: blocks cross between the export and the native allocator, which
    // are the same allocator while tiering is disabled.
    unsafe {
        let p = memtier_membrane::native::malloc(48);
        let p = realloc(p, 96);
        assert!(!p.is_null());
        free(p);
    }
}
