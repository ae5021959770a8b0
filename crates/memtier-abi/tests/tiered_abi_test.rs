//! Exports with a valid configuration in the environment.

use std::ffi::c_void;
use std::ptr;
use std::sync::Once;

use memtier::malloc_abi::{calloc, free, malloc, memalign, posix_memalign, realloc};
use memtier::state::{self, Lifecycle};
use memtier_membrane::MemTiering;

static INIT: Once = Once::new();

fn tiering() -> &'static MemTiering {
    INIT.call_once(|| {
        let config = format!("FS_DAX:{}:N/A:1;DRAM:1", std::env::temp_dir().display());
        // SAFETY: the first test thread here sets the variable before any
        // test reaches the allocator exports; the others block on INIT.
        unsafe {
            std::env::set_var("MEMKIND_MEM_TIERING_CONFIG", config);
            std::env::remove_var("MEMKIND_MEM_TIERING_LOG_LEVEL");
            std::env::remove_var("MEMKIND_MEM_TIERING_POLICY");
        }
        let _ = state::tiering();
    });
    assert_eq!(state::lifecycle(), Lifecycle::Ready);
    state::tiering().expect("tiering is ready")
}

fn errno() -> i32 {
    // SAFETY: thread-local errno slot.
    unsafe { *libc::__errno_location() }
}

#[test]
fn malloc_blocks_are_owned_until_freed() {
    let tiering = tiering();
    // SAFETY: blocks are written within bounds and released once.
    unsafe {
        let blocks: Vec<*mut c_void> = (0..8).map(|i| malloc(32 + i)).collect();
        for &p in &blocks {
            assert!(!p.is_null());
            assert!(tiering.owner_of(p).is_some());
            ptr::write_bytes(p.cast::<u8>(), 0xA5, 32);
        }
        for &p in &blocks {
            free(p);
            assert!(tiering.owner_of(p).is_none());
        }
    }
}

#[test]
fn realloc_keeps_the_owning_tier() {
    let tiering = tiering();
    // SAFETY: contents are read within the smaller size; released once.
    unsafe {
        let p = malloc(40).cast::<u8>();
        let tier = tiering.owner_of(p.cast()).expect("tiered block");
        for i in 0..40 {
            *p.add(i) = i as u8;
        }
        let q = realloc(p.cast(), 10_000).cast::<u8>();
        assert_eq!(tiering.owner_of(q.cast()), Some(tier));
        assert!((0..40).all(|i| *q.add(i) == i as u8));

        assert!(realloc(q.cast(), 0).is_null());
        assert!(tiering.owner_of(q.cast()).is_none());

        let fresh = realloc(ptr::null_mut(), 8);
        assert!(tiering.owner_of(fresh).is_some());
        free(fresh);
    }
}

#[test]
fn calloc_zeroes_and_rejects_overflow() {
    let tiering = tiering();
    // SAFETY: reads stay inside the block; released once.
    unsafe {
        let z = calloc(8, 64).cast::<u8>();
        assert!(tiering.owner_of(z.cast()).is_some());
        assert!((0..512).all(|i| *z.add(i) == 0));
        free(z.cast());

        assert!(calloc(usize::MAX, 2).is_null());
    }
}

#[test]
fn alignment_errors() {
    let tiering = tiering();
    // SAFETY: `out` is a valid slot; blocks are released once.
    unsafe {
        let odd = memalign(24, 64);
        assert_eq!(odd as usize % 32, 0);
        assert!(tiering.owner_of(odd).is_some());
        free(odd);

        let plain = memalign(0, 64);
        assert!(!plain.is_null());
        assert!(tiering.owner_of(plain).is_some());
        free(plain);

        assert!(memalign(usize::MAX, 64).is_null());
        assert_eq!(errno(), libc::EINVAL);

        let a = memalign(4096, 64);
        assert_eq!(a as usize % 4096, 0);
        assert!(tiering.owner_of(a).is_some());
        free(a);

        let mut out: *mut c_void = ptr::null_mut();
        assert_eq!(posix_memalign(&mut out, 2, 64), libc::EINVAL);
        assert!(out.is_null());
        assert_eq!(posix_memalign(&mut out, 128, 64), 0);
        assert_eq!(out as usize % 128, 0);
        assert!(tiering.owner_of(out).is_some());
        free(out);
    }
}

#[test]
fn foreign_blocks_pass_through() {
    let tiering = tiering();
    // SAFETY: the block comes from the native allocator and is released once.
    unsafe {
        let p = memtier_membrane::native::malloc(64);
        assert!(tiering.owner_of(p).is_none());
        let q = realloc(p, 128);
        assert!(!q.is_null());
        assert!(tiering.owner_of(q).is_none());
        free(q);
    }
}
