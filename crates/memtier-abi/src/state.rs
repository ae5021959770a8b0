//! Process-wide tiering instance.
//!
//! The instance is built on first use from the environment and leaked for
//! the lifetime of the process.

use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

use memtier_membrane::{MemTiering, StdoutSink, TieringEnv, bootstrap};

// Lifecycle states.
const STATE_UNINIT: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_DISABLED: u8 = 3;

// Hand-rolled instead of OnceLock: bootstrap allocates, and the nested
// allocation must see INITIALIZING and pass through rather than wait on a
// futex held by its own thread.
static STATE: AtomicU8 = AtomicU8::new(STATE_UNINIT);
static TIERING: AtomicPtr<MemTiering> = AtomicPtr::new(std::ptr::null_mut());

/// Lifecycle as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninit,
    Initializing,
    Ready,
    /// Bootstrap failed; every call goes to the native allocator.
    Disabled,
}

#[must_use]
pub fn lifecycle() -> Lifecycle {
    match STATE.load(Ordering::Acquire) {
        STATE_UNINIT => Lifecycle::Uninit,
        STATE_INITIALIZING => Lifecycle::Initializing,
        STATE_READY => Lifecycle::Ready,
        _ => Lifecycle::Disabled,
    }
}

fn ready() -> Option<&'static MemTiering> {
    let ptr = TIERING.load(Ordering::Acquire);
    // SAFETY: TIERING is only stored once, before READY, from Box::into_raw,
    // and is never freed.
    unsafe { ptr.as_ref() }
}

/// The tiering instance, or `None` when calls must go to the native
/// allocator (initialization in progress, on this or another thread, or
/// bootstrap failed).
pub fn tiering() -> Option<&'static MemTiering> {
    match STATE.load(Ordering::Acquire) {
        STATE_READY => return ready(),
        STATE_UNINIT => {}
        _ => return None,
    }

    if STATE
        .compare_exchange(
            STATE_UNINIT,
            STATE_INITIALIZING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        // Lost the race. Use the winner's instance if it already finished.
        return if STATE.load(Ordering::Acquire) == STATE_READY {
            ready()
        } else {
            None
        };
    }

    // Errors are already written by bootstrap.
    match bootstrap(&TieringEnv::from_process(), Box::new(StdoutSink)) {
        Ok(tiering) => {
            let ptr = Box::into_raw(Box::new(tiering));
            TIERING.store(ptr, Ordering::Release);
            STATE.store(STATE_READY, Ordering::Release);
            ready()
        }
        Err(_) => {
            STATE.store(STATE_DISABLED, Ordering::Release);
            None
        }
    }
}
