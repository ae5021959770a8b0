// Every export takes raw pointers straight from C callers; the contracts are
// the C allocator contracts, so per-function safety sections would only repeat them.
#![allow(clippy::missing_safety_doc)]
//! # memtier-abi
//!
//! The `LD_PRELOAD` face of memtier. This crate produces `libmemtier.so`,
//! which exports `malloc`, `calloc`, `realloc`, `memalign`, `posix_memalign`
//! and `free` and forwards each call to the process-wide
//! [`memtier_membrane::MemTiering`].
//!
//! ```text
//! application -> ABI entry (this crate) -> MemTiering -> tier kind -> return
//!                    |
//!                    +-- nested or pre-init call -> native allocator
//! ```
//!
//! A process whose environment does not describe a valid tiering setup keeps
//! running on the native allocator after a single ERROR line.

pub mod state;

// Gated behind cfg(not(test)) because the exports shadow the system
// allocator inside the unit-test binary otherwise.
#[cfg(not(test))]
pub mod malloc_abi;
