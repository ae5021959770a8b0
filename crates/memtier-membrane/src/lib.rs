//! # memtier-membrane
//!
//! The stateful middle layer of memtier: memory kinds, the tier registry,
//! pointer ownership, the line logger and the allocation operations that the
//! ABI layer forwards intercepted calls to.
//!
//! Nothing here exports C symbols; [`MemTiering`] can be driven directly from
//! tests without preloading anything.

pub mod bootstrap;
pub mod fsdax;
pub mod kind;
pub mod logger;
pub mod native;
pub mod ownership;
pub mod registry;
pub mod tiering;

pub use bootstrap::{InitError, TieringEnv, bootstrap};
pub use kind::{ConstructionError, DramKind, Kind};
pub use logger::{CaptureSink, LogSink, Logger, StdoutSink};
pub use registry::{TierRegistry, TierRuntime};
pub use tiering::MemTiering;
