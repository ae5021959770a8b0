//! Offline tooling for memtier.
//!
//! This crate provides:
//! - Configuration checking: validate an environment the way the preloaded
//!   library would, and preview the init lines it would print
//! - Routing simulation: run a placement policy over a synthetic allocation
//!   stream
//! - Log auditing: classify captured program output line by line
//!
//! Nothing here allocates through a tier; every result is computed from
//! `memtier-core` alone.

#![forbid(unsafe_code)]

pub mod audit;
pub mod check;
pub mod error;
pub mod simulate;

pub use audit::{AuditReport, audit};
pub use check::{CheckReport, check};
pub use error::HarnessError;
pub use simulate::{RouteReport, RouteRequest, route};
