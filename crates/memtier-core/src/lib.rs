//! # memtier-core
//!
//! Safe, allocation-policy core of the memtier tiering layer.
//!
//! This crate owns everything that can be decided without touching memory:
//! parsing the tier declaration and log level from their environment values,
//! the fixed log line formats, and the placement policies that decide which
//! tier services the next allocation. No `unsafe` code is permitted at the
//! crate level.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod log_level;
pub mod message;
pub mod policy;

pub use config::{KindName, PmemSize, TierSpec, TieringConfig};
pub use error::ConfigError;
pub use log_level::LogLevel;
pub use policy::{PolicyBuilder, PolicyKind, TierId, TierPolicy, TierUsage};

/// Environment variable holding the tier declaration.
pub const CONFIG_ENV: &str = "MEMKIND_MEM_TIERING_CONFIG";

/// Environment variable holding the log level (`0`, `1` or `2`).
pub const LOG_LEVEL_ENV: &str = "MEMKIND_MEM_TIERING_LOG_LEVEL";

/// Environment variable selecting the placement policy.
pub const POLICY_ENV: &str = "MEMKIND_MEM_TIERING_POLICY";
