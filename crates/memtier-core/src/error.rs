//! Configuration error taxonomy.
//!
//! The `Display` text of every variant is the exact message body written at
//! ERROR level when initialization is abandoned.

use thiserror::Error;

use crate::config::KindName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unsupported kind: {0}")]
    UnsupportedKind(String),
    #[error("Unsupported pmem_path: {0}")]
    UnsupportedPmemPath(String),
    #[error("Unsupported pmem_size format: {0}")]
    UnsupportedPmemSize(String),
    #[error("Ratio not provided")]
    RatioNotProvided,
    #[error("Unsupported ratio: {0}")]
    UnsupportedRatio(String),
    #[error("Kind already declared: {0}")]
    DuplicateKind(KindName),
    #[error("No tiers declared")]
    NoTiers,
    #[error("Missing MEMKIND_MEM_TIERING_CONFIG")]
    MissingConfig,
    #[error("Wrong value of MEMKIND_MEM_TIERING_LOG_LEVEL={0}")]
    WrongLogLevel(String),
    #[error("Unsupported policy: {0}")]
    UnsupportedPolicy(String),
}
