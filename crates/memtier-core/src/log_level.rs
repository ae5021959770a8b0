//! Log verbosity levels.
//!
//! The level is read once from `MEMKIND_MEM_TIERING_LOG_LEVEL`:
//! - unset or `0`: only errors are written (no banner).
//! - `1`: the init banner is written as well.
//! - `2`: init details and one line per intercepted call.
//!
//! Any other value is itself a configuration error.

use std::fmt;

use serde::Serialize;

use crate::error::ConfigError;

/// Ordered verbosity. `Error` lines are never gated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl LogLevel {
    /// Fixed line prefix for this level.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Error => "MEMKIND_MEM_TIERING_LOG_ERROR: ",
            Self::Info => "MEMKIND_MEM_TIERING_LOG_INFO: ",
            Self::Debug => "MEMKIND_MEM_TIERING_LOG_DEBUG: ",
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True if a line of `level` is written when `self` is configured.
    #[must_use]
    pub fn admits(self, level: LogLevel) -> bool {
        level == Self::Error || level <= self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Parse the raw environment value. `None` (unset) is the silent default.
pub fn parse_log_level(raw: Option<&str>) -> Result<LogLevel, ConfigError> {
    let Some(raw) = raw else {
        return Ok(LogLevel::default());
    };
    match raw {
        "0" => Ok(LogLevel::Error),
        "1" => Ok(LogLevel::Info),
        "2" => Ok(LogLevel::Debug),
        _ => Err(ConfigError::WrongLogLevel(raw.to_string())),
    }
}
