//! One-shot initialization from the environment.
//!
//! Order matters: the log level is resolved first (so later errors are
//! reported), then the declaration and policy are fully validated, and only
//! then are kinds constructed. Any failure writes exactly one ERROR line.

use memtier_core::config::parse_env;
use memtier_core::log_level::parse_log_level;
use memtier_core::message::{InitMessage, describe_tier};
use memtier_core::policy::{PolicyError, parse_policy};
use memtier_core::{CONFIG_ENV, ConfigError, LOG_LEVEL_ENV, LogLevel, POLICY_ENV, PolicyBuilder};
use thiserror::Error;

use crate::kind::ConstructionError;
use crate::logger::{LogSink, Logger};
use crate::registry::TierRegistry;
use crate::tiering::MemTiering;

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

/// Raw values of the three environment variables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TieringEnv {
    pub config: Option<String>,
    pub log_level: Option<String>,
    pub policy: Option<String>,
}

impl TieringEnv {
    /// Read the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            config: std::env::var(CONFIG_ENV).ok(),
            log_level: std::env::var(LOG_LEVEL_ENV).ok(),
            policy: std::env::var(POLICY_ENV).ok(),
        }
    }

    #[must_use]
    pub fn with_config(config: &str) -> Self {
        Self {
            config: Some(config.to_string()),
            ..Self::default()
        }
    }
}

fn reported(logger: &Logger, err: impl Into<InitError>) -> InitError {
    let err = err.into();
    logger.error(&err);
    err
}

/// Validate the environment and build the tiering state, writing the init
/// lines to `sink`.
pub fn bootstrap(env: &TieringEnv, sink: Box<dyn LogSink>) -> Result<MemTiering, InitError> {
    let logger = Logger::new(LogLevel::Error, sink);
    let level = parse_log_level(env.log_level.as_deref()).map_err(|e| reported(&logger, e))?;
    let logger = logger.with_level(level);
    logger.debug(&InitMessage::SettingLogLevel(level));

    let config = parse_env(env.config.as_deref()).map_err(|e| reported(&logger, e))?;
    let kind = parse_policy(env.policy.as_deref()).map_err(|e| reported(&logger, e))?;
    let policy = PolicyBuilder::from_config(kind, &config)
        .build()
        .map_err(|e| reported(&logger, e))?;

    let registry = TierRegistry::build(&config).map_err(|e| reported(&logger, e))?;

    logger.info(&InitMessage::Loaded);
    for tier in config.tiers() {
        for message in describe_tier(tier) {
            logger.log(message.level(), format_args!("{message}"));
        }
    }

    Ok(MemTiering::new(logger, registry, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::CaptureSink;

    fn run(env: &TieringEnv) -> (Result<MemTiering, InitError>, Vec<String>) {
        let sink = CaptureSink::new();
        let result = bootstrap(env, Box::new(sink.clone()));
        (result, sink.lines())
    }

    fn env(config: &str, level: Option<&str>) -> TieringEnv {
        TieringEnv {
            config: Some(config.to_string()),
            log_level: level.map(str::to_string),
            policy: None,
        }
    }

    #[test]
    fn silent_by_default() {
        for level in [None, Some("0")] {
            let (result, lines) = run(&env("DRAM:1", level));
            assert!(result.is_ok());
            assert!(lines.is_empty(), "{lines:?}");
        }
    }

    #[test]
    fn info_prints_banner_only() {
        let (result, lines) = run(&env("DRAM:1", Some("1")));
        assert!(result.is_ok());
        assert_eq!(lines, ["MEMKIND_MEM_TIERING_LOG_INFO: Memkind memtier lib loaded!"]);
    }

    #[test]
    fn debug_describes_every_tier() {
        let (result, lines) = run(&env("FS_DAX:/tmp/:N/A:1;DRAM:3", Some("2")));
        assert!(result.is_ok());
        assert_eq!(
            lines,
            [
                "MEMKIND_MEM_TIERING_LOG_DEBUG: Setting log level to: 2",
                "MEMKIND_MEM_TIERING_LOG_INFO: Memkind memtier lib loaded!",
                "MEMKIND_MEM_TIERING_LOG_DEBUG: kind_name: FS_DAX",
                "MEMKIND_MEM_TIERING_LOG_DEBUG: pmem_path: /tmp/",
                "MEMKIND_MEM_TIERING_LOG_DEBUG: pmem_size: N/A",
                "MEMKIND_MEM_TIERING_LOG_DEBUG: ratio_value: 1",
                "MEMKIND_MEM_TIERING_LOG_DEBUG: kind_name: DRAM",
                "MEMKIND_MEM_TIERING_LOG_DEBUG: ratio_value: 3",
            ]
        );
    }

    #[test]
    fn wrong_log_level_is_the_only_line() {
        for raw in ["-1", "4"] {
            let (result, lines) = run(&env("DRAM:1", Some(raw)));
            assert!(matches!(result, Err(InitError::Config(ConfigError::WrongLogLevel(_)))));
            assert_eq!(
                lines,
                [format!(
                    "MEMKIND_MEM_TIERING_LOG_ERROR: Wrong value of MEMKIND_MEM_TIERING_LOG_LEVEL={raw}"
                )]
            );
        }
    }

    #[test]
    fn config_error_after_level_line() {
        let (result, lines) = run(&env("DRAM:A", Some("2")));
        assert!(result.is_err());
        assert_eq!(
            lines,
            [
                "MEMKIND_MEM_TIERING_LOG_DEBUG: Setting log level to: 2",
                "MEMKIND_MEM_TIERING_LOG_ERROR: Unsupported ratio: A",
            ]
        );
    }

    #[test]
    fn missing_config() {
        let (result, lines) = run(&TieringEnv::default());
        assert!(result.is_err());
        assert_eq!(
            lines,
            ["MEMKIND_MEM_TIERING_LOG_ERROR: Missing MEMKIND_MEM_TIERING_CONFIG"]
        );
    }

    #[test]
    fn policy_errors_are_reported_before_kinds_exist() {
        let mut bad_policy = env("DRAM:1", Some("1"));
        bad_policy.policy = Some("FIRST_FIT".into());
        let (_, lines) = run(&bad_policy);
        assert_eq!(lines, ["MEMKIND_MEM_TIERING_LOG_ERROR: Unsupported policy: FIRST_FIT"]);

        let mut single = env("DRAM:1", None);
        single.policy = Some("DYNAMIC_THRESHOLD".into());
        let (result, lines) = run(&single);
        assert!(matches!(result, Err(InitError::Policy(PolicyError::DynamicNeedsTwoTiers))));
        assert_eq!(
            lines,
            ["MEMKIND_MEM_TIERING_LOG_ERROR: At least 2 tiers are required by DYNAMIC_THRESHOLD policy"]
        );
    }

    #[test]
    fn construction_failure_suppresses_banner() {
        let (result, lines) = run(&env("DRAM:1;FS_DAX:/no/such/dir:N/A:1", Some("1")));
        assert!(matches!(result, Err(InitError::Construction(_))));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("MEMKIND_MEM_TIERING_LOG_ERROR: Unsupported pmem_path"));
    }

    #[test]
    fn with_config_defaults_the_rest() {
        let env = TieringEnv::with_config("DRAM:1");
        assert_eq!(env.log_level, None);
        assert_eq!(env.policy, None);
        assert!(run(&env).0.is_ok());
    }
}
