//! Environment validation without constructing any kind.

use memtier_core::config::parse_env;
use memtier_core::log_level::parse_log_level;
use memtier_core::message::{InitMessage, describe_tier};
use memtier_core::policy::parse_policy;
use memtier_core::{LogLevel, PolicyBuilder, PolicyKind, TieringConfig};
use serde::Serialize;

use crate::error::HarnessError;

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<TieringConfig>,
    /// Lines the library would print at load, in order.
    pub lines: Vec<String>,
}

struct Preview {
    level: LogLevel,
    lines: Vec<String>,
}

impl Preview {
    fn push(&mut self, level: LogLevel, body: impl std::fmt::Display) {
        if self.level.admits(level) {
            self.lines.push(format!("{}{body}", level.prefix()));
        }
    }
}

/// Validate the three environment values in bootstrap order.
///
/// Kind construction is not attempted, so an FS_DAX path that exists only on
/// the target machine still checks clean here.
#[must_use]
pub fn check(config: Option<&str>, log_level: Option<&str>, policy: Option<&str>) -> CheckReport {
    let mut report = CheckReport {
        ok: false,
        error: None,
        log_level: None,
        policy: None,
        config: None,
        lines: Vec::new(),
    };
    let mut preview = Preview {
        level: LogLevel::Error,
        lines: Vec::new(),
    };

    if let Err(err) = run(&mut report, &mut preview, config, log_level, policy) {
        preview.push(LogLevel::Error, &err);
        report.error = Some(err.to_string());
    } else {
        report.ok = true;
    }
    report.lines = preview.lines;
    report
}

fn run(
    report: &mut CheckReport,
    preview: &mut Preview,
    config: Option<&str>,
    log_level: Option<&str>,
    policy: Option<&str>,
) -> Result<(), HarnessError> {
    let level = parse_log_level(log_level)?;
    report.log_level = Some(level);
    preview.level = level;
    preview.push(LogLevel::Debug, InitMessage::SettingLogLevel(level));

    let parsed = parse_env(config)?;
    let kind = parse_policy(policy)?;
    PolicyBuilder::from_config(kind, &parsed).build()?;
    report.policy = Some(kind);

    preview.push(LogLevel::Info, InitMessage::Loaded);
    for tier in parsed.tiers() {
        for message in describe_tier(tier) {
            preview.push(message.level(), &message);
        }
    }
    report.config = Some(parsed);
    Ok(())
}
