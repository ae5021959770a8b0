//! Placement policies.
//!
//! A policy answers one question per allocation: which tier services it.
//! Three policies exist:
//!
//! - [`RatioRoundRobin`]: credit-based weighted round robin (default).
//! - [`StaticThreshold`]: steer towards the tier furthest below its share of
//!   allocated bytes.
//! - [`DynamicThreshold`]: size-class thresholds that drift until the
//!   allocated bytes of adjacent tiers approach their ratio.
//!
//! Policies are plain state machines; callers serialize access (the
//! membrane keeps the active policy under a mutex).

mod builder;
pub mod ctl;
mod dynamic_threshold;
mod round_robin;
mod static_threshold;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::ConfigError;

pub use builder::PolicyBuilder;
pub use ctl::CtlError;
pub use dynamic_threshold::{
    DEFAULT_CHANGE, DEFAULT_CHECK_CNT, DEFAULT_STEP, DEFAULT_TRIGGER, DynamicThreshold,
    DynamicTuning, ThresholdConfig,
};
pub use round_robin::RatioRoundRobin;
pub use static_threshold::StaticThreshold;

/// Index of a tier in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TierId(pub usize);

impl TierId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of the bytes currently allocated in each tier.
pub trait TierUsage {
    fn tier_count(&self) -> usize;
    fn allocated(&self, tier: TierId) -> usize;
}

impl TierUsage for [usize] {
    fn tier_count(&self) -> usize {
        self.len()
    }

    fn allocated(&self, tier: TierId) -> usize {
        self.get(tier.index()).copied().unwrap_or(0)
    }
}

impl<const N: usize> TierUsage for [usize; N] {
    fn tier_count(&self) -> usize {
        N
    }

    fn allocated(&self, tier: TierId) -> usize {
        self.as_slice().allocated(tier)
    }
}

/// Policy selector, read from `MEMKIND_MEM_TIERING_POLICY`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyKind {
    #[default]
    RoundRobin,
    StaticThreshold,
    DynamicThreshold,
}

impl PolicyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "ROUND_ROBIN",
            Self::StaticThreshold => "STATIC_THRESHOLD",
            Self::DynamicThreshold => "DYNAMIC_THRESHOLD",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the policy selector. Unset means round robin.
pub fn parse_policy(raw: Option<&str>) -> Result<PolicyKind, ConfigError> {
    match raw {
        None | Some("ROUND_ROBIN") => Ok(PolicyKind::RoundRobin),
        Some("STATIC_THRESHOLD") => Ok(PolicyKind::StaticThreshold),
        Some("DYNAMIC_THRESHOLD") => Ok(PolicyKind::DynamicThreshold),
        Some(other) => Err(ConfigError::UnsupportedPolicy(other.to_string())),
    }
}

/// Errors detected while building a policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("No tiers declared")]
    NoTiers,
    #[error("Ratio of tier {0} has to be >= 1")]
    ZeroRatio(TierId),
    #[error("At least 2 tiers are required by DYNAMIC_THRESHOLD policy")]
    DynamicNeedsTwoTiers,
    #[error("Threshold {id} configured but only {tiers} tiers declared")]
    ExtraThreshold { id: usize, tiers: usize },
    #[error("Minimum value of threshold {id} is too high (min = {min}, val = {val})")]
    ThresholdMinTooHigh { id: usize, min: usize, val: usize },
    #[error("Maximum value of threshold {id} is too low (val = {val}, max = {max})")]
    ThresholdMaxTooLow { id: usize, val: usize, max: usize },
    #[error("Maximum value of threshold {prev} should be less than minimum value of threshold {id}")]
    ThresholdOverlap { prev: usize, id: usize },
    #[error("Threshold check count has to be > 0")]
    ZeroCheckCount,
    #[error("Threshold trigger value has to be >= 0")]
    NegativeTrigger,
    #[error("Threshold change value has to be >= 0")]
    NegativeChange,
}

/// The active placement policy.
#[derive(Debug, Clone)]
pub enum TierPolicy {
    RoundRobin(RatioRoundRobin),
    StaticThreshold(StaticThreshold),
    DynamicThreshold(DynamicThreshold),
}

impl TierPolicy {
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::RoundRobin(_) => PolicyKind::RoundRobin,
            Self::StaticThreshold(_) => PolicyKind::StaticThreshold,
            Self::DynamicThreshold(_) => PolicyKind::DynamicThreshold,
        }
    }

    /// Number of tiers the policy chooses between.
    #[must_use]
    pub fn tier_count(&self) -> usize {
        match self {
            Self::RoundRobin(p) => p.tier_count(),
            Self::StaticThreshold(p) => p.tier_count(),
            Self::DynamicThreshold(p) => p.tier_count(),
        }
    }

    /// Choose the tier for an allocation of `size` bytes.
    pub fn select<U: TierUsage + ?Sized>(&mut self, size: usize, usage: &U) -> TierId {
        match self {
            Self::RoundRobin(p) => p.next(),
            Self::StaticThreshold(p) => p.select(usage),
            Self::DynamicThreshold(p) => p.select(size),
        }
    }

    /// Feed back the usage after a completed memory operation.
    pub fn observe<U: TierUsage + ?Sized>(&mut self, usage: &U) {
        if let Self::DynamicThreshold(p) = self {
            p.observe(usage);
        }
    }
}
