//! Tier declaration parser.
//!
//! A declaration is a `;`-separated list of tier tokens. Each token is a
//! `:`-separated field list whose shape depends on the kind:
//!
//! - `DRAM:<ratio>`
//! - `FS_DAX:<path>:<size>:<ratio>`
//!
//! `<size>` is `N/A` (no fixed capacity) or a byte count with an optional
//! binary scale suffix (`K`, `M`, `G`, `T`, case-insensitive). `<ratio>` is a
//! positive integer weight.
//!
//! Fields are validated in a fixed order (kind, path, size, ratio) so the
//! first reported error is deterministic for a given declaration.

use std::fmt;

use serde::Serialize;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Grammar constants
// ---------------------------------------------------------------------------

/// Separator between tier tokens.
pub const TIER_SEPARATOR: char = ';';

/// Separator between fields inside a tier token.
pub const FIELD_SEPARATOR: char = ':';

/// Literal size token meaning "no fixed capacity".
pub const UNLIMITED_SIZE_TOKEN: &str = "N/A";

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;
const TIB: u64 = 1 << 40;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// Memory kinds a tier can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KindName {
    #[serde(rename = "DRAM")]
    Dram,
    #[serde(rename = "FS_DAX")]
    FsDax,
}

impl KindName {
    /// Parse a kind token. Tokens are case-sensitive.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "DRAM" => Some(Self::Dram),
            "FS_DAX" => Some(Self::FsDax),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dram => "DRAM",
            Self::FsDax => "FS_DAX",
        }
    }
}

impl fmt::Display for KindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity of a persistent-memory tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PmemSize {
    /// `N/A`: the backing file grows on demand.
    Unlimited,
    /// Fixed capacity. `token` is the declaration text, kept for logging.
    Bytes { bytes: u64, token: String },
}

impl PmemSize {
    /// Fixed capacity in bytes, if any.
    #[must_use]
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Bytes { bytes, .. } => Some(*bytes),
        }
    }
}

impl fmt::Display for PmemSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(UNLIMITED_SIZE_TOKEN),
            Self::Bytes { token, .. } => f.write_str(token),
        }
    }
}

/// One parsed tier token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum TierSpec {
    #[serde(rename = "DRAM")]
    Dram { ratio: u32 },
    #[serde(rename = "FS_DAX")]
    FsDax {
        path: String,
        size: PmemSize,
        ratio: u32,
    },
}

impl TierSpec {
    #[must_use]
    pub fn kind(&self) -> KindName {
        match self {
            Self::Dram { .. } => KindName::Dram,
            Self::FsDax { .. } => KindName::FsDax,
        }
    }

    #[must_use]
    pub fn ratio(&self) -> u32 {
        match self {
            Self::Dram { ratio } | Self::FsDax { ratio, .. } => *ratio,
        }
    }
}

/// Validated, ordered tier list. Declaration order is significant: it fixes
/// the tie-break order of every placement policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TieringConfig {
    tiers: Vec<TierSpec>,
}

impl TieringConfig {
    /// Wrap an already-parsed tier list, enforcing the list invariants:
    /// non-empty and at most one tier per kind.
    pub fn new(tiers: Vec<TierSpec>) -> Result<Self, ConfigError> {
        if tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        for (idx, tier) in tiers.iter().enumerate() {
            if tiers[..idx].iter().any(|seen| seen.kind() == tier.kind()) {
                return Err(ConfigError::DuplicateKind(tier.kind()));
            }
        }
        Ok(Self { tiers })
    }

    #[must_use]
    pub fn tiers(&self) -> &[TierSpec] {
        &self.tiers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Ratio weights in declaration order.
    #[must_use]
    pub fn ratios(&self) -> Vec<u32> {
        self.tiers.iter().map(TierSpec::ratio).collect()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a full tier declaration.
///
/// Empty tokens (for example a trailing `;`) are ignored.
pub fn parse(declaration: &str) -> Result<TieringConfig, ConfigError> {
    let tiers = declaration
        .split(TIER_SEPARATOR)
        .filter(|token| !token.is_empty())
        .map(parse_tier)
        .collect::<Result<Vec<_>, _>>()?;
    TieringConfig::new(tiers)
}

/// Parse the declaration read from the environment, where absence is itself
/// a configuration error.
pub fn parse_env(declaration: Option<&str>) -> Result<TieringConfig, ConfigError> {
    parse(declaration.ok_or(ConfigError::MissingConfig)?)
}

/// Parse a single tier token.
pub fn parse_tier(token: &str) -> Result<TierSpec, ConfigError> {
    let (kind_token, rest) = next_field(Some(token));
    let kind_token = kind_token.unwrap_or_default();
    let kind = KindName::from_token(kind_token)
        .ok_or_else(|| ConfigError::UnsupportedKind(kind_token.to_string()))?;

    match kind {
        KindName::Dram => {
            let ratio = parse_ratio(rest)?;
            Ok(TierSpec::Dram { ratio })
        }
        KindName::FsDax => {
            let (path, rest) = next_field(rest);
            let path = path.unwrap_or_default();
            if path.is_empty() {
                return Err(ConfigError::UnsupportedPmemPath(path.to_string()));
            }
            let (size, rest) = next_field(rest);
            let size = parse_pmem_size(size.unwrap_or_default())?;
            let ratio = parse_ratio(rest)?;
            Ok(TierSpec::FsDax {
                path: path.to_string(),
                size,
                ratio,
            })
        }
    }
}

/// Parse a persistent-memory size token.
///
/// The scaled value must fit a signed 64-bit integer; negative numbers,
/// explicit signs, overflow and unknown suffixes are rejected rather than
/// clamped.
pub fn parse_pmem_size(token: &str) -> Result<PmemSize, ConfigError> {
    if token == UNLIMITED_SIZE_TOKEN {
        return Ok(PmemSize::Unlimited);
    }
    let invalid = || ConfigError::UnsupportedPmemSize(token.to_string());

    let digits_end = token
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return Err(invalid());
    }
    let (digits, suffix) = token.split_at(digits_end);
    let multiplier = match suffix {
        "" => 1,
        "K" | "k" => KIB,
        "M" | "m" => MIB,
        "G" | "g" => GIB,
        "T" | "t" => TIB,
        _ => return Err(invalid()),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let bytes = value
        .checked_mul(multiplier)
        .filter(|bytes| i64::try_from(*bytes).is_ok())
        .ok_or_else(invalid)?;

    Ok(PmemSize::Bytes {
        bytes,
        token: token.to_string(),
    })
}

/// Parse the ratio field. `None` and the empty string both mean the field
/// was not provided; anything else must be a positive `u32`.
pub fn parse_ratio(field: Option<&str>) -> Result<u32, ConfigError> {
    let token = match field {
        None | Some("") => return Err(ConfigError::RatioNotProvided),
        Some(token) => token,
    };
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::UnsupportedRatio(token.to_string()));
    }
    match token.parse::<u32>() {
        Ok(ratio) if ratio >= 1 => Ok(ratio),
        _ => Err(ConfigError::UnsupportedRatio(token.to_string())),
    }
}

/// Split the next `:`-separated field off `rest`.
fn next_field(rest: Option<&str>) -> (Option<&str>, Option<&str>) {
    match rest {
        None => (None, None),
        Some(text) => match text.split_once(FIELD_SEPARATOR) {
            Some((field, tail)) => (Some(field), Some(tail)),
            None => (Some(text), None),
        },
    }
}
