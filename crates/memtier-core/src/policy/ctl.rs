//! Dotted control paths for tuning a policy before it is built.
//!
//! Supported paths:
//!
//! ```text
//! policy.dynamic_threshold.thresholds[ID].val   bytes
//! policy.dynamic_threshold.thresholds[ID].min   bytes
//! policy.dynamic_threshold.thresholds[ID].max   bytes
//! policy.dynamic_threshold.check_cnt            u32
//! policy.dynamic_threshold.trigger              f32
//! policy.dynamic_threshold.change               f32
//! policy.dynamic_threshold.step                 bytes
//! ```

use thiserror::Error;

const DYNAMIC_PREFIX: &str = "policy.dynamic_threshold.";

/// Highest threshold id accepted in a path. Only two kinds exist, so any
/// real configuration needs threshold 0 alone.
pub const MAX_THRESHOLD_ID: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtlError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Invalid value for {path}: {value}")]
    InvalidValue { path: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdField {
    Val,
    Min,
    Max,
}

/// A parsed control path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtlPath {
    Threshold { id: usize, field: ThresholdField },
    CheckCnt,
    Trigger,
    Change,
    Step,
}

impl CtlPath {
    pub fn parse(path: &str) -> Result<Self, CtlError> {
        parse_path(path).ok_or_else(|| CtlError::InvalidPath(path.to_string()))
    }
}

fn parse_path(path: &str) -> Option<CtlPath> {
    let rest = path.strip_prefix(DYNAMIC_PREFIX)?;
    match rest {
        "check_cnt" => return Some(CtlPath::CheckCnt),
        "trigger" => return Some(CtlPath::Trigger),
        "change" => return Some(CtlPath::Change),
        "step" => return Some(CtlPath::Step),
        _ => {}
    }
    let (id, field) = rest.strip_prefix("thresholds[")?.split_once("].")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id: usize = id.parse().ok().filter(|id| *id <= MAX_THRESHOLD_ID)?;
    let field = match field {
        "val" => ThresholdField::Val,
        "min" => ThresholdField::Min,
        "max" => ThresholdField::Max,
        _ => return None,
    };
    Some(CtlPath::Threshold { id, field })
}

/// Parse `value` for `path` into `T`, mapping failures to
/// [`CtlError::InvalidValue`].
pub(crate) fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T, CtlError> {
    value.parse().map_err(|_| CtlError::InvalidValue {
        path: path.to_string(),
        value: value.to_string(),
    })
}
