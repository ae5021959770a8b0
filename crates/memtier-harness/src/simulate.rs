//! Policy routing over a synthetic allocation stream.
//!
//! Usage is modelled as the running sum of requested bytes per tier; nothing
//! is ever released, so threshold policies see usage grow monotonically.

use memtier_core::config::parse;
use memtier_core::policy::parse_policy;
use memtier_core::{PolicyBuilder, PolicyKind};
use serde::Serialize;

use crate::error::HarnessError;

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub config: String,
    pub policy: Option<String>,
    pub count: usize,
    /// Request sizes, cycled. Empty means 64 bytes.
    pub sizes: Vec<usize>,
    /// `path=value` control assignments, applied in order before building.
    pub ctl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteReport {
    pub policy: PolicyKind,
    /// Tier index chosen for each request.
    pub decisions: Vec<usize>,
    /// Requests served per tier.
    pub counts: Vec<usize>,
    /// Requested bytes per tier.
    pub bytes: Vec<usize>,
}

const DEFAULT_SIZE: usize = 64;

pub fn route(request: &RouteRequest) -> Result<RouteReport, HarnessError> {
    let config = parse(&request.config)?;
    let kind = parse_policy(request.policy.as_deref())?;
    let mut builder = PolicyBuilder::from_config(kind, &config);
    for assignment in &request.ctl {
        builder.ctl_assign(assignment)?;
    }
    let mut policy = builder.build()?;

    let tiers = config.len();
    let mut counts = vec![0usize; tiers];
    let mut bytes = vec![0usize; tiers];
    let mut decisions = Vec::with_capacity(request.count);
    let sizes: &[usize] = if request.sizes.is_empty() {
        &[DEFAULT_SIZE]
    } else {
        &request.sizes
    };

    for size in sizes.iter().copied().cycle().take(request.count) {
        let tier = policy.select(size, bytes.as_slice()).index();
        if let Some(slot) = bytes.get_mut(tier) {
            *slot = slot.saturating_add(size);
            counts[tier] += 1;
        }
        decisions.push(tier);
        policy.observe(bytes.as_slice());
    }

    Ok(RouteReport {
        policy: kind,
        decisions,
        counts,
        bytes,
    })
}
