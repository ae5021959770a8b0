use serde::Serialize;

use crate::config::TieringConfig;

use super::ctl::{CtlPath, ThresholdField, parse_value};
use super::{
    CtlError, DynamicThreshold, DynamicTuning, PolicyError, PolicyKind, RatioRoundRobin,
    StaticThreshold, ThresholdConfig, TierPolicy,
};

/// Collects tier ratios and tuning, then builds a [`TierPolicy`].
///
/// Thresholds touched through [`ctl_set`](Self::ctl_set) are materialised
/// with defaults (spaced by the step in effect at that moment) before the
/// field is overwritten; untouched thresholds are filled in at build time.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyBuilder {
    kind: PolicyKind,
    ratios: Vec<u32>,
    thresholds: Vec<ThresholdConfig>,
    tuning: DynamicTuning,
}

impl PolicyBuilder {
    #[must_use]
    pub fn new(kind: PolicyKind) -> Self {
        Self {
            kind,
            ratios: Vec::new(),
            thresholds: Vec::new(),
            tuning: DynamicTuning::default(),
        }
    }

    /// Builder seeded with the ratios of `config`, in declaration order.
    #[must_use]
    pub fn from_config(kind: PolicyKind, config: &TieringConfig) -> Self {
        Self::new(kind).with_ratios(&config.ratios())
    }

    #[must_use]
    pub fn with_ratios(mut self, ratios: &[u32]) -> Self {
        self.ratios.extend_from_slice(ratios);
        self
    }

    pub fn add_tier(&mut self, ratio: u32) -> &mut Self {
        self.ratios.push(ratio);
        self
    }

    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    #[must_use]
    pub fn tuning(&self) -> &DynamicTuning {
        &self.tuning
    }

    /// Thresholds configured so far (not including build-time defaults).
    #[must_use]
    pub fn thresholds(&self) -> &[ThresholdConfig] {
        &self.thresholds
    }

    /// Apply one control path. Values are decimal text.
    pub fn ctl_set(&mut self, path: &str, value: &str) -> Result<(), CtlError> {
        match CtlPath::parse(path)? {
            CtlPath::Threshold { id, field } => {
                let bytes: usize = parse_value(path, value)?;
                let threshold = self.threshold_mut(id);
                match field {
                    ThresholdField::Val => threshold.val = bytes,
                    ThresholdField::Min => threshold.min = bytes,
                    ThresholdField::Max => threshold.max = bytes,
                }
            }
            CtlPath::CheckCnt => self.tuning.check_cnt = parse_value(path, value)?,
            CtlPath::Trigger => self.tuning.trigger = parse_value(path, value)?,
            CtlPath::Change => self.tuning.change = parse_value(path, value)?,
            CtlPath::Step => self.tuning.step = parse_value(path, value)?,
        }
        Ok(())
    }

    /// Apply a `path=value` assignment.
    pub fn ctl_assign(&mut self, assignment: &str) -> Result<(), CtlError> {
        let (path, value) = assignment
            .split_once('=')
            .ok_or_else(|| CtlError::InvalidPath(assignment.to_string()))?;
        self.ctl_set(path.trim(), value.trim())
    }

    fn threshold_mut(&mut self, id: usize) -> &mut ThresholdConfig {
        while self.thresholds.len() <= id {
            let next = ThresholdConfig::default_after(self.thresholds.last(), self.tuning.step);
            self.thresholds.push(next);
        }
        &mut self.thresholds[id]
    }

    pub fn build(&self) -> Result<TierPolicy, PolicyError> {
        match self.kind {
            PolicyKind::RoundRobin => RatioRoundRobin::new(&self.ratios).map(TierPolicy::RoundRobin),
            PolicyKind::StaticThreshold => {
                StaticThreshold::new(&self.ratios).map(TierPolicy::StaticThreshold)
            }
            PolicyKind::DynamicThreshold => {
                DynamicThreshold::new(&self.ratios, &self.thresholds, &self.tuning)
                    .map(TierPolicy::DynamicThreshold)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse;
    use crate::policy::TierId;

    fn dynamic(ratios: &[u32]) -> PolicyBuilder {
        PolicyBuilder::new(PolicyKind::DynamicThreshold).with_ratios(ratios)
    }

    #[test]
    fn seeded_from_config() {
        let config = parse("FS_DAX:/tmp:N/A:3;DRAM:1").unwrap();
        let mut policy = PolicyBuilder::from_config(PolicyKind::RoundRobin, &config)
            .build()
            .unwrap();
        let picks: Vec<TierId> = (0..4).map(|_| policy.select(1, &[0usize, 0])).collect();
        assert_eq!(picks, [TierId(0), TierId(0), TierId(0), TierId(1)]);
    }

    #[test]
    fn add_tier_appends() {
        let mut builder = PolicyBuilder::new(PolicyKind::RoundRobin);
        builder.add_tier(1).add_tier(2);
        assert_eq!(builder.build().unwrap().tier_count(), 2);
    }

    #[test]
    fn ctl_sets_tuning() {
        let mut builder = dynamic(&[1, 1]);
        builder
            .ctl_set("policy.dynamic_threshold.check_cnt", "7")
            .unwrap();
        builder.ctl_set("policy.dynamic_threshold.trigger", "0.5").unwrap();
        builder.ctl_set("policy.dynamic_threshold.change", "0.1").unwrap();
        builder.ctl_set("policy.dynamic_threshold.step", "4096").unwrap();
        assert_eq!(
            builder.tuning(),
            &DynamicTuning {
                check_cnt: 7,
                trigger: 0.5,
                change: 0.1,
                step: 4096
            }
        );
        let TierPolicy::DynamicThreshold(policy) = builder.build().unwrap() else {
            panic!("expected dynamic threshold policy");
        };
        assert_eq!(policy.thresholds().next().map(|t| t.val), Some(4096));
    }

    #[test]
    fn ctl_threshold_materialises_defaults() {
        let mut builder = dynamic(&[1, 1]);
        builder
            .ctl_set("policy.dynamic_threshold.thresholds[0].val", "1200")
            .unwrap();
        assert_eq!(
            builder.thresholds(),
            &[ThresholdConfig {
                val: 1200,
                min: 512,
                max: 1535
            }]
        );
        let policy = builder.build().unwrap();
        let TierPolicy::DynamicThreshold(policy) = policy else {
            panic!("expected dynamic threshold policy");
        };
        assert_eq!(policy.select(1199), TierId(0));
        assert_eq!(policy.select(1200), TierId(1));
    }

    #[test]
    fn ctl_assign_splits_on_equals() {
        let mut builder = dynamic(&[1, 1]);
        builder
            .ctl_assign("policy.dynamic_threshold.thresholds[0].min = 100")
            .unwrap();
        assert_eq!(builder.thresholds()[0].min, 100);
        assert_eq!(
            builder.ctl_assign("policy.dynamic_threshold.step").unwrap_err(),
            CtlError::InvalidPath("policy.dynamic_threshold.step".into())
        );
    }

    #[test]
    fn ctl_rejects_bad_input() {
        let mut builder = dynamic(&[1, 1]);
        assert_eq!(
            builder.ctl_set("policy.bogus", "1").unwrap_err().to_string(),
            "Invalid path: policy.bogus"
        );
        assert_eq!(
            builder
                .ctl_set("policy.dynamic_threshold.thresholds[0].val", "-5")
                .unwrap_err()
                .to_string(),
            "Invalid value for policy.dynamic_threshold.thresholds[0].val: -5"
        );
        assert!(builder.thresholds().is_empty());
    }

    #[test]
    fn invalid_tuning_is_reported_at_build() {
        let mut builder = dynamic(&[1, 1]);
        builder
            .ctl_set("policy.dynamic_threshold.change", "-0.5")
            .unwrap();
        assert_eq!(builder.build().unwrap_err(), PolicyError::NegativeChange);

        let mut builder = dynamic(&[1, 1]);
        builder
            .ctl_set("policy.dynamic_threshold.thresholds[1].val", "5000")
            .unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            PolicyError::ExtraThreshold { id: 1, tiers: 2 }
        );
    }

    #[test]
    fn dynamic_requires_two_tiers() {
        assert_eq!(
            dynamic(&[1]).build().unwrap_err().to_string(),
            "At least 2 tiers are required by DYNAMIC_THRESHOLD policy"
        );
    }

    #[test]
    fn round_robin_without_tiers_fails() {
        assert_eq!(
            PolicyBuilder::new(PolicyKind::RoundRobin).build().unwrap_err(),
            PolicyError::NoTiers
        );
    }
}
