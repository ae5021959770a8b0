use serde::Serialize;

use super::{PolicyError, TierId, TierUsage};

/// Operations between two threshold adjustments.
pub const DEFAULT_CHECK_CNT: u32 = 5;
/// Relative distance from the target ratio that triggers an adjustment.
pub const DEFAULT_TRIGGER: f32 = 0.1;
/// Fraction of the current value a threshold moves by per adjustment.
pub const DEFAULT_CHANGE: f32 = 0.25;
/// Default spacing between thresholds, in bytes.
pub const DEFAULT_STEP: usize = 1024;

/// Size boundary between tier `i` and tier `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdConfig {
    pub val: usize,
    pub min: usize,
    pub max: usize,
}

impl ThresholdConfig {
    /// Default threshold placed after `prev` (`None` for the first one).
    #[must_use]
    pub fn default_after(prev: Option<&ThresholdConfig>, step: usize) -> Self {
        let half = step / 2;
        match prev {
            None => Self {
                val: step,
                min: half,
                max: step.saturating_add(half).saturating_sub(1),
            },
            Some(prev) => {
                let val = prev.max.saturating_add(half);
                Self {
                    val,
                    min: prev.max.saturating_add(1),
                    max: val.saturating_add(half).saturating_sub(1),
                }
            }
        }
    }
}

/// Tuning knobs shared by every threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DynamicTuning {
    pub check_cnt: u32,
    pub trigger: f32,
    pub change: f32,
    pub step: usize,
}

impl Default for DynamicTuning {
    fn default() -> Self {
        Self {
            check_cnt: DEFAULT_CHECK_CNT,
            trigger: DEFAULT_TRIGGER,
            change: DEFAULT_CHANGE,
            step: DEFAULT_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Threshold {
    cfg: ThresholdConfig,
    // Desired allocated(i + 1) / allocated(i).
    norm_ratio: f32,
}

/// Size-class placement with self-adjusting boundaries.
///
/// An allocation goes to the first tier whose threshold is above its size,
/// or to the last tier. Every `check_cnt` observed operations each boundary
/// is nudged so that the allocated bytes of adjacent tiers drift towards the
/// ratio between their weights.
#[derive(Debug, Clone)]
pub struct DynamicThreshold {
    thresholds: Box<[Threshold]>,
    check_cnt: u32,
    countdown: u32,
    trigger: f32,
    change: f32,
}

impl DynamicThreshold {
    /// Build from tier ratios and explicitly configured thresholds. Missing
    /// thresholds are filled in with defaults spaced by `tuning.step`.
    pub fn new(
        ratios: &[u32],
        configured: &[ThresholdConfig],
        tuning: &DynamicTuning,
    ) -> Result<Self, PolicyError> {
        if let Some(idx) = ratios.iter().position(|r| *r == 0) {
            return Err(PolicyError::ZeroRatio(TierId(idx)));
        }
        if ratios.len() < 2 {
            return Err(PolicyError::DynamicNeedsTwoTiers);
        }
        let wanted = ratios.len() - 1;
        if configured.len() > wanted {
            return Err(PolicyError::ExtraThreshold {
                id: configured.len() - 1,
                tiers: ratios.len(),
            });
        }

        let mut cfgs = configured.to_vec();
        while cfgs.len() < wanted {
            let next = ThresholdConfig::default_after(cfgs.last(), tuning.step);
            cfgs.push(next);
        }

        for (id, cfg) in cfgs.iter().enumerate() {
            if cfg.min > cfg.val {
                return Err(PolicyError::ThresholdMinTooHigh {
                    id,
                    min: cfg.min,
                    val: cfg.val,
                });
            }
            if cfg.val > cfg.max {
                return Err(PolicyError::ThresholdMaxTooLow {
                    id,
                    val: cfg.val,
                    max: cfg.max,
                });
            }
            if id > 0 && cfgs[id - 1].max > cfg.min {
                return Err(PolicyError::ThresholdOverlap { prev: id - 1, id });
            }
        }
        if tuning.change.is_nan() || tuning.change < 0.0 {
            return Err(PolicyError::NegativeChange);
        }
        if tuning.trigger.is_nan() || tuning.trigger < 0.0 {
            return Err(PolicyError::NegativeTrigger);
        }
        if tuning.check_cnt == 0 {
            return Err(PolicyError::ZeroCheckCount);
        }

        let thresholds = cfgs
            .iter()
            .enumerate()
            .map(|(id, cfg)| Threshold {
                cfg: *cfg,
                norm_ratio: ratios[id + 1] as f32 / ratios[id] as f32,
            })
            .collect();

        Ok(Self {
            thresholds,
            check_cnt: tuning.check_cnt,
            countdown: tuning.check_cnt,
            trigger: tuning.trigger,
            change: tuning.change,
        })
    }

    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.thresholds.len() + 1
    }

    /// Current boundaries, lowest first.
    pub fn thresholds(&self) -> impl Iterator<Item = ThresholdConfig> + '_ {
        self.thresholds.iter().map(|t| t.cfg)
    }

    #[must_use]
    pub fn norm_ratio(&self, id: usize) -> Option<f32> {
        self.thresholds.get(id).map(|t| t.norm_ratio)
    }

    pub fn select(&self, size: usize) -> TierId {
        let idx = self
            .thresholds
            .iter()
            .position(|t| size < t.cfg.val)
            .unwrap_or(self.thresholds.len());
        TierId(idx)
    }

    /// Count one operation; every `check_cnt` calls re-balance the
    /// thresholds against `usage`.
    pub fn observe<U: TierUsage + ?Sized>(&mut self, usage: &U) {
        self.countdown -= 1;
        if self.countdown > 0 {
            return;
        }
        self.countdown = self.check_cnt;

        for (idx, threshold) in self.thresholds.iter_mut().enumerate() {
            let prev = usage.allocated(TierId(idx));
            let next = usage.allocated(TierId(idx + 1));
            let norm = threshold.norm_ratio;

            let current = if prev > 0 {
                let ratio = next as f32 / prev as f32;
                if (ratio - norm).abs() < self.trigger {
                    continue;
                }
                Some(ratio)
            } else {
                None
            };

            let cfg = &mut threshold.cfg;
            let delta = (cfg.val as f32 * self.change) as usize;
            if current.is_none_or(|ratio| ratio > norm) {
                if let Some(raised) = cfg.val.checked_add(delta)
                    && raised <= cfg.max
                {
                    cfg.val = raised;
                }
            } else if let Some(lowered) = cfg.val.checked_sub(delta)
                && lowered >= cfg.min
            {
                cfg.val = lowered;
            }
        }
    }
}
