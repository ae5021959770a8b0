use super::{PolicyError, TierId, TierUsage};

/// Steers each allocation to the last tier whose allocated bytes lag its
/// share relative to tier 0.
///
/// Tier `i` (for `i > 0`) is a candidate when
/// `allocated_i * ratio_0 < allocated_0 * ratio_i`, i.e. it holds less than
/// `ratio_i / ratio_0` times what tier 0 holds. With no candidate the
/// allocation goes to tier 0.
#[derive(Debug, Clone)]
pub struct StaticThreshold {
    ratios: Box<[u32]>,
}

impl StaticThreshold {
    pub fn new(ratios: &[u32]) -> Result<Self, PolicyError> {
        if ratios.is_empty() {
            return Err(PolicyError::NoTiers);
        }
        if let Some(idx) = ratios.iter().position(|r| *r == 0) {
            return Err(PolicyError::ZeroRatio(TierId(idx)));
        }
        Ok(Self {
            ratios: ratios.into(),
        })
    }

    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.ratios.len()
    }

    pub fn select<U: TierUsage + ?Sized>(&self, usage: &U) -> TierId {
        let base_alloc = usage.allocated(TierId(0)) as u128;
        let base_ratio = u128::from(self.ratios[0]);
        let mut dest = TierId(0);
        for (idx, ratio) in self.ratios.iter().enumerate().skip(1) {
            let alloc = usage.allocated(TierId(idx)) as u128;
            if alloc * base_ratio < base_alloc * u128::from(*ratio) {
                dest = TierId(idx);
            }
        }
        dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_usage_goes_to_first_tier() {
        let policy = StaticThreshold::new(&[1, 4]).unwrap();
        assert_eq!(policy.select(&[0usize, 0]), TierId(0));
    }

    #[test]
    fn lagging_tier_is_chosen() {
        let policy = StaticThreshold::new(&[1, 4]).unwrap();
        // Tier 1 should hold 4x tier 0.
        assert_eq!(policy.select(&[100usize, 399]), TierId(1));
        assert_eq!(policy.select(&[100usize, 400]), TierId(0));
    }

    #[test]
    fn last_candidate_wins() {
        let policy = StaticThreshold::new(&[1, 1, 1]).unwrap();
        assert_eq!(policy.select(&[10usize, 0, 0]), TierId(2));
        assert_eq!(policy.select(&[10usize, 0, 10]), TierId(1));
    }

    #[test]
    fn converges_to_ratio() {
        let policy = StaticThreshold::new(&[1, 3]).unwrap();
        let mut usage = [0usize; 2];
        for _ in 0..4000 {
            let tier = policy.select(&usage);
            usage[tier.index()] += 64;
        }
        let ratio = usage[1] as f64 / usage[0] as f64;
        assert!((ratio - 3.0).abs() < 0.01, "ratio={ratio}");
    }

    #[test]
    fn huge_counters_do_not_overflow() {
        let policy = StaticThreshold::new(&[u32::MAX, 1]).unwrap();
        assert_eq!(policy.select(&[usize::MAX, usize::MAX]), TierId(0));
    }
}
