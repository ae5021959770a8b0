use super::{PolicyError, TierId};

/// Credit-based weighted round robin.
///
/// Every tier starts a cycle with `ratio` credits. A pick takes one credit
/// from the first tier (in declaration order) that still has any; once all
/// credits are spent the cycle restarts with full credits. A cycle of
/// `sum(ratios)` picks therefore contains exactly `ratio_i` picks of tier `i`.
#[derive(Debug, Clone)]
pub struct RatioRoundRobin {
    ratios: Box<[u32]>,
    credits: Box<[u32]>,
    // First tier with non-zero credit, or `credits.len()` when the cycle is
    // exhausted.
    cursor: usize,
}

impl RatioRoundRobin {
    pub fn new(ratios: &[u32]) -> Result<Self, PolicyError> {
        if ratios.is_empty() {
            return Err(PolicyError::NoTiers);
        }
        if let Some(idx) = ratios.iter().position(|r| *r == 0) {
            return Err(PolicyError::ZeroRatio(TierId(idx)));
        }
        Ok(Self {
            ratios: ratios.into(),
            credits: ratios.into(),
            cursor: 0,
        })
    }

    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.ratios.len()
    }

    /// Picks per full cycle.
    #[must_use]
    pub fn cycle_len(&self) -> u64 {
        self.ratios.iter().map(|r| u64::from(*r)).sum()
    }

    /// Remaining credits in the current cycle, per tier.
    #[must_use]
    pub fn credits(&self) -> &[u32] {
        &self.credits
    }

    pub fn next(&mut self) -> TierId {
        if self.cursor == self.credits.len() {
            self.credits.copy_from_slice(&self.ratios);
            self.cursor = 0;
        }
        let picked = self.cursor;
        self.credits[picked] -= 1;
        if self.credits[picked] == 0 {
            self.cursor += 1;
            while self.cursor < self.credits.len() && self.credits[self.cursor] == 0 {
                self.cursor += 1;
            }
        }
        TierId(picked)
    }
}
