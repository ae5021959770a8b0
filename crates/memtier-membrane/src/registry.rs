//! Constructed tiers, in declaration order.

use std::sync::atomic::{AtomicUsize, Ordering};

use memtier_core::{TierId, TierSpec, TierUsage, TieringConfig};

use crate::kind::{ConstructionError, Kind};

/// One live tier: its declaration, its kind and the requested bytes
/// currently allocated from it.
#[derive(Debug)]
pub struct TierRuntime {
    spec: TierSpec,
    kind: Kind,
    allocated: AtomicUsize,
}

impl TierRuntime {
    #[must_use]
    pub fn spec(&self) -> &TierSpec {
        &self.spec
    }

    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    #[must_use]
    pub fn ratio(&self) -> u32 {
        self.spec.ratio()
    }

    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

/// Fixed set of tiers. Built once; never resized.
#[derive(Debug)]
pub struct TierRegistry {
    tiers: Box<[TierRuntime]>,
}

impl TierRegistry {
    /// Construct every declared kind. On the first failure the kinds built so
    /// far are dropped and the error is returned.
    pub fn build(config: &TieringConfig) -> Result<Self, ConstructionError> {
        let tiers = config
            .tiers()
            .iter()
            .map(|spec| {
                Ok(TierRuntime {
                    spec: spec.clone(),
                    kind: Kind::build(spec)?,
                    allocated: AtomicUsize::new(0),
                })
            })
            .collect::<Result<Vec<_>, ConstructionError>>()?;
        Ok(Self {
            tiers: tiers.into_boxed_slice(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: TierId) -> Option<&TierRuntime> {
        self.tiers.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TierId, &TierRuntime)> {
        self.tiers.iter().enumerate().map(|(idx, t)| (TierId(idx), t))
    }

    pub fn record_alloc(&self, id: TierId, size: usize) {
        if let Some(tier) = self.get(id) {
            tier.allocated.fetch_add(size, Ordering::Relaxed);
        }
    }

    pub fn record_free(&self, id: TierId, size: usize) {
        if let Some(tier) = self.get(id) {
            let _ = tier
                .allocated
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                    Some(cur.saturating_sub(size))
                });
        }
    }

    /// Requested bytes live in `id`; 0 for an unknown tier.
    #[must_use]
    pub fn allocated(&self, id: TierId) -> usize {
        self.get(id).map_or(0, TierRuntime::allocated)
    }
}

impl TierUsage for TierRegistry {
    fn tier_count(&self) -> usize {
        self.len()
    }

    fn allocated(&self, tier: TierId) -> usize {
        TierRegistry::allocated(self, tier)
    }
}
