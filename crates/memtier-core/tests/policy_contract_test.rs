use memtier_core::config::parse;
use memtier_core::policy::{PolicyBuilder, PolicyKind, TierId, TierPolicy};

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range_u32(&mut self, low: u32, high_inclusive: u32) -> u32 {
        let span = u64::from(high_inclusive - low) + 1;
        low + (self.next_u64() % span) as u32
    }
}

fn round_robin(ratios: &[u32]) -> TierPolicy {
    PolicyBuilder::new(PolicyKind::RoundRobin)
        .with_ratios(ratios)
        .build()
        .unwrap()
}

#[test]
fn every_refill_cycle_has_exact_counts() {
    const SEEDS: [u64; 4] = [1, 7, 42, 0xDEAD_BEEF];
    const CYCLES: usize = 25;

    for seed in SEEDS {
        let mut rng = XorShift64::new(seed);
        let tiers = rng.gen_range_u32(1, 2) as usize;
        let ratios: Vec<u32> = (0..tiers).map(|_| rng.gen_range_u32(1, 17)).collect();
        let cycle: usize = ratios.iter().map(|r| *r as usize).sum();
        let mut policy = round_robin(&ratios);

        for _ in 0..CYCLES {
            let mut counts = vec![0u32; tiers];
            for _ in 0..cycle {
                counts[policy.select(64, &[0usize; 2]).index()] += 1;
            }
            assert_eq!(counts, ratios, "seed={seed}");
        }
    }
}

#[test]
fn first_cycle_interleaves_in_declaration_order() {
    let config = parse("DRAM:2;FS_DAX:/tmp:N/A:3").unwrap();
    let mut policy = PolicyBuilder::from_config(PolicyKind::RoundRobin, &config)
        .build()
        .unwrap();
    let picks: Vec<usize> = (0..10)
        .map(|_| policy.select(8, &[0usize, 0]).index())
        .collect();
    assert_eq!(picks, [0, 0, 1, 1, 1, 0, 0, 1, 1, 1]);
}

#[test]
fn round_robin_ignores_size_and_usage() {
    let mut a = round_robin(&[1, 2]);
    let mut b = round_robin(&[1, 2]);
    let mut rng = XorShift64::new(99);
    for _ in 0..300 {
        let size = rng.next_u64() as usize;
        let usage = [rng.next_u64() as usize, rng.next_u64() as usize];
        assert_eq!(a.select(size, &usage), b.select(1, &[0usize, 0]));
        a.observe(&usage);
    }
}

#[test]
fn dynamic_threshold_moves_small_allocations_down_when_upper_tier_starves() {
    let mut policy = PolicyBuilder::new(PolicyKind::DynamicThreshold)
        .with_ratios(&[1, 1])
        .build()
        .unwrap();
    // Upper tier empty: the boundary rises and 1100-byte blocks switch tiers.
    assert_eq!(policy.select(1100, &[0usize, 0]), TierId(1));
    for _ in 0..5 {
        policy.observe(&[0usize, 1 << 20]);
    }
    assert_eq!(policy.select(1100, &[0usize, 0]), TierId(0));
}

#[test]
fn static_threshold_tracks_declared_shares() {
    let config = parse("DRAM:1;FS_DAX:/tmp:N/A:2").unwrap();
    let mut policy = PolicyBuilder::from_config(PolicyKind::StaticThreshold, &config)
        .build()
        .unwrap();
    let mut usage = [0usize; 2];
    let mut rng = XorShift64::new(5);
    for _ in 0..3000 {
        let size = rng.gen_range_u32(16, 4096) as usize;
        let tier = policy.select(size, &usage);
        usage[tier.index()] += size;
        policy.observe(&usage);
    }
    let share = usage[1] as f64 / usage[0] as f64;
    assert!((share - 2.0).abs() < 0.05, "share={share}");
}
