#![no_main]
use libfuzzer_sys::fuzz_target;
use memtier_core::{PolicyBuilder, PolicyKind};

// Layout: kind, tier count, one ratio byte per tier, up to two 3-byte ctl
// assignments (field, u16 value), then (size, shift) request pairs.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let kind = match data[0] % 3 {
        0 => PolicyKind::RoundRobin,
        1 => PolicyKind::StaticThreshold,
        _ => PolicyKind::DynamicThreshold,
    };
    let tiers = usize::from(data[1] % 4) + 1;
    let Some(ratios) = data.get(2..2 + tiers) else {
        return;
    };
    let ratios: Vec<u32> = ratios.iter().map(|r| u32::from(*r)).collect();
    let mut builder = PolicyBuilder::new(kind).with_ratios(&ratios);

    let ops = &data[2 + tiers..];
    let (ctl, stream) = ops.split_at(ops.len().min(6));
    for chunk in ctl.chunks(3) {
        if let [field, lo, hi] = *chunk {
            let value = u16::from_le_bytes([lo, hi]);
            let path = match field % 4 {
                0 => "policy.dynamic_threshold.thresholds[0].val",
                1 => "policy.dynamic_threshold.thresholds[0].min",
                2 => "policy.dynamic_threshold.check_cnt",
                _ => "policy.dynamic_threshold.step",
            };
            let _ = builder.ctl_set(path, &value.to_string());
        }
    }

    let Ok(mut policy) = builder.build() else {
        return;
    };
    let mut usage = vec![0usize; tiers];
    for chunk in stream.chunks(2) {
        let size = usize::from(chunk[0]) << (chunk.get(1).copied().unwrap_or(0) % 16);
        let tier = policy.select(size, usage.as_slice());
        assert!(tier.index() < tiers);
        usage[tier.index()] += size;
        policy.observe(usage.as_slice());
    }
});
