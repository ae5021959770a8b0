//! End-to-end tiered allocation benchmarks (no symbol interposition).

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use memtier_membrane::{CaptureSink, MemTiering, TieringEnv, bootstrap};

fn tiering(config: &str) -> MemTiering {
    bootstrap(&TieringEnv::with_config(config), Box::new(CaptureSink::new()))
        .expect("valid tiering environment")
}

fn bench_malloc_free(c: &mut Criterion) {
    let fsdax = format!("FS_DAX:{}:N/A:1;DRAM:1", std::env::temp_dir().display());
    let mut group = c.benchmark_group("tiered_malloc_free");

    for (name, config) in [("dram", "DRAM:1"), ("dram_fsdax", fsdax.as_str())] {
        let tiering = tiering(config);
        for size in [16usize, 256, 4096] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &sz| {
                b.iter(|| {
                    let p = tiering.malloc(sz);
                    criterion::black_box(p);
                    // SAFETY: `p` came from this instance and is released once.
                    unsafe { tiering.free(p) };
                });
            });
        }
    }
    group.finish();
}

fn bench_burst(c: &mut Criterion) {
    let tiering = tiering("DRAM:1");
    c.bench_function("tiered_burst_1000x64B", |b| {
        b.iter(|| {
            let blocks: Vec<_> = (0..1000).map(|_| tiering.malloc(64)).collect();
            for p in blocks {
                // SAFETY: each block came from this instance and is released once.
                unsafe { tiering.free(p) };
            }
        });
    });
}

criterion_group!(benches, bench_malloc_free, bench_burst);
criterion_main!(benches);
