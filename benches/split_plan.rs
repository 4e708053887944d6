use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use preserv::multibag::{pack, plan_split, PlannedFile};
use preserv::{Bag, MultibagConfig};
use std::hint::black_box;
use tempfile::TempDir;

/// Synthetic file list with sizes cycling between 1 KB and ~5 MB
fn planned_files(count: usize) -> Vec<PlannedFile> {
    (0..count)
        .map(|i| PlannedFile {
            path: format!("data/set{}/file{:06}.dat", i % 17, i),
            size: 1_000 + ((i as u64 * 7_919) % 5_000_000),
        })
        .collect()
}

/// Benchmark greedy packing over growing file lists
fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");

    for count in [1_000usize, 10_000, 100_000].iter() {
        let files = planned_files(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let groups = pack(files.iter().cloned(), 50_000_000);
                black_box(groups);
            });
        });
    }

    group.finish();
}

/// Benchmark planning against a bag on disk (enumeration plus packing)
fn bench_plan_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_split");

    for count in [100usize, 1_000].iter() {
        let temp = TempDir::new().unwrap();
        let bag = Bag::create(temp.path().join("bench.mbag0_4-0")).unwrap();
        for i in 0..*count {
            let dir = bag.content_path(&format!("set{}", i % 10));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(format!("f{:05}.dat", i)), vec![0xABu8; 512 + i % 4096])
                .unwrap();
        }
        let config = MultibagConfig::with_max_bag_size(200_000);

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let plan = plan_split(&bag, &config).unwrap();
                black_box(plan);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pack, bench_plan_split);
criterion_main!(benches);
