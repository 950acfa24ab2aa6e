/*!
Benchmarks for checksummed listings and archive packing.
*/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use depot_core::{DiskRepository, Repository};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn populate(root: &Path, files: usize, size: usize) {
    let payload = vec![0xA5u8; size];
    for i in 0..files {
        let dir = root.join(format!("shard-{:02}", i % 16));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("file-{i:05}.bin")), &payload).unwrap();
    }
}

fn bench_list_recursive(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_recursive");

    for &(files, size) in &[(100usize, 4 * 1024usize), (1_000, 4 * 1024), (100, 256 * 1024)] {
        let temp_dir = TempDir::new().unwrap();
        populate(&temp_dir.path().join("data"), files, size);
        let repository = DiskRepository::new(temp_dir.path()).unwrap();

        group.throughput(Throughput::Bytes((files * size) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{files}x{size}B")),
            &repository,
            |b, repository| {
                b.iter(|| {
                    let count = repository
                        .list_recursive(black_box("data"))
                        .filter(|r| r.is_ok())
                        .count();
                    assert_eq!(count, files);
                })
            },
        );
    }

    group.finish();
}

fn bench_put_archive(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    populate(&source, 200, 16 * 1024);
    let repository = DiskRepository::new(temp_dir.path().join("repo")).unwrap();

    c.bench_function("put_archive_200x16KiB", |b| {
        b.iter(|| {
            repository
                .put_archive(&source, black_box("bench/out.tar.gz"), None)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_list_recursive, bench_put_archive);
criterion_main!(benches);
