//! Copy path benchmarks.
//!
//! Measures full-page and page-straddling transfers through a device, plus
//! the cost of reading holes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use brickdisk::device::{Request, Segment};
use brickdisk::storage::SystemAllocator;
use brickdisk::{Device, DeviceId, PAGE_SECTORS, PAGE_SIZE};

/// 64 MiB.
const CAPACITY: u64 = 128 * 1024;

fn create_bench_device() -> Device {
    Device::create(DeviceId::new(0), CAPACITY, Arc::new(SystemAllocator))
}

fn bench_sequential_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_writes");

    for pages in [1u64, 16, 256] {
        let device = create_bench_device();
        let mut data = vec![0x5Au8; pages as usize * PAGE_SIZE];

        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("pages", pages), &pages, |b, &pages| {
            let mut sector = 0;
            b.iter(|| {
                device
                    .process(Request::write(sector).with_segment(Segment::whole(&mut data)))
                    .unwrap();
                sector = (sector + pages * PAGE_SECTORS) % (CAPACITY - pages * PAGE_SECTORS);
            });
        });
    }

    group.finish();
}

fn bench_unaligned_writes(c: &mut Criterion) {
    let device = create_bench_device();
    let mut data = vec![0xA5u8; PAGE_SIZE];

    c.bench_function("unaligned_write_4k", |b| {
        b.iter(|| {
            // Starts 3 sectors into page 10, ends 3 sectors into page 11
            device
                .process(Request::write(black_box(83)).with_segment(Segment::whole(&mut data)))
                .unwrap();
        });
    });
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads_4k");
    let mut buf = vec![0u8; PAGE_SIZE];

    let resident = create_bench_device();
    let mut page = vec![0x11u8; PAGE_SIZE];
    resident
        .process(Request::write(0).with_segment(Segment::whole(&mut page)))
        .unwrap();

    group.bench_function("resident", |b| {
        b.iter(|| {
            resident
                .process(Request::read(0).with_segment(Segment::whole(&mut buf)))
                .unwrap();
            black_box(&buf);
        });
    });

    let hole = create_bench_device();
    group.bench_function("hole", |b| {
        b.iter(|| {
            hole.process(Request::read(0).with_segment(Segment::whole(&mut buf)))
                .unwrap();
            black_box(&buf);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sequential_writes, bench_unaligned_writes, bench_reads);
criterion_main!(benches);
