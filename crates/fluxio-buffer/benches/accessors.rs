use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fluxio_buffer::Buffer;

const ITEMS: u64 = 1_000_000;

fn bench_write_read_u32(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_read_u32");
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("round_trip", |b| {
        b.iter(|| {
            let buf = Buffer::new(4096, 4096);
            for i in 0..ITEMS as u32 {
                if buf.writable_bytes() < 4 {
                    buf.clear().unwrap();
                }
                buf.write_u32(i).unwrap();
                black_box(buf.read_u32().unwrap());
            }
        });
    });

    group.finish();
}

fn bench_get_set_u8(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_set_u8");
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("indexed", |b| {
        b.iter(|| {
            let buf = Buffer::new(256, 256);
            for i in 0..ITEMS {
                let idx = (i % 256) as usize;
                buf.set_u8(idx, i as u8).unwrap();
                black_box(buf.get_u8(idx).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("growth");

    for final_size in [4 * 1024, 64 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*final_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(final_size), final_size, |b, &size| {
            b.iter(|| {
                let buf = Buffer::new(16, size);
                let chunk = vec![0u8; 256];
                let mut written = 0usize;
                while written + chunk.len() <= size {
                    buf.write_bytes(&chunk).unwrap();
                    written += chunk.len();
                }
            });
        });
    }

    group.finish();
}

fn bench_discard_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("discard_read");
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("compact", |b| {
        b.iter(|| {
            let buf = Buffer::new(1024, 1024);
            for _ in 0..(ITEMS / 1000) {
                buf.write_bytes(&[0u8; 512]).unwrap();
                buf.read_bytes(500).unwrap();
                buf.discard_some_read().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_write_read_u32, bench_get_set_u8, bench_growth, bench_discard_read);
criterion_main!(benches);
