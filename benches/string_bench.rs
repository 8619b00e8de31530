//! Benchmarks for UTF-16 conversion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use winterop::string::{from_wide, split_null_terminated, to_wide, WideString, WideStringBuilder};

const SIZES: [usize; 4] = [16, 260, 4096, 32768];

fn bench_to_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_wide");

    for size in SIZES {
        let input = "a".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| to_wide(black_box(input)))
        });
    }

    group.finish();
}

fn bench_from_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("from_wide");

    for size in SIZES {
        let wide = to_wide(&"a".repeat(size));
        group.throughput(Throughput::Bytes(size as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wide, |b, wide| {
            b.iter(|| from_wide(black_box(wide)))
        });
    }

    // A MAX_PATH buffer holding a short path is the common case for APIs
    // that fill a fixed array.
    let mut fixed = [0u16; 260];
    for (dst, src) in fixed.iter_mut().zip("C:\\Windows\\System32".encode_utf16()) {
        *dst = src;
    }
    group.bench_function("max_path_buffer", |b| b.iter(|| from_wide(black_box(&fixed))));

    group.finish();
}

fn bench_wide_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("WideString");

    for size in SIZES {
        let input = "a".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| WideString::new(black_box(input)))
        });
    }

    group.finish();
}

fn bench_string_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_lists");

    let entries: Vec<String> = (0..100).map(|i| format!("NAME_{i}=some value {i}")).collect();

    group.bench_function("build_block", |b| {
        b.iter(|| {
            let mut builder = WideStringBuilder::new();
            for entry in &entries {
                builder.push(black_box(entry)).push_null();
            }
            builder.build()
        })
    });

    group.bench_function("build_block_preallocated", |b| {
        b.iter(|| {
            let mut builder = WideStringBuilder::with_capacity(100 * 24);
            for entry in &entries {
                builder.push(black_box(entry)).push_null();
            }
            builder.build()
        })
    });

    let mut builder = WideStringBuilder::new();
    for entry in &entries {
        builder.push(entry).push_null();
    }
    let block = builder.build();
    group.bench_function("split_block", |b| {
        b.iter(|| split_null_terminated(black_box(&block)))
    });

    group.finish();
}

fn bench_non_ascii(c: &mut Criterion) {
    let mut group = c.benchmark_group("non_ascii");

    let cjk = "\u{4E2D}\u{6587}\u{65E5}\u{672C}\u{8A9E}".repeat(100);
    group.bench_function("cjk_to_wide", |b| b.iter(|| to_wide(black_box(&cjk))));

    let surrogates = to_wide(&"\u{1F600}\u{1F680}".repeat(100));
    group.bench_function("surrogate_pairs_from_wide", |b| {
        b.iter(|| from_wide(black_box(&surrogates)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_to_wide,
    bench_from_wide,
    bench_wide_string,
    bench_string_lists,
    bench_non_ascii
);
criterion_main!(benches);
