//! Benchmarks for the native buffer helpers.
//!
//! `pooled_vs_fresh` shows what the string buffer cache saves over
//! allocating a scratch buffer per call.

use std::mem::offset_of;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use windows::Win32::Security::{LUID_AND_ATTRIBUTES, TOKEN_PRIVILEGES};
use winterop::buffer::{
    buffer_invoke, fill_string, GrowResult, NativeBuffer, StringBuffer, StringBufferCache,
    TrailingArray,
};
use winterop::error::HResultParts;
use winterop::process::parse_environment_block;
use winterop::string::WideStringBuilder;

fn bench_pooled_vs_fresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("pooled_vs_fresh");

    group.bench_function("fresh", |b| {
        b.iter(|| {
            let mut buf = StringBuffer::with_char_capacity(260);
            buf.push_str(black_box("C:\\Windows\\System32"));
            buf.to_string_lossy()
        })
    });

    group.bench_function("pooled", |b| {
        let cache = StringBufferCache::global();
        b.iter(|| {
            cache.with_buffer(|buf| {
                buf.push_str(black_box("C:\\Windows\\System32"));
                Ok(buf.to_string_lossy())
            })
        })
    });

    group.finish();
}

fn bench_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_invoke_growth");

    for needed in [100usize, 1000, 32767] {
        let payload = "x".repeat(needed);
        group.bench_with_input(BenchmarkId::from_parameter(needed), &payload, |b, payload| {
            b.iter(|| {
                buffer_invoke(|buf| {
                    if buf.char_capacity() < payload.len() {
                        return Ok(GrowResult::Grow(payload.len()));
                    }
                    buf.clear();
                    buf.push_str(payload);
                    Ok(GrowResult::Done(buf.len()))
                })
            })
        });
    }

    group.bench_function("fill_string", |b| {
        let source: Vec<u16> = "C:\\Windows\\System32".encode_utf16().collect();
        b.iter(|| {
            fill_string(|buf| {
                let n = source.len().min(buf.len());
                buf[..n].copy_from_slice(&source[..n]);
                n as u32
            })
        })
    });

    group.finish();
}

fn bench_native_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("native_layouts");
    let offset = offset_of!(TOKEN_PRIVILEGES, Privileges);

    for count in [1usize, 32] {
        group.bench_with_input(BenchmarkId::new("trailing_array", count), &count, |b, &count| {
            b.iter(|| {
                TrailingArray::<TOKEN_PRIVILEGES, LUID_AND_ATTRIBUTES>::with_count(
                    TOKEN_PRIVILEGES::default(),
                    offset,
                    black_box(count),
                )
            })
        });
    }

    let mut buffer = NativeBuffer::with_byte_capacity(4096);
    for (i, byte) in buffer.as_bytes_mut().iter_mut().enumerate() {
        *byte = i as u8;
    }
    group.bench_function("reader_u64", |b| {
        b.iter(|| {
            let mut reader = buffer.reader();
            let mut sum = 0u64;
            while let Ok(value) = reader.read_u64() {
                sum = sum.wrapping_add(value);
            }
            sum
        })
    });

    group.finish();
}

fn bench_environment_block(c: &mut Criterion) {
    let mut builder = WideStringBuilder::new();
    for i in 0..100 {
        builder.push(&format!("VAR_{i}=C:\\some\\path\\{i}")).push_null();
    }
    let block = builder.build();

    c.bench_function("parse_environment_block", |b| {
        b.iter(|| parse_environment_block(black_box(&block)))
    });
}

fn bench_hresult_parts(c: &mut Criterion) {
    let codes: Vec<windows::core::HRESULT> = (0..256)
        .map(|i| windows::core::HRESULT((0x8007_0000u32 | i) as i32))
        .collect();
    c.bench_function("hresult_parts", |b| {
        b.iter(|| {
            codes
                .iter()
                .filter(|hr| hr.failed() && hr.facility() == 7)
                .map(|hr| hr.code() as u32)
                .sum::<u32>()
        })
    });
}

criterion_group!(
    benches,
    bench_pooled_vs_fresh,
    bench_growth,
    bench_native_layouts,
    bench_environment_block,
    bench_hresult_parts
);
criterion_main!(benches);
