//! Heap profile of the buffer and string helpers using dhat.
//!
//! Run with: cargo run --bin memory-profile --features dhat-heap

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::mem::offset_of;

use windows::Win32::Foundation::LUID;
use windows::Win32::Security::{LUID_AND_ATTRIBUTES, TOKEN_PRIVILEGES};
use winterop::buffer::{buffer_invoke, GrowResult, NativeBuffer, StringBufferCache, TrailingArray};
use winterop::error::Result;
use winterop::process::parse_environment_block;
use winterop::string::{from_wide, to_wide, WideStringBuilder};

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    println!("=== winterop heap profile ===\n");

    profile_string_conversions()?;
    profile_pooled_buffers()?;
    profile_trailing_arrays()?;
    profile_environment_block();

    println!("\nWrote dhat-heap.json");
    Ok(())
}

fn profile_string_conversions() -> Result<()> {
    println!("--- to_wide / from_wide ---");

    for i in 0..1000 {
        let wide = to_wide(&format!("C:\\Windows\\System32\\file{i}.dll"));
        from_wide(&wide)?;
    }

    let mut builder = WideStringBuilder::with_capacity(1024);
    for _ in 0..100 {
        for segment in ["PATH=", "C:\\Windows", ";", "C:\\Tools"] {
            builder.push(segment);
        }
        builder.push_null();
        builder.build_and_clear();
    }

    println!("1000 path conversions, 100 builder blocks");
    Ok(())
}

/// Repeated `buffer_invoke` calls should reuse the pooled buffer after the
/// first growth instead of allocating each time.
fn profile_pooled_buffers() -> Result<()> {
    println!("--- buffer_invoke ---");

    let payload = "x".repeat(4000);
    for _ in 0..500 {
        let value = buffer_invoke(|buf| {
            if buf.char_capacity() < payload.len() {
                return Ok(GrowResult::Grow(payload.len()));
            }
            buf.clear();
            buf.push_str(&payload);
            Ok(GrowResult::Done(buf.len()))
        })?;
        debug_assert_eq!(value, payload.len());
    }

    println!(
        "500 grown calls, {} buffer(s) pooled",
        StringBufferCache::global().cached()
    );
    Ok(())
}

fn profile_trailing_arrays() -> Result<()> {
    println!("--- TrailingArray / BufferReader ---");

    let offset = offset_of!(TOKEN_PRIVILEGES, Privileges);
    for count in [1usize, 8, 64] {
        let header = TOKEN_PRIVILEGES {
            PrivilegeCount: count as u32,
            ..Default::default()
        };
        let mut privileges =
            TrailingArray::<TOKEN_PRIVILEGES, LUID_AND_ATTRIBUTES>::with_count(header, offset, count)?;
        for (i, entry) in privileges.as_mut_slice(count)?.iter_mut().enumerate() {
            entry.Luid = LUID {
                LowPart: i as u32,
                HighPart: 0,
            };
        }
        println!("{count:>3} entries in {} bytes", privileges.byte_len());
    }

    let mut buffer = NativeBuffer::with_byte_capacity(4096);
    for (i, byte) in buffer.as_bytes_mut().iter_mut().enumerate() {
        *byte = i as u8;
    }
    let mut reader = buffer.reader();
    let mut words = 0;
    while reader.remaining() >= 4 {
        reader.read_u32()?;
        words += 1;
    }
    println!("read {words} u32 values");
    Ok(())
}

fn profile_environment_block() {
    println!("--- parse_environment_block ---");

    let mut builder = WideStringBuilder::new();
    builder.push("=C:=C:\\").push_null();
    for i in 0..200 {
        builder.push(&format!("VAR_{i}=value number {i}")).push_null();
    }
    let block = builder.build();

    let parsed = parse_environment_block(&block);
    println!("parsed {} variables", parsed.len());
}
