//! Bounds checking in `BufferReader`.
//!
//! The input is a byte buffer followed by a script of reads; no read may
//! panic or move the offset past the end.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use winterop::buffer::BufferReader;

#[derive(Debug, Arbitrary)]
enum Op {
    U8,
    U16,
    U32,
    U64,
    Usize,
    Utf16(u16),
    Align(u8),
    Seek(u16),
}

#[derive(Debug, Arbitrary)]
struct Input {
    bytes: Vec<u8>,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut reader = BufferReader::new(&input.bytes);

    for op in input.ops.iter().take(256) {
        let before = reader.offset();
        let ok = match *op {
            Op::U8 => reader.read_u8().is_ok(),
            Op::U16 => reader.read_u16().is_ok(),
            Op::U32 => reader.read_u32().is_ok(),
            Op::U64 => reader.read_u64().is_ok(),
            Op::Usize => reader.read_usize().is_ok(),
            // Invalid UTF-16 is consumed before decoding fails.
            Op::Utf16(chars) => {
                let _ = reader.read_utf16(chars as usize);
                true
            }
            Op::Align(shift) => reader.align(1usize << (shift % 8)).is_ok(),
            Op::Seek(offset) => {
                let result = reader.set_offset(offset as usize);
                assert_eq!(result.is_ok(), offset as usize <= input.bytes.len());
                true
            }
        };

        assert!(reader.offset() <= input.bytes.len());
        assert_eq!(reader.remaining(), input.bytes.len() - reader.offset());
        if !ok {
            assert_eq!(reader.offset(), before, "failed read must not advance");
        }
    }
});
