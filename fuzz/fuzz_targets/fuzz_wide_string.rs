//! `WideString` and `WideStringBuilder` against plain `encode_utf16`.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use winterop::string::{split_null_terminated, WideString, WideStringBuilder};

#[derive(Debug, Arbitrary)]
struct Input {
    entries: Vec<String>,
    capacity: u16,
}

fuzz_target!(|input: Input| {
    if input.entries.len() > 64 || input.entries.iter().map(String::len).sum::<usize>() > 100_000 {
        return;
    }

    let mut builder = WideStringBuilder::with_capacity(input.capacity as usize);
    let mut units = 0;
    for entry in &input.entries {
        let wide = WideString::new(entry);
        assert_eq!(wide.len(), entry.encode_utf16().count());
        assert_eq!(wide.as_slice().last(), Some(&0));
        assert_eq!(wide.to_string_lossy(), *entry);

        builder.push(entry).push_null();
        units += wide.len() + 1;
    }
    assert_eq!(builder.len(), units);

    // A block of entries without nulls splits back into the same entries,
    // up to the first empty one.
    let block = builder.build();
    if input.entries.iter().all(|e| !e.contains('\0')) {
        let expected: Vec<&str> = input
            .entries
            .iter()
            .map(String::as_str)
            .take_while(|e| !e.is_empty())
            .collect();
        assert_eq!(split_null_terminated(&block), expected);
    }
});
