//! UTF-8 -> UTF-16 -> UTF-8 conversion.
//!
//! `to_wide` always appends a terminator, and `from_wide` stops at the first
//! null, so inputs with embedded nulls come back truncated.

#![no_main]

use libfuzzer_sys::fuzz_target;
use winterop::string::{from_wide, from_wide_with_len, to_wide};

fuzz_target!(|data: &str| {
    let wide = to_wide(data);
    assert_eq!(wide.last(), Some(&0));

    let expected = data.split('\0').next().unwrap_or("");
    assert_eq!(from_wide(&wide).unwrap(), expected);

    // Explicit length keeps embedded nulls.
    let units = wide.len() - 1;
    assert_eq!(from_wide_with_len(&wide, units).unwrap(), data);
});
