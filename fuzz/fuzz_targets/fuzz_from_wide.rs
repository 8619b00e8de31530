//! Decoding arbitrary UTF-16, including unpaired surrogates.

#![no_main]

use libfuzzer_sys::fuzz_target;
use winterop::string::{from_wide, split_null_terminated};

fuzz_target!(|data: Vec<u16>| {
    if data.len() > 100_000 {
        return;
    }

    let end = data.iter().position(|&c| c == 0).unwrap_or(data.len());
    match from_wide(&data) {
        Ok(s) => assert_eq!(s.encode_utf16().collect::<Vec<_>>(), &data[..end]),
        Err(_) => assert!(String::from_utf16(&data[..end]).is_err()),
    }

    // Lossy list splitting never fails and never yields an empty entry.
    let entries = split_null_terminated(&data);
    assert!(entries.iter().all(|e| !e.is_empty()));
    assert!(entries.len() <= data.len());
});
