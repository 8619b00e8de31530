//! UTF-16 string conversion.
//!
//! Windows APIs take and return UTF-16 ("wide") strings. These helpers move
//! between wide buffers and Rust strings, including the double-null-terminated
//! lists some APIs return.

use crate::error::{Error, Result};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::core::PCWSTR;

/// Converts a Rust string to a null-terminated UTF-16 vector.
///
/// # Example
///
/// ```
/// use winterop::string::to_wide;
///
/// assert_eq!(to_wide("Hi"), vec![72, 105, 0]);
/// ```
#[inline]
pub fn to_wide(s: &str) -> Vec<u16> {
    // UTF-16 never needs more code units than UTF-8 has bytes.
    let mut wide = Vec::with_capacity(s.len() + 1);
    wide.extend(s.encode_utf16());
    wide.push(0);
    wide
}

/// Converts a path to a null-terminated UTF-16 vector.
#[inline]
pub fn path_to_wide(path: &Path) -> Vec<u16> {
    let os = path.as_os_str();
    let mut wide = Vec::with_capacity(os.len() + 1);
    wide.extend(os.encode_wide());
    wide.push(0);
    wide
}

/// Converts UTF-16 up to the first null (or the end of the slice).
///
/// # Example
///
/// ```
/// use winterop::string::{from_wide, to_wide};
///
/// assert_eq!(from_wide(&to_wide("Hello")).unwrap(), "Hello");
/// ```
#[inline]
pub fn from_wide(wide: &[u16]) -> Result<String> {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    decode(&wide[..len])
}

/// Converts a null-terminated UTF-16 pointer.
///
/// # Safety
///
/// `ptr` must be null or point to a readable, null-terminated UTF-16 string
/// that is not mutated during the call.
///
/// # Errors
///
/// Returns [`Error::NullPointer`] for a null `ptr` and
/// [`Error::StringConversion`] for unpaired surrogates.
pub unsafe fn from_wide_ptr(ptr: *const u16) -> Result<String> {
    if ptr.is_null() {
        return Err(Error::null_pointer("from_wide_ptr"));
    }

    // SAFETY: Caller guarantees a terminator exists.
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    decode(std::slice::from_raw_parts(ptr, len))
}

/// Converts the first `len` code units, ignoring any nulls.
#[inline]
pub fn from_wide_with_len(wide: &[u16], len: usize) -> Result<String> {
    decode(&wide[..len.min(wide.len())])
}

fn decode(units: &[u16]) -> Result<String> {
    String::from_utf16(units).map_err(|_| Error::string_conversion("invalid UTF-16 sequence"))
}

/// Splits a list of null-terminated strings ending in an empty string.
///
/// Environment blocks and `GetLogicalDriveStringsW` output use this layout.
/// Parsing stops at the first empty entry or the end of the slice; invalid
/// UTF-16 is replaced rather than rejected.
///
/// ```
/// use winterop::string::split_null_terminated;
///
/// let block: Vec<u16> = "C:\\\0D:\\\0\0".encode_utf16().collect();
/// assert_eq!(split_null_terminated(&block), ["C:\\", "D:\\"]);
/// ```
pub fn split_null_terminated(block: &[u16]) -> Vec<String> {
    block
        .split(|&c| c == 0)
        .take_while(|entry| !entry.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Converts a null-terminated (or full-slice) ANSI byte string.
///
/// Non-ASCII bytes are decoded as Latin-1; this only matters for the fixed
/// ANSI fields in a few legacy structures.
pub fn from_null_terminated_ascii(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..len].iter().map(|&b| b as char).collect()
}

/// Accumulates UTF-16 and null-terminates on [`build`](Self::build).
#[derive(Default)]
pub struct WideStringBuilder {
    units: Vec<u16>,
}

impl WideStringBuilder {
    /// Creates an empty builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty builder with room for `capacity` code units.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            units: Vec::with_capacity(capacity),
        }
    }

    /// Appends a string.
    #[inline]
    pub fn push(&mut self, s: &str) -> &mut Self {
        self.units.extend(s.encode_utf16());
        self
    }

    /// Appends a single code unit.
    #[inline]
    pub fn push_char(&mut self, c: u16) -> &mut Self {
        self.units.push(c);
        self
    }

    /// Appends an embedded null, as used between entries of a string list.
    #[inline]
    pub fn push_null(&mut self) -> &mut Self {
        self.push_char(0)
    }

    /// Null-terminates and returns the buffer.
    #[inline]
    pub fn build(mut self) -> Vec<u16> {
        self.units.push(0);
        self.units
    }

    /// Null-terminates, returns the buffer, and leaves the builder empty.
    #[inline]
    pub fn build_and_clear(&mut self) -> Vec<u16> {
        self.units.push(0);
        std::mem::take(&mut self.units)
    }

    /// Empties the builder, keeping its allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.units.clear();
    }

    /// Length in code units, not counting a terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if nothing has been pushed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Allocated capacity in code units.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.units.capacity()
    }
}

/// An owned, null-terminated wide string that can be passed as `PCWSTR`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WideString {
    units: Vec<u16>,
}

impl WideString {
    /// Encodes `s`.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self { units: to_wide(s) }
    }

    /// Encodes a path.
    #[inline]
    pub fn from_path(path: &Path) -> Self {
        Self {
            units: path_to_wide(path),
        }
    }

    /// Raw pointer to the first code unit.
    #[inline]
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    /// Borrows as `PCWSTR`. Valid while `self` is alive.
    #[inline]
    pub fn as_pcwstr(&self) -> PCWSTR {
        PCWSTR::from_raw(self.units.as_ptr())
    }

    /// Length in code units, not counting the terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len().saturating_sub(1)
    }

    /// Returns true for the empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes back to a `String`, replacing invalid sequences.
    #[inline]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units[..self.len()])
    }

    /// The code units including the terminator.
    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.units
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WideString {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&Path> for WideString {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

/// Encodes an optional string, yielding a null `PCWSTR` for `None`.
pub(crate) fn optional_wide(s: Option<&str>) -> Option<WideString> {
    s.map(WideString::new)
}

/// Borrows an optional [`WideString`] as `PCWSTR`.
pub(crate) fn optional_pcwstr(s: &Option<WideString>) -> PCWSTR {
    s.as_ref().map_or(PCWSTR::null(), WideString::as_pcwstr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_surrogates() {
        let original = "Grüße, 世界 🌍";
        let back = from_wide(&to_wide(original)).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(to_wide(""), vec![0]);
        assert_eq!(from_wide(&[0]).unwrap(), "");
        assert_eq!(from_wide(&[]).unwrap(), "");
    }

    #[test]
    fn test_unpaired_surrogate_is_error() {
        assert!(matches!(
            from_wide(&[0xD800, 0x41]),
            Err(Error::StringConversion(_))
        ));
    }

    #[test]
    fn test_from_wide_with_len_ignores_nulls() {
        let units = [0x41, 0, 0x42, 0x43];
        assert_eq!(from_wide_with_len(&units, 3).unwrap(), "A\0B");
        assert_eq!(from_wide_with_len(&units, 99).unwrap(), "A\0BC");
    }

    #[test]
    fn test_from_wide_ptr() {
        let wide = to_wide("pointer");
        // SAFETY: `wide` is null-terminated and alive.
        assert_eq!(unsafe { from_wide_ptr(wide.as_ptr()) }.unwrap(), "pointer");
        // SAFETY: Null is explicitly handled.
        assert!(unsafe { from_wide_ptr(std::ptr::null()) }.is_err());
    }

    #[test]
    fn test_split_null_terminated() {
        let mut builder = WideStringBuilder::new();
        builder.push("A=1").push_null().push("=C:=C:\\").push_null();
        let block = builder.build();
        assert_eq!(split_null_terminated(&block), ["A=1", "=C:=C:\\"]);

        assert!(split_null_terminated(&[0, 0]).is_empty());
        // Missing final terminator still yields the last entry.
        let unterminated: Vec<u16> = "x".encode_utf16().collect();
        assert_eq!(split_null_terminated(&unterminated), ["x"]);
    }

    #[test]
    fn test_from_null_terminated_ascii() {
        assert_eq!(from_null_terminated_ascii(b"DISPLAY1\0\0junk"), "DISPLAY1");
        assert_eq!(from_null_terminated_ascii(b"full"), "full");
    }

    #[test]
    fn test_wide_string() {
        let s = WideString::new("abc");
        assert_eq!(s.len(), 3);
        assert_eq!(s.as_slice().last(), Some(&0));
        assert_eq!(s.to_string_lossy(), "abc");
        assert!(WideString::from("").is_empty());
    }

    #[test]
    fn test_optional_strings() {
        assert!(optional_pcwstr(&optional_wide(None)).is_null());

        let present = optional_wide(Some("\\\\.\\DISPLAY1"));
        let pcwstr = optional_pcwstr(&present);
        assert!(!pcwstr.is_null());
        assert_eq!(unsafe { pcwstr.to_string() }.unwrap(), "\\\\.\\DISPLAY1");

        let empty = optional_wide(Some(""));
        assert!(!optional_pcwstr(&empty).is_null());
    }

    #[test]
    fn test_builder_reuse() {
        let mut builder = WideStringBuilder::with_capacity(16);
        builder.push("one");
        assert_eq!(from_wide(&builder.build_and_clear()).unwrap(), "one");
        assert!(builder.is_empty());
        builder.push("two");
        assert_eq!(builder.len(), 3);
    }
}
