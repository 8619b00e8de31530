//! Buffers for calls that fill caller-provided memory.
//!
//! Provides:
//!
//! - [`NativeBuffer`]: an aligned, zeroed byte buffer that grows on demand.
//! - [`StringBuffer`]: a UTF-16 buffer with separate length and capacity.
//! - [`StringBufferCache`]: a small pool of reusable string buffers.
//! - [`buffer_invoke`]: the "grow until it fits" retry loop.
//! - [`BufferReader`]: bounds-checked reads out of returned bytes.
//! - [`TrailingArray`]: a native header followed by a variable-length array.

use crate::error::{error_for_win32, last_error_code, Error, Result};
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::sync::{Mutex, PoisonError};
use windows::core::PWSTR;
use windows::Win32::Foundation::{SetLastError, NO_ERROR, WIN32_ERROR};

/// Alignment guaranteed by [`NativeBuffer`].
pub const NATIVE_ALIGNMENT: usize = align_of::<u64>();

/// Plain native structures that may be read from arbitrary bytes.
///
/// # Safety
///
/// Every bit pattern, including all zeroes, must be a valid value of the
/// type, and its alignment must not exceed [`NATIVE_ALIGNMENT`].
pub unsafe trait NativeStruct: Copy {}

macro_rules! native_struct {
    ($($ty:ty),* $(,)?) => {
        $(unsafe impl NativeStruct for $ty {})*
    };
}

native_struct!(u8, u16, u32, u64, i8, i16, i32, i64, usize, isize);

native_struct!(
    windows::Win32::Foundation::LUID,
    windows::Win32::Security::LUID_AND_ATTRIBUTES,
    windows::Win32::Security::TOKEN_PRIVILEGES,
    windows::Win32::Security::PRIVILEGE_SET,
    windows::Win32::Security::SID_AND_ATTRIBUTES,
    windows::Win32::Security::TOKEN_GROUPS,
    windows::Win32::Security::TOKEN_USER,
);

// ============================================================================
// NativeBuffer
// ============================================================================

/// An owned, zero-initialized byte buffer aligned to [`NATIVE_ALIGNMENT`].
///
/// Growing keeps existing contents. Out-of-range indexing returns
/// [`Error::BufferTooSmall`] instead of panicking.
#[derive(Clone, Default)]
pub struct NativeBuffer {
    words: Vec<u64>,
}

impl NativeBuffer {
    /// Creates a buffer holding at least `bytes` zeroed bytes.
    pub fn with_byte_capacity(bytes: usize) -> Self {
        let mut buffer = Self::default();
        buffer.ensure_byte_capacity(bytes);
        buffer
    }

    /// Current capacity in bytes.
    #[inline]
    pub fn byte_capacity(&self) -> usize {
        self.words.len() * NATIVE_ALIGNMENT
    }

    /// Grows to at least `min` bytes. Never shrinks; new bytes are zero.
    pub fn ensure_byte_capacity(&mut self, min: usize) {
        if min > self.byte_capacity() {
            tracing::trace!(from = self.byte_capacity(), to = min, "growing native buffer");
            self.words.resize(min.div_ceil(NATIVE_ALIGNMENT), 0);
        }
    }

    /// Reads the byte at `index`.
    pub fn get(&self, index: usize) -> Result<u8> {
        self.as_bytes()
            .get(index)
            .copied()
            .ok_or_else(|| Error::buffer_too_small(index + 1, self.byte_capacity()))
    }

    /// Writes the byte at `index`.
    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        let capacity = self.byte_capacity();
        let slot = self
            .as_bytes_mut()
            .get_mut(index)
            .ok_or_else(|| Error::buffer_too_small(index + 1, capacity))?;
        *slot = value;
        Ok(())
    }

    /// Zeroes the whole buffer.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// The buffer contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: u64 storage reinterpreted as bytes; same allocation, u8 has
        // no alignment requirement.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast(), self.byte_capacity()) }
    }

    /// The buffer contents, mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_capacity();
        // SAFETY: As for `as_bytes`, with exclusive access through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), len) }
    }

    /// Pointer to the first byte, for passing to native calls.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    /// Mutable pointer to the first byte, for passing to native calls.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    /// Capacity as the `u32` most APIs take.
    #[inline]
    pub fn byte_capacity_u32(&self) -> u32 {
        u32::try_from(self.byte_capacity()).unwrap_or(u32::MAX)
    }

    /// A reader over the contents.
    pub fn reader(&self) -> BufferReader<'_> {
        BufferReader::new(self.as_bytes())
    }
}

impl std::fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("byte_capacity", &self.byte_capacity())
            .finish()
    }
}

// ============================================================================
// StringBuffer
// ============================================================================

/// A UTF-16 buffer whose logical length is tracked separately from its
/// capacity, so it can be handed to an API and then trimmed to what the API
/// wrote.
#[derive(Clone, Default, Debug)]
pub struct StringBuffer {
    units: Vec<u16>,
    len: usize,
}

impl StringBuffer {
    /// Creates an empty buffer with room for `chars` code units.
    pub fn with_char_capacity(chars: usize) -> Self {
        Self {
            units: vec![0; chars],
            len: 0,
        }
    }

    /// Capacity in UTF-16 code units.
    #[inline]
    pub fn char_capacity(&self) -> usize {
        self.units.len()
    }

    /// Capacity as the `u32` most APIs take.
    #[inline]
    pub fn char_capacity_u32(&self) -> u32 {
        u32::try_from(self.units.len()).unwrap_or(u32::MAX)
    }

    /// Logical length in code units.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the logical length is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grows to at least `min` code units. Never shrinks; keeps contents.
    pub fn ensure_char_capacity(&mut self, min: usize) {
        if min > self.units.len() {
            tracing::trace!(from = self.units.len(), to = min, "growing string buffer");
            self.units.resize(min, 0);
        }
    }

    /// Sets the logical length.
    ///
    /// # Errors
    ///
    /// Fails if `len` exceeds the capacity; the buffer is not grown.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.units.len() {
            return Err(Error::buffer_too_small(len, self.units.len()));
        }
        self.len = len;
        Ok(())
    }

    /// Sets the length to the position of the first null, or the full
    /// capacity if there is none.
    pub fn set_len_to_first_null(&mut self) {
        self.len = self
            .units
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.units.len());
    }

    /// Drops trailing nulls from the logical length.
    pub fn trim_end_nulls(&mut self) {
        while self.len > 0 && self.units[self.len - 1] == 0 {
            self.len -= 1;
        }
    }

    /// Appends `s`, growing as needed.
    pub fn push_str(&mut self, s: &str) {
        for unit in s.encode_utf16() {
            if self.len == self.units.len() {
                self.units.push(unit);
            } else {
                self.units[self.len] = unit;
            }
            self.len += 1;
        }
    }

    /// Resets the length to zero, keeping capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The code units within the logical length.
    #[inline]
    pub fn as_wide(&self) -> &[u16] {
        &self.units[..self.len]
    }

    /// The full capacity, for APIs that write into the buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        &mut self.units
    }

    /// The buffer as a `PWSTR`.
    #[inline]
    pub fn as_pwstr(&mut self) -> PWSTR {
        PWSTR(self.units.as_mut_ptr())
    }

    /// Returns true if the contents start with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        let mut units = self.as_wide().iter();
        prefix.encode_utf16().all(|p| units.next() == Some(&p))
    }

    /// Decodes `count` code units starting at `start`.
    pub fn substring(&self, start: usize, count: usize) -> Result<String> {
        let end = start
            .checked_add(count)
            .filter(|&end| end <= self.len)
            .ok_or_else(|| Error::buffer_too_small(start.saturating_add(count), self.len))?;
        crate::string::from_wide_with_len(&self.units[start..end], count)
    }

    /// Decodes the contents, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_wide())
    }
}

impl std::fmt::Display for StringBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

// ============================================================================
// StringBufferCache
// ============================================================================

/// Default starting size for buffers handed out by [`StringBufferCache::with_buffer`].
pub const MIN_BUFFER_CHARS: usize = 128;

/// Largest number of buffers kept in a pool.
pub const MAX_CACHED: usize = 4;

/// Buffers larger than this are dropped instead of pooled.
pub const MAX_CACHED_CHARS: usize = 32 * 1024;

/// Upper bound for [`buffer_invoke`] growth (`UNICODE_STRING` limit is far lower).
pub const MAX_BUFFER_CHARS: usize = i32::MAX as usize / 2;

/// A pool of reusable [`StringBuffer`]s.
///
/// [`StringBufferCache::global`] is shared by every call in this crate that
/// needs a scratch string.
pub struct StringBufferCache {
    pool: Mutex<Vec<StringBuffer>>,
}

static GLOBAL_CACHE: StringBufferCache = StringBufferCache::new();

impl StringBufferCache {
    /// Creates an empty pool.
    pub const fn new() -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide pool.
    pub fn global() -> &'static StringBufferCache {
        &GLOBAL_CACHE
    }

    /// Takes a buffer with at least `min_chars` capacity and zero length.
    pub fn acquire(&self, min_chars: usize) -> StringBuffer {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        match pool.iter().position(|b| b.char_capacity() >= min_chars) {
            Some(index) => {
                let mut buffer = pool.swap_remove(index);
                buffer.clear();
                buffer
            }
            None => StringBuffer::with_char_capacity(min_chars),
        }
    }

    /// Returns a buffer to the pool unless the pool is full or the buffer is
    /// oversized.
    pub fn release(&self, buffer: StringBuffer) {
        if buffer.char_capacity() > MAX_CACHED_CHARS {
            return;
        }
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.len() < MAX_CACHED {
            pool.push(buffer);
        }
    }

    /// Number of pooled buffers.
    pub fn cached(&self) -> usize {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs `f` with a pooled buffer of at least [`MIN_BUFFER_CHARS`],
    /// releasing it afterwards whether `f` succeeds or not.
    pub fn with_buffer<T>(&self, f: impl FnOnce(&mut StringBuffer) -> Result<T>) -> Result<T> {
        let mut buffer = self.acquire(MIN_BUFFER_CHARS);
        let result = f(&mut buffer);
        self.release(buffer);
        result
    }
}

impl Default for StringBufferCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Grow-until-fits
// ============================================================================

/// Outcome of one attempt inside [`buffer_invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowResult<T, N = usize> {
    /// The call succeeded.
    Done(T),
    /// The buffer was too small; retry with this capacity.
    Grow(N),
}

fn next_capacity(requested: usize, current: usize) -> Result<usize> {
    // Some APIs report "too small" without a size; double instead.
    let next = if requested > current {
        requested
    } else {
        current.saturating_mul(2).max(MIN_BUFFER_CHARS)
    };
    if next > MAX_BUFFER_CHARS {
        return Err(Error::buffer_too_small(next, MAX_BUFFER_CHARS));
    }
    Ok(next)
}

/// Calls `f` with a pooled buffer, growing and retrying while it asks to.
///
/// # Example
///
/// ```ignore
/// let name = buffer_invoke(|buf| {
///     let mut len = buf.char_capacity_u32();
///     match unsafe { GetUserNameW(buf.as_pwstr(), &mut len) } {
///         Ok(()) => { buf.set_len((len - 1) as usize)?; Ok(GrowResult::Done(buf.to_string_lossy())) }
///         Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => Ok(GrowResult::Grow(len as usize)),
///         Err(e) => Err(e.into()),
///     }
/// })?;
/// ```
pub fn buffer_invoke<T>(
    mut f: impl FnMut(&mut StringBuffer) -> Result<GrowResult<T>>,
) -> Result<T> {
    StringBufferCache::global().with_buffer(|buffer| loop {
        match f(buffer)? {
            GrowResult::Done(value) => return Ok(value),
            GrowResult::Grow(needed) => {
                let next = next_capacity(needed, buffer.char_capacity())?;
                buffer.ensure_char_capacity(next);
            }
        }
    })
}

/// Like [`buffer_invoke`] for APIs that fill two strings at once.
pub fn two_buffer_invoke<T>(
    mut f: impl FnMut(&mut StringBuffer, &mut StringBuffer) -> Result<GrowResult<T, (usize, usize)>>,
) -> Result<T> {
    let cache = StringBufferCache::global();
    let mut second = cache.acquire(MIN_BUFFER_CHARS);
    let result = cache.with_buffer(|first| loop {
        match f(first, &mut second)? {
            GrowResult::Done(value) => return Ok(value),
            GrowResult::Grow((a, b)) => {
                if a <= first.char_capacity() && b <= second.char_capacity() {
                    let next = next_capacity(0, first.char_capacity())?;
                    first.ensure_char_capacity(next);
                    second.ensure_char_capacity(next);
                } else {
                    first.ensure_char_capacity(a);
                    second.ensure_char_capacity(b);
                }
            }
        }
    });
    cache.release(second);
    result
}

/// Fills a string from the common "returns the length" API shape.
///
/// `f` writes into the slice and returns:
///
/// - the number of characters written (excluding the null) on success,
/// - the required size (including the null) when the slice is too small,
/// - or exactly the slice length when the result was truncated,
/// - zero on failure, with the last error set.
///
/// A zero return with no last error is an empty string.
pub fn fill_string(mut f: impl FnMut(&mut [u16]) -> u32) -> Result<String> {
    buffer_invoke(|buffer| {
        // SAFETY: SetLastError only writes thread-local state.
        unsafe { SetLastError(NO_ERROR) };
        let returned = f(buffer.as_mut_slice()) as usize;

        if returned == 0 {
            let code = last_error_code();
            if code != NO_ERROR {
                return Err(error_for_win32(code, None));
            }
        } else if returned == buffer.char_capacity() {
            // Truncated (GetModuleFileNameW shape): the length says nothing
            // about the size needed, so double.
            return Ok(GrowResult::Grow(0));
        } else if returned > buffer.char_capacity() {
            return Ok(GrowResult::Grow(returned));
        }

        buffer.set_len(returned)?;
        Ok(GrowResult::Done(buffer.to_string_lossy()))
    })
}

/// Returns true if `code` means "try again with a larger buffer".
#[inline]
pub fn is_buffer_too_small(code: WIN32_ERROR) -> bool {
    use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA};
    code == ERROR_INSUFFICIENT_BUFFER || code == ERROR_MORE_DATA
}

/// Returns true if `error` carries a "buffer too small" Win32 code.
#[inline]
pub fn is_buffer_too_small_error(error: &windows::core::Error) -> bool {
    use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA};
    let code = error.code();
    code == ERROR_INSUFFICIENT_BUFFER.to_hresult() || code == ERROR_MORE_DATA.to_hresult()
}

// ============================================================================
// BufferReader
// ============================================================================

/// A sequential, bounds-checked reader over native bytes.
///
/// Reads past the end return [`Error::BufferTooSmall`].
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

macro_rules! read_int {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Reads a native-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self) -> Result<$ty> {
                let bytes = self.take(size_of::<$ty>())?;
                let mut raw = [0u8; size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                Ok(<$ty>::from_ne_bytes(raw))
            }
        )*
    };
}

impl<'a> BufferReader<'a> {
    /// Starts reading at offset zero.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Current offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the current offset.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Moves to an absolute offset. The end of the buffer is a valid offset.
    pub fn set_offset(&mut self, offset: usize) -> Result<()> {
        if offset > self.bytes.len() {
            return Err(Error::buffer_too_small(offset, self.bytes.len()));
        }
        self.offset = offset;
        Ok(())
    }

    /// Rounds the offset up to a multiple of `alignment` (a power of two).
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        if !alignment.is_power_of_two() {
            return Err(Error::invalid_argument("alignment must be a power of two"));
        }
        let aligned = self
            .offset
            .checked_add(alignment - 1)
            .ok_or_else(|| Error::buffer_too_small(usize::MAX, self.bytes.len()))?
            & !(alignment - 1);
        self.set_offset(aligned)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::buffer_too_small(self.offset.saturating_add(count), self.bytes.len()))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    read_int!(
        read_u8 => u8,
        read_u16 => u16,
        read_u32 => u32,
        read_u64 => u64,
        read_i32 => i32,
        read_i64 => i64,
        read_usize => usize,
    );

    /// Reads a native structure (unaligned).
    pub fn read_struct<T: NativeStruct>(&mut self) -> Result<T> {
        let bytes = self.take(size_of::<T>())?;
        // SAFETY: `bytes` holds exactly size_of::<T>() bytes and
        // NativeStruct guarantees any bit pattern is a valid T.
        Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
    }

    /// Reads `chars` UTF-16 code units and decodes them, stopping at an
    /// embedded null.
    pub fn read_utf16(&mut self, chars: usize) -> Result<String> {
        let byte_len = chars
            .checked_mul(2)
            .ok_or_else(|| Error::buffer_too_small(usize::MAX, self.bytes.len()))?;
        let bytes = self.take(byte_len)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        crate::string::from_wide(&units)
    }
}

// ============================================================================
// TrailingArray
// ============================================================================

/// A native header `H` followed by a variable-length array of `T`.
///
/// Many structures (for example `TOKEN_PRIVILEGES`) declare a one-element
/// array as their last field and are over-allocated to hold more. The array
/// begins at `array_offset` (use `std::mem::offset_of!`), which may lie inside
/// `H`.
pub struct TrailingArray<H: NativeStruct, T: NativeStruct> {
    buffer: NativeBuffer,
    array_offset: usize,
    _marker: PhantomData<(H, T)>,
}

impl<H: NativeStruct, T: NativeStruct> TrailingArray<H, T> {
    fn required_bytes(array_offset: usize, count: usize) -> Result<usize> {
        count
            .checked_mul(size_of::<T>())
            .and_then(|array| array.checked_add(array_offset))
            .map(|total| total.max(size_of::<H>()))
            .ok_or_else(|| Error::invalid_argument("trailing array size overflows"))
    }

    fn check_layout(array_offset: usize) -> Result<()> {
        if align_of::<H>() > NATIVE_ALIGNMENT || align_of::<T>() > NATIVE_ALIGNMENT {
            return Err(Error::invalid_argument("alignment exceeds native buffer alignment"));
        }
        if array_offset % align_of::<T>() != 0 {
            return Err(Error::invalid_argument("misaligned trailing array offset"));
        }
        Ok(())
    }

    /// Allocates room for `header` plus `count` array elements.
    pub fn with_count(header: H, array_offset: usize, count: usize) -> Result<Self> {
        Self::check_layout(array_offset)?;
        let mut buffer = NativeBuffer::with_byte_capacity(Self::required_bytes(array_offset, count)?);
        // SAFETY: The buffer is at least size_of::<H>() bytes and aligned.
        unsafe { buffer.as_mut_ptr().cast::<H>().write(header) };
        Ok(Self {
            buffer,
            array_offset,
            _marker: PhantomData,
        })
    }

    /// Wraps a buffer a native call has filled.
    pub fn from_buffer(buffer: NativeBuffer, array_offset: usize) -> Result<Self> {
        Self::check_layout(array_offset)?;
        if buffer.byte_capacity() < size_of::<H>().max(array_offset) {
            return Err(Error::buffer_too_small(
                size_of::<H>().max(array_offset),
                buffer.byte_capacity(),
            ));
        }
        Ok(Self {
            buffer,
            array_offset,
            _marker: PhantomData,
        })
    }

    /// Number of `T` that fit in the allocation.
    pub fn capacity(&self) -> usize {
        if size_of::<T>() == 0 {
            return 0;
        }
        (self.buffer.byte_capacity() - self.array_offset) / size_of::<T>()
    }

    /// The header.
    pub fn header(&self) -> &H {
        // SAFETY: Aligned, at least size_of::<H>() bytes, any bit pattern valid.
        unsafe { &*self.buffer.as_ptr().cast::<H>() }
    }

    /// The header, mutably.
    pub fn header_mut(&mut self) -> &mut H {
        // SAFETY: As for `header`, with exclusive access.
        unsafe { &mut *self.buffer.as_mut_ptr().cast::<H>() }
    }

    /// The first `count` elements.
    pub fn as_slice(&self, count: usize) -> Result<&[T]> {
        self.check_count(count)?;
        // SAFETY: `count` elements fit after the aligned array offset.
        Ok(unsafe {
            std::slice::from_raw_parts(self.buffer.as_ptr().add(self.array_offset).cast(), count)
        })
    }

    /// The first `count` elements, mutably.
    pub fn as_mut_slice(&mut self, count: usize) -> Result<&mut [T]> {
        self.check_count(count)?;
        let offset = self.array_offset;
        // SAFETY: As for `as_slice`, with exclusive access.
        Ok(unsafe {
            std::slice::from_raw_parts_mut(self.buffer.as_mut_ptr().add(offset).cast(), count)
        })
    }

    fn check_count(&self, count: usize) -> Result<()> {
        if count > self.capacity() {
            return Err(Error::buffer_too_small(
                self.array_offset + count * size_of::<T>(),
                self.buffer.byte_capacity(),
            ));
        }
        Ok(())
    }

    /// Pointer to the header for passing to native calls.
    pub fn as_ptr(&self) -> *const H {
        self.buffer.as_ptr().cast()
    }

    /// Mutable pointer to the header for passing to native calls.
    pub fn as_mut_ptr(&mut self) -> *mut H {
        self.buffer.as_mut_ptr().cast()
    }

    /// Total allocation size in bytes.
    pub fn byte_len(&self) -> usize {
        self.buffer.byte_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;
    use windows::Win32::Foundation::LUID;
    use windows::Win32::Security::{LUID_AND_ATTRIBUTES, TOKEN_PRIVILEGES};

    #[test]
    fn test_native_buffer_growth_keeps_contents() {
        let mut buffer = NativeBuffer::with_byte_capacity(3);
        assert_eq!(buffer.byte_capacity(), 8);
        buffer.set(2, 0xAB).unwrap();

        buffer.ensure_byte_capacity(100);
        assert!(buffer.byte_capacity() >= 100);
        assert_eq!(buffer.get(2).unwrap(), 0xAB);
        assert_eq!(buffer.get(99).unwrap(), 0);

        // Never shrinks
        buffer.ensure_byte_capacity(1);
        assert!(buffer.byte_capacity() >= 100);
        assert_eq!(buffer.as_ptr() as usize % NATIVE_ALIGNMENT, 0);
    }

    #[test]
    fn test_native_buffer_out_of_range() {
        let mut buffer = NativeBuffer::with_byte_capacity(8);
        assert!(matches!(
            buffer.get(8),
            Err(Error::BufferTooSmall { needed: 9, actual: 8 })
        ));
        assert!(buffer.set(64, 1).is_err());
        assert!(NativeBuffer::default().get(0).is_err());
    }

    #[test]
    fn test_string_buffer_length() {
        let mut buffer = StringBuffer::with_char_capacity(4);
        assert!(buffer.is_empty());
        assert!(buffer.set_len(5).is_err());
        assert_eq!(buffer.char_capacity(), 4);

        buffer.push_str("hello");
        assert_eq!(buffer.len(), 5);
        assert!(buffer.char_capacity() >= 5);
        assert!(buffer.starts_with("hel"));
        assert!(!buffer.starts_with("help"));
        assert_eq!(buffer.substring(1, 3).unwrap(), "ell");
        assert!(buffer.substring(3, 3).is_err());
    }

    #[test]
    fn test_string_buffer_native_fill() {
        let mut buffer = StringBuffer::with_char_capacity(8);
        buffer.as_mut_slice()[..3].copy_from_slice(&[0x61, 0x62, 0]);
        buffer.set_len_to_first_null();
        assert_eq!(buffer.to_string(), "ab");

        buffer.set_len(4).unwrap();
        buffer.trim_end_nulls();
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_cache_reuses_released_buffers() {
        let cache = StringBufferCache::new();
        let mut buffer = cache.acquire(300);
        buffer.push_str("stale");
        cache.release(buffer);
        assert_eq!(cache.cached(), 1);

        let reused = cache.acquire(200);
        assert!(reused.char_capacity() >= 300);
        assert!(reused.is_empty());
        assert_eq!(cache.cached(), 0);
    }

    #[test]
    fn test_cache_caps_pool() {
        let cache = StringBufferCache::new();
        for _ in 0..MAX_CACHED + 2 {
            cache.release(StringBuffer::with_char_capacity(16));
        }
        assert_eq!(cache.cached(), MAX_CACHED);

        let cache = StringBufferCache::new();
        cache.release(StringBuffer::with_char_capacity(MAX_CACHED_CHARS + 1));
        assert_eq!(cache.cached(), 0);
    }

    #[test]
    fn test_with_buffer_releases_on_error() {
        let cache = StringBufferCache::new();
        let result: Result<()> = cache.with_buffer(|buffer| {
            assert!(buffer.char_capacity() >= MIN_BUFFER_CHARS);
            Err(Error::custom("boom"))
        });
        assert!(result.is_err());
        assert_eq!(cache.cached(), 1);
    }

    #[test]
    fn test_buffer_invoke_grows() {
        let mut calls = 0;
        let value = buffer_invoke(|buffer| {
            calls += 1;
            if buffer.char_capacity() < 1000 {
                return Ok(GrowResult::Grow(1000));
            }
            buffer.push_str("fits");
            Ok(GrowResult::Done(buffer.to_string_lossy()))
        })
        .unwrap();
        assert_eq!(value, "fits");
        assert!(calls <= 2);
    }

    #[test]
    fn test_buffer_invoke_doubles_without_size() {
        let mut sizes = Vec::new();
        let _ = buffer_invoke(|buffer| {
            sizes.push(buffer.char_capacity());
            if sizes.len() < 3 {
                Ok(GrowResult::Grow(0))
            } else {
                Ok(GrowResult::Done(()))
            }
        });
        assert!(sizes[1] >= sizes[0] * 2);
        assert!(sizes[2] >= sizes[1] * 2);
    }

    #[test]
    fn test_buffer_invoke_refuses_huge_growth() {
        let result = buffer_invoke::<()>(|_| Ok(GrowResult::Grow(MAX_BUFFER_CHARS + 1)));
        assert!(matches!(result, Err(Error::BufferTooSmall { .. })));
    }

    #[test]
    fn test_fill_string() {
        let text: Vec<u16> = "C:\\Windows\\System32".encode_utf16().collect();
        let value = fill_string(|buffer| {
            if buffer.len() <= text.len() {
                return text.len() as u32 + 1;
            }
            buffer[..text.len()].copy_from_slice(&text);
            buffer[text.len()] = 0;
            text.len() as u32
        })
        .unwrap();
        assert_eq!(value, "C:\\Windows\\System32");
    }

    #[test]
    fn test_fill_string_doubles_on_truncation() {
        let text: Vec<u16> = "x".repeat(5000).encode_utf16().collect();
        let mut calls = 0;
        let value = fill_string(|buffer| {
            calls += 1;
            let n = text.len().min(buffer.len());
            buffer[..n].copy_from_slice(&text[..n]);
            if n == buffer.len() {
                // Truncated: the last slot holds a null and the full
                // capacity comes back.
                buffer[n - 1] = 0;
                return buffer.len() as u32;
            }
            buffer[n] = 0;
            n as u32
        })
        .unwrap();
        assert_eq!(value.len(), 5000);
        assert!(calls <= 8, "grew {calls} times");
    }

    #[test]
    fn test_reader_align_overflow() {
        let bytes = [0u8; 4];
        let mut reader = BufferReader::new(&bytes);
        reader.read_u8().unwrap();
        let huge = 1usize << (usize::BITS - 1);
        assert!(matches!(reader.align(huge), Err(Error::BufferTooSmall { .. })));
        assert_eq!(reader.offset(), 1);
    }

    #[test]
    fn test_reader_bounds() {
        let bytes = [1u8, 0, 2, 0, 0, 0, 0xFF];
        let mut reader = BufferReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.remaining(), 1);
        assert!(matches!(
            reader.read_u16(),
            Err(Error::BufferTooSmall { needed: 8, actual: 7 })
        ));
        // A failed read does not advance.
        assert_eq!(reader.read_u8().unwrap(), 0xFF);
        assert!(reader.set_offset(8).is_err());
    }

    #[test]
    fn test_reader_align_and_utf16() {
        let mut bytes = vec![0xAAu8];
        bytes.extend([0u8; 3]);
        bytes.extend("Hi".encode_utf16().flat_map(u16::to_ne_bytes));
        bytes.extend([0u8, 0]);

        let mut reader = BufferReader::new(&bytes);
        reader.read_u8().unwrap();
        reader.align(4).unwrap();
        assert_eq!(reader.offset(), 4);
        assert_eq!(reader.read_utf16(3).unwrap(), "Hi");
        assert!(reader.align(3).is_err());
    }

    #[test]
    fn test_reader_struct() {
        let luid = LUID {
            LowPart: 20,
            HighPart: 0,
        };
        let mut buffer = NativeBuffer::with_byte_capacity(size_of::<LUID>());
        buffer.as_bytes_mut()[..4].copy_from_slice(&20u32.to_ne_bytes());
        let read: LUID = buffer.reader().read_struct().unwrap();
        assert_eq!(read, luid);
    }

    #[test]
    fn test_trailing_array() {
        let offset = offset_of!(TOKEN_PRIVILEGES, Privileges);
        let header = TOKEN_PRIVILEGES {
            PrivilegeCount: 3,
            ..Default::default()
        };
        let mut array =
            TrailingArray::<TOKEN_PRIVILEGES, LUID_AND_ATTRIBUTES>::with_count(header, offset, 3)
                .unwrap();

        assert_eq!(array.header().PrivilegeCount, 3);
        assert!(array.capacity() >= 3);
        assert!(array.byte_len() >= offset + 3 * size_of::<LUID_AND_ATTRIBUTES>());

        array.as_mut_slice(3).unwrap()[2].Luid.LowPart = 7;
        assert_eq!(array.as_slice(3).unwrap()[2].Luid.LowPart, 7);
        assert!(array.as_slice(array.capacity() + 1).is_err());

        array.header_mut().PrivilegeCount = 1;
        assert_eq!(array.header().PrivilegeCount, 1);
    }

    #[test]
    fn test_trailing_array_from_short_buffer() {
        let offset = offset_of!(TOKEN_PRIVILEGES, Privileges);
        let result = TrailingArray::<TOKEN_PRIVILEGES, LUID_AND_ATTRIBUTES>::from_buffer(
            NativeBuffer::with_byte_capacity(2),
            offset,
        );
        assert!(result.is_err());
    }
}
