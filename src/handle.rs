//! RAII wrappers for kernel object handles.
//!
//! [`OwnedHandle`] closes its handle with `CloseHandle` when dropped;
//! [`BorrowedHandle`] never closes. Both reject `INVALID_HANDLE_VALUE`.

use crate::buffer::NativeBuffer;
use crate::error::{error_for_ntstatus, Error, Result};
use std::marker::PhantomData;
use windows::Wdk::Foundation::{
    NtQueryObject, ObjectTypeInformation, OBJECT_INFORMATION_CLASS, OBJECT_NAME_INFORMATION,
};
use windows::Win32::Foundation::{
    CloseHandle, DuplicateHandle, GetHandleInformation, SetHandleInformation,
    DUPLICATE_SAME_ACCESS, HANDLE, HANDLE_FLAGS, HANDLE_FLAG_INHERIT,
    HANDLE_FLAG_PROTECT_FROM_CLOSE, INVALID_HANDLE_VALUE, STATUS_BUFFER_OVERFLOW,
    STATUS_BUFFER_TOO_SMALL, STATUS_INFO_LENGTH_MISMATCH, UNICODE_STRING,
};
use windows::Win32::Storage::FileSystem::{
    GetFileType, FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE, FILE_TYPE_REMOTE,
};
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::Win32::System::WindowsProgramming::PUBLIC_OBJECT_TYPE_INFORMATION;

/// A kernel `HANDLE` that is closed when dropped.
///
/// # Example
///
/// ```ignore
/// use winterop::handle::OwnedHandle;
///
/// // Closed when `handle` goes out of scope
/// let handle = OwnedHandle::new(raw)?;
/// ```
#[derive(Debug)]
pub struct OwnedHandle {
    raw: HANDLE,
}

impl OwnedHandle {
    /// Takes ownership of `raw`.
    ///
    /// Returns an error if the handle is null or `INVALID_HANDLE_VALUE`.
    #[inline]
    pub fn new(raw: HANDLE) -> Result<Self> {
        if !raw.is_valid() {
            return Err(Error::invalid_handle("OwnedHandle::new"));
        }
        Ok(Self { raw })
    }

    /// Takes ownership of `raw`, allowing a null handle.
    ///
    /// Some APIs (process creation without a thread, for one) legitimately
    /// produce null; dropping a null `OwnedHandle` is a no-op.
    pub fn new_allow_null(raw: HANDLE) -> Result<Self> {
        if raw == INVALID_HANDLE_VALUE {
            return Err(Error::invalid_handle("OwnedHandle::new_allow_null"));
        }
        Ok(Self { raw })
    }

    /// Takes ownership of `raw` without validation.
    ///
    /// # Safety
    ///
    /// `raw` must be an open handle that nothing else will close.
    #[inline]
    pub unsafe fn new_unchecked(raw: HANDLE) -> Self {
        Self { raw }
    }

    /// Returns the raw `HANDLE`.
    #[inline]
    pub fn as_raw(&self) -> HANDLE {
        self.raw
    }

    /// Borrows this handle.
    #[inline]
    pub fn borrow(&self) -> BorrowedHandle<'_> {
        BorrowedHandle::from_owned(self)
    }

    /// Releases ownership without closing.
    #[inline]
    pub fn into_raw(self) -> HANDLE {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }

    /// Duplicates the handle with the same access rights.
    ///
    /// # Errors
    ///
    /// Fails if the object does not permit duplication.
    pub fn try_clone(&self) -> Result<Self> {
        let mut duplicate = HANDLE::default();

        // SAFETY: The current-process pseudo-handle is always valid and
        // `self.raw` is open for the duration of the call.
        unsafe {
            let process = GetCurrentProcess();
            DuplicateHandle(
                process,
                self.raw,
                process,
                &mut duplicate,
                0,
                false,
                DUPLICATE_SAME_ACCESS,
            )?;
        }

        Self::new(duplicate)
    }

    /// Reads the inherit / protect-from-close flags.
    pub fn information(&self) -> Result<HandleInformation> {
        handle_information(self.raw)
    }

    /// Updates the flags selected by `mask` to the values in `info`.
    pub fn set_information(&self, mask: HandleInformation, info: HandleInformation) -> Result<()> {
        // SAFETY: `self.raw` is an open handle.
        unsafe { SetHandleInformation(self.raw, mask.to_native().0, info.to_native())? };
        Ok(())
    }

    /// Classifies the object behind this handle.
    pub fn kind(&self) -> HandleKind {
        handle_kind(self.raw)
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if self.raw.is_valid() {
            // SAFETY: We own the handle and it is not used after this point.
            if let Err(e) = unsafe { CloseHandle(self.raw) } {
                tracing::warn!(error = %e, "CloseHandle failed");
            }
        }
    }
}

impl AsRef<HANDLE> for OwnedHandle {
    fn as_ref(&self) -> &HANDLE {
        &self.raw
    }
}

/// A handle borrowed for `'a`; never closed by this type.
#[derive(Clone, Copy, Debug)]
pub struct BorrowedHandle<'a> {
    raw: HANDLE,
    _marker: PhantomData<&'a OwnedHandle>,
}

impl<'a> BorrowedHandle<'a> {
    /// Wraps a raw handle.
    ///
    /// # Safety
    ///
    /// The handle must stay open for all of `'a`.
    #[inline]
    pub unsafe fn new(raw: HANDLE) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Borrows from an owned handle.
    #[inline]
    pub fn from_owned(owned: &'a OwnedHandle) -> Self {
        Self {
            raw: owned.raw,
            _marker: PhantomData,
        }
    }

    /// Returns the raw `HANDLE`.
    #[inline]
    pub fn as_raw(&self) -> HANDLE {
        self.raw
    }

    /// Classifies the object behind this handle.
    pub fn kind(&self) -> HandleKind {
        handle_kind(self.raw)
    }
}

impl<'a> From<&'a OwnedHandle> for BorrowedHandle<'a> {
    fn from(owned: &'a OwnedHandle) -> Self {
        BorrowedHandle::from_owned(owned)
    }
}

/// Extension trait for raw handles.
pub trait HandleExt {
    /// Returns true if this handle is neither null nor `INVALID_HANDLE_VALUE`.
    fn is_valid(&self) -> bool;
}

impl HandleExt for HANDLE {
    #[inline]
    fn is_valid(&self) -> bool {
        !self.is_invalid() && !self.0.is_null()
    }
}

/// Flags from `GetHandleInformation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleInformation {
    /// Child processes inherit the handle.
    pub inherit: bool,
    /// `CloseHandle` fails on this handle.
    pub protect_from_close: bool,
}

impl HandleInformation {
    /// Mask selecting both flags.
    pub const ALL: Self = Self {
        inherit: true,
        protect_from_close: true,
    };

    fn from_native(flags: u32) -> Self {
        Self {
            inherit: flags & HANDLE_FLAG_INHERIT.0 != 0,
            protect_from_close: flags & HANDLE_FLAG_PROTECT_FROM_CLOSE.0 != 0,
        }
    }

    fn to_native(self) -> HANDLE_FLAGS {
        let mut flags = 0;
        if self.inherit {
            flags |= HANDLE_FLAG_INHERIT.0;
        }
        if self.protect_from_close {
            flags |= HANDLE_FLAG_PROTECT_FROM_CLOSE.0;
        }
        HANDLE_FLAGS(flags)
    }
}

/// Reads the flags of any raw handle.
pub fn handle_information(raw: HANDLE) -> Result<HandleInformation> {
    let mut flags = 0u32;
    // SAFETY: `flags` is a valid output location.
    unsafe { GetHandleInformation(raw, &mut flags)? };
    Ok(HandleInformation::from_native(flags))
}

/// What kind of object a handle refers to, as far as `GetFileType` can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A disk file or directory.
    Disk,
    /// A character device such as a console.
    Character,
    /// A pipe or socket.
    Pipe,
    /// Reported as remote; unused by modern Windows.
    Remote,
    /// Not a file-like object (process, thread, event, token, ...).
    Other,
}

impl HandleKind {
    /// A short lower-case name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Disk => "disk",
            HandleKind::Character => "character",
            HandleKind::Pipe => "pipe",
            HandleKind::Remote => "remote",
            HandleKind::Other => "other",
        }
    }
}

fn handle_kind(raw: HANDLE) -> HandleKind {
    // SAFETY: GetFileType tolerates any handle value and reports failure
    // through FILE_TYPE_UNKNOWN.
    let file_type = unsafe { GetFileType(raw) };
    match file_type {
        FILE_TYPE_DISK => HandleKind::Disk,
        FILE_TYPE_CHAR => HandleKind::Character,
        FILE_TYPE_PIPE => HandleKind::Pipe,
        FILE_TYPE_REMOTE => HandleKind::Remote,
        _ => HandleKind::Other,
    }
}

// Not exported by the bindings.
const OBJECT_NAME_INFORMATION_CLASS: OBJECT_INFORMATION_CLASS = OBJECT_INFORMATION_CLASS(1);

// A type name fits in the first try; object names are bounded by the
// 64 KiB limit of a UNICODE_STRING plus its header.
const INITIAL_QUERY_BYTES: usize = 256;
const MAX_QUERY_BYTES: usize = u16::MAX as usize + 1024;

/// Runs `NtQueryObject`, growing the buffer until the result fits, and
/// returns the `UNICODE_STRING` that both the type and the name records
/// start with, copied out as a `String`.
fn query_object_string(
    raw: HANDLE,
    class: OBJECT_INFORMATION_CLASS,
    read: impl Fn(&NativeBuffer) -> UNICODE_STRING,
) -> Result<String> {
    let mut buffer = NativeBuffer::with_byte_capacity(INITIAL_QUERY_BYTES);

    loop {
        let mut needed = 0u32;
        // SAFETY: The buffer is writable for its full capacity and suitably
        // aligned for the record types.
        let status = unsafe {
            NtQueryObject(
                raw,
                class,
                Some(buffer.as_mut_ptr().cast()),
                buffer.byte_capacity_u32(),
                Some(&mut needed as *mut u32),
            )
        };

        match status {
            STATUS_INFO_LENGTH_MISMATCH | STATUS_BUFFER_OVERFLOW | STATUS_BUFFER_TOO_SMALL => {
                let next = (needed as usize).max(buffer.byte_capacity() * 2);
                if next > MAX_QUERY_BYTES {
                    return Err(Error::buffer_too_small(next, buffer.byte_capacity()));
                }
                buffer.ensure_byte_capacity(next);
            }
            status if status.is_err() => {
                return Err(error_for_ntstatus(status, Some("NtQueryObject")));
            }
            _ => break,
        }
    }

    let text = read(&buffer);
    if text.Buffer.is_null() || text.Length == 0 {
        return Ok(String::new());
    }
    // SAFETY: `Buffer` points into `buffer`, which is still alive, and
    // `Length` is a byte count.
    let units = unsafe { std::slice::from_raw_parts(text.Buffer.0, text.Length as usize / 2) };
    Ok(String::from_utf16_lossy(units))
}

/// Returns the kernel object type name behind `handle`, such as `"File"`,
/// `"Event"`, `"Process"` or `"Key"`.
pub fn handle_type_name(handle: &OwnedHandle) -> Result<String> {
    query_object_string(handle.as_raw(), ObjectTypeInformation, |buffer| {
        // SAFETY: A successful query wrote this record at the start.
        unsafe { buffer.as_ptr().cast::<PUBLIC_OBJECT_TYPE_INFORMATION>().read() }.TypeName
    })
}

/// Returns the kernel namespace name of the object behind `handle`, for
/// example `\Device\HarddiskVolume3\Windows` for a directory. Unnamed
/// objects give an empty string.
///
/// Querying the name of a synchronous pipe handle with a pending read can
/// block until the read completes.
pub fn handle_object_name(handle: &OwnedHandle) -> Result<String> {
    query_object_string(handle.as_raw(), OBJECT_NAME_INFORMATION_CLASS, |buffer| {
        // SAFETY: A successful query wrote this record at the start.
        unsafe { buffer.as_ptr().cast::<OBJECT_NAME_INFORMATION>().read() }.Name
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::windows::io::IntoRawHandle;
    use windows::Win32::System::Threading::{CreateEventW, GetCurrentThread};

    fn new_event() -> OwnedHandle {
        // SAFETY: Anonymous manual-reset event with default security.
        let raw = unsafe { CreateEventW(None, true, false, None) }.unwrap();
        OwnedHandle::new(raw).unwrap()
    }

    #[test]
    fn test_invalid_handle_rejected() {
        assert!(OwnedHandle::new(INVALID_HANDLE_VALUE).is_err());
        assert!(OwnedHandle::new_allow_null(INVALID_HANDLE_VALUE).is_err());
    }

    #[test]
    fn test_null_handle_rejected() {
        assert!(OwnedHandle::new(HANDLE::default()).is_err());
        assert!(OwnedHandle::new_allow_null(HANDLE::default()).is_ok());
    }

    #[test]
    fn test_try_clone_is_independent() {
        let event = new_event();
        let clone = event.try_clone().unwrap();
        assert_ne!(event.as_raw(), clone.as_raw());
        drop(event);
        assert!(clone.information().is_ok());
    }

    #[test]
    fn test_handle_information_roundtrip() {
        let event = new_event();
        assert!(!event.information().unwrap().inherit);

        let inherit = HandleInformation {
            inherit: true,
            protect_from_close: false,
        };
        event.set_information(inherit, inherit).unwrap();
        assert_eq!(event.information().unwrap(), inherit);
    }

    #[test]
    fn test_event_is_not_file_like() {
        let event = new_event();
        assert_eq!(event.kind(), HandleKind::Other);
        assert_eq!(event.borrow().kind(), HandleKind::Other);
        assert_eq!(event.kind().name(), "other");
    }

    #[test]
    fn test_type_name_of_event() {
        let event = new_event();
        assert_eq!(handle_type_name(&event).unwrap(), "Event");
        assert_eq!(handle_object_name(&event).unwrap(), "");
    }

    #[test]
    fn test_directory_handle_is_file_object() {
        let dir = tempfile::tempdir().unwrap();
        // std opens with FILE_FLAG_BACKUP_SEMANTICS, which directories need.
        let file = std::fs::File::open(dir.path()).unwrap();
        let handle = OwnedHandle::new(HANDLE(file.into_raw_handle())).unwrap();

        assert_eq!(handle_type_name(&handle).unwrap(), "File");
        assert_eq!(handle.kind(), HandleKind::Disk);

        let leaf = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        let name = handle_object_name(&handle).unwrap();
        assert!(name.starts_with("\\Device\\"), "{name}");
        assert!(name.ends_with(&leaf), "{name}");
    }

    #[test]
    fn test_pseudo_handle_is_valid() {
        // SAFETY: Pseudo-handle; never closed.
        let thread = unsafe { GetCurrentThread() };
        assert!(thread.is_valid());
    }
}
