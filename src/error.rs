//! Error handling utilities for Windows API calls.
//!
//! Native failures arrive in three shapes: `GetLastError` codes, `HRESULT`s
//! and `NTSTATUS` values. Each is translated into [`Error`] through a direct
//! lookup table; codes without a dedicated variant are carried verbatim in
//! [`Error::Windows`].

use thiserror::Error;
use windows::core::{Error as WinError, HRESULT};
use windows::Win32::Foundation::{
    E_ACCESSDENIED, E_INVALIDARG, E_NOTIMPL, ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS,
    ERROR_BAD_NETPATH, ERROR_BAD_PATHNAME, ERROR_CALL_NOT_IMPLEMENTED, ERROR_DIRECTORY,
    ERROR_FILE_EXISTS, ERROR_FILE_NOT_FOUND, ERROR_INVALID_DRIVE, ERROR_INVALID_NAME,
    ERROR_INVALID_PARAMETER, ERROR_MOD_NOT_FOUND, ERROR_NOT_SUPPORTED, ERROR_PATH_NOT_FOUND,
    ERROR_PRIVILEGE_NOT_HELD, ERROR_PROC_NOT_FOUND, ERROR_SHARING_VIOLATION, NTSTATUS,
    STATUS_ACCESS_DENIED, STATUS_INVALID_PARAMETER, STATUS_NOT_IMPLEMENTED,
    STATUS_NO_SUCH_FILE, STATUS_OBJECT_NAME_COLLISION, STATUS_OBJECT_NAME_NOT_FOUND,
    STATUS_OBJECT_PATH_NOT_FOUND, STATUS_PRIVILEGE_NOT_HELD, STATUS_SHARING_VIOLATION,
    WIN32_ERROR,
};
use windows::Win32::System::Diagnostics::Debug::{
    Beep, GetErrorMode, GetThreadErrorMode, MessageBeep, SetThreadErrorMode,
    SEM_FAILCRITICALERRORS, SEM_NOALIGNMENTFAULTEXCEPT, SEM_NOGPFAULTERRORBOX,
    SEM_NOOPENFILEERRORBOX, THREAD_ERROR_MODE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    MB_ICONASTERISK, MB_ICONEXCLAMATION, MB_ICONHAND, MB_ICONQUESTION, MB_OK, MESSAGEBOX_STYLE,
};

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A Windows API error with its error code.
    #[error("Windows API error: {0}")]
    Windows(#[from] WinError),

    /// A null pointer was encountered where a valid pointer was expected.
    #[error("Null pointer error: {context}")]
    NullPointer {
        /// Description of where the null pointer was encountered.
        context: &'static str,
    },

    /// An invalid handle was provided or returned.
    #[error("Invalid handle: {context}")]
    InvalidHandle {
        /// Description of the invalid handle context.
        context: &'static str,
    },

    /// A string conversion error occurred.
    #[error("String conversion error: {0}")]
    StringConversion(String),

    /// A buffer was too small for the requested operation.
    #[error("Buffer too small: needed {needed}, got {actual}")]
    BufferTooSmall {
        /// The required buffer size.
        needed: usize,
        /// The actual buffer size provided.
        actual: usize,
    },

    /// The requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access was denied to the requested resource.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// An argument was rejected by the operating system or by this crate.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The object being created already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The operation or data type is not supported.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A custom error with a message.
    #[error("{0}")]
    Custom(String),
}

/// A specialized `Result` type for Windows API operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new null pointer error with the given context.
    pub fn null_pointer(context: &'static str) -> Self {
        Error::NullPointer { context }
    }

    /// Creates a new invalid handle error with the given context.
    pub fn invalid_handle(context: &'static str) -> Self {
        Error::InvalidHandle { context }
    }

    /// Creates a new string conversion error.
    pub fn string_conversion(msg: impl Into<String>) -> Self {
        Error::StringConversion(msg.into())
    }

    /// Creates a new buffer too small error.
    pub fn buffer_too_small(needed: usize, actual: usize) -> Self {
        Error::BufferTooSmall { needed, actual }
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new access denied error.
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Error::AccessDenied(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Creates a custom error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Error::Custom(msg.into())
    }

    /// Returns the Win32 error code if this is a Windows error in the Win32 facility.
    pub fn win32_error_code(&self) -> Option<u32> {
        match self {
            Error::Windows(e) if e.code().facility() == FACILITY_WIN32 => {
                Some(e.code().code() as u32)
            }
            Error::Windows(e) => Some(e.code().0 as u32),
            _ => None,
        }
    }

    /// Returns the `HRESULT` if this is a Windows error.
    pub fn hresult(&self) -> Option<HRESULT> {
        match self {
            Error::Windows(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Extension trait for converting Windows `Result` types.
pub trait ResultExt<T> {
    /// Converts a Windows result to our Result type.
    fn to_result(self) -> Result<T>;

    /// Converts a Windows result, routing failures through the lookup table.
    fn to_result_with(self, context: &str) -> Result<T>;
}

impl<T> ResultExt<T> for windows::core::Result<T> {
    fn to_result(self) -> Result<T> {
        self.map_err(Error::from)
    }

    fn to_result_with(self, context: &str) -> Result<T> {
        self.map_err(|e| error_for_hresult(e.code(), Some(context)))
    }
}

/// Checks the success value returned by a native call.
///
/// Implemented for `BOOL` and for `windows::core::Result<()>`, so call sites
/// read the same whichever projection the binding uses.
pub trait NativeOk {
    /// Turns a failure into an [`Error`], naming `operation` when the OS
    /// reports no error code (common in GDI).
    fn check(self, operation: &'static str) -> Result<()>;
}

impl NativeOk for windows::Win32::Foundation::BOOL {
    fn check(self, operation: &'static str) -> Result<()> {
        if self.as_bool() {
            return Ok(());
        }
        match last_error_code() {
            windows::Win32::Foundation::NO_ERROR => Err(Error::custom(format!("{operation} failed"))),
            code => Err(error_for_win32(code, Some(operation))),
        }
    }
}

impl NativeOk for windows::core::Result<()> {
    fn check(self, operation: &'static str) -> Result<()> {
        self.map_err(|e| error_for_hresult(e.code(), Some(operation)))
    }
}

/// Gets the last Windows error as our Error type.
pub fn last_error() -> Error {
    Error::Windows(WinError::from_win32())
}

/// Gets the last Windows error, translated through [`error_for_hresult`].
pub fn last_error_with_context(context: &str) -> Error {
    let code = WinError::from_win32().code();
    error_for_hresult(code, Some(context))
}

/// Checks if the last error indicates success and returns Ok(()), otherwise returns the error.
pub fn check_last_error() -> Result<()> {
    let err = WinError::from_win32();
    if err.code().is_ok() {
        Ok(())
    } else {
        Err(Error::Windows(err))
    }
}

/// Returns the raw last-error code for the calling thread.
#[inline]
pub(crate) fn last_error_code() -> WIN32_ERROR {
    // SAFETY: GetLastError only reads thread-local state.
    unsafe { windows::Win32::Foundation::GetLastError() }
}

// ============================================================================
// Lookup tables
// ============================================================================

/// `FACILITY_WIN32` from winerror.h.
pub const FACILITY_WIN32: u32 = 7;

/// `FACILITY_NT_BIT` from winerror.h, set on HRESULTs wrapping an NTSTATUS.
pub const FACILITY_NT_BIT: u32 = 0x1000_0000;

/// Translates a Win32 error code into an [`Error`].
///
/// `context` is usually the path or name the failing call operated on.
pub fn error_for_win32(code: WIN32_ERROR, context: Option<&str>) -> Error {
    let detail = || describe(code.to_hresult(), context);

    match code {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND | ERROR_MOD_NOT_FOUND
        | ERROR_PROC_NOT_FOUND | ERROR_BAD_NETPATH | ERROR_INVALID_DRIVE => {
            Error::NotFound(detail())
        }
        ERROR_ACCESS_DENIED | ERROR_SHARING_VIOLATION | ERROR_PRIVILEGE_NOT_HELD => {
            Error::AccessDenied(detail())
        }
        ERROR_INVALID_PARAMETER | ERROR_INVALID_NAME | ERROR_BAD_PATHNAME | ERROR_DIRECTORY => {
            Error::InvalidArgument(detail())
        }
        ERROR_ALREADY_EXISTS | ERROR_FILE_EXISTS => Error::AlreadyExists(detail()),
        ERROR_NOT_SUPPORTED | ERROR_CALL_NOT_IMPLEMENTED => Error::Unsupported(detail()),
        _ => Error::Windows(WinError::from(code.to_hresult())),
    }
}

/// Translates an `HRESULT` into an [`Error`].
///
/// HRESULTs in the Win32 facility are unwrapped and routed through
/// [`error_for_win32`].
pub fn error_for_hresult(hr: HRESULT, context: Option<&str>) -> Error {
    match hr {
        E_ACCESSDENIED => Error::AccessDenied(describe(hr, context)),
        E_INVALIDARG => Error::InvalidArgument(describe(hr, context)),
        E_NOTIMPL => Error::Unsupported(describe(hr, context)),
        _ if hr.is_err() && hr.facility() == FACILITY_WIN32 => {
            error_for_win32(WIN32_ERROR(hr.code() as u32), context)
        }
        _ => Error::Windows(WinError::from(hr)),
    }
}

/// Translates an `NTSTATUS` into an [`Error`].
pub fn error_for_ntstatus(status: NTSTATUS, context: Option<&str>) -> Error {
    if status == STATUS_NOT_IMPLEMENTED {
        return Error::Unsupported(context.unwrap_or("not implemented").to_string());
    }

    match ntstatus_to_win32(status) {
        Some(code) => error_for_win32(code, context),
        None => Error::Windows(WinError::from(status.to_hresult())),
    }
}

/// Maps the NTSTATUS values that have a direct Win32 equivalent.
pub fn ntstatus_to_win32(status: NTSTATUS) -> Option<WIN32_ERROR> {
    let code = match status {
        STATUS_NO_SUCH_FILE | STATUS_OBJECT_NAME_NOT_FOUND => ERROR_FILE_NOT_FOUND,
        STATUS_OBJECT_PATH_NOT_FOUND => ERROR_PATH_NOT_FOUND,
        STATUS_ACCESS_DENIED => ERROR_ACCESS_DENIED,
        STATUS_SHARING_VIOLATION => ERROR_SHARING_VIOLATION,
        STATUS_PRIVILEGE_NOT_HELD => ERROR_PRIVILEGE_NOT_HELD,
        STATUS_INVALID_PARAMETER => ERROR_INVALID_PARAMETER,
        STATUS_OBJECT_NAME_COLLISION => ERROR_ALREADY_EXISTS,
        STATUS_NOT_IMPLEMENTED => ERROR_CALL_NOT_IMPLEMENTED,
        _ => return None,
    };
    Some(code)
}

fn describe(hr: HRESULT, context: Option<&str>) -> String {
    let message = hr.message();
    let message = message.trim_end();
    match context {
        Some(context) => format!("{message} '{context}'"),
        None => message.to_string(),
    }
}

// ============================================================================
// HRESULT / NTSTATUS decomposition
// ============================================================================

/// Field accessors mirroring the `HRESULT_*` macros from winerror.h.
pub trait HResultParts {
    /// `SUCCEEDED(hr)`
    fn succeeded(self) -> bool;
    /// `FAILED(hr)`
    fn failed(self) -> bool;
    /// `HRESULT_CODE(hr)`
    fn code(self) -> u16;
    /// `HRESULT_FACILITY(hr)`
    fn facility(self) -> u32;
    /// `HRESULT_SEVERITY(hr)`
    fn severity(self) -> u32;
}

impl HResultParts for HRESULT {
    #[inline]
    fn succeeded(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    fn failed(self) -> bool {
        self.0 < 0
    }

    #[inline]
    fn code(self) -> u16 {
        (self.0 as u32 & 0xFFFF) as u16
    }

    #[inline]
    fn facility(self) -> u32 {
        (self.0 as u32 >> 16) & 0x1FFF
    }

    #[inline]
    fn severity(self) -> u32 {
        (self.0 as u32 >> 31) & 0x1
    }
}

/// `HRESULT_FROM_WIN32(x)`.
///
/// Values that are already zero or negative pass through unchanged.
#[inline]
pub const fn hresult_from_win32(code: u32) -> HRESULT {
    if code as i32 <= 0 {
        HRESULT(code as i32)
    } else {
        HRESULT(((code & 0x0000_FFFF) | (FACILITY_WIN32 << 16) | 0x8000_0000) as i32)
    }
}

/// Severity of an `NTSTATUS` (the top two bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSeverity {
    /// `STATUS_SEVERITY_SUCCESS`
    Success,
    /// `STATUS_SEVERITY_INFORMATIONAL`
    Informational,
    /// `STATUS_SEVERITY_WARNING`
    Warning,
    /// `STATUS_SEVERITY_ERROR`
    Error,
}

/// Returns the severity encoded in an `NTSTATUS`.
#[inline]
pub fn ntstatus_severity(status: NTSTATUS) -> StatusSeverity {
    match (status.0 as u32) >> 30 {
        0 => StatusSeverity::Success,
        1 => StatusSeverity::Informational,
        2 => StatusSeverity::Warning,
        _ => StatusSeverity::Error,
    }
}

/// Returns true if the customer bit is set (not a Microsoft-defined status).
#[inline]
pub fn ntstatus_is_customer(status: NTSTATUS) -> bool {
    (status.0 as u32) & 0x2000_0000 != 0
}

// ============================================================================
// Error modes and audible notification
// ============================================================================

/// Flags controlling whether the system shows error dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorMode(pub u32);

impl ErrorMode {
    /// Use the system default (show all dialogs).
    pub const SYSTEM_DEFAULT: Self = Self(0);
    /// Don't show the critical-error-handler message box.
    pub const FAIL_CRITICAL_ERRORS: Self = Self(SEM_FAILCRITICALERRORS.0);
    /// Don't show the Windows Error Reporting dialog.
    pub const NO_GP_FAULT_ERROR_BOX: Self = Self(SEM_NOGPFAULTERRORBOX.0);
    /// Automatically fix memory alignment faults.
    pub const NO_ALIGNMENT_FAULT_EXCEPT: Self = Self(SEM_NOALIGNMENTFAULTEXCEPT.0);
    /// Don't show a message box when a file can't be found.
    pub const NO_OPEN_FILE_ERROR_BOX: Self = Self(SEM_NOOPENFILEERRORBOX.0);

    /// Combines two modes.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if all flags in `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Gets the error mode for the current process.
pub fn process_error_mode() -> ErrorMode {
    // SAFETY: GetErrorMode has no preconditions.
    ErrorMode(unsafe { GetErrorMode() })
}

/// Gets the error mode for the current thread.
pub fn thread_error_mode() -> ErrorMode {
    // SAFETY: GetThreadErrorMode has no preconditions.
    ErrorMode(unsafe { GetThreadErrorMode() })
}

/// Sets the error mode for the current thread, returning the previous mode.
pub fn set_thread_error_mode(mode: ErrorMode) -> Result<ErrorMode> {
    let mut old = THREAD_ERROR_MODE(0);

    // SAFETY: `old` is a valid output location for the duration of the call.
    unsafe {
        SetThreadErrorMode(
            THREAD_ERROR_MODE(mode.0),
            Some(std::ptr::addr_of_mut!(old) as _),
        )?;
    }

    Ok(ErrorMode(old.0))
}

/// Restores the thread error mode that was active before it was created.
pub struct ErrorModeGuard {
    previous: ErrorMode,
}

impl ErrorModeGuard {
    /// Sets `mode` for the current thread until the guard is dropped.
    pub fn set(mode: ErrorMode) -> Result<Self> {
        let previous = set_thread_error_mode(mode)?;
        Ok(Self { previous })
    }

    /// The mode that will be restored.
    pub fn previous(&self) -> ErrorMode {
        self.previous
    }
}

impl Drop for ErrorModeGuard {
    fn drop(&mut self) {
        if let Err(e) = set_thread_error_mode(self.previous) {
            tracing::warn!(error = %e, "failed to restore thread error mode");
        }
    }
}

/// Sounds defined in the Sound control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeepType {
    /// The simple "ok" beep.
    #[default]
    Simple,
    /// The asterisk/information sound.
    Information,
    /// The exclamation/warning sound.
    Warning,
    /// The hand/error sound.
    Error,
    /// The question sound.
    Question,
}

impl BeepType {
    fn to_native(self) -> MESSAGEBOX_STYLE {
        match self {
            BeepType::Simple => MB_OK,
            BeepType::Information => MB_ICONASTERISK,
            BeepType::Warning => MB_ICONEXCLAMATION,
            BeepType::Error => MB_ICONHAND,
            BeepType::Question => MB_ICONQUESTION,
        }
    }
}

/// Emits a tone on the speaker. `duration` is in milliseconds.
pub fn beep(frequency: u32, duration: u32) -> Result<()> {
    // SAFETY: Beep takes plain integers.
    unsafe { Beep(frequency, duration)? };
    Ok(())
}

/// Plays the specified system sound.
pub fn message_beep(kind: BeepType) -> Result<()> {
    // SAFETY: MessageBeep takes a plain flag value.
    unsafe { MessageBeep(kind.to_native())? };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, S_FALSE, S_OK};

    #[test]
    fn test_hresult_from_win32_matches_sdk_macro() {
        // E_ACCESSDENIED is HRESULT_FROM_WIN32(ERROR_ACCESS_DENIED)
        assert_eq!(hresult_from_win32(ERROR_ACCESS_DENIED.0), E_ACCESSDENIED);
        assert_eq!(hresult_from_win32(0), S_OK);
        assert_eq!(
            hresult_from_win32(ERROR_FILE_NOT_FOUND.0),
            HRESULT(0x8007_0002_u32 as i32)
        );
        // Already an HRESULT
        assert_eq!(hresult_from_win32(0x8000_4005), HRESULT(0x8000_4005_u32 as i32));
    }

    #[test]
    fn test_hresult_parts() {
        let hr = hresult_from_win32(ERROR_INSUFFICIENT_BUFFER.0);
        assert!(hr.failed());
        assert!(!hr.succeeded());
        assert_eq!(HResultParts::code(hr), 122);
        assert_eq!(HResultParts::facility(hr), FACILITY_WIN32);
        assert_eq!(hr.severity(), 1);

        assert!(S_FALSE.succeeded());
        assert_eq!(S_FALSE.severity(), 0);
    }

    #[test]
    fn test_win32_lookup_table() {
        assert!(matches!(
            error_for_win32(ERROR_FILE_NOT_FOUND, Some("a.txt")),
            Error::NotFound(msg) if msg.ends_with("'a.txt'")
        ));
        assert!(matches!(
            error_for_win32(ERROR_ACCESS_DENIED, None),
            Error::AccessDenied(_)
        ));
        assert!(matches!(
            error_for_win32(ERROR_INVALID_PARAMETER, None),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            error_for_win32(ERROR_ALREADY_EXISTS, None),
            Error::AlreadyExists(_)
        ));
        assert!(matches!(
            error_for_win32(ERROR_NOT_SUPPORTED, None),
            Error::Unsupported(_)
        ));

        let other = error_for_win32(ERROR_INSUFFICIENT_BUFFER, None);
        assert_eq!(other.win32_error_code(), Some(ERROR_INSUFFICIENT_BUFFER.0));
    }

    #[test]
    fn test_hresult_lookup_table() {
        assert!(matches!(
            error_for_hresult(E_ACCESSDENIED, None),
            Error::AccessDenied(_)
        ));
        assert!(matches!(
            error_for_hresult(E_INVALIDARG, None),
            Error::InvalidArgument(_)
        ));
        // Win32 facility is unwrapped
        assert!(matches!(
            error_for_hresult(hresult_from_win32(ERROR_PATH_NOT_FOUND.0), None),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_ntstatus_lookup_table() {
        assert!(matches!(
            error_for_ntstatus(STATUS_NOT_IMPLEMENTED, None),
            Error::Unsupported(_)
        ));
        assert!(matches!(
            error_for_ntstatus(STATUS_OBJECT_NAME_NOT_FOUND, Some("x")),
            Error::NotFound(_)
        ));
        assert_eq!(ntstatus_to_win32(STATUS_ACCESS_DENIED), Some(ERROR_ACCESS_DENIED));
    }

    #[test]
    fn test_ntstatus_severity() {
        assert_eq!(ntstatus_severity(NTSTATUS(0)), StatusSeverity::Success);
        assert_eq!(ntstatus_severity(STATUS_ACCESS_DENIED), StatusSeverity::Error);
        assert_eq!(
            ntstatus_severity(NTSTATUS(0x8000_0005_u32 as i32)),
            StatusSeverity::Warning
        );
        assert!(!ntstatus_is_customer(STATUS_ACCESS_DENIED));
    }

    #[test]
    fn test_error_mode_guard_restores() {
        let before = thread_error_mode();
        {
            let guard = ErrorModeGuard::set(ErrorMode::FAIL_CRITICAL_ERRORS).unwrap();
            assert_eq!(guard.previous(), before);
            assert!(thread_error_mode().contains(ErrorMode::FAIL_CRITICAL_ERRORS));
        }
        assert_eq!(thread_error_mode(), before);
    }

    #[test]
    fn test_beep_types_map_to_sound_styles() {
        assert_eq!(BeepType::default().to_native(), MB_OK);
        assert_eq!(BeepType::Information.to_native().0, 0x40);
        assert_eq!(BeepType::Warning.to_native().0, 0x30);
        assert_eq!(BeepType::Error.to_native().0, 0x10);
        assert_eq!(BeepType::Question.to_native().0, 0x20);

        let play: fn(BeepType) -> Result<()> = message_beep;
        let _ = play;
    }
}
