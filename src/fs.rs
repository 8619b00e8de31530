//! File management.
//!
//! Provides attribute and path operations, directory enumeration through
//! [`FindFiles`], handle and volume queries. Path-returning calls go through
//! the grow-until-fits loop in [`crate::buffer`].

use crate::buffer::{buffer_invoke, fill_string, GrowResult};
use crate::error::{error_for_hresult, error_for_win32, last_error_code, Error, Result};
use crate::handle::OwnedHandle;
use crate::string::{from_wide, split_null_terminated, WideString};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use windows::Win32::Foundation::{
    BOOL, ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_FILES, FILETIME, HANDLE, MAX_PATH,
};
use windows::Win32::Storage::FileSystem::{
    CopyFileW, CreateDirectoryW, CreateFileW, DeleteFileW, FindClose, FindExInfoStandard,
    FindExSearchNameMatch, FindFirstFileExW, FindNextFileW, GetDriveTypeW,
    GetFileAttributesW, GetFileInformationByHandle, GetFileSizeEx, GetFileType,
    GetFinalPathNameByHandleW, GetFullPathNameW, GetLogicalDriveStringsW, GetLongPathNameW,
    GetShortPathNameW, GetTempFileNameW, GetTempPathW, GetVolumeInformationW, MoveFileExW,
    RemoveDirectoryW, SetFileAttributesW, BY_HANDLE_FILE_INFORMATION, CREATE_ALWAYS, CREATE_NEW,
    FILE_ACCESS_RIGHTS, FILE_ATTRIBUTE_ARCHIVE, FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_HIDDEN,
    FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_READONLY, FILE_ATTRIBUTE_REPARSE_POINT,
    FILE_ATTRIBUTE_SYSTEM, FILE_ATTRIBUTE_TEMPORARY, FILE_CREATION_DISPOSITION,
    FILE_FLAGS_AND_ATTRIBUTES, FILE_FLAG_BACKUP_SEMANTICS, FILE_GENERIC_READ, FILE_GENERIC_WRITE,
    FILE_NAME_NORMALIZED, FILE_SHARE_DELETE, FILE_SHARE_MODE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE, FILE_TYPE_REMOTE, FIND_FIRST_EX_FLAGS,
    INVALID_FILE_ATTRIBUTES, MOVEFILE_COPY_ALLOWED, MOVEFILE_REPLACE_EXISTING,
    MOVEFILE_WRITE_THROUGH, MOVE_FILE_FLAGS, OPEN_ALWAYS, OPEN_EXISTING, TRUNCATE_EXISTING,
    WIN32_FIND_DATAW,
};
use windows::Win32::System::SystemInformation::{GetSystemDirectoryW, GetWindowsDirectoryW};

fn path_error(error: windows::core::Error, path: &Path) -> Error {
    error_for_hresult(error.code(), Some(&path.to_string_lossy()))
}

/// 100ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: u64 = 116_444_736_000_000_000;

/// Converts a `FILETIME` to a [`SystemTime`].
pub fn filetime_to_system_time(time: FILETIME) -> SystemTime {
    let ticks = (u64::from(time.dwHighDateTime) << 32) | u64::from(time.dwLowDateTime);
    if ticks >= FILETIME_UNIX_OFFSET {
        UNIX_EPOCH + Duration::from_nanos((ticks - FILETIME_UNIX_OFFSET) * 100)
    } else {
        UNIX_EPOCH - Duration::from_nanos((FILETIME_UNIX_OFFSET - ticks) * 100)
    }
}

// ============================================================================
// Attributes and file operations
// ============================================================================

/// `FILE_ATTRIBUTE_*` flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileAttributes(pub FILE_FLAGS_AND_ATTRIBUTES);

impl FileAttributes {
    /// No other attributes.
    pub const NORMAL: Self = Self(FILE_ATTRIBUTE_NORMAL);

    /// Read-only.
    pub const READONLY: Self = Self(FILE_ATTRIBUTE_READONLY);

    /// Hidden from ordinary listings.
    pub const HIDDEN: Self = Self(FILE_ATTRIBUTE_HIDDEN);

    /// Used by the operating system.
    pub const SYSTEM: Self = Self(FILE_ATTRIBUTE_SYSTEM);

    /// A directory.
    pub const DIRECTORY: Self = Self(FILE_ATTRIBUTE_DIRECTORY);

    /// Marked for backup.
    pub const ARCHIVE: Self = Self(FILE_ATTRIBUTE_ARCHIVE);

    /// Temporary storage.
    pub const TEMPORARY: Self = Self(FILE_ATTRIBUTE_TEMPORARY);

    /// A symbolic link or junction.
    pub const REPARSE_POINT: Self = Self(FILE_ATTRIBUTE_REPARSE_POINT);

    /// Wraps raw attribute bits.
    pub fn from_raw(raw: u32) -> Self {
        Self(FILE_FLAGS_AND_ATTRIBUTES(raw))
    }

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 .0 & other.0 .0 == other.0 .0
    }

    /// Returns true for a directory.
    pub fn is_directory(&self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    /// Returns true for a read-only file.
    pub fn is_readonly(&self) -> bool {
        self.contains(Self::READONLY)
    }

    /// Returns true for a hidden file.
    pub fn is_hidden(&self) -> bool {
        self.contains(Self::HIDDEN)
    }

    /// Returns true for a system file.
    pub fn is_system(&self) -> bool {
        self.contains(Self::SYSTEM)
    }

    /// Adds attributes.
    pub fn with(self, other: Self) -> Self {
        Self(FILE_FLAGS_AND_ATTRIBUTES(self.0 .0 | other.0 .0))
    }

    /// Removes attributes.
    pub fn without(self, other: Self) -> Self {
        Self(FILE_FLAGS_AND_ATTRIBUTES(self.0 .0 & !other.0 .0))
    }
}

/// Reads the attributes of a file or directory.
pub fn get_attributes(path: impl AsRef<Path>) -> Result<FileAttributes> {
    let path = path.as_ref();
    let wide = WideString::from_path(path);
    // SAFETY: `wide` is null-terminated and outlives the call.
    let attrs = unsafe { GetFileAttributesW(wide.as_pcwstr()) };

    if attrs == INVALID_FILE_ATTRIBUTES {
        return Err(error_for_win32(last_error_code(), Some(&path.to_string_lossy())));
    }

    Ok(FileAttributes::from_raw(attrs))
}

/// Replaces the attributes of a file or directory.
pub fn set_attributes(path: impl AsRef<Path>, attributes: FileAttributes) -> Result<()> {
    let path = path.as_ref();
    let wide = WideString::from_path(path);
    // SAFETY: `wide` is null-terminated and outlives the call.
    unsafe { SetFileAttributesW(wide.as_pcwstr(), attributes.0) }.map_err(|e| path_error(e, path))
}

/// Returns true if the path exists.
pub fn exists(path: impl AsRef<Path>) -> bool {
    get_attributes(path).is_ok()
}

/// Returns true if the path is a directory.
pub fn is_dir(path: impl AsRef<Path>) -> bool {
    get_attributes(path)
        .map(|a| a.is_directory())
        .unwrap_or(false)
}

/// Returns true if the path exists and is not a directory.
pub fn is_file(path: impl AsRef<Path>) -> bool {
    get_attributes(path)
        .map(|a| !a.is_directory())
        .unwrap_or(false)
}

/// Deletes a file.
pub fn delete_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let wide = WideString::from_path(path);
    // SAFETY: `wide` is null-terminated and outlives the call.
    unsafe { DeleteFileW(wide.as_pcwstr()) }.map_err(|e| path_error(e, path))
}

/// Options for [`move_file_with_options`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveOptions {
    /// Replace the destination if it exists.
    pub replace_existing: bool,
    /// Fall back to copy and delete across volumes.
    pub copy_allowed: bool,
    /// Return only after the move is flushed to disk.
    pub write_through: bool,
}

impl MoveOptions {
    /// Default options: fail if the destination exists, same volume only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces an existing destination.
    pub fn replace(mut self) -> Self {
        self.replace_existing = true;
        self
    }

    /// Allows moving across volumes.
    pub fn allow_copy(mut self) -> Self {
        self.copy_allowed = true;
        self
    }

    /// Waits for the move to reach the disk.
    pub fn write_through(mut self) -> Self {
        self.write_through = true;
        self
    }

    fn to_flags(self) -> MOVE_FILE_FLAGS {
        let mut flags = MOVE_FILE_FLAGS(0);
        if self.replace_existing {
            flags.0 |= MOVEFILE_REPLACE_EXISTING.0;
        }
        if self.copy_allowed {
            flags.0 |= MOVEFILE_COPY_ALLOWED.0;
        }
        if self.write_through {
            flags.0 |= MOVEFILE_WRITE_THROUGH.0;
        }
        flags
    }
}

/// Moves or renames a file or directory.
pub fn move_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    move_file_with_options(from, to, MoveOptions::default())
}

/// Moves or renames with explicit [`MoveOptions`].
pub fn move_file_with_options(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    options: MoveOptions,
) -> Result<()> {
    let from = from.as_ref();
    let from_wide = WideString::from_path(from);
    let to_wide = WideString::from_path(to.as_ref());

    // SAFETY: Both paths are null-terminated and outlive the call.
    unsafe { MoveFileExW(from_wide.as_pcwstr(), to_wide.as_pcwstr(), options.to_flags()) }
        .map_err(|e| path_error(e, from))
}

/// Copies a file. Without `overwrite` an existing destination is an error.
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>, overwrite: bool) -> Result<()> {
    let from = from.as_ref();
    let from_wide = WideString::from_path(from);
    let to_wide = WideString::from_path(to.as_ref());

    // SAFETY: Both paths are null-terminated and outlive the call.
    unsafe { CopyFileW(from_wide.as_pcwstr(), to_wide.as_pcwstr(), BOOL::from(!overwrite)) }
        .map_err(|e| path_error(e, from))
}

/// Creates a directory. The parent must exist.
pub fn create_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let wide = WideString::from_path(path);
    // SAFETY: Default security; `wide` outlives the call.
    unsafe { CreateDirectoryW(wide.as_pcwstr(), None) }.map_err(|e| path_error(e, path))
}

/// Removes an empty directory.
pub fn remove_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let wide = WideString::from_path(path);
    // SAFETY: `wide` outlives the call.
    unsafe { RemoveDirectoryW(wide.as_pcwstr()) }.map_err(|e| path_error(e, path))
}

// ============================================================================
// OpenOptions
// ============================================================================

/// Options for opening files with `CreateFileW`.
pub struct OpenOptions {
    read: bool,
    write: bool,
    create: bool,
    create_new: bool,
    truncate: bool,
    share_read: bool,
    share_write: bool,
    share_delete: bool,
    backup_semantics: bool,
    attributes: FileAttributes,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOptions {
    /// No access, shared for reading, open existing only.
    pub fn new() -> Self {
        Self {
            read: false,
            write: false,
            create: false,
            create_new: false,
            truncate: false,
            share_read: true,
            share_write: false,
            share_delete: false,
            backup_semantics: false,
            attributes: FileAttributes::NORMAL,
        }
    }

    /// Requests read access.
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Requests write access.
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Creates the file if it is missing.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Creates the file, failing if it exists.
    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    /// Truncates an existing file.
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Lets others read while the handle is open.
    pub fn share_read(mut self, share: bool) -> Self {
        self.share_read = share;
        self
    }

    /// Lets others write while the handle is open.
    pub fn share_write(mut self, share: bool) -> Self {
        self.share_write = share;
        self
    }

    /// Lets others delete or rename while the handle is open.
    pub fn share_delete(mut self, share: bool) -> Self {
        self.share_delete = share;
        self
    }

    /// Sets `FILE_FLAG_BACKUP_SEMANTICS`, required to open directories.
    pub fn backup_semantics(mut self, enabled: bool) -> Self {
        self.backup_semantics = enabled;
        self
    }

    /// Attributes for a newly created file.
    pub fn attributes(mut self, attrs: FileAttributes) -> Self {
        self.attributes = attrs;
        self
    }

    /// Opens `path`.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<OwnedHandle> {
        let path = path.as_ref();
        let wide = WideString::from_path(path);

        let mut flags = self.attributes.0;
        if self.backup_semantics {
            flags.0 |= FILE_FLAG_BACKUP_SEMANTICS.0;
        }

        // SAFETY: `wide` outlives the call; no security attributes or template.
        let handle = unsafe {
            CreateFileW(
                wide.as_pcwstr(),
                self.access().0,
                self.share_mode(),
                None,
                self.creation_disposition(),
                flags,
                None,
            )
        }
        .map_err(|e| path_error(e, path))?;

        OwnedHandle::new(handle)
    }

    fn access(&self) -> FILE_ACCESS_RIGHTS {
        let mut access = FILE_ACCESS_RIGHTS(0);
        if self.read {
            access.0 |= FILE_GENERIC_READ.0;
        }
        if self.write {
            access.0 |= FILE_GENERIC_WRITE.0;
        }
        access
    }

    fn share_mode(&self) -> FILE_SHARE_MODE {
        let mut mode = FILE_SHARE_MODE(0);
        if self.share_read {
            mode.0 |= FILE_SHARE_READ.0;
        }
        if self.share_write {
            mode.0 |= FILE_SHARE_WRITE.0;
        }
        if self.share_delete {
            mode.0 |= FILE_SHARE_DELETE.0;
        }
        mode
    }

    fn creation_disposition(&self) -> FILE_CREATION_DISPOSITION {
        match (self.create_new, self.create, self.truncate) {
            (true, _, _) => CREATE_NEW,
            (false, true, true) => CREATE_ALWAYS,
            (false, true, false) => OPEN_ALWAYS,
            (false, false, true) => TRUNCATE_EXISTING,
            (false, false, false) => OPEN_EXISTING,
        }
    }
}

// ============================================================================
// Directory enumeration
// ============================================================================

/// One entry from [`FindFiles`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindData {
    /// Long file name.
    pub file_name: String,
    /// 8.3 name, empty when none was generated.
    pub alternate_file_name: String,
    /// Attributes.
    pub attributes: FileAttributes,
    /// Creation time.
    pub creation_time: SystemTime,
    /// Last access time.
    pub last_access_time: SystemTime,
    /// Last write time.
    pub last_write_time: SystemTime,
    /// File size in bytes.
    pub size: u64,
}

impl FindData {
    fn from_native(data: &WIN32_FIND_DATAW) -> Self {
        Self {
            file_name: String::from_utf16_lossy(wide_prefix(&data.cFileName)),
            alternate_file_name: String::from_utf16_lossy(wide_prefix(&data.cAlternateFileName)),
            attributes: FileAttributes::from_raw(data.dwFileAttributes),
            creation_time: filetime_to_system_time(data.ftCreationTime),
            last_access_time: filetime_to_system_time(data.ftLastAccessTime),
            last_write_time: filetime_to_system_time(data.ftLastWriteTime),
            size: (u64::from(data.nFileSizeHigh) << 32) | u64::from(data.nFileSizeLow),
        }
    }

    /// Returns true for a directory entry.
    pub fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }
}

fn wide_prefix(units: &[u16]) -> &[u16] {
    let len = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    &units[..len]
}

fn is_dot_entry(data: &WIN32_FIND_DATAW) -> bool {
    matches!(wide_prefix(&data.cFileName), [0x2E] | [0x2E, 0x2E])
}

/// Iterates the entries matching a pattern such as `C:\dir\*.txt`.
///
/// `.` and `..` are skipped. No match yields nothing.
pub struct FindFiles {
    handle: Option<HANDLE>,
    pending: Option<WIN32_FIND_DATAW>,
}

impl FindFiles {
    /// Starts a search for `pattern`.
    pub fn new(pattern: impl AsRef<Path>) -> Result<Self> {
        let pattern = pattern.as_ref();
        let wide = WideString::from_path(pattern);
        let mut data = WIN32_FIND_DATAW::default();

        // SAFETY: `data` is the WIN32_FIND_DATAW the standard info level expects.
        let found = unsafe {
            FindFirstFileExW(
                wide.as_pcwstr(),
                FindExInfoStandard,
                std::ptr::addr_of_mut!(data).cast(),
                FindExSearchNameMatch,
                None,
                FIND_FIRST_EX_FLAGS(0),
            )
        };

        match found {
            Ok(handle) => Ok(Self {
                handle: Some(handle),
                pending: Some(data),
            }),
            Err(error) if error.code() == ERROR_FILE_NOT_FOUND.to_hresult() => Ok(Self {
                handle: None,
                pending: None,
            }),
            Err(error) => Err(path_error(error, pattern)),
        }
    }

    /// Lists every entry of `directory`.
    pub fn in_directory(directory: impl AsRef<Path>) -> Result<Self> {
        Self::new(directory.as_ref().join("*"))
    }

    fn advance(&mut self) -> Result<Option<WIN32_FIND_DATAW>> {
        let Some(handle) = self.handle else {
            return Ok(None);
        };

        let mut data = WIN32_FIND_DATAW::default();
        // SAFETY: `handle` is an open search handle.
        match unsafe { FindNextFileW(handle, &mut data) } {
            Ok(()) => Ok(Some(data)),
            Err(error) if error.code() == ERROR_NO_MORE_FILES.to_hresult() => {
                self.close();
                Ok(None)
            }
            Err(error) => {
                self.close();
                Err(error.into())
            }
        }
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            // SAFETY: `handle` came from FindFirstFileExW and is closed once.
            if let Err(error) = unsafe { FindClose(handle) } {
                tracing::warn!(%error, "FindClose failed");
            }
        }
    }
}

impl Iterator for FindFiles {
    type Item = Result<FindData>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let data = match self.pending.take() {
                Some(data) => data,
                None => match self.advance() {
                    Ok(Some(data)) => data,
                    Ok(None) => return None,
                    Err(error) => return Some(Err(error)),
                },
            };

            if !is_dot_entry(&data) {
                return Some(Ok(FindData::from_native(&data)));
            }
        }
    }
}

impl Drop for FindFiles {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Path queries
// ============================================================================

/// The absolute form of `path` (`GetFullPathNameW`). The path need not exist.
pub fn full_path_name(path: impl AsRef<Path>) -> Result<PathBuf> {
    let wide = WideString::from_path(path.as_ref());
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetFullPathNameW(wide.as_pcwstr(), Some(buffer), None) })
        .map(PathBuf::from)
}

/// Expands 8.3 components of an existing path.
pub fn long_path_name(path: impl AsRef<Path>) -> Result<PathBuf> {
    let wide = WideString::from_path(path.as_ref());
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetLongPathNameW(wide.as_pcwstr(), Some(buffer)) })
        .map(PathBuf::from)
}

/// The 8.3 form of an existing path. Volumes without short names return the
/// long form unchanged.
pub fn short_path_name(path: impl AsRef<Path>) -> Result<PathBuf> {
    let wide = WideString::from_path(path.as_ref());
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetShortPathNameW(wide.as_pcwstr(), Some(buffer)) })
        .map(PathBuf::from)
}

/// The normalized path of an open file (`GetFinalPathNameByHandleW`),
/// usually with a `\\?\` prefix.
pub fn final_path_name(handle: &OwnedHandle) -> Result<PathBuf> {
    let raw = handle.as_raw();
    // SAFETY: `raw` is open for the duration of the call.
    fill_string(|buffer| unsafe { GetFinalPathNameByHandleW(raw, buffer, FILE_NAME_NORMALIZED) })
        .map(PathBuf::from)
}

/// The process current directory.
pub fn current_directory() -> Result<PathBuf> {
    use windows::Win32::System::Environment::GetCurrentDirectoryW;
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetCurrentDirectoryW(Some(buffer)) }).map(PathBuf::from)
}

/// Creates an empty, uniquely named file in `directory` and returns its path.
///
/// Only the first three characters of `prefix` are used.
pub fn temp_file_name(directory: impl AsRef<Path>, prefix: &str) -> Result<PathBuf> {
    let directory = directory.as_ref();
    let dir_wide = WideString::from_path(directory);
    let prefix_wide = WideString::new(prefix);
    let mut buffer = [0u16; MAX_PATH as usize];

    // SAFETY: `buffer` is the MAX_PATH array the API requires.
    let unique =
        unsafe { GetTempFileNameW(dir_wide.as_pcwstr(), prefix_wide.as_pcwstr(), 0, &mut buffer) };
    if unique == 0 {
        return Err(error_for_win32(last_error_code(), Some(&directory.to_string_lossy())));
    }

    Ok(PathBuf::from(from_wide(&buffer)?))
}

/// The system directory, e.g. `C:\Windows\System32`.
pub fn get_system_directory() -> Result<PathBuf> {
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetSystemDirectoryW(Some(buffer)) }).map(PathBuf::from)
}

/// The Windows directory, e.g. `C:\Windows`.
pub fn get_windows_directory() -> Result<PathBuf> {
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetWindowsDirectoryW(Some(buffer)) }).map(PathBuf::from)
}

/// The temporary directory, with a trailing separator.
pub fn get_temp_directory() -> Result<PathBuf> {
    // SAFETY: The closure hands the API a writable slice.
    fill_string(|buffer| unsafe { GetTempPathW(Some(buffer)) }).map(PathBuf::from)
}

// ============================================================================
// Handle queries
// ============================================================================

/// `BY_HANDLE_FILE_INFORMATION` projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInformation {
    /// Attributes.
    pub attributes: FileAttributes,
    /// Creation time.
    pub creation_time: SystemTime,
    /// Last access time.
    pub last_access_time: SystemTime,
    /// Last write time.
    pub last_write_time: SystemTime,
    /// Serial number of the containing volume.
    pub volume_serial_number: u32,
    /// Size in bytes.
    pub size: u64,
    /// Hard link count.
    pub number_of_links: u32,
    /// Volume-unique file id.
    pub file_index: u64,
}

/// Information about an open file.
pub fn file_information(handle: &OwnedHandle) -> Result<FileInformation> {
    let mut info = BY_HANDLE_FILE_INFORMATION::default();
    // SAFETY: `info` is a valid output location.
    unsafe { GetFileInformationByHandle(handle.as_raw(), &mut info)? };

    Ok(FileInformation {
        attributes: FileAttributes::from_raw(info.dwFileAttributes),
        creation_time: filetime_to_system_time(info.ftCreationTime),
        last_access_time: filetime_to_system_time(info.ftLastAccessTime),
        last_write_time: filetime_to_system_time(info.ftLastWriteTime),
        volume_serial_number: info.dwVolumeSerialNumber,
        size: (u64::from(info.nFileSizeHigh) << 32) | u64::from(info.nFileSizeLow),
        number_of_links: info.nNumberOfLinks,
        file_index: (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow),
    })
}

/// Size of an open file in bytes.
pub fn file_size(handle: &OwnedHandle) -> Result<u64> {
    let mut size = 0i64;
    // SAFETY: `size` is a valid output location.
    unsafe { GetFileSizeEx(handle.as_raw(), &mut size)? };
    Ok(size as u64)
}

/// What kind of object a handle refers to (`GetFileType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A disk file.
    Disk,
    /// A character device such as a console.
    Character,
    /// A pipe or socket.
    Pipe,
    /// Unused by current systems.
    Remote,
    /// Unknown.
    Unknown,
}

/// The type of an open handle.
pub fn file_type(handle: &OwnedHandle) -> Result<FileType> {
    // SAFETY: SetLastError only writes thread-local state.
    unsafe { windows::Win32::Foundation::SetLastError(windows::Win32::Foundation::NO_ERROR) };
    // SAFETY: `handle` is open.
    let kind = unsafe { GetFileType(handle.as_raw()) };

    Ok(match kind {
        FILE_TYPE_DISK => FileType::Disk,
        FILE_TYPE_CHAR => FileType::Character,
        FILE_TYPE_PIPE => FileType::Pipe,
        FILE_TYPE_REMOTE => FileType::Remote,
        _ => {
            let code = last_error_code();
            if code != windows::Win32::Foundation::NO_ERROR {
                return Err(error_for_win32(code, None));
            }
            FileType::Unknown
        }
    })
}

// ============================================================================
// Volumes
// ============================================================================

/// Root paths of every logical drive, e.g. `C:\`.
pub fn logical_drive_strings() -> Result<Vec<String>> {
    buffer_invoke(|buffer| {
        let slice = buffer.as_mut_slice();
        let capacity = slice.len();
        // SAFETY: `slice` is writable for its full length.
        let len = unsafe { GetLogicalDriveStringsW(Some(slice)) } as usize;

        if len == 0 {
            return Err(error_for_win32(last_error_code(), None));
        }
        if len >= capacity {
            return Ok(GrowResult::Grow(len + 1));
        }
        Ok(GrowResult::Done(split_null_terminated(&slice[..len])))
    })
}

/// Volume details from `GetVolumeInformationW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInformation {
    /// Volume label.
    pub volume_name: String,
    /// Serial number.
    pub serial_number: u32,
    /// Longest file name component.
    pub max_component_length: u32,
    /// `FILE_*` capability flags.
    pub file_system_flags: u32,
    /// File system name, e.g. `NTFS`.
    pub file_system_name: String,
}

/// Queries the volume mounted at `root` (a path like `C:\`).
pub fn volume_information(root: impl AsRef<Path>) -> Result<VolumeInformation> {
    let root = root.as_ref();
    let wide = WideString::from_path(root);
    let mut volume_name = [0u16; MAX_PATH as usize + 1];
    let mut file_system_name = [0u16; MAX_PATH as usize + 1];
    let mut serial_number = 0u32;
    let mut max_component_length = 0u32;
    let mut file_system_flags = 0u32;

    // SAFETY: Every buffer is MAX_PATH + 1 units, the documented maximum.
    unsafe {
        GetVolumeInformationW(
            wide.as_pcwstr(),
            Some(&mut volume_name),
            Some(&mut serial_number),
            Some(&mut max_component_length),
            Some(&mut file_system_flags),
            Some(&mut file_system_name),
        )
    }
    .map_err(|e| path_error(e, root))?;

    Ok(VolumeInformation {
        volume_name: from_wide(&volume_name)?,
        serial_number,
        max_component_length,
        file_system_flags,
        file_system_name: from_wide(&file_system_name)?,
    })
}

/// Drive kinds from `GetDriveTypeW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    /// Could not be determined.
    Unknown,
    /// The root path is invalid.
    NoRootDirectory,
    /// Removable media.
    Removable,
    /// Fixed disk.
    Fixed,
    /// Network drive.
    Remote,
    /// Optical drive.
    CdRom,
    /// RAM disk.
    RamDisk,
}

/// The kind of drive at `root`.
pub fn drive_type(root: impl AsRef<Path>) -> DriveType {
    let wide = WideString::from_path(root.as_ref());
    // SAFETY: `wide` outlives the call.
    match unsafe { GetDriveTypeW(wide.as_pcwstr()) } {
        1 => DriveType::NoRootDirectory,
        2 => DriveType::Removable,
        3 => DriveType::Fixed,
        4 => DriveType::Remote,
        5 => DriveType::CdRom,
        6 => DriveType::RamDisk,
        _ => DriveType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &[u8]) {
        std::fs::File::create(path).unwrap().write_all(contents).unwrap();
    }

    #[test]
    fn test_find_data_size() {
        assert_eq!(std::mem::size_of::<WIN32_FIND_DATAW>(), 592);
    }

    #[test]
    fn test_file_attributes() {
        let attrs = FileAttributes::READONLY.with(FileAttributes::HIDDEN);
        assert!(attrs.is_readonly());
        assert!(attrs.is_hidden());
        assert!(!attrs.is_directory());
        assert!(!attrs.without(FileAttributes::HIDDEN).is_hidden());
    }

    #[test]
    fn test_filetime_epoch() {
        let epoch = FILETIME {
            dwLowDateTime: FILETIME_UNIX_OFFSET as u32,
            dwHighDateTime: (FILETIME_UNIX_OFFSET >> 32) as u32,
        };
        assert_eq!(filetime_to_system_time(epoch), UNIX_EPOCH);
    }

    #[test]
    fn test_attributes_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        write_file(&path, b"x");

        set_attributes(&path, FileAttributes::HIDDEN.with(FileAttributes::READONLY)).unwrap();
        let attrs = get_attributes(&path).unwrap();
        assert!(attrs.is_hidden() && attrs.is_readonly());

        set_attributes(&path, FileAttributes::NORMAL).unwrap();
        assert!(is_file(&path));
        assert!(is_dir(dir.path()));
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(!exists(&missing));
        assert!(matches!(get_attributes(&missing), Err(Error::NotFound(_))));
        assert!(matches!(delete_file(&missing), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_copy_move_delete() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        write_file(&a, b"data");

        copy_file(&a, &b, false).unwrap();
        assert!(matches!(copy_file(&a, &b, false), Err(Error::AlreadyExists(_))));
        copy_file(&a, &b, true).unwrap();

        move_file(&b, &c).unwrap();
        assert!(!exists(&b));
        assert!(move_file(&a, &c).is_err());
        move_file_with_options(&a, &c, MoveOptions::new().replace()).unwrap();
        assert!(!exists(&a));

        delete_file(&c).unwrap();
        assert!(!exists(&c));
    }

    #[test]
    fn test_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        create_directory(&sub).unwrap();
        assert!(is_dir(&sub));
        assert!(matches!(create_directory(&sub), Err(Error::AlreadyExists(_))));
        remove_directory(&sub).unwrap();
        assert!(!exists(&sub));
    }

    #[test]
    fn test_open_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opened.bin");

        assert!(OpenOptions::new().read(true).open(&path).is_err());

        let handle = OpenOptions::new().write(true).create_new(true).open(&path).unwrap();
        drop(handle);
        assert!(OpenOptions::new().write(true).create_new(true).open(&path).is_err());

        write_file(&path, b"12345");
        let handle = OpenOptions::new().read(true).open(&path).unwrap();
        assert_eq!(file_size(&handle).unwrap(), 5);
        assert_eq!(file_type(&handle).unwrap(), FileType::Disk);
        drop(handle);

        let handle = OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
        assert_eq!(file_size(&handle).unwrap(), 0);
    }

    #[test]
    fn test_find_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("one.txt"), b"1");
        write_file(&dir.path().join("two.txt"), b"22");
        write_file(&dir.path().join("three.log"), b"333");
        create_directory(dir.path().join("nested")).unwrap();

        let mut all: Vec<_> = FindFiles::in_directory(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        all.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let names: Vec<_> = all.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["nested", "one.txt", "three.log", "two.txt"]);
        assert!(all[0].is_directory());
        assert_eq!(all[3].size, 2);

        let txt = FindFiles::new(dir.path().join("*.txt")).unwrap().count();
        assert_eq!(txt, 2);
    }

    #[test]
    fn test_find_files_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FindFiles::in_directory(dir.path()).unwrap().count(), 0);
        assert_eq!(FindFiles::new(dir.path().join("*.none")).unwrap().count(), 0);
    }

    #[test]
    fn test_path_queries() {
        let dir = tempfile::tempdir().unwrap();
        let long = long_path_name(dir.path()).unwrap();
        let file = long.join("query.txt");
        write_file(&file, b"q");

        let full = full_path_name(long.join("sub").join("..").join("query.txt")).unwrap();
        assert_eq!(full, file);

        let short = short_path_name(&file).unwrap();
        assert_eq!(long_path_name(&short).unwrap(), file);

        let handle = OpenOptions::new().read(true).open(&file).unwrap();
        let final_path = final_path_name(&handle).unwrap();
        assert!(final_path.to_string_lossy().ends_with("query.txt"));

        let info = file_information(&handle).unwrap();
        assert_eq!(info.size, 1);
        assert_eq!(info.number_of_links, 1);

        assert!(current_directory().unwrap().is_absolute());
        assert!(matches!(long_path_name(long.join("nope")), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_temp_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file_name(dir.path(), "wint").unwrap();
        assert!(is_file(&path));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("win"));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn test_system_directories() {
        let windows = get_windows_directory().unwrap();
        let system = get_system_directory().unwrap();
        assert!(system.starts_with(&windows));
        assert!(is_dir(get_temp_directory().unwrap()));
    }

    #[test]
    fn test_volumes() {
        let windows = get_windows_directory().unwrap();
        let root = windows.ancestors().last().unwrap().to_path_buf();

        let drives = logical_drive_strings().unwrap();
        let root_str = root.to_string_lossy().to_uppercase();
        assert!(drives.iter().any(|d| d.to_uppercase() == root_str));

        assert_eq!(drive_type(&root), DriveType::Fixed);
        let info = volume_information(&root).unwrap();
        assert!(!info.file_system_name.is_empty());
        assert!(info.max_component_length >= 255);
    }
}
