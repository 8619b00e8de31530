//! Module handles and dynamic library loading.
//!
//! Provides [`ModuleInstance`], a non-owning view of a loaded module (used as
//! the default instance for window classes), and [`Library`], which owns a
//! reference obtained from `LoadLibraryExW` and frees it on drop.

use crate::buffer::fill_string;
use crate::error::{error_for_hresult, error_for_win32, last_error_code, Error, Result};
use crate::string::WideString;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use windows::core::{PCSTR, PWSTR};
use windows::Win32::Foundation::{FreeLibrary, HINSTANCE, HMODULE};
use windows::Win32::System::LibraryLoader::{
    GetModuleFileNameW, GetModuleHandleW, GetProcAddress, LoadLibraryExW,
    LOAD_LIBRARY_AS_DATAFILE, LOAD_LIBRARY_AS_IMAGE_RESOURCE, LOAD_LIBRARY_FLAGS,
    LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR, LOAD_LIBRARY_SEARCH_SYSTEM32,
};
use windows::Win32::UI::WindowsAndMessaging::LoadStringW;

/// A module already mapped into the process. Never freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInstance(HMODULE);

impl ModuleInstance {
    /// The executable that started the process.
    pub fn current() -> Result<Self> {
        // SAFETY: A null name selects the process image.
        let handle = unsafe { GetModuleHandleW(None)? };
        Ok(Self(handle))
    }

    /// A module that is already loaded, such as `kernel32.dll`.
    pub fn get(name: &str) -> Result<Self> {
        let name_wide = WideString::new(name);
        // SAFETY: `name_wide` outlives the call.
        let handle = unsafe { GetModuleHandleW(name_wide.as_pcwstr()) }
            .map_err(|e| error_for_hresult(e.code(), Some(name)))?;
        Ok(Self(handle))
    }

    /// Wraps a raw handle.
    pub fn from_raw(handle: HMODULE) -> Self {
        Self(handle)
    }

    /// The raw `HMODULE`.
    #[inline]
    pub fn as_raw(self) -> HMODULE {
        self.0
    }

    /// The module as an `HINSTANCE`.
    #[inline]
    pub fn as_instance(self) -> HINSTANCE {
        HINSTANCE(self.0 .0)
    }

    /// Full path of the module file.
    pub fn file_name(self) -> Result<PathBuf> {
        // SAFETY: The closure hands GetModuleFileNameW a writable slice.
        fill_string(|buffer| unsafe { GetModuleFileNameW(self.0, buffer) }).map(PathBuf::from)
    }

    /// Loads string resource `id` from the module's string table.
    pub fn load_string(self, id: u32) -> Result<String> {
        let mut resource: *const u16 = std::ptr::null();

        // SAFETY: With a zero length LoadStringW stores a pointer to the
        // read-only resource in `resource` instead of copying.
        let len = unsafe {
            LoadStringW(
                self.as_instance(),
                id,
                PWSTR(std::ptr::addr_of_mut!(resource).cast()),
                0,
            )
        };

        if len <= 0 || resource.is_null() {
            return Err(Error::not_found(format!("string resource {id}")));
        }

        // SAFETY: The resource stays mapped while the module is loaded and
        // holds `len` UTF-16 units.
        let units = unsafe { std::slice::from_raw_parts(resource, len as usize) };
        Ok(String::from_utf16_lossy(units))
    }
}

/// Flags for [`Library::load_with_flags`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadFlags(u32);

impl LoadFlags {
    /// No special flags.
    pub const NONE: Self = Self(0);

    /// Map as a data file; nothing runs.
    pub const AS_DATAFILE: Self = Self(LOAD_LIBRARY_AS_DATAFILE.0);

    /// Map as an image resource.
    pub const AS_IMAGE_RESOURCE: Self = Self(LOAD_LIBRARY_AS_IMAGE_RESOURCE.0);

    /// Resolve dependencies from the library's own directory.
    pub const SEARCH_DLL_LOAD_DIR: Self = Self(LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR.0);

    /// Resolve dependencies from System32 only.
    pub const SEARCH_SYSTEM32: Self = Self(LOAD_LIBRARY_SEARCH_SYSTEM32.0);

    /// Adds a flag.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    fn to_native(self) -> LOAD_LIBRARY_FLAGS {
        LOAD_LIBRARY_FLAGS(self.0)
    }
}

/// A loaded library; its reference count is released on drop.
pub struct Library {
    handle: HMODULE,
}

impl Library {
    /// Loads a library by name or path using the standard search order.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_flags(path, LoadFlags::NONE)
    }

    /// Loads a library with explicit `LOAD_LIBRARY_*` flags.
    pub fn load_with_flags(path: impl AsRef<Path>, flags: LoadFlags) -> Result<Self> {
        let path = path.as_ref();
        let path_wide = WideString::from_path(path);

        // SAFETY: `path_wide` outlives the call.
        let handle = unsafe { LoadLibraryExW(path_wide.as_pcwstr(), None, flags.to_native()) }
            .map_err(|e| error_for_hresult(e.code(), Some(&path.to_string_lossy())))?;

        tracing::debug!(path = %path.display(), "loaded library");
        Ok(Self { handle })
    }

    /// A non-owning view of this library.
    pub fn module(&self) -> ModuleInstance {
        ModuleInstance(self.handle)
    }

    /// Resolves an exported function.
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type matching the export's real
    /// signature, and it must not be called after the library is dropped.
    pub unsafe fn proc_address<F: Copy>(&self, name: &str) -> Result<F> {
        if std::mem::size_of::<F>() != std::mem::size_of::<usize>() {
            return Err(Error::invalid_argument("F must be a function pointer"));
        }

        let name_c = CString::new(name)
            .map_err(|_| Error::invalid_argument(format!("export name '{name}' contains NUL")))?;

        match GetProcAddress(self.handle, PCSTR(name_c.as_ptr().cast())) {
            Some(proc) => Ok(std::mem::transmute_copy(&proc)),
            None => Err(error_for_win32(last_error_code(), Some(name))),
        }
    }

    /// The raw module handle.
    pub fn as_raw(&self) -> HMODULE {
        self.handle
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        // SAFETY: We hold one reference from LoadLibraryExW.
        if let Err(error) = unsafe { FreeLibrary(self.handle) } {
            tracing::warn!(%error, "FreeLibrary failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_module_file_exists() {
        let module = ModuleInstance::current().unwrap();
        assert!(module.file_name().unwrap().exists());
    }

    #[test]
    fn test_get_loaded_module() {
        let kernel32 = ModuleInstance::get("kernel32.dll").unwrap();
        let path = kernel32.file_name().unwrap();
        assert!(path.to_string_lossy().to_lowercase().ends_with("kernel32.dll"));
    }

    #[test]
    fn test_get_missing_module_is_not_found() {
        let err = ModuleInstance::get("definitely-not-loaded-4242.dll").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "{err:?}");
    }

    #[test]
    fn test_proc_address_matches_native() {
        let kernel32 = Library::load("kernel32.dll").unwrap();
        type GetCurrentProcessIdFn = unsafe extern "system" fn() -> u32;
        let get_pid: GetCurrentProcessIdFn =
            unsafe { kernel32.proc_address("GetCurrentProcessId").unwrap() };
        assert_eq!(unsafe { get_pid() }, std::process::id());
    }

    #[test]
    fn test_missing_export() {
        let kernel32 = Library::load("kernel32.dll").unwrap();
        let result: Result<unsafe extern "system" fn()> =
            unsafe { kernel32.proc_address("NoSuchExport") };
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_string_missing_id() {
        let user32 = Library::load_with_flags(
            "user32.dll",
            LoadFlags::AS_DATAFILE.with(LoadFlags::SEARCH_SYSTEM32),
        )
        .unwrap();
        let missing = user32.module().load_string(0xFFF0);
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
