//! COM apartments, VARIANT conversion, and structured storage.
//!
//! Provides [`ComInitializer`] for per-thread COM lifetime, a Rust
//! [`Variant`] that converts to and from the native `VARIANT`, and
//! compound-file access through [`StructuredStorage`] and [`Stream`].

use crate::error::{error_for_hresult, Error, Result};
use crate::string::WideString;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::path::Path;
use windows::core::{imp, Interface, BSTR, GUID, HRESULT, VARIANT};
use windows::Win32::Foundation::{RPC_E_CHANGED_MODE, S_FALSE};
use windows::Win32::Security::PSECURITY_DESCRIPTOR;
use windows::Win32::System::Com::StructuredStorage::{
    IEnumSTATSTG, IStorage, StgCreateStorageEx, StgOpenStorageEx, STGFMT_STORAGE, STGMOVE_COPY,
    STGMOVE_MOVE,
};
use windows::Win32::System::Com::{
    CoInitializeEx, CoTaskMemFree, CoUninitialize, IStream, COINIT, COINIT_APARTMENTTHREADED,
    COINIT_DISABLE_OLE1DDE, COINIT_MULTITHREADED, STATFLAG_DEFAULT, STATSTG, STGC_DEFAULT,
    STGM, STGM_CONVERT, STGM_CREATE, STGM_DELETEONRELEASE, STGM_DIRECT, STGM_FAILIFTHERE,
    STGM_NOSCRATCH, STGM_PRIORITY, STGM_READ, STGM_READWRITE, STGM_SHARE_DENY_NONE,
    STGM_SHARE_DENY_READ, STGM_SHARE_DENY_WRITE, STGM_SHARE_EXCLUSIVE, STGM_SIMPLE,
    STGM_TRANSACTED, STGM_WRITE, STGTY_LOCKBYTES, STGTY_PROPERTY, STGTY_STORAGE, STGTY_STREAM,
    STREAM_SEEK_CUR, STREAM_SEEK_END, STREAM_SEEK_SET,
};

// ============================================================================
// Apartments
// ============================================================================

/// The threading model requested from `CoInitializeEx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComApartment {
    /// Single-threaded apartment; required for most UI objects.
    #[default]
    SingleThreaded,
    /// The process-wide multithreaded apartment.
    MultiThreaded,
}

impl ComApartment {
    fn to_native(self) -> COINIT {
        let model = match self {
            ComApartment::SingleThreaded => COINIT_APARTMENTTHREADED,
            ComApartment::MultiThreaded => COINIT_MULTITHREADED,
        };
        COINIT(model.0 | COINIT_DISABLE_OLE1DDE.0)
    }
}

/// Keeps COM initialized on the current thread until dropped.
///
/// A thread that already joined the same apartment still gets a guard
/// (`S_FALSE` needs a matching `CoUninitialize`). Asking for a different
/// apartment than the thread already has fails with `RPC_E_CHANGED_MODE`.
pub struct ComInitializer {
    already_initialized: bool,
    // CoUninitialize must run on the initializing thread.
    _not_send: PhantomData<*const ()>,
}

impl ComInitializer {
    /// Initializes COM for the current thread.
    pub fn new(apartment: ComApartment) -> Result<Self> {
        // SAFETY: Reserved pointer is null; the guard balances the call.
        let hr = HRESULT::from(unsafe { CoInitializeEx(None, apartment.to_native()) });

        if hr == RPC_E_CHANGED_MODE {
            return Err(error_for_hresult(hr, Some("CoInitializeEx")));
        }
        hr.ok()?;

        tracing::debug!(?apartment, already = hr == S_FALSE, "initialized COM");
        Ok(Self {
            already_initialized: hr == S_FALSE,
            _not_send: PhantomData,
        })
    }

    /// Returns true if the thread had already joined this apartment.
    pub fn was_already_initialized(&self) -> bool {
        self.already_initialized
    }
}

impl Drop for ComInitializer {
    fn drop(&mut self) {
        // SAFETY: Balances the successful CoInitializeEx in `new`.
        unsafe { CoUninitialize() };
    }
}

// ============================================================================
// VARIANT
// ============================================================================

/// `VARENUM` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum VariantType {
    Empty = 0,
    Null = 1,
    I2 = 2,
    I4 = 3,
    R4 = 4,
    R8 = 5,
    Currency = 6,
    Date = 7,
    BStr = 8,
    Dispatch = 9,
    Error = 10,
    Bool = 11,
    Variant = 12,
    Unknown = 13,
    Decimal = 14,
    I1 = 16,
    UI1 = 17,
    UI2 = 18,
    UI4 = 19,
    I8 = 20,
    UI8 = 21,
    Int = 22,
    UInt = 23,
    Void = 24,
    HResult = 25,
    Pointer = 26,
    SafeArray = 27,
    CArray = 28,
    UserDefined = 29,
    LpStr = 30,
    LpWStr = 31,
    Record = 36,
    FileTime = 64,
    Blob = 65,
    ClassId = 72,
}

impl VariantType {
    /// `VT_VECTOR` modifier bit.
    pub const VECTOR: u16 = 0x1000;
    /// `VT_ARRAY` modifier bit.
    pub const ARRAY: u16 = 0x2000;
    /// `VT_BYREF` modifier bit.
    pub const BYREF: u16 = 0x4000;

    const ALL: [VariantType; 35] = [
        VariantType::Empty,
        VariantType::Null,
        VariantType::I2,
        VariantType::I4,
        VariantType::R4,
        VariantType::R8,
        VariantType::Currency,
        VariantType::Date,
        VariantType::BStr,
        VariantType::Dispatch,
        VariantType::Error,
        VariantType::Bool,
        VariantType::Variant,
        VariantType::Unknown,
        VariantType::Decimal,
        VariantType::I1,
        VariantType::UI1,
        VariantType::UI2,
        VariantType::UI4,
        VariantType::I8,
        VariantType::UI8,
        VariantType::Int,
        VariantType::UInt,
        VariantType::Void,
        VariantType::HResult,
        VariantType::Pointer,
        VariantType::SafeArray,
        VariantType::CArray,
        VariantType::UserDefined,
        VariantType::LpStr,
        VariantType::LpWStr,
        VariantType::Record,
        VariantType::FileTime,
        VariantType::Blob,
        VariantType::ClassId,
    ];

    /// The base type of a raw `vt`, ignoring modifier bits.
    pub fn from_raw(vt: u16) -> Option<Self> {
        let base = vt & !(Self::VECTOR | Self::ARRAY | Self::BYREF);
        Self::ALL.into_iter().find(|kind| *kind as u16 == base)
    }
}

/// A value carried in a `VARIANT`.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// `VT_EMPTY`
    Empty,
    /// `VT_NULL`
    Null,
    /// `VT_BOOL`
    Bool(bool),
    /// `VT_I1`
    I1(i8),
    /// `VT_I2`
    I2(i16),
    /// `VT_I4`
    I4(i32),
    /// `VT_I8`
    I8(i64),
    /// `VT_UI1`
    U1(u8),
    /// `VT_UI2`
    U2(u16),
    /// `VT_UI4`
    U4(u32),
    /// `VT_UI8`
    U8(u64),
    /// `VT_R4`
    R4(f32),
    /// `VT_R8`
    R8(f64),
    /// `VT_BSTR`
    String(String),
    /// `VT_ERROR` with an `SCODE`.
    Error(i32),
}

impl Variant {
    /// The `VARENUM` this value marshals as.
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Empty => VariantType::Empty,
            Variant::Null => VariantType::Null,
            Variant::Bool(_) => VariantType::Bool,
            Variant::I1(_) => VariantType::I1,
            Variant::I2(_) => VariantType::I2,
            Variant::I4(_) => VariantType::I4,
            Variant::I8(_) => VariantType::I8,
            Variant::U1(_) => VariantType::UI1,
            Variant::U2(_) => VariantType::UI2,
            Variant::U4(_) => VariantType::UI4,
            Variant::U8(_) => VariantType::UI8,
            Variant::R4(_) => VariantType::R4,
            Variant::R8(_) => VariantType::R8,
            Variant::String(_) => VariantType::BStr,
            Variant::Error(_) => VariantType::Error,
        }
    }

    /// Marshals into an owned native `VARIANT`.
    pub fn to_native(&self) -> OwnedVariant {
        let native = match self {
            Variant::Empty => VARIANT::new(),
            Variant::Null => raw_variant(VariantType::Null, imp::VARIANT_0_0_0 { llVal: 0 }),
            Variant::Bool(v) => VARIANT::from(*v),
            Variant::I1(v) => VARIANT::from(*v),
            Variant::I2(v) => VARIANT::from(*v),
            Variant::I4(v) => VARIANT::from(*v),
            Variant::I8(v) => VARIANT::from(*v),
            Variant::U1(v) => VARIANT::from(*v),
            Variant::U2(v) => VARIANT::from(*v),
            Variant::U4(v) => VARIANT::from(*v),
            Variant::U8(v) => VARIANT::from(*v),
            Variant::R4(v) => VARIANT::from(*v),
            Variant::R8(v) => VARIANT::from(*v),
            Variant::String(s) => VARIANT::from(BSTR::from(s.as_str())),
            Variant::Error(code) => {
                raw_variant(VariantType::Error, imp::VARIANT_0_0_0 { scode: *code })
            }
        };
        OwnedVariant(native)
    }

    /// Reads a native `VARIANT`.
    ///
    /// Types without a [`Variant`] counterpart (including any `VT_BYREF`,
    /// `VT_ARRAY` or `VT_VECTOR` value) are [`Error::Unsupported`].
    pub fn from_native(native: &VARIANT) -> Result<Self> {
        let raw = native.as_raw();
        // SAFETY: The tag says which union member is initialized; only that
        // member is read, and BSTR contents are copied without taking
        // ownership.
        unsafe {
            let inner = &raw.Anonymous.Anonymous;
            let value = &inner.Anonymous;
            let vt = inner.vt;
            let kind = match VariantType::from_raw(vt) {
                Some(kind) if kind as u16 == vt => kind,
                _ => return Err(unsupported_variant(vt)),
            };
            Ok(match kind {
                VariantType::Empty => Variant::Empty,
                VariantType::Null => Variant::Null,
                VariantType::Bool => Variant::Bool(value.boolVal != 0),
                VariantType::I1 => Variant::I1(value.cVal),
                VariantType::I2 => Variant::I2(value.iVal),
                VariantType::I4 => Variant::I4(value.lVal),
                VariantType::I8 => Variant::I8(value.llVal),
                VariantType::UI1 => Variant::U1(value.bVal),
                VariantType::UI2 => Variant::U2(value.uiVal),
                VariantType::UI4 => Variant::U4(value.ulVal),
                VariantType::UI8 => Variant::U8(value.ullVal),
                VariantType::R4 => Variant::R4(value.fltVal),
                VariantType::R8 => Variant::R8(value.dblVal),
                VariantType::BStr => {
                    let bstr = ManuallyDrop::new(BSTR::from_raw(value.bstrVal));
                    Variant::String(String::from_utf16_lossy(bstr.as_wide()))
                }
                VariantType::Error => Variant::Error(value.scode),
                _ => return Err(unsupported_variant(vt)),
            })
        }
    }
}

fn raw_variant(kind: VariantType, value: imp::VARIANT_0_0_0) -> VARIANT {
    let raw = imp::VARIANT {
        Anonymous: imp::VARIANT_0 {
            Anonymous: imp::VARIANT_0_0 {
                vt: kind as u16,
                wReserved1: 0,
                wReserved2: 0,
                wReserved3: 0,
                Anonymous: value,
            },
        },
    };
    // SAFETY: Only called with tags whose payload owns no resources.
    unsafe { VARIANT::from_raw(raw) }
}

fn unsupported_variant(vt: u16) -> Error {
    let name = VariantType::from_raw(vt)
        .map_or_else(|| format!("0x{vt:04x}"), |kind| format!("{kind:?}"));
    Error::unsupported(format!("VARIANT type {name} (vt 0x{vt:04x})"))
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::I4(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::I8(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::R8(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

/// A native `VARIANT`; `VariantClear` runs when it is dropped.
pub struct OwnedVariant(VARIANT);

impl OwnedVariant {
    /// Takes ownership of a native value.
    pub fn from_native(native: VARIANT) -> Self {
        Self(native)
    }

    /// The raw `vt` tag.
    pub fn vt(&self) -> u16 {
        // SAFETY: The tag is always initialized.
        unsafe { self.0.as_raw().Anonymous.Anonymous.vt }
    }

    /// Borrows the native value.
    pub fn as_native(&self) -> &VARIANT {
        &self.0
    }

    /// Releases the wrapper, handing the value to the caller.
    pub fn into_native(self) -> VARIANT {
        self.0
    }

    /// Converts back to a [`Variant`].
    pub fn to_variant(&self) -> Result<Variant> {
        Variant::from_native(&self.0)
    }
}

impl fmt::Debug for OwnedVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedVariant").field("vt", &self.vt()).finish()
    }
}

// ============================================================================
// Structured storage
// ============================================================================

/// `STGM_*` access, sharing and creation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageMode(pub u32);

impl StorageMode {
    /// Read only.
    pub const READ: Self = Self(STGM_READ.0);
    /// Write only.
    pub const WRITE: Self = Self(STGM_WRITE.0);
    /// Read and write.
    pub const READ_WRITE: Self = Self(STGM_READWRITE.0);
    /// No other opener.
    pub const SHARE_EXCLUSIVE: Self = Self(STGM_SHARE_EXCLUSIVE.0);
    /// Others may not write.
    pub const SHARE_DENY_WRITE: Self = Self(STGM_SHARE_DENY_WRITE.0);
    /// Others may not read.
    pub const SHARE_DENY_READ: Self = Self(STGM_SHARE_DENY_READ.0);
    /// Others may do anything.
    pub const SHARE_DENY_NONE: Self = Self(STGM_SHARE_DENY_NONE.0);
    /// Replace an existing object.
    pub const CREATE: Self = Self(STGM_CREATE.0);
    /// Fail if the object exists.
    pub const FAIL_IF_THERE: Self = Self(STGM_FAILIFTHERE.0);
    /// Preserve existing data as a `CONTENTS` stream.
    pub const CONVERT: Self = Self(STGM_CONVERT.0);
    /// Changes apply immediately.
    pub const DIRECT: Self = Self(STGM_DIRECT.0);
    /// Changes are buffered until commit.
    pub const TRANSACTED: Self = Self(STGM_TRANSACTED.0);
    /// Delete the file when the last reference is released.
    pub const DELETE_ON_RELEASE: Self = Self(STGM_DELETEONRELEASE.0);
    /// Limited, faster implementation.
    pub const SIMPLE: Self = Self(STGM_SIMPLE.0);
    /// Transacted without a scratch copy.
    pub const NO_SCRATCH: Self = Self(STGM_NOSCRATCH.0);
    /// Read-only priority mode.
    pub const PRIORITY: Self = Self(STGM_PRIORITY.0);

    /// Combines two modes.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    fn to_native(self) -> STGM {
        STGM(self.0)
    }
}

/// The kind of a storage element (`STGTY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// A storage (directory-like).
    Storage,
    /// A stream (file-like).
    Stream,
    /// A byte array.
    LockBytes,
    /// A property storage.
    Property,
}

impl StorageType {
    fn from_raw(raw: u32) -> Option<Self> {
        [
            (STGTY_STORAGE, StorageType::Storage),
            (STGTY_STREAM, StorageType::Stream),
            (STGTY_LOCKBYTES, StorageType::LockBytes),
            (STGTY_PROPERTY, StorageType::Property),
        ]
        .into_iter()
        .find(|(native, _)| native.0 as u32 == raw)
        .map(|(_, kind)| kind)
    }
}

/// Statistics for a storage, stream, or element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStat {
    /// Element name.
    pub name: String,
    /// Element kind.
    pub storage_type: Option<StorageType>,
    /// Class id (storages only).
    pub class_id: GUID,
    /// Size in bytes (streams only).
    pub size: u64,
}

impl StorageStat {
    /// Copies a `STATSTG` and frees its name.
    ///
    /// # Safety
    ///
    /// `stat.pwcsName` is null or a `CoTaskMemAlloc` string that nothing else
    /// frees.
    unsafe fn take(stat: &STATSTG) -> Self {
        let name = if stat.pwcsName.is_null() {
            String::new()
        } else {
            let name = String::from_utf16_lossy(stat.pwcsName.as_wide());
            CoTaskMemFree(Some(stat.pwcsName.0 as *const _));
            name
        };

        Self {
            name,
            storage_type: StorageType::from_raw(stat.r#type),
            class_id: stat.clsid,
            size: stat.cbSize,
        }
    }
}

// STG_E_* codes that have a closer match in `Error`.
const STG_E_FILENOTFOUND: HRESULT = HRESULT(0x8003_0002_u32 as i32);
const STG_E_PATHNOTFOUND: HRESULT = HRESULT(0x8003_0003_u32 as i32);
const STG_E_ACCESSDENIED: HRESULT = HRESULT(0x8003_0005_u32 as i32);
const STG_E_FILEALREADYEXISTS: HRESULT = HRESULT(0x8003_0050_u32 as i32);

fn storage_error(error: windows::core::Error, context: &str) -> Error {
    let hr = error.code();
    match hr {
        STG_E_FILENOTFOUND | STG_E_PATHNOTFOUND => {
            Error::NotFound(format!("{} '{context}'", hr.message()))
        }
        STG_E_ACCESSDENIED => Error::AccessDenied(format!("{} '{context}'", hr.message())),
        STG_E_FILEALREADYEXISTS => {
            Error::AlreadyExists(format!("{} '{context}'", hr.message()))
        }
        _ => error_for_hresult(hr, Some(context)),
    }
}

/// A compound-file storage (`IStorage`).
#[derive(Clone)]
pub struct StructuredStorage {
    storage: IStorage,
}

impl StructuredStorage {
    /// Creates a compound file at `path`.
    pub fn create(path: impl AsRef<Path>, mode: StorageMode) -> Result<Self> {
        let path = path.as_ref();
        let wide = WideString::from_path(path);

        let mut storage: Option<IStorage> = None;
        // SAFETY: `wide` outlives the call; no options or security descriptor.
        unsafe {
            StgCreateStorageEx(
                wide.as_pcwstr(),
                mode.to_native(),
                STGFMT_STORAGE,
                0,
                None,
                PSECURITY_DESCRIPTOR::default(),
                &IStorage::IID,
                &mut storage as *mut _ as *mut _,
            )
        }
        .map_err(|e| storage_error(e, &path.to_string_lossy()))?;
        let storage = storage.ok_or_else(|| Error::null_pointer("StgCreateStorageEx"))?;

        tracing::debug!(path = %path.display(), "created compound file");
        Ok(Self { storage })
    }

    /// Opens an existing compound file.
    pub fn open(path: impl AsRef<Path>, mode: StorageMode) -> Result<Self> {
        let path = path.as_ref();
        let wide = WideString::from_path(path);

        let mut storage: Option<IStorage> = None;
        // SAFETY: As for `create`.
        unsafe {
            StgOpenStorageEx(
                wide.as_pcwstr(),
                mode.to_native(),
                STGFMT_STORAGE,
                0,
                None,
                PSECURITY_DESCRIPTOR::default(),
                &IStorage::IID,
                &mut storage as *mut _ as *mut _,
            )
        }
        .map_err(|e| storage_error(e, &path.to_string_lossy()))?;
        let storage = storage.ok_or_else(|| Error::null_pointer("StgOpenStorageEx"))?;

        Ok(Self { storage })
    }

    /// Wraps an existing interface.
    pub fn from_interface(storage: IStorage) -> Self {
        Self { storage }
    }

    /// The underlying interface.
    pub fn as_interface(&self) -> &IStorage {
        &self.storage
    }

    /// Creates a stream. Element access requires `SHARE_EXCLUSIVE`.
    pub fn create_stream(&self, name: &str, mode: StorageMode) -> Result<Stream> {
        let wide = WideString::new(name);
        // SAFETY: `wide` outlives the call.
        let stream = unsafe { self.storage.CreateStream(wide.as_pcwstr(), mode.to_native(), 0, 0) }
            .map_err(|e| storage_error(e, name))?;
        Ok(Stream { stream })
    }

    /// Opens an existing stream.
    pub fn open_stream(&self, name: &str, mode: StorageMode) -> Result<Stream> {
        let wide = WideString::new(name);
        // SAFETY: `wide` outlives the call.
        let stream =
            unsafe { self.storage.OpenStream(wide.as_pcwstr(), None, mode.to_native(), 0) }
                .map_err(|e| storage_error(e, name))?;
        Ok(Stream { stream })
    }

    /// Creates a child storage.
    pub fn create_storage(&self, name: &str, mode: StorageMode) -> Result<StructuredStorage> {
        let wide = WideString::new(name);
        // SAFETY: `wide` outlives the call.
        let storage =
            unsafe { self.storage.CreateStorage(wide.as_pcwstr(), mode.to_native(), 0, 0) }
                .map_err(|e| storage_error(e, name))?;
        Ok(Self { storage })
    }

    /// Opens a child storage.
    pub fn open_storage(&self, name: &str, mode: StorageMode) -> Result<StructuredStorage> {
        let wide = WideString::new(name);
        // SAFETY: `wide` outlives the call; no priority storage or exclusions.
        let storage = unsafe {
            self.storage
                .OpenStorage(
                    wide.as_pcwstr(),
                    None::<&IStorage>,
                    mode.to_native(),
                    std::ptr::null(),
                    0,
                )
        }
        .map_err(|e| storage_error(e, name))?;
        Ok(Self { storage })
    }

    /// Copies every element into `destination`.
    pub fn copy_to(&self, destination: &StructuredStorage) -> Result<()> {
        // SAFETY: No exclusions.
        unsafe { self.storage.CopyTo(None, None, &destination.storage)? };
        Ok(())
    }

    /// Moves (or copies) element `name` into `destination` as `new_name`.
    pub fn move_element_to(
        &self,
        name: &str,
        destination: &StructuredStorage,
        new_name: &str,
        copy: bool,
    ) -> Result<()> {
        let name_wide = WideString::new(name);
        let new_wide = WideString::new(new_name);
        let flags = if copy { STGMOVE_COPY } else { STGMOVE_MOVE };

        // SAFETY: Both names outlive the call.
        unsafe {
            self.storage.MoveElementTo(
                name_wide.as_pcwstr(),
                &destination.storage,
                new_wide.as_pcwstr(),
                flags,
            )
        }
        .map_err(|e| storage_error(e, name))
    }

    /// Commits a transacted storage.
    pub fn commit(&self) -> Result<()> {
        // SAFETY: Plain interface call.
        unsafe { self.storage.Commit(STGC_DEFAULT.0 as u32)? };
        Ok(())
    }

    /// Discards uncommitted changes of a transacted storage.
    pub fn revert(&self) -> Result<()> {
        // SAFETY: Plain interface call.
        unsafe { self.storage.Revert()? };
        Ok(())
    }

    /// Lists the direct children.
    pub fn elements(&self) -> Result<Vec<StorageStat>> {
        // SAFETY: Reserved arguments are zero or null.
        let enumerator: IEnumSTATSTG = unsafe { self.storage.EnumElements(0, None, 0)? };
        let mut elements = Vec::new();

        loop {
            let mut batch = [STATSTG::default()];
            let mut fetched = 0u32;
            // SAFETY: `batch` and `fetched` are valid output locations.
            unsafe { enumerator.Next(&mut batch, Some(&mut fetched as *mut u32))? };
            if fetched == 0 {
                break;
            }
            // SAFETY: Next hands us ownership of the name.
            elements.push(unsafe { StorageStat::take(&batch[0]) });
        }

        Ok(elements)
    }

    /// Deletes a child element.
    pub fn destroy_element(&self, name: &str) -> Result<()> {
        let wide = WideString::new(name);
        // SAFETY: `wide` outlives the call.
        unsafe { self.storage.DestroyElement(wide.as_pcwstr()) }.map_err(|e| storage_error(e, name))
    }

    /// Renames a child element.
    pub fn rename_element(&self, old_name: &str, new_name: &str) -> Result<()> {
        let old_wide = WideString::new(old_name);
        let new_wide = WideString::new(new_name);
        // SAFETY: Both names outlive the call.
        unsafe { self.storage.RenameElement(old_wide.as_pcwstr(), new_wide.as_pcwstr()) }
            .map_err(|e| storage_error(e, old_name))
    }

    /// Stamps the storage with a class id.
    pub fn set_class(&self, class_id: &GUID) -> Result<()> {
        // SAFETY: `class_id` outlives the call.
        unsafe { self.storage.SetClass(class_id)? };
        Ok(())
    }

    /// Statistics for this storage.
    pub fn stat(&self) -> Result<StorageStat> {
        let mut stat = STATSTG::default();
        // SAFETY: `stat` is a valid output location.
        unsafe {
            self.storage.Stat(&mut stat, STATFLAG_DEFAULT.0 as u32)?;
            Ok(StorageStat::take(&stat))
        }
    }
}

/// A stream inside a compound file.
#[derive(Clone)]
pub struct Stream {
    stream: IStream,
}

impl Stream {
    /// Wraps an existing interface.
    pub fn from_interface(stream: IStream) -> Self {
        Self { stream }
    }

    /// The underlying interface.
    pub fn as_interface(&self) -> &IStream {
        &self.stream
    }

    /// Statistics for this stream.
    pub fn stat(&self) -> Result<StorageStat> {
        let mut stat = STATSTG::default();
        // SAFETY: `stat` is a valid output location.
        unsafe {
            self.stream.Stat(&mut stat, STATFLAG_DEFAULT)?;
            Ok(StorageStat::take(&stat))
        }
    }

    /// Commits a transacted stream.
    pub fn commit(&self) -> Result<()> {
        // SAFETY: Plain interface call.
        unsafe { self.stream.Commit(STGC_DEFAULT)? };
        Ok(())
    }

    /// Truncates or extends the stream.
    pub fn set_len(&self, len: u64) -> Result<()> {
        // SAFETY: Plain interface call.
        unsafe { self.stream.SetSize(len)? };
        Ok(())
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(u32::MAX as usize) as u32;
        let mut read = 0u32;
        // SAFETY: `buf` holds at least `len` writable bytes.
        unsafe { self.stream.Read(buf.as_mut_ptr().cast(), len, Some(&mut read as *mut u32)) }
            .ok()
            .map_err(io::Error::from)?;
        Ok(read as usize)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(u32::MAX as usize) as u32;
        let mut written = 0u32;
        // SAFETY: `buf` holds at least `len` readable bytes.
        unsafe { self.stream.Write(buf.as_ptr().cast(), len, Some(&mut written as *mut u32)) }
            .ok()
            .map_err(io::Error::from)?;
        Ok(written as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit().map_err(io::Error::other)
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, origin) = match pos {
            SeekFrom::Start(offset) => (offset as i64, STREAM_SEEK_SET),
            SeekFrom::Current(offset) => (offset, STREAM_SEEK_CUR),
            SeekFrom::End(offset) => (offset, STREAM_SEEK_END),
        };
        let mut position = 0u64;
        // SAFETY: `position` is a valid output location.
        unsafe { self.stream.Seek(offset, origin, Some(&mut position as *mut u64)) }
            .map_err(io::Error::from)?;
        Ok(position)
    }
}

// First eight bytes of every compound file.
const COMPOUND_FILE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Returns true if `path` is a compound file.
///
/// Checks the header signature, which is the test `StgIsStorageFile`
/// applies. Files shorter than the signature are not compound files.
pub fn is_storage_file(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::not_found(format!("'{}'", path.display())),
        io::ErrorKind::PermissionDenied => Error::access_denied(format!("'{}'", path.display())),
        _ => Error::Io(e),
    })?;

    let mut header = [0u8; 8];
    match file.read_exact(&mut header) {
        Ok(()) => Ok(header == COMPOUND_FILE_SIGNATURE),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELEMENT: StorageMode = StorageMode(STGM_READWRITE.0 | STGM_SHARE_EXCLUSIVE.0);

    fn com() -> ComInitializer {
        ComInitializer::new(ComApartment::MultiThreaded).unwrap()
    }

    fn new_storage(dir: &tempfile::TempDir) -> StructuredStorage {
        let path = dir.path().join("test.stg");
        StructuredStorage::create(&path, ELEMENT.with(StorageMode::CREATE)).unwrap()
    }

    #[test]
    fn test_initializer_nesting() {
        let outer = ComInitializer::new(ComApartment::MultiThreaded).unwrap();
        let inner = ComInitializer::new(ComApartment::MultiThreaded).unwrap();
        assert!(inner.was_already_initialized());
        drop(inner);
        drop(outer);
    }

    #[test]
    fn test_initializer_rejects_changed_mode() {
        let _mta = ComInitializer::new(ComApartment::MultiThreaded).unwrap();
        assert!(ComInitializer::new(ComApartment::SingleThreaded).is_err());
    }

    #[test]
    fn test_variant_round_trip() {
        let values = [
            Variant::Empty,
            Variant::Null,
            Variant::Bool(true),
            Variant::Bool(false),
            Variant::I1(-5),
            Variant::I2(-1234),
            Variant::I4(i32::MIN),
            Variant::I8(i64::MAX),
            Variant::U1(200),
            Variant::U2(60_000),
            Variant::U4(u32::MAX),
            Variant::U8(u64::MAX),
            Variant::R4(1.5),
            Variant::R8(-2.25),
            Variant::String("héllo".into()),
            Variant::String(String::new()),
            Variant::Error(0x8000_4005_u32 as i32),
        ];

        for value in values {
            let native = value.to_native();
            assert_eq!(native.vt(), value.variant_type() as u16);
            assert_eq!(native.to_variant().unwrap(), value);
        }
    }

    #[test]
    fn test_native_bool_is_variant_true() {
        let native = Variant::Bool(true).to_native();
        let raw = unsafe { native.as_native().as_raw().Anonymous.Anonymous.Anonymous.boolVal };
        assert_eq!(raw, -1);
    }

    #[test]
    fn test_native_string_is_bstr() {
        let native = Variant::from("name").to_native();
        assert_eq!(native.vt(), VariantType::BStr as u16);
        let released = native.into_native();
        assert_eq!(Variant::from_native(&released).unwrap(), Variant::from("name"));
    }

    #[test]
    fn test_unsupported_variant_type() {
        let currency = raw_variant(VariantType::Currency, imp::VARIANT_0_0_0 { llVal: 0 });
        let result = Variant::from_native(&currency);
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_by_ref_variant_is_unsupported() {
        let raw = imp::VARIANT {
            Anonymous: imp::VARIANT_0 {
                Anonymous: imp::VARIANT_0_0 {
                    vt: VariantType::I4 as u16 | VariantType::BYREF,
                    wReserved1: 0,
                    wReserved2: 0,
                    wReserved3: 0,
                    Anonymous: imp::VARIANT_0_0_0 { llVal: 0 },
                },
            },
        };
        // A null BYREF payload owns nothing for VariantClear to free.
        let by_ref = OwnedVariant::from_native(unsafe { VARIANT::from_raw(raw) });
        assert!(matches!(by_ref.to_variant(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_variant_type_strips_modifiers() {
        let raw = VariantType::I4 as u16 | VariantType::BYREF;
        assert_eq!(VariantType::from_raw(raw), Some(VariantType::I4));
        assert_eq!(VariantType::from_raw(15), None);
    }

    #[test]
    fn test_stream_read_write_seek() {
        let _com = com();
        let dir = tempfile::tempdir().unwrap();
        let storage = new_storage(&dir);

        let mut stream = storage.create_stream("data", ELEMENT).unwrap();
        stream.write_all(b"hello structured storage").unwrap();
        assert_eq!(stream.stat().unwrap().size, 24);

        stream.seek(SeekFrom::Start(6)).unwrap();
        let mut word = [0u8; 10];
        stream.read_exact(&mut word).unwrap();
        assert_eq!(&word, b"structured");
        assert_eq!(stream.seek(SeekFrom::End(-7)).unwrap(), 17);

        let stat = stream.stat().unwrap();
        assert_eq!(stat.name, "data");
        assert_eq!(stat.storage_type, Some(StorageType::Stream));
    }

    #[test]
    fn test_elements_and_renames() {
        let _com = com();
        let dir = tempfile::tempdir().unwrap();
        let storage = new_storage(&dir);

        drop(storage.create_stream("a", ELEMENT).unwrap());
        drop(storage.create_storage("child", ELEMENT).unwrap());

        let mut names: Vec<_> = storage.elements().unwrap().into_iter().map(|e| e.name).collect();
        names.sort();
        assert_eq!(names, ["a", "child"]);

        storage.rename_element("a", "b").unwrap();
        assert!(matches!(storage.open_stream("a", ELEMENT), Err(Error::NotFound(_))));
        drop(storage.open_stream("b", ELEMENT).unwrap());

        storage.destroy_element("b").unwrap();
        assert_eq!(storage.elements().unwrap().len(), 1);
    }

    #[test]
    fn test_move_and_copy_between_storages() {
        let _com = com();
        let dir = tempfile::tempdir().unwrap();
        let storage = new_storage(&dir);
        let child = storage.create_storage("child", ELEMENT).unwrap();

        let mut stream = storage.create_stream("payload", ELEMENT).unwrap();
        stream.write_all(b"xyz").unwrap();
        drop(stream);

        storage.move_element_to("payload", &child, "copy", true).unwrap();
        storage.move_element_to("payload", &child, "moved", false).unwrap();
        assert!(storage.open_stream("payload", ELEMENT).is_err());

        let mut moved = String::new();
        child.open_stream("moved", ELEMENT).unwrap().read_to_string(&mut moved).unwrap();
        assert_eq!(moved, "xyz");
        assert_eq!(child.elements().unwrap().len(), 2);

        let other = StructuredStorage::create(
            dir.path().join("other.stg"),
            ELEMENT.with(StorageMode::CREATE),
        )
        .unwrap();
        child.copy_to(&other).unwrap();
        assert_eq!(other.elements().unwrap().len(), 2);
    }

    #[test]
    fn test_transacted_revert() {
        let _com = com();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.stg");
        let storage = StructuredStorage::create(
            &path,
            ELEMENT.with(StorageMode::CREATE).with(StorageMode::TRANSACTED),
        )
        .unwrap();

        drop(storage.create_stream("kept", ELEMENT).unwrap());
        storage.commit().unwrap();
        drop(storage.create_stream("dropped", ELEMENT).unwrap());
        storage.revert().unwrap();

        let names: Vec<_> = storage.elements().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["kept"]);
    }

    #[test]
    fn test_class_id_and_reopen() {
        let _com = com();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class.stg");
        let class_id = GUID::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);

        {
            let storage = StructuredStorage::create(&path, ELEMENT.with(StorageMode::CREATE)).unwrap();
            storage.set_class(&class_id).unwrap();
        }

        assert!(is_storage_file(&path).unwrap());
        let storage = StructuredStorage::open(&path, ELEMENT).unwrap();
        let stat = storage.stat().unwrap();
        assert_eq!(stat.class_id, class_id);
        assert_eq!(stat.storage_type, Some(StorageType::Storage));
    }

    #[test]
    fn test_plain_file_is_not_storage() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"just some text, long enough to have a header").unwrap();
        assert!(!is_storage_file(&text).unwrap());

        let short = dir.path().join("short.bin");
        std::fs::write(&short, [0xD0, 0xCF]).unwrap();
        assert!(!is_storage_file(&short).unwrap());

        assert!(matches!(
            is_storage_file(dir.path().join("missing.stg")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let _com = com();
        let dir = tempfile::tempdir().unwrap();
        let result = StructuredStorage::open(dir.path().join("missing.stg"), ELEMENT);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
