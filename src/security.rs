//! Security identifiers and object security.
//!
//! Provides [`Sid`], an owned copy of a native SID, together with the
//! well-known SID catalogue, account lookup, and owner / group queries for
//! files.

use crate::buffer::{two_buffer_invoke, GrowResult, NativeBuffer};
use crate::error::{error_for_win32, Error, Result};
use crate::string::{from_wide_ptr, WideString};
use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{LocalFree, HLOCAL, NO_ERROR};
use windows::Win32::Security::Authorization::{
    ConvertSecurityDescriptorToStringSecurityDescriptorW, ConvertSidToStringSidW,
    ConvertStringSidToSidW, GetNamedSecurityInfoW, SE_FILE_OBJECT,
};
use windows::Win32::Security::{
    CreateWellKnownSid, GetLengthSid, GetSidIdentifierAuthority, GetSidSubAuthority,
    GetSidSubAuthorityCount, IsValidSid, IsWellKnownSid, LookupAccountSidW,
    WinAnonymousSid, WinAuthenticatedUserSid, WinBuiltinAdministratorsSid, WinBuiltinUsersSid,
    WinCreatorOwnerSid, WinInteractiveSid, WinLocalServiceSid, WinLocalSystemSid,
    WinNetworkServiceSid, WinWorldSid, DACL_SECURITY_INFORMATION, GROUP_SECURITY_INFORMATION,
    OBJECT_SECURITY_INFORMATION, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
    SACL_SECURITY_INFORMATION, SID_NAME_USE, WELL_KNOWN_SID_TYPE,
};

/// Largest possible SID (`SECURITY_MAX_SID_SIZE`).
pub const MAX_SID_SIZE: usize = 68;

/// `SDDL_REVISION_1`
const SDDL_REVISION: u32 = 1;

/// Memory allocated by the system with `LocalAlloc`.
struct LocalMemory(*mut c_void);

impl Drop for LocalMemory {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: The pointer came from an API documented to allocate
            // with LocalAlloc and is not used after this.
            unsafe {
                let _ = LocalFree(HLOCAL(self.0));
            }
        }
    }
}

/// Well-known security identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownSid {
    /// Everyone (`S-1-1-0`).
    World,
    /// Local System (`S-1-5-18`).
    LocalSystem,
    /// BUILTIN\Administrators (`S-1-5-32-544`).
    BuiltinAdministrators,
    /// BUILTIN\Users (`S-1-5-32-545`).
    BuiltinUsers,
    /// Authenticated Users (`S-1-5-11`).
    AuthenticatedUser,
    /// Local Service (`S-1-5-19`).
    LocalService,
    /// Network Service (`S-1-5-20`).
    NetworkService,
    /// Interactive (`S-1-5-4`).
    Interactive,
    /// Creator Owner (`S-1-3-0`).
    CreatorOwner,
    /// Anonymous Logon (`S-1-5-7`).
    Anonymous,
}

impl WellKnownSid {
    fn to_native(self) -> WELL_KNOWN_SID_TYPE {
        match self {
            WellKnownSid::World => WinWorldSid,
            WellKnownSid::LocalSystem => WinLocalSystemSid,
            WellKnownSid::BuiltinAdministrators => WinBuiltinAdministratorsSid,
            WellKnownSid::BuiltinUsers => WinBuiltinUsersSid,
            WellKnownSid::AuthenticatedUser => WinAuthenticatedUserSid,
            WellKnownSid::LocalService => WinLocalServiceSid,
            WellKnownSid::NetworkService => WinNetworkServiceSid,
            WellKnownSid::Interactive => WinInteractiveSid,
            WellKnownSid::CreatorOwner => WinCreatorOwnerSid,
            WellKnownSid::Anonymous => WinAnonymousSid,
        }
    }
}

/// The 48-bit top-level authority of a SID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentifierAuthority(pub [u8; 6]);

impl IdentifierAuthority {
    /// `SECURITY_NULL_SID_AUTHORITY`
    pub const NULL: Self = Self([0, 0, 0, 0, 0, 0]);
    /// `SECURITY_WORLD_SID_AUTHORITY`
    pub const WORLD: Self = Self([0, 0, 0, 0, 0, 1]);
    /// `SECURITY_LOCAL_SID_AUTHORITY`
    pub const LOCAL: Self = Self([0, 0, 0, 0, 0, 2]);
    /// `SECURITY_CREATOR_SID_AUTHORITY`
    pub const CREATOR: Self = Self([0, 0, 0, 0, 0, 3]);
    /// `SECURITY_NT_AUTHORITY`
    pub const NT: Self = Self([0, 0, 0, 0, 0, 5]);

    /// The authority as a big-endian integer.
    pub fn value(self) -> u64 {
        self.0.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

impl fmt::Display for IdentifierAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Matches ConvertSidToStringSid: decimal unless the top 16 bits are set.
        if self.0[0] == 0 && self.0[1] == 0 {
            write!(f, "{}", self.value())
        } else {
            write!(f, "0x{:012X}", self.value())
        }
    }
}

/// How an account name is used (`SID_NAME_USE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidNameUse {
    /// A user account.
    User,
    /// A group account.
    Group,
    /// A domain.
    Domain,
    /// An alias (local group).
    Alias,
    /// A well-known group such as Everyone.
    WellKnownGroup,
    /// A deleted account.
    DeletedAccount,
    /// Not a valid account.
    Invalid,
    /// Unknown type.
    Unknown,
    /// A computer account.
    Computer,
    /// A mandatory integrity label.
    Label,
    /// A logon session.
    LogonSession,
}

impl SidNameUse {
    fn from_native(usage: SID_NAME_USE) -> Self {
        match usage.0 {
            1 => SidNameUse::User,
            2 => SidNameUse::Group,
            3 => SidNameUse::Domain,
            4 => SidNameUse::Alias,
            5 => SidNameUse::WellKnownGroup,
            6 => SidNameUse::DeletedAccount,
            7 => SidNameUse::Invalid,
            9 => SidNameUse::Computer,
            10 => SidNameUse::Label,
            11 => SidNameUse::LogonSession,
            _ => SidNameUse::Unknown,
        }
    }
}

/// The account a SID maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSidInfo {
    /// Account name.
    pub name: String,
    /// Domain name; empty for well-known groups.
    pub domain: String,
    /// Account kind.
    pub usage: SidNameUse,
}

/// An owned security identifier.
///
/// Equality compares the SID bytes, which is what `EqualSid` does.
#[derive(Clone)]
pub struct Sid {
    buffer: NativeBuffer,
    len: usize,
}

impl Sid {
    /// Creates a well-known SID.
    pub fn from_well_known(kind: WellKnownSid) -> Result<Self> {
        let mut buffer = NativeBuffer::with_byte_capacity(MAX_SID_SIZE);
        let mut size = MAX_SID_SIZE as u32;

        // SAFETY: The buffer holds MAX_SID_SIZE bytes, which is the size we report.
        unsafe {
            CreateWellKnownSid(
                kind.to_native(),
                PSID::default(),
                PSID(buffer.as_mut_ptr().cast()),
                &mut size,
            )?;
        }

        Ok(Self {
            buffer,
            len: size as usize,
        })
    }

    /// Parses the `S-1-...` string form (or an SDDL alias such as `WD`).
    pub fn parse(s: &str) -> Result<Self> {
        let wide = WideString::new(s);
        let mut psid = PSID::default();

        // SAFETY: `wide` is null-terminated; the output is freed below.
        unsafe { ConvertStringSidToSidW(wide.as_pcwstr(), &mut psid)? };
        let _owned = LocalMemory(psid.0);

        // SAFETY: The system just produced a valid SID.
        unsafe { Self::from_psid(psid) }
    }

    /// Copies a SID from native memory.
    ///
    /// # Safety
    ///
    /// `psid` must point to a valid SID for the duration of the call.
    pub unsafe fn from_psid(psid: PSID) -> Result<Self> {
        if psid.0.is_null() {
            return Err(Error::null_pointer("Sid::from_psid"));
        }
        let len = GetLengthSid(psid) as usize;
        if len == 0 || len > MAX_SID_SIZE {
            return Err(Error::invalid_argument("invalid SID length"));
        }
        let mut buffer = NativeBuffer::with_byte_capacity(len);
        std::ptr::copy_nonoverlapping(psid.0.cast::<u8>(), buffer.as_mut_ptr(), len);
        Ok(Self { buffer, len })
    }

    /// Copies a SID from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the bytes are not a valid SID.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || bytes.len() > MAX_SID_SIZE {
            return Err(Error::invalid_argument("invalid SID length"));
        }
        // IsValidSid trusts the sub-authority count, so the length has to
        // agree with it before the bytes reach the OS.
        let expected = 8 + 4 * usize::from(bytes[1]);
        if expected != bytes.len() {
            return Err(Error::invalid_argument(format!(
                "SID claims {} sub-authorities but has {} bytes",
                bytes[1],
                bytes.len()
            )));
        }

        let mut buffer = NativeBuffer::with_byte_capacity(bytes.len());
        buffer.as_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        let sid = Self {
            buffer,
            len: bytes.len(),
        };
        if !sid.is_valid() {
            return Err(Error::invalid_argument("invalid SID"));
        }
        Ok(sid)
    }

    /// Pointer for passing to native calls. Valid while `self` is alive.
    #[inline]
    pub fn as_psid(&self) -> PSID {
        PSID(self.buffer.as_ptr() as *mut c_void)
    }

    /// The SID bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer.as_bytes()[..self.len]
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for a constructed SID; present for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Revision level (always 1 today).
    pub fn revision(&self) -> u8 {
        self.as_bytes()[0]
    }

    /// Validates the structure with `IsValidSid`.
    pub fn is_valid(&self) -> bool {
        // SAFETY: The buffer is at least 8 bytes; IsValidSid checks the rest.
        unsafe { IsValidSid(self.as_psid()).as_bool() }
    }

    /// Returns true if this is the given well-known SID.
    pub fn is_well_known(&self, kind: WellKnownSid) -> bool {
        // SAFETY: `self` holds a valid SID.
        unsafe { IsWellKnownSid(self.as_psid(), kind.to_native()).as_bool() }
    }

    /// Number of sub-authorities.
    pub fn sub_authority_count(&self) -> u8 {
        // SAFETY: `self` holds a valid SID; the returned pointer is into our buffer.
        unsafe { *GetSidSubAuthorityCount(self.as_psid()) }
    }

    /// The sub-authority at `index`.
    pub fn sub_authority(&self, index: u8) -> Result<u32> {
        if index >= self.sub_authority_count() {
            return Err(Error::invalid_argument(format!(
                "sub-authority {index} out of range"
            )));
        }
        // SAFETY: Index checked above; the pointer is into our buffer.
        Ok(unsafe { *GetSidSubAuthority(self.as_psid(), u32::from(index)) })
    }

    /// All sub-authorities in order.
    pub fn sub_authorities(&self) -> Vec<u32> {
        (0..self.sub_authority_count())
            .filter_map(|i| self.sub_authority(i).ok())
            .collect()
    }

    /// The top-level authority.
    pub fn identifier_authority(&self) -> IdentifierAuthority {
        // SAFETY: `self` holds a valid SID; the pointer is into our buffer.
        IdentifierAuthority(unsafe { (*GetSidIdentifierAuthority(self.as_psid())).Value })
    }

    /// Formats with `ConvertSidToStringSidW`.
    pub fn to_string_sid(&self) -> Result<String> {
        let mut string = PWSTR::null();

        // SAFETY: `self` holds a valid SID; the output is freed below.
        unsafe { ConvertSidToStringSidW(self.as_psid(), &mut string)? };
        let _owned = LocalMemory(string.0.cast());

        // SAFETY: The system returned a null-terminated string.
        unsafe { from_wide_ptr(string.0) }
    }

    /// Looks up the account on the local system.
    pub fn lookup_account(&self) -> Result<AccountSidInfo> {
        two_buffer_invoke(|name, domain| {
            let mut name_len = name.char_capacity_u32();
            let mut domain_len = domain.char_capacity_u32();
            let mut usage = SID_NAME_USE::default();

            // SAFETY: Both buffers are as large as the lengths we pass.
            let result = unsafe {
                LookupAccountSidW(
                    PCWSTR::null(),
                    self.as_psid(),
                    name.as_pwstr(),
                    &mut name_len,
                    domain.as_pwstr(),
                    &mut domain_len,
                    &mut usage,
                )
            };

            match result {
                Ok(()) => {
                    name.set_len(name_len as usize)?;
                    domain.set_len(domain_len as usize)?;
                    Ok(GrowResult::Done(AccountSidInfo {
                        name: name.to_string_lossy(),
                        domain: domain.to_string_lossy(),
                        usage: SidNameUse::from_native(usage),
                    }))
                }
                Err(e) if crate::buffer::is_buffer_too_small_error(&e) => {
                    Ok(GrowResult::Grow((name_len as usize, domain_len as usize)))
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

impl PartialEq for Sid {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Sid {}

impl std::hash::Hash for Sid {
    fn hash<S: std::hash::Hasher>(&self, state: &mut S) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision(), self.identifier_authority())?;
        for sub in self.sub_authorities() {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({self})")
    }
}

impl std::str::FromStr for Sid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Sid::parse(s)
    }
}

/// Parts of a security descriptor to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityInfo(pub OBJECT_SECURITY_INFORMATION);

impl SecurityInfo {
    /// The owner SID.
    pub const OWNER: Self = Self(OWNER_SECURITY_INFORMATION);
    /// The primary group SID.
    pub const GROUP: Self = Self(GROUP_SECURITY_INFORMATION);
    /// The discretionary ACL.
    pub const DACL: Self = Self(DACL_SECURITY_INFORMATION);
    /// The system ACL; requires `SeSecurityPrivilege`.
    pub const SACL: Self = Self(SACL_SECURITY_INFORMATION);

    /// Combines two selections.
    pub fn with(self, other: Self) -> Self {
        Self(OBJECT_SECURITY_INFORMATION(self.0 .0 | other.0 .0))
    }
}

/// A security descriptor returned by `GetNamedSecurityInfoW`.
struct FileSecurity {
    owner: PSID,
    group: PSID,
    descriptor: PSECURITY_DESCRIPTOR,
    _memory: LocalMemory,
}

fn file_security(path: &Path, info: SecurityInfo) -> Result<FileSecurity> {
    let wide = WideString::from_path(path);
    let mut owner = PSID::default();
    let mut group = PSID::default();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();

    // SAFETY: All outputs are valid locations; the descriptor is freed by
    // the returned FileSecurity.
    let code = unsafe {
        GetNamedSecurityInfoW(
            wide.as_pcwstr(),
            SE_FILE_OBJECT,
            info.0,
            Some(&mut owner),
            Some(&mut group),
            None,
            None,
            &mut descriptor,
        )
    };
    if code != NO_ERROR {
        return Err(error_for_win32(code, Some(&path.to_string_lossy())));
    }

    Ok(FileSecurity {
        owner,
        group,
        descriptor,
        _memory: LocalMemory(descriptor.0),
    })
}

/// The owner of a file or directory.
pub fn file_owner(path: impl AsRef<Path>) -> Result<Sid> {
    let security = file_security(path.as_ref(), SecurityInfo::OWNER)?;
    // SAFETY: The owner points into the descriptor, which is still alive.
    unsafe { Sid::from_psid(security.owner) }
}

/// The primary group of a file or directory.
pub fn file_group(path: impl AsRef<Path>) -> Result<Sid> {
    let security = file_security(path.as_ref(), SecurityInfo::GROUP)?;
    // SAFETY: The group points into the descriptor, which is still alive.
    unsafe { Sid::from_psid(security.group) }
}

/// The selected parts of a file's security descriptor in SDDL form.
pub fn file_security_sddl(path: impl AsRef<Path>, info: SecurityInfo) -> Result<String> {
    let security = file_security(path.as_ref(), info)?;
    let mut sddl = PWSTR::null();

    // SAFETY: The descriptor is alive; the output string is freed below.
    unsafe {
        ConvertSecurityDescriptorToStringSecurityDescriptorW(
            security.descriptor,
            SDDL_REVISION,
            info.0,
            &mut sddl,
            None,
        )?;
    }
    let _owned = LocalMemory(sddl.0.cast());

    // SAFETY: Null-terminated string from the system.
    unsafe { from_wide_ptr(sddl.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_sid() {
        let sid = Sid::from_well_known(WellKnownSid::World).unwrap();
        assert!(sid.is_valid());
        assert_eq!(sid.revision(), 1);
        assert_eq!(sid.identifier_authority(), IdentifierAuthority::WORLD);
        assert_eq!(sid.sub_authority_count(), 1);
        assert_eq!(sid.sub_authority(0).unwrap(), 0);
        assert!(sid.sub_authority(1).is_err());
        assert!(sid.is_well_known(WellKnownSid::World));
        assert!(!sid.is_well_known(WellKnownSid::LocalSystem));
        assert_eq!(sid.to_string_sid().unwrap(), "S-1-1-0");
        assert_eq!(sid.to_string(), "S-1-1-0");
    }

    #[test]
    fn test_world_sid_account() {
        let sid = Sid::from_well_known(WellKnownSid::World).unwrap();
        let info = sid.lookup_account().unwrap();
        // The name is localized; the domain and usage are not.
        assert!(!info.name.is_empty());
        assert_eq!(info.domain, "");
        assert_eq!(info.usage, SidNameUse::WellKnownGroup);
    }

    #[test]
    fn test_display_matches_native() {
        for kind in [
            WellKnownSid::LocalSystem,
            WellKnownSid::BuiltinAdministrators,
            WellKnownSid::BuiltinUsers,
            WellKnownSid::NetworkService,
        ] {
            let sid = Sid::from_well_known(kind).unwrap();
            assert_eq!(sid.to_string(), sid.to_string_sid().unwrap());
        }
    }

    #[test]
    fn test_parse_and_equality() {
        let parsed: Sid = "S-1-5-32-544".parse().unwrap();
        let admins = Sid::from_well_known(WellKnownSid::BuiltinAdministrators).unwrap();
        assert_eq!(parsed, admins);
        assert_eq!(parsed.identifier_authority(), IdentifierAuthority::NT);
        assert_eq!(parsed.sub_authorities(), vec![32, 544]);
        assert_eq!(parsed.len(), 16);

        assert!(Sid::parse("not a sid").is_err());
    }

    #[test]
    fn test_from_bytes() {
        let world = Sid::from_well_known(WellKnownSid::World).unwrap();
        let copy = Sid::from_bytes(world.as_bytes()).unwrap();
        assert_eq!(copy, world);

        // Zeroed SID has revision 0 and is invalid.
        assert!(Sid::from_bytes(&[0u8; 8]).is_err());
        assert!(Sid::from_bytes(&[1u8; 4]).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_short_sub_authorities() {
        // S-1-5-... claiming 15 sub-authorities with room for one.
        let mut truncated = vec![1u8, 15, 0, 0, 0, 0, 0, 5];
        truncated.extend(32u32.to_le_bytes());
        assert!(matches!(
            Sid::from_bytes(&truncated),
            Err(Error::InvalidArgument(msg)) if msg.contains("15 sub-authorities")
        ));

        // The same bytes with a matching count are the Administrators alias
        // prefix S-1-5-32.
        truncated[1] = 1;
        assert_eq!(Sid::from_bytes(&truncated).unwrap().to_string(), "S-1-5-32");
    }

    #[test]
    fn test_identifier_authority_display() {
        assert_eq!(IdentifierAuthority::NT.to_string(), "5");
        assert_eq!(IdentifierAuthority([0, 1, 0, 0, 0, 0]).to_string(), "0x000100000000");
    }

    #[test]
    fn test_file_owner_of_temp_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let owner = file_owner(file.path()).unwrap();
        assert!(owner.is_valid());
        assert!(file_group(file.path()).unwrap().is_valid());

        let sddl = file_security_sddl(file.path(), SecurityInfo::OWNER).unwrap();
        assert!(sddl.starts_with("O:"));
    }

    #[test]
    fn test_file_owner_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = file_owner(dir.path().join("missing"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
