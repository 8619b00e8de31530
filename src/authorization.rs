//! Access tokens and privileges.
//!
//! Provides [`Token`] for querying the current process or thread token:
//! elevation, user and group SIDs, and privileges. Privileges can be
//! enabled for a scope with [`PrivilegeGuard`].

use crate::buffer::{
    buffer_invoke, is_buffer_too_small_error, GrowResult, NativeBuffer, TrailingArray,
};
use crate::error::{last_error_code, Error, Result};
use crate::handle::OwnedHandle;
use crate::security::Sid;
use crate::string::WideString;
use std::mem::{offset_of, size_of};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    BOOL, ERROR_BAD_LENGTH, ERROR_NOT_ALL_ASSIGNED, ERROR_NO_TOKEN, HANDLE, LUID,
};
use windows::Win32::Security::{
    AdjustTokenPrivileges, DuplicateTokenEx, GetTokenInformation, LookupPrivilegeNameW,
    LookupPrivilegeValueW, PrivilegeCheck, SecurityImpersonation, TokenElevation,
    TokenElevationType, TokenGroups, TokenImpersonation, TokenPrivileges, TokenStatistics,
    TokenType as TokenTypeClass, TokenUser, LUID_AND_ATTRIBUTES, PRIVILEGE_SET,
    SE_PRIVILEGE_ENABLED, SE_PRIVILEGE_ENABLED_BY_DEFAULT, SE_PRIVILEGE_REMOVED,
    SE_PRIVILEGE_USED_FOR_ACCESS, SID_AND_ATTRIBUTES, TOKEN_ACCESS_MASK,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_ALL_ACCESS, TOKEN_DUPLICATE, TOKEN_ELEVATION,
    TOKEN_ELEVATION_TYPE, TOKEN_GROUPS, TOKEN_IMPERSONATE, TOKEN_INFORMATION_CLASS,
    TOKEN_PRIVILEGES, TOKEN_PRIVILEGES_ATTRIBUTES, TOKEN_QUERY, TOKEN_QUERY_SOURCE, TOKEN_READ,
    TOKEN_STATISTICS, TOKEN_TYPE, TOKEN_USER,
};
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentThread, OpenProcessToken, OpenThreadToken,
};
use windows::Win32::System::WindowsProgramming::GetUserNameW;

/// Well-known privilege names.
pub mod privilege {
    /// Bypass traverse checking; held by every user.
    pub const CHANGE_NOTIFY: &str = "SeChangeNotifyPrivilege";
    /// Debug programs.
    pub const DEBUG: &str = "SeDebugPrivilege";
    /// Shut down the system.
    pub const SHUTDOWN: &str = "SeShutdownPrivilege";
    /// Back up files and directories.
    pub const BACKUP: &str = "SeBackupPrivilege";
    /// Restore files and directories.
    pub const RESTORE: &str = "SeRestorePrivilege";
    /// Change the system time.
    pub const SYSTEM_TIME: &str = "SeSystemtimePrivilege";
    /// Change the time zone.
    pub const TIME_ZONE: &str = "SeTimeZonePrivilege";
    /// Take ownership of files or other objects.
    pub const TAKE_OWNERSHIP: &str = "SeTakeOwnershipPrivilege";
    /// Load and unload device drivers.
    pub const LOAD_DRIVER: &str = "SeLoadDriverPrivilege";
    /// Manage auditing and security log.
    pub const SECURITY: &str = "SeSecurityPrivilege";
    /// Increase scheduling priority.
    pub const INCREASE_BASE_PRIORITY: &str = "SeIncreaseBasePriorityPrivilege";
    /// Create symbolic links.
    pub const CREATE_SYMBOLIC_LINK: &str = "SeCreateSymbolicLinkPrivilege";
    /// Impersonate a client after authentication.
    pub const IMPERSONATE: &str = "SeImpersonatePrivilege";
    /// Remove computer from docking station.
    pub const UNDOCK: &str = "SeUndockPrivilege";
    /// Increase a process working set.
    pub const INCREASE_WORKING_SET: &str = "SeIncreaseWorkingSetPrivilege";
}

/// Access rights requested when opening a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRights(pub TOKEN_ACCESS_MASK);

impl TokenRights {
    /// Query the token.
    pub const QUERY: Self = Self(TOKEN_QUERY);
    /// Query the token source.
    pub const QUERY_SOURCE: Self = Self(TOKEN_QUERY_SOURCE);
    /// Enable or disable privileges.
    pub const ADJUST_PRIVILEGES: Self = Self(TOKEN_ADJUST_PRIVILEGES);
    /// Duplicate the token.
    pub const DUPLICATE: Self = Self(TOKEN_DUPLICATE);
    /// Attach an impersonation token to a thread.
    pub const IMPERSONATE: Self = Self(TOKEN_IMPERSONATE);
    /// Standard read access.
    pub const READ: Self = Self(TOKEN_READ);
    /// Everything.
    pub const ALL_ACCESS: Self = Self(TOKEN_ALL_ACCESS);

    /// Combines two sets of rights.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for TokenRights {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// Attributes of a privilege in a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrivilegeAttributes(pub u32);

impl PrivilegeAttributes {
    /// Present but disabled.
    pub const DISABLED: Self = Self(0);
    /// `SE_PRIVILEGE_ENABLED_BY_DEFAULT`
    pub const ENABLED_BY_DEFAULT: Self = Self(SE_PRIVILEGE_ENABLED_BY_DEFAULT.0);
    /// `SE_PRIVILEGE_ENABLED`
    pub const ENABLED: Self = Self(SE_PRIVILEGE_ENABLED.0);
    /// `SE_PRIVILEGE_REMOVED`
    pub const REMOVED: Self = Self(SE_PRIVILEGE_REMOVED.0);
    /// `SE_PRIVILEGE_USED_FOR_ACCESS`
    pub const USED_FOR_ACCESS: Self = Self(SE_PRIVILEGE_USED_FOR_ACCESS.0);

    /// Returns true if the privilege is enabled.
    pub fn is_enabled(self) -> bool {
        self.0 & Self::ENABLED.0 != 0
    }

    /// Returns true if all flags in `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// One entry from the token's privilege list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeSetting {
    /// Programmatic name, such as `SeChangeNotifyPrivilege`.
    pub name: String,
    /// Locally unique id for this boot.
    pub luid: LUID,
    /// Current state.
    pub attributes: PrivilegeAttributes,
}

/// A group SID and its attributes (`SE_GROUP_*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidAndAttributes {
    /// The group.
    pub sid: Sid,
    /// Raw `SE_GROUP_*` flags.
    pub attributes: u32,
}

impl SidAndAttributes {
    /// `SE_GROUP_ENABLED`
    pub const ENABLED: u32 = 0x0000_0004;
    /// `SE_GROUP_LOGON_ID`
    pub const LOGON_ID: u32 = 0xC000_0000;

    /// Returns true if the group is enabled for access checks.
    pub fn is_enabled(&self) -> bool {
        self.attributes & Self::ENABLED != 0
    }
}

/// `TOKEN_ELEVATION_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationType {
    /// UAC is off or the user is not an administrator.
    Default,
    /// The elevated half of a split token.
    Full,
    /// The filtered half of a split token.
    Limited,
}

/// Primary or impersonation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// A process token.
    Primary,
    /// A thread impersonation token.
    Impersonation,
}

impl TokenType {
    fn from_native(kind: TOKEN_TYPE) -> Self {
        if kind == TokenImpersonation {
            TokenType::Impersonation
        } else {
            TokenType::Primary
        }
    }
}

/// Summary counters from `TokenStatistics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStatisticsInfo {
    /// Unique id of this token instance.
    pub token_id: LUID,
    /// Logon session the token belongs to.
    pub authentication_id: LUID,
    /// Primary or impersonation.
    pub token_type: TokenType,
    /// Number of groups.
    pub group_count: u32,
    /// Number of privileges.
    pub privilege_count: u32,
    /// Changes every time the token is modified.
    pub modified_id: LUID,
}

/// An access token.
pub struct Token {
    handle: OwnedHandle,
}

impl Token {
    /// Opens the current process token for query and privilege adjustment.
    pub fn current_process() -> Result<Self> {
        Self::current_process_with_access(TokenRights::QUERY | TokenRights::ADJUST_PRIVILEGES)
    }

    /// Opens the current process token.
    pub fn current_process_with_access(rights: TokenRights) -> Result<Self> {
        // SAFETY: Pseudo-handle for the current process.
        Self::for_process(unsafe { GetCurrentProcess() }, rights)
    }

    /// Opens the token of `process`, which needs `PROCESS_QUERY_INFORMATION`.
    pub fn for_process(process: HANDLE, rights: TokenRights) -> Result<Self> {
        let mut raw = HANDLE::default();
        // SAFETY: `raw` is a valid output location.
        unsafe { OpenProcessToken(process, rights.0, &mut raw)? };
        Ok(Self {
            handle: OwnedHandle::new(raw)?,
        })
    }

    /// Opens the current thread's token.
    ///
    /// A thread that is not impersonating has no token of its own; in that
    /// case the process token is duplicated as an impersonation token.
    /// `open_as_self` checks access against the process instead of the
    /// impersonated client.
    pub fn current_thread(rights: TokenRights, open_as_self: bool) -> Result<Self> {
        let mut raw = HANDLE::default();

        // SAFETY: Pseudo-handle for the current thread; valid output location.
        let opened =
            unsafe { OpenThreadToken(GetCurrentThread(), rights.0, open_as_self, &mut raw) };

        match opened {
            Ok(()) => Ok(Self {
                handle: OwnedHandle::new(raw)?,
            }),
            Err(e) if e.code() == ERROR_NO_TOKEN.to_hresult() => {
                let process = Self::current_process_with_access(TokenRights::DUPLICATE)?;
                process.duplicate_for_impersonation(rights)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Duplicates this token as an impersonation token.
    pub fn duplicate_for_impersonation(&self, rights: TokenRights) -> Result<Self> {
        let mut raw = HANDLE::default();

        // SAFETY: `self` holds a token opened with TOKEN_DUPLICATE.
        unsafe {
            DuplicateTokenEx(
                self.as_raw(),
                rights.0,
                None,
                SecurityImpersonation,
                TokenImpersonation,
                &mut raw,
            )?;
        }

        Ok(Self {
            handle: OwnedHandle::new(raw)?,
        })
    }

    /// The raw token handle.
    pub fn as_raw(&self) -> HANDLE {
        self.handle.as_raw()
    }

    /// Reads a fixed-size information class.
    fn query_fixed<T: Copy + Default>(&self, class: TOKEN_INFORMATION_CLASS) -> Result<T> {
        let mut value = T::default();
        let mut returned = 0u32;

        // SAFETY: `value` is exactly size_of::<T>() bytes.
        unsafe {
            GetTokenInformation(
                self.as_raw(),
                class,
                Some(std::ptr::addr_of_mut!(value).cast()),
                size_of::<T>() as u32,
                &mut returned,
            )?;
        }

        Ok(value)
    }

    /// Reads a variable-size information class, growing until it fits.
    fn query(&self, class: TOKEN_INFORMATION_CLASS) -> Result<NativeBuffer> {
        let mut buffer = NativeBuffer::with_byte_capacity(256);

        loop {
            let mut needed = 0u32;

            // SAFETY: The buffer is as large as the length we pass.
            let result = unsafe {
                GetTokenInformation(
                    self.as_raw(),
                    class,
                    Some(buffer.as_mut_ptr().cast()),
                    buffer.byte_capacity_u32(),
                    &mut needed,
                )
            };

            match result {
                Ok(()) => return Ok(buffer),
                Err(e)
                    if is_buffer_too_small_error(&e)
                        || e.code() == ERROR_BAD_LENGTH.to_hresult() =>
                {
                    let needed = (needed as usize).max(buffer.byte_capacity() * 2);
                    tracing::trace!(?class, needed, "token information did not fit");
                    buffer.ensure_byte_capacity(needed);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns true if the token is elevated.
    pub fn is_elevated(&self) -> Result<bool> {
        let elevation: TOKEN_ELEVATION = self.query_fixed(TokenElevation)?;
        Ok(elevation.TokenIsElevated != 0)
    }

    /// The UAC split-token type.
    pub fn elevation_type(&self) -> Result<ElevationType> {
        let kind: TOKEN_ELEVATION_TYPE = self.query_fixed(TokenElevationType)?;
        Ok(match kind.0 {
            2 => ElevationType::Full,
            3 => ElevationType::Limited,
            _ => ElevationType::Default,
        })
    }

    /// Primary or impersonation.
    pub fn token_type(&self) -> Result<TokenType> {
        let kind: TOKEN_TYPE = self.query_fixed(TokenTypeClass)?;
        Ok(TokenType::from_native(kind))
    }

    /// Identity and size counters.
    pub fn statistics(&self) -> Result<TokenStatisticsInfo> {
        let stats: TOKEN_STATISTICS = self.query_fixed(TokenStatistics)?;
        Ok(TokenStatisticsInfo {
            token_id: stats.TokenId,
            authentication_id: stats.AuthenticationId,
            token_type: TokenType::from_native(stats.TokenType),
            group_count: stats.GroupCount,
            privilege_count: stats.PrivilegeCount,
            modified_id: stats.ModifiedId,
        })
    }

    /// The user the token represents.
    pub fn user_sid(&self) -> Result<Sid> {
        let buffer = self.query(TokenUser)?;
        let user: TOKEN_USER = buffer.reader().read_struct()?;
        // SAFETY: The SID points into `buffer`, which is still alive.
        unsafe { Sid::from_psid(user.User.Sid) }
    }

    /// The groups the token is a member of.
    pub fn groups(&self) -> Result<Vec<SidAndAttributes>> {
        let buffer = self.query(TokenGroups)?;
        let groups = TrailingArray::<TOKEN_GROUPS, SID_AND_ATTRIBUTES>::from_buffer(
            buffer,
            offset_of!(TOKEN_GROUPS, Groups),
        )?;
        let count = groups.header().GroupCount as usize;

        groups
            .as_slice(count)?
            .iter()
            .map(|group| {
                Ok(SidAndAttributes {
                    // SAFETY: Each SID points into the buffer owned by `groups`.
                    sid: unsafe { Sid::from_psid(group.Sid)? },
                    attributes: group.Attributes,
                })
            })
            .collect()
    }

    fn raw_privileges(&self) -> Result<Vec<LUID_AND_ATTRIBUTES>> {
        let buffer = self.query(TokenPrivileges)?;
        let privileges = TrailingArray::<TOKEN_PRIVILEGES, LUID_AND_ATTRIBUTES>::from_buffer(
            buffer,
            offset_of!(TOKEN_PRIVILEGES, Privileges),
        )?;
        let count = privileges.header().PrivilegeCount as usize;
        Ok(privileges.as_slice(count)?.to_vec())
    }

    /// All privileges present in the token, enabled or not.
    pub fn privileges(&self) -> Result<Vec<PrivilegeSetting>> {
        self.raw_privileges()?
            .into_iter()
            .map(|entry| {
                Ok(PrivilegeSetting {
                    name: privilege_name(entry.Luid)?,
                    luid: entry.Luid,
                    attributes: PrivilegeAttributes(entry.Attributes.0),
                })
            })
            .collect()
    }

    /// Returns true if the privilege is present, whether or not it is enabled.
    pub fn has_privilege(&self, name: &str) -> Result<bool> {
        let luid = lookup_privilege_value(name)?;
        Ok(self.raw_privileges()?.iter().any(|entry| entry.Luid == luid))
    }

    /// Returns true if the privilege is present and enabled (`PrivilegeCheck`).
    pub fn is_privilege_enabled(&self, name: &str) -> Result<bool> {
        let mut set = PRIVILEGE_SET {
            PrivilegeCount: 1,
            // PRIVILEGE_SET_ALL_NECESSARY
            Control: 1,
            Privilege: [LUID_AND_ATTRIBUTES {
                Luid: lookup_privilege_value(name)?,
                Attributes: TOKEN_PRIVILEGES_ATTRIBUTES(0),
            }],
        };
        let mut granted = BOOL::default();

        // SAFETY: `set` holds exactly one entry, as declared.
        unsafe { PrivilegeCheck(self.as_raw(), &mut set, &mut granted)? };
        Ok(granted.as_bool())
    }

    /// Enables a privilege. Returns whether it was enabled before.
    pub fn enable_privilege(&self, name: &str) -> Result<bool> {
        self.adjust_privilege(name, true)
    }

    /// Disables a privilege. Returns whether it was enabled before.
    pub fn disable_privilege(&self, name: &str) -> Result<bool> {
        self.adjust_privilege(name, false)
    }

    fn adjust_privilege(&self, name: &str, enable: bool) -> Result<bool> {
        let new_state = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: lookup_privilege_value(name)?,
                Attributes: if enable {
                    SE_PRIVILEGE_ENABLED
                } else {
                    TOKEN_PRIVILEGES_ATTRIBUTES(0)
                },
            }],
        };
        let mut previous = TOKEN_PRIVILEGES::default();
        let mut previous_len = 0u32;

        // SAFETY: Both structures hold one entry, matching the lengths passed.
        unsafe {
            AdjustTokenPrivileges(
                self.as_raw(),
                false,
                Some(&new_state as *const _),
                size_of::<TOKEN_PRIVILEGES>() as u32,
                Some(&mut previous as *mut _),
                Some(&mut previous_len as *mut _),
            )?;
        }

        // Success with ERROR_NOT_ALL_ASSIGNED means the token lacks the privilege.
        if last_error_code() == ERROR_NOT_ALL_ASSIGNED {
            return Err(Error::access_denied(format!("{name} is not held by the token")));
        }

        // An empty previous state means nothing changed.
        if previous.PrivilegeCount == 0 {
            return Ok(enable);
        }
        Ok(previous.Privileges[0].Attributes.0 & SE_PRIVILEGE_ENABLED.0 != 0)
    }
}

/// Restores a privilege to its prior state when dropped.
pub struct PrivilegeGuard<'a> {
    token: &'a Token,
    name: String,
    was_enabled: bool,
}

impl<'a> PrivilegeGuard<'a> {
    /// Enables `name` until the guard is dropped.
    pub fn enable(token: &'a Token, name: &str) -> Result<Self> {
        let was_enabled = token.enable_privilege(name)?;
        Ok(Self {
            token,
            name: name.to_string(),
            was_enabled,
        })
    }

    /// Whether the privilege was already enabled.
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl Drop for PrivilegeGuard<'_> {
    fn drop(&mut self) {
        if !self.was_enabled {
            if let Err(e) = self.token.disable_privilege(&self.name) {
                tracing::warn!(privilege = %self.name, error = %e, "failed to restore privilege");
            }
        }
    }
}

/// Looks up the LUID of a privilege on the local system.
pub fn lookup_privilege_value(name: &str) -> Result<LUID> {
    let wide = WideString::new(name);
    let mut luid = LUID::default();
    // SAFETY: `wide` is null-terminated; `luid` is a valid output location.
    unsafe { LookupPrivilegeValueW(PCWSTR::null(), wide.as_pcwstr(), &mut luid)? };
    Ok(luid)
}

/// Looks up the programmatic name of a privilege LUID.
pub fn privilege_name(luid: LUID) -> Result<String> {
    buffer_invoke(|buffer| {
        let mut len = buffer.char_capacity_u32();

        // SAFETY: The buffer holds `len` characters.
        let result =
            unsafe { LookupPrivilegeNameW(PCWSTR::null(), &luid, buffer.as_pwstr(), &mut len) };

        match result {
            Ok(()) => {
                buffer.set_len(len as usize)?;
                Ok(GrowResult::Done(buffer.to_string_lossy()))
            }
            // On failure `len` is the required size including the null.
            Err(e) if is_buffer_too_small_error(&e) => Ok(GrowResult::Grow(len as usize)),
            Err(e) => Err(e.into()),
        }
    })
}

/// Returns true if the current process token is elevated.
pub fn is_elevated() -> Result<bool> {
    Token::current_process_with_access(TokenRights::QUERY)?.is_elevated()
}

/// The user name of the current thread.
pub fn user_name() -> Result<String> {
    buffer_invoke(|buffer| {
        let mut len = buffer.char_capacity_u32();

        // SAFETY: The buffer holds `len` characters.
        let result = unsafe { GetUserNameW(buffer.as_pwstr(), &mut len) };

        match result {
            // `len` includes the terminating null.
            Ok(()) => {
                buffer.set_len(len.saturating_sub(1) as usize)?;
                Ok(GrowResult::Done(buffer.to_string_lossy()))
            }
            Err(e) if is_buffer_too_small_error(&e) => Ok(GrowResult::Grow(len as usize)),
            Err(e) => Err(e.into()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::WellKnownSid;

    fn read_token() -> Token {
        Token::current_process_with_access(TokenRights::READ).unwrap()
    }

    #[test]
    fn test_current_process_token_is_primary() {
        let token = read_token();
        assert_eq!(token.token_type().unwrap(), TokenType::Primary);
        let stats = token.statistics().unwrap();
        assert_eq!(stats.token_type, TokenType::Primary);
        assert!(stats.privilege_count > 0);
    }

    #[test]
    fn test_elevation_is_consistent() {
        let token = read_token();
        let elevated = token.is_elevated().unwrap();
        if token.elevation_type().unwrap() == ElevationType::Full {
            assert!(elevated);
        }
        assert_eq!(is_elevated().unwrap(), elevated);
    }

    #[test]
    fn test_privileges_include_change_notify() {
        let token = read_token();
        let privileges = token.privileges().unwrap();
        assert!(!privileges.is_empty());
        assert!(privileges.iter().any(|p| p.name == privilege::CHANGE_NOTIFY));
        assert!(token.has_privilege(privilege::CHANGE_NOTIFY).unwrap());
    }

    #[test]
    fn test_is_privilege_enabled() {
        let token = read_token();
        assert!(token.is_privilege_enabled(privilege::CHANGE_NOTIFY).unwrap());
        // Backup is never enabled by default, even for administrators.
        assert!(!token.is_privilege_enabled(privilege::BACKUP).unwrap());
    }

    #[test]
    fn test_privilege_name_roundtrip() {
        let luid = lookup_privilege_value(privilege::SHUTDOWN).unwrap();
        assert_eq!(privilege_name(luid).unwrap(), privilege::SHUTDOWN);
        assert!(lookup_privilege_value("SeNotARealPrivilege").is_err());
    }

    #[test]
    fn test_user_sid_matches_user_name() {
        let sid = read_token().user_sid().unwrap();
        assert!(sid.is_valid());
        let account = sid.lookup_account().unwrap();
        assert!(account.name.eq_ignore_ascii_case(&user_name().unwrap()));
    }

    #[test]
    fn test_groups_include_everyone() {
        let world = Sid::from_well_known(WellKnownSid::World).unwrap();
        let groups = read_token().groups().unwrap();
        assert!(groups.iter().any(|g| g.sid == world && g.is_enabled()));
    }

    #[test]
    fn test_thread_token_falls_back_to_process() {
        let token = Token::current_thread(TokenRights::QUERY, true).unwrap();
        assert_eq!(token.token_type().unwrap(), TokenType::Impersonation);
        assert_eq!(
            token.user_sid().unwrap(),
            read_token().user_sid().unwrap()
        );
    }

    #[test]
    fn test_privilege_guard_restores_state() {
        let token = Token::current_process().unwrap();
        // Usually present but disabled for interactive users.
        let name = privilege::SHUTDOWN;
        if !token.has_privilege(name).unwrap() {
            return;
        }
        let before = token.is_privilege_enabled(name).unwrap();
        {
            let guard = PrivilegeGuard::enable(&token, name).unwrap();
            assert_eq!(guard.was_enabled(), before);
            assert!(token.is_privilege_enabled(name).unwrap());
        }
        assert_eq!(token.is_privilege_enabled(name).unwrap(), before);
    }

    #[test]
    fn test_enable_missing_privilege_is_access_denied() {
        let token = Token::current_process().unwrap();
        if token.has_privilege(privilege::CREATE_SYMBOLIC_LINK).unwrap() {
            return;
        }
        assert!(matches!(
            token.enable_privilege(privilege::CREATE_SYMBOLIC_LINK),
            Err(Error::AccessDenied(_))
        ));
    }

    #[test]
    fn test_luid_and_attributes_layout() {
        assert_eq!(size_of::<LUID>(), 8);
        assert_eq!(size_of::<LUID_AND_ATTRIBUTES>(), 12);
    }
}
