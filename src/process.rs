//! Processes, threads, and the process environment.
//!
//! Provides [`Process`] and [`Thread`] handles, a [`Command`] builder that
//! quotes arguments the way `CommandLineToArgvW` parses them, and the
//! environment-variable functions.

use crate::buffer::{buffer_invoke, GrowResult};
use crate::error::{error_for_hresult, error_for_win32, last_error_code, Error, Result};
use crate::fs::filetime_to_system_time;
use crate::handle::OwnedHandle;
use crate::string::{optional_pcwstr, optional_wide, to_wide, WideString};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    SetLastError, ERROR_ENVVAR_NOT_FOUND, FILETIME, HANDLE, NO_ERROR, STILL_ACTIVE, WAIT_FAILED,
    WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Environment::{
    FreeEnvironmentStringsW, GetEnvironmentStringsW, GetEnvironmentVariableW,
    SetEnvironmentVariableW,
};
use windows::Win32::System::ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};
use windows::Win32::System::Threading::{
    CreateProcessW, GetCurrentProcess, GetCurrentProcessId, GetCurrentThread, GetCurrentThreadId,
    GetExitCodeProcess, GetExitCodeThread, GetProcessTimes, GetThreadId, OpenProcess, OpenThread,
    TerminateProcess, WaitForSingleObject, CREATE_NEW_CONSOLE, CREATE_NO_WINDOW,
    CREATE_UNICODE_ENVIRONMENT, INFINITE, PROCESS_ACCESS_RIGHTS, PROCESS_ALL_ACCESS,
    PROCESS_CREATION_FLAGS, PROCESS_INFORMATION, PROCESS_QUERY_INFORMATION,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SYNCHRONIZE, PROCESS_TERMINATE, PROCESS_VM_READ,
    STARTUPINFOW, THREAD_ACCESS_RIGHTS, THREAD_ALL_ACCESS, THREAD_QUERY_INFORMATION,
    THREAD_QUERY_LIMITED_INFORMATION, THREAD_SYNCHRONIZE,
};

// ============================================================================
// Access rights
// ============================================================================

/// Process access rights for [`Process::open`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessAccess(pub PROCESS_ACCESS_RIGHTS);

impl ProcessAccess {
    /// Every right.
    pub const ALL: Self = Self(PROCESS_ALL_ACCESS);

    /// Full query access.
    pub const QUERY: Self = Self(PROCESS_QUERY_INFORMATION);

    /// Query access granted to less privileged callers.
    pub const QUERY_LIMITED: Self = Self(PROCESS_QUERY_LIMITED_INFORMATION);

    /// Permission to terminate.
    pub const TERMINATE: Self = Self(PROCESS_TERMINATE);

    /// Permission to wait on the handle.
    pub const SYNCHRONIZE: Self = Self(PROCESS_SYNCHRONIZE);

    /// Permission to read memory, needed for memory counters on older systems.
    pub const VM_READ: Self = Self(PROCESS_VM_READ);

    /// Query and terminate.
    pub const QUERY_AND_TERMINATE: Self =
        Self(PROCESS_ACCESS_RIGHTS(PROCESS_QUERY_INFORMATION.0 | PROCESS_TERMINATE.0));

    /// Adds rights.
    pub fn with(self, other: Self) -> Self {
        Self(PROCESS_ACCESS_RIGHTS(self.0 .0 | other.0 .0))
    }
}

/// Thread access rights for [`Thread::open`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadAccess(pub THREAD_ACCESS_RIGHTS);

impl ThreadAccess {
    /// Every right.
    pub const ALL: Self = Self(THREAD_ALL_ACCESS);

    /// Full query access.
    pub const QUERY: Self = Self(THREAD_QUERY_INFORMATION);

    /// Limited query access.
    pub const QUERY_LIMITED: Self = Self(THREAD_QUERY_LIMITED_INFORMATION);

    /// Permission to wait on the handle.
    pub const SYNCHRONIZE: Self = Self(THREAD_SYNCHRONIZE);

    /// Adds rights.
    pub fn with(self, other: Self) -> Self {
        Self(THREAD_ACCESS_RIGHTS(self.0 .0 | other.0 .0))
    }
}

// ============================================================================
// Process
// ============================================================================

/// `PROCESS_MEMORY_COUNTERS` projection. Sizes are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryCounters {
    /// Page faults.
    pub page_fault_count: u32,
    /// Peak working set.
    pub peak_working_set_size: usize,
    /// Current working set.
    pub working_set_size: usize,
    /// Peak paged pool usage.
    pub quota_peak_paged_pool_usage: usize,
    /// Paged pool usage.
    pub quota_paged_pool_usage: usize,
    /// Peak non-paged pool usage.
    pub quota_peak_non_paged_pool_usage: usize,
    /// Non-paged pool usage.
    pub quota_non_paged_pool_usage: usize,
    /// Committed private memory.
    pub pagefile_usage: usize,
    /// Peak committed private memory.
    pub peak_pagefile_usage: usize,
}

/// Memory counters for any process handle, including [`current_process`].
pub fn memory_info(process: HANDLE) -> Result<MemoryCounters> {
    let cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
    let mut counters = PROCESS_MEMORY_COUNTERS {
        cb,
        ..Default::default()
    };

    // SAFETY: `counters` is a correctly sized output structure.
    unsafe { GetProcessMemoryInfo(process, &mut counters, cb)? };

    Ok(MemoryCounters {
        page_fault_count: counters.PageFaultCount,
        peak_working_set_size: counters.PeakWorkingSetSize,
        working_set_size: counters.WorkingSetSize,
        quota_peak_paged_pool_usage: counters.QuotaPeakPagedPoolUsage,
        quota_paged_pool_usage: counters.QuotaPagedPoolUsage,
        quota_peak_non_paged_pool_usage: counters.QuotaPeakNonPagedPoolUsage,
        quota_non_paged_pool_usage: counters.QuotaNonPagedPoolUsage,
        pagefile_usage: counters.PagefileUsage,
        peak_pagefile_usage: counters.PeakPagefileUsage,
    })
}

/// Timing information from `GetProcessTimes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTimes {
    /// When the process started.
    pub creation_time: SystemTime,
    /// When the process exited, if it has.
    pub exit_time: Option<SystemTime>,
    /// Time spent in kernel mode.
    pub kernel_time: Duration,
    /// Time spent in user mode.
    pub user_time: Duration,
}

fn filetime_duration(time: FILETIME) -> Duration {
    let ticks = (u64::from(time.dwHighDateTime) << 32) | u64::from(time.dwLowDateTime);
    Duration::from_nanos(ticks.saturating_mul(100))
}

/// A process handle.
pub struct Process {
    handle: OwnedHandle,
    pid: u32,
}

impl Process {
    /// Opens an existing process.
    pub fn open(pid: u32, access: ProcessAccess) -> Result<Self> {
        // SAFETY: The returned handle is owned by the new Process.
        let handle = unsafe { OpenProcess(access.0, false, pid) }
            .map_err(|e| error_for_hresult(e.code(), Some(&format!("process {pid}"))))?;
        Ok(Self {
            handle: OwnedHandle::new(handle)?,
            pid,
        })
    }

    /// The process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The raw process handle.
    pub fn handle(&self) -> HANDLE {
        self.handle.as_raw()
    }

    /// Blocks until the process exits and returns its exit code.
    pub fn wait(&self) -> Result<u32> {
        self.wait_timeout(None)?
            .ok_or_else(|| Error::custom("infinite wait returned early"))
    }

    /// Waits up to `timeout` (forever for `None`). Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Option<Duration>) -> Result<Option<u32>> {
        let timeout_ms = timeout
            .map(|d| d.as_millis().min(u128::from(INFINITE - 1)) as u32)
            .unwrap_or(INFINITE);

        // SAFETY: The handle is open with SYNCHRONIZE access.
        match unsafe { WaitForSingleObject(self.handle.as_raw(), timeout_ms) } {
            WAIT_OBJECT_0 => Ok(Some(self.exit_code()?)),
            WAIT_TIMEOUT => Ok(None),
            WAIT_FAILED => Err(error_for_win32(last_error_code(), None)),
            other => Err(Error::custom(format!("unexpected wait result {}", other.0))),
        }
    }

    /// Returns the exit code if the process has exited, without blocking.
    pub fn try_wait(&self) -> Result<Option<u32>> {
        self.wait_timeout(Some(Duration::ZERO))
    }

    /// The exit code; `STILL_ACTIVE` (259) while running.
    pub fn exit_code(&self) -> Result<u32> {
        let mut exit_code = 0u32;
        // SAFETY: `exit_code` is a valid output location.
        unsafe { GetExitCodeProcess(self.handle.as_raw(), &mut exit_code)? };
        Ok(exit_code)
    }

    /// Terminates the process immediately.
    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        // SAFETY: The handle is open with TERMINATE access.
        unsafe { TerminateProcess(self.handle.as_raw(), exit_code)? };
        Ok(())
    }

    /// Returns true until the process exits.
    pub fn is_running(&self) -> Result<bool> {
        Ok(self.try_wait()?.is_none())
    }

    /// Memory counters for this process.
    pub fn memory_info(&self) -> Result<MemoryCounters> {
        memory_info(self.handle.as_raw())
    }

    /// Creation, exit and CPU times.
    pub fn times(&self) -> Result<ProcessTimes> {
        process_times(self.handle.as_raw())
    }
}

/// Times for any process handle.
pub fn process_times(process: HANDLE) -> Result<ProcessTimes> {
    let mut creation = FILETIME::default();
    let mut exit = FILETIME::default();
    let mut kernel = FILETIME::default();
    let mut user = FILETIME::default();

    // SAFETY: All four are valid output locations.
    unsafe { GetProcessTimes(process, &mut creation, &mut exit, &mut kernel, &mut user)? };

    let exited = exit.dwHighDateTime != 0 || exit.dwLowDateTime != 0;
    Ok(ProcessTimes {
        creation_time: filetime_to_system_time(creation),
        exit_time: exited.then(|| filetime_to_system_time(exit)),
        kernel_time: filetime_duration(kernel),
        user_time: filetime_duration(user),
    })
}

// ============================================================================
// Thread
// ============================================================================

/// A thread handle.
pub struct Thread {
    handle: OwnedHandle,
}

impl Thread {
    /// Opens an existing thread.
    pub fn open(tid: u32, access: ThreadAccess) -> Result<Self> {
        // SAFETY: The returned handle is owned by the new Thread.
        let handle = unsafe { OpenThread(access.0, false, tid) }
            .map_err(|e| error_for_hresult(e.code(), Some(&format!("thread {tid}"))))?;
        Ok(Self {
            handle: OwnedHandle::new(handle)?,
        })
    }

    /// The thread id.
    pub fn id(&self) -> u32 {
        // SAFETY: The handle is open.
        unsafe { GetThreadId(self.handle.as_raw()) }
    }

    /// The exit code; `STILL_ACTIVE` (259) while running.
    pub fn exit_code(&self) -> Result<u32> {
        let mut exit_code = 0u32;
        // SAFETY: `exit_code` is a valid output location.
        unsafe { GetExitCodeThread(self.handle.as_raw(), &mut exit_code)? };
        Ok(exit_code)
    }

    /// Returns true while the thread has not exited.
    pub fn is_running(&self) -> Result<bool> {
        Ok(self.exit_code()? == STILL_ACTIVE.0 as u32)
    }

    /// The raw thread handle.
    pub fn as_raw(&self) -> HANDLE {
        self.handle.as_raw()
    }
}

// ============================================================================
// Command
// ============================================================================

/// Builder for new processes.
pub struct Command {
    program: String,
    args: Vec<String>,
    current_dir: Option<String>,
    creation_flags: PROCESS_CREATION_FLAGS,
    env: Vec<(String, String)>,
    env_clear: bool,
}

impl Command {
    /// A command running `program`, found through the usual search path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            creation_flags: PROCESS_CREATION_FLAGS(0),
            env: Vec::new(),
            env_clear: false,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory of the child.
    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Gives the child its own console.
    pub fn new_console(mut self) -> Self {
        self.creation_flags.0 |= CREATE_NEW_CONSOLE.0;
        self
    }

    /// Runs a console child without a console window.
    pub fn no_window(mut self) -> Self {
        self.creation_flags.0 |= CREATE_NO_WINDOW.0;
        self
    }

    /// Sets a variable in the child's environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Starts the child from an empty environment instead of this process's.
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Starts the process.
    pub fn spawn(&self) -> Result<Process> {
        let mut command_line = to_wide(&self.command_line());
        let current_dir = optional_wide(self.current_dir.as_deref());
        let env_block = self.env_block()?;

        let startup_info = STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOW>() as u32,
            ..Default::default()
        };
        let mut process_info = PROCESS_INFORMATION::default();

        let mut creation_flags = self.creation_flags;
        if env_block.is_some() {
            creation_flags.0 |= CREATE_UNICODE_ENVIRONMENT.0;
        }

        // SAFETY: `command_line` is a mutable null-terminated buffer as
        // CreateProcessW requires; the environment block is double-null
        // terminated; every pointer outlives the call.
        unsafe {
            CreateProcessW(
                PCWSTR::null(),
                PWSTR(command_line.as_mut_ptr()),
                None,
                None,
                false,
                creation_flags,
                env_block.as_ref().map(|block| block.as_ptr().cast()),
                optional_pcwstr(&current_dir),
                &startup_info,
                &mut process_info,
            )
        }
        .map_err(|e| error_for_hresult(e.code(), Some(&self.program)))?;

        // Only the process handle is kept.
        drop(OwnedHandle::new_allow_null(process_info.hThread));

        tracing::debug!(program = %self.program, pid = process_info.dwProcessId, "spawned process");
        Ok(Process {
            handle: OwnedHandle::new(process_info.hProcess)?,
            pid: process_info.dwProcessId,
        })
    }

    /// Starts the process and waits for its exit code.
    pub fn run(&self) -> Result<u32> {
        self.spawn()?.wait()
    }

    /// The full command line passed to `CreateProcessW`.
    pub fn command_line(&self) -> String {
        let capacity =
            self.program.len() + 3 + self.args.iter().map(|a| a.len() * 2 + 3).sum::<usize>();

        let mut line = String::with_capacity(capacity);
        line.push_str(&quote_arg(&self.program));
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote_arg(arg));
        }
        line
    }

    fn env_block(&self) -> Result<Option<Vec<u16>>> {
        if self.env.is_empty() && !self.env_clear {
            return Ok(None);
        }

        let mut vars: Vec<(String, String)> = if self.env_clear {
            Vec::new()
        } else {
            env_vars()?.into_iter().collect()
        };

        for (key, value) in &self.env {
            vars.retain(|(existing, _)| !existing.eq_ignore_ascii_case(key));
            vars.push((key.clone(), value.clone()));
        }

        // Windows expects the block sorted case-insensitively.
        vars.sort_by_key(|(key, _)| key.to_uppercase());

        let mut block = Vec::new();
        for (key, value) in &vars {
            block.extend(key.encode_utf16());
            block.push(u16::from(b'='));
            block.extend(value.encode_utf16());
            block.push(0);
        }
        if vars.is_empty() {
            block.push(0);
        }
        block.push(0);

        Ok(Some(block))
    }
}

/// Quotes an argument so `CommandLineToArgvW` reads it back unchanged.
#[inline]
fn quote_arg(arg: &str) -> Cow<'_, str> {
    let needs_quoting = arg.is_empty() || arg.bytes().any(|b| b == b' ' || b == b'\t' || b == b'"');
    if !needs_quoting {
        return Cow::Borrowed(arg);
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');

    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let mut backslashes = 1;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    backslashes += 1;
                }
                // Backslashes double only before a quote or the closing quote.
                let doubled = matches!(chars.peek(), Some('"') | None);
                let count = if doubled { backslashes * 2 } else { backslashes };
                quoted.extend(std::iter::repeat('\\').take(count));
            }
            '"' => quoted.push_str("\\\""),
            other => quoted.push(other),
        }
    }

    quoted.push('"');
    Cow::Owned(quoted)
}

// ============================================================================
// Current process and thread
// ============================================================================

/// The id of the calling process.
#[inline]
pub fn current_pid() -> u32 {
    // SAFETY: No preconditions.
    unsafe { GetCurrentProcessId() }
}

/// A pseudo-handle for the calling process. It is not closed.
#[inline]
pub fn current_process() -> HANDLE {
    // SAFETY: No preconditions; the pseudo-handle needs no cleanup.
    unsafe { GetCurrentProcess() }
}

/// The id of the calling thread.
#[inline]
pub fn current_thread_id() -> u32 {
    // SAFETY: No preconditions.
    unsafe { GetCurrentThreadId() }
}

/// A pseudo-handle for the calling thread. It is not closed.
#[inline]
pub fn current_thread() -> HANDLE {
    // SAFETY: No preconditions; the pseudo-handle needs no cleanup.
    unsafe { GetCurrentThread() }
}

// ============================================================================
// Environment
// ============================================================================

fn check_env_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') || name.chars().skip(1).any(|c| c == '=') {
        return Err(Error::invalid_argument(format!(
            "invalid environment variable name '{name}'"
        )));
    }
    Ok(())
}

/// Reads a variable. A missing variable is `Ok(None)`.
pub fn env_var(name: &str) -> Result<Option<String>> {
    check_env_name(name)?;
    let name_wide = WideString::new(name);

    buffer_invoke(|buffer| {
        let capacity = buffer.char_capacity();
        // SAFETY: SetLastError only writes thread-local state.
        unsafe { SetLastError(NO_ERROR) };
        // SAFETY: The slice is writable for its full length.
        let len = unsafe { GetEnvironmentVariableW(name_wide.as_pcwstr(), Some(buffer.as_mut_slice())) }
            as usize;

        if len == 0 {
            return match last_error_code() {
                NO_ERROR => Ok(GrowResult::Done(Some(String::new()))),
                ERROR_ENVVAR_NOT_FOUND => Ok(GrowResult::Done(None)),
                code => Err(error_for_win32(code, Some(name))),
            };
        }
        if len >= capacity {
            return Ok(GrowResult::Grow(len));
        }

        buffer.set_len(len)?;
        Ok(GrowResult::Done(Some(buffer.to_string_lossy())))
    })
}

/// Sets a variable for this process (and children spawned afterwards).
pub fn set_env_var(name: &str, value: &str) -> Result<()> {
    check_env_name(name)?;
    let name_wide = WideString::new(name);
    let value_wide = WideString::new(value);
    // SAFETY: Both strings outlive the call.
    unsafe { SetEnvironmentVariableW(name_wide.as_pcwstr(), value_wide.as_pcwstr())? };
    Ok(())
}

/// Removes a variable. Removing a missing variable succeeds.
pub fn remove_env_var(name: &str) -> Result<()> {
    check_env_name(name)?;
    let name_wide = WideString::new(name);
    // SAFETY: A null value deletes the variable.
    match unsafe { SetEnvironmentVariableW(name_wide.as_pcwstr(), PCWSTR::null()) } {
        Ok(()) => Ok(()),
        Err(e) if e.code() == ERROR_ENVVAR_NOT_FOUND.to_hresult() => Ok(()),
        Err(e) => Err(error_for_hresult(e.code(), Some(name))),
    }
}

/// Every variable of this process.
///
/// Per-drive entries such as `=C:` keep their leading `=` in the name.
pub fn env_vars() -> Result<HashMap<String, String>> {
    // SAFETY: The block stays valid until FreeEnvironmentStringsW.
    let block = unsafe { GetEnvironmentStringsW() };
    if block.is_null() {
        return Err(error_for_win32(last_error_code(), Some("GetEnvironmentStringsW")));
    }

    // SAFETY: The block ends with an empty string (two consecutive nulls).
    let units = unsafe {
        let mut len = 0;
        while *block.0.add(len) != 0 || *block.0.add(len + 1) != 0 {
            len += 1;
        }
        std::slice::from_raw_parts(block.0, len + 1)
    };
    let vars = parse_environment_block(units).into_iter().collect();

    // SAFETY: `block` came from GetEnvironmentStringsW and is freed once.
    if let Err(error) = unsafe { FreeEnvironmentStringsW(PCWSTR(block.0)) } {
        tracing::warn!(%error, "FreeEnvironmentStringsW failed");
    }

    Ok(vars)
}

/// Splits a `NAME=value\0NAME=value\0\0` block into pairs.
///
/// The name ends at the first `=` after its first character, so `=C:=C:\`
/// yields (`=C:`, `C:\`). Entries without a separator are skipped.
pub fn parse_environment_block(block: &[u16]) -> Vec<(String, String)> {
    block
        .split(|&c| c == 0)
        .take_while(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let separator = entry.iter().skip(1).position(|&c| c == u16::from(b'='))? + 1;
            Some((
                String::from_utf16_lossy(&entry[..separator]),
                String::from_utf16_lossy(&entry[separator + 1..]),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("WINTEROP_TEST_{tag}_{}", current_thread_id())
    }

    #[test]
    fn test_quote_arg() {
        assert_eq!(quote_arg("simple"), "simple");
        assert_eq!(quote_arg("with space"), "\"with space\"");
        assert_eq!(quote_arg(""), "\"\"");
    }

    #[test]
    fn test_quote_arg_edge_cases() {
        assert_eq!(quote_arg("a\tb"), "\"a\tb\"");
        assert_eq!(quote_arg("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_arg("a\\\"b"), "\"a\\\\\\\"b\"");
        assert_eq!(quote_arg("path\\"), "path\\");
        assert_eq!(quote_arg("path with space\\"), "\"path with space\\\\\"");
        assert_eq!(quote_arg("dir\\sub file"), "\"dir\\sub file\"");
    }

    #[test]
    fn test_command_line() {
        let cmd = Command::new("program.exe")
            .arg("arg1")
            .arg("arg with space")
            .arg("arg\"quote");
        assert_eq!(
            cmd.command_line(),
            "program.exe arg1 \"arg with space\" \"arg\\\"quote\""
        );
    }

    #[test]
    fn test_current_ids() {
        assert_eq!(current_pid(), std::process::id());
        assert!(current_thread_id() > 0);
    }

    #[test]
    fn test_spawn_exit_code() {
        let exit_code = Command::new("cmd.exe")
            .args(["/c", "exit 42"])
            .no_window()
            .run()
            .unwrap();
        assert_eq!(exit_code, 42);
    }

    #[test]
    fn test_spawn_missing_program() {
        let result = Command::new("this_program_does_not_exist_12345.exe").spawn();
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_spawn_with_env_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let exit_code = Command::new("cmd.exe")
            .args(["/c", "exit %WINTEROP_CHILD%"])
            .env("WINTEROP_CHILD", "7")
            .current_dir(dir.path().to_string_lossy())
            .no_window()
            .run()
            .unwrap();
        assert_eq!(exit_code, 7);
    }

    #[test]
    fn test_wait_timeout_and_terminate() {
        let process = Command::new("cmd.exe")
            .args(["/c", "ping -n 30 127.0.0.1 > nul"])
            .no_window()
            .spawn()
            .unwrap();

        assert_eq!(process.wait_timeout(Some(Duration::from_millis(50))).unwrap(), None);
        assert!(process.is_running().unwrap());
        assert_eq!(process.exit_code().unwrap(), STILL_ACTIVE.0 as u32);

        process.terminate(99).unwrap();
        assert_eq!(process.wait().unwrap(), 99);
        assert!(!process.is_running().unwrap());

        let times = process.times().unwrap();
        assert!(times.exit_time.is_some());
    }

    #[test]
    fn test_open_process() {
        let process = Process::open(current_pid(), ProcessAccess::QUERY_LIMITED).unwrap();
        assert_eq!(process.pid(), current_pid());
        assert!(process.times().unwrap().exit_time.is_none());
        assert!(Process::open(0xFFFF_FFF0, ProcessAccess::QUERY).is_err());
    }

    #[test]
    fn test_memory_info() {
        let counters = memory_info(current_process()).unwrap();
        assert!(counters.working_set_size > 0);
        assert!(counters.peak_working_set_size >= counters.working_set_size);
    }

    #[test]
    fn test_open_thread() {
        let tid = current_thread_id();
        let thread = Thread::open(tid, ThreadAccess::QUERY_LIMITED).unwrap();
        assert_eq!(thread.id(), tid);
        assert!(thread.is_running().unwrap());
    }

    #[test]
    fn test_env_var_round_trip() {
        let name = unique_name("ROUND_TRIP");
        assert_eq!(env_var(&name).unwrap(), None);

        set_env_var(&name, "value").unwrap();
        assert_eq!(env_var(&name).unwrap().as_deref(), Some("value"));

        let long = "x".repeat(5000);
        set_env_var(&name, &long).unwrap();
        assert_eq!(env_var(&name).unwrap(), Some(long));

        assert_eq!(env_vars().unwrap().get(&name).map(String::len), Some(5000));

        remove_env_var(&name).unwrap();
        assert_eq!(env_var(&name).unwrap(), None);
        remove_env_var(&name).unwrap();
    }

    #[test]
    fn test_env_var_invalid_names() {
        assert!(matches!(env_var(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(set_env_var("A=B", "x"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_environment_block() {
        let block: Vec<u16> = "=C:=C:\\dir\0PATH=a;b\0EMPTY=\0NOSEP\0\0".encode_utf16().collect();
        let vars = parse_environment_block(&block);
        assert_eq!(
            vars,
            [
                ("=C:".to_string(), "C:\\dir".to_string()),
                ("PATH".to_string(), "a;b".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
        assert!(parse_environment_block(&[0, 0]).is_empty());
    }
}
