//! # winterop
//!
//! Safe Rust bindings for native Windows APIs.
//!
//! Each module wraps one area of the platform and hides the FFI details:
//! native handles become owning types that release on drop, buffer-sizing
//! protocols are handled internally, and native error codes become
//! [`Error`](error::Error).
//!
//! - **Support**: [`error`], [`handle`], [`string`], [`buffer`]
//! - **Authorization**: access tokens, privileges, elevation
//! - **Security**: SIDs, account lookup, file ownership
//! - **GDI**: device contexts, drawing objects, display settings
//! - **Windows**: window classes, message handling, subclassing
//! - **COM**: apartments, `VARIANT`, structured storage
//! - **DXGI**: adapters, outputs, display modes
//! - **File management**, **processes and threads**, **modules**
//!
//! ## Quick Start
//!
//! ```no_run
//! use winterop::authorization::Token;
//! use winterop::fs::FindFiles;
//! use winterop::process::Command;
//!
//! let token = Token::current_process()?;
//! println!("running as {}, elevated: {}", token.user_sid()?, token.is_elevated()?);
//!
//! for entry in FindFiles::in_directory(r"C:\Windows")? {
//!     println!("{}", entry?.file_name);
//! }
//!
//! let exit_code = Command::new("cmd.exe").args(["/c", "exit 3"]).no_window().run()?;
//! assert_eq!(exit_code, 3);
//! # Ok::<(), winterop::error::Error>(())
//! ```
//!
//! ## Structured storage
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use winterop::com::{ComApartment, ComInitializer, StorageMode, StructuredStorage};
//!
//! let _com = ComInitializer::new(ComApartment::SingleThreaded)?;
//! let mode = StorageMode::READ_WRITE.with(StorageMode::SHARE_EXCLUSIVE);
//!
//! let storage = StructuredStorage::create("doc.stg", mode.with(StorageMode::CREATE))?;
//! storage.create_stream("contents", mode)?.write_all(b"hello")?;
//!
//! let mut text = String::new();
//! storage.open_stream("contents", mode)?.read_to_string(&mut text)?;
//! # Ok::<(), winterop::error::Error>(())
//! ```
//!
//! ## Windows
//!
//! ```no_run
//! use winterop::window::{
//!     run_message_loop, DefaultHandler, ShowCommand, WindowBuilder, WindowClass,
//! };
//!
//! let class = WindowClass::new().register()?;
//! let window = WindowBuilder::new(&class)
//!     .title("winterop")
//!     .main_window(true)
//!     .build(DefaultHandler)?;
//! window.show(ShowCommand::SHOW_NORMAL);
//! run_message_loop()?;
//! # Ok::<(), winterop::error::Error>(())
//! ```

#![cfg(windows)]
#![warn(missing_docs)]

// Support
pub mod buffer;
pub mod error;
pub mod handle;
pub mod string;

// Bindings
pub mod authorization;
pub mod com;
pub mod dxgi;
pub mod fs;
pub mod gdi;
pub mod module;
pub mod process;
pub mod security;
pub mod window;

/// Common imports.
pub mod prelude {
    pub use crate::authorization::{is_elevated, PrivilegeGuard, Token, TokenRights};
    pub use crate::com::{ComApartment, ComInitializer, StructuredStorage, Variant};
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::fs::{exists, is_dir, is_file, FileAttributes, FindFiles, OpenOptions};
    pub use crate::handle::{BorrowedHandle, HandleExt, OwnedHandle};
    pub use crate::module::{Library, ModuleInstance};
    pub use crate::process::{current_pid, env_var, Command, Process, ProcessAccess};
    pub use crate::security::{Sid, WellKnownSid};
    pub use crate::string::{from_wide, to_wide, WideString};
    pub use crate::window::{
        ExStyle, Message, MessageHandler, ShowCommand, Style, Window, WindowBuilder, WindowClass,
    };
}
