//! Window classes, windows, and message handling.
//!
//! Provides a [`WindowClass`] builder whose registration is undone on drop,
//! windows that dispatch messages to a Rust [`MessageHandler`], subclassing of
//! existing windows, the message loop, and a few user-interface utilities.

use crate::error::{error_for_hresult, error_for_win32, last_error, last_error_code, Error, NativeOk, Result};
use crate::gdi::Color;
use crate::module::ModuleInstance;
use crate::string::{optional_wide, WideString};
use std::cell::{Ref, RefCell, RefMut};
use std::ffi::c_void;
use std::mem::size_of;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    SetLastError, HANDLE, HMODULE, HWND, LPARAM, LRESULT, NO_ERROR, RECT, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    GetMonitorInfoW, GetSysColor, MonitorFromWindow, COLOR_3DFACE, COLOR_ACTIVECAPTION,
    COLOR_BTNTEXT, COLOR_DESKTOP, COLOR_GRAYTEXT, COLOR_HIGHLIGHT, COLOR_HIGHLIGHTTEXT,
    COLOR_WINDOW, COLOR_WINDOWFRAME, COLOR_WINDOWTEXT, HBRUSH, MONITORINFO, MONITORINFOEXW,
    MONITOR_DEFAULTTONEAREST, SYS_COLOR_INDEX,
};
use windows::Win32::UI::Input::KeyboardAndMouse::SetFocus;
use windows::Win32::UI::WindowsAndMessaging::{
    CallWindowProcW, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    GetClassInfoExW, GetClassNameW, GetClientRect, GetDesktopWindow, GetForegroundWindow,
    GetMessageW, GetParent, GetPropW, GetSystemMetrics, GetWindowLongPtrW,
    GetWindowRect, GetWindowTextLengthW, GetWindowTextW, IsWindow, IsWindowVisible, KillTimer,
    LoadCursorW, LoadIconW, MessageBoxW, MoveWindow, PeekMessageW, PostMessageW,
    PostQuitMessage, RegisterClassExW, RemovePropW, SendMessageW, SetPropW, SetTimer,
    SetWindowLongPtrW, SetWindowTextW, ShowWindow, TranslateMessage, UnregisterClassW,
    CREATESTRUCTW, CS_CLASSDC, CS_DBLCLKS, CS_DROPSHADOW, CS_GLOBALCLASS, CS_HREDRAW,
    CS_NOCLOSE, CS_OWNDC, CS_PARENTDC, CS_SAVEBITS, CS_VREDRAW, CW_USEDEFAULT, GWLP_HINSTANCE,
    GWLP_ID, GWLP_USERDATA, GWLP_WNDPROC, GWL_EXSTYLE, GWL_STYLE, HCURSOR, HICON, HMENU,
    IDABORT, IDCANCEL, IDC_APPSTARTING, IDC_ARROW, IDC_CROSS, IDC_HAND, IDC_IBEAM, IDC_NO,
    IDC_SIZEALL, IDC_SIZENESW, IDC_SIZENS, IDC_SIZENWSE, IDC_SIZEWE, IDC_WAIT, IDIGNORE,
    IDI_APPLICATION, IDI_ERROR, IDI_INFORMATION, IDI_QUESTION, IDI_SHIELD, IDI_WARNING,
    IDI_WINLOGO, IDNO, IDOK, IDRETRY, IDYES, MB_ABORTRETRYIGNORE, MB_ICONERROR,
    MB_ICONINFORMATION, MB_ICONQUESTION, MB_ICONWARNING, MB_OK, MB_OKCANCEL, MB_RETRYCANCEL,
    MB_TOPMOST, MB_YESNO, MB_YESNOCANCEL, MESSAGEBOX_STYLE, MSG, PM_REMOVE, SHOW_WINDOW_CMD,
    SM_CMONITORS, SM_CMOUSEBUTTONS, SM_CXBORDER, SM_CXCURSOR, SM_CXICON, SM_CXSCREEN,
    SM_CXSMICON, SM_CXVIRTUALSCREEN, SM_CYCAPTION, SM_CYMENU, SM_CYSCREEN, SM_CYVIRTUALSCREEN,
    SM_REMOTESESSION, SW_HIDE, SW_MAXIMIZE, SW_MINIMIZE, SW_RESTORE, SW_SHOW, SW_SHOWDEFAULT,
    SW_SHOWNA, SW_SHOWNORMAL, SYSTEM_METRICS_INDEX, WINDOW_EX_STYLE,
    WINDOW_LONG_PTR_INDEX, WINDOW_STYLE, WM_CLOSE, WM_CREATE, WM_DESTROY, WM_NCCREATE,
    WM_NCDESTROY, WM_QUIT, WM_USER, WNDCLASSEXW, WNDCLASS_STYLES, WNDPROC, WS_BORDER,
    WS_CAPTION, WS_CHILD, WS_CLIPCHILDREN, WS_CLIPSIBLINGS, WS_DISABLED, WS_EX_APPWINDOW,
    WS_EX_CLIENTEDGE, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_MAXIMIZEBOX, WS_MINIMIZEBOX, WS_OVERLAPPED, WS_OVERLAPPEDWINDOW, WS_POPUP, WS_SYSMENU,
    WS_THICKFRAME, WS_VISIBLE,
};

// ============================================================================
// Styles and identifiers
// ============================================================================

/// Window class styles (`CS_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassStyle(pub WNDCLASS_STYLES);

impl ClassStyle {
    /// No class styles.
    pub const NONE: Self = Self(WNDCLASS_STYLES(0));
    /// Redraw when the width changes.
    pub const HREDRAW: Self = Self(CS_HREDRAW);
    /// Redraw when the height changes.
    pub const VREDRAW: Self = Self(CS_VREDRAW);
    /// Deliver double-click messages.
    pub const DBLCLKS: Self = Self(CS_DBLCLKS);
    /// A private DC per window.
    pub const OWNDC: Self = Self(CS_OWNDC);
    /// One DC shared by all windows of the class.
    pub const CLASSDC: Self = Self(CS_CLASSDC);
    /// Clip to the parent.
    pub const PARENTDC: Self = Self(CS_PARENTDC);
    /// Disable Close on the window menu.
    pub const NOCLOSE: Self = Self(CS_NOCLOSE);
    /// Save obscured pixels as a bitmap.
    pub const SAVEBITS: Self = Self(CS_SAVEBITS);
    /// Drop shadow.
    pub const DROPSHADOW: Self = Self(CS_DROPSHADOW);
    /// Application-global class.
    pub const GLOBALCLASS: Self = Self(CS_GLOBALCLASS);

    /// Combines two styles.
    pub fn with(self, other: Self) -> Self {
        Self(WNDCLASS_STYLES(self.0 .0 | other.0 .0))
    }

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 .0 & other.0 .0 == other.0 .0
    }
}

/// Window styles for creating windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Style(pub WINDOW_STYLE);

impl Style {
    /// A standard overlapped window with title bar, border, and system menu.
    pub const OVERLAPPED_WINDOW: Self = Self(WS_OVERLAPPEDWINDOW);
    /// A bare overlapped window.
    pub const OVERLAPPED: Self = Self(WS_OVERLAPPED);
    /// A pop-up window.
    pub const POPUP: Self = Self(WS_POPUP);
    /// A child window; requires a parent.
    pub const CHILD: Self = Self(WS_CHILD);
    /// A window with a caption.
    pub const CAPTION: Self = Self(WS_CAPTION);
    /// A window with a system menu.
    pub const SYSMENU: Self = Self(WS_SYSMENU);
    /// A visible window.
    pub const VISIBLE: Self = Self(WS_VISIBLE);
    /// A thin border.
    pub const BORDER: Self = Self(WS_BORDER);
    /// A sizing border.
    pub const THICKFRAME: Self = Self(WS_THICKFRAME);
    /// A minimize button.
    pub const MINIMIZEBOX: Self = Self(WS_MINIMIZEBOX);
    /// A maximize button.
    pub const MAXIMIZEBOX: Self = Self(WS_MAXIMIZEBOX);
    /// Exclude child areas when drawing the parent.
    pub const CLIPCHILDREN: Self = Self(WS_CLIPCHILDREN);
    /// Clip siblings against each other.
    pub const CLIPSIBLINGS: Self = Self(WS_CLIPSIBLINGS);
    /// Initially disabled.
    pub const DISABLED: Self = Self(WS_DISABLED);

    /// Combines two styles.
    pub fn with(self, other: Self) -> Self {
        Self(WINDOW_STYLE(self.0 .0 | other.0 .0))
    }
}

/// Extended window styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExStyle(pub WINDOW_EX_STYLE);

impl ExStyle {
    /// No extended styles.
    pub const NONE: Self = Self(WINDOW_EX_STYLE(0));
    /// A tool window; not shown in the taskbar.
    pub const TOOLWINDOW: Self = Self(WS_EX_TOOLWINDOW);
    /// Above all non-topmost windows.
    pub const TOPMOST: Self = Self(WS_EX_TOPMOST);
    /// Forces a taskbar button.
    pub const APPWINDOW: Self = Self(WS_EX_APPWINDOW);
    /// A sunken edge.
    pub const CLIENTEDGE: Self = Self(WS_EX_CLIENTEDGE);
    /// A layered window.
    pub const LAYERED: Self = Self(WS_EX_LAYERED);
    /// Never activated by clicks.
    pub const NOACTIVATE: Self = Self(WS_EX_NOACTIVATE);

    /// Combines two extended styles.
    pub fn with(self, other: Self) -> Self {
        Self(WINDOW_EX_STYLE(self.0 .0 | other.0 .0))
    }
}

/// Show window commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShowCommand(pub SHOW_WINDOW_CMD);

impl ShowCommand {
    /// Hides the window.
    pub const HIDE: Self = Self(SW_HIDE);
    /// Shows and activates the window.
    pub const SHOW: Self = Self(SW_SHOW);
    /// Shows the window in its normal size and position.
    pub const SHOW_NORMAL: Self = Self(SW_SHOWNORMAL);
    /// Shows the window in its default state.
    pub const DEFAULT: Self = Self(SW_SHOWDEFAULT);
    /// Shows the window without activating it.
    pub const SHOW_NO_ACTIVATE: Self = Self(SW_SHOWNA);
    /// Minimizes the window.
    pub const MINIMIZE: Self = Self(SW_MINIMIZE);
    /// Maximizes the window.
    pub const MAXIMIZE: Self = Self(SW_MAXIMIZE);
    /// Restores a minimized or maximized window.
    pub const RESTORE: Self = Self(SW_RESTORE);
}

/// System colors for [`system_color`] and class backgrounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemColor {
    /// Window background.
    Window,
    /// Window text.
    WindowText,
    /// Window frame.
    WindowFrame,
    /// Face of three-dimensional elements.
    ButtonFace,
    /// Button text.
    ButtonText,
    /// Selected item background.
    Highlight,
    /// Selected item text.
    HighlightText,
    /// Disabled text.
    GrayText,
    /// Active window caption.
    ActiveCaption,
    /// Desktop background.
    Desktop,
}

impl SystemColor {
    fn to_native(self) -> SYS_COLOR_INDEX {
        match self {
            SystemColor::Window => COLOR_WINDOW,
            SystemColor::WindowText => COLOR_WINDOWTEXT,
            SystemColor::WindowFrame => COLOR_WINDOWFRAME,
            SystemColor::ButtonFace => COLOR_3DFACE,
            SystemColor::ButtonText => COLOR_BTNTEXT,
            SystemColor::Highlight => COLOR_HIGHLIGHT,
            SystemColor::HighlightText => COLOR_HIGHLIGHTTEXT,
            SystemColor::GrayText => COLOR_GRAYTEXT,
            SystemColor::ActiveCaption => COLOR_ACTIVECAPTION,
            SystemColor::Desktop => COLOR_DESKTOP,
        }
    }

    /// The `COLOR_* + 1` pseudo-brush accepted as a class background.
    fn class_brush(self) -> HBRUSH {
        HBRUSH((self.to_native().0 as usize + 1) as *mut c_void)
    }
}

/// Indices for [`system_metric`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemMetric {
    /// Primary screen width.
    ScreenWidth,
    /// Primary screen height.
    ScreenHeight,
    /// Width of the bounding rectangle of all monitors.
    VirtualScreenWidth,
    /// Height of the bounding rectangle of all monitors.
    VirtualScreenHeight,
    /// Number of display monitors.
    MonitorCount,
    /// Number of mouse buttons (zero without a mouse).
    MouseButtons,
    /// Caption height.
    CaptionHeight,
    /// Single-line menu bar height.
    MenuHeight,
    /// Window border width.
    BorderWidth,
    /// Large icon width.
    IconWidth,
    /// Small icon width.
    SmallIconWidth,
    /// Cursor width.
    CursorWidth,
    /// Non-zero in a remote session.
    RemoteSession,
}

impl SystemMetric {
    fn to_native(self) -> SYSTEM_METRICS_INDEX {
        match self {
            SystemMetric::ScreenWidth => SM_CXSCREEN,
            SystemMetric::ScreenHeight => SM_CYSCREEN,
            SystemMetric::VirtualScreenWidth => SM_CXVIRTUALSCREEN,
            SystemMetric::VirtualScreenHeight => SM_CYVIRTUALSCREEN,
            SystemMetric::MonitorCount => SM_CMONITORS,
            SystemMetric::MouseButtons => SM_CMOUSEBUTTONS,
            SystemMetric::CaptionHeight => SM_CYCAPTION,
            SystemMetric::MenuHeight => SM_CYMENU,
            SystemMetric::BorderWidth => SM_CXBORDER,
            SystemMetric::IconWidth => SM_CXICON,
            SystemMetric::SmallIconWidth => SM_CXSMICON,
            SystemMetric::CursorWidth => SM_CXCURSOR,
            SystemMetric::RemoteSession => SM_REMOTESESSION,
        }
    }
}

/// System cursors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorId {
    /// Standard arrow.
    Arrow,
    /// Text I-beam.
    IBeam,
    /// Hourglass.
    Wait,
    /// Arrow with hourglass.
    AppStarting,
    /// Crosshair.
    Cross,
    /// Hand.
    Hand,
    /// Slashed circle.
    No,
    /// Four-way arrow.
    SizeAll,
    /// Diagonal resize, north-west to south-east.
    SizeNwse,
    /// Diagonal resize, north-east to south-west.
    SizeNesw,
    /// Horizontal resize.
    SizeWe,
    /// Vertical resize.
    SizeNs,
}

impl CursorId {
    fn to_native(self) -> PCWSTR {
        match self {
            CursorId::Arrow => IDC_ARROW,
            CursorId::IBeam => IDC_IBEAM,
            CursorId::Wait => IDC_WAIT,
            CursorId::AppStarting => IDC_APPSTARTING,
            CursorId::Cross => IDC_CROSS,
            CursorId::Hand => IDC_HAND,
            CursorId::No => IDC_NO,
            CursorId::SizeAll => IDC_SIZEALL,
            CursorId::SizeNwse => IDC_SIZENWSE,
            CursorId::SizeNesw => IDC_SIZENESW,
            CursorId::SizeWe => IDC_SIZEWE,
            CursorId::SizeNs => IDC_SIZENS,
        }
    }

    /// Loads the shared system cursor.
    pub fn load(self) -> Result<HCURSOR> {
        // SAFETY: A null instance selects the system cursors.
        Ok(unsafe { LoadCursorW(None, self.to_native())? })
    }
}

/// System icons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconId {
    /// Default application icon.
    Application,
    /// Error (hand) icon.
    Error,
    /// Question mark.
    Question,
    /// Exclamation mark.
    Warning,
    /// Information (asterisk).
    Information,
    /// Windows logo.
    WinLogo,
    /// Security shield.
    Shield,
}

impl IconId {
    fn to_native(self) -> PCWSTR {
        match self {
            IconId::Application => IDI_APPLICATION,
            IconId::Error => IDI_ERROR,
            IconId::Question => IDI_QUESTION,
            IconId::Warning => IDI_WARNING,
            IconId::Information => IDI_INFORMATION,
            IconId::WinLogo => IDI_WINLOGO,
            IconId::Shield => IDI_SHIELD,
        }
    }

    /// Loads the shared system icon.
    pub fn load(self) -> Result<HICON> {
        // SAFETY: A null instance selects the system icons.
        Ok(unsafe { LoadIconW(None, self.to_native())? })
    }
}

/// Buttons and icon for [`message_box`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageBoxKind(pub MESSAGEBOX_STYLE);

impl MessageBoxKind {
    /// OK.
    pub const OK: Self = Self(MB_OK);
    /// OK and Cancel.
    pub const OK_CANCEL: Self = Self(MB_OKCANCEL);
    /// Yes and No.
    pub const YES_NO: Self = Self(MB_YESNO);
    /// Yes, No and Cancel.
    pub const YES_NO_CANCEL: Self = Self(MB_YESNOCANCEL);
    /// Retry and Cancel.
    pub const RETRY_CANCEL: Self = Self(MB_RETRYCANCEL);
    /// Abort, Retry and Ignore.
    pub const ABORT_RETRY_IGNORE: Self = Self(MB_ABORTRETRYIGNORE);
    /// Error icon.
    pub const ICON_ERROR: Self = Self(MB_ICONERROR);
    /// Warning icon.
    pub const ICON_WARNING: Self = Self(MB_ICONWARNING);
    /// Information icon.
    pub const ICON_INFORMATION: Self = Self(MB_ICONINFORMATION);
    /// Question icon.
    pub const ICON_QUESTION: Self = Self(MB_ICONQUESTION);
    /// Topmost.
    pub const TOPMOST: Self = Self(MB_TOPMOST);

    /// Combines two kinds.
    pub fn with(self, other: Self) -> Self {
        Self(MESSAGEBOX_STYLE(self.0 .0 | other.0 .0))
    }
}

/// The button that closed a message box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageBoxResult {
    /// OK.
    Ok,
    /// Cancel, or the box was closed.
    Cancel,
    /// Yes.
    Yes,
    /// No.
    No,
    /// Abort.
    Abort,
    /// Retry.
    Retry,
    /// Ignore.
    Ignore,
    /// Any other `ID*` value.
    Other(i32),
}

/// Window data slots for [`WindowHandle::get_long`] and
/// [`WindowHandle::set_long`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowLong {
    /// The window procedure.
    WndProc,
    /// The owning module.
    Instance,
    /// The child-window identifier.
    Id,
    /// The style bits.
    Style,
    /// The extended style bits.
    ExStyle,
    /// Application data; used by this module for [`Window`] handlers.
    UserData,
    /// A byte offset into the class's window extra bytes.
    Extra(i32),
}

impl WindowLong {
    fn to_native(self) -> WINDOW_LONG_PTR_INDEX {
        match self {
            WindowLong::WndProc => GWLP_WNDPROC,
            WindowLong::Instance => GWLP_HINSTANCE,
            WindowLong::Id => GWLP_ID,
            WindowLong::Style => GWL_STYLE,
            WindowLong::ExStyle => GWL_EXSTYLE,
            WindowLong::UserData => GWLP_USERDATA,
            WindowLong::Extra(offset) => WINDOW_LONG_PTR_INDEX(offset),
        }
    }
}

/// A Windows message.
#[derive(Clone, Copy, Debug)]
pub struct Message {
    /// The target window.
    pub window: WindowHandle,
    /// The message identifier.
    pub msg: u32,
    /// Additional message information.
    pub wparam: WPARAM,
    /// Additional message information.
    pub lparam: LPARAM,
}

impl Message {
    /// WM_CREATE message.
    pub const CREATE: u32 = WM_CREATE;
    /// WM_DESTROY message.
    pub const DESTROY: u32 = WM_DESTROY;
    /// WM_CLOSE message.
    pub const CLOSE: u32 = WM_CLOSE;
    /// First private message identifier.
    pub const USER: u32 = WM_USER;
}

// ============================================================================
// Window classes
// ============================================================================

/// Class background brush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Background {
    /// A system color.
    System(SystemColor),
    /// A caller-owned brush that must outlive the class.
    Brush(HBRUSH),
    /// No background; the application erases in `WM_ERASEBKGND` or `WM_PAINT`.
    None,
}

static CLASS_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn generated_class_name() -> String {
    let serial = CLASS_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("winterop.{}.{}", std::process::id(), serial)
}

/// Builder for registering window classes.
///
/// Defaults: a generated unique name, the current module, `HREDRAW | VREDRAW`,
/// the system window color, the application icon, and the arrow cursor.
#[derive(Clone, Debug)]
pub struct WindowClass {
    name: Option<String>,
    instance: Option<ModuleInstance>,
    style: ClassStyle,
    background: Background,
    icon: Option<IconId>,
    small_icon: Option<IconId>,
    cursor: Option<CursorId>,
    menu_name: Option<String>,
    menu_id: Option<u16>,
    class_extra: i32,
    window_extra: i32,
}

impl Default for WindowClass {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowClass {
    /// Creates a builder with the defaults above.
    pub fn new() -> Self {
        Self {
            name: None,
            instance: None,
            style: ClassStyle::HREDRAW.with(ClassStyle::VREDRAW),
            background: Background::System(SystemColor::Window),
            icon: Some(IconId::Application),
            small_icon: None,
            cursor: Some(CursorId::Arrow),
            menu_name: None,
            menu_id: None,
            class_extra: 0,
            window_extra: 0,
        }
    }

    /// Sets the class name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the owning module.
    pub fn instance(mut self, instance: ModuleInstance) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Sets the class style.
    pub fn style(mut self, style: ClassStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the background brush.
    pub fn background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Sets the large icon; `None` registers no icon.
    pub fn icon(mut self, icon: Option<IconId>) -> Self {
        self.icon = icon;
        self
    }

    /// Sets the small icon; `None` lets the system derive one.
    pub fn small_icon(mut self, icon: Option<IconId>) -> Self {
        self.small_icon = icon;
        self
    }

    /// Sets the cursor; `None` leaves cursor handling to the application.
    pub fn cursor(mut self, cursor: Option<CursorId>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Names a menu resource. Mutually exclusive with [`menu_id`](Self::menu_id).
    pub fn menu_name(mut self, name: impl Into<String>) -> Self {
        self.menu_name = Some(name.into());
        self
    }

    /// Identifies a menu resource by integer id.
    pub fn menu_id(mut self, id: u16) -> Self {
        self.menu_id = Some(id);
        self
    }

    /// Extra bytes allocated after the class structure.
    pub fn class_extra(mut self, bytes: i32) -> Self {
        self.class_extra = bytes;
        self
    }

    /// Extra bytes allocated after each window instance.
    pub fn window_extra(mut self, bytes: i32) -> Self {
        self.window_extra = bytes;
        self
    }

    /// Registers the class. Windows created from it dispatch to a
    /// [`MessageHandler`] when built through [`WindowBuilder`].
    pub fn register(self) -> Result<RegisteredClass> {
        if self.menu_name.is_some() && self.menu_id.is_some() {
            return Err(Error::invalid_argument(
                "a window class takes a menu name or a menu id, not both",
            ));
        }

        let name = self.name.unwrap_or_else(generated_class_name);
        let name_wide = WideString::new(&name);
        let instance = match self.instance {
            Some(instance) => instance,
            None => ModuleInstance::current()?,
        };

        let menu_name_wide = optional_wide(self.menu_name.as_deref());
        let menu = match (&menu_name_wide, self.menu_id) {
            (Some(wide), _) => wide.as_pcwstr(),
            // MAKEINTRESOURCEW
            (None, Some(id)) => PCWSTR(id as usize as *const u16),
            (None, None) => PCWSTR::null(),
        };

        let background = match self.background {
            Background::System(color) => color.class_brush(),
            Background::Brush(brush) => brush,
            Background::None => HBRUSH::default(),
        };

        let wc = WNDCLASSEXW {
            cbSize: size_of::<WNDCLASSEXW>() as u32,
            style: self.style.0,
            lpfnWndProc: Some(window_proc),
            cbClsExtra: self.class_extra,
            cbWndExtra: self.window_extra,
            hInstance: instance.as_instance(),
            hIcon: self.icon.map(IconId::load).transpose()?.unwrap_or_default(),
            hCursor: self.cursor.map(CursorId::load).transpose()?.unwrap_or_default(),
            hbrBackground: background,
            lpszMenuName: menu,
            lpszClassName: name_wide.as_pcwstr(),
            hIconSm: self.small_icon.map(IconId::load).transpose()?.unwrap_or_default(),
        };

        // SAFETY: `wc` and every string it points to outlive the call.
        let atom = unsafe { RegisterClassExW(&wc) };
        if atom == 0 {
            return Err(error_for_win32(last_error_code(), Some(&name)));
        }

        tracing::debug!(class = %name, atom, "registered window class");
        Ok(RegisteredClass {
            inner: Rc::new(ClassRegistration {
                name,
                name_wide,
                instance,
                atom,
            }),
        })
    }
}

struct ClassRegistration {
    name: String,
    name_wide: WideString,
    instance: ModuleInstance,
    atom: u16,
}

impl Drop for ClassRegistration {
    fn drop(&mut self) {
        // SAFETY: Every window of the class holds a clone of the registration,
        // so none remain.
        let result = unsafe {
            UnregisterClassW(self.name_wide.as_pcwstr(), self.instance.as_instance())
        };
        if let Err(error) = result {
            tracing::warn!(class = %self.name, %error, "UnregisterClassW failed");
        }
    }
}

/// A registered window class. Unregistered when the last clone (including
/// the ones held by windows) is dropped.
#[derive(Clone)]
pub struct RegisteredClass {
    inner: Rc<ClassRegistration>,
}

/// A snapshot of a registered class from `GetClassInfoExW`.
#[derive(Clone, Copy, Debug)]
pub struct ClassInfo {
    /// Class style.
    pub style: ClassStyle,
    /// Class extra bytes.
    pub class_extra: i32,
    /// Window extra bytes.
    pub window_extra: i32,
    /// Background brush or `COLOR_* + 1` value.
    pub background: HBRUSH,
    /// Cursor.
    pub cursor: HCURSOR,
    /// Large icon.
    pub icon: HICON,
    /// Small icon.
    pub small_icon: HICON,
}

impl RegisteredClass {
    /// The class name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The class atom.
    pub fn atom(&self) -> u16 {
        self.inner.atom
    }

    /// The owning module.
    pub fn instance(&self) -> ModuleInstance {
        self.inner.instance
    }

    /// Reads the class back from the system.
    pub fn info(&self) -> Result<ClassInfo> {
        let mut wc = WNDCLASSEXW {
            cbSize: size_of::<WNDCLASSEXW>() as u32,
            ..Default::default()
        };

        // SAFETY: `wc.cbSize` is set and the name outlives the call.
        unsafe {
            GetClassInfoExW(
                self.inner.instance.as_instance(),
                self.inner.name_wide.as_pcwstr(),
                &mut wc,
            )?
        };

        Ok(ClassInfo {
            style: ClassStyle(wc.style),
            class_extra: wc.cbClsExtra,
            window_extra: wc.cbWndExtra,
            background: wc.hbrBackground,
            cursor: wc.hCursor,
            icon: wc.hIcon,
            small_icon: wc.hIconSm,
        })
    }
}

// ============================================================================
// Handlers and windows
// ============================================================================

/// Trait for handling window messages.
pub trait MessageHandler: 'static {
    /// Handles a window message.
    ///
    /// Return `Some(result)` to indicate the message was handled, or `None` to
    /// let the default window procedure handle it.
    fn handle_message(&mut self, msg: &Message) -> Option<LRESULT>;

    /// Called on `WM_CREATE`. Returning false aborts creation.
    fn on_create(&mut self, _window: WindowHandle) -> bool {
        true
    }

    /// Called on `WM_DESTROY`.
    fn on_destroy(&mut self) {}

    /// Called on `WM_CLOSE`. Returning true destroys the window.
    fn on_close(&mut self, _window: WindowHandle) -> bool {
        true
    }
}

/// A message handler that leaves everything to the default procedure.
pub struct DefaultHandler;

impl MessageHandler for DefaultHandler {
    fn handle_message(&mut self, _msg: &Message) -> Option<LRESULT> {
        None
    }
}

/// Per-window state reachable from `GWLP_USERDATA`.
struct WindowState {
    handler: Rc<RefCell<dyn MessageHandler>>,
    main_window: bool,
}

/// Builder for creating windows of a registered class.
pub struct WindowBuilder {
    class: RegisteredClass,
    title: String,
    style: Style,
    ex_style: ExStyle,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    parent: Option<WindowHandle>,
    main_window: bool,
}

impl WindowBuilder {
    /// Creates a builder for a window of `class`.
    pub fn new(class: &RegisteredClass) -> Self {
        Self {
            class: class.clone(),
            title: String::from("Window"),
            style: Style::OVERLAPPED_WINDOW,
            ex_style: ExStyle::NONE,
            x: CW_USEDEFAULT,
            y: CW_USEDEFAULT,
            width: CW_USEDEFAULT,
            height: CW_USEDEFAULT,
            parent: None,
            main_window: false,
        }
    }

    /// Sets the window title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the window style.
    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Sets the extended window style.
    pub fn ex_style(mut self, ex_style: ExStyle) -> Self {
        self.ex_style = ex_style;
        self
    }

    /// Sets the window position.
    pub fn position(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets the window size.
    pub fn size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the parent (or owner, for top-level windows).
    pub fn parent(mut self, parent: WindowHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Marks this as the main window: destroying it posts `WM_QUIT`.
    pub fn main_window(mut self, main_window: bool) -> Self {
        self.main_window = main_window;
        self
    }

    /// Creates the window.
    ///
    /// # Errors
    ///
    /// Returns an error if `CreateWindowExW` fails or the handler's
    /// `on_create` returns false.
    pub fn build<H: MessageHandler>(self, handler: H) -> Result<Window<H>> {
        let handler = Rc::new(RefCell::new(handler));
        let dyn_handler: Rc<RefCell<dyn MessageHandler>> = handler.clone();
        let state = Box::into_raw(Box::new(WindowState {
            handler: dyn_handler,
            main_window: self.main_window,
        }));

        let title_wide = WideString::new(&self.title);
        let parent = self.parent.map_or(HWND::default(), WindowHandle::as_raw);

        // SAFETY: All strings outlive the call; `state` is stored in
        // GWLP_USERDATA during WM_NCCREATE and freed by `Window::drop`.
        let created = unsafe {
            CreateWindowExW(
                self.ex_style.0,
                self.class.inner.name_wide.as_pcwstr(),
                title_wide.as_pcwstr(),
                self.style.0,
                self.x,
                self.y,
                self.width,
                self.height,
                parent,
                HMENU::default(),
                self.class.inner.instance.as_instance(),
                Some(state as *const c_void),
            )
        };

        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(error) => {
                // SAFETY: The window never took ownership; WM_NCDESTROY has
                // cleared any pointer to `state`.
                drop(unsafe { Box::from_raw(state) });
                return Err(error_for_hresult(error.code(), Some(&self.title)));
            }
        };

        tracing::debug!(class = %self.class.name(), title = %self.title, "created window");
        Ok(Window {
            handle: WindowHandle(hwnd),
            state,
            handler,
            _class: self.class,
        })
    }
}

/// A window owning its message handler.
///
/// Dropping the window destroys it (if still alive) and frees the handler.
pub struct Window<H: MessageHandler> {
    handle: WindowHandle,
    state: *mut WindowState,
    handler: Rc<RefCell<H>>,
    _class: RegisteredClass,
}

impl<H: MessageHandler> Window<H> {
    /// Returns the copyable handle.
    #[inline]
    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    /// Returns the raw window handle.
    #[inline]
    pub fn hwnd(&self) -> HWND {
        self.handle.0
    }

    /// Gets a reference to the message handler.
    ///
    /// # Panics
    ///
    /// Panics if the handler is mutably borrowed (e.g. during message handling).
    pub fn handler(&self) -> Ref<'_, H> {
        self.handler.borrow()
    }

    /// Gets a mutable reference to the message handler.
    ///
    /// # Panics
    ///
    /// Panics if the handler is already borrowed (e.g. during message handling).
    pub fn handler_mut(&self) -> RefMut<'_, H> {
        self.handler.borrow_mut()
    }
}

impl<H: MessageHandler> std::ops::Deref for Window<H> {
    type Target = WindowHandle;

    fn deref(&self) -> &WindowHandle {
        &self.handle
    }
}

impl<H: MessageHandler> Drop for Window<H> {
    fn drop(&mut self) {
        if self.handle.is_window() {
            if let Err(error) = self.handle.destroy() {
                tracing::warn!(%error, "DestroyWindow failed");
            }
        }
        // SAFETY: The window is gone (WM_NCDESTROY cleared GWLP_USERDATA), so
        // nothing else references `state`.
        drop(unsafe { Box::from_raw(self.state) });
    }
}

/// The window procedure shared by every class this module registers.
///
/// # Safety
///
/// Called by the system with the parameters of a window of one of our
/// classes. GWLP_USERDATA holds null or a `WindowState` owned by a live
/// [`Window`].
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_NCCREATE {
        // SAFETY: For WM_NCCREATE, lparam points to a CREATESTRUCTW whose
        // lpCreateParams is the pointer passed to CreateWindowExW.
        let create = &*(lparam.0 as *const CREATESTRUCTW);
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let state = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowState;
    if state.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    // SAFETY: Set in WM_NCCREATE; the owning `Window` outlives the window.
    let state = &*state;
    let window = WindowHandle(hwnd);

    if msg == WM_NCDESTROY {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    // A handler that re-enters (e.g. SendMessage from inside a callback) is
    // already borrowed; nested messages go to the default procedure.
    let Ok(mut handler) = state.handler.try_borrow_mut() else {
        if msg == WM_DESTROY && state.main_window {
            PostQuitMessage(0);
        }
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    };

    match msg {
        WM_CREATE => {
            if handler.on_create(window) {
                LRESULT(0)
            } else {
                LRESULT(-1)
            }
        }
        WM_DESTROY => {
            handler.on_destroy();
            if state.main_window {
                PostQuitMessage(0);
            }
            LRESULT(0)
        }
        WM_CLOSE => {
            let close = handler.on_close(window);
            drop(handler);
            if close {
                let _ = DestroyWindow(hwnd);
            }
            LRESULT(0)
        }
        _ => {
            let message = Message {
                window,
                msg,
                wparam,
                lparam,
            };
            match handler.handle_message(&message) {
                Some(result) => result,
                None => {
                    drop(handler);
                    DefWindowProcW(hwnd, msg, wparam, lparam)
                }
            }
        }
    }
}

// ============================================================================
// Window handles
// ============================================================================

/// Monitor details from `GetMonitorInfoW`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Device name, such as `\\.\DISPLAY1`.
    pub device_name: String,
    /// Full monitor rectangle in virtual-screen coordinates.
    pub monitor_rect: RECT,
    /// Work area excluding taskbars.
    pub work_rect: RECT,
    /// The primary monitor.
    pub is_primary: bool,
}

/// A copyable, non-owning window handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowHandle(HWND);

impl WindowHandle {
    /// Wraps a raw handle.
    pub fn from_raw(hwnd: HWND) -> Self {
        Self(hwnd)
    }

    /// The raw `HWND`.
    #[inline]
    pub fn as_raw(self) -> HWND {
        self.0
    }

    /// The window text (title bar or control text).
    pub fn text(self) -> Result<String> {
        // SAFETY: Plain handle queries; the buffer length is passed by slice.
        unsafe {
            let len = GetWindowTextLengthW(self.0).max(0) as usize;
            let mut buffer = vec![0u16; len + 1];
            SetLastError(NO_ERROR);
            let copied = GetWindowTextW(self.0, &mut buffer);
            if copied == 0 {
                let code = last_error_code();
                if code != NO_ERROR {
                    return Err(error_for_win32(code, Some("GetWindowTextW")));
                }
            }
            Ok(String::from_utf16_lossy(&buffer[..copied.max(0) as usize]))
        }
    }

    /// Sets the window text.
    pub fn set_text(self, text: &str) -> Result<()> {
        let wide = WideString::new(text);
        // SAFETY: `wide` outlives the call.
        unsafe { SetWindowTextW(self.0, wide.as_pcwstr())? };
        Ok(())
    }

    /// The class name.
    pub fn class_name(self) -> Result<String> {
        // Class names are limited to 256 characters.
        let mut buffer = [0u16; 257];
        // SAFETY: The buffer length is passed by slice.
        let len = unsafe { GetClassNameW(self.0, &mut buffer) };
        if len == 0 {
            return Err(last_error());
        }
        Ok(String::from_utf16_lossy(&buffer[..len as usize]))
    }

    /// The client area, with the origin at (0, 0).
    pub fn client_rect(self) -> Result<RECT> {
        let mut rect = RECT::default();
        // SAFETY: `rect` is a valid output location.
        unsafe { GetClientRect(self.0, &mut rect)? };
        Ok(rect)
    }

    /// The window bounds in screen coordinates.
    pub fn window_rect(self) -> Result<RECT> {
        let mut rect = RECT::default();
        // SAFETY: `rect` is a valid output location.
        unsafe { GetWindowRect(self.0, &mut rect)? };
        Ok(rect)
    }

    /// Moves and resizes the window.
    pub fn move_to(self, x: i32, y: i32, width: i32, height: i32, repaint: bool) -> Result<()> {
        // SAFETY: Plain values.
        unsafe { MoveWindow(self.0, x, y, width, height, repaint)? };
        Ok(())
    }

    /// Shows or hides the window. Returns true if it was previously visible.
    pub fn show(self, cmd: ShowCommand) -> bool {
        // SAFETY: ShowWindow tolerates any handle.
        unsafe { ShowWindow(self.0, cmd.0) }.as_bool()
    }

    /// Returns true while the handle names an existing window.
    pub fn is_window(self) -> bool {
        // SAFETY: IsWindow tolerates any handle.
        unsafe { IsWindow(self.0) }.as_bool()
    }

    /// Returns true if the window and its ancestors have `WS_VISIBLE`.
    pub fn is_visible(self) -> bool {
        // SAFETY: IsWindowVisible tolerates any handle.
        unsafe { IsWindowVisible(self.0) }.as_bool()
    }

    /// The parent or owner, if any.
    pub fn parent(self) -> Option<WindowHandle> {
        // SAFETY: GetParent tolerates any handle.
        unsafe { GetParent(self.0) }.ok().map(WindowHandle)
    }

    /// Destroys the window. Must be called on the creating thread.
    pub fn destroy(self) -> Result<()> {
        // SAFETY: DestroyWindow validates the handle.
        unsafe { DestroyWindow(self.0)? };
        Ok(())
    }

    /// Sends a message and waits for the result.
    pub fn send_message(self, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        // SAFETY: The caller chooses message parameters valid for `msg`.
        unsafe { SendMessageW(self.0, msg, wparam, lparam) }
    }

    /// Posts a message to the window's thread queue.
    pub fn post_message(self, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Result<()> {
        // SAFETY: The caller chooses message parameters valid for `msg`.
        unsafe { PostMessageW(self.0, msg, wparam, lparam)? };
        Ok(())
    }

    /// Reads a window data slot.
    pub fn get_long(self, index: WindowLong) -> Result<isize> {
        // SAFETY: Plain handle query.
        unsafe {
            SetLastError(NO_ERROR);
            let value = GetWindowLongPtrW(self.0, index.to_native());
            if value == 0 {
                let code = last_error_code();
                if code != NO_ERROR {
                    return Err(error_for_win32(code, Some("GetWindowLongPtrW")));
                }
            }
            Ok(value)
        }
    }

    /// Writes a window data slot, returning the previous value.
    ///
    /// # Safety
    ///
    /// Replacing [`WindowLong::WndProc`] or [`WindowLong::UserData`] on a
    /// window created by [`WindowBuilder`] breaks its handler dispatch; the
    /// value must be meaningful for the slot.
    pub unsafe fn set_long(self, index: WindowLong, value: isize) -> Result<isize> {
        SetLastError(NO_ERROR);
        let previous = SetWindowLongPtrW(self.0, index.to_native(), value);
        if previous == 0 {
            let code = last_error_code();
            if code != NO_ERROR {
                return Err(error_for_win32(code, Some("SetWindowLongPtrW")));
            }
        }
        Ok(previous)
    }

    /// Gives the window keyboard focus, returning the previous focus window.
    pub fn set_focus(self) -> Result<Option<WindowHandle>> {
        // SAFETY: Plain handle operation.
        unsafe {
            SetLastError(NO_ERROR);
            match SetFocus(self.0) {
                Ok(previous) => Ok(Some(WindowHandle(previous))),
                Err(_) => match last_error_code() {
                    NO_ERROR => Ok(None),
                    code => Err(error_for_win32(code, Some("SetFocus"))),
                },
            }
        }
    }

    /// The module that created the window.
    pub fn module_instance(self) -> Result<ModuleInstance> {
        let raw = self.get_long(WindowLong::Instance)?;
        Ok(ModuleInstance::from_raw(HMODULE(raw as *mut c_void)))
    }

    /// Starts a timer that posts `WM_TIMER` with `id` every `interval_ms`.
    pub fn set_timer(self, id: usize, interval_ms: u32) -> Result<usize> {
        // SAFETY: No callback; WM_TIMER goes to the window procedure.
        let timer = unsafe { SetTimer(self.0, id, interval_ms, None) };
        if timer == 0 {
            return Err(last_error());
        }
        Ok(timer)
    }

    /// Stops a timer started by [`set_timer`](Self::set_timer).
    pub fn kill_timer(self, id: usize) -> Result<()> {
        // SAFETY: Plain handle operation.
        unsafe { KillTimer(self.0, id)? };
        Ok(())
    }

    /// The monitor containing most of the window.
    pub fn monitor_info(self) -> Result<MonitorInfo> {
        // SAFETY: MONITOR_DEFAULTTONEAREST always yields a monitor.
        let monitor = unsafe { MonitorFromWindow(self.0, MONITOR_DEFAULTTONEAREST) };
        let mut info = MONITORINFOEXW::default();
        info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;

        // SAFETY: cbSize announces the extended structure, which starts
        // with MONITORINFO.
        unsafe { GetMonitorInfoW(monitor, std::ptr::addr_of_mut!(info).cast::<MONITORINFO>()) }
            .check("GetMonitorInfoW")?;

        Ok(MonitorInfo {
            device_name: crate::string::from_wide(&info.szDevice)?,
            monitor_rect: info.monitorInfo.rcMonitor,
            work_rect: info.monitorInfo.rcWork,
            // MONITORINFOF_PRIMARY
            is_primary: info.monitorInfo.dwFlags & 1 != 0,
        })
    }
}

// ============================================================================
// Subclassing
// ============================================================================

const SUBCLASS_PROPERTY: PCWSTR = windows::core::w!("winterop.subclass");

type SubclassCallback = dyn FnMut(&Message) -> Option<LRESULT>;

struct SubclassState {
    previous: WNDPROC,
    callback: RefCell<Box<SubclassCallback>>,
}

/// Intercepts messages of an existing window.
///
/// The callback sees every message first; returning `None` forwards the
/// message to the previous window procedure. Dropping the `Subclass`
/// restores that procedure. A window can carry one `Subclass` at a time.
pub struct Subclass {
    window: WindowHandle,
    state: *mut SubclassState,
}

impl Subclass {
    /// Installs `callback` on `window`. Must be called on the window's thread.
    pub fn install(
        window: WindowHandle,
        callback: impl FnMut(&Message) -> Option<LRESULT> + 'static,
    ) -> Result<Self> {
        // SAFETY: Property lookup on a plain handle.
        if !unsafe { GetPropW(window.0, SUBCLASS_PROPERTY) }.is_invalid() {
            return Err(Error::AlreadyExists("window is already subclassed".into()));
        }

        let state = Box::into_raw(Box::new(SubclassState {
            previous: None,
            callback: RefCell::new(Box::new(callback)),
        }));

        // SAFETY: The property is removed before `state` is freed, either in
        // `Drop` or on WM_NCDESTROY.
        unsafe {
            if let Err(error) = SetPropW(window.0, SUBCLASS_PROPERTY, HANDLE(state.cast())) {
                drop(Box::from_raw(state));
                return Err(error.into());
            }

            let procedure: SubclassProc = subclass_proc;
            let replaced = window.set_long(WindowLong::WndProc, procedure as usize as isize);
            match replaced {
                Ok(previous) => {
                    (*state).previous = std::mem::transmute::<isize, WNDPROC>(previous);
                }
                Err(error) => {
                    let _ = RemovePropW(window.0, SUBCLASS_PROPERTY);
                    drop(Box::from_raw(state));
                    return Err(error);
                }
            }
        }

        Ok(Self { window, state })
    }

    /// The subclassed window.
    pub fn window(&self) -> WindowHandle {
        self.window
    }
}

impl Drop for Subclass {
    fn drop(&mut self) {
        // SAFETY: `state` is ours; if the window still points at it the
        // original procedure is put back first.
        unsafe {
            let ours = GetPropW(self.window.0, SUBCLASS_PROPERTY).0 == self.state.cast::<c_void>();
            if ours {
                let previous = (*self.state).previous.map_or(0, |proc| proc as usize as isize);
                if let Err(error) = self.window.set_long(WindowLong::WndProc, previous) {
                    tracing::warn!(%error, "failed to restore window procedure");
                }
                let _ = RemovePropW(self.window.0, SUBCLASS_PROPERTY);
            }
            drop(Box::from_raw(self.state));
        }
    }
}

type SubclassProc = unsafe extern "system" fn(HWND, u32, WPARAM, LPARAM) -> LRESULT;

unsafe extern "system" fn subclass_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let state = GetPropW(hwnd, SUBCLASS_PROPERTY).0 as *const SubclassState;
    if state.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    // SAFETY: The property is removed before the state is freed.
    let state = &*state;

    if msg == WM_NCDESTROY {
        let _ = RemovePropW(hwnd, SUBCLASS_PROPERTY);
        return CallWindowProcW(state.previous, hwnd, msg, wparam, lparam);
    }

    if let Ok(mut callback) = state.callback.try_borrow_mut() {
        let message = Message {
            window: WindowHandle(hwnd),
            msg,
            wparam,
            lparam,
        };
        if let Some(result) = callback(&message) {
            return result;
        }
    }

    CallWindowProcW(state.previous, hwnd, msg, wparam, lparam)
}

// ============================================================================
// Message loop
// ============================================================================

/// Runs the message loop until `WM_QUIT` is received.
///
/// Returns the exit code passed to [`post_quit_message`].
pub fn run_message_loop() -> Result<i32> {
    let mut msg = MSG::default();

    // SAFETY: `msg` is a valid output location; a null window receives
    // messages for every window on this thread.
    unsafe {
        loop {
            match GetMessageW(&mut msg, None, 0, 0).0 {
                0 => break,
                -1 => return Err(last_error()),
                _ => {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }
    }

    Ok(msg.wParam.0 as i32)
}

/// Dispatches pending messages without blocking.
///
/// Returns `true` if `WM_QUIT` was received.
pub fn process_messages() -> bool {
    let mut msg = MSG::default();

    // SAFETY: `msg` is a valid output location.
    unsafe {
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                return true;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    false
}

/// Asks the current thread's message loop to exit with `exit_code`.
pub fn post_quit_message(exit_code: i32) {
    // SAFETY: Only touches the calling thread's queue.
    unsafe { PostQuitMessage(exit_code) };
}

/// Default processing for a message not handled by the application.
pub fn default_window_procedure(message: &Message) -> LRESULT {
    // SAFETY: The message came from the system or from a caller who chose
    // parameters valid for `msg`.
    unsafe { DefWindowProcW(message.window.0, message.msg, message.wparam, message.lparam) }
}

// ============================================================================
// Utilities
// ============================================================================

/// Reads a system metric.
pub fn system_metric(metric: SystemMetric) -> i32 {
    // SAFETY: Plain query.
    unsafe { GetSystemMetrics(metric.to_native()) }
}

/// Reads a system color.
pub fn system_color(color: SystemColor) -> Color {
    // SAFETY: Plain query.
    Color(unsafe { GetSysColor(color.to_native()) })
}

/// Shows a modal message box and returns the chosen button.
pub fn message_box(
    owner: Option<WindowHandle>,
    text: &str,
    caption: &str,
    kind: MessageBoxKind,
) -> Result<MessageBoxResult> {
    let text = WideString::new(text);
    let caption = WideString::new(caption);
    let owner = owner.map_or(HWND::default(), WindowHandle::as_raw);

    // SAFETY: Both strings outlive the call.
    let result = unsafe { MessageBoxW(owner, text.as_pcwstr(), caption.as_pcwstr(), kind.0) };

    Ok(match result {
        IDOK => MessageBoxResult::Ok,
        IDCANCEL => MessageBoxResult::Cancel,
        IDYES => MessageBoxResult::Yes,
        IDNO => MessageBoxResult::No,
        IDABORT => MessageBoxResult::Abort,
        IDRETRY => MessageBoxResult::Retry,
        IDIGNORE => MessageBoxResult::Ignore,
        other if other.0 == 0 => return Err(last_error()),
        other => MessageBoxResult::Other(other.0),
    })
}

/// The desktop window.
pub fn desktop_window() -> WindowHandle {
    // SAFETY: Plain query.
    WindowHandle(unsafe { GetDesktopWindow() })
}

/// The window the user is working with, if any.
pub fn foreground_window() -> Option<WindowHandle> {
    // SAFETY: Plain query.
    let hwnd = unsafe { GetForegroundWindow() };
    (!hwnd.is_invalid()).then_some(WindowHandle(hwnd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const PING: u32 = WM_USER + 1;

    #[derive(Default)]
    struct Recorder {
        created: bool,
        destroyed: Rc<Cell<bool>>,
        pings: u32,
    }

    impl MessageHandler for Recorder {
        fn handle_message(&mut self, msg: &Message) -> Option<LRESULT> {
            if msg.msg == PING {
                self.pings += 1;
                return Some(LRESULT(msg.wparam.0 as isize * 2));
            }
            None
        }

        fn on_create(&mut self, _window: WindowHandle) -> bool {
            self.created = true;
            true
        }

        fn on_destroy(&mut self) {
            self.destroyed.set(true);
        }
    }

    struct Refuse;

    impl MessageHandler for Refuse {
        fn handle_message(&mut self, _msg: &Message) -> Option<LRESULT> {
            None
        }

        fn on_create(&mut self, _window: WindowHandle) -> bool {
            false
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_wndclassex_layout() {
        assert_eq!(size_of::<WNDCLASSEXW>(), 80);
    }

    #[test]
    fn test_menu_name_and_id_are_exclusive() {
        let result = WindowClass::new().menu_name("MAIN").menu_id(1).register();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_register_and_read_back() {
        let class = WindowClass::new()
            .style(ClassStyle::DBLCLKS)
            .window_extra(16)
            .register()
            .unwrap();
        assert!(class.name().starts_with("winterop."));
        assert_ne!(class.atom(), 0);

        let info = class.info().unwrap();
        assert!(info.style.contains(ClassStyle::DBLCLKS));
        assert_eq!(info.window_extra, 16);
        assert!(!info.cursor.is_invalid());
    }

    #[test]
    fn test_duplicate_class_name_fails() {
        let name = generated_class_name();
        let _first = WindowClass::new().name(&name).register().unwrap();
        assert!(WindowClass::new().name(&name).register().is_err());
    }

    #[test]
    fn test_window_dispatches_to_handler() {
        let class = WindowClass::new().register().unwrap();
        let destroyed = Rc::new(Cell::new(false));
        let window = WindowBuilder::new(&class)
            .title("first")
            .size(200, 100)
            .build(Recorder {
                destroyed: destroyed.clone(),
                ..Default::default()
            })
            .unwrap();

        assert!(window.handler().created);
        assert_eq!(window.text().unwrap(), "first");
        window.set_text("second").unwrap();
        assert_eq!(window.text().unwrap(), "second");
        assert_eq!(window.class_name().unwrap(), class.name());
        assert_eq!(window.module_instance().unwrap(), class.instance());

        let reply = window.send_message(PING, WPARAM(21), LPARAM(0));
        assert_eq!(reply, LRESULT(42));
        assert_eq!(window.handler().pings, 1);

        window.handle().destroy().unwrap();
        assert!(destroyed.get());
        assert!(!window.is_window());
    }

    #[test]
    fn test_refused_creation_is_an_error() {
        let class = WindowClass::new().register().unwrap();
        assert!(WindowBuilder::new(&class).build(Refuse).is_err());
    }

    #[test]
    fn test_close_destroys_window() {
        let class = WindowClass::new().register().unwrap();
        let window = WindowBuilder::new(&class).build(DefaultHandler).unwrap();
        window.send_message(WM_CLOSE, WPARAM(0), LPARAM(0));
        assert!(!window.is_window());
    }

    #[test]
    fn test_main_window_posts_quit() {
        let class = WindowClass::new().register().unwrap();
        let window = WindowBuilder::new(&class)
            .main_window(true)
            .build(DefaultHandler)
            .unwrap();
        drop(window);
        assert!(process_messages());
    }

    #[test]
    fn test_secondary_window_does_not_post_quit() {
        let class = WindowClass::new().register().unwrap();
        let window = WindowBuilder::new(&class).build(DefaultHandler).unwrap();
        drop(window);
        assert!(!process_messages());
    }

    #[test]
    fn test_geometry_and_child_windows() {
        let class = WindowClass::new().register().unwrap();
        let parent = WindowBuilder::new(&class)
            .style(Style::POPUP)
            .position(10, 20)
            .size(300, 200)
            .build(DefaultHandler)
            .unwrap();

        let client = parent.client_rect().unwrap();
        assert_eq!((client.right, client.bottom), (300, 200));
        let bounds = parent.window_rect().unwrap();
        assert_eq!((bounds.left, bounds.top), (10, 20));

        parent.move_to(0, 0, 120, 80, false).unwrap();
        assert_eq!(parent.client_rect().unwrap().right, 120);

        let child = WindowBuilder::new(&class)
            .style(Style::CHILD)
            .parent(parent.handle())
            .build(DefaultHandler)
            .unwrap();
        assert_eq!(child.parent(), Some(parent.handle()));
        assert!(!child.is_visible());
        assert!(parent.monitor_info().unwrap().device_name.starts_with(r"\\.\"));
    }

    #[test]
    fn test_timers() {
        let class = WindowClass::new().register().unwrap();
        let window = WindowBuilder::new(&class).build(DefaultHandler).unwrap();
        assert_eq!(window.set_timer(7, 10_000).unwrap(), 7);
        window.kill_timer(7).unwrap();
    }

    #[test]
    fn test_subclass_intercepts_and_restores() {
        let class = WindowClass::new().register().unwrap();
        let window = WindowBuilder::new(&class).build(Recorder::default()).unwrap();
        let original = window.get_long(WindowLong::WndProc).unwrap();

        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let subclass = Subclass::install(window.handle(), move |msg| {
            if msg.msg == PING + 1 {
                counter.set(counter.get() + 1);
                return Some(LRESULT(99));
            }
            None
        })
        .unwrap();

        let installed: SubclassProc = subclass_proc;
        assert_eq!(
            window.get_long(WindowLong::WndProc).unwrap(),
            installed as usize as isize
        );
        assert!(Subclass::install(window.handle(), |_| None).is_err());
        assert_eq!(window.send_message(PING + 1, WPARAM(0), LPARAM(0)), LRESULT(99));
        // Unhandled messages reach the original procedure.
        assert_eq!(window.send_message(PING, WPARAM(5), LPARAM(0)), LRESULT(10));

        drop(subclass);
        assert_eq!(window.get_long(WindowLong::WndProc).unwrap(), original);
        assert_eq!(window.send_message(PING + 1, WPARAM(0), LPARAM(0)), LRESULT(0));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_utilities() {
        assert!(system_metric(SystemMetric::ScreenWidth) > 0);
        assert!(desktop_window().is_window());
        let _ = system_color(SystemColor::Window);
        assert!(CursorId::IBeam.load().is_ok());
        assert!(IconId::Warning.load().is_ok());
    }
}
