//! GDI device contexts, drawing, and display enumeration.
//!
//! Provides [`DeviceContext`] with the three native release strategies,
//! owned GDI objects ([`GdiObject`]) that are selected into a context through
//! a restoring [`SelectionGuard`], and enumeration of display devices and
//! display modes.

use crate::error::{Error, NativeOk, Result};
use crate::string::{from_wide, optional_pcwstr, optional_wide, to_wide, WideString};
use std::marker::PhantomData;
use std::mem::size_of;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, POINT, RECT, SIZE};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, BitBlt, CombineRgn, CreateCompatibleBitmap, CreateCompatibleDC, CreateDCW,
    CreateEllipticRgn, CreateFontIndirectW, CreateHatchBrush, CreateICW, CreatePen,
    CreateRectRgn, CreateSolidBrush, DeleteDC, DeleteObject, DrawTextW, Ellipse, EndPaint,
    EnumDisplayDevicesW, EnumDisplaySettingsW, FillRect, FrameRect, GetBkColor, GetBkMode,
    GetClipBox, GetDC, GetDeviceCaps, GetMapMode, GetPixel, GetRgnBox, GetStockObject,
    GetTextColor, GetTextExtentPoint32W, GetTextMetricsW, GetWindowDC, InvalidateRect,
    InvertRect, LineTo, MoveToEx, PtInRegion, Polygon, Polyline, ReleaseDC, RoundRect,
    SelectClipRgn, SelectObject, SetBkColor, SetBkMode, SetMapMode, SetPixel, SetPolyFillMode,
    SetROP2, SetTextAlign, SetTextColor, SetViewportOrgEx, SetWindowOrgEx, TextOutW,
    UpdateWindow, ValidateRect, ALTERNATE, BACKGROUND_MODE, BITSPIXEL, BLACKNESS, BLACK_BRUSH,
    BLACK_PEN, CREATE_POLYGON_RGN_MODE, DC_BRUSH, DEVMODEW, DISPLAY_DEVICEW,
    DISPLAY_DEVICE_ATTACHED_TO_DESKTOP, DISPLAY_DEVICE_PRIMARY_DEVICE, DRAW_TEXT_FORMAT,
    DSTINVERT, DT_BOTTOM, DT_CALCRECT, DT_CENTER, DT_END_ELLIPSIS, DT_LEFT, DT_NOPREFIX,
    DT_RIGHT, DT_SINGLELINE, DT_TOP, DT_VCENTER, DT_WORDBREAK, ENUM_CURRENT_SETTINGS,
    ENUM_DISPLAY_SETTINGS_MODE, ENUM_REGISTRY_SETTINGS, FW_BOLD, FW_NORMAL,
    GET_DEVICE_CAPS_INDEX, GET_STOCK_OBJECT_FLAGS, GRAY_BRUSH, HATCH_BRUSH_STYLE, HBITMAP,
    HBRUSH, HDC, HDC_MAP_MODE, HFONT, HGDIOBJ, HORZRES, HORZSIZE, HPEN, HRGN,
    HS_BDIAGONAL, HS_CROSS, HS_DIAGCROSS, HS_FDIAGONAL, HS_HORIZONTAL, HS_VERTICAL, LOGFONTW,
    LOGPIXELSX, LOGPIXELSY, MM_ANISOTROPIC, MM_HIENGLISH, MM_HIMETRIC, MM_ISOTROPIC,
    MM_LOENGLISH, MM_LOMETRIC, MM_TEXT, MM_TWIPS, NOTSRCCOPY, NULL_BRUSH, NULL_PEN, OPAQUE,
    PAINTSTRUCT, PATCOPY, PEN_STYLE, PLANES, PS_DASH, PS_DASHDOT, PS_DOT, PS_NULL, PS_SOLID,
    R2_BLACK, R2_COPYPEN, R2_MODE, R2_NOP, R2_NOT, R2_WHITE, R2_XORPEN, RGN_AND,
    RGN_COMBINE_MODE, RGN_COPY, RGN_DIFF, RGN_OR, RGN_XOR, ROP_CODE, SRCAND, SRCCOPY,
    SRCINVERT, SRCPAINT, TA_BASELINE, TA_BOTTOM, TA_CENTER, TA_LEFT, TA_RIGHT, TA_TOP,
    TA_UPDATECP, TECHNOLOGY, TEXTMETRICW, TEXT_ALIGN_OPTIONS, TRANSPARENT, VERTRES, VERTSIZE,
    VREFRESH, WHITENESS, WHITE_BRUSH, WHITE_PEN, WINDING,
};

// ============================================================================
// Colors and geometry
// ============================================================================

/// An RGB color (`COLORREF`, laid out as `0x00BBGGRR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    /// Black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// White.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Pure red.
    pub const RED: Self = Self::rgb(255, 0, 0);
    /// Pure green.
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    /// Pure blue.
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    /// `CLR_INVALID`, returned when a color query fails.
    const INVALID: u32 = 0xFFFF_FFFF;

    /// Builds a color from components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(r as u32 | (g as u32) << 8 | (b as u32) << 16)
    }

    /// Red component.
    pub const fn r(self) -> u8 {
        self.0 as u8
    }

    /// Green component.
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue component.
    pub const fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    fn to_native(self) -> COLORREF {
        COLORREF(self.0)
    }

    fn from_native(color: COLORREF, operation: &'static str) -> Result<Self> {
        if color.0 == Self::INVALID {
            return Err(Error::custom(format!("{operation} failed")));
        }
        Ok(Self(color.0))
    }
}

/// Builds a `RECT` from edges.
#[inline]
pub fn rect(left: i32, top: i32, right: i32, bottom: i32) -> RECT {
    RECT {
        left,
        top,
        right,
        bottom,
    }
}

// ============================================================================
// Modes and options
// ============================================================================

/// `GetDeviceCaps` indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCapability {
    /// Device technology (`DT_RASDISPLAY`, ...).
    Technology,
    /// Width in millimeters.
    HorizontalSize,
    /// Height in millimeters.
    VerticalSize,
    /// Width in pixels.
    HorizontalResolution,
    /// Height in pixels.
    VerticalResolution,
    /// Color bits per pixel.
    BitsPerPixel,
    /// Color planes.
    Planes,
    /// Pixels per logical inch horizontally.
    LogicalPixelsX,
    /// Pixels per logical inch vertically.
    LogicalPixelsY,
    /// Vertical refresh rate in hertz.
    VerticalRefresh,
}

impl DeviceCapability {
    fn to_native(self) -> GET_DEVICE_CAPS_INDEX {
        match self {
            DeviceCapability::Technology => TECHNOLOGY,
            DeviceCapability::HorizontalSize => HORZSIZE,
            DeviceCapability::VerticalSize => VERTSIZE,
            DeviceCapability::HorizontalResolution => HORZRES,
            DeviceCapability::VerticalResolution => VERTRES,
            DeviceCapability::BitsPerPixel => BITSPIXEL,
            DeviceCapability::Planes => PLANES,
            DeviceCapability::LogicalPixelsX => LOGPIXELSX,
            DeviceCapability::LogicalPixelsY => LOGPIXELSY,
            DeviceCapability::VerticalRefresh => VREFRESH,
        }
    }
}

/// Whether text and hatch backgrounds are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMode {
    /// Fill with the background color.
    Opaque,
    /// Leave the background untouched.
    Transparent,
}

impl BackgroundMode {
    fn to_native(self) -> BACKGROUND_MODE {
        match self {
            BackgroundMode::Opaque => OPAQUE,
            BackgroundMode::Transparent => TRANSPARENT,
        }
    }

    fn from_raw(raw: i32) -> Result<Self> {
        if raw == OPAQUE.0 as i32 {
            Ok(BackgroundMode::Opaque)
        } else if raw == TRANSPARENT.0 as i32 {
            Ok(BackgroundMode::Transparent)
        } else {
            Err(Error::custom("GetBkMode failed"))
        }
    }
}

/// Logical-to-device coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// One logical unit is one pixel; y grows downward.
    Text,
    /// 0.1 mm.
    LowMetric,
    /// 0.01 mm.
    HighMetric,
    /// 0.01 inch.
    LowEnglish,
    /// 0.001 inch.
    HighEnglish,
    /// 1/1440 inch.
    Twips,
    /// Application-defined, equally scaled axes.
    Isotropic,
    /// Application-defined, independently scaled axes.
    Anisotropic,
}

impl MapMode {
    const ALL: [(MapMode, HDC_MAP_MODE); 8] = [
        (MapMode::Text, MM_TEXT),
        (MapMode::LowMetric, MM_LOMETRIC),
        (MapMode::HighMetric, MM_HIMETRIC),
        (MapMode::LowEnglish, MM_LOENGLISH),
        (MapMode::HighEnglish, MM_HIENGLISH),
        (MapMode::Twips, MM_TWIPS),
        (MapMode::Isotropic, MM_ISOTROPIC),
        (MapMode::Anisotropic, MM_ANISOTROPIC),
    ];

    fn to_native(self) -> HDC_MAP_MODE {
        Self::ALL
            .iter()
            .find(|(mode, _)| *mode == self)
            .map_or(MM_TEXT, |(_, native)| *native)
    }

    fn from_raw(raw: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|(_, native)| native.0 as i32 == raw)
            .map(|(mode, _)| *mode)
            .ok_or_else(|| Error::custom("map mode query failed"))
    }
}

/// Polygon fill rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyFillMode {
    /// Even-odd rule.
    Alternate,
    /// Non-zero winding rule.
    Winding,
}

impl PolyFillMode {
    fn to_native(self) -> CREATE_POLYGON_RGN_MODE {
        match self {
            PolyFillMode::Alternate => ALTERNATE,
            PolyFillMode::Winding => WINDING,
        }
    }

    fn from_raw(raw: i32) -> Result<Self> {
        if raw == ALTERNATE.0 as i32 {
            Ok(PolyFillMode::Alternate)
        } else if raw == WINDING.0 as i32 {
            Ok(PolyFillMode::Winding)
        } else {
            Err(Error::custom("SetPolyFillMode failed"))
        }
    }
}

/// Foreground mix mode for pens and brush interiors (`R2_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    /// Always black.
    Black,
    /// Always white.
    White,
    /// Leave the destination unchanged.
    Nop,
    /// Invert the destination.
    Not,
    /// Draw with the pen color.
    CopyPen,
    /// XOR pen and destination.
    XorPen,
}

impl MixMode {
    const ALL: [(MixMode, R2_MODE); 6] = [
        (MixMode::Black, R2_BLACK),
        (MixMode::White, R2_WHITE),
        (MixMode::Nop, R2_NOP),
        (MixMode::Not, R2_NOT),
        (MixMode::CopyPen, R2_COPYPEN),
        (MixMode::XorPen, R2_XORPEN),
    ];

    fn to_native(self) -> R2_MODE {
        Self::ALL
            .iter()
            .find(|(mode, _)| *mode == self)
            .map_or(R2_COPYPEN, |(_, native)| *native)
    }

    fn from_raw(raw: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|(_, native)| native.0 as i32 == raw)
            .map(|(mode, _)| *mode)
            .ok_or_else(|| Error::custom("SetROP2 failed"))
    }
}

/// Raster operations for [`DeviceContext::bit_blt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOperation {
    /// Copy the source.
    SourceCopy,
    /// OR source and destination.
    SourcePaint,
    /// AND source and destination.
    SourceAnd,
    /// XOR source and destination.
    SourceInvert,
    /// Copy the inverted source.
    NotSourceCopy,
    /// Fill with the selected brush.
    PatternCopy,
    /// Invert the destination.
    DestinationInvert,
    /// Fill with black.
    Blackness,
    /// Fill with white.
    Whiteness,
}

impl RasterOperation {
    fn to_native(self) -> ROP_CODE {
        match self {
            RasterOperation::SourceCopy => SRCCOPY,
            RasterOperation::SourcePaint => SRCPAINT,
            RasterOperation::SourceAnd => SRCAND,
            RasterOperation::SourceInvert => SRCINVERT,
            RasterOperation::NotSourceCopy => NOTSRCCOPY,
            RasterOperation::PatternCopy => PATCOPY,
            RasterOperation::DestinationInvert => DSTINVERT,
            RasterOperation::Blackness => BLACKNESS,
            RasterOperation::Whiteness => WHITENESS,
        }
    }
}

/// Text alignment flags (`TA_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAlignment(pub u32);

impl TextAlignment {
    /// Reference point at the left edge.
    pub const LEFT: Self = Self(TA_LEFT.0);
    /// Reference point at the right edge.
    pub const RIGHT: Self = Self(TA_RIGHT.0);
    /// Reference point at the horizontal center.
    pub const CENTER: Self = Self(TA_CENTER.0);
    /// Reference point at the top edge.
    pub const TOP: Self = Self(TA_TOP.0);
    /// Reference point at the bottom edge.
    pub const BOTTOM: Self = Self(TA_BOTTOM.0);
    /// Reference point on the baseline.
    pub const BASELINE: Self = Self(TA_BASELINE.0);
    /// Use and update the current position.
    pub const UPDATE_CP: Self = Self(TA_UPDATECP.0);

    /// Combines two alignments.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// `DrawText` formatting flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTextFormat(pub u32);

impl DrawTextFormat {
    /// Align left.
    pub const LEFT: Self = Self(DT_LEFT.0);
    /// Center horizontally.
    pub const CENTER: Self = Self(DT_CENTER.0);
    /// Align right.
    pub const RIGHT: Self = Self(DT_RIGHT.0);
    /// Align top.
    pub const TOP: Self = Self(DT_TOP.0);
    /// Center vertically (single line only).
    pub const VCENTER: Self = Self(DT_VCENTER.0);
    /// Align bottom (single line only).
    pub const BOTTOM: Self = Self(DT_BOTTOM.0);
    /// Wrap at word boundaries.
    pub const WORD_BREAK: Self = Self(DT_WORDBREAK.0);
    /// Single line only.
    pub const SINGLE_LINE: Self = Self(DT_SINGLELINE.0);
    /// Treat `&` literally.
    pub const NO_PREFIX: Self = Self(DT_NOPREFIX.0);
    /// Truncate with an ellipsis.
    pub const END_ELLIPSIS: Self = Self(DT_END_ELLIPSIS.0);
    /// Measure only; the rectangle is updated, nothing is drawn.
    pub const CALC_RECT: Self = Self(DT_CALCRECT.0);

    /// Combines two formats.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Font metrics from `GetTextMetricsW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMetrics {
    /// Character cell height.
    pub height: i32,
    /// Ascent above the baseline.
    pub ascent: i32,
    /// Descent below the baseline.
    pub descent: i32,
    /// Average character width.
    pub average_char_width: i32,
    /// Widest character.
    pub max_char_width: i32,
    /// Extra spacing between rows.
    pub external_leading: i32,
    /// Font weight.
    pub weight: i32,
}

// ============================================================================
// Device contexts
// ============================================================================

enum Release {
    Window(HWND),
    Screen,
    Delete,
}

/// An `HDC` released in the way it was acquired.
///
/// - [`for_window`](Self::for_window), [`window_dc`](Self::window_dc) and
///   [`for_screen`](Self::for_screen) use `ReleaseDC`.
/// - [`compatible`](Self::compatible), [`create_display`](Self::create_display)
///   and [`create_information`](Self::create_information) use `DeleteDC`.
/// - [`begin_paint`] produces a [`PaintContext`] that calls `EndPaint`.
pub struct DeviceContext {
    hdc: HDC,
    release: Release,
}

impl DeviceContext {
    fn acquired(hdc: HDC, release: Release, operation: &'static str) -> Result<Self> {
        if hdc.is_invalid() {
            return Err(Error::custom(format!("{operation} failed")));
        }
        Ok(Self { hdc, release })
    }

    /// The client-area DC of a window (`GetDC`).
    pub fn for_window(hwnd: HWND) -> Result<Self> {
        // SAFETY: GetDC tolerates any window handle and returns null on failure.
        let hdc = unsafe { GetDC(hwnd) };
        Self::acquired(hdc, Release::Window(hwnd), "GetDC")
    }

    /// The whole-window DC, including the non-client area (`GetWindowDC`).
    pub fn window_dc(hwnd: HWND) -> Result<Self> {
        // SAFETY: As for `for_window`.
        let hdc = unsafe { GetWindowDC(hwnd) };
        Self::acquired(hdc, Release::Window(hwnd), "GetWindowDC")
    }

    /// The DC for the entire screen.
    pub fn for_screen() -> Result<Self> {
        // SAFETY: A null window selects the screen.
        let hdc = unsafe { GetDC(None) };
        Self::acquired(hdc, Release::Screen, "GetDC")
    }

    /// A memory DC compatible with `other`, or with the screen for `None`.
    pub fn compatible(other: Option<&DeviceContext>) -> Result<Self> {
        let source = other.map_or(HDC::default(), |dc| dc.hdc);
        // SAFETY: A null source selects the screen.
        let hdc = unsafe { CreateCompatibleDC(source) };
        Self::acquired(hdc, Release::Delete, "CreateCompatibleDC")
    }

    /// A DC for a display device such as `\\.\DISPLAY1`, or for all displays
    /// with `None`.
    pub fn create_display(device: Option<&str>) -> Result<Self> {
        let driver = WideString::new("DISPLAY");
        let device = optional_wide(device);

        // SAFETY: All strings outlive the call.
        let hdc = unsafe {
            CreateDCW(driver.as_pcwstr(), optional_pcwstr(&device), PCWSTR::null(), None)
        };
        Self::acquired(hdc, Release::Delete, "CreateDCW")
    }

    /// An information context for a display; queries only, no drawing.
    pub fn create_information(device: Option<&str>) -> Result<Self> {
        let driver = WideString::new("DISPLAY");
        let device = optional_wide(device);

        // SAFETY: All strings outlive the call.
        let hdc = unsafe {
            CreateICW(driver.as_pcwstr(), optional_pcwstr(&device), PCWSTR::null(), None)
        };
        Self::acquired(hdc, Release::Delete, "CreateICW")
    }

    /// The raw `HDC`.
    #[inline]
    pub fn as_raw(&self) -> HDC {
        self.hdc
    }

    // ---- queries -----------------------------------------------------------

    /// Reads a device capability.
    pub fn device_capability(&self, capability: DeviceCapability) -> i32 {
        // SAFETY: `self.hdc` is a live DC.
        unsafe { GetDeviceCaps(self.hdc, capability.to_native()) }
    }

    /// Current text color.
    pub fn text_color(&self) -> Result<Color> {
        // SAFETY: `self.hdc` is a live DC.
        Color::from_native(unsafe { GetTextColor(self.hdc) }, "GetTextColor")
    }

    /// Current background color.
    pub fn background_color(&self) -> Result<Color> {
        // SAFETY: `self.hdc` is a live DC.
        Color::from_native(unsafe { GetBkColor(self.hdc) }, "GetBkColor")
    }

    /// Current background mode.
    pub fn background_mode(&self) -> Result<BackgroundMode> {
        // SAFETY: `self.hdc` is a live DC.
        BackgroundMode::from_raw(unsafe { GetBkMode(self.hdc) })
    }

    /// Current mapping mode.
    pub fn map_mode(&self) -> Result<MapMode> {
        // SAFETY: `self.hdc` is a live DC.
        MapMode::from_raw(unsafe { GetMapMode(self.hdc) }.0 as i32)
    }

    /// The tightest rectangle around the visible drawing area.
    pub fn clip_box(&self) -> Result<RECT> {
        let mut bounds = RECT::default();
        // SAFETY: `bounds` is a valid output location.
        let kind = unsafe { GetClipBox(self.hdc, &mut bounds) };
        if kind.0 == 0 {
            return Err(Error::custom("GetClipBox failed"));
        }
        Ok(bounds)
    }

    /// Metrics of the selected font.
    pub fn text_metrics(&self) -> Result<TextMetrics> {
        let mut tm = TEXTMETRICW::default();
        // SAFETY: `tm` is a valid output location.
        unsafe { GetTextMetricsW(self.hdc, &mut tm) }.check("GetTextMetricsW")?;
        Ok(TextMetrics {
            height: tm.tmHeight,
            ascent: tm.tmAscent,
            descent: tm.tmDescent,
            average_char_width: tm.tmAveCharWidth,
            max_char_width: tm.tmMaxCharWidth,
            external_leading: tm.tmExternalLeading,
            weight: tm.tmWeight,
        })
    }

    /// Size of `text` in logical units with the selected font.
    pub fn text_extent(&self, text: &str) -> Result<SIZE> {
        let wide: Vec<u16> = text.encode_utf16().collect();
        let mut size = SIZE::default();
        // SAFETY: `wide` and `size` outlive the call.
        unsafe { GetTextExtentPoint32W(self.hdc, &wide, &mut size) }
            .check("GetTextExtentPoint32W")?;
        Ok(size)
    }

    // ---- state; each setter returns the previous value ----------------------

    /// Sets the text color.
    pub fn set_text_color(&self, color: Color) -> Result<Color> {
        // SAFETY: `self.hdc` is a live DC.
        Color::from_native(unsafe { SetTextColor(self.hdc, color.to_native()) }, "SetTextColor")
    }

    /// Sets the background color.
    pub fn set_background_color(&self, color: Color) -> Result<Color> {
        // SAFETY: `self.hdc` is a live DC.
        Color::from_native(unsafe { SetBkColor(self.hdc, color.to_native()) }, "SetBkColor")
    }

    /// Sets the background mode.
    pub fn set_background_mode(&self, mode: BackgroundMode) -> Result<BackgroundMode> {
        // SAFETY: `self.hdc` is a live DC.
        BackgroundMode::from_raw(unsafe { SetBkMode(self.hdc, mode.to_native()) })
    }

    /// Sets text alignment.
    pub fn set_text_alignment(&self, alignment: TextAlignment) -> Result<TextAlignment> {
        // SAFETY: `self.hdc` is a live DC.
        let previous = unsafe { SetTextAlign(self.hdc, TEXT_ALIGN_OPTIONS(alignment.0 as _)) };
        // GDI_ERROR
        if previous == u32::MAX {
            return Err(Error::custom("SetTextAlign failed"));
        }
        Ok(TextAlignment(previous))
    }

    /// Sets the mapping mode.
    pub fn set_map_mode(&self, mode: MapMode) -> Result<MapMode> {
        // SAFETY: `self.hdc` is a live DC.
        MapMode::from_raw(unsafe { SetMapMode(self.hdc, mode.to_native()) })
    }

    /// Sets the polygon fill rule.
    pub fn set_poly_fill_mode(&self, mode: PolyFillMode) -> Result<PolyFillMode> {
        // SAFETY: `self.hdc` is a live DC.
        PolyFillMode::from_raw(unsafe { SetPolyFillMode(self.hdc, mode.to_native()) })
    }

    /// Sets the foreground mix mode.
    pub fn set_raster_operation(&self, mode: MixMode) -> Result<MixMode> {
        // SAFETY: `self.hdc` is a live DC.
        MixMode::from_raw(unsafe { SetROP2(self.hdc, mode.to_native()) })
    }

    /// Sets the viewport origin.
    pub fn set_viewport_origin(&self, x: i32, y: i32) -> Result<POINT> {
        let mut previous = POINT::default();
        // SAFETY: `previous` is a valid output location.
        unsafe { SetViewportOrgEx(self.hdc, x, y, Some(&mut previous)) }
            .check("SetViewportOrgEx")?;
        Ok(previous)
    }

    /// Sets the window origin.
    pub fn set_window_origin(&self, x: i32, y: i32) -> Result<POINT> {
        let mut previous = POINT::default();
        // SAFETY: `previous` is a valid output location.
        unsafe { SetWindowOrgEx(self.hdc, x, y, Some(&mut previous)) }
            .check("SetWindowOrgEx")?;
        Ok(previous)
    }

    // ---- drawing -----------------------------------------------------------

    /// Moves the current position, returning the previous one.
    pub fn move_to(&self, x: i32, y: i32) -> Result<POINT> {
        let mut previous = POINT::default();
        // SAFETY: `previous` is a valid output location.
        unsafe { MoveToEx(self.hdc, x, y, Some(&mut previous)) }.check("MoveToEx")?;
        Ok(previous)
    }

    /// Draws from the current position to `(x, y)` with the selected pen.
    pub fn line_to(&self, x: i32, y: i32) -> Result<()> {
        // SAFETY: `self.hdc` is a live DC.
        unsafe { LineTo(self.hdc, x, y) }.check("LineTo")
    }

    /// Connects the points with line segments.
    pub fn polyline(&self, points: &[POINT]) -> Result<()> {
        // SAFETY: The slice outlives the call.
        unsafe { Polyline(self.hdc, points) }.check("Polyline")
    }

    /// Draws and fills a closed polygon.
    pub fn polygon(&self, points: &[POINT]) -> Result<()> {
        // SAFETY: The slice outlives the call.
        unsafe { Polygon(self.hdc, points) }.check("Polygon")
    }

    /// Draws a rectangle with the selected pen and brush.
    pub fn rectangle(&self, bounds: RECT) -> Result<()> {
        // SAFETY: `self.hdc` is a live DC.
        unsafe {
            windows::Win32::Graphics::Gdi::Rectangle(
                self.hdc,
                bounds.left,
                bounds.top,
                bounds.right,
                bounds.bottom,
            )
        }
        .check("Rectangle")
    }

    /// Draws an ellipse bounded by `bounds`.
    pub fn ellipse(&self, bounds: RECT) -> Result<()> {
        // SAFETY: `self.hdc` is a live DC.
        unsafe { Ellipse(self.hdc, bounds.left, bounds.top, bounds.right, bounds.bottom) }
            .check("Ellipse")
    }

    /// Draws a rectangle with rounded corners.
    pub fn round_rectangle(&self, bounds: RECT, corner_width: i32, corner_height: i32) -> Result<()> {
        // SAFETY: `self.hdc` is a live DC.
        unsafe {
            RoundRect(
                self.hdc,
                bounds.left,
                bounds.top,
                bounds.right,
                bounds.bottom,
                corner_width,
                corner_height,
            )
        }
        .check("RoundRect")
    }

    /// Fills `bounds` with `brush` (excluding the right and bottom edges).
    pub fn fill_rectangle(&self, bounds: RECT, brush: &GdiObject<Brush>) -> Result<()> {
        // SAFETY: `bounds` outlives the call; the brush is alive.
        let filled = unsafe { FillRect(self.hdc, &bounds, brush.as_brush()) };
        if filled == 0 {
            return Err(Error::custom("FillRect failed"));
        }
        Ok(())
    }

    /// Draws a one-unit border around `bounds` with `brush`.
    pub fn frame_rectangle(&self, bounds: RECT, brush: &GdiObject<Brush>) -> Result<()> {
        // SAFETY: `bounds` outlives the call; the brush is alive.
        let framed = unsafe { FrameRect(self.hdc, &bounds, brush.as_brush()) };
        if framed == 0 {
            return Err(Error::custom("FrameRect failed"));
        }
        Ok(())
    }

    /// Inverts the colors inside `bounds`.
    pub fn invert_rectangle(&self, bounds: RECT) -> Result<()> {
        // SAFETY: `bounds` outlives the call.
        unsafe { InvertRect(self.hdc, &bounds) }.check("InvertRect")
    }

    /// Sets a pixel, returning the color actually used.
    pub fn set_pixel(&self, x: i32, y: i32, color: Color) -> Result<Color> {
        // SAFETY: `self.hdc` is a live DC.
        let actual = unsafe { SetPixel(self.hdc, x, y, color.to_native()) };
        // SetPixel reports failure as -1.
        if actual.0 as i32 == -1 {
            return Err(Error::custom("SetPixel failed"));
        }
        Ok(Color(actual.0))
    }

    /// Reads a pixel. Fails outside the clipping region.
    pub fn get_pixel(&self, x: i32, y: i32) -> Result<Color> {
        // SAFETY: `self.hdc` is a live DC.
        Color::from_native(unsafe { GetPixel(self.hdc, x, y) }, "GetPixel")
    }

    /// Writes `text` at `(x, y)` using the current font, colors and alignment.
    pub fn text_out(&self, x: i32, y: i32, text: &str) -> Result<()> {
        let wide: Vec<u16> = text.encode_utf16().collect();
        // SAFETY: `wide` outlives the call.
        unsafe { TextOutW(self.hdc, x, y, &wide) }.check("TextOutW")
    }

    /// Formats `text` inside `bounds`. Returns the text height; with
    /// [`DrawTextFormat::CALC_RECT`] `bounds` is updated instead of drawing.
    pub fn draw_text(&self, text: &str, bounds: &mut RECT, format: DrawTextFormat) -> Result<i32> {
        let mut wide: Vec<u16> = text.encode_utf16().collect();
        // SAFETY: `wide` and `bounds` outlive the call.
        let height = unsafe { DrawTextW(self.hdc, &mut wide, bounds, DRAW_TEXT_FORMAT(format.0)) };
        if height == 0 && !text.is_empty() {
            return Err(Error::custom("DrawTextW failed"));
        }
        Ok(height)
    }

    /// Copies a block of pixels from `source`.
    #[allow(clippy::too_many_arguments)]
    pub fn bit_blt(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        source: Option<&DeviceContext>,
        source_x: i32,
        source_y: i32,
        operation: RasterOperation,
    ) -> Result<()> {
        let source = source.map_or(HDC::default(), |dc| dc.hdc);
        // SAFETY: Both DCs are alive; a null source is valid for operations
        // that do not read it.
        unsafe {
            BitBlt(
                self.hdc,
                x,
                y,
                width,
                height,
                source,
                source_x,
                source_y,
                operation.to_native(),
            )
        }
        .check("BitBlt")
    }

    // ---- objects -----------------------------------------------------------

    /// Selects `object` until the returned guard is dropped.
    pub fn select<'a, K: Selectable>(&'a self, object: &'a GdiObject<K>) -> Result<SelectionGuard<'a>> {
        // SAFETY: Both the DC and the object outlive the guard.
        let previous = unsafe { SelectObject(self.hdc, object.raw) };
        if previous.is_invalid() {
            return Err(Error::custom("SelectObject failed"));
        }
        Ok(SelectionGuard {
            hdc: self.hdc,
            previous,
            _marker: PhantomData,
        })
    }

    /// Restricts drawing to `region` (copied), or removes clipping with `None`.
    pub fn select_clip_region(&self, region: Option<&GdiObject<Region>>) -> Result<()> {
        let region = region.map_or(HRGN::default(), GdiObject::as_region);
        // SAFETY: The region is copied by the system.
        let kind = unsafe { SelectClipRgn(self.hdc, region) };
        if kind.0 == 0 {
            return Err(Error::custom("SelectClipRgn failed"));
        }
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        // SAFETY: The DC was acquired in the way `release` records.
        unsafe {
            match self.release {
                Release::Window(hwnd) => {
                    ReleaseDC(hwnd, self.hdc);
                }
                Release::Screen => {
                    ReleaseDC(None, self.hdc);
                }
                Release::Delete => {
                    if !DeleteDC(self.hdc).as_bool() {
                        tracing::warn!("DeleteDC failed");
                    }
                }
            }
        }
    }
}

/// A DC from `BeginPaint`, ended with `EndPaint` on drop.
pub struct PaintContext {
    hwnd: HWND,
    paint: PAINTSTRUCT,
}

impl PaintContext {
    /// The rectangle that needs repainting.
    pub fn paint_rect(&self) -> RECT {
        self.paint.rcPaint
    }

    /// Whether the background still needs erasing.
    pub fn erase_background(&self) -> bool {
        self.paint.fErase.as_bool()
    }

    /// Borrows the DC for drawing.
    pub fn dc(&self) -> PaintDc<'_> {
        PaintDc {
            dc: std::mem::ManuallyDrop::new(DeviceContext {
                hdc: self.paint.hdc,
                release: Release::Screen,
            }),
            _marker: PhantomData,
        }
    }
}

impl Drop for PaintContext {
    fn drop(&mut self) {
        // SAFETY: Matches the BeginPaint in `begin_paint`.
        unsafe {
            let _ = EndPaint(self.hwnd, &self.paint);
        }
    }
}

/// A borrowed view of a [`PaintContext`]'s DC; never released by itself.
pub struct PaintDc<'a> {
    dc: std::mem::ManuallyDrop<DeviceContext>,
    _marker: PhantomData<&'a PaintContext>,
}

impl std::ops::Deref for PaintDc<'_> {
    type Target = DeviceContext;

    fn deref(&self) -> &DeviceContext {
        &self.dc
    }
}

/// Starts painting a window in response to `WM_PAINT`.
pub fn begin_paint(hwnd: HWND) -> Result<PaintContext> {
    let mut paint = PAINTSTRUCT::default();
    // SAFETY: `paint` is a valid output location.
    let hdc = unsafe { BeginPaint(hwnd, &mut paint) };
    if hdc.is_invalid() {
        return Err(Error::custom("BeginPaint failed"));
    }
    Ok(PaintContext { hwnd, paint })
}

/// Sends `WM_PAINT` now if the update region is not empty.
pub fn update_window(hwnd: HWND) -> Result<()> {
    // SAFETY: UpdateWindow validates the handle.
    unsafe { UpdateWindow(hwnd) }.check("UpdateWindow")
}

/// Adds `area` (or the whole client area) to the update region.
pub fn invalidate(hwnd: HWND, area: Option<RECT>, erase: bool) -> Result<()> {
    let area = area.as_ref().map(|r| r as *const RECT);
    // SAFETY: `area` outlives the call.
    unsafe { InvalidateRect(hwnd, area, erase) }.check("InvalidateRect")
}

/// Removes `area` (or everything) from the update region.
pub fn validate(hwnd: HWND, area: Option<RECT>) -> Result<()> {
    let area = area.as_ref().map(|r| r as *const RECT);
    // SAFETY: `area` outlives the call.
    unsafe { ValidateRect(hwnd, area) }.check("ValidateRect")
}

// ============================================================================
// GDI objects
// ============================================================================

/// Marker for pens.
pub enum Pen {}
/// Marker for brushes.
pub enum Brush {}
/// Marker for fonts.
pub enum Font {}
/// Marker for bitmaps.
pub enum Bitmap {}
/// Marker for regions.
pub enum Region {}

/// Object kinds that can be selected into a DC with [`DeviceContext::select`].
pub trait Selectable {}
impl Selectable for Pen {}
impl Selectable for Brush {}
impl Selectable for Font {}
impl Selectable for Bitmap {}

/// An owned GDI object, deleted on drop unless it is a stock object.
pub struct GdiObject<K> {
    raw: HGDIOBJ,
    stock: bool,
    _kind: PhantomData<K>,
}

impl<K> GdiObject<K> {
    fn owned(raw: HGDIOBJ, operation: &'static str) -> Result<Self> {
        if raw.is_invalid() {
            return Err(Error::custom(format!("{operation} failed")));
        }
        Ok(Self {
            raw,
            stock: false,
            _kind: PhantomData,
        })
    }

    fn stock(flags: GET_STOCK_OBJECT_FLAGS) -> Result<Self> {
        // SAFETY: Stock objects are owned by the system.
        let raw = unsafe { GetStockObject(flags) };
        let mut object = Self::owned(raw, "GetStockObject")?;
        object.stock = true;
        Ok(object)
    }

    /// The raw handle.
    pub fn as_raw(&self) -> HGDIOBJ {
        self.raw
    }

    /// Returns true for system stock objects.
    pub fn is_stock(&self) -> bool {
        self.stock
    }
}

impl<K> Drop for GdiObject<K> {
    fn drop(&mut self) {
        if !self.stock {
            // SAFETY: We own the object; guards borrowing it have ended.
            if !unsafe { DeleteObject(self.raw) }.as_bool() {
                tracing::warn!("DeleteObject failed");
            }
        }
    }
}

/// Pen line styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenStyle {
    /// Solid.
    Solid,
    /// Dashed (width 1 only).
    Dash,
    /// Dotted (width 1 only).
    Dot,
    /// Alternating dashes and dots.
    DashDot,
    /// Invisible.
    Null,
}

impl PenStyle {
    fn to_native(self) -> PEN_STYLE {
        match self {
            PenStyle::Solid => PS_SOLID,
            PenStyle::Dash => PS_DASH,
            PenStyle::Dot => PS_DOT,
            PenStyle::DashDot => PS_DASHDOT,
            PenStyle::Null => PS_NULL,
        }
    }
}

/// Stock pens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPen {
    /// `BLACK_PEN`
    Black,
    /// `WHITE_PEN`
    White,
    /// `NULL_PEN`
    Null,
}

impl Pen {
    /// Creates a cosmetic or geometric pen.
    pub fn new(style: PenStyle, width: i32, color: Color) -> Result<GdiObject<Pen>> {
        // SAFETY: Plain values.
        let pen: HPEN = unsafe { CreatePen(style.to_native(), width, color.to_native()) };
        GdiObject::owned(HGDIOBJ(pen.0), "CreatePen")
    }

    /// A system stock pen.
    pub fn stock(kind: StockPen) -> Result<GdiObject<Pen>> {
        GdiObject::stock(match kind {
            StockPen::Black => BLACK_PEN,
            StockPen::White => WHITE_PEN,
            StockPen::Null => NULL_PEN,
        })
    }
}

/// Hatch patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatchStyle {
    /// `-----`
    Horizontal,
    /// `|||||`
    Vertical,
    /// `\\\\\`
    ForwardDiagonal,
    /// `/////`
    BackwardDiagonal,
    /// `+++++`
    Cross,
    /// `xxxxx`
    DiagonalCross,
}

impl HatchStyle {
    fn to_native(self) -> HATCH_BRUSH_STYLE {
        match self {
            HatchStyle::Horizontal => HS_HORIZONTAL,
            HatchStyle::Vertical => HS_VERTICAL,
            HatchStyle::ForwardDiagonal => HS_FDIAGONAL,
            HatchStyle::BackwardDiagonal => HS_BDIAGONAL,
            HatchStyle::Cross => HS_CROSS,
            HatchStyle::DiagonalCross => HS_DIAGCROSS,
        }
    }
}

/// Stock brushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockBrush {
    /// `WHITE_BRUSH`
    White,
    /// `GRAY_BRUSH`
    Gray,
    /// `BLACK_BRUSH`
    Black,
    /// `NULL_BRUSH`; draws nothing.
    Null,
    /// `DC_BRUSH`; color set per DC.
    DeviceContext,
}

impl Brush {
    /// A solid brush.
    pub fn solid(color: Color) -> Result<GdiObject<Brush>> {
        // SAFETY: Plain value.
        let brush: HBRUSH = unsafe { CreateSolidBrush(color.to_native()) };
        GdiObject::owned(HGDIOBJ(brush.0), "CreateSolidBrush")
    }

    /// A hatched brush.
    pub fn hatched(style: HatchStyle, color: Color) -> Result<GdiObject<Brush>> {
        // SAFETY: Plain values.
        let brush: HBRUSH = unsafe { CreateHatchBrush(style.to_native(), color.to_native()) };
        GdiObject::owned(HGDIOBJ(brush.0), "CreateHatchBrush")
    }

    /// A system stock brush.
    pub fn stock(kind: StockBrush) -> Result<GdiObject<Brush>> {
        GdiObject::stock(match kind {
            StockBrush::White => WHITE_BRUSH,
            StockBrush::Gray => GRAY_BRUSH,
            StockBrush::Black => BLACK_BRUSH,
            StockBrush::Null => NULL_BRUSH,
            StockBrush::DeviceContext => DC_BRUSH,
        })
    }
}

impl GdiObject<Brush> {
    /// The handle as an `HBRUSH`.
    pub fn as_brush(&self) -> HBRUSH {
        HBRUSH(self.raw.0)
    }
}

/// Describes a logical font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    /// Face name, such as `Segoe UI`.
    pub face_name: String,
    /// Character height in logical units; negative selects by em height.
    pub height: i32,
    /// Bold weight.
    pub bold: bool,
    /// Italic.
    pub italic: bool,
    /// Underlined.
    pub underline: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            face_name: "Segoe UI".to_string(),
            height: -12,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

impl Font {
    /// Creates a font matching `spec` as closely as the mapper can.
    pub fn new(spec: &FontSpec) -> Result<GdiObject<Font>> {
        let face = to_wide(&spec.face_name);
        if face.len() > 32 {
            return Err(Error::invalid_argument("font face name exceeds 31 characters"));
        }

        let mut logfont = LOGFONTW {
            lfHeight: spec.height,
            lfWeight: if spec.bold { FW_BOLD.0 as i32 } else { FW_NORMAL.0 as i32 },
            lfItalic: u8::from(spec.italic),
            lfUnderline: u8::from(spec.underline),
            ..Default::default()
        };
        logfont.lfFaceName[..face.len()].copy_from_slice(&face);

        // SAFETY: `logfont` outlives the call.
        let font: HFONT = unsafe { CreateFontIndirectW(&logfont) };
        GdiObject::owned(HGDIOBJ(font.0), "CreateFontIndirectW")
    }
}

impl Bitmap {
    /// A bitmap compatible with `dc`.
    pub fn compatible(dc: &DeviceContext, width: i32, height: i32) -> Result<GdiObject<Bitmap>> {
        // SAFETY: `dc` is alive.
        let bitmap: HBITMAP = unsafe { CreateCompatibleBitmap(dc.hdc, width, height) };
        GdiObject::owned(HGDIOBJ(bitmap.0), "CreateCompatibleBitmap")
    }
}

/// How [`Region::combine`] merges two regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionCombine {
    /// Intersection.
    And,
    /// Union.
    Or,
    /// Union minus intersection.
    Xor,
    /// Parts of the first not in the second.
    Diff,
    /// Copy of the first.
    Copy,
}

impl RegionCombine {
    fn to_native(self) -> RGN_COMBINE_MODE {
        match self {
            RegionCombine::And => RGN_AND,
            RegionCombine::Or => RGN_OR,
            RegionCombine::Xor => RGN_XOR,
            RegionCombine::Diff => RGN_DIFF,
            RegionCombine::Copy => RGN_COPY,
        }
    }
}

impl Region {
    /// A rectangular region.
    pub fn rectangle(bounds: RECT) -> Result<GdiObject<Region>> {
        // SAFETY: Plain values.
        let region = unsafe { CreateRectRgn(bounds.left, bounds.top, bounds.right, bounds.bottom) };
        GdiObject::owned(HGDIOBJ(region.0), "CreateRectRgn")
    }

    /// An elliptic region bounded by `bounds`.
    pub fn elliptic(bounds: RECT) -> Result<GdiObject<Region>> {
        // SAFETY: Plain values.
        let region =
            unsafe { CreateEllipticRgn(bounds.left, bounds.top, bounds.right, bounds.bottom) };
        GdiObject::owned(HGDIOBJ(region.0), "CreateEllipticRgn")
    }

    /// A new region combining `a` and `b`.
    pub fn combine(
        a: &GdiObject<Region>,
        b: &GdiObject<Region>,
        mode: RegionCombine,
    ) -> Result<GdiObject<Region>> {
        let result = Region::rectangle(RECT::default())?;
        // SAFETY: All three regions are alive.
        let kind = unsafe { CombineRgn(result.as_region(), a.as_region(), b.as_region(), mode.to_native()) };
        if kind.0 == 0 {
            return Err(Error::custom("CombineRgn failed"));
        }
        Ok(result)
    }
}

impl GdiObject<Region> {
    /// The handle as an `HRGN`.
    pub fn as_region(&self) -> HRGN {
        HRGN(self.raw.0)
    }

    /// Returns true if the point lies inside the region.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        // SAFETY: The region is alive.
        unsafe { PtInRegion(self.as_region(), x, y) }.as_bool()
    }

    /// The bounding rectangle; empty for an empty region.
    pub fn bounds(&self) -> Result<RECT> {
        let mut bounds = RECT::default();
        // SAFETY: `bounds` is a valid output location.
        let kind = unsafe { GetRgnBox(self.as_region(), &mut bounds) };
        if kind.0 == 0 {
            return Err(Error::custom("GetRgnBox failed"));
        }
        Ok(bounds)
    }
}

/// Restores the previously selected object when dropped.
pub struct SelectionGuard<'a> {
    hdc: HDC,
    previous: HGDIOBJ,
    _marker: PhantomData<&'a ()>,
}

impl Drop for SelectionGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: The DC is alive for 'a; `previous` was selected in it.
        unsafe {
            SelectObject(self.hdc, self.previous);
        }
    }
}

// ============================================================================
// Display enumeration
// ============================================================================

/// A display adapter or monitor from `EnumDisplayDevicesW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDevice {
    /// Device name, such as `\\.\DISPLAY1`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Device instance id.
    pub id: String,
    /// Registry key.
    pub key: String,
    /// Raw `DISPLAY_DEVICE_*` state flags.
    pub state_flags: u32,
}

impl DisplayDevice {
    /// Part of the desktop.
    pub fn is_attached_to_desktop(&self) -> bool {
        self.state_flags & DISPLAY_DEVICE_ATTACHED_TO_DESKTOP != 0
    }

    /// The primary display.
    pub fn is_primary(&self) -> bool {
        self.state_flags & DISPLAY_DEVICE_PRIMARY_DEVICE != 0
    }
}

/// Lists display adapters, or the monitors of `device` when given.
pub fn display_devices(device: Option<&str>) -> Result<Vec<DisplayDevice>> {
    let device = optional_wide(device);
    let name = optional_pcwstr(&device);
    let mut devices = Vec::new();

    for index in 0.. {
        let mut native = DISPLAY_DEVICEW {
            cb: size_of::<DISPLAY_DEVICEW>() as u32,
            ..Default::default()
        };

        // SAFETY: `native.cb` is set; the name outlives the call.
        if !unsafe { EnumDisplayDevicesW(name, index, &mut native, 0) }.as_bool() {
            break;
        }

        devices.push(DisplayDevice {
            name: from_wide(&native.DeviceName)?,
            description: from_wide(&native.DeviceString)?,
            id: from_wide(&native.DeviceID)?,
            key: from_wide(&native.DeviceKey)?,
            state_flags: native.StateFlags,
        });
    }

    Ok(devices)
}

/// Which modes [`display_settings`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySettingsMode {
    /// The mode in use now (exactly one entry).
    Current,
    /// The mode stored in the registry (exactly one entry).
    Registry,
    /// Every mode the device supports.
    All,
}

/// A display mode copied out of `DEVMODEW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMode {
    /// Device name (truncated to 31 characters by the system).
    pub device_name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color depth.
    pub bits_per_pixel: u32,
    /// Refresh rate in hertz.
    pub frequency: u32,
}

impl DeviceMode {
    fn from_native(mode: &DEVMODEW) -> Result<Self> {
        Ok(Self {
            device_name: from_wide(&mode.dmDeviceName)?,
            width: mode.dmPelsWidth,
            height: mode.dmPelsHeight,
            bits_per_pixel: mode.dmBitsPerPel,
            frequency: mode.dmDisplayFrequency,
        })
    }
}

fn enum_display_setting(device: PCWSTR, mode: ENUM_DISPLAY_SETTINGS_MODE) -> Result<Option<DeviceMode>> {
    let mut native = DEVMODEW {
        dmSize: size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };

    // SAFETY: `dmSize` is set; the name outlives the call.
    if !unsafe { EnumDisplaySettingsW(device, mode, &mut native) }.as_bool() {
        return Ok(None);
    }
    DeviceMode::from_native(&native).map(Some)
}

/// Lists display modes for `device` (or the current display for `None`).
pub fn display_settings(device: Option<&str>, mode: DisplaySettingsMode) -> Result<Vec<DeviceMode>> {
    let device = optional_wide(device);
    let name = optional_pcwstr(&device);

    let single = match mode {
        DisplaySettingsMode::Current => Some(ENUM_CURRENT_SETTINGS),
        DisplaySettingsMode::Registry => Some(ENUM_REGISTRY_SETTINGS),
        DisplaySettingsMode::All => None,
    };

    if let Some(single) = single {
        return match enum_display_setting(name, single)? {
            Some(found) => Ok(vec![found]),
            None => Err(Error::not_found("display settings")),
        };
    }

    let mut modes = Vec::new();
    for index in 0.. {
        match enum_display_setting(name, ENUM_DISPLAY_SETTINGS_MODE(index))? {
            Some(found) => modes.push(found),
            None => break,
        }
    }
    Ok(modes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devmode_layout() {
        assert_eq!(size_of::<DEVMODEW>(), 220);
    }

    #[test]
    fn test_color_components() {
        let color = Color::rgb(0x12, 0x34, 0x56);
        assert_eq!(color.0, 0x0056_3412);
        assert_eq!((color.r(), color.g(), color.b()), (0x12, 0x34, 0x56));
    }

    #[test]
    fn test_screen_capabilities() {
        let screen = DeviceContext::for_screen().unwrap();
        assert!(screen.device_capability(DeviceCapability::HorizontalResolution) > 0);
        assert!(screen.device_capability(DeviceCapability::LogicalPixelsX) > 0);
        assert_eq!(screen.map_mode().unwrap(), MapMode::Text);
        assert!(screen.text_metrics().unwrap().height > 0);
    }

    #[test]
    fn test_setters_return_previous() {
        let dc = DeviceContext::compatible(None).unwrap();
        let original = dc.text_color().unwrap();
        assert_eq!(dc.set_text_color(Color::RED).unwrap(), original);
        assert_eq!(dc.text_color().unwrap(), Color::RED);

        assert_eq!(
            dc.set_background_mode(BackgroundMode::Transparent).unwrap(),
            BackgroundMode::Opaque
        );
        assert_eq!(dc.background_mode().unwrap(), BackgroundMode::Transparent);

        assert_eq!(dc.set_map_mode(MapMode::LowMetric).unwrap(), MapMode::Text);
        assert_eq!(dc.set_poly_fill_mode(PolyFillMode::Winding).unwrap(), PolyFillMode::Alternate);
        assert_eq!(dc.set_raster_operation(MixMode::XorPen).unwrap(), MixMode::CopyPen);
    }

    #[test]
    fn test_draw_into_memory_bitmap() {
        let dc = DeviceContext::compatible(None).unwrap();
        let bitmap = Bitmap::compatible(&DeviceContext::for_screen().unwrap(), 16, 16).unwrap();
        let _bitmap = dc.select(&bitmap).unwrap();

        let red = Brush::solid(Color::RED).unwrap();
        dc.fill_rectangle(rect(0, 0, 16, 16), &red).unwrap();
        assert_eq!(dc.get_pixel(4, 4).unwrap(), Color::RED);

        dc.set_pixel(1, 1, Color::BLUE).unwrap();
        assert_eq!(dc.get_pixel(1, 1).unwrap(), Color::BLUE);

        dc.invert_rectangle(rect(0, 0, 2, 2)).unwrap();
        assert_eq!(dc.get_pixel(0, 0).unwrap(), Color::rgb(0, 255, 255));

        assert_eq!(dc.clip_box().unwrap(), rect(0, 0, 16, 16));
    }

    #[test]
    fn test_lines_and_shapes() {
        let dc = DeviceContext::compatible(None).unwrap();
        let bitmap = Bitmap::compatible(&DeviceContext::for_screen().unwrap(), 32, 32).unwrap();
        let _bitmap = dc.select(&bitmap).unwrap();

        let white = Brush::stock(StockBrush::White).unwrap();
        assert!(white.is_stock());
        dc.fill_rectangle(rect(0, 0, 32, 32), &white).unwrap();

        let pen = Pen::new(PenStyle::Solid, 1, Color::GREEN).unwrap();
        {
            let _pen = dc.select(&pen).unwrap();
            dc.move_to(0, 10).unwrap();
            dc.line_to(20, 10).unwrap();
            assert_eq!(dc.get_pixel(5, 10).unwrap(), Color::GREEN);

            let points = [POINT { x: 0, y: 20 }, POINT { x: 10, y: 20 }];
            dc.polyline(&points).unwrap();
        }

        dc.rectangle(rect(2, 2, 8, 8)).unwrap();
        dc.ellipse(rect(10, 10, 20, 20)).unwrap();
        dc.round_rectangle(rect(20, 0, 30, 8), 3, 3).unwrap();
        dc.frame_rectangle(rect(0, 24, 8, 30), &Brush::solid(Color::BLACK).unwrap())
            .unwrap();
        assert_eq!(dc.get_pixel(0, 24).unwrap(), Color::BLACK);
    }

    #[test]
    fn test_text_drawing() {
        let dc = DeviceContext::compatible(None).unwrap();
        let font = Font::new(&FontSpec::default()).unwrap();
        let _font = dc.select(&font).unwrap();

        let extent = dc.text_extent("Hello").unwrap();
        assert!(extent.cx > 0 && extent.cy > 0);

        let mut bounds = rect(0, 0, 1000, 1000);
        let height = dc
            .draw_text(
                "Hello",
                &mut bounds,
                DrawTextFormat::CALC_RECT.with(DrawTextFormat::SINGLE_LINE),
            )
            .unwrap();
        assert!(height > 0);
        assert_eq!(bounds.right - bounds.left, extent.cx);
        dc.text_out(0, 0, "Hello").unwrap();
    }

    #[test]
    fn test_bit_blt_copies_pixels() {
        let screen = DeviceContext::for_screen().unwrap();
        let source = DeviceContext::compatible(Some(&screen)).unwrap();
        let target = DeviceContext::compatible(Some(&screen)).unwrap();
        let a = Bitmap::compatible(&screen, 8, 8).unwrap();
        let b = Bitmap::compatible(&screen, 8, 8).unwrap();
        let _a = source.select(&a).unwrap();
        let _b = target.select(&b).unwrap();

        source.bit_blt(0, 0, 8, 8, None, 0, 0, RasterOperation::Whiteness).unwrap();
        target.bit_blt(0, 0, 8, 8, Some(&source), 0, 0, RasterOperation::SourceCopy).unwrap();
        assert_eq!(target.get_pixel(3, 3).unwrap(), Color::WHITE);
    }

    #[test]
    fn test_regions() {
        let left = Region::rectangle(rect(0, 0, 10, 10)).unwrap();
        let right = Region::rectangle(rect(5, 0, 15, 10)).unwrap();

        let both = Region::combine(&left, &right, RegionCombine::And).unwrap();
        assert_eq!(both.bounds().unwrap(), rect(5, 0, 10, 10));
        assert!(both.contains(7, 5));
        assert!(!both.contains(2, 5));

        let either = Region::combine(&left, &right, RegionCombine::Or).unwrap();
        assert_eq!(either.bounds().unwrap(), rect(0, 0, 15, 10));

        let ellipse = Region::elliptic(rect(0, 0, 10, 10)).unwrap();
        assert!(ellipse.contains(5, 5));
        assert!(!ellipse.contains(0, 0));
    }

    #[test]
    fn test_clip_region_limits_clip_box() {
        let dc = DeviceContext::compatible(None).unwrap();
        let bitmap = Bitmap::compatible(&DeviceContext::for_screen().unwrap(), 16, 16).unwrap();
        let _bitmap = dc.select(&bitmap).unwrap();
        let clip = Region::rectangle(rect(2, 2, 6, 6)).unwrap();

        dc.select_clip_region(Some(&clip)).unwrap();
        assert_eq!(dc.clip_box().unwrap(), rect(2, 2, 6, 6));
        dc.select_clip_region(None).unwrap();
        assert_eq!(dc.clip_box().unwrap(), rect(0, 0, 16, 16));
    }

    #[test]
    fn test_current_display_settings_is_single_entry() {
        let modes = display_settings(None, DisplaySettingsMode::Current).unwrap();
        assert_eq!(modes.len(), 1);
        assert!(modes[0].width > 0 && modes[0].height > 0);
    }

    #[test]
    fn test_display_devices_have_names() {
        for device in display_devices(None).unwrap() {
            assert!(device.name.starts_with(r"\\.\"));
        }
    }

    #[test]
    fn test_information_context_queries() {
        let info = DeviceContext::create_information(None).unwrap();
        assert!(info.device_capability(DeviceCapability::BitsPerPixel) > 0);
    }
}
