//! DirectX Graphics Infrastructure.
//!
//! Provides adapter and output enumeration through [`Factory`], with plain
//! Rust projections of the native descriptors.

use crate::error::{Error, Result};
use crate::string::from_wide;
use crate::window::WindowHandle;
use windows::Win32::Foundation::{LUID, RECT};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
    DXGI_FORMAT_R10G10B10A2_UNORM, DXGI_FORMAT_R16G16B16A16_FLOAT, DXGI_FORMAT_R8G8B8A8_UNORM,
    DXGI_FORMAT_R8G8B8A8_UNORM_SRGB, DXGI_FORMAT_UNKNOWN, DXGI_MODE_DESC, DXGI_MODE_ROTATION,
    DXGI_MODE_ROTATION_IDENTITY, DXGI_MODE_ROTATION_ROTATE180, DXGI_MODE_ROTATION_ROTATE270,
    DXGI_MODE_ROTATION_ROTATE90,
};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, IDXGIAdapter1, IDXGIFactory1, IDXGIOutput, DXGI_ADAPTER_FLAG_SOFTWARE,
    DXGI_ENUM_MODES, DXGI_ENUM_MODES_INTERLACED, DXGI_ENUM_MODES_SCALING, DXGI_ERROR_MORE_DATA,
    DXGI_ERROR_NOT_FOUND, DXGI_MWA_FLAGS, DXGI_MWA_NO_ALT_ENTER, DXGI_MWA_NO_PRINT_SCREEN, DXGI_MWA_NO_WINDOW_CHANGES,
};

/// Calls `next(index)` for 0, 1, 2, ... until it reports `DXGI_ERROR_NOT_FOUND`.
fn enumerate<T>(mut next: impl FnMut(u32) -> windows::core::Result<T>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for index in 0.. {
        match next(index) {
            Ok(item) => items.push(item),
            Err(error) if error.code() == DXGI_ERROR_NOT_FOUND => break,
            Err(error) => return Err(error.into()),
        }
    }
    Ok(items)
}

/// A subset of `DXGI_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// `DXGI_FORMAT_UNKNOWN`
    Unknown,
    /// `DXGI_FORMAT_R8G8B8A8_UNORM`
    R8G8B8A8Unorm,
    /// `DXGI_FORMAT_R8G8B8A8_UNORM_SRGB`
    R8G8B8A8UnormSrgb,
    /// `DXGI_FORMAT_B8G8R8A8_UNORM`
    B8G8R8A8Unorm,
    /// `DXGI_FORMAT_B8G8R8A8_UNORM_SRGB`
    B8G8R8A8UnormSrgb,
    /// `DXGI_FORMAT_R10G10B10A2_UNORM`
    R10G10B10A2Unorm,
    /// `DXGI_FORMAT_R16G16B16A16_FLOAT`
    R16G16B16A16Float,
    /// Any other raw value.
    Other(i32),
}

impl Format {
    const TABLE: [(DXGI_FORMAT, Format); 7] = [
        (DXGI_FORMAT_UNKNOWN, Format::Unknown),
        (DXGI_FORMAT_R8G8B8A8_UNORM, Format::R8G8B8A8Unorm),
        (DXGI_FORMAT_R8G8B8A8_UNORM_SRGB, Format::R8G8B8A8UnormSrgb),
        (DXGI_FORMAT_B8G8R8A8_UNORM, Format::B8G8R8A8Unorm),
        (DXGI_FORMAT_B8G8R8A8_UNORM_SRGB, Format::B8G8R8A8UnormSrgb),
        (DXGI_FORMAT_R10G10B10A2_UNORM, Format::R10G10B10A2Unorm),
        (DXGI_FORMAT_R16G16B16A16_FLOAT, Format::R16G16B16A16Float),
    ];

    /// Converts to the native value.
    pub fn to_native(self) -> DXGI_FORMAT {
        match self {
            Format::Other(raw) => DXGI_FORMAT(raw),
            known => Self::TABLE
                .iter()
                .find(|(_, format)| *format == known)
                .map_or(DXGI_FORMAT_UNKNOWN, |(native, _)| *native),
        }
    }

    /// Converts from the native value.
    pub fn from_native(native: DXGI_FORMAT) -> Self {
        Self::TABLE
            .iter()
            .find(|(raw, _)| *raw == native)
            .map_or(Format::Other(native.0), |(_, format)| *format)
    }
}

/// Output orientation (`DXGI_MODE_ROTATION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRotation {
    /// Not specified.
    Unspecified,
    /// No rotation.
    Identity,
    /// 90 degrees.
    Rotate90,
    /// 180 degrees.
    Rotate180,
    /// 270 degrees.
    Rotate270,
}

impl ModeRotation {
    fn from_native(native: DXGI_MODE_ROTATION) -> Self {
        match native {
            DXGI_MODE_ROTATION_IDENTITY => ModeRotation::Identity,
            DXGI_MODE_ROTATION_ROTATE90 => ModeRotation::Rotate90,
            DXGI_MODE_ROTATION_ROTATE180 => ModeRotation::Rotate180,
            DXGI_MODE_ROTATION_ROTATE270 => ModeRotation::Rotate270,
            _ => ModeRotation::Unspecified,
        }
    }
}

/// `DXGI_MWA_*` flags for [`Factory::make_window_association`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowAssociation(pub u32);

impl WindowAssociation {
    /// Let DXGI monitor the message queue.
    pub const NONE: Self = Self(0);
    /// Do not monitor the message queue at all.
    pub const NO_WINDOW_CHANGES: Self = Self(DXGI_MWA_NO_WINDOW_CHANGES.0);
    /// Ignore Alt+Enter.
    pub const NO_ALT_ENTER: Self = Self(DXGI_MWA_NO_ALT_ENTER.0);
    /// Ignore Print Screen.
    pub const NO_PRINT_SCREEN: Self = Self(DXGI_MWA_NO_PRINT_SCREEN.0);

    /// Adds a flag.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// `DXGI_ENUM_MODES_*` flags for [`Output::display_modes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags(pub u32);

impl ModeFlags {
    /// Progressive, unscaled modes only.
    pub const NONE: Self = Self(0);
    /// Include interlaced modes.
    pub const INTERLACED: Self = Self(DXGI_ENUM_MODES_INTERLACED.0);
    /// Include stretched modes.
    pub const SCALING: Self = Self(DXGI_ENUM_MODES_SCALING.0);

    /// Adds a flag.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A DXGI factory.
#[derive(Clone)]
pub struct Factory {
    factory: IDXGIFactory1,
}

impl Factory {
    /// Creates a factory (`CreateDXGIFactory1`).
    pub fn new() -> Result<Self> {
        // SAFETY: No arguments besides the requested interface.
        let factory = unsafe { CreateDXGIFactory1::<IDXGIFactory1>()? };
        Ok(Self { factory })
    }

    /// Every adapter, in enumeration order (index 0 is the primary adapter).
    pub fn adapters(&self) -> Result<Vec<Adapter>> {
        // SAFETY: Plain interface call.
        enumerate(|index| unsafe { self.factory.EnumAdapters1(index) })
            .map(|adapters| adapters.into_iter().map(|adapter| Adapter { adapter }).collect())
    }

    /// Lets DXGI watch `window` for fullscreen transitions.
    pub fn make_window_association(
        &self,
        window: WindowHandle,
        flags: WindowAssociation,
    ) -> Result<()> {
        // SAFETY: DXGI only records the handle.
        unsafe {
            self.factory
                .MakeWindowAssociation(window.as_raw(), DXGI_MWA_FLAGS(flags.0))?
        };
        Ok(())
    }

    /// The window last passed to [`make_window_association`](Self::make_window_association).
    pub fn window_association(&self) -> Result<Option<WindowHandle>> {
        // SAFETY: Plain interface call.
        let hwnd = unsafe { self.factory.GetWindowAssociation()? };
        Ok((!hwnd.is_invalid()).then(|| WindowHandle::from_raw(hwnd)))
    }
}

/// `DXGI_ADAPTER_DESC1` projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDesc {
    /// Adapter name.
    pub description: String,
    /// PCI vendor id.
    pub vendor_id: u32,
    /// PCI device id.
    pub device_id: u32,
    /// PCI subsystem id.
    pub sub_sys_id: u32,
    /// PCI revision.
    pub revision: u32,
    /// Bytes of video memory not shared with the CPU.
    pub dedicated_video_memory: usize,
    /// Bytes of system memory reserved for the adapter.
    pub dedicated_system_memory: usize,
    /// Bytes of system memory shareable with the adapter.
    pub shared_system_memory: usize,
    /// Locally unique id of the adapter.
    pub luid: LUID,
    /// `DXGI_ADAPTER_FLAG` bits.
    pub flags: u32,
}

/// A display adapter.
#[derive(Clone)]
pub struct Adapter {
    adapter: IDXGIAdapter1,
}

impl Adapter {
    /// Describes the adapter.
    pub fn desc(&self) -> Result<AdapterDesc> {
        // SAFETY: Plain interface call.
        let desc = unsafe { self.adapter.GetDesc1()? };
        Ok(AdapterDesc {
            description: from_wide(&desc.Description)?,
            vendor_id: desc.VendorId,
            device_id: desc.DeviceId,
            sub_sys_id: desc.SubSysId,
            revision: desc.Revision,
            dedicated_video_memory: desc.DedicatedVideoMemory,
            dedicated_system_memory: desc.DedicatedSystemMemory,
            shared_system_memory: desc.SharedSystemMemory,
            luid: desc.AdapterLuid,
            flags: desc.Flags,
        })
    }

    /// True for software rasterizers such as WARP.
    pub fn is_software(&self) -> Result<bool> {
        Ok(self.desc()?.flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0)
    }

    /// The outputs (monitors) attached to this adapter.
    pub fn outputs(&self) -> Result<Vec<Output>> {
        // SAFETY: Plain interface call.
        enumerate(|index| unsafe { self.adapter.EnumOutputs(index) })
            .map(|outputs| outputs.into_iter().map(|output| Output { output }).collect())
    }
}

/// `DXGI_OUTPUT_DESC` projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDesc {
    /// GDI device name, e.g. `\\.\DISPLAY1`.
    pub device_name: String,
    /// Bounds in desktop coordinates.
    pub desktop_coordinates: RECT,
    /// Whether the output is part of the desktop.
    pub attached_to_desktop: bool,
    /// Current orientation.
    pub rotation: ModeRotation,
}

/// `DXGI_MODE_DESC` projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Refresh rate numerator.
    pub refresh_numerator: u32,
    /// Refresh rate denominator.
    pub refresh_denominator: u32,
    /// Pixel format.
    pub format: Format,
}

impl ModeDesc {
    /// Refresh rate in hertz, or 0 when unspecified.
    pub fn refresh_rate(&self) -> f64 {
        if self.refresh_denominator == 0 {
            0.0
        } else {
            f64::from(self.refresh_numerator) / f64::from(self.refresh_denominator)
        }
    }

    fn from_native(mode: &DXGI_MODE_DESC) -> Self {
        Self {
            width: mode.Width,
            height: mode.Height,
            refresh_numerator: mode.RefreshRate.Numerator,
            refresh_denominator: mode.RefreshRate.Denominator,
            format: Format::from_native(mode.Format),
        }
    }
}

/// A monitor attached to an adapter.
#[derive(Clone)]
pub struct Output {
    output: IDXGIOutput,
}

impl Output {
    /// Describes the output.
    pub fn desc(&self) -> Result<OutputDesc> {
        // SAFETY: Plain interface call.
        let desc = unsafe { self.output.GetDesc()? };
        Ok(OutputDesc {
            device_name: from_wide(&desc.DeviceName)?,
            desktop_coordinates: desc.DesktopCoordinates,
            attached_to_desktop: desc.AttachedToDesktop.as_bool(),
            rotation: ModeRotation::from_native(desc.Rotation),
        })
    }

    /// Display modes matching `format`.
    pub fn display_modes(&self, format: Format, flags: ModeFlags) -> Result<Vec<ModeDesc>> {
        if format == Format::Unknown {
            return Err(Error::invalid_argument("display modes need a concrete format"));
        }

        let format = format.to_native();
        let flags = DXGI_ENUM_MODES(flags.0);

        // The count can change between calls when a mode switch races us;
        // DXGI then reports DXGI_ERROR_MORE_DATA and we ask again.
        loop {
            let mut count = 0u32;
            // SAFETY: Count-only query.
            unsafe { self.output.GetDisplayModeList(format, flags, &mut count, None)? };
            if count == 0 {
                return Ok(Vec::new());
            }

            let mut modes = vec![DXGI_MODE_DESC::default(); count as usize];
            // SAFETY: `modes` holds `count` entries.
            let filled = unsafe {
                self.output
                    .GetDisplayModeList(format, flags, &mut count, Some(modes.as_mut_ptr()))
            };
            match filled {
                Ok(()) => {
                    modes.truncate(count as usize);
                    tracing::trace!(count, "enumerated display modes");
                    return Ok(modes.iter().map(ModeDesc::from_native).collect());
                }
                Err(error) if error.code() == DXGI_ERROR_MORE_DATA => continue,
                Err(error) => return Err(error.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{DefaultHandler, Style, WindowBuilder, WindowClass};

    #[test]
    fn test_format_mapping() {
        assert_eq!(
            Format::from_native(DXGI_FORMAT_B8G8R8A8_UNORM),
            Format::B8G8R8A8Unorm
        );
        assert_eq!(Format::R16G16B16A16Float.to_native(), DXGI_FORMAT_R16G16B16A16_FLOAT);
        assert_eq!(Format::from_native(DXGI_FORMAT(2)), Format::Other(2));
        assert_eq!(Format::Other(2).to_native(), DXGI_FORMAT(2));
    }

    #[test]
    fn test_adapters_enumerate() {
        let factory = Factory::new().unwrap();
        let adapters = factory.adapters().unwrap();

        // The Basic Render Driver is always present.
        assert!(!adapters.is_empty());
        assert!(adapters.iter().any(|a| a.is_software().unwrap()));

        for adapter in &adapters {
            let desc = adapter.desc().unwrap();
            assert!(!desc.description.is_empty());
        }
    }

    #[test]
    fn test_outputs_and_modes() {
        let factory = Factory::new().unwrap();
        for adapter in factory.adapters().unwrap() {
            for output in adapter.outputs().unwrap() {
                let desc = output.desc().unwrap();
                assert!(desc.device_name.starts_with(r"\\.\"));

                let modes = output
                    .display_modes(Format::R8G8B8A8Unorm, ModeFlags::NONE)
                    .unwrap();
                assert!(modes.iter().all(|m| m.format == Format::R8G8B8A8Unorm));
            }
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        let factory = Factory::new().unwrap();
        let output = factory
            .adapters()
            .unwrap()
            .into_iter()
            .find_map(|adapter| adapter.outputs().unwrap().into_iter().next());

        if let Some(output) = output {
            let result = output.display_modes(Format::Unknown, ModeFlags::NONE);
            assert!(matches!(result, Err(Error::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_window_association() {
        let factory = Factory::new().unwrap();
        assert_eq!(factory.window_association().unwrap(), None);

        let class = WindowClass::new().register().unwrap();
        let window = WindowBuilder::new(&class)
            .style(Style::POPUP)
            .build(DefaultHandler)
            .unwrap();

        factory
            .make_window_association(
                window.handle(),
                WindowAssociation::NO_ALT_ENTER.with(WindowAssociation::NO_PRINT_SCREEN),
            )
            .unwrap();
        assert_eq!(factory.window_association().unwrap(), Some(window.handle()));
    }

    #[test]
    fn test_refresh_rate() {
        let mode = ModeDesc {
            width: 1920,
            height: 1080,
            refresh_numerator: 60000,
            refresh_denominator: 1001,
            format: Format::B8G8R8A8Unorm,
        };
        assert!((mode.refresh_rate() - 59.94).abs() < 0.01);
        assert_eq!(ModeDesc { refresh_denominator: 0, ..mode }.refresh_rate(), 0.0);
    }
}
