//! Native window platform.
//!
//! Owns the `winit` EventLoop and Window. The loop is pumped once per frame
//! instead of handing control to `run_app`, so the render loop keeps driving.

mod config;
mod platform;

pub use config::WindowConfig;
pub use platform::WinitPlatform;

use crate::device::{GpuInit, WgpuDevice};
use crate::platform::PlatformError;

/// Opens a window and a wgpu device presenting to it.
pub fn open(
    config: WindowConfig,
    gpu: GpuInit,
) -> Result<(WinitPlatform, WgpuDevice), PlatformError> {
    let platform = WinitPlatform::new(config)?;
    let device = WgpuDevice::create(platform.window(), gpu)
        .map_err(|e| PlatformError::Init(format!("{e:#}")))?;
    Ok((platform, device))
}
