use glam::UVec2;
use wgpu::{CompositeAlphaMode, Device, PresentMode, Surface, SurfaceConfiguration, TextureFormat, TextureUsages};

/// Frames the presentation engine may queue ahead of the one being recorded.
pub const DESIRED_FRAME_LATENCY: u32 = 2;

pub fn configure_surface(
    surface: &Surface<'_>,
    device: &Device,
    format: TextureFormat,
    size: UVec2,
    present_mode: PresentMode,
) {
    log::debug!("Configuring surface as {}x{} {:?} {:?}", size.x, size.y, format, present_mode);
    surface.configure(
        device,
        &SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.x.max(1),
            height: size.y.max(1),
            present_mode,
            desired_maximum_frame_latency: DESIRED_FRAME_LATENCY,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        },
    )
}
