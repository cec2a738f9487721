//! Opens a window and drives a single [`Example`] until the window closes.
//!
//! Space toggles pause, Escape quits, and every other character key is
//! forwarded to the example.

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::{UVec2, Vec2};
use lumen::{AssetLoader, Example, FrameInput, FrameOrchestrator};
use wgpu::{Backend, PresentMode, Surface, SurfaceError, TextureFormat, TextureViewDescriptor};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{EventLoop, EventLoopWindowTarget},
    keyboard::{Key, NamedKey},
    window::{Window, WindowBuilder},
};

/// Per-example window defaults.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExampleSettings {
    pub title: &'static str,
    pub size: UVec2,
}

impl Default for ExampleSettings {
    fn default() -> Self {
        Self {
            title: "lumen",
            size: UVec2::new(1280, 720),
        }
    }
}

/// Choices made on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub backend: Option<Backend>,
    pub device: Option<String>,
    pub present_mode: PresentMode,
    /// Overrides [`ExampleSettings::size`].
    pub size: Option<UVec2>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            backend: None,
            device: None,
            present_mode: PresentMode::Fifo,
            size: None,
        }
    }
}

pub fn register_logger() {
    if env_logger::try_init().is_err() {
        log::debug!("Logger already registered");
    }
}

pub fn register_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("{}", info);
        default_hook(info);
    }));
}

/// Picks the requested present mode if the surface supports it, falling back to FIFO which is always available.
pub fn choose_present_mode(requested: PresentMode, supported: &[PresentMode]) -> PresentMode {
    if supported.contains(&requested) {
        requested
    } else {
        log::warn!("Present mode {:?} unsupported, using Fifo", requested);
        PresentMode::Fifo
    }
}

/// Prefers an sRGB format so examples can write linear colors.
pub fn choose_surface_format(supported: &[TextureFormat]) -> Option<TextureFormat> {
    supported
        .iter()
        .copied()
        .find(TextureFormat::is_srgb)
        .or_else(|| supported.first().copied())
}

struct SurfaceState {
    surface: Surface<'static>,
    format: TextureFormat,
    present_mode: PresentMode,
    size: UVec2,
}

impl SurfaceState {
    fn configure(&self, device: &wgpu::Device) {
        lumen::configure_surface(&self.surface, device, self.format, self.size, self.present_mode);
    }
}

fn create_window(event_loop: &EventLoop<()>, title: &str, size: UVec2) -> anyhow::Result<Arc<Window>> {
    profiling::scope!("creating window");

    // Invisible until the example is ready to render.
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(size.x, size.y))
        .with_visible(false)
        .build(event_loop)
        .context("Could not build window")?;
    Ok(Arc::new(window))
}

pub async fn async_start<E: Example>(
    settings: ExampleSettings,
    options: LaunchOptions,
    assets: AssetLoader,
) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Could not create event loop")?;
    let window = create_window(&event_loop, settings.title, options.size.unwrap_or(settings.size))?;
    let window_size = window.inner_size();

    let iad = lumen::create_iad(options.backend, options.device.clone())
        .await
        .context("Could not find a usable GPU")?;
    log::info!("Running {} on {} ({:?})", E::NAME, iad.info.name, iad.info.backend);

    let surface = iad
        .instance
        .create_surface(Arc::clone(&window))
        .map_err(|e| anyhow::anyhow!("Could not create surface: {}", e))?;
    let caps = surface.get_capabilities(&iad.adapter);
    let format = choose_surface_format(&caps.formats).context("Surface supports no formats on this adapter")?;

    let surface = SurfaceState {
        surface,
        format,
        present_mode: choose_present_mode(options.present_mode, &caps.present_modes),
        size: UVec2::new(window_size.width, window_size.height),
    };
    surface.configure(&iad.device);

    let mut orchestrator = FrameOrchestrator::<E>::new(
        Arc::clone(&iad.device),
        Arc::clone(&iad.queue),
        format,
        surface.size,
    );
    orchestrator
        .initialize(&assets)
        .with_context(|| format!("Could not initialize {}", E::NAME))?;

    window.set_visible(true);

    let mut runner = Runner {
        window: Arc::clone(&window),
        device: Arc::clone(&iad.device),
        assets,
        surface,
        orchestrator,
        last_frame: Instant::now(),
        cursor: None,
        minimized: false,
        failure: None,
    };

    event_loop
        .run(|event, elwt| runner.handle_event(event, elwt))
        .context("Event loop failed")?;

    match runner.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct Runner<E: Example> {
    window: Arc<Window>,
    device: Arc<wgpu::Device>,
    assets: AssetLoader,
    surface: SurfaceState,
    orchestrator: FrameOrchestrator<E>,
    last_frame: Instant,
    cursor: Option<Vec2>,
    minimized: bool,
    failure: Option<anyhow::Error>,
}

impl<E: Example> Runner<E> {
    fn fail(&mut self, error: anyhow::Error, elwt: &EventLoopWindowTarget<()>) {
        log::error!("{:#}", error);
        self.failure = Some(error);
        elwt.exit();
    }

    fn handle_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
        match event {
            Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
                self.handle_window_event(event, elwt)
            }
            Event::AboutToWait => self.window.request_redraw(),
            Event::LoopExiting => self.orchestrator.destroy(),
            _ => {}
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => self.resize(UVec2::new(size.width, size.height), elwt),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match logical_key {
                Key::Named(NamedKey::Escape) => elwt.exit(),
                Key::Named(NamedKey::Space) => {
                    let paused = self.orchestrator.toggle_paused();
                    log::info!("{}", if paused { "Paused" } else { "Resumed" });
                }
                Key::Character(text) => {
                    for key in text.chars() {
                        self.orchestrator.on_key(key);
                    }
                }
                _ => {}
            },
            WindowEvent::RedrawRequested => self.redraw(elwt),
            _ => {}
        }
    }

    fn resize(&mut self, size: UVec2, elwt: &EventLoopWindowTarget<()>) {
        log::debug!("resize {:?}", size);
        if size.x == 0 || size.y == 0 {
            self.minimized = true;
            return;
        }
        self.minimized = false;

        self.surface.size = size;
        self.surface.configure(&self.device);
        if let Err(e) = self.orchestrator.resize(size, &self.assets) {
            self.fail(anyhow::Error::new(e).context("Could not resize"), elwt);
        }
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        if self.minimized {
            return;
        }

        let frame = match self.surface.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device);
                return;
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring the next frame");
                return;
            }
            Err(e) => {
                self.fail(anyhow::Error::new(e).context("Could not acquire frame"), elwt);
                return;
            }
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());

        let now = Instant::now();
        let delta_t = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let input = FrameInput {
            delta_t,
            cursor: self.cursor,
        };
        match self.orchestrator.tick(&view, input) {
            Ok(_) => {
                self.window.pre_present_notify();
                frame.present();
            }
            Err(e) => self.fail(anyhow::Error::new(e).context("Frame failed"), elwt),
        }
    }
}

pub fn start<E: Example>(settings: ExampleSettings, options: LaunchOptions, assets: AssetLoader) -> anyhow::Result<()> {
    register_logger();
    register_panic_hook();

    pollster::block_on(async_start::<E>(settings, options, assets))
}

#[cfg(test)]
mod tests {
    use wgpu::{PresentMode, TextureFormat};

    use super::{choose_present_mode, choose_surface_format};

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let supported = [PresentMode::Fifo, PresentMode::Immediate];
        assert_eq!(choose_present_mode(PresentMode::Mailbox, &supported), PresentMode::Fifo);
        assert_eq!(choose_present_mode(PresentMode::Immediate, &supported), PresentMode::Immediate);
    }

    #[test]
    fn srgb_surface_format_preferred() {
        let supported = [TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb];
        assert_eq!(choose_surface_format(&supported), Some(TextureFormat::Bgra8UnormSrgb));
        assert_eq!(choose_surface_format(&[TextureFormat::Rgba16Float]), Some(TextureFormat::Rgba16Float));
        assert_eq!(choose_surface_format(&[]), None);
    }
}
