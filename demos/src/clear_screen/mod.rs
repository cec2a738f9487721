use glam::UVec2;
use lumen::{
    pass::{ColorTarget, PassSkeleton, Viewport},
    wgpu::{Color, Queue, TextureView},
    Example, FrameContext, FrameEncoder, FrameError, InitializationError, SetupContext,
};
use lumen_framework::{ExampleSettings, LaunchOptions};

const SETTINGS: ExampleSettings = ExampleSettings {
    title: "Clear Screen",
    size: UVec2::new(1280, 720),
};

/// Seconds for one trip around the color wheel.
const CYCLE_SECONDS: f32 = 6.0;

fn clear_color(elapsed: f32) -> Color {
    let phase = elapsed / CYCLE_SECONDS * std::f32::consts::TAU;
    let channel = |offset: f32| (0.5 + 0.5 * (phase + offset).sin()) as f64;
    Color {
        r: channel(0.0),
        g: channel(std::f32::consts::TAU / 3.0),
        b: channel(2.0 * std::f32::consts::TAU / 3.0),
        a: 1.0,
    }
}

pub struct ClearScreen {
    pass: PassSkeleton,
    color: Color,
}

impl ClearScreen {
    fn new(resolution: UVec2) -> Self {
        Self {
            pass: PassSkeleton {
                label: "clear screen".into(),
                color: Some(ColorTarget::clear(clear_color(0.0))),
                depth: None,
                viewport: Viewport::full(resolution),
            },
            color: clear_color(0.0),
        }
    }

    fn advance(&mut self, elapsed: f32) {
        self.color = clear_color(elapsed);
    }

    /// The stored skeleton with this frame's clear color.
    fn frame_pass(&self) -> PassSkeleton {
        PassSkeleton {
            color: Some(ColorTarget::clear(self.color)),
            ..self.pass.clone()
        }
    }
}

impl Example for ClearScreen {
    const NAME: &'static str = "clear_screen";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        Ok(Self::new(ctx.resolution))
    }

    fn resize(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), InitializationError> {
        self.pass.viewport = Viewport::full(ctx.resolution);
        Ok(())
    }

    fn update(&mut self, _queue: &Queue, frame: &FrameContext) {
        self.advance(frame.elapsed);
    }

    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, _frame: &FrameContext) -> Result<(), FrameError> {
        let pass = self.frame_pass();
        drop(encoder.render_pass(&pass, target));
        Ok(())
    }
}

pub fn main(options: LaunchOptions) -> anyhow::Result<()> {
    lumen_framework::start::<ClearScreen>(SETTINGS, options, crate::assets())
}
