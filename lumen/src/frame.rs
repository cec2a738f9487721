//! Example lifecycle and per-frame command recording.
//!
//! A [`FrameOrchestrator`] owns one [`Example`] together with the
//! [`ResourceTable`] holding everything the example created. Each call to
//! [`FrameOrchestrator::tick`] records all of the example's passes into a
//! single command encoder and submits it once.

use std::sync::Arc;

use glam::{UVec2, Vec2};
use wgpu::{
    CommandBuffer, CommandEncoder, CommandEncoderDescriptor, ComputePass, ComputePassDescriptor, Device, LoadOp, Queue,
    RenderPass, SubmissionIndex, TextureFormat, TextureView,
};

use crate::{
    assets::AssetLoader,
    error::{FrameError, InitializationError},
    pass::{PassSkeleton, Viewport},
    resources::{ResourceBuilder, ResourceTable},
    util::{error_scope::ErrorScope, typedefs::SsoString},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    Prepared,
    Rendering,
    Destroyed,
}

/// Everything an example may use while creating or recreating its resources.
pub struct SetupContext<'a> {
    pub resources: ResourceBuilder<'a>,
    pub assets: &'a AssetLoader,
    pub surface_format: TextureFormat,
    pub resolution: UVec2,
}

/// Timing and input for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameContext {
    pub frame_index: u64,
    pub resolution: UVec2,
    /// Seconds of unpaused time since initialization.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta_t: f32,
    /// Cursor position in pixels, if it is over the window.
    pub cursor: Option<Vec2>,
    pub paused: bool,
}

/// Per-frame input handed to [`FrameOrchestrator::tick`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub delta_t: f32,
    pub cursor: Option<Vec2>,
}

/// A self-contained demo driven by a [`FrameOrchestrator`].
pub trait Example: Sized {
    /// Registry name, also used to label the example's command encoders.
    const NAME: &'static str;

    /// Creates every resource the example needs. Failure leaves nothing behind.
    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError>;

    /// Recreates resolution dependent resources. `ctx.resolution` is the new size.
    fn resize(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), InitializationError> {
        let _ = ctx;
        Ok(())
    }

    fn on_key(&mut self, key: char) {
        let _ = key;
    }

    /// Recomputes host-side state and uploads it. Skipped while paused.
    fn update(&mut self, queue: &Queue, frame: &FrameContext);

    /// Records this frame's passes.
    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, frame: &FrameContext) -> Result<(), FrameError>;

    /// Called once before the example's resources are released.
    fn destroy(&mut self) {}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PassKind {
    Render,
    Compute,
}

/// What was recorded for one pass of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    pub label: SsoString,
    pub kind: PassKind,
    pub viewport: Option<Viewport>,
    pub clears_color: bool,
    pub clear_depth: Option<f32>,
}

/// The single command encoder of a frame, plus a log of the passes recorded into it.
pub struct FrameEncoder {
    encoder: CommandEncoder,
    records: Vec<PassRecord>,
}

impl FrameEncoder {
    fn new(device: &Device, label: &str) -> Self {
        Self {
            encoder: device.create_command_encoder(&CommandEncoderDescriptor { label: Some(label) }),
            records: Vec::with_capacity(4),
        }
    }

    pub fn render_pass<'pass>(
        &'pass mut self,
        skeleton: &'pass PassSkeleton,
        target: &'pass TextureView,
    ) -> RenderPass<'pass> {
        self.records.push(PassRecord {
            label: skeleton.label.clone(),
            kind: PassKind::Render,
            viewport: Some(skeleton.viewport),
            clears_color: matches!(skeleton.color.map(|c| c.load), Some(LoadOp::Clear(_))),
            clear_depth: skeleton.depth.as_ref().and_then(|d| match d.ops.load {
                LoadOp::Clear(depth) => Some(depth),
                LoadOp::Load => None,
            }),
        });
        skeleton.begin(&mut self.encoder, target)
    }

    pub fn compute_pass(&mut self, label: &str) -> ComputePass<'_> {
        self.records.push(PassRecord {
            label: SsoString::from(label),
            kind: PassKind::Compute,
            viewport: None,
            clears_color: false,
            clear_depth: None,
        });
        self.encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        })
    }

    pub fn passes(&self) -> &[PassRecord] {
        &self.records
    }

    fn finish(self) -> (CommandBuffer, Vec<PassRecord>) {
        (self.encoder.finish(), self.records)
    }
}

/// Result of a successful [`FrameOrchestrator::tick`].
#[derive(Debug)]
pub struct FrameReport {
    pub frame_index: u64,
    pub passes: Vec<PassRecord>,
    pub submission: SubmissionIndex,
}

/// Drives one example through `Uninitialized -> Prepared -> Rendering -> Destroyed`.
pub struct FrameOrchestrator<E: Example> {
    device: Arc<Device>,
    queue: Arc<Queue>,
    resources: ResourceTable,
    example: Option<E>,
    state: LifecycleState,

    surface_format: TextureFormat,
    resolution: UVec2,

    paused: bool,
    elapsed: f32,
    frame_index: u64,
    submissions: u64,
}

impl<E: Example> FrameOrchestrator<E> {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, surface_format: TextureFormat, resolution: UVec2) -> Self {
        Self {
            device,
            queue,
            resources: ResourceTable::new(),
            example: None,
            state: LifecycleState::Uninitialized,
            surface_format,
            resolution,
            paused: false,
            elapsed: 0.0,
            frame_index: 0,
            submissions: 0,
        }
    }

    pub fn initialize(&mut self, assets: &AssetLoader) -> Result<(), InitializationError> {
        profiling::scope!("FrameOrchestrator::initialize");
        if self.state != LifecycleState::Uninitialized {
            return Err(InitializationError::InvalidState { state: self.state });
        }

        let mut ctx = SetupContext {
            resources: ResourceBuilder::new(&self.device, &self.queue, &mut self.resources),
            assets,
            surface_format: self.surface_format,
            resolution: self.resolution,
        };

        match E::initialize(&mut ctx) {
            Ok(example) => {
                log::info!("{} prepared with {} resources", E::NAME, self.resources.len());
                self.example = Some(example);
                self.state = LifecycleState::Prepared;
                Ok(())
            }
            Err(e) => {
                log::error!("{} failed to initialize: {}", E::NAME, e);
                self.resources.destroy();
                Err(e)
            }
        }
    }

    pub fn resize(&mut self, resolution: UVec2, assets: &AssetLoader) -> Result<(), InitializationError> {
        if resolution == self.resolution {
            return Ok(());
        }
        log::debug!("{} resized to {}x{}", E::NAME, resolution.x, resolution.y);
        self.resolution = resolution;

        let example = match (self.state, self.example.as_mut()) {
            (LifecycleState::Prepared | LifecycleState::Rendering, Some(example)) => example,
            _ => return Ok(()),
        };
        let mut ctx = SetupContext {
            resources: ResourceBuilder::new(&self.device, &self.queue, &mut self.resources),
            assets,
            surface_format: self.surface_format,
            resolution,
        };
        example.resize(&mut ctx)
    }

    /// Records and submits one frame into `target`.
    pub fn tick(&mut self, target: &TextureView, input: FrameInput) -> Result<FrameReport, FrameError> {
        profiling::scope!("FrameOrchestrator::tick");

        let example = match (self.state, self.example.as_mut()) {
            (LifecycleState::Prepared | LifecycleState::Rendering, Some(example)) => example,
            (state, _) => return Err(FrameError::NotPrepared { state }),
        };

        if !self.paused {
            self.elapsed += input.delta_t;
        }
        let frame = FrameContext {
            frame_index: self.frame_index,
            resolution: self.resolution,
            elapsed: self.elapsed,
            delta_t: input.delta_t,
            cursor: input.cursor,
            paused: self.paused,
        };

        if !self.paused {
            profiling::scope!("update");
            example.update(&self.queue, &frame);
        }

        let scope = ErrorScope::new(&self.device);
        let mut encoder = FrameEncoder::new(&self.device, E::NAME);
        let encoded = {
            profiling::scope!("encode");
            example.encode(&mut encoder, target, &frame)
        };
        let (command_buffer, passes) = encoder.finish();

        if let Err(e) = encoded {
            let _ = scope.end();
            return Err(e);
        }

        let submission = self.queue.submit(Some(command_buffer));
        scope.end().map_err(|e| FrameError::Submission(e.to_string()))?;

        if self.state == LifecycleState::Prepared {
            log::debug!("{} rendering", E::NAME);
            self.state = LifecycleState::Rendering;
        }
        self.submissions += 1;
        self.frame_index += 1;

        Ok(FrameReport {
            frame_index: frame.frame_index,
            passes,
            submission,
        })
    }

    pub fn on_key(&mut self, key: char) {
        if let Some(example) = self.example.as_mut() {
            example.on_key(key);
        }
    }

    /// Releases the example and every resource it created. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        if let Some(mut example) = self.example.take() {
            example.destroy();
        }
        self.resources.destroy();
        log::info!("{} destroyed", E::NAME);
        self.state = LifecycleState::Destroyed;
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_paused(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.surface_format
    }

    /// Number of command buffers submitted so far.
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    pub fn example(&self) -> Option<&E> {
        self.example.as_ref()
    }

    pub fn example_mut(&mut self) -> Option<&mut E> {
        self.example.as_mut()
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }
}

impl<E: Example> Drop for FrameOrchestrator<E> {
    fn drop(&mut self) {
        self.destroy();
    }
}
