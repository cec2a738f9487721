//! Shared core of the lumen example gallery.
//!
//! Examples implement [`Example`] and are driven by a [`FrameOrchestrator`],
//! which owns the example's [`ResourceTable`] and submits exactly one command
//! buffer per frame. Everything an example creates goes through a
//! [`ResourceBuilder`], so teardown is a single call that is safe to repeat.
//!
//! The depth-technique helpers ([`DepthVariant`], [`PerVariant`],
//! [`uniforms::DEPTH_RANGE_REMAP`]) capture the difference between the
//! standard and reversed depth conventions.

pub mod assets;
mod error;
pub mod frame;
pub mod pass;
pub mod pipeline;
pub mod resources;
mod setup;
mod surface;
pub mod uniforms;
pub mod util;
pub mod variant;

pub use assets::{AssetLoader, ShaderAsset};
pub use error::*;
pub use frame::{Example, FrameContext, FrameEncoder, FrameInput, FrameOrchestrator, FrameReport, LifecycleState, SetupContext};
pub use pass::{PassSkeleton, PassTable, Viewport};
pub use pipeline::{RenderPipelineState, ShaderSet, ShaderStage, DEPTH_FORMAT};
pub use resources::{GpuResource, GpuTexture, ResourceBuilder, ResourceTable};
pub use setup::*;
pub use surface::*;
pub use uniforms::UniformBlock;
pub use variant::{DepthVariant, PerVariant};

/// Re-export of the wgpu version the gallery is built against.
pub use wgpu;
pub use glam;
