use std::{fmt, path::PathBuf};

use thiserror::Error;
use wgpu::{DownlevelFlags, Features};

use crate::{frame::LifecycleState, util::typedefs::SsoString};

/// Enum mapping to each device limit the gallery checks during adapter selection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LimitType {
    BindGroups,
    MaxTextureDimension2d,
    UniformBuffersPerShaderStage,
    UniformBufferBindingSize,
    StorageBuffersPerShaderStage,
    MaxStorageBufferBindingSize,
    MaxComputeInvocationsPerWorkgroup,
}

/// Reason why no device could be brought up.
#[derive(Error, Debug)]
pub enum RendererInitializationError {
    #[error("No supported adapter found")]
    MissingAdapter,
    #[error("The device limit of {:?} is {} but the gallery requires at least {}", ty, device_limit, required_limit)]
    LowDeviceLimit {
        ty: LimitType,
        device_limit: u64,
        required_limit: u64,
    },
    #[error("Device is missing required features: {:?}", features)]
    MissingDeviceFeatures { features: Features },
    #[error("Adapter is missing required downlevel capabilities: {:?}", flags)]
    MissingDownlevelFlags { flags: DownlevelFlags },
    #[error("Requesting a device failed")]
    RequestDeviceFailed(#[source] wgpu::RequestDeviceError),
}

/// Kind of GPU object a [`ResourceCreationError`] refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    TextureView,
    Sampler,
    BindGroupLayout,
    BindGroup,
    PipelineLayout,
    ShaderModule,
    RenderPipeline,
    ComputePipeline,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::TextureView => "texture view",
            Self::Sampler => "sampler",
            Self::BindGroupLayout => "bind group layout",
            Self::BindGroup => "bind group",
            Self::PipelineLayout => "pipeline layout",
            Self::ShaderModule => "shader module",
            Self::RenderPipeline => "render pipeline",
            Self::ComputePipeline => "compute pipeline",
        };
        f.write_str(name)
    }
}

/// The device rejected a resource descriptor.
///
/// The device error is kept as its rendered message; `wgpu::Error` is not `Sync`.
#[derive(Error, Debug)]
#[error("Device rejected {kind} {label:?}: {reason}")]
pub struct ResourceCreationError {
    pub kind: ResourceKind,
    pub label: SsoString,
    pub reason: String,
}

/// A shader or texture asset could not be read or decoded.
#[derive(Error, Debug)]
pub enum AssetLoadError {
    #[error("Failed to read asset {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Shader {} is not valid UTF-8", .path.display())]
    InvalidUtf8 {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Failed to decode image {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to upload texture {label:?}")]
    Upload {
        label: SsoString,
        #[source]
        source: ResourceCreationError,
    },
    #[error("Texture data for {label:?} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        label: SsoString,
        expected: usize,
        actual: usize,
    },
}

/// One-shot setup of an example failed. No part of the example is usable afterwards.
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error(transparent)]
    Resource(#[from] ResourceCreationError),
    #[error(transparent)]
    Asset(#[from] AssetLoadError),
    #[error("Cannot initialize an example that is {state:?}")]
    InvalidState { state: LifecycleState },
}

/// A single frame could not be produced.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame requested while the example is {state:?}")]
    NotPrepared { state: LifecycleState },
    #[error("Pass {0:?} has no descriptor")]
    MissingPass(SsoString),
    #[error("Failed to acquire the next surface texture")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("Device rejected the frame's commands: {0}")]
    Submission(String),
}
