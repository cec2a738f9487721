use std::sync::Arc;

use arrayvec::ArrayVec;
use wgpu::{
    Adapter, AdapterInfo, Backend, Backends, Device, DeviceDescriptor, DeviceType, DownlevelFlags, Features, Instance,
    InstanceDescriptor, Limits, Queue,
};

use crate::{LimitType, RendererInitializationError, util::typedefs::FastHashMap};

/// Features every example in the gallery can rely on.
pub const REQUIRED_FEATURES: Features = Features::empty();

/// Downlevel capabilities the gallery needs. The particle example drives a compute pass.
pub const REQUIRED_DOWNLEVEL_FLAGS: DownlevelFlags = DownlevelFlags::COMPUTE_SHADERS;

/// Lower bounds on the limits the examples touch.
pub const REQUIRED_LIMITS: RequiredLimits = RequiredLimits {
    max_bind_groups: 2,
    max_texture_dimension_2d: 2048,
    max_uniform_buffers_per_shader_stage: 2,
    max_uniform_buffer_binding_size: 16 << 10,
    max_storage_buffers_per_shader_stage: 1,
    // 256Ki particles of 32 bytes each.
    max_storage_buffer_binding_size: 8 << 20,
    max_compute_invocations_per_workgroup: 256,
};

/// Subset of [`Limits`] the gallery validates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequiredLimits {
    pub max_bind_groups: u32,
    pub max_texture_dimension_2d: u32,
    pub max_uniform_buffers_per_shader_stage: u32,
    pub max_uniform_buffer_binding_size: u32,
    pub max_storage_buffers_per_shader_stage: u32,
    pub max_storage_buffer_binding_size: u32,
    pub max_compute_invocations_per_workgroup: u32,
}

/// Check that all required features are present in the feature set given.
pub fn check_features(device: Features) -> Result<Features, RendererInitializationError> {
    let missing = REQUIRED_FEATURES - device;
    if !missing.is_empty() {
        Err(RendererInitializationError::MissingDeviceFeatures { features: missing })
    } else {
        Ok(REQUIRED_FEATURES)
    }
}

fn check_limit(d: u32, r: u32, ty: LimitType) -> Result<u32, RendererInitializationError> {
    if d < r {
        Err(RendererInitializationError::LowDeviceLimit {
            ty,
            device_limit: d as u64,
            required_limit: r as u64,
        })
    } else {
        Ok(d)
    }
}

/// Check the device limits against [`REQUIRED_LIMITS`], returning the limits to request.
pub fn check_limits(device_limits: &Limits) -> Result<Limits, RendererInitializationError> {
    let required = REQUIRED_LIMITS;

    Ok(Limits {
        max_bind_groups: check_limit(
            device_limits.max_bind_groups,
            required.max_bind_groups,
            LimitType::BindGroups,
        )?,
        max_texture_dimension_2d: check_limit(
            device_limits.max_texture_dimension_2d,
            required.max_texture_dimension_2d,
            LimitType::MaxTextureDimension2d,
        )?,
        max_uniform_buffers_per_shader_stage: check_limit(
            device_limits.max_uniform_buffers_per_shader_stage,
            required.max_uniform_buffers_per_shader_stage,
            LimitType::UniformBuffersPerShaderStage,
        )?,
        max_uniform_buffer_binding_size: check_limit(
            device_limits.max_uniform_buffer_binding_size,
            required.max_uniform_buffer_binding_size,
            LimitType::UniformBufferBindingSize,
        )?,
        max_storage_buffers_per_shader_stage: check_limit(
            device_limits.max_storage_buffers_per_shader_stage,
            required.max_storage_buffers_per_shader_stage,
            LimitType::StorageBuffersPerShaderStage,
        )?,
        max_storage_buffer_binding_size: check_limit(
            device_limits.max_storage_buffer_binding_size,
            required.max_storage_buffer_binding_size,
            LimitType::MaxStorageBufferBindingSize,
        )?,
        max_compute_invocations_per_workgroup: check_limit(
            device_limits.max_compute_invocations_per_workgroup,
            required.max_compute_invocations_per_workgroup,
            LimitType::MaxComputeInvocationsPerWorkgroup,
        )?,
        ..device_limits.clone()
    })
}

/// Validated set of features and limits for a given T.
pub struct PotentialAdapter<T> {
    pub inner: T,
    pub info: AdapterInfo,
    pub features: Features,
    pub limits: Limits,
}
impl<T> PotentialAdapter<T> {
    pub fn new(
        inner: T,
        info: AdapterInfo,
        inner_limits: Limits,
        inner_features: Features,
        downlevel_flags: DownlevelFlags,
    ) -> Result<Self, RendererInitializationError> {
        let missing = REQUIRED_DOWNLEVEL_FLAGS - downlevel_flags;
        if !missing.is_empty() {
            return Err(RendererInitializationError::MissingDownlevelFlags { flags: missing });
        }

        Ok(PotentialAdapter {
            inner,
            info,
            features: check_features(inner_features)?,
            limits: check_limits(&inner_limits)?,
        })
    }
}

/// Container for Instance/Adapter/Device/Queue.
///
/// Create these yourself, or call [`create_iad`].
pub struct InstanceAdapterDevice {
    pub instance: Arc<Instance>,
    pub adapter: Arc<Adapter>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub info: AdapterInfo,
}

fn device_type_rank(device_type: DeviceType) -> u8 {
    match device_type {
        DeviceType::DiscreteGpu => 0,
        DeviceType::IntegratedGpu => 1,
        DeviceType::VirtualGpu => 2,
        DeviceType::Cpu => 3,
        DeviceType::Other => 4,
    }
}

/// Creates an Instance/Adapter/Device/Queue using the given choices. Tries to get the best combination.
///
/// `desired_device` is matched case-insensitively against a substring of the adapter name.
pub async fn create_iad(
    desired_backend: Option<Backend>,
    desired_device: Option<String>,
) -> Result<InstanceAdapterDevice, RendererInitializationError> {
    profiling::scope!("create_iad");

    let backend_bits = Backends::VULKAN | Backends::DX12 | Backends::METAL | Backends::GL;
    let default_backend_order = [Backend::Vulkan, Backend::Metal, Backend::Dx12, Backend::Gl];

    let instance = Instance::new(InstanceDescriptor {
        backends: backend_bits,
        ..Default::default()
    });

    let desired_device = desired_device.map(|d| d.to_lowercase());
    let mut valid_adapters = FastHashMap::default();

    for backend in &default_backend_order {
        let adapters = instance.enumerate_adapters(Backends::from(*backend));

        let mut potential_adapters = ArrayVec::<PotentialAdapter<Adapter>, 4>::new();
        for (idx, adapter) in adapters.into_iter().enumerate() {
            let info = adapter.get_info();
            let limits = adapter.limits();
            let features = adapter.features();
            let downlevel = adapter.get_downlevel_capabilities().flags;
            let potential = PotentialAdapter::new(adapter, info, limits, features, downlevel);

            log::debug!(
                "{:?} Adapter {}: {:#?}",
                backend,
                idx,
                potential.as_ref().map(|p| &p.info)
            );

            let desired = if let Some(ref desired_device) = desired_device {
                potential
                    .as_ref()
                    .map(|i| i.info.name.to_lowercase().contains(desired_device))
                    .unwrap_or(false)
            } else {
                true
            };

            match (potential, desired) {
                (Ok(potential), true) if !potential_adapters.is_full() => potential_adapters.push(potential),
                (Ok(_), true) => log::debug!("Ignoring adapter past the first {}", potential_adapters.capacity()),
                (Ok(_), false) => log::debug!("Adapter does not match the requested device"),
                (Err(e), _) => log::debug!("Adapter not usable: {}", e),
            }
        }
        valid_adapters.insert(*backend, potential_adapters);
    }

    for backend_adapters in valid_adapters.values_mut() {
        backend_adapters.sort_by_key(|a: &PotentialAdapter<Adapter>| device_type_rank(a.info.device_type));
    }

    for backend in &default_backend_order {
        if let Some(desired_backend) = desired_backend {
            if desired_backend != *backend {
                log::debug!("Skipping unwanted backend {:?}", backend);
                continue;
            }
        }

        let adapter: Option<PotentialAdapter<Adapter>> =
            valid_adapters.remove(backend).and_then(|arr| arr.into_iter().next());

        if let Some(adapter) = adapter {
            log::debug!("Chosen adapter: {:#?}", adapter.info);
            log::debug!("Chosen backend: {:?}", backend);
            log::debug!("Chosen features: {:#?}", adapter.features);
            log::debug!("Chosen limits: {:#?}", adapter.limits);

            let (device, queue) = adapter
                .inner
                .request_device(
                    &DeviceDescriptor {
                        label: Some("lumen device"),
                        required_features: adapter.features,
                        required_limits: adapter.limits,
                    },
                    None,
                )
                .await
                .map_err(RendererInitializationError::RequestDeviceFailed)?;

            return Ok(InstanceAdapterDevice {
                instance: Arc::new(instance),
                adapter: Arc::new(adapter.inner),
                device: Arc::new(device),
                queue: Arc::new(queue),
                info: adapter.info,
            });
        }
    }

    Err(RendererInitializationError::MissingAdapter)
}
