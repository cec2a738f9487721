use std::num::NonZeroU64;

use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, Buffer, BufferBindingType, Device, Sampler, SamplerBindingType, ShaderStages,
    TextureSampleType, TextureView, TextureViewDimension,
};

/// Builds a bind group layout, assigning binding indices in append order.
#[derive(Debug, Clone, Default)]
pub struct BindGroupLayoutBuilder {
    bgl_entries: Vec<BindGroupLayoutEntry>,
}
impl BindGroupLayoutBuilder {
    pub fn new() -> Self {
        Self {
            bgl_entries: Vec::with_capacity(8),
        }
    }

    pub fn append(mut self, visibility: ShaderStages, ty: BindingType) -> Self {
        let binding = self.bgl_entries.len() as u32;
        self.bgl_entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty,
            count: None,
        });
        self
    }

    pub fn append_uniform_buffer(self, visibility: ShaderStages, min_binding_size: Option<NonZeroU64>) -> Self {
        self.append(
            visibility,
            BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size,
            },
        )
    }

    pub fn append_storage_buffer(self, visibility: ShaderStages, read_only: bool) -> Self {
        self.append(
            visibility,
            BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        )
    }

    pub fn append_texture(self, visibility: ShaderStages, sample_type: TextureSampleType) -> Self {
        self.append(
            visibility,
            BindingType::Texture {
                sample_type,
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
        )
    }

    pub fn append_sampler(self, visibility: ShaderStages) -> Self {
        self.append(visibility, BindingType::Sampler(SamplerBindingType::Filtering))
    }

    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.bgl_entries
    }

    pub fn build(&self, device: &Device, label: Option<&str>) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label,
            entries: &self.bgl_entries,
        })
    }
}

/// Builds a bind group whose entries line up with a [`BindGroupLayoutBuilder`]
/// appended in the same order.
#[derive(Debug, Default)]
pub struct BindGroupBuilder<'a> {
    bg_entries: Vec<BindGroupEntry<'a>>,
}
impl<'a> BindGroupBuilder<'a> {
    pub fn new() -> Self {
        Self {
            bg_entries: Vec::with_capacity(8),
        }
    }

    pub fn append(mut self, resource: BindingResource<'a>) -> Self {
        let binding = self.bg_entries.len() as u32;
        self.bg_entries.push(BindGroupEntry { binding, resource });
        self
    }

    pub fn append_buffer(self, buffer: &'a Buffer) -> Self {
        self.append(buffer.as_entire_binding())
    }

    pub fn append_texture_view(self, view: &'a TextureView) -> Self {
        self.append(BindingResource::TextureView(view))
    }

    pub fn append_sampler(self, sampler: &'a Sampler) -> Self {
        self.append(BindingResource::Sampler(sampler))
    }

    pub fn len(&self) -> usize {
        self.bg_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bg_entries.is_empty()
    }

    pub fn build(&self, device: &Device, label: Option<&str>, bgl: &BindGroupLayout) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label,
            layout: bgl,
            entries: &self.bg_entries,
        })
    }
}
