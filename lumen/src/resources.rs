//! GPU resource creation and scoped release.
//!
//! Every object created through a [`ResourceBuilder`] is recorded in the
//! owning [`ResourceTable`]. The table releases its entries in reverse
//! creation order exactly once, either when [`ResourceTable::destroy`] is
//! called or when it is dropped.

use std::sync::Arc;

use glam::UVec2;
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    BindGroup, BindGroupLayout, Buffer, BufferDescriptor, BufferUsages, ComputePipeline, Device, Extent3d,
    ImageCopyTexture, ImageDataLayout, Origin3d, PipelineLayout, PipelineLayoutDescriptor, Queue, RenderPipeline,
    Sampler, SamplerDescriptor, Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::{
    error::{AssetLoadError, ResourceCreationError, ResourceKind},
    util::{
        bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
        error_scope::ErrorScope,
        typedefs::SsoString,
    },
};

/// Bytes per texel of the 8-bit RGBA formats uploaded by [`ResourceBuilder::texture_with_data`].
pub const RGBA8_BYTES_PER_TEXEL: u32 = 4;

/// A GPU object which can be released ahead of its last handle being dropped.
pub trait GpuResource {
    fn release(&self);
}

impl GpuResource for Buffer {
    fn release(&self) {
        self.destroy();
    }
}

impl GpuResource for Texture {
    fn release(&self) {
        self.destroy();
    }
}

// These are freed when the last handle drops, the table only has to let go.
macro_rules! release_on_drop {
    ($($ty:ty),* $(,)?) => {
        $(impl GpuResource for $ty {
            fn release(&self) {}
        })*
    };
}

release_on_drop!(
    TextureView,
    Sampler,
    BindGroupLayout,
    BindGroup,
    PipelineLayout,
    RenderPipeline,
    ComputePipeline,
);

struct TableEntry {
    kind: ResourceKind,
    label: SsoString,
    resource: Arc<dyn GpuResource>,
}

/// Owns every resource of one example, in creation order.
#[derive(Default)]
pub struct ResourceTable {
    entries: Vec<TableEntry>,
    released: usize,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `resource` and hands back a shared handle to it.
    pub fn track<R: GpuResource + 'static>(&mut self, kind: ResourceKind, label: &str, resource: R) -> Arc<R> {
        let resource = Arc::new(resource);
        self.entries.push(TableEntry {
            kind,
            label: SsoString::from(label),
            resource: Arc::clone(&resource) as Arc<dyn GpuResource>,
        });
        resource
    }

    /// Releases one tracked resource early. Returns false if it was not tracked by this table.
    pub fn release<R: GpuResource + 'static>(&mut self, resource: &Arc<R>) -> bool {
        let target = Arc::as_ptr(resource) as *const ();
        let position = self
            .entries
            .iter()
            .position(|entry| Arc::as_ptr(&entry.resource) as *const () == target);

        match position {
            Some(index) => {
                let entry = self.entries.remove(index);
                log::trace!("Releasing {} {:?} early", entry.kind, entry.label);
                entry.resource.release();
                self.released += 1;
                true
            }
            None => false,
        }
    }

    /// Releases everything still tracked, newest first. Calling it again is a no-op.
    pub fn destroy(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        log::debug!("Releasing {} resources", self.entries.len());
        while let Some(entry) = self.entries.pop() {
            log::trace!("Releasing {} {:?}", entry.kind, entry.label);
            entry.resource.release();
            self.released += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of resources this table has released over its lifetime.
    pub fn released_count(&self) -> usize {
        self.released
    }

    pub fn labels(&self) -> impl Iterator<Item = (ResourceKind, &str)> + '_ {
        self.entries.iter().map(|entry| (entry.kind, entry.label.as_str()))
    }
}

impl Drop for ResourceTable {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Initial contents of a buffer.
#[derive(Debug, Copy, Clone)]
pub enum BufferContents<'a> {
    Zeroed(u64),
    Data(&'a [u8]),
}

#[derive(Debug, Copy, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsages,
    pub contents: BufferContents<'a>,
}

#[derive(Debug, Copy, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub size: UVec2,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

/// A texture together with its default view.
#[derive(Debug, Clone)]
pub struct GpuTexture {
    pub texture: Arc<Texture>,
    pub view: Arc<TextureView>,
    pub format: TextureFormat,
    pub size: UVec2,
}

impl GpuTexture {
    /// Releases the view and texture ahead of the table's teardown.
    pub fn release_from(&self, table: &mut ResourceTable) {
        table.release(&self.view);
        table.release(&self.texture);
    }
}

/// Creates GPU objects, turning device errors into [`ResourceCreationError`]
/// and recording every success in a [`ResourceTable`].
pub struct ResourceBuilder<'a> {
    device: &'a Device,
    queue: &'a Queue,
    table: &'a mut ResourceTable,
}

impl<'a> ResourceBuilder<'a> {
    pub fn new(device: &'a Device, queue: &'a Queue, table: &'a mut ResourceTable) -> Self {
        Self { device, queue, table }
    }

    pub fn device(&self) -> &Device {
        self.device
    }

    pub fn queue(&self) -> &Queue {
        self.queue
    }

    pub fn table(&mut self) -> &mut ResourceTable {
        self.table
    }

    /// Runs `create` inside an error scope and returns its result untracked.
    pub(crate) fn scoped<R>(
        &self,
        kind: ResourceKind,
        label: &str,
        create: impl FnOnce(&Device) -> R,
    ) -> Result<R, ResourceCreationError> {
        profiling::scope!("create resource", label);

        let scope = ErrorScope::new(self.device);
        let resource = create(self.device);
        scope.end().map_err(|e| {
            log::error!("Failed to create {} {:?}: {}", kind, label, e);
            ResourceCreationError {
                kind,
                label: SsoString::from(label),
                reason: e.to_string(),
            }
        })?;

        log::trace!("Created {} {:?}", kind, label);
        Ok(resource)
    }

    /// Like [`Self::scoped`], but records the resource in the table.
    pub(crate) fn tracked<R: GpuResource + 'static>(
        &mut self,
        kind: ResourceKind,
        label: &str,
        create: impl FnOnce(&Device) -> R,
    ) -> Result<Arc<R>, ResourceCreationError> {
        let resource = self.scoped(kind, label, create)?;
        Ok(self.table.track(kind, label, resource))
    }

    pub fn buffer(&mut self, desc: &BufferDesc<'_>) -> Result<Arc<Buffer>, ResourceCreationError> {
        self.tracked(ResourceKind::Buffer, desc.label, |device| match desc.contents {
            BufferContents::Zeroed(size) => device.create_buffer(&BufferDescriptor {
                label: Some(desc.label),
                size,
                usage: desc.usage,
                mapped_at_creation: false,
            }),
            BufferContents::Data(data) => device.create_buffer_init(&BufferInitDescriptor {
                label: Some(desc.label),
                contents: data,
                usage: desc.usage,
            }),
        })
    }

    pub fn texture(&mut self, desc: &TextureDesc<'_>) -> Result<GpuTexture, ResourceCreationError> {
        let texture = self.tracked(ResourceKind::Texture, desc.label, |device| {
            device.create_texture(&TextureDescriptor {
                label: Some(desc.label),
                size: Extent3d {
                    width: desc.size.x,
                    height: desc.size.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: desc.format,
                usage: desc.usage,
                view_formats: &[],
            })
        })?;
        let view = self.tracked(ResourceKind::TextureView, desc.label, |_| {
            texture.create_view(&TextureViewDescriptor::default())
        })?;

        Ok(GpuTexture {
            texture,
            view,
            format: desc.format,
            size: desc.size,
        })
    }

    /// Creates a texture and fills it with tightly packed 8-bit RGBA texels.
    pub fn texture_with_data(&mut self, desc: &TextureDesc<'_>, data: &[u8]) -> Result<GpuTexture, AssetLoadError> {
        let bytes_per_row = desc.size.x * RGBA8_BYTES_PER_TEXEL;
        let expected = (bytes_per_row * desc.size.y) as usize;
        if data.len() != expected {
            return Err(AssetLoadError::SizeMismatch {
                label: SsoString::from(desc.label),
                expected,
                actual: data.len(),
            });
        }

        let texture = self
            .texture(&TextureDesc {
                usage: desc.usage | TextureUsages::COPY_DST,
                ..*desc
            })
            .map_err(|e| AssetLoadError::Upload {
                label: SsoString::from(desc.label),
                source: e,
            })?;

        self.queue.write_texture(
            ImageCopyTexture {
                texture: &texture.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(desc.size.y),
            },
            Extent3d {
                width: desc.size.x,
                height: desc.size.y,
                depth_or_array_layers: 1,
            },
        );

        Ok(texture)
    }

    pub fn sampler(&mut self, desc: &SamplerDescriptor<'_>) -> Result<Arc<Sampler>, ResourceCreationError> {
        let label = desc.label.unwrap_or("sampler");
        self.tracked(ResourceKind::Sampler, label, |device| device.create_sampler(desc))
    }

    pub fn bind_group_layout(
        &mut self,
        label: &str,
        builder: &BindGroupLayoutBuilder,
    ) -> Result<Arc<BindGroupLayout>, ResourceCreationError> {
        self.tracked(ResourceKind::BindGroupLayout, label, |device| {
            builder.build(device, Some(label))
        })
    }

    pub fn bind_group(
        &mut self,
        label: &str,
        layout: &BindGroupLayout,
        builder: &BindGroupBuilder<'_>,
    ) -> Result<Arc<BindGroup>, ResourceCreationError> {
        self.tracked(ResourceKind::BindGroup, label, |device| {
            builder.build(device, Some(label), layout)
        })
    }

    pub fn pipeline_layout(
        &mut self,
        label: &str,
        bind_group_layouts: &[&BindGroupLayout],
    ) -> Result<Arc<PipelineLayout>, ResourceCreationError> {
        self.tracked(ResourceKind::PipelineLayout, label, |device| {
            device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts,
                push_constant_ranges: &[],
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use super::{GpuResource, ResourceTable};
    use crate::error::ResourceKind;

    struct MockHandle {
        name: &'static str,
        releases: Arc<AtomicUsize>,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl GpuResource for MockHandle {
        fn release(&self) {
            let previous = self.releases.fetch_add(1, Ordering::SeqCst);
            assert_eq!(previous, 0, "{} released twice", self.name);
            self.order.lock().unwrap().push(self.name);
        }
    }

    struct Fixture {
        table: ResourceTable,
        counters: Vec<Arc<AtomicUsize>>,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    fn fixture(names: &[&'static str]) -> Fixture {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut table = ResourceTable::new();
        let mut counters = Vec::new();
        for &name in names {
            let releases = Arc::new(AtomicUsize::new(0));
            counters.push(Arc::clone(&releases));
            table.track(
                ResourceKind::Buffer,
                name,
                MockHandle {
                    name,
                    releases,
                    order: Arc::clone(&order),
                },
            );
        }
        Fixture { table, counters, order }
    }

    #[test]
    fn destroy_twice_releases_once() {
        let mut f = fixture(&["vertices", "uniforms", "depth"]);
        f.table.destroy();
        f.table.destroy();
        drop(f.table);

        for counter in &f.counters {
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn release_order_is_reverse_of_creation() {
        let mut f = fixture(&["vertices", "uniforms", "depth"]);
        f.table.destroy();
        assert_eq!(*f.order.lock().unwrap(), ["depth", "uniforms", "vertices"]);
        assert_eq!(f.table.released_count(), 3);
        assert!(f.table.is_empty());
    }

    #[test]
    fn drop_releases_everything() {
        let f = fixture(&["a", "b"]);
        drop(f.table);
        assert_eq!(*f.order.lock().unwrap(), ["b", "a"]);
    }

    #[test]
    fn early_release_is_not_repeated_on_destroy() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let releases = Arc::new(AtomicUsize::new(0));
        let mut table = ResourceTable::new();
        let handle = table.track(
            ResourceKind::Texture,
            "depth",
            MockHandle {
                name: "depth",
                releases: Arc::clone(&releases),
                order: Arc::clone(&order),
            },
        );

        assert!(table.release(&handle));
        assert!(!table.release(&handle));
        table.destroy();

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(table.released_count(), 1);
    }
}
