use std::{fs::create_dir_all, path::Path, sync::Arc};

use anyhow::{bail, Context, Result};
use glam::UVec2;
use image::buffer::ConvertBuffer;
use lumen::{AssetLoader, Example, FrameInput, FrameOrchestrator, FrameReport, InitializationError, InstanceAdapterDevice};
use wgpu::{
    Device, Extent3d, ImageCopyBuffer, ImageDataLayout, Queue, Texture, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages, TextureView, TextureViewDescriptor, COPY_BYTES_PER_ROW_ALIGNMENT,
};

use crate::ThresholdSet;

/// Format of every offscreen target; it matches the sRGB surfaces the framework prefers.
pub const TEST_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// A texture standing in for the swapchain image.
pub struct OffscreenTarget {
    pub texture: Texture,
    pub view: TextureView,
    pub size: UVec2,
}

/// Runs examples against offscreen targets.
pub struct TestRunner {
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub assets: AssetLoader,
}

impl TestRunner {
    pub fn new(iad: &InstanceAdapterDevice, assets: AssetLoader) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            device: Arc::clone(&iad.device),
            queue: Arc::clone(&iad.queue),
            assets,
        }
    }

    pub fn target(&self, size: UVec2) -> OffscreenTarget {
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some("Test output image"),
            size: Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TEST_FORMAT,
            usage: TextureUsages::COPY_SRC | TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        OffscreenTarget { texture, view, size }
    }

    /// Creates and initializes `E` for a target of `size`.
    pub fn orchestrator<E: Example>(&self, size: UVec2) -> Result<FrameOrchestrator<E>, InitializationError> {
        let mut orchestrator =
            FrameOrchestrator::new(Arc::clone(&self.device), Arc::clone(&self.queue), TEST_FORMAT, size);
        orchestrator.initialize(&self.assets)?;
        Ok(orchestrator)
    }

    /// Ticks once into `target` and reads the result back.
    pub async fn render_frame<E: Example>(
        &self,
        orchestrator: &mut FrameOrchestrator<E>,
        target: &OffscreenTarget,
        input: FrameInput,
    ) -> Result<(FrameReport, image::RgbaImage)> {
        let report = orchestrator.tick(&target.view, input).context("Frame failed")?;
        let image = download_image(&self.device, &self.queue, &target.texture, target.size).await?;
        Ok((report, image))
    }
}

/// Rounds a row up to the alignment buffer copies require.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = COPY_BYTES_PER_ROW_ALIGNMENT;
    (unpadded + align - 1) / align * align
}

/// Copies an RGBA8 texture into host memory, dropping the row padding the copy requires.
pub async fn download_image(device: &Device, queue: &Queue, texture: &Texture, size: UVec2) -> Result<image::RgbaImage> {
    let unpadded_bytes_per_row = size.x * 4;
    let bytes_per_row = padded_bytes_per_row(unpadded_bytes_per_row);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test output buffer"),
        size: (bytes_per_row * size.y) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test output encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        ImageCopyBuffer {
            buffer: &buffer,
            layout: ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
        },
        Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
    );

    let submit_index = queue.submit(Some(encoder.finish()));

    let (sender, receiver) = flume::bounded(1);
    buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::WaitForSubmissionIndex(submit_index));

    receiver
        .recv_async()
        .await
        .context("Failed to recieve message from map_async")?
        .context("Failed to map output buffer")?;

    let mapping = buffer.slice(..).get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * size.y) as usize);
    for row in mapping.chunks_exact(bytes_per_row as usize) {
        pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
    }
    drop(mapping);
    buffer.unmap();

    image::RgbaImage::from_raw(size.x, size.y, pixels).context("Failed to create image from mapping")
}

/// Compares against the reference image at `path`, writing one if none exists yet.
pub fn compare_image_to_path(test_rgba: &image::RgbaImage, path: &Path, thresholds: ThresholdSet) -> Result<()> {
    let parent_path = path.parent().context("Path given had no parent")?;
    let Ok(expected) = image::open(path) else {
        create_dir_all(parent_path).context("Could not create parent directory")?;
        test_rgba.save(path).context("Could not save image")?;
        return Ok(());
    };

    let expected_rgb = expected.into_rgb8();
    let test_rgb: image::RgbImage = test_rgba.convert();

    let expected_flip = nv_flip::FlipImageRgb8::with_data(expected_rgb.width(), expected_rgb.height(), &expected_rgb);
    let test_flip = nv_flip::FlipImageRgb8::with_data(test_rgb.width(), test_rgb.height(), &test_rgb);

    let result_float = nv_flip::flip(expected_flip, test_flip, nv_flip::DEFAULT_PIXELS_PER_DEGREE);
    let magma = result_float.apply_color_lut(&nv_flip::magma_lut());
    let magma_image = image::RgbImage::from_raw(magma.width(), magma.height(), magma.to_vec())
        .context("Failed to create image from magma image")?;

    let mut pool = nv_flip::FlipPool::from_image(&result_float);

    println!("Image comparison for {}:", path.display());
    let pass = thresholds.check(&mut pool);

    let filename = path.file_stem().context("Path given had no file name")?.to_string_lossy();
    magma_image
        .save(parent_path.join(format!("{}-diff.png", filename)))
        .context("Could not save diff image")?;

    if pass {
        test_rgba
            .save(parent_path.join(format!("{}-success.png", filename)))
            .context("Could not save success image")?;
    } else {
        test_rgba
            .save(parent_path.join(format!("{}-failure.png", filename)))
            .context("Could not save failure image")?;
        bail!("Image comparison failed");
    }

    Ok(())
}
