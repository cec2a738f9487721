use anyhow::Context;
use glam::UVec2;
use lumen::{
    resources::{BufferContents, BufferDesc, TextureDesc},
    wgpu::{BufferUsages, TextureFormat, TextureUsages},
    AssetLoadError, ResourceBuilder, ResourceKind, ResourceTable,
};
use lumen_test::{no_gpu_return, padded_bytes_per_row, test_attr};

#[test]
fn row_padding() {
    assert_eq!(padded_bytes_per_row(600 * 4), 2560);
    assert_eq!(padded_bytes_per_row(64 * 4), 256);
}

#[test_attr]
pub async fn device_rejection_is_reported() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let mut table = ResourceTable::new();
    let mut resources = ResourceBuilder::new(&iad.device, &iad.queue, &mut table);

    // Mappable buffers may only be copied into unless MAPPABLE_PRIMARY_BUFFERS is enabled.
    let error = resources
        .buffer(&BufferDesc {
            label: "bad usage",
            usage: BufferUsages::MAP_READ | BufferUsages::UNIFORM,
            contents: BufferContents::Zeroed(64),
        })
        .expect_err("buffer should be rejected");
    assert_eq!(error.kind, ResourceKind::Buffer);
    assert_eq!(error.label.as_str(), "bad usage");

    let ok = resources.buffer(&BufferDesc {
        label: "fine",
        usage: BufferUsages::UNIFORM,
        contents: BufferContents::Data(&[0; 64]),
    })?;
    assert_eq!(ok.size(), 64);
    assert_eq!(table.len(), 1);

    table.destroy();
    table.destroy();
    assert_eq!(table.released_count(), 1);

    Ok(())
}

#[test_attr]
pub async fn texture_upload_checks_size() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let mut table = ResourceTable::new();
    let mut resources = ResourceBuilder::new(&iad.device, &iad.queue, &mut table);

    let desc = TextureDesc {
        label: "checker",
        size: UVec2::new(2, 2),
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING,
    };
    assert!(matches!(
        resources.texture_with_data(&desc, &[0; 4]),
        Err(AssetLoadError::SizeMismatch {
            expected: 16,
            actual: 4,
            ..
        })
    ));

    let texture = resources.texture_with_data(&desc, &[255; 16])?;
    assert_eq!(texture.size, UVec2::new(2, 2));
    // Texture and view.
    assert_eq!(table.len(), 2);

    Ok(())
}
