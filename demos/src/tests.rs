use std::{path::Path, sync::Arc};

use anyhow::Context;
use glam::UVec2;
use image::RgbaImage;
use lumen::{frame::PassKind, DepthVariant, Example, FrameInput, FrameReport, LifecycleState};
use lumen_test::{compare_image_to_path, no_gpu_return, test_attr, TestRunner, Threshold, ThresholdSet};

use crate::{
    clear_screen::ClearScreen,
    compute_particles::ComputeParticles,
    reversed_z::{plan, Pass, RenderMode, ReversedZ},
    textured_quad::TexturedQuad,
    triangle::Triangle,
};

const FRAME: FrameInput = FrameInput {
    delta_t: 1.0 / 60.0,
    cursor: None,
};

/// Red and green of the reversed-Z planes.
fn is_plane_color(pixel: &image::Rgba<u8>) -> bool {
    let [r, g, b, _] = pixel.0;
    b < 50 && ((r > 200 && g < 50) || (g > 200 && r < 50))
}

/// Number of pixels in `[x_start, x_end)` matching `predicate`.
fn count_in_columns(image: &RgbaImage, x_start: u32, x_end: u32, predicate: impl Fn(&image::Rgba<u8>) -> bool) -> usize {
    image
        .enumerate_pixels()
        .filter(|&(x, _, pixel)| x >= x_start && x < x_end && predicate(pixel))
        .count()
}

async fn runner() -> anyhow::Result<Option<TestRunner>> {
    let iad = match lumen::create_iad(None, None).await {
        Err(lumen::RendererInitializationError::MissingAdapter) => {
            eprintln!("No adapter available, skipping test");
            return Ok(None);
        }
        other => other.context("InstanceAdapterDevice creation failed")?,
    };
    Ok(Some(TestRunner::new(&iad, crate::assets())))
}

pub struct TestConfiguration<E> {
    pub reference_path: &'static str,
    pub size: UVec2,
    pub threshold_set: ThresholdSet,
    /// Applied to the example after initialization, before the frame.
    pub configure: fn(&mut E),
}

/// Renders one frame of `E` and compares it against the reference image,
/// which is written on the first run.
async fn test_example<E: Example>(config: TestConfiguration<E>) -> anyhow::Result<Option<(FrameReport, RgbaImage)>> {
    let Some(runner) = runner().await? else {
        return Ok(None);
    };
    let target = runner.target(config.size);
    let mut orchestrator = runner.orchestrator::<E>(config.size)?;
    (config.configure)(orchestrator.example_mut().context("example missing after initialize")?);

    let (report, image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;
    compare_image_to_path(&image, Path::new(config.reference_path), config.threshold_set)?;
    Ok(Some((report, image)))
}

async fn smoke<E: Example>(size: UVec2) -> anyhow::Result<()> {
    let Some(runner) = runner().await? else {
        return Ok(());
    };
    let target = runner.target(size);
    let mut orchestrator = runner.orchestrator::<E>(size)?;

    for _ in 0..2 {
        runner.render_frame(&mut orchestrator, &target, FRAME).await?;
    }
    assert_eq!(orchestrator.submission_count(), 2);
    assert_eq!(orchestrator.state(), LifecycleState::Rendering);

    orchestrator.destroy();
    assert!(orchestrator.resources().is_empty());
    Ok(())
}

#[test_attr]
async fn reversed_z_initializes_on_selected_adapter() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    eprintln!("Adapter: {} {:?}", iad.info.name, iad.info.backend);
    let runner = TestRunner::new(&iad, crate::assets());

    let orchestrator = runner.orchestrator::<ReversedZ>(UVec2::new(600, 600))?;
    assert_eq!(orchestrator.state(), LifecycleState::Prepared);
    let example = orchestrator.example().context("example missing after initialize")?;
    assert_eq!(example.passes().len(), Pass::ALL.len() * DepthVariant::ALL.len());
    Ok(())
}

#[test_attr]
async fn reversed_z_color_frame() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let runner = TestRunner::new(&iad, crate::assets());

    let size = UVec2::new(600, 600);
    let target = runner.target(size);
    let mut orchestrator = runner.orchestrator::<ReversedZ>(size)?;
    assert_eq!(orchestrator.example().map(ReversedZ::mode), Some(RenderMode::Color));

    let (report, _image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;

    assert_eq!(report.passes.len(), 2);
    assert_eq!(orchestrator.submission_count(), 1);
    for (record, x) in report.passes.iter().zip([0.0, 300.0]) {
        assert_eq!(record.kind, PassKind::Render);
        let viewport = record.viewport.context("render pass without viewport")?;
        assert_eq!(viewport.x, x);
        assert_eq!(viewport.width, 300.0);
        assert_eq!(viewport.height, 600.0);
    }
    // The first viewport clears the frame, the second draws over it.
    assert!(report.passes[0].clears_color);
    assert!(!report.passes[1].clears_color);
    assert_eq!(report.passes[0].clear_depth, Some(DepthVariant::Default.clear_depth()));
    assert_eq!(report.passes[1].clear_depth, Some(DepthVariant::Reversed.clear_depth()));

    let example = orchestrator.example().context("example missing after a frame")?;
    let bind_groups = example.uniform_bind_groups();
    assert!(!Arc::ptr_eq(&bind_groups.default, &bind_groups.reversed));

    Ok(())
}

#[test_attr]
async fn reversed_z_color_image() -> anyhow::Result<()> {
    let Some((_report, image)) = test_example(TestConfiguration::<ReversedZ> {
        reference_path: "src/reversed_z/screenshot-color.png",
        size: UVec2::new(600, 600),
        threshold_set: Threshold::Mean(0.01).into(),
        configure: |example| example.set_mode(RenderMode::Color),
    })
    .await?
    else {
        return Ok(());
    };

    // Both halves draw the planes over the shared dark blue clear.
    for x in [5, 305] {
        let [r, g, b, _] = image.get_pixel(x, 5).0;
        assert_eq!((r, g), (0, 0), "x = {}", x);
        assert!(b > 150, "x = {}", x);
    }
    assert!(count_in_columns(&image, 0, 300, is_plane_color) > 1000);
    assert!(count_in_columns(&image, 300, 600, is_plane_color) > 1000);
    Ok(())
}

#[test_attr]
async fn reversed_z_precision_error_image() -> anyhow::Result<()> {
    let Some((report, image)) = test_example(TestConfiguration::<ReversedZ> {
        reference_path: "src/reversed_z/screenshot-precision-error.png",
        size: UVec2::new(600, 600),
        threshold_set: Threshold::Mean(0.01).into(),
        configure: |example| example.set_mode(RenderMode::PrecisionError),
    })
    .await?
    else {
        return Ok(());
    };

    assert_eq!(report.passes.len(), 4);
    // Geometry is drawn in gray levels, the background keeps the clear color.
    let gray = |pixel: &image::Rgba<u8>| pixel[0] == pixel[1] && pixel[1] == pixel[2];
    assert!(!gray(image.get_pixel(5, 5)));
    assert!(count_in_columns(&image, 0, 300, gray) > 1000);
    assert!(count_in_columns(&image, 300, 600, gray) > 1000);
    Ok(())
}

#[test_attr]
async fn reversed_z_depth_texture_image() -> anyhow::Result<()> {
    let Some((report, image)) = test_example(TestConfiguration::<ReversedZ> {
        reference_path: "src/reversed_z/screenshot-depth-texture.png",
        size: UVec2::new(600, 600),
        threshold_set: Threshold::Mean(0.01).into(),
        configure: |example| example.set_mode(RenderMode::DepthTextureQuad),
    })
    .await?
    else {
        return Ok(());
    };

    assert_eq!(report.passes.len(), 4);
    // Empty regions show each variant's cleared depth: 1.0 on the left, 0.0 on the right.
    assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255, 255]);
    assert_eq!(image.get_pixel(305, 5).0, [0, 0, 0, 255]);
    Ok(())
}

#[test_attr]
async fn reversed_z_mode_switches() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let runner = TestRunner::new(&iad, crate::assets());

    let size = UVec2::new(600, 600);
    let target = runner.target(size);
    let mut orchestrator = runner.orchestrator::<ReversedZ>(size)?;

    for mode in [RenderMode::PrecisionError, RenderMode::DepthTextureQuad, RenderMode::Color] {
        orchestrator.example_mut().context("example missing")?.set_mode(mode);
        let (report, _image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;

        let expected = plan(mode);
        assert_eq!(report.passes.len(), expected.len(), "{:?}", mode);
        let passes = orchestrator.example().context("example missing")?.passes();
        for (record, key) in report.passes.iter().zip(expected.iter()) {
            let skeleton = passes.get(*key).context("planned pass has no skeleton")?;
            assert_eq!(record.label, skeleton.label);
        }
    }
    assert_eq!(orchestrator.submission_count(), 3);

    Ok(())
}

#[test_attr]
async fn reversed_z_resize_replaces_depth_targets() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let runner = TestRunner::new(&iad, crate::assets());

    let mut orchestrator = runner.orchestrator::<ReversedZ>(UVec2::new(600, 600))?;
    let before = orchestrator.resources().len();

    orchestrator.resize(UVec2::new(400, 200), &runner.assets)?;
    assert_eq!(orchestrator.resources().len(), before);

    let target = runner.target(UVec2::new(400, 200));
    let (report, _image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;
    let widths: Vec<f32> = report.passes.iter().filter_map(|p| p.viewport).map(|v| v.width).collect();
    assert_eq!(widths, [200.0, 200.0]);

    orchestrator.destroy();
    orchestrator.destroy();
    assert!(orchestrator.resources().is_empty());
    Ok(())
}

#[test_attr]
async fn reversed_z_survives_single_pixel_width() -> anyhow::Result<()> {
    let Some(runner) = runner().await? else {
        return Ok(());
    };
    let mut orchestrator = runner.orchestrator::<ReversedZ>(UVec2::new(600, 600))?;

    for size in [UVec2::new(1, 64), UVec2::new(3, 64)] {
        orchestrator.resize(size, &runner.assets)?;
        let target = runner.target(size);
        let (report, _image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;
        for viewport in report.passes.iter().filter_map(|p| p.viewport) {
            assert!(viewport.width >= 1.0);
            assert!(viewport.x + viewport.width <= size.x as f32);
        }
    }
    Ok(())
}

#[test_attr]
async fn paused_particles_skip_the_simulation() -> anyhow::Result<()> {
    let Some(runner) = runner().await? else {
        return Ok(());
    };
    let size = UVec2::new(320, 180);
    let target = runner.target(size);
    let mut orchestrator = runner.orchestrator::<ComputeParticles>(size)?;

    let (report, _image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;
    let kinds: Vec<PassKind> = report.passes.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, [PassKind::Compute, PassKind::Render]);

    orchestrator.set_paused(true);
    let (report, _image) = runner.render_frame(&mut orchestrator, &target, FRAME).await?;
    let kinds: Vec<PassKind> = report.passes.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, [PassKind::Render]);
    Ok(())
}

#[test_attr]
async fn triangle_image() -> anyhow::Result<()> {
    let Some((_report, image)) = test_example(TestConfiguration::<Triangle> {
        reference_path: "src/triangle/screenshot.png",
        size: UVec2::new(640, 480),
        threshold_set: Threshold::Mean(0.01).into(),
        configure: |_| {},
    })
    .await?
    else {
        return Ok(());
    };

    // The triangle sits in the middle of the frame, over the clear color.
    assert_ne!(image.get_pixel(320, 240), image.get_pixel(2, 2));
    Ok(())
}

#[test_attr]
async fn textured_quad_image() -> anyhow::Result<()> {
    let Some((_report, image)) = test_example(TestConfiguration::<TexturedQuad> {
        reference_path: "src/textured_quad/screenshot.png",
        size: UVec2::new(1280, 720),
        threshold_set: Threshold::Mean(0.01).into(),
        configure: |_| {},
    })
    .await?
    else {
        return Ok(());
    };

    assert_ne!(image.get_pixel(640, 360), image.get_pixel(2, 2));
    Ok(())
}

#[test_attr]
async fn clear_screen_smoke() -> anyhow::Result<()> {
    smoke::<ClearScreen>(UVec2::new(64, 64)).await
}

#[test_attr]
async fn triangle_smoke() -> anyhow::Result<()> {
    smoke::<Triangle>(UVec2::new(128, 128)).await
}

#[test_attr]
async fn textured_quad_smoke() -> anyhow::Result<()> {
    smoke::<TexturedQuad>(UVec2::new(128, 128)).await
}
