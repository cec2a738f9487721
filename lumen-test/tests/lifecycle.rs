use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use glam::UVec2;
use lumen::{
    frame::PassKind,
    pass::{ColorTarget, PassSkeleton, PassTable, Viewport},
    resources::{BufferContents, BufferDesc},
    wgpu::{BufferUsages, Color, Queue, TextureView},
    AssetLoader, AssetLoadError, Example, FrameContext, FrameEncoder, FrameError, FrameInput, InitializationError,
    LifecycleState, SetupContext,
};
use lumen_test::{no_gpu_return, test_attr, TestRunner};

static SOLID_DESTROYS: AtomicUsize = AtomicUsize::new(0);

/// Clears the target red, then records a second pass that only loads it.
struct Solid {
    passes: PassTable<&'static str>,
    updates: u32,
}

impl Example for Solid {
    const NAME: &'static str = "solid";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        ctx.resources.buffer(&BufferDesc {
            label: "solid scratch",
            usage: BufferUsages::UNIFORM,
            contents: BufferContents::Zeroed(64),
        })?;

        let mut passes = PassTable::new();
        passes.insert(
            "clear",
            PassSkeleton {
                label: "clear".into(),
                color: Some(ColorTarget::clear(Color::RED)),
                depth: None,
                viewport: Viewport::column(ctx.resolution, 2, 0),
            },
        );
        passes.insert(
            "load",
            PassSkeleton {
                label: "load".into(),
                color: Some(ColorTarget::load()),
                depth: None,
                viewport: Viewport::column(ctx.resolution, 2, 1),
            },
        );
        Ok(Self { passes, updates: 0 })
    }

    fn update(&mut self, _queue: &Queue, _frame: &FrameContext) {
        self.updates += 1;
    }

    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, _frame: &FrameContext) -> Result<(), FrameError> {
        for key in ["clear", "load"] {
            let skeleton = self.passes.get(key).ok_or_else(|| FrameError::MissingPass(key.into()))?;
            drop(encoder.render_pass(skeleton, target));
        }
        Ok(())
    }

    fn destroy(&mut self) {
        SOLID_DESTROYS.fetch_add(1, Ordering::SeqCst);
    }
}

/// Creates one buffer, then fails.
struct Broken;

impl Example for Broken {
    const NAME: &'static str = "broken";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        ctx.resources.buffer(&BufferDesc {
            label: "orphan",
            usage: BufferUsages::VERTEX,
            contents: BufferContents::Zeroed(16),
        })?;
        Err(AssetLoadError::SizeMismatch {
            label: "orphan".into(),
            expected: 16,
            actual: 0,
        }
        .into())
    }

    fn update(&mut self, _queue: &Queue, _frame: &FrameContext) {}

    fn encode(&self, _: &mut FrameEncoder, _: &TextureView, _: &FrameContext) -> Result<(), FrameError> {
        Ok(())
    }
}

fn assets() -> AssetLoader {
    AssetLoader::new_local(concat!(env!("CARGO_MANIFEST_DIR"), "/tests"))
}

#[test_attr]
pub async fn frame_lifecycle() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let runner = TestRunner::new(&iad, assets());
    let size = UVec2::new(64, 64);
    let target = runner.target(size);

    let mut orchestrator = lumen::FrameOrchestrator::<Solid>::new(
        iad.device.clone(),
        iad.queue.clone(),
        lumen_test::TEST_FORMAT,
        size,
    );
    assert!(matches!(
        orchestrator.tick(&target.view, FrameInput::default()),
        Err(FrameError::NotPrepared {
            state: LifecycleState::Uninitialized
        })
    ));

    orchestrator.initialize(&runner.assets)?;
    assert_eq!(orchestrator.state(), LifecycleState::Prepared);
    assert!(matches!(
        orchestrator.initialize(&runner.assets),
        Err(InitializationError::InvalidState { .. })
    ));

    let (report, image) = runner.render_frame(&mut orchestrator, &target, FrameInput::default()).await?;
    assert_eq!(orchestrator.state(), LifecycleState::Rendering);
    assert_eq!(orchestrator.submission_count(), 1);
    assert_eq!(report.passes.len(), 2);
    assert!(report.passes.iter().all(|p| p.kind == PassKind::Render));
    assert!(report.passes[0].clears_color);
    assert!(!report.passes[1].clears_color);
    assert_eq!(report.passes[1].viewport.map(|v| v.x), Some(32.0));

    // The second pass loads, so the clear survives across the whole target.
    assert_eq!(image.get_pixel(2, 2).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(61, 61).0, [255, 0, 0, 255]);

    orchestrator.set_paused(true);
    orchestrator.tick(&target.view, FrameInput::default())?;
    assert_eq!(orchestrator.example().map(|e| e.updates), Some(1));
    assert_eq!(orchestrator.submission_count(), 2);

    orchestrator.destroy();
    orchestrator.destroy();
    assert_eq!(orchestrator.state(), LifecycleState::Destroyed);
    assert!(orchestrator.resources().is_empty());
    assert_eq!(orchestrator.resources().released_count(), 1);
    assert!(matches!(
        orchestrator.tick(&target.view, FrameInput::default()),
        Err(FrameError::NotPrepared {
            state: LifecycleState::Destroyed
        })
    ));

    drop(orchestrator);
    assert_eq!(SOLID_DESTROYS.load(Ordering::SeqCst), 1);

    Ok(())
}

#[test_attr]
pub async fn failed_initialize_releases_partial_work() -> anyhow::Result<()> {
    let iad = no_gpu_return!(lumen::create_iad(None, None).await).context("InstanceAdapterDevice creation failed")?;
    let runner = TestRunner::new(&iad, assets());

    let mut orchestrator = lumen::FrameOrchestrator::<Broken>::new(
        iad.device.clone(),
        iad.queue.clone(),
        lumen_test::TEST_FORMAT,
        UVec2::new(64, 64),
    );
    assert!(matches!(
        orchestrator.initialize(&runner.assets),
        Err(InitializationError::Asset(AssetLoadError::SizeMismatch { .. }))
    ));
    assert_eq!(orchestrator.state(), LifecycleState::Uninitialized);
    assert!(orchestrator.resources().is_empty());
    assert_eq!(orchestrator.resources().released_count(), 1);

    Ok(())
}
