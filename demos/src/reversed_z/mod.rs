//! Default and reversed depth buffers side by side.
//!
//! The left viewport uses the standard 0..1 depth range with `Less`, the right
//! one remaps the projection to 1..0 and uses `Greater`. Press `m` to cycle
//! between the color, precision error and raw depth views.

mod mode;
mod scene;

use std::sync::Arc;

use glam::{Mat4, UVec2};
use lumen::{
    format_sso,
    pass::{ColorTarget, DepthTarget, PassSkeleton, PassTable, Viewport},
    pipeline::depth_state,
    resources::{BufferContents, BufferDesc, TextureDesc},
    uniforms::UniformArray,
    util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
    wgpu::{
        self, BindGroup, BindGroupLayout, Buffer, BufferUsages, Color, ColorTargetState, ColorWrites, Face, FrontFace,
        PrimitiveState, Queue, RenderPass, RenderPipeline, ShaderStages, TextureSampleType, TextureUsages, TextureView,
        VertexAttribute, VertexBufferLayout, VertexStepMode,
    },
    DepthVariant, Example, FrameContext, FrameEncoder, FrameError, GpuTexture, InitializationError, PerVariant,
    RenderPipelineState, ResourceBuilder, SetupContext, ShaderSet, UniformBlock, DEPTH_FORMAT,
};
use lumen_framework::{ExampleSettings, LaunchOptions};

pub use mode::{plan, FramePlan, Pass, PassKey, RenderMode};
use scene::{Vertex, INSTANCE_COUNT, VERTICES};

pub const SETTINGS: ExampleSettings = ExampleSettings {
    title: "Reversed Z",
    size: UVec2::new(600, 600),
};

const CLEAR_COLOR: Color = Color {
    r: 0.0,
    g: 0.0,
    b: 0.5,
    a: 1.0,
};

const POSITION_ONLY: [VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];
const POSITION_COLOR: [VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];

const PRIMITIVE: PrimitiveState = PrimitiveState {
    topology: wgpu::PrimitiveTopology::TriangleList,
    strip_index_format: None,
    front_face: FrontFace::Ccw,
    cull_mode: Some(Face::Back),
    unclipped_depth: false,
    polygon_mode: wgpu::PolygonMode::Fill,
    conservative: false,
};

/// Depth targets sized to the window, plus the bind group sampling the prepass output.
struct DepthTargets {
    /// Written by the depth prepass and read by later passes.
    prepass: GpuTexture,
    /// Depth attachment of the color and precision passes.
    draw: GpuTexture,
    prepass_bind_group: Arc<BindGroup>,
}

impl DepthTargets {
    fn new(
        resources: &mut ResourceBuilder<'_>,
        layout: &BindGroupLayout,
        resolution: UVec2,
    ) -> Result<Self, InitializationError> {
        let prepass = resources.texture(&TextureDesc {
            label: "prepass depth",
            size: resolution,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        })?;
        let draw = resources.texture(&TextureDesc {
            label: "draw depth",
            size: resolution,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT,
        })?;
        let prepass_bind_group = resources.bind_group(
            "prepass depth",
            layout,
            &BindGroupBuilder::new().append_texture_view(&prepass.view),
        )?;
        Ok(Self {
            prepass,
            draw,
            prepass_bind_group,
        })
    }

    fn release(self, resources: &mut ResourceBuilder<'_>) {
        let table = resources.table();
        table.release(&self.prepass_bind_group);
        self.prepass.release_from(table);
        self.draw.release_from(table);
    }
}

/// Skeletons for every pass of every mode. Variant 0 clears the color target
/// and variant 1 loads it, so both halves survive the frame.
fn pass_table(resolution: UVec2, depth: &DepthTargets) -> PassTable<PassKey> {
    let mut table = PassTable::new();
    for variant in DepthVariant::ALL {
        let viewport = Viewport::column(resolution, 2, variant.index() as u32);
        let frame_color = match variant {
            DepthVariant::Default => ColorTarget::clear(CLEAR_COLOR),
            DepthVariant::Reversed => ColorTarget::load(),
        };

        for pass in Pass::ALL {
            let (color, depth_texture) = match pass {
                Pass::DepthPrePass => (None, Some(&depth.prepass)),
                Pass::PrecisionError | Pass::Color => (Some(frame_color), Some(&depth.draw)),
                Pass::TextureQuad => (Some(frame_color), None),
            };
            table.insert(
                PassKey { pass, variant },
                PassSkeleton {
                    label: format_sso!("{} ({})", pass.label(), variant.label()),
                    color,
                    depth: depth_texture
                        .map(|texture| DepthTarget::clear(Arc::clone(&texture.view), variant.clear_depth())),
                    viewport,
                },
            );
        }
    }
    table
}

pub struct ReversedZ {
    mode: RenderMode,

    vertex_buffer: Arc<Buffer>,
    base_models: [Mat4; INSTANCE_COUNT],
    models: UniformArray<Mat4, INSTANCE_COUNT>,
    cameras: PerVariant<UniformBlock<Mat4>>,
    uniform_bind_groups: PerVariant<Arc<BindGroup>>,

    depth_layout: Arc<BindGroupLayout>,
    depth: Option<DepthTargets>,

    depth_prepass_pipelines: PerVariant<Arc<RenderPipeline>>,
    precision_pipelines: PerVariant<Arc<RenderPipeline>>,
    color_pipelines: PerVariant<Arc<RenderPipeline>>,
    texture_quad_pipeline: Arc<RenderPipeline>,

    passes: PassTable<PassKey>,
}

impl ReversedZ {
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        if mode != self.mode {
            log::info!("Render mode: {}", mode.label());
            self.mode = mode;
        }
    }

    pub fn uniform_bind_groups(&self) -> &PerVariant<Arc<BindGroup>> {
        &self.uniform_bind_groups
    }

    pub fn passes(&self) -> &PassTable<PassKey> {
        &self.passes
    }

    fn prepass_bind_group(&self) -> Result<&BindGroup, FrameError> {
        self.depth
            .as_ref()
            .map(|depth| &*depth.prepass_bind_group)
            .ok_or_else(|| FrameError::MissingPass("prepass depth".into()))
    }

    fn record<'pass>(&'pass self, rpass: &mut RenderPass<'pass>, key: PassKey) -> Result<(), FrameError> {
        let variant = key.variant;
        match key.pass {
            Pass::DepthPrePass => {
                rpass.set_pipeline(&self.depth_prepass_pipelines[variant]);
                rpass.set_bind_group(0, &self.uniform_bind_groups[variant], &[]);
                rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                rpass.draw(0..VERTICES.len() as u32, 0..INSTANCE_COUNT as u32);
            }
            Pass::PrecisionError => {
                rpass.set_pipeline(&self.precision_pipelines[variant]);
                rpass.set_bind_group(0, &self.uniform_bind_groups[variant], &[]);
                rpass.set_bind_group(1, self.prepass_bind_group()?, &[]);
                rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                rpass.draw(0..VERTICES.len() as u32, 0..INSTANCE_COUNT as u32);
            }
            Pass::Color => {
                rpass.set_pipeline(&self.color_pipelines[variant]);
                rpass.set_bind_group(0, &self.uniform_bind_groups[variant], &[]);
                rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                rpass.draw(0..VERTICES.len() as u32, 0..INSTANCE_COUNT as u32);
            }
            Pass::TextureQuad => {
                rpass.set_pipeline(&self.texture_quad_pipeline);
                rpass.set_bind_group(0, self.prepass_bind_group()?, &[]);
                rpass.draw(0..6, 0..1);
            }
        }
        Ok(())
    }
}

impl Example for ReversedZ {
    const NAME: &'static str = "reversed_z";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        profiling::scope!("ReversedZ::initialize");
        let resources = &mut ctx.resources;

        let vertex_buffer = resources.buffer(&BufferDesc {
            label: "depth planes",
            usage: BufferUsages::VERTEX,
            contents: BufferContents::Data(bytemuck::cast_slice(&VERTICES)),
        })?;

        let base_models = scene::base_models();
        let models = UniformArray::new(resources, "instance models", base_models)?;
        let view_projection = scene::view_projection(ctx.resolution);
        let cameras = PerVariant::try_from_fn(|variant| {
            UniformBlock::new(
                resources,
                &format_sso!("camera ({})", variant.label()),
                variant.view_projection(view_projection),
            )
        })?;

        let uniform_layout = resources.bind_group_layout(
            "scene uniforms",
            &BindGroupLayoutBuilder::new()
                .append_uniform_buffer(ShaderStages::VERTEX, UniformArray::<Mat4, INSTANCE_COUNT>::binding_size())
                .append_uniform_buffer(ShaderStages::VERTEX, UniformBlock::<Mat4>::binding_size()),
        )?;
        // Each variant sees the shared models through its own camera.
        let uniform_bind_groups = PerVariant::try_from_fn(|variant| {
            resources.bind_group(
                &format_sso!("scene uniforms ({})", variant.label()),
                &uniform_layout,
                &BindGroupBuilder::new()
                    .append_buffer(models.buffer())
                    .append_buffer(cameras[variant].buffer()),
            )
        })?;

        let depth_layout = resources.bind_group_layout(
            "prepass depth",
            // Unfilterable float, not depth: GL cannot `textureLoad` a depth binding.
            &BindGroupLayoutBuilder::new()
                .append_texture(ShaderStages::FRAGMENT, TextureSampleType::Float { filterable: false }),
        )?;

        let scene_layout = resources.pipeline_layout("scene", &[&*uniform_layout])?;
        let precision_layout = resources.pipeline_layout("precision error", &[&*uniform_layout, &*depth_layout])?;
        let quad_layout = resources.pipeline_layout("depth texture quad", &[&*depth_layout])?;

        let color_targets = [Some(ColorTargetState {
            format: ctx.surface_format,
            blend: None,
            write_mask: ColorWrites::ALL,
        })];
        let position_only = [VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &POSITION_ONLY,
        }];
        let position_color = [VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &POSITION_COLOR,
        }];

        let shader = ctx.assets.get_shader("shaders/reversed_z/depth_prepass.wgsl")?;
        let depth_prepass_pipelines = resources.render_pipelines_per_variant(
            &RenderPipelineState {
                label: "depth prepass",
                layout: &scene_layout,
                vertex_buffers: &position_only,
                primitive: PRIMITIVE,
                color_targets: &[],
                depth_stencil: Some(depth_state(DEPTH_FORMAT, DepthVariant::Default, true)),
            },
            ShaderSet::vertex_only(resources.shader_module(&shader)?),
        )?;

        let shader = ctx.assets.get_shader("shaders/reversed_z/precision.wgsl")?;
        let precision_pipelines = resources.render_pipelines_per_variant(
            &RenderPipelineState {
                label: "precision error",
                layout: &precision_layout,
                vertex_buffers: &position_only,
                primitive: PRIMITIVE,
                color_targets: &color_targets,
                depth_stencil: Some(depth_state(DEPTH_FORMAT, DepthVariant::Default, true)),
            },
            ShaderSet::vertex_fragment(resources.shader_module(&shader)?),
        )?;

        let shader = ctx.assets.get_shader("shaders/reversed_z/color.wgsl")?;
        let color_pipelines = resources.render_pipelines_per_variant(
            &RenderPipelineState {
                label: "color",
                layout: &scene_layout,
                vertex_buffers: &position_color,
                primitive: PRIMITIVE,
                color_targets: &color_targets,
                depth_stencil: Some(depth_state(DEPTH_FORMAT, DepthVariant::Default, true)),
            },
            ShaderSet::vertex_fragment(resources.shader_module(&shader)?),
        )?;

        let shader = ctx.assets.get_shader("shaders/reversed_z/texture_quad.wgsl")?;
        let texture_quad_pipeline = resources.render_pipeline(
            &RenderPipelineState {
                label: "depth texture quad",
                layout: &quad_layout,
                vertex_buffers: &[],
                primitive: PrimitiveState::default(),
                color_targets: &color_targets,
                depth_stencil: None,
            },
            ShaderSet::vertex_fragment(resources.shader_module(&shader)?),
        )?;

        let depth = DepthTargets::new(resources, &depth_layout, ctx.resolution)?;
        let passes = pass_table(ctx.resolution, &depth);

        Ok(Self {
            mode: RenderMode::default(),
            vertex_buffer,
            base_models,
            models,
            cameras,
            uniform_bind_groups,
            depth_layout,
            depth: Some(depth),
            depth_prepass_pipelines,
            precision_pipelines,
            color_pipelines,
            texture_quad_pipeline,
            passes,
        })
    }

    fn resize(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), InitializationError> {
        profiling::scope!("ReversedZ::resize");
        if let Some(old) = self.depth.take() {
            old.release(&mut ctx.resources);
        }
        let depth = DepthTargets::new(&mut ctx.resources, &self.depth_layout, ctx.resolution)?;
        self.passes = pass_table(ctx.resolution, &depth);
        self.depth = Some(depth);
        Ok(())
    }

    fn on_key(&mut self, key: char) {
        if key.eq_ignore_ascii_case(&'m') {
            self.set_mode(self.mode.next());
        }
    }

    fn update(&mut self, queue: &Queue, frame: &FrameContext) {
        *self.models.host_mut() = scene::animated_models(&self.base_models, frame.elapsed);
        self.models.write(queue);

        let view_projection = scene::view_projection(frame.resolution);
        for variant in DepthVariant::ALL {
            let camera = &mut self.cameras[variant];
            camera.set(variant.view_projection(view_projection));
            camera.write(queue);
        }
    }

    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, _frame: &FrameContext) -> Result<(), FrameError> {
        for key in plan(self.mode) {
            let skeleton = self
                .passes
                .get(key)
                .ok_or_else(|| FrameError::MissingPass(format_sso!("{:?}", key)))?;
            let mut rpass = encoder.render_pass(skeleton, target);
            self.record(&mut rpass, key)?;
        }
        Ok(())
    }
}

pub fn main(options: LaunchOptions) -> anyhow::Result<()> {
    lumen_framework::start::<ReversedZ>(SETTINGS, options, crate::assets())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_planned_pass_has_matching_attachments() {
        for mode in RenderMode::ALL {
            for key in plan(mode) {
                let needs_color = key.pass != Pass::DepthPrePass;
                let needs_depth = key.pass != Pass::TextureQuad;
                assert!(needs_color || needs_depth, "{:?}", key);
            }
        }
    }

    #[test]
    fn pass_labels_are_unique() {
        let mut labels: Vec<_> = Pass::ALL.iter().map(|p| p.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), Pass::ALL.len());
    }
}
