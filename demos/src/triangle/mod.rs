use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3};
use lumen::{
    pass::{ColorTarget, PassSkeleton, Viewport},
    resources::{BufferContents, BufferDesc},
    util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
    wgpu::{
        self, BindGroup, Buffer, BufferUsages, Color, ColorTargetState, ColorWrites, IndexFormat, PrimitiveState, Queue,
        RenderPipeline, ShaderStages, TextureView, VertexBufferLayout, VertexStepMode,
    },
    Example, FrameContext, FrameEncoder, FrameError, InitializationError, RenderPipelineState, SetupContext, ShaderSet,
    UniformBlock,
};
use lumen_framework::{ExampleSettings, LaunchOptions};

const SETTINGS: ExampleSettings = ExampleSettings {
    title: "Triangle",
    size: UVec2::new(1280, 720),
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

const VERTICES: [Vertex; 3] = [
    Vertex {
        position: [1.0, -1.0, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-1.0, -1.0, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.0, 1.0, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

const INDICES: [u32; 3] = [0, 1, 2];

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Radians per second around the Y axis.
const SPIN_SPEED: f32 = 0.5;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    projection: Mat4,
    view: Mat4,
    model: Mat4,
}

impl CameraUniform {
    fn new(resolution: UVec2, elapsed: f32) -> Self {
        let aspect = resolution.x as f32 / resolution.y.max(1) as f32;
        Self {
            projection: Mat4::perspective_rh(60f32.to_radians(), aspect, 1.0, 256.0),
            view: Mat4::from_translation(Vec3::new(0.0, 0.0, -2.5)),
            model: Mat4::from_rotation_y(elapsed * SPIN_SPEED),
        }
    }
}

pub struct Triangle {
    vertex_buffer: Arc<Buffer>,
    index_buffer: Arc<Buffer>,
    camera: UniformBlock<CameraUniform>,
    bind_group: Arc<BindGroup>,
    pipeline: Arc<RenderPipeline>,
    pass: PassSkeleton,
}

impl Example for Triangle {
    const NAME: &'static str = "triangle";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        profiling::scope!("Triangle::initialize");

        let vertex_buffer = ctx.resources.buffer(&BufferDesc {
            label: "triangle vertices",
            usage: BufferUsages::VERTEX,
            contents: BufferContents::Data(bytemuck::cast_slice(&VERTICES)),
        })?;
        let index_buffer = ctx.resources.buffer(&BufferDesc {
            label: "triangle indices",
            usage: BufferUsages::INDEX,
            contents: BufferContents::Data(bytemuck::cast_slice(&INDICES)),
        })?;

        let camera = UniformBlock::new(&mut ctx.resources, "triangle camera", CameraUniform::new(ctx.resolution, 0.0))?;

        let bgl = ctx.resources.bind_group_layout(
            "triangle camera",
            &BindGroupLayoutBuilder::new()
                .append_uniform_buffer(ShaderStages::VERTEX, UniformBlock::<CameraUniform>::binding_size()),
        )?;
        let bind_group = ctx.resources.bind_group(
            "triangle camera",
            &bgl,
            &BindGroupBuilder::new().append_buffer(camera.buffer()),
        )?;
        let layout = ctx.resources.pipeline_layout("triangle", &[&*bgl])?;

        let shader = ctx.assets.get_shader("shaders/triangle/triangle.wgsl")?;
        let module = ctx.resources.shader_module(&shader)?;
        let pipeline = ctx.resources.render_pipeline(
            &RenderPipelineState {
                label: "triangle",
                layout: &layout,
                vertex_buffers: &[VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                primitive: PrimitiveState::default(),
                color_targets: &[Some(ColorTargetState {
                    format: ctx.surface_format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
                depth_stencil: None,
            },
            ShaderSet::vertex_fragment(module),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            camera,
            bind_group,
            pipeline,
            pass: PassSkeleton {
                label: "triangle".into(),
                color: Some(ColorTarget::clear(Color {
                    r: 0.025,
                    g: 0.025,
                    b: 0.025,
                    a: 1.0,
                })),
                depth: None,
                viewport: Viewport::full(ctx.resolution),
            },
        })
    }

    fn resize(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), InitializationError> {
        self.pass.viewport = Viewport::full(ctx.resolution);
        Ok(())
    }

    fn update(&mut self, queue: &Queue, frame: &FrameContext) {
        self.camera.set(CameraUniform::new(frame.resolution, frame.elapsed));
        self.camera.write(queue);
    }

    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, _frame: &FrameContext) -> Result<(), FrameError> {
        let mut rpass = encoder.render_pass(&self.pass, target);
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint32);
        rpass.draw_indexed(0..INDICES.len() as u32, 0, 0..1);
        Ok(())
    }
}

pub fn main(options: LaunchOptions) -> anyhow::Result<()> {
    lumen_framework::start::<Triangle>(SETTINGS, options, crate::assets())
}
