use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec2, Vec4};
use lumen::{
    pass::{ColorTarget, PassSkeleton, Viewport},
    resources::{BufferContents, BufferDesc},
    util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
    wgpu::{
        BindGroup, BlendComponent, BlendFactor, BlendOperation, BlendState, Buffer, BufferUsages, Color,
        ColorTargetState, ColorWrites, ComputePipeline, PrimitiveState, PrimitiveTopology, Queue, RenderPipeline,
        ShaderStages, TextureView, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
    },
    Example, FrameContext, FrameEncoder, FrameError, InitializationError, RenderPipelineState, SetupContext, ShaderSet,
    ShaderStage, UniformBlock,
};
use lumen_framework::{ExampleSettings, LaunchOptions};
use rand::Rng;

const SETTINGS: ExampleSettings = ExampleSettings {
    title: "Compute Shader Particle System",
    size: UVec2::new(1280, 720),
};

const PARTICLE_COUNT: u32 = 256 * 1024;
const WORKGROUP_SIZE: u32 = 256;

/// Seconds of intro during which the attractor stays centered.
const ANIMATION_DELAY: f32 = 20.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct Particle {
    pos: Vec2,
    vel: Vec2,
    /// Only `x` is used: position along the color ramp.
    gradient_pos: Vec4,
}

const PARTICLE_ATTRIBUTES: [VertexAttribute; 2] = [
    VertexAttribute {
        format: VertexFormat::Float32x2,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 16,
        shader_location: 1,
    },
];

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct SimulationParams {
    delta_t: f32,
    dest_x: f32,
    dest_y: f32,
    particle_count: i32,
}

fn seed_particles(rng: &mut impl Rng, count: u32) -> Vec<Particle> {
    (0..count)
        .map(|_| {
            let pos = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
            Particle {
                pos,
                vel: Vec2::ZERO,
                gradient_pos: Vec4::new(pos.x / 2.0, 0.0, 0.0, 0.0),
            }
        })
        .collect()
}

/// The point particles are pushed away from.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Attractor {
    delay: f32,
    timer: f32,
    attached: bool,
}

impl Attractor {
    fn new() -> Self {
        Self {
            delay: ANIMATION_DELAY,
            timer: 0.0,
            attached: false,
        }
    }

    fn advance(&mut self, delta_t: f32) {
        if self.attached {
            return;
        }
        if self.delay > 0.0 {
            self.delay -= delta_t * 5.0;
        } else {
            self.timer += delta_t * 0.04;
            if self.timer > 1.0 {
                self.timer = 0.0;
            }
        }
    }

    /// Attractor position in normalized device coordinates.
    fn destination(&self, resolution: UVec2, cursor: Option<Vec2>) -> Vec2 {
        match (self.attached, cursor) {
            (true, Some(cursor)) => {
                let half = resolution.as_vec2() / 2.0;
                Vec2::new((cursor.x - half.x) / half.x, (half.y - cursor.y) / half.y)
            }
            _ => Vec2::new((self.timer * std::f32::consts::TAU).sin() * 0.75, 0.0),
        }
    }
}

pub struct ComputeParticles {
    particles: Arc<Buffer>,
    params: UniformBlock<SimulationParams>,
    compute_bind_group: Arc<BindGroup>,
    compute_pipeline: Arc<ComputePipeline>,
    render_pipeline: Arc<RenderPipeline>,
    pass: PassSkeleton,
    attractor: Attractor,
}

impl Example for ComputeParticles {
    const NAME: &'static str = "compute_particles";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        profiling::scope!("ComputeParticles::initialize");

        let seeded = seed_particles(&mut rand::thread_rng(), PARTICLE_COUNT);
        // Written by the compute pass, read as a vertex buffer by the render pass.
        let particles = ctx.resources.buffer(&BufferDesc {
            label: "particles",
            usage: BufferUsages::STORAGE | BufferUsages::VERTEX,
            contents: BufferContents::Data(bytemuck::cast_slice(&seeded)),
        })?;

        let attractor = Attractor::new();
        let dest = attractor.destination(ctx.resolution, None);
        let params = UniformBlock::new(
            &mut ctx.resources,
            "particle simulation",
            SimulationParams {
                delta_t: 0.0,
                dest_x: dest.x,
                dest_y: dest.y,
                particle_count: PARTICLE_COUNT as i32,
            },
        )?;

        let compute_bgl = ctx.resources.bind_group_layout(
            "particle simulation",
            &BindGroupLayoutBuilder::new()
                .append_storage_buffer(ShaderStages::COMPUTE, false)
                .append_uniform_buffer(ShaderStages::COMPUTE, UniformBlock::<SimulationParams>::binding_size()),
        )?;
        let compute_bind_group = ctx.resources.bind_group(
            "particle simulation",
            &compute_bgl,
            &BindGroupBuilder::new()
                .append_buffer(&particles)
                .append_buffer(params.buffer()),
        )?;
        let compute_layout = ctx.resources.pipeline_layout("particle simulation", &[&*compute_bgl])?;

        let compute_shader = ctx.assets.get_shader("shaders/compute_particles/compute.wgsl")?;
        let compute_module = ctx.resources.shader_module(&compute_shader)?;
        let compute_pipeline = ctx.resources.compute_pipeline(
            "particle simulation",
            &compute_layout,
            ShaderStage {
                module: Arc::new(compute_module),
                entry_point: "cs_main",
            },
        )?;

        let render_layout = ctx.resources.pipeline_layout("particle render", &[])?;
        let render_shader = ctx.assets.get_shader("shaders/compute_particles/render.wgsl")?;
        let render_module = ctx.resources.shader_module(&render_shader)?;
        let render_pipeline = ctx.resources.render_pipeline(
            &RenderPipelineState {
                label: "particle render",
                layout: &render_layout,
                vertex_buffers: &[VertexBufferLayout {
                    array_stride: std::mem::size_of::<Particle>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &PARTICLE_ATTRIBUTES,
                }],
                primitive: PrimitiveState {
                    topology: PrimitiveTopology::PointList,
                    ..PrimitiveState::default()
                },
                color_targets: &[Some(ColorTargetState {
                    format: ctx.surface_format,
                    // Additive, so dense regions glow.
                    blend: Some(BlendState {
                        color: BlendComponent {
                            src_factor: BlendFactor::One,
                            dst_factor: BlendFactor::One,
                            operation: BlendOperation::Add,
                        },
                        alpha: BlendComponent {
                            src_factor: BlendFactor::SrcAlpha,
                            dst_factor: BlendFactor::DstAlpha,
                            operation: BlendOperation::Add,
                        },
                    }),
                    write_mask: ColorWrites::ALL,
                })],
                depth_stencil: None,
            },
            ShaderSet::vertex_fragment(render_module),
        )?;

        Ok(Self {
            particles,
            params,
            compute_bind_group,
            compute_pipeline,
            render_pipeline,
            pass: PassSkeleton {
                label: "particle render".into(),
                color: Some(ColorTarget::clear(Color::BLACK)),
                depth: None,
                viewport: Viewport::full(ctx.resolution),
            },
            attractor,
        })
    }

    fn resize(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), InitializationError> {
        self.pass.viewport = Viewport::full(ctx.resolution);
        Ok(())
    }

    fn on_key(&mut self, key: char) {
        if key.eq_ignore_ascii_case(&'a') {
            self.attractor.attached = !self.attractor.attached;
            log::info!("Attractor attached to cursor: {}", self.attractor.attached);
        }
    }

    fn update(&mut self, queue: &Queue, frame: &FrameContext) {
        self.attractor.advance(frame.delta_t);
        let dest = self.attractor.destination(frame.resolution, frame.cursor);

        let params = self.params.host_mut();
        params.delta_t = frame.delta_t * 2.5;
        params.dest_x = dest.x;
        params.dest_y = dest.y;
        self.params.write(queue);
    }

    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, frame: &FrameContext) -> Result<(), FrameError> {
        // The simulation must see this frame's parameters, so it runs before the draw.
        if !frame.paused {
            let mut cpass = encoder.compute_pass("particle simulation");
            cpass.set_pipeline(&self.compute_pipeline);
            cpass.set_bind_group(0, &self.compute_bind_group, &[]);
            cpass.dispatch_workgroups(PARTICLE_COUNT / WORKGROUP_SIZE, 1, 1);
        }

        let mut rpass = encoder.render_pass(&self.pass, target);
        rpass.set_pipeline(&self.render_pipeline);
        rpass.set_vertex_buffer(0, self.particles.slice(..));
        rpass.draw(0..PARTICLE_COUNT, 0..1);
        Ok(())
    }
}

pub fn main(options: LaunchOptions) -> anyhow::Result<()> {
    lumen_framework::start::<ComputeParticles>(SETTINGS, options, crate::assets())
}
