use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3, Vec4};
use lumen::{
    pass::{ColorTarget, PassSkeleton, Viewport},
    resources::{BufferContents, BufferDesc},
    util::bind_merge::{BindGroupBuilder, BindGroupLayoutBuilder},
    wgpu::{
        self, AddressMode, BindGroup, Buffer, BufferUsages, Color, ColorTargetState, ColorWrites, FilterMode,
        IndexFormat, PrimitiveState, Queue, RenderPipeline, SamplerDescriptor, ShaderStages, TextureSampleType,
        TextureView, VertexBufferLayout, VertexStepMode,
    },
    Example, FrameContext, FrameEncoder, FrameError, InitializationError, RenderPipelineState, SetupContext, ShaderSet,
    UniformBlock,
};
use lumen_framework::{ExampleSettings, LaunchOptions};

const SETTINGS: ExampleSettings = ExampleSettings {
    title: "Textured Quad",
    size: UVec2::new(1280, 720),
};

const TEXTURE_PATH: &str = "textures/checker.png";

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
    normal: [f32; 3],
}

const fn vertex(position: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex {
        position,
        uv,
        normal: [0.0, 0.0, 1.0],
    }
}

const VERTICES: [Vertex; 4] = [
    vertex([1.0, 1.0, 0.0], [1.0, 1.0]),
    vertex([-1.0, 1.0, 0.0], [0.0, 1.0]),
    vertex([-1.0, -1.0, 0.0], [0.0, 0.0]),
    vertex([1.0, -1.0, 0.0], [1.0, 0.0]),
];

const INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];

const LOD_BIAS_STEP: f32 = 0.25;
const MAX_LOD_BIAS: f32 = 8.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadUniform {
    projection: Mat4,
    model_view: Mat4,
    view_pos: Vec4,
    lod_bias: f32,
    _padding: [f32; 3],
}

impl QuadUniform {
    fn new(resolution: UVec2, lod_bias: f32) -> Self {
        let aspect = resolution.x as f32 / resolution.y.max(1) as f32;
        Self {
            projection: Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 256.0),
            model_view: Mat4::from_translation(Vec3::new(0.0, 0.0, -2.5)) * Mat4::from_rotation_y(15f32.to_radians()),
            // The eye sits at the origin of view space.
            view_pos: Vec4::ZERO,
            lod_bias,
            _padding: [0.0; 3],
        }
    }
}

fn adjust_lod_bias(current: f32, key: char) -> f32 {
    let next = match key {
        '+' | '=' => current + LOD_BIAS_STEP,
        '-' | '_' => current - LOD_BIAS_STEP,
        _ => current,
    };
    next.clamp(0.0, MAX_LOD_BIAS)
}

pub struct TexturedQuad {
    vertex_buffer: Arc<Buffer>,
    index_buffer: Arc<Buffer>,
    uniforms: UniformBlock<QuadUniform>,
    bind_group: Arc<BindGroup>,
    pipeline: Arc<RenderPipeline>,
    pass: PassSkeleton,
    lod_bias: f32,
}

impl Example for TexturedQuad {
    const NAME: &'static str = "textured_quad";

    fn initialize(ctx: &mut SetupContext<'_>) -> Result<Self, InitializationError> {
        profiling::scope!("TexturedQuad::initialize");

        let texture = ctx.assets.load_texture(&mut ctx.resources, TEXTURE_PATH)?;
        let sampler = ctx.resources.sampler(&SamplerDescriptor {
            label: Some("textured quad sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..SamplerDescriptor::default()
        })?;

        let vertex_buffer = ctx.resources.buffer(&BufferDesc {
            label: "quad vertices",
            usage: BufferUsages::VERTEX,
            contents: BufferContents::Data(bytemuck::cast_slice(&VERTICES)),
        })?;
        let index_buffer = ctx.resources.buffer(&BufferDesc {
            label: "quad indices",
            usage: BufferUsages::INDEX,
            contents: BufferContents::Data(bytemuck::cast_slice(&INDICES)),
        })?;

        let uniforms = UniformBlock::new(&mut ctx.resources, "quad uniforms", QuadUniform::new(ctx.resolution, 0.0))?;

        let bgl = ctx.resources.bind_group_layout(
            "textured quad",
            &BindGroupLayoutBuilder::new()
                .append_uniform_buffer(
                    ShaderStages::VERTEX_FRAGMENT,
                    UniformBlock::<QuadUniform>::binding_size(),
                )
                .append_texture(ShaderStages::FRAGMENT, TextureSampleType::Float { filterable: true })
                .append_sampler(ShaderStages::FRAGMENT),
        )?;
        let bind_group = ctx.resources.bind_group(
            "textured quad",
            &bgl,
            &BindGroupBuilder::new()
                .append_buffer(uniforms.buffer())
                .append_texture_view(&texture.view)
                .append_sampler(&sampler),
        )?;
        let layout = ctx.resources.pipeline_layout("textured quad", &[&*bgl])?;

        let shader = ctx.assets.get_shader("shaders/textured_quad/quad.wgsl")?;
        let module = ctx.resources.shader_module(&shader)?;
        let pipeline = ctx.resources.render_pipeline(
            &RenderPipelineState {
                label: "textured quad",
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
            uniforms,
            bind_group,
            pipeline,
            pass: PassSkeleton {
                label: "textured quad".into(),
                color: Some(ColorTarget::clear(Color {
                    r: 0.025,
                    g: 0.025,
                    b: 0.025,
                    a: 1.0,
                })),
                depth: None,
                viewport: Viewport::full(ctx.resolution),
            },
            lod_bias: 0.0,
        })
    }

    fn resize(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), InitializationError> {
        self.pass.viewport = Viewport::full(ctx.resolution);
        Ok(())
    }

    fn on_key(&mut self, key: char) {
        let lod_bias = adjust_lod_bias(self.lod_bias, key);
        if lod_bias != self.lod_bias {
            log::info!("LOD bias {:.2}", lod_bias);
            self.lod_bias = lod_bias;
        }
    }

    fn update(&mut self, queue: &Queue, frame: &FrameContext) {
        self.uniforms.set(QuadUniform::new(frame.resolution, self.lod_bias));
        self.uniforms.write(queue);
    }

    fn encode(&self, encoder: &mut FrameEncoder, target: &TextureView, _frame: &FrameContext) -> Result<(), FrameError> {
        let mut rpass = encoder.render_pass(&self.pass, target);
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint16);
        rpass.draw_indexed(0..INDICES.len() as u32, 0, 0..1);
        Ok(())
    }
}

pub fn main(options: LaunchOptions) -> anyhow::Result<()> {
    lumen_framework::start::<TexturedQuad>(SETTINGS, options, crate::assets())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lod_bias_steps_and_clamps() {
        assert_eq!(adjust_lod_bias(0.0, '+'), LOD_BIAS_STEP);
        assert_eq!(adjust_lod_bias(0.0, '-'), 0.0);
        assert_eq!(adjust_lod_bias(MAX_LOD_BIAS, '='), MAX_LOD_BIAS);
        assert_eq!(adjust_lod_bias(1.0, 'x'), 1.0);
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<QuadUniform>(), 160);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }
}
