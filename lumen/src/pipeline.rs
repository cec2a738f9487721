//! Pipeline construction from shader stages and fixed-function state.

use std::{borrow::Cow, sync::Arc};

use wgpu::{
    ColorTargetState, CompareFunction, ComputePipeline, ComputePipelineDescriptor, DepthBiasState, DepthStencilState,
    FragmentState, MultisampleState, PipelineLayout, PrimitiveState, RenderPipeline, RenderPipelineDescriptor,
    ShaderModule, ShaderModuleDescriptor, ShaderSource, StencilState, TextureFormat, VertexBufferLayout, VertexState,
};

use crate::{
    assets::ShaderAsset,
    error::{ResourceCreationError, ResourceKind},
    format_sso,
    resources::ResourceBuilder,
    variant::{DepthVariant, PerVariant},
};

/// Depth format used by every depth attachment in the gallery.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// A shader module and the entry point to run from it.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    pub module: Arc<ShaderModule>,
    pub entry_point: &'static str,
}

/// The stages of one render pipeline. Consumed by pipeline creation, so the
/// modules are dropped as soon as the last pipeline using them exists.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: ShaderStage,
    pub fragment: Option<ShaderStage>,
}

impl ShaderSet {
    /// `vs_main` and `fs_main` from the same module.
    pub fn vertex_fragment(module: ShaderModule) -> Self {
        let module = Arc::new(module);
        Self {
            vertex: ShaderStage {
                module: Arc::clone(&module),
                entry_point: "vs_main",
            },
            fragment: Some(ShaderStage {
                module,
                entry_point: "fs_main",
            }),
        }
    }

    /// `vs_main` only, for depth-only passes.
    pub fn vertex_only(module: ShaderModule) -> Self {
        Self {
            vertex: ShaderStage {
                module: Arc::new(module),
                entry_point: "vs_main",
            },
            fragment: None,
        }
    }
}

/// Fixed-function state of a render pipeline.
#[derive(Debug, Clone)]
pub struct RenderPipelineState<'a> {
    pub label: &'a str,
    pub layout: &'a PipelineLayout,
    pub vertex_buffers: &'a [VertexBufferLayout<'a>],
    pub primitive: PrimitiveState,
    pub color_targets: &'a [Option<ColorTargetState>],
    pub depth_stencil: Option<DepthStencilState>,
}

/// Depth test state for `variant`, with depth writes toggled by `write`.
pub fn depth_state(format: TextureFormat, variant: DepthVariant, write: bool) -> DepthStencilState {
    DepthStencilState {
        format,
        depth_write_enabled: write,
        depth_compare: variant.compare_function(),
        stencil: StencilState::default(),
        bias: DepthBiasState::default(),
    }
}

impl<'a> ResourceBuilder<'a> {
    /// Compiles a WGSL shader. The module is not tracked; pipelines keep what they need alive.
    pub fn shader_module(&self, shader: &ShaderAsset) -> Result<ShaderModule, ResourceCreationError> {
        self.scoped(ResourceKind::ShaderModule, &shader.label, |device| {
            device.create_shader_module(ShaderModuleDescriptor {
                label: Some(shader.label.as_str()),
                source: ShaderSource::Wgsl(Cow::Borrowed(shader.source.as_str())),
            })
        })
    }

    pub fn render_pipeline(
        &mut self,
        state: &RenderPipelineState<'_>,
        shaders: ShaderSet,
    ) -> Result<Arc<RenderPipeline>, ResourceCreationError> {
        profiling::scope!("render_pipeline", state.label);
        self.tracked(ResourceKind::RenderPipeline, state.label, |device| {
            create_render_pipeline(device, state.label, state, state.depth_stencil.clone(), &shaders)
        })
    }

    /// Builds `state` once per depth variant, overriding only the depth compare function.
    ///
    /// Without a depth-stencil state in `state`, a [`DEPTH_FORMAT`] attachment with writes enabled is assumed.
    pub fn render_pipelines_per_variant(
        &mut self,
        state: &RenderPipelineState<'_>,
        shaders: ShaderSet,
    ) -> Result<PerVariant<Arc<RenderPipeline>>, ResourceCreationError> {
        profiling::scope!("render_pipelines_per_variant", state.label);
        PerVariant::try_from_fn(|variant| {
            let label = format_sso!("{} ({})", state.label, variant.label());
            let depth_stencil = match state.depth_stencil {
                Some(ref ds) => DepthStencilState {
                    depth_compare: variant.compare_function(),
                    ..ds.clone()
                },
                None => depth_state(DEPTH_FORMAT, variant, true),
            };
            self.tracked(ResourceKind::RenderPipeline, &label, |device| {
                create_render_pipeline(device, &label, state, Some(depth_stencil), &shaders)
            })
        })
    }

    pub fn compute_pipeline(
        &mut self,
        label: &str,
        layout: &PipelineLayout,
        stage: ShaderStage,
    ) -> Result<Arc<ComputePipeline>, ResourceCreationError> {
        profiling::scope!("compute_pipeline", label);
        self.tracked(ResourceKind::ComputePipeline, label, |device| {
            device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                module: &stage.module,
                entry_point: stage.entry_point,
            })
        })
    }
}

fn create_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    state: &RenderPipelineState<'_>,
    depth_stencil: Option<DepthStencilState>,
    shaders: &ShaderSet,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(state.layout),
        vertex: VertexState {
            module: &shaders.vertex.module,
            entry_point: shaders.vertex.entry_point,
            buffers: state.vertex_buffers,
        },
        primitive: state.primitive,
        depth_stencil,
        multisample: MultisampleState::default(),
        fragment: shaders.fragment.as_ref().map(|fragment| FragmentState {
            module: &fragment.module,
            entry_point: fragment.entry_point,
            targets: state.color_targets,
        }),
        multiview: None,
    })
}

/// Whether two compare functions order depth in opposite directions.
pub fn complementary(default: CompareFunction, reversed: CompareFunction) -> bool {
    matches!(
        (default, reversed),
        (CompareFunction::Less, CompareFunction::Greater)
            | (CompareFunction::LessEqual, CompareFunction::GreaterEqual)
            | (CompareFunction::Greater, CompareFunction::Less)
            | (CompareFunction::GreaterEqual, CompareFunction::LessEqual)
    )
}

#[cfg(test)]
mod tests {
    use wgpu::{CompareFunction, TextureFormat};

    use super::{complementary, depth_state, DEPTH_FORMAT};
    use crate::variant::DepthVariant;

    #[test]
    fn variant_depth_states_differ_only_in_compare() {
        let default = depth_state(DEPTH_FORMAT, DepthVariant::Default, true);
        let reversed = depth_state(DEPTH_FORMAT, DepthVariant::Reversed, true);

        assert_eq!(default.depth_compare, CompareFunction::Less);
        assert_eq!(reversed.depth_compare, CompareFunction::Greater);
        assert!(complementary(default.depth_compare, reversed.depth_compare));
        assert_eq!(
            super::DepthStencilState {
                depth_compare: CompareFunction::Less,
                ..reversed
            },
            default
        );
    }

    #[test]
    fn depth_format_is_float() {
        assert_eq!(DEPTH_FORMAT, TextureFormat::Depth32Float);
        assert!(!complementary(CompareFunction::Less, CompareFunction::Less));
    }
}
