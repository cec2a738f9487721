//! Which passes a frame records for each render mode.

use arrayvec::ArrayVec;
use lumen::DepthVariant;

/// What the two viewports show.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// The scene in color, depth tested with each convention.
    #[default]
    Color,
    /// Amplified difference between computed and stored depth.
    PrecisionError,
    /// The raw depth buffer.
    DepthTextureQuad,
}

impl RenderMode {
    pub const ALL: [RenderMode; 3] = [Self::Color, Self::PrecisionError, Self::DepthTextureQuad];

    pub fn next(self) -> Self {
        match self {
            Self::Color => Self::PrecisionError,
            Self::PrecisionError => Self::DepthTextureQuad,
            Self::DepthTextureQuad => Self::Color,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::PrecisionError => "precision-error",
            Self::DepthTextureQuad => "depth-texture",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Depth only, into the sampled depth texture.
    DepthPrePass,
    /// Reads the prepass depth texture.
    PrecisionError,
    Color,
    /// Full-screen quad showing the prepass depth texture.
    TextureQuad,
}

impl Pass {
    pub const ALL: [Pass; 4] = [Self::DepthPrePass, Self::PrecisionError, Self::Color, Self::TextureQuad];

    pub fn label(self) -> &'static str {
        match self {
            Self::DepthPrePass => "depth prepass",
            Self::PrecisionError => "precision error",
            Self::Color => "color",
            Self::TextureQuad => "depth texture quad",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PassKey {
    pub pass: Pass,
    pub variant: DepthVariant,
}

/// Every pass of a frame in recording order: all of the default variant's
/// passes, then all of the reversed variant's, each prepass directly before
/// the pass that reads it.
pub type FramePlan = ArrayVec<PassKey, 4>;

pub fn plan(mode: RenderMode) -> FramePlan {
    let passes: &[Pass] = match mode {
        RenderMode::Color => &[Pass::Color],
        RenderMode::PrecisionError => &[Pass::DepthPrePass, Pass::PrecisionError],
        RenderMode::DepthTextureQuad => &[Pass::DepthPrePass, Pass::TextureQuad],
    };

    DepthVariant::ALL
        .into_iter()
        .flat_map(|variant| passes.iter().map(move |&pass| PassKey { pass, variant }))
        .collect()
}
