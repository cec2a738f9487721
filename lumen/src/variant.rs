//! The two depth conventions compared side by side, and tables keyed by them.

use std::ops::{Index, IndexMut};

use glam::Mat4;
use wgpu::CompareFunction;

use crate::uniforms::DEPTH_RANGE_REMAP;

/// A depth-buffer convention.
///
/// `Default` maps near to 0.0 and far to 1.0 and keeps the closer fragment
/// with [`CompareFunction::Less`]. `Reversed` maps near to 1.0 and far to 0.0
/// and keeps the closer fragment with [`CompareFunction::Greater`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DepthVariant {
    Default,
    Reversed,
}

impl DepthVariant {
    /// Every variant, in the order their passes are recorded.
    pub const ALL: [DepthVariant; 2] = [DepthVariant::Default, DepthVariant::Reversed];

    pub const fn index(self) -> usize {
        match self {
            Self::Default => 0,
            Self::Reversed => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Default => "default depth",
            Self::Reversed => "reversed depth",
        }
    }

    pub const fn compare_function(self) -> CompareFunction {
        match self {
            Self::Default => CompareFunction::Less,
            Self::Reversed => CompareFunction::Greater,
        }
    }

    /// Value the depth attachment is cleared to: the far plane of the convention.
    pub const fn clear_depth(self) -> f32 {
        match self {
            Self::Default => 1.0,
            Self::Reversed => 0.0,
        }
    }

    /// Adapts a standard view-projection matrix to this convention.
    pub fn view_projection(self, view_projection: Mat4) -> Mat4 {
        match self {
            Self::Default => view_projection,
            Self::Reversed => DEPTH_RANGE_REMAP * view_projection,
        }
    }

    /// Whether a fragment at `fragment` depth survives against `stored` under this convention.
    pub fn depth_test(self, fragment: f32, stored: f32) -> bool {
        compare(self.compare_function(), fragment, stored)
    }
}

/// Evaluates a compare function the way the depth test does.
pub fn compare(function: CompareFunction, fragment: f32, stored: f32) -> bool {
    match function {
        CompareFunction::Never => false,
        CompareFunction::Less => fragment < stored,
        CompareFunction::Equal => fragment == stored,
        CompareFunction::LessEqual => fragment <= stored,
        CompareFunction::Greater => fragment > stored,
        CompareFunction::NotEqual => fragment != stored,
        CompareFunction::GreaterEqual => fragment >= stored,
        CompareFunction::Always => true,
    }
}

/// One value per [`DepthVariant`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerVariant<T> {
    pub default: T,
    pub reversed: T,
}

impl<T> PerVariant<T> {
    pub fn from_fn(mut f: impl FnMut(DepthVariant) -> T) -> Self {
        Self {
            default: f(DepthVariant::Default),
            reversed: f(DepthVariant::Reversed),
        }
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(DepthVariant) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            default: f(DepthVariant::Default)?,
            reversed: f(DepthVariant::Reversed)?,
        })
    }

    pub fn get(&self, variant: DepthVariant) -> &T {
        match variant {
            DepthVariant::Default => &self.default,
            DepthVariant::Reversed => &self.reversed,
        }
    }

    pub fn get_mut(&mut self, variant: DepthVariant) -> &mut T {
        match variant {
            DepthVariant::Default => &mut self.default,
            DepthVariant::Reversed => &mut self.reversed,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(DepthVariant, T) -> U) -> PerVariant<U> {
        PerVariant {
            default: f(DepthVariant::Default, self.default),
            reversed: f(DepthVariant::Reversed, self.reversed),
        }
    }

    pub fn as_ref(&self) -> PerVariant<&T> {
        PerVariant {
            default: &self.default,
            reversed: &self.reversed,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DepthVariant, &T)> + '_ {
        DepthVariant::ALL.into_iter().map(move |variant| (variant, self.get(variant)))
    }
}

impl<T> Index<DepthVariant> for PerVariant<T> {
    type Output = T;

    fn index(&self, variant: DepthVariant) -> &T {
        self.get(variant)
    }
}

impl<T> IndexMut<DepthVariant> for PerVariant<T> {
    fn index_mut(&mut self, variant: DepthVariant) -> &mut T {
        self.get_mut(variant)
    }
}
