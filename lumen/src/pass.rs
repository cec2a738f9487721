//! Render pass descriptors built once at setup time.
//!
//! A [`PassSkeleton`] carries everything about a pass except the frame's color
//! target, which is only known once the surface texture has been acquired.

use std::{fmt::Debug, hash::Hash, sync::Arc};

use glam::UVec2;
use wgpu::{
    Color, CommandEncoder, LoadOp, Operations, RenderPass, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, StoreOp, TextureView,
};

use crate::util::typedefs::{FastHashMap, SsoString};

/// Pixel region a pass renders into. Used for both the viewport and the scissor rect.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn full(size: UVec2) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.x as f32,
            height: size.y as f32,
        }
    }

    /// Column `index` of `size` split into `columns` equal-width columns.
    ///
    /// Columns are at least one pixel wide and never extend past the target,
    /// so a target narrower than `columns` gets overlapping columns.
    pub fn column(size: UVec2, columns: u32, index: u32) -> Self {
        let width = (size.x / columns.max(1)).max(1);
        Self {
            x: (width * index).min(size.x.saturating_sub(width)) as f32,
            y: 0.0,
            width: width as f32,
            height: size.y as f32,
        }
    }

    pub fn apply(&self, rpass: &mut RenderPass<'_>) {
        rpass.set_viewport(self.x, self.y, self.width, self.height, 0.0, 1.0);
        rpass.set_scissor_rect(self.x as u32, self.y as u32, self.width as u32, self.height as u32);
    }
}

/// Load and store behaviour of the frame's color target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorTarget {
    pub load: LoadOp<Color>,
    pub store: StoreOp,
}

impl ColorTarget {
    pub fn clear(color: Color) -> Self {
        Self {
            load: LoadOp::Clear(color),
            store: StoreOp::Store,
        }
    }

    pub fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A depth attachment owned by the skeleton. Its view does not change between frames.
#[derive(Debug, Clone)]
pub struct DepthTarget {
    pub view: Arc<TextureView>,
    pub ops: Operations<f32>,
}

impl DepthTarget {
    pub fn clear(view: Arc<TextureView>, depth: f32) -> Self {
        Self {
            view,
            ops: Operations {
                load: LoadOp::Clear(depth),
                store: StoreOp::Store,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassSkeleton {
    pub label: SsoString,
    pub color: Option<ColorTarget>,
    pub depth: Option<DepthTarget>,
    pub viewport: Viewport,
}

impl PassSkeleton {
    /// Begins the pass against `target`, which is ignored by depth-only passes.
    pub fn begin<'pass>(&'pass self, encoder: &'pass mut CommandEncoder, target: &'pass TextureView) -> RenderPass<'pass> {
        let color_attachments = [self.color.map(|color| RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: Operations {
                load: color.load,
                store: color.store,
            },
        })];
        // A depth-only pipeline declares no color targets, so the pass must not declare a hole either.
        let color_attachments: &[Option<RenderPassColorAttachment<'_>>] = match self.color {
            Some(_) => &color_attachments,
            None => &[],
        };

        let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(self.label.as_str()),
            color_attachments,
            depth_stencil_attachment: self.depth.as_ref().map(|depth| RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(depth.ops),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.viewport.apply(&mut rpass);
        rpass
    }
}

/// Precomputed pass skeletons keyed by `K`.
#[derive(Debug, Clone)]
pub struct PassTable<K> {
    skeletons: FastHashMap<K, PassSkeleton>,
}

impl<K> Default for PassTable<K> {
    fn default() -> Self {
        Self {
            skeletons: FastHashMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash + Debug> PassTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, skeleton: PassSkeleton) -> Option<PassSkeleton> {
        self.skeletons.insert(key, skeleton)
    }

    pub fn get(&self, key: K) -> Option<&PassSkeleton> {
        self.skeletons.get(&key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.skeletons.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.skeletons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.skeletons.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::{ColorTarget, PassSkeleton, PassTable, Viewport};
    use wgpu::{Color, LoadOp};

    #[test]
    fn columns_tile_the_target() {
        let size = UVec2::new(600, 600);
        let left = Viewport::column(size, 2, 0);
        let right = Viewport::column(size, 2, 1);

        assert_eq!(left.width, 300.0);
        assert_eq!(right.width, 300.0);
        assert_eq!(left.x + left.width, right.x);
        assert_eq!(right.height, 600.0);
    }

    #[test]
    fn narrow_targets_keep_columns_inside() {
        for width in [1, 2, 3] {
            let size = UVec2::new(width, 8);
            for index in 0..2 {
                let column = Viewport::column(size, 2, index);
                assert!(column.width >= 1.0);
                assert!(column.x + column.width <= width as f32, "{} {}", width, index);
            }
        }
        assert_eq!(Viewport::column(UVec2::new(3, 8), 2, 1).x, 1.0);
    }

    #[test]
    fn table_lookup() {
        let mut table = PassTable::new();
        table.insert(
            "clear",
            PassSkeleton {
                label: "clear".into(),
                color: Some(ColorTarget::clear(Color::BLACK)),
                depth: None,
                viewport: Viewport::full(UVec2::new(4, 4)),
            },
        );
        table.insert(
            "overlay",
            PassSkeleton {
                label: "overlay".into(),
                color: Some(ColorTarget::load()),
                depth: None,
                viewport: Viewport::full(UVec2::new(4, 4)),
            },
        );

        assert_eq!(table.len(), 2);
        assert!(table.get("missing").is_none());
        assert_eq!(table.get("overlay").and_then(|s| s.color).map(|c| c.load), Some(LoadOp::Load));
    }
}
