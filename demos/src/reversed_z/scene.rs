//! Geometry and transforms of the depth precision scene.
//!
//! Each instance is a pair of planes 0.0002 units apart, partially
//! overlapping. Instances are pushed further away and scaled up, so the
//! distant pairs only resolve correctly with enough depth precision.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3};

pub const INSTANCE_COUNT: usize = 5;

/// Half the distance between the two planes of an instance.
const PLANE_GAP: f32 = 0.0001;
/// Half the horizontal offset between the planes.
const PLANE_OFFSET: f32 = 0.5;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

const fn vertex(x: f32, y: f32, z: f32, color: [f32; 4]) -> Vertex {
    Vertex {
        position: [x, y, z, 1.0],
        color,
    }
}

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

/// Red plane in front, green plane behind, two triangles each.
pub const VERTICES: [Vertex; 12] = [
    vertex(-1.0 - PLANE_OFFSET, -1.0, PLANE_GAP, RED),
    vertex(1.0 - PLANE_OFFSET, -1.0, PLANE_GAP, RED),
    vertex(-1.0 - PLANE_OFFSET, 1.0, PLANE_GAP, RED),
    vertex(1.0 - PLANE_OFFSET, -1.0, PLANE_GAP, RED),
    vertex(1.0 - PLANE_OFFSET, 1.0, PLANE_GAP, RED),
    vertex(-1.0 - PLANE_OFFSET, 1.0, PLANE_GAP, RED),
    vertex(-1.0 + PLANE_OFFSET, -1.0, -PLANE_GAP, GREEN),
    vertex(1.0 + PLANE_OFFSET, -1.0, -PLANE_GAP, GREEN),
    vertex(-1.0 + PLANE_OFFSET, 1.0, -PLANE_GAP, GREEN),
    vertex(1.0 + PLANE_OFFSET, -1.0, -PLANE_GAP, GREEN),
    vertex(1.0 + PLANE_OFFSET, 1.0, -PLANE_GAP, GREEN),
    vertex(-1.0 + PLANE_OFFSET, 1.0, -PLANE_GAP, GREEN),
];

/// Instance placements before the per-frame wobble.
pub fn base_models() -> [Mat4; INSTANCE_COUNT] {
    std::array::from_fn(|index| {
        let m = index as f32;
        let z = -800.0 * m;
        let scale = 1.0 + 50.0 * m;
        // A single column of instances, centered on x.
        let y = (4.0 - 0.2 * z) * (m - INSTANCE_COUNT as f32 / 2.0 + 1.0);
        Mat4::from_translation(Vec3::new(0.0, y, z)) * Mat4::from_scale(Vec3::splat(scale))
    })
}

/// `base` rotated 30 degrees about an axis that turns with `elapsed` seconds.
pub fn animated_models(base: &[Mat4; INSTANCE_COUNT], elapsed: f32) -> [Mat4; INSTANCE_COUNT] {
    let axis = Vec3::new(elapsed.sin(), elapsed.cos(), 0.0);
    let wobble = Mat4::from_axis_angle(axis, 30f32.to_radians());
    base.map(|model| model * wobble)
}

/// Standard 0..1 depth view-projection for one of the two side-by-side viewports.
pub fn view_projection(resolution: UVec2) -> Mat4 {
    let aspect = resolution.x as f32 / resolution.y.max(1) as f32 * 0.5;
    let projection = Mat4::perspective_infinite_rh(2.0 * std::f32::consts::PI / 5.0, aspect, 5.0);
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -12.0));
    projection * view
}
