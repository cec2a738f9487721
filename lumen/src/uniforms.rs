use std::{mem, num::NonZeroU64, sync::Arc};

use bytemuck::Pod;
use glam::{Mat4, Vec4};
use wgpu::{Buffer, BufferUsages, Queue};

use crate::{
    error::ResourceCreationError,
    resources::{BufferContents, BufferDesc, ResourceBuilder},
};

/// Converts clip space depth from the 0..1 near-to-far range to 1..0.
///
/// Applied on the left of a view-projection matrix: `z' = w - z`. The matrix
/// is its own inverse.
pub const DEPTH_RANGE_REMAP: Mat4 = Mat4::from_cols(
    Vec4::X,
    Vec4::Y,
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 1.0),
);

/// Host-side copy of a uniform block plus the buffer it is mirrored into.
///
/// [`UniformBlock::write`] uploads the whole block in one queue write.
#[derive(Debug)]
pub struct UniformBlock<T: Pod> {
    host: T,
    buffer: Arc<Buffer>,
}

impl<T: Pod> UniformBlock<T> {
    pub const SIZE: u64 = mem::size_of::<T>() as u64;

    pub fn new(resources: &mut ResourceBuilder<'_>, label: &str, initial: T) -> Result<Self, ResourceCreationError> {
        let buffer = resources.buffer(&BufferDesc {
            label,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            contents: BufferContents::Data(bytemuck::bytes_of(&initial)),
        })?;
        Ok(Self { host: initial, buffer })
    }

    pub fn host(&self) -> &T {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut T {
        &mut self.host
    }

    pub fn set(&mut self, value: T) {
        self.host = value;
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn binding_size() -> Option<NonZeroU64> {
        NonZeroU64::new(Self::SIZE)
    }

    pub fn write(&self, queue: &Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&self.host));
    }
}

/// Like [`UniformBlock`] for a fixed-size array of elements, written as one block.
#[derive(Debug)]
pub struct UniformArray<T: Pod, const N: usize> {
    host: [T; N],
    buffer: Arc<Buffer>,
}

impl<T: Pod, const N: usize> UniformArray<T, N> {
    pub const SIZE: u64 = (mem::size_of::<T>() * N) as u64;

    pub fn new(resources: &mut ResourceBuilder<'_>, label: &str, initial: [T; N]) -> Result<Self, ResourceCreationError> {
        let buffer = resources.buffer(&BufferDesc {
            label,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            contents: BufferContents::Data(bytemuck::cast_slice(&initial[..])),
        })?;
        Ok(Self { host: initial, buffer })
    }

    pub fn host(&self) -> &[T; N] {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut [T; N] {
        &mut self.host
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn binding_size() -> Option<NonZeroU64> {
        NonZeroU64::new(Self::SIZE)
    }

    pub fn write(&self, queue: &Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&self.host[..]));
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::DEPTH_RANGE_REMAP;

    fn camera() -> Mat4 {
        let projection = Mat4::perspective_infinite_rh(std::f32::consts::TAU / 5.0, 0.5, 5.0);
        projection * Mat4::from_translation(Vec3::new(0.0, 0.0, -12.0))
    }

    #[test]
    fn remap_is_an_involution() {
        assert_eq!(DEPTH_RANGE_REMAP * DEPTH_RANGE_REMAP, Mat4::IDENTITY);
        assert!(DEPTH_RANGE_REMAP.inverse().abs_diff_eq(DEPTH_RANGE_REMAP, 1e-6));
    }

    #[test]
    fn remap_round_trips_view_projection() {
        let view_projection = camera();
        let reversed = DEPTH_RANGE_REMAP * view_projection;
        let restored = DEPTH_RANGE_REMAP.inverse() * reversed;
        assert!(restored.abs_diff_eq(view_projection, 1e-5));
    }

    #[test]
    fn remap_only_touches_depth() {
        let reversed = DEPTH_RANGE_REMAP * camera();
        let original = camera();
        for col in 0..4 {
            let (a, b) = (reversed.col(col), original.col(col));
            assert_eq!((a.x, a.y, a.w), (b.x, b.y, b.w));
            assert!((a.z - (b.w - b.z)).abs() < 1e-4);
        }
    }
}
