use std::path::{Path, PathBuf};

use glam::UVec2;
use wgpu::{TextureFormat, TextureUsages};

use crate::{
    error::AssetLoadError,
    resources::{GpuTexture, ResourceBuilder, TextureDesc},
    util::typedefs::SsoString,
};

/// WGSL source read from disk, labelled by its asset path.
#[derive(Debug, Clone)]
pub struct ShaderAsset {
    pub label: SsoString,
    pub source: String,
}

/// Reads assets relative to a base directory.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    base: PathBuf,
}
impl AssetLoader {
    pub fn new_local(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn path(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }

    pub fn get_asset(&self, path: &str) -> Result<Vec<u8>, AssetLoadError> {
        let full_path = self.path(path);
        log::trace!("Loading asset {}", full_path.display());
        std::fs::read(&full_path).map_err(|source| AssetLoadError::Io {
            path: full_path,
            source,
        })
    }

    pub fn get_shader(&self, path: &str) -> Result<ShaderAsset, AssetLoadError> {
        let bytes = self.get_asset(path)?;
        let source = String::from_utf8(bytes).map_err(|source| AssetLoadError::InvalidUtf8 {
            path: self.path(path),
            source,
        })?;
        Ok(ShaderAsset {
            label: SsoString::from(path),
            source,
        })
    }

    pub fn get_image(&self, path: &str) -> Result<image::RgbaImage, AssetLoadError> {
        let bytes = self.get_asset(path)?;
        let image = image::load_from_memory(&bytes).map_err(|source| AssetLoadError::Decode {
            path: self.path(path),
            source,
        })?;
        Ok(image.into_rgba8())
    }

    /// Decodes an image asset and uploads it as a sampled sRGB texture.
    pub fn load_texture(&self, resources: &mut ResourceBuilder<'_>, path: &str) -> Result<GpuTexture, AssetLoadError> {
        profiling::scope!("load_texture", path);
        let image = self.get_image(path)?;
        let size = UVec2::new(image.width(), image.height());
        log::debug!("Uploading {} ({}x{})", path, size.x, size.y);

        resources.texture_with_data(
            &TextureDesc {
                label: path,
                size,
                format: TextureFormat::Rgba8UnormSrgb,
                usage: TextureUsages::TEXTURE_BINDING,
            },
            image.as_raw(),
        )
    }
}
