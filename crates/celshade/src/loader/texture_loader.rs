use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use super::model_importer::TextureLoader;
use super::ResourcePath;
use crate::engine::{GpuContext, Texture, TextureStore};

/// Loads textures next to a model file and uploads them into the texture store.
pub struct GpuTextureLoader<'a> {
    pub context: &'a GpuContext,
    pub store: &'a mut TextureStore,
    /// Paths are resolved relative to this file.
    pub base: ResourcePath,
}

impl TextureLoader for GpuTextureLoader<'_> {
    #[instrument(skip(self), fields(base = %self.base))]
    fn load_texture(&mut self, path: &str) -> Result<Texture> {
        let resource_path = self.base.relative_path(path)?;
        let content = std::fs::read(resource_path.full_path())
            .with_context(|| format!("Failed to read texture '{resource_path}'"))?;
        let rgba = image::load_from_memory(&content)
            .with_context(|| format!("Failed to decode texture '{resource_path}'"))?
            .to_rgba8();
        let size = [rgba.width(), rgba.height()];
        debug!("Decoded {}x{} texture", size[0], size[1]);
        // Keep the path as referenced so duplicates are found by the importer
        self.store.upload_rgba8(self.context, path, size, rgba.as_raw())
    }
}

/// Hands out one texture per distinct path, loading each path only on first use.
#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<String, Texture>,
}

impl TextureCache {
    pub fn load(&mut self, loader: &mut dyn TextureLoader, path: &str) -> Result<Texture> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }
        let texture = loader.load_texture(path)?;
        self.textures.insert(path.to_string(), texture.clone());
        Ok(texture)
    }
}
