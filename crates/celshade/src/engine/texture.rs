use anyhow::{ensure, Result};
use tracing::debug;
use wgpu::util::DeviceExt;

use super::{GpuContext, Size2D};

/// Index of an uploaded texture in the `TextureStore`. Copies share the same GPU texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

/// A texture as seen by meshes and objects: a handle plus where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub handle: TextureHandle,

    /// Source path exactly as referenced, used to detect duplicates.
    pub path: String,

    pub size: Size2D,
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    fn from_rgba8(context: &GpuContext, label: &str, size: Size2D, rgba: &[u8]) -> Self {
        let texture = context.device.create_texture_with_data(
            &context.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size[0],
                    height: size[1],
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture { texture, view }
    }
}

/// Owns every uploaded texture. Handles stay valid for the lifetime of the store.
pub struct TextureStore {
    textures: Vec<GpuTexture>,

    /// Sampled by texture bindings whose unit has nothing bound.
    fallback: GpuTexture,
}

impl TextureStore {
    pub fn new(context: &GpuContext) -> Self {
        Self {
            textures: Vec::new(),
            fallback: GpuTexture::from_rgba8(context, "fallback", [1, 1], &[255; 4]),
        }
    }

    pub fn upload_rgba8(
        &mut self,
        context: &GpuContext,
        path: &str,
        size: Size2D,
        rgba: &[u8],
    ) -> Result<Texture> {
        ensure!(
            rgba.len() == (size[0] * size[1] * 4) as usize,
            "Texture '{path}' has {} bytes, expected {}x{} RGBA pixels",
            rgba.len(),
            size[0],
            size[1]
        );
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(GpuTexture::from_rgba8(context, path, size, rgba));
        debug!("Uploaded texture '{path}' as {handle:?}");
        Ok(Texture {
            handle,
            path: path.to_string(),
            size,
        })
    }

    /// View of the texture, or the fallback when nothing is bound.
    pub fn view(&self, handle: Option<TextureHandle>) -> &wgpu::TextureView {
        handle
            .and_then(|TextureHandle(index)| self.textures.get(index as usize))
            .map_or(&self.fallback.view, |texture| &texture.view)
    }
}

#[cfg(test)]
impl TextureHandle {
    pub fn for_test(index: u32) -> Self {
        TextureHandle(index)
    }
}
