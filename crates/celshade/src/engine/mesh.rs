use anyhow::{ensure, Result};
use tracing::{debug, error, trace};
use wgpu::util::DeviceExt;

use super::context::DrawTarget;
use super::{
    GeometryBuffer, GpuContext, Shape, Texture, UniformSink, UniformValue, WindingOrder,
    MAX_TEXTURE_UNITS,
};
use crate::loader::model_importer::{ImportedModel, ModelImporter, TextureLoader};
use crate::loader::{gltf_loader, ResourcePath};

/// Vertex and index buffers of one uploaded `GeometryBuffer`. Destroyed on drop.
pub struct GpuBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
}

impl GpuBuffers {
    fn upload(context: &GpuContext, geometry: &GeometryBuffer) -> Self {
        let vertex_buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuBuffers {
            vertex_buffer,
            index_buffer,
        }
    }
}

impl Drop for GpuBuffers {
    fn drop(&mut self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

pub enum MeshContent<B = GpuBuffers> {
    /// One triangle list with its own buffers.
    Leaf { index_count: u32, buffers: B },
    /// Sub-meshes of an imported model, each drawn with its own textures.
    Composite(Vec<Mesh<B>>),
    /// Nothing to draw, e.g. a model that failed to load.
    Empty,
}

/// A drawable unit. `B` is the buffer type the draw target consumes.
pub struct Mesh<B = GpuBuffers> {
    textures: Vec<Texture>,
    content: MeshContent<B>,
}

impl Mesh {
    pub fn from_shape(context: &GpuContext, shape: Shape, winding_order: WindingOrder) -> Result<Mesh> {
        Self::from_geometry(context, GeometryBuffer::shape(shape, winding_order)?, vec![])
    }

    pub fn from_polygon(context: &GpuContext, sides: u32, winding_order: WindingOrder) -> Result<Mesh> {
        ensure!(sides >= 3, "A polygon needs at least 3 sides, got {sides}");
        Self::from_geometry(context, GeometryBuffer::polygon(sides, winding_order), vec![])
    }

    pub fn from_geometry(
        context: &GpuContext,
        geometry: GeometryBuffer,
        textures: Vec<Texture>,
    ) -> Result<Mesh> {
        ensure!(
            geometry.is_valid(),
            "Invalid geometry: {} indices over {} vertices",
            geometry.indices.len(),
            geometry.vertices.len()
        );
        let buffers = GpuBuffers::upload(context, &geometry);
        Ok(Mesh::leaf(buffers, geometry.indices.len() as u32, textures))
    }

    pub fn from_model(context: &GpuContext, model: ImportedModel) -> Result<Mesh> {
        let children = model
            .sub_meshes
            .into_iter()
            .map(|sub_mesh| {
                debug!("Uploading sub-mesh '{}'", sub_mesh.name);
                Self::from_geometry(context, sub_mesh.geometry, sub_mesh.textures)
            })
            .collect::<Result<Vec<_>>>()?;
        ensure!(!children.is_empty(), "Model has no triangle meshes");
        Ok(Mesh::composite(children, model.textures))
    }

    /// Imports a model file. Failures are logged and leave the mesh empty.
    pub fn load_model(
        context: &GpuContext,
        texture_loader: &mut dyn TextureLoader,
        path: &ResourcePath,
    ) -> Mesh {
        let result = gltf_loader::load_scene_description(path)
            .and_then(|scene| ModelImporter::new(texture_loader).import(&scene))
            .and_then(|model| Self::from_model(context, model));
        match result {
            Ok(mesh) => {
                debug!("Loaded model '{path}'");
                mesh
            }
            Err(err) => {
                error!("Failed to load model '{path}': {err:?}");
                Mesh::empty()
            }
        }
    }
}

impl<B> Mesh<B> {
    pub fn leaf(buffers: B, index_count: u32, textures: Vec<Texture>) -> Self {
        Mesh {
            textures,
            content: MeshContent::Leaf {
                index_count,
                buffers,
            },
        }
    }

    pub fn composite(children: Vec<Mesh<B>>, textures: Vec<Texture>) -> Self {
        Mesh {
            textures,
            content: MeshContent::Composite(children),
        }
    }

    pub fn empty() -> Self {
        Mesh {
            textures: vec![],
            content: MeshContent::Empty,
        }
    }

    /// Every texture the mesh references, deduplicated for imported models.
    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    /// Records the draws of this mesh with the bound program.
    pub fn draw<T: DrawTarget<Buffers = B>>(&self, target: &mut T) -> Result<()> {
        match &self.content {
            MeshContent::Leaf {
                index_count,
                buffers,
            } => {
                if *index_count == 0 {
                    trace!("Skipping draw of mesh with no indices");
                    return Ok(());
                }
                target.draw_indexed(buffers, *index_count)
            }
            MeshContent::Composite(children) => {
                for child in children {
                    bind_child_textures(&mut *target, child.textures());
                    child.draw(target)?;
                }
                Ok(())
            }
            MeshContent::Empty => Ok(()),
        }
    }
}

/// Binds textures to consecutive units starting at 0. Unit 0 is rebound even when empty.
fn bind_child_textures(sink: &mut dyn UniformSink, textures: &[Texture]) {
    let textures = &textures[..textures.len().min(MAX_TEXTURE_UNITS)];
    sink.set_uniform("TextureCount", UniformValue::Int(textures.len() as i32));
    if textures.is_empty() {
        sink.bind_texture(0, None);
    }
    for (unit, texture) in textures.iter().enumerate() {
        sink.bind_texture(unit, Some(texture.handle));
        sink.set_uniform(&format!("ImageTexture{unit}"), UniformValue::Int(unit as i32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::tests::{DrawEvent, RecordingTarget};
    use crate::engine::technique::tests::RecordingSink;
    use crate::engine::{PipelineState, TextureHandle};

    fn texture(index: u32) -> Texture {
        Texture {
            handle: TextureHandle::for_test(index),
            path: format!("{index}.png"),
            size: [4, 4],
        }
    }

    #[test]
    fn child_textures_go_to_consecutive_units() {
        let mut sink = RecordingSink::default();
        bind_child_textures(&mut sink, &[texture(5), texture(9)]);
        assert_eq!(sink.uniforms["TextureCount"], UniformValue::Int(2));
        assert_eq!(sink.uniforms["ImageTexture1"], UniformValue::Int(1));
        assert_eq!(sink.texture_units[&0], Some(TextureHandle::for_test(5)));
        assert_eq!(sink.texture_units[&1], Some(TextureHandle::for_test(9)));
    }

    #[test]
    fn unit_zero_is_rebound_without_textures() {
        let mut sink = RecordingSink::default();
        sink.bind_texture(0, Some(TextureHandle::for_test(1)));
        bind_child_textures(&mut sink, &[]);
        assert_eq!(sink.texture_units[&0], None);
        assert_eq!(sink.uniforms["TextureCount"], UniformValue::Int(0));
    }

    #[test]
    fn texture_units_are_capped() {
        let textures = (0..20).map(texture).collect::<Vec<_>>();
        let mut sink = RecordingSink::default();
        bind_child_textures(&mut sink, &textures);
        assert_eq!(sink.uniforms["TextureCount"], UniformValue::Int(MAX_TEXTURE_UNITS as i32));
        assert!(!sink.texture_units.contains_key(&MAX_TEXTURE_UNITS));
    }

    #[test]
    fn empty_mesh_draws_nothing() {
        let mesh = Mesh::<&'static str>::empty();
        let mut target = RecordingTarget::default();
        mesh.draw(&mut target).unwrap();
        assert!(mesh.textures().is_empty());
        assert!(target.events.is_empty());
    }

    #[test]
    fn composite_binds_child_textures_before_each_draw() {
        let mesh = Mesh::composite(
            vec![
                Mesh::leaf("hull", 6, vec![texture(1), texture(2)]),
                Mesh::leaf("glass", 3, vec![]),
                Mesh::leaf("decal", 0, vec![texture(3)]),
            ],
            vec![texture(1), texture(2), texture(3)],
        );
        let mut target = RecordingTarget::default();
        target.bound = Some("cel");
        mesh.draw(&mut target).unwrap();

        let int = |name: &str, value| DrawEvent::SetUniform(name.to_string(), UniformValue::Int(value));
        let draw = |buffers, index_count| DrawEvent::Draw {
            program: Some("cel"),
            buffers,
            index_count,
            state: PipelineState::default(),
        };
        assert_eq!(
            target.events,
            vec![
                int("TextureCount", 2),
                DrawEvent::BindTexture(0, Some(TextureHandle::for_test(1))),
                int("ImageTexture0", 0),
                DrawEvent::BindTexture(1, Some(TextureHandle::for_test(2))),
                int("ImageTexture1", 1),
                draw("hull", 6),
                int("TextureCount", 0),
                DrawEvent::BindTexture(0, None),
                draw("glass", 3),
                // A child without indices still rebinds but is not drawn
                int("TextureCount", 1),
                DrawEvent::BindTexture(0, Some(TextureHandle::for_test(3))),
                int("ImageTexture0", 0),
            ]
        );
    }
}
