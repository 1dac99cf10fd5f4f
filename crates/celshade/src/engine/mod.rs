pub mod camera;
pub mod context;
pub mod drawable;
pub mod geometry;
pub mod input;
pub mod light;
pub mod mesh;
pub mod pipeline_state;
pub mod shader;
pub mod technique;
pub mod texture;
pub mod transform;
pub mod uniforms;

pub use camera::Camera;
pub use context::{GpuContext, RenderPassContext, RenderPassDrawBatch};
pub use drawable::{DrawableObject, ShaderPair};
pub use geometry::{GeometryBuffer, Shape, WindingOrder};
pub use input::{InputState, Key};
pub use light::{LightManager, PointLight};
pub use mesh::Mesh;
pub use pipeline_state::PipelineState;
pub use shader::{ShaderInfo, ShaderKind, ShaderProgram};
pub use technique::{ShadingTechnique, UniformSources};
pub use texture::{Texture, TextureHandle, TextureStore};
pub use transform::Transform;
pub use uniforms::{UniformSink, UniformValue};

/// Vertex as laid out in GPU memory. Field order and offsets must match `VERTEX_FORMAT`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub a_position: [f32; 3],
    pub a_uv: [f32; 2],
    pub a_normal: [f32; 3],
}

const VERTEX_FORMAT: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x2,
    2 => Float32x3,
];

pub type MeshIndex = u32;

pub type Size2D = [u32; 2];

/// Number of texture units a draw can sample from.
pub const MAX_TEXTURE_UNITS: usize = 16;
