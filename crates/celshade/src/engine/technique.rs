use glam::{Mat4, Vec3};
use serde::Deserialize;
use strum::{Display, EnumString};

use super::{PointLight, Texture, UniformSink, UniformValue};

const CELL_SHADING_AMBIENT_STRENGTH: f32 = 0.5;
const CELL_SHADING_AMBIENT_COLOR: Vec3 = Vec3::ONE;
const CELL_SHADING_SHININESS: f32 = 160.0;

const TOON_OUTLINE_WIDTH: f32 = 0.2;
const TOON_OUTLINE_COLOR: Vec3 = Vec3::ZERO;

/// Everything a technique may read to fill the uniforms of one draw.
pub struct UniformSources<'a> {
    pub world_from_model: Mat4,
    pub projection_from_world: Mat4,
    pub camera_position: Vec3,
    /// `None` when the object has no light manager attached.
    pub point_lights: Option<&'a [PointLight]>,
    pub textures: &'a [Texture],
}

/// The shading techniques a program can be bound with. Each knows which uniforms its
/// shader stages expect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, EnumString, Display)]
pub enum ShadingTechnique {
    CellShading,
    ToonOutline,
}

impl ShadingTechnique {
    pub fn push_uniforms(&self, sink: &mut dyn UniformSink, sources: &UniformSources) {
        let projection_from_model = sources.projection_from_world * sources.world_from_model;
        sink.set_uniform("PVMMatrix", UniformValue::Mat4(projection_from_model));
        sink.set_uniform("ModelMatrix", UniformValue::Mat4(sources.world_from_model));

        match self {
            ShadingTechnique::CellShading => Self::push_cell_shading(sink, sources),
            ShadingTechnique::ToonOutline => {
                sink.set_uniform("OutlineWidth", UniformValue::Float(TOON_OUTLINE_WIDTH));
                sink.set_uniform("Color", UniformValue::Vec3(TOON_OUTLINE_COLOR));
            }
        }
    }

    fn push_cell_shading(sink: &mut dyn UniformSink, sources: &UniformSources) {
        sink.set_uniform("TextureCount", UniformValue::Int(sources.textures.len() as i32));
        if let Some(texture) = sources.textures.first() {
            sink.bind_texture(0, Some(texture.handle));
            sink.set_uniform("ImageTexture0", UniformValue::Int(0));
        }

        sink.set_uniform("AmbientStrength", UniformValue::Float(CELL_SHADING_AMBIENT_STRENGTH));
        sink.set_uniform("AmbientColor", UniformValue::Vec3(CELL_SHADING_AMBIENT_COLOR));
        sink.set_uniform("Shininess", UniformValue::Float(CELL_SHADING_SHININESS));
        sink.set_uniform("CameraPos", UniformValue::Vec3(sources.camera_position));

        let point_lights = sources.point_lights.unwrap_or_default();
        sink.set_uniform("PointLightCount", UniformValue::Int(point_lights.len() as i32));
        for (i, light) in point_lights.iter().enumerate() {
            let prefix = format!("PointLights[{i}]");
            sink.set_uniform(&format!("{prefix}.Position"), UniformValue::Vec3(light.position));
            sink.set_uniform(&format!("{prefix}.Color"), UniformValue::Vec3(light.color));
            sink.set_uniform(
                &format!("{prefix}.SpecularStrength"),
                UniformValue::Float(light.specular_strength),
            );
            sink.set_uniform(
                &format!("{prefix}.AttenuationLinear"),
                UniformValue::Float(light.attenuation_linear),
            );
            sink.set_uniform(
                &format!("{prefix}.AttenuationExponent"),
                UniformValue::Float(light.attenuation_exponent),
            );
        }
    }
}
