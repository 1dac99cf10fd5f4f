use glam::Vec3;
use serde::Deserialize;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub specular_strength: f32,
    pub attenuation_linear: f32,
    pub attenuation_exponent: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            specular_strength: 1.0,
            attenuation_linear: 0.045,
            attenuation_exponent: 0.0075,
        }
    }
}

/// The point lights of the scene, shared read-only by every lit object.
#[derive(Debug, Default)]
pub struct LightManager {
    point_lights: Vec<PointLight>,
}

impl LightManager {
    pub fn create_point_light(&mut self, light: PointLight) {
        debug!("Point light at {:?}", light.position);
        self.point_lights.push(light);
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }
}
