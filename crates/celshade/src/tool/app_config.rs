use anyhow::{Context, Result};
use glam::Vec3;
use serde::Deserialize;
use tracing::info;

use crate::engine::{PointLight, Shape, WindingOrder};

const APP_CONFIG_FILE: &str = "config.ron";

/// Which faces the rasterizer discards.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum CullFace {
    None,
    #[default]
    Front,
    Back,
}

impl CullFace {
    pub fn to_wgpu_face(self) -> Option<wgpu::Face> {
        match self {
            CullFace::None => None,
            CullFace::Front => Some(wgpu::Face::Front),
            CullFace::Back => Some(wgpu::Face::Back),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum MeshSource {
    Shape {
        shape: Shape,
        #[serde(default)]
        winding_order: WindingOrder,
    },
    Polygon {
        sides: u32,
        #[serde(default)]
        winding_order: WindingOrder,
    },
    /// File name under the models folder.
    Model(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ObjectConfig {
    pub mesh: MeshSource,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    /// Texture files under the textures folder, the first one is sampled.
    #[serde(default)]
    pub textures: Vec<String>,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_folder: String,
    pub window_title: String,
    pub window_size: [u32; 2],
    pub clear_color: [f64; 4],
    pub cull_face: CullFace,
    pub movement_speed: f32,
    pub camera_position: Vec3,
    pub point_lights: Vec<PointLight>,
    pub objects: Vec<ObjectConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_folder: "app".to_string(),
            window_title: "Cel Shading Demo".to_string(),
            window_size: [800, 800],
            clear_color: [1.0, 1.0, 1.0, 1.0],
            cull_face: CullFace::default(),
            movement_speed: 10.0,
            camera_position: Vec3::new(0.0, 0.0, 5.0),
            point_lights: vec![PointLight {
                position: Vec3::new(0.0, 2.0, 0.0),
                ..Default::default()
            }],
            objects: vec![ObjectConfig {
                mesh: MeshSource::Shape {
                    shape: Shape::Sphere,
                    winding_order: WindingOrder::Clockwise,
                },
                position: Vec3::ZERO,
                scale: Vec3::ONE,
                textures: vec![],
            }],
        }
    }
}

impl AppConfig {
    /// Reads the config file from the working directory, or uses the defaults if there is none.
    pub fn load() -> Result<Self> {
        match std::fs::read_to_string(APP_CONFIG_FILE) {
            Ok(config_str) => Self::from_ron(&config_str)
                .with_context(|| format!("Failed to parse '{APP_CONFIG_FILE}'")),
            Err(_) => {
                info!("No '{APP_CONFIG_FILE}' found, using defaults.");
                Ok(Self::default())
            }
        }
    }

    pub fn from_ron(config_str: &str) -> Result<Self> {
        Ok(ron::de::from_str(config_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_one_lit_sphere() {
        let config = AppConfig::default();
        assert_eq!(config.window_size, [800, 800]);
        assert_eq!(config.cull_face.to_wgpu_face(), Some(wgpu::Face::Front));
        assert_eq!(config.point_lights.len(), 1);
        assert_eq!(config.point_lights[0].position, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(
            config.objects[0].mesh,
            MeshSource::Shape {
                shape: Shape::Sphere,
                winding_order: WindingOrder::Clockwise
            }
        );
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = AppConfig::from_ron(
            r#"(
                cull_face: Back,
                objects: [
                    (mesh: Polygon(sides: 6), position: (2.0, 0.0, 0.0)),
                    (mesh: Model("ship.gltf"), scale: (2.0, 2.0, 2.0)),
                    (mesh: Shape(shape: Cube, winding_order: Clockwise), textures: ["dog.png"]),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(config.root_folder, "app");
        assert_eq!(config.cull_face, CullFace::Back);
        assert_eq!(config.objects.len(), 3);
        assert_eq!(
            config.objects[0].mesh,
            MeshSource::Polygon {
                sides: 6,
                winding_order: WindingOrder::Clockwise
            }
        );
        assert_eq!(config.objects[0].scale, Vec3::ONE);
        assert_eq!(config.objects[1].mesh, MeshSource::Model("ship.gltf".to_string()));
        assert_eq!(config.objects[1].position, Vec3::ZERO);
        assert_eq!(config.objects[2].textures, ["dog.png"]);
    }

    #[test]
    fn omitted_winding_survives_default_culling() {
        let config = AppConfig::from_ron("(objects: [(mesh: Shape(shape: Cube))])").unwrap();
        assert_eq!(config.cull_face, CullFace::Front);
        assert_eq!(
            config.objects[0].mesh,
            MeshSource::Shape {
                shape: Shape::Cube,
                winding_order: WindingOrder::Clockwise
            }
        );
    }

    #[test]
    fn unknown_shape_is_an_error() {
        assert!(AppConfig::from_ron("(objects: [(mesh: Shape(shape: Torus))])").is_err());
    }
}
