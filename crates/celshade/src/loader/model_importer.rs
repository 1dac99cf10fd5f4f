use std::collections::HashSet;

use anyhow::{Context, Result};
use strum::IntoEnumIterator;
use tracing::{debug, trace, warn};

use super::scene_description::{SceneDescription, SceneNode, SubMeshSource, TextureSlot};
use crate::engine::{GeometryBuffer, Texture, Vertex};

/// Decodes and uploads a texture file. Paths are as written in the model file.
pub trait TextureLoader {
    fn load_texture(&mut self, path: &str) -> Result<Texture>;
}

pub struct ImportedSubMesh {
    pub name: String,
    pub geometry: GeometryBuffer,
    pub textures: Vec<Texture>,
}

/// A model flattened into drawable sub-meshes.
pub struct ImportedModel {
    pub sub_meshes: Vec<ImportedSubMesh>,
    /// Every texture loaded for the model, each path once.
    pub textures: Vec<Texture>,
}

/// Flattens a scene graph into sub-meshes, loading every distinct texture path once.
pub struct ModelImporter<'a> {
    loader: &'a mut dyn TextureLoader,
    texture_cache: Vec<Texture>,
}

impl<'a> ModelImporter<'a> {
    pub fn new(loader: &'a mut dyn TextureLoader) -> Self {
        Self {
            loader,
            texture_cache: Vec::new(),
        }
    }

    /// Emits the sub-meshes referenced by the scene graph in depth-first order. A sub-mesh
    /// referenced from several nodes is emitted once.
    pub fn import(mut self, scene: &SceneDescription) -> Result<ImportedModel> {
        let root = scene.root.as_ref().context("Model has no root node")?;

        let mut mesh_indices = Vec::new();
        collect_mesh_indices(root, &mut HashSet::new(), &mut mesh_indices);

        let mut sub_meshes = Vec::new();
        for index in mesh_indices {
            let Some(source) = scene.meshes.get(index) else {
                warn!("Node references missing mesh {index}, ignoring.");
                continue;
            };
            let textures = self.load_material_textures(scene, source);
            sub_meshes.push(ImportedSubMesh {
                name: source.name.clone(),
                geometry: to_geometry(source),
                textures,
            });
        }
        debug!(
            "Imported {} sub-meshes with {} textures",
            sub_meshes.len(),
            self.texture_cache.len()
        );

        Ok(ImportedModel {
            sub_meshes,
            textures: self.texture_cache,
        })
    }

    fn load_material_textures(
        &mut self,
        scene: &SceneDescription,
        source: &SubMeshSource,
    ) -> Vec<Texture> {
        let Some(material) = source.material.and_then(|index| scene.materials.get(index)) else {
            return vec![];
        };
        let mut textures = Vec::new();
        for slot in TextureSlot::iter() {
            for path in material.textures_in(slot) {
                if let Some(texture) = self.load_texture(path) {
                    textures.push(texture);
                }
            }
        }
        textures
    }

    /// Returns the cached texture with this exact path, or loads it.
    fn load_texture(&mut self, path: &str) -> Option<Texture> {
        if let Some(texture) = self.texture_cache.iter().find(|texture| texture.path == path) {
            return Some(texture.clone());
        }
        match self.loader.load_texture(path) {
            Ok(texture) => {
                self.texture_cache.push(texture.clone());
                Some(texture)
            }
            Err(err) => {
                warn!("Failed to load texture '{path}': {err:?}");
                None
            }
        }
    }
}

fn collect_mesh_indices(node: &SceneNode, visited: &mut HashSet<usize>, result: &mut Vec<usize>) {
    trace!("Visiting node '{}'", node.name);
    for &index in &node.meshes {
        if visited.insert(index) {
            result.push(index);
        }
    }
    for child in &node.children {
        collect_mesh_indices(child, visited, result);
    }
}

/// Missing normals are zero, missing texture coordinates are (0, 0).
fn to_geometry(source: &SubMeshSource) -> GeometryBuffer {
    let vertices = source
        .positions
        .iter()
        .enumerate()
        .map(|(i, &position)| Vertex {
            a_position: position,
            a_uv: source.tex_coords.as_ref().and_then(|uvs| uvs.get(i).copied()).unwrap_or_default(),
            a_normal: source.normals.as_ref().and_then(|ns| ns.get(i).copied()).unwrap_or_default(),
        })
        .collect();

    let mut indices = Vec::with_capacity(source.faces.len() * 3);
    for face in &source.faces {
        if face.len() != 3 {
            warn!("Mesh '{}' has a face with {} vertices, ignoring.", source.name, face.len());
            continue;
        }
        indices.extend_from_slice(face);
    }
    GeometryBuffer { vertices, indices }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use anyhow::bail;

    use super::*;
    use crate::engine::TextureHandle;
    use crate::loader::scene_description::MaterialSource;

    /// Fails for paths starting with "missing" and counts every other load by path.
    #[derive(Default)]
    pub(crate) struct CountingLoader {
        pub decodes: HashMap<String, usize>,
    }

    impl TextureLoader for CountingLoader {
        fn load_texture(&mut self, path: &str) -> Result<Texture> {
            if path.starts_with("missing") {
                bail!("No such file");
            }
            let handle = TextureHandle::for_test(self.decodes.len() as u32);
            *self.decodes.entry(path.to_string()).or_default() += 1;
            Ok(Texture {
                handle,
                path: path.to_string(),
                size: [2, 2],
            })
        }
    }

    fn triangle(name: &str, material: Option<usize>) -> SubMeshSource {
        SubMeshSource {
            name: name.to_string(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            tex_coords: None,
            faces: vec![vec![0, 1, 2]],
            material,
        }
    }

    fn material(textures: &[(TextureSlot, &str)]) -> MaterialSource {
        MaterialSource {
            textures: textures.iter().map(|(slot, path)| (*slot, path.to_string())).collect(),
        }
    }

    fn node(meshes: Vec<usize>, children: Vec<SceneNode>) -> SceneNode {
        SceneNode {
            name: String::new(),
            meshes,
            children,
        }
    }

    #[test]
    fn same_texture_path_is_decoded_once() {
        let scene = SceneDescription {
            root: Some(node(vec![0, 1], vec![])),
            meshes: vec![triangle("a", Some(0)), triangle("b", Some(1))],
            materials: vec![
                material(&[(TextureSlot::Diffuse, "wood.png")]),
                material(&[(TextureSlot::Diffuse, "wood.png")]),
            ],
        };
        let mut loader = CountingLoader::default();
        let model = ModelImporter::new(&mut loader).import(&scene).unwrap();

        assert_eq!(loader.decodes["wood.png"], 1);
        assert_eq!(model.sub_meshes[0].textures, model.sub_meshes[1].textures);
        assert_eq!(model.sub_meshes[0].textures[0].handle, model.sub_meshes[1].textures[0].handle);
        assert_eq!(model.textures.len(), 1);
    }

    #[test]
    fn textures_follow_slot_order() {
        let scene = SceneDescription {
            root: Some(node(vec![0], vec![])),
            meshes: vec![triangle("a", Some(0))],
            materials: vec![material(&[
                (TextureSlot::Ambient, "ao.png"),
                (TextureSlot::Normal, "normal.png"),
                (TextureSlot::Diffuse, "albedo.png"),
                (TextureSlot::Specular, "missing.png"),
            ])],
        };
        let mut loader = CountingLoader::default();
        let model = ModelImporter::new(&mut loader).import(&scene).unwrap();

        let paths = model.sub_meshes[0].textures.iter().map(|t| t.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, ["albedo.png", "normal.png", "ao.png"]);
    }

    #[test]
    fn nested_nodes_emit_each_sub_mesh_once() {
        let scene = SceneDescription {
            root: Some(node(vec![], vec![node(vec![1], vec![node(vec![1, 0], vec![])])])),
            meshes: vec![triangle("first", None), triangle("second", None)],
            materials: vec![],
        };
        let mut loader = CountingLoader::default();
        let model = ModelImporter::new(&mut loader).import(&scene).unwrap();

        let names = model.sub_meshes.iter().map(|m| m.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["second", "first"]);
    }

    #[test]
    fn missing_attributes_default_to_zero() {
        let mut source = triangle("a", None);
        source.normals = None;
        source.faces.push(vec![0, 1, 2, 0]);
        let geometry = to_geometry(&source);

        assert_eq!(geometry.vertices.len(), 3);
        assert_eq!(geometry.vertices[1].a_position, [1.0, 0.0, 0.0]);
        assert_eq!(geometry.vertices[1].a_normal, [0.0; 3]);
        assert_eq!(geometry.vertices[1].a_uv, [0.0; 2]);
        assert_eq!(geometry.indices, [0, 1, 2]);
        assert!(geometry.is_valid());
    }

    #[test]
    fn scene_without_root_fails() {
        let mut loader = CountingLoader::default();
        let result = ModelImporter::new(&mut loader).import(&SceneDescription::default());
        assert!(result.is_err());
    }
}
