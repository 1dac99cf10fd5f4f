use std::time::Instant;

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

use super::scene_description::{
    MaterialSource, SceneDescription, SceneNode, SubMeshSource, TextureSlot,
};
use super::ResourcePath;

/// Reads a glTF file into a scene description. Each triangle primitive becomes one sub-mesh.
#[instrument]
pub fn load_scene_description(path: &ResourcePath) -> Result<SceneDescription> {
    info!("Loading model");
    let now = Instant::now();

    let full_path = path.full_path();
    let gltf = gltf::Gltf::open(&full_path)
        .with_context(|| format!("Failed to parse model '{path}'"))?;
    let base = full_path.parent();
    let buffers = gltf::import_buffers(&gltf.document, base, gltf.blob.clone())
        .with_context(|| format!("Failed to load buffers of '{path}'"))?;
    let document = gltf.document;

    let materials = document.materials().map(|material| read_material(&material)).collect_vec();

    // Primitives of glTF mesh `i` land at sub-mesh indices `mesh_primitives[i]`
    let mut meshes = Vec::new();
    let mut mesh_primitives = Vec::new();
    for mesh in document.meshes() {
        let name = mesh.name().unwrap_or("unnamed").to_string();
        let mut primitive_indices = Vec::new();
        for (pi, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!("Mesh '{name}' primitive {pi} is not a triangle list, ignoring.");
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(positions) = reader.read_positions() else {
                warn!("Mesh '{name}' has no vertex positions, ignoring.");
                continue;
            };
            let positions = positions.collect_vec();
            let normals = reader.read_normals().map(|iter| iter.collect_vec());
            let tex_coords = reader.read_tex_coords(0).map(|iter| iter.into_f32().collect_vec());
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect_vec(),
                None => (0..positions.len() as u32).collect_vec(),
            };
            let faces = indices.chunks(3).map(<[u32]>::to_vec).collect_vec();
            debug!(
                "Mesh '{name}' primitive {pi}: {} vertices, {} faces",
                positions.len(),
                faces.len()
            );

            primitive_indices.push(meshes.len());
            meshes.push(SubMeshSource {
                name: if pi > 0 { format!("{name}.{pi}") } else { name.clone() },
                positions,
                normals,
                tex_coords,
                faces,
                material: primitive.material().index(),
            });
        }
        mesh_primitives.push(primitive_indices);
    }

    let roots = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .map(|scene| scene.nodes().map(|node| read_node(&node, &mesh_primitives)).collect_vec());
    let root = roots.map(|children| SceneNode {
        name: "root".to_string(),
        meshes: vec![],
        children,
    });

    info!("Load time {:?}", now.elapsed());
    Ok(SceneDescription {
        root,
        meshes,
        materials,
    })
}

fn read_node(node: &gltf::Node, mesh_primitives: &[Vec<usize>]) -> SceneNode {
    SceneNode {
        name: node.name().unwrap_or_default().to_string(),
        meshes: node
            .mesh()
            .and_then(|mesh| mesh_primitives.get(mesh.index()))
            .cloned()
            .unwrap_or_default(),
        children: node.children().map(|child| read_node(&child, mesh_primitives)).collect(),
    }
}

fn read_material(material: &gltf::Material) -> MaterialSource {
    let pbr = material.pbr_metallic_roughness();
    let textures = [
        (TextureSlot::Diffuse, pbr.base_color_texture().map(|info| info.texture())),
        (TextureSlot::Specular, pbr.metallic_roughness_texture().map(|info| info.texture())),
        (TextureSlot::Normal, material.normal_texture().map(|info| info.texture())),
        (TextureSlot::Ambient, material.occlusion_texture().map(|info| info.texture())),
    ];
    let textures = textures
        .into_iter()
        .filter_map(|(slot, texture)| {
            match texture?.source().source() {
                gltf::image::Source::Uri { uri, .. } => {
                    let path = texture_path_from_uri(uri);
                    if path.is_none() {
                        warn!("Unsupported {slot} texture URI '{uri}', ignoring.");
                    }
                    Some((slot, path?))
                }
                gltf::image::Source::View { .. } => {
                    warn!("Embedded {slot} texture is not supported, ignoring.");
                    None
                }
            }
        })
        .collect();
    MaterialSource { textures }
}

/// Turns a relative texture URI into a file path. Data URIs and URIs that do not decode
/// to UTF-8 have no path.
fn texture_path_from_uri(uri: &str) -> Option<String> {
    if uri.starts_with("data:") {
        return None;
    }
    let path = percent_encoding::percent_decode_str(uri).decode_utf8().ok()?;
    Some(path.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaped_uri_becomes_file_path() {
        assert_eq!(texture_path_from_uri("my%20tex.png").as_deref(), Some("my tex.png"));
        assert_eq!(
            texture_path_from_uri("textures/wall%5B1%5D.jpg").as_deref(),
            Some("textures/wall[1].jpg")
        );
        assert_eq!(texture_path_from_uri("plain.png").as_deref(), Some("plain.png"));
    }

    #[test]
    fn data_uri_has_no_path() {
        assert_eq!(texture_path_from_uri("data:image/png;base64,iVBORw0KGgo="), None);
    }

    #[test]
    fn invalid_utf8_has_no_path() {
        assert_eq!(texture_path_from_uri("bad%FF.png"), None);
    }
}
