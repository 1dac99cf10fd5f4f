use strum::{Display, EnumIter};

/// Material texture slots a model may reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    Normal,
    Ambient,
}

/// Format-independent description of a model file, before anything is decoded or uploaded.
#[derive(Clone, Debug, Default)]
pub struct SceneDescription {
    pub root: Option<SceneNode>,
    pub meshes: Vec<SubMeshSource>,
    pub materials: Vec<MaterialSource>,
}

#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    pub name: String,
    /// Indices into `SceneDescription::meshes`.
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

#[derive(Clone, Debug, Default)]
pub struct SubMeshSource {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Vertex indices of each face. Only triangles are imported.
    pub faces: Vec<Vec<u32>>,
    /// Index into `SceneDescription::materials`.
    pub material: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct MaterialSource {
    /// Texture paths as written in the model file, relative to it.
    pub textures: Vec<(TextureSlot, String)>,
}

impl MaterialSource {
    pub fn textures_in(&self, slot: TextureSlot) -> impl Iterator<Item = &str> {
        self.textures
            .iter()
            .filter(move |(texture_slot, _)| *texture_slot == slot)
            .map(|(_, path)| path.as_str())
    }
}
