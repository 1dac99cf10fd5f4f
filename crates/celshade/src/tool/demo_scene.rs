use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, instrument, warn};

use crate::engine::{
    Camera, DrawableObject, GpuContext, InputState, LightManager, Mesh, RenderPassContext,
    RenderPassDrawBatch, ShaderInfo, ShaderKind, ShaderPair, ShaderProgram, ShadingTechnique,
    Texture, TextureStore,
};
use crate::loader::texture_loader::{GpuTextureLoader, TextureCache};
use crate::loader::{ResourcePath, MODELS_FOLDER, SHADERS_FOLDER, TEXTURES_FOLDER};
use crate::tool::app_config::{AppConfig, MeshSource, ObjectConfig};

/// Everything that is drawn: the camera, the lights and the objects with their resources.
pub struct DemoScene {
    camera: Rc<RefCell<Camera>>,
    objects: Vec<DrawableObject>,
    textures: TextureStore,
}

impl DemoScene {
    #[instrument(skip_all)]
    pub fn new(context: &GpuContext, config: &AppConfig, aspect_ratio: f32) -> Result<Self> {
        let root_path = Arc::new(PathBuf::from(&config.root_folder));
        let camera = Rc::new(RefCell::new(Camera::new(config.camera_position, aspect_ratio)));

        let mut light_manager = LightManager::default();
        for light in &config.point_lights {
            light_manager.create_point_light(*light);
        }
        let light_manager = Rc::new(light_manager);

        let shaders = match load_shader_pair(context, &root_path) {
            Ok(shaders) => Some(shaders),
            Err(err) => {
                error!("Failed to build shader programs: {err:?}");
                None
            }
        };

        let mut textures = TextureStore::new(context);
        let mut meshes = HashMap::<MeshSource, Option<Rc<Mesh>>>::new();
        let mut object_textures = TextureCache::default();
        let mut objects = Vec::with_capacity(config.objects.len());
        for object_config in &config.objects {
            let mut object = DrawableObject::new(Rc::clone(&camera), object_config.position);
            object.transform.set_scale(object_config.scale);
            object.set_movement_speed(config.movement_speed);
            object.set_light_manager(Rc::clone(&light_manager));
            if let Some(shaders) = &shaders {
                object.set_shaders(shaders.clone());
            }

            let mesh = meshes
                .entry(object_config.mesh.clone())
                .or_insert_with(|| load_mesh(context, &mut textures, &root_path, &object_config.mesh));
            if let Some(mesh) = mesh {
                object.set_mesh(Rc::clone(mesh));
            }

            object.set_active_textures(load_object_textures(
                context,
                &mut textures,
                &mut object_textures,
                &root_path,
                object_config,
            ));
            objects.push(object);
        }
        info!("Scene has {} objects.", objects.len());

        Ok(Self {
            camera,
            objects,
            textures,
        })
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.camera.borrow_mut().set_aspect_ratio(aspect_ratio);
    }

    pub fn update(&mut self, input: &InputState, delta_time: f32) {
        for object in &mut self.objects {
            object.update(input, delta_time);
        }
    }

    /// Records the draws of every object, in order, into `batch`.
    pub fn draw(&self, context: &GpuContext, batch: &mut RenderPassDrawBatch) -> Result<()> {
        let mut pass_context = RenderPassContext::new(context, &self.textures, batch);
        for object in &self.objects {
            object.draw(&mut pass_context)?;
        }
        Ok(())
    }
}

fn load_shader_pair(context: &GpuContext, root_path: &Arc<PathBuf>) -> Result<ShaderPair> {
    let program = |id: &str, file_stem: &str, technique: ShadingTechnique| {
        let shaders = [
            ShaderInfo::new(
                ShaderKind::Vertex,
                ResourcePath::new(root_path, SHADERS_FOLDER, &format!("{file_stem}.vert.wgsl")),
            ),
            ShaderInfo::new(
                ShaderKind::Fragment,
                ResourcePath::new(root_path, SHADERS_FOLDER, &format!("{file_stem}.frag.wgsl")),
            ),
        ];
        ShaderProgram::try_new(context, id, &shaders, Some(technique))
    };
    Ok(ShaderPair {
        cel_shading: program("CellShading", "cel_shading", ShadingTechnique::CellShading)?,
        outline: program("ToonOutline", "toon_outline", ShadingTechnique::ToonOutline)?,
    })
}

fn load_mesh(
    context: &GpuContext,
    textures: &mut TextureStore,
    root_path: &Arc<PathBuf>,
    source: &MeshSource,
) -> Option<Rc<Mesh>> {
    let mesh = match source {
        MeshSource::Shape {
            shape,
            winding_order,
        } => Mesh::from_shape(context, *shape, *winding_order),
        MeshSource::Polygon {
            sides,
            winding_order,
        } => Mesh::from_polygon(context, *sides, *winding_order),
        MeshSource::Model(file_name) => {
            let path = ResourcePath::new(root_path, MODELS_FOLDER, file_name);
            let mut loader = GpuTextureLoader {
                context,
                store: textures,
                base: path.clone(),
            };
            Ok(Mesh::load_model(context, &mut loader, &path))
        }
    };
    match mesh {
        Ok(mesh) => Some(Rc::new(mesh)),
        Err(err) => {
            error!("Failed to create mesh {source:?}: {err:?}");
            None
        }
    }
}

fn load_object_textures(
    context: &GpuContext,
    textures: &mut TextureStore,
    cache: &mut TextureCache,
    root_path: &Arc<PathBuf>,
    object_config: &ObjectConfig,
) -> Vec<Texture> {
    let mut loader = GpuTextureLoader {
        context,
        store: textures,
        base: ResourcePath::new(root_path, TEXTURES_FOLDER, ""),
    };
    object_config
        .textures
        .iter()
        .filter_map(|path| {
            cache
                .load(&mut loader, path)
                .inspect_err(|err| warn!("Failed to load texture '{path}': {err:?}"))
                .ok()
        })
        .collect()
}
