use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use glam::{Vec3, Vec4};
use tracing::trace;
use wgpu::{CompareFunction, StencilOperation};

use super::context::DrawTarget;
use super::input::movement_vector;
use super::{
    Camera, InputState, LightManager, Mesh, PipelineState, RenderPassContext, ShaderProgram,
    Texture, Transform, UniformSources,
};

const DEFAULT_MOVEMENT_SPEED: f32 = 10.0;

/// Yaw speed in degrees per second at full input.
const ROTATION_SPEED: f32 = 100.0;

/// Stencil value the shaded pass writes and the outline pass tests against.
const OUTLINE_STENCIL_REFERENCE: u32 = 1;

/// The two programs of the outline draw: the shaded pass, then the outline pass.
#[derive(Clone)]
pub struct ShaderPair<P = Rc<ShaderProgram>> {
    pub cel_shading: P,
    pub outline: P,
}

/// A mesh placed in the world, drawn cel-shaded with a toon outline.
pub struct DrawableObject {
    pub transform: Transform,
    mesh: Option<Rc<Mesh>>,
    shaders: Option<ShaderPair>,
    camera: Rc<RefCell<Camera>>,
    light_manager: Option<Rc<LightManager>>,
    active_textures: Vec<Texture>,

    /// Normalized movement input of the last update: xyz translation, w yaw.
    input: Vec4,
    movement_speed: f32,
}

impl DrawableObject {
    pub fn new(camera: Rc<RefCell<Camera>>, position: Vec3) -> Self {
        let mut transform = Transform::default();
        transform.set_translation(position);
        Self {
            transform,
            mesh: None,
            shaders: None,
            camera,
            light_manager: None,
            active_textures: vec![],
            input: Vec4::ZERO,
            movement_speed: DEFAULT_MOVEMENT_SPEED,
        }
    }

    pub fn set_mesh(&mut self, mesh: Rc<Mesh>) {
        self.mesh = Some(mesh);
    }

    pub fn set_shaders(&mut self, shaders: ShaderPair) {
        self.shaders = Some(shaders);
    }

    #[allow(dead_code)]
    pub fn set_camera(&mut self, camera: Rc<RefCell<Camera>>) {
        self.camera = camera;
    }

    pub fn set_light_manager(&mut self, light_manager: Rc<LightManager>) {
        self.light_manager = Some(light_manager);
    }

    pub fn set_active_textures(&mut self, textures: Vec<Texture>) {
        self.active_textures = textures;
    }

    pub fn set_movement_speed(&mut self, movement_speed: f32) {
        self.movement_speed = movement_speed;
    }

    /// Moves and turns the object from the held keys.
    pub fn update(&mut self, input: &InputState, delta_time: f32) {
        self.input = movement_vector(input).normalize_or_zero();

        let movement = self.input.truncate();
        if movement.length() > 0.0 {
            self.transform.translate(movement * delta_time * self.movement_speed);
        }
        if self.input.w != 0.0 {
            self.transform.rotate(Vec3::Y, self.input.w * delta_time * ROTATION_SPEED);
        }
    }

    /// Records the shaded pass and the stencil-masked outline pass.
    pub fn draw(&self, context: &mut RenderPassContext) -> Result<()> {
        let (Some(mesh), Some(shaders)) = (self.mesh.as_deref(), &self.shaders) else {
            trace!("Object has no mesh or shaders, skipping draw");
            return Ok(());
        };
        let camera = self.camera.borrow();
        let sources = UniformSources {
            world_from_model: self.transform.matrix(),
            projection_from_world: camera.projection_from_world(),
            camera_position: camera.position(),
            point_lights: self.light_manager.as_deref().map(LightManager::point_lights),
            textures: &self.active_textures,
        };
        draw_with_outline(context, mesh, shaders, &sources)
    }
}

/// Draws `mesh` shaded, then its outline where the shaded pass left no stencil mark.
///
/// Leaves the pipeline state pass-through and every texture unit empty.
fn draw_with_outline<T: DrawTarget>(
    target: &mut T,
    mesh: &Mesh<T::Buffers>,
    shaders: &ShaderPair<T::Program>,
    sources: &UniformSources,
) -> Result<()> {
    apply_shaded_pass_state(target.pipeline_state());
    target.bind_program(&shaders.cel_shading, sources);
    mesh.draw(target)?;
    target.unbind_program();

    apply_outline_pass_state(target.pipeline_state());
    target.bind_program(&shaders.outline, sources);
    mesh.draw(target)?;
    restore_pass_through_state(target.pipeline_state());
    target.unbind_program();

    target.unbind_textures();
    Ok(())
}

/// Always passes and marks every covered pixel.
fn apply_shaded_pass_state(state: &mut PipelineState) {
    state.stencil_op(StencilOperation::Keep, StencilOperation::Keep, StencilOperation::Replace);
    state.stencil_func(CompareFunction::Always, OUTLINE_STENCIL_REFERENCE, 0xFF);
    state.stencil_mask(0xFF);
}

/// Draws only outside the marked pixels, on top of everything.
fn apply_outline_pass_state(state: &mut PipelineState) {
    state.stencil_func(CompareFunction::NotEqual, OUTLINE_STENCIL_REFERENCE, 0xFF);
    state.stencil_mask(0x00);
    state.set_depth_test(false);
}

fn restore_pass_through_state(state: &mut PipelineState) {
    state.stencil_mask(0xFF);
    state.stencil_func(CompareFunction::Always, OUTLINE_STENCIL_REFERENCE, 0xFF);
    state.set_depth_test(true);
}
