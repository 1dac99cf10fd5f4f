use std::f32::consts::PI;

use glam::{Mat4, Vec3};

/// A perspective camera looking from `position` along yaw and pitch.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation around the Y axis in radians, zero looks towards -Z.
    pub yaw: f32,
    pub pitch: f32,
    pub field_of_view: f32,
    pub aspect_ratio: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(position: Vec3, aspect_ratio: f32) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            field_of_view: PI / 4.0,
            aspect_ratio,
            z_near: 0.1,
            z_far: 100.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    /// Projection times view matrix. Depth is mapped to [0, 1].
    pub fn projection_from_world(&self) -> Mat4 {
        let projection_from_camera =
            Mat4::perspective_rh(self.field_of_view, self.aspect_ratio, self.z_near, self.z_far);
        let camera_from_world = Mat4::look_to_rh(self.position, self.forward(), Vec3::Y);
        projection_from_camera * camera_from_world
    }
}
