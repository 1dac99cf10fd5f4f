use glam::{Mat4, Vec3};

/// Translation, axis-angle rotation and scale of an object, with the derived model matrix.
///
/// The matrix is always `translate * rotate(axis, angle) * scale` except right after
/// `rotate_around`, whose effect lasts until the next channel change.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    translation: Vec3,
    rotation_axis: Vec3,
    /// Accumulated rotation in radians.
    rotation_angle: f32,
    scale: Vec3,
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_axis: Vec3::Y,
            rotation_angle: 0.0,
            scale: Vec3::ONE,
            matrix: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    #[allow(dead_code)]
    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    #[allow(dead_code)]
    pub fn rotation_axis(&self) -> Vec3 {
        self.rotation_axis
    }

    #[allow(dead_code)]
    pub fn rotation_angle(&self) -> f32 {
        self.rotation_angle
    }

    #[allow(dead_code)]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// World-from-model matrix.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.update_matrix();
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.translation += offset;
        self.update_matrix();
    }

    pub fn set_rotation(&mut self, axis: Vec3, degrees: f32) {
        self.rotation_axis = axis;
        self.rotation_angle = degrees.to_radians();
        self.update_matrix();
    }

    /// Replaces the rotation axis and adds to the accumulated angle.
    pub fn rotate(&mut self, axis: Vec3, degrees: f32) {
        self.rotation_axis = axis;
        self.rotation_angle += degrees.to_radians();
        self.update_matrix();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.update_matrix();
    }

    #[allow(dead_code)]
    /// Multiplies the current scale component-wise.
    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
        self.update_matrix();
    }

    #[allow(dead_code)]
    /// Rotates the current matrix around `point`. Not stored in any channel.
    pub fn rotate_around(&mut self, point: Vec3, axis: Vec3, degrees: f32) {
        let direction = point - self.translation;
        self.matrix = self.matrix
            * Mat4::from_translation(direction)
            * rotation_matrix(axis, degrees.to_radians())
            * Mat4::from_translation(-direction);
    }

    fn update_matrix(&mut self) {
        self.matrix = Mat4::from_translation(self.translation)
            * rotation_matrix(self.rotation_axis, self.rotation_angle)
            * Mat4::from_scale(self.scale);
    }
}

fn rotation_matrix(axis: Vec3, radians: f32) -> Mat4 {
    axis.try_normalize()
        .map_or(Mat4::IDENTITY, |axis| Mat4::from_axis_angle(axis, radians))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec3_near(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, 1e-4),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn matrix_is_composition_of_channels() {
        let mut transform = Transform::default();
        transform.translate(Vec3::new(1.0, 0.0, 0.0));
        transform.set_scale(Vec3::splat(2.0));
        transform.rotate(Vec3::Z, 30.0);
        transform.translate(Vec3::new(0.0, 2.0, -1.0));
        transform.rotate(Vec3::Z, 60.0);
        transform.scale_by(Vec3::new(1.0, 0.5, 1.0));

        assert_vec3_near(transform.translation(), Vec3::new(1.0, 2.0, -1.0));
        assert_vec3_near(transform.scale(), Vec3::new(2.0, 1.0, 2.0));
        assert!((transform.rotation_angle() - 90f32.to_radians()).abs() < 1e-5);

        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, -1.0))
            * Mat4::from_axis_angle(Vec3::Z, 90f32.to_radians())
            * Mat4::from_scale(Vec3::new(2.0, 1.0, 2.0));
        assert!(transform.matrix().abs_diff_eq(expected, 1e-5));

        // Scale (1,0,0) to (2,0,0), rotate to (0,2,0), translate
        let moved = transform.matrix().transform_point3(Vec3::X);
        assert_vec3_near(moved, Vec3::new(1.0, 4.0, -1.0));
    }

    #[test]
    fn set_rotation_replaces_accumulated_angle() {
        let mut transform = Transform::default();
        transform.rotate(Vec3::Y, 45.0);
        transform.rotate(Vec3::Y, 45.0);
        transform.set_rotation(Vec3::X, 10.0);
        assert_eq!(transform.rotation_axis(), Vec3::X);
        assert!((transform.rotation_angle() - 10f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn zero_axis_means_no_rotation() {
        let mut transform = Transform::default();
        transform.set_rotation(Vec3::ZERO, 90.0);
        assert!(transform.matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn rotate_around_is_discarded_by_next_channel_change() {
        let mut transform = Transform::default();
        transform.set_translation(Vec3::new(1.0, 0.0, 0.0));
        transform.rotate_around(Vec3::ZERO, Vec3::Y, 180.0);
        let rotated = transform.matrix().transform_point3(Vec3::ZERO);
        assert_vec3_near(rotated, Vec3::new(-1.0, 0.0, 0.0));

        transform.translate(Vec3::ZERO);
        assert_vec3_near(transform.matrix().transform_point3(Vec3::ZERO), Vec3::X);
    }
}
