//! Transform component

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::cache::Cached;

/// Matrices derived from a transform, recomputed together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldMatrices {
    pub world: Mat4,
    pub world_inverse_transpose: Mat4,
}

impl Default for WorldMatrices {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            world_inverse_transpose: Mat4::IDENTITY,
        }
    }
}

/// Position, Euler rotation and scale of a flat (parentless) object.
///
/// Rotation is stored as pitch (about X), yaw (about Y) and roll (about Z) in
/// radians, applied roll first, then pitch, then yaw. The coordinate system is
/// left-handed: +X right, +Y up, +Z forward. The world matrix scales first,
/// then rotates, then translates.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    pitch_yaw_roll: Vec3,
    scale: Vec3,
    matrices: Cached<WorldMatrices>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            pitch_yaw_roll: Vec3::ZERO,
            scale: Vec3::ONE,
            matrices: Cached::default(),
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create transform from position, rotation (pitch/yaw/roll in radians), and scale
    pub fn from_components(position: Vec3, pitch_yaw_roll: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            pitch_yaw_roll,
            scale,
            matrices: Cached::default(),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Rotation as (pitch, yaw, roll)
    pub fn pitch_yaw_roll(&self) -> Vec3 {
        self.pitch_yaw_roll
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.matrices.invalidate();
    }

    pub fn set_rotation(&mut self, pitch_yaw_roll: Vec3) {
        self.pitch_yaw_roll = pitch_yaw_roll;
        self.matrices.invalidate();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.matrices.invalidate();
    }

    /// Translate by an offset given in world space
    pub fn move_absolute(&mut self, offset: Vec3) {
        self.position += offset;
        self.matrices.invalidate();
    }

    /// Translate by an offset given in this transform's local space
    pub fn move_relative(&mut self, offset: Vec3) {
        self.position += self.relative_vector(offset);
        self.matrices.invalidate();
    }

    /// Add to the Euler angles. Angles accumulate without wrapping.
    pub fn rotate(&mut self, pitch_yaw_roll: Vec3) {
        self.pitch_yaw_roll += pitch_yaw_roll;
        self.matrices.invalidate();
    }

    /// Multiply the current scale component-wise
    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
        self.matrices.invalidate();
    }

    /// Orientation quaternion built from the Euler angles
    pub fn orientation(&self) -> Quat {
        let Vec3 { x: pitch, y: yaw, z: roll } = self.pitch_yaw_roll;
        Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll)
    }

    /// Rotate a local-space vector into world space
    pub fn relative_vector(&self, local: Vec3) -> Vec3 {
        self.orientation() * local
    }

    /// Local +Z in world space
    pub fn forward(&self) -> Vec3 {
        self.relative_vector(Vec3::Z)
    }

    /// Local +X in world space
    pub fn right(&self) -> Vec3 {
        self.relative_vector(Vec3::X)
    }

    /// Local +Y in world space
    pub fn up(&self) -> Vec3 {
        self.relative_vector(Vec3::Y)
    }

    fn matrices(&self) -> WorldMatrices {
        self.matrices.get_or_update(|| {
            let world =
                Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.position);
            WorldMatrices {
                world,
                world_inverse_transpose: world.inverse().transpose(),
            }
        })
    }

    /// Get the world matrix for this transform
    pub fn world_matrix(&self) -> Mat4 {
        self.matrices().world
    }

    /// Get the inverse transpose of the world matrix, used for normals
    pub fn world_inverse_transpose_matrix(&self) -> Mat4 {
        self.matrices().world_inverse_transpose
    }

    /// Whether the next matrix read recomputes
    pub fn is_dirty(&self) -> bool {
        self.matrices.is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec3_near(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, 1e-5),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_identity_transform_is_identity_matrix() {
        let transform = Transform::new();
        assert_eq!(transform.world_matrix(), Mat4::IDENTITY);
        assert_eq!(transform.world_inverse_transpose_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_scale_applies_before_translation() {
        let mut transform = Transform::new();
        transform.set_scale(Vec3::splat(2.0));
        transform.move_absolute(Vec3::new(5.0, 0.0, 0.0));

        let world = transform.world_matrix();
        assert_vec3_near(world.transform_point3(Vec3::X), Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_mutation_burst_converges_to_final_state() {
        let mut transform = Transform::new();
        transform.set_position(Vec3::new(1.0, 2.0, 3.0));
        let _ = transform.world_matrix();
        transform.rotate(Vec3::new(0.1, 0.2, 0.3));
        transform.scale_by(Vec3::new(2.0, 1.0, 1.0));
        transform.move_absolute(Vec3::new(-1.0, 0.0, 0.5));
        transform.rotate(Vec3::new(0.2, -0.4, 0.0));
        transform.set_scale(Vec3::new(0.5, 3.0, 1.5));

        let fresh = Transform::from_components(
            transform.position(),
            transform.pitch_yaw_roll(),
            transform.scale(),
        );
        assert_eq!(transform.world_matrix(), fresh.world_matrix());
        assert_eq!(
            transform.world_inverse_transpose_matrix(),
            fresh.world_inverse_transpose_matrix()
        );
    }

    #[test]
    fn test_repeated_reads_are_cache_hits() {
        let mut transform = Transform::new();
        transform.rotate(Vec3::new(0.3, 1.1, -0.2));
        assert!(transform.is_dirty());

        let first = transform.world_matrix();
        assert!(!transform.is_dirty());
        let second = transform.world_matrix();

        let bits = |m: Mat4| m.to_cols_array().map(f32::to_bits);
        assert_eq!(bits(first), bits(second));
    }

    #[test]
    fn test_every_mutator_invalidates() {
        let mut transform = Transform::new();
        let mutators: [fn(&mut Transform); 7] = [
            |t| t.set_position(Vec3::ONE),
            |t| t.set_rotation(Vec3::ONE),
            |t| t.set_scale(Vec3::ONE),
            |t| t.move_absolute(Vec3::ONE),
            |t| t.move_relative(Vec3::ONE),
            |t| t.rotate(Vec3::ONE),
            |t| t.scale_by(Vec3::ONE),
        ];
        for mutate in mutators {
            let _ = transform.world_matrix();
            mutate(&mut transform);
            assert!(transform.is_dirty());
        }
    }

    #[test]
    fn test_relative_movement_follows_yaw() {
        let mut absolute = Transform::new();
        absolute.set_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));
        absolute.move_absolute(Vec3::X);
        assert_vec3_near(absolute.position(), Vec3::X);

        let mut relative = Transform::new();
        relative.set_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));
        relative.move_relative(Vec3::X);
        let moved = relative.position();
        assert!(moved.x.abs() < 1e-5);
        assert!((moved.z.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_direction_vectors_without_rotation() {
        let transform = Transform::new();
        assert_vec3_near(transform.forward(), Vec3::Z);
        assert_vec3_near(transform.right(), Vec3::X);
        assert_vec3_near(transform.up(), Vec3::Y);
    }

    #[test]
    fn test_yaw_turns_forward_towards_right() {
        let mut transform = Transform::new();
        transform.set_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));
        assert_vec3_near(transform.forward(), Vec3::X);
    }

    #[test]
    fn test_rotation_accumulates_without_wrapping() {
        let mut transform = Transform::new();
        for _ in 0..10 {
            transform.rotate(Vec3::new(0.0, 1.0, 0.0));
        }
        assert!((transform.pitch_yaw_roll().y - 10.0).abs() < 1e-5);
    }
}
