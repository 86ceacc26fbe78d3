//! Camera system

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use glam::{Mat4, Vec3};

use super::input::InputState;
use super::transform::Transform;

/// Free-flying perspective camera.
///
/// The view matrix is rebuilt on every [`Camera::update`]. The projection
/// matrix is rebuilt only on construction and when the aspect ratio changes.
#[derive(Debug, Clone)]
pub struct Camera {
    transform: Transform,
    fov_y: f32,
    near: f32,
    far: f32,
    aspect: f32,
    move_speed: f32,
    look_speed: f32,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    /// Camera with a 45 degree field of view, clip range 0.1..100, move speed 5
    /// and look speed 0.05.
    pub fn new(aspect: f32, position: Vec3) -> Self {
        let mut camera = Self {
            transform: Transform::from_position(position),
            fov_y: FRAC_PI_4,
            near: 0.1,
            far: 100.0,
            aspect,
            move_speed: 5.0,
            look_speed: 0.05,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view_matrix();
        camera.update_projection_matrix(aspect);
        camera
    }

    /// Initial orientation as (pitch, yaw, roll)
    pub fn with_rotation(mut self, pitch_yaw_roll: Vec3) -> Self {
        self.transform.set_rotation(pitch_yaw_roll);
        self.update_view_matrix();
        self
    }

    /// Vertical field of view in radians
    pub fn with_fov(mut self, fov_y: f32) -> Self {
        self.fov_y = fov_y;
        self.update_projection_matrix(self.aspect);
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self.update_projection_matrix(self.aspect);
        self
    }

    pub fn with_move_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    pub fn with_look_speed(mut self, look_speed: f32) -> Self {
        self.look_speed = look_speed;
        self
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position()
    }

    pub fn fov(&self) -> f32 {
        self.fov_y
    }

    pub fn near_clip(&self) -> f32 {
        self.near
    }

    pub fn far_clip(&self) -> f32 {
        self.far
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn look_speed(&self) -> f32 {
        self.look_speed
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Rebuild the view matrix from position, forward and world up
    pub fn update_view_matrix(&mut self) {
        self.view = Mat4::look_to_lh(self.transform.position(), self.transform.forward(), Vec3::Y);
    }

    /// Rebuild the projection matrix for a new aspect ratio
    pub fn update_projection_matrix(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection = Mat4::perspective_lh(self.fov_y, aspect, self.near, self.far);
    }

    /// Apply polled input, then rebuild the view matrix.
    ///
    /// Input is ignored while the UI has captured it. Pitch is clamped to
    /// [-pi/2, pi/2] after every look rotation.
    pub fn update(&mut self, dt: f32, input: &InputState) {
        if !input.captured_by_ui {
            let step = self.move_speed * dt;

            if input.forward {
                self.transform.move_relative(Vec3::new(0.0, 0.0, step));
            }
            if input.backward {
                self.transform.move_relative(Vec3::new(0.0, 0.0, -step));
            }
            if input.left {
                self.transform.move_relative(Vec3::new(-step, 0.0, 0.0));
            }
            if input.right {
                self.transform.move_relative(Vec3::new(step, 0.0, 0.0));
            }
            if input.up {
                self.transform.move_absolute(Vec3::new(0.0, step, 0.0));
            }
            if input.down {
                self.transform.move_absolute(Vec3::new(0.0, -step, 0.0));
            }

            if input.look_active {
                let delta = input.mouse_delta * self.look_speed;
                self.transform.rotate(Vec3::new(delta.y, delta.x, 0.0));

                let mut rotation = self.transform.pitch_yaw_roll();
                rotation.x = rotation.x.clamp(-FRAC_PI_2, FRAC_PI_2);
                self.transform.set_rotation(rotation);
            }
        }

        self.update_view_matrix();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look_input(dx: f32, dy: f32) -> InputState {
        InputState {
            look_active: true,
            mouse_delta: glam::Vec2::new(dx, dy),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let camera = Camera::new(16.0 / 9.0, Vec3::new(0.0, 2.0, -20.0));
        assert_eq!(camera.fov(), FRAC_PI_4);
        assert_eq!(camera.near_clip(), 0.1);
        assert_eq!(camera.far_clip(), 100.0);
        assert_eq!(camera.move_speed(), 5.0);
        assert_eq!(camera.look_speed(), 0.05);
    }

    #[test]
    fn test_pitch_clamped_at_upper_bound() {
        let mut camera = Camera::new(1.0, Vec3::ZERO).with_look_speed(0.1);
        for _ in 0..10 {
            camera.update(0.016, &look_input(0.0, 10.0));
        }
        assert_eq!(camera.transform().pitch_yaw_roll().x, FRAC_PI_2);
    }

    #[test]
    fn test_pitch_clamped_at_lower_bound() {
        let mut camera = Camera::new(1.0, Vec3::ZERO).with_look_speed(0.1);
        camera.update(0.016, &look_input(0.0, -100.0));
        assert_eq!(camera.transform().pitch_yaw_roll().x, -FRAC_PI_2);
    }

    #[test]
    fn test_mouse_ignored_without_look_button() {
        let mut camera = Camera::new(1.0, Vec3::ZERO);
        let mut input = look_input(40.0, 40.0);
        input.look_active = false;
        camera.update(0.016, &input);
        assert_eq!(camera.transform().pitch_yaw_roll(), Vec3::ZERO);
    }

    #[test]
    fn test_forward_moves_along_view_direction() {
        let mut camera = Camera::new(1.0, Vec3::ZERO);
        let input = InputState {
            forward: true,
            ..Default::default()
        };
        camera.update(1.0, &input);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
    }

    #[test]
    fn test_vertical_movement_is_absolute() {
        let mut camera = Camera::new(1.0, Vec3::ZERO).with_rotation(Vec3::new(0.5, 0.0, 0.0));
        let input = InputState {
            up: true,
            ..Default::default()
        };
        camera.update(0.5, &input);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 2.5, 0.0), 1e-5));
    }

    #[test]
    fn test_captured_input_leaves_camera_still() {
        let mut camera = Camera::new(1.0, Vec3::ZERO);
        let input = InputState {
            forward: true,
            captured_by_ui: true,
            ..Default::default()
        };
        camera.update(1.0, &input);
        assert_eq!(camera.position(), Vec3::ZERO);
    }

    #[test]
    fn test_projection_follows_aspect_change() {
        let mut camera = Camera::new(4.0 / 3.0, Vec3::ZERO);
        let before = camera.projection_matrix();
        camera.update_projection_matrix(16.0 / 9.0);
        assert_ne!(before, camera.projection_matrix());
        assert_eq!(
            camera.projection_matrix(),
            Mat4::perspective_lh(FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0)
        );
    }

    #[test]
    fn test_view_matrix_places_camera_at_origin() {
        let mut camera = Camera::new(1.0, Vec3::new(1.0, 2.0, 3.0));
        camera.update(0.0, &InputState::default());
        let eye = camera.view_matrix().transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!(eye.abs_diff_eq(Vec3::ZERO, 1e-5));
    }
}
