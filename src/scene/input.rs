//! Polled input state consumed by camera updates

use glam::Vec2;

/// Snapshot of the keys and mouse buttons relevant to camera control.
///
/// The window layer sets key flags on press/release and accumulates mouse
/// motion between polls; [`InputState::reset_deltas`] is called once per frame
/// after the update has consumed them.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Mouse movement since the last poll, in pixels
    pub mouse_delta: Vec2,
    /// Whether the look button (left mouse) is held
    pub look_active: bool,
    /// Set while the UI overlay wants keyboard and mouse input
    pub captured_by_ui: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pressed state of one camera key
    pub fn set_key(&mut self, key: CameraKey, pressed: bool) {
        match key {
            CameraKey::Forward => self.forward = pressed,
            CameraKey::Backward => self.backward = pressed,
            CameraKey::Left => self.left = pressed,
            CameraKey::Right => self.right = pressed,
            CameraKey::Up => self.up = pressed,
            CameraKey::Down => self.down = pressed,
        }
    }

    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_delta += Vec2::new(dx, dy);
    }

    /// Reset per-frame deltas
    pub fn reset_deltas(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    /// Release every key, used when focus is lost
    pub fn release_all(&mut self) {
        *self = Self {
            captured_by_ui: self.captured_by_ui,
            ..Self::default()
        };
    }
}

/// Logical camera controls; the window layer maps W/S/A/D/Space/X onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKey {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_delta_accumulates_until_reset() {
        let mut input = InputState::new();
        input.add_mouse_delta(3.0, -1.0);
        input.add_mouse_delta(2.0, 4.0);
        assert_eq!(input.mouse_delta, Vec2::new(5.0, 3.0));

        input.reset_deltas();
        assert_eq!(input.mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn test_release_all_keeps_capture_flag() {
        let mut input = InputState::new();
        input.set_key(CameraKey::Forward, true);
        input.look_active = true;
        input.captured_by_ui = true;

        input.release_all();
        assert!(!input.forward);
        assert!(!input.look_active);
        assert!(input.captured_by_ui);
    }
}
