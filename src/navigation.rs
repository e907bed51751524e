//! First-person navigation for the world scene.
//!
//! Look and movement only apply while the pointer is captured. Capture is
//! requested by clicking the render surface, but the controller only
//! believes it is captured once the host reports the change.
//!
//! # Example
//!
//! ```ignore
//! let mut nav = FirstPersonController::new(Vec3::new(0.0, 1.6, 10.0), config);
//! nav.set_captured(true);
//! nav.key(KeyCode::KeyW, true);
//! nav.update(dt);
//! nav.apply(&mut camera);
//! ```

use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};
use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::config::NavigationConfig;

/// Indicator text while the pointer is free.
pub const HINT_CAPTURE: &str = "Click to move camera";
/// Indicator text while the pointer is captured.
pub const HINT_RELEASE: &str = "Press Esc to show cursor";

/// Which physical keys drive which lateral direction.
///
/// `Swapped` binds A/← to moving right and D/→ to moving left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LateralMapping {
    #[default]
    Conventional,
    Swapped,
}

/// Movement intent, one flag per direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Intent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl Intent {
    /// Input direction in controller space: x is right, y is forward.
    /// Normalized, or zero when opposing keys cancel.
    pub fn direction(&self) -> Vec2 {
        let axis = |pos: bool, neg: bool| pos as i32 as f32 - neg as i32 as f32;
        Vec2::new(
            axis(self.right, self.left),
            axis(self.forward, self.backward),
        )
        .normalize_or_zero()
    }

    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

#[derive(Clone, Debug)]
pub struct FirstPersonController {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    intent: Intent,
    captured: bool,
    config: NavigationConfig,
}

impl FirstPersonController {
    pub fn new(position: impl Into<Vec3>, config: NavigationConfig) -> Self {
        Self {
            position: position.into(),
            yaw: 0.0,
            pitch: 0.0,
            intent: Intent::default(),
            captured: false,
            config,
        }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Record a capture change reported by the host.
    pub fn set_captured(&mut self, captured: bool) {
        self.captured = captured;
    }

    pub fn indicator_text(&self) -> &'static str {
        if self.captured {
            HINT_RELEASE
        } else {
            HINT_CAPTURE
        }
    }

    /// Update intent from a key transition. Returns `false` for keys that
    /// do not steer.
    pub fn key(&mut self, key: KeyCode, pressed: bool) -> bool {
        let swapped = self.config.lateral == LateralMapping::Swapped;
        let flag = match key {
            KeyCode::KeyW | KeyCode::ArrowUp => &mut self.intent.forward,
            KeyCode::KeyS | KeyCode::ArrowDown => &mut self.intent.backward,
            KeyCode::KeyA | KeyCode::ArrowLeft if swapped => &mut self.intent.right,
            KeyCode::KeyA | KeyCode::ArrowLeft => &mut self.intent.left,
            KeyCode::KeyD | KeyCode::ArrowRight if swapped => &mut self.intent.left,
            KeyCode::KeyD | KeyCode::ArrowRight => &mut self.intent.right,
            _ => return false,
        };
        *flag = pressed;
        true
    }

    /// Apply a relative pointer movement to yaw and pitch.
    pub fn look(&mut self, delta: Vec2) {
        if !self.captured {
            return;
        }
        self.yaw += delta.x * self.config.sensitivity;
        self.pitch -= delta.y * self.config.sensitivity;
        self.pitch = self.clamp_pitch(self.pitch);
    }

    /// Pitch limits derived from the configured polar range, where a polar
    /// angle of 0 looks straight up.
    fn clamp_pitch(&self, pitch: f32) -> f32 {
        pitch.clamp(
            FRAC_PI_2 - self.config.max_polar,
            FRAC_PI_2 - self.config.min_polar,
        )
    }

    fn forward_direction(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, -self.yaw.cos()).normalize_or_zero()
    }

    fn right_direction(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin()).normalize_or_zero()
    }

    /// Move along the ground plane for one frame. Returns the displacement.
    pub fn update(&mut self, dt: f32) -> Vec3 {
        if !self.captured {
            return Vec3::ZERO;
        }
        let input = self.intent.direction();
        let velocity = self.forward_direction() * input.y + self.right_direction() * input.x;
        let displacement = velocity * self.config.speed * dt;
        self.position += displacement;
        displacement
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.position = self.position;
        camera.set_yaw_pitch(self.yaw, self.pitch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> FirstPersonController {
        let mut nav = FirstPersonController::new(Vec3::new(0.0, 1.6, 10.0), NavigationConfig::default());
        nav.set_captured(true);
        nav
    }

    #[test]
    fn forward_moves_along_negative_z_at_configured_speed() {
        let mut nav = controller();
        nav.key(KeyCode::KeyW, true);
        let moved = nav.update(0.5);
        assert!(moved.distance(Vec3::new(0.0, 0.0, -2.5)) < 1e-5);
        assert!((nav.position.z - 7.5).abs() < 1e-5);
    }

    #[test]
    fn looking_down_does_not_change_ground_speed() {
        let mut nav = controller();
        nav.look(Vec2::new(0.0, 600.0));
        nav.key(KeyCode::ArrowUp, true);
        let moved = nav.update(1.0);
        assert_eq!(moved.y, 0.0);
        assert!((moved.length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn diagonal_input_is_normalized() {
        let mut nav = controller();
        nav.key(KeyCode::KeyW, true);
        nav.key(KeyCode::KeyD, true);
        assert!((nav.update(1.0).length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut nav = controller();
        nav.key(KeyCode::KeyW, true);
        nav.key(KeyCode::KeyS, true);
        assert_eq!(nav.update(1.0), Vec3::ZERO);
    }

    #[test]
    fn lateral_mapping_controls_which_way_a_goes() {
        let mut conventional = controller();
        conventional.key(KeyCode::KeyA, true);
        assert!(conventional.update(1.0).x < 0.0);

        let mut config = NavigationConfig::default();
        config.lateral = LateralMapping::Swapped;
        let mut swapped = FirstPersonController::new(Vec3::ZERO, config);
        swapped.set_captured(true);
        swapped.key(KeyCode::KeyA, true);
        assert!(swapped.intent().right);
        assert!(swapped.update(1.0).x > 0.0);
    }

    #[test]
    fn nothing_moves_without_capture() {
        let mut nav = controller();
        nav.set_captured(false);
        nav.key(KeyCode::KeyW, true);
        nav.look(Vec2::new(100.0, 100.0));
        assert_eq!(nav.update(1.0), Vec3::ZERO);
        assert_eq!((nav.yaw, nav.pitch), (0.0, 0.0));
        assert_eq!(nav.indicator_text(), HINT_CAPTURE);
    }

    #[test]
    fn pitch_stays_inside_the_polar_range() {
        let mut nav = controller();
        nav.look(Vec2::new(0.0, -1.0e6));
        assert!(nav.pitch <= FRAC_PI_2 - 0.01 + 1e-6);
        nav.look(Vec2::new(0.0, 1.0e6));
        assert!(nav.pitch >= -FRAC_PI_2 + 0.01 - 1e-6);
    }

    #[test]
    fn unrelated_keys_are_not_handled() {
        let mut nav = controller();
        assert!(!nav.key(KeyCode::Space, true));
        assert!(!nav.intent().any());
    }
}
