use glam::Vec3;

/// A perspective camera as the scenes hand it to their render surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov: f32, // radians
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_2, // 90 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: impl Into<Vec3>) -> Self {
        self.position = position.into();
        self
    }

    pub fn looking_at(mut self, target: impl Into<Vec3>) -> Self {
        self.forward = (target.into() - self.position).normalize_or_zero();
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Orientation from yaw (around +Y, 0 looks down -Z) and pitch.
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.forward = Vec3::new(
            yaw.sin() * pitch.cos(),
            pitch.sin(),
            -yaw.cos() * pitch.cos(),
        )
        .normalize_or_zero();
    }

    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }

    pub fn orthogonal_up(&self) -> Vec3 {
        self.right().cross(self.forward).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_basis_is_right_handed() {
        let camera = Camera::new();
        assert!(camera.right().distance(Vec3::X) < 1e-6);
        assert!(camera.orthogonal_up().distance(Vec3::Y) < 1e-6);
    }

    #[test]
    fn yaw_turns_toward_positive_x() {
        let mut camera = Camera::new();
        camera.set_yaw_pitch(std::f32::consts::FRAC_PI_2, 0.0);
        assert!(camera.forward.distance(Vec3::X) < 1e-6);
    }

    #[test]
    fn zero_size_keeps_previous_aspect() {
        let mut camera = Camera::new();
        camera.set_aspect(800, 400);
        camera.set_aspect(0, 400);
        assert_eq!(camera.aspect, 2.0);
    }
}
