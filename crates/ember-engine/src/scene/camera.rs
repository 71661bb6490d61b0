use std::f32::consts::FRAC_PI_4;

use glam::{Mat4, Vec3};

const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Axis a camera translation moves along.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CameraMove {
    Forward,
    Right,
    Up,
}

/// Free-fly perspective camera.
///
/// Orientation is kept as yaw/pitch in radians; pitch is clamped to ±89° so the
/// look-at basis never degenerates.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Radians per unit of pointer motion.
    pub sensitivity: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 10.0), FRAC_PI_4, 1.7)
    }
}

impl Camera {
    /// Camera at `position` looking down -Z.
    pub fn new(position: Vec3, fov_y: f32, aspect: f32) -> Self {
        Self {
            position,
            yaw: -std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            fov_y,
            aspect,
            near: 0.1,
            far: 100.0,
            move_speed: 5.0,
            sensitivity: 0.002,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cy * cp, sp, sy * cp).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Right-handed look-at view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    /// Perspective projection with a 0..1 depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(f32::EPSILON), self.near, self.far)
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Applies a pointer delta: +x turns right, +y looks down.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Moves along `axis`; `value` is the axis input in -1..=1.
    pub fn move_by(&mut self, axis: CameraMove, value: f32, dt: f32) {
        let dir = match axis {
            CameraMove::Forward => self.forward(),
            CameraMove::Right => self.right(),
            CameraMove::Up => Vec3::Y,
        };
        self.position += dir * value * self.move_speed * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_looks_down_negative_z() {
        let cam = Camera::default();
        assert!(cam.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(cam.right().abs_diff_eq(Vec3::X, 1e-6));

        let eye_space = cam.view_matrix().transform_point3(Vec3::ZERO);
        assert!(eye_space.abs_diff_eq(Vec3::new(0.0, 0.0, -10.0), 1e-5));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::default();
        cam.rotate(0.0, -1.0e6);
        assert!((cam.pitch() - PITCH_LIMIT).abs() < 1e-6);
        cam.rotate(0.0, 1.0e6);
        assert!((cam.pitch() + PITCH_LIMIT).abs() < 1e-6);
        assert!(cam.view_matrix().is_finite());
    }

    #[test]
    fn movement_scales_with_speed_and_dt() {
        let mut cam = Camera::default();
        cam.move_by(CameraMove::Forward, 1.0, 0.5);
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 0.0, 7.5), 1e-5));

        cam.move_by(CameraMove::Right, -1.0, 0.2);
        cam.move_by(CameraMove::Up, 1.0, 0.2);
        assert!(cam.position.abs_diff_eq(Vec3::new(-1.0, 1.0, 7.5), 1e-5));
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let cam = Camera::default();
        let clip = cam.projection_matrix() * glam::Vec4::new(0.0, 0.0, -cam.near, 1.0);
        assert!((clip.z / clip.w).abs() < 1e-5);

        let far = cam.projection_matrix() * glam::Vec4::new(0.0, 0.0, -cam.far, 1.0);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn aspect_ignores_degenerate_sizes() {
        let mut cam = Camera::default();
        cam.set_aspect(0, 600);
        assert_eq!(cam.aspect, 1.7);
        cam.set_aspect(800, 400);
        assert_eq!(cam.aspect, 2.0);
    }
}
