use glam::{Mat4, Vec2, Vec3};

/// Logical width of the orthographic volume, in world units.
pub const VIEW_WIDTH: f32 = 1280.0;
/// Logical height of the orthographic volume, in world units.
pub const VIEW_HEIGHT: f32 = 720.0;
const NEAR: f32 = 0.0;
const FAR: f32 = 100.0;
const EYE_Z: f32 = 20.0;

/// 2D camera. Translates in the XY plane, never rotates or zooms.
pub struct Camera {
    pub position: Vec2,
    projection: Mat4,
}

impl Camera {
    pub fn new(position: Vec2) -> Self {
        let mut camera = Self {
            position,
            projection: Mat4::IDENTITY,
        };
        camera.adjust_projection();
        camera
    }

    /// Rebuilds the projection from the fixed logical bounds. Resizing the
    /// window does not feed back into it.
    pub fn adjust_projection(&mut self) {
        self.projection = Mat4::orthographic_rh(0.0, VIEW_WIDTH, 0.0, VIEW_HEIGHT, NEAR, FAR);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = Vec3::new(self.position.x, self.position.y, EYE_Z);
        let front = Vec3::NEG_Z + Vec3::new(self.position.x, self.position.y, 0.0);
        Mat4::look_at_rh(eye, front, Vec3::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(m: Mat4) -> Vec3 {
        m.w_axis.truncate()
    }

    #[test]
    fn projection_is_stable_across_queries() {
        let mut camera = Camera::new(Vec2::new(3.0, 4.0));
        let first = camera.projection_matrix();
        camera.position += Vec2::new(100.0, -50.0);
        assert_eq!(camera.projection_matrix(), first);
        camera.adjust_projection();
        assert_eq!(camera.projection_matrix(), first);
    }

    #[test]
    fn projection_maps_logical_bounds_to_clip_space() {
        let camera = Camera::new(Vec2::ZERO);
        let proj = camera.projection_matrix();
        let bottom_left = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let top_right = proj.project_point3(Vec3::new(VIEW_WIDTH, VIEW_HEIGHT, -1.0));
        assert!((bottom_left.x + 1.0).abs() < 1e-5);
        assert!((bottom_left.y + 1.0).abs() < 1e-5);
        assert!((top_right.x - 1.0).abs() < 1e-5);
        assert!((top_right.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn view_at_origin_only_pulls_back_along_z() {
        let camera = Camera::new(Vec2::ZERO);
        let t = translation(camera.view_matrix());
        assert!(t.x.abs() < 1e-6);
        assert!(t.y.abs() < 1e-6);
        assert!((t.z + EYE_Z).abs() < 1e-5);
    }

    #[test]
    fn view_translation_tracks_negated_position() {
        let mut camera = Camera::new(Vec2::new(10.0, 5.0));
        let before = translation(camera.view_matrix());

        camera.position += Vec2::new(25.0, -40.0);
        let after = translation(camera.view_matrix());

        assert!(((after.x - before.x) + 25.0).abs() < 1e-4);
        assert!(((after.y - before.y) - 40.0).abs() < 1e-4);
        assert!((after.z - before.z).abs() < 1e-6);
    }

    #[test]
    fn view_has_no_rotation() {
        let camera = Camera::new(Vec2::new(-12.5, 7.0));
        let view = camera.view_matrix();
        assert!((view.x_axis.truncate() - Vec3::X).length() < 1e-6);
        assert!((view.y_axis.truncate() - Vec3::Y).length() < 1e-6);
        assert!((view.z_axis.truncate() - Vec3::Z).length() < 1e-6);
    }
}
