//! Look-at camera and perspective projection.
//!
//! Both produce OpenGL-style matrices; [`Projection::calc_matrix`] folds in the
//! depth-range correction wgpu needs so shaders can use the result directly.

use cgmath::{Deg, Matrix4, Point3, Rad, Vector3, perspective};

use crate::config::CameraConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<E: Into<Point3<f32>>, T: Into<Point3<f32>>, U: Into<Vector3<f32>>>(
        eye: E,
        target: T,
        up: U,
    ) -> Self {
        Self {
            eye: eye.into(),
            target: target.into(),
            up: up.into(),
        }
    }

    pub fn look_at(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }
}

impl From<&CameraConfig> for Camera {
    fn from(config: &CameraConfig) -> Self {
        Camera::new(config.eye, config.target, config.up)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: aspect(width, height),
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect(width, height);
    }

    pub fn set_fovy(&mut self, fovy: Deg<f32>) {
        self.fovy = fovy.into();
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

// A minimized window reports a zero height; keep the matrix finite.
fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use cgmath::{SquareMatrix, Transform};

    use super::*;

    #[test]
    fn look_at_maps_eye_to_origin() {
        let camera = Camera::new((0.0, 0.0, 5.0), (0.0, 0.0, 0.0), Vector3::unit_y());
        let eye_in_view = camera.look_at().transform_point(camera.eye);
        assert!(eye_in_view.x.abs() < 1e-6);
        assert!(eye_in_view.y.abs() < 1e-6);
        assert!(eye_in_view.z.abs() < 1e-6);
    }

    #[test]
    fn degenerate_size_keeps_aspect_finite() {
        let mut projection = Projection::new(800, 0, Deg(65.0), 0.1, 100.0);
        assert_eq!(projection.aspect(), 800.0);
        projection.resize(400, 200);
        assert_eq!(projection.aspect(), 2.0);
        assert!(projection.calc_matrix().invert().is_some());
    }
}
