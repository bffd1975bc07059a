use bytemuck::{Pod, Zeroable};
use cgmath::{perspective, Deg, InnerSpace, Matrix4, Point3, Vector3};

/// Free-flying camera driven by yaw/pitch angles
#[derive(Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Deg<f32>,
    pub pitch: Deg<f32>,
    aspect: f32,
    fovy: Deg<f32>,
    znear: f32,
    zfar: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 3.0),
            yaw: Deg(-90.0),
            pitch: Deg(0.0),
            aspect: width as f32 / height as f32,
            fovy: Deg(70.0),
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Deg<f32> {
        self.fovy
    }

    pub fn znear(&self) -> f32 {
        self.znear
    }

    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    pub fn build_view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            self.position,
            self.position + self.forward(),
            Vector3::unit_y(),
        )
    }

    pub fn build_projection_matrix(&self) -> Matrix4<f32> {
        perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = cgmath::Rad::from(self.yaw).0.sin_cos();
        let (sin_pitch, cos_pitch) = cgmath::Rad::from(self.pitch).0.sin_cos();

        Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw)
    }

    pub fn right(&self) -> Vector3<f32> {
        self.forward().cross(Vector3::unit_y()).normalize()
    }

    pub fn move_forward(&mut self, amount: f32) {
        self.position += self.forward() * amount;
    }

    pub fn move_right(&mut self, amount: f32) {
        self.position += self.right() * amount;
    }

    pub fn move_up(&mut self, amount: f32) {
        self.position.y += amount;
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += Deg(delta_yaw);
        self.pitch += Deg(delta_pitch);

        // Clamp pitch to prevent camera flipping
        if self.pitch < Deg(-89.0) {
            self.pitch = Deg(-89.0);
        } else if self.pitch > Deg(89.0) {
            self.pitch = Deg(89.0);
        }
    }
}

/// Camera data in the layout the draw shader expects
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_proj = (camera.build_projection_matrix() * camera.build_view_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_is_unit_length() {
        let mut camera = Camera::new(800, 600);
        camera.rotate(33.0, 12.0);
        let len = camera.forward().magnitude();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new(800, 600);
        camera.rotate(0.0, 500.0);
        assert!(camera.pitch <= Deg(89.0));
        camera.rotate(0.0, -1000.0);
        assert!(camera.pitch >= Deg(-89.0));
    }
}
