//! Camera utilities

use glam::{Mat4, Vec3};

/// Camera parameters supplied by the camera collaborator
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub proj: Mat4,
    /// Distance to the near plane (positive)
    pub near: f32,
    /// Distance to the far plane (positive)
    pub far: f32,
}

/// Packed camera block shared by every stage (must match `Camera` in common.wgsl)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub screen_size: [f32; 2],
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(view: Mat4, proj: Mat4, near: f32, far: f32) -> Self {
        Self { view, proj, near, far }
    }

    /// Create a perspective camera
    ///
    /// Uses wgpu's `[0, 1]` clip depth with a standard (not reversed) depth range.
    pub fn perspective(
        position: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let view = Mat4::look_at_rh(position, target, up);
        let proj = Mat4::perspective_rh(fov_y, aspect, near, far);
        Self { view, proj, near, far }
    }

    /// Pack the camera for the GPU at the given viewport size
    pub fn uniform(&self, width: u32, height: u32) -> CameraUniform {
        CameraUniform {
            view: self.view,
            proj: self.proj,
            inv_proj: self.proj.inverse(),
            view_proj: self.proj * self.view,
            screen_size: [width as f32, height as f32],
            near: self.near,
            far: self.far,
        }
    }
}
