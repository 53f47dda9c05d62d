//! Shared helpers for the GPU integration tests

#![allow(dead_code)]

use helio_clustered::{Camera, GpuContext};
use glam::{Mat4, Vec3};

pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Headless context, or `None` on machines without an adapter
pub fn context() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    GpuContext::headless()
}

/// Offscreen color target the shading pass can write and the test can copy
pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl Target {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, width, height }
    }

    /// Copy the target back as RGBA8 pixels, row-major from the top
    pub fn read_pixels(&self, ctx: &GpuContext) -> Vec<[u8; 4]> {
        let unpadded = self.width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Test Target Readback"),
            size: (padded * self.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Target Copy"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let bytes = ctx.read_buffer(&buffer, buffer.size()).expect("target readback");
        bytes
            .chunks_exact(padded as usize)
            .flat_map(|row| {
                row[..unpadded as usize]
                    .chunks_exact(4)
                    .map(|p| [p[0], p[1], p[2], p[3]])
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Camera at the origin looking down -Z
pub fn forward_camera(width: u32, height: u32) -> Camera {
    Camera::new(
        Mat4::IDENTITY,
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, width as f32 / height as f32, 0.1, 100.0),
        0.1,
        100.0,
    )
}

/// Camera five units above the origin looking straight down
pub fn top_down_camera(width: u32, height: u32) -> Camera {
    Camera::perspective(
        Vec3::new(0.0, 5.0, 0.0),
        Vec3::ZERO,
        Vec3::NEG_Z,
        std::f32::consts::FRAC_PI_3,
        width as f32 / height as f32,
        0.1,
        100.0,
    )
}
