//! GPU mesh types, materials and draw records for the G-buffer pass

use crate::context::GpuContext;
use crate::resources::BindGroupLayouts;
use glam::Mat4;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Vertex format matching `gbuffer.wgsl` exactly (32 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedVertex {
    pub position: [f32; 3],
    pub bitangent_sign: f32,
    pub tex_coords: [f32; 2],
    pub normal: u32,  // Packed SNORM8x4
    pub tangent: u32, // Packed SNORM8x4
}

impl PackedVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32,
        2 => Float32x2,
        3 => Uint32,
        4 => Uint32,
    ];

    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            bitangent_sign: 1.0,
            tex_coords,
            normal: pack_snorm8x4(normal[0], normal[1], normal[2], 0.0),
            tangent: pack_snorm8x4(1.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

fn pack_snorm8x4(x: f32, y: f32, z: f32, w: f32) -> u32 {
    let pack = |v: f32| (v.clamp(-1.0, 1.0) * 127.0).round() as i8 as u8 as u32;
    pack(x) | (pack(y) << 8) | (pack(z) << 16) | (pack(w) << 24)
}

/// GPU-resident mesh (owns wgpu vertex + index buffers)
#[derive(Clone)]
pub struct GpuMesh {
    pub vertex_buffer: Arc<wgpu::Buffer>,
    pub index_buffer: Arc<wgpu::Buffer>,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, vertices: &[PackedVertex], indices: &[u32]) -> Self {
        let vertex_buffer = Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        let index_buffer = Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        }));
        Self { vertex_buffer, index_buffer, index_count: indices.len() as u32 }
    }

    /// Unit cube centered at `center` with half-extent `half_size`
    pub fn cube(device: &wgpu::Device, center: [f32; 3], half_size: f32) -> Self {
        let (vertices, indices) = cube_geometry(center, half_size);
        Self::new(device, &vertices, &indices)
    }

    /// Flat XZ plane facing +Y centered at `center` with half-extent `half_extent`
    pub fn plane(device: &wgpu::Device, center: [f32; 3], half_extent: f32) -> Self {
        let (vertices, indices) = plane_geometry(center, half_extent);
        Self::new(device, &vertices, &indices)
    }
}

pub(crate) fn cube_geometry(center: [f32; 3], half_size: f32) -> (Vec<PackedVertex>, Vec<u32>) {
    let [cx, cy, cz] = center;
    let h = half_size;

    // 6 faces: (normal, [4 corners in CCW winding viewed from outside])
    let faces: &[([f32; 3], [[f32; 3]; 4])] = &[
        ([0.0, 0.0, 1.0], [[cx-h,cy-h,cz+h],[cx+h,cy-h,cz+h],[cx+h,cy+h,cz+h],[cx-h,cy+h,cz+h]]),
        ([0.0, 0.0,-1.0], [[cx+h,cy-h,cz-h],[cx-h,cy-h,cz-h],[cx-h,cy+h,cz-h],[cx+h,cy+h,cz-h]]),
        ([1.0, 0.0, 0.0], [[cx+h,cy-h,cz+h],[cx+h,cy-h,cz-h],[cx+h,cy+h,cz-h],[cx+h,cy+h,cz+h]]),
        ([-1.0,0.0, 0.0], [[cx-h,cy-h,cz-h],[cx-h,cy-h,cz+h],[cx-h,cy+h,cz+h],[cx-h,cy+h,cz-h]]),
        ([0.0, 1.0, 0.0], [[cx-h,cy+h,cz+h],[cx+h,cy+h,cz+h],[cx+h,cy+h,cz-h],[cx-h,cy+h,cz-h]]),
        ([0.0,-1.0, 0.0], [[cx-h,cy-h,cz-h],[cx+h,cy-h,cz-h],[cx+h,cy-h,cz+h],[cx-h,cy-h,cz+h]]),
    ];

    let uvs: [[f32; 2]; 4] = [[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,1.0]];
    let mut vertices = Vec::with_capacity(24);
    let mut indices  = Vec::with_capacity(36);

    for (face_idx, (normal, corners)) in faces.iter().enumerate() {
        let base = (face_idx * 4) as u32;
        for (i, &pos) in corners.iter().enumerate() {
            vertices.push(PackedVertex::new(pos, *normal, uvs[i]));
        }
        indices.extend_from_slice(&[base, base+1, base+2, base, base+2, base+3]);
    }

    (vertices, indices)
}

pub(crate) fn plane_geometry(center: [f32; 3], half_extent: f32) -> (Vec<PackedVertex>, Vec<u32>) {
    let [cx, cy, cz] = center;
    let h = half_extent;
    let n = [0.0f32, 1.0, 0.0];
    let vertices = vec![
        PackedVertex::new([cx-h,cy,cz+h], n, [0.0,0.0]),
        PackedVertex::new([cx+h,cy,cz+h], n, [1.0,0.0]),
        PackedVertex::new([cx+h,cy,cz-h], n, [1.0,1.0]),
        PackedVertex::new([cx-h,cy,cz-h], n, [0.0,1.0]),
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// Per-draw model uniform (must match `Model` in gbuffer.wgsl)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

/// Object-to-world transform supplied with each draw
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModelTransform(pub Mat4);

impl ModelTransform {
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    pub fn from_translation(translation: glam::Vec3) -> Self {
        Self(Mat4::from_translation(translation))
    }

    pub fn uniform(&self) -> ModelUniform {
        ModelUniform {
            model: self.0,
            normal_matrix: self.0.inverse().transpose(),
        }
    }
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Material uniform (must match `Material` in gbuffer.wgsl)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
}

/// Base color factor plus base color texture, bound as G-buffer group 2
#[derive(Clone)]
pub struct Material {
    pub bind_group: Arc<wgpu::BindGroup>,
}

impl Material {
    /// Untextured material (samples a 1×1 white texture)
    pub fn solid(ctx: &GpuContext, layouts: &BindGroupLayouts, base_color: [f32; 4]) -> Self {
        let white = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Default White Texture"),
            size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &white,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255u8, 255, 255, 255],
            wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(4), rows_per_image: Some(1) },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );
        let view = white.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Default Sampler"),
            ..Default::default()
        });
        Self::textured(ctx, layouts, base_color, &view, &sampler)
    }

    /// Material sampling a caller-owned base color texture
    pub fn textured(
        ctx: &GpuContext,
        layouts: &BindGroupLayouts,
        base_color: [f32; 4],
        texture: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let uniform = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Uniform"),
            contents: bytemuck::bytes_of(&MaterialUniform { base_color }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &layouts.material,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(texture) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        });

        Self { bind_group: Arc::new(bind_group) }
    }
}

/// One opaque draw: geometry, model uniform and material
#[derive(Clone)]
pub struct DrawCall {
    pub vertex_buffer: Arc<wgpu::Buffer>,
    pub index_buffer: Arc<wgpu::Buffer>,
    pub index_count: u32,
    pub model_bind_group: Arc<wgpu::BindGroup>,
    pub material_bind_group: Arc<wgpu::BindGroup>,
}

impl DrawCall {
    pub fn new(
        ctx: &GpuContext,
        layouts: &BindGroupLayouts,
        mesh: &GpuMesh,
        transform: ModelTransform,
        material: &Material,
    ) -> Self {
        let model_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model Uniform"),
            contents: bytemuck::bytes_of(&transform.uniform()),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let model_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout: &layouts.model,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: model_buffer.as_entire_binding() }],
        });

        Self {
            vertex_buffer: mesh.vertex_buffer.clone(),
            index_buffer: mesh.index_buffer.clone(),
            index_count: mesh.index_count,
            model_bind_group: Arc::new(model_bind_group),
            material_bind_group: material.bind_group.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_32_bytes() {
        assert_eq!(std::mem::size_of::<PackedVertex>(), 32);
        assert_eq!(PackedVertex::layout().array_stride, 32);
        let offsets: Vec<u64> = PackedVertex::ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16, 24, 28]);
    }

    #[test]
    fn normals_pack_as_snorm8() {
        let v = PackedVertex::new([0.0; 3], [0.0, 1.0, -1.0], [0.0; 2]);
        assert_eq!(v.normal & 0xff, 0);
        assert_eq!((v.normal >> 8) & 0xff, 127);
        assert_eq!((v.normal >> 16) & 0xff, 0x81); // -127
    }

    #[test]
    fn cube_faces_wind_outward() {
        let (vertices, indices) = cube_geometry([0.0; 3], 1.0);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for tri in indices.chunks_exact(3) {
            let p = |i: u32| glam::Vec3::from(vertices[i as usize].position);
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            let face_normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn plane_faces_up() {
        let (vertices, indices) = plane_geometry([0.0; 3], 5.0);
        let p = |i: u32| glam::Vec3::from(vertices[i as usize].position);
        let n = (p(indices[1]) - p(indices[0])).cross(p(indices[2]) - p(indices[0]));
        assert!(n.y > 0.0);
    }

    #[test]
    fn normal_matrix_handles_non_uniform_scale() {
        let transform = ModelTransform(Mat4::from_scale(glam::Vec3::new(2.0, 1.0, 1.0)));
        let u = transform.uniform();
        let n = u.normal_matrix.transform_vector3(glam::Vec3::new(1.0, 1.0, 0.0)).normalize();
        assert!((n - glam::Vec3::new(0.5, 1.0, 0.0).normalize()).length() < 1e-5);
    }
}
