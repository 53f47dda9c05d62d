//! Bind group layouts and viewport-dependent GPU state
//!
//! Every pipeline is built from the layouts in [`BindGroupLayouts`], created
//! once per device. Everything whose size follows the viewport (G-buffer
//! targets, cluster buffers and the bind groups over them) lives in one
//! [`FrameResources`] value that the renderer swaps as a whole on resize, so a
//! frame never sees buffers from two different grids.

use crate::camera::{Camera, CameraUniform};
use crate::context::GpuContext;
use crate::grid::ClusterGrid;
use crate::layout::{
    bounds_buffer_size, cluster_buffer_size, pod_size, validate_binding, validate_buffer, ClusterGridUniform,
    ClusterSetHeader, LightMotionUniform, ShadingParams, CLUSTER_BOUNDS_STRIDE, CLUSTER_SET_MIN_BINDING,
    LIGHT_SET_MIN_BINDING,
};
use crate::mesh::{MaterialUniform, ModelUniform};
use crate::pipeline::validated;
use crate::{Error, Result};
use std::sync::Arc;

pub const GBUFFER_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GBUFFER_ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(min_size),
        },
        count: None,
    }
}

fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
    min_size: u64,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(min_size),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layouts shared by every pipeline
///
/// - `camera`: G-buffer group 0
/// - `model`: G-buffer group 1, per draw
/// - `material`: G-buffer group 2, per draw
/// - `move_lights`, `cluster_bounds`, `light_binning`: compute group 0
/// - `shading_scene` + `gbuffer_textures`: shading groups 0 and 1
#[derive(Clone)]
pub struct BindGroupLayouts {
    pub camera: Arc<wgpu::BindGroupLayout>,
    pub model: Arc<wgpu::BindGroupLayout>,
    pub material: Arc<wgpu::BindGroupLayout>,
    pub move_lights: Arc<wgpu::BindGroupLayout>,
    pub cluster_bounds: Arc<wgpu::BindGroupLayout>,
    pub light_binning: Arc<wgpu::BindGroupLayout>,
    pub shading_scene: Arc<wgpu::BindGroupLayout>,
    pub gbuffer_textures: Arc<wgpu::BindGroupLayout>,
}

impl BindGroupLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        use wgpu::ShaderStages as S;

        let layout = |label: &str, entries: &[wgpu::BindGroupLayoutEntry]| {
            Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            }))
        };

        let float = wgpu::TextureSampleType::Float { filterable: false };
        let camera = pod_size::<CameraUniform>();
        let grid = pod_size::<ClusterGridUniform>();

        Self {
            camera: layout("Camera Bind Group Layout", &[uniform_entry(0, S::VERTEX | S::FRAGMENT, camera)]),
            model: layout("Model Bind Group Layout", &[uniform_entry(0, S::VERTEX, pod_size::<ModelUniform>())]),
            material: layout(
                "Material Bind Group Layout",
                &[
                    uniform_entry(0, S::FRAGMENT, pod_size::<MaterialUniform>()),
                    texture_entry(1, wgpu::TextureSampleType::Float { filterable: true }),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: S::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            ),
            move_lights: layout(
                "Move Lights Bind Group Layout",
                &[
                    storage_entry(0, S::COMPUTE, false, LIGHT_SET_MIN_BINDING),
                    uniform_entry(1, S::COMPUTE, pod_size::<f32>()),
                    uniform_entry(2, S::COMPUTE, pod_size::<LightMotionUniform>()),
                ],
            ),
            cluster_bounds: layout(
                "Cluster Bounds Bind Group Layout",
                &[
                    uniform_entry(0, S::COMPUTE, camera),
                    uniform_entry(1, S::COMPUTE, grid),
                    storage_entry(2, S::COMPUTE, false, CLUSTER_BOUNDS_STRIDE),
                ],
            ),
            light_binning: layout(
                "Light Binning Bind Group Layout",
                &[
                    uniform_entry(0, S::COMPUTE, camera),
                    uniform_entry(1, S::COMPUTE, grid),
                    storage_entry(2, S::COMPUTE, true, LIGHT_SET_MIN_BINDING),
                    storage_entry(3, S::COMPUTE, true, CLUSTER_BOUNDS_STRIDE),
                    storage_entry(4, S::COMPUTE, false, CLUSTER_SET_MIN_BINDING),
                ],
            ),
            shading_scene: layout(
                "Shading Scene Bind Group Layout",
                &[
                    uniform_entry(0, S::FRAGMENT, camera),
                    uniform_entry(1, S::FRAGMENT, grid),
                    storage_entry(2, S::FRAGMENT, true, LIGHT_SET_MIN_BINDING),
                    storage_entry(3, S::FRAGMENT, true, CLUSTER_SET_MIN_BINDING),
                    uniform_entry(4, S::FRAGMENT, pod_size::<ShadingParams>()),
                ],
            ),
            gbuffer_textures: layout(
                "GBuffer Textures Bind Group Layout",
                &[
                    texture_entry(0, float),
                    texture_entry(1, float),
                    texture_entry(2, wgpu::TextureSampleType::Depth),
                ],
            ),
        }
    }
}

/// A buffer bound to one slot, with the smallest size that slot accepts
#[derive(Clone, Copy)]
pub struct BufferSlot<'a> {
    pub name: &'static str,
    pub buffer: &'a wgpu::Buffer,
    pub min_size: u64,
}

impl<'a> BufferSlot<'a> {
    pub fn new(name: &'static str, buffer: &'a wgpu::Buffer, min_size: u64) -> Self {
        Self { name, buffer, min_size }
    }
}

/// Bind whole buffers to bindings `0..slots.len()`
///
/// A buffer shorter than its slot's minimum is a [`Error::Layout`]; anything
/// else the device rejects comes back as [`Error::Resource`].
pub fn buffer_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    slots: &[BufferSlot],
) -> Result<wgpu::BindGroup> {
    for slot in slots {
        validate_buffer(slot.name, slot.buffer.size(), slot.min_size)?;
    }

    let entries: Vec<_> = slots
        .iter()
        .enumerate()
        .map(|(binding, slot)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: slot.buffer.as_entire_binding(),
        })
        .collect();

    validated(device, || {
        device.create_bind_group(&wgpu::BindGroupDescriptor { label: Some(label), layout, entries: &entries })
    })
    .map_err(|e| Error::Resource(format!("{label}: {e}")))
}

/// Normal, albedo and depth targets of the G-buffer pass
pub struct GBufferTargets {
    pub normal: wgpu::Texture,
    pub normal_view: wgpu::TextureView,
    pub albedo: wgpu::Texture,
    pub albedo_view: wgpu::TextureView,
    pub depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
}

impl GBufferTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let target = |label: &str, format: wgpu::TextureFormat| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        };

        let (normal, normal_view) = target("GBuffer Normal", GBUFFER_NORMAL_FORMAT);
        let (albedo, albedo_view) = target("GBuffer Albedo", GBUFFER_ALBEDO_FORMAT);
        let (depth, depth_view) = target("GBuffer Depth", DEPTH_FORMAT);

        Self { normal, normal_view, albedo, albedo_view, depth, depth_view }
    }
}

/// Buffers the frame-independent parts of the renderer own and every
/// generation of [`FrameResources`] binds
pub struct SharedBuffers<'a> {
    pub camera: &'a wgpu::Buffer,
    pub lights: &'a wgpu::Buffer,
    pub shading_params: &'a wgpu::Buffer,
}

/// All viewport-dependent GPU state for one grid generation
pub struct FrameResources {
    pub grid: ClusterGrid,
    pub light_radius: f32,
    pub generation: u64,
    pub gbuffer: GBufferTargets,
    pub grid_buffer: wgpu::Buffer,
    pub bounds_buffer: wgpu::Buffer,
    pub cluster_buffer: wgpu::Buffer,
    pub cluster_bounds_bind_group: wgpu::BindGroup,
    pub light_binning_bind_group: wgpu::BindGroup,
    pub shading_bind_group: wgpu::BindGroup,
    pub gbuffer_bind_group: wgpu::BindGroup,
}

impl FrameResources {
    pub fn new(
        ctx: &GpuContext,
        layouts: &BindGroupLayouts,
        grid: ClusterGrid,
        light_radius: f32,
        shared: &SharedBuffers,
        generation: u64,
    ) -> Result<Self> {
        let device = &ctx.device;
        let limits = device.limits();

        let bounds_size = bounds_buffer_size(&grid);
        let cluster_size = cluster_buffer_size(&grid);
        validate_binding("cluster bounds", bounds_size, &limits)?;
        validate_binding("cluster set", cluster_size, &limits)?;

        let grid_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Grid Uniform"),
            size: pod_size::<ClusterGridUniform>(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bounds_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Bounds Buffer"),
            size: bounds_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let cluster_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Set Buffer"),
            size: cluster_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        ctx.queue
            .write_buffer(&cluster_buffer, 0, bytemuck::bytes_of(&ClusterSetHeader::for_grid(&grid)));

        let gbuffer = GBufferTargets::new(device, grid.width, grid.height);

        let camera = BufferSlot::new("camera uniform", shared.camera, pod_size::<CameraUniform>());
        let grid_uniform = BufferSlot::new("cluster grid uniform", &grid_buffer, pod_size::<ClusterGridUniform>());
        let lights = BufferSlot::new("light set", shared.lights, LIGHT_SET_MIN_BINDING);
        let bounds = BufferSlot::new("cluster bounds", &bounds_buffer, bounds_size);
        let clusters = BufferSlot::new("cluster set", &cluster_buffer, cluster_size);
        let params = BufferSlot::new("shading params", shared.shading_params, pod_size::<ShadingParams>());

        let cluster_bounds_bind_group = buffer_bind_group(
            device,
            "Cluster Bounds Bind Group",
            &layouts.cluster_bounds,
            &[camera, grid_uniform, bounds],
        )?;
        let light_binning_bind_group = buffer_bind_group(
            device,
            "Light Binning Bind Group",
            &layouts.light_binning,
            &[camera, grid_uniform, lights, bounds, clusters],
        )?;
        let shading_bind_group = buffer_bind_group(
            device,
            "Shading Scene Bind Group",
            &layouts.shading_scene,
            &[camera, grid_uniform, lights, clusters, params],
        )?;

        let gbuffer_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GBuffer Textures Bind Group"),
            layout: &layouts.gbuffer_textures,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&gbuffer.normal_view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&gbuffer.albedo_view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&gbuffer.depth_view) },
            ],
        });

        log::debug!(
            "Frame resources #{}: {}x{} px, {}x{}x{} clusters, {} KiB cluster set",
            generation,
            grid.width,
            grid.height,
            grid.num_x,
            grid.num_y,
            grid.num_z,
            cluster_size / 1024
        );

        Ok(Self {
            grid,
            light_radius,
            generation,
            gbuffer,
            grid_buffer,
            bounds_buffer,
            cluster_buffer,
            cluster_bounds_bind_group,
            light_binning_bind_group,
            shading_bind_group,
            gbuffer_bind_group,
        })
    }

    /// Upload the grid parameters for this frame's camera
    pub fn update(&self, queue: &wgpu::Queue, camera: &Camera) {
        let range = self.grid.depth_range(camera);
        let uniform = ClusterGridUniform::new(&self.grid, range, self.light_radius);
        queue.write_buffer(&self.grid_buffer, 0, bytemuck::bytes_of(&uniform));
    }
}
