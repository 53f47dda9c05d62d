//! Byte layouts shared between the host and the WGSL shaders
//!
//! Every struct here has a twin in `shaders/common.wgsl`; the size tests at the
//! bottom pin both sides of the contract.

use crate::grid::{Aabb, ClusterGrid, DepthRange};
use crate::{Error, Result};
use bytemuck::{Pod, Zeroable};

/// Light buffer header: active count padded to 16 bytes
pub const LIGHT_HEADER_SIZE: u64 = 16;
/// Size of one light record
pub const LIGHT_STRIDE: u64 = 32;
/// Cluster buffer header: grid dimensions, capacity, overflow counter, reserved
pub const CLUSTER_HEADER_SIZE: u64 = 32;
/// Byte offset of the overflow counter inside the cluster header
pub const CLUSTER_OVERFLOW_OFFSET: u64 = 16;
/// Size of one cluster AABB record
pub const CLUSTER_BOUNDS_STRIDE: u64 = 32;
/// Smallest light buffer a shader can bind: the header and one record
pub const LIGHT_SET_MIN_BINDING: u64 = LIGHT_HEADER_SIZE + LIGHT_STRIDE;
/// Smallest cluster buffer a shader can bind: the header and one word
pub const CLUSTER_SET_MIN_BINDING: u64 = CLUSTER_HEADER_SIZE + 4;

/// Byte size of a host-side uniform or record
pub fn pod_size<T: Pod>() -> u64 {
    std::mem::size_of::<T>() as u64
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 3],
    pub _pad0: f32,
    pub color: [f32; 3],
    pub _pad1: f32,
}

impl GpuLight {
    pub fn new(position: glam::Vec3, color: glam::Vec3) -> Self {
        Self {
            position: position.to_array(),
            _pad0: 0.0,
            color: color.to_array(),
            _pad1: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LightSetHeader {
    pub num_lights: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ClusterSetHeader {
    pub num_x: u32,
    pub num_y: u32,
    pub num_z: u32,
    pub max_lights_per_cluster: u32,
    /// Clusters that hit capacity last frame
    pub overflow_count: u32,
    pub _reserved: [u32; 3],
}

impl ClusterSetHeader {
    pub fn for_grid(grid: &ClusterGrid) -> Self {
        Self {
            num_x: grid.num_x,
            num_y: grid.num_y,
            num_z: grid.num_z,
            max_lights_per_cluster: grid.max_lights_per_cluster,
            overflow_count: 0,
            _reserved: [0; 3],
        }
    }

    /// `None` when the dimensions do not fit in `usize`
    pub fn cluster_count(&self) -> Option<usize> {
        (self.num_x as usize)
            .checked_mul(self.num_y as usize)?
            .checked_mul(self.num_z as usize)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuClusterBounds {
    pub min: [f32; 4],
    pub max: [f32; 4],
}

impl From<GpuClusterBounds> for Aabb {
    fn from(b: GpuClusterBounds) -> Self {
        Aabb::new(
            glam::Vec4::from(b.min).truncate(),
            glam::Vec4::from(b.max).truncate(),
        )
    }
}

/// Grid parameters read by the bounds, binning and shading stages
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClusterGridUniform {
    pub num_clusters: [u32; 3],
    pub max_lights_per_cluster: u32,
    pub tile_size: [f32; 2],
    pub slice_near: f32,
    pub slice_far: f32,
    pub logarithmic: u32,
    pub light_radius: f32,
    /// Far edge of the last slice
    pub frustum_far: f32,
    pub _pad: u32,
}

impl ClusterGridUniform {
    pub fn new(grid: &ClusterGrid, range: DepthRange, light_radius: f32) -> Self {
        Self {
            num_clusters: grid.dimensions().to_array(),
            max_lights_per_cluster: grid.max_lights_per_cluster,
            tile_size: [grid.tile_size as f32; 2],
            slice_near: range.near,
            slice_far: range.far,
            logarithmic: grid.slicing.as_u32(),
            light_radius,
            frustum_far: range.frustum_far,
            _pad: 0,
        }
    }
}

/// Parameters of the light motion function
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightMotionUniform {
    pub position_min: [f32; 3],
    pub speed: f32,
    pub position_max: [f32; 3],
    pub orbit_radius: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadingParams {
    pub background: [f32; 4],
    pub ambient: [f32; 4],
}

impl ShadingParams {
    pub fn new(background: [f32; 3], ambient: [f32; 3]) -> Self {
        Self {
            background: [background[0], background[1], background[2], 1.0],
            ambient: [ambient[0], ambient[1], ambient[2], 0.0],
        }
    }
}

pub fn light_buffer_size(max_lights: u32) -> u64 {
    LIGHT_HEADER_SIZE + LIGHT_STRIDE * max_lights as u64
}

/// Words per cluster record: the count followed by the index slots
pub fn cluster_stride_words(max_lights_per_cluster: u32) -> u64 {
    1 + max_lights_per_cluster as u64
}

pub fn cluster_buffer_size(grid: &ClusterGrid) -> u64 {
    CLUSTER_HEADER_SIZE
        + grid.cluster_count() as u64 * cluster_stride_words(grid.max_lights_per_cluster) * 4
}

pub fn bounds_buffer_size(grid: &ClusterGrid) -> u64 {
    grid.cluster_count() as u64 * CLUSTER_BOUNDS_STRIDE
}

/// Reject a buffer smaller than the layout its consumers index into
pub fn validate_buffer(buffer: &'static str, actual: u64, required: u64) -> Result<()> {
    if actual < required {
        return Err(Error::Layout { buffer, required, actual });
    }
    Ok(())
}

/// Reject a binding larger than the device allows
pub fn validate_binding(buffer: &'static str, size: u64, limits: &wgpu::Limits) -> Result<()> {
    let max = limits.max_storage_buffer_binding_size as u64;
    if size > max {
        return Err(Error::Resource(format!(
            "{buffer} needs {size} bytes but the device allows {max} per storage binding; \
             use a larger tile size or fewer lights per cluster"
        )));
    }
    Ok(())
}

/// Decode the cluster header from the start of a cluster buffer readback
pub fn read_cluster_header(bytes: &[u8]) -> Result<ClusterSetHeader> {
    let header = bytes
        .get(..CLUSTER_HEADER_SIZE as usize)
        .ok_or(Error::Layout {
            buffer: "cluster set",
            required: CLUSTER_HEADER_SIZE,
            actual: bytes.len() as u64,
        })?;
    Ok(bytemuck::pod_read_unaligned(header))
}
