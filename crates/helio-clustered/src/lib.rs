//! Helio Clustered - clustered deferred renderer for many dynamic point lights
//!
//! The view frustum is cut into a 3D grid of clusters (screen tiles × depth
//! slices). Every frame the renderer:
//!
//! - animates the light pool in its own submission
//! - builds a view-space AABB for every cluster (compute)
//! - bins active lights into the clusters their bounding spheres touch (compute)
//! - rasterizes opaque geometry into a normal/albedo/depth G-buffer
//! - shades each pixel from only the lights bound to its cluster
//!
//! The four frame stages are nodes of an explicit [`graph::RenderGraph`];
//! device state is threaded through a [`GpuContext`].

pub mod binning;
pub mod config;
pub mod diagnostics;
pub mod graph;
pub mod grid;
pub mod layout;
pub mod lights;
pub mod mesh;
pub mod passes;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod shaders;

mod camera;
mod context;
mod renderer;

pub use binning::{bin_lights, ClusterLightLists};
pub use camera::{Camera, CameraUniform};
pub use config::{ClusterConfig, DepthSlicing, LightConfig, RendererConfig};
pub use context::GpuContext;
pub use diagnostics::ClusterSnapshot;
pub use grid::{Aabb, ClusterCoord, ClusterGrid, DepthRange};
pub use lights::{LightPool, LightSet};
pub use mesh::{DrawCall, GpuMesh, Material, ModelTransform, PackedVertex};
pub use renderer::Renderer;
pub use scene::Scene;

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during rendering
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Shader error: {0}")]
    Shader(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Resource error: {0}")]
    Resource(String),

    /// A GPU buffer is smaller than the layout the shaders expect
    #[error("Layout mismatch for {buffer}: {actual} bytes, needs at least {required}")]
    Layout {
        buffer: &'static str,
        required: u64,
        actual: u64,
    },

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("WGPU error: {0}")]
    Wgpu(String),
}

impl From<wgpu::Error> for Error {
    fn from(err: wgpu::Error) -> Self {
        Error::Wgpu(err.to_string())
    }
}
