//! The four frame stages
//!
//! Each pass owns its pipeline, built once from the shared
//! [`BindGroupLayouts`](crate::resources::BindGroupLayouts), and declares the
//! resources it touches so the graph can order them.

pub mod cluster_bounds;
pub mod gbuffer;
pub mod light_binning;
pub mod shading;

pub use cluster_bounds::ClusterBoundsPass;
pub use gbuffer::GBufferPass;
pub use light_binning::LightBinningPass;
pub use shading::ShadingPass;
