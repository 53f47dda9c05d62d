//! WGSL sources
//!
//! Every stage is compiled as `defines + common.wgsl + stage source`.

use crate::pipeline::{ShaderDefine, ShaderDefines};

pub const COMMON: &str = include_str!("common.wgsl");
pub const MOVE_LIGHTS: &str = include_str!("move_lights.wgsl");
pub const CLUSTER_BOUNDS: &str = include_str!("cluster_bounds.wgsl");
pub const LIGHT_BINNING: &str = include_str!("light_binning.wgsl");
pub const GBUFFER: &str = include_str!("gbuffer.wgsl");
pub const SHADING: &str = include_str!("shading.wgsl");

/// Base-color alpha below which G-buffer fragments are discarded
pub const ALPHA_CUTOFF: f32 = 0.5;
/// Lower bound on squared light distance in the falloff denominator
pub const FALLOFF_EPSILON: f32 = 1e-4;

/// Workgroup edge of the cluster compute stages (must match `@workgroup_size`)
pub const CLUSTER_WORKGROUP: u32 = 4;
/// Workgroup size of the move-lights stage (must match `@workgroup_size`)
pub const MOVE_LIGHTS_WORKGROUP: u32 = 64;

/// Prefix a stage with the shared declarations
pub fn compose(stage: &str) -> String {
    let mut source = String::with_capacity(COMMON.len() + stage.len() + 1);
    source.push_str(COMMON);
    source.push('\n');
    source.push_str(stage);
    source
}

/// Constants every stage is compiled with
pub fn defines() -> ShaderDefines {
    let mut defines = ShaderDefines::new();
    defines.insert("ALPHA_CUTOFF", ShaderDefine::F32(ALPHA_CUTOFF));
    defines.insert("FALLOFF_EPSILON", ShaderDefine::F32(FALLOFF_EPSILON));
    defines
}
