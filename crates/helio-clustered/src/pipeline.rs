//! Shader specialization and pipeline construction
//!
//! Pipelines are created once, at renderer construction. Any validation error
//! the device raises while compiling is caught in an error scope and returned
//! as an [`Error`], so a bad shader or layout fails before the first frame.

use crate::{Error, Result};
use std::collections::BTreeMap;

/// Value injected into WGSL as a module-scope constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderDefine {
    F32(f32),
}

/// Defines keyed by constant name (sorted, so the emitted source is stable)
pub type ShaderDefines = BTreeMap<&'static str, ShaderDefine>;

/// Prepend one `const` declaration per define to the shader source
pub fn apply_defines(source: &str, defines: &ShaderDefines) -> String {
    let mut result = String::new();

    for (name, value) in defines {
        let line = match value {
            ShaderDefine::F32(f) => format!("const {name}: f32 = {f:?};\n"),
        };
        result.push_str(&line);
    }

    result.push_str(source);
    result
}

/// Run `create` inside a validation error scope
pub fn validated<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> std::result::Result<T, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Compile WGSL after injecting defines
pub fn create_shader_module(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    defines: &ShaderDefines,
) -> Result<wgpu::ShaderModule> {
    let processed = apply_defines(source, defines);
    log::debug!("Compiling shader '{}' ({} defines)", label, defines.len());

    validated(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(processed.into()),
        })
    })
    .map_err(|e| Error::Shader(format!("{label}: {e}")))
}

pub fn create_pipeline_layout(
    device: &wgpu::Device,
    label: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label}_layout")),
        bind_group_layouts,
        push_constant_ranges: &[],
    })
}

/// Compute pipeline with entry point `main`
pub fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> Result<wgpu::ComputePipeline> {
    let layout = create_pipeline_layout(device, label, bind_group_layouts);

    log::debug!("Creating compute pipeline '{}'", label);
    validated(device, || {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        })
    })
    .map_err(|e| Error::Pipeline(format!("{label}: {e}")))
}

/// Number of workgroups needed to cover `count` items
pub fn workgroup_count(count: u32, workgroup_size: u32) -> u32 {
    count.div_ceil(workgroup_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_become_sorted_consts() {
        let mut defines = ShaderDefines::new();
        defines.insert("FALLOFF_EPSILON", ShaderDefine::F32(0.01));
        defines.insert("ALPHA_CUTOFF", ShaderDefine::F32(0.5));

        let source = apply_defines("fn main() {}\n", &defines);
        assert_eq!(
            source,
            "const ALPHA_CUTOFF: f32 = 0.5;\n\
             const FALLOFF_EPSILON: f32 = 0.01;\n\
             fn main() {}\n"
        );
    }

    #[test]
    fn whole_floats_keep_a_decimal_point() {
        let mut defines = ShaderDefines::new();
        defines.insert("ONE", ShaderDefine::F32(1.0));
        assert!(apply_defines("", &defines).contains("= 1.0;"));
    }

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(0, 64), 0);
        assert_eq!(workgroup_count(1, 64), 1);
        assert_eq!(workgroup_count(10_000, 64), 157);
        assert_eq!(workgroup_count(20, 4), 5);
    }
}
