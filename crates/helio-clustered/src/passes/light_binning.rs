//! Light binning pass - assigns active lights to the clusters they touch

use crate::context::GpuContext;
use crate::graph::{PassContext, PassResourceBuilder, RenderPass, ResourceHandle};
use crate::layout::CLUSTER_OVERFLOW_OFFSET;
use crate::pipeline::{create_compute_pipeline, create_shader_module, workgroup_count};
use crate::resources::BindGroupLayouts;
use crate::shaders;
use crate::Result;

/// One invocation per cluster; each scans the light set in index order and
/// writes a count plus up to `max_lights_per_cluster` indices.
pub struct LightBinningPass {
    pipeline: wgpu::ComputePipeline,
}

impl LightBinningPass {
    pub fn new(ctx: &GpuContext, layouts: &BindGroupLayouts) -> Result<Self> {
        let module = create_shader_module(
            &ctx.device,
            "light_binning",
            &shaders::compose(shaders::LIGHT_BINNING),
            &shaders::defines(),
        )?;
        let pipeline = create_compute_pipeline(
            &ctx.device,
            "light_binning",
            &module,
            &[&layouts.light_binning],
        )?;
        Ok(Self { pipeline })
    }
}

impl RenderPass for LightBinningPass {
    fn name(&self) -> &str {
        "light_binning"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(ResourceHandle::LIGHT_SET)
            .read(ResourceHandle::CLUSTER_BOUNDS)
            .write(ResourceHandle::CLUSTER_SET);
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let [nx, ny, nz] = ctx.frame.grid.dimensions().to_array();
        let frame = ctx.frame;

        // Overflow counter is per frame
        ctx.encoder
            .clear_buffer(&frame.cluster_buffer, CLUSTER_OVERFLOW_OFFSET, Some(4));

        let mut pass = ctx.begin_compute_pass("Light Binning Pass");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &frame.light_binning_bind_group, &[]);
        pass.dispatch_workgroups(
            workgroup_count(nx, shaders::CLUSTER_WORKGROUP),
            workgroup_count(ny, shaders::CLUSTER_WORKGROUP),
            workgroup_count(nz, shaders::CLUSTER_WORKGROUP),
        );
        Ok(())
    }
}
