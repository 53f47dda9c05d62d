//! Cluster bounds pass - one view-space AABB per cluster

use crate::context::GpuContext;
use crate::graph::{PassContext, PassResourceBuilder, RenderPass, ResourceHandle};
use crate::pipeline::{create_compute_pipeline, create_shader_module, workgroup_count};
use crate::resources::BindGroupLayouts;
use crate::shaders;
use crate::Result;

/// Computes the view-space AABB of every cluster into the bounds buffer
pub struct ClusterBoundsPass {
    pipeline: wgpu::ComputePipeline,
}

impl ClusterBoundsPass {
    pub fn new(ctx: &GpuContext, layouts: &BindGroupLayouts) -> Result<Self> {
        let module = create_shader_module(
            &ctx.device,
            "cluster_bounds",
            &shaders::compose(shaders::CLUSTER_BOUNDS),
            &shaders::defines(),
        )?;
        let pipeline = create_compute_pipeline(
            &ctx.device,
            "cluster_bounds",
            &module,
            &[&layouts.cluster_bounds],
        )?;
        Ok(Self { pipeline })
    }
}

impl RenderPass for ClusterBoundsPass {
    fn name(&self) -> &str {
        "cluster_bounds"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder.write(ResourceHandle::CLUSTER_BOUNDS);
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let [nx, ny, nz] = ctx.frame.grid.dimensions().to_array();
        let frame = ctx.frame;

        let mut pass = ctx.begin_compute_pass("Cluster Bounds Pass");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &frame.cluster_bounds_bind_group, &[]);
        pass.dispatch_workgroups(
            workgroup_count(nx, shaders::CLUSTER_WORKGROUP),
            workgroup_count(ny, shaders::CLUSTER_WORKGROUP),
            workgroup_count(nz, shaders::CLUSTER_WORKGROUP),
        );
        Ok(())
    }
}
