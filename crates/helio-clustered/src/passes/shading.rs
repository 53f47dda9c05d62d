//! Shading pass - full-screen resolve of the G-buffer against clustered lights

use crate::context::GpuContext;
use crate::graph::{PassContext, PassResourceBuilder, RenderPass, ResourceHandle};
use crate::pipeline::{create_pipeline_layout, create_shader_module, validated};
use crate::resources::BindGroupLayouts;
use crate::shaders;
use crate::{Error, Result};

/// Draws one screen-covering quad; every fragment looks up its cluster and
/// sums only the lights binned there.
pub struct ShadingPass {
    pipeline: wgpu::RenderPipeline,
}

impl ShadingPass {
    pub fn new(
        ctx: &GpuContext,
        layouts: &BindGroupLayouts,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let device = &ctx.device;
        let module = create_shader_module(
            device,
            "shading",
            &shaders::compose(shaders::SHADING),
            &shaders::defines(),
        )?;
        let layout = create_pipeline_layout(
            device,
            "shading",
            &[&layouts.shading_scene, &layouts.gbuffer_textures],
        );

        let pipeline = validated(device, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("shading"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[Some(surface_format.into())],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
        .map_err(|e| Error::Pipeline(format!("shading: {e}")))?;

        Ok(Self { pipeline })
    }
}

impl RenderPass for ShadingPass {
    fn name(&self) -> &str {
        "shading"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(ResourceHandle::LIGHT_SET)
            .read(ResourceHandle::CLUSTER_SET)
            .read(ResourceHandle::GBUFFER_NORMAL)
            .read(ResourceHandle::GBUFFER_ALBEDO)
            .read(ResourceHandle::GBUFFER_DEPTH)
            .write(ResourceHandle::SURFACE);
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let frame = ctx.frame;
        let target = ctx.target;

        let mut pass = ctx.begin_render_pass(
            "Shading Pass",
            &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            None,
        );

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &frame.shading_bind_group, &[]);
        pass.set_bind_group(1, &frame.gbuffer_bind_group, &[]);
        pass.draw(0..6, 0..1);
        Ok(())
    }
}
