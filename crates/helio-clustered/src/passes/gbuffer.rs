//! G-buffer pass - rasterizes opaque geometry into normal, albedo and depth

use crate::context::GpuContext;
use crate::graph::{PassContext, PassResourceBuilder, RenderPass, ResourceHandle};
use crate::mesh::PackedVertex;
use crate::pipeline::{create_pipeline_layout, create_shader_module, validated};
use crate::resources::{BindGroupLayouts, DEPTH_FORMAT, GBUFFER_ALBEDO_FORMAT, GBUFFER_NORMAL_FORMAT};
use crate::shaders;
use crate::{Error, Result};

/// Renders every draw submitted for the frame, in submission order
pub struct GBufferPass {
    pipeline: wgpu::RenderPipeline,
}

impl GBufferPass {
    pub fn new(ctx: &GpuContext, layouts: &BindGroupLayouts) -> Result<Self> {
        let device = &ctx.device;
        let module = create_shader_module(
            device,
            "gbuffer",
            &shaders::compose(shaders::GBUFFER),
            &shaders::defines(),
        )?;
        let layout = create_pipeline_layout(
            device,
            "gbuffer",
            &[&layouts.camera, &layouts.model, &layouts.material],
        );

        let pipeline = validated(device, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("gbuffer"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &[PackedVertex::layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[
                        Some(GBUFFER_NORMAL_FORMAT.into()),
                        Some(GBUFFER_ALBEDO_FORMAT.into()),
                    ],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
        .map_err(|e| Error::Pipeline(format!("gbuffer: {e}")))?;

        Ok(Self { pipeline })
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &str {
        "gbuffer"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .write(ResourceHandle::GBUFFER_NORMAL)
            .write(ResourceHandle::GBUFFER_ALBEDO)
            .write(ResourceHandle::GBUFFER_DEPTH);
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let frame = ctx.frame;
        let gbuffer = &frame.gbuffer;
        let camera_bg = ctx.camera_bind_group;
        let draws = ctx.draws;

        let mut pass = ctx.begin_render_pass(
            "GBuffer Pass",
            &[clear(&gbuffer.normal_view), clear(&gbuffer.albedo_view)],
            Some(wgpu::RenderPassDepthStencilAttachment {
                view: &gbuffer.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
        );

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera_bg, &[]);

        for dc in draws {
            pass.set_bind_group(1, &dc.model_bind_group, &[]);
            pass.set_bind_group(2, &dc.material_bind_group, &[]);
            pass.set_vertex_buffer(0, dc.vertex_buffer.slice(..));
            pass.set_index_buffer(dc.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..dc.index_count, 0, 0..1);
        }

        Ok(())
    }
}

fn clear(view: &wgpu::TextureView) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            store: wgpu::StoreOp::Store,
        },
    })
}
