//! Render pass trait and execution context

use super::PassResourceBuilder;
use crate::mesh::DrawCall;
use crate::resources::FrameResources;
use crate::Result;

/// Render pass trait - implemented by every frame stage
pub trait RenderPass: Send + Sync {
    /// Unique name for this pass
    fn name(&self) -> &str;

    /// Declare resource dependencies
    ///
    /// Called once when the pass is added. The declarations become the
    /// barrier edges that order the graph.
    fn declare_resources(&self, _builder: &mut PassResourceBuilder) {
        // Default: no resource dependencies
    }

    /// Record the pass into the frame's encoder
    fn execute(&mut self, ctx: &mut PassContext) -> Result<()>;
}

/// Context for pass execution
pub struct PassContext<'a> {
    /// Command encoder for recording GPU commands
    pub encoder: &'a mut wgpu::CommandEncoder,

    /// Viewport-dependent state of the current generation
    pub frame: &'a FrameResources,

    /// Presentation target the shading pass writes
    pub target: &'a wgpu::TextureView,

    /// Camera uniform bind group (group 0 of the G-buffer pipeline)
    pub camera_bind_group: &'a wgpu::BindGroup,

    /// Geometry submitted for this frame, in submission order
    pub draws: &'a [DrawCall],
}

impl<'a> PassContext<'a> {
    /// Begin a render pass
    pub fn begin_render_pass(
        &mut self,
        label: &str,
        color_attachments: &[Option<wgpu::RenderPassColorAttachment>],
        depth_stencil_attachment: Option<wgpu::RenderPassDepthStencilAttachment>,
    ) -> wgpu::RenderPass {
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Begin a compute pass
    pub fn begin_compute_pass(&mut self, label: &str) -> wgpu::ComputePass {
        self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        })
    }
}
