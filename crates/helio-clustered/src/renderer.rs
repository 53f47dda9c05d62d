//! Main renderer implementation

use crate::camera::{Camera, CameraUniform};
use crate::config::RendererConfig;
use crate::context::GpuContext;
use crate::diagnostics::ClusterSnapshot;
use crate::graph::{Barrier, GraphContext, RenderGraph};
use crate::grid::{Aabb, ClusterGrid};
use crate::layout::{bounds_buffer_size, pod_size, GpuClusterBounds, ShadingParams, CLUSTER_BOUNDS_STRIDE};
use crate::lights::LightSet;
use crate::mesh::{DrawCall, GpuMesh, Material, ModelTransform};
use crate::passes::{ClusterBoundsPass, GBufferPass, LightBinningPass, ShadingPass};
use crate::resources::{buffer_bind_group, BindGroupLayouts, BufferSlot, FrameResources, SharedBuffers};
use crate::scene::Scene;
use crate::Result;
use wgpu::util::DeviceExt;

/// Clustered deferred renderer
///
/// Owns the light pool, the four frame stages and every viewport-dependent
/// buffer. One call to [`render`](Self::render) produces one presented frame.
pub struct Renderer {
    ctx: GpuContext,
    config: RendererConfig,
    layouts: BindGroupLayouts,
    graph: RenderGraph,
    lights: LightSet,

    // Uniform buffers
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    shading_params_buffer: wgpu::Buffer,

    // Swapped as a whole on resize
    frame: FrameResources,

    default_material: Material,
    draw_list: Vec<DrawCall>,

    frame_count: u64,
}

impl Renderer {
    /// Create a new renderer
    ///
    /// Every pipeline is compiled and every buffer is size-checked here, so
    /// layout or shader mismatches surface before the first frame.
    pub fn new(ctx: GpuContext, config: RendererConfig) -> Result<Self> {
        log::info!("Creating Helio Clustered renderer");
        log::info!("  Surface format: {:?}", config.surface_format);
        log::info!("  Resolution: {}x{}", config.width, config.height);

        config.validate()?;
        let grid = ClusterGrid::new(config.width, config.height, &config.cluster)?;
        log::info!(
            "  Cluster grid: {}x{}x{} ({} clusters, {} lights max each)",
            grid.num_x,
            grid.num_y,
            grid.num_z,
            grid.cluster_count(),
            grid.max_lights_per_cluster
        );

        let device = &ctx.device;
        let layouts = BindGroupLayouts::new(device);

        // ── Uniform buffers ──────────────────────────────────────────────────
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform Buffer"),
            size: pod_size::<CameraUniform>(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = buffer_bind_group(
            device,
            "Camera Bind Group",
            &layouts.camera,
            &[BufferSlot::new("camera uniform", &camera_buffer, pod_size::<CameraUniform>())],
        )?;

        let params = ShadingParams::new(config.background_color, config.ambient);
        let shading_params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Shading Params Uniform"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // ── Lights ───────────────────────────────────────────────────────────
        let lights = LightSet::new(&ctx, config.lights, &layouts)?;

        // ── Viewport-dependent state ─────────────────────────────────────────
        let frame = FrameResources::new(
            &ctx,
            &layouts,
            grid,
            config.lights.radius,
            &SharedBuffers {
                camera: &camera_buffer,
                lights: lights.buffer(),
                shading_params: &shading_params_buffer,
            },
            0,
        )?;

        // ── Frame graph ──────────────────────────────────────────────────────
        let mut graph = RenderGraph::new();
        graph.add_pass(ClusterBoundsPass::new(&ctx, &layouts)?);
        graph.add_pass(LightBinningPass::new(&ctx, &layouts)?);
        graph.add_pass(GBufferPass::new(&ctx, &layouts)?);
        graph.add_pass(ShadingPass::new(&ctx, &layouts, config.surface_format)?);
        graph.build()?;

        let default_material = Material::solid(&ctx, &layouts, [1.0, 1.0, 1.0, 1.0]);

        log::info!("Helio Clustered initialized successfully");

        Ok(Self {
            ctx,
            config,
            layouts,
            graph,
            lights,
            camera_buffer,
            camera_bind_group,
            shading_params_buffer,
            frame,
            default_material,
            draw_list: Vec::new(),
            frame_count: 0,
        })
    }

    // ── Draw submission ───────────────────────────────────────────────────────

    /// Build a draw record; `None` selects the default white material
    pub fn object(&self, mesh: &GpuMesh, transform: ModelTransform, material: Option<&Material>) -> DrawCall {
        let material = material.unwrap_or(&self.default_material);
        DrawCall::new(&self.ctx, &self.layouts, mesh, transform, material)
    }

    /// Queue a draw for the next frame
    pub fn draw(&mut self, draw: DrawCall) {
        self.draw_list.push(draw);
    }

    /// Queue every object of a scene, in scene order
    pub fn draw_scene(&mut self, scene: &Scene) {
        self.draw_list.extend(scene.objects.iter().cloned());
    }

    /// Queued draws not yet rendered
    pub fn pending_draws(&self) -> usize {
        self.draw_list.len()
    }

    // ── Frame rendering ───────────────────────────────────────────────────────

    /// Render a frame at `time` seconds. Call `draw()` BEFORE calling this.
    ///
    /// Light animation goes out as its own submission; the four graph stages
    /// share one encoder and one submission after it.
    pub fn render(&mut self, camera: &Camera, target: &wgpu::TextureView, time: f32) -> Result<()> {
        log::trace!("Rendering frame {}", self.frame_count);

        self.lights.animate(&self.ctx, time);

        let grid = &self.frame.grid;
        let uniform = camera.uniform(grid.width, grid.height);
        self.ctx.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));
        self.frame.update(&self.ctx.queue, camera);

        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let mut graph_ctx = GraphContext {
            encoder: &mut encoder,
            frame: &self.frame,
            target,
            camera_bind_group: &self.camera_bind_group,
            draws: &self.draw_list,
            frame_index: self.frame_count,
        };
        let result = self.graph.execute(&mut graph_ctx);
        self.draw_list.clear();
        result?;

        self.ctx.queue.submit(Some(encoder.finish()));
        self.frame_count += 1;
        Ok(())
    }

    /// Queue a scene and render it
    pub fn render_scene(&mut self, scene: &Scene, camera: &Camera, target: &wgpu::TextureView, time: f32) -> Result<()> {
        self.draw_scene(scene);
        self.render(camera, target, time)
    }

    /// Rebuild every viewport-dependent resource for a new size
    ///
    /// The new generation is fully built before the old one is dropped, so a
    /// failed resize leaves the renderer on the previous grid.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        log::info!("Resizing renderer to {}x{}", width, height);

        let grid = ClusterGrid::new(width, height, &self.config.cluster)?;
        let frame = FrameResources::new(
            &self.ctx,
            &self.layouts,
            grid,
            self.config.lights.radius,
            &SharedBuffers {
                camera: &self.camera_buffer,
                lights: self.lights.buffer(),
                shading_params: &self.shading_params_buffer,
            },
            self.frame.generation + 1,
        )?;

        self.frame = frame;
        self.config.width = width;
        self.config.height = height;
        Ok(())
    }

    // ── Light controls ────────────────────────────────────────────────────────

    /// Re-seed the pool with `n` active lights at the origin
    pub fn initialize_lights(&mut self, n: u32) {
        self.lights.initialize(&self.ctx, n);
    }

    /// Change how many lights are read downstream; returns the applied count
    pub fn set_active_lights(&mut self, n: u32) -> u32 {
        self.lights.set_active_count(&self.ctx, n)
    }

    pub fn set_lights_frozen(&mut self, frozen: bool) {
        self.lights.set_frozen(frozen);
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn set_background(&mut self, color: [f32; 3]) {
        self.config.background_color = color;
        self.write_shading_params();
    }

    pub fn set_ambient(&mut self, ambient: [f32; 3]) {
        self.config.ambient = ambient;
        self.write_shading_params();
    }

    fn write_shading_params(&self) {
        let params = ShadingParams::new(self.config.background_color, self.config.ambient);
        self.ctx.queue.write_buffer(&self.shading_params_buffer, 0, bytemuck::bytes_of(&params));
    }

    // ── Diagnostics ───────────────────────────────────────────────────────────

    /// Read back the light lists of the last rendered frame (blocks on the GPU)
    pub fn cluster_snapshot(&self) -> Result<ClusterSnapshot> {
        let buffer = &self.frame.cluster_buffer;
        let bytes = self.ctx.read_buffer(buffer, buffer.size())?;
        let snapshot = ClusterSnapshot::from_bytes(&bytes)?;
        if snapshot.overflow_count() > 0 {
            log::debug!(
                "{} clusters truncated to {} lights",
                snapshot.overflow_count(),
                snapshot.max_lights_per_cluster
            );
        }
        Ok(snapshot)
    }

    /// Read back the cluster AABBs built by the last rendered frame
    pub fn cluster_bounds(&self) -> Result<Vec<Aabb>> {
        let bytes = self.ctx.read_buffer(&self.frame.bounds_buffer, bounds_buffer_size(&self.frame.grid))?;
        Ok(bytes
            .chunks_exact(CLUSTER_BOUNDS_STRIDE as usize)
            .map(|chunk| bytemuck::pod_read_unaligned::<GpuClusterBounds>(chunk).into())
            .collect())
    }

    // ── Utilities ─────────────────────────────────────────────────────────────

    pub fn grid(&self) -> &ClusterGrid {
        &self.frame.grid
    }

    /// Incremented on every resize
    pub fn generation(&self) -> u64 {
        self.frame.generation
    }

    pub fn execution_order(&self) -> Vec<&str> {
        self.graph.execution_order()
    }

    pub fn barriers(&self) -> Vec<Barrier> {
        self.graph.barriers()
    }

    pub fn default_material(&self) -> &Material {
        &self.default_material
    }

    pub fn layouts(&self) -> &BindGroupLayouts {
        &self.layouts
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn frame_count(&self) -> u64 { self.frame_count }
    pub fn context(&self) -> &GpuContext { &self.ctx }
    pub fn device(&self) -> &wgpu::Device { &self.ctx.device }
    pub fn queue(&self) -> &wgpu::Queue { &self.ctx.queue }
}
