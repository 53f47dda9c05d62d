//! Thousands of animated point lights over a cube field
//!
//! Controls:
//!   WASD         move forward/left/back/right
//!   Space/Shift  move up/down
//!   Mouse drag   look around (click to grab cursor)
//!   F            freeze / resume light animation
//!   +/-          add / remove 1000 active lights
//!   C            log a cluster occupancy snapshot
//!   Escape       release cursor / exit

use helio_clustered::{
    Camera, GpuContext, GpuMesh, LightConfig, Material, ModelTransform, Renderer, RendererConfig, Scene,
};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};
use std::collections::HashSet;
use std::sync::Arc;

const LIGHT_STEP: u32 = 1000;

fn main() {
    env_logger::init();
    log::info!("Starting Helio Clustered lights example");

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    let mut app = App::new();

    event_loop.run_app(&mut app).expect("Event loop error");
}

struct App {
    state: Option<AppState>,
}

struct AppState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    surface_format: wgpu::TextureFormat,
    renderer: Renderer,
    scene: Scene,
    start: std::time::Instant,
    last_frame: std::time::Instant,

    // Free-camera state
    cam_pos:   glam::Vec3,
    cam_yaw:   f32,   // radians, horizontal rotation
    cam_pitch: f32,   // radians, vertical rotation (clamped)
    keys:      HashSet<KeyCode>,
    cursor_grabbed: bool,
    mouse_delta: (f32, f32),
}

impl App {
    fn new() -> Self {
        Self { state: None }
    }
}

/// Ground plane plus a grid of cubes with alternating albedo
fn build_scene(renderer: &Renderer) -> Scene {
    let ctx = renderer.context();
    let device = &ctx.device;
    let layouts = renderer.layouts();

    let ground = GpuMesh::plane(device, [0.0, 0.0, 0.0], 20.0);
    let ground_material = Material::solid(ctx, layouts, [0.6, 0.6, 0.6, 1.0]);
    let mut scene = Scene::new()
        .add_object(renderer.object(&ground, ModelTransform::IDENTITY, Some(&ground_material)));

    let cube = GpuMesh::cube(device, [0.0, 0.0, 0.0], 0.5);
    let warm = Material::solid(ctx, layouts, [0.9, 0.8, 0.7, 1.0]);
    let cool = Material::solid(ctx, layouts, [0.7, 0.8, 0.9, 1.0]);

    for x in -6i32..=6 {
        for z in -2i32..=2 {
            let height = 0.5 + ((x * 7 + z * 13).rem_euclid(5)) as f32 * 0.4;
            let transform = ModelTransform(
                glam::Mat4::from_translation(glam::Vec3::new(x as f32 * 2.0, height * 0.5, z as f32 * 2.5))
                    * glam::Mat4::from_scale(glam::Vec3::new(1.0, height, 1.0)),
            );
            let material = if (x + z).rem_euclid(2) == 0 { &warm } else { &cool };
            scene.push(renderer.object(&cube, transform, Some(material)));
        }
    }

    log::info!("Scene: {} objects", scene.len());
    scene
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("Helio Clustered – 10,000 Lights")
                        .with_inner_size(winit::dpi::LogicalSize::new(1280u32, 720u32)),
                )
                .expect("Failed to create window"),
        );

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("Failed to find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Main Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .expect("Failed to create device");

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = Renderer::new(
            GpuContext::new(device.clone(), queue),
            RendererConfig::new(size.width, size.height, surface_format)
                .with_lights(LightConfig::default())
                .with_ambient([0.01, 0.01, 0.015]),
        )
        .expect("Failed to create renderer");

        let scene = build_scene(&renderer);
        let now = std::time::Instant::now();

        self.state = Some(AppState {
            window,
            surface,
            device,
            surface_format,
            renderer,
            scene,
            start: now,
            last_frame: now,
            cam_pos:   glam::Vec3::new(0.0, 6.0, 16.0),
            cam_yaw:   0.0,         // yaw=0 looks down -Z toward the scene
            cam_pitch: -0.3,
            keys:      HashSet::new(),
            cursor_grabbed: false,
            mouse_delta: (0.0, 0.0),
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else { return };

        match event {
            // ── Exit ──────────────────────────────────────────────────────────
            WindowEvent::CloseRequested => {
                log::info!("Shutting down");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Escape),
                    ..
                },
                ..
            } => {
                if state.cursor_grabbed {
                    // First Escape releases the cursor
                    state.cursor_grabbed = false;
                    let _ = state.window.set_cursor_grab(CursorGrabMode::None);
                    state.window.set_cursor_visible(true);
                } else {
                    event_loop.exit();
                }
            }

            // ── Light controls ────────────────────────────────────────────────
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(key),
                    repeat: false,
                    ..
                },
                ..
            } if matches!(key, KeyCode::KeyF | KeyCode::Equal | KeyCode::Minus | KeyCode::KeyC) => {
                state.handle_light_key(key);
            }

            // ── Keyboard held state ───────────────────────────────────────────
            WindowEvent::KeyboardInput {
                event: KeyEvent { state: ks, physical_key: PhysicalKey::Code(key), .. },
                ..
            } => {
                match ks {
                    ElementState::Pressed  => { state.keys.insert(key); }
                    ElementState::Released => { state.keys.remove(&key); }
                }
            }

            // ── Mouse button : grab cursor on click ───────────────────────────
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if !state.cursor_grabbed {
                    // Try confined first, fall back to locked
                    let grabbed = state.window.set_cursor_grab(CursorGrabMode::Confined)
                        .or_else(|_| state.window.set_cursor_grab(CursorGrabMode::Locked))
                        .is_ok();
                    if grabbed {
                        state.window.set_cursor_visible(false);
                        state.cursor_grabbed = true;
                    }
                }
            }

            // ── Window resize ─────────────────────────────────────────────────
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format: state.surface_format,
                    width: size.width,
                    height: size.height,
                    present_mode: wgpu::PresentMode::Fifo,
                    alpha_mode: wgpu::CompositeAlphaMode::Auto,
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                state.surface.configure(&state.device, &config);
                if let Err(e) = state.renderer.resize(size.width, size.height) {
                    log::error!("Resize failed: {e}");
                }
            }

            WindowEvent::RedrawRequested => {
                let now = std::time::Instant::now();
                let dt = (now - state.last_frame).as_secs_f32();
                state.last_frame = now;
                state.render(dt);
                state.window.request_redraw();
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: winit::event::DeviceId, event: DeviceEvent) {
        let Some(state) = &mut self.state else { return };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.cursor_grabbed {
                state.mouse_delta.0 += dx as f32;
                state.mouse_delta.1 += dy as f32;
            }
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl AppState {
    fn handle_light_key(&mut self, key: KeyCode) {
        let active = self.renderer.lights().active_count();
        match key {
            KeyCode::KeyF => {
                let frozen = !self.renderer.lights().is_frozen();
                self.renderer.set_lights_frozen(frozen);
            }
            KeyCode::Equal => {
                let applied = self.renderer.set_active_lights(active.saturating_add(LIGHT_STEP));
                log::info!("Active lights: {applied}");
            }
            KeyCode::Minus => {
                let applied = self.renderer.set_active_lights(active.saturating_sub(LIGHT_STEP));
                log::info!("Active lights: {applied}");
            }
            KeyCode::KeyC => match self.renderer.cluster_snapshot() {
                Ok(snapshot) => log::info!(
                    "Clusters: {} occupied of {}, longest list {}, {} overflowed",
                    snapshot.occupied_clusters(),
                    snapshot.cluster_count(),
                    snapshot.max_occupancy(),
                    snapshot.overflow_count()
                ),
                Err(e) => log::error!("Cluster snapshot failed: {e}"),
            },
            _ => {}
        }
    }

    fn render(&mut self, dt: f32) {
        // ── Camera movement ────────────────────────────────────────────────────
        const SPEED: f32 = 5.0;
        const LOOK_SENS: f32 = 0.002;

        // Apply mouse look : yaw left/right, pitch up/down (non-inverted)
        self.cam_yaw   += self.mouse_delta.0 * LOOK_SENS;
        self.cam_pitch  = (self.cam_pitch + self.mouse_delta.1 * LOOK_SENS).clamp(-1.5, 1.5);
        self.mouse_delta = (0.0, 0.0);

        // Standard FPS basis: yaw=0 looks down -Z
        let (sy, cy) = self.cam_yaw.sin_cos();
        let (sp, cp) = self.cam_pitch.sin_cos();
        let forward = glam::Vec3::new(sy * cp, sp, -cy * cp);
        let right   = glam::Vec3::new(cy, 0.0, sy);
        let up      = glam::Vec3::Y;

        if self.keys.contains(&KeyCode::KeyW) { self.cam_pos += forward * SPEED * dt; }
        if self.keys.contains(&KeyCode::KeyS) { self.cam_pos -= forward * SPEED * dt; }
        if self.keys.contains(&KeyCode::KeyA) { self.cam_pos -= right   * SPEED * dt; }
        if self.keys.contains(&KeyCode::KeyD) { self.cam_pos += right   * SPEED * dt; }
        if self.keys.contains(&KeyCode::Space)      { self.cam_pos += up * SPEED * dt; }
        if self.keys.contains(&KeyCode::ShiftLeft)  { self.cam_pos -= up * SPEED * dt; }

        let size = self.window.inner_size();
        let aspect = size.width as f32 / size.height.max(1) as f32;

        let camera = Camera::perspective(
            self.cam_pos,
            self.cam_pos + forward,
            glam::Vec3::Y,
            std::f32::consts::FRAC_PI_4,
            aspect,
            0.1,
            200.0,
        );

        // ── Acquire surface ────────────────────────────────────────────────────
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(e) => { log::warn!("Surface error: {:?}", e); return; }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let time = self.start.elapsed().as_secs_f32();
        if let Err(e) = self.renderer.render_scene(&self.scene, &camera, &view, time) {
            // Nothing was submitted; the dropped surface texture is discarded
            log::error!("Render error: {:?}", e);
            return;
        }

        output.present();
    }
}
