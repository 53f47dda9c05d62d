//! Light pool and its GPU light set
//!
//! The pool is allocated once at `max_lights` entries. Indices never move;
//! `set_active_count` only changes how many entries the binning and shading
//! stages read. Positions are owned by the GPU after construction and are
//! advanced by the move-lights compute stage in a submission of its own.

use crate::config::LightConfig;
use crate::context::GpuContext;
use crate::layout::{
    light_buffer_size, pod_size, validate_binding, GpuLight, LightMotionUniform, LightSetHeader, LIGHT_HEADER_SIZE,
};
use crate::pipeline::{create_compute_pipeline, create_shader_module, workgroup_count};
use crate::resources::{buffer_bind_group, BindGroupLayouts, BufferSlot};
use crate::shaders;
use crate::{Error, Result};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Saturated hue blended 80% of the way from white (`h` in `[0, 1]`)
pub fn hue_to_rgb(h: f32) -> Vec3 {
    let f = |n: f32| {
        let k = (n + h * 6.0) % 6.0;
        1.0 - k.min(4.0 - k).min(1.0).max(0.0)
    };
    Vec3::ONE.lerp(Vec3::new(f(5.0), f(3.0), f(1.0)), 0.8)
}

fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn hash01(x: u32) -> f32 {
    pcg_hash(x) as f32 / u32::MAX as f32
}

/// Position of light `index` at `time` seconds (mirrors `move_lights.wgsl`)
pub fn light_position(index: u32, time: f32, config: &LightConfig) -> Vec3 {
    let seed = index.wrapping_mul(4);
    let min = config.position_min;
    let span = config.position_max - min;
    let base = min + span * Vec3::new(hash01(seed), hash01(seed + 1), hash01(seed + 2));
    let phase = TAU * hash01(seed + 3);
    let theta = time * config.speed + phase;

    Vec3::new(
        base.x + config.orbit_radius * theta.cos(),
        min.y + span.y * (0.5 + 0.5 * theta.sin()),
        base.z + config.orbit_radius * theta.sin(),
    )
}

/// Windowed inverse-square falloff (mirrors `light_contribution` in `shading.wgsl`)
pub fn falloff(distance: f32, radius: f32) -> f32 {
    let ratio = distance / radius;
    let window = (1.0 - ratio.powi(4)).clamp(0.0, 1.0);
    window / (distance * distance).max(shaders::FALLOFF_EPSILON)
}

/// Host-side light state
///
/// Colors and the active count here are what the GPU light set holds. Positions
/// are only the initial upload: once a [`LightSet`] exists its buffer is moved
/// by the move-lights stage and never copied back, so
/// [`reference_positions`](Self::reference_positions) is a host-side reference
/// advanced only by [`animate_reference`](Self::animate_reference).
#[derive(Debug, Clone)]
pub struct LightPool {
    config: LightConfig,
    positions: Vec<Vec3>,
    colors: Vec<Vec3>,
    active: u32,
}

impl LightPool {
    pub fn new(config: LightConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.max_lights as usize;
        let mut pool = Self {
            config,
            positions: vec![Vec3::ZERO; capacity],
            colors: vec![Vec3::ZERO; capacity],
            active: 0,
        };
        pool.initialize(config.initial_active);
        Ok(pool)
    }

    /// Re-seed every color, reset positions to the origin and activate `n` lights
    pub fn initialize(&mut self, n: u32) {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        for color in &mut self.colors {
            *color = hue_to_rgb(rng.gen::<f32>()) * self.config.intensity;
        }
        self.positions.fill(Vec3::ZERO);
        self.set_active_count(n);
        log::debug!("Initialized light pool: {} of {} active", self.active, self.capacity());
    }

    /// Advance the host reference positions of the active lights to `time`
    ///
    /// Computes the same motion as the move-lights stage but does not touch
    /// any GPU buffer.
    pub fn animate_reference(&mut self, time: f32) {
        for (i, position) in self.positions.iter_mut().take(self.active as usize).enumerate() {
            *position = light_position(i as u32, time, &self.config);
        }
    }

    /// Clamp into `[0, max_lights]` and return the count actually applied
    pub fn set_active_count(&mut self, n: u32) -> u32 {
        let capacity = self.capacity();
        if n > capacity {
            log::warn!("Requested {} active lights, pool holds {}; clamping", n, capacity);
        }
        self.active = n.min(capacity);
        self.active
    }

    pub fn active_count(&self) -> u32 {
        self.active
    }

    pub fn capacity(&self) -> u32 {
        self.config.max_lights
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    pub fn reference_positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn active_reference_positions(&self) -> &[Vec3] {
        &self.positions[..self.active as usize]
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn header(&self) -> LightSetHeader {
        LightSetHeader { num_lights: self.active, _pad: [0; 3] }
    }

    /// Full light buffer image: header followed by every pool entry
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(light_buffer_size(self.capacity()) as usize);
        bytes.extend_from_slice(bytemuck::bytes_of(&self.header()));
        for (position, color) in self.positions.iter().zip(&self.colors) {
            bytes.extend_from_slice(bytemuck::bytes_of(&GpuLight::new(*position, *color)));
        }
        bytes
    }
}

/// GPU light buffer plus the move-lights compute stage
pub struct LightSet {
    pool: LightPool,
    buffer: Arc<wgpu::Buffer>,
    time_buffer: wgpu::Buffer,
    _motion_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::ComputePipeline,
    frozen: bool,
    last_time: Option<f32>,
}

impl LightSet {
    pub fn new(ctx: &GpuContext, config: LightConfig, layouts: &BindGroupLayouts) -> Result<Self> {
        let pool = LightPool::new(config)?;
        let device = &ctx.device;

        let size = light_buffer_size(pool.capacity());
        validate_binding("light set", size, &device.limits())?;

        let buffer = Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Set Buffer"),
            contents: &pool.to_bytes(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        }));

        let time_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Time Uniform"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let motion = LightMotionUniform {
            position_min: config.position_min.to_array(),
            speed: config.speed,
            position_max: config.position_max.to_array(),
            orbit_radius: config.orbit_radius,
        };
        let motion_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Motion Uniform"),
            contents: bytemuck::bytes_of(&motion),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = buffer_bind_group(
            device,
            "Move Lights Bind Group",
            &layouts.move_lights,
            &[
                BufferSlot::new("light set", &buffer, size),
                BufferSlot::new("light time", &time_buffer, pod_size::<f32>()),
                BufferSlot::new("light motion", &motion_buffer, pod_size::<LightMotionUniform>()),
            ],
        )?;

        let module = create_shader_module(
            device,
            "move_lights",
            &shaders::compose(shaders::MOVE_LIGHTS),
            &shaders::defines(),
        )?;
        let pipeline = create_compute_pipeline(device, "move_lights", &module, &[&layouts.move_lights])?;

        log::info!(
            "Light set ready: {} of {} lights active ({} KiB)",
            pool.active_count(),
            pool.capacity(),
            size / 1024
        );

        Ok(Self {
            pool,
            buffer,
            time_buffer,
            _motion_buffer: motion_buffer,
            bind_group,
            pipeline,
            frozen: false,
            last_time: None,
        })
    }

    /// Re-seed colors, zero positions and activate `n` lights
    pub fn initialize(&mut self, ctx: &GpuContext, n: u32) {
        self.pool.initialize(n);
        ctx.queue.write_buffer(&self.buffer, 0, &self.pool.to_bytes());
        self.last_time = None;
    }

    /// Advance every active light to `time` seconds in its own submission
    pub fn animate(&mut self, ctx: &GpuContext, time: f32) {
        if self.frozen {
            log::trace!("Lights frozen, skipping animation");
            return;
        }

        let active = self.pool.active_count();
        if active == 0 {
            return;
        }

        ctx.queue.write_buffer(&self.time_buffer, 0, bytemuck::bytes_of(&time));

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Move Lights Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Move Lights"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(active, shaders::MOVE_LIGHTS_WORKGROUP), 1, 1);
        }
        ctx.queue.submit(Some(encoder.finish()));
        self.last_time = Some(time);
    }

    /// Change how many lights downstream stages read; returns the applied count
    pub fn set_active_count(&mut self, ctx: &GpuContext, n: u32) -> u32 {
        let applied = self.pool.set_active_count(n);
        ctx.queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&self.pool.header()));
        applied
    }

    /// Stop (or resume) animation submissions
    pub fn set_frozen(&mut self, frozen: bool) {
        if self.frozen != frozen {
            log::info!("Light animation {}", if frozen { "frozen" } else { "resumed" });
        }
        self.frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn active_count(&self) -> u32 {
        self.pool.active_count()
    }

    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    pub fn pool(&self) -> &LightPool {
        &self.pool
    }

    /// Time of the last animation submission
    pub fn last_time(&self) -> Option<f32> {
        self.last_time
    }

    pub fn buffer(&self) -> &Arc<wgpu::Buffer> {
        &self.buffer
    }

    /// Read the active records back (blocks on the GPU)
    pub fn read_back(&self, ctx: &GpuContext) -> Result<Vec<GpuLight>> {
        let active = self.pool.active_count() as u64;
        let bytes = ctx.read_buffer(&self.buffer, LIGHT_HEADER_SIZE + active * crate::layout::LIGHT_STRIDE)?;
        let records = bytes
            .get(LIGHT_HEADER_SIZE as usize..)
            .ok_or_else(|| Error::Readback("light set readback is missing its header".into()))?;
        Ok(records
            .chunks_exact(crate::layout::LIGHT_STRIDE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_config() -> LightConfig {
        LightConfig::default().with_max_lights(64).with_active(64)
    }

    #[test]
    fn hue_zero_is_washed_out_red() {
        let c = hue_to_rgb(0.0);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 0.2);
        assert_relative_eq!(c.z, 0.2);
    }

    #[test]
    fn colors_are_scaled_by_intensity() {
        let pool = LightPool::new(small_config()).unwrap();
        for color in pool.colors() {
            assert!(color.max_element() <= 0.1 + 1e-6);
            assert!(color.min_element() >= 0.02 - 1e-6);
        }
    }

    #[test]
    fn seeded_pools_match() {
        let a = LightPool::new(small_config()).unwrap();
        let b = LightPool::new(small_config()).unwrap();
        assert_eq!(a.colors(), b.colors());
        let c = LightPool::new(small_config().with_seed(Some(99))).unwrap();
        assert_ne!(a.colors(), c.colors());
    }

    #[test]
    fn positions_start_at_origin() {
        let pool = LightPool::new(small_config()).unwrap();
        assert!(pool.reference_positions().iter().all(|p| *p == Vec3::ZERO));
    }

    #[test]
    fn active_count_is_clamped() {
        let mut pool = LightPool::new(small_config()).unwrap();
        assert_eq!(pool.set_active_count(10), 10);
        assert_eq!(pool.active_reference_positions().len(), 10);
        assert_eq!(pool.set_active_count(1_000), 64);
        assert_eq!(pool.set_active_count(0), 0);
        assert_eq!(pool.capacity(), 64);
    }

    #[test]
    fn animation_only_moves_active_lights() {
        let mut pool = LightPool::new(small_config()).unwrap();
        pool.set_active_count(8);
        pool.animate_reference(1.5);
        assert!(pool.reference_positions()[..8].iter().all(|p| *p != Vec3::ZERO));
        assert!(pool.reference_positions()[8..].iter().all(|p| *p == Vec3::ZERO));
    }

    #[test]
    fn motion_stays_inside_bounds() {
        let config = LightConfig::default();
        for i in 0..500 {
            for t in [0.0, 0.7, 3.1, 42.0] {
                let p = light_position(i, t, &config);
                assert!(p.x >= config.position_min.x - config.orbit_radius - 1e-4);
                assert!(p.x <= config.position_max.x + config.orbit_radius + 1e-4);
                assert!(p.y >= config.position_min.y - 1e-4 && p.y <= config.position_max.y + 1e-4);
                assert!(p.z >= config.position_min.z - config.orbit_radius - 1e-4);
                assert!(p.z <= config.position_max.z + config.orbit_radius + 1e-4);
            }
        }
    }

    #[test]
    fn motion_is_periodic() {
        let config = LightConfig::default();
        let period = TAU / config.speed;
        let a = light_position(17, 0.25, &config);
        let b = light_position(17, 0.25 + period, &config);
        assert!(a.abs_diff_eq(b, 1e-3));
    }

    #[test]
    fn buffer_image_matches_layout() {
        let mut pool = LightPool::new(small_config()).unwrap();
        pool.set_active_count(5);
        let bytes = pool.to_bytes();
        assert_eq!(bytes.len() as u64, light_buffer_size(64));
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 5);

        let record: GpuLight = bytemuck::pod_read_unaligned(&bytes[16 + 32 * 3..16 + 32 * 4]);
        assert_eq!(record.color, pool.colors()[3].to_array());
        assert_eq!(record.position, [0.0; 3]);
    }

    #[test]
    fn falloff_reaches_zero_at_radius() {
        assert_relative_eq!(falloff(2.0, 2.0), 0.0);
        assert_relative_eq!(falloff(3.0, 2.0), 0.0);
        assert!(falloff(1.0, 2.0) > 0.0);
        // Clamped near the light instead of blowing up
        assert_relative_eq!(falloff(0.0, 2.0), 1.0 / shaders::FALLOFF_EPSILON);
    }
}
