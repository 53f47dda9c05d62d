//! Renderer configuration

use crate::{Error, Result};
use glam::Vec3;

/// Default tile edge in pixels
pub const DEFAULT_TILE_SIZE: u32 = 96;
/// Default number of depth slices
pub const DEFAULT_NUM_SLICES: u32 = 8;
/// Default light-list capacity of a single cluster
pub const DEFAULT_MAX_LIGHTS_PER_CLUSTER: u32 = 500;

/// Default size of the light pool
pub const DEFAULT_MAX_LIGHTS: u32 = 10_000;
/// Scale applied to every generated light color
pub const DEFAULT_LIGHT_INTENSITY: f32 = 0.1;
/// Bounding-sphere radius used for binning and falloff
pub const DEFAULT_LIGHT_RADIUS: f32 = 2.0;

/// How view-space depth is divided into slices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthSlicing {
    /// Equal-thickness slices between near and far
    Linear,
    /// Slice thickness grows geometrically with depth
    Logarithmic,
}

impl DepthSlicing {
    pub(crate) fn as_u32(self) -> u32 {
        match self {
            DepthSlicing::Linear => 0,
            DepthSlicing::Logarithmic => 1,
        }
    }
}

/// Cluster grid parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    /// Tile edge length in pixels (tiles are square)
    pub tile_size: u32,
    pub num_slices: u32,
    pub max_lights_per_cluster: u32,
    pub slicing: DepthSlicing,
    /// Distribute slices over `[near, min(far, max_cluster_depth)]` instead of
    /// the whole frustum. The last slice still extends to the camera far plane,
    /// so fragments beyond the cap share it.
    pub max_cluster_depth: Option<f32>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            num_slices: DEFAULT_NUM_SLICES,
            max_lights_per_cluster: DEFAULT_MAX_LIGHTS_PER_CLUSTER,
            slicing: DepthSlicing::Logarithmic,
            max_cluster_depth: None,
        }
    }
}

impl ClusterConfig {
    pub fn with_tile_size(mut self, size: u32) -> Self {
        self.tile_size = size;
        self
    }

    pub fn with_slices(mut self, slices: u32) -> Self {
        self.num_slices = slices;
        self
    }

    pub fn with_max_lights_per_cluster(mut self, max: u32) -> Self {
        self.max_lights_per_cluster = max;
        self
    }

    pub fn with_slicing(mut self, slicing: DepthSlicing) -> Self {
        self.slicing = slicing;
        self
    }

    pub fn with_max_cluster_depth(mut self, depth: Option<f32>) -> Self {
        self.max_cluster_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(Error::Config("tile_size must be at least 1 pixel".into()));
        }
        if self.num_slices == 0 {
            return Err(Error::Config("num_slices must be at least 1".into()));
        }
        if self.max_lights_per_cluster == 0 {
            return Err(Error::Config("max_lights_per_cluster must be at least 1".into()));
        }
        if let Some(depth) = self.max_cluster_depth {
            if !(depth > 0.0) {
                return Err(Error::Config(format!("max_cluster_depth must be positive, got {depth}")));
            }
        }
        Ok(())
    }
}

/// Light pool parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConfig {
    /// Pool size; allocated once and never grown
    pub max_lights: u32,
    /// Number of lights live after construction
    pub initial_active: u32,
    pub intensity: f32,
    pub radius: f32,
    /// Color seed; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Lower corner of the region lights wander in (world space)
    pub position_min: Vec3,
    pub position_max: Vec3,
    /// Angular speed of the motion function (radians per second)
    pub speed: f32,
    /// Horizontal orbit radius around each light's base position
    pub orbit_radius: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            max_lights: DEFAULT_MAX_LIGHTS,
            initial_active: DEFAULT_MAX_LIGHTS,
            intensity: DEFAULT_LIGHT_INTENSITY,
            radius: DEFAULT_LIGHT_RADIUS,
            seed: Some(0x5eed),
            position_min: Vec3::new(-14.0, 0.0, -6.0),
            position_max: Vec3::new(14.0, 20.0, 6.0),
            speed: 0.5,
            orbit_radius: 1.0,
        }
    }
}

impl LightConfig {
    pub fn with_max_lights(mut self, max: u32) -> Self {
        self.max_lights = max;
        self.initial_active = self.initial_active.min(max);
        self
    }

    pub fn with_active(mut self, active: u32) -> Self {
        self.initial_active = active;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.position_min = min;
        self.position_max = max;
        self
    }

    pub fn with_motion(mut self, speed: f32, orbit_radius: f32) -> Self {
        self.speed = speed;
        self.orbit_radius = orbit_radius;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_lights == 0 {
            return Err(Error::Config("max_lights must be at least 1".into()));
        }
        if self.initial_active > self.max_lights {
            return Err(Error::Config(format!(
                "initial_active ({}) exceeds max_lights ({})",
                self.initial_active, self.max_lights
            )));
        }
        if !(self.radius > 0.0) {
            return Err(Error::Config(format!("light radius must be positive, got {}", self.radius)));
        }
        if self.position_min.cmpgt(self.position_max).any() {
            return Err(Error::Config(format!(
                "light bounds are inverted: {:?} > {:?}",
                self.position_min, self.position_max
            )));
        }
        Ok(())
    }
}

/// Main renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub surface_format: wgpu::TextureFormat,
    pub cluster: ClusterConfig,
    pub lights: LightConfig,
    /// Written wherever no geometry covers the pixel (linear RGB).
    /// Never multiplied by albedo or lit by anything.
    pub background_color: [f32; 3],
    /// Constant term added to the per-light sum before it is multiplied by
    /// albedo (linear RGB). With no lights in a cluster, covered pixels come
    /// out as `albedo * ambient`, not as the background.
    pub ambient: [f32; 3],
}

impl RendererConfig {
    pub fn new(width: u32, height: u32, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            surface_format,
            cluster: ClusterConfig::default(),
            lights: LightConfig::default(),
            background_color: [0.0, 0.0, 0.0],
            ambient: [0.0, 0.0, 0.0],
        }
    }

    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_lights(mut self, lights: LightConfig) -> Self {
        self.lights = lights;
        self
    }

    pub fn with_background(mut self, color: [f32; 3]) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_ambient(mut self, ambient: [f32; 3]) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.lights.validate()
    }
}
