//! Cluster grid - screen tiles × depth slices over the view frustum
//!
//! Everything here mirrors `cluster_bounds.wgsl` and the lookup in
//! `shading.wgsl`. The GPU path is authoritative at runtime; this module is the
//! reference the shaders are checked against and the source of the grid
//! dimensions every buffer is sized from.
//!
//! Conventions:
//! - pixel `(0, 0)` is the top-left corner, tile `(0, 0)` covers it
//! - tile `x` covers pixels `[x * tile, (x + 1) * tile)`
//! - slice `z` covers view depths `[boundary(z), boundary(z + 1))`
//! - view space is right-handed, the camera looks down `-Z`

use crate::camera::Camera;
use crate::config::{ClusterConfig, DepthSlicing};
use crate::{Error, Result};
use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};

/// Axis-aligned bounding box in view space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for &p in points {
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// Sphere test against the closest point of the box. Touching counts.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.max(self.min).min(self.max);
        closest.distance_squared(center) <= radius * radius
    }

    pub fn contains(&self, point: Vec3, tolerance: f32) -> bool {
        point.cmpge(self.min - Vec3::splat(tolerance)).all()
            && point.cmple(self.max + Vec3::splat(tolerance)).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn abs_diff_eq(&self, other: &Aabb, tolerance: f32) -> bool {
        self.min.abs_diff_eq(other.min, tolerance) && self.max.abs_diff_eq(other.max, tolerance)
    }
}

/// Integer cluster coordinate: `(x, y)` screen tile, `z` depth slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ClusterCoord {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// View-space depth interval covered by the slices (positive distances)
///
/// `far` drives the slice distribution. `frustum_far` is the camera far plane;
/// the last slice is closed there so a depth cap never leaves fragments
/// outside every cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
    pub frustum_far: f32,
}

impl DepthRange {
    /// Uncapped range: slices span the whole frustum
    pub fn new(near: f32, far: f32) -> Self {
        Self { near, far, frustum_far: far }
    }
}

/// Grid dimensions and slicing for one viewport size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterGrid {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub num_x: u32,
    pub num_y: u32,
    pub num_z: u32,
    pub max_lights_per_cluster: u32,
    pub slicing: DepthSlicing,
    pub max_cluster_depth: Option<f32>,
}

impl ClusterGrid {
    pub fn new(width: u32, height: u32, config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(Error::Config(format!("viewport must be non-empty, got {width}x{height}")));
        }

        let num_x = width.div_ceil(config.tile_size);
        let num_y = height.div_ceil(config.tile_size);
        let num_z = config.num_slices;
        let count = (num_x as usize)
            .checked_mul(num_y as usize)
            .and_then(|n| n.checked_mul(num_z as usize))
            .filter(|&n| u32::try_from(n).is_ok());
        if count.is_none() {
            return Err(Error::Config(format!(
                "{num_x}x{num_y}x{num_z} clusters do not fit in a 32-bit cluster index"
            )));
        }

        Ok(Self {
            width,
            height,
            tile_size: config.tile_size,
            num_x,
            num_y,
            num_z,
            max_lights_per_cluster: config.max_lights_per_cluster,
            slicing: config.slicing,
            max_cluster_depth: config.max_cluster_depth,
        })
    }

    pub fn dimensions(&self) -> UVec3 {
        UVec3::new(self.num_x, self.num_y, self.num_z)
    }

    pub fn cluster_count(&self) -> usize {
        self.num_x as usize * self.num_y as usize * self.num_z as usize
    }

    /// Linear index, `x` fastest then `y` then `z`
    pub fn index(&self, coord: ClusterCoord) -> usize {
        (coord.x + coord.y * self.num_x + coord.z * self.num_x * self.num_y) as usize
    }

    pub fn coord(&self, index: usize) -> ClusterCoord {
        let index = index as u32;
        let per_slice = self.num_x * self.num_y;
        ClusterCoord {
            x: index % self.num_x,
            y: (index % per_slice) / self.num_x,
            z: index / per_slice,
        }
    }

    /// Depth interval to slice for this camera
    pub fn depth_range(&self, camera: &Camera) -> DepthRange {
        let far = match self.max_cluster_depth {
            Some(cap) if cap > camera.near => cap.min(camera.far),
            _ => camera.far,
        };
        DepthRange { near: camera.near, far, frustum_far: camera.far.max(far) }
    }

    /// View depth of slice boundary `k` (`0..=num_z`)
    ///
    /// Boundary `num_z` is the frustum far plane, even when the slices are
    /// distributed over a capped range.
    pub fn slice_boundary(&self, k: u32, range: DepthRange) -> f32 {
        if k >= self.num_z {
            return range.frustum_far;
        }
        let t = k as f32 / self.num_z as f32;
        match self.slicing {
            DepthSlicing::Linear => range.near + (range.far - range.near) * t,
            DepthSlicing::Logarithmic => range.near * (range.far / range.near).powf(t),
        }
    }

    /// Slice containing a positive view depth, clamped into `[0, num_z)`
    pub fn slice_for_depth(&self, depth: f32, range: DepthRange) -> u32 {
        let depth = depth.max(range.near);
        let t = match self.slicing {
            DepthSlicing::Linear => (depth - range.near) / (range.far - range.near),
            DepthSlicing::Logarithmic => (depth / range.near).ln() / (range.far / range.near).ln(),
        };
        let slice = (t * self.num_z as f32).floor().max(0.0) as u32;
        slice.min(self.num_z - 1)
    }

    /// Tile under a pixel position, clamped into the grid
    pub fn tile_for_pixel(&self, px: f32, py: f32) -> (u32, u32) {
        let tile = self.tile_size as f32;
        let x = (px / tile).floor().max(0.0) as u32;
        let y = (py / tile).floor().max(0.0) as u32;
        (x.min(self.num_x - 1), y.min(self.num_y - 1))
    }

    /// Cluster of a fragment from its pixel position and positive view depth
    pub fn cluster_for_fragment(&self, px: f32, py: f32, view_depth: f32, range: DepthRange) -> ClusterCoord {
        let (x, y) = self.tile_for_pixel(px, py);
        ClusterCoord { x, y, z: self.slice_for_depth(view_depth, range) }
    }

    /// View-space bounds of one cluster
    pub fn cluster_bounds(&self, coord: ClusterCoord, inv_proj: Mat4, range: DepthRange) -> Aabb {
        let screen = Vec2::new(self.width as f32, self.height as f32);
        let tile = self.tile_size as f32;
        let p_min = Vec2::new(coord.x as f32, coord.y as f32) * tile;
        let p_max = p_min + Vec2::splat(tile);

        let near = self.slice_boundary(coord.z, range);
        let far = self.slice_boundary(coord.z + 1, range);

        let corners = [
            p_min,
            Vec2::new(p_max.x, p_min.y),
            Vec2::new(p_min.x, p_max.y),
            p_max,
        ];

        let mut points = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter().enumerate() {
            let dir = screen_to_view_ray(screen, inv_proj, *corner);
            points[i * 2] = dir * near;
            points[i * 2 + 1] = dir * far;
        }
        Aabb::from_points(&points)
    }

    /// Bounds of every cluster in linear index order
    pub fn compute_bounds(&self, camera: &Camera) -> Vec<Aabb> {
        let inv_proj = camera.proj.inverse();
        let range = self.depth_range(camera);
        (0..self.cluster_count())
            .map(|i| self.cluster_bounds(self.coord(i), inv_proj, range))
            .collect()
    }
}

/// Ray from the eye through a pixel, scaled so that `z == -1`
///
/// Multiplying by a positive view depth `d` gives the view-space point at
/// that depth.
pub fn screen_to_view_ray(screen_size: Vec2, inv_proj: Mat4, pixel: Vec2) -> Vec3 {
    let tex = pixel / screen_size;
    let clip = Vec4::new(tex.x * 2.0 - 1.0, (1.0 - tex.y) * 2.0 - 1.0, 0.0, 1.0);
    let view = inv_proj * clip;
    let view = view.truncate() / view.w;
    view / -view.z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(aspect: f32) -> Camera {
        Camera::new(
            Mat4::IDENTITY,
            Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, aspect, 0.1, 100.0),
            0.1,
            100.0,
        )
    }

    fn hd_grid() -> ClusterGrid {
        ClusterGrid::new(1920, 1080, &ClusterConfig::default()).unwrap()
    }

    #[test]
    fn full_hd_grid_dimensions() {
        let grid = hd_grid();
        assert_eq!(grid.dimensions(), UVec3::new(20, 12, 8));
        assert_eq!(grid.cluster_count(), 1920);
        assert_eq!(grid.compute_bounds(&camera(16.0 / 9.0)).len(), 1920);
    }

    #[test]
    fn partial_tiles_round_up() {
        let grid = ClusterGrid::new(1000, 500, &ClusterConfig::default()).unwrap();
        assert_eq!((grid.num_x, grid.num_y), (11, 6));
    }

    #[test]
    fn empty_viewport_is_rejected() {
        assert!(ClusterGrid::new(0, 720, &ClusterConfig::default()).is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let config = ClusterConfig::default().with_tile_size(1).with_slices(64);
        let err = ClusterGrid::new(u32::MAX, u32::MAX, &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let grid = ClusterGrid::new(65_536, 16, &config).unwrap();
        assert_eq!(grid.cluster_count(), 65_536 * 16 * 64);
    }

    #[test]
    fn index_and_coord_are_inverse() {
        let grid = hd_grid();
        for i in [0usize, 1, 19, 20, 239, 240, 1919] {
            assert_eq!(grid.index(grid.coord(i)), i);
        }
        assert_eq!(grid.coord(0), ClusterCoord::new(0, 0, 0));
        assert_eq!(grid.coord(20), ClusterCoord::new(0, 1, 0));
        assert_eq!(grid.coord(240), ClusterCoord::new(0, 0, 1));
    }

    #[test]
    fn tile_boundaries_are_half_open() {
        let grid = hd_grid();
        assert_eq!(grid.tile_for_pixel(95.5, 0.5), (0, 0));
        assert_eq!(grid.tile_for_pixel(96.0, 0.5), (1, 0));
        assert_eq!(grid.tile_for_pixel(0.5, 96.0), (0, 1));
        assert_eq!(grid.tile_for_pixel(1919.5, 1079.5), (19, 11));
    }

    #[test]
    fn out_of_range_lookups_clamp() {
        let grid = hd_grid();
        let range = grid.depth_range(&camera(16.0 / 9.0));
        assert_eq!(grid.cluster_for_fragment(-5.0, -5.0, 0.0, range), ClusterCoord::new(0, 0, 0));
        assert_eq!(
            grid.cluster_for_fragment(1e6, 1e6, 1e9, range),
            ClusterCoord::new(19, 11, 7)
        );
    }

    #[test]
    fn slice_lookup_inverts_boundaries() {
        for slicing in [DepthSlicing::Linear, DepthSlicing::Logarithmic] {
            let config = ClusterConfig::default().with_slicing(slicing).with_slices(16);
            let grid = ClusterGrid::new(1280, 720, &config).unwrap();
            let range = grid.depth_range(&camera(16.0 / 9.0));
            for k in 0..grid.num_z {
                let mid = 0.5 * (grid.slice_boundary(k, range) + grid.slice_boundary(k + 1, range));
                assert_eq!(grid.slice_for_depth(mid, range), k, "{slicing:?} slice {k}");
            }
            assert_eq!(grid.slice_for_depth(range.far, range), grid.num_z - 1);
        }
    }

    #[test]
    fn linear_slices_are_equally_thick() {
        let config = ClusterConfig::default().with_slicing(DepthSlicing::Linear);
        let grid = ClusterGrid::new(1280, 720, &config).unwrap();
        let range = DepthRange::new(1.0, 9.0);
        for k in 0..grid.num_z {
            let thickness = grid.slice_boundary(k + 1, range) - grid.slice_boundary(k, range);
            assert!((thickness - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn depth_cap_limits_slicing_but_not_coverage() {
        let capped = ClusterConfig::default().with_max_cluster_depth(Some(20.0));
        let grid = ClusterGrid::new(1920, 1080, &capped).unwrap();
        let range = grid.depth_range(&camera(16.0 / 9.0));
        assert_eq!(range.far, 20.0);
        assert_eq!(range.frustum_far, 100.0);
        assert_eq!(grid.slice_boundary(grid.num_z, range), 100.0);
        assert!(grid.slice_boundary(grid.num_z - 1, range) < 20.0);

        let range = hd_grid().depth_range(&camera(16.0 / 9.0));
        assert_eq!((range.far, range.frustum_far), (100.0, 100.0));
    }

    #[test]
    fn bounds_are_deterministic() {
        let grid = hd_grid();
        let cam = camera(16.0 / 9.0);
        assert_eq!(grid.compute_bounds(&cam), grid.compute_bounds(&cam));
    }

    #[test]
    fn bounds_cover_every_fragment_out_to_far_plane() {
        let configs = [
            ClusterConfig::default().with_slicing(DepthSlicing::Linear),
            ClusterConfig::default(),
            ClusterConfig::default().with_max_cluster_depth(Some(20.0)),
        ];
        for config in configs {
            let slicing = config.slicing;
            let grid = ClusterGrid::new(1920, 1080, &config).unwrap();
            let cam = camera(16.0 / 9.0);
            let bounds = grid.compute_bounds(&cam);
            let range = grid.depth_range(&cam);
            let inv_proj = cam.proj.inverse();
            let screen = Vec2::new(1920.0, 1080.0);

            for py in (0..1080).step_by(37) {
                for px in (0..1920).step_by(41) {
                    let pixel = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                    let ray = screen_to_view_ray(screen, inv_proj, pixel);
                    for step in 0..=24 {
                        let t = step as f32 / 24.0;
                        let depth = cam.near + (cam.far - cam.near) * t;
                        let point = ray * depth;
                        let coord = grid.cluster_for_fragment(pixel.x, pixel.y, depth, range);
                        let aabb = bounds[grid.index(coord)];
                        assert!(
                            aabb.contains(point, 1e-3 * depth),
                            "{slicing:?}: {point:?} at pixel {pixel:?} escapes cluster {coord:?} {aabb:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn capped_grid_still_contains_distant_point() {
        // Depth 50 with a 20-unit cap lands in the last slice, which reaches the far plane
        let config = ClusterConfig::default().with_max_cluster_depth(Some(20.0));
        let grid = ClusterGrid::new(1920, 1080, &config).unwrap();
        let cam = camera(16.0 / 9.0);
        let bounds = grid.compute_bounds(&cam);
        let point = Vec3::new(0.0, 0.0, -50.0);
        assert!(bounds.iter().any(|aabb| aabb.contains(point, 1e-3)));

        let range = grid.depth_range(&cam);
        let coord = grid.cluster_for_fragment(960.0, 540.0, 50.0, range);
        assert_eq!(coord.z, grid.num_z - 1);
        assert!(bounds[grid.index(coord)].intersects_sphere(point, 0.5));
    }

    #[test]
    fn neighbouring_clusters_share_faces() {
        let grid = hd_grid();
        let cam = camera(16.0 / 9.0);
        let bounds = grid.compute_bounds(&cam);
        // Consecutive slices of the same tile meet at the shared boundary depth
        for z in 0..grid.num_z - 1 {
            let a = bounds[grid.index(ClusterCoord::new(10, 6, z))];
            let b = bounds[grid.index(ClusterCoord::new(10, 6, z + 1))];
            assert!((a.min.z - b.max.z).abs() < 1e-4 * a.min.z.abs().max(1.0));
        }
    }

    #[test]
    fn resize_round_trip_reproduces_grid() {
        let config = ClusterConfig::default();
        let cam_hd = camera(1920.0 / 1080.0);
        let original = ClusterGrid::new(1920, 1080, &config).unwrap();
        let before = original.compute_bounds(&cam_hd);

        let resized = ClusterGrid::new(800, 600, &config).unwrap();
        assert_eq!(resized.dimensions(), UVec3::new(9, 7, 8));
        let _ = resized.compute_bounds(&camera(800.0 / 600.0));

        let restored = ClusterGrid::new(1920, 1080, &config).unwrap();
        assert_eq!(restored.dimensions(), original.dimensions());
        let after = restored.compute_bounds(&cam_hd);
        assert!(before.iter().zip(&after).all(|(a, b)| a.abs_diff_eq(b, 1e-6)));
    }

    #[test]
    fn sphere_intersection_touching_counts() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.intersects_sphere(Vec3::splat(0.5), 0.01));
        assert!(aabb.intersects_sphere(Vec3::new(2.0, 0.5, 0.5), 1.0));
        assert!(!aabb.intersects_sphere(Vec3::new(2.0, 0.5, 0.5), 0.99));
        assert!(!aabb.intersects_sphere(Vec3::new(2.0, 2.0, 2.0), 1.5));
    }
}
