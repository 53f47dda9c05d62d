//! Light binning
//!
//! CPU counterpart of `light_binning.wgsl`. Clusters are independent: each one
//! walks the active lights in index order and keeps the first
//! `max_lights_per_cluster` whose bounding sphere touches its AABB.

use crate::grid::{Aabb, ClusterGrid};
use crate::layout::{cluster_stride_words, ClusterSetHeader};
use crate::{Error, Result};
use glam::{Mat4, Vec3};

/// Per-cluster light index lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLightLists {
    max_lights_per_cluster: u32,
    lists: Vec<Vec<u32>>,
    overflow_count: u32,
}

impl ClusterLightLists {
    pub fn cluster_count(&self) -> usize {
        self.lists.len()
    }

    pub fn max_lights_per_cluster(&self) -> u32 {
        self.max_lights_per_cluster
    }

    /// Light indices bound to a cluster, in ascending order
    pub fn lights(&self, cluster: usize) -> &[u32] {
        self.lists.get(cluster).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.lists.iter().map(Vec::as_slice)
    }

    /// Clusters that had more intersecting lights than they could hold
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    pub fn total_entries(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Decode the per-cluster records that follow the cluster header
    pub fn from_records(header: &ClusterSetHeader, words: &[u32]) -> Result<Self> {
        let max = header.max_lights_per_cluster;
        let stride = cluster_stride_words(max) as usize;
        let required = header
            .cluster_count()
            .and_then(|count| Some((count, count.checked_mul(stride)?)))
            .filter(|&(_, total)| words.len() >= total);
        let Some((count, _)) = required else {
            return Err(Error::Layout {
                buffer: "cluster set",
                required: [header.num_y, header.num_z]
                    .iter()
                    .fold(header.num_x as u64, |acc, &n| acc.saturating_mul(n as u64))
                    .saturating_mul(stride as u64 * 4),
                actual: (words.len() * 4) as u64,
            });
        };

        let lists = words
            .chunks_exact(stride)
            .take(count)
            .enumerate()
            .map(|(cluster, record)| {
                let len = record[0];
                if len > max {
                    return Err(Error::Readback(format!(
                        "cluster {cluster} reports {len} lights, capacity is {max}"
                    )));
                }
                Ok(record[1..=len as usize].to_vec())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            max_lights_per_cluster: max,
            lists,
            overflow_count: header.overflow_count,
        })
    }
}

/// Bin world-space light positions into clusters
///
/// `bounds` come from [`ClusterGrid::compute_bounds`] for the same camera, and
/// `view` moves the lights into the view space those bounds live in.
pub fn bin_lights(
    grid: &ClusterGrid,
    bounds: &[Aabb],
    view: Mat4,
    positions: &[Vec3],
    radius: f32,
) -> ClusterLightLists {
    let max = grid.max_lights_per_cluster as usize;
    let centers: Vec<Vec3> = positions.iter().map(|&p| view.transform_point3(p)).collect();

    let mut overflow_count = 0;
    let lists = bounds
        .iter()
        .map(|aabb| {
            let mut list = Vec::new();
            for (index, &center) in centers.iter().enumerate() {
                if !aabb.intersects_sphere(center, radius) {
                    continue;
                }
                if list.len() == max {
                    overflow_count += 1;
                    break;
                }
                list.push(index as u32);
            }
            list
        })
        .collect();

    ClusterLightLists {
        max_lights_per_cluster: grid.max_lights_per_cluster,
        lists,
        overflow_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::config::ClusterConfig;
    use crate::grid::ClusterCoord;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn setup() -> (ClusterGrid, Camera, Vec<Aabb>) {
        let grid = ClusterGrid::new(1920, 1080, &ClusterConfig::default()).unwrap();
        let camera = Camera::new(
            Mat4::IDENTITY,
            Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 100.0),
            0.1,
            100.0,
        );
        let bounds = grid.compute_bounds(&camera);
        (grid, camera, bounds)
    }

    #[test]
    fn corrupt_header_is_rejected_without_wrapping() {
        let header = ClusterSetHeader {
            num_x: u32::MAX,
            num_y: u32::MAX,
            num_z: u32::MAX,
            max_lights_per_cluster: 4,
            overflow_count: 0,
            _reserved: [0; 3],
        };
        let err = ClusterLightLists::from_records(&header, &[0; 64]).unwrap_err();
        assert!(matches!(err, Error::Layout { actual: 256, .. }));
    }

    #[test]
    fn no_lights_means_empty_clusters() {
        let (grid, camera, bounds) = setup();
        let lists = bin_lights(&grid, &bounds, camera.view, &[], 2.0);
        assert_eq!(lists.cluster_count(), 1920);
        assert_eq!(lists.total_entries(), 0);
        assert_eq!(lists.overflow_count(), 0);
    }

    #[test]
    fn light_in_corner_cluster_only() {
        let (grid, camera, bounds) = setup();
        let corner = bounds[grid.index(ClusterCoord::new(0, 0, 0))];
        // Hug the faces no neighbour shares: far left, top, and the near plane
        let e = 0.004;
        let light = Vec3::new(corner.min.x + e, corner.max.y - e, corner.max.z - e);

        let lists = bin_lights(&grid, &bounds, camera.view, &[light], e * 0.5);
        assert_eq!(lists.lights(0), &[0]);
        for cluster in 1..lists.cluster_count() {
            assert!(lists.lights(cluster).is_empty(), "cluster {cluster} picked up the light");
        }
    }

    #[test]
    fn overflow_keeps_lowest_indices() {
        let (grid, camera, bounds) = setup();
        let target = grid.index(ClusterCoord::new(10, 6, 3));
        let center = bounds[target].center();
        let positions = vec![center; 10_000];

        let lists = bin_lights(&grid, &bounds, camera.view, &positions, 2.0);
        let expected: Vec<u32> = (0..500).collect();
        assert_eq!(lists.lights(target), expected.as_slice());
        assert!(lists.overflow_count() >= 1);
        assert!(lists.iter().all(|l| l.len() <= 500));
    }

    #[test]
    fn membership_matches_sphere_test() {
        let (grid, _, _) = setup();
        let camera = Camera::perspective(
            Vec3::new(0.0, 8.0, 18.0),
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::Y,
            std::f32::consts::FRAC_PI_3,
            16.0 / 9.0,
            0.1,
            100.0,
        );
        let bounds = grid.compute_bounds(&camera);

        let mut rng = StdRng::seed_from_u64(7);
        let positions: Vec<Vec3> = (0..1000)
            .map(|_| Vec3::new(rng.gen_range(-14.0..14.0), rng.gen_range(0.0..20.0), rng.gen_range(-6.0..6.0)))
            .collect();

        let lists = bin_lights(&grid, &bounds, camera.view, &positions, 2.0);
        for (cluster, aabb) in bounds.iter().enumerate() {
            let hits: Vec<u32> = positions
                .iter()
                .enumerate()
                .filter(|(_, p)| aabb.intersects_sphere(camera.view.transform_point3(**p), 2.0))
                .map(|(i, _)| i as u32)
                .collect();
            let kept = hits.len().min(500);
            assert_eq!(lists.lights(cluster), &hits[..kept]);
        }
    }

    #[test]
    fn binning_is_idempotent() {
        let (grid, camera, bounds) = setup();
        let mut rng = StdRng::seed_from_u64(11);
        let positions: Vec<Vec3> = (0..2000)
            .map(|_| Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-3.0..3.0), rng.gen_range(-20.0..-0.5)))
            .collect();
        let first = bin_lights(&grid, &bounds, camera.view, &positions, 2.0);
        let second = bin_lights(&grid, &bounds, camera.view, &positions, 2.0);
        assert_eq!(first, second);
    }

    #[test]
    fn records_decode_like_the_gpu_writes_them() {
        let grid = ClusterGrid::new(96, 96, &ClusterConfig::default().with_slices(2).with_max_lights_per_cluster(3)).unwrap();
        let mut header = ClusterSetHeader::for_grid(&grid);
        header.overflow_count = 1;
        let words = [2, 4, 9, 0, 3, 1, 2, 3];
        let lists = ClusterLightLists::from_records(&header, &words).unwrap();
        assert_eq!(lists.lights(0), &[4, 9]);
        assert_eq!(lists.lights(1), &[1, 2, 3]);
        assert_eq!(lists.overflow_count(), 1);

        let corrupt = [7, 0, 0, 0, 0, 0, 0, 0];
        assert!(ClusterLightLists::from_records(&header, &corrupt).is_err());
        assert!(ClusterLightLists::from_records(&header, &words[..4]).is_err());
    }
}
