//! Cluster readback for diagnostics collaborators
//!
//! Overflow never fails a frame. The binning shader counts clusters that had
//! to drop lights in a reserved header word, and a [`ClusterSnapshot`] is how
//! that count (and the lists themselves) leave the GPU.

use crate::binning::ClusterLightLists;
use crate::layout::{read_cluster_header, CLUSTER_HEADER_SIZE};
use crate::{Error, Result};

/// Decoded copy of the cluster buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub dimensions: [u32; 3],
    pub max_lights_per_cluster: u32,
    pub lists: ClusterLightLists,
}

impl ClusterSnapshot {
    /// Decode a full cluster buffer (header plus records)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = read_cluster_header(bytes)?;
        let records = &bytes[CLUSTER_HEADER_SIZE as usize..];
        if records.len() % 4 != 0 {
            return Err(Error::Readback(format!(
                "cluster records are {} bytes, not a whole number of words",
                records.len()
            )));
        }
        let words: Vec<u32> = records
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        let lists = ClusterLightLists::from_records(&header, &words)?;

        Ok(Self {
            dimensions: [header.num_x, header.num_y, header.num_z],
            max_lights_per_cluster: header.max_lights_per_cluster,
            lists,
        })
    }

    pub fn cluster_count(&self) -> usize {
        self.lists.cluster_count()
    }

    /// Clusters that truncated their light list this frame
    pub fn overflow_count(&self) -> u32 {
        self.lists.overflow_count()
    }

    pub fn lights(&self, cluster: usize) -> &[u32] {
        self.lists.lights(cluster)
    }

    /// Clusters holding at least one light
    pub fn occupied_clusters(&self) -> usize {
        self.lists.iter().filter(|l| !l.is_empty()).count()
    }

    /// Longest list in the snapshot
    pub fn max_occupancy(&self) -> usize {
        self.lists.iter().map(<[u32]>::len).max().unwrap_or(0)
    }
}
