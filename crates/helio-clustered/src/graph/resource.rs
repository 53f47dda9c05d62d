//! Resource handles and access declarations for graph edges

/// Pass identifier (insertion index)
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PassId(pub usize);

/// Named GPU resource a pass touches
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct ResourceHandle(&'static str);

impl ResourceHandle {
    pub const LIGHT_SET: Self = Self::named("light_set");
    pub const CLUSTER_BOUNDS: Self = Self::named("cluster_bounds");
    pub const CLUSTER_SET: Self = Self::named("cluster_set");
    pub const GBUFFER_NORMAL: Self = Self::named("gbuffer_normal");
    pub const GBUFFER_ALBEDO: Self = Self::named("gbuffer_albedo");
    pub const GBUFFER_DEPTH: Self = Self::named("gbuffer_depth");
    pub const SURFACE: Self = Self::named("surface");

    /// Create a named resource handle (deterministic)
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

bitflags::bitflags! {
    /// How a pass uses a resource
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// Hazard a barrier edge resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hazard {
    /// Consumer reads what the producer wrote
    ReadAfterWrite,
    /// Both write; the later registration wins
    WriteAfterWrite,
}

/// Dependency edge between two passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Barrier {
    pub producer: PassId,
    pub consumer: PassId,
    pub resource: ResourceHandle,
    pub hazard: Hazard,
}
