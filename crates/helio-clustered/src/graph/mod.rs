//! Render graph with explicit barrier edges
//!
//! Passes declare which resources they read and write. Every write feeding a
//! later read becomes a [`Barrier`] edge; the execution order is a topological
//! sort of those edges that falls back to registration order between
//! independent passes, so the same set of passes always runs the same way.

mod pass;
mod resource;

pub use pass::{PassContext, RenderPass};
pub use resource::{Access, Barrier, Hazard, PassId, ResourceHandle};

use crate::mesh::DrawCall;
use crate::resources::FrameResources;
use crate::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Render graph for automatic pass ordering
pub struct RenderGraph {
    passes: Vec<PassNode>,
    edges: DiGraph<PassId, Barrier>,
    execution_order: Vec<usize>,
    built: bool,
}

struct PassNode {
    pass: Box<dyn RenderPass>,
    accesses: Vec<(ResourceHandle, Access)>,
    node: NodeIndex,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            edges: DiGraph::new(),
            execution_order: Vec::new(),
            built: false,
        }
    }

    /// Add a pass to the graph
    pub fn add_pass(&mut self, pass: impl RenderPass + 'static) -> PassId {
        let id = PassId(self.passes.len());

        let mut builder = PassResourceBuilder::new();
        pass.declare_resources(&mut builder);

        let node = self.edges.add_node(id);
        self.passes.push(PassNode {
            pass: Box::new(pass),
            accesses: builder.accesses,
            node,
        });
        self.built = false;
        id
    }

    /// Build the graph - resolve barrier edges and the execution order
    pub fn build(&mut self) -> Result<()> {
        log::info!("Building render graph with {} passes", self.passes.len());

        self.edges.clear_edges();
        for barrier in self.collect_barriers() {
            let from = self.passes[barrier.producer.0].node;
            let to = self.passes[barrier.consumer.0].node;
            self.edges.add_edge(from, to, barrier);
        }

        if petgraph::algo::is_cyclic_directed(&self.edges) {
            let names: Vec<&str> = self.passes.iter().map(|p| p.pass.name()).collect();
            return Err(Error::Graph(format!(
                "cyclic dependency between passes {names:?}"
            )));
        }

        // Kahn's algorithm, lowest registration index first among ready passes
        let mut in_degree: Vec<usize> = self
            .passes
            .iter()
            .map(|p| self.edges.neighbors_directed(p.node, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.passes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for next in self.edges.neighbors_directed(self.passes[index].node, Direction::Outgoing) {
                let PassId(next) = self.edges[next];
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() != self.passes.len() {
            return Err(Error::Graph("render graph could not be fully ordered".into()));
        }

        self.execution_order = order;
        self.built = true;

        for (i, &pass_idx) in self.execution_order.iter().enumerate() {
            log::debug!("  Pass {}: {}", i, self.passes[pass_idx].pass.name());
        }
        for barrier in self.edges.edge_weights() {
            log::debug!(
                "  Barrier {:?}: {} -> {} on {}",
                barrier.hazard,
                self.passes[barrier.producer.0].pass.name(),
                self.passes[barrier.consumer.0].pass.name(),
                barrier.resource.name()
            );
        }

        log::info!("Render graph built successfully");
        Ok(())
    }

    fn collect_barriers(&self) -> Vec<Barrier> {
        let mut writers: HashMap<ResourceHandle, Vec<usize>> = HashMap::new();
        for (i, pass) in self.passes.iter().enumerate() {
            for &(resource, access) in &pass.accesses {
                if access.contains(Access::WRITE) {
                    writers.entry(resource).or_default().push(i);
                }
            }
        }

        let mut barriers = Vec::new();

        // Writers of the same resource run in registration order
        for (&resource, list) in &writers {
            for pair in list.windows(2) {
                barriers.push(Barrier {
                    producer: PassId(pair[0]),
                    consumer: PassId(pair[1]),
                    resource,
                    hazard: Hazard::WriteAfterWrite,
                });
            }
        }

        // Every pure read waits for every writer, wherever it was registered
        for (i, pass) in self.passes.iter().enumerate() {
            for &(resource, access) in &pass.accesses {
                if access != Access::READ {
                    continue;
                }
                for &writer in writers.get(&resource).map(Vec::as_slice).unwrap_or(&[]) {
                    if writer != i {
                        barriers.push(Barrier {
                            producer: PassId(writer),
                            consumer: PassId(i),
                            resource,
                            hazard: Hazard::ReadAfterWrite,
                        });
                    }
                }
            }
        }

        barriers.sort_by_key(|b| (b.producer, b.consumer, b.resource.name()));
        barriers
    }

    /// Execute the passes in dependency order
    pub fn execute(&mut self, ctx: &mut GraphContext) -> Result<()> {
        if !self.built {
            return Err(Error::Graph("render graph executed before build()".into()));
        }

        log::trace!("Executing render graph (frame {})", ctx.frame_index);

        for &pass_idx in &self.execution_order {
            let node = &mut self.passes[pass_idx];
            log::trace!("  Executing pass: {}", node.pass.name());

            let mut pass_ctx = PassContext {
                encoder: &mut *ctx.encoder,
                frame: ctx.frame,
                target: ctx.target,
                camera_bind_group: ctx.camera_bind_group,
                draws: ctx.draws,
            };
            node.pass.execute(&mut pass_ctx)?;
        }

        Ok(())
    }

    /// Pass names in the order they execute
    pub fn execution_order(&self) -> Vec<&str> {
        self.execution_order
            .iter()
            .map(|&i| self.passes[i].pass.name())
            .collect()
    }

    /// Barrier edges resolved by the last `build()`
    pub fn barriers(&self) -> Vec<Barrier> {
        self.edges.edge_weights().copied().collect()
    }

    pub fn pass_name(&self, id: PassId) -> Option<&str> {
        self.passes.get(id.0).map(|p| p.pass.name())
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

/// Context for graph execution
pub struct GraphContext<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub frame: &'a FrameResources,
    pub target: &'a wgpu::TextureView,
    pub camera_bind_group: &'a wgpu::BindGroup,
    pub draws: &'a [DrawCall],
    pub frame_index: u64,
}

/// Builder for declaring pass resource dependencies
pub struct PassResourceBuilder {
    accesses: Vec<(ResourceHandle, Access)>,
}

impl PassResourceBuilder {
    fn new() -> Self {
        Self { accesses: Vec::new() }
    }

    fn declare(&mut self, resource: ResourceHandle, access: Access) -> &mut Self {
        match self.accesses.iter_mut().find(|(r, _)| *r == resource) {
            Some((_, existing)) => *existing |= access,
            None => self.accesses.push((resource, access)),
        }
        self
    }

    /// Declare that this pass reads a resource
    pub fn read(&mut self, resource: ResourceHandle) -> &mut Self {
        self.declare(resource, Access::READ)
    }

    /// Declare that this pass writes to a resource
    pub fn write(&mut self, resource: ResourceHandle) -> &mut Self {
        self.declare(resource, Access::WRITE)
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stage {
        name: &'static str,
        reads: Vec<ResourceHandle>,
        writes: Vec<ResourceHandle>,
    }

    impl Stage {
        fn new(name: &'static str, reads: &[ResourceHandle], writes: &[ResourceHandle]) -> Self {
            Self { name, reads: reads.to_vec(), writes: writes.to_vec() }
        }
    }

    impl RenderPass for Stage {
        fn name(&self) -> &str {
            self.name
        }

        fn declare_resources(&self, builder: &mut PassResourceBuilder) {
            for &r in &self.reads {
                builder.read(r);
            }
            for &w in &self.writes {
                builder.write(w);
            }
        }

        fn execute(&mut self, _ctx: &mut PassContext) -> Result<()> {
            Ok(())
        }
    }

    use ResourceHandle as R;

    fn bounds() -> Stage {
        Stage::new("cluster_bounds", &[], &[R::CLUSTER_BOUNDS])
    }
    fn binning() -> Stage {
        Stage::new("light_binning", &[R::LIGHT_SET, R::CLUSTER_BOUNDS], &[R::CLUSTER_SET])
    }
    fn gbuffer() -> Stage {
        Stage::new("gbuffer", &[], &[R::GBUFFER_NORMAL, R::GBUFFER_ALBEDO, R::GBUFFER_DEPTH])
    }
    fn shading() -> Stage {
        Stage::new(
            "shading",
            &[R::LIGHT_SET, R::CLUSTER_SET, R::GBUFFER_NORMAL, R::GBUFFER_ALBEDO, R::GBUFFER_DEPTH],
            &[R::SURFACE],
        )
    }

    #[test]
    fn frame_stages_run_in_pipeline_order() {
        let mut graph = RenderGraph::new();
        graph.add_pass(bounds());
        graph.add_pass(binning());
        graph.add_pass(gbuffer());
        graph.add_pass(shading());
        graph.build().unwrap();

        assert_eq!(
            graph.execution_order(),
            vec!["cluster_bounds", "light_binning", "gbuffer", "shading"]
        );
    }

    #[test]
    fn order_respects_edges_regardless_of_registration() {
        let mut graph = RenderGraph::new();
        graph.add_pass(shading());
        graph.add_pass(binning());
        graph.add_pass(gbuffer());
        graph.add_pass(bounds());
        graph.build().unwrap();

        let order = graph.execution_order();
        let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(pos("cluster_bounds") < pos("light_binning"));
        assert!(pos("light_binning") < pos("shading"));
        assert!(pos("gbuffer") < pos("shading"));

        for barrier in graph.barriers() {
            let producer = graph.pass_name(barrier.producer).unwrap();
            let consumer = graph.pass_name(barrier.consumer).unwrap();
            assert!(pos(producer) < pos(consumer));
        }
    }

    #[test]
    fn barriers_name_the_shared_resource() {
        let mut graph = RenderGraph::new();
        let b = graph.add_pass(bounds());
        let l = graph.add_pass(binning());
        let g = graph.add_pass(gbuffer());
        let s = graph.add_pass(shading());
        graph.build().unwrap();

        let barriers = graph.barriers();
        let has = |producer, consumer, resource| {
            barriers.iter().any(|x| {
                x.producer == producer
                    && x.consumer == consumer
                    && x.resource == resource
                    && x.hazard == Hazard::ReadAfterWrite
            })
        };
        assert!(has(b, l, R::CLUSTER_BOUNDS));
        assert!(has(l, s, R::CLUSTER_SET));
        assert!(has(g, s, R::GBUFFER_DEPTH));
        // The light set is written outside the graph, so nothing orders on it
        assert!(!barriers.iter().any(|x| x.resource == R::LIGHT_SET));
        assert_eq!(barriers.len(), 5);
    }

    #[test]
    fn cycles_are_rejected() {
        let a = R::named("a");
        let b = R::named("b");
        let mut graph = RenderGraph::new();
        graph.add_pass(Stage::new("first", &[a], &[b]));
        graph.add_pass(Stage::new("second", &[b], &[a]));
        assert!(matches!(graph.build(), Err(Error::Graph(_))));
    }

    #[test]
    fn repeated_writers_keep_registration_order() {
        let target = R::named("target");
        let mut graph = RenderGraph::new();
        graph.add_pass(Stage::new("late_reader", &[target], &[]));
        graph.add_pass(Stage::new("clear", &[], &[target]));
        graph.add_pass(Stage::new("overlay", &[], &[target]));
        graph.build().unwrap();

        assert_eq!(graph.execution_order(), vec!["clear", "overlay", "late_reader"]);
        assert!(graph
            .barriers()
            .iter()
            .any(|b| b.hazard == Hazard::WriteAfterWrite && b.producer == PassId(1) && b.consumer == PassId(2)));
    }

    #[test]
    fn read_then_write_merges_into_one_access() {
        let mut builder = PassResourceBuilder::new();
        builder.read(R::SURFACE).write(R::SURFACE);
        assert_eq!(builder.accesses, vec![(R::SURFACE, Access::READ | Access::WRITE)]);
    }
}
