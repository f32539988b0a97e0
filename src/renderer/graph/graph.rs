//! Render Graph Executor
//!
//! Holds the nodes scheduled for one frame, in plan order, and drives them
//! through `prepare` and `run`.
//!
//! # Execution model
//! - Linear, strictly sequential: node *n + 1* records after node *n*
//! - One `CommandEncoder` for the whole frame and one submit
//! - Each node records inside its own debug group
//!
//! wgpu tracks resource usage inside the encoder and inserts the barrier
//! between a compute write and a later read of the same texture, so passes
//! need no explicit synchronization.

use smallvec::SmallVec;

use super::context::{ExecuteContext, PrepareContext};
use super::node::RenderNode;
use super::plan::PlannedPass;

pub struct RenderGraph<'a> {
    nodes: SmallVec<[(&'a PlannedPass, &'a mut dyn RenderNode); 16]>,
}

impl Default for RenderGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderGraph<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: SmallVec::new() }
    }

    /// Appends a node. Nodes execute in insertion order.
    #[inline]
    pub fn add_node(&mut self, pass: &'a PlannedPass, node: &'a mut dyn RenderNode) {
        self.nodes.push((pass, node));
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.nodes.iter().map(|(_, node)| node.name())
    }

    /// Prepares every node. `base.pass` is replaced per node.
    pub fn prepare(&mut self, base: &PrepareContext<'_>) {
        for (pass, node) in &mut self.nodes {
            let ctx = PrepareContext { pass: *pass, ..*base };
            node.prepare(&ctx);
        }
    }

    /// Records every node into one encoder and submits it.
    pub fn execute(&self, device: &wgpu::Device, queue: &wgpu::Queue, ctx: &ExecuteContext) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Graph Encoder"),
        });

        for (_, node) in &self.nodes {
            encoder.push_debug_group(node.name());
            node.run(ctx, &mut encoder);
            encoder.pop_debug_group();
        }

        queue.submit(std::iter::once(encoder.finish()));
    }
}
