//! Frame Graph
//!
//! - [`plan`]: which stages run this frame and what they read and write
//! - [`resource`]: logical resource names and the per-frame handle table
//! - [`node`] / [`context`]: the pass contract and its phase contexts
//! - [`graph`]: sequential executor over the scheduled nodes
//! - [`targets`]: images provisioned for the optional stages a plan selects
//! - [`passes`]: the concrete stages

pub mod context;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod node;
pub mod passes;
pub mod plan;
pub mod resource;
pub mod shadow_utils;
pub mod targets;

pub use context::{ExecuteContext, PrepareContext, ResizeContext};
pub use graph::RenderGraph;
pub use node::RenderNode;
pub use plan::{FramePlan, PassId, PlanError, PlannedPass};
pub use resource::{GraphResource, ResourceTable};
pub use shadow_utils::{ShadowTile, ShadowTileAllocator};
pub use targets::FrameTargets;
