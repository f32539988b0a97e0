//! Render Node Trait
//!
//! Every GPU stage of the frame implements [`RenderNode`]. The contract
//! follows the life cycle of a pass:
//!
//! - `resize`: (re)create the images the pass owns at a new extent
//! - `publish`: expose owned images to the frame's resource table
//! - `prepare`: build bind groups and upload per-frame parameters
//! - `run`: record commands, reading only what `prepare` left behind

use super::context::{ExecuteContext, PrepareContext, ResizeContext};
use super::resource::ResourceTable;

pub trait RenderNode {
    /// Debug-group label.
    fn name(&self) -> &'static str;

    fn resize(&mut self, _ctx: &mut ResizeContext) {}

    /// Registers the images this node owns and produces.
    fn publish(&self, _table: &mut ResourceTable) {}

    /// Mutable per-frame setup. Runs for scheduled nodes only.
    fn prepare(&mut self, _ctx: &PrepareContext) {}

    /// Records GPU commands.
    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder);
}
