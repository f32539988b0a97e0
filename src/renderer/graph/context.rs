//! Render Graph Contexts
//!
//! Three phase-separated views of the renderer state:
//!
//! - [`ResizeContext`]: exclusive access to the resource pool, used when the
//!   output extent changes or a pass needs storage for the first time.
//! - [`PrepareContext`]: shared access to everything a pass reads this frame,
//!   plus the device and queue for bind groups and uploads.
//! - [`ExecuteContext`]: shared access for command recording.
//!
//! Passes borrow pool textures through these contexts for one call and
//! never store the resolved references.

use slotmap::SlotMap;

use super::plan::PlannedPass;
use super::resource::{GraphResource, ResourceTable};
use super::targets::FrameTargets;
use crate::renderer::resources::{GpuTexture, ResourcePool};
use crate::renderer::uniforms::FrameResources;
use crate::scene::{CameraSnapshot, Environment, Light, LightKey, SceneSource};
use crate::settings::RenderSettings;

// ─── Resize ───────────────────────────────────────────────────────────────────

pub struct ResizeContext<'a> {
    pub device: &'a wgpu::Device,
    pub pool: &'a mut ResourcePool<GpuTexture>,
    pub width: u32,
    pub height: u32,
}

// ─── Prepare ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct PrepareContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub pool: &'a ResourcePool<GpuTexture>,
    pub table: &'a ResourceTable,
    /// Provisioned for this frame's plan.
    pub targets: &'a FrameTargets,
    pub frame: &'a FrameResources,
    /// Snapshot taken at frame start.
    pub settings: &'a RenderSettings,
    pub scene: &'a dyn SceneSource,
    pub camera: &'a CameraSnapshot,
    pub lights: &'a SlotMap<LightKey, Light>,
    pub environment: &'a Environment,
    pub width: u32,
    pub height: u32,
    /// The plan entry of the node being prepared.
    pub pass: &'a PlannedPass,
}

impl<'a> PrepareContext<'a> {
    /// Sampling view of a table resource.
    #[inline]
    #[must_use]
    pub fn view(&self, resource: GraphResource) -> Option<&'a wgpu::TextureView> {
        self.table.view(self.pool, resource)
    }

    #[inline]
    #[must_use]
    pub fn texture(&self, resource: GraphResource) -> Option<&'a GpuTexture> {
        self.table.texture(self.pool, resource)
    }

    /// View of the color image this node reads, for post-processing stages.
    #[must_use]
    pub fn color_input(&self) -> Option<&'a wgpu::TextureView> {
        self.view(self.pass.color_input?)
    }
}

// ─── Execute ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct ExecuteContext<'a> {
    pub pool: &'a ResourcePool<GpuTexture>,
    pub table: &'a ResourceTable,
    pub targets: &'a FrameTargets,
    pub frame: &'a FrameResources,
    pub scene: &'a dyn SceneSource,
    pub width: u32,
    pub height: u32,
    /// Presentation target; only the final stage writes it.
    pub surface: &'a wgpu::TextureView,
}

impl<'a> ExecuteContext<'a> {
    #[inline]
    #[must_use]
    pub fn texture(&self, resource: GraphResource) -> Option<&'a GpuTexture> {
        self.table.texture(self.pool, resource)
    }

    /// Attachment view (all aspects) of a table resource.
    #[inline]
    #[must_use]
    pub fn attachment(&self, resource: GraphResource) -> Option<&'a wgpu::TextureView> {
        self.texture(resource).map(|t| &t.view)
    }
}
