//! Built-in render passes, in frame order.

pub mod ao;
pub mod bloom;
pub mod debug_output;
pub mod final_composite;
pub mod geometry;
pub mod lighting;
pub mod shadow;
pub mod skybox;
pub mod smaa;
pub mod taa;
pub mod transparent;

pub use ao::{AoTargets, GtaoPass, SsaoPass};
pub use bloom::{BloomPass, BloomTargets, max_bloom_range};
pub use debug_output::DebugOutputPass;
pub use final_composite::FinalCompositePass;
pub use geometry::GeometryPass;
pub use lighting::LightingPass;
pub use shadow::ShadowPass;
pub use skybox::SkyboxPass;
pub use smaa::{SmaaLookup, SmaaPass, SmaaTargets};
pub use taa::{TaaHistory, TaaPass};
pub use transparent::{SortedDraw, TransparentPass, sort_back_to_front};

use crate::renderer::shader::{ShaderContext, ShaderLibrary};
use crate::renderer::uniforms::FrameResources;

/// Construction inputs shared by every pass.
pub struct PassSetup<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub shaders: &'a ShaderLibrary,
    pub context: &'a ShaderContext,
    pub frame: &'a FrameResources,
    /// Host vertex layouts for scene meshes.
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'static>],
    /// Layout of the bind group `DrawMesh::bind_material` sets.
    pub material_layout: &'a wgpu::BindGroupLayout,
    pub surface_format: wgpu::TextureFormat,
}
