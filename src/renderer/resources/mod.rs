//! Render-target resources: the texture pool and the grouped images built
//! on top of it.

pub mod brdf_lut;
pub mod gbuffer;
pub mod history;
pub mod pool;

pub use brdf_lut::BrdfLut;
pub use gbuffer::{GBuffer, GBufferTarget};
pub use history::PingPong;
pub use pool::{
    AttachmentMask, AttachmentSet, GpuTexture, ResourcePool, TextureDesc, TextureFactory, TextureHandle,
};
