//! Shared helpers for the integration tests.

use lantern::renderer::resources::{TextureDesc, TextureFactory};

/// CPU stand-in for a device: the "texture" is its descriptor.
pub struct DescFactory;

impl TextureFactory for DescFactory {
    type Texture = TextureDesc;

    fn allocate_texture(&self, desc: &TextureDesc) -> TextureDesc {
        desc.clone()
    }
}
