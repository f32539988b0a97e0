//! Environment lighting maps.
//!
//! Cubemap decoding and convolution happen on the host; the renderer only
//! samples the results:
//!
//! | Map | Dimension | Consumer |
//! |-----|-----------|----------|
//! | `skybox` | Cube | skybox composite |
//! | `irradiance` | Cube | diffuse IBL (lighting, transparency) |
//! | `prefiltered` | Cube, one mip per roughness step | specular IBL |
//! | `brdf_lut` | 2D Rg16Float | split-sum scale/bias |

use crate::errors::{LanternError, Result};
use crate::renderer::resources::brdf_lut::BrdfLut;

/// A complete set of image-based lighting inputs.
pub struct Environment {
    skybox: wgpu::TextureView,
    irradiance: wgpu::TextureView,
    prefiltered: wgpu::TextureView,
    prefiltered_mip_count: u32,
    brdf_lut: wgpu::TextureView,
}

impl Environment {
    /// Wraps host-provided cubemaps. Every cube must have exactly six layers.
    pub fn from_cubemaps(
        skybox: &wgpu::Texture,
        irradiance: &wgpu::Texture,
        prefiltered: &wgpu::Texture,
        brdf_lut: wgpu::TextureView,
    ) -> Result<Self> {
        for (name, texture) in [
            ("skybox", skybox),
            ("irradiance", irradiance),
            ("prefiltered", prefiltered),
        ] {
            let layers = texture.depth_or_array_layers();
            if layers != 6 {
                return Err(LanternError::EnvironmentError(format!(
                    "{name} cubemap has {layers} layers, expected 6"
                )));
            }
        }

        Ok(Self {
            skybox: cube_view(skybox, "Skybox Cube View"),
            irradiance: cube_view(irradiance, "Irradiance Cube View"),
            prefiltered: cube_view(prefiltered, "Prefiltered Cube View"),
            prefiltered_mip_count: prefiltered.mip_level_count(),
            brdf_lut,
        })
    }

    /// A black 1×1 environment so the lighting pass has valid bindings before
    /// the host loads a skybox.
    #[must_use]
    pub fn neutral(device: &wgpu::Device, queue: &wgpu::Queue, brdf_lut: &BrdfLut) -> Self {
        let black = black_cube(device, queue);
        Self {
            skybox: cube_view(&black, "Neutral Skybox View"),
            irradiance: cube_view(&black, "Neutral Irradiance View"),
            prefiltered: cube_view(&black, "Neutral Prefiltered View"),
            prefiltered_mip_count: 1,
            brdf_lut: brdf_lut.upload(device, queue),
        }
    }

    #[inline]
    #[must_use]
    pub fn skybox(&self) -> &wgpu::TextureView {
        &self.skybox
    }

    #[inline]
    #[must_use]
    pub fn irradiance(&self) -> &wgpu::TextureView {
        &self.irradiance
    }

    #[inline]
    #[must_use]
    pub fn prefiltered(&self) -> &wgpu::TextureView {
        &self.prefiltered
    }

    #[inline]
    #[must_use]
    pub fn prefiltered_mip_count(&self) -> u32 {
        self.prefiltered_mip_count
    }

    #[inline]
    #[must_use]
    pub fn brdf_lut(&self) -> &wgpu::TextureView {
        &self.brdf_lut
    }
}

fn cube_view(texture: &wgpu::Texture, label: &'static str) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

fn black_cube(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 6,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Neutral Environment Cube"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    // 6 faces × one Rgba16Float texel, alpha = 1
    let one = half::f16::ONE.to_bits();
    let texel = [0u16, 0, 0, one];
    let data: Vec<u16> = std::iter::repeat_n(texel, 6).flatten().collect();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&data),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(8),
            rows_per_image: Some(1),
        },
        size,
    );
    texture
}
