//! BRDF Lookup Table
//!
//! The split-sum approximation for image-based specular lighting needs a 2D
//! table of `(scale, bias)` pairs indexed by `N·V` (x axis) and roughness
//! (y axis). The table depends on nothing but its size, so it is computed
//! once and cached to disk as a 16-bit PNG (R = scale, G = bias, B unused).
//! The cache is an optimization only: any read failure regenerates it.

use std::path::Path;

use glam::{Vec2, Vec3};
use image::{ImageBuffer, Rgb};

use crate::errors::{LanternError, Result};

/// Default table edge length.
pub const BRDF_LUT_SIZE: u32 = 128;

/// Importance samples per texel when generating.
pub const BRDF_LUT_SAMPLES: u32 = 256;

pub const BRDF_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

#[derive(Debug, Clone, PartialEq)]
pub struct BrdfLut {
    size: u32,
    /// Row-major, `data[roughness_row * size + n_dot_v_col]`.
    data: Vec<[f32; 2]>,
}

impl BrdfLut {
    /// Integrates the table on the CPU.
    #[must_use]
    pub fn generate(size: u32, samples: u32) -> Self {
        let size = size.max(1);
        let samples = samples.max(1);
        let mut data = Vec::with_capacity((size * size) as usize);
        for row in 0..size {
            let roughness = (row as f32 + 0.5) / size as f32;
            for col in 0..size {
                let n_dot_v = (col as f32 + 0.5) / size as f32;
                data.push(integrate(n_dot_v, roughness, samples));
            }
        }
        Self { size, data }
    }

    /// Reads a cached table. The image must be `size × size`.
    pub fn load(path: impl AsRef<Path>, size: u32) -> Result<Self> {
        let image = image::open(path.as_ref())?.into_rgb16();
        let (width, height) = image.dimensions();
        if width != size || height != size {
            return Err(LanternError::LookupTextureMismatch {
                expected: size,
                width,
                height,
            });
        }
        let data = image
            .pixels()
            .map(|p| [f32::from(p.0[0]) / 65535.0, f32::from(p.0[1]) / 65535.0])
            .collect();
        Ok(Self { size, data })
    }

    /// Writes the table as a 16-bit PNG.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw: Vec<u16> = self
            .data
            .iter()
            .flat_map(|[scale, bias]| [quantize(*scale), quantize(*bias), 0])
            .collect();
        let image: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::from_raw(self.size, self.size, raw)
            .ok_or_else(|| LanternError::LookupTextureMismatch {
                expected: self.size,
                width: self.size,
                height: self.data.len() as u32 / self.size.max(1),
            })?;
        image.save(path.as_ref())?;
        Ok(())
    }

    /// Loads the cache at `path`, regenerating and rewriting it when it is
    /// missing or unusable. Without a path the table is always generated.
    pub fn load_or_generate(path: Option<&Path>, size: u32) -> Self {
        let Some(path) = path else {
            return Self::generate(size, BRDF_LUT_SAMPLES);
        };

        match Self::load(path, size) {
            Ok(lut) => {
                log::info!("Loaded BRDF LUT cache from {}", path.display());
                lut
            }
            Err(err) => {
                log::info!("BRDF LUT cache unusable ({err}), regenerating {}", path.display());
                let lut = Self::generate(size, BRDF_LUT_SAMPLES);
                if let Err(err) = lut.save(path) {
                    log::warn!("Failed to write BRDF LUT cache {}: {err}", path.display());
                }
                lut
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Nearest-texel lookup.
    #[must_use]
    pub fn sample(&self, n_dot_v: f32, roughness: f32) -> [f32; 2] {
        let max = self.size - 1;
        let col = ((n_dot_v.clamp(0.0, 1.0) * self.size as f32) as u32).min(max);
        let row = ((roughness.clamp(0.0, 1.0) * self.size as f32) as u32).min(max);
        self.data[(row * self.size + col) as usize]
    }

    /// Uploads the table as an `Rg16Float` texture and returns its view.
    #[must_use]
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: self.size,
            height: self.size,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("BRDF LUT"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: BRDF_LUT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texels: Vec<u16> = self
            .data
            .iter()
            .flat_map(|[scale, bias]| {
                [half::f16::from_f32(*scale).to_bits(), half::f16::from_f32(*bias).to_bits()]
            })
            .collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.size * 4),
                rows_per_image: Some(self.size),
            },
            size,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

fn quantize(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

fn importance_sample_ggx(xi: Vec2, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = std::f32::consts::TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

fn geometry_schlick_ggx(n_dot: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot / (n_dot * (1.0 - k) + k)
}

fn integrate(n_dot_v: f32, roughness: f32, samples: u32) -> [f32; 2] {
    // tangent space, N = +Z
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let (mut scale, mut bias) = (0.0, 0.0);
    for i in 0..samples {
        let h = importance_sample_ggx(hammersley(i, samples), roughness);
        let l = 2.0 * v.dot(h) * h - v;
        let n_dot_l = l.z.max(0.0);
        if n_dot_l <= 0.0 {
            continue;
        }
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);
        let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
        let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(1e-6);
        let fc = (1.0 - v_dot_h).powi(5);
        scale += (1.0 - fc) * g_vis;
        bias += fc * g_vis;
    }
    [scale / samples as f32, bias / samples as f32]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_head_on_reflects_everything() {
        let lut = BrdfLut::generate(16, 128);
        let [scale, bias] = lut.sample(1.0, 0.0);
        assert!((scale + bias - 1.0).abs() < 0.05, "scale {scale} + bias {bias}");
    }

    #[test]
    fn values_stay_in_unit_range() {
        let lut = BrdfLut::generate(8, 64);
        for texel in &lut.data {
            assert!(texel.iter().all(|v| (0.0..=1.0001).contains(v)), "{texel:?}");
        }
    }
}
