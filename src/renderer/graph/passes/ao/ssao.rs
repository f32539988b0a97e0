//! Screen Space Ambient Occlusion
//!
//! Two full-screen sub-passes, both stencil-masked to rasterized geometry
//! (`Equal` [`GEOMETRY_STENCIL_REF`]) against the G-buffer depth-stencil:
//!
//! 1. **Raw**: hemisphere kernel sampling around each G-buffer position,
//!    oriented by the normal and rotated by a 4×4 tiled noise texture.
//! 2. **Blur**: 4×4 box blur matching the noise tile, which removes the
//!    rotation pattern.
//!
//! Background pixels are never touched and keep the clear value of 1.0
//! (unoccluded).
//!
//! ```text
//!  Position ──┐      ┌──────────┐             ┌──────────┐
//!  Normal ────┼─────►│   Raw    │──► scratch ─►│   Blur   │──► Occlusion
//!  Noise 4×4 ─┘      └──────────┘             └──────────┘
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use super::SSAO_FORMAT;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::passes::PassSetup;
use crate::renderer::graph::resource::GraphResource;
use crate::renderer::pipeline::{
    color_attachment, float_texture_entry, fullscreen_pipeline, geometry_stencil_test, pipeline_layout,
    sampler_entry, uniform_entry,
};
use crate::renderer::resources::gbuffer::{GBUFFER_DEPTH_FORMAT, GEOMETRY_STENCIL_REF};
use crate::renderer::resources::GBufferTarget;
use crate::renderer::shader::names;

/// Hemisphere samples per pixel.
pub const SSAO_KERNEL_SIZE: usize = 64;

/// Side length of the tiled rotation noise.
pub const SSAO_NOISE_SIZE: u32 = 4;

const KERNEL_SEED: u64 = 42;
const NOISE_SEED: u64 = 12345;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SsaoUniforms {
    pub kernel: [Vec4; SSAO_KERNEL_SIZE],
    /// Screen extent divided by the noise tile size.
    pub noise_scale: Vec2,
    pub radius: f32,
    pub bias: f32,
}

// ============================================================================
// Kernel & noise generation
// ============================================================================

/// Hemisphere sample kernel (`z > 0`), denser near the origin.
///
/// Seeded, so every run and every renderer produces the same kernel.
#[must_use]
pub fn generate_ssao_kernel(samples: usize) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(KERNEL_SEED);
    let mut kernel = Vec::with_capacity(samples);

    for i in 0..samples {
        let mut sample = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(0.01..1.0),
        )
        .normalize();
        sample *= rng.random_range(0.0..1.0f32);

        // quadratic falloff toward the center
        let t = i as f32 / samples as f32;
        sample *= lerp(0.1, 1.0, t * t);

        kernel.push(sample.extend(0.0));
    }
    kernel
}

/// 4×4 RGBA8 rotation vectors in XY, remapped to `[0, 255]`.
#[must_use]
pub fn generate_ssao_noise() -> Vec<[u8; 4]> {
    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    (0..SSAO_NOISE_SIZE * SSAO_NOISE_SIZE)
        .map(|_| {
            let xy = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)).normalize_or(Vec2::X);
            [
                ((xy.x * 0.5 + 0.5) * 255.0) as u8,
                ((xy.y * 0.5 + 0.5) * 255.0) as u8,
                0,
                255,
            ]
        })
        .collect()
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[must_use]
pub fn noise_scale(width: u32, height: u32) -> Vec2 {
    Vec2::new(width as f32, height as f32) / SSAO_NOISE_SIZE as f32
}

// ============================================================================
// Pass
// ============================================================================

pub struct SsaoPass {
    raw_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    raw_layout: wgpu::BindGroupLayout,
    blur_layout: wgpu::BindGroupLayout,

    uniforms: SsaoUniforms,
    uniform_buffer: wgpu::Buffer,
    noise_view: wgpu::TextureView,
    noise_sampler: wgpu::Sampler,

    raw_bind_group: Option<wgpu::BindGroup>,
    blur_bind_group: Option<wgpu::BindGroup>,
}

impl SsaoPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;

        // Group 1: position, normal, noise, noise sampler, uniforms
        let raw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSAO Raw Layout"),
            entries: &[
                float_texture_entry(0, fragment, false),
                float_texture_entry(1, fragment, false),
                float_texture_entry(2, fragment, false),
                sampler_entry(3, fragment, wgpu::SamplerBindingType::NonFiltering),
                uniform_entry(4, fragment, None),
            ],
        });
        // Group 0: raw occlusion
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSAO Blur Layout"),
            entries: &[float_texture_entry(0, fragment, false)],
        });

        let targets = [Some(wgpu::ColorTargetState {
            format: SSAO_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let masked = Some(wgpu::DepthStencilState {
            format: GBUFFER_DEPTH_FORMAT,
            depth_write_enabled: Some(false),
            depth_compare: Some(wgpu::CompareFunction::Always),
            stencil: geometry_stencil_test(),
            bias: wgpu::DepthBiasState::default(),
        });

        let raw_module = setup.shaders.module(device, names::SSAO, setup.context)?;
        let raw_pipeline = fullscreen_pipeline(
            device,
            "SSAO Raw Pipeline",
            &raw_module,
            &pipeline_layout(device, "SSAO Raw Pipeline Layout", &[&setup.frame.frame_layout, &raw_layout]),
            &targets,
            masked.clone(),
        );
        let blur_module = setup.shaders.module(device, names::SSAO_BLUR, setup.context)?;
        let blur_pipeline = fullscreen_pipeline(
            device,
            "SSAO Blur Pipeline",
            &blur_module,
            &pipeline_layout(device, "SSAO Blur Pipeline Layout", &[&blur_layout]),
            &targets,
            masked,
        );

        let mut kernel = [Vec4::ZERO; SSAO_KERNEL_SIZE];
        for (slot, sample) in kernel.iter_mut().zip(generate_ssao_kernel(SSAO_KERNEL_SIZE)) {
            *slot = sample;
        }
        let uniforms = SsaoUniforms {
            kernel,
            noise_scale: Vec2::ONE,
            radius: 0.5,
            bias: 0.0001,
        };
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSAO Uniforms"),
            size: std::mem::size_of::<SsaoUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let noise_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSAO Noise Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            raw_pipeline,
            blur_pipeline,
            raw_layout,
            blur_layout,
            uniforms,
            uniform_buffer,
            noise_view: Self::upload_noise(device, setup.queue),
            noise_sampler,
            raw_bind_group: None,
            blur_bind_group: None,
        })
    }

    fn upload_noise(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: SSAO_NOISE_SIZE,
            height: SSAO_NOISE_SIZE,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("SSAO Noise 4x4"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texels: Vec<u8> = generate_ssao_noise().into_iter().flatten().collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * SSAO_NOISE_SIZE),
                rows_per_image: Some(SSAO_NOISE_SIZE),
            },
            size,
        );

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &SsaoUniforms {
        &self.uniforms
    }

    fn masked_pass<'e>(
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        depth_stencil: &wgpu::TextureView,
    ) -> wgpu::RenderPass<'e> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[color_attachment(target, wgpu::LoadOp::Clear(wgpu::Color::WHITE))],
            // read-only: stencil test only
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_stencil,
                depth_ops: None,
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_stencil_reference(GEOMETRY_STENCIL_REF);
        pass
    }
}

impl RenderNode for SsaoPass {
    fn name(&self) -> &'static str {
        "SSAO Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        self.uniforms.noise_scale = noise_scale(ctx.width, ctx.height);
        self.uniforms.radius = ctx.settings.ssao.radius();
        self.uniforms.bias = ctx.settings.ssao.bias();
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let (Some(position), Some(normal), Some(raw)) = (
            ctx.view(GraphResource::GBuffer(GBufferTarget::Position)),
            ctx.view(GraphResource::GBuffer(GBufferTarget::NormalRoughness)),
            ctx.view(GraphResource::AoScratch),
        ) else {
            log::error!("SSAO pass: inputs missing from the resource table");
            self.raw_bind_group = None;
            self.blur_bind_group = None;
            return;
        };

        self.raw_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO Raw BindGroup"),
            layout: &self.raw_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(position),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.noise_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.noise_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
        self.blur_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO Blur BindGroup"),
            layout: &self.blur_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(raw),
            }],
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some(raw_group), Some(blur_group)) = (&self.raw_bind_group, &self.blur_bind_group) else {
            return;
        };
        let (Some(raw), Some(blurred), Some(depth)) = (
            ctx.attachment(GraphResource::AoScratch),
            ctx.attachment(GraphResource::Occlusion),
            ctx.attachment(GraphResource::DepthStencil),
        ) else {
            log::error!("SSAO pass: attachments missing");
            return;
        };

        {
            let mut pass = Self::masked_pass(encoder, "SSAO Raw", raw, depth);
            pass.set_pipeline(&self.raw_pipeline);
            pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);
            pass.set_bind_group(1, raw_group, &[]);
            pass.draw(0..3, 0..1);
        }
        {
            let mut pass = Self::masked_pass(encoder, "SSAO Blur", blurred, depth);
            pass.set_pipeline(&self.blur_pipeline);
            pass.set_bind_group(0, blur_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_stays_in_upper_unit_hemisphere() {
        let kernel = generate_ssao_kernel(SSAO_KERNEL_SIZE);
        assert_eq!(kernel.len(), SSAO_KERNEL_SIZE);
        for sample in &kernel {
            assert!(sample.z >= 0.0);
            assert!(sample.truncate().length() <= 1.0 + 1e-5);
            assert_eq!(sample.w, 0.0);
        }
    }

    #[test]
    fn kernel_is_deterministic() {
        assert_eq!(generate_ssao_kernel(16), generate_ssao_kernel(16));
        assert_eq!(generate_ssao_noise(), generate_ssao_noise());
    }

    #[test]
    fn noise_is_one_tile() {
        let noise = generate_ssao_noise();
        assert_eq!(noise.len(), 16);
        assert!(noise.iter().all(|texel| texel[2] == 0 && texel[3] == 255));
        assert_eq!(noise_scale(1920, 1080), Vec2::new(480.0, 270.0));
    }
}
