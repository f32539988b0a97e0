//! Bloom
//!
//! Threshold-based bloom over a half-resolution mip chain:
//!
//! 1. **Pick**: color input → chain mip 0, keeping only pixels whose
//!    luminance exceeds the threshold.
//! 2. **Downsample**: mip *i* → mip *i + 1*, 13-tap filter.
//! 3. **Upsample**: mip *i + 1* → mip *i*, 3×3 tent, additively blended from
//!    the coarsest level back to mip 0.
//! 4. **Composite**: color input + strength × mip 0 → bloom output.
//!
//! The output is a separate image, so bloom never writes the image it reads
//! (which may be TAA history).
//!
//! ```text
//!  color ─► pick ─► mip0 ─► mip1 ─► … ─► mipN-1
//!                    ▲       │             │
//!                    └─ up ◄─┴──── up ◄────┘
//!  color + mip0 ─► composite ─► BloomOutput
//! ```

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

use super::lighting::LIT_COLOR_FORMAT;
use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::pipeline::{
    color_attachment, float_texture_entry, fullscreen_pipeline, linear_clamp_sampler, pipeline_layout,
    sampler_entry, uniform_entry,
};
use crate::renderer::resources::{ResourcePool, TextureDesc, TextureFactory, TextureHandle};
use crate::renderer::shader::{ShaderContext, names};

/// Upper bound on the chain length regardless of resolution.
pub const MAX_BLOOM_MIPS: u32 = 8;

pub const BLOOM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Extent of chain mip 0 for a full-resolution extent.
#[inline]
#[must_use]
pub fn bloom_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Longest chain the resolution allows: mips of the half-resolution image
/// down to one texel along the shorter side, capped at [`MAX_BLOOM_MIPS`].
#[must_use]
pub fn max_bloom_range(width: u32, height: u32) -> u32 {
    let (w, h) = bloom_extent(width, height);
    (w.min(h).ilog2() + 1).min(MAX_BLOOM_MIPS)
}

fn chain_desc(width: u32, height: u32, mips: u32) -> TextureDesc {
    let (w, h) = bloom_extent(width, height);
    TextureDesc::new_2d(
        "Bloom Chain",
        w,
        h,
        BLOOM_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
    .with_mips(mips)
}

fn output_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "Bloom Output",
        width,
        height,
        BLOOM_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

// ============================================================================
// Targets
// ============================================================================

/// The blur chain and the composite output.
#[derive(Debug, Clone)]
pub struct BloomTargets {
    chain: TextureHandle,
    output: TextureHandle,
    requested: u32,
    range: u32,
    width: u32,
    height: u32,
}

impl BloomTargets {
    pub fn new<F>(pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32, requested: u32) -> Self
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (width.max(1), height.max(1));
        let requested = requested.max(1);
        let range = requested.min(max_bloom_range(width, height));
        Self {
            chain: pool.allocate(factory, chain_desc(width, height, range)),
            output: pool.allocate(factory, output_desc(width, height)),
            requested,
            range,
            width,
            height,
        }
    }

    /// Requests a chain length. The effective range is clamped to
    /// [`max_bloom_range`]; the chain is reallocated when it changes.
    /// Returns the effective range.
    pub fn set_range<F>(&mut self, requested: u32, pool: &mut ResourcePool<F::Texture>, factory: &F) -> u32
    where
        F: TextureFactory + ?Sized,
    {
        self.requested = requested.max(1);
        let range = self.requested.min(max_bloom_range(self.width, self.height));
        if range != self.range {
            log::debug!("Bloom range {} -> {range} (requested {})", self.range, self.requested);
            self.range = range;
            pool.reallocate(factory, std::slice::from_mut(&mut self.chain), |d| d.clone().with_mips(range));
        }
        self.range
    }

    /// Reallocates both images for a new extent, re-clamping the requested
    /// range.
    pub fn resize<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32)
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (width.max(1), height.max(1));
        self.width = width;
        self.height = height;
        self.range = self.requested.min(max_bloom_range(width, height));
        let range = self.range;
        pool.reallocate(factory, std::slice::from_mut(&mut self.chain), |_| {
            chain_desc(width, height, range)
        });
        pool.reallocate(factory, std::slice::from_mut(&mut self.output), |d| {
            d.clone().with_size(width, height)
        });
    }

    /// Effective chain length.
    #[inline]
    #[must_use]
    pub fn range(&self) -> u32 {
        self.range
    }

    #[inline]
    #[must_use]
    pub fn requested(&self) -> u32 {
        self.requested
    }

    #[inline]
    #[must_use]
    pub fn chain(&self) -> TextureHandle {
        self.chain
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> TextureHandle {
        self.output
    }

    pub fn publish(&self, table: &mut ResourceTable) {
        table.insert(GraphResource::BloomChain, self.chain);
        table.insert(GraphResource::BloomOutput, self.output);
    }
}

// ============================================================================
// Pass
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BloomUniforms {
    pub threshold: f32,
    pub strength: f32,
    pub(crate) _pad: [f32; 2],
}

/// Bloom stage. Its images live in [`BloomTargets`], provisioned only once
/// bloom is first scheduled.
pub struct BloomPass {
    pick_pipeline: wgpu::RenderPipeline,
    downsample_pipeline: wgpu::RenderPipeline,
    upsample_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,

    sample_layout: wgpu::BindGroupLayout,
    pick_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,

    pick_bind_group: Option<wgpu::BindGroup>,
    /// `downsample_bind_groups[i]` samples mip `i`.
    downsample_bind_groups: SmallVec<[wgpu::BindGroup; MAX_BLOOM_MIPS as usize]>,
    /// `upsample_bind_groups[i]` samples mip `i + 1`.
    upsample_bind_groups: SmallVec<[wgpu::BindGroup; MAX_BLOOM_MIPS as usize]>,
    composite_bind_group: Option<wgpu::BindGroup>,
}

impl BloomPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;

        let sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Sample Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                sampler_entry(1, fragment, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let pick_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Pick Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                sampler_entry(1, fragment, wgpu::SamplerBindingType::Filtering),
                uniform_entry(2, fragment, None),
            ],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Composite Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                float_texture_entry(1, fragment, true),
                sampler_entry(2, fragment, wgpu::SamplerBindingType::Filtering),
                uniform_entry(3, fragment, None),
            ],
        });

        let replace = [Some(wgpu::ColorTargetState {
            format: BLOOM_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let additive = [Some(wgpu::ColorTargetState {
            format: BLOOM_FORMAT,
            blend: Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            }),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        // One template, one module per stage.
        let stage = |name: &str| {
            let mut context = setup.context.clone();
            context.merge(&ShaderContext::new().set_value("bloom_stage", name));
            setup.shaders.module(device, names::BLOOM, &context)
        };
        let pick_pipeline = fullscreen_pipeline(
            device,
            "Bloom Pick Pipeline",
            &stage("pick")?,
            &pipeline_layout(device, "Bloom Pick Pipeline Layout", &[&pick_layout]),
            &replace,
            None,
        );
        let sample_pipeline_layout = pipeline_layout(device, "Bloom Sample Pipeline Layout", &[&sample_layout]);
        let downsample_pipeline = fullscreen_pipeline(
            device,
            "Bloom Downsample Pipeline",
            &stage("downsample")?,
            &sample_pipeline_layout,
            &replace,
            None,
        );
        let upsample_pipeline = fullscreen_pipeline(
            device,
            "Bloom Upsample Pipeline",
            &stage("upsample")?,
            &sample_pipeline_layout,
            &additive,
            None,
        );
        let composite_module = setup.shaders.module(device, names::BLOOM_COMPOSITE, setup.context)?;
        let composite_pipeline = fullscreen_pipeline(
            device,
            "Bloom Composite Pipeline",
            &composite_module,
            &pipeline_layout(device, "Bloom Composite Pipeline Layout", &[&composite_layout]),
            &[Some(wgpu::ColorTargetState {
                format: LIT_COLOR_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            None,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bloom Uniforms"),
            size: std::mem::size_of::<BloomUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pick_pipeline,
            downsample_pipeline,
            upsample_pipeline,
            composite_pipeline,
            sample_layout,
            pick_layout,
            composite_layout,
            sampler: linear_clamp_sampler(device, "Bloom Sampler"),
            uniform_buffer,
            pick_bind_group: None,
            downsample_bind_groups: SmallVec::new(),
            upsample_bind_groups: SmallVec::new(),
            composite_bind_group: None,
        })
    }

    fn sample_group(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Mip BindGroup"),
            layout: &self.sample_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn clear_bind_groups(&mut self) {
        self.pick_bind_group = None;
        self.composite_bind_group = None;
        self.downsample_bind_groups.clear();
        self.upsample_bind_groups.clear();
    }
}

impl RenderNode for BloomPass {
    fn name(&self) -> &'static str {
        "Bloom Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        let uniforms = BloomUniforms {
            threshold: ctx.settings.bloom.threshold(),
            strength: ctx.settings.bloom.strength(),
            _pad: [0.0; 2],
        };
        ctx.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        self.clear_bind_groups();
        let Some(targets) = ctx.targets.bloom() else {
            log::error!("Bloom pass scheduled without targets");
            return;
        };
        let (Some(color), Some(chain)) = (ctx.color_input(), ctx.pool.get(targets.chain())) else {
            log::error!("Bloom pass: color input or chain missing");
            return;
        };

        self.pick_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Pick BindGroup"),
            layout: &self.pick_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));

        let steps = targets.range().saturating_sub(1);
        let downsample = (0..steps).map(|mip| self.sample_group(ctx.device, chain.mip_view(mip))).collect();
        let upsample = (0..steps)
            .map(|mip| self.sample_group(ctx.device, chain.mip_view(mip + 1)))
            .collect();
        self.downsample_bind_groups = downsample;
        self.upsample_bind_groups = upsample;

        self.composite_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Composite BindGroup"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(chain.mip_view(0)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some(pick), Some(composite)) = (&self.pick_bind_group, &self.composite_bind_group) else {
            return;
        };
        let (Some(chain), Some(output)) = (
            ctx.texture(GraphResource::BloomChain),
            ctx.attachment(GraphResource::BloomOutput),
        ) else {
            return;
        };

        let mut fullscreen = |label: &str,
                              target: &wgpu::TextureView,
                              load: wgpu::LoadOp<wgpu::Color>,
                              pipeline: &wgpu::RenderPipeline,
                              bind_group: &wgpu::BindGroup| {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[color_attachment(target, load)],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        };

        let clear = wgpu::LoadOp::Clear(wgpu::Color::BLACK);
        fullscreen("Bloom Pick", chain.mip_view(0), clear, &self.pick_pipeline, pick);

        for (mip, group) in self.downsample_bind_groups.iter().enumerate() {
            let target = chain.mip_view(mip as u32 + 1);
            fullscreen("Bloom Downsample", target, clear, &self.downsample_pipeline, group);
        }

        for (mip, group) in self.upsample_bind_groups.iter().enumerate().rev() {
            let target = chain.mip_view(mip as u32);
            fullscreen("Bloom Upsample", target, wgpu::LoadOp::Load, &self.upsample_pipeline, group);
        }

        fullscreen("Bloom Composite", output, clear, &self.composite_pipeline, composite);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_follows_shorter_half_resolution_side() {
        assert_eq!(max_bloom_range(1920, 1080), MAX_BLOOM_MIPS);
        assert_eq!(max_bloom_range(64, 64), 6);
        assert_eq!(max_bloom_range(64, 8), 3);
        assert_eq!(max_bloom_range(2, 2), 1);
        assert_eq!(max_bloom_range(1, 1), 1);
    }
}
