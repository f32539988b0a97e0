//! SMAA
//!
//! Morphological antialiasing in three full-screen passes:
//!
//! 1. **Edge detection**: luma edges of the color input into `SmaaEdges`.
//!    Fragments without an edge are discarded; the rest stamp stencil 1.
//! 2. **Blending weights**: only where the stencil is 1. Walks the edges
//!    with the search lookup and reads coverage from the area lookup.
//! 3. **Neighborhood blending**: mixes each pixel with its neighbors by the
//!    weights, into `SmaaOutput`.
//!
//! The area (160×560, RG8) and search (64×16, R8) lookups are supplied by
//! the host as raw texel bytes.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use super::lighting::LIT_COLOR_FORMAT;
use super::PassSetup;
use crate::errors::{LanternError, Result};
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::pipeline::{
    color_attachment, float_texture_entry, fullscreen_pipeline, linear_clamp_sampler, pipeline_layout,
    sampler_entry, uniform_entry,
};
use crate::renderer::resources::{ResourcePool, TextureDesc, TextureFactory, TextureHandle};
use crate::renderer::shader::names;

pub const SMAA_AREA_WIDTH: u32 = 160;
pub const SMAA_AREA_HEIGHT: u32 = 560;
pub const SMAA_SEARCH_WIDTH: u32 = 64;
pub const SMAA_SEARCH_HEIGHT: u32 = 16;

pub const SMAA_EDGES_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg8Unorm;
pub const SMAA_WEIGHTS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const SMAA_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
pub const SMAA_OUTPUT_FORMAT: wgpu::TextureFormat = LIT_COLOR_FORMAT;

const EDGE_STENCIL_REF: u32 = 1;

// ============================================================================
// Lookup textures
// ============================================================================

/// Precomputed SMAA area and search tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmaaLookup {
    area: Vec<u8>,
    search: Vec<u8>,
}

impl SmaaLookup {
    /// Bytes in the area table (two channels).
    pub const AREA_BYTES: usize = (SMAA_AREA_WIDTH * SMAA_AREA_HEIGHT * 2) as usize;
    /// Bytes in the search table (one channel).
    pub const SEARCH_BYTES: usize = (SMAA_SEARCH_WIDTH * SMAA_SEARCH_HEIGHT) as usize;

    pub fn new(area: Vec<u8>, search: Vec<u8>) -> Result<Self> {
        if area.len() != Self::AREA_BYTES {
            return Err(LanternError::InvalidLookupData {
                name: "smaa_area",
                expected: Self::AREA_BYTES,
                found: area.len(),
            });
        }
        if search.len() != Self::SEARCH_BYTES {
            return Err(LanternError::InvalidLookupData {
                name: "smaa_search",
                expected: Self::SEARCH_BYTES,
                found: search.len(),
            });
        }
        Ok(Self { area, search })
    }

    /// All-zero tables. Edges are still detected but never blended.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            area: vec![0; Self::AREA_BYTES],
            search: vec![0; Self::SEARCH_BYTES],
        }
    }

    #[must_use]
    pub fn area(&self) -> &[u8] {
        &self.area
    }

    #[must_use]
    pub fn search(&self) -> &[u8] {
        &self.search
    }

    /// Uploads both tables; returns (area, search) views.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> (wgpu::TextureView, wgpu::TextureView) {
        let area = upload_table(
            device,
            queue,
            "SMAA Area Lookup",
            (SMAA_AREA_WIDTH, SMAA_AREA_HEIGHT),
            wgpu::TextureFormat::Rg8Unorm,
            2,
            &self.area,
        );
        let search = upload_table(
            device,
            queue,
            "SMAA Search Lookup",
            (SMAA_SEARCH_WIDTH, SMAA_SEARCH_HEIGHT),
            wgpu::TextureFormat::R8Unorm,
            1,
            &self.search,
        );
        (area, search)
    }
}

fn upload_table(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    (width, height): (u32, u32),
    format: wgpu::TextureFormat,
    bytes_per_texel: u32,
    data: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_texel),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// Targets
// ============================================================================

fn target_desc(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> TextureDesc {
    TextureDesc::new_2d(
        label,
        width,
        height,
        format,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

/// Edges, weights, the edge stencil and the blended output.
#[derive(Debug, Clone)]
pub struct SmaaTargets {
    /// edges, weights, stencil, output
    handles: [TextureHandle; 4],
}

impl SmaaTargets {
    pub fn new<F>(pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32) -> Self
    where
        F: TextureFactory + ?Sized,
    {
        Self {
            handles: [
                pool.allocate(factory, target_desc("SMAA Edges", width, height, SMAA_EDGES_FORMAT)),
                pool.allocate(factory, target_desc("SMAA Weights", width, height, SMAA_WEIGHTS_FORMAT)),
                pool.allocate(factory, target_desc("SMAA Stencil", width, height, SMAA_STENCIL_FORMAT)),
                pool.allocate(factory, target_desc("SMAA Output", width, height, SMAA_OUTPUT_FORMAT)),
            ],
        }
    }

    pub fn resize<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32)
    where
        F: TextureFactory + ?Sized,
    {
        pool.reallocate(factory, &mut self.handles, |d| d.clone().with_size(width, height));
    }

    #[inline]
    #[must_use]
    pub fn edges(&self) -> TextureHandle {
        self.handles[0]
    }

    #[inline]
    #[must_use]
    pub fn weights(&self) -> TextureHandle {
        self.handles[1]
    }

    #[inline]
    #[must_use]
    pub fn stencil(&self) -> TextureHandle {
        self.handles[2]
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> TextureHandle {
        self.handles[3]
    }

    pub fn handles(&self) -> &[TextureHandle; 4] {
        &self.handles
    }

    pub fn publish(&self, table: &mut ResourceTable) {
        table.insert(GraphResource::SmaaEdges, self.edges());
        table.insert(GraphResource::SmaaWeights, self.weights());
        table.insert(GraphResource::SmaaOutput, self.output());
    }
}

// ============================================================================
// Pass
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SmaaUniforms {
    /// (1/width, 1/height, width, height)
    pub rt_metrics: Vec4,
}

impl SmaaUniforms {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            rt_metrics: Vec4::new(1.0 / w, 1.0 / h, w, h),
        }
    }
}

fn stencil_state(compare: wgpu::CompareFunction, pass_op: wgpu::StencilOperation, write_mask: u32) -> wgpu::DepthStencilState {
    let face = wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    };
    wgpu::DepthStencilState {
        format: SMAA_STENCIL_FORMAT,
        depth_write_enabled: Some(false),
        depth_compare: Some(wgpu::CompareFunction::Always),
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask,
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

fn texture(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

struct SmaaBindGroups {
    edges: wgpu::BindGroup,
    weights: wgpu::BindGroup,
    blend: wgpu::BindGroup,
}

pub struct SmaaPass {
    edge_pipeline: wgpu::RenderPipeline,
    weight_pipeline: wgpu::RenderPipeline,
    blend_pipeline: wgpu::RenderPipeline,

    edge_layout: wgpu::BindGroupLayout,
    weight_layout: wgpu::BindGroupLayout,
    blend_layout: wgpu::BindGroupLayout,

    area_view: wgpu::TextureView,
    search_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    bind_groups: Option<SmaaBindGroups>,
}

impl SmaaPass {
    pub fn new(setup: &PassSetup<'_>, lookup: &SmaaLookup) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let uniform_vis = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let filtering = wgpu::SamplerBindingType::Filtering;

        // input, sampler, uniforms
        let edge_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SMAA Edge Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                sampler_entry(1, fragment, filtering),
                uniform_entry(2, uniform_vis, None),
            ],
        });
        // edges, area, search, sampler, uniforms
        let weight_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SMAA Weight Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                float_texture_entry(1, fragment, true),
                float_texture_entry(2, fragment, true),
                sampler_entry(3, fragment, filtering),
                uniform_entry(4, uniform_vis, None),
            ],
        });
        // input, weights, sampler, uniforms
        let blend_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SMAA Blend Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                float_texture_entry(1, fragment, true),
                sampler_entry(2, fragment, filtering),
                uniform_entry(3, uniform_vis, None),
            ],
        });

        let target = |format| {
            [Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })]
        };

        let edge_module = setup.shaders.module(device, names::SMAA_EDGE, setup.context)?;
        let edge_pipeline = fullscreen_pipeline(
            device,
            "SMAA Edge Pipeline",
            &edge_module,
            &pipeline_layout(device, "SMAA Edge Pipeline Layout", &[&edge_layout]),
            &target(SMAA_EDGES_FORMAT),
            Some(stencil_state(
                wgpu::CompareFunction::Always,
                wgpu::StencilOperation::Replace,
                0xff,
            )),
        );

        let weight_module = setup.shaders.module(device, names::SMAA_WEIGHT, setup.context)?;
        let weight_pipeline = fullscreen_pipeline(
            device,
            "SMAA Weight Pipeline",
            &weight_module,
            &pipeline_layout(device, "SMAA Weight Pipeline Layout", &[&weight_layout]),
            &target(SMAA_WEIGHTS_FORMAT),
            Some(stencil_state(
                wgpu::CompareFunction::Equal,
                wgpu::StencilOperation::Keep,
                0,
            )),
        );

        let blend_module = setup.shaders.module(device, names::SMAA_BLEND, setup.context)?;
        let blend_pipeline = fullscreen_pipeline(
            device,
            "SMAA Blend Pipeline",
            &blend_module,
            &pipeline_layout(device, "SMAA Blend Pipeline Layout", &[&blend_layout]),
            &target(SMAA_OUTPUT_FORMAT),
            None,
        );

        let (area_view, search_view) = lookup.upload(device, setup.queue);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SMAA Uniforms"),
            size: std::mem::size_of::<SmaaUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            edge_pipeline,
            weight_pipeline,
            blend_pipeline,
            edge_layout,
            weight_layout,
            blend_layout,
            area_view,
            search_view,
            sampler: linear_clamp_sampler(device, "SMAA Sampler"),
            uniform_buffer,
            bind_groups: None,
        })
    }
}

impl RenderNode for SmaaPass {
    fn name(&self) -> &'static str {
        "SMAA Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        self.bind_groups = None;
        ctx.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&SmaaUniforms::new(ctx.width, ctx.height)),
        );

        let (Some(color), Some(edges), Some(weights)) = (
            ctx.color_input(),
            ctx.view(GraphResource::SmaaEdges),
            ctx.view(GraphResource::SmaaWeights),
        ) else {
            log::error!("SMAA pass: inputs missing from the resource table");
            return;
        };

        let sampler = |binding| wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        };
        let uniforms = |binding| wgpu::BindGroupEntry {
            binding,
            resource: self.uniform_buffer.as_entire_binding(),
        };

        let edges_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SMAA Edge BindGroup"),
            layout: &self.edge_layout,
            entries: &[texture(0, color), sampler(1), uniforms(2)],
        });
        let weights_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SMAA Weight BindGroup"),
            layout: &self.weight_layout,
            entries: &[
                texture(0, edges),
                texture(1, &self.area_view),
                texture(2, &self.search_view),
                sampler(3),
                uniforms(4),
            ],
        });
        let blend_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SMAA Blend BindGroup"),
            layout: &self.blend_layout,
            entries: &[texture(0, color), texture(1, weights), sampler(2), uniforms(3)],
        });

        self.bind_groups = Some(SmaaBindGroups {
            edges: edges_group,
            weights: weights_group,
            blend: blend_group,
        });
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some(groups), Some(targets)) = (&self.bind_groups, ctx.targets.smaa()) else {
            return;
        };
        let resolve = |handle| ctx.pool.get(handle).map(|t| &t.view);
        let (Some(edges), Some(weights), Some(stencil), Some(output)) = (
            resolve(targets.edges()),
            resolve(targets.weights()),
            resolve(targets.stencil()),
            resolve(targets.output()),
        ) else {
            log::error!("SMAA pass: targets missing from the pool");
            return;
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SMAA Edge Detection"),
                color_attachments: &[color_attachment(edges, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT))],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: stencil,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.edge_pipeline);
            pass.set_stencil_reference(EDGE_STENCIL_REF);
            pass.set_bind_group(0, &groups.edges, &[]);
            pass.draw(0..3, 0..1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SMAA Blending Weights"),
                color_attachments: &[color_attachment(weights, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT))],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: stencil,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Discard,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.weight_pipeline);
            pass.set_stencil_reference(EDGE_STENCIL_REF);
            pass.set_bind_group(0, &groups.weights, &[]);
            pass.draw(0..3, 0..1);
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SMAA Neighborhood Blending"),
            color_attachments: &[color_attachment(output, wgpu::LoadOp::Clear(wgpu::Color::BLACK))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.blend_pipeline);
        pass.set_bind_group(0, &groups.blend, &[]);
        pass.draw(0..3, 0..1);
    }
}
