//! Ground-Truth Ambient Occlusion
//!
//! Two compute dispatches at half resolution:
//!
//! 1. **Horizon**: for each pixel, `slice_count` view-aligned slices; in each
//!    the two horizon angles are searched within `radius` and the visible arc
//!    is integrated against the cosine lobe. Albedo drives the multi-bounce
//!    approximation.
//! 2. **Denoise**: depth-aware 3×3 filter over the raw result.
//!
//! Both write `R32Float` storage images; wgpu orders the write of the first
//! dispatch before the read of the second.

use bytemuck::{Pod, Zeroable};

use super::{GTAO_FORMAT, gtao_extent};
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::passes::PassSetup;
use crate::renderer::graph::resource::GraphResource;
use crate::renderer::pipeline::{
    compute_pipeline, dispatch_count, float_texture_entry, pipeline_layout, storage_texture_entry, uniform_entry,
};
use crate::renderer::resources::GBufferTarget;
use crate::renderer::shader::names;

pub const GTAO_WORKGROUP_SIZE: u32 = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GtaoUniforms {
    pub slice_count: u32,
    pub radius: f32,
    /// Output extent, in texels.
    pub width: u32,
    pub height: u32,
}

pub struct GtaoPass {
    horizon_pipeline: wgpu::ComputePipeline,
    denoise_pipeline: wgpu::ComputePipeline,
    horizon_layout: wgpu::BindGroupLayout,
    denoise_layout: wgpu::BindGroupLayout,

    uniform_buffer: wgpu::Buffer,
    uniforms: GtaoUniforms,

    horizon_bind_group: Option<wgpu::BindGroup>,
    denoise_bind_group: Option<wgpu::BindGroup>,
}

impl GtaoPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let compute = wgpu::ShaderStages::COMPUTE;

        // position, normal, albedo, raw out, uniforms
        let horizon_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GTAO Horizon Layout"),
            entries: &[
                float_texture_entry(0, compute, false),
                float_texture_entry(1, compute, false),
                float_texture_entry(2, compute, false),
                storage_texture_entry(3, GTAO_FORMAT),
                uniform_entry(4, compute, None),
            ],
        });
        // raw, position, denoised out, uniforms
        let denoise_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GTAO Denoise Layout"),
            entries: &[
                float_texture_entry(0, compute, false),
                float_texture_entry(1, compute, false),
                storage_texture_entry(2, GTAO_FORMAT),
                uniform_entry(3, compute, None),
            ],
        });

        let horizon_module = setup.shaders.module(device, names::GTAO, setup.context)?;
        let horizon_pipeline = compute_pipeline(
            device,
            "GTAO Horizon Pipeline",
            &horizon_module,
            &pipeline_layout(
                device,
                "GTAO Horizon Pipeline Layout",
                &[&setup.frame.frame_layout, &horizon_layout],
            ),
            "cs_main",
        );
        let denoise_module = setup.shaders.module(device, names::GTAO_DENOISE, setup.context)?;
        let denoise_pipeline = compute_pipeline(
            device,
            "GTAO Denoise Pipeline",
            &denoise_module,
            &pipeline_layout(device, "GTAO Denoise Pipeline Layout", &[&denoise_layout]),
            "cs_main",
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GTAO Uniforms"),
            size: std::mem::size_of::<GtaoUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            horizon_pipeline,
            denoise_pipeline,
            horizon_layout,
            denoise_layout,
            uniform_buffer,
            uniforms: GtaoUniforms::zeroed(),
            horizon_bind_group: None,
            denoise_bind_group: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &GtaoUniforms {
        &self.uniforms
    }
}

impl RenderNode for GtaoPass {
    fn name(&self) -> &'static str {
        "GTAO Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        let (width, height) = gtao_extent(ctx.width, ctx.height);
        self.uniforms = GtaoUniforms {
            slice_count: ctx.settings.gtao.slice_count(),
            radius: ctx.settings.gtao.radius(),
            width,
            height,
        };
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let inputs = (
            ctx.view(GraphResource::GBuffer(GBufferTarget::Position)),
            ctx.view(GraphResource::GBuffer(GBufferTarget::NormalRoughness)),
            ctx.view(GraphResource::GBuffer(GBufferTarget::BaseColor)),
            ctx.texture(GraphResource::AoScratch),
            ctx.texture(GraphResource::Occlusion),
        );
        let (Some(position), Some(normal), Some(albedo), Some(raw), Some(denoised)) = inputs else {
            log::error!("GTAO pass: inputs missing from the resource table");
            self.horizon_bind_group = None;
            self.denoise_bind_group = None;
            return;
        };

        self.horizon_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GTAO Horizon BindGroup"),
            layout: &self.horizon_layout,
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
                    resource: wgpu::BindingResource::TextureView(albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&raw.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
        self.denoise_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GTAO Denoise BindGroup"),
            layout: &self.denoise_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&raw.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(position),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&denoised.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some(horizon), Some(denoise)) = (&self.horizon_bind_group, &self.denoise_bind_group) else {
            return;
        };
        let groups_x = dispatch_count(self.uniforms.width, GTAO_WORKGROUP_SIZE);
        let groups_y = dispatch_count(self.uniforms.height, GTAO_WORKGROUP_SIZE);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("GTAO Horizon"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.horizon_pipeline);
            pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);
            pass.set_bind_group(1, horizon, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("GTAO Denoise"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.denoise_pipeline);
            pass.set_bind_group(0, denoise, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
    }
}
