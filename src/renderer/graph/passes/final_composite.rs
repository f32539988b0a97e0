//! Final Composite
//!
//! Tone-maps the end of the color chain into the presentation surface.
//! Whatever the plan's last color stage published (lit image, TAA history,
//! bloom output or SMAA output) is read through `color_input`.

use bytemuck::{Pod, Zeroable};

use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::pipeline::{
    color_attachment, float_texture_entry, fullscreen_pipeline, linear_clamp_sampler, pipeline_layout,
    sampler_entry, uniform_entry,
};
use crate::renderer::shader::names;
use crate::settings::{ToneMapSettings, ToneMappingMode};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ToneMapUniforms {
    pub exposure: f32,
    /// 0 = linear, 1 = Reinhard, 2 = ACES.
    pub mode: u32,
    pub(crate) _pad: [u32; 2],
}

impl ToneMapUniforms {
    #[must_use]
    pub fn from_settings(settings: &ToneMapSettings) -> Self {
        let mode = match settings.mode {
            ToneMappingMode::Linear => 0,
            ToneMappingMode::Reinhard => 1,
            ToneMappingMode::Aces => 2,
        };
        Self {
            exposure: settings.exposure(),
            mode,
            _pad: [0; 2],
        }
    }
}

pub struct FinalCompositePass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

impl FinalCompositePass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Final Composite Layout"),
            entries: &[
                float_texture_entry(0, fragment, true),
                sampler_entry(1, fragment, wgpu::SamplerBindingType::Filtering),
                uniform_entry(2, fragment, None),
            ],
        });

        let module = setup.shaders.module(device, names::TONE_MAP, setup.context)?;
        let pipeline = fullscreen_pipeline(
            device,
            "Final Composite Pipeline",
            &module,
            &pipeline_layout(device, "Final Composite Pipeline Layout", &[&layout]),
            &[Some(wgpu::ColorTargetState {
                format: setup.surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            None,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tone Map Uniforms"),
            size: std::mem::size_of::<ToneMapUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            layout,
            sampler: linear_clamp_sampler(device, "Final Composite Sampler"),
            uniform_buffer,
            bind_group: None,
        })
    }
}

impl RenderNode for FinalCompositePass {
    fn name(&self) -> &'static str {
        "Final Composite Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        ctx.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&ToneMapUniforms::from_settings(&ctx.settings.tone_map)),
        );

        let Some(color) = ctx.color_input() else {
            log::error!("Final composite: color input {:?} missing", ctx.pass.color_input);
            self.bind_group = None;
            return;
        };
        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Final Composite BindGroup"),
            layout: &self.layout,
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
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Final Composite"),
            color_attachments: &[color_attachment(ctx.surface, wgpu::LoadOp::Clear(wgpu::Color::BLACK))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
