//! Skybox Composite
//!
//! Draws the environment's skybox cube onto the lit image wherever nothing
//! was rasterized. The full-screen triangle sits on the far plane (depth 0
//! in reversed-Z) and tests `GreaterEqual` against the read-only G-buffer
//! depth, so it only survives where depth is still at its clear value.

use super::lighting::LIT_COLOR_FORMAT;
use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::GraphResource;
use crate::renderer::pipeline::{color_attachment, fullscreen_pipeline, pipeline_layout, sampler_entry, texture_entry};
use crate::renderer::resources::gbuffer::GBUFFER_DEPTH_FORMAT;
use crate::renderer::shader::names;

pub struct SkyboxPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

impl SkyboxPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Layout"),
            entries: &[
                texture_entry(
                    0,
                    fragment,
                    wgpu::TextureSampleType::Float { filterable: true },
                    wgpu::TextureViewDimension::Cube,
                ),
                sampler_entry(1, fragment, wgpu::SamplerBindingType::Filtering),
            ],
        });

        let module = setup.shaders.module(device, names::SKYBOX, setup.context)?;
        let pipeline = fullscreen_pipeline(
            device,
            "Skybox Pipeline",
            &module,
            &pipeline_layout(device, "Skybox Pipeline Layout", &[&setup.frame.frame_layout, &layout]),
            &[Some(wgpu::ColorTargetState {
                format: LIT_COLOR_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            Some(wgpu::DepthStencilState {
                format: GBUFFER_DEPTH_FORMAT,
                depth_write_enabled: Some(false),
                depth_compare: Some(wgpu::CompareFunction::GreaterEqual),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        );

        Ok(Self {
            pipeline,
            layout,
            bind_group: None,
        })
    }
}

impl RenderNode for SkyboxPass {
    fn name(&self) -> &'static str {
        "Skybox Composite"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        // The environment may have been swapped since last frame.
        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(ctx.environment.skybox()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(ctx.frame.linear_sampler()),
                },
            ],
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let (Some(lit), Some(depth)) = (
            ctx.attachment(GraphResource::LitColor),
            ctx.attachment(GraphResource::DepthStencil),
        ) else {
            log::error!("Skybox composite: attachments missing");
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Skybox Composite"),
            color_attachments: &[color_attachment(lit, wgpu::LoadOp::Load)],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: None,
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
