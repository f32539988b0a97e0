//! Lighting Resolve Pass
//!
//! One full-screen triangle that turns the G-buffer into HDR radiance:
//! punctual lights with directional shadows, image-based ambient from the
//! environment, scaled by the frame's occlusion image. No depth test.
//!
//! Bind groups: 0 = frame, 1 = G-buffer + occlusion, 2 = lighting
//! (lights, light matrices, shadow map, environment, BRDF lookup).
//!
//! Owns the lit image (`Rgba16Float`), which every later color stage reads
//! or loads.

use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext, ResizeContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::passes::PassSetup;
use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::pipeline::{color_attachment, float_texture_entry, fullscreen_pipeline, pipeline_layout};
use crate::renderer::resources::{GpuTexture, ResourcePool, TextureDesc, TextureHandle};
use crate::renderer::shader::names;

pub const LIT_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Binding of the occlusion image in group 1, after the G-buffer targets.
const OCCLUSION_BINDING: u32 = GraphResource::GBUFFER.len() as u32;

#[must_use]
pub fn lit_color_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "Lit Color",
        width,
        height,
        LIT_COLOR_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

pub struct LightingPass {
    lit: TextureHandle,
    pipeline: wgpu::RenderPipeline,
    inputs_layout: wgpu::BindGroupLayout,
    inputs_bind_group: Option<wgpu::BindGroup>,
}

impl LightingPass {
    pub fn new(setup: &PassSetup<'_>, pool: &mut ResourcePool<GpuTexture>, width: u32, height: u32) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;

        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..=OCCLUSION_BINDING)
            .map(|binding| float_texture_entry(binding, fragment, false))
            .collect();
        let inputs_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lighting Inputs Layout"),
            entries: &entries,
        });

        let module = setup.shaders.module(device, names::LIGHTING, setup.context)?;
        let layout = pipeline_layout(
            device,
            "Lighting Pipeline Layout",
            &[&setup.frame.frame_layout, &inputs_layout, &setup.frame.lighting_layout],
        );
        let pipeline = fullscreen_pipeline(
            device,
            "Lighting Pipeline",
            &module,
            &layout,
            &[Some(wgpu::ColorTargetState {
                format: LIT_COLOR_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            None,
        );

        Ok(Self {
            lit: pool.allocate(device, lit_color_desc(width, height)),
            pipeline,
            inputs_layout,
            inputs_bind_group: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn lit_color(&self) -> TextureHandle {
        self.lit
    }
}

impl RenderNode for LightingPass {
    fn name(&self) -> &'static str {
        "Lighting Resolve Pass"
    }

    fn resize(&mut self, ctx: &mut ResizeContext) {
        let (width, height) = (ctx.width, ctx.height);
        ctx.pool
            .reallocate(ctx.device, std::slice::from_mut(&mut self.lit), |d| d.clone().with_size(width, height));
    }

    fn publish(&self, table: &mut ResourceTable) {
        table.insert(GraphResource::LitColor, self.lit);
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        let occlusion = if ctx.pass.reads(GraphResource::Occlusion) {
            GraphResource::Occlusion
        } else {
            GraphResource::WhiteOcclusion
        };

        let mut views = Vec::with_capacity(OCCLUSION_BINDING as usize + 1);
        for resource in GraphResource::GBUFFER.into_iter().chain(std::iter::once(occlusion)) {
            let Some(view) = ctx.view(resource) else {
                log::error!("Lighting pass: {resource:?} missing from the resource table");
                self.inputs_bind_group = None;
                return;
            };
            views.push(view);
        }

        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        self.inputs_bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Inputs BindGroup"),
            layout: &self.inputs_layout,
            entries: &entries,
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some(inputs), Some(lighting)) = (&self.inputs_bind_group, ctx.frame.lighting_bind_group()) else {
            log::error!("Lighting pass: bind groups not prepared");
            return;
        };
        let Some(lit) = ctx.attachment(GraphResource::LitColor) else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lighting Resolve"),
            color_attachments: &[color_attachment(lit, wgpu::LoadOp::Clear(wgpu::Color::BLACK))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);
        pass.set_bind_group(1, inputs, &[]);
        pass.set_bind_group(2, lighting, &[]);
        pass.draw(0..3, 0..1);
    }
}
