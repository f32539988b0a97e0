//! Debug Output
//!
//! Routes one G-buffer channel, the occlusion image or linearized depth
//! straight to the surface. Replaces lighting and the whole post chain for
//! the frame.
//!
//! Group 1 layout: the six G-buffer targets (0..=5), occlusion (6), depth
//! (7), mode uniform (8).

use bytemuck::{Pod, Zeroable};

use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::GraphResource;
use crate::renderer::pipeline::{
    color_attachment, depth_texture_entry, float_texture_entry, fullscreen_pipeline, pipeline_layout, uniform_entry,
};
use crate::renderer::shader::names;

const OCCLUSION_BINDING: u32 = GraphResource::GBUFFER.len() as u32;
const DEPTH_BINDING: u32 = OCCLUSION_BINDING + 1;
const MODE_BINDING: u32 = DEPTH_BINDING + 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct DebugUniforms {
    mode: u32,
    _pad: [u32; 3],
}

pub struct DebugOutputPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

impl DebugOutputPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let fragment = wgpu::ShaderStages::FRAGMENT;

        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..=OCCLUSION_BINDING)
            .map(|binding| float_texture_entry(binding, fragment, false))
            .collect();
        entries.push(depth_texture_entry(DEPTH_BINDING, fragment));
        entries.push(uniform_entry(MODE_BINDING, fragment, None));
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Debug Output Layout"),
            entries: &entries,
        });

        let module = setup.shaders.module(device, names::DEBUG_OUTPUT, setup.context)?;
        let pipeline = fullscreen_pipeline(
            device,
            "Debug Output Pipeline",
            &module,
            &pipeline_layout(device, "Debug Output Pipeline Layout", &[&setup.frame.frame_layout, &layout]),
            &[Some(wgpu::ColorTargetState {
                format: setup.surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            None,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Debug Output Uniforms"),
            size: std::mem::size_of::<DebugUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            layout,
            uniform_buffer,
            bind_group: None,
        })
    }
}

impl RenderNode for DebugOutputPass {
    fn name(&self) -> &'static str {
        "Debug Output Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        self.bind_group = None;
        let uniforms = DebugUniforms {
            mode: ctx.settings.debug_output.shader_mode(),
            _pad: [0; 3],
        };
        ctx.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let occlusion = if ctx.pass.reads(GraphResource::Occlusion) {
            GraphResource::Occlusion
        } else {
            GraphResource::WhiteOcclusion
        };

        let sources = GraphResource::GBUFFER
            .into_iter()
            .chain([occlusion, GraphResource::DepthStencil]);
        let mut entries = Vec::with_capacity(MODE_BINDING as usize + 1);
        for (binding, resource) in sources.enumerate() {
            let Some(view) = ctx.view(resource) else {
                log::error!("Debug output: {resource:?} missing from the resource table");
                return;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: MODE_BINDING,
            resource: self.uniform_buffer.as_entire_binding(),
        });

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Debug Output BindGroup"),
            layout: &self.layout,
            entries: &entries,
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Debug Output"),
            color_attachments: &[color_attachment(ctx.surface, wgpu::LoadOp::Clear(wgpu::Color::BLACK))],
            depth_stencil_attachment: None,
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
