//! Geometry Pass
//!
//! Rasterizes every non-blended mesh into the G-buffer.
//!
//! - Depth: reversed-Z, cleared to 0, `Greater` test, writes enabled.
//! - Stencil: cleared to 0, every rasterized fragment writes
//!   [`GEOMETRY_STENCIL_REF`], so full-screen passes can skip background
//!   pixels with an `Equal` test.
//! - Culling: back faces unless the mesh is double-sided.
//!
//! Bind groups: 0 = frame, 1 = object (dynamic offset) + bones,
//! 2 = material (set by the mesh).

use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, ResizeContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::pipeline::{MeshPipelineDesc, cull_mode, mesh_pipeline, pipeline_layout};
use crate::renderer::resources::gbuffer::{GBUFFER_DEPTH_FORMAT, GEOMETRY_STENCIL_REF, full_mask};
use crate::renderer::resources::{GBuffer, GBufferTarget, GpuTexture, ResourcePool};
use crate::renderer::shader::names;

pub struct GeometryPass {
    gbuffer: GBuffer,
    /// Indexed by `double_sided as usize`.
    pipelines: [wgpu::RenderPipeline; 2],
}

impl GeometryPass {
    pub fn new(setup: &PassSetup<'_>, pool: &mut ResourcePool<GpuTexture>, width: u32, height: u32) -> Result<Self> {
        let module = setup.shaders.module(setup.device, names::GBUFFER, setup.context)?;
        let layout = pipeline_layout(
            setup.device,
            "Geometry Pipeline Layout",
            &[
                &setup.frame.frame_layout,
                &setup.frame.object_layout,
                setup.material_layout,
            ],
        );

        let stencil_write = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Always,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Replace,
        };
        let depth_stencil = wgpu::DepthStencilState {
            format: GBUFFER_DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Greater),
            stencil: wgpu::StencilState {
                front: stencil_write,
                back: stencil_write,
                read_mask: 0xff,
                write_mask: 0xff,
            },
            bias: wgpu::DepthBiasState::default(),
        };

        let targets = GBuffer::color_targets();
        let pipelines = [false, true].map(|double_sided| {
            mesh_pipeline(
                setup.device,
                &MeshPipelineDesc {
                    label: if double_sided {
                        "Geometry Pipeline (double-sided)"
                    } else {
                        "Geometry Pipeline"
                    },
                    module: &module,
                    layout: &layout,
                    vertex_buffers: setup.vertex_buffers,
                    fragment_entry: Some("fs_main"),
                    targets: &targets,
                    depth_stencil: Some(depth_stencil.clone()),
                    cull_mode: cull_mode(double_sided),
                },
            )
        });

        Ok(Self {
            gbuffer: GBuffer::new(pool, setup.device, width, height),
            pipelines,
        })
    }

    #[inline]
    #[must_use]
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }
}

impl RenderNode for GeometryPass {
    fn name(&self) -> &'static str {
        "Geometry Pass"
    }

    fn resize(&mut self, ctx: &mut ResizeContext) {
        self.gbuffer.resize(ctx.pool, ctx.device, ctx.width, ctx.height);
    }

    fn publish(&self, table: &mut ResourceTable) {
        for target in GBufferTarget::ALL {
            table.insert(GraphResource::GBuffer(target), self.gbuffer.target(target));
        }
        table.insert(GraphResource::DepthStencil, self.gbuffer.depth_stencil());
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(depth) = ctx.pool.get(self.gbuffer.depth_stencil()) else {
            log::error!("Geometry pass: depth-stencil target missing");
            return;
        };
        let attachments = self.gbuffer.attachments();
        let colors = ctx
            .pool
            .color_attachments(&attachments, full_mask(), wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Geometry Pass"),
            color_attachments: &colors,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_stencil_reference(GEOMETRY_STENCIL_REF);
        pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);

        for (index, mesh) in ctx.scene.opaque_meshes() {
            pass.set_pipeline(&self.pipelines[usize::from(mesh.double_sided())]);
            pass.set_bind_group(1, ctx.frame.object_bind_group(), &[ctx.frame.object_offset(index)]);
            mesh.bind_material(&mut pass, 2);
            mesh.draw(&mut pass);
        }
    }
}
