//! Transparency Pass
//!
//! Forward-shades alpha-blended meshes on top of the lit image.
//!
//! 1. Sort: distance from the camera to each mesh's world-space bounding-box
//!    center, farthest first. The sort is stable, so meshes at equal
//!    distance keep draw-list order.
//! 2. Alpha-test sub-pass: fragments below the alpha threshold are
//!    discarded, the rest write depth (`Greater`).
//! 3. Blend sub-pass: the same list with src-alpha blending and depth
//!    writes off.
//!
//! Bind groups: 0 = frame, 1 = object, 2 = material, 3 = lighting.

use glam::Vec3;

use super::lighting::LIT_COLOR_FORMAT;
use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::GraphResource;
use crate::renderer::pipeline::{MeshPipelineDesc, color_attachment, cull_mode, mesh_pipeline, pipeline_layout};
use crate::renderer::resources::gbuffer::GBUFFER_DEPTH_FORMAT;
use crate::renderer::shader::names;
use crate::scene::SceneSource;

/// One entry of the sorted transparent draw list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortedDraw {
    /// Index into the scene's draw list.
    pub index: usize,
    pub distance: f32,
}

/// Alpha-blended meshes of `scene`, farthest from `camera_position` first.
#[must_use]
pub fn sort_back_to_front(scene: &dyn SceneSource, camera_position: Vec3) -> Vec<SortedDraw> {
    let root = scene.model_matrix();
    let mut draws: Vec<SortedDraw> = scene
        .transparent_meshes()
        .map(|(index, mesh)| {
            let center = mesh.bounds().transformed_center(&(root * mesh.transform()));
            SortedDraw {
                index,
                distance: camera_position.distance(center),
            }
        })
        .collect();
    // stable: equal distances keep draw-list order
    draws.sort_by(|a, b| b.distance.total_cmp(&a.distance));
    draws
}

pub struct TransparentPass {
    /// Indexed by `double_sided as usize`.
    alpha_test_pipelines: [wgpu::RenderPipeline; 2],
    blend_pipelines: [wgpu::RenderPipeline; 2],
    draws: Vec<SortedDraw>,
}

impl TransparentPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let module = setup.shaders.module(device, names::TRANSPARENT, setup.context)?;
        let layout = pipeline_layout(
            device,
            "Transparent Pipeline Layout",
            &[
                &setup.frame.frame_layout,
                &setup.frame.object_layout,
                setup.material_layout,
                &setup.frame.lighting_layout,
            ],
        );

        let depth = |write: bool| wgpu::DepthStencilState {
            format: GBUFFER_DEPTH_FORMAT,
            depth_write_enabled: Some(write),
            depth_compare: Some(wgpu::CompareFunction::Greater),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };
        let opaque_target = [Some(wgpu::ColorTargetState {
            format: LIT_COLOR_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let blend_target = [Some(wgpu::ColorTargetState {
            format: LIT_COLOR_FORMAT,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let alpha_test_pipelines = [false, true].map(|double_sided| {
            mesh_pipeline(
                device,
                &MeshPipelineDesc {
                    label: "Transparent Alpha-Test Pipeline",
                    module: &module,
                    layout: &layout,
                    vertex_buffers: setup.vertex_buffers,
                    fragment_entry: Some("fs_alpha_test"),
                    targets: &opaque_target,
                    depth_stencil: Some(depth(true)),
                    cull_mode: cull_mode(double_sided),
                },
            )
        });
        let blend_pipelines = [false, true].map(|double_sided| {
            mesh_pipeline(
                device,
                &MeshPipelineDesc {
                    label: "Transparent Blend Pipeline",
                    module: &module,
                    layout: &layout,
                    vertex_buffers: setup.vertex_buffers,
                    fragment_entry: Some("fs_blend"),
                    targets: &blend_target,
                    depth_stencil: Some(depth(false)),
                    cull_mode: cull_mode(double_sided),
                },
            )
        });

        Ok(Self {
            alpha_test_pipelines,
            blend_pipelines,
            draws: Vec::new(),
        })
    }

    /// This frame's sorted draw list.
    #[inline]
    #[must_use]
    pub fn draws(&self) -> &[SortedDraw] {
        &self.draws
    }

    fn draw_sorted(&self, pass: &mut wgpu::RenderPass<'_>, ctx: &ExecuteContext, pipelines: &[wgpu::RenderPipeline; 2]) {
        for draw in &self.draws {
            let mesh = ctx.scene.mesh(draw.index);
            pass.set_pipeline(&pipelines[usize::from(mesh.double_sided())]);
            pass.set_bind_group(1, ctx.frame.object_bind_group(), &[ctx.frame.object_offset(draw.index)]);
            mesh.bind_material(pass, 2);
            mesh.draw(pass);
        }
    }
}

impl RenderNode for TransparentPass {
    fn name(&self) -> &'static str {
        "Transparency Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        self.draws = sort_back_to_front(ctx.scene, ctx.camera.position);
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        if self.draws.is_empty() {
            return;
        }
        let Some(lighting) = ctx.frame.lighting_bind_group() else {
            return;
        };
        let (Some(lit), Some(depth)) = (
            ctx.attachment(GraphResource::LitColor),
            ctx.attachment(GraphResource::DepthStencil),
        ) else {
            log::error!("Transparency pass: attachments missing");
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Transparency Pass"),
            color_attachments: &[color_attachment(lit, wgpu::LoadOp::Load)],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);
        pass.set_bind_group(3, lighting, &[]);

        self.draw_sorted(&mut pass, ctx, &self.alpha_test_pipelines);
        self.draw_sorted(&mut pass, ctx, &self.blend_pipelines);
    }
}
