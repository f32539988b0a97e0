//! Shadow Pass
//!
//! Renders depth from each shadow-casting directional light into its tile of
//! the shadow atlas.
//!
//! Per light (strength > 0 and a tile assigned):
//!
//! 1. Opaque meshes, unconditionally. In [`TransparentShadowMode::Solid`]
//!    alpha-blended meshes are drawn here too, as if opaque.
//! 2. In [`TransparentShadowMode::AlphaTest`] only: alpha-blended meshes with
//!    a discard against the alpha threshold.
//!
//! The atlas is a reversed-Z `Depth32Float` image cleared to 0; the light
//! matrix comes from [`Light::light_space_matrix`].
//!
//! Tiles are assigned when a light is registered through
//! [`ShadowPass::assign_tile`], never during a frame.

use glam::Mat4;
use smallvec::SmallVec;

use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::graph::shadow_utils::{
    SHADOW_MAP_FORMAT, SHADOW_TILE_SIZE, ShadowTile, ShadowTileAllocator, shadow_atlas_size,
};
use crate::renderer::pipeline::{MeshPipelineDesc, align_to, cull_mode, mesh_pipeline, pipeline_layout, uniform_entry};
use crate::renderer::resources::{GpuTexture, ResourcePool, TextureDesc, TextureHandle};
use crate::renderer::shader::names;
use crate::scene::light::{LightType, SHADOWED_DIRECTIONAL_LIGHTS_MAX};
use crate::scene::{Light, LightKey};
use crate::settings::TransparentShadowMode;

pub struct ShadowPass {
    allocator: ShadowTileAllocator,
    shadow_map: TextureHandle,

    light_buffer: wgpu::Buffer,
    light_stride: u32,
    light_bind_group: wgpu::BindGroup,

    /// Indexed by `double_sided as usize`.
    depth_pipelines: [wgpu::RenderPipeline; 2],
    alpha_test_pipelines: [wgpu::RenderPipeline; 2],

    // per-frame
    tiles: SmallVec<[ShadowTile; SHADOWED_DIRECTIONAL_LIGHTS_MAX]>,
    mode: TransparentShadowMode,
}

impl ShadowPass {
    pub fn new(setup: &PassSetup<'_>, pool: &mut ResourcePool<GpuTexture>) -> Result<Self> {
        let device = setup.device;
        let matrix_size = std::mem::size_of::<Mat4>() as u64;
        let light_stride = align_to(matrix_size as u32, device.limits().min_uniform_buffer_offset_alignment);

        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Light Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, Some(matrix_size))],
        });
        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Light Matrices"),
            size: u64::from(light_stride) * SHADOWED_DIRECTIONAL_LIGHTS_MAX as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Light BindGroup"),
            layout: &light_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &light_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(matrix_size),
                }),
            }],
        });

        let module = setup.shaders.module(device, names::SHADOW, setup.context)?;
        let depth_layout = pipeline_layout(
            device,
            "Shadow Depth Pipeline Layout",
            &[&light_layout, &setup.frame.object_layout],
        );
        let alpha_layout = pipeline_layout(
            device,
            "Shadow Alpha-Test Pipeline Layout",
            &[
                &light_layout,
                &setup.frame.object_layout,
                setup.material_layout,
                &setup.frame.frame_layout,
            ],
        );

        let depth_stencil = wgpu::DepthStencilState {
            format: SHADOW_MAP_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Greater),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };

        let build = |label: &str, layout: &wgpu::PipelineLayout, fragment: Option<&str>, double_sided: bool| {
            mesh_pipeline(
                device,
                &MeshPipelineDesc {
                    label,
                    module: &module,
                    layout,
                    vertex_buffers: setup.vertex_buffers,
                    fragment_entry: fragment,
                    targets: &[],
                    depth_stencil: Some(depth_stencil.clone()),
                    cull_mode: cull_mode(double_sided),
                },
            )
        };
        let depth_pipelines = [false, true].map(|ds| build("Shadow Depth Pipeline", &depth_layout, None, ds));
        let alpha_test_pipelines = [false, true].map(|ds| {
            build(
                "Shadow Alpha-Test Pipeline",
                &alpha_layout,
                Some("fs_alpha_test"),
                ds,
            )
        });

        let (width, height) = shadow_atlas_size(SHADOWED_DIRECTIONAL_LIGHTS_MAX);
        let shadow_map = pool.allocate(
            device,
            TextureDesc::new_2d(
                "Shadow Map",
                width,
                height,
                SHADOW_MAP_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
        );

        Ok(Self {
            allocator: ShadowTileAllocator::new(),
            shadow_map,
            light_buffer,
            light_stride,
            light_bind_group,
            depth_pipelines,
            alpha_test_pipelines,
            tiles: SmallVec::new(),
            mode: TransparentShadowMode::default(),
        })
    }

    pub fn assign_tile(&mut self, key: LightKey, light: &mut Light) {
        self.allocator.assign(key, light);
    }

    pub fn release_tile(&mut self, key: LightKey, light: &mut Light) {
        self.allocator.revoke(key, light);
    }

    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &ShadowTileAllocator {
        &self.allocator
    }

    #[inline]
    #[must_use]
    pub fn shadow_map(&self) -> TextureHandle {
        self.shadow_map
    }

    fn draw_meshes<'m>(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &ExecuteContext,
        pipelines: &[wgpu::RenderPipeline; 2],
        meshes: impl Iterator<Item = (usize, &'m dyn crate::scene::DrawMesh)>,
        bind_material: bool,
    ) {
        for (index, mesh) in meshes {
            pass.set_pipeline(&pipelines[usize::from(mesh.double_sided())]);
            pass.set_bind_group(1, ctx.frame.object_bind_group(), &[ctx.frame.object_offset(index)]);
            if bind_material {
                mesh.bind_material(pass, 2);
            }
            mesh.draw(pass);
        }
    }
}

impl RenderNode for ShadowPass {
    fn name(&self) -> &'static str {
        "Shadow Pass"
    }

    fn publish(&self, table: &mut ResourceTable) {
        table.insert(GraphResource::ShadowMap, self.shadow_map);
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        self.mode = ctx.settings.transparent_shadows;
        self.tiles.clear();

        for light in ctx.lights.values() {
            if light.kind != LightType::Directional || !light.casts_shadow() {
                continue;
            }
            let Some(tile) = light.shadow_tile() else {
                continue;
            };
            if tile.index() >= SHADOWED_DIRECTIONAL_LIGHTS_MAX {
                continue;
            }
            let offset = u64::from(self.light_stride) * tile.index() as u64;
            ctx.queue.write_buffer(
                &self.light_buffer,
                offset,
                bytemuck::bytes_of(&light.light_space_matrix()),
            );
            self.tiles.push(tile);
        }
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(shadow_map) = ctx.pool.get(self.shadow_map) else {
            log::error!("Shadow pass: shadow map missing");
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Depth Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let tile_size = SHADOW_TILE_SIZE as f32;
        for tile in &self.tiles {
            let (x, y) = tile.origin();
            pass.set_viewport(x as f32, y as f32, tile_size, tile_size, 0.0, 1.0);
            pass.set_bind_group(0, &self.light_bind_group, &[tile.index() as u32 * self.light_stride]);

            match self.mode {
                TransparentShadowMode::Solid => {
                    self.draw_meshes(&mut pass, ctx, &self.depth_pipelines, ctx.scene.meshes(), false);
                }
                TransparentShadowMode::AlphaTest => {
                    self.draw_meshes(&mut pass, ctx, &self.depth_pipelines, ctx.scene.opaque_meshes(), false);
                    pass.set_bind_group(3, ctx.frame.frame_bind_group(), &[]);
                    self.draw_meshes(
                        &mut pass,
                        ctx,
                        &self.alpha_test_pipelines,
                        ctx.scene.transparent_meshes(),
                        true,
                    );
                }
            }
        }
    }
}
