//! Renderer
//!
//! [`Renderer`] owns every pass, the texture pool and the shared frame
//! buffers, and runs one frame per [`render_frame`](Renderer::render_frame):
//!
//! 1. Snapshot settings and camera, build and validate the [`FramePlan`].
//! 2. Provision what the plan needs (AO targets, bloom chain length, SMAA
//!    targets, TAA history).
//! 3. Upload frame, object, light and bone data.
//! 4. Publish pass-owned images into the [`ResourceTable`].
//! 5. Schedule the plan's GPU stages into a [`RenderGraph`], prepare and
//!    execute them in one submit.
//! 6. Save previous-frame state; swap TAA history if TAA ran.
//!
//! The host keeps the device, queue and surface. Per-frame work never
//! returns errors: missing inputs are logged and the affected stage skips.

pub mod graph;
pub mod pipeline;
pub mod resources;
pub mod shader;
pub mod uniforms;

use std::path::PathBuf;

use glam::Vec2;
use slotmap::SlotMap;
use smallvec::SmallVec;

use self::graph::passes::ao::GTAO_FORMAT;
use self::graph::passes::lighting::LIT_COLOR_FORMAT;
use self::graph::passes::taa::TAA_HISTORY_FORMAT;
use self::graph::passes::{
    BloomPass, DebugOutputPass, FinalCompositePass, GeometryPass, GtaoPass, LightingPass, PassSetup, ShadowPass,
    SkyboxPass, SmaaLookup, SmaaPass, SsaoPass, TaaPass, TransparentPass, taa::jitter_offset,
};
use self::graph::{
    ExecuteContext, FramePlan, FrameTargets, PassId, PrepareContext, RenderGraph, RenderNode, ResizeContext,
    ResourceTable,
};
use self::resources::brdf_lut::BRDF_LUT_SIZE;
use self::resources::gbuffer::{GBUFFER_COLOR_BYTES_PER_SAMPLE, GBUFFER_DEPTH_FORMAT};
use self::resources::{BrdfLut, GBufferTarget, GpuTexture, ResourcePool};
use self::shader::{ShaderContext, ShaderLibrary};
use self::uniforms::FrameResources;
use crate::errors::{LanternError, Result};
use crate::scene::light::lights_for_upload;
use crate::scene::{CameraSnapshot, CameraSource, Environment, Light, LightKey, SceneSource};
use crate::settings::RenderSettings;

/// Everything [`Renderer::new`] needs besides the device and queue.
pub struct RendererDescriptor<'a> {
    /// Adapter the device came from; checked for format support.
    pub adapter: &'a wgpu::Adapter,
    pub shaders: ShaderLibrary,
    /// Vertex layouts of the host's meshes.
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'static>],
    /// Layout of the bind group `DrawMesh::bind_material` sets.
    pub material_layout: &'a wgpu::BindGroupLayout,
    pub surface_format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    /// SMAA area/search tables. Zeroed tables are used when absent.
    pub smaa_lookup: Option<SmaaLookup>,
    /// Cache file for the BRDF lookup table. `None` always integrates it.
    pub brdf_lut_cache: Option<PathBuf>,
}

/// Device limits the renderer needs on top of the defaults.
#[must_use]
pub fn required_limits() -> wgpu::Limits {
    let defaults = wgpu::Limits::default();
    wgpu::Limits {
        max_color_attachment_bytes_per_sample: defaults
            .max_color_attachment_bytes_per_sample
            .max(GBUFFER_COLOR_BYTES_PER_SAMPLE),
        ..defaults
    }
}

/// Texture formats the renderer creates, with the usages it needs from each.
#[must_use]
pub fn required_format_usages() -> SmallVec<[(wgpu::TextureFormat, wgpu::TextureUsages); 12]> {
    let attachment = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    let storage = wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING;

    let mut formats: SmallVec<[_; 12]> = GBufferTarget::ALL.iter().map(|t| (t.format(), attachment)).collect();
    formats.push((GBUFFER_DEPTH_FORMAT, attachment));
    formats.push((LIT_COLOR_FORMAT, attachment));
    formats.push((GTAO_FORMAT, storage));
    formats.push((TAA_HISTORY_FORMAT, storage));
    formats
}

/// First required format whose `allowed` usages fall short, with the
/// missing usages.
pub fn find_unsupported_format(
    allowed: impl Fn(wgpu::TextureFormat) -> wgpu::TextureUsages,
) -> Option<(wgpu::TextureFormat, wgpu::TextureUsages)> {
    required_format_usages().into_iter().find_map(|(format, needed)| {
        let missing = needed - allowed(format);
        (!missing.is_empty()).then_some((format, missing))
    })
}

/// Fails for adapters (usually downlevel ones) that cannot render to or
/// write every format the renderer allocates.
pub fn check_adapter(adapter: &wgpu::Adapter) -> Result<()> {
    match find_unsupported_format(|format| adapter.get_texture_format_features(format).allowed_usages) {
        Some((format, missing)) => Err(LanternError::UnsupportedFormat { format, missing }),
        None => Ok(()),
    }
}

struct Passes {
    geometry: GeometryPass,
    shadow: ShadowPass,
    ssao: SsaoPass,
    gtao: GtaoPass,
    lighting: LightingPass,
    skybox: SkyboxPass,
    transparent: TransparentPass,
    taa: TaaPass,
    bloom: BloomPass,
    smaa: SmaaPass,
    final_composite: FinalCompositePass,
    debug_output: DebugOutputPass,
}

impl Passes {
    /// Every GPU node, indexed by `PassId as usize`.
    fn nodes(&mut self) -> [Option<&mut dyn RenderNode>; PassId::COUNT] {
        let mut nodes: [Option<&mut dyn RenderNode>; PassId::COUNT] = [const { None }; PassId::COUNT];
        nodes[PassId::Geometry as usize] = Some(&mut self.geometry);
        nodes[PassId::Shadow as usize] = Some(&mut self.shadow);
        nodes[PassId::Ssao as usize] = Some(&mut self.ssao);
        nodes[PassId::Gtao as usize] = Some(&mut self.gtao);
        nodes[PassId::LightingResolve as usize] = Some(&mut self.lighting);
        nodes[PassId::SkyboxComposite as usize] = Some(&mut self.skybox);
        nodes[PassId::Transparency as usize] = Some(&mut self.transparent);
        nodes[PassId::Taa as usize] = Some(&mut self.taa);
        nodes[PassId::Bloom as usize] = Some(&mut self.bloom);
        nodes[PassId::Smaa as usize] = Some(&mut self.smaa);
        nodes[PassId::FinalComposite as usize] = Some(&mut self.final_composite);
        nodes[PassId::DebugOutput as usize] = Some(&mut self.debug_output);
        nodes
    }
}

pub struct Renderer {
    settings: RenderSettings,

    pool: ResourcePool<GpuTexture>,
    table: ResourceTable,
    frame: FrameResources,
    passes: Passes,
    targets: FrameTargets,

    lights: SlotMap<LightKey, Light>,
    /// Uploaded in place of an empty light list.
    default_sun: Light,

    brdf_lut: BrdfLut,
    environment: Environment,

    width: u32,
    height: u32,
    last_plan: Option<FramePlan>,
}

impl Renderer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, desc: RendererDescriptor<'_>) -> Result<Self> {
        check_adapter(desc.adapter)?;

        let missing = desc.shaders.missing();
        if !missing.is_empty() {
            return Err(LanternError::ShaderNotRegistered(missing.join(", ")));
        }

        let limits = device.limits();
        if limits.max_color_attachment_bytes_per_sample < GBUFFER_COLOR_BYTES_PER_SAMPLE {
            return Err(LanternError::DeviceLimit {
                name: "max_color_attachment_bytes_per_sample",
                required: GBUFFER_COLOR_BYTES_PER_SAMPLE,
                available: limits.max_color_attachment_bytes_per_sample,
            });
        }
        let max_dim = limits.max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max_dim || desc.height > max_dim {
            return Err(LanternError::InvalidExtent {
                width: desc.width,
                height: desc.height,
            });
        }
        let (width, height) = (desc.width, desc.height);

        let context = ShaderContext::renderer();
        let frame = FrameResources::new(device);
        let setup = PassSetup {
            device,
            queue,
            shaders: &desc.shaders,
            context: &context,
            frame: &frame,
            vertex_buffers: desc.vertex_buffers,
            material_layout: desc.material_layout,
            surface_format: desc.surface_format,
        };

        let settings = RenderSettings::default();
        let smaa_lookup = desc.smaa_lookup.unwrap_or_else(|| {
            log::warn!("No SMAA lookup tables supplied; SMAA will detect edges without blending");
            SmaaLookup::zeroed()
        });

        let mut pool = ResourcePool::new();
        let passes = Passes {
            geometry: GeometryPass::new(&setup, &mut pool, width, height)?,
            shadow: ShadowPass::new(&setup, &mut pool)?,
            ssao: SsaoPass::new(&setup)?,
            gtao: GtaoPass::new(&setup)?,
            lighting: LightingPass::new(&setup, &mut pool, width, height)?,
            skybox: SkyboxPass::new(&setup)?,
            transparent: TransparentPass::new(&setup)?,
            taa: TaaPass::new(&setup)?,
            bloom: BloomPass::new(&setup)?,
            smaa: SmaaPass::new(&setup, &smaa_lookup)?,
            final_composite: FinalCompositePass::new(&setup)?,
            debug_output: DebugOutputPass::new(&setup)?,
        };

        let targets = FrameTargets::new(&mut pool, device, width, height);
        if let Some(white) = pool.get(targets.ao().white()) {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &white.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &[u8::MAX],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(1),
                    rows_per_image: Some(1),
                },
                wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
            );
        }

        let brdf_lut = BrdfLut::load_or_generate(desc.brdf_lut_cache.as_deref(), BRDF_LUT_SIZE);
        let environment = Environment::neutral(device, queue, &brdf_lut);

        log::info!(
            "Renderer ready: {width}x{height}, {} pooled textures, surface {:?}",
            pool.live_count(),
            desc.surface_format
        );

        Ok(Self {
            settings,
            pool,
            table: ResourceTable::new(),
            frame,
            passes,
            targets,
            lights: SlotMap::with_key(),
            default_sun: Light::default_sun(),
            brdf_lut,
            environment,
            width,
            height,
            last_plan: None,
        })
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Changes take effect at the next frame start.
    #[inline]
    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Plan of the most recent frame.
    #[inline]
    #[must_use]
    pub fn last_plan(&self) -> Option<&FramePlan> {
        self.last_plan.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ResourcePool<GpuTexture> {
        &self.pool
    }

    #[inline]
    #[must_use]
    pub fn brdf_lut(&self) -> &BrdfLut {
        &self.brdf_lut
    }

    /// Swaps in a newly loaded environment. A failed load is logged and the
    /// current environment stays.
    pub fn set_environment(&mut self, environment: Result<Environment>) {
        match environment {
            Ok(environment) => {
                log::info!("Environment updated");
                self.environment = environment;
            }
            Err(err) => log::error!("Environment load failed, keeping the previous one: {err}"),
        }
    }

    // ========================================================================
    // Lights
    // ========================================================================

    /// Registers a light. Directional lights with a shadow strength get a
    /// shadow tile while tiles remain.
    pub fn add_light(&mut self, light: Light) -> LightKey {
        let key = self.lights.insert(light);
        if let Some(light) = self.lights.get_mut(key) {
            self.passes.shadow.assign_tile(key, light);
        }
        key
    }

    pub fn remove_light(&mut self, key: LightKey) -> Option<Light> {
        let mut light = self.lights.remove(key)?;
        self.passes.shadow.release_tile(key, &mut light);
        Some(light)
    }

    #[must_use]
    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    /// Edits a light in place, then re-evaluates its shadow tile.
    pub fn update_light(&mut self, key: LightKey, f: impl FnOnce(&mut Light)) -> bool {
        let Some(light) = self.lights.get_mut(key) else {
            return false;
        };
        f(light);
        match (light.wants_shadow(), light.shadow_tile().is_some()) {
            (true, false) => self.passes.shadow.assign_tile(key, light),
            (false, true) => self.passes.shadow.release_tile(key, light),
            _ => {}
        }
        true
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightKey, &Light)> {
        self.lights.iter()
    }

    // ========================================================================
    // Resize
    // ========================================================================

    /// Recreates every extent-dependent image. Zero or unchanged extents are
    /// ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}");
            return;
        }
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::info!("Resize {}x{} -> {width}x{height}", self.width, self.height);

        let mut ctx = ResizeContext {
            device,
            pool: &mut self.pool,
            width,
            height,
        };
        for node in self.passes.nodes().into_iter().flatten() {
            node.resize(&mut ctx);
        }
        self.targets.resize(&mut self.pool, device, width, height);
        self.frame.invalidate_previous();

        self.width = width;
        self.height = height;
    }

    // ========================================================================
    // Frame
    // ========================================================================

    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface: &wgpu::TextureView,
        scene: &dyn SceneSource,
        camera: &dyn CameraSource,
    ) {
        // Frame start: settings and camera are read once.
        let settings = self.settings.clone();
        let camera = CameraSnapshot::capture(camera);
        let plan = FramePlan::build(&settings);
        if let Err(err) = plan.validate() {
            log::error!("Frame plan rejected: {err}");
            return;
        }
        let (width, height) = (self.width, self.height);

        // Provision what this frame's plan selects.
        self.targets.provision(&mut self.pool, device, &plan, &settings);

        // UpdateFrameUniforms + Animation
        let jitter = if plan.contains(PassId::Taa) && settings.taa.jitter() {
            jitter_offset(self.frame.frame_index(), width, height)
        } else {
            Vec2::ZERO
        };
        let uploaded = lights_for_upload(&self.lights, &self.default_sun);
        let light_count = self.frame.update_lights(queue, uploaded.iter().copied());
        self.frame
            .update_frame(queue, &camera, jitter, (width, height), &settings, light_count);
        self.frame.update_objects(device, queue, scene);
        self.frame.update_bones(queue, scene);

        // Publish
        self.table.clear();
        for node in self.passes.nodes().into_iter().flatten() {
            node.publish(&mut self.table);
        }
        self.targets.publish(&plan, &mut self.table);

        if let Some(shadow_map) = self.pool.get(self.passes.shadow.shadow_map()) {
            self.frame
                .bind_lighting(device, shadow_map.sample_view(), &self.environment);
        }

        // Schedule, prepare, execute
        {
            let mut nodes = self.passes.nodes();
            let mut graph = RenderGraph::new();
            for pass in plan.passes() {
                if let Some(node) = nodes[pass.id as usize].take() {
                    graph.add_node(pass, node);
                }
            }
            log::trace!("Frame graph: {:?}", graph.node_names().collect::<Vec<_>>());

            let Some(first) = plan.passes().first() else {
                return;
            };
            let prepare = PrepareContext {
                device,
                queue,
                pool: &self.pool,
                table: &self.table,
                targets: &self.targets,
                frame: &self.frame,
                settings: &settings,
                scene,
                camera: &camera,
                lights: &self.lights,
                environment: &self.environment,
                width,
                height,
                pass: first,
            };
            graph.prepare(&prepare);

            let execute = ExecuteContext {
                pool: &self.pool,
                table: &self.table,
                targets: &self.targets,
                frame: &self.frame,
                scene,
                width,
                height,
                surface,
            };
            graph.execute(device, queue, &execute);
        }

        // SavePreviousFrameState
        self.frame.save_previous();
        self.targets.finish_frame(&plan);
        self.last_plan = Some(plan);
    }
}
