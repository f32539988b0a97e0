//! Frame Resources
//!
//! GPU buffers shared by every pass, and the bind groups that expose them:
//!
//! | Group layout | Binding | Contents |
//! |--------------|---------|----------|
//! | `frame` | 0 | [`FrameUniforms`] |
//! | `object` | 0 | [`ObjectUniforms`], dynamic offset per mesh |
//! | `object` | 1 | bone matrices (read-only storage) |
//! | `lighting` | 0 | [`LightBlock`] |
//! | `lighting` | 1 | [`LightSpaceBlock`] |
//! | `lighting` | 2, 3 | shadow map + comparison sampler |
//! | `lighting` | 4, 5, 6 | irradiance cube, prefiltered cube, BRDF LUT |
//! | `lighting` | 7 | linear sampler |
//!
//! Also keeps the previous frame's camera state for velocity and TAA
//! reprojection.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};

use crate::renderer::pipeline::{
    align_to, depth_texture_entry, float_texture_entry, linear_clamp_sampler, sampler_entry, storage_buffer_entry,
    texture_entry, uniform_entry,
};
use crate::scene::light::{LightBlock, LightSpaceBlock};
use crate::scene::{CameraSnapshot, Environment, Light, SceneSource};
use crate::settings::RenderSettings;

/// Capacity of the bone matrix buffer.
pub const BONES_MAX: usize = 128;

const INITIAL_OBJECT_CAPACITY: u32 = 64;

// ============================================================================
// GPU layouts
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: Mat4,
    /// Jittered when TAA is active.
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    pub unjittered_view_projection: Mat4,
    pub previous_view_projection: Mat4,
    pub camera_position: Vec4,
    /// xy = current jitter, zw = previous jitter, in NDC.
    pub jitter: Vec4,
    /// width, height, 1 / width, 1 / height.
    pub resolution: Vec4,
    pub frame_index: u32,
    pub alpha_threshold: f32,
    pub dfg_compensation: u32,
    pub light_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub previous_model: Mat4,
    pub normal: Mat4,
}

impl ObjectUniforms {
    #[must_use]
    pub fn new(model: Mat4, previous_model: Mat4) -> Self {
        Self {
            model,
            previous_model,
            normal: model.inverse().transpose(),
        }
    }
}

/// Camera state carried into the next frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousFrameState {
    pub view_projection: Mat4,
    pub jitter: Vec2,
    /// `false` until one frame has been saved, and after a history reset.
    pub valid: bool,
}

impl Default for PreviousFrameState {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            jitter: Vec2::ZERO,
            valid: false,
        }
    }
}

// ============================================================================
// Overflow reporting
// ============================================================================

/// Logs a truncation only when the number of dropped items changes, so a
/// persistent overflow produces one warning instead of one per frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverflowReport {
    last_dropped: usize,
}

impl OverflowReport {
    /// Returns `true` when a warning was logged.
    pub fn report(&mut self, what: &str, dropped: usize, capacity: usize) -> bool {
        if dropped == self.last_dropped {
            return false;
        }
        self.last_dropped = dropped;
        if dropped == 0 {
            log::info!("{what} back within capacity ({capacity})");
            return false;
        }
        log::warn!("{what} exceeds capacity {capacity}: {dropped} dropped");
        true
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.last_dropped
    }
}

// ============================================================================
// Frame resources
// ============================================================================

pub struct FrameResources {
    pub frame_layout: wgpu::BindGroupLayout,
    pub object_layout: wgpu::BindGroupLayout,
    pub lighting_layout: wgpu::BindGroupLayout,

    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    object_buffer: wgpu::Buffer,
    object_capacity: u32,
    object_stride: u32,
    bones_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_staging: Vec<u8>,

    lights_buffer: wgpu::Buffer,
    light_space_buffer: wgpu::Buffer,
    shadow_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    lighting_bind_group: Option<wgpu::BindGroup>,

    uniforms: FrameUniforms,
    previous: PreviousFrameState,
    frame_index: u32,

    light_overflow: OverflowReport,
    bone_overflow: OverflowReport,
}

impl FrameResources {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let all_stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE;
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Uniforms Layout"),
            entries: &[uniform_entry(0, all_stages, None)],
        });

        let object_size = std::mem::size_of::<ObjectUniforms>() as u64;
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Uniforms Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX, Some(object_size)),
                storage_buffer_entry(1, wgpu::ShaderStages::VERTEX),
            ],
        });

        let fragment = wgpu::ShaderStages::FRAGMENT;
        let lighting_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lighting Layout"),
            entries: &[
                uniform_entry(0, fragment, None),
                uniform_entry(1, fragment | wgpu::ShaderStages::VERTEX, None),
                depth_texture_entry(2, fragment),
                sampler_entry(3, fragment, wgpu::SamplerBindingType::Comparison),
                texture_entry(
                    4,
                    fragment,
                    wgpu::TextureSampleType::Float { filterable: true },
                    wgpu::TextureViewDimension::Cube,
                ),
                texture_entry(
                    5,
                    fragment,
                    wgpu::TextureSampleType::Float { filterable: true },
                    wgpu::TextureViewDimension::Cube,
                ),
                float_texture_entry(6, fragment, true),
                sampler_entry(7, fragment, wgpu::SamplerBindingType::Filtering),
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Uniforms BindGroup"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let min_alignment = device.limits().min_uniform_buffer_offset_alignment;
        let object_stride = align_to(object_size as u32, min_alignment);
        let object_buffer = Self::create_object_buffer(device, object_stride, INITIAL_OBJECT_CAPACITY);
        let bones_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bone Matrices"),
            size: (BONES_MAX * std::mem::size_of::<Mat4>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_bind_group =
            Self::create_object_bind_group(device, &object_layout, &object_buffer, &bones_buffer, object_size);

        let lights_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Block"),
            size: std::mem::size_of::<LightBlock>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let light_space_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Space Block"),
            size: std::mem::size_of::<LightSpaceBlock>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            // reversed-Z: lit when the receiver is at least as close as the occluder
            compare: Some(wgpu::CompareFunction::GreaterEqual),
            ..Default::default()
        });

        Self {
            frame_layout,
            object_layout,
            lighting_layout,
            frame_buffer,
            frame_bind_group,
            object_buffer,
            object_capacity: INITIAL_OBJECT_CAPACITY,
            object_stride,
            bones_buffer,
            object_bind_group,
            object_staging: Vec::new(),
            lights_buffer,
            light_space_buffer,
            shadow_sampler,
            linear_sampler: linear_clamp_sampler(device, "Lighting Linear Sampler"),
            lighting_bind_group: None,
            uniforms: FrameUniforms::zeroed(),
            previous: PreviousFrameState::default(),
            frame_index: 0,
            light_overflow: OverflowReport::default(),
            bone_overflow: OverflowReport::default(),
        }
    }

    fn create_object_buffer(device: &wgpu::Device, stride: u32, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniforms"),
            size: u64::from(stride) * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_object_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        object_buffer: &wgpu::Buffer,
        bones_buffer: &wgpu::Buffer,
        object_size: u64,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Uniforms BindGroup"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: object_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(object_size),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: bones_buffer.as_entire_binding(),
                },
            ],
        })
    }

    // ========================================================================
    // Per-frame updates
    // ========================================================================

    /// Writes the frame uniform block. `jitter` is in NDC units.
    pub fn update_frame(
        &mut self,
        queue: &wgpu::Queue,
        camera: &CameraSnapshot,
        jitter: Vec2,
        extent: (u32, u32),
        settings: &RenderSettings,
        light_count: u32,
    ) {
        let unjittered = camera.view_projection();
        let projection = Mat4::from_translation(jitter.extend(0.0)) * camera.projection;
        let view_projection = projection * camera.view;
        let (previous_vp, previous_jitter) = if self.previous.valid {
            (self.previous.view_projection, self.previous.jitter)
        } else {
            (unjittered, jitter)
        };
        let (w, h) = (extent.0.max(1) as f32, extent.1.max(1) as f32);

        self.uniforms = FrameUniforms {
            view: camera.view,
            projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            unjittered_view_projection: unjittered,
            previous_view_projection: previous_vp,
            camera_position: camera.position.extend(1.0),
            jitter: Vec4::new(jitter.x, jitter.y, previous_jitter.x, previous_jitter.y),
            resolution: Vec4::new(w, h, 1.0 / w, 1.0 / h),
            frame_index: self.frame_index,
            alpha_threshold: settings.alpha_threshold(),
            dfg_compensation: u32::from(settings.dfg_compensation),
            light_count,
        };
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    /// Writes one [`ObjectUniforms`] per mesh, growing the buffer when needed.
    pub fn update_objects(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &dyn SceneSource) {
        let count = scene.mesh_count() as u32;
        if count == 0 {
            return;
        }

        if count > self.object_capacity {
            let mut capacity = self.object_capacity.max(1);
            while capacity < count {
                capacity = capacity.saturating_mul(2);
            }
            log::info!("Growing object uniform buffer to {capacity} entries");
            self.object_buffer = Self::create_object_buffer(device, self.object_stride, capacity);
            self.object_bind_group = Self::create_object_bind_group(
                device,
                &self.object_layout,
                &self.object_buffer,
                &self.bones_buffer,
                std::mem::size_of::<ObjectUniforms>() as u64,
            );
            self.object_capacity = capacity;
        }

        let root = scene.model_matrix();
        let previous_root = scene.previous_model_matrix();
        let stride = self.object_stride as usize;
        self.object_staging.clear();
        self.object_staging.resize(stride * count as usize, 0);
        for (index, mesh) in scene.meshes() {
            let uniforms = ObjectUniforms::new(root * mesh.transform(), previous_root * mesh.previous_transform());
            let bytes = bytemuck::bytes_of(&uniforms);
            let offset = index * stride;
            self.object_staging[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        queue.write_buffer(&self.object_buffer, 0, &self.object_staging);
    }

    /// Packs the light list and the shadow matrices. Lights beyond capacity
    /// are dropped. Returns the number of uploaded lights.
    pub fn update_lights<'a>(&mut self, queue: &wgpu::Queue, lights: impl Iterator<Item = &'a Light> + Clone) -> u32 {
        let (block, dropped) = LightBlock::pack(lights.clone());
        self.light_overflow.report("Light list", dropped, block.lights.len());
        let light_space = LightSpaceBlock::pack(lights);
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(&block));
        queue.write_buffer(&self.light_space_buffer, 0, bytemuck::bytes_of(&light_space));
        block.count
    }

    /// Uploads the scene's bone matrices, truncated to [`BONES_MAX`].
    pub fn update_bones(&mut self, queue: &wgpu::Queue, scene: &dyn SceneSource) {
        let bones = scene.bone_matrices();
        let kept = bones.len().min(BONES_MAX);
        self.bone_overflow.report("Bone matrices", bones.len() - kept, BONES_MAX);
        if kept > 0 {
            queue.write_buffer(&self.bones_buffer, 0, bytemuck::cast_slice(&bones[..kept]));
        }
    }

    /// Rebuilds the lighting bind group for this frame's shadow map and
    /// environment.
    pub fn bind_lighting(&mut self, device: &wgpu::Device, shadow_map: &wgpu::TextureView, environment: &Environment) {
        self.lighting_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting BindGroup"),
            layout: &self.lighting_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.lights_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.light_space_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(shadow_map),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(environment.irradiance()),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(environment.prefiltered()),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(environment.brdf_lut()),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
            ],
        }));
    }

    /// Remembers this frame's camera for the next one.
    pub fn save_previous(&mut self) {
        self.previous = PreviousFrameState {
            view_projection: self.uniforms.unjittered_view_projection,
            jitter: Vec2::new(self.uniforms.jitter.x, self.uniforms.jitter.y),
            valid: true,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
    }

    /// Forgets the previous frame; the next frame uses its own matrices.
    pub fn invalidate_previous(&mut self) {
        self.previous.valid = false;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn frame_bind_group(&self) -> &wgpu::BindGroup {
        &self.frame_bind_group
    }

    #[inline]
    #[must_use]
    pub fn object_bind_group(&self) -> &wgpu::BindGroup {
        &self.object_bind_group
    }

    /// Dynamic offset of mesh `index` in the object buffer.
    #[inline]
    #[must_use]
    pub fn object_offset(&self, index: usize) -> u32 {
        index as u32 * self.object_stride
    }

    /// `None` before the first [`bind_lighting`](Self::bind_lighting).
    #[inline]
    #[must_use]
    pub fn lighting_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.lighting_bind_group.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    #[inline]
    #[must_use]
    pub fn previous(&self) -> &PreviousFrameState {
        &self.previous
    }

    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    #[inline]
    #[must_use]
    pub fn linear_sampler(&self) -> &wgpu::Sampler {
        &self.linear_sampler
    }
}
