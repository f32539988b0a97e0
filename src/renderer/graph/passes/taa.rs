//! Temporal Antialiasing
//!
//! One compute dispatch per frame:
//!
//! ```text
//!  color (jittered) ─┐
//!  velocity ─────────┼─► reproject + neighborhood clamp ─► history[current]
//!  depth ────────────┤
//!  history[previous] ┘
//! ```
//!
//! History is a [`PingPong`] pair of images. A frame writes the current slot
//! and reads the previous one; [`TaaHistory::complete_frame`] swaps them
//! after a frame in which TAA ran. Frames without TAA leave the pair alone.
//!
//! The first frame after allocation, a resize or a re-enable has no valid
//! history: the shader is told to copy the current color through.
//!
//! Projection jitter walks a 16-sample Halton(2, 3) sequence.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::lighting::LIT_COLOR_FORMAT;
use super::PassSetup;
use crate::errors::Result;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::pipeline::{
    compute_pipeline, depth_texture_entry, dispatch_count, float_texture_entry, linear_clamp_sampler,
    pipeline_layout, sampler_entry, storage_texture_entry, uniform_entry,
};
use crate::renderer::resources::{GBufferTarget, PingPong, ResourcePool, TextureDesc, TextureFactory, TextureHandle};
use crate::renderer::shader::names;

pub const TAA_WORKGROUP_SIZE: u32 = 16;

/// Length of the jitter cycle.
pub const TAA_JITTER_SAMPLES: u32 = 16;

pub const TAA_HISTORY_FORMAT: wgpu::TextureFormat = LIT_COLOR_FORMAT;

// ============================================================================
// Jitter
// ============================================================================

/// Element `index` of the Halton low-discrepancy sequence in `base`.
/// `index` starts at 1; `halton(0, _)` is 0.
#[must_use]
pub fn halton(mut index: u32, base: u32) -> f32 {
    let base = base.max(2);
    let mut fraction = 1.0;
    let mut result = 0.0;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

/// Sub-pixel projection offset for `frame`, in NDC units, within half a
/// pixel of the center.
#[must_use]
pub fn jitter_offset(frame: u32, width: u32, height: u32) -> Vec2 {
    let i = frame % TAA_JITTER_SAMPLES + 1;
    let pixel = Vec2::new(halton(i, 2) - 0.5, halton(i, 3) - 0.5);
    pixel * 2.0 / Vec2::new(width.max(1) as f32, height.max(1) as f32)
}

// ============================================================================
// History
// ============================================================================

fn history_desc(label: &'static str, width: u32, height: u32) -> TextureDesc {
    TextureDesc::new_2d(
        label,
        width,
        height,
        TAA_HISTORY_FORMAT,
        wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

/// The two history images and the state that decides how they are used.
#[derive(Debug, Clone)]
pub struct TaaHistory {
    slots: PingPong<TextureHandle>,
    /// No valid history this frame.
    reset: bool,
    completed_frames: u64,
}

impl TaaHistory {
    pub fn new<F>(pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32) -> Self
    where
        F: TextureFactory + ?Sized,
    {
        let first = pool.allocate(factory, history_desc("TAA History A", width, height));
        let second = pool.allocate(factory, history_desc("TAA History B", width, height));
        Self {
            slots: PingPong::new(first, second),
            reset: true,
            completed_frames: 0,
        }
    }

    /// Reallocates both images; the old contents are gone, so the next
    /// frame starts over. Slot roles are kept, so the write index still
    /// follows the parity of `completed_frames`.
    pub fn resize<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32)
    where
        F: TextureFactory + ?Sized,
    {
        pool.reallocate(factory, self.slots.slots_mut(), |d| d.clone().with_size(width, height));
        self.reset = true;
    }

    /// Discards the accumulated history at the next frame.
    pub fn request_reset(&mut self) {
        self.reset = true;
    }

    #[inline]
    #[must_use]
    pub fn needs_reset(&self) -> bool {
        self.reset
    }

    /// Image written this frame.
    #[inline]
    #[must_use]
    pub fn current(&self) -> TextureHandle {
        *self.slots.current()
    }

    /// Image read this frame.
    #[inline]
    #[must_use]
    pub fn previous(&self) -> TextureHandle {
        *self.slots.previous()
    }

    #[inline]
    #[must_use]
    pub fn write_index(&self) -> usize {
        self.slots.current_index()
    }

    #[inline]
    #[must_use]
    pub fn read_index(&self) -> usize {
        self.slots.previous_index()
    }

    /// Frames in which TAA ran since allocation.
    #[inline]
    #[must_use]
    pub fn completed_frames(&self) -> u64 {
        self.completed_frames
    }

    /// Call once after every frame in which TAA ran.
    pub fn complete_frame(&mut self) {
        self.slots.swap();
        self.reset = false;
        self.completed_frames += 1;
    }

    pub fn handles(&self) -> &[TextureHandle; 2] {
        self.slots.slots()
    }

    pub fn publish(&self, table: &mut ResourceTable) {
        table.insert(GraphResource::TaaHistoryCurrent, self.current());
        table.insert(GraphResource::TaaHistoryPrevious, self.previous());
    }
}

// ============================================================================
// Pass
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TaaUniforms {
    pub feedback: f32,
    /// Non-zero: ignore history.
    pub reset: u32,
    pub(crate) _pad: [u32; 2],
}

pub struct TaaPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    extent: (u32, u32),
}

impl TaaPass {
    pub fn new(setup: &PassSetup<'_>) -> Result<Self> {
        let device = setup.device;
        let compute = wgpu::ShaderStages::COMPUTE;

        // color, history, velocity, depth, sampler, output, uniforms
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("TAA Layout"),
            entries: &[
                float_texture_entry(0, compute, true),
                float_texture_entry(1, compute, true),
                float_texture_entry(2, compute, false),
                depth_texture_entry(3, compute),
                sampler_entry(4, compute, wgpu::SamplerBindingType::Filtering),
                storage_texture_entry(5, TAA_HISTORY_FORMAT),
                uniform_entry(6, compute, None),
            ],
        });

        let module = setup.shaders.module(device, names::TAA, setup.context)?;
        let pipeline = compute_pipeline(
            device,
            "TAA Pipeline",
            &module,
            &pipeline_layout(device, "TAA Pipeline Layout", &[&setup.frame.frame_layout, &layout]),
            "cs_main",
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TAA Uniforms"),
            size: std::mem::size_of::<TaaUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            layout,
            sampler: linear_clamp_sampler(device, "TAA History Sampler"),
            uniform_buffer,
            bind_group: None,
            extent: (1, 1),
        })
    }
}

impl RenderNode for TaaPass {
    fn name(&self) -> &'static str {
        "TAA Pass"
    }

    fn prepare(&mut self, ctx: &PrepareContext) {
        self.extent = (ctx.width, ctx.height);
        self.bind_group = None;
        let Some(history) = ctx.targets.taa() else {
            log::error!("TAA pass scheduled without history");
            return;
        };

        let uniforms = TaaUniforms {
            feedback: ctx.settings.taa.feedback(),
            reset: u32::from(history.needs_reset()),
            _pad: [0; 2],
        };
        ctx.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let inputs = (
            ctx.color_input(),
            ctx.view(GraphResource::TaaHistoryPrevious),
            ctx.view(GraphResource::GBuffer(GBufferTarget::Velocity)),
            ctx.view(GraphResource::DepthStencil),
            ctx.texture(GraphResource::TaaHistoryCurrent),
        );
        let (Some(color), Some(previous), Some(velocity), Some(depth), Some(current)) = inputs else {
            log::error!("TAA pass: inputs missing from the resource table");
            return;
        };

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("TAA BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(previous),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(velocity),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(depth),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&current.view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("TAA Resolve"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, ctx.frame.frame_bind_group(), &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.dispatch_workgroups(
            dispatch_count(self.extent.0, TAA_WORKGROUP_SIZE),
            dispatch_count(self.extent.1, TAA_WORKGROUP_SIZE),
            1,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn halton_matches_known_values() {
        assert!(approx(halton(1, 2), 0.5));
        assert!(approx(halton(2, 2), 0.25));
        assert!(approx(halton(3, 2), 0.75));
        assert!(approx(halton(1, 3), 1.0 / 3.0));
        assert!(approx(halton(2, 3), 2.0 / 3.0));
        assert!(approx(halton(4, 3), 4.0 / 9.0));
        assert_eq!(halton(0, 2), 0.0);
    }

    #[test]
    fn jitter_stays_within_half_a_pixel() {
        let (w, h) = (1280, 720);
        for frame in 0..64 {
            let offset = jitter_offset(frame, w, h);
            assert!(offset.x.abs() <= 1.0 / w as f32 + 1e-6);
            assert!(offset.y.abs() <= 1.0 / h as f32 + 1e-6);
        }
        assert_eq!(jitter_offset(3, w, h), jitter_offset(3 + TAA_JITTER_SAMPLES, w, h));
    }
}
