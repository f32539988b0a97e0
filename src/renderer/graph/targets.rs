//! Plan-driven Frame Targets
//!
//! Images that only exist while an optional stage is in use: AO outputs,
//! the bloom chain, SMAA targets and TAA history. [`FrameTargets`] is the
//! per-frame bookkeeping around them:
//!
//! - [`provision`](FrameTargets::provision) allocates what the plan selects,
//!   on first use, and applies the requested bloom range.
//! - [`publish`](FrameTargets::publish) exposes allocated images to the
//!   resource table.
//! - [`finish_frame`](FrameTargets::finish_frame) advances TAA history after
//!   a frame in which TAA ran.
//!
//! Targets are kept once allocated, so toggling a stage back on does not
//! reallocate. Everything is generic over [`TextureFactory`].

use super::passes::{AoTargets, BloomTargets, SmaaTargets, TaaHistory};
use super::plan::{FramePlan, PassId};
use super::resource::ResourceTable;
use crate::renderer::resources::{ResourcePool, TextureFactory};
use crate::settings::{AntiAliasMethod, RenderSettings};

#[derive(Debug, Clone)]
pub struct FrameTargets {
    ao: AoTargets,
    bloom: Option<BloomTargets>,
    smaa: Option<SmaaTargets>,
    taa: Option<TaaHistory>,
    /// TAA ran in the previous frame.
    taa_active: bool,
    width: u32,
    height: u32,
}

impl FrameTargets {
    /// Only the 1×1 white occlusion texture is allocated up front.
    pub fn new<F>(pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32) -> Self
    where
        F: TextureFactory + ?Sized,
    {
        Self {
            ao: AoTargets::new(pool, factory, width, height),
            bloom: None,
            smaa: None,
            taa: None,
            taa_active: false,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Allocates the targets `plan` needs and requests a history reset
    /// when TAA starts again after frames without it.
    pub fn provision<F>(
        &mut self,
        pool: &mut ResourcePool<F::Texture>,
        factory: &F,
        plan: &FramePlan,
        settings: &RenderSettings,
    ) where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (self.width, self.height);
        self.ao.select(pool, factory, plan.ao());

        if plan.contains(PassId::Bloom) {
            let range = settings.bloom.range();
            match &mut self.bloom {
                Some(bloom) => {
                    bloom.set_range(range, pool, factory);
                }
                None => {
                    log::debug!("Allocating bloom chain ({range} mips requested)");
                    self.bloom = Some(BloomTargets::new(pool, factory, width, height, range));
                }
            }
        }

        match plan.antialias() {
            AntiAliasMethod::Smaa => {
                if self.smaa.is_none() {
                    log::debug!("Allocating SMAA targets");
                    self.smaa = Some(SmaaTargets::new(pool, factory, width, height));
                }
            }
            AntiAliasMethod::Taa => {
                let taa_active = self.taa_active;
                let history = self.taa.get_or_insert_with(|| {
                    log::debug!("Allocating TAA history");
                    TaaHistory::new(pool, factory, width, height)
                });
                if !taa_active {
                    history.request_reset();
                }
            }
            AntiAliasMethod::None => {}
        }
    }

    /// Reallocates every allocated target at the new extent.
    pub fn resize<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32)
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (width.max(1), height.max(1));
        self.ao.resize(pool, factory, width, height);
        if let Some(bloom) = &mut self.bloom {
            bloom.resize(pool, factory, width, height);
        }
        if let Some(smaa) = &mut self.smaa {
            smaa.resize(pool, factory, width, height);
        }
        if let Some(taa) = &mut self.taa {
            taa.resize(pool, factory, width, height);
        }
        self.width = width;
        self.height = height;
    }

    pub fn publish(&self, plan: &FramePlan, table: &mut ResourceTable) {
        self.ao.publish(plan.ao(), table);
        if let Some(bloom) = &self.bloom {
            bloom.publish(table);
        }
        if let Some(smaa) = &self.smaa {
            smaa.publish(table);
        }
        if let Some(taa) = &self.taa {
            taa.publish(table);
        }
    }

    /// Call once after the frame built from `plan` was submitted.
    pub fn finish_frame(&mut self, plan: &FramePlan) {
        let taa = plan.antialias() == AntiAliasMethod::Taa;
        if taa && let Some(history) = &mut self.taa {
            history.complete_frame();
        }
        self.taa_active = taa;
    }

    #[inline]
    #[must_use]
    pub fn ao(&self) -> &AoTargets {
        &self.ao
    }

    #[inline]
    #[must_use]
    pub fn bloom(&self) -> Option<&BloomTargets> {
        self.bloom.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn smaa(&self) -> Option<&SmaaTargets> {
        self.smaa.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn taa(&self) -> Option<&TaaHistory> {
        self.taa.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn taa_active(&self) -> bool {
        self.taa_active
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
