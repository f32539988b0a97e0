//! Ambient Occlusion
//!
//! One occlusion image per frame, from whichever method is selected:
//!
//! | Method | Passes | Output |
//! |--------|--------|--------|
//! | `None` | none | 1×1 `R8Unorm` white constant |
//! | `Ssao` | raw kernel sampling → blur (render, stencil-masked) | full-res `R8Unorm` |
//! | `Gtao` | slice horizon integration → denoise (compute) | half-res `R32Float` |
//!
//! [`AoTargets`] owns the images of all three methods. SSAO and GTAO images
//! are only allocated the first time their method is selected; from then on
//! they follow resizes.

pub mod gtao;
pub mod ssao;

pub use gtao::GtaoPass;
pub use ssao::SsaoPass;

use crate::renderer::graph::resource::{GraphResource, ResourceTable};
use crate::renderer::resources::{ResourcePool, TextureDesc, TextureFactory, TextureHandle};
use crate::settings::AoMethod;

pub const SSAO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Storage-capable single channel, written by the GTAO compute passes.
pub const GTAO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

pub const WHITE_OCCLUSION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// GTAO extent for a full-resolution extent.
#[inline]
#[must_use]
pub fn gtao_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

fn ssao_descs(width: u32, height: u32) -> [TextureDesc; 2] {
    let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    [
        TextureDesc::new_2d("SSAO Raw", width, height, SSAO_FORMAT, usage),
        TextureDesc::new_2d("SSAO Blurred", width, height, SSAO_FORMAT, usage),
    ]
}

fn gtao_descs(width: u32, height: u32) -> [TextureDesc; 2] {
    let (w, h) = gtao_extent(width, height);
    let usage = wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING;
    [
        TextureDesc::new_2d("GTAO Raw", w, h, GTAO_FORMAT, usage),
        TextureDesc::new_2d("GTAO Denoised", w, h, GTAO_FORMAT, usage),
    ]
}

/// Occlusion images for every AO method.
#[derive(Debug, Clone)]
pub struct AoTargets {
    white: TextureHandle,
    /// `[raw, blurred]`
    ssao: Option<[TextureHandle; 2]>,
    /// `[raw, denoised]`
    gtao: Option<[TextureHandle; 2]>,
    width: u32,
    height: u32,
}

impl AoTargets {
    /// Allocates the white constant only. Its texel must be filled with 1.0
    /// by the caller.
    pub fn new<F>(pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32) -> Self
    where
        F: TextureFactory + ?Sized,
    {
        let white = pool.allocate(
            factory,
            TextureDesc::new_2d(
                "White Occlusion",
                1,
                1,
                WHITE_OCCLUSION_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ),
        );
        Self {
            white,
            ssao: None,
            gtao: None,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Makes sure `method`'s images exist.
    pub fn select<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, method: AoMethod)
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (self.width, self.height);
        match method {
            AoMethod::None => {}
            AoMethod::Ssao if self.ssao.is_none() => {
                log::debug!("Allocating SSAO targets");
                self.ssao = Some(ssao_descs(width, height).map(|d| pool.allocate(factory, d)));
            }
            AoMethod::Gtao if self.gtao.is_none() => {
                log::debug!("Allocating GTAO targets");
                self.gtao = Some(gtao_descs(width, height).map(|d| pool.allocate(factory, d)));
            }
            AoMethod::Ssao | AoMethod::Gtao => {}
        }
    }

    /// Reallocates every image that exists. The white constant never
    /// changes size.
    pub fn resize<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32)
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (width.max(1), height.max(1));
        self.width = width;
        self.height = height;
        if let Some(handles) = &mut self.ssao {
            pool.reallocate(factory, handles, |d| d.clone().with_size(width, height));
        }
        if let Some(handles) = &mut self.gtao {
            let (w, h) = gtao_extent(width, height);
            pool.reallocate(factory, handles, |d| d.clone().with_size(w, h));
        }
    }

    /// Occlusion image read by lighting for `method`. Falls back to the
    /// white constant when the method's images were never allocated.
    #[must_use]
    pub fn output(&self, method: AoMethod) -> TextureHandle {
        match method {
            AoMethod::None => self.white,
            AoMethod::Ssao => self.ssao.map_or(self.white, |[_, blurred]| blurred),
            AoMethod::Gtao => self.gtao.map_or(self.white, |[_, denoised]| denoised),
        }
    }

    /// Intermediate image of `method`, if it has one.
    #[must_use]
    pub fn scratch(&self, method: AoMethod) -> Option<TextureHandle> {
        match method {
            AoMethod::None => None,
            AoMethod::Ssao => self.ssao.map(|[raw, _]| raw),
            AoMethod::Gtao => self.gtao.map(|[raw, _]| raw),
        }
    }

    #[inline]
    #[must_use]
    pub fn white(&self) -> TextureHandle {
        self.white
    }

    #[must_use]
    pub fn is_allocated(&self, method: AoMethod) -> bool {
        match method {
            AoMethod::None => true,
            AoMethod::Ssao => self.ssao.is_some(),
            AoMethod::Gtao => self.gtao.is_some(),
        }
    }

    /// Registers the white constant and, for a running method, its images.
    pub fn publish(&self, method: AoMethod, table: &mut ResourceTable) {
        table.insert(GraphResource::WhiteOcclusion, self.white);
        if method != AoMethod::None {
            table.insert(GraphResource::Occlusion, self.output(method));
        }
        if let Some(scratch) = self.scratch(method) {
            table.insert(GraphResource::AoScratch, scratch);
        }
    }
}
