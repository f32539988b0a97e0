//! Frame Plan
//!
//! Decides, once per frame and from a settings snapshot, which passes run,
//! in which order, and which logical resources each one reads and writes.
//!
//! ```text
//! UpdateFrameUniforms → Animation → Geometry → Shadow → [Ssao | Gtao]
//!   ├─ debug view:  → DebugOutput → SavePreviousFrameState
//!   └─ otherwise:   → LightingResolve → SkyboxComposite → Transparency
//!                   → [Taa] → [Bloom] → [Smaa] → FinalComposite
//!                   → SavePreviousFrameState
//! ```
//!
//! The HDR color image is threaded through the optional stages: each stage
//! reads the color the previous stage produced and publishes its own output,
//! so `FinalComposite` always reads exactly one color source.
//!
//! The plan is pure data. Building it never touches the GPU, which keeps the
//! scheduling rules testable on their own.

use smallvec::SmallVec;
use thiserror::Error;

use super::resource::GraphResource;
use crate::renderer::resources::GBufferTarget;
use crate::settings::{AntiAliasMethod, AoMethod, RenderSettings};

/// Every stage the orchestrator knows about, in canonical order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum PassId {
    UpdateFrameUniforms,
    Animation,
    Geometry,
    Shadow,
    Ssao,
    Gtao,
    LightingResolve,
    SkyboxComposite,
    Transparency,
    Taa,
    Bloom,
    Smaa,
    FinalComposite,
    DebugOutput,
    SavePreviousFrameState,
}

impl PassId {
    pub const COUNT: usize = 15;

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UpdateFrameUniforms => "Update Frame Uniforms",
            Self::Animation => "Animation",
            Self::Geometry => "Geometry Pass",
            Self::Shadow => "Shadow Pass",
            Self::Ssao => "SSAO Pass",
            Self::Gtao => "GTAO Pass",
            Self::LightingResolve => "Lighting Resolve Pass",
            Self::SkyboxComposite => "Skybox Composite Pass",
            Self::Transparency => "Transparency Pass",
            Self::Taa => "TAA Pass",
            Self::Bloom => "Bloom Pass",
            Self::Smaa => "SMAA Pass",
            Self::FinalComposite => "Final Composite Pass",
            Self::DebugOutput => "Debug Output Pass",
            Self::SavePreviousFrameState => "Save Previous Frame State",
        }
    }

    /// Records GPU commands. The other stages only touch CPU state and
    /// queue uploads.
    #[must_use]
    pub const fn is_gpu(self) -> bool {
        !matches!(
            self,
            Self::UpdateFrameUniforms | Self::Animation | Self::SavePreviousFrameState
        )
    }
}

pub type ResourceList = SmallVec<[GraphResource; 12]>;

/// One scheduled stage with its declared inputs and outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedPass {
    pub id: PassId,
    pub reads: ResourceList,
    pub writes: ResourceList,
    /// For stages in the post-processing chain: which color image to read.
    pub color_input: Option<GraphResource>,
}

impl PlannedPass {
    fn new(id: PassId, reads: &[GraphResource], writes: &[GraphResource]) -> Self {
        Self {
            id,
            reads: reads.iter().copied().collect(),
            writes: writes.iter().copied().collect(),
            color_input: None,
        }
    }

    fn with_color_input(mut self, color: GraphResource) -> Self {
        self.color_input = Some(color);
        self
    }

    #[must_use]
    pub fn reads(&self, resource: GraphResource) -> bool {
        self.reads.contains(&resource)
    }

    #[must_use]
    pub fn writes(&self, resource: GraphResource) -> bool {
        self.writes.contains(&resource)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("{pass:?} reads {resource:?} before any pass writes it")]
    ReadBeforeWrite { pass: PassId, resource: GraphResource },

    #[error("{pass:?} writes read-only resource {resource:?}")]
    WritesReadOnly { pass: PassId, resource: GraphResource },

    #[error("{0:?} scheduled more than once")]
    DuplicatePass(PassId),
}

/// The ordered stage list for one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePlan {
    passes: Vec<PlannedPass>,
    ao: AoMethod,
    antialias: AntiAliasMethod,
    final_input: Option<GraphResource>,
}

impl FramePlan {
    /// Builds the plan for `settings`.
    ///
    /// A debug channel short-circuits the chain after AO; in that case the
    /// effective antialias method is `None` whatever the settings say.
    #[must_use]
    pub fn build(settings: &RenderSettings) -> Self {
        use GraphResource as R;

        let mut passes = Vec::with_capacity(PassId::COUNT);

        passes.push(PlannedPass::new(
            PassId::UpdateFrameUniforms,
            &[R::PreviousFrameState],
            &[R::FrameUniforms, R::ObjectUniforms, R::Lights, R::LightMatrices],
        ));
        passes.push(PlannedPass::new(PassId::Animation, &[], &[R::Bones]));

        let mut gbuffer_writes: ResourceList = R::GBUFFER.iter().copied().collect();
        gbuffer_writes.push(R::DepthStencil);
        passes.push(PlannedPass {
            id: PassId::Geometry,
            reads: [R::FrameUniforms, R::ObjectUniforms, R::Bones].into_iter().collect(),
            writes: gbuffer_writes,
            color_input: None,
        });

        passes.push(PlannedPass::new(
            PassId::Shadow,
            &[R::ObjectUniforms, R::Bones, R::LightMatrices],
            &[R::ShadowMap],
        ));

        let occlusion = match settings.ao {
            AoMethod::None => R::WhiteOcclusion,
            AoMethod::Ssao => {
                passes.push(PlannedPass::new(
                    PassId::Ssao,
                    &[
                        R::FrameUniforms,
                        R::GBuffer(GBufferTarget::Position),
                        R::GBuffer(GBufferTarget::NormalRoughness),
                        R::DepthStencil,
                    ],
                    &[R::AoScratch, R::Occlusion],
                ));
                R::Occlusion
            }
            AoMethod::Gtao => {
                passes.push(PlannedPass::new(
                    PassId::Gtao,
                    &[
                        R::FrameUniforms,
                        R::GBuffer(GBufferTarget::Position),
                        R::GBuffer(GBufferTarget::NormalRoughness),
                        R::GBuffer(GBufferTarget::BaseColor),
                        R::DepthStencil,
                    ],
                    &[R::AoScratch, R::Occlusion],
                ));
                R::Occlusion
            }
        };

        if settings.debug_output.is_enabled() {
            let mut reads: ResourceList = R::GBUFFER.iter().copied().collect();
            reads.extend([R::FrameUniforms, R::DepthStencil, occlusion]);
            passes.push(PlannedPass {
                id: PassId::DebugOutput,
                reads,
                writes: [R::Surface].into_iter().collect(),
                color_input: None,
            });
            passes.push(Self::save_state());
            return Self {
                passes,
                ao: settings.ao,
                antialias: AntiAliasMethod::None,
                final_input: None,
            };
        }

        let mut lighting_reads: ResourceList = R::GBUFFER.iter().copied().collect();
        lighting_reads.extend([
            R::FrameUniforms,
            R::Lights,
            R::LightMatrices,
            R::ShadowMap,
            occlusion,
            R::Environment,
        ]);
        passes.push(PlannedPass {
            id: PassId::LightingResolve,
            reads: lighting_reads,
            writes: [R::LitColor].into_iter().collect(),
            color_input: None,
        });

        passes.push(PlannedPass::new(
            PassId::SkyboxComposite,
            &[R::FrameUniforms, R::Environment, R::DepthStencil, R::LitColor],
            &[R::LitColor],
        ));

        passes.push(PlannedPass::new(
            PassId::Transparency,
            &[
                R::FrameUniforms,
                R::ObjectUniforms,
                R::Bones,
                R::Lights,
                R::LightMatrices,
                R::ShadowMap,
                R::Environment,
                R::DepthStencil,
            ],
            &[R::LitColor, R::DepthStencil],
        ));

        let mut color = R::LitColor;

        if settings.antialias == AntiAliasMethod::Taa {
            passes.push(
                PlannedPass::new(
                    PassId::Taa,
                    &[
                        color,
                        R::TaaHistoryPrevious,
                        R::GBuffer(GBufferTarget::Velocity),
                        R::DepthStencil,
                        R::FrameUniforms,
                    ],
                    &[R::TaaHistoryCurrent],
                )
                .with_color_input(color),
            );
            color = R::TaaHistoryCurrent;
        }

        if settings.bloom.enabled() {
            passes.push(
                PlannedPass::new(PassId::Bloom, &[color], &[R::BloomChain, R::BloomOutput]).with_color_input(color),
            );
            color = R::BloomOutput;
        }

        if settings.antialias == AntiAliasMethod::Smaa {
            passes.push(
                PlannedPass::new(PassId::Smaa, &[color], &[R::SmaaEdges, R::SmaaWeights, R::SmaaOutput])
                    .with_color_input(color),
            );
            color = R::SmaaOutput;
        }

        passes.push(PlannedPass::new(PassId::FinalComposite, &[color], &[R::Surface]).with_color_input(color));
        passes.push(Self::save_state());

        Self {
            passes,
            ao: settings.ao,
            antialias: settings.antialias,
            final_input: Some(color),
        }
    }

    fn save_state() -> PlannedPass {
        PlannedPass::new(
            PassId::SavePreviousFrameState,
            &[GraphResource::FrameUniforms],
            &[GraphResource::PreviousFrameState],
        )
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    pub fn pass_ids(&self) -> impl Iterator<Item = PassId> + '_ {
        self.passes.iter().map(|p| p.id)
    }

    #[must_use]
    pub fn contains(&self, id: PassId) -> bool {
        self.passes.iter().any(|p| p.id == id)
    }

    #[must_use]
    pub fn get(&self, id: PassId) -> Option<&PlannedPass> {
        self.passes.iter().find(|p| p.id == id)
    }

    /// Effective antialias method for this frame.
    #[inline]
    #[must_use]
    pub fn antialias(&self) -> AntiAliasMethod {
        self.antialias
    }

    #[inline]
    #[must_use]
    pub fn ao(&self) -> AoMethod {
        self.ao
    }

    /// Color image read by `FinalComposite`; `None` in debug view.
    #[inline]
    #[must_use]
    pub fn final_input(&self) -> Option<GraphResource> {
        self.final_input
    }

    /// Checks producer/consumer ordering.
    ///
    /// Every read must follow a write in the same frame unless the resource
    /// is persistent, no pass may write a read-only resource, and no stage
    /// appears twice.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen: SmallVec<[PassId; PassId::COUNT]> = SmallVec::new();
        let mut written: SmallVec<[GraphResource; 32]> = SmallVec::new();

        for pass in &self.passes {
            if seen.contains(&pass.id) {
                return Err(PlanError::DuplicatePass(pass.id));
            }
            seen.push(pass.id);

            if let Some(resource) = pass
                .reads
                .iter()
                .find(|r| !r.is_persistent() && !written.contains(*r))
            {
                return Err(PlanError::ReadBeforeWrite {
                    pass: pass.id,
                    resource: *resource,
                });
            }

            for resource in &pass.writes {
                if resource.is_read_only() {
                    return Err(PlanError::WritesReadOnly {
                        pass: pass.id,
                        resource: *resource,
                    });
                }
                if !written.contains(resource) {
                    written.push(*resource);
                }
            }
        }
        Ok(())
    }
}
