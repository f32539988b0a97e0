//! Frame Plan Tests
//!
//! Tests for:
//! - Canonical stage order for every settings combination
//! - Exactly one antialias decision per plan
//! - AO branch selection and the white-occlusion fallback
//! - Debug-output short-circuit
//! - Color threading through TAA / Bloom / SMAA into the final composite
//! - Producer/consumer validation

use lantern::renderer::graph::{FramePlan, GraphResource, PassId};
use lantern::renderer::resources::GBufferTarget;
use lantern::settings::{AntiAliasMethod, AoMethod, DebugOutput, RenderSettings};

fn settings(ao: AoMethod, antialias: AntiAliasMethod, bloom: bool) -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.ao = ao;
    settings.antialias = antialias;
    settings.bloom.set_enabled(bloom);
    settings
}

/// Every combination of AO, AA and bloom.
fn all_settings() -> Vec<RenderSettings> {
    let mut out = Vec::new();
    for ao in AoMethod::ALL {
        for aa in AntiAliasMethod::ALL {
            for bloom in [false, true] {
                out.push(settings(ao, aa, bloom));
            }
        }
    }
    out
}

fn ids(plan: &FramePlan) -> Vec<PassId> {
    plan.pass_ids().collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn default_settings_produce_minimal_chain() {
    let plan = FramePlan::build(&RenderSettings::default());
    assert_eq!(
        ids(&plan),
        vec![
            PassId::UpdateFrameUniforms,
            PassId::Animation,
            PassId::Geometry,
            PassId::Shadow,
            PassId::LightingResolve,
            PassId::SkyboxComposite,
            PassId::Transparency,
            PassId::FinalComposite,
            PassId::SavePreviousFrameState,
        ]
    );
}

#[test]
fn full_chain_order() {
    let plan = FramePlan::build(&settings(AoMethod::Gtao, AntiAliasMethod::Taa, true));
    assert_eq!(
        ids(&plan),
        vec![
            PassId::UpdateFrameUniforms,
            PassId::Animation,
            PassId::Geometry,
            PassId::Shadow,
            PassId::Gtao,
            PassId::LightingResolve,
            PassId::SkyboxComposite,
            PassId::Transparency,
            PassId::Taa,
            PassId::Bloom,
            PassId::FinalComposite,
            PassId::SavePreviousFrameState,
        ]
    );
}

#[test]
fn stages_follow_canonical_order_in_every_plan() {
    for s in all_settings() {
        let plan = FramePlan::build(&s);
        let order = ids(&plan);
        assert!(order.windows(2).all(|w| w[0] < w[1]), "out of order for {s:?}: {order:?}");
        assert_eq!(order.first(), Some(&PassId::UpdateFrameUniforms));
        assert_eq!(order.last(), Some(&PassId::SavePreviousFrameState));
    }
}

#[test]
fn every_plan_validates() {
    for s in all_settings() {
        assert_eq!(FramePlan::build(&s).validate(), Ok(()), "{s:?}");
    }
    for channel in DebugOutput::ALL {
        let mut s = settings(AoMethod::Ssao, AntiAliasMethod::Taa, true);
        s.debug_output = channel;
        assert_eq!(FramePlan::build(&s).validate(), Ok(()), "{channel:?}");
    }
}

// ============================================================================
// Antialiasing
// ============================================================================

#[test]
fn exactly_one_antialias_decision() {
    for s in all_settings() {
        let plan = FramePlan::build(&s);
        let taa = plan.contains(PassId::Taa);
        let smaa = plan.contains(PassId::Smaa);
        assert!(!(taa && smaa), "{s:?}");
        assert_eq!(plan.antialias(), s.antialias);
        match plan.antialias() {
            AntiAliasMethod::None => assert!(!taa && !smaa),
            AntiAliasMethod::Smaa => assert!(smaa && !taa),
            AntiAliasMethod::Taa => assert!(taa && !smaa),
        }
    }
}

#[test]
fn taa_reads_previous_history_and_writes_current() {
    let plan = FramePlan::build(&settings(AoMethod::None, AntiAliasMethod::Taa, false));
    let taa = plan.get(PassId::Taa).unwrap();
    assert!(taa.reads(GraphResource::TaaHistoryPrevious));
    assert!(taa.reads(GraphResource::GBuffer(GBufferTarget::Velocity)));
    assert!(taa.reads(GraphResource::DepthStencil));
    assert!(taa.writes(GraphResource::TaaHistoryCurrent));
    assert!(!taa.writes(GraphResource::TaaHistoryPrevious));
    assert_eq!(taa.color_input, Some(GraphResource::LitColor));
}

// ============================================================================
// Ambient occlusion
// ============================================================================

#[test]
fn ao_branch_matches_method() {
    for ao in AoMethod::ALL {
        let plan = FramePlan::build(&settings(ao, AntiAliasMethod::None, false));
        assert_eq!(plan.contains(PassId::Ssao), ao == AoMethod::Ssao);
        assert_eq!(plan.contains(PassId::Gtao), ao == AoMethod::Gtao);
        assert_eq!(plan.ao(), ao);

        let lighting = plan.get(PassId::LightingResolve).unwrap();
        if ao == AoMethod::None {
            assert!(lighting.reads(GraphResource::WhiteOcclusion));
            assert!(!lighting.reads(GraphResource::Occlusion));
        } else {
            assert!(lighting.reads(GraphResource::Occlusion));
            assert!(!lighting.reads(GraphResource::WhiteOcclusion));
        }
    }
}

#[test]
fn gtao_reads_base_color_and_ssao_does_not() {
    let gtao = FramePlan::build(&settings(AoMethod::Gtao, AntiAliasMethod::None, false));
    let ssao = FramePlan::build(&settings(AoMethod::Ssao, AntiAliasMethod::None, false));
    let base = GraphResource::GBuffer(GBufferTarget::BaseColor);
    assert!(gtao.get(PassId::Gtao).unwrap().reads(base));
    assert!(!ssao.get(PassId::Ssao).unwrap().reads(base));
}

// ============================================================================
// Debug output
// ============================================================================

#[test]
fn debug_output_short_circuits_after_ao() {
    let mut s = settings(AoMethod::Ssao, AntiAliasMethod::Smaa, true);
    s.debug_output = DebugOutput::Normal;
    let plan = FramePlan::build(&s);
    assert_eq!(
        ids(&plan),
        vec![
            PassId::UpdateFrameUniforms,
            PassId::Animation,
            PassId::Geometry,
            PassId::Shadow,
            PassId::Ssao,
            PassId::DebugOutput,
            PassId::SavePreviousFrameState,
        ]
    );
    assert_eq!(plan.antialias(), AntiAliasMethod::None);
    assert_eq!(plan.final_input(), None);
    assert!(plan.get(PassId::DebugOutput).unwrap().reads(GraphResource::Occlusion));
}

#[test]
fn debug_output_without_ao_reads_white() {
    let mut s = RenderSettings::default();
    s.debug_output = DebugOutput::Occlusion;
    let plan = FramePlan::build(&s);
    let debug = plan.get(PassId::DebugOutput).unwrap();
    assert!(debug.reads(GraphResource::WhiteOcclusion));
    assert!(debug.writes(GraphResource::Surface));
}

// ============================================================================
// Color threading
// ============================================================================

#[test]
fn final_composite_reads_end_of_chain() {
    let cases = [
        (AntiAliasMethod::None, false, GraphResource::LitColor),
        (AntiAliasMethod::Taa, false, GraphResource::TaaHistoryCurrent),
        (AntiAliasMethod::None, true, GraphResource::BloomOutput),
        (AntiAliasMethod::Taa, true, GraphResource::BloomOutput),
        (AntiAliasMethod::Smaa, false, GraphResource::SmaaOutput),
        (AntiAliasMethod::Smaa, true, GraphResource::SmaaOutput),
    ];
    for (aa, bloom, expected) in cases {
        let plan = FramePlan::build(&settings(AoMethod::None, aa, bloom));
        assert_eq!(plan.final_input(), Some(expected), "{aa:?} bloom={bloom}");
        let composite = plan.get(PassId::FinalComposite).unwrap();
        assert_eq!(composite.color_input, Some(expected));
        assert_eq!(composite.reads.as_slice(), &[expected]);
    }
}

#[test]
fn bloom_reads_taa_output_and_smaa_reads_bloom_output() {
    let plan = FramePlan::build(&settings(AoMethod::None, AntiAliasMethod::Taa, true));
    assert_eq!(
        plan.get(PassId::Bloom).unwrap().color_input,
        Some(GraphResource::TaaHistoryCurrent)
    );

    let plan = FramePlan::build(&settings(AoMethod::None, AntiAliasMethod::Smaa, true));
    assert_eq!(
        plan.get(PassId::Smaa).unwrap().color_input,
        Some(GraphResource::BloomOutput)
    );
}

#[test]
fn no_stage_writes_a_read_only_resource() {
    for s in all_settings() {
        for pass in FramePlan::build(&s).passes() {
            assert!(pass.writes.iter().all(|r| !r.is_read_only()), "{:?}", pass.id);
        }
    }
}

#[test]
fn persistent_resources() {
    assert!(GraphResource::TaaHistoryPrevious.is_persistent());
    assert!(GraphResource::WhiteOcclusion.is_persistent());
    assert!(GraphResource::Environment.is_persistent());
    assert!(!GraphResource::TaaHistoryCurrent.is_persistent());
    assert!(!GraphResource::LitColor.is_persistent());
}
