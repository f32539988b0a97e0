//! Temporal State Tests
//!
//! Tests for:
//! - TAA history ping-pong parity over many frames
//! - History reset on allocation, resize and explicit request
//! - Halton jitter sequence bounds and period
//! - Generic PingPong slot roles

mod common;

use common::DescFactory;
use lantern::renderer::graph::passes::TaaHistory;
use lantern::renderer::graph::passes::taa::{TAA_JITTER_SAMPLES, halton, jitter_offset};
use lantern::renderer::graph::{GraphResource, ResourceTable};
use lantern::renderer::resources::{PingPong, ResourcePool};

const EPSILON: f32 = 1e-6;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// TAA history parity
// ============================================================================

#[test]
fn write_index_follows_frame_parity() {
    let mut pool = ResourcePool::new();
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 640, 360);

    for n in 0..37u64 {
        assert_eq!(history.completed_frames(), n);
        assert_eq!(history.write_index() as u64, n % 2, "frame {n}");
        assert_eq!(history.read_index(), 1 - history.write_index());
        history.complete_frame();
    }
}

#[test]
fn previous_frame_output_is_next_frame_input() {
    let mut pool = ResourcePool::new();
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 64, 64);

    let written = history.current();
    history.complete_frame();
    assert_eq!(history.previous(), written);
    assert_ne!(history.current(), written);
}

#[test]
fn publish_maps_both_roles() {
    let mut pool = ResourcePool::new();
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 64, 64);
    history.complete_frame();

    let mut table = ResourceTable::new();
    history.publish(&mut table);
    assert_eq!(table.handle(GraphResource::TaaHistoryCurrent), Some(history.current()));
    assert_eq!(table.handle(GraphResource::TaaHistoryPrevious), Some(history.previous()));
}

#[test]
fn history_images_match_extent() {
    let mut pool = ResourcePool::new();
    let history = TaaHistory::new(&mut pool, &DescFactory, 800, 600);
    for handle in history.handles() {
        let desc = pool.get(*handle).unwrap();
        assert_eq!((desc.width, desc.height), (800, 600));
        assert_eq!(desc.format, wgpu::TextureFormat::Rgba16Float);
        assert!(desc.usage.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn fresh_history_needs_reset_until_first_frame() {
    let mut pool = ResourcePool::new();
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 64, 64);
    assert!(history.needs_reset());
    history.complete_frame();
    assert!(!history.needs_reset());

    history.request_reset();
    assert!(history.needs_reset());
}

#[test]
fn resize_resets_and_replaces_images() {
    let mut pool = ResourcePool::new();
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 64, 64);
    history.complete_frame();
    history.complete_frame();
    history.complete_frame();
    let old = *history.handles();

    history.resize(&mut pool, &DescFactory, 128, 32);

    assert!(history.needs_reset());
    assert_eq!(pool.live_count(), 2);
    for handle in old {
        assert!(!pool.contains(handle));
    }
    for handle in history.handles() {
        let desc = pool.get(*handle).unwrap();
        assert_eq!((desc.width, desc.height), (128, 32));
    }
}

#[test]
fn resize_keeps_write_parity() {
    let mut pool = ResourcePool::new();
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 64, 64);

    for frames in 1..=5u64 {
        history.complete_frame();
        history.resize(&mut pool, &DescFactory, 64 + frames as u32, 32);
        assert_eq!(history.completed_frames(), frames);
        assert_eq!(history.write_index() as u64, frames % 2);
        assert_ne!(history.read_index(), history.write_index());
    }

    // The first frame after a resize still swaps normally.
    history.complete_frame();
    assert_eq!(history.write_index() as u64, history.completed_frames() % 2);
    assert!(!history.needs_reset());
}

// ============================================================================
// Jitter
// ============================================================================

#[test]
fn halton_base_two_is_van_der_corput() {
    let expected = [0.5, 0.25, 0.75, 0.125, 0.625, 0.375, 0.875];
    for (i, e) in expected.iter().enumerate() {
        assert!(approx(halton(i as u32 + 1, 2), *e), "index {}", i + 1);
    }
}

#[test]
fn jitter_is_periodic_and_sub_pixel() {
    let (w, h) = (1920, 1080);
    let pixel = (2.0 / w as f32, 2.0 / h as f32);
    for frame in 0..TAA_JITTER_SAMPLES * 3 {
        let j = jitter_offset(frame, w, h);
        assert!(j.x.abs() <= pixel.0 * 0.5 + EPSILON);
        assert!(j.y.abs() <= pixel.1 * 0.5 + EPSILON);
        assert_eq!(j, jitter_offset(frame + TAA_JITTER_SAMPLES, w, h));
    }
}

#[test]
fn jitter_samples_are_distinct_within_a_cycle() {
    let samples: Vec<_> = (0..TAA_JITTER_SAMPLES).map(|f| jitter_offset(f, 100, 100)).collect();
    for (i, a) in samples.iter().enumerate() {
        for b in &samples[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

// ============================================================================
// PingPong
// ============================================================================

#[test]
fn ping_pong_swap_roles() {
    let mut pp = PingPong::new(10, 20);
    assert_eq!((*pp.current(), *pp.previous()), (10, 20));
    pp.swap();
    assert_eq!((*pp.current(), *pp.previous()), (20, 10));
    pp.swap();
    pp.swap();
    assert_eq!(pp.current_index(), 1);
    assert_eq!(pp.previous_index(), 0);
}
