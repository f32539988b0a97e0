//! Resource Pool Tests
//!
//! Tests for:
//! - Handle allocation, release and staleness
//! - Group reallocation without leaks
//! - G-buffer formats, resize idempotence and destruction
//! - Attachment masking

mod common;

use common::DescFactory;
use lantern::renderer::resources::gbuffer::{GBUFFER_DEPTH_FORMAT, full_mask};
use lantern::renderer::resources::{AttachmentMask, AttachmentSet, GBuffer, GBufferTarget, ResourcePool, TextureDesc};

fn color(label: &'static str, w: u32, h: u32) -> TextureDesc {
    TextureDesc::new_2d(
        label,
        w,
        h,
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT,
    )
}

// ============================================================================
// Pool
// ============================================================================

#[test]
fn released_handle_goes_stale() {
    let mut pool = ResourcePool::new();
    let handle = pool.allocate(&DescFactory, color("A", 4, 4));
    assert!(pool.contains(handle));
    assert_eq!(pool.desc(handle).map(|d| d.label), Some("A"));

    assert!(pool.release(handle));
    assert!(!pool.release(handle));
    assert!(pool.get(handle).is_none());
    assert_eq!(pool.live_count(), 0);

    // The slot is reused under a new generation.
    let next = pool.allocate(&DescFactory, color("B", 4, 4));
    assert_ne!(next, handle);
    assert!(!pool.contains(handle));
}

#[test]
fn reallocate_replaces_every_live_handle() {
    let mut pool = ResourcePool::new();
    let mut handles = [
        pool.allocate(&DescFactory, color("A", 8, 8)),
        pool.allocate(&DescFactory, color("B", 8, 8)),
    ];
    let old = handles;

    pool.reallocate(&DescFactory, &mut handles, |d| d.clone().with_size(16, 2));

    assert_eq!(pool.live_count(), 2);
    assert_eq!(pool.total_allocations(), 4);
    for (new, old) in handles.iter().zip(old) {
        assert!(!pool.contains(old));
        let desc = pool.get(*new).unwrap();
        assert_eq!((desc.width, desc.height), (16, 2));
    }
    assert_eq!(pool.get(handles[1]).unwrap().label, "B");
}

#[test]
fn reallocate_skips_stale_handles() {
    let mut pool = ResourcePool::new();
    let live = pool.allocate(&DescFactory, color("Live", 8, 8));
    let stale = pool.allocate(&DescFactory, color("Stale", 8, 8));
    pool.release(stale);

    let mut handles = [live, stale];
    pool.reallocate(&DescFactory, &mut handles, |d| d.clone().with_size(2, 2));

    assert_eq!(handles[1], stale);
    assert_ne!(handles[0], live);
    assert_eq!(pool.live_count(), 1);
}

#[test]
fn descriptors_never_reach_zero_extent() {
    let desc = color("Z", 0, 0);
    assert_eq!((desc.width, desc.height), (1, 1));
    let desc = desc.with_size(0, 9).with_mips(0);
    assert_eq!((desc.width, desc.height, desc.mip_level_count), (1, 9, 1));
}

#[test]
fn mip_sizes_halve_down_to_one() {
    let desc = color("M", 100, 30).with_mips(7);
    assert_eq!(desc.mip_size(0), (100, 30));
    assert_eq!(desc.mip_size(1), (50, 15));
    assert_eq!(desc.mip_size(4), (6, 1));
    assert_eq!(desc.mip_size(6), (1, 1));
}

// ============================================================================
// G-buffer
// ============================================================================

#[test]
fn gbuffer_formats() {
    let mut pool = ResourcePool::new();
    let gbuffer = GBuffer::new(&mut pool, &DescFactory, 320, 200);

    assert_eq!(gbuffer.handles().len(), 7);
    for target in GBufferTarget::ALL {
        let desc = pool.get(gbuffer.target(target)).unwrap();
        assert_eq!(desc.format, target.format());
        assert_eq!((desc.width, desc.height), (320, 200));
    }
    assert_eq!(
        pool.get(gbuffer.target(GBufferTarget::Position)).unwrap().format,
        wgpu::TextureFormat::Rgba32Float
    );
    assert_eq!(
        pool.get(gbuffer.target(GBufferTarget::Velocity)).unwrap().format,
        wgpu::TextureFormat::Rg16Float
    );
    assert_eq!(pool.get(gbuffer.depth_stencil()).unwrap().format, GBUFFER_DEPTH_FORMAT);
}

#[test]
fn gbuffer_resize_is_idempotent_and_leak_free() {
    let mut pool = ResourcePool::new();
    let mut gbuffer = GBuffer::new(&mut pool, &DescFactory, 320, 200);
    let original: Vec<_> = gbuffer.handles().to_vec();

    for _ in 0..5 {
        gbuffer.resize(&mut pool, &DescFactory, 640, 480);
    }

    assert_eq!(gbuffer.extent(), (640, 480));
    assert_eq!(pool.live_count(), 7);
    assert!(original.iter().all(|h| !pool.contains(*h)));
    for handle in gbuffer.handles() {
        let desc = pool.get(*handle).unwrap();
        assert_eq!((desc.width, desc.height), (640, 480));
    }
}

#[test]
fn gbuffer_destroy_releases_everything() {
    let mut pool = ResourcePool::new();
    let gbuffer = GBuffer::new(&mut pool, &DescFactory, 16, 16);
    gbuffer.destroy(&mut pool);
    assert_eq!(pool.live_count(), 0);
}

// ============================================================================
// Attachments
// ============================================================================

#[test]
fn masked_attachments_keep_slot_positions() {
    let mut pool = ResourcePool::new();
    let gbuffer = GBuffer::new(&mut pool, &DescFactory, 16, 16);
    let set = gbuffer.attachments();

    assert_eq!(set.colors().len(), 6);
    assert_eq!(set.depth_stencil(), Some(gbuffer.depth_stencil()));

    let mask = GBufferTarget::BaseColor.mask() | GBufferTarget::Velocity.mask();
    let slots: Vec<_> = set.masked(mask).collect();
    assert_eq!(slots.len(), 6);
    assert_eq!(slots[GBufferTarget::BaseColor.slot()], Some(gbuffer.target(GBufferTarget::BaseColor)));
    assert_eq!(slots[GBufferTarget::Velocity.slot()], Some(gbuffer.target(GBufferTarget::Velocity)));
    assert_eq!(slots.iter().filter(|s| s.is_some()).count(), 2);

    assert!(set.masked(full_mask()).all(|s| s.is_some()));
    assert_eq!(set.handles().count(), 7);
}

#[test]
fn attachment_mask_slots() {
    assert_eq!(AttachmentMask::slot(0), Some(AttachmentMask::SLOT_0));
    assert_eq!(AttachmentMask::slot(7), Some(AttachmentMask::SLOT_7));
    assert_eq!(AttachmentMask::slot(8), None);
    assert_eq!(AttachmentMask::slot(usize::MAX), None);
    assert_eq!(full_mask().bits(), 0b0011_1111);
}

#[test]
fn slots_past_the_mask_width_are_never_active() {
    let mut pool = ResourcePool::new();
    let handles: Vec<_> = (0..9).map(|_| pool.allocate(&DescFactory, color("C", 2, 2))).collect();
    let set = AttachmentSet::new(handles.iter().copied(), None);

    let slots: Vec<_> = set.masked(AttachmentMask::all()).collect();
    assert_eq!(slots.len(), 9);
    assert!(slots[..8].iter().all(Option::is_some));
    assert_eq!(slots[8], None);
}
