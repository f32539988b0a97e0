//! Transparency Ordering Tests
//!
//! Tests for:
//! - Back-to-front ordering of alpha-blended meshes
//! - Stability for equal distances
//! - Opaque meshes excluded from the transparent list
//! - Mesh and model transforms applied to bounds

use glam::{Mat4, Vec3};
use lantern::renderer::graph::passes::sort_back_to_front;
use lantern::scene::{Aabb, DrawMesh, SceneSource};

struct TestMesh {
    center: Vec3,
    blend: bool,
}

impl DrawMesh for TestMesh {
    fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.center)
    }

    fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn alpha_blend(&self) -> bool {
        self.blend
    }

    fn double_sided(&self) -> bool {
        false
    }

    fn bind_material(&self, _pass: &mut wgpu::RenderPass<'_>, _group: u32) {}

    fn draw(&self, _pass: &mut wgpu::RenderPass<'_>) {}
}

struct TestScene {
    meshes: Vec<TestMesh>,
    root: Mat4,
}

impl TestScene {
    fn new(meshes: Vec<TestMesh>) -> Self {
        Self {
            meshes,
            root: Mat4::IDENTITY,
        }
    }
}

impl SceneSource for TestScene {
    fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    fn mesh(&self, index: usize) -> &dyn DrawMesh {
        &self.meshes[index]
    }

    fn model_matrix(&self) -> Mat4 {
        self.root
    }
}

fn blended(z: f32) -> TestMesh {
    TestMesh {
        center: Vec3::new(0.0, 0.0, z),
        blend: true,
    }
}

fn indices(scene: &TestScene, eye: Vec3) -> Vec<usize> {
    sort_back_to_front(scene, eye).iter().map(|d| d.index).collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn farthest_mesh_is_drawn_first() {
    let scene = TestScene::new(vec![blended(-2.0), blended(-10.0), blended(-5.0)]);
    assert_eq!(indices(&scene, Vec3::ZERO), vec![1, 2, 0]);
}

#[test]
fn distances_are_non_increasing() {
    let scene = TestScene::new((0..20).map(|i| blended(-((i * 7 % 13) as f32))).collect());
    let draws = sort_back_to_front(&scene, Vec3::new(0.0, 1.0, 3.0));
    assert_eq!(draws.len(), 20);
    assert!(draws.windows(2).all(|w| w[0].distance >= w[1].distance));
}

#[test]
fn equal_distances_keep_draw_list_order() {
    let scene = TestScene::new(vec![
        blended(-3.0),
        TestMesh {
            center: Vec3::new(3.0, 0.0, 0.0),
            blend: true,
        },
        blended(3.0),
        blended(-8.0),
    ]);
    assert_eq!(indices(&scene, Vec3::ZERO), vec![3, 0, 1, 2]);
}

#[test]
fn opaque_meshes_are_skipped() {
    let scene = TestScene::new(vec![
        TestMesh {
            center: Vec3::new(0.0, 0.0, -50.0),
            blend: false,
        },
        blended(-1.0),
    ]);
    assert_eq!(indices(&scene, Vec3::ZERO), vec![1]);
}

#[test]
fn empty_scene_yields_empty_list() {
    let scene = TestScene::new(Vec::new());
    assert!(sort_back_to_front(&scene, Vec3::ZERO).is_empty());
}

// ============================================================================
// Transforms
// ============================================================================

#[test]
fn model_root_moves_every_mesh() {
    let mut scene = TestScene::new(vec![blended(-1.0), blended(1.0)]);
    // Eye at origin: both at distance 1 without a root transform.
    scene.root = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
    let draws = sort_back_to_front(&scene, Vec3::ZERO);
    assert_eq!(draws[0].index, 0);
    assert!((draws[0].distance - 11.0).abs() < 1e-5);
    assert!((draws[1].distance - 9.0).abs() < 1e-5);
}
