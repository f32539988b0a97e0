//! Draw list contract.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Center of the box after applying `matrix`.
    #[inline]
    #[must_use]
    pub fn transformed_center(&self, matrix: &Mat4) -> Vec3 {
        matrix.transform_point3(self.center())
    }
}

/// A drawable mesh as seen by the renderer.
///
/// Everything GPU-specific about the mesh (vertex/index buffers, material
/// parameters and textures) stays behind [`bind_material`](Self::bind_material)
/// and [`draw`](Self::draw); the renderer only sets its own bind groups and
/// pipeline before calling them.
pub trait DrawMesh {
    /// Mesh transform relative to the scene's model root.
    fn transform(&self) -> Mat4;

    /// The transform used in the previous frame (for velocity).
    fn previous_transform(&self) -> Mat4 {
        self.transform()
    }

    /// Local-space bounds.
    fn bounds(&self) -> Aabb;

    /// Material requires alpha blending (drawn by the transparency pass).
    fn alpha_blend(&self) -> bool;

    /// Material disables back-face culling.
    fn double_sided(&self) -> bool;

    /// Binds the material's uniform block and textures at bind group `group`.
    fn bind_material(&self, pass: &mut wgpu::RenderPass<'_>, group: u32);

    /// Binds vertex/index buffers and issues the draw call.
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>);
}

/// Ordered scene draw list, read once per frame.
pub trait SceneSource {
    fn mesh_count(&self) -> usize;

    fn mesh(&self, index: usize) -> &dyn DrawMesh;

    /// Root transform applied to every mesh.
    fn model_matrix(&self) -> Mat4;

    fn previous_model_matrix(&self) -> Mat4 {
        self.model_matrix()
    }

    /// Skinning matrices for the current animation pose. Empty when the scene
    /// is not animated.
    fn bone_matrices(&self) -> &[Mat4] {
        &[]
    }
}

impl dyn SceneSource + '_ {
    /// Iterates `(index, mesh)` pairs in draw-list order.
    pub fn meshes(&self) -> impl Iterator<Item = (usize, &dyn DrawMesh)> + '_ {
        (0..self.mesh_count()).map(move |i| (i, self.mesh(i)))
    }

    /// Meshes rasterized into the G-buffer.
    pub fn opaque_meshes(&self) -> impl Iterator<Item = (usize, &dyn DrawMesh)> + '_ {
        self.meshes().filter(|(_, m)| !m.alpha_blend())
    }

    /// Meshes drawn by the transparency pass.
    pub fn transparent_meshes(&self) -> impl Iterator<Item = (usize, &dyn DrawMesh)> + '_ {
        self.meshes().filter(|(_, m)| m.alpha_blend())
    }
}
