//! Scene-side collaborators
//!
//! The renderer does not own scene data. Hosts describe what to draw through
//! the traits in this module:
//! - [`SceneSource`] / [`DrawMesh`]: ordered draw list with transforms and
//!   material flags
//! - [`CameraSource`]: view / projection / position, read once per frame
//! - [`Light`]: CPU-side light description packed into [`ShaderLight`]
//! - [`Environment`]: precomputed image-based lighting maps

pub mod camera;
pub mod environment;
pub mod light;
pub mod mesh;

pub use camera::{CameraSnapshot, CameraSource};
pub use environment::Environment;
pub use light::{Light, LightBlock, LightSpaceBlock, LightType, ShaderLight};
pub use mesh::{Aabb, DrawMesh, SceneSource};

use slotmap::new_key_type;

new_key_type! {
    pub struct LightKey;
}
