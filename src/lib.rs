//! Lantern: a deferred renderer built around a per-frame render graph.
//!
//! The host owns the window, device and scene; Lantern turns a
//! [`SceneSource`] and a [`CameraSource`] into a presented frame:
//!
//! ```text
//! G-buffer → shadows → AO → lighting → skybox → transparency
//!          → [TAA] → [bloom] → [SMAA] → tone map → surface
//! ```
//!
//! Stage selection is driven by [`RenderSettings`] and resolved once per
//! frame into a [`renderer::graph::FramePlan`].

pub mod errors;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use errors::{LanternError, Result};
pub use renderer::graph::{FramePlan, PassId};
pub use renderer::shader::{ShaderContext, ShaderLibrary};
pub use renderer::{Renderer, RendererDescriptor, check_adapter, required_limits};
pub use scene::{Aabb, CameraSnapshot, CameraSource, DrawMesh, Environment, Light, LightKey, LightType, SceneSource};
pub use settings::{AntiAliasMethod, AoMethod, DebugOutput, RenderSettings};
