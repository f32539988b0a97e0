//! Render Configuration
//!
//! [`RenderSettings`] is the mutable runtime state that selects which passes
//! make up a frame. UI or input code mutates it between frames; the
//! [`Renderer`](crate::Renderer) snapshots it once at frame start, so a
//! change made while a frame is being recorded only takes effect on the
//! next one.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lantern::settings::{AntiAliasMethod, AoMethod, RenderSettings};
//!
//! let mut settings = RenderSettings::default();
//! settings.ao = AoMethod::Gtao;
//! settings.antialias = AntiAliasMethod::Taa;
//! settings.bloom.set_enabled(true);
//! settings.save("render.json")?;
//! ```
//!
//! # Selection Rules
//!
//! | Field | Variants | Effect on the frame plan |
//! |-------|----------|--------------------------|
//! | `ao` | None / Ssao / Gtao | exactly one AO branch, None binds a white texture |
//! | `antialias` | None / Smaa / Taa | at most one AA pass runs |
//! | `bloom.enabled` | bool | inserts the bloom pass after TAA |
//! | `debug_output` | None / channel | replaces lighting and post-processing with a channel view |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// `value` clamped to `[min, max]`; NaN and infinities become `fallback`.
fn finite_clamp(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() { value.clamp(min, max) } else { fallback }
}

// ---------------------------------------------------------------------------
// Selection enums
// ---------------------------------------------------------------------------

/// Ambient occlusion technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AoMethod {
    /// No occlusion; lighting samples a constant white texture.
    #[default]
    None,
    /// Hemisphere-kernel screen-space AO at full resolution.
    Ssao,
    /// Slice-based horizon AO at half resolution.
    Gtao,
}

impl AoMethod {
    pub const ALL: [Self; 3] = [Self::None, Self::Ssao, Self::Gtao];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Ssao => "SSAO",
            Self::Gtao => "GTAO",
        }
    }
}

/// Antialiasing technique. The variants are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AntiAliasMethod {
    #[default]
    None,
    /// Three-pass morphological antialiasing, no temporal state.
    Smaa,
    /// Temporal antialiasing with ping-ponged history.
    Taa,
}

impl AntiAliasMethod {
    pub const ALL: [Self; 3] = [Self::None, Self::Smaa, Self::Taa];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Smaa => "SMAA",
            Self::Taa => "TAA",
        }
    }
}

/// G-buffer channel routed to the screen instead of the lit image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DebugOutput {
    #[default]
    None,
    BaseColor,
    Metalness,
    Roughness,
    Normal,
    Emission,
    Occlusion,
    Velocity,
    Depth,
}

impl DebugOutput {
    pub const ALL: [Self; 9] = [
        Self::None,
        Self::BaseColor,
        Self::Metalness,
        Self::Roughness,
        Self::Normal,
        Self::Emission,
        Self::Occlusion,
        Self::Velocity,
        Self::Depth,
    ];

    #[inline]
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Value written to the debug shader's `mode` uniform.
    #[inline]
    #[must_use]
    pub const fn shader_mode(self) -> u32 {
        self as u32
    }
}

/// How alpha-blended geometry casts shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransparentShadowMode {
    /// Transparent meshes are rasterized as if opaque.
    #[default]
    Solid,
    /// Transparent meshes are drawn in a second sub-pass that discards
    /// fragments below the alpha threshold.
    AlphaTest,
}

/// Tone mapping operator used by the final composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneMappingMode {
    Linear,
    Reinhard,
    #[default]
    Aces,
}

// ---------------------------------------------------------------------------
// Per-effect settings
// ---------------------------------------------------------------------------

/// SSAO parameters.
///
/// Defaults: `bias = 0.0001`, `radius = 0.5`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    bias: f32,
    radius: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            bias: 0.0001,
            radius: 0.5,
        }
    }
}

impl SsaoSettings {
    #[must_use]
    pub fn bias(&self) -> f32 {
        self.bias
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Depth bias against self-occlusion acne, clamped to `[0, 0.5]`.
    pub fn set_bias(&mut self, bias: f32) {
        self.bias = finite_clamp(bias, 0.0, 0.5, Self::default().bias);
    }

    /// World-space sampling radius, clamped to `[0, 1]`.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = finite_clamp(radius, 0.0, 1.0, Self::default().radius);
    }

    fn sanitize(&mut self) {
        self.set_bias(self.bias);
        self.set_radius(self.radius);
    }
}

/// GTAO parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GtaoSettings {
    slice_count: u32,
    radius: f32,
}

impl Default for GtaoSettings {
    fn default() -> Self {
        Self {
            slice_count: 2,
            radius: 0.5,
        }
    }
}

impl GtaoSettings {
    pub const MAX_SLICES: u32 = 8;

    #[must_use]
    pub fn slice_count(&self) -> u32 {
        self.slice_count
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Number of horizon slices per pixel, clamped to `[1, MAX_SLICES]`.
    pub fn set_slice_count(&mut self, count: u32) {
        self.slice_count = count.clamp(1, Self::MAX_SLICES);
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = finite_clamp(radius, 0.0, f32::MAX, Self::default().radius);
    }

    fn sanitize(&mut self) {
        self.set_slice_count(self.slice_count);
        self.set_radius(self.radius);
    }
}

/// Bloom parameters.
///
/// `range` is the *requested* number of mip levels in the blur chain; the
/// bloom targets clamp it to what the current resolution allows
/// (see [`max_bloom_range`](crate::renderer::graph::passes::bloom::max_bloom_range)).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    enabled: bool,
    range: u32,
    threshold: f32,
    strength: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            range: 6,
            threshold: 1.0,
            strength: 1.0,
        }
    }
}

impl BloomSettings {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn range(&self) -> u32 {
        self.range
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[must_use]
    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Requested blur-chain length; at least one level.
    pub fn set_range(&mut self, range: u32) {
        self.range = range.max(1);
    }

    /// Luminance above which a pixel feeds the blur chain.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = finite_clamp(threshold, 0.0, f32::MAX, Self::default().threshold);
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = finite_clamp(strength, 0.0, f32::MAX, Self::default().strength);
    }

    fn sanitize(&mut self) {
        self.set_range(self.range);
        self.set_threshold(self.threshold);
        self.set_strength(self.strength);
    }
}

/// TAA parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaaSettings {
    feedback: f32,
    jitter: bool,
}

impl Default for TaaSettings {
    fn default() -> Self {
        Self {
            feedback: 0.9,
            jitter: true,
        }
    }
}

impl TaaSettings {
    /// Weight of the history sample, clamped to `[0, 0.99]`.
    #[must_use]
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    #[must_use]
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = finite_clamp(feedback, 0.0, 0.99, Self::default().feedback);
    }

    pub fn set_jitter(&mut self, jitter: bool) {
        self.jitter = jitter;
    }

    fn sanitize(&mut self) {
        self.set_feedback(self.feedback);
    }
}

/// Final composite parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMapSettings {
    pub mode: ToneMappingMode,
    exposure: f32,
}

impl Default for ToneMapSettings {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::default(),
            exposure: 1.0,
        }
    }
}

impl ToneMapSettings {
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = finite_clamp(exposure, 1e-4, f32::MAX, Self::default().exposure);
    }

    fn sanitize(&mut self) {
        self.set_exposure(self.exposure);
    }
}

// ---------------------------------------------------------------------------
// RenderSettings
// ---------------------------------------------------------------------------

/// Complete per-frame render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub ao: AoMethod,
    pub antialias: AntiAliasMethod,
    pub debug_output: DebugOutput,
    pub transparent_shadows: TransparentShadowMode,
    /// Multi-scatter energy compensation from the DFG lookup in the IBL term.
    pub dfg_compensation: bool,
    alpha_threshold: f32,

    pub ssao: SsaoSettings,
    pub gtao: GtaoSettings,
    pub bloom: BloomSettings,
    pub taa: TaaSettings,
    pub tone_map: ToneMapSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ao: AoMethod::None,
            antialias: AntiAliasMethod::None,
            debug_output: DebugOutput::None,
            transparent_shadows: TransparentShadowMode::Solid,
            dfg_compensation: true,
            alpha_threshold: 0.65,
            ssao: SsaoSettings::default(),
            gtao: GtaoSettings::default(),
            bloom: BloomSettings::default(),
            taa: TaaSettings::default(),
            tone_map: ToneMapSettings::default(),
        }
    }
}

impl RenderSettings {
    /// Alpha below which alpha-tested fragments are discarded.
    #[must_use]
    pub fn alpha_threshold(&self) -> f32 {
        self.alpha_threshold
    }

    /// Sets the alpha-test threshold, clamped to `[0, 1]`. Non-finite input
    /// restores the default.
    pub fn set_alpha_threshold(&mut self, threshold: f32) {
        self.alpha_threshold = finite_clamp(threshold, 0.0, 1.0, Self::default().alpha_threshold);
    }

    /// Reads settings from a JSON file. Missing fields take their defaults
    /// and out-of-range values are clamped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parses settings from a JSON string with the same rules as [`load`](Self::load).
    pub fn from_json(text: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(text)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Writes the settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        log::info!("Render settings saved to {}", path.as_ref().display());
        Ok(())
    }

    fn sanitize(&mut self) {
        self.set_alpha_threshold(self.alpha_threshold);
        self.ssao.sanitize();
        self.gtao.sanitize();
        self.bloom.sanitize();
        self.taa.sanitize();
        self.tone_map.sanitize();
    }
}
