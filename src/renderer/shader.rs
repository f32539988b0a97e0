//! Shader Library
//!
//! The host registers WGSL sources by name; passes expand them through
//! minijinja with a [`ShaderContext`] carrying the renderer's compile-time
//! constants. Templates can `include` each other by registered name.
//!
//! Template syntax follows the block/line conventions used across the
//! engine's shaders:
//!
//! ```text
//! {$ if use_skinning $} ... {$ endif $}
//! $$ for i in range(lights_max)
//! const LIGHTS_MAX: u32 = {{ lights_max }}u;
//! ```

use std::borrow::Cow;

use minijinja::Environment;
use minijinja::syntax::SyntaxConfig;
use serde_json::{Map, Value};

use crate::errors::{LanternError, Result};

/// Template names every renderer needs.
pub mod names {
    pub const GBUFFER: &str = "gbuffer";
    pub const SHADOW: &str = "shadow";
    pub const SSAO: &str = "ssao";
    pub const SSAO_BLUR: &str = "ssao_blur";
    pub const GTAO: &str = "gtao";
    pub const GTAO_DENOISE: &str = "gtao_denoise";
    pub const LIGHTING: &str = "lighting";
    pub const SKYBOX: &str = "skybox";
    pub const TRANSPARENT: &str = "transparent";
    pub const BLOOM: &str = "bloom";
    pub const BLOOM_COMPOSITE: &str = "bloom_composite";
    pub const TAA: &str = "taa";
    pub const SMAA_EDGE: &str = "smaa_edge";
    pub const SMAA_WEIGHT: &str = "smaa_weight";
    pub const SMAA_BLEND: &str = "smaa_blend";
    pub const TONE_MAP: &str = "tone_map";
    pub const DEBUG_OUTPUT: &str = "debug_output";

    pub const ALL: [&str; 17] = [
        GBUFFER,
        SHADOW,
        SSAO,
        SSAO_BLUR,
        GTAO,
        GTAO_DENOISE,
        LIGHTING,
        SKYBOX,
        TRANSPARENT,
        BLOOM,
        BLOOM_COMPOSITE,
        TAA,
        SMAA_EDGE,
        SMAA_WEIGHT,
        SMAA_BLEND,
        TONE_MAP,
        DEBUG_OUTPUT,
    ];
}

/// Template variables for one expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderContext {
    pub defines: Map<String, Value>,
}

impl ShaderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn define(mut self, name: &str, value: bool) -> Self {
        self.defines.insert(name.to_string(), Value::Bool(value));
        self
    }

    #[must_use]
    pub fn set_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.defines.insert(name.to_string(), value.into());
        self
    }

    /// Capacities and workgroup sizes shared by all passes.
    #[must_use]
    pub fn renderer() -> Self {
        use crate::renderer::graph::passes::ao::{gtao::GTAO_WORKGROUP_SIZE, ssao::SSAO_KERNEL_SIZE};
        use crate::renderer::graph::passes::taa::TAA_WORKGROUP_SIZE;
        use crate::renderer::graph::shadow_utils::SHADOW_TILE_SIZE;
        use crate::scene::light::{SHADER_LIGHTS_MAX, SHADOWED_DIRECTIONAL_LIGHTS_MAX};

        Self::new()
            .set_value("lights_max", SHADER_LIGHTS_MAX)
            .set_value("shadowed_lights_max", SHADOWED_DIRECTIONAL_LIGHTS_MAX)
            .set_value("shadow_tile_size", SHADOW_TILE_SIZE)
            .set_value("bones_max", crate::renderer::uniforms::BONES_MAX)
            .set_value("ssao_kernel_size", SSAO_KERNEL_SIZE)
            .set_value("gtao_slices_max", crate::settings::GtaoSettings::MAX_SLICES)
            .set_value("gtao_workgroup_size", GTAO_WORKGROUP_SIZE)
            .set_value("taa_workgroup_size", TAA_WORKGROUP_SIZE)
    }

    pub fn merge(&mut self, other: &ShaderContext) {
        for (k, v) in &other.defines {
            self.defines.insert(k.clone(), v.clone());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.defines.get(name)
    }
}

/// Named WGSL templates.
#[derive(Debug)]
pub struct ShaderLibrary {
    env: Environment<'static>,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderLibrary {
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        match SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()
        {
            Ok(syntax) => env.set_syntax(syntax),
            Err(err) => log::error!("Shader template syntax rejected, using defaults: {err}"),
        }
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::SemiStrict);
        Self { env }
    }

    /// Adds or replaces a template. Syntax errors surface here.
    pub fn register(&mut self, name: &str, source: impl Into<String>) -> Result<()> {
        self.env
            .add_template_owned(name.to_string(), source.into())
            .map_err(|source| LanternError::ShaderTemplate {
                name: name.to_string(),
                source,
            })
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, name: &str, source: impl Into<String>) -> Result<Self> {
        self.register(name, source)?;
        Ok(self)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Templates the renderer's passes depend on.
    #[must_use]
    pub fn required() -> &'static [&'static str] {
        &names::ALL
    }

    /// Names from [`required`](Self::required) that are not registered.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        Self::required()
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect()
    }

    /// Expands template `name` with `context`.
    pub fn expand(&self, name: &str, context: &ShaderContext) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| LanternError::ShaderNotRegistered(name.to_string()))?;
        template
            .render(&context.defines)
            .map_err(|source| LanternError::ShaderTemplate {
                name: name.to_string(),
                source,
            })
    }

    /// Expands and compiles template `name`.
    pub fn module(&self, device: &wgpu::Device, name: &str, context: &ShaderContext) -> Result<wgpu::ShaderModule> {
        let source = self.expand(name, context)?;
        log::debug!("Compiling shader '{name}' ({} bytes)", source.len());
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_constants() {
        let library = ShaderLibrary::new()
            .with("light_count", "const N: u32 = {{ lights_max }}u;{$ if shadows $} // shadows{$ endif $}")
            .unwrap();
        let ctx = ShaderContext::new().set_value("lights_max", 12).define("shadows", true);
        let out = library.expand("light_count", &ctx).unwrap();
        assert!(out.contains("const N: u32 = 12u;"));
        assert!(out.contains("// shadows"));
    }

    #[test]
    fn unknown_template_is_reported() {
        let library = ShaderLibrary::new();
        let err = library.expand("nope", &ShaderContext::new()).unwrap_err();
        assert!(matches!(err, LanternError::ShaderNotRegistered(name) if name == "nope"));
        assert_eq!(library.missing().len(), names::ALL.len());
    }
}
