//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`LanternError`] covers the recoverable failure modes:
//! - Shader lookup and template expansion at construction time
//! - Environment / lookup-texture cache I/O
//! - Settings file parsing
//!
//! Per-frame rendering never returns errors. GPU allocation or shader
//! compilation failures surface through wgpu's uncaptured-error handler,
//! which aborts the process; limit overflows are logged and truncated.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, LanternError>`.
//!
//! ```rust,ignore
//! use lantern::errors::Result;
//!
//! fn build() -> Result<()> {
//!     let settings = lantern::RenderSettings::load("render.json")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum LanternError {
    // ========================================================================
    // GPU & Shader Errors
    // ========================================================================
    /// A pass asked for a shader template the host never registered.
    #[error("Shader not registered: {0}")]
    ShaderNotRegistered(String),

    /// A registered shader template failed to expand.
    #[error("Shader template error in '{name}': {source}")]
    ShaderTemplate {
        /// Template name
        name: String,
        /// Underlying template error
        #[source]
        source: minijinja::Error,
    },

    /// Render target dimensions the GPU cannot hold.
    #[error("Invalid render extent {width}x{height}")]
    InvalidExtent {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// The adapter cannot satisfy a limit the renderer depends on.
    #[error("Device limit '{name}' too low: need {required}, have {available}")]
    DeviceLimit {
        name: &'static str,
        required: u32,
        available: u32,
    },

    /// The adapter cannot use a texture format the way the renderer needs,
    /// typically a downlevel backend.
    #[error("Texture format {format:?} lacks {missing:?} on this adapter")]
    UnsupportedFormat {
        format: wgpu::TextureFormat,
        missing: wgpu::TextureUsages,
    },

    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// A cached lookup texture does not match the requested layout.
    #[error("Lookup texture mismatch: expected {expected}x{expected}, found {width}x{height}")]
    LookupTextureMismatch {
        /// Requested edge length
        expected: u32,
        /// Width found on disk
        width: u32,
        /// Height found on disk
        height: u32,
    },

    /// Host-supplied lookup bytes have the wrong length.
    #[error("Invalid lookup data for '{name}': expected {expected} bytes, found {found}")]
    InvalidLookupData {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    /// Environment maps rejected by the renderer.
    #[error("Environment error: {0}")]
    EnvironmentError(String),

    // ========================================================================
    // I/O & Configuration Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Settings (de)serialization error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, LanternError>`.
pub type Result<T> = std::result::Result<T, LanternError>;
