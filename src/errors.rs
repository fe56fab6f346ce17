//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EmberError`] covers the recoverable failure modes:
//! - Asset lookup, reading and decoding
//! - Mesh and collider validation
//! - Settings documents
//!
//! Conditions that are *not* errors (missing main camera, absent
//! post-process volume, disabled effect) never surface here: passes simply
//! skip the frame. Looking up a registry resource that was never created is a
//! caller bug and panics through the `require_*` accessors instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ember::errors::{EmberError, Result};
//!
//! fn load_volume() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Ember engine.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found by the asset reader.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// An asset was requested with a type other than the one it was cached as.
    #[error("Asset type mismatch for '{path}': expected {expected}")]
    AssetTypeMismatch {
        /// Cache key of the asset
        path: String,
        /// Kind the caller asked for
        expected: &'static str,
    },

    /// Asset index out of bounds.
    #[error("Asset index out of bounds: {context} (index: {index})")]
    AssetIndexOutOfBounds {
        /// Description of what was being accessed
        context: String,
        /// The invalid index
        index: usize,
    },

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Image decoding failed.
    #[error("Image decode error: {0}")]
    ImageError(#[from] image::ImageError),

    /// glTF parsing failed.
    #[error("glTF error: {0}")]
    GltfError(#[from] gltf::Error),

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Mesh data is malformed (index out of range, missing attribute, ...).
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Collider parameters are degenerate.
    #[error("Invalid collider shape: {0}")]
    InvalidShape(String),

    /// Renderer settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
