//! Renderer Settings
//!
//! Construction-time configuration of the frame graph. Everything here is
//! fixed for the lifetime of a [`Renderer`](super::Renderer); per-frame
//! effect parameters live in the camera's
//! [`PostProcessVolume`](super::post_process::PostProcessVolume) instead.
//!
//! ```rust,ignore
//! let settings = RendererSettings {
//!     width: 1920,
//!     height: 1080,
//!     ..Default::default()
//! };
//! settings.validate()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::assets::MeshletLimits;
use crate::errors::{EmberError, Result};
use crate::renderer::shadow_utils::{DIR_LIGHT_SHADOW_DIMENSION, SPOT_LIGHT_SHADOW_DIMENSION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Render resolution of every screen-sized target.
    pub width: u32,
    pub height: u32,
    /// Edge length of each directional cascade map.
    pub dir_shadow_dimension: u32,
    /// Edge length of each spot light shadow map.
    pub spot_shadow_dimension: u32,
    /// Edge length of the precomputed BRDF lookup table.
    pub brdf_lut_size: u32,
    /// Hemisphere samples in the SSAO kernel.
    pub ssao_kernel_size: u32,
    pub meshlet_limits: MeshletLimits,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            dir_shadow_dimension: DIR_LIGHT_SHADOW_DIMENSION,
            spot_shadow_dimension: SPOT_LIGHT_SHADOW_DIMENSION,
            brdf_lut_size: 512,
            ssao_kernel_size: 64,
            meshlet_limits: MeshletLimits::default(),
        }
    }
}

impl RendererSettings {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EmberError::InvalidSettings(format!(
                "render resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        for (name, value) in [
            ("dir_shadow_dimension", self.dir_shadow_dimension),
            ("spot_shadow_dimension", self.spot_shadow_dimension),
            ("brdf_lut_size", self.brdf_lut_size),
        ] {
            if !value.is_power_of_two() {
                return Err(EmberError::InvalidSettings(format!(
                    "{name} must be a power of two, got {value}"
                )));
            }
        }
        if !(1..=256).contains(&self.ssao_kernel_size) {
            return Err(EmberError::InvalidSettings(format!(
                "ssao_kernel_size must be in 1..=256, got {}",
                self.ssao_kernel_size
            )));
        }
        self.meshlet_limits.validate()
    }
}
