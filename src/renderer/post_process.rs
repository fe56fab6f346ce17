//! Post-Process Volume
//!
//! A bundle of effect toggles and parameters attached to a camera. Passes
//! read it every frame and never write it.
//!
//! # Persisted Format
//!
//! JSON with one object per effect. Missing sections or fields keep their
//! defaults, so partial documents are valid:
//!
//! ```json
//! {
//!   "shadows": { "lambda": 0.9, "freeze": false, "visualize": false },
//!   "colorGrading": { "enable": true, "exposure": 1.2 },
//!   "gammaCorrect": { "factor": 2.2 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShadowSettings {
    /// Log/linear blend of cascade splits, `0` linear .. `1` logarithmic.
    pub lambda: f32,
    /// Keep the previously computed cascades.
    pub freeze: bool,
    /// Tint the output by cascade index.
    pub visualize: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            lambda: 0.95,
            freeze: false,
            visualize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeometrySettings {
    pub visualize_meshlets: bool,
    /// Direct lighting scale.
    pub direct: f32,
    /// Ambient/IBL scale.
    pub indirect: f32,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            visualize_meshlets: false,
            direct: 1.0,
            indirect: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkyboxSettings {
    pub enable: bool,
}

impl Default for SkyboxSettings {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SsaoSettings {
    pub enable: bool,
    /// Sample hemisphere radius in view-space units.
    pub radius: f32,
    pub power: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            enable: true,
            radius: 0.5,
            power: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PosterizationSettings {
    pub enable: bool,
    /// Steps per channel. Fractional values are allowed; values below 1 clamp to 1.
    pub levels: f32,
}

impl Default for PosterizationSettings {
    fn default() -> Self {
        Self {
            enable: false,
            levels: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FxaaSettings {
    pub enable: bool,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorGradingSettings {
    pub enable: bool,
    pub brightness: f32,
    pub exposure: f32,
    pub saturation: f32,
    pub contrast: f32,
    pub hue_shift: f32,
    /// Shadow/highlight split balance.
    pub balance: f32,
    pub temperature: f32,
    pub tint: f32,
    pub shadows: [f32; 4],
    pub highlights: [f32; 4],
    pub color_filter: [f32; 4],
}

impl Default for ColorGradingSettings {
    fn default() -> Self {
        Self {
            enable: false,
            brightness: 1.0,
            exposure: 1.0,
            saturation: 1.0,
            contrast: 1.0,
            hue_shift: 1.0,
            balance: 1.0,
            temperature: 0.0,
            tint: 0.0,
            shadows: [0.5; 4],
            highlights: [0.5; 4],
            color_filter: [1.0; 4],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthOfFieldSettings {
    pub enable: bool,
    pub focus_range: f32,
    pub focus_point: f32,
}

impl Default for DepthOfFieldSettings {
    fn default() -> Self {
        Self {
            enable: false,
            focus_range: 20.0,
            focus_point: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GammaSettings {
    pub factor: f32,
}

impl Default for GammaSettings {
    fn default() -> Self {
        Self { factor: 2.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PixelizationSettings {
    pub enable: bool,
    /// Pixel block size in screen pixels.
    pub size: u32,
}

impl Default for PixelizationSettings {
    fn default() -> Self {
        Self {
            enable: false,
            size: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilmGrainSettings {
    pub enable: bool,
    pub amount: f32,
}

impl Default for FilmGrainSettings {
    fn default() -> Self {
        Self {
            enable: false,
            amount: 0.1,
        }
    }
}

/// All effect settings for one camera.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostProcessVolume {
    pub shadows: ShadowSettings,
    pub geometry: GeometrySettings,
    pub skybox: SkyboxSettings,
    pub ssao: SsaoSettings,
    pub posterization: PosterizationSettings,
    pub fxaa: FxaaSettings,
    pub color_grading: ColorGradingSettings,
    pub depth_of_field: DepthOfFieldSettings,
    pub gamma_correct: GammaSettings,
    pub pixelization: PixelizationSettings,
    pub film_grain: FilmGrainSettings,
}

impl PostProcessVolume {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let v = PostProcessVolume::default();
        assert!((v.shadows.lambda - 0.95).abs() < f32::EPSILON);
        assert!((v.geometry.indirect - 0.4).abs() < f32::EPSILON);
        assert!(v.skybox.enable);
        assert!((v.posterization.levels - 10.0).abs() < f32::EPSILON);
        assert!((v.gamma_correct.factor - 2.2).abs() < f32::EPSILON);
        assert_eq!(v.pixelization.size, 5);
    }

    #[test]
    fn section_keys_are_camel_case() {
        let json = PostProcessVolume::default().to_json().unwrap();
        for key in [
            "\"colorGrading\"",
            "\"depthOfField\"",
            "\"gammaCorrect\"",
            "\"filmGrain\"",
            "\"visualizeMeshlets\"",
            "\"hueShift\"",
            "\"colorFilter\"",
            "\"focusRange\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }
}
