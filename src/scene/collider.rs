//! Collider shapes.
//!
//! The physics engine itself is an external collaborator; the scene only
//! stores shape parameters, validates them, applies scale and persists them.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::errors::{EmberError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ColliderShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Capsule along Y; `height` is the cylinder part without the caps.
    Capsule { radius: f32, height: f32 },
    ConvexHull { points: Vec<Vec3> },
}

impl ColliderShape {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f32| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(EmberError::InvalidShape(format!("{name} must be positive, got {v}")))
            }
        };
        match self {
            Self::Box { half_extents } => {
                positive("half_extents.x", half_extents.x)?;
                positive("half_extents.y", half_extents.y)?;
                positive("half_extents.z", half_extents.z)
            }
            Self::Sphere { radius } => positive("radius", *radius),
            Self::Capsule { radius, height } => {
                positive("radius", *radius)?;
                if *height >= 0.0 {
                    Ok(())
                } else {
                    Err(EmberError::InvalidShape(format!(
                        "capsule height must not be negative, got {height}"
                    )))
                }
            }
            Self::ConvexHull { points } => {
                if points.len() < 4 {
                    return Err(EmberError::InvalidShape(format!(
                        "convex hull needs at least 4 points, got {}",
                        points.len()
                    )));
                }
                Ok(())
            }
        }
    }

    /// The shape with `scale` baked in.
    ///
    /// Round shapes cannot be scaled non-uniformly: spheres use the largest
    /// axis, capsules the largest XZ axis for the radius and Y for the height.
    #[must_use]
    pub fn scaled(&self, scale: Vec3) -> Self {
        let scale = scale.abs();
        match self {
            Self::Box { half_extents } => Self::Box {
                half_extents: *half_extents * scale,
            },
            Self::Sphere { radius } => Self::Sphere {
                radius: radius * scale.max_element(),
            },
            Self::Capsule { radius, height } => Self::Capsule {
                radius: radius * scale.x.max(scale.z),
                height: height * scale.y,
            },
            Self::ConvexHull { points } => Self::ConvexHull {
                points: points.iter().map(|p| *p * scale).collect(),
            },
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Collider attached to an entity.
///
/// `shape` is `None` when the requested shape was rejected; the collider
/// then stays disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ColliderComponent {
    pub shape: Option<ColliderShape>,
    pub scale: Vec3,
}

impl ColliderComponent {
    /// Validates `shape`; an invalid shape is logged and leaves the collider disabled.
    #[must_use]
    pub fn new(shape: ColliderShape) -> Self {
        let shape = match shape.validate() {
            Ok(()) => Some(shape),
            Err(e) => {
                log::error!("Collider disabled: {e}");
                None
            }
        };
        Self {
            shape,
            scale: Vec3::ONE,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shape.is_some()
    }

    /// Shape in world units, or `None` when disabled.
    #[must_use]
    pub fn world_shape(&self) -> Option<ColliderShape> {
        self.shape.as_ref().map(|s| s.scaled(self.scale))
    }
}
