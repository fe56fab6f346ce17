//! Utility Module
//!
//! - [`math`]: bounding boxes, frustum planes and orientation helpers

pub mod math;

pub use math::{Aabb, Frustum, quat_to_forward};
