//! Built-in scene components.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use super::world::Entity;
use crate::assets::Mesh;
use crate::renderer::post_process::PostProcessVolume;
use crate::rhi::{DescriptorIndex, INVALID_DESCRIPTOR, TextureId};

/// Display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
}

/// Local transform relative to the parent entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Orients -Z towards `target`.
    #[must_use]
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        let view = Mat4::look_at_rh(self.translation, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(pub Vec<Entity>);

/// Perspective camera. `view`/`projection` are refreshed by `Scene::update`.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Only primary cameras are candidates for the main camera.
    pub primary: bool,
    /// Highest priority primary camera wins.
    pub priority: i32,
    pub volume: Option<Arc<PostProcessVolume>>,

    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl Camera {
    /// Smallest accepted near plane distance.
    pub const MIN_NEAR: f32 = 1e-3;

    /// `near` is raised to [`Self::MIN_NEAR`] and `far` kept beyond it.
    #[must_use]
    pub fn new_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let near = near.max(Self::MIN_NEAR);
        let mut camera = Self {
            fov_y,
            aspect,
            near,
            far: far.max(near + Self::MIN_NEAR),
            primary: true,
            priority: 0,
            volume: None,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        };
        camera.update_projection_matrix();
        camera
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Arc<PostProcessVolume>) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn update_projection_matrix(&mut self) {
        let near = self.near.max(Self::MIN_NEAR);
        let far = self.far.max(near + Self::MIN_NEAR);
        self.projection = Mat4::perspective_rh(self.fov_y, self.aspect, near, far);
    }

    pub fn update_view(&mut self, world: &Mat4) {
        self.view = world.inverse();
        self.position = world.w_axis.truncate();
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    /// Half-angle in radians where falloff starts.
    pub inner_cone: f32,
    /// Half-angle in radians where the light ends.
    pub outer_cone: f32,
    pub cast_shadows: bool,
    /// SRV of the shadow map, written by the shadow pass.
    pub shadow_index: DescriptorIndex,
    /// The shadow map itself, so readers can transition it.
    pub shadow_map: Option<TextureId>,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            range: 20.0,
            inner_cone: 20f32.to_radians(),
            outer_cone: 30f32.to_radians(),
            cast_shadows: false,
            shadow_index: INVALID_DESCRIPTOR,
            shadow_map: None,
        }
    }
}

/// A mesh asset placed in the scene. `mesh` is `None` when loading failed.
#[derive(Debug, Clone, Default)]
pub struct MeshComponent {
    pub path: String,
    pub mesh: Option<Arc<Mesh>>,
}
