//! Scene graph: entities, components and hierarchy.

pub mod collider;
pub mod components;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod world;

pub use collider::{ColliderComponent, ColliderShape};
pub use components::{
    Camera, Children, DirectionalLight, MeshComponent, Parent, PointLight, SpotLight, Tag,
    Transform,
};
pub use scene::{Scene, Skybox};
pub use world::{Entity, Query, World};
