//! Ember: a deferred meshlet renderer core.
//!
//! The crate is organised bottom-up:
//!
//! - [`rhi`]: device abstraction, command recording and a headless backend
//! - [`assets`]: glTF meshes split into meshlets, textures, shaders, ref-counted caching
//! - [`scene`]: entities, components, hierarchy and colliders
//! - [`renderer`]: shared resource registry, light feed and the pass chain

pub mod assets;
pub mod errors;
pub mod renderer;
pub mod rhi;
pub mod scene;
pub mod utils;

pub use assets::{AssetServer, Mesh, MeshletLimits, Texture};
pub use errors::{EmberError, Result};
pub use renderer::{Frame, PostProcessVolume, Renderer, RendererSettings, ResourceRegistry};
pub use rhi::{HeadlessRhi, Rhi};
pub use scene::{Camera, DirectionalLight, Entity, PointLight, Scene, SpotLight, Transform};
