use std::sync::Arc;

use glam::Mat4;

use super::components::{Camera, Children, MeshComponent, Parent, Tag, Transform};
use super::world::{Entity, World};
use crate::assets::Texture;

/// Environment map drawn behind all geometry.
#[derive(Debug, Clone)]
pub struct Skybox {
    /// Asset server key of `texture`.
    pub path: String,
    pub texture: Arc<Texture>,
}

/// Entity hierarchy on top of a [`World`].
///
/// Every entity created through [`Scene::add_entity`] carries a [`Tag`], a
/// [`Transform`] and a [`Children`] list; parent links are [`Parent`]
/// components maintained by [`Scene::set_parent`].
#[derive(Default)]
pub struct Scene {
    world: World,
    skybox: Option<Skybox>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    /// Replaces the skybox, returning the previous one so its texture can be given back.
    pub fn set_skybox(&mut self, skybox: Option<Skybox>) -> Option<Skybox> {
        std::mem::replace(&mut self.skybox, skybox)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    pub fn add_entity(&mut self, name: &str) -> Entity {
        let entity = self.world.spawn();
        self.world.insert(
            entity,
            Tag {
                name: name.to_owned(),
            },
        );
        self.world.insert(entity, Transform::default());
        self.world.insert(entity, Children::default());
        entity
    }

    /// Removes `entity` and its whole subtree.
    ///
    /// Returns the asset paths of meshes that were attached to removed
    /// entities; the caller gives them back to the asset server.
    pub fn remove_entity(&mut self, entity: Entity) -> Vec<String> {
        if !self.world.contains(entity) {
            return Vec::new();
        }
        self.detach(entity);

        let mut released = Vec::new();
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.world.get::<Children>(current) {
                stack.extend(children.0.iter().copied());
            }
            if let Some(MeshComponent {
                path,
                mesh: Some(_),
            }) = self.world.remove::<MeshComponent>(current)
            {
                released.push(path);
            }
            self.world.despawn(current);
        }
        released
    }

    #[must_use]
    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<Parent>(entity).map(|p| p.0)
    }

    #[must_use]
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.world
            .get::<Children>(entity)
            .map(|c| c.0.as_slice())
            .unwrap_or_default()
    }

    fn detach(&mut self, entity: Entity) {
        if let Some(Parent(old)) = self.world.remove::<Parent>(entity)
            && let Some(children) = self.world.get_mut::<Children>(old)
        {
            children.0.retain(|&c| c != entity);
        }
    }

    /// Re-parents `child`. Returns false (and changes nothing) if that would
    /// create a cycle or either entity is gone.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> bool {
        if !self.world.contains(child) {
            return false;
        }
        if let Some(parent) = parent {
            if !self.world.contains(parent) {
                return false;
            }
            let mut ancestor = Some(parent);
            while let Some(a) = ancestor {
                if a == child {
                    log::warn!("set_parent: {child:?} is an ancestor of {parent:?}");
                    return false;
                }
                ancestor = self.parent(a);
            }
        }

        self.detach(child);
        if let Some(parent) = parent {
            self.world.insert(child, Parent(parent));
            match self.world.get_mut::<Children>(parent) {
                Some(children) => children.0.push(child),
                None => {
                    self.world.insert(parent, Children(vec![child]));
                }
            }
        }
        true
    }

    /// Local-to-world matrix, resolved by walking up the parent chain.
    #[must_use]
    pub fn world_transform(&self, entity: Entity) -> Mat4 {
        let local = |e: Entity| {
            self.world
                .get::<Transform>(e)
                .map_or(Mat4::IDENTITY, Transform::local_matrix)
        };
        let mut matrix = local(entity);
        let mut current = entity;
        while let Some(parent) = self.parent(current) {
            matrix = local(parent) * matrix;
            current = parent;
        }
        matrix
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Refreshes camera matrices from the hierarchy.
    pub fn update(&mut self) {
        let cameras: Vec<(Entity, Mat4)> = self
            .world
            .view::<Camera>()
            .map(|(e, _)| (e, self.world_transform(e)))
            .collect();
        for (entity, world) in cameras {
            if let Some(camera) = self.world.get_mut::<Camera>(entity) {
                camera.update_projection_matrix();
                camera.update_view(&world);
            }
        }
    }

    /// Highest-priority primary camera; ties resolve to the first in entity order.
    #[must_use]
    pub fn main_camera(&self) -> Option<(Entity, &Camera)> {
        self.world
            .view::<Camera>()
            .filter(|(_, c)| c.primary)
            .fold(None, |best: Option<(Entity, &Camera)>, (e, c)| match best {
                Some((_, b)) if b.priority >= c.priority => best,
                _ => Some((e, c)),
            })
    }
}
