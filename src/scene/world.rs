//! Entity/component storage.
//!
//! Entities are slotmap keys; each component type lives in its own
//! `SecondaryMap` keyed by entity. Multi-component iteration goes through
//! [`World::query`] with a tuple of component types:
//!
//! ```rust,ignore
//! for (entity, (transform, light)) in world.query::<(Transform, SpotLight)>() {
//!     // ...
//! }
//! ```
//!
//! Fetching a component an entity does not have yields `None`; callers that
//! branch on presence use [`World::has`].

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// A scene entity.
    pub struct Entity;
}

trait ComponentStorage: Any {
    fn remove_entity(&mut self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ComponentStorage for SecondaryMap<Entity, T> {
    fn remove_entity(&mut self, entity: Entity) {
        self.remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
pub struct World {
    entities: SlotMap<Entity, ()>,
    storages: FxHashMap<TypeId, Box<dyn ComponentStorage>>,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Removes the entity and all of its components. Returns false if it was already gone.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
        true
    }

    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    fn storage<T: 'static>(&self) -> Option<&SecondaryMap<Entity, T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref())
    }

    fn storage_mut<T: 'static>(&mut self) -> Option<&mut SecondaryMap<Entity, T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut())
    }

    /// Attaches `component`, replacing any previous one of the same type.
    /// Returns the replaced value. Inserting on a despawned entity is ignored.
    pub fn insert<T: 'static>(&mut self, entity: Entity, component: T) -> Option<T> {
        if !self.contains(entity) {
            log::warn!("insert on despawned entity {entity:?}");
            return None;
        }
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(SecondaryMap::<Entity, T>::new()) as Box<dyn ComponentStorage>
            })
            .as_any_mut()
            .downcast_mut::<SecondaryMap<Entity, T>>()
            .and_then(|storage| storage.insert(entity, component))
    }

    pub fn remove<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>()?.remove(entity)
    }

    #[must_use]
    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|s| s.contains_key(entity))
    }

    #[must_use]
    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Every entity with a `T`, in entity order.
    pub fn view<T: 'static>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.storage::<T>().into_iter().flat_map(SecondaryMap::iter)
    }

    /// Every entity holding all components of the tuple `Q`, in entity order.
    pub fn query<Q: Query>(&self) -> impl Iterator<Item = (Entity, Q::Item<'_>)> + '_ {
        Q::fetch(self)
    }
}

/// A tuple of component types that can be iterated together.
pub trait Query {
    type Item<'w>;

    fn fetch(world: &World) -> impl Iterator<Item = (Entity, Self::Item<'_>)> + '_;
}

impl<A: 'static, B: 'static> Query for (A, B) {
    type Item<'w> = (&'w A, &'w B);

    fn fetch(world: &World) -> impl Iterator<Item = (Entity, Self::Item<'_>)> + '_ {
        let a = world.storage::<A>();
        let b = world.storage::<B>();
        a.zip(b).into_iter().flat_map(|(a, b)| {
            a.iter()
                .filter_map(move |(e, va)| b.get(e).map(|vb| (e, (va, vb))))
        })
    }
}

impl<A: 'static, B: 'static, C: 'static> Query for (A, B, C) {
    type Item<'w> = (&'w A, &'w B, &'w C);

    fn fetch(world: &World) -> impl Iterator<Item = (Entity, Self::Item<'_>)> + '_ {
        let a = world.storage::<A>();
        let b = world.storage::<B>();
        let c = world.storage::<C>();
        a.zip(b).zip(c).into_iter().flat_map(|((a, b), c)| {
            a.iter().filter_map(move |(e, va)| {
                let vb = b.get(e)?;
                let vc = c.get(e)?;
                Some((e, (va, vb, vc)))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32);
    #[derive(Debug, PartialEq)]
    struct Velocity(i32);

    #[test]
    fn query_yields_only_entities_with_all_components() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(a, Position(1));
        world.insert(a, Velocity(2));
        world.insert(b, Position(3));

        let hits: Vec<_> = world.query::<(Position, Velocity)>().collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, a);
        assert_eq!(hits[0].1, (&Position(1), &Velocity(2)));

        assert!(world.has::<Velocity>(a));
        assert!(!world.has::<Velocity>(b));
    }

    #[test]
    fn query_on_unknown_component_is_empty() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Position(0));
        assert_eq!(world.query::<(Position, Velocity)>().count(), 0);
        assert_eq!(world.view::<Velocity>().count(), 0);
    }

    #[test]
    fn despawn_drops_components() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Position(7));
        assert!(world.despawn(e));
        assert!(!world.despawn(e));
        assert!(world.get::<Position>(e).is_none());
        assert_eq!(world.view::<Position>().count(), 0);
    }
}
