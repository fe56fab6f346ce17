//! Flattens the scene's mesh hierarchies into a list of drawable primitives.

use glam::Mat4;

use crate::assets::{Material, MeshNode, MeshPrimitive};
use crate::scene::{Entity, MeshComponent, Scene, Transform};
use crate::utils::math::Frustum;

/// One primitive ready for a meshlet dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub entity: Entity,
    /// Entity world matrix times the node chain inside the mesh.
    pub world: Mat4,
    pub primitive: &'a MeshPrimitive,
    pub material: Option<&'a Material>,
}

/// Collects every drawable primitive in the scene.
///
/// Nodes are visited pre-order with an explicit stack. Primitives without
/// meshlets are skipped, and so is anything whose world AABB lies outside
/// `frustum`.
#[must_use]
pub fn collect_draws<'a>(scene: &'a Scene, frustum: Option<&Frustum>) -> Vec<DrawItem<'a>> {
    let mut draws = Vec::new();
    let mut stack: Vec<(&'a MeshNode, Mat4)> = Vec::new();

    for (entity, (_, component)) in scene.world().query::<(Transform, MeshComponent)>() {
        let Some(mesh) = component.mesh.as_deref() else {
            continue;
        };

        stack.push((&mesh.root, scene.world_transform(entity)));
        while let Some((node, parent)) = stack.pop() {
            let world = parent * node.transform;
            stack.extend(node.children.iter().rev().map(|child| (child, world)));

            for primitive in node.primitives.iter().filter(|p| p.is_drawable()) {
                if let Some(frustum) = frustum
                    && !primitive.aabb.is_empty()
                    && !frustum.intersects_aabb(&primitive.aabb.transformed(&world))
                {
                    continue;
                }
                draws.push(DrawItem {
                    entity,
                    world,
                    primitive,
                    material: mesh.material(primitive),
                });
            }
        }
    }
    draws
}
