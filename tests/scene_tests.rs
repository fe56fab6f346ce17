//! Scene Tests
//!
//! Tests for:
//! - Entity creation with default components
//! - Parent/child links, cycle rejection, world transforms
//! - Subtree removal and released mesh paths
//! - Main camera selection by priority
//! - Camera matrix refresh from the hierarchy

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use ember::assets::Mesh;
use ember::scene::{
    Camera, Children, MeshComponent, Parent, PointLight, Scene, Tag, Transform,
};

const EPSILON: f32 = 1e-5;

fn loaded_mesh(path: &str) -> MeshComponent {
    MeshComponent {
        path: path.to_owned(),
        mesh: Some(Arc::new(Mesh {
            path: path.to_owned(),
            ..Mesh::default()
        })),
    }
}

// ============================================================================
// Entities & Components
// ============================================================================

#[test]
fn new_entity_has_tag_transform_and_children() {
    let mut scene = Scene::new();
    let e = scene.add_entity("Crate");

    let world = scene.world();
    assert_eq!(world.get::<Tag>(e).map(|t| t.name.as_str()), Some("Crate"));
    assert_eq!(world.get::<Transform>(e), Some(&Transform::default()));
    assert_eq!(world.get::<Children>(e), Some(&Children::default()));
    assert!(!world.has::<Parent>(e));
}

#[test]
fn query_requires_all_components() {
    let mut scene = Scene::new();
    let lamp = scene.add_entity("Lamp");
    scene.add_entity("Empty");
    scene.world_mut().insert(lamp, PointLight::default());

    let lights: Vec<_> = scene.world().query::<(Transform, PointLight)>().collect();
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0].0, lamp);
}

// ============================================================================
// Hierarchy
// ============================================================================

#[test]
fn set_parent_links_both_directions() {
    let mut scene = Scene::new();
    let parent = scene.add_entity("Parent");
    let child = scene.add_entity("Child");

    assert!(scene.set_parent(child, Some(parent)));
    assert_eq!(scene.parent(child), Some(parent));
    assert_eq!(scene.children(parent), &[child]);

    assert!(scene.set_parent(child, None));
    assert_eq!(scene.parent(child), None);
    assert!(scene.children(parent).is_empty());
}

#[test]
fn reparenting_moves_child_between_lists() {
    let mut scene = Scene::new();
    let a = scene.add_entity("A");
    let b = scene.add_entity("B");
    let child = scene.add_entity("Child");

    scene.set_parent(child, Some(a));
    scene.set_parent(child, Some(b));

    assert!(scene.children(a).is_empty());
    assert_eq!(scene.children(b), &[child]);
}

#[test]
fn cycles_are_rejected() {
    let mut scene = Scene::new();
    let root = scene.add_entity("Root");
    let mid = scene.add_entity("Mid");
    let leaf = scene.add_entity("Leaf");
    scene.set_parent(mid, Some(root));
    scene.set_parent(leaf, Some(mid));

    assert!(!scene.set_parent(root, Some(leaf)));
    assert!(!scene.set_parent(root, Some(root)));
    assert_eq!(scene.parent(root), None);
}

#[test]
fn world_transform_composes_parent_chain() {
    let mut scene = Scene::new();
    let parent = scene.add_entity("Parent");
    let child = scene.add_entity("Child");
    scene.set_parent(child, Some(parent));

    *scene.world_mut().get_mut::<Transform>(parent).unwrap() = Transform::from_translation(Vec3::X * 10.0)
        .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
    *scene.world_mut().get_mut::<Transform>(child).unwrap() = Transform::from_translation(Vec3::X);

    let position = scene.world_transform(child).transform_point3(Vec3::ZERO);
    assert!(
        position.abs_diff_eq(Vec3::new(10.0, 0.0, -1.0), EPSILON),
        "child at {position}"
    );
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn remove_entity_despawns_subtree_and_reports_meshes() {
    let mut scene = Scene::new();
    let root = scene.add_entity("Root");
    let body = scene.add_entity("Body");
    let wheel = scene.add_entity("Wheel");
    let other = scene.add_entity("Other");
    scene.set_parent(body, Some(root));
    scene.set_parent(wheel, Some(body));
    scene.world_mut().insert(body, loaded_mesh("car.glb"));
    scene.world_mut().insert(wheel, loaded_mesh("wheel.glb"));
    scene.world_mut().insert(
        other,
        MeshComponent {
            path: "missing.glb".to_owned(),
            mesh: None,
        },
    );

    let mut released = scene.remove_entity(root);
    released.sort();

    assert_eq!(released, vec!["car.glb".to_owned(), "wheel.glb".to_owned()]);
    for e in [root, body, wheel] {
        assert!(!scene.world().contains(e));
    }
    assert!(scene.world().contains(other));
}

#[test]
fn removing_child_detaches_it_from_parent() {
    let mut scene = Scene::new();
    let parent = scene.add_entity("Parent");
    let child = scene.add_entity("Child");
    scene.set_parent(child, Some(parent));

    scene.remove_entity(child);
    assert!(scene.children(parent).is_empty());
    assert!(scene.remove_entity(child).is_empty());
}

// ============================================================================
// Cameras
// ============================================================================

#[test]
fn main_camera_is_highest_priority_primary() {
    let mut scene = Scene::new();
    let low = scene.add_entity("Low");
    let high = scene.add_entity("High");
    let secondary = scene.add_entity("Secondary");

    let camera = |priority: i32, primary: bool| Camera {
        priority,
        primary,
        ..Camera::new_perspective(1.0, 1.0, 0.1, 100.0)
    };
    scene.world_mut().insert(low, camera(0, true));
    scene.world_mut().insert(high, camera(5, true));
    scene.world_mut().insert(secondary, camera(10, false));

    assert_eq!(scene.main_camera().map(|(e, _)| e), Some(high));
}

#[test]
fn main_camera_tie_goes_to_first() {
    let mut scene = Scene::new();
    let first = scene.add_entity("First");
    let second = scene.add_entity("Second");
    for e in [first, second] {
        scene
            .world_mut()
            .insert(e, Camera::new_perspective(1.0, 1.0, 0.1, 100.0));
    }
    assert_eq!(scene.main_camera().map(|(e, _)| e), Some(first));
}

#[test]
fn no_primary_camera_means_no_main_camera() {
    let mut scene = Scene::new();
    let e = scene.add_entity("Cam");
    let mut camera = Camera::new_perspective(1.0, 1.0, 0.1, 100.0);
    camera.primary = false;
    scene.world_mut().insert(e, camera);
    assert!(scene.main_camera().is_none());
}

#[test]
fn update_refreshes_camera_view_from_hierarchy() {
    let mut scene = Scene::new();
    let rig = scene.add_entity("Rig");
    let cam = scene.add_entity("Camera");
    scene.set_parent(cam, Some(rig));
    scene
        .world_mut()
        .insert(cam, Camera::new_perspective(1.0, 2.0, 0.1, 50.0));
    *scene.world_mut().get_mut::<Transform>(rig).unwrap() = Transform::from_translation(Vec3::new(0.0, 3.0, 0.0));
    *scene.world_mut().get_mut::<Transform>(cam).unwrap() = Transform::from_translation(Vec3::new(0.0, 0.0, 5.0));

    scene.update();

    let camera = scene.world().get::<Camera>(cam).unwrap();
    assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 3.0, 5.0), EPSILON));
    assert!(
        camera
            .view
            .transform_point3(camera.position)
            .abs_diff_eq(Vec3::ZERO, EPSILON)
    );
    let expected = Mat4::perspective_rh(1.0, 2.0, 0.1, 50.0);
    assert!(camera.projection.abs_diff_eq(expected, EPSILON));
}

#[test]
fn looking_at_points_forward_at_target() {
    let transform = Transform::from_translation(Vec3::new(0.0, 0.0, 10.0)).looking_at(Vec3::ZERO, Vec3::Y);
    let forward = transform.rotation * Vec3::NEG_Z;
    assert!(forward.abs_diff_eq(Vec3::NEG_Z, EPSILON));
}
