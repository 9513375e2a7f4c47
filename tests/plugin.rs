mod common;

use bevy::prelude::*;
use bevy_sdf_group::prelude::*;
use bevy_sdf_group::SdfMetrics;

use common::{mesh_asset, recorder, Event};

fn app_with_sphere() -> (App, Entity, Entity) {
    let mut app = App::new();
    app.add_plugins(SdfGroupPlugin);

    let key = app.world_mut().resource_mut::<SdfObjects>().insert(SdfObject::primitive(sdf_sphere(1.0)));
    let registry = app.world().resource::<SharedMeshRegistry>().clone();
    let mut group = SdfGroup::new(&registry);

    app.world_mut().resource_scope(|world, mut gpu: Mut<GpuBuffers>| {
        let mut objects = world.resource_mut::<SdfObjects>();
        group.register(&mut GroupContext::new(&mut objects, gpu.backend_mut()), key).unwrap();
    });

    let group = app.world_mut().spawn((group, Transform::default())).id();
    let link = app.world_mut().spawn((SdfObjectLink(key), Transform::from_xyz(3.0, 0.0, 0.0))).id();
    (app, group, link)
}

#[test]
fn spawned_group_is_activated_and_ticked() {
    let (mut app, group, _) = app_with_sphere();
    app.update();

    let world = app.world();
    let group = world.get::<SdfGroup>(group).unwrap();
    assert!(group.is_active());
    assert!(group.is_ready());
    assert!((group.distance_to_surface(Vec3::ZERO) - 2.0).abs() < 1e-4);

    let metrics = world.resource::<SdfMetrics>();
    assert_eq!(metrics.groups, 1);
    assert_eq!(metrics.registered_objects, 1);
    assert!(metrics.totals.rebuilds >= 1);
}

#[test]
fn linked_transform_moves_the_object() {
    let (mut app, group, link) = app_with_sphere();
    app.update();

    app.world_mut().get_mut::<Transform>(link).unwrap().translation = Vec3::new(5.0, 0.0, 0.0);
    app.update();

    let group = app.world().get::<SdfGroup>(group).unwrap();
    assert!((group.distance_to_surface(Vec3::ZERO) - 4.0).abs() < 1e-4);
}

#[test]
fn consumers_attached_before_spawn_are_notified() {
    let mut app = App::new();
    app.add_plugins(SdfGroupPlugin);
    let registry = app.world().resource::<SharedMeshRegistry>().clone();
    let (rec, log) = recorder();
    app.world_mut().spawn(SdfGroup::new(&registry).with_component(rec));
    app.update();

    let events = log.lock().clone();
    assert_eq!(events.first(), Some(&Event::Empty));
    assert!(events.iter().any(|e| matches!(e, Event::Data { count: 0, .. })));
    assert!(!events.contains(&Event::Run));
}

#[test]
fn app_exit_releases_shared_buffers() {
    let (mut app, _, _) = app_with_sphere();
    app.update();
    assert!(app.world().resource::<SharedMeshRegistry>().lock().samples_buffer().is_some());

    app.world_mut().send_event(AppExit::Success);
    app.update();
    assert!(app.world().resource::<SharedMeshRegistry>().lock().samples_buffer().is_none());
}

#[test]
fn despawned_group_gives_back_objects_meshes_and_buffers() {
    let mut app = App::new();
    app.add_plugins(SdfGroupPlugin);
    let key = app.world_mut().resource_mut::<SdfObjects>().insert(SdfObject::mesh(mesh_asset(4, 0.5)));
    let registry = app.world().resource::<SharedMeshRegistry>().clone();
    let mut group = SdfGroup::new(&registry);
    app.world_mut().resource_scope(|world, mut gpu: Mut<GpuBuffers>| {
        let mut objects = world.resource_mut::<SdfObjects>();
        group.register(&mut GroupContext::new(&mut objects, gpu.backend_mut()), key).unwrap();
    });
    let entity = app.world_mut().spawn(group).id();
    app.update();

    let data = app.world().get::<SdfGroup>(entity).unwrap().data_buffer().unwrap();
    assert!(app.world().resource::<GpuBuffers>().backend().is_valid(data.handle));
    assert_eq!(registry.lock().ref_count(MeshAssetId(4)), 1);

    app.world_mut().despawn(entity);
    app.update();

    assert_eq!(registry.lock().ref_count(MeshAssetId(4)), 0);
    assert!(!registry.lock().contains(MeshAssetId(4)));
    assert_eq!(app.world().resource::<SdfObjects>().get(key).unwrap().owner(), None);
    assert!(!app.world().resource::<GpuBuffers>().backend().is_valid(data.handle));
    assert_eq!(app.world().resource::<SdfMetrics>().groups, 0);

    let mut fresh = SdfGroup::new(&registry);
    app.world_mut().resource_scope(|world, mut gpu: Mut<GpuBuffers>| {
        let mut objects = world.resource_mut::<SdfObjects>();
        assert!(fresh.register(&mut GroupContext::new(&mut objects, gpu.backend_mut()), key).is_ok());
    });
    assert_eq!(registry.lock().ref_count(MeshAssetId(4)), 1);
}
