mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bevy::prelude::*;
use bevy_sdf_group::buffer::BufferHandle;
use bevy_sdf_group::sdf_module::sdf_sphere;
use bevy_sdf_group::{GpuBackend, GroupComponent, SdfGroup, SdfObject, TickOutcome};

use common::{data_events, recorder, take, Event, Harness};

fn spheres(h: &mut Harness, radii: &[f32]) -> Vec<bevy_sdf_group::ObjectKey> {
    radii.iter().map(|r| h.objects.insert(SdfObject::primitive(sdf_sphere(*r)))).collect()
}

#[test]
fn shrinking_reallocates_and_notifies() {
    let mut h = Harness::new();
    let (rec, log) = recorder();
    let mut group = SdfGroup::new(&h.registry).with_component(rec);
    group.activate(&mut h.ctx());
    let keys = spheres(&mut h, &[1.0, 2.0, 3.0]);
    for key in &keys {
        group.register(&mut h.ctx(), *key).unwrap();
    }
    group.tick(&mut h.ctx());

    let old = group.data_buffer().unwrap();
    assert_eq!(old.capacity, 3);
    data_events(&log);

    group.deregister(&mut h.ctx(), keys[1]);

    let new = group.data_buffer().unwrap();
    assert_eq!(new.capacity, 2);
    assert_ne!(new.handle, old.handle);
    assert!(!h.gpu.is_valid(old.handle));
    assert_eq!(data_events(&log), vec![Event::Data { objects: new.handle, count: 2 }]);
    assert_eq!(h.gpu.read::<f32>(new.handle).unwrap().len(), 2 * bevy_sdf_group::gpu_data::SdfGpuData::STRIDE / 4);
}

#[test]
fn data_changes_do_not_resend_buffers() {
    let mut h = Harness::new();
    let (rec, log) = recorder();
    let mut group = SdfGroup::new(&h.registry).with_component(rec);
    group.activate(&mut h.ctx());
    let keys = spheres(&mut h, &[1.0, 1.0]);
    for key in &keys {
        group.register(&mut h.ctx(), *key).unwrap();
    }
    group.tick(&mut h.ctx());
    data_events(&log);

    h.objects.get_mut(keys[0]).unwrap().set_transform(Transform::from_xyz(4.0, 0.0, 0.0));
    assert_eq!(group.tick(&mut h.ctx()), TickOutcome::Rebuilt);
    assert!(data_events(&log).is_empty());

    // destroying a record changes the count on the next tick
    h.objects.remove(keys[1]);
    assert_eq!(group.tick(&mut h.ctx()), TickOutcome::Rebuilt);
    let handle = group.data_buffer().unwrap().handle;
    assert_eq!(data_events(&log), vec![Event::Data { objects: handle, count: 1 }]);
}

#[test]
fn emptiness_transitions_fire_once() {
    let mut h = Harness::new();
    let (rec, log) = recorder();
    let mut group = SdfGroup::new(&h.registry).with_component(rec);
    group.activate(&mut h.ctx());
    let keys = spheres(&mut h, &[1.0, 1.0]);
    let emptiness = |event: &Event| matches!(event, Event::Empty | Event::NotEmpty);

    assert_eq!(take(&log, emptiness), vec![Event::Empty]);

    group.register(&mut h.ctx(), keys[0]).unwrap();
    group.register(&mut h.ctx(), keys[0]).unwrap();
    group.register(&mut h.ctx(), keys[1]).unwrap();
    assert_eq!(take(&log, emptiness), vec![Event::NotEmpty]);

    assert!(group.deregister(&mut h.ctx(), keys[0]));
    assert!(!group.deregister(&mut h.ctx(), keys[0]));
    assert!(take(&log, emptiness).is_empty());

    assert!(group.deregister(&mut h.ctx(), keys[1]));
    group.tick(&mut h.ctx());
    assert_eq!(take(&log, emptiness), vec![Event::Empty]);
}

#[test]
fn run_only_fires_for_non_empty_groups() {
    let mut h = Harness::new();
    let (rec, log) = recorder();
    let mut group = SdfGroup::new(&h.registry).with_component(rec);
    group.activate(&mut h.ctx());
    group.tick(&mut h.ctx());
    assert!(take(&log, |e| *e == Event::Run).is_empty());

    let key = spheres(&mut h, &[1.0])[0];
    group.register(&mut h.ctx(), key).unwrap();
    assert_eq!(take(&log, |e| *e == Event::Run).len(), 1);
    assert_eq!(group.tick(&mut h.ctx()), TickOutcome::Rebuilt);
    assert_eq!(take(&log, |e| *e == Event::Run).len(), 1);
    assert_eq!(group.tick(&mut h.ctx()), TickOutcome::Unchanged);
    assert!(take(&log, |e| *e == Event::Run).is_empty());
}

#[test]
fn equal_order_keys_keep_relative_order() {
    let mut h = Harness::new();
    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    let order = [1, 0, 1, 0];
    let keys: Vec<_> = order
        .iter()
        .enumerate()
        .map(|(i, o)| h.objects.insert(SdfObject::primitive(sdf_sphere(i as f32 + 1.0)).with_order_key(*o)))
        .collect();
    for key in &keys {
        group.register(&mut h.ctx(), *key).unwrap();
    }

    group.tick(&mut h.ctx());
    assert_eq!(group.objects(), &[keys[1], keys[3], keys[0], keys[2]]);
    let radii: Vec<f32> = group.data().iter().map(|d| d.params[0]).collect();
    assert_eq!(radii, vec![2.0, 4.0, 1.0, 3.0]);

    h.objects.get_mut(keys[2]).unwrap().set_order_key(0);
    assert!(h.objects.get(keys[2]).unwrap().is_order_dirty());
    group.tick(&mut h.ctx());
    assert_eq!(group.objects(), &[keys[1], keys[3], keys[2], keys[0]]);
    assert!(!h.objects.get(keys[2]).unwrap().is_order_dirty());
}

#[test]
fn late_consumer_learns_current_buffers() {
    let mut h = Harness::new();
    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    let key = spheres(&mut h, &[1.0])[0];
    group.register(&mut h.ctx(), key).unwrap();

    let (rec, log) = recorder();
    group.add_component(rec);
    group.request_update(&mut h.ctx(), true);

    let handle = group.data_buffer().unwrap().handle;
    let events = log.lock().clone();
    assert_eq!(
        events,
        vec![Event::NotEmpty, Event::Data { objects: handle, count: 1 }, Event::Settings, Event::Run]
    );
}

struct Detachable(Arc<AtomicBool>);

impl GroupComponent for Detachable {
    fn update_data_buffer(&mut self, _: BufferHandle, _: BufferHandle, _: usize) {}

    fn update_settings_buffer(&mut self, _: BufferHandle) {}

    fn is_attached(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[test]
fn detached_consumers_are_dropped() {
    let mut h = Harness::new();
    let attached = Arc::new(AtomicBool::new(true));
    let mut group = SdfGroup::new(&h.registry).with_component(Detachable(attached.clone()));
    group.activate(&mut h.ctx());
    assert_eq!(group.component_count(), 1);

    attached.store(false, Ordering::Relaxed);
    group.request_update(&mut h.ctx(), true);
    assert_eq!(group.component_count(), 0);
}

#[test]
fn lost_buffer_is_recreated() {
    let mut h = Harness::new();
    let (rec, log) = recorder();
    let mut group = SdfGroup::new(&h.registry).with_component(rec);
    group.activate(&mut h.ctx());
    let key = spheres(&mut h, &[1.0])[0];
    group.register(&mut h.ctx(), key).unwrap();
    data_events(&log);

    let lost = group.data_buffer().unwrap().handle;
    h.gpu.invalidate(lost);
    group.request_update(&mut h.ctx(), true);

    let fresh = group.data_buffer().unwrap().handle;
    assert_ne!(fresh, lost);
    assert_eq!(data_events(&log), vec![Event::Data { objects: fresh, count: 1 }]);
}

#[test]
fn clear_releases_everything() {
    let mut h = Harness::new();
    let (rec, log) = recorder();
    let mut group = SdfGroup::new(&h.registry).with_component(rec);
    group.activate(&mut h.ctx());
    let key = h.objects.insert(SdfObject::mesh(common::mesh_asset(3, 0.0)));
    group.register(&mut h.ctx(), key).unwrap();
    log.lock().clear();

    group.clear(&mut h.ctx());
    assert!(group.is_empty());
    assert_eq!(h.objects.get(key).unwrap().owner(), None);
    assert_eq!(h.registry.lock().ref_count(bevy_sdf_group::MeshAssetId(3)), 0);
    assert_eq!(take(&log, |e| *e == Event::Empty), vec![Event::Empty]);
}

#[test]
fn group_queries_use_the_mirror() {
    let mut h = Harness::new();
    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    let key = spheres(&mut h, &[1.0])[0];
    group.register(&mut h.ctx(), key).unwrap();

    assert!(group.overlap_box(Vec3::ZERO, Vec3::splat(1.5)));
    assert!(!group.overlap_box(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE));

    let nearest = group.nearest_point_on_surface(Vec3::new(0.0, 3.0, 0.0));
    assert!((nearest.point - Vec3::Y).length() < 1e-3);
    assert!((group.surface_normal(Vec3::new(0.0, 3.0, 0.0)) - Vec3::Y).length() < 1e-3);

    let hit = group.raycast(Vec3::new(-5.0, 0.0, 0.0), Vec3::X).unwrap();
    assert!((hit.point.x + 1.0).abs() < 1e-2);
    assert!(group.raycast_with_distance(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 2.0).is_none());
}
