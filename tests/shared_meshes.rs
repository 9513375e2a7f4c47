mod common;

use bevy::prelude::*;
use bevy_sdf_group::constants::NO_START_INDEX;
use bevy_sdf_group::sdf_module::sdf_sphere;
use bevy_sdf_group::{GlobalBufferSlot, GpuBackend, MeshAssetId, SdfGroup, SdfObject, TickOutcome};

use common::{mesh_asset, Harness};

const X: MeshAssetId = MeshAssetId(1);
const Y: MeshAssetId = MeshAssetId(2);

#[test]
fn shared_mesh_refcounts_across_groups() {
    let mut h = Harness::new();
    let x = mesh_asset(1, 1.0);
    let y = mesh_asset(2, 2.0);

    let mut g1 = SdfGroup::new(&h.registry);
    let mut g2 = SdfGroup::new(&h.registry);
    g1.activate(&mut h.ctx());
    g2.activate(&mut h.ctx());

    let a = h.objects.insert(SdfObject::mesh(x.clone()));
    let b = h.objects.insert(SdfObject::mesh(x.clone()));
    let c = h.objects.insert(SdfObject::mesh(y.clone()));
    let d = h.objects.insert(SdfObject::mesh(x.clone()));

    for key in [a, b, c] {
        g1.register(&mut h.ctx(), key).unwrap();
    }
    g2.register(&mut h.ctx(), d).unwrap();

    {
        let registry = h.registry.lock();
        assert_eq!(registry.ref_count(X), 3);
        assert_eq!(registry.ref_count(Y), 1);
        assert_eq!(registry.samples().len(), 16);
        assert_eq!(registry.sample_span(X), Some(0..8));
        assert_eq!(registry.sample_span(Y), Some(8..16));
    }

    g1.deregister(&mut h.ctx(), a);
    g1.deregister(&mut h.ctx(), b);
    {
        let registry = h.registry.lock();
        assert_eq!(registry.ref_count(X), 1);
        assert!(registry.contains(X));
        assert_eq!(registry.sample_span(X), Some(0..8));
    }

    g2.deregister(&mut h.ctx(), d);
    {
        let registry = h.registry.lock();
        assert_eq!(registry.ref_count(X), 0);
        assert!(!registry.contains(X));
        assert_eq!(registry.sample_span(X), None);
        assert_eq!(registry.sample_span(Y), Some(0..8));
        assert!(registry.samples().iter().all(|s| *s == 2.0));
        // the shrunken buffer replaced the old one in the global namespace
        let samples = registry.samples_buffer().unwrap();
        assert_eq!(h.gpu.global_buffer(GlobalBufferSlot::MeshSamples), Some(samples.handle));
    }

    // g1 still points at Y's old offset until its next tick
    assert_eq!(g1.data()[0].sample_start, 8);
    assert_eq!(g1.tick(&mut h.ctx()), TickOutcome::Rebuilt);
    assert_eq!(g1.data()[0].sample_start, 0);
    assert_eq!(g1.mapper().samples(), h.registry.lock().samples());
}

#[test]
fn each_asset_is_copied_once() {
    let mut h = Harness::new();
    let x = mesh_asset(1, 1.0);
    let mut groups: Vec<SdfGroup> = (0..3).map(|_| SdfGroup::new(&h.registry)).collect();

    for group in &mut groups {
        group.activate(&mut h.ctx());
        for _ in 0..2 {
            let key = h.objects.insert(SdfObject::mesh(x.clone()));
            group.register(&mut h.ctx(), key).unwrap();
        }
    }

    let registry = h.registry.lock();
    assert_eq!(registry.ref_count(X), 6);
    assert_eq!(registry.samples().len(), 8);
    assert_eq!(registry.global_meshes().collect::<Vec<_>>(), vec![X]);
}

#[test]
fn destroyed_mesh_object_releases_its_reference() {
    let mut h = Harness::new();
    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    let key = h.objects.insert(SdfObject::mesh(mesh_asset(1, 1.0)));
    group.register(&mut h.ctx(), key).unwrap();
    assert_eq!(h.registry.lock().ref_count(X), 1);

    h.objects.remove(key);
    group.tick(&mut h.ctx());

    assert!(group.is_empty());
    let registry = h.registry.lock();
    assert_eq!(registry.ref_count(X), 0);
    assert!(registry.samples().is_empty());
}

#[test]
fn registry_reset_recovers_from_group_meshes() {
    let mut h = Harness::new();
    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    let key = h.objects.insert(SdfObject::mesh(mesh_asset(1, 1.0)));
    group.register(&mut h.ctx(), key).unwrap();

    h.registry.reset(&mut h.gpu);
    assert!(h.registry.lock().samples().is_empty());

    assert_eq!(group.tick(&mut h.ctx()), TickOutcome::Rebuilt);
    let registry = h.registry.lock();
    assert_eq!(registry.sample_span(X), Some(0..8));
    assert_eq!(group.data()[0].sample_start, 0);
}

#[test]
fn mesh_object_is_queryable() {
    let mut h = Harness::new();
    let grid = bevy_sdf_group::MeshGrid { size: 9, min_bounds: Vec3::splat(-2.0), max_bounds: Vec3::splat(2.0) };
    let asset = bevy_sdf_group::SdfMeshAsset::from_fn(MeshAssetId(5), grid, |p| p.length() - 1.0).unwrap();
    let key = h.objects.insert(SdfObject::mesh(std::sync::Arc::new(asset)).with_translation(Vec3::new(0.0, 0.0, 4.0)));

    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    group.register(&mut h.ctx(), key).unwrap();

    let hit = group.raycast(Vec3::ZERO, Vec3::Z).unwrap();
    assert!((hit.point.z - 3.0).abs() < 0.05);
    assert!(group.overlap_sphere(Vec3::ZERO, 3.1));
    assert!(!group.overlap_sphere(Vec3::ZERO, 2.5));
}

#[test]
fn switching_kind_moves_the_mesh_reference() {
    let mut h = Harness::new();
    let mut group = SdfGroup::new(&h.registry);
    group.activate(&mut h.ctx());
    let key = h.objects.insert(SdfObject::mesh(mesh_asset(6, 0.5)));
    group.register(&mut h.ctx(), key).unwrap();
    group.tick(&mut h.ctx());
    assert_eq!(h.registry.lock().ref_count(MeshAssetId(6)), 1);

    h.objects.get_mut(key).unwrap().set_primitive(sdf_sphere(1.0));
    assert_eq!(group.tick(&mut h.ctx()), TickOutcome::Rebuilt);
    assert_eq!(h.registry.lock().ref_count(MeshAssetId(6)), 0);
    assert!(h.registry.lock().samples().is_empty());
    assert_eq!(group.data()[0].sample_start, NO_START_INDEX);

    h.objects.get_mut(key).unwrap().set_mesh(mesh_asset(7, 0.25));
    group.tick(&mut h.ctx());
    assert_eq!(h.registry.lock().ref_count(MeshAssetId(7)), 1);
    assert_eq!(group.data()[0].sample_start, 0);

    // the reference follows the current mesh out of the group
    assert!(group.deregister(&mut h.ctx(), key));
    assert_eq!(h.registry.lock().ref_count(MeshAssetId(7)), 0);
}
