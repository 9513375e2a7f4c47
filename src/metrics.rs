use bevy::prelude::*;

use crate::group::SdfGroup;
use crate::mesh::SharedMeshRegistry;
use crate::object::SdfObjects;

/// Counters kept by each group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupMetrics {
    /// Ticks that were not skipped.
    pub ticks: u64,
    pub rebuilds: u64,
    pub global_rebuilds: u64,
    /// Object/material buffer pairs created.
    pub reallocations: u64,
}

impl GroupMetrics {
    fn accumulate(&mut self, other: GroupMetrics) {
        self.ticks += other.ticks;
        self.rebuilds += other.rebuilds;
        self.global_rebuilds += other.global_rebuilds;
        self.reallocations += other.reallocations;
    }
}

#[derive(Resource, Default, Debug)]
pub struct SdfMetrics {
    pub groups: usize,
    pub objects: usize,
    pub registered_objects: usize,
    pub shared_meshes: usize,
    pub shared_samples: usize,
    /// Totals across live groups.
    pub totals: GroupMetrics,
}

pub fn flush_metrics(
    mut metrics: ResMut<SdfMetrics>,
    groups: Query<&SdfGroup>,
    objects: Res<SdfObjects>,
    registry: Res<SharedMeshRegistry>,
) {
    let mut totals = GroupMetrics::default();
    let (mut group_count, mut registered) = (0, 0);
    for group in &groups {
        totals.accumulate(group.metrics());
        group_count += 1;
        registered += group.len();
    }

    let registry = registry.lock();
    metrics.groups = group_count;
    metrics.objects = objects.len();
    metrics.registered_objects = registered;
    metrics.shared_meshes = registry.global_meshes().count();
    metrics.shared_samples = registry.samples().len();

    if totals.rebuilds != metrics.totals.rebuilds {
        debug!(
            "sdf metrics: {} groups, {registered}/{} objects registered, {} rebuilds, {} reallocations",
            metrics.groups, metrics.objects, totals.rebuilds, totals.reallocations
        );
    }
    metrics.totals = totals;
}
