//! SDF groups: ordered sets of object records kept in sync with GPU buffers.
//!
//! A group owns the list of object keys registered into it, the per-object data and
//! material buffers built from those records, and a [`Mapper`] mirroring the same data
//! for CPU queries. Mesh-backed objects share sample/UV arrays through the
//! [`SharedMeshRegistry`] injected at construction.

mod component;
mod rebuild;
mod settings;

pub use component::GroupComponent;
pub use settings::GroupSettings;

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::buffer::{GpuBackend, GpuBuffer};
use crate::constants::DEFAULT_RAYCAST_DISTANCE;
use crate::error::SdfError;
use crate::gpu_data::{SdfGpuData, SdfMaterialGpu};
use crate::mapper::{Mapper, RayHit};
use crate::mesh::{MeshAsset, MeshAssetId, SharedMeshRegistry};
use crate::metrics::GroupMetrics;
use crate::object::{ObjectKey, SdfObjects};
use crate::query::{self, SurfacePoint};
use component::ComponentSlot;

/// Process-unique identity of a group, handed out by the mesh registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

/// Everything a group touches outside itself during a registration or rebuild.
pub struct GroupContext<'a> {
    pub objects: &'a mut SdfObjects,
    pub gpu: &'a mut dyn GpuBackend,
}

impl<'a> GroupContext<'a> {
    pub fn new(objects: &'a mut SdfObjects, gpu: &'a mut dyn GpuBackend) -> Self {
        Self { objects, gpu }
    }
}

/// What a group still held outside itself when it was torn down. The caller detaches
/// the objects and releases the buffers with whatever world access it has.
#[derive(Debug, Default)]
pub struct GroupTeardown {
    pub objects: Vec<ObjectKey>,
    pub buffers: Vec<GpuBuffer>,
}

/// What a [`SdfGroup::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Inactive, suspended or paused.
    Skipped,
    Unchanged,
    Rebuilt,
}

#[derive(Component)]
pub struct SdfGroup {
    id: GroupId,
    registry: SharedMeshRegistry,
    settings: GroupSettings,
    components: Vec<ComponentSlot>,
    objects: Vec<ObjectKey>,
    /// Mesh asset each registered mesh-backed key holds a registry reference to.
    mesh_refs: HashMap<ObjectKey, MeshAssetId>,
    data: Vec<SdfGpuData>,
    materials: Vec<SdfMaterialGpu>,
    data_buffer: Option<GpuBuffer>,
    material_buffer: Option<GpuBuffer>,
    settings_buffer: Option<GpuBuffer>,
    mapper: Mapper,
    /// Registry generation the mirror's mesh data was copied from.
    seen_generation: Option<u64>,
    active: bool,
    suspended: bool,
    running: bool,
    ready: bool,
    force_update: bool,
    transform_changed: bool,
    local_data_dirty: bool,
    local_order_dirty: bool,
    metrics: GroupMetrics,
}

impl SdfGroup {
    pub fn new(registry: &SharedMeshRegistry) -> Self {
        let id = registry.lock().allocate_group_id();
        Self {
            id,
            registry: registry.clone(),
            settings: GroupSettings::default(),
            components: Vec::new(),
            objects: Vec::new(),
            mesh_refs: HashMap::new(),
            data: Vec::new(),
            materials: Vec::new(),
            data_buffer: None,
            material_buffer: None,
            settings_buffer: None,
            mapper: Mapper::default(),
            seen_generation: None,
            active: false,
            suspended: false,
            running: true,
            ready: false,
            force_update: false,
            transform_changed: false,
            local_data_dirty: true,
            local_order_dirty: true,
            metrics: GroupMetrics::default(),
        }
    }

    pub fn with_settings(mut self, settings: GroupSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_component(mut self, component: impl GroupComponent) -> Self {
        self.add_component(component);
        self
    }

    /// Attaches a consumer. It learns the current buffers and emptiness state on the
    /// next update, even when nothing was reallocated.
    pub fn add_component(&mut self, component: impl GroupComponent) {
        self.components.push(ComponentSlot::new(Box::new(component)));
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn registry(&self) -> &SharedMeshRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    /// Registered keys in evaluation order.
    pub fn objects(&self) -> &[ObjectKey] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_registered(&self, key: ObjectKey) -> bool {
        self.objects.contains(&key)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn data_buffer(&self) -> Option<GpuBuffer> {
        self.data_buffer
    }

    pub fn material_buffer(&self) -> Option<GpuBuffer> {
        self.material_buffer
    }

    pub fn settings_buffer(&self) -> Option<GpuBuffer> {
        self.settings_buffer
    }

    /// Records built by the last rebuild, in evaluation order.
    pub fn data(&self) -> &[SdfGpuData] {
        &self.data
    }

    pub fn materials(&self) -> &[SdfMaterialGpu] {
        &self.materials
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn metrics(&self) -> GroupMetrics {
        self.metrics
    }

    // lifecycle

    /// Brings the group up: forces a global rebuild and a full update with every
    /// consumer notified.
    pub fn activate(&mut self, ctx: &mut GroupContext<'_>) {
        self.active = true;
        self.local_data_dirty = true;
        self.local_order_dirty = true;
        self.registry.lock().mark_dirty();
        self.request_update(ctx, false);
        self.force_update = true;
        debug!("sdf group {:?}: activated with {} objects", self.id, self.objects.len());
    }

    /// Releases the group's own buffers. Registrations and shared buffers survive.
    pub fn deactivate(&mut self, gpu: &mut dyn GpuBackend) {
        self.active = false;
        self.ready = false;
        for slot in [&mut self.data_buffer, &mut self.material_buffer, &mut self.settings_buffer] {
            if let Some(buffer) = slot.take() {
                buffer.release(gpu);
            }
        }
        for slot in &mut self.components {
            slot.has_data_buffer = false;
        }
        debug!("sdf group {:?}: deactivated", self.id);
    }

    /// Empties the group for removal from the world. Mesh references are released here;
    /// object ownership and buffers are handed back in the returned [`GroupTeardown`].
    pub fn teardown(&mut self) -> GroupTeardown {
        {
            let mut registry = self.registry.lock();
            for (_, id) in self.mesh_refs.drain() {
                registry.release(id);
            }
        }
        self.active = false;
        self.ready = false;
        self.data.clear();
        self.materials.clear();
        for slot in &mut self.components {
            slot.has_data_buffer = false;
        }

        let buffers = [&mut self.data_buffer, &mut self.material_buffer, &mut self.settings_buffer]
            .into_iter()
            .filter_map(Option::take)
            .collect();
        debug!("sdf group {:?}: torn down with {} objects", self.id, self.objects.len());
        GroupTeardown { objects: std::mem::take(&mut self.objects), buffers }
    }

    /// Transient external suspension. Updates are ignored until [`Self::resume`].
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
        self.force_update = true;
    }

    /// Pausing skips ticks without touching any state.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn mark_transform_changed(&mut self) {
        self.transform_changed = true;
    }

    /// Forces a rebuild on the next tick.
    pub fn force_update(&mut self) {
        self.force_update = true;
    }

    fn is_enabled(&self) -> bool {
        self.active && !self.suspended
    }

    // registration

    /// Adds `key` to the end of the group. Registering a key twice is a no-op.
    pub fn register(&mut self, ctx: &mut GroupContext<'_>, key: ObjectKey) -> Result<(), SdfError> {
        if self.is_registered(key) {
            return Ok(());
        }

        let object = ctx.objects.get_mut(key).ok_or(SdfError::UnknownObject(key))?;
        if let Some(owner) = object.owner().filter(|owner| *owner != self.id) {
            return Err(SdfError::OwnedByOtherGroup { object: key, owner });
        }

        if let Some(asset) = object.mesh_asset() {
            self.registry.lock().acquire(asset);
            self.mesh_refs.insert(key, asset.id());
        }
        object.attach(self.id);

        let was_empty = self.is_empty();
        self.objects.push(key);
        self.local_data_dirty = true;
        self.local_order_dirty = true;

        self.compact(ctx.objects);
        if was_empty && !self.is_empty() {
            self.notify_emptiness();
        }

        self.request_update(ctx, true);
        Ok(())
    }

    /// Removes `key`. Returns `false` if it was not registered here.
    pub fn deregister(&mut self, ctx: &mut GroupContext<'_>, key: ObjectKey) -> bool {
        let Some(index) = self.objects.iter().position(|k| *k == key) else {
            return false;
        };

        let was_empty = self.is_empty();
        self.objects.remove(index);
        if let Some(id) = self.mesh_refs.remove(&key) {
            self.registry.lock().release(id);
        }
        if let Some(object) = ctx.objects.get_mut(key) {
            object.detach();
        }
        self.local_data_dirty = true;
        self.local_order_dirty = true;

        self.compact(ctx.objects);
        if !was_empty && self.is_empty() {
            self.notify_emptiness();
        }

        self.request_update(ctx, true);
        true
    }

    /// Deregisters every object, releasing all mesh references held by this group.
    pub fn clear(&mut self, ctx: &mut GroupContext<'_>) {
        for key in std::mem::take(&mut self.objects) {
            if let Some(id) = self.mesh_refs.remove(&key) {
                self.registry.lock().release(id);
            }
            if let Some(object) = ctx.objects.get_mut(key) {
                object.detach();
            }
        }
        self.mesh_refs.clear();
        self.local_data_dirty = true;
        self.notify_emptiness();
        self.request_update(ctx, true);
    }

    /// Drops keys whose records were destroyed, releasing their mesh references.
    fn compact(&mut self, objects: &SdfObjects) -> bool {
        let before = self.objects.len();
        let registry = &self.registry;
        let mesh_refs = &mut self.mesh_refs;
        self.objects.retain(|key| {
            let alive = objects.contains(*key);
            if !alive {
                if let Some(id) = mesh_refs.remove(key) {
                    registry.lock().release(id);
                }
            }
            alive
        });

        let removed = before - self.objects.len();
        if removed > 0 {
            debug!("sdf group {:?}: compacted {removed} destroyed objects", self.id);
            self.local_data_dirty = true;
        }
        removed > 0
    }

    /// Moves registry references for members whose mesh changed since registration.
    fn sync_mesh_refs(&mut self, objects: &SdfObjects) {
        for key in &self.objects {
            let Some(object) = objects.get(*key) else {
                continue;
            };
            let held = self.mesh_refs.get(key).copied();
            if held == object.mesh_id() {
                continue;
            }

            let mut registry = self.registry.lock();
            if let Some(id) = held {
                registry.release(id);
                self.mesh_refs.remove(key);
            }
            if let Some(asset) = object.mesh_asset() {
                registry.acquire(asset);
                self.mesh_refs.insert(*key, asset.id());
            }
            debug!("sdf group {:?}: {key:?} switched mesh {held:?} -> {:?}", self.id, object.mesh_id());
        }
    }

    /// Stable sort by order key; equal keys keep their current relative order.
    pub fn reorder(&mut self, objects: &mut SdfObjects) {
        self.compact(objects);

        let mut keyed: Vec<(i32, ObjectKey)> = self
            .objects
            .iter()
            .filter_map(|key| {
                let object = objects.get_mut(*key)?;
                object.mark_order_clean();
                Some((object.order_key(), *key))
            })
            .collect();
        keyed.sort_by_key(|(order, _)| *order);

        self.objects = keyed.into_iter().map(|(_, key)| key).collect();
        self.local_order_dirty = false;
    }

    // update orchestration

    /// Full update: refreshes consumers, rebuilds data and settings, then runs the
    /// consumers if the group holds anything. Ignored while inactive or suspended.
    pub fn request_update(&mut self, ctx: &mut GroupContext<'_>, only_send_buffer_on_change: bool) {
        if !self.is_enabled() {
            return;
        }

        self.ready = false;
        self.refresh_components();
        self.notify_emptiness();
        self.rebuild(ctx, only_send_buffer_on_change);
        self.rebuild_settings(ctx.gpu);
        self.ready = true;

        if !self.is_empty() {
            self.run_components();
        }
    }

    /// Per-frame pass. Picks up dirty flags set on member objects since the last tick
    /// and rebuilds only when something changed.
    pub fn tick(&mut self, ctx: &mut GroupContext<'_>) -> TickOutcome {
        if !self.is_enabled() || !self.running {
            return TickOutcome::Skipped;
        }
        self.metrics.ticks += 1;

        if !self.ready {
            self.request_update(ctx, true);
        }

        for key in &self.objects {
            if let Some(object) = ctx.objects.get(*key) {
                self.local_data_dirty |= object.is_dirty();
                self.local_order_dirty |= object.is_order_dirty();
            }
        }
        self.sync_mesh_refs(ctx.objects);
        if self.compact(ctx.objects) && self.is_empty() {
            self.notify_emptiness();
        }

        let mut changed = false;
        if self.local_order_dirty {
            self.reorder(ctx.objects);
            changed = true;
        }

        let (global_dirty, generation) = {
            let registry = self.registry.lock();
            (registry.is_dirty(), registry.generation())
        };
        // another group rebuilt the shared arrays, so our mesh offsets may be stale
        let stale_meshes = !self.mesh_refs.is_empty() && self.seen_generation != Some(generation);

        if changed
            || self.force_update
            || global_dirty
            || stale_meshes
            || self.local_data_dirty
            || self.transform_changed
        {
            changed = true;
            self.rebuild(ctx, true);
        }

        self.force_update = false;
        self.transform_changed = false;

        if !changed {
            return TickOutcome::Unchanged;
        }
        if !self.is_empty() {
            self.run_components();
        }
        TickOutcome::Rebuilt
    }

    /// Replaces the settings and pushes them to consumers and the mirror.
    pub fn set_settings(&mut self, settings: GroupSettings, gpu: &mut dyn GpuBackend) {
        self.settings = settings;
        self.on_settings_changed(gpu);
    }

    pub fn on_settings_changed(&mut self, gpu: &mut dyn GpuBackend) {
        if self.is_enabled() {
            self.rebuild_settings(gpu);
        }
    }

    fn refresh_components(&mut self) {
        let before = self.components.len();
        self.components.retain(|slot| slot.component.is_attached());
        let dropped = before - self.components.len();
        if dropped > 0 {
            debug!("sdf group {:?}: dropped {dropped} detached consumers", self.id);
        }
    }

    fn notify_emptiness(&mut self) {
        let empty = self.is_empty();
        for slot in &mut self.components {
            slot.notify_emptiness(empty);
        }
    }

    fn run_components(&mut self) {
        for slot in &mut self.components {
            slot.component.run();
        }
    }

    fn local_mesh_assets(&self, objects: &SdfObjects) -> Vec<Arc<dyn MeshAsset>> {
        self.objects
            .iter()
            .filter_map(|key| objects.get(*key)?.mesh_asset().cloned())
            .collect()
    }

    // queries

    pub fn distance_to_surface(&self, point: Vec3) -> f32 {
        self.mapper.map(point)
    }

    pub fn surface_normal(&self, point: Vec3) -> Vec3 {
        self.mapper.map_normal(point)
    }

    pub fn nearest_point_on_surface(&self, point: Vec3) -> SurfacePoint {
        query::nearest_point_on_surface(&self.mapper, point)
    }

    pub fn overlap_sphere(&self, centre: Vec3, radius: f32) -> bool {
        query::overlap_sphere(&self.mapper, centre, radius)
    }

    pub fn overlap_box(&self, centre: Vec3, half_extents: Vec3) -> bool {
        query::overlap_box(&self.mapper, centre, half_extents)
    }

    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        self.raycast_with_distance(origin, direction, DEFAULT_RAYCAST_DISTANCE)
    }

    pub fn raycast_with_distance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        self.mapper.raymarch(origin, direction, max_distance)
    }
}
