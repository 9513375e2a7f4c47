use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use bevy::prelude::*;
use parking_lot::{Mutex, MutexGuard};

use super::{MeshAsset, MeshAssetId};
use crate::buffer::{self, GlobalBufferSlot, GpuBackend, GpuBuffer};
use crate::group::GroupId;

/// Process-wide cache of deduplicated mesh samples and UVs.
///
/// Refcounts change only through [`MeshRegistry::acquire`] and
/// [`MeshRegistry::release`], which groups call from registration and deregistration.
/// An asset id is a member of the global mesh set exactly while its refcount is
/// non-zero; the registry keeps the asset alive for that long.
pub struct MeshRegistry {
    ref_counts: HashMap<MeshAssetId, u32>,
    /// Insertion-ordered set of meshes with live references.
    global_meshes: Vec<(MeshAssetId, Arc<dyn MeshAsset>)>,
    sample_spans: HashMap<MeshAssetId, Range<usize>>,
    uv_spans: HashMap<MeshAssetId, Range<usize>>,
    samples: Vec<f32>,
    packed_uvs: Vec<f32>,
    samples_buffer: Option<GpuBuffer>,
    uvs_buffer: Option<GpuBuffer>,
    global_dirty: bool,
    generation: u64,
    next_group: u64,
}

impl Default for MeshRegistry {
    fn default() -> Self {
        Self {
            ref_counts: HashMap::new(),
            global_meshes: Vec::new(),
            sample_spans: HashMap::new(),
            uv_spans: HashMap::new(),
            samples: Vec::new(),
            packed_uvs: Vec::new(),
            samples_buffer: None,
            uvs_buffer: None,
            global_dirty: true,
            generation: 0,
            next_group: 0,
        }
    }
}

impl MeshRegistry {
    /// Records one more registered object referencing `asset`. Returns the new count.
    pub fn acquire(&mut self, asset: &Arc<dyn MeshAsset>) -> u32 {
        let id = asset.id();
        let count = self.ref_counts.entry(id).or_insert(0);
        *count += 1;
        let count = *count;

        if count == 1 {
            if !self.contains(id) {
                self.global_meshes.push((id, asset.clone()));
            }
            self.global_dirty = true;
            debug!("mesh registry: {id:?} gained its first reference");
        }
        count
    }

    /// Drops one reference to `id`. At zero the mesh leaves every registry structure;
    /// its span disappears with the next global rebuild.
    pub fn release(&mut self, id: MeshAssetId) -> u32 {
        let Some(count) = self.ref_counts.get_mut(&id) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return *count;
        }

        self.ref_counts.remove(&id);
        self.global_meshes.retain(|(mesh, _)| *mesh != id);
        self.global_dirty = true;
        debug!("mesh registry: {id:?} lost its last reference");
        0
    }

    pub fn ref_count(&self, id: MeshAssetId) -> u32 {
        self.ref_counts.get(&id).copied().unwrap_or(0)
    }

    /// Whether `id` is in the global mesh set.
    pub fn contains(&self, id: MeshAssetId) -> bool {
        self.global_meshes.iter().any(|(mesh, _)| *mesh == id)
    }

    pub fn global_meshes(&self) -> impl Iterator<Item = MeshAssetId> + '_ {
        self.global_meshes.iter().map(|(id, _)| *id)
    }

    pub fn sample_start(&self, id: MeshAssetId) -> Option<i32> {
        self.sample_spans.get(&id).map(|span| span.start as i32)
    }

    pub fn uv_start(&self, id: MeshAssetId) -> Option<i32> {
        self.uv_spans.get(&id).map(|span| span.start as i32)
    }

    /// Range of `id`'s data inside [`Self::samples`].
    pub fn sample_span(&self, id: MeshAssetId) -> Option<Range<usize>> {
        self.sample_spans.get(&id).cloned()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn packed_uvs(&self) -> &[f32] {
        &self.packed_uvs
    }

    pub fn is_dirty(&self) -> bool {
        self.global_dirty
    }

    pub fn mark_dirty(&mut self) {
        self.global_dirty = true;
    }

    /// Incremented by every [`Self::rebuild_global`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn samples_buffer(&self) -> Option<GpuBuffer> {
        self.samples_buffer
    }

    pub fn uvs_buffer(&self) -> Option<GpuBuffer> {
        self.uvs_buffer
    }

    pub fn buffers_missing(&self, gpu: &dyn GpuBackend) -> bool {
        buffer::is_missing(&self.samples_buffer, gpu) || buffer::is_missing(&self.uvs_buffer, gpu)
    }

    /// Regenerates the shared arrays from scratch and returns `true` when either shared
    /// buffer had to be reallocated.
    ///
    /// `locals` are the mesh assets of the calling group; any of them missing from the
    /// global set is added back. Entries without a reference that the caller no longer
    /// passes are dropped.
    pub fn rebuild_global(&mut self, locals: &[Arc<dyn MeshAsset>], gpu: &mut dyn GpuBackend) -> bool {
        let previous_samples = self.samples.len();
        let previous_uvs = self.packed_uvs.len();

        self.samples.clear();
        self.packed_uvs.clear();
        self.sample_spans.clear();
        self.uv_spans.clear();

        let ref_counts = &self.ref_counts;
        self.global_meshes
            .retain(|(id, _)| ref_counts.contains_key(id) || locals.iter().any(|asset| asset.id() == *id));
        for asset in locals {
            if !self.contains(asset.id()) {
                self.global_meshes.push((asset.id(), asset.clone()));
            }
        }

        for (id, asset) in &self.global_meshes {
            let (samples, packed_uvs) = asset.data_arrays();

            if !self.sample_spans.contains_key(id) {
                let start = self.samples.len();
                self.samples.extend_from_slice(samples);
                self.sample_spans.insert(*id, start..self.samples.len());
            }

            if asset.has_uvs() && !self.uv_spans.contains_key(id) {
                let start = self.packed_uvs.len();
                self.packed_uvs.extend_from_slice(packed_uvs);
                self.uv_spans.insert(*id, start..self.packed_uvs.len());
            }
        }

        let mut new_buffers = false;
        let stride = std::mem::size_of::<f32>();

        if buffer::is_missing(&self.samples_buffer, gpu) || previous_samples != self.samples.len() {
            buffer::reallocate(&mut self.samples_buffer, gpu, "sdf_mesh_samples", self.samples.len(), stride);
            new_buffers = true;
        }
        if let (Some(target), false) = (self.samples_buffer, self.samples.is_empty()) {
            if let Err(err) = target.upload(gpu, &self.samples) {
                warn!("mesh registry: sample upload failed: {err}");
            }
        }

        if buffer::is_missing(&self.uvs_buffer, gpu) || previous_uvs != self.packed_uvs.len() {
            buffer::reallocate(&mut self.uvs_buffer, gpu, "sdf_mesh_packed_uvs", self.packed_uvs.len(), stride);
            new_buffers = true;
        }
        if let (Some(target), false) = (self.uvs_buffer, self.packed_uvs.is_empty()) {
            if let Err(err) = target.upload(gpu, &self.packed_uvs) {
                warn!("mesh registry: uv upload failed: {err}");
            }
        }

        self.global_dirty = false;
        self.generation += 1;

        info!(
            "mesh registry: rebuilt {} meshes ({} samples, {} uvs, new buffers: {new_buffers})",
            self.sample_spans.len(),
            self.samples.len(),
            self.packed_uvs.len(),
        );
        new_buffers
    }

    /// Binds the shared buffers to their global slots.
    pub fn publish(&self, gpu: &mut dyn GpuBackend) {
        if let Some(samples) = self.samples_buffer {
            gpu.set_global_buffer(GlobalBufferSlot::MeshSamples, samples.handle);
        }
        if let Some(uvs) = self.uvs_buffer {
            gpu.set_global_buffer(GlobalBufferSlot::MeshPackedUvs, uvs.handle);
        }
    }

    /// Frees the shared buffers. Meant for process shutdown; the next rebuild
    /// recreates them if groups are still alive.
    pub fn release_buffers(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(samples) = self.samples_buffer.take() {
            samples.release(gpu);
        }
        if let Some(uvs) = self.uvs_buffer.take() {
            uvs.release(gpu);
        }
        self.global_dirty = true;
    }

    /// Forgets every reference and releases the shared buffers.
    pub fn reset(&mut self, gpu: &mut dyn GpuBackend) {
        self.release_buffers(gpu);
        self.ref_counts.clear();
        self.global_meshes.clear();
        self.sample_spans.clear();
        self.uv_spans.clear();
        self.samples.clear();
        self.packed_uvs.clear();
    }

    pub(crate) fn allocate_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }
}

/// Handle to the process-wide [`MeshRegistry`], injected into every group.
///
/// All refcount transitions and shared-array rebuilds run under this one lock.
#[derive(Resource, Clone, Default)]
pub struct SharedMeshRegistry(Arc<Mutex<MeshRegistry>>);

impl SharedMeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, MeshRegistry> {
        self.0.lock()
    }

    pub fn release_buffers(&self, gpu: &mut dyn GpuBackend) {
        self.lock().release_buffers(gpu);
    }

    pub fn reset(&self, gpu: &mut dyn GpuBackend) {
        self.lock().reset(gpu);
    }
}
