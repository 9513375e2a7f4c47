//! Object records: the primitives and mesh-backed shapes a group turns into GPU data.

use std::sync::Arc;

use bevy::prelude::*;
use slotmap::{new_key_type, SlotMap};

use crate::constants::NO_START_INDEX;
use crate::gpu_data::{SdfGpuData, SdfMaterialGpu};
use crate::group::GroupId;
use crate::mesh::{MeshAsset, MeshAssetId};
use crate::sdf_module::{kind, SdfCombine, SdfPrimitive};

new_key_type! {
    /// Stable identity of an object record. Survives reordering; a key removed from
    /// [`SdfObjects`] counts as destroyed.
    pub struct ObjectKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SdfMaterialType {
    #[default]
    Color,
    Texture,
}

/// Surface appearance carried alongside each object record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdfMaterial {
    pub material_type: SdfMaterialType,
    /// Linear RGB.
    pub color: Vec3,
    pub emission: Vec3,
    pub metallic: f32,
    pub smoothness: f32,
    pub thickness: f32,
    pub subsurface_amount: f32,
    pub texture_index: i32,
}

impl Default for SdfMaterial {
    fn default() -> Self {
        Self {
            material_type: SdfMaterialType::Color,
            color: Vec3::ONE,
            emission: Vec3::ZERO,
            metallic: 0.0,
            smoothness: 0.5,
            thickness: 0.0,
            subsurface_amount: 0.0,
            texture_index: -1,
        }
    }
}

impl SdfMaterial {
    pub fn to_gpu(&self) -> SdfMaterialGpu {
        SdfMaterialGpu {
            color: self.color.to_array(),
            material_type: match self.material_type {
                SdfMaterialType::Color => 0,
                SdfMaterialType::Texture => 1,
            },
            emission: self.emission.to_array(),
            metallic: self.metallic,
            smoothness: self.smoothness,
            thickness: self.thickness,
            subsurface_amount: self.subsurface_amount,
            texture_index: self.texture_index,
        }
    }
}

/// Reference from an object to a shared mesh asset. The object does not own the
/// asset's arrays; the registry copies them once into the shared buffers.
#[derive(Debug, Clone)]
pub struct SdfMesh {
    pub asset: Arc<dyn MeshAsset>,
}

#[derive(Debug, Clone)]
pub enum SdfObjectKind {
    Primitive(SdfPrimitive),
    Mesh(SdfMesh),
}

/// Per-object state tracked by a group.
#[derive(Debug, Clone)]
pub struct SdfObject {
    kind: SdfObjectKind,
    transform: Transform,
    combine: SdfCombine,
    smoothing: f32,
    flip: bool,
    material: SdfMaterial,
    order_key: i32,
    last_seen_order: Option<i32>,
    dirty: bool,
    order_dirty: bool,
    owner: Option<GroupId>,
}

impl SdfObject {
    fn new(kind: SdfObjectKind) -> Self {
        Self {
            kind,
            transform: Transform::IDENTITY,
            combine: SdfCombine::default(),
            smoothing: 0.0,
            flip: false,
            material: SdfMaterial::default(),
            order_key: 0,
            last_seen_order: None,
            dirty: true,
            order_dirty: false,
            owner: None,
        }
    }

    pub fn primitive(primitive: SdfPrimitive) -> Self {
        Self::new(SdfObjectKind::Primitive(primitive))
    }

    pub fn mesh(asset: Arc<dyn MeshAsset>) -> Self {
        Self::new(SdfObjectKind::Mesh(SdfMesh { asset }))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_translation(self, translation: Vec3) -> Self {
        self.with_transform(Transform::from_translation(translation))
    }

    pub fn with_combine(mut self, combine: SdfCombine, smoothing: f32) -> Self {
        self.combine = combine;
        self.smoothing = smoothing;
        self
    }

    pub fn with_material(mut self, material: SdfMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    pub fn with_order_key(mut self, order_key: i32) -> Self {
        self.order_key = order_key;
        self
    }

    pub fn kind(&self) -> &SdfObjectKind {
        &self.kind
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn combine(&self) -> SdfCombine {
        self.combine
    }

    pub fn material(&self) -> &SdfMaterial {
        &self.material
    }

    pub fn order_key(&self) -> i32 {
        self.order_key
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_order_dirty(&self) -> bool {
        self.order_dirty
    }

    pub fn owner(&self) -> Option<GroupId> {
        self.owner
    }

    pub fn mesh_asset(&self) -> Option<&Arc<dyn MeshAsset>> {
        match &self.kind {
            SdfObjectKind::Mesh(mesh) => Some(&mesh.asset),
            SdfObjectKind::Primitive(_) => None,
        }
    }

    pub fn mesh_id(&self) -> Option<MeshAssetId> {
        self.mesh_asset().map(|asset| asset.id())
    }

    pub fn set_transform(&mut self, transform: Transform) {
        if self.transform != transform {
            self.transform = transform;
            self.mark_dirty();
        }
    }

    /// Changing between primitive and mesh while registered moves the mesh reference
    /// on the owning group's next tick.
    pub fn set_primitive(&mut self, primitive: SdfPrimitive) {
        self.kind = SdfObjectKind::Primitive(primitive);
        self.mark_dirty();
    }

    pub fn set_mesh(&mut self, asset: Arc<dyn MeshAsset>) {
        self.kind = SdfObjectKind::Mesh(SdfMesh { asset });
        self.mark_dirty();
    }

    pub fn set_combine(&mut self, combine: SdfCombine, smoothing: f32) {
        self.combine = combine;
        self.smoothing = smoothing;
        self.mark_dirty();
    }

    pub fn set_material(&mut self, material: SdfMaterial) {
        self.material = material;
        self.mark_dirty();
    }

    pub fn set_flip(&mut self, flip: bool) {
        self.flip = flip;
        self.mark_dirty();
    }

    /// Moves the object within its siblings.
    pub fn set_order_key(&mut self, order_key: i32) {
        self.order_key = order_key;
        self.check_order(order_key);
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Flags a reorder when `current` differs from the last observed key. The first
    /// observation only records the key.
    pub fn check_order(&mut self, current: i32) {
        if self.last_seen_order == Some(current) {
            return;
        }
        if self.last_seen_order.is_some() {
            self.order_dirty = true;
        }
        self.last_seen_order = Some(current);
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_order_clean(&mut self) {
        self.order_dirty = false;
    }

    pub(crate) fn attach(&mut self, group: GroupId) {
        self.owner = Some(group);
        self.last_seen_order = Some(self.order_key);
        self.mark_dirty();
    }

    pub(crate) fn detach(&mut self) {
        self.owner = None;
        self.mark_clean();
        self.mark_order_clean();
    }

    /// GPU record for this object. Mesh-backed objects pass the offsets of their data
    /// in the shared sample/UV buffers; [`NO_START_INDEX`] marks "none".
    pub fn gpu_data(&self, sample_start: i32, uv_start: i32) -> SdfGpuData {
        let mut data = SdfGpuData {
            world_to_local: self.transform.compute_matrix().inverse().to_cols_array_2d(),
            combine: self.combine.gpu_code(),
            smoothing: self.smoothing,
            flip: u32::from(self.flip),
            sample_start: NO_START_INDEX,
            uv_start: NO_START_INDEX,
            ..default()
        };

        match &self.kind {
            SdfObjectKind::Primitive(primitive) => {
                data.kind = primitive.kind();
                data.params = primitive.gpu_params();
            }
            SdfObjectKind::Mesh(mesh) => {
                let grid = mesh.asset.grid();
                data.kind = kind::MESH;
                data.min_bounds = grid.min_bounds.to_array();
                data.max_bounds = grid.max_bounds.to_array();
                data.size = grid.size;
                data.sample_start = sample_start;
                data.uv_start = uv_start;
            }
        }
        data
    }

    pub fn material_gpu(&self) -> SdfMaterialGpu {
        self.material.to_gpu()
    }
}

/// Owner-side store of every object record in the app.
#[derive(Resource, Default)]
pub struct SdfObjects {
    objects: SlotMap<ObjectKey, SdfObject>,
}

impl SdfObjects {
    pub fn insert(&mut self, object: SdfObject) -> ObjectKey {
        self.objects.insert(object)
    }

    /// Destroys a record. Groups holding the key compact it out on their next pass.
    pub fn remove(&mut self, key: ObjectKey) -> Option<SdfObject> {
        self.objects.remove(key)
    }

    pub fn get(&self, key: ObjectKey) -> Option<&SdfObject> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut SdfObject> {
        self.objects.get_mut(key)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, &SdfObject)> {
        self.objects.iter()
    }
}
