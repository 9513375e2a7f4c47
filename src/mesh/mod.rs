//! Mesh-derived SDF data.
//!
//! A mesh asset is a precomputed grid of signed distances (and optionally packed
//! UVs). Producing those arrays from triangle data happens elsewhere; this module only
//! describes what the synchronisation core consumes.

pub mod registry;

pub use registry::{MeshRegistry, SharedMeshRegistry};

use std::fmt;

use bevy::prelude::*;

use crate::error::SdfError;

/// Stable identity of a mesh asset, shared by every object that samples it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshAssetId(pub u64);

/// Resolution and local-space extent of a sample grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshGrid {
    /// Samples per axis; the grid holds `size^3` values.
    pub size: u32,
    pub min_bounds: Vec3,
    pub max_bounds: Vec3,
}

impl MeshGrid {
    pub fn sample_count(&self) -> usize {
        (self.size as usize).pow(3)
    }

    /// Local position of grid sample `(x, y, z)`.
    pub fn sample_position(&self, x: u32, y: u32, z: u32) -> Vec3 {
        let last = (self.size - 1) as f32;
        let t = Vec3::new(x as f32, y as f32, z as f32) / last;
        self.min_bounds + (self.max_bounds - self.min_bounds) * t
    }
}

/// Source of the shared sample and UV arrays for one mesh.
///
/// Output must be deterministic for a given asset state; the registry deduplicates by
/// [`MeshAsset::id`] and copies the arrays once no matter how many objects use them.
pub trait MeshAsset: Send + Sync + fmt::Debug {
    fn id(&self) -> MeshAssetId;
    fn has_uvs(&self) -> bool;
    /// `(samples, packed_uvs)`; `packed_uvs` is empty when [`Self::has_uvs`] is false.
    fn data_arrays(&self) -> (&[f32], &[f32]);
    fn grid(&self) -> MeshGrid;
}

/// In-memory mesh asset with validated array lengths.
#[derive(Debug, Clone)]
pub struct SdfMeshAsset {
    id: MeshAssetId,
    grid: MeshGrid,
    samples: Vec<f32>,
    packed_uvs: Vec<f32>,
}

impl SdfMeshAsset {
    pub fn new(
        id: MeshAssetId,
        grid: MeshGrid,
        samples: Vec<f32>,
        packed_uvs: Vec<f32>,
    ) -> Result<Self, SdfError> {
        if grid.size < 2 {
            return Err(SdfError::GridTooSmall { id, size: grid.size });
        }
        if grid.max_bounds.cmple(grid.min_bounds).any() {
            return Err(SdfError::DegenerateBounds(id));
        }
        let expected = grid.sample_count();
        if samples.len() != expected {
            return Err(SdfError::SampleCountMismatch {
                id,
                size: grid.size,
                expected,
                actual: samples.len(),
            });
        }
        if !packed_uvs.is_empty() && packed_uvs.len() != samples.len() {
            return Err(SdfError::UvCountMismatch {
                id,
                samples: samples.len(),
                uvs: packed_uvs.len(),
            });
        }
        Ok(Self { id, grid, samples, packed_uvs })
    }

    /// Samples `distance` on the grid, without UVs.
    pub fn from_fn(
        id: MeshAssetId,
        grid: MeshGrid,
        distance: impl Fn(Vec3) -> f32,
    ) -> Result<Self, SdfError> {
        let mut samples = Vec::with_capacity(grid.sample_count());
        if grid.size >= 2 {
            for z in 0..grid.size {
                for y in 0..grid.size {
                    for x in 0..grid.size {
                        samples.push(distance(grid.sample_position(x, y, z)));
                    }
                }
            }
        }
        Self::new(id, grid, samples, Vec::new())
    }

    pub fn with_packed_uvs(mut self, packed_uvs: Vec<f32>) -> Result<Self, SdfError> {
        if packed_uvs.len() != self.samples.len() {
            return Err(SdfError::UvCountMismatch {
                id: self.id,
                samples: self.samples.len(),
                uvs: packed_uvs.len(),
            });
        }
        self.packed_uvs = packed_uvs;
        Ok(self)
    }
}

impl MeshAsset for SdfMeshAsset {
    fn id(&self) -> MeshAssetId {
        self.id
    }

    fn has_uvs(&self) -> bool {
        !self.packed_uvs.is_empty()
    }

    fn data_arrays(&self) -> (&[f32], &[f32]) {
        (&self.samples, &self.packed_uvs)
    }

    fn grid(&self) -> MeshGrid {
        self.grid
    }
}
