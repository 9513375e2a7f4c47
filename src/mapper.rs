//! CPU-side mirror of a group's GPU data.
//!
//! The mirror evaluates the same records the shaders see, so distance, normal and
//! raycast queries need no GPU round-trip. Cost is linear in the number of objects.

use bevy::prelude::*;

use crate::constants::{EMPTY_DISTANCE, RAYMARCH_HIT_DISTANCE, RAYMARCH_MAX_STEPS};
use crate::gpu_data::{SdfGpuData, SdfMaterialGpu, SettingsGpu};
use crate::sdf_module::{Sdf, SdfCombine, SdfPrimitive};

/// Result of a successful [`Mapper::raymarch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Default)]
pub struct Mapper {
    data: Vec<SdfGpuData>,
    materials: Vec<SdfMaterialGpu>,
    samples: Vec<f32>,
    packed_uvs: Vec<f32>,
    settings: SettingsGpu,
}

impl Mapper {
    pub fn set_data(&mut self, data: &[SdfGpuData], materials: &[SdfMaterialGpu]) {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.materials.clear();
        self.materials.extend_from_slice(materials);
    }

    pub fn set_mesh_data(&mut self, samples: &[f32], packed_uvs: &[f32]) {
        self.samples.clear();
        self.samples.extend_from_slice(samples);
        self.packed_uvs.clear();
        self.packed_uvs.extend_from_slice(packed_uvs);
    }

    pub fn set_settings(&mut self, settings: SettingsGpu) {
        self.settings = settings;
    }

    pub fn data(&self) -> &[SdfGpuData] {
        &self.data
    }

    pub fn materials(&self) -> &[SdfMaterialGpu] {
        &self.materials
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn settings(&self) -> SettingsGpu {
        self.settings
    }

    /// Signed distance at `p`, combining records in order.
    pub fn map(&self, p: Vec3) -> f32 {
        let mut distance = EMPTY_DISTANCE;
        for record in &self.data {
            let mut d = self.record_distance(record, p);
            if record.flip != 0 {
                d = -d;
            }
            distance = SdfCombine::from_gpu_code(record.combine).apply(distance, d, record.smoothing);
        }
        distance
    }

    /// Central-difference gradient using the group's normal epsilon.
    pub fn map_normal(&self, p: Vec3) -> Vec3 {
        let e = self.settings.normal_smoothing;
        let gradient = Vec3::new(
            self.map(p + Vec3::X * e) - self.map(p - Vec3::X * e),
            self.map(p + Vec3::Y * e) - self.map(p - Vec3::Y * e),
            self.map(p + Vec3::Z * e) - self.map(p - Vec3::Z * e),
        );
        gradient.normalize_or_zero()
    }

    /// Sphere-traces from `origin` along `direction` up to `max_distance`.
    pub fn raymarch(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let direction = direction.try_normalize()?;
        let mut travelled = 0.0;
        for _ in 0..RAYMARCH_MAX_STEPS {
            let point = origin + direction * travelled;
            let d = self.map(point);
            if d.abs() < RAYMARCH_HIT_DISTANCE {
                return Some(RayHit { point, normal: self.map_normal(point), distance: travelled });
            }
            travelled += d.abs();
            if travelled > max_distance {
                break;
            }
        }
        None
    }

    fn record_distance(&self, record: &SdfGpuData, p: Vec3) -> f32 {
        let world_to_local = Mat4::from_cols_array_2d(&record.world_to_local);
        let local = world_to_local.transform_point3(p);
        match SdfPrimitive::from_gpu(record.kind, record.params) {
            Some(primitive) => primitive.distance(local),
            None => self.mesh_distance(record, local),
        }
    }

    /// Trilinear lookup into the shared sample grid. Points outside the grid add their
    /// distance to the grid bounds.
    fn mesh_distance(&self, record: &SdfGpuData, local: Vec3) -> f32 {
        let size = record.size as usize;
        let Ok(start) = usize::try_from(record.sample_start) else {
            return EMPTY_DISTANCE;
        };
        if size < 2 || start + size.pow(3) > self.samples.len() {
            return EMPTY_DISTANCE;
        }

        let min = Vec3::from_array(record.min_bounds);
        let max = Vec3::from_array(record.max_bounds);
        let clamped = local.clamp(min, max);
        let outside = (local - clamped).length();

        let last = (size - 1) as f32;
        let uvw = (clamped - min) / (max - min) * last;
        let base = uvw.floor().min(Vec3::splat(last - 1.0));
        let t = uvw - base;
        let (x, y, z) = (base.x as usize, base.y as usize, base.z as usize);

        let sample = |dx: usize, dy: usize, dz: usize| {
            self.samples[start + (x + dx) + (y + dy) * size + (z + dz) * size * size]
        };
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

        let c00 = lerp(sample(0, 0, 0), sample(1, 0, 0), t.x);
        let c10 = lerp(sample(0, 1, 0), sample(1, 1, 0), t.x);
        let c01 = lerp(sample(0, 0, 1), sample(1, 0, 1), t.x);
        let c11 = lerp(sample(0, 1, 1), sample(1, 1, 1), t.x);
        let c0 = lerp(c00, c10, t.y);
        let c1 = lerp(c01, c11, t.y);
        lerp(c0, c1, t.z) + outside
    }
}
