//! Fixed-layout records uploaded to the group's storage buffers.
//!
//! Field order and padding match the WGSL structs, so keep every field 4 bytes wide.

use bytemuck::{Pod, Zeroable};

use crate::constants::MIN_SMOOTHING;

/// One entry of the object-data buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SdfGpuData {
    /// Column-major world-to-local matrix.
    pub world_to_local: [[f32; 4]; 4],
    pub params: [f32; 4],
    /// Local-space bounds of a mesh sample grid; zero for primitives.
    pub min_bounds: [f32; 3],
    pub kind: u32,
    pub max_bounds: [f32; 3],
    pub combine: u32,
    pub sample_start: i32,
    pub uv_start: i32,
    /// Sample grid resolution along one axis; zero for primitives.
    pub size: u32,
    pub smoothing: f32,
    pub flip: u32,
    pub _pad: [u32; 3],
}

impl SdfGpuData {
    pub const STRIDE: usize = std::mem::size_of::<Self>();

    pub fn is_mesh(&self) -> bool {
        self.kind == crate::sdf_module::kind::MESH
    }
}

/// One entry of the material buffer, parallel to [`SdfGpuData`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SdfMaterialGpu {
    pub color: [f32; 3],
    pub material_type: u32,
    pub emission: [f32; 3],
    pub metallic: f32,
    pub smoothness: f32,
    pub thickness: f32,
    pub subsurface_amount: f32,
    pub texture_index: i32,
}

impl SdfMaterialGpu {
    pub const STRIDE: usize = std::mem::size_of::<Self>();
}

/// Single-element settings buffer shared by every consumer of a group.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SettingsGpu {
    /// Epsilon for gradient estimation, never below [`MIN_SMOOTHING`].
    pub normal_smoothing: f32,
    pub thickness_max_distance: f32,
    pub thickness_falloff: f32,
}

impl SettingsGpu {
    pub const STRIDE: usize = std::mem::size_of::<Self>();
}

impl Default for SettingsGpu {
    fn default() -> Self {
        Self {
            normal_smoothing: crate::constants::DEFAULT_NORMAL_SMOOTHING.max(MIN_SMOOTHING),
            thickness_max_distance: 0.0,
            thickness_falloff: 0.0,
        }
    }
}
