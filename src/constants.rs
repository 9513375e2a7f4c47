//! Global size & tuning constants

/// Lower bound for every smoothing factor fed to the smooth min/max operators and
/// for the normal-estimation epsilon.
pub const MIN_SMOOTHING: f32 = 0.00001;

/// Default epsilon for central-difference normals.
pub const DEFAULT_NORMAL_SMOOTHING: f32 = 0.015;

/// Default reach of [`crate::SdfGroup::raycast`].
pub const DEFAULT_RAYCAST_DISTANCE: f32 = 350.0;

pub const RAYMARCH_MAX_STEPS: u32 = 256;
pub const RAYMARCH_HIT_DISTANCE: f32 = 0.001;

/// Distance reported by an empty mirror.
pub const EMPTY_DISTANCE: f32 = 10_000_000.0;

/// Shader-visible names of the process-wide mesh buffers.
pub const MESH_SAMPLES_GLOBAL: &str = "_SDFMeshSamples";
pub const MESH_PACKED_UVS_GLOBAL: &str = "_SDFMeshPackedUVs";

/// Start index written into GPU records that have no mesh data.
pub const NO_START_INDEX: i32 = -1;
