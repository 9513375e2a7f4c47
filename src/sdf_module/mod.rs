/// SDF (Signed Distance Function) module
///
/// Analytic primitives and the ordered combine operators shared by the GPU records
/// and the CPU mirror.

pub mod primitives;
pub mod operations;

// Re-export main API
pub use primitives::*;
pub use operations::*;
