use crate::constants::MIN_SMOOTHING;

/// How an object folds into the distance accumulated from the objects before it.
///
/// Objects are combined strictly in group order, so the same set of objects in a
/// different order can produce a different surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SdfCombine {
    #[default]
    SmoothUnion,
    SmoothSubtract,
    SmoothIntersect,
}

impl SdfCombine {
    pub fn gpu_code(self) -> u32 {
        match self {
            SdfCombine::SmoothUnion => 0,
            SdfCombine::SmoothSubtract => 1,
            SdfCombine::SmoothIntersect => 2,
        }
    }

    pub fn from_gpu_code(code: u32) -> Self {
        match code {
            1 => SdfCombine::SmoothSubtract,
            2 => SdfCombine::SmoothIntersect,
            _ => SdfCombine::SmoothUnion,
        }
    }

    /// Folds `distance` into `accumulated`.
    pub fn apply(self, accumulated: f32, distance: f32, smoothing: f32) -> f32 {
        let k = smoothing.max(MIN_SMOOTHING);
        match self {
            SdfCombine::SmoothUnion => smooth_min(accumulated, distance, k),
            SdfCombine::SmoothSubtract => smooth_max(accumulated, -distance, k),
            SdfCombine::SmoothIntersect => smooth_max(accumulated, distance, k),
        }
    }
}

/// Smooth minimum function for smooth unions
pub fn smooth_min(a: f32, b: f32, k: f32) -> f32 {
    let h = (0.5 + 0.5 * (b - a) / k).clamp(0.0, 1.0);
    a * h + b * (1.0 - h) - k * h * (1.0 - h)
}

/// Smooth maximum function for smooth intersections
pub fn smooth_max(a: f32, b: f32, k: f32) -> f32 {
    -smooth_min(-a, -b, k)
}
