use bevy::prelude::*;

use crate::constants::{DEFAULT_NORMAL_SMOOTHING, MIN_SMOOTHING};
use crate::gpu_data::SettingsGpu;

/// Group-wide parameters shared by every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct GroupSettings {
    /// Epsilon used when estimating normals from the gradient. Small values give
    /// sharp normals, large values smooth them out.
    pub normal_smoothing: f32,
    pub thickness_max_distance: f32,
    pub thickness_falloff: f32,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            normal_smoothing: DEFAULT_NORMAL_SMOOTHING,
            thickness_max_distance: 0.0,
            thickness_falloff: 0.0,
        }
    }
}

impl GroupSettings {
    pub fn to_gpu(&self) -> SettingsGpu {
        SettingsGpu {
            normal_smoothing: self.normal_smoothing.max(MIN_SMOOTHING),
            thickness_max_distance: self.thickness_max_distance,
            thickness_falloff: self.thickness_falloff,
        }
    }
}
