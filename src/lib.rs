pub mod buffer;
pub mod constants;
pub mod error;
pub mod gpu_data;
pub mod group;
pub mod mapper;
pub mod mesh;
pub mod metrics;
pub mod object;
pub mod query;
pub mod sdf_module;
pub mod systems;

use bevy::prelude::*;

pub struct SdfGroupPlugin;

impl Plugin for SdfGroupPlugin {
    fn build(&self, app: &mut App) {
        app
            .init_resource::<object::SdfObjects>()
            .init_resource::<mesh::SharedMeshRegistry>()
            .init_resource::<systems::GpuBuffers>()
            .init_resource::<metrics::SdfMetrics>()
            .add_systems(PostUpdate, (
                systems::activate_added_groups,
                systems::sync_object_transforms,
                systems::mark_group_transform_changes,
                systems::tick_groups,
                metrics::flush_metrics,
            ).chain())
            .add_systems(Last, systems::release_shared_buffers_on_exit);
        app.world_mut()
            .register_component_hooks::<group::SdfGroup>()
            .on_remove(systems::teardown_removed_group);
    }
}

// Public API exports
pub use buffer::{BufferHandle, GpuBackend, GpuBuffer, GlobalBufferSlot, HeadlessBackend};
#[cfg(feature = "render_device")]
pub use buffer::RenderDeviceBackend;
pub use error::{BufferError, SdfError};
pub use group::{GroupComponent, GroupContext, GroupId, GroupSettings, GroupTeardown, SdfGroup, TickOutcome};
pub use mapper::{Mapper, RayHit};
pub use mesh::{MeshAsset, MeshAssetId, MeshGrid, MeshRegistry, SdfMeshAsset, SharedMeshRegistry};
pub use metrics::SdfMetrics;
pub use object::{ObjectKey, SdfMaterial, SdfMaterialType, SdfObject, SdfObjectKind, SdfObjects};
pub use query::SurfacePoint;
pub use sdf_module::{SdfCombine, SdfPrimitive};
pub use systems::{GpuBuffers, SdfObjectLink};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::sdf_module::*;
    pub use crate::{
        GpuBuffers, GroupComponent, GroupContext, GroupSettings, MeshAssetId, SdfGroup, SdfGroupPlugin,
        SdfMaterial, SdfMeshAsset, SdfObject, SdfObjectLink, SdfObjects, SharedMeshRegistry,
    };
    pub use bevy::prelude::*;
}
