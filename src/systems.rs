//! ECS glue: keeps object records and groups in step with the Bevy world.

use bevy::ecs::component::HookContext;
use bevy::ecs::world::DeferredWorld;
use bevy::prelude::*;

use crate::buffer::{GpuBackend, HeadlessBackend};
use crate::group::{GroupContext, SdfGroup, TickOutcome};
use crate::mesh::SharedMeshRegistry;
use crate::object::{ObjectKey, SdfObjects};

/// Backend every group in the app allocates its buffers from.
///
/// Defaults to a [`HeadlessBackend`]. Apps with a renderer replace it with a
/// `RenderDeviceBackend` built from the world.
#[derive(Resource)]
pub struct GpuBuffers(Box<dyn GpuBackend>);

impl GpuBuffers {
    pub fn new(backend: impl GpuBackend + 'static) -> Self {
        Self(Box::new(backend))
    }

    pub fn backend(&self) -> &dyn GpuBackend {
        self.0.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn GpuBackend {
        self.0.as_mut()
    }
}

impl Default for GpuBuffers {
    fn default() -> Self {
        Self::new(HeadlessBackend::default())
    }
}

/// Ties an entity's `Transform` to an object record.
#[derive(Component, Debug, Clone, Copy)]
pub struct SdfObjectLink(pub ObjectKey);

pub fn activate_added_groups(
    mut groups: Query<&mut SdfGroup, Added<SdfGroup>>,
    mut objects: ResMut<SdfObjects>,
    mut gpu: ResMut<GpuBuffers>,
) {
    for mut group in &mut groups {
        let mut ctx = GroupContext::new(&mut objects, gpu.backend_mut());
        group.activate(&mut ctx);
    }
}

pub fn sync_object_transforms(
    links: Query<(&SdfObjectLink, &Transform), Changed<Transform>>,
    mut objects: ResMut<SdfObjects>,
) {
    for (link, transform) in &links {
        match objects.get_mut(link.0) {
            Some(object) => object.set_transform(*transform),
            None => debug!("sdf link points at destroyed object {:?}", link.0),
        }
    }
}

pub fn mark_group_transform_changes(mut groups: Query<&mut SdfGroup, Changed<Transform>>) {
    for mut group in &mut groups {
        group.mark_transform_changed();
    }
}

pub fn tick_groups(
    mut groups: Query<&mut SdfGroup>,
    mut objects: ResMut<SdfObjects>,
    mut gpu: ResMut<GpuBuffers>,
) {
    let mut rebuilt = 0;
    for mut group in &mut groups {
        let mut ctx = GroupContext::new(&mut objects, gpu.backend_mut());
        if group.tick(&mut ctx) == TickOutcome::Rebuilt {
            rebuilt += 1;
        }
    }
    if rebuilt > 0 {
        trace!("tick_groups: rebuilt {rebuilt} groups");
    }
}

pub fn release_shared_buffers_on_exit(
    mut exits: EventReader<AppExit>,
    registry: Res<SharedMeshRegistry>,
    mut gpu: ResMut<GpuBuffers>,
) {
    if exits.read().next().is_some() {
        info!("releasing shared sdf mesh buffers");
        registry.release_buffers(gpu.backend_mut());
    }
}

/// `on_remove` hook for [`SdfGroup`]: a despawned group gives back its objects, mesh
/// references and buffers before the component is dropped.
pub fn teardown_removed_group(mut world: DeferredWorld, context: HookContext) {
    let Some((id, teardown)) = world
        .get_mut::<SdfGroup>(context.entity)
        .map(|mut group| (group.id(), group.teardown()))
    else {
        return;
    };

    if let Some(mut objects) = world.get_resource_mut::<SdfObjects>() {
        for key in &teardown.objects {
            if let Some(object) = objects.get_mut(*key).filter(|object| object.owner() == Some(id)) {
                object.detach();
            }
        }
    }
    match world.get_resource_mut::<GpuBuffers>() {
        Some(mut gpu) => {
            for buffer in teardown.buffers {
                buffer.release(gpu.backend_mut());
            }
        }
        None => warn!("sdf group {id:?} removed without a GpuBuffers resource; {} buffers leak", teardown.buffers.len()),
    }
}
