//! Local rebuild: turns the group's object list into GPU records.

use bevy::prelude::*;

use super::{GroupContext, SdfGroup};
use crate::buffer::{self, GpuBackend};
use crate::constants::NO_START_INDEX;
use crate::gpu_data::{SdfGpuData, SdfMaterialGpu, SettingsGpu};

impl SdfGroup {
    /// Rebuilds the object and material records in list order and uploads them.
    ///
    /// Consumers get fresh handles whenever a buffer is reallocated, and on every call
    /// when `only_send_buffer_on_change` is `false`.
    pub fn rebuild(&mut self, ctx: &mut GroupContext<'_>, only_send_buffer_on_change: bool) {
        self.local_data_dirty = false;
        self.metrics.rebuilds += 1;

        let locals = self.local_mesh_assets(ctx.objects);
        let registry_handle = self.registry.clone();
        let mut global_changed = false;
        let mut send_buffer = !only_send_buffer_on_change;

        {
            let mut registry = registry_handle.lock();
            if registry.buffers_missing(ctx.gpu) || registry.is_dirty() {
                global_changed |= registry.rebuild_global(&locals, ctx.gpu);
                self.metrics.global_rebuilds += 1;
            }

            let previous_count = self.data.len();
            self.data.clear();
            self.materials.clear();

            for key in &self.objects {
                let Some(object) = ctx.objects.get_mut(*key) else {
                    continue;
                };
                object.mark_clean();

                let (mut sample_start, mut uv_start) = (NO_START_INDEX, NO_START_INDEX);
                if let Some(id) = object.mesh_id() {
                    if registry.sample_start(id).is_none() {
                        warn!("sdf group {:?}: {id:?} has no shared samples, rebuilding global data", self.id);
                        global_changed |= registry.rebuild_global(&locals, ctx.gpu);
                        self.metrics.global_rebuilds += 1;
                    }
                    sample_start = registry.sample_start(id).unwrap_or(NO_START_INDEX);
                    uv_start = registry.uv_start(id).unwrap_or(NO_START_INDEX);
                }

                self.data.push(object.gpu_data(sample_start, uv_start));
                self.materials.push(object.material_gpu());
            }

            let count = self.data.len();
            if buffer::is_missing(&self.data_buffer, ctx.gpu)
                || buffer::is_missing(&self.material_buffer, ctx.gpu)
                || previous_count != count
            {
                buffer::reallocate(&mut self.data_buffer, ctx.gpu, "sdf_group_data", count, SdfGpuData::STRIDE);
                buffer::reallocate(
                    &mut self.material_buffer,
                    ctx.gpu,
                    "sdf_group_materials",
                    count,
                    SdfMaterialGpu::STRIDE,
                );
                self.metrics.reallocations += 1;
                send_buffer = true;
                debug!("sdf group {:?}: reallocated data buffers for {count} objects", self.id);
            }

            if !only_send_buffer_on_change || global_changed {
                registry.publish(ctx.gpu);
            }
        }

        let (Some(data_buffer), Some(material_buffer)) = (self.data_buffer, self.material_buffer) else {
            return;
        };
        let count = self.data.len();

        for slot in &mut self.components {
            // late-attached consumers still need the current handles
            if send_buffer || !slot.has_data_buffer {
                slot.component.update_data_buffer(data_buffer.handle, material_buffer.handle, count);
                slot.has_data_buffer = true;
            }
        }

        if count > 0 {
            if let Err(err) = data_buffer.upload(ctx.gpu, &self.data) {
                warn!("sdf group {:?}: data upload failed: {err}", self.id);
            }
            if let Err(err) = material_buffer.upload(ctx.gpu, &self.materials) {
                warn!("sdf group {:?}: material upload failed: {err}", self.id);
            }
        }

        self.mapper.set_data(&self.data, &self.materials);

        let registry = registry_handle.lock();
        let generation = registry.generation();
        if !only_send_buffer_on_change || global_changed || self.seen_generation != Some(generation) {
            self.mapper.set_mesh_data(registry.samples(), registry.packed_uvs());
            self.seen_generation = Some(generation);
        }
    }

    /// Rebuilds the one-element settings buffer and hands it to every consumer.
    pub fn rebuild_settings(&mut self, gpu: &mut dyn GpuBackend) {
        let settings = self.settings.to_gpu();
        if buffer::is_missing(&self.settings_buffer, gpu) {
            buffer::reallocate(&mut self.settings_buffer, gpu, "sdf_group_settings", 1, SettingsGpu::STRIDE);
        }
        let Some(settings_buffer) = self.settings_buffer else {
            return;
        };

        for slot in &mut self.components {
            slot.component.update_settings_buffer(settings_buffer.handle);
        }
        if let Err(err) = settings_buffer.upload(gpu, &[settings]) {
            warn!("sdf group {:?}: settings upload failed: {err}", self.id);
        }
        self.mapper.set_settings(settings);
    }
}
