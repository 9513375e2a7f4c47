use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::render_resource::{Buffer, BufferDescriptor, BufferUsages};
use bevy::render::renderer::{RenderDevice, RenderQueue};

use super::{BufferHandle, GlobalBufferSlot, GpuBackend};
use crate::error::{BufferError, BufferResult};

/// Storage buffers created on Bevy's `RenderDevice` and filled through the
/// `RenderQueue`.
pub struct RenderDeviceBackend {
    device: RenderDevice,
    queue: RenderQueue,
    buffers: HashMap<BufferHandle, Buffer>,
    globals: HashMap<GlobalBufferSlot, BufferHandle>,
    next_handle: u64,
}

impl RenderDeviceBackend {
    pub fn new(device: RenderDevice, queue: RenderQueue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            globals: HashMap::new(),
            next_handle: 0,
        }
    }

    /// The wgpu buffer behind `handle`, for building bind groups.
    pub fn buffer(&self, handle: BufferHandle) -> Option<&Buffer> {
        self.buffers.get(&handle)
    }

    /// Buffer bound to a global slot, for shaders that read `_SDFMeshSamples` and
    /// `_SDFMeshPackedUVs`.
    pub fn global(&self, slot: GlobalBufferSlot) -> Option<&Buffer> {
        self.globals.get(&slot).and_then(|handle| self.buffers.get(handle))
    }
}

impl FromWorld for RenderDeviceBackend {
    fn from_world(world: &mut World) -> Self {
        let device = world.resource::<RenderDevice>().clone();
        let queue = world.resource::<RenderQueue>().clone();
        Self::new(device, queue)
    }
}

impl GpuBackend for RenderDeviceBackend {
    fn create_buffer(&mut self, label: &'static str, element_count: usize, stride: usize) -> BufferHandle {
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: (element_count * stride) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(handle, buffer);
        handle
    }

    fn write_buffer(&mut self, handle: BufferHandle, bytes: &[u8]) -> BufferResult<()> {
        let buffer = self.buffers.get(&handle).ok_or(BufferError::InvalidHandle(handle))?;
        let capacity = buffer.size() as usize;
        if bytes.len() > capacity {
            return Err(BufferError::Overflow { handle, len: bytes.len(), capacity });
        }
        self.queue.write_buffer(buffer, 0, bytes);
        Ok(())
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&handle) {
            buffer.destroy();
        }
        self.globals.retain(|_, bound| *bound != handle);
    }

    fn is_valid(&self, handle: BufferHandle) -> bool {
        self.buffers.contains_key(&handle)
    }

    fn set_global_buffer(&mut self, slot: GlobalBufferSlot, handle: BufferHandle) {
        debug!("publishing {} as {handle:?}", slot.shader_name());
        self.globals.insert(slot, handle);
    }

    fn global_buffer(&self, slot: GlobalBufferSlot) -> Option<BufferHandle> {
        self.globals.get(&slot).copied()
    }
}
