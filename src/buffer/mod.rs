//! GPU buffer abstraction.
//!
//! Groups never talk to a graphics API directly. They allocate, upload and release
//! fixed-capacity structured buffers through [`GpuBackend`], which is implemented for
//! Bevy's `RenderDevice` and for a CPU-resident headless store.

pub mod headless;
#[cfg(feature = "render_device")]
pub mod render_device;

pub use headless::HeadlessBackend;
#[cfg(feature = "render_device")]
pub use render_device::RenderDeviceBackend;

use bytemuck::Pod;

use crate::constants::{MESH_PACKED_UVS_GLOBAL, MESH_SAMPLES_GLOBAL};
use crate::error::BufferResult;

/// Opaque handle to a buffer owned by a [`GpuBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Well-known slots of the rendering-global buffer namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalBufferSlot {
    MeshSamples,
    MeshPackedUvs,
}

impl GlobalBufferSlot {
    pub fn shader_name(self) -> &'static str {
        match self {
            GlobalBufferSlot::MeshSamples => MESH_SAMPLES_GLOBAL,
            GlobalBufferSlot::MeshPackedUvs => MESH_PACKED_UVS_GLOBAL,
        }
    }
}

/// Core backend abstraction. Buffers are fixed-size: growing one means releasing it
/// and creating another, which hands out a new handle.
pub trait GpuBackend: Send + Sync {
    fn create_buffer(&mut self, label: &'static str, element_count: usize, stride: usize) -> BufferHandle;
    fn write_buffer(&mut self, handle: BufferHandle, bytes: &[u8]) -> BufferResult<()>;
    fn release_buffer(&mut self, handle: BufferHandle);
    /// `false` once a buffer was released or lost by the device.
    fn is_valid(&self, handle: BufferHandle) -> bool;
    fn set_global_buffer(&mut self, slot: GlobalBufferSlot, handle: BufferHandle);
    fn global_buffer(&self, slot: GlobalBufferSlot) -> Option<BufferHandle>;
}

/// A structured buffer together with the layout it was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub handle: BufferHandle,
    /// Element capacity, always at least one.
    pub capacity: usize,
    pub stride: usize,
}

impl GpuBuffer {
    /// Creates a buffer for `count` elements. Zero-sized buffers are not allowed, so an
    /// empty set still gets one element.
    pub fn allocate(gpu: &mut dyn GpuBackend, label: &'static str, count: usize, stride: usize) -> Self {
        let capacity = count.max(1);
        let handle = gpu.create_buffer(label, capacity, stride);
        Self { handle, capacity, stride }
    }

    pub fn is_valid(&self, gpu: &dyn GpuBackend) -> bool {
        gpu.is_valid(self.handle)
    }

    pub fn upload<T: Pod>(&self, gpu: &mut dyn GpuBackend, data: &[T]) -> BufferResult<()> {
        gpu.write_buffer(self.handle, bytemuck::cast_slice(data))
    }

    pub fn release(self, gpu: &mut dyn GpuBackend) {
        gpu.release_buffer(self.handle);
    }
}

/// `true` when `slot` holds no buffer or one the backend no longer recognises.
pub fn is_missing(slot: &Option<GpuBuffer>, gpu: &dyn GpuBackend) -> bool {
    slot.as_ref().is_none_or(|buffer| !buffer.is_valid(gpu))
}

/// Releases whatever `slot` holds and stores a fresh allocation.
pub fn reallocate(
    slot: &mut Option<GpuBuffer>,
    gpu: &mut dyn GpuBackend,
    label: &'static str,
    count: usize,
    stride: usize,
) -> GpuBuffer {
    if let Some(old) = slot.take() {
        old.release(gpu);
    }
    let buffer = GpuBuffer::allocate(gpu, label, count, stride);
    *slot = Some(buffer);
    buffer
}
