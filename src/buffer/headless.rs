use std::collections::HashMap;

use bevy::prelude::*;
use bytemuck::Pod;

use super::{BufferHandle, GlobalBufferSlot, GpuBackend};
use crate::error::{BufferError, BufferResult};

struct HeadlessBuffer {
    label: &'static str,
    bytes: Vec<u8>,
}

/// Keeps every buffer as a byte vector on the CPU.
///
/// Used when no render device is present (servers, tests) and as the default
/// backend of [`crate::SdfGroupPlugin`].
#[derive(Default)]
pub struct HeadlessBackend {
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    globals: HashMap<GlobalBufferSlot, BufferHandle>,
    next_handle: u64,
    created: u64,
    released: u64,
}

impl HeadlessBackend {
    pub fn contents(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(|b| b.bytes.as_slice())
    }

    /// Reads a buffer back as typed elements.
    pub fn read<T: Pod>(&self, handle: BufferHandle) -> Option<Vec<T>> {
        self.contents(handle).map(bytemuck::pod_collect_to_vec)
    }

    pub fn label(&self, handle: BufferHandle) -> Option<&'static str> {
        self.buffers.get(&handle).map(|b| b.label)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Total number of buffers ever created.
    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn released(&self) -> u64 {
        self.released
    }

    /// Drops a buffer without going through [`GpuBackend::release_buffer`], the way a
    /// lost device invalidates resources behind the owner's back.
    pub fn invalidate(&mut self, handle: BufferHandle) {
        self.buffers.remove(&handle);
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_buffer(&mut self, label: &'static str, element_count: usize, stride: usize) -> BufferHandle {
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.created += 1;
        self.buffers.insert(handle, HeadlessBuffer { label, bytes: vec![0; element_count * stride] });
        debug!("headless: created {label} ({element_count} x {stride} bytes) as {handle:?}");
        handle
    }

    fn write_buffer(&mut self, handle: BufferHandle, bytes: &[u8]) -> BufferResult<()> {
        let buffer = self.buffers.get_mut(&handle).ok_or(BufferError::InvalidHandle(handle))?;
        if bytes.len() > buffer.bytes.len() {
            return Err(BufferError::Overflow { handle, len: bytes.len(), capacity: buffer.bytes.len() });
        }
        buffer.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if self.buffers.remove(&handle).is_some() {
            self.released += 1;
        }
        self.globals.retain(|_, bound| *bound != handle);
    }

    fn is_valid(&self, handle: BufferHandle) -> bool {
        self.buffers.contains_key(&handle)
    }

    fn set_global_buffer(&mut self, slot: GlobalBufferSlot, handle: BufferHandle) {
        self.globals.insert(slot, handle);
    }

    fn global_buffer(&self, slot: GlobalBufferSlot) -> Option<BufferHandle> {
        self.globals.get(&slot).copied()
    }
}
