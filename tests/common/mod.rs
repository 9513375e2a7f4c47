#![allow(dead_code)]

use std::sync::Arc;

use bevy::prelude::*;
use bevy_sdf_group::buffer::BufferHandle;
use bevy_sdf_group::{
    GroupComponent, GroupContext, HeadlessBackend, MeshAsset, MeshAssetId, MeshGrid, SdfMeshAsset, SdfObjects,
    SharedMeshRegistry,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Empty,
    NotEmpty,
    Run,
    Data { objects: BufferHandle, count: usize },
    Settings,
}

/// Consumer that appends every call it receives to a shared log.
pub struct Recorder(pub Arc<Mutex<Vec<Event>>>);

impl GroupComponent for Recorder {
    fn on_empty(&mut self) {
        self.0.lock().push(Event::Empty);
    }

    fn on_not_empty(&mut self) {
        self.0.lock().push(Event::NotEmpty);
    }

    fn run(&mut self) {
        self.0.lock().push(Event::Run);
    }

    fn update_data_buffer(&mut self, objects: BufferHandle, _materials: BufferHandle, count: usize) {
        self.0.lock().push(Event::Data { objects, count });
    }

    fn update_settings_buffer(&mut self, _settings: BufferHandle) {
        self.0.lock().push(Event::Settings);
    }
}

pub fn recorder() -> (Recorder, Arc<Mutex<Vec<Event>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (Recorder(log.clone()), log)
}

/// Drains the log and keeps only the events `keep` accepts.
pub fn take(log: &Arc<Mutex<Vec<Event>>>, keep: impl Fn(&Event) -> bool) -> Vec<Event> {
    log.lock().drain(..).filter(|event| keep(event)).collect()
}

pub fn data_events(log: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
    take(log, |event| matches!(event, Event::Data { .. }))
}

/// Mesh asset on a 2^3 grid, every sample set to `fill`.
pub fn mesh_asset(id: u64, fill: f32) -> Arc<dyn MeshAsset> {
    let grid = MeshGrid { size: 2, min_bounds: Vec3::splat(-1.0), max_bounds: Vec3::ONE };
    Arc::new(SdfMeshAsset::from_fn(MeshAssetId(id), grid, |_| fill).unwrap())
}

pub struct Harness {
    pub registry: SharedMeshRegistry,
    pub objects: SdfObjects,
    pub gpu: HeadlessBackend,
}

impl Harness {
    pub fn new() -> Self {
        Self { registry: SharedMeshRegistry::new(), objects: SdfObjects::default(), gpu: HeadlessBackend::default() }
    }

    pub fn ctx(&mut self) -> GroupContext<'_> {
        GroupContext::new(&mut self.objects, &mut self.gpu)
    }
}
