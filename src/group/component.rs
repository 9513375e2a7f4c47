use crate::buffer::BufferHandle;

/// Consumer of a group's buffers (renderers, mesh extractors, compute passes).
///
/// Calls arrive synchronously and in order, never while a rebuild is half done.
/// Implementations must not call back into the group.
pub trait GroupComponent: Send + Sync + 'static {
    fn on_empty(&mut self) {}

    fn on_not_empty(&mut self) {}

    /// Something changed and the group holds at least one object.
    fn run(&mut self) {}

    /// The object/material buffers were (re)created or must be rebound. Handles from
    /// earlier calls may be dead after this.
    fn update_data_buffer(&mut self, objects: BufferHandle, materials: BufferHandle, count: usize);

    fn update_settings_buffer(&mut self, settings: BufferHandle);

    /// Consumers reporting `false` are dropped the next time the group refreshes its
    /// consumer list.
    fn is_attached(&self) -> bool {
        true
    }
}

pub(crate) struct ComponentSlot {
    pub component: Box<dyn GroupComponent>,
    /// Last emptiness state delivered to this consumer.
    pub emptiness: Option<bool>,
    pub has_data_buffer: bool,
}

impl ComponentSlot {
    pub fn new(component: Box<dyn GroupComponent>) -> Self {
        Self { component, emptiness: None, has_data_buffer: false }
    }

    /// Delivers `empty` unless this consumer already knows it.
    pub fn notify_emptiness(&mut self, empty: bool) {
        if self.emptiness == Some(empty) {
            return;
        }
        self.emptiness = Some(empty);
        if empty {
            self.component.on_empty();
        } else {
            self.component.on_not_empty();
        }
    }
}
