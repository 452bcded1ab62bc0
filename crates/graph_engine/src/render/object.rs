//! Renderer objects and their suspension bookkeeping

use std::any::Any;
use std::fmt;

use crate::foundation::collections::{ObjectKey, SlotMap};
use crate::render::stats::RenderStats;
use crate::render::RenderError;

/// State of a registered object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// Registered, `init` not run or failed
    Uninitialized,
    /// Device resources resident
    Initialized,
    /// Device resources evicted, logical state kept
    Suspended,
}

/// When a renderer evicts an object's device resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SuspensionPolicy {
    /// Only on explicit request
    Never,
    /// When not pushed for a number of completed cycles
    #[default]
    Automatic,
    /// When a rendering cycle starts with the suspend trigger set
    Manual,
}

impl SuspensionPolicy {
    /// Parse a policy name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "never" => Some(Self::Never),
            "automatic" => Some(Self::Automatic),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A device-resource-backed object owned by a renderer
///
/// Objects report their own resource usage through the [`RenderStats`]
/// handed to every call.
pub trait RendererObject: Any + Send + fmt::Debug {
    /// Name for diagnostics
    fn name(&self) -> &str;

    /// Create device resources
    fn init(&mut self, stats: &mut RenderStats) -> Result<(), String>;

    /// Release everything; called in either the initialized or the suspended state
    fn deinit(&mut self, stats: &mut RenderStats);

    /// Evict device resources
    fn suspend(&mut self, stats: &mut RenderStats);

    /// Recreate evicted device resources
    fn resume(&mut self, stats: &mut RenderStats) -> Result<(), String>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// Generic object holding a fixed number of resident bytes
#[derive(Debug, Clone)]
pub struct ResourceObject {
    name: String,
    bytes: u64,
    resident: bool,
}

impl ResourceObject {
    /// Object of `bytes` resident bytes
    pub fn new(name: impl Into<String>, bytes: u64) -> Self {
        Self {
            name: name.into(),
            bytes,
            resident: false,
        }
    }

    /// Whether the bytes are currently allocated
    pub fn is_resident(&self) -> bool {
        self.resident
    }
}

impl RendererObject for ResourceObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, stats: &mut RenderStats) -> Result<(), String> {
        stats.increase_allocated_resource_bytes(self.bytes);
        self.resident = true;
        Ok(())
    }

    fn deinit(&mut self, stats: &mut RenderStats) {
        if self.resident {
            stats.decrease_allocated_resource_bytes(self.bytes);
        } else {
            stats.decrease_suspended_objects();
        }
        self.resident = false;
    }

    fn suspend(&mut self, stats: &mut RenderStats) {
        if self.resident {
            stats.decrease_allocated_resource_bytes(self.bytes);
            stats.increase_suspended_objects();
            self.resident = false;
        }
    }

    fn resume(&mut self, stats: &mut RenderStats) -> Result<(), String> {
        if !self.resident {
            stats.decrease_suspended_objects();
            stats.increase_allocated_resource_bytes(self.bytes);
            self.resident = true;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ObjectEntry {
    object: Box<dyn RendererObject>,
    policy: SuspensionPolicy,
    state: ObjectState,
    registered_frame: u64,
    recent_frame: Option<u64>,
}

impl ObjectEntry {
    fn suspend(&mut self, stats: &mut RenderStats) -> bool {
        if self.state != ObjectState::Initialized {
            return false;
        }
        self.object.suspend(stats);
        self.state = ObjectState::Suspended;
        log::trace!("Suspended object '{}'", self.object.name());
        true
    }
}

/// Objects registered with one renderer
#[derive(Default)]
pub struct ObjectTable {
    entries: SlotMap<ObjectKey, ObjectEntry>,
}

impl ObjectTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize and register an object
    pub fn register(
        &mut self,
        mut object: Box<dyn RendererObject>,
        policy: SuspensionPolicy,
        frame: u64,
        stats: &mut RenderStats,
    ) -> Result<ObjectKey, RenderError> {
        object.init(stats).map_err(RenderError::ObjectInit)?;
        Ok(self.entries.insert(ObjectEntry {
            object,
            policy,
            state: ObjectState::Initialized,
            registered_frame: frame,
            recent_frame: None,
        }))
    }

    /// De-initialize and remove an object
    pub fn unregister(&mut self, key: ObjectKey, stats: &mut RenderStats) -> Result<Box<dyn RendererObject>, RenderError> {
        let mut entry = self.entries.remove(key).ok_or(RenderError::StaleObject(key))?;
        if entry.state != ObjectState::Uninitialized {
            entry.object.deinit(stats);
        }
        Ok(entry.object)
    }

    /// Borrow an object
    pub fn get(&self, key: ObjectKey) -> Option<&dyn RendererObject> {
        self.entries.get(key).map(|entry| entry.object.as_ref())
    }

    /// State of an object
    pub fn state(&self, key: ObjectKey) -> Option<ObjectState> {
        self.entries.get(key).map(|entry| entry.state)
    }

    /// Suspension policy of an object
    pub fn policy(&self, key: ObjectKey) -> Option<SuspensionPolicy> {
        self.entries.get(key).map(|entry| entry.policy)
    }

    /// Frame in which the object was last pushed
    pub fn recent_frame_count(&self, key: ObjectKey) -> Option<u64> {
        self.entries.get(key)?.recent_frame
    }

    /// Record a push, resuming the object if it was suspended
    pub fn mark_pushed(&mut self, key: ObjectKey, frame: u64, stats: &mut RenderStats) -> Result<(), RenderError> {
        let entry = self.entries.get_mut(key).ok_or(RenderError::StaleObject(key))?;
        match entry.state {
            ObjectState::Initialized => {}
            ObjectState::Suspended => {
                entry.object.resume(stats).map_err(RenderError::ObjectInit)?;
                entry.state = ObjectState::Initialized;
                log::trace!("Resumed object '{}'", entry.object.name());
            }
            ObjectState::Uninitialized => return Err(RenderError::ObjectNotInitialized(key)),
        }
        entry.recent_frame = Some(frame);
        Ok(())
    }

    /// Suspend one object regardless of policy
    pub fn suspend(&mut self, key: ObjectKey, stats: &mut RenderStats) -> Result<bool, RenderError> {
        let entry = self.entries.get_mut(key).ok_or(RenderError::StaleObject(key))?;
        Ok(entry.suspend(stats))
    }

    /// Suspend automatic objects not pushed for `after` cycles as of `frame`
    ///
    /// Objects that were never pushed count from their registration frame.
    pub fn suspend_unused(&mut self, frame: u64, after: u64, stats: &mut RenderStats) -> usize {
        let after = after.max(1);
        self.entries
            .values_mut()
            .filter(|entry| entry.policy == SuspensionPolicy::Automatic)
            .filter(|entry| {
                let last = entry.recent_frame.unwrap_or(entry.registered_frame);
                frame.saturating_sub(last) >= after
            })
            .map(|entry| entry.suspend(stats))
            .filter(|suspended| *suspended)
            .count()
    }

    /// Suspend manual objects not pushed in `frame`
    pub fn suspend_manual(&mut self, frame: u64, stats: &mut RenderStats) -> usize {
        self.entries
            .values_mut()
            .filter(|entry| entry.policy == SuspensionPolicy::Manual && entry.recent_frame != Some(frame))
            .map(|entry| entry.suspend(stats))
            .filter(|suspended| *suspended)
            .count()
    }

    /// Suspend every initialized object
    pub fn suspend_all(&mut self, stats: &mut RenderStats) -> usize {
        self.entries
            .values_mut()
            .map(|entry| entry.suspend(stats))
            .filter(|suspended| *suspended)
            .count()
    }

    /// De-initialize and drop every object
    pub fn clear(&mut self, stats: &mut RenderStats) {
        for (_, mut entry) in self.entries.drain() {
            if entry.state != ObjectState::Uninitialized {
                entry.object.deinit(stats);
            }
        }
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no object is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable").field("objects", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_accounting_through_suspension() {
        let mut stats = RenderStats::default();
        let mut table = ObjectTable::new();
        let key = table
            .register(Box::new(ResourceObject::new("mesh", 100)), SuspensionPolicy::Never, 0, &mut stats)
            .unwrap();
        assert_eq!(stats.allocated_bytes, 100);

        assert!(table.suspend(key, &mut stats).unwrap());
        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.suspended_objects, 1);
        assert!(!table.suspend(key, &mut stats).unwrap());

        table.mark_pushed(key, 3, &mut stats).unwrap();
        assert_eq!(table.state(key), Some(ObjectState::Initialized));
        assert_eq!(table.recent_frame_count(key), Some(3));
        assert_eq!(stats.allocated_bytes, 100);
        assert_eq!(stats.suspended_objects, 0);

        table.unregister(key, &mut stats).unwrap();
        assert_eq!(stats, RenderStats::default());
        assert!(matches!(table.unregister(key, &mut stats), Err(RenderError::StaleObject(_))));
    }

    #[test]
    fn test_automatic_sweep_has_grace_frame() {
        let mut stats = RenderStats::default();
        let mut table = ObjectTable::new();
        let key = table
            .register(Box::new(ResourceObject::new("a", 1)), SuspensionPolicy::Automatic, 5, &mut stats)
            .unwrap();
        assert_eq!(table.suspend_unused(5, 1, &mut stats), 0);
        assert_eq!(table.suspend_unused(6, 1, &mut stats), 1);
        assert_eq!(table.state(key), Some(ObjectState::Suspended));
    }

    #[test]
    fn test_suspended_object_deinit_pairs_counter() {
        let mut stats = RenderStats::default();
        let mut table = ObjectTable::new();
        let key = table
            .register(Box::new(ResourceObject::new("a", 8)), SuspensionPolicy::Manual, 0, &mut stats)
            .unwrap();
        assert_eq!(table.suspend_manual(0, &mut stats), 1);
        table.clear(&mut stats);
        assert_eq!(stats, RenderStats::default());
        assert!(table.state(key).is_none());
    }
}
