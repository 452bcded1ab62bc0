//! Resource targets

use crate::foundation::collections::ResourceKey;
use crate::resource::{Resource, ResourceSet};

/// Named references into a [`ResourceSet`]
#[derive(Debug, Clone, Default)]
pub struct ResourceTarget {
    ids: Vec<String>,
    resolved: Vec<Option<ResourceKey>>,
}

impl ResourceTarget {
    /// Create an empty target
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource by name; unresolved until the next `resolve`
    pub fn add_resource(&mut self, id: impl Into<String>) {
        self.ids.push(id.into());
        self.resolved.push(None);
    }

    /// Name in a slot
    pub fn id(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the target has no slots
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove all slots
    pub fn clear(&mut self) {
        self.ids.clear();
        self.resolved.clear();
    }

    /// Resolve all names, returning how many were found
    pub fn resolve(&mut self, set: &ResourceSet) -> usize {
        self.resolved = self.ids.iter().map(|id| set.find(id)).collect();
        self.resolved.iter().flatten().count()
    }

    /// The resource in a slot; `None` if unresolved or since removed
    pub fn get_resource<'a>(&self, set: &'a ResourceSet, index: usize) -> Option<&'a Resource> {
        set.get((*self.resolved.get(index)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::animation::Animation;

    #[test]
    fn test_resolve_and_removal() {
        let mut set = ResourceSet::new();
        set.insert("walk", Resource::Animation(Animation::default()));
        let mut target = ResourceTarget::new();
        target.add_resource("walk");
        target.add_resource("run");
        assert!(target.get_resource(&set, 0).is_none());
        assert_eq!(target.resolve(&set), 1);
        assert!(target.get_resource(&set, 0).is_some());
        assert!(target.get_resource(&set, 1).is_none());

        set.remove("walk");
        assert!(target.get_resource(&set, 0).is_none());
    }
}
