//! Arena handle types
//!
//! Every arena in the engine is a [`SlotMap`]. Keys carry a generation, so a
//! key that outlives the value it pointed to simply stops resolving instead
//! of aliasing whatever reuses the slot.

pub use slotmap::{Key, SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Handle to a node in a [`Root`](crate::graph::Root)
    pub struct NodeKey;

    /// Handle to a controller in a [`Root`](crate::graph::Root)
    pub struct ControllerKey;

    /// Handle to an object registered with a renderer
    pub struct ObjectKey;

    /// Handle to a resource in a [`ResourceSet`](crate::resource::ResourceSet)
    pub struct ResourceKey;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_key_does_not_resolve() {
        let mut map: SlotMap<NodeKey, u32> = SlotMap::with_key();
        let first = map.insert(1);
        map.remove(first);
        let second = map.insert(2);

        assert!(map.get(first).is_none());
        assert_eq!(map.get(second), Some(&2));
    }

    #[test]
    fn test_null_key_is_never_live() {
        let mut map: SlotMap<ControllerKey, u32> = SlotMap::with_key();
        map.insert(7);
        assert!(ControllerKey::null().is_null());
        assert!(map.get(ControllerKey::null()).is_none());
    }
}
