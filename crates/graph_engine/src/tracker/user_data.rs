//! Side-channel user data passed through traversals
//!
//! Callers acquire an integer id once and then push/pop values under that id
//! while a traversal runs, so data can flow from a node to its subtree without
//! every hook signature knowing about it.

use std::any::Any;
use std::collections::HashMap;

/// Identifier of an acquired user data slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserDataId(u32);

impl UserDataId {
    /// Raw id value
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Stacks of user data keyed by acquired ids
#[derive(Default)]
pub struct UserDataStack {
    next_id: u32,
    free_ids: Vec<u32>,
    stacks: HashMap<UserDataId, Vec<Box<dyn Any + Send>>>,
}

impl UserDataStack {
    /// Create an empty stack set
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a fresh id
    pub fn acquire(&mut self) -> UserDataId {
        let raw = self.free_ids.pop().unwrap_or_else(|| {
            let raw = self.next_id;
            self.next_id += 1;
            raw
        });
        let id = UserDataId(raw);
        self.stacks.insert(id, Vec::new());
        id
    }

    /// Release an id and drop everything still stacked under it
    pub fn release(&mut self, id: UserDataId) -> bool {
        if self.stacks.remove(&id).is_some() {
            self.free_ids.push(id.0);
            true
        } else {
            false
        }
    }

    /// Whether the id is currently acquired
    pub fn is_acquired(&self, id: UserDataId) -> bool {
        self.stacks.contains_key(&id)
    }

    /// Push a value; fails if the id was never acquired
    pub fn push(&mut self, id: UserDataId, value: Box<dyn Any + Send>) -> bool {
        match self.stacks.get_mut(&id) {
            Some(stack) => {
                stack.push(value);
                true
            }
            None => false,
        }
    }

    /// Pop the most recent value
    pub fn pop(&mut self, id: UserDataId) -> Option<Box<dyn Any + Send>> {
        self.stacks.get_mut(&id)?.pop()
    }

    /// Borrow the most recent value as `T`
    pub fn top<T: Any>(&self, id: UserDataId) -> Option<&T> {
        self.stacks.get(&id)?.last()?.downcast_ref::<T>()
    }

    /// Mutably borrow the most recent value as `T`
    pub fn top_mut<T: Any>(&mut self, id: UserDataId) -> Option<&mut T> {
        self.stacks.get_mut(&id)?.last_mut()?.downcast_mut::<T>()
    }

    /// Number of values stacked under an id
    pub fn depth(&self, id: UserDataId) -> usize {
        self.stacks.get(&id).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for UserDataStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataStack")
            .field("acquired", &self.stacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_requires_acquired_id() {
        let mut stack = UserDataStack::new();
        let id = stack.acquire();
        assert!(stack.push(id, Box::new(5_u32)));
        assert!(stack.release(id));
        assert!(!stack.push(id, Box::new(6_u32)));
    }

    #[test]
    fn test_stack_order_and_typed_top() {
        let mut stack = UserDataStack::new();
        let id = stack.acquire();
        stack.push(id, Box::new(1_i32));
        stack.push(id, Box::new("two"));
        assert_eq!(stack.top::<&str>(id), Some(&"two"));
        assert!(stack.top::<i32>(id).is_none());
        stack.pop(id);
        assert_eq!(stack.top::<i32>(id), Some(&1));
        assert_eq!(stack.depth(id), 1);
    }

    #[test]
    fn test_released_ids_are_reused() {
        let mut stack = UserDataStack::new();
        let a = stack.acquire();
        let b = stack.acquire();
        assert_ne!(a, b);
        stack.release(a);
        assert_eq!(stack.acquire(), a);
    }
}
