//! Graph modification lock
//!
//! A single-writer flag guarding structural edits. Traversals hold it for
//! their whole duration; structural calls made from inside a traversal pass
//! [`LockMode::AssumeHeld`] to skip acquisition. Nothing checks at compile
//! time that the caller really holds the lock: debug builds assert on
//! recursive acquisition and on `AssumeHeld` without a holder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use super::GraphError;

/// How a structural call treats the graph lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Acquire the lock for the duration of the call
    #[default]
    Acquire,
    /// The caller already holds the lock (e.g. a hook running inside a traversal)
    AssumeHeld,
}

#[derive(Debug, Default)]
struct LockState {
    locked: AtomicBool,
    owner: Mutex<Option<ThreadId>>,
}

impl LockState {
    fn set_owner(&self, owner: Option<ThreadId>) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = owner;
    }

    fn owner(&self) -> Option<ThreadId> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The lock owned by a [`Root`](super::Root)
#[derive(Debug, Default)]
pub struct GraphLock {
    state: Arc<LockState>,
}

impl GraphLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock
    ///
    /// Fails with [`GraphError::GraphBusy`] when it is already held.
    pub fn acquire(&self) -> Result<(), GraphError> {
        if self
            .state
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let recursive = self.state.owner() == Some(thread::current().id());
            debug_assert!(
                !recursive,
                "graph lock acquired recursively; pass LockMode::AssumeHeld from inside a traversal"
            );
            return Err(GraphError::GraphBusy);
        }
        self.state.set_owner(Some(thread::current().id()));
        Ok(())
    }

    /// Release the lock
    ///
    /// Only the thread holding the lock may release it; a stray release from
    /// any other thread is ignored (and asserts in debug builds).
    pub fn release(&self) {
        let holder = self.state.owner();
        let current = Some(thread::current().id());
        debug_assert_eq!(holder, current, "graph lock released by a thread that does not hold it");
        if holder != current {
            log::warn!("Ignoring graph lock release from a thread that does not hold it");
            return;
        }
        self.state.set_owner(None);
        self.state.locked.store(false, Ordering::Release);
    }

    /// Whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.state.locked.load(Ordering::Acquire)
    }

    /// A thread-safe read-only view of the lock
    pub fn probe(&self) -> LockProbe {
        LockProbe {
            state: Arc::clone(&self.state),
        }
    }

    /// Enter a structural edit according to `mode`
    ///
    /// The returned guard releases the lock on drop if it was acquired here.
    pub(crate) fn enter(&self, mode: LockMode) -> Result<LockGuard, GraphError> {
        match mode {
            LockMode::Acquire => {
                self.acquire()?;
                Ok(LockGuard {
                    state: Some(Arc::clone(&self.state)),
                })
            }
            LockMode::AssumeHeld => {
                debug_assert!(self.is_locked(), "LockMode::AssumeHeld used while the graph lock is free");
                Ok(LockGuard { state: None })
            }
        }
    }
}

/// Releases an acquired graph lock when dropped
#[derive(Debug)]
pub(crate) struct LockGuard {
    state: Option<Arc<LockState>>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.set_owner(None);
            state.locked.store(false, Ordering::Release);
        }
    }
}

/// Cloneable, `Send + Sync` view of a graph lock
///
/// Foreign threads use it to check whether the graph is between frames
/// before scheduling an edit.
#[derive(Debug, Clone)]
pub struct LockProbe {
    state: Arc<LockState>,
}

impl LockProbe {
    /// Whether structural edits are currently allowed
    pub fn can_modify_graph(&self) -> bool {
        !self.state.locked.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases() {
        let lock = GraphLock::new();
        {
            let _guard = lock.enter(LockMode::Acquire).unwrap();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_busy_from_other_thread() {
        let lock = GraphLock::new();
        lock.acquire().unwrap();
        let probe = lock.probe();
        thread::scope(|scope| {
            scope.spawn(|| {
                assert!(!probe.can_modify_graph());
                assert_eq!(lock.acquire(), Err(GraphError::GraphBusy));
            });
        });
        lock.release();
        assert!(lock.probe().can_modify_graph());
    }

    #[test]
    fn test_foreign_release_keeps_lock() {
        let lock = GraphLock::new();
        lock.acquire().unwrap();
        let outcome = thread::scope(|scope| scope.spawn(|| lock.release()).join());
        assert_eq!(outcome.is_err(), cfg!(debug_assertions));
        assert!(lock.is_locked());
        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_assume_held_does_not_release() {
        let lock = GraphLock::new();
        lock.acquire().unwrap();
        drop(lock.enter(LockMode::AssumeHeld).unwrap());
        assert!(lock.is_locked());
        lock.release();
    }
}
