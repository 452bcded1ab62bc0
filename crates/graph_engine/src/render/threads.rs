//! Thread roles
//!
//! Renderers remember which threads play the render, logic and loader roles
//! so calls bound to a context can be checked for affinity.

use std::fmt;
use std::thread::{self, ThreadId};

/// A thread role known to renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// Owns the device context; renders submitted batches
    Render,
    /// Runs traversals and submits
    Logic,
    /// Creates and uploads resources
    Loader,
}

impl fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Render => "render",
            Self::Logic => "logic",
            Self::Loader => "loader",
        };
        f.write_str(name)
    }
}

/// Registered thread per role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadRoles {
    render: Option<ThreadId>,
    logic: Option<ThreadId>,
    loader: Option<ThreadId>,
}

impl ThreadRoles {
    /// No registered threads
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling thread for a role
    pub fn register_current(&mut self, role: ThreadRole) {
        *self.slot(role) = Some(thread::current().id());
        log::debug!("Registered {:?} as {role} thread", thread::current().id());
    }

    /// Thread registered for a role
    pub fn thread(&self, role: ThreadRole) -> Option<ThreadId> {
        match role {
            ThreadRole::Render => self.render,
            ThreadRole::Logic => self.logic,
            ThreadRole::Loader => self.loader,
        }
    }

    /// Whether the calling thread may act in `role`
    ///
    /// Roles nobody registered accept any thread.
    pub fn is_current(&self, role: ThreadRole) -> bool {
        self.thread(role).map_or(true, |id| id == thread::current().id())
    }

    fn slot(&mut self, role: ThreadRole) -> &mut Option<ThreadId> {
        match role {
            ThreadRole::Render => &mut self.render,
            ThreadRole::Logic => &mut self.logic,
            ThreadRole::Loader => &mut self.loader,
        }
    }
}
