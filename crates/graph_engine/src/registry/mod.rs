//! Class registries
//!
//! Name-keyed tables of constructors used to create nodes and controllers by
//! class name. Registration order is preserved so entries can be queried by
//! a stable linear index.

pub mod factory;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use factory::ObjectFactory;

/// Shared constructor closure
pub type Constructor<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A named constructor
pub struct ClassInfo<T> {
    name: String,
    constructor: Constructor<T>,
}

impl<T> ClassInfo<T> {
    /// Create class info from a name and constructor
    pub fn new(name: impl Into<String>, constructor: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
        }
    }

    /// The registered class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the constructor
    pub fn instantiate(&self) -> T {
        (self.constructor)()
    }
}

impl<T> Clone for ClassInfo<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            constructor: Arc::clone(&self.constructor),
        }
    }
}

impl<T> fmt::Debug for ClassInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A class of that name is already registered
    #[error("{kind} class '{name}' is already registered")]
    DuplicateClass {
        /// Registry kind ("node", "controller", ...)
        kind: &'static str,
        /// Offending class name
        name: String,
    },

    /// No class of that name is registered
    #[error("{kind} class '{name}' is not registered")]
    UnknownClass {
        /// Registry kind ("node", "controller", ...)
        kind: &'static str,
        /// Missing class name
        name: String,
    },
}

/// Name-keyed constructor registry
pub struct FactoryRegistry<T> {
    kind: &'static str,
    entries: Vec<ClassInfo<T>>,
}

impl<T> FactoryRegistry<T> {
    /// Create an empty registry; `kind` only appears in error messages
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Register a class, returning its index
    pub fn register(&mut self, info: ClassInfo<T>) -> Result<usize, RegistryError> {
        if self.index_of(info.name()).is_some() {
            return Err(RegistryError::DuplicateClass {
                kind: self.kind,
                name: info.name,
            });
        }
        log::trace!("Registered {} class '{}'", self.kind, info.name);
        self.entries.push(info);
        Ok(self.entries.len() - 1)
    }

    /// Remove a class by name
    ///
    /// Later entries shift down by one index.
    pub fn unregister(&mut self, name: &str) -> Result<ClassInfo<T>, RegistryError> {
        let index = self.index_of(name).ok_or_else(|| self.unknown(name))?;
        Ok(self.entries.remove(index))
    }

    /// Index of a registered class
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|info| info.name == name)
    }

    /// Index of a registered class, or `-1` if it is not registered
    pub fn registered_index_or_sentinel(&self, name: &str) -> i32 {
        self.index_of(name)
            .and_then(|index| i32::try_from(index).ok())
            .unwrap_or(-1)
    }

    /// Class info at a linear index
    pub fn info_at(&self, index: usize) -> Option<&ClassInfo<T>> {
        self.entries.get(index)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered class names in index order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(ClassInfo::name)
    }

    /// Instantiate a class by name
    pub fn create(&self, name: &str) -> Result<T, RegistryError> {
        self.entries
            .iter()
            .find(|info| info.name == name)
            .map(ClassInfo::instantiate)
            .ok_or_else(|| self.unknown(name))
    }

    /// Instantiate a class by index
    pub fn create_at(&self, index: usize) -> Option<T> {
        self.info_at(index).map(ClassInfo::instantiate)
    }

    fn unknown(&self, name: &str) -> RegistryError {
        RegistryError::UnknownClass {
            kind: self.kind,
            name: name.to_string(),
        }
    }
}

impl<T> fmt::Debug for FactoryRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("kind", &self.kind)
            .field("classes", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FactoryRegistry<u32> {
        let mut registry = FactoryRegistry::new("test");
        registry.register(ClassInfo::new("One", || 1)).unwrap();
        registry.register(ClassInfo::new("Two", || 2)).unwrap();
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        assert_eq!(registry.index_of("Two"), Some(1));
        assert_eq!(registry.registered_index_or_sentinel("One"), 0);
        assert_eq!(registry.create("Two").unwrap(), 2);
        assert_eq!(registry.create_at(0), Some(1));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();
        let err = registry.register(ClassInfo::new("One", || 11)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateClass { .. }));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.create("One").unwrap(), 1);
    }

    #[test]
    fn test_unregister_then_sentinel() {
        let mut registry = registry();
        let info = registry.unregister("One").unwrap();
        assert_eq!(info.name(), "One");
        assert_eq!(registry.registered_index_or_sentinel("One"), -1);
        assert_eq!(registry.index_of("Two"), Some(0));
        assert!(matches!(registry.unregister("One"), Err(RegistryError::UnknownClass { .. })));
    }

    #[test]
    fn test_unknown_class() {
        let registry = registry();
        assert!(matches!(registry.create("Three"), Err(RegistryError::UnknownClass { .. })));
        assert!(registry.create_at(5).is_none());
    }
}
