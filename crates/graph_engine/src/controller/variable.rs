//! Variable facet
//!
//! Named values written into the owner's properties. Changed values are
//! flushed on the next logic step; a config change re-applies all of them.

use std::collections::BTreeMap;

use crate::graph::{Attributes, NodeRecord, PropertyValue};

const PREFIX: &str = "var.";

#[derive(Debug, Clone)]
struct Variable {
    value: PropertyValue,
    dirty: bool,
}

/// Variable controller state
#[derive(Debug, Clone, Default)]
pub struct VariableFacet {
    variables: BTreeMap<String, Variable>,
}

impl VariableFacet {
    /// Create an empty facet
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable; it is written to the owner on the next logic step
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let value = value.into();
        self.variables
            .entry(name.into())
            .and_modify(|variable| {
                if variable.value != value {
                    variable.value = value.clone();
                    variable.dirty = true;
                }
            })
            .or_insert(Variable { value, dirty: true });
    }

    /// Current value of a variable
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.variables.get(name).map(|variable| &variable.value)
    }

    /// Whether any variable waits to be written
    pub fn is_dirty(&self) -> bool {
        self.variables.values().any(|variable| variable.dirty)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether no variable is defined
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Write changed variables into the owner
    pub(crate) fn flush(&mut self, owner: &mut NodeRecord) -> usize {
        let mut written = 0;
        for (name, variable) in self.variables.iter_mut().filter(|(_, variable)| variable.dirty) {
            owner.set_property(name.clone(), variable.value.clone());
            variable.dirty = false;
            written += 1;
        }
        written
    }

    /// Write every variable into the owner
    pub(crate) fn apply_all(&mut self, owner: &mut NodeRecord) {
        for (name, variable) in &mut self.variables {
            owner.set_property(name.clone(), variable.value.clone());
            variable.dirty = false;
        }
    }

    /// Attributes named `var.<name>` define variables
    pub(crate) fn configure(&mut self, attributes: &Attributes) {
        for (key, value) in attributes {
            if let Some(name) = key.strip_prefix(PREFIX) {
                self.set(name, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builtin::GroupNode;

    #[test]
    fn test_flush_writes_only_dirty() {
        let mut owner = NodeRecord::new("Group", Box::new(GroupNode));
        let mut facet = VariableFacet::new();
        facet.set("speed", 2.0);
        assert_eq!(facet.flush(&mut owner), 1);
        assert_eq!(owner.property("speed"), Some(&PropertyValue::Float(2.0)));

        facet.set("speed", 2.0);
        assert!(!facet.is_dirty());
        facet.set("speed", 3.0);
        assert_eq!(facet.flush(&mut owner), 1);
        assert_eq!(facet.flush(&mut owner), 0);
    }

    #[test]
    fn test_configure_reads_prefixed_attributes() {
        let mut attributes = Attributes::new();
        attributes.insert("var.color".into(), PropertyValue::from("red"));
        attributes.insert("logic_response".into(), PropertyValue::Int(1));
        let mut facet = VariableFacet::new();
        facet.configure(&attributes);
        assert_eq!(facet.len(), 1);
        assert_eq!(facet.get("color").and_then(PropertyValue::as_text), Some("red"));
    }
}
