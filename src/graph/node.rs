//! Node instances and their mutable state
//!
//! A node pairs a shared definition (the capability set) with per-instance
//! state: selected option indices and literal control values for unconnected
//! inputs. Instances are owned by the graph and identified by a stable id the
//! graph assigns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::graph::definition::NodeDefinition;
use crate::graph::port::{ControlValue, InputDef, OutputDef, PortId};

/// Stable identifier for a node instance within its graph.
pub type NodeId = usize;

/// A node instance: definition reference plus mutable option/control state.
#[derive(Clone)]
pub struct Node {
    pub id: NodeId,
    pub definition: Arc<dyn NodeDefinition>,
    /// Selected choice index per named option.
    options: HashMap<String, usize>,
    /// Literal control values per input name, overriding control defaults.
    controls: HashMap<String, ControlValue>,
}

impl Node {
    /// Create an instance of `definition` with default options and controls.
    /// The graph assigns the real id on insertion.
    pub fn new(definition: Arc<dyn NodeDefinition>) -> Self {
        let options = definition
            .options()
            .iter()
            .map(|opt| (opt.name.clone(), opt.default))
            .collect();
        Self {
            id: 0,
            definition,
            options,
            controls: HashMap::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.definition.type_name()
    }

    /// Look up an input port by name.
    pub fn input(&self, name: &str) -> Option<(PortId, &InputDef)> {
        self.definition
            .inputs()
            .iter()
            .enumerate()
            .find(|(_, def)| def.name == name)
    }

    /// Look up an output port by name.
    pub fn output(&self, name: &str) -> Option<(PortId, &OutputDef)> {
        self.definition
            .outputs()
            .iter()
            .enumerate()
            .find(|(_, def)| def.name == name)
    }

    /// Selected choice index for a named option, falling back to the
    /// definition's default for unknown names.
    pub fn option(&self, name: &str) -> usize {
        self.options.get(name).copied().unwrap_or_else(|| {
            self.definition
                .options()
                .iter()
                .find(|opt| opt.name == name)
                .map(|opt| opt.default)
                .unwrap_or(0)
        })
    }

    pub fn set_option(&mut self, name: &str, choice: usize) {
        self.options.insert(name.to_string(), choice);
    }

    /// Current literal control value for an input, falling back to the
    /// control's declared default. `None` if the input has no control.
    pub fn control(&self, input: &str) -> Option<ControlValue> {
        if let Some(value) = self.controls.get(input) {
            return Some(*value);
        }
        self.input(input)
            .and_then(|(_, def)| def.control.as_ref())
            .map(|control| control.default)
    }

    pub fn set_control(&mut self, input: &str, value: ControlValue) {
        self.controls.insert(input.to_string(), value);
    }

    /// Persisted per-instance state, consulted read-only at compile time.
    pub fn state(&self) -> (&HashMap<String, usize>, &HashMap<String, ControlValue>) {
        (&self.options, &self.controls)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("options", &self.options)
            .field("controls", &self.controls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Invert;

    #[test]
    fn test_node_defaults_from_definition() {
        let node = Node::new(Arc::new(Invert));
        assert_eq!(node.type_name(), "Invert");
        // Mix control defaults to the declared literal.
        assert_eq!(node.control("mix"), Some(ControlValue::Float(1.0)));
        // Required color input has no control.
        assert_eq!(node.control("color"), None);
    }

    #[test]
    fn test_control_override() {
        let mut node = Node::new(Arc::new(Invert));
        node.set_control("mix", ControlValue::Float(0.5));
        assert_eq!(node.control("mix"), Some(ControlValue::Float(0.5)));
    }

    #[test]
    fn test_port_lookup() {
        let node = Node::new(Arc::new(Invert));
        let (id, def) = node.input("color").unwrap();
        assert_eq!(id, 0);
        assert_eq!(def.name, "color");
        assert!(node.input("bogus").is_none());
        let (_, out) = node.output("color").unwrap();
        assert_eq!(out.name, "color");
    }
}
