//! Effect graph data structures and operations

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::definition::NodeDefinition;
use crate::graph::node::{Node, NodeId};
use crate::graph::port::{ControlValue, PortId, PortKind};

/// Represents a connection between an output port and an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from_node: NodeId,
    pub from_port: PortId,
    pub to_node: NodeId,
    pub to_port: PortId,
}

impl Connection {
    /// Creates a new connection
    pub fn new(from_node: NodeId, from_port: PortId, to_node: NodeId, to_port: PortId) -> Self {
        Self {
            from_node,
            from_port,
            to_node,
            to_port,
        }
    }
}

/// A graph containing effect nodes and their connections
///
/// Connections are the only source of node interdependency. The graph enforces
/// kind-matching and single-incoming-per-input at edit time; acyclicity of
/// non-feedback connections is checked at compile time by the resolver, so
/// edits never fail for ordering reasons.
#[derive(Debug, Clone, Default)]
pub struct EffectGraph {
    pub nodes: HashMap<NodeId, Node>,
    pub connections: Vec<Connection>,
    next_node_id: NodeId,
}

impl EffectGraph {
    /// Creates a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the graph and returns its ID
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_node_id;
        node.id = id;
        self.nodes.insert(id, node);
        self.next_node_id += 1;
        id
    }

    /// Removes a node and all connections referencing it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections
            .retain(|conn| conn.from_node != node_id && conn.to_node != node_id);
        self.nodes.remove(&node_id)
    }

    /// Looks up a node, failing with a structured error for compile paths
    pub fn node(&self, node_id: NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(&node_id)
            .ok_or(GraphError::UnknownNode { node: node_id })
    }

    /// Mutable node lookup for option/control edits
    pub fn node_mut(&mut self, node_id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(GraphError::UnknownNode { node: node_id })
    }

    /// Adds a connection between two ports
    ///
    /// Validates endpoint existence and kind compatibility. An input holds at
    /// most one incoming connection; connecting over an existing one replaces
    /// it. Action ports never connect into the compile graph.
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), GraphError> {
        let from_kind = self.output_kind(connection.from_node, connection.from_port)?;
        let to_kind = self.input_kind(connection.to_node, connection.to_port)?;
        if !from_kind.can_connect_to(&to_kind) {
            return Err(GraphError::KindMismatch {
                from: from_kind,
                to: to_kind,
            });
        }

        // Replace any existing incoming connection on the target input.
        self.connections
            .retain(|conn| !(conn.to_node == connection.to_node && conn.to_port == connection.to_port));
        self.connections.push(connection);
        Ok(())
    }

    /// Helper to add a connection by node IDs and port names
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> Result<(), GraphError> {
        let from = self
            .node(from_node)?
            .output(from_port)
            .ok_or_else(|| GraphError::UnknownPort {
                node: from_node,
                port: from_port.to_string(),
            })?
            .0;
        let to = self
            .node(to_node)?
            .input(to_port)
            .ok_or_else(|| GraphError::UnknownPort {
                node: to_node,
                port: to_port.to_string(),
            })?
            .0;
        self.add_connection(Connection::new(from_node, from, to_node, to))
    }

    /// Removes the connection feeding the given input, if any
    pub fn disconnect(&mut self, to_node: NodeId, to_port: PortId) -> Option<Connection> {
        let index = self
            .connections
            .iter()
            .position(|conn| conn.to_node == to_node && conn.to_port == to_port)?;
        Some(self.connections.remove(index))
    }

    /// The connection feeding the given input, if any
    pub fn connection_into(&self, to_node: NodeId, to_port: PortId) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|conn| conn.to_node == to_node && conn.to_port == to_port)
    }

    fn output_kind(&self, node_id: NodeId, port: PortId) -> Result<PortKind, GraphError> {
        let node = self.node(node_id)?;
        node.definition
            .outputs()
            .get(port)
            .map(|def| def.kind)
            .ok_or_else(|| GraphError::UnknownPort {
                node: node_id,
                port: port.to_string(),
            })
    }

    fn input_kind(&self, node_id: NodeId, port: PortId) -> Result<PortKind, GraphError> {
        let node = self.node(node_id)?;
        node.definition
            .inputs()
            .get(port)
            .map(|def| def.kind)
            .ok_or_else(|| GraphError::UnknownPort {
                node: node_id,
                port: port.to_string(),
            })
    }

    /// Snapshot the persistable patch state: node kinds with their option and
    /// control values, plus connections. Definitions themselves are not
    /// persisted; restoring resolves them through a caller-supplied catalog.
    pub fn snapshot(&self) -> PatchState {
        let mut nodes: Vec<NodeState> = self
            .nodes
            .values()
            .map(|node| {
                let (options, controls) = node.state();
                NodeState {
                    id: node.id,
                    type_name: node.type_name().to_string(),
                    options: options.clone(),
                    controls: controls.clone(),
                }
            })
            .collect();
        nodes.sort_by_key(|node| node.id);
        PatchState {
            nodes,
            connections: self.connections.clone(),
            next_node_id: self.next_node_id,
        }
    }

    /// Rebuild a graph from a persisted patch, resolving each stored kind
    /// name through `definitions`. Connections re-validate on the way in, so
    /// a patch saved against different port declarations fails loudly rather
    /// than silently miswiring.
    pub fn restore<F>(state: PatchState, mut definitions: F) -> Result<Self, GraphError>
    where
        F: FnMut(&str) -> Option<Arc<dyn NodeDefinition>>,
    {
        let mut graph = EffectGraph::new();
        for saved in state.nodes {
            let definition =
                definitions(&saved.type_name).ok_or(GraphError::UnknownDefinition {
                    type_name: saved.type_name,
                })?;
            let mut node = Node::new(definition);
            node.id = saved.id;
            for (name, choice) in &saved.options {
                node.set_option(name, *choice);
            }
            for (input, value) in &saved.controls {
                node.set_control(input, *value);
            }
            graph.nodes.insert(saved.id, node);
        }
        for connection in state.connections {
            graph.add_connection(connection)?;
        }
        graph.next_node_id = state.next_node_id;
        Ok(graph)
    }
}

/// Persisted per-node state: the kind name plus instance option and control
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub id: NodeId,
    pub type_name: String,
    pub options: HashMap<String, usize>,
    pub controls: HashMap<String, ControlValue>,
}

/// The serializable form of a patch, consulted read-only at compile time and
/// written back out on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchState {
    pub nodes: Vec<NodeState>,
    pub connections: Vec<Connection>,
    pub next_node_id: NodeId,
}

impl PatchState {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::palette::{ConstantColor, Invert, Oscillator};

    #[test]
    fn test_add_and_remove_node() {
        let mut graph = EffectGraph::new();
        let a = graph.add_node(Node::new(Arc::new(ConstantColor)));
        let b = graph.add_node(Node::new(Arc::new(Invert)));
        assert_ne!(a, b);
        assert_eq!(graph.nodes.len(), 2);

        graph.remove_node(a);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.node(a).is_err());
    }

    #[test]
    fn test_connect_checks_kinds() {
        let mut graph = EffectGraph::new();
        let color = graph.add_node(Node::new(Arc::new(ConstantColor)));
        let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
        let invert = graph.add_node(Node::new(Arc::new(Invert)));

        // Color output into color input is fine.
        graph.connect(color, "color", invert, "color").unwrap();

        // Float output into color input is rejected.
        let err = graph.connect(osc, "value", invert, "color").unwrap_err();
        assert!(matches!(err, GraphError::KindMismatch { .. }));

        // Float output into float input is fine.
        graph.connect(osc, "value", invert, "mix").unwrap();
    }

    #[test]
    fn test_input_holds_one_incoming_connection() {
        let mut graph = EffectGraph::new();
        let a = graph.add_node(Node::new(Arc::new(ConstantColor)));
        let b = graph.add_node(Node::new(Arc::new(ConstantColor)));
        let invert = graph.add_node(Node::new(Arc::new(Invert)));

        graph.connect(a, "color", invert, "color").unwrap();
        graph.connect(b, "color", invert, "color").unwrap();

        assert_eq!(graph.connections.len(), 1);
        let conn = graph.connection_into(invert, 0).unwrap();
        assert_eq!(conn.from_node, b);
    }

    #[test]
    fn test_remove_node_removes_only_its_connections() {
        let mut graph = EffectGraph::new();
        let a = graph.add_node(Node::new(Arc::new(ConstantColor)));
        let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
        let invert = graph.add_node(Node::new(Arc::new(Invert)));

        graph.connect(a, "color", invert, "color").unwrap();
        graph.connect(osc, "value", invert, "mix").unwrap();
        assert_eq!(graph.connections.len(), 2);

        graph.remove_node(osc);
        assert_eq!(graph.connections.len(), 1);
        let remaining = &graph.connections[0];
        assert_eq!(remaining.from_node, a);
    }

    fn demo_catalog(type_name: &str) -> Option<Arc<dyn NodeDefinition>> {
        match type_name {
            "ConstantColor" => Some(Arc::new(ConstantColor)),
            "Invert" => Some(Arc::new(Invert)),
            "Oscillator" => Some(Arc::new(Oscillator)),
            _ => None,
        }
    }

    #[test]
    fn test_patch_round_trips_through_json() {
        let mut graph = EffectGraph::new();
        let red = graph.add_node(Node::new(Arc::new(ConstantColor)));
        graph
            .node_mut(red)
            .unwrap()
            .set_control("value", ControlValue::Color([1.0, 0.0, 0.0, 1.0]));
        let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
        graph.node_mut(osc).unwrap().set_option("wave", 2);
        let invert = graph.add_node(Node::new(Arc::new(Invert)));
        graph.connect(red, "color", invert, "color").unwrap();
        graph.connect(osc, "value", invert, "mix").unwrap();

        let json = graph.snapshot().to_json().unwrap();
        let state = PatchState::from_json(&json).unwrap();
        let restored = EffectGraph::restore(state, demo_catalog).unwrap();

        assert_eq!(restored.connections, graph.connections);
        assert_eq!(
            restored.node(red).unwrap().control("value"),
            Some(ControlValue::Color([1.0, 0.0, 0.0, 1.0]))
        );
        assert_eq!(restored.node(osc).unwrap().option("wave"), 2);
        // Ids keep advancing from where the saved patch left off.
        let next = restored.clone().add_node(Node::new(Arc::new(Invert)));
        assert_eq!(next, invert + 1);
    }

    #[test]
    fn test_restore_rejects_unknown_kind() {
        let mut graph = EffectGraph::new();
        graph.add_node(Node::new(Arc::new(ConstantColor)));
        let state = graph.snapshot();

        let err = EffectGraph::restore(state, |_| None).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDefinition {
                type_name: "ConstantColor".to_string()
            }
        );
    }
}
