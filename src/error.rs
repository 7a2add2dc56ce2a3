//! Error taxonomy for graph compilation and program building
//!
//! Compile-time problems split into two families: [`GraphError`] for anything
//! detected while resolving and assembling the graph, and [`BuildError`] for
//! failures reported by the graphics backend when linking the assembled source.
//! Both are fatal to the compile attempt but never to the running program; the
//! runtime keeps drawing the last successfully linked program.

use thiserror::Error;

use crate::graph::{NodeId, PortKind};

/// Structural problems in the effect graph, detected at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A cycle through non-feedback connections was found while resolving.
    #[error("cyclic dependency through node {node} (non-feedback connections must be acyclic)")]
    CyclicGraph { node: NodeId },

    /// A required input has no connection and no declared fallback.
    #[error("node {node} input '{port}' requires a connection")]
    MissingInput { node: NodeId, port: String },

    /// Two uniforms resolved to the same generated name.
    #[error("uniform '{name}' was registered twice")]
    DuplicateUniform { name: String },

    /// A connection or lookup referenced a node that is not in the graph.
    #[error("node {node} does not exist")]
    UnknownNode { node: NodeId },

    /// A lookup referenced a port name or index the node does not declare.
    #[error("node {node} has no port '{port}'")]
    UnknownPort { node: NodeId, port: String },

    /// A persisted patch named a node kind the catalog cannot supply.
    #[error("no definition available for node kind '{type_name}'")]
    UnknownDefinition { type_name: String },

    /// Connection endpoints carry different semantic types.
    #[error("cannot connect {from:?} output to {to:?} input")]
    KindMismatch { from: PortKind, to: PortKind },

    /// An input expression was requested for a dependency the resolver never
    /// visited. Indicates a graph edit between resolve and assemble.
    #[error("node {node} output {output} was not resolved before use")]
    UnresolvedDependency { node: NodeId, output: usize },
}

/// Failures reported by the graphics backend.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The assembled source failed shader validation or pipeline creation.
    /// The full generated source is retained for diagnostics.
    #[error("generated shader failed to link: {message}")]
    Link { message: String, source_text: String },

    /// No compatible graphics adapter was available.
    #[error("no compatible graphics adapter found")]
    NoAdapter,

    /// The adapter refused to create a device.
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// A frame readback could not be completed.
    #[error("frame readback failed: {0}")]
    Readback(String),
}

/// Either half of the compile pipeline failing.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_messages_identify_offenders() {
        let err = GraphError::MissingInput {
            node: 7,
            port: "color".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains('7'));
        assert!(text.contains("color"));

        let err = GraphError::DuplicateUniform {
            name: "u_node3_speed".to_string(),
        };
        assert!(err.to_string().contains("u_node3_speed"));
    }

    #[test]
    fn test_build_error_retains_source() {
        let err = BuildError::Link {
            message: "expected ';'".to_string(),
            source_text: "fn broken(".to_string(),
        };
        match err {
            BuildError::Link { source_text, .. } => assert_eq!(source_text, "fn broken("),
            _ => unreachable!(),
        }
    }
}
