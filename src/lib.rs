//! Compile directed graphs of visual-effect nodes into single real-time
//! shader programs.
//!
//! An [`EffectGraph`](graph::EffectGraph) holds node instances and typed
//! connections; [`compile`](compile::compile) resolves the subgraph feeding a
//! designated sink into evaluation order, assembles one WGSL function per
//! reachable (node, output), and wraps the result in a fixed fullscreen entry
//! point. The [`Runtime`](runtime::Runtime) links compiled programs against
//! the graphics backend, drives the per-tick uniform/draw/history sequence,
//! and keeps the last good program alive across failed edits. Temporal
//! feedback reads previous frames out of a fixed-depth ring buffer
//! ([`gpu::FrameHistory`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadegraph::graph::{EffectGraph, Node};
//! use shadegraph::palette::{ConstantColor, Invert};
//! use shadegraph::compile::{compile, DEFAULT_HISTORY_DEPTH};
//!
//! let mut graph = EffectGraph::new();
//! let red = graph.add_node(Node::new(Arc::new(ConstantColor)));
//! let invert = graph.add_node(Node::new(Arc::new(Invert)));
//! graph.connect(red, "color", invert, "color")?;
//! let program = compile(&graph, invert, 0, DEFAULT_HISTORY_DEPTH)?;
//! println!("{}", program.source);
//! # Ok::<(), shadegraph::error::GraphError>(())
//! ```

pub mod compile;
pub mod error;
pub mod gpu;
pub mod graph;
pub mod palette;
pub mod runtime;

pub use compile::{compile, ShaderProgram, DEFAULT_HISTORY_DEPTH};
pub use error::{BuildError, CompileError, GraphError};
pub use graph::{EffectGraph, Node, NodeDefinition, NodeId, PortId, PortKind};
pub use runtime::Runtime;
