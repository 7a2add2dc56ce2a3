//! Effect graph model - nodes, ports, connections, and the node contract

pub mod definition;
pub mod graph;
pub mod node;
pub mod port;

pub use definition::NodeDefinition;
pub use graph::{Connection, EffectGraph, NodeState, PatchState};
pub use node::{Node, NodeId};
pub use port::{
    ControlValue, InputDef, InputPolicy, LiteralControl, OptionDef, OutputDef, PortId, PortKind,
};
