//! The node contract consumed by the compiler
//!
//! Node definitions describe a capability set (ports, options, snippet needs)
//! and author the WGSL body of each output as text. They never touch graphics
//! backend handles; live values are described as uniform registrations and the
//! runtime owns the actual upload. The compiler depends only on this trait,
//! never on a registry of all known node kinds; catalogs are an external
//! collaborator and definitions arrive as injected `Arc`s.

use crate::compile::CompileContext;
use crate::error::GraphError;
use crate::graph::graph::EffectGraph;
use crate::graph::node::Node;
use crate::graph::port::{InputDef, OptionDef, OutputDef, PortId};

/// Capability set and code-generation contract for one node kind.
pub trait NodeDefinition: Send + Sync {
    /// Stable kind identifier, e.g. `"Invert"`.
    fn type_name(&self) -> &'static str;

    /// Declared input ports, in declaration order.
    fn inputs(&self) -> &[InputDef];

    /// Declared output ports, in declaration order.
    fn outputs(&self) -> &[OutputDef];

    /// Named enumerated options. Changing one alters generated branches and
    /// therefore requires a recompile.
    fn options(&self) -> &[OptionDef] {
        &[]
    }

    /// Shared library snippet identifiers this definition's generated code
    /// relies on. The program builder deduplicates by identity.
    fn snippets(&self) -> &[&'static str] {
        &[]
    }

    /// If an output collapses to a compile-time literal (no runtime state, no
    /// connected inputs), return the WGSL expression directly. Consumers then
    /// inline the expression instead of calling a generated function, and the
    /// resolver does not schedule this output at all.
    fn inline_expr(&self, _graph: &EffectGraph, _node: &Node, _output: PortId) -> Option<String> {
        None
    }

    /// Author the WGSL function for `output`. The function must be named
    /// exactly `fn_name` and have signature `(coordinate) -> value` where the
    /// value type matches the output's [`PortKind`](crate::graph::PortKind).
    ///
    /// Input references go through
    /// [`CompileContext::input_expr`](crate::compile::CompileContext::input_expr);
    /// live values through
    /// [`CompileContext::register_uniform`](crate::compile::CompileContext::register_uniform).
    fn generate(
        &self,
        node: &Node,
        output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError>;
}
