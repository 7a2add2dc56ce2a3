//! Per-compilation accumulator and the uniform binding table
//!
//! A [`CompileContext`] lives for exactly one compilation pass: it memoizes
//! which (node, output) pairs already have a generated function, collects
//! uniform bindings for every host-supplied value, and records which shared
//! library snippets the compiled path needs. It is discarded and rebuilt on
//! every recompile so stale bindings can never reference destroyed nodes.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::error::GraphError;
use crate::graph::graph::EffectGraph;
use crate::graph::node::{Node, NodeId};
use crate::graph::port::{InputPolicy, PortId};

/// GPU-visible type of a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec4,
}

impl UniformKind {
    pub fn wgsl_type(&self) -> &'static str {
        match self {
            UniformKind::Float => "f32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec4 => "vec4<f32>",
        }
    }

    /// Byte size in a WGSL uniform structure.
    pub fn size(&self) -> u32 {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec4 => 16,
        }
    }

    /// Required alignment in a WGSL uniform structure.
    pub fn align(&self) -> u32 {
        match self {
            UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec4 => 16,
        }
    }
}

/// A concrete uniform value produced by an update callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
        }
    }

    /// Write the value's bytes into `out`, which must be at least
    /// `kind().size()` long.
    pub fn write_bytes(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out[..4].copy_from_slice(&v.to_le_bytes()),
            UniformValue::Vec2(v) => {
                out[..4].copy_from_slice(&v.x.to_le_bytes());
                out[4..8].copy_from_slice(&v.y.to_le_bytes());
            }
            UniformValue::Vec4(v) => {
                for (i, c) in v.iter().enumerate() {
                    out[i * 4..i * 4 + 4].copy_from_slice(&c.to_le_bytes());
                }
            }
        }
    }
}

/// Ambient per-tick values polled by uniform update callbacks.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    /// Elapsed time in seconds since the runtime started.
    pub time: f32,
    /// Monotonic frame counter.
    pub frame: u64,
    /// Render surface size in pixels.
    pub resolution: Vec2,
    /// Pointer position in pixels.
    pub pointer: Vec2,
}

/// How a uniform's value reaches the GPU.
pub enum UpdateRule {
    /// Uploaded once from a literal when the program links.
    Once(UniformValue),
    /// Polled every frame. Returning `None` is a runtime gap: that uniform
    /// keeps its previous value for the tick and the frame still renders.
    EveryFrame(Box<dyn Fn(&FrameInputs) -> Option<UniformValue> + Send>),
}

impl std::fmt::Debug for UpdateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateRule::Once(v) => f.debug_tuple("Once").field(v).finish(),
            UpdateRule::EveryFrame(_) => f.write_str("EveryFrame(..)"),
        }
    }
}

/// One entry of the uniform binding table.
#[derive(Debug)]
pub struct UniformBinding {
    /// Shader-visible name, derived from node id + purpose for uniqueness.
    pub name: String,
    pub kind: UniformKind,
    pub rule: UpdateRule,
}

/// Host-side byte offsets of every binding within the packed uniform buffer,
/// mirroring WGSL uniform structure layout rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    pub offsets: Vec<u32>,
    pub size: u32,
}

/// The uniform binding table built during one compilation.
#[derive(Debug, Default)]
pub struct UniformTable {
    bindings: Vec<UniformBinding>,
    names: HashSet<String>,
}

impl UniformTable {
    pub fn register(&mut self, binding: UniformBinding) -> Result<(), GraphError> {
        if !self.names.insert(binding.name.clone()) {
            return Err(GraphError::DuplicateUniform { name: binding.name });
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn bindings(&self) -> &[UniformBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Compute member offsets the way WGSL lays out the generated `Params`
    /// structure, with the total size rounded up for uniform-buffer binding.
    pub fn layout(&self) -> UniformLayout {
        let round_up = |value: u32, align: u32| value.div_ceil(align) * align;
        let mut offset = 0u32;
        let mut offsets = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            offset = round_up(offset, binding.kind.align());
            offsets.push(offset);
            offset += binding.kind.size();
        }
        UniformLayout {
            offsets,
            size: round_up(offset, 16),
        }
    }
}

/// Per-compilation mutable accumulator threaded through the code assembler.
pub struct CompileContext<'g> {
    pub graph: &'g EffectGraph,
    /// Generated function name per assembled (node, output).
    functions: HashMap<(NodeId, PortId), String>,
    /// Uniform binding table for this compilation.
    pub uniforms: UniformTable,
    /// Requested shared snippets, deduplicated, in first-request order.
    snippets: Vec<&'static str>,
}

impl<'g> CompileContext<'g> {
    pub fn new(graph: &'g EffectGraph) -> Self {
        Self {
            graph,
            functions: HashMap::new(),
            uniforms: UniformTable::default(),
            snippets: Vec::new(),
        }
    }

    /// Derive the collision-free function name for a (node, output) pair.
    pub fn function_name_for(node: &Node, output: PortId) -> String {
        let key = node
            .definition
            .outputs()
            .get(output)
            .map(|def| def.name.as_str())
            .unwrap_or("out");
        format!("node{}_{}", node.id, key)
    }

    /// Derive a collision-free uniform name from a node id and a purpose.
    pub fn uniform_name(node: &Node, purpose: &str) -> String {
        format!("u_node{}_{}", node.id, purpose)
    }

    /// The memoized function name for an already-assembled output.
    pub fn function_name(&self, node: NodeId, output: PortId) -> Option<&str> {
        self.functions.get(&(node, output)).map(String::as_str)
    }

    pub(crate) fn insert_function(&mut self, node: NodeId, output: PortId, name: String) {
        self.functions.insert((node, output), name);
    }

    pub(crate) fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Register a uniform binding; duplicate generated names are an error.
    pub fn register_uniform(&mut self, binding: UniformBinding) -> Result<(), GraphError> {
        self.uniforms.register(binding)
    }

    /// Request a shared library snippet by identity.
    pub fn require_snippet(&mut self, id: &'static str) {
        if !self.snippets.contains(&id) {
            self.snippets.push(id);
        }
    }

    pub fn snippets(&self) -> &[&'static str] {
        &self.snippets
    }

    /// Produce the expression a generated function uses to reference one of
    /// its inputs.
    ///
    /// Connected inputs become a call to the upstream node's already-assembled
    /// function (or the upstream's declared inline literal), with `coord`
    /// substituting the coordinate argument when a geometric node passes a
    /// transformed coordinate; the default is the ambient coordinate `p`.
    /// Unconnected inputs fall back to the inline control literal, then to the
    /// input's declared policy: an explicit fallback constant, or a hard
    /// compile error naming the node and port.
    pub fn input_expr(
        &mut self,
        node: &Node,
        input: &str,
        coord: Option<&str>,
    ) -> Result<String, GraphError> {
        let (port, def) = node.input(input).ok_or_else(|| GraphError::UnknownPort {
            node: node.id,
            port: input.to_string(),
        })?;

        // Feedback inputs never take their value from a live upstream edge;
        // they sample the frame history inside their own generated code.
        if !def.feedback {
            if let Some(conn) = self.graph.connection_into(node.id, port) {
                let upstream = self.graph.node(conn.from_node)?;
                if let Some(expr) =
                    upstream
                        .definition
                        .inline_expr(self.graph, upstream, conn.from_port)
                {
                    return Ok(expr);
                }
                let fn_name = self
                    .functions
                    .get(&(conn.from_node, conn.from_port))
                    .ok_or(GraphError::UnresolvedDependency {
                        node: conn.from_node,
                        output: conn.from_port,
                    })?;
                return Ok(format!("{}({})", fn_name, coord.unwrap_or("p")));
            }
        }

        if def.control.is_some() {
            if let Some(value) = node.control(input) {
                return Ok(value.wgsl_literal());
            }
        }

        match &def.policy {
            InputPolicy::Fallback(value) => Ok(value.wgsl_literal()),
            InputPolicy::Require => Err(GraphError::MissingInput {
                node: node.id,
                port: input.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_table_rejects_duplicates() {
        let mut table = UniformTable::default();
        table
            .register(UniformBinding {
                name: "u_node1_speed".to_string(),
                kind: UniformKind::Float,
                rule: UpdateRule::Once(UniformValue::Float(1.0)),
            })
            .unwrap();
        let err = table
            .register(UniformBinding {
                name: "u_node1_speed".to_string(),
                kind: UniformKind::Float,
                rule: UpdateRule::Once(UniformValue::Float(2.0)),
            })
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateUniform {
                name: "u_node1_speed".to_string()
            }
        );
    }

    #[test]
    fn test_layout_follows_wgsl_alignment() {
        let mut table = UniformTable::default();
        for (name, kind) in [
            ("a", UniformKind::Float),
            ("b", UniformKind::Vec2),
            ("c", UniformKind::Float),
            ("d", UniformKind::Vec4),
        ] {
            table
                .register(UniformBinding {
                    name: name.to_string(),
                    kind,
                    rule: UpdateRule::Once(UniformValue::Float(0.0)),
                })
                .unwrap();
        }
        let layout = table.layout();
        // f32 at 0, vec2 aligned to 8, f32 packs at 16, vec4 aligned to 32.
        assert_eq!(layout.offsets, vec![0, 8, 16, 32]);
        assert_eq!(layout.size, 48);
    }

    #[test]
    fn test_empty_layout() {
        let table = UniformTable::default();
        let layout = table.layout();
        assert!(layout.offsets.is_empty());
        assert_eq!(layout.size, 0);
    }

    #[test]
    fn test_uniform_value_bytes() {
        let mut buf = [0u8; 16];
        UniformValue::Vec4([1.0, 0.5, 0.0, 1.0]).write_bytes(&mut buf);
        assert_eq!(&buf[..4], &1.0f32.to_le_bytes());
        assert_eq!(&buf[4..8], &0.5f32.to_le_bytes());
    }
}
