//! Code assembly - one named WGSL function per resolved (node, output)
//!
//! For each pair in resolver order the assembler asks the node's definition to
//! author a function body, handing it a deterministic, collision-free name
//! derived from the node's stable id and the output key. Results are memoized
//! per (node, output) in the compile context so a value fanning out to many
//! consumers is generated once and called many times - code size stays O(nodes)
//! rather than O(paths).

use log::debug;

use crate::compile::context::CompileContext;
use crate::error::GraphError;
use crate::graph::node::NodeId;
use crate::graph::port::PortId;

/// One assembled shader function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFunction {
    pub name: String,
    pub source: String,
}

/// Assemble every function in `order`, threading `ctx` through each node's
/// code-generation capability.
pub fn assemble(
    order: &[(NodeId, PortId)],
    ctx: &mut CompileContext<'_>,
) -> Result<Vec<AssembledFunction>, GraphError> {
    let graph = ctx.graph;
    let mut functions = Vec::with_capacity(order.len());

    for &(node_id, output) in order {
        if ctx.function_name(node_id, output).is_some() {
            continue;
        }
        let node = graph.node(node_id)?;
        let fn_name = CompileContext::function_name_for(node, output);
        debug!(
            "assembling {} output {} as {}",
            node.type_name(),
            output,
            fn_name
        );

        for id in node.definition.snippets() {
            ctx.require_snippet(id);
        }
        let source = node.definition.generate(node, output, &fn_name, ctx)?;
        ctx.insert_function(node_id, output, fn_name.clone());
        functions.push(AssembledFunction {
            name: fn_name,
            source,
        });
    }

    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::compile::resolver::resolve;
    use crate::graph::graph::EffectGraph;
    use crate::graph::node::Node;
    use crate::graph::port::ControlValue;
    use crate::palette::{Blend, ConstantColor, Feedback, Invert, Oscillator, Transform2D};

    fn assemble_sink(
        graph: &EffectGraph,
        sink: NodeId,
    ) -> Result<(Vec<AssembledFunction>, usize), GraphError> {
        let order = resolve(graph, sink, 0)?;
        let mut ctx = CompileContext::new(graph);
        let functions = assemble(&order, &mut ctx)?;
        let count = ctx.function_count();
        Ok((functions, count))
    }

    #[test]
    fn test_constant_color_is_inlined_per_its_contract() {
        // ConstantColor(red) -> Invert(mix=1.0): one function total, with the
        // red literal inlined into Invert's body.
        let mut graph = EffectGraph::new();
        let red = graph.add_node(Node::new(Arc::new(ConstantColor)));
        graph
            .node_mut(red)
            .unwrap()
            .set_control("value", ControlValue::Color([1.0, 0.0, 0.0, 1.0]));
        let invert = graph.add_node(Node::new(Arc::new(Invert)));
        graph.connect(red, "color", invert, "color").unwrap();

        let (functions, _) = assemble_sink(&graph, invert).unwrap();
        assert_eq!(functions.len(), 1);
        let body = &functions[0].source;
        assert!(body.contains("vec4<f32>(1.0, 0.0, 0.0, 1.0)"));
        assert!(body.contains(&format!("fn node{}_color", invert)));
    }

    #[test]
    fn test_fanout_is_memoized_not_reinlined() {
        let mut graph = EffectGraph::new();
        let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
        let left = graph.add_node(Node::new(Arc::new(Invert)));
        let right = graph.add_node(Node::new(Arc::new(Invert)));
        let blend = graph.add_node(Node::new(Arc::new(Blend)));
        let color = graph.add_node(Node::new(Arc::new(ConstantColor)));

        graph.connect(color, "color", left, "color").unwrap();
        graph.connect(color, "color", right, "color").unwrap();
        graph.connect(osc, "value", left, "mix").unwrap();
        graph.connect(osc, "value", right, "mix").unwrap();
        graph.connect(left, "color", blend, "a").unwrap();
        graph.connect(right, "color", blend, "b").unwrap();

        let (functions, count) = assemble_sink(&graph, blend).unwrap();
        // Function count equals distinct reachable outputs, independent of
        // fan-out: osc, left, right, blend.
        assert_eq!(functions.len(), 4);
        assert_eq!(count, 4);
        let osc_fn = format!("node{}_value", osc);
        assert_eq!(
            functions.iter().filter(|f| f.name == osc_fn).count(),
            1,
            "oscillator assembled exactly once"
        );
    }

    #[test]
    fn test_missing_required_input_names_node_and_port() {
        let mut graph = EffectGraph::new();
        let invert = graph.add_node(Node::new(Arc::new(Invert)));

        let err = assemble_sink(&graph, invert).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingInput {
                node: invert,
                port: "color".to_string()
            }
        );
    }

    #[test]
    fn test_declared_fallback_is_surfaced_not_zero() {
        // Feedback's tint input declares a white fallback; leaving it
        // unconnected compiles and formats the declared constant.
        let mut graph = EffectGraph::new();
        let feedback = graph.add_node(Node::new(Arc::new(Feedback::default())));

        let (functions, _) = assemble_sink(&graph, feedback).unwrap();
        assert_eq!(functions.len(), 1);
        assert!(functions[0]
            .source
            .contains("vec4<f32>(1.0, 1.0, 1.0, 1.0)"));
    }

    #[test]
    fn test_geometric_node_substitutes_coordinate() {
        let mut graph = EffectGraph::new();
        let inner = graph.add_node(Node::new(Arc::new(Invert)));
        let warp = graph.add_node(Node::new(Arc::new(Transform2D)));
        let color = graph.add_node(Node::new(Arc::new(ConstantColor)));
        graph.connect(color, "color", inner, "color").unwrap();
        graph.connect(inner, "color", warp, "source").unwrap();

        let (functions, _) = assemble_sink(&graph, warp).unwrap();
        let warp_fn = functions
            .iter()
            .find(|f| f.name == format!("node{}_color", warp))
            .unwrap();
        // The upstream call receives the transformed coordinate, not the
        // ambient one.
        assert!(warp_fn.source.contains(&format!("node{}_color(q)", inner)));
    }

    #[test]
    fn test_removed_node_never_appears_in_source() {
        let mut graph = EffectGraph::new();
        let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
        let invert = graph.add_node(Node::new(Arc::new(Invert)));
        let color = graph.add_node(Node::new(Arc::new(ConstantColor)));
        graph.connect(color, "color", invert, "color").unwrap();
        graph.connect(osc, "value", invert, "mix").unwrap();

        graph.remove_node(osc);
        let (functions, _) = assemble_sink(&graph, invert).unwrap();
        let all: String = functions.iter().map(|f| f.source.clone()).collect();
        assert!(!all.contains(&format!("node{}_", osc)));
        // The mix input falls back to its inline control literal.
        assert!(all.contains("1.0"));
    }
}
