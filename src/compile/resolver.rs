//! Dependency resolution via cycle-checked depth-first traversal
//!
//! Walks the live connection graph backward from a designated sink output and
//! produces the evaluation order for code assembly: every (node, output) pair
//! appears after all of its non-feedback input dependencies, exactly once.
//! Feedback edges are excluded from both traversal and the cycle check - they
//! are backward in time, not backward in data. Pure traversal with no side
//! effects; safe to re-run on every edit.

use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::graph::graph::EffectGraph;
use crate::graph::node::NodeId;
use crate::graph::port::{PortId, PortKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current traversal path; revisiting means a cycle.
    InProgress,
    /// All dependencies already emitted.
    Done,
}

/// Resolve the evaluation order for the subgraph feeding `(sink, output)`.
///
/// Ties between independent subgraphs are broken by input declaration order,
/// keeping the order - and therefore the generated source - stable across
/// recompiles. Outputs that collapse to inline literals (see
/// [`NodeDefinition::inline_expr`](crate::graph::NodeDefinition::inline_expr))
/// are not scheduled: they produce no function of their own.
pub fn resolve(
    graph: &EffectGraph,
    sink: NodeId,
    output: PortId,
) -> Result<Vec<(NodeId, PortId)>, GraphError> {
    let mut marks = HashMap::new();
    let mut emitted = HashSet::new();
    let mut order = Vec::new();
    visit(graph, sink, output, &mut marks, &mut emitted, &mut order)?;
    Ok(order)
}

fn visit(
    graph: &EffectGraph,
    node_id: NodeId,
    output: PortId,
    marks: &mut HashMap<NodeId, Mark>,
    emitted: &mut HashSet<(NodeId, PortId)>,
    order: &mut Vec<(NodeId, PortId)>,
) -> Result<(), GraphError> {
    if emitted.contains(&(node_id, output)) {
        return Ok(());
    }
    match marks.get(&node_id) {
        Some(Mark::InProgress) => return Err(GraphError::CyclicGraph { node: node_id }),
        Some(Mark::Done) => {
            // Another output of an already-walked node: its inputs are
            // resolved, only this pair still needs a slot in the order.
            emitted.insert((node_id, output));
            order.push((node_id, output));
            return Ok(());
        }
        None => {}
    }

    let node = graph.node(node_id)?;
    marks.insert(node_id, Mark::InProgress);

    for (port, input) in node.definition.inputs().iter().enumerate() {
        if input.feedback || input.kind == PortKind::Action {
            continue;
        }
        let Some(conn) = graph.connection_into(node_id, port) else {
            continue;
        };
        let upstream = graph.node(conn.from_node)?;
        if upstream
            .definition
            .inline_expr(graph, upstream, conn.from_port)
            .is_some()
        {
            continue;
        }
        visit(graph, conn.from_node, conn.from_port, marks, emitted, order)?;
    }

    marks.insert(node_id, Mark::Done);
    emitted.insert((node_id, output));
    order.push((node_id, output));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::graph::node::Node;
    use crate::palette::{Blend, ConstantColor, Invert, Oscillator};

    fn invert_chain(len: usize) -> (EffectGraph, Vec<NodeId>) {
        let mut graph = EffectGraph::new();
        let mut ids = Vec::new();
        for i in 0..len {
            let id = graph.add_node(Node::new(Arc::new(Invert)));
            if i > 0 {
                graph.connect(ids[i - 1], "color", id, "color").unwrap();
            }
            ids.push(id);
        }
        (graph, ids)
    }

    #[test]
    fn test_order_puts_dependencies_first() {
        let (graph, ids) = invert_chain(3);
        let order = resolve(&graph, ids[2], 0).unwrap();
        let expected: Vec<_> = ids.iter().map(|&id| (id, 0)).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_each_reachable_output_appears_once() {
        // Diamond: osc feeds both invert nodes, both feed a blend.
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

        let order = resolve(&graph, blend, 0).unwrap();
        // ConstantColor is inline and never scheduled; osc appears once
        // despite fanning out to both inverts.
        assert_eq!(order.len(), 4);
        let mut seen = HashSet::new();
        for pair in &order {
            assert!(seen.insert(*pair), "{:?} emitted twice", pair);
        }
        let pos =
            |id: NodeId| order.iter().position(|&(n, _)| n == id).unwrap();
        assert!(pos(osc) < pos(left));
        assert!(pos(osc) < pos(right));
        assert!(pos(left) < pos(blend));
        assert!(pos(right) < pos(blend));
    }

    #[test]
    fn test_cycle_yields_error_not_hang() {
        let (mut graph, ids) = invert_chain(2);
        // Close the loop: last node's color back into the first.
        graph.connect(ids[1], "color", ids[0], "color").unwrap();
        let err = resolve(&graph, ids[1], 0).unwrap_err();
        assert!(matches!(err, GraphError::CyclicGraph { .. }));
    }

    #[test]
    fn test_determinism_across_runs() {
        let (graph, ids) = invert_chain(4);
        let first = resolve(&graph, ids[3], 0).unwrap();
        let second = resolve(&graph, ids[3], 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unreachable_nodes_are_not_scheduled() {
        let (mut graph, ids) = invert_chain(2);
        let stray = graph.add_node(Node::new(Arc::new(Oscillator)));
        let order = resolve(&graph, ids[1], 0).unwrap();
        assert!(!order.iter().any(|&(n, _)| n == stray));
    }
}
