//! Headless demo: build a feedback patch, compile it, and render a few frames.
//!
//! Without a graphics adapter the compiled WGSL is printed instead, since the
//! compiler side is pure and needs no device.

use std::sync::Arc;

use log::{info, warn};

use shadegraph::compile::{compile, DEFAULT_HISTORY_DEPTH};
use shadegraph::error::BuildError;
use shadegraph::gpu::GpuContext;
use shadegraph::graph::{EffectGraph, Node, NodeId, PortId};
use shadegraph::palette::{Blend, ConstantColor, Feedback, Invert, Oscillator, Transform2D};
use shadegraph::runtime::Runtime;

fn demo_patch(graph: &mut EffectGraph) -> (NodeId, PortId) {
    let red = graph.add_node(Node::new(Arc::new(ConstantColor)));
    graph
        .node_mut(red)
        .unwrap()
        .set_control("value", shadegraph::graph::ControlValue::Color([0.9, 0.2, 0.1, 1.0]));
    let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
    let invert = graph.add_node(Node::new(Arc::new(Invert)));
    let warp = graph.add_node(Node::new(Arc::new(Transform2D)));
    let feedback = graph.add_node(Node::new(Arc::new(Feedback)));
    let blend = graph.add_node(Node::new(Arc::new(Blend)));

    graph.connect(red, "color", invert, "color").unwrap();
    graph.connect(osc, "value", invert, "mix").unwrap();
    graph.connect(invert, "color", warp, "source").unwrap();
    graph.connect(warp, "color", blend, "a").unwrap();
    graph.connect(feedback, "color", blend, "b").unwrap();
    // The feedback loop: the blended result is what the history echoes.
    graph.connect(blend, "color", feedback, "source").unwrap();

    let (output, _) = graph.node(blend).unwrap().output("color").unwrap();
    (blend, output)
}

fn main() {
    env_logger::init();

    let mut preview = EffectGraph::new();
    let (sink, output) = demo_patch(&mut preview);
    let program = compile(&preview, sink, output, DEFAULT_HISTORY_DEPTH)
        .expect("demo patch compiles");
    info!(
        "compiled demo patch: {} bytes of WGSL, {} uniforms, history depth {}",
        program.source.len(),
        program.uniforms.len(),
        program.history_depth
    );

    let gpu = match GpuContext::new_headless() {
        Ok(gpu) => gpu,
        Err(BuildError::NoAdapter) => {
            warn!("no graphics adapter, printing generated source instead");
            println!("{}", program.source);
            return;
        }
        Err(err) => {
            eprintln!("device setup failed: {}", err);
            std::process::exit(1);
        }
    };

    let mut runtime = Runtime::new(gpu, 512, 512, DEFAULT_HISTORY_DEPTH);
    let (sink, output) = demo_patch(runtime.edit());
    runtime.set_sink(sink, output);

    for _ in 0..60 {
        runtime.tick();
    }
    match runtime.read_frame() {
        Ok(pixels) => {
            let center = (256 * 512 + 256) * 4;
            info!(
                "rendered 60 frames, center pixel rgba = {:?}",
                &pixels[center..center + 4]
            );
        }
        Err(err) => eprintln!("readback failed: {}", err),
    }
}
