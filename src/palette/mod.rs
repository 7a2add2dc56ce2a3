//! Built-in node definitions
//!
//! The compiler itself never enumerates node kinds; these definitions arrive
//! at graph-build time as injected `Arc`s like any external ones would. The
//! set here covers the stock patching vocabulary: constants, color math, an
//! oscillator, coordinate warping, temporal feedback, and two host-value
//! sources (pointer and slider) that flow through per-frame uniforms.

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::compile::context::{CompileContext, UniformBinding, UniformKind, UniformValue, UpdateRule};
use crate::compile::snippets::{HISTORY_READ, WORLD_TO_SCREEN};
use crate::error::GraphError;
use crate::graph::definition::NodeDefinition;
use crate::graph::graph::EffectGraph;
use crate::graph::node::Node;
use crate::graph::port::{
    ControlValue, InputDef, LiteralControl, OptionDef, OutputDef, PortId, PortKind,
};

/// A flat color with an inline color control.
///
/// When the `value` input is unconnected the output collapses to a literal:
/// consumers inline the color text directly and no function is generated.
pub struct ConstantColor;

static CONSTANT_COLOR_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(|| {
    vec![InputDef::with_control(
        "value",
        LiteralControl::color([1.0, 1.0, 1.0, 1.0]),
    )]
});
static CONSTANT_COLOR_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("color", PortKind::Color)]);

impl NodeDefinition for ConstantColor {
    fn type_name(&self) -> &'static str {
        "ConstantColor"
    }

    fn inputs(&self) -> &[InputDef] {
        &CONSTANT_COLOR_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &CONSTANT_COLOR_OUTPUTS
    }

    fn inline_expr(&self, graph: &EffectGraph, node: &Node, _output: PortId) -> Option<String> {
        if graph.connection_into(node.id, 0).is_some() {
            return None;
        }
        node.control("value").map(|value| value.wgsl_literal())
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        // Only reached when `value` is connected; the unconnected case inlines.
        let value = ctx.input_expr(node, "value", None)?;
        Ok(format!(
            "fn {}(p: vec2<f32>) -> vec4<f32> {{\n    return {};\n}}\n",
            fn_name, value
        ))
    }
}

/// Color inversion with a mix amount.
pub struct Invert;

static INVERT_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(|| {
    vec![
        InputDef::required("color", PortKind::Color),
        InputDef::with_control("mix", LiteralControl::float(1.0, 0.0, 1.0)),
    ]
});
static INVERT_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("color", PortKind::Color)]);

impl NodeDefinition for Invert {
    fn type_name(&self) -> &'static str {
        "Invert"
    }

    fn inputs(&self) -> &[InputDef] {
        &INVERT_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &INVERT_OUTPUTS
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        let color = ctx.input_expr(node, "color", None)?;
        let mix = ctx.input_expr(node, "mix", None)?;
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> vec4<f32> {{\n\
             \x20   let c = {color};\n\
             \x20   let inverted = vec4<f32>(vec3<f32>(1.0) - c.rgb, c.a);\n\
             \x20   return mix(c, inverted, {mix});\n\
             }}\n"
        ))
    }
}

/// Time-driven scalar oscillator. The waveform is an enumerated option, so
/// switching it regenerates the branch rather than adding a runtime select.
pub struct Oscillator;

static OSCILLATOR_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(|| {
    vec![
        InputDef::with_control("frequency", LiteralControl::float(1.0, 0.0, 20.0)),
        InputDef::with_control("phase", LiteralControl::float(0.0, 0.0, 1.0)),
    ]
});
static OSCILLATOR_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("value", PortKind::Float)]);
static OSCILLATOR_OPTIONS: Lazy<Vec<OptionDef>> =
    Lazy::new(|| vec![OptionDef::new("wave", &["sine", "saw", "square"], 0)]);

impl NodeDefinition for Oscillator {
    fn type_name(&self) -> &'static str {
        "Oscillator"
    }

    fn inputs(&self) -> &[InputDef] {
        &OSCILLATOR_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &OSCILLATOR_OUTPUTS
    }

    fn options(&self) -> &[OptionDef] {
        &OSCILLATOR_OPTIONS
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        let frequency = ctx.input_expr(node, "frequency", None)?;
        let phase = ctx.input_expr(node, "phase", None)?;
        let wave = match node.option("wave") {
            1 => "fract(t)".to_string(),
            2 => "select(0.0, 1.0, fract(t) < 0.5)".to_string(),
            _ => "0.5 + 0.5 * sin(6.283185307179586 * t)".to_string(),
        };
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> f32 {{\n\
             \x20   let t = {frequency} * globals.time + {phase};\n\
             \x20   return {wave};\n\
             }}\n"
        ))
    }
}

/// Two-color crossfade.
pub struct Blend;

static BLEND_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(|| {
    vec![
        InputDef::required("a", PortKind::Color),
        InputDef::required("b", PortKind::Color),
        InputDef::with_control("mix", LiteralControl::float(0.5, 0.0, 1.0)),
    ]
});
static BLEND_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("color", PortKind::Color)]);

impl NodeDefinition for Blend {
    fn type_name(&self) -> &'static str {
        "Blend"
    }

    fn inputs(&self) -> &[InputDef] {
        &BLEND_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &BLEND_OUTPUTS
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        let a = ctx.input_expr(node, "a", None)?;
        let b = ctx.input_expr(node, "b", None)?;
        let mix = ctx.input_expr(node, "mix", None)?;
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> vec4<f32> {{\n\
             \x20   return mix({a}, {b}, {mix});\n\
             }}\n"
        ))
    }
}

/// Scale, rotate, and translate the coordinate seen by the upstream source.
///
/// Geometric nodes work by substitution: the source call receives the
/// transformed coordinate instead of the ambient one, so the warp composes
/// with anything upstream without the upstream knowing.
pub struct Transform2D;

static TRANSFORM2D_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(|| {
    vec![
        InputDef::required("source", PortKind::Color),
        InputDef::with_control("scale", LiteralControl::float(1.0, 0.01, 10.0)),
        InputDef::with_control("angle", LiteralControl::float(0.0, -6.3, 6.3)),
        InputDef::with_control("offset_x", LiteralControl::float(0.0, -2.0, 2.0)),
        InputDef::with_control("offset_y", LiteralControl::float(0.0, -2.0, 2.0)),
    ]
});
static TRANSFORM2D_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("color", PortKind::Color)]);

impl NodeDefinition for Transform2D {
    fn type_name(&self) -> &'static str {
        "Transform2D"
    }

    fn inputs(&self) -> &[InputDef] {
        &TRANSFORM2D_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &TRANSFORM2D_OUTPUTS
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        // Parameters evaluate at the ambient coordinate; only the source call
        // sees the transformed one.
        let scale = ctx.input_expr(node, "scale", None)?;
        let angle = ctx.input_expr(node, "angle", None)?;
        let offset_x = ctx.input_expr(node, "offset_x", None)?;
        let offset_y = ctx.input_expr(node, "offset_y", None)?;
        let source = ctx.input_expr(node, "source", Some("q"))?;
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> vec4<f32> {{\n\
             \x20   let a = {angle};\n\
             \x20   let c = cos(a);\n\
             \x20   let s = sin(a);\n\
             \x20   let shifted = p - vec2<f32>({offset_x}, {offset_y});\n\
             \x20   let q = mat2x2<f32>(c, -s, s, c) * shifted / {scale};\n\
             \x20   return {source};\n\
             }}\n"
        ))
    }
}

/// Temporal feedback: samples the frame history ring buffer instead of a live
/// upstream value.
///
/// The `source` connection declares patch intent (what feeds the surface this
/// node echoes) but is a feedback edge: it is excluded from dependency
/// traversal and the cycle check, because it is backward in time, not backward
/// in data. The generated body converts the world coordinate to screen space
/// and reads `delay` frames back, tinted.
#[derive(Default)]
pub struct Feedback;

static FEEDBACK_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(|| {
    vec![
        InputDef::required("source", PortKind::Color).feedback(),
        InputDef::with_control("delay", LiteralControl::float(1.0, 1.0, 16.0)),
        InputDef::required("tint", PortKind::Color)
            .with_fallback(ControlValue::Color([1.0, 1.0, 1.0, 1.0])),
        InputDef::required("reset", PortKind::Action),
    ]
});
static FEEDBACK_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("color", PortKind::Color)]);
static FEEDBACK_SNIPPETS: [&str; 2] = [WORLD_TO_SCREEN, HISTORY_READ];

impl NodeDefinition for Feedback {
    fn type_name(&self) -> &'static str {
        "Feedback"
    }

    fn inputs(&self) -> &[InputDef] {
        &FEEDBACK_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &FEEDBACK_OUTPUTS
    }

    fn snippets(&self) -> &[&'static str] {
        &FEEDBACK_SNIPPETS
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        let delay = ctx.input_expr(node, "delay", None)?;
        let tint = ctx.input_expr(node, "tint", None)?;
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> vec4<f32> {{\n\
             \x20   let uv = world_to_screen(p, globals.resolution);\n\
             \x20   return history_read(uv, {delay}) * {tint};\n\
             }}\n"
        ))
    }
}

/// Pointer position as two normalized scalar outputs, polled every frame.
pub struct Pointer;

static POINTER_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(Vec::new);
static POINTER_OUTPUTS: Lazy<Vec<OutputDef>> = Lazy::new(|| {
    vec![
        OutputDef::new("x", PortKind::Float),
        OutputDef::new("y", PortKind::Float),
    ]
});

impl NodeDefinition for Pointer {
    fn type_name(&self) -> &'static str {
        "Pointer"
    }

    fn inputs(&self) -> &[InputDef] {
        &POINTER_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &POINTER_OUTPUTS
    }

    fn generate(
        &self,
        node: &Node,
        output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        let purpose = match output {
            0 => "pointer_x",
            1 => "pointer_y",
            _ => {
                return Err(GraphError::UnknownPort {
                    node: node.id,
                    port: output.to_string(),
                })
            }
        };
        let name = CompileContext::uniform_name(node, purpose);
        let axis = output;
        ctx.register_uniform(UniformBinding {
            name: name.clone(),
            kind: UniformKind::Float,
            rule: UpdateRule::EveryFrame(Box::new(move |inputs| {
                let value = match axis {
                    0 => inputs.pointer.x / inputs.resolution.x.max(1.0),
                    _ => inputs.pointer.y / inputs.resolution.y.max(1.0),
                };
                Some(UniformValue::Float(value))
            })),
        })?;
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> f32 {{\n\
             \x20   return params.{name};\n\
             }}\n"
        ))
    }
}

/// A host-controlled scalar shared with the runtime through a mutex.
///
/// The per-frame callback takes the lock non-blockingly; a poisoned or
/// contended lock is a runtime gap for that tick and the uniform keeps its
/// previous value.
pub struct Slider {
    value: Arc<Mutex<f32>>,
}

static SLIDER_INPUTS: Lazy<Vec<InputDef>> = Lazy::new(Vec::new);
static SLIDER_OUTPUTS: Lazy<Vec<OutputDef>> =
    Lazy::new(|| vec![OutputDef::new("value", PortKind::Float)]);

impl Slider {
    pub fn new(initial: f32) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
        }
    }

    /// Shared handle the host writes through from any thread.
    pub fn handle(&self) -> Arc<Mutex<f32>> {
        Arc::clone(&self.value)
    }
}

impl NodeDefinition for Slider {
    fn type_name(&self) -> &'static str {
        "Slider"
    }

    fn inputs(&self) -> &[InputDef] {
        &SLIDER_INPUTS
    }

    fn outputs(&self) -> &[OutputDef] {
        &SLIDER_OUTPUTS
    }

    fn generate(
        &self,
        node: &Node,
        _output: PortId,
        fn_name: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<String, GraphError> {
        let name = CompileContext::uniform_name(node, "value");
        let shared = Arc::clone(&self.value);
        ctx.register_uniform(UniformBinding {
            name: name.clone(),
            kind: UniformKind::Float,
            rule: UpdateRule::EveryFrame(Box::new(move |_inputs| {
                shared.try_lock().ok().map(|value| UniformValue::Float(*value))
            })),
        })?;
        Ok(format!(
            "fn {fn_name}(p: vec2<f32>) -> f32 {{\n\
             \x20   return params.{name};\n\
             }}\n"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::program::{compile, DEFAULT_HISTORY_DEPTH};
    use crate::compile::resolver::resolve;
    use crate::compile::FrameInputs;
    use glam::Vec2;

    #[test]
    fn test_constant_color_inlines_only_when_unconnected() {
        let mut graph = EffectGraph::new();
        let a = graph.add_node(Node::new(Arc::new(ConstantColor)));
        let b = graph.add_node(Node::new(Arc::new(ConstantColor)));
        graph.connect(a, "color", b, "value").unwrap();

        let a_node = graph.node(a).unwrap();
        assert_eq!(
            ConstantColor.inline_expr(&graph, a_node, 0),
            Some("vec4<f32>(1.0, 1.0, 1.0, 1.0)".to_string())
        );
        // Once `value` is fed by a connection the literal contract is off.
        let b_node = graph.node(b).unwrap();
        assert_eq!(ConstantColor.inline_expr(&graph, b_node, 0), None);
    }

    #[test]
    fn test_feedback_edge_is_exempt_from_cycle_check() {
        // A closed loop through a feedback input compiles; the same loop
        // through a live input would be a cycle error.
        let mut graph = EffectGraph::new();
        let feedback = graph.add_node(Node::new(Arc::new(Feedback)));
        let invert = graph.add_node(Node::new(Arc::new(Invert)));
        graph.connect(feedback, "color", invert, "color").unwrap();
        graph.connect(invert, "color", feedback, "source").unwrap();

        let order = resolve(&graph, invert, 0).unwrap();
        assert_eq!(order.len(), 2);
        let program = compile(&graph, invert, 0, DEFAULT_HISTORY_DEPTH).unwrap();
        assert!(program.source.contains("fn history_read("));
    }

    #[test]
    fn test_oscillator_waveform_option_switches_branch() {
        let mut graph = EffectGraph::new();
        let osc = graph.add_node(Node::new(Arc::new(Oscillator)));
        let sine = compile(&graph, osc, 0, DEFAULT_HISTORY_DEPTH).unwrap();
        assert!(sine.source.contains("sin("));

        graph.node_mut(osc).unwrap().set_option("wave", 1);
        let saw = compile(&graph, osc, 0, DEFAULT_HISTORY_DEPTH).unwrap();
        assert!(saw.source.contains("fract(t)"));
        assert!(!saw.source.contains("sin("));
    }

    #[test]
    fn test_pointer_registers_one_uniform_per_used_output() {
        let mut graph = EffectGraph::new();
        let pointer = graph.add_node(Node::new(Arc::new(Pointer)));
        let program = compile(&graph, pointer, 0, DEFAULT_HISTORY_DEPTH).unwrap();
        assert_eq!(program.uniforms.len(), 1);
        assert_eq!(
            program.uniforms.bindings()[0].name,
            format!("u_node{}_pointer_x", pointer)
        );
    }

    #[test]
    fn test_pointer_callback_normalizes_by_resolution() {
        let mut graph = EffectGraph::new();
        let pointer = graph.add_node(Node::new(Arc::new(Pointer)));
        let program = compile(&graph, pointer, 0, DEFAULT_HISTORY_DEPTH).unwrap();
        let UpdateRule::EveryFrame(callback) = &program.uniforms.bindings()[0].rule else {
            panic!("pointer must poll every frame");
        };
        let inputs = FrameInputs {
            time: 0.0,
            frame: 0,
            resolution: Vec2::new(800.0, 600.0),
            pointer: Vec2::new(400.0, 300.0),
        };
        assert_eq!(callback(&inputs), Some(UniformValue::Float(0.5)));
    }

    #[test]
    fn test_slider_shares_value_through_handle() {
        let slider = Slider::new(0.25);
        let handle = slider.handle();

        let mut graph = EffectGraph::new();
        let id = graph.add_node(Node::new(Arc::new(slider)));
        let program = compile(&graph, id, 0, DEFAULT_HISTORY_DEPTH).unwrap();
        let UpdateRule::EveryFrame(callback) = &program.uniforms.bindings()[0].rule else {
            panic!("slider must poll every frame");
        };
        let inputs = FrameInputs {
            time: 0.0,
            frame: 0,
            resolution: Vec2::ONE,
            pointer: Vec2::ZERO,
        };
        assert_eq!(callback(&inputs), Some(UniformValue::Float(0.25)));

        *handle.lock().unwrap() = 0.75;
        assert_eq!(callback(&inputs), Some(UniformValue::Float(0.75)));
    }

    #[test]
    fn test_action_port_never_connects() {
        let mut graph = EffectGraph::new();
        let feedback = graph.add_node(Node::new(Arc::new(Feedback)));
        let other = graph.add_node(Node::new(Arc::new(Feedback)));
        // No output kind can feed an Action input.
        let err = graph.connect(other, "color", feedback, "reset").unwrap_err();
        assert!(matches!(err, GraphError::KindMismatch { .. }));
    }
}
