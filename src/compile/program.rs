//! Program building - preamble, snippets, functions, and entry point
//!
//! Concatenates the fixed preamble (ambient inputs and ring-buffer metadata),
//! the deduplicated snippet set, every assembled function in resolver order,
//! and a fixed fullscreen entry point that calls the sink function and writes
//! the result. The output is plain WGSL text plus the uniform table; linking
//! against the graphics backend happens in the gpu module so this stage stays
//! pure and byte-for-byte deterministic.

use log::debug;

use crate::compile::assembler::{assemble, AssembledFunction};
use crate::compile::context::{CompileContext, UniformLayout, UniformTable};
use crate::compile::resolver::resolve;
use crate::compile::snippets::snippet_source;
use crate::error::GraphError;
use crate::graph::graph::EffectGraph;
use crate::graph::node::NodeId;
use crate::graph::port::{PortId, PortKind};

/// Default ring-buffer depth baked into programs that do not override it.
pub const DEFAULT_HISTORY_DEPTH: u32 = 4;

/// Bind group index used by every generated program.
pub const BIND_GROUP: u32 = 0;
/// Binding slots within the group.
pub const GLOBALS_BINDING: u32 = 0;
pub const HISTORY_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;
pub const PARAMS_BINDING: u32 = 3;

/// A compiled but not yet linked shader program.
pub struct ShaderProgram {
    /// Complete WGSL source.
    pub source: String,
    /// Uniform binding table consumed by the runtime every frame.
    pub uniforms: UniformTable,
    /// Byte layout of the packed params buffer.
    pub layout: UniformLayout,
    /// Ring-buffer depth baked into the generated index arithmetic. The
    /// frame-history storage must be allocated with the same depth.
    pub history_depth: u32,
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("source_len", &self.source.len())
            .field("uniforms", &self.uniforms.len())
            .field("history_depth", &self.history_depth)
            .finish()
    }
}

/// Compile the subgraph feeding `(sink, sink_output)` into a shader program.
///
/// Recompiling an unchanged graph produces byte-identical source: resolver
/// order is declaration-driven, uniform order follows generation order, and
/// snippets keep first-request order.
pub fn compile(
    graph: &EffectGraph,
    sink: NodeId,
    sink_output: PortId,
    history_depth: u32,
) -> Result<ShaderProgram, GraphError> {
    let order = resolve(graph, sink, sink_output)?;
    let mut ctx = CompileContext::new(graph);
    let functions = assemble(&order, &mut ctx)?;

    let sink_node = graph.node(sink)?;
    let sink_kind = sink_node
        .definition
        .outputs()
        .get(sink_output)
        .map(|def| def.kind)
        .ok_or_else(|| GraphError::UnknownPort {
            node: sink,
            port: sink_output.to_string(),
        })?;

    // The sink may itself be an inline constant with no assembled function.
    let sink_expr = match ctx.function_name(sink, sink_output) {
        Some(name) => format!("{}(p)", name),
        None => sink_node
            .definition
            .inline_expr(graph, sink_node, sink_output)
            .ok_or(GraphError::UnresolvedDependency {
                node: sink,
                output: sink_output,
            })?,
    };

    let layout = ctx.uniforms.layout();
    let source = emit_source(&ctx, &functions, &sink_expr, sink_kind, history_depth);
    debug!(
        "compiled program: {} functions, {} uniforms, {} bytes of WGSL",
        functions.len(),
        ctx.uniforms.len(),
        source.len()
    );

    Ok(ShaderProgram {
        source,
        uniforms: ctx.uniforms,
        layout,
        history_depth,
    })
}

fn emit_source(
    ctx: &CompileContext<'_>,
    functions: &[AssembledFunction],
    sink_expr: &str,
    sink_kind: PortKind,
    history_depth: u32,
) -> String {
    let mut out = String::with_capacity(4096);

    // Fixed preamble: ambient inputs plus ring-buffer metadata. The depth is
    // baked as a shader constant so layer arithmetic folds at shader-compile
    // time; globals.depth carries the same value for snippet use.
    out.push_str("// generated by shadegraph\n\n");
    out.push_str(&format!(
        "const HISTORY_DEPTH: u32 = {}u;\n\n",
        history_depth
    ));
    out.push_str(
        "struct Globals {\n\
         \x20   time: f32,\n\
         \x20   frame: u32,\n\
         \x20   cursor: u32,\n\
         \x20   depth: u32,\n\
         \x20   resolution: vec2<f32>,\n\
         \x20   pointer: vec2<f32>,\n\
         }\n\n",
    );
    out.push_str(&format!(
        "@group({BIND_GROUP}) @binding({GLOBALS_BINDING}) var<uniform> globals: Globals;\n"
    ));
    out.push_str(&format!(
        "@group({BIND_GROUP}) @binding({HISTORY_BINDING}) var history: texture_2d_array<f32>;\n"
    ));
    out.push_str(&format!(
        "@group({BIND_GROUP}) @binding({SAMPLER_BINDING}) var history_sampler: sampler;\n"
    ));

    if !ctx.uniforms.is_empty() {
        out.push_str("\nstruct Params {\n");
        for binding in ctx.uniforms.bindings() {
            out.push_str(&format!(
                "    {}: {},\n",
                binding.name,
                binding.kind.wgsl_type()
            ));
        }
        out.push_str("}\n");
        out.push_str(&format!(
            "@group({BIND_GROUP}) @binding({PARAMS_BINDING}) var<uniform> params: Params;\n"
        ));
    }
    out.push('\n');

    // Shared library snippets, deduplicated by identity.
    for id in ctx.snippets() {
        if let Some(src) = snippet_source(id) {
            out.push_str(src);
            out.push('\n');
        }
    }

    // Assembled functions in resolver order.
    for function in functions {
        out.push_str(&function.source);
        if !function.source.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }

    // Fixed entry point: fullscreen triangle, centered aspect-correct world
    // coordinate with +y up, sink call writes the fragment.
    out.push_str(
        "@vertex\n\
         fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {\n\
         \x20   var corners = array<vec2<f32>, 3>(\n\
         \x20       vec2<f32>(-1.0, -1.0),\n\
         \x20       vec2<f32>(3.0, -1.0),\n\
         \x20       vec2<f32>(-1.0, 3.0),\n\
         \x20   );\n\
         \x20   return vec4<f32>(corners[index], 0.0, 1.0);\n\
         }\n\n",
    );
    out.push_str(
        "@fragment\n\
         fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {\n\
         \x20   let res = globals.resolution;\n\
         \x20   var p = (frag_coord.xy - 0.5 * res) / res.y;\n\
         \x20   p.y = -p.y;\n",
    );
    match sink_kind {
        PortKind::Color => {
            out.push_str(&format!("    return {};\n", sink_expr));
        }
        _ => {
            out.push_str(&format!("    let v = {};\n", sink_expr));
            out.push_str("    return vec4<f32>(v, v, v, 1.0);\n");
        }
    }
    out.push_str("}\n");

    out
}
