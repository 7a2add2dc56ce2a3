//! Graph compilation - dependency resolution, code assembly, uniform binding,
//! and program building

pub mod assembler;
pub mod context;
pub mod program;
pub mod resolver;
pub mod snippets;

pub use assembler::{assemble, AssembledFunction};
pub use context::{
    CompileContext, FrameInputs, UniformBinding, UniformKind, UniformLayout, UniformTable,
    UniformValue, UpdateRule,
};
pub use program::{compile, ShaderProgram, DEFAULT_HISTORY_DEPTH};
pub use resolver::resolve;
