//! Graphics backend integration - device plumbing, program linking, and the
//! frame history ring buffer

pub mod context;
pub mod history;
pub mod pipeline;

pub use context::GpuContext;
pub use history::{FrameHistory, RingCursor};
pub use pipeline::LinkedProgram;
