//! The runtime update loop
//!
//! Owns the effect graph, the linked program, the offscreen render target, and
//! the frame history ring buffer. Each tick runs the fixed sequence
//! `PushUniforms -> Draw -> AdvanceRingBuffer`; structural graph edits mark the
//! runtime dirty and the resulting recompile is applied atomically between
//! ticks. A failed compile or link leaves the last successfully linked program
//! rendering, so output degrades to the last good frame instead of going
//! black.

use std::time::Instant;

use glam::Vec2;
use log::{info, warn};

use crate::compile::context::FrameInputs;
use crate::compile::program::compile;
use crate::error::{BuildError, CompileError};
use crate::gpu::context::GpuContext;
use crate::gpu::history::FrameHistory;
use crate::gpu::pipeline::LinkedProgram;
use crate::graph::graph::EffectGraph;
use crate::graph::node::NodeId;
use crate::graph::port::PortId;

/// Real-time renderer for one effect graph.
pub struct Runtime {
    gpu: GpuContext,
    graph: EffectGraph,
    sink: Option<(NodeId, PortId)>,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    history: FrameHistory,
    linked: Option<LinkedProgram>,
    /// Swapped in at the next tick boundary, never mid-frame.
    pending: Option<LinkedProgram>,
    dirty: bool,
    started: Instant,
    pointer: Vec2,
    size: (u32, u32),
}

impl Runtime {
    pub fn new(gpu: GpuContext, width: u32, height: u32, history_depth: u32) -> Self {
        let target = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FrameHistory::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let history = FrameHistory::new(&gpu.device, width, height, history_depth);

        Self {
            gpu,
            graph: EffectGraph::new(),
            sink: None,
            target,
            target_view,
            history,
            linked: None,
            pending: None,
            dirty: false,
            started: Instant::now(),
            pointer: Vec2::ZERO,
            size: (width, height),
        }
    }

    pub fn graph(&self) -> &EffectGraph {
        &self.graph
    }

    /// Mutable graph access for edits. Any edit may affect compiled structure,
    /// so this marks the runtime dirty; the recompile happens between ticks.
    pub fn edit(&mut self) -> &mut EffectGraph {
        self.dirty = true;
        &mut self.graph
    }

    /// Designate the sink output whose subgraph gets compiled.
    pub fn set_sink(&mut self, node: NodeId, output: PortId) {
        self.sink = Some((node, output));
        self.dirty = true;
    }

    /// Latest polled pointer position in pixels.
    pub fn set_pointer(&mut self, position: Vec2) {
        self.pointer = position;
    }

    /// The currently linked program, if any compile has succeeded yet.
    pub fn linked(&self) -> Option<&LinkedProgram> {
        self.linked.as_ref()
    }

    /// Compile and link the current graph, staging the result for the next
    /// tick boundary. A graph edit arriving mid-compile simply re-marks the
    /// runtime dirty; only the latest requested compile ever matters.
    pub fn recompile(&mut self) -> Result<(), CompileError> {
        self.dirty = false;
        let Some((sink, output)) = self.sink else {
            self.pending = None;
            self.linked = None;
            return Ok(());
        };

        let program = compile(&self.graph, sink, output, self.history.cursor().depth())?;
        let linked = LinkedProgram::link(&self.gpu, program, &self.history, FrameHistory::FORMAT)?;
        info!(
            "program linked: {} uniforms, staged for next tick",
            linked.program().uniforms.len()
        );
        self.pending = Some(linked);
        Ok(())
    }

    /// Run one tick: apply any staged program, push uniforms, draw, record
    /// the frame into the ring buffer, advance the cursor.
    pub fn tick(&mut self) {
        if self.dirty {
            if let Err(err) = self.recompile() {
                // Non-fatal to the running program: keep drawing the last
                // successfully linked one.
                warn!("recompile failed, keeping last good program: {}", err);
            }
        }
        if let Some(next) = self.pending.take() {
            self.linked = Some(next);
        }
        let Some(linked) = self.linked.as_mut() else {
            return;
        };

        let cursor = self.history.cursor();
        let inputs = FrameInputs {
            time: self.started.elapsed().as_secs_f32(),
            frame: cursor.frame(),
            resolution: Vec2::new(self.size.0 as f32, self.size.1 as f32),
            pointer: self.pointer,
        };
        linked.push_uniforms(&self.gpu.queue, &inputs, cursor.write_slot());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tick encoder"),
            });
        linked.draw(&mut encoder, &self.target_view);
        self.history.record(&mut encoder, &self.target);
        self.gpu.queue.submit([encoder.finish()]);
    }

    /// Read the most recently drawn frame back as tightly packed RGBA bytes.
    /// Intended for headless inspection and tests, not the steady-state loop.
    pub fn read_frame(&self) -> Result<Vec<u8>, BuildError> {
        let (width, height) = self.size;
        let bytes_per_row = (width * 4).div_ceil(256) * 256;
        let buffer = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit([encoder.finish()]);

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.gpu
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| BuildError::Readback(err.to_string()))?;
        receiver
            .recv()
            .map_err(|err| BuildError::Readback(err.to_string()))?
            .map_err(|err| BuildError::Readback(err.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + (width * 4) as usize]);
        }
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }
}
