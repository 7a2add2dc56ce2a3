//! Linking compiled programs against the graphics backend
//!
//! A [`LinkedProgram`] owns everything one compiled program needs to draw:
//! the render pipeline, the bind group over globals/history/params, and the
//! packed params buffer with its CPU mirror. Validation failures surface as
//! [`BuildError::Link`] with the full generated source retained; the caller
//! keeps the previous linked program alive so output never goes blank on a
//! bad edit.

use log::warn;

use crate::compile::context::{FrameInputs, UniformBinding, UpdateRule};
use crate::compile::program::{
    ShaderProgram, GLOBALS_BINDING, HISTORY_BINDING, PARAMS_BINDING, SAMPLER_BINDING,
};
use crate::error::BuildError;
use crate::gpu::context::GpuContext;
use crate::gpu::history::FrameHistory;

/// Ambient values pushed to every program each frame. Layout mirrors the
/// generated `Globals` structure.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    time: f32,
    frame: u32,
    cursor: u32,
    depth: u32,
    resolution: [f32; 2],
    pointer: [f32; 2],
}

/// A successfully linked program, ready to draw.
pub struct LinkedProgram {
    program: ShaderProgram,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    globals_buffer: wgpu::Buffer,
    params_buffer: Option<wgpu::Buffer>,
    /// CPU mirror of the params buffer; skipped uniform updates keep their
    /// previous bytes here.
    params_data: Vec<u8>,
}

impl LinkedProgram {
    /// Build pipeline, buffers, and bind group for `program`, validating the
    /// generated source against the backend.
    pub fn link(
        gpu: &GpuContext,
        program: ShaderProgram,
        history: &FrameHistory,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, BuildError> {
        let device = &gpu.device;

        // Capture validation errors instead of letting them hit the global
        // handler; the generated source travels with the failure.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("generated patch shader"),
            source: wgpu::ShaderSource::Wgsl(program.source.as_str().into()),
        });

        let mut layout_entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: GLOBALS_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: HISTORY_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        if program.layout.size > 0 {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: PARAMS_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("patch bind group layout"),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("patch pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("patch pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(BuildError::Link {
                message: error.to_string(),
                source_text: program.source,
            });
        }

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Seed the CPU mirror with every upload-once literal; per-frame
        // bindings start zeroed and fill in on the first tick.
        let mut params_data = vec![0u8; program.layout.size as usize];
        for (binding, &offset) in program
            .uniforms
            .bindings()
            .iter()
            .zip(&program.layout.offsets)
        {
            if let UpdateRule::Once(value) = &binding.rule {
                if value.kind() == binding.kind {
                    value.write_bytes(&mut params_data[offset as usize..]);
                }
            }
        }

        let params_buffer = if program.layout.size > 0 {
            Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("params buffer"),
                size: program.layout.size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }))
        } else {
            None
        };

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("history sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let mut bind_entries = vec![
            wgpu::BindGroupEntry {
                binding: GLOBALS_BINDING,
                resource: globals_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: HISTORY_BINDING,
                resource: wgpu::BindingResource::TextureView(history.view()),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ];
        if let Some(buffer) = &params_buffer {
            bind_entries.push(wgpu::BindGroupEntry {
                binding: PARAMS_BINDING,
                resource: buffer.as_entire_binding(),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("patch bind group"),
            layout: &bind_group_layout,
            entries: &bind_entries,
        });

        Ok(Self {
            program,
            pipeline,
            bind_group,
            globals_buffer,
            params_buffer,
            params_data,
        })
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Push globals and poll every per-frame uniform callback in table order.
    /// A callback returning `None` or a wrongly typed value is a runtime gap:
    /// that uniform keeps its previous value and the frame still renders.
    pub fn push_uniforms(&mut self, queue: &wgpu::Queue, inputs: &FrameInputs, cursor: u32) {
        let globals = Globals {
            time: inputs.time,
            frame: inputs.frame as u32,
            cursor,
            depth: self.program.history_depth,
            resolution: inputs.resolution.into(),
            pointer: inputs.pointer.into(),
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let Some(params_buffer) = &self.params_buffer else {
            return;
        };
        poll_frame_bindings(
            self.program.uniforms.bindings(),
            &self.program.layout.offsets,
            inputs,
            &mut self.params_data,
        );
        queue.write_buffer(params_buffer, 0, &self.params_data);
    }

    /// Issue one full-surface pass with the linked pipeline.
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("patch pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Poll every per-frame rule in table order, refreshing the CPU mirror in
/// place. A callback returning `None`, or a value whose kind does not match
/// the registered slot, leaves that uniform's previous bytes untouched; a
/// mismatched kind must never write, since its byte width differs from the
/// slot's.
fn poll_frame_bindings(
    bindings: &[UniformBinding],
    offsets: &[u32],
    inputs: &FrameInputs,
    data: &mut [u8],
) {
    for (binding, &offset) in bindings.iter().zip(offsets) {
        let UpdateRule::EveryFrame(callback) = &binding.rule else {
            continue;
        };
        match callback(inputs) {
            Some(value) if value.kind() == binding.kind => {
                value.write_bytes(&mut data[offset as usize..]);
            }
            Some(value) => warn!(
                "uniform '{}' produced a {:?} for a {:?} slot, keeping previous value",
                binding.name,
                value.kind(),
                binding.kind
            ),
            None => warn!(
                "uniform '{}' unavailable this frame, keeping previous value",
                binding.name
            ),
        }
    }
}
