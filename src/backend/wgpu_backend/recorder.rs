//! Deferred render pass recording
//!
//! wgpu render passes borrow the encoder and every bound resource for their
//! whole lifetime, so pass commands are queued while the pass is open and
//! replayed into a real `wgpu::RenderPass` when it ends.

use std::ops::Range;

use crate::backend::traits::*;

use super::Slots;

#[derive(Debug, Clone)]
pub(super) enum PassCommand {
    Pipeline(RenderPipelineHandle),
    BindGroup {
        index: u32,
        group: BindGroupHandle,
        offsets: Vec<u32>,
    },
    VertexBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    },
    IndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        format: IndexFormat,
    },
    Viewport([f32; 6]),
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// A pass that has been opened but not yet encoded
#[derive(Debug)]
pub(super) struct OpenPass {
    pub descriptor: RenderPassDescriptor,
    pub commands: Vec<PassCommand>,
}

impl OpenPass {
    pub fn new(descriptor: &RenderPassDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            commands: Vec::new(),
        }
    }
}

/// Resource tables a replay reads from
pub(super) struct PassResources<'a> {
    pub pipelines: &'a Slots<wgpu::RenderPipeline>,
    pub bind_groups: &'a Slots<wgpu::BindGroup>,
    pub buffers: &'a Slots<wgpu::Buffer>,
}

/// Encode queued commands. Commands naming a destroyed resource are dropped.
pub(super) fn replay<'a>(
    pass: &mut wgpu::RenderPass<'a>,
    commands: &[PassCommand],
    resources: &PassResources<'a>,
) {
    for command in commands {
        match command {
            PassCommand::Pipeline(handle) => {
                if let Some(pipeline) = resources.pipelines.get(handle.0) {
                    pass.set_pipeline(pipeline);
                }
            }
            PassCommand::BindGroup {
                index,
                group,
                offsets,
            } => {
                if let Some(group) = resources.bind_groups.get(group.0) {
                    pass.set_bind_group(*index, group, offsets);
                }
            }
            PassCommand::VertexBuffer {
                slot,
                buffer,
                offset,
            } => {
                if let Some(buffer) = resources.buffers.get(buffer.0) {
                    pass.set_vertex_buffer(*slot, buffer.slice(*offset..));
                }
            }
            PassCommand::IndexBuffer {
                buffer,
                offset,
                format,
            } => {
                if let Some(buffer) = resources.buffers.get(buffer.0) {
                    pass.set_index_buffer(buffer.slice(*offset..), (*format).into());
                }
            }
            PassCommand::Viewport([x, y, width, height, min_depth, max_depth]) => {
                pass.set_viewport(*x, *y, *width, *height, *min_depth, *max_depth);
            }
            PassCommand::Draw {
                vertices,
                instances,
            } => pass.draw(vertices.clone(), instances.clone()),
            PassCommand::DrawIndexed {
                indices,
                base_vertex,
                instances,
            } => pass.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
        }
    }
}
