//! Cubemap sky box

use std::rc::Rc;

use crate::backend::{BackendResult, GraphicsBackend, SamplerHandle};
use crate::pipeline::{DrawContext, PipelineState};
use crate::resources::{GpuMesh, GpuTexture, SharedProgram};

use super::camera::Camera;

/// Vertex program for the sky: strips the view translation and pushes every
/// vertex to the far plane.
pub const SKY_VERTEX_SHADER: &str = r#"
struct SkyUniforms {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> uniforms: SkyUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) sample_dir: vec3<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var view_no_translation = uniforms.view;
    view_no_translation[3] = vec4<f32>(0.0, 0.0, 0.0, 1.0);

    let clip = uniforms.projection * view_no_translation * vec4<f32>(in.position, 1.0);

    var out: VertexOutput;
    out.clip_position = clip.xyww;
    out.sample_dir = in.position;
    return out;
}
"#;

/// Pixel program for the sky: samples the cubemap along the view direction.
pub const SKY_PIXEL_SHADER: &str = r#"
@group(1) @binding(0) var sky_cube: texture_cube<f32>;
@group(1) @binding(1) var sky_sampler: sampler;

@fragment
fn fs_main(@location(0) sample_dir: vec3<f32>) -> @location(0) vec4<f32> {
    return textureSample(sky_cube, sky_sampler, normalize(sample_dir));
}
"#;

/// Sky drawn after opaque geometry where depth is still at the far plane
#[derive(Debug)]
pub struct Sky {
    mesh: Rc<GpuMesh>,
    cubemap: GpuTexture,
    sampler: SamplerHandle,
    vertex_program: SharedProgram,
    pixel_program: SharedProgram,
}

impl Sky {
    pub fn new(
        mesh: Rc<GpuMesh>,
        cubemap: GpuTexture,
        sampler: SamplerHandle,
        vertex_program: SharedProgram,
        pixel_program: SharedProgram,
    ) -> Self {
        Self {
            mesh,
            cubemap,
            sampler,
            vertex_program,
            pixel_program,
        }
    }

    pub fn cubemap(&self) -> &GpuTexture {
        &self.cubemap
    }

    /// Draw with a LessEqual depth test and no depth writes, then restore the
    /// context's previous state.
    pub fn draw<B: GraphicsBackend>(
        &self,
        ctx: &mut DrawContext<'_, B>,
        camera: &Camera,
    ) -> BackendResult<()> {
        let previous = ctx.state();
        let Some(color_format) = previous.color_format else {
            return Ok(());
        };

        {
            let mut vs = self.vertex_program.borrow_mut();
            vs.set_matrix4x4("view", camera.view_matrix());
            vs.set_matrix4x4("projection", camera.projection_matrix());
            vs.commit(ctx)?;
            vs.activate(ctx)?;
        }
        {
            let mut ps = self.pixel_program.borrow_mut();
            ps.set_texture("sky_cube", self.cubemap.view);
            ps.set_sampler("sky_sampler", self.sampler);
            ps.commit(ctx)?;
            ps.activate(ctx)?;
        }

        ctx.set_state(PipelineState::sky(color_format));
        let result = ctx.draw_mesh(&self.mesh);
        ctx.set_state(previous);
        result
    }
}
