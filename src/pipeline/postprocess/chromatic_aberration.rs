//! Chromatic aberration

use crate::resources::ShaderProgram;

/// Samples each color channel at its own horizontal offset
pub const CHROMATIC_ABERRATION_PIXEL_SHADER: &str = r#"
struct ChromaticUniforms {
    pixel_width: f32,
    pixel_height: f32,
    red_offset: f32,
    green_offset: f32,
    blue_offset: f32,
}
@group(1) @binding(0) var<uniform> uniforms: ChromaticUniforms;
@group(1) @binding(1) var pixels: texture_2d<f32>;
@group(1) @binding(2) var clamp_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    // Push channels apart radially, stronger toward the edges
    let from_center = (uv - vec2<f32>(0.5)) * 2.0;
    let red = textureSampleLevel(pixels, clamp_sampler, uv + from_center * uniforms.red_offset, 0.0).r;
    let green = textureSampleLevel(pixels, clamp_sampler, uv + from_center * uniforms.green_offset, 0.0).g;
    let blue = textureSampleLevel(pixels, clamp_sampler, uv + from_center * uniforms.blue_offset, 0.0).b;
    return vec4<f32>(red, green, blue, 1.0);
}
"#;

/// Channel offsets in UV units at the screen edge
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelOffsets {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

pub fn apply_chromatic_aberration(
    program: &mut ShaderProgram,
    offsets: ChannelOffsets,
    width: u32,
    height: u32,
) {
    program.set_float("pixel_width", 1.0 / width.max(1) as f32);
    program.set_float("pixel_height", 1.0 / height.max(1) as f32);
    program.set_float("red_offset", offsets.red);
    program.set_float("green_offset", offsets.green);
    program.set_float("blue_offset", offsets.blue);
}
