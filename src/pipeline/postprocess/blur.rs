//! Box blur

use crate::resources::ShaderProgram;

/// Averages a square of `(2 * blur_radius + 1)^2` texels around each pixel
pub const BLUR_PIXEL_SHADER: &str = r#"
struct BlurUniforms {
    pixel_width: f32,
    pixel_height: f32,
    blur_radius: i32,
}
@group(1) @binding(0) var<uniform> uniforms: BlurUniforms;
@group(1) @binding(1) var pixels: texture_2d<f32>;
@group(1) @binding(2) var clamp_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let radius = max(uniforms.blur_radius, 0);
    let texel = vec2<f32>(uniforms.pixel_width, uniforms.pixel_height);

    var total = vec4<f32>(0.0);
    var samples = 0.0;
    for (var y = -radius; y <= radius; y = y + 1) {
        for (var x = -radius; x <= radius; x = x + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            total = total + textureSampleLevel(pixels, clamp_sampler, uv + offset, 0.0);
            samples = samples + 1.0;
        }
    }
    return total / samples;
}
"#;

/// Largest radius exposed to tools
pub const MAX_BLUR_RADIUS: i32 = 25;

/// Write blur parameters for a `width` x `height` output
pub fn apply_blur(program: &mut ShaderProgram, radius: i32, width: u32, height: u32) {
    program.set_float("pixel_width", 1.0 / width.max(1) as f32);
    program.set_float("pixel_height", 1.0 / height.max(1) as f32);
    program.set_int("blur_radius", radius.clamp(0, MAX_BLUR_RADIUS));
}
