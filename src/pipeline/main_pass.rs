//! Lit opaque geometry pass

use crate::backend::{BackendResult, GraphicsBackend, SamplerHandle, TextureViewHandle};
use crate::resources::ShaderProgram;
use crate::scene::Scene;

use super::draw::DrawContext;
use super::shadow_pass::LightSpace;

/// Vertex program for lit geometry
pub const LIT_VERTEX_SHADER: &str = r#"
struct VertexUniforms {
    world: mat4x4<f32>,
    world_inverse_transpose: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_view: mat4x4<f32>,
    light_projection: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> uniforms: VertexUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
    @location(4) shadow_position: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world_position = uniforms.world * vec4<f32>(in.position, 1.0);

    var out: VertexOutput;
    out.clip_position = uniforms.projection * uniforms.view * world_position;
    out.world_position = world_position.xyz;
    out.normal = normalize((uniforms.world_inverse_transpose * vec4<f32>(in.normal, 0.0)).xyz);
    out.tangent = vec4<f32>(normalize((uniforms.world * vec4<f32>(in.tangent.xyz, 0.0)).xyz), in.tangent.w);
    out.uv = in.uv;
    out.shadow_position = uniforms.light_projection * uniforms.light_view * world_position;
    return out;
}
"#;

/// Pixel program for lit geometry: Blinn-Phong with albedo, normal, roughness
/// and metalness maps plus one shadow-casting light
pub const LIT_PIXEL_SHADER: &str = r#"
const MAX_LIGHTS: u32 = 16u;

struct LightData {
    // xyz = position, w = range
    position: vec4<f32>,
    // xyz = color, w = intensity
    color_intensity: vec4<f32>,
    // xyz = direction, w = light type (0=point, 1=spot, 2=directional)
    direction_type: vec4<f32>,
    // x = cos(inner_angle), y = cos(outer_angle)
    spot_params: vec4<f32>,
}

struct PixelUniforms {
    color_tint: vec3<f32>,
    roughness: f32,
    uv_scale: vec2<f32>,
    uv_offset: vec2<f32>,
    camera_position: vec3<f32>,
    light_count: i32,
    ambient: vec3<f32>,
    shadows_enabled: i32,
    lights: array<LightData, 16>,
}
@group(1) @binding(0) var<uniform> uniforms: PixelUniforms;
@group(1) @binding(1) var albedo: texture_2d<f32>;
@group(1) @binding(2) var normal_map: texture_2d<f32>;
@group(1) @binding(3) var roughness_map: texture_2d<f32>;
@group(1) @binding(4) var metalness_map: texture_2d<f32>;
@group(1) @binding(5) var basic_sampler: sampler;
@group(1) @binding(6) var shadow_map: texture_depth_2d;
@group(1) @binding(7) var shadow_sampler: sampler_comparison;

struct PixelInput {
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
    @location(4) shadow_position: vec4<f32>,
}

fn shade(
    light: LightData,
    world_position: vec3<f32>,
    normal: vec3<f32>,
    surface: vec3<f32>,
    metalness: f32,
    roughness: f32,
    view_dir: vec3<f32>,
) -> vec3<f32> {
    let light_type = u32(light.direction_type.w);
    var light_dir: vec3<f32>;
    var attenuation = 1.0;

    if light_type == 2u {
        light_dir = -normalize(light.direction_type.xyz);
    } else {
        let to_light = light.position.xyz - world_position;
        let distance = length(to_light);
        light_dir = to_light / max(distance, 0.0001);
        let falloff = saturate(1.0 - distance * distance / (light.position.w * light.position.w));
        attenuation = falloff * falloff;

        if light_type == 1u {
            let cos_angle = dot(-light_dir, normalize(light.direction_type.xyz));
            let inner = light.spot_params.x;
            let outer = light.spot_params.y;
            attenuation = attenuation * saturate((cos_angle - outer) / max(inner - outer, 0.0001));
        }
    }

    let n_dot_l = max(dot(normal, light_dir), 0.0);
    let diffuse = surface * (1.0 - metalness);

    let half_vec = normalize(light_dir + view_dir);
    let n_dot_h = max(dot(normal, half_vec), 0.0);
    let shininess = mix(256.0, 2.0, roughness);
    let specular_color = mix(vec3<f32>(0.04), surface, metalness);
    let specular = specular_color * pow(n_dot_h, shininess) * (1.0 - roughness) * f32(n_dot_l > 0.0);

    return (diffuse * n_dot_l + specular) * light.color_intensity.xyz * light.color_intensity.w * attenuation;
}

fn shadow_factor(shadow_position: vec4<f32>) -> f32 {
    let ndc = shadow_position.xyz / shadow_position.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    let lit = textureSampleCompareLevel(shadow_map, shadow_sampler, uv, ndc.z);
    let outside = any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z > 1.0;
    return select(lit, 1.0, outside || uniforms.shadows_enabled == 0);
}

@fragment
fn fs_main(in: PixelInput) -> @location(0) vec4<f32> {
    let uv = in.uv * uniforms.uv_scale + uniforms.uv_offset;

    let surface = textureSample(albedo, basic_sampler, uv).rgb * uniforms.color_tint;
    let roughness = textureSample(roughness_map, basic_sampler, uv).r * uniforms.roughness;
    let metalness = textureSample(metalness_map, basic_sampler, uv).r;

    let unpacked = textureSample(normal_map, basic_sampler, uv).rgb * 2.0 - 1.0;
    let n = normalize(in.normal);
    let t = normalize(in.tangent.xyz - n * dot(in.tangent.xyz, n));
    let b = cross(t, n) * in.tangent.w;
    let normal = normalize(mat3x3<f32>(t, b, n) * unpacked);

    let view_dir = normalize(uniforms.camera_position - in.world_position);
    let shadow = shadow_factor(in.shadow_position);

    var color = uniforms.ambient * surface;
    var shadowed = false;
    let count = min(u32(max(uniforms.light_count, 0)), MAX_LIGHTS);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = uniforms.lights[i];
        var contribution = shade(light, in.world_position, normal, surface, metalness, roughness, view_dir);
        // The shadow map belongs to the first directional light
        if !shadowed && u32(light.direction_type.w) == 2u {
            contribution = contribution * shadow;
            shadowed = true;
        }
        color = color + contribution;
    }

    return vec4<f32>(color, 1.0);
}
"#;

/// Frame-wide data pushed into every material before its entity draws
#[derive(Debug, Clone, Copy)]
pub struct MainPassInputs {
    pub light_space: LightSpace,
    pub shadow_map: TextureViewHandle,
    pub shadow_sampler: SamplerHandle,
    pub shadows_enabled: bool,
}

/// Draw every entity with its material, lights and shadow bindings, then the sky.
pub fn record_main_pass<B: GraphicsBackend>(
    ctx: &mut DrawContext<'_, B>,
    scene: &Scene,
    inputs: &MainPassInputs,
) -> BackendResult<()> {
    let camera = scene.active_camera();
    let lights = scene.lights.gpu_array();
    let light_count = scene.lights.uploaded_count() as i32;

    for entity in &scene.entities {
        {
            let material = entity.material().borrow();
            set_light_space(&mut material.vertex_program().borrow_mut(), &inputs.light_space);

            let mut ps = material.pixel_program().borrow_mut();
            ps.set_data("lights", bytemuck::cast_slice(&lights));
            ps.set_int("light_count", light_count);
            ps.set_float3("ambient", scene.ambient);
            ps.set_int("shadows_enabled", inputs.shadows_enabled as i32);
            ps.set_texture("shadow_map", inputs.shadow_map);
            ps.set_sampler("shadow_sampler", inputs.shadow_sampler);
        }
        entity.draw(ctx, camera)?;
    }

    if let Some(sky) = &scene.sky {
        sky.draw(ctx, camera)?;
    }
    Ok(())
}

fn set_light_space(program: &mut ShaderProgram, light: &LightSpace) {
    program.set_matrix4x4("light_view", light.view);
    program.set_matrix4x4("light_projection", light.projection);
}
