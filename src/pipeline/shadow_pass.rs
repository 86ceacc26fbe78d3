//! Directional-light shadow map pass

use glam::{Mat4, Vec3};

use crate::backend::{BackendResult, GraphicsBackend, TextureViewHandle};
use crate::resources::{ShaderError, ShaderProgram, ShaderStage, SharedProgram};
use crate::scene::Scene;
use crate::ShadowConfig;

use super::draw::DrawContext;
use super::postprocess::FULLSCREEN_VERTEX_SHADER;
use super::targets::{RenderTarget, INTERMEDIATE_FORMAT};

/// Depth-only vertex program: transforms positions into light clip space
pub const SHADOW_VERTEX_SHADER: &str = r#"
struct ShadowUniforms {
    world: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> uniforms: ShadowUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return uniforms.projection * uniforms.view * uniforms.world * vec4<f32>(position, 1.0);
}
"#;

/// Grey-scale copy of the shadow map depth, for display in the UI
pub const SHADOW_PREVIEW_PIXEL_SHADER: &str = r#"
@group(1) @binding(0) var shadow_map: texture_depth_2d;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(shadow_map));
    let texel = vec2<i32>(clamp(uv * size, vec2<f32>(0.0), size - 1.0));
    let depth = textureLoad(shadow_map, texel, 0);
    return vec4<f32>(vec3<f32>(depth), 1.0);
}
"#;

/// Edge length of the preview target
pub const SHADOW_PREVIEW_SIZE: u32 = 256;

/// Light-space matrices shared by the shadow and main passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub view: Mat4,
    pub projection: Mat4,
}

/// Renders every entity's depth from the shadow-casting light
#[derive(Debug)]
pub struct ShadowPass {
    program: SharedProgram,
    config: ShadowConfig,
}

impl ShadowPass {
    pub fn new<B: GraphicsBackend>(backend: &mut B, config: ShadowConfig) -> Result<Self, ShaderError> {
        let program = ShaderProgram::new(
            backend,
            "Shadow VS",
            ShaderStage::Vertex,
            SHADOW_VERTEX_SHADER,
        )?
        .shared();
        Ok(Self { program, config })
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn program(&self) -> &SharedProgram {
        &self.program
    }

    /// View and orthographic projection of a light shining along `direction`.
    ///
    /// The light sits `light_distance` units back from the origin along the
    /// reversed direction and looks toward it.
    pub fn light_space(&self, direction: Vec3) -> LightSpace {
        let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let position = -direction * self.config.light_distance;
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let half = self.config.projection_extent * 0.5;

        LightSpace {
            view: Mat4::look_to_lh(position, direction, up),
            projection: Mat4::orthographic_lh(
                -half,
                half,
                -half,
                half,
                self.config.near,
                self.config.far,
            ),
        }
    }

    /// Light space for the scene's first directional light, or the configured
    /// fallback direction when there is none
    pub fn scene_light_space(&self, scene: &Scene) -> LightSpace {
        let direction = scene
            .shadow_light_direction()
            .unwrap_or(self.config.fallback_direction);
        self.light_space(direction)
    }

    /// Draw every entity through the depth-only program; materials are skipped.
    pub fn record<B: GraphicsBackend>(
        &self,
        ctx: &mut DrawContext<'_, B>,
        scene: &Scene,
        light: &LightSpace,
    ) -> BackendResult<()> {
        let mut program = self.program.borrow_mut();
        program.set_matrix4x4("view", light.view);
        program.set_matrix4x4("projection", light.projection);

        for entity in &scene.entities {
            program.set_matrix4x4("world", entity.transform().world_matrix());
            program.commit(ctx)?;
            program.activate(ctx)?;
            ctx.draw_mesh(entity.mesh())?;
        }
        Ok(())
    }
}

/// Copies the shadow map into a small colour target the UI can show
#[derive(Debug)]
pub struct ShadowPreview {
    vertex_program: SharedProgram,
    pixel_program: SharedProgram,
    target: RenderTarget,
}

impl ShadowPreview {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Result<Self, ShaderError> {
        let vertex_program = ShaderProgram::new(
            backend,
            "Shadow Preview VS",
            ShaderStage::Vertex,
            FULLSCREEN_VERTEX_SHADER,
        )?
        .shared();
        let pixel_program = ShaderProgram::new(
            backend,
            "Shadow Preview PS",
            ShaderStage::Pixel,
            SHADOW_PREVIEW_PIXEL_SHADER,
        )?
        .shared();
        let target = RenderTarget::create(
            backend,
            "Shadow Preview",
            SHADOW_PREVIEW_SIZE,
            SHADOW_PREVIEW_SIZE,
            INTERMEDIATE_FORMAT,
        )?;
        Ok(Self {
            vertex_program,
            pixel_program,
            target,
        })
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Draw `shadow_map` over the whole preview target
    pub fn record<B: GraphicsBackend>(
        &self,
        ctx: &mut DrawContext<'_, B>,
        shadow_map: TextureViewHandle,
    ) -> BackendResult<()> {
        {
            let mut vs = self.vertex_program.borrow_mut();
            vs.commit(ctx)?;
            vs.activate(ctx)?;
        }
        {
            let mut ps = self.pixel_program.borrow_mut();
            ps.set_texture("shadow_map", shadow_map);
            ps.commit(ctx)?;
            ps.activate(ctx)?;
        }
        ctx.draw_fullscreen_triangle()
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        for program in [&self.vertex_program, &self.pixel_program] {
            program.borrow_mut().invalidate_bindings(backend);
        }
        self.target.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use glam::Vec4;

    #[test]
    fn test_light_looks_at_origin_from_distance() {
        let mut backend = HeadlessBackend::new(64, 64);
        let pass = ShadowPass::new(&mut backend, ShadowConfig::default()).unwrap();
        let light = pass.light_space(Vec3::new(1.0, -1.0, 1.0));

        // The origin sits straight ahead of the light at the configured distance
        let origin = light.view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(origin.x.abs() < 1e-4);
        assert!(origin.y.abs() < 1e-4);
        assert!((origin.z - 20.0).abs() < 1e-3);

        let clip = light.projection * origin;
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn test_vertical_light_has_valid_view() {
        let mut backend = HeadlessBackend::new(64, 64);
        let pass = ShadowPass::new(&mut backend, ShadowConfig::default()).unwrap();
        let light = pass.light_space(Vec3::NEG_Y);
        assert!(light.view.is_finite());
    }
}
