//! Material definitions

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::backend::{SamplerHandle, TextureViewHandle};

use super::shader::SharedProgram;

/// A vertex/pixel program pair with surface parameters and named resources.
///
/// Texture and sampler names must match the pixel program's globals; names the
/// program does not declare are kept but have no effect.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    vertex_program: SharedProgram,
    pixel_program: SharedProgram,
    pub color_tint: Vec3,
    /// 0 is shiny, 1 is rough
    roughness: f32,
    pub uv_scale: Vec2,
    pub uv_offset: Vec2,
    textures: BTreeMap<String, TextureViewHandle>,
    samplers: BTreeMap<String, SamplerHandle>,
}

/// Material handle shared by entities; edits are visible to every holder
pub type SharedMaterial = Rc<RefCell<Material>>;

impl Material {
    pub fn new(
        name: &str,
        vertex_program: SharedProgram,
        pixel_program: SharedProgram,
        color_tint: Vec3,
        roughness: f32,
    ) -> Self {
        Self {
            name: name.to_string(),
            vertex_program,
            pixel_program,
            color_tint,
            roughness: roughness.clamp(0.0, 1.0),
            uv_scale: Vec2::ONE,
            uv_offset: Vec2::ZERO,
            textures: BTreeMap::new(),
            samplers: BTreeMap::new(),
        }
    }

    pub fn with_uv(mut self, scale: Vec2, offset: Vec2) -> Self {
        self.uv_scale = scale;
        self.uv_offset = offset;
        self
    }

    pub fn with_texture(mut self, name: &str, view: TextureViewHandle) -> Self {
        self.add_texture(name, view);
        self
    }

    pub fn with_sampler(mut self, name: &str, sampler: SamplerHandle) -> Self {
        self.add_sampler(name, sampler);
        self
    }

    /// Wrap into a shared handle
    pub fn shared(self) -> SharedMaterial {
        Rc::new(RefCell::new(self))
    }

    pub fn vertex_program(&self) -> &SharedProgram {
        &self.vertex_program
    }

    pub fn pixel_program(&self) -> &SharedProgram {
        &self.pixel_program
    }

    pub fn set_vertex_program(&mut self, program: SharedProgram) {
        self.vertex_program = program;
    }

    pub fn set_pixel_program(&mut self, program: SharedProgram) {
        self.pixel_program = program;
    }

    pub fn roughness(&self) -> f32 {
        self.roughness
    }

    /// Clamped to [0, 1]
    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(0.0, 1.0);
    }

    pub fn add_texture(&mut self, name: &str, view: TextureViewHandle) {
        self.textures.insert(name.to_string(), view);
    }

    pub fn add_sampler(&mut self, name: &str, sampler: SamplerHandle) {
        self.samplers.insert(name.to_string(), sampler);
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, TextureViewHandle)> {
        self.textures.iter().map(|(name, view)| (name.as_str(), *view))
    }

    pub fn samplers(&self) -> impl Iterator<Item = (&str, SamplerHandle)> {
        self.samplers.iter().map(|(name, sampler)| (name.as_str(), *sampler))
    }

    /// Write surface parameters and the camera position into the pixel
    /// program's pending block and bind every named texture and sampler.
    pub fn prepare(&self, camera_position: Vec3) {
        let mut ps = self.pixel_program.borrow_mut();
        ps.set_float3("color_tint", self.color_tint);
        ps.set_float("roughness", self.roughness);
        ps.set_float2("uv_scale", self.uv_scale);
        ps.set_float2("uv_offset", self.uv_offset);
        ps.set_float3("camera_position", camera_position);

        for (name, view) in &self.textures {
            ps.set_texture(name, *view);
        }
        for (name, sampler) in &self.samplers {
            ps.set_sampler(name, *sampler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::pipeline::{LIT_PIXEL_SHADER, LIT_VERTEX_SHADER};
    use crate::resources::{ShaderProgram, ShaderStage};

    fn material(backend: &mut HeadlessBackend, roughness: f32) -> Material {
        let vs = ShaderProgram::new(backend, "Lit VS", ShaderStage::Vertex, LIT_VERTEX_SHADER)
            .unwrap()
            .shared();
        let ps = ShaderProgram::new(backend, "Lit PS", ShaderStage::Pixel, LIT_PIXEL_SHADER)
            .unwrap()
            .shared();
        Material::new("Test", vs, ps, Vec3::ONE, roughness)
    }

    #[test]
    fn test_roughness_stays_in_unit_range() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut material = material(&mut backend, 1.5);
        assert_eq!(material.roughness(), 1.0);

        material.set_roughness(-0.25);
        assert_eq!(material.roughness(), 0.0);

        material.prepare(Vec3::ZERO);
        let ps = material.pixel_program().borrow();
        let field = ps.uniform_field("roughness").unwrap();
        let offset = field.offset as usize;
        let written: f32 = bytemuck::pod_read_unaligned(&ps.pending_data()[offset..offset + 4]);
        assert_eq!(written, 0.0);
    }
}
