//! Shared fixtures for the headless integration tests.

#![allow(dead_code)]

use glam::Vec3;

use forward_renderer::backend::{
    BackendResult, ColorAttachment, GraphicsBackend, HeadlessBackend, LoadOp, RecordedCommand,
    RenderPassDescriptor, StoreOp, TextureViewHandle,
};
use forward_renderer::pipeline::{UiOverlay, LIT_PIXEL_SHADER, LIT_VERTEX_SHADER};
use forward_renderer::resources::{Material, Mesh, ShaderStage, SharedMaterial};
use forward_renderer::scene::{Camera, Entity, Light};
use forward_renderer::{Engine, EngineConfig};

/// Overlay that opens a load pass on its target so it shows up in the command log
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub targets: Vec<TextureViewHandle>,
}

impl UiOverlay<HeadlessBackend> for RecordingOverlay {
    fn render(
        &mut self,
        backend: &mut HeadlessBackend,
        target: TextureViewHandle,
        _width: u32,
        _height: u32,
    ) -> BackendResult<()> {
        self.targets.push(target);
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("UI Overlay".into()),
            color_attachments: vec![ColorAttachment {
                view: target,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        backend.end_render_pass();
        Ok(())
    }
}

/// Engine over a headless surface
pub fn engine(width: u32, height: u32, config: EngineConfig) -> Engine<HeadlessBackend> {
    let backend = HeadlessBackend::new(width, height);
    let camera = Camera::new(width as f32 / height as f32, Vec3::new(0.0, 2.0, -10.0));
    Engine::new(backend, config, camera).unwrap()
}

/// Lit material with no textures bound
pub fn lit_material(engine: &mut Engine<HeadlessBackend>, name: &str) -> SharedMaterial {
    let vs = engine
        .create_program("Lit VS", ShaderStage::Vertex, LIT_VERTEX_SHADER)
        .unwrap();
    let ps = engine
        .create_program("Lit PS", ShaderStage::Pixel, LIT_PIXEL_SHADER)
        .unwrap();
    let material = Material::new(name, vs, ps, Vec3::ONE, 0.5).shared();
    engine.scene_mut().add_material(material)
}

/// One directional light and `count` cubes in a row sharing a material
pub fn populate(engine: &mut Engine<HeadlessBackend>, count: usize) -> SharedMaterial {
    engine
        .scene_mut()
        .lights
        .push(Light::directional(Vec3::new(1.0, -1.0, 1.0), Vec3::ONE, 1.0));

    let material = lit_material(engine, "Shared");
    let cube = engine.upload_mesh(&Mesh::cube()).unwrap();
    for i in 0..count {
        let mut entity = Entity::new(&format!("Cube {i}"), cube.clone(), material.clone());
        entity
            .transform_mut()
            .set_position(Vec3::new(i as f32 * 3.0, 0.0, 0.0));
        engine.scene_mut().add_entity(entity);
    }
    material
}

/// Views bound by every render pass, colour attachment first, else depth
pub fn pass_targets(commands: &[RecordedCommand]) -> Vec<TextureViewHandle> {
    commands
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::BeginRenderPass { color, depth, .. } => {
                color.first().copied().or(*depth)
            }
            _ => None,
        })
        .collect()
}

/// Number of draw commands recorded
pub fn draw_calls(commands: &[RecordedCommand]) -> u32 {
    commands
        .iter()
        .filter(|command| {
            matches!(
                command,
                RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }
            )
        })
        .count() as u32
}
