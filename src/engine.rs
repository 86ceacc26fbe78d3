//! Main engine orchestrator

use std::collections::VecDeque;
use std::rc::Rc;

use glam::Vec3;

use crate::backend::{GraphicsBackend, SamplerDescriptor, SamplerHandle};
use crate::error::EngineResult;
use crate::pipeline::{FramePipeline, FrameReport, UiOverlay};
use crate::resources::{
    CubemapData, GpuMesh, GpuTexture, Mesh, ShaderProgram, ShaderStage, SharedProgram, TextureData,
};
use crate::scene::{Camera, InputState, Scene, Sky, SKY_PIXEL_SHADER, SKY_VERTEX_SHADER};
use crate::EngineConfig;

const FPS_WINDOW: usize = 60;

/// Frame timing with an FPS averaged over the last 60 frames
#[derive(Debug, Clone)]
pub struct FrameTiming {
    pub delta: f32,
    pub total: f32,
    pub frame_count: u64,
    recent: VecDeque<f32>,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            delta: 0.0,
            total: 0.0,
            frame_count: 0,
            recent: VecDeque::with_capacity(FPS_WINDOW),
        }
    }
}

impl FrameTiming {
    pub fn advance(&mut self, dt: f32) {
        self.delta = dt;
        self.total += dt;
        self.frame_count += 1;
        if self.recent.len() >= FPS_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(dt);
    }

    pub fn fps(&self) -> f32 {
        let sum: f32 = self.recent.iter().sum();
        if sum > 0.0 {
            self.recent.len() as f32 / sum
        } else {
            0.0
        }
    }
}

/// Owns the backend, the scene and the frame pipeline
pub struct Engine<B: GraphicsBackend> {
    backend: B,
    scene: Scene,
    pipeline: FramePipeline,
    config: EngineConfig,
    timing: FrameTiming,
    width: u32,
    height: u32,
    last_report: Option<FrameReport>,
}

impl<B: GraphicsBackend> Engine<B> {
    /// Create the frame pipeline for the backend's surface and a scene viewed
    /// through `camera`.
    pub fn new(mut backend: B, config: EngineConfig, camera: Camera) -> EngineResult<Self> {
        backend.set_vsync(config.vsync);
        let pipeline = FramePipeline::new(&mut backend, &config)?;
        let (width, height) = backend.surface_size();

        let mut scene = Scene::new(camera);
        scene.update_projections(width as f32 / height.max(1) as f32);

        log::info!("Engine created at {}x{} (vsync: {})", width, height, config.vsync);

        Ok(Self {
            backend,
            scene,
            pipeline,
            config,
            timing: FrameTiming::default(),
            width,
            height,
            last_report: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut FramePipeline {
        &mut self.pipeline
    }

    /// Keep a colour copy of the shadow map each frame, see
    /// [`FramePipeline::shadow_preview_view`]
    pub fn set_shadow_preview(&mut self, enabled: bool) -> EngineResult<()> {
        self.pipeline.set_shadow_preview(&mut self.backend, enabled)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Report of the most recent successful frame
    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    pub fn vsync(&self) -> bool {
        self.backend.vsync()
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.vsync = vsync;
        self.backend.set_vsync(vsync);
    }

    /// Select the camera used for update and draw; out-of-range indices are ignored.
    pub fn set_active_camera(&mut self, index: usize) -> bool {
        self.scene.set_active_camera(index)
    }

    /// Compile a program against this engine's backend
    pub fn create_program(
        &mut self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> EngineResult<SharedProgram> {
        Ok(ShaderProgram::new(&mut self.backend, label, stage, source)?.shared())
    }

    /// Upload a mesh and register it with the scene
    pub fn upload_mesh(&mut self, mesh: &Mesh) -> EngineResult<Rc<GpuMesh>> {
        let gpu_mesh = GpuMesh::upload(&mut self.backend, mesh)?;
        Ok(self.scene.add_mesh(gpu_mesh))
    }

    pub fn upload_texture(&mut self, data: &TextureData) -> EngineResult<GpuTexture> {
        Ok(GpuTexture::create(&mut self.backend, data)?)
    }

    pub fn create_sampler(&mut self, desc: &SamplerDescriptor) -> EngineResult<SamplerHandle> {
        Ok(self.backend.create_sampler(desc)?)
    }

    /// Build a sky from six faces and install it in the scene
    pub fn set_sky(&mut self, cubemap: &CubemapData, sampler: SamplerHandle) -> EngineResult<()> {
        let mesh = Rc::new(GpuMesh::upload(&mut self.backend, &Mesh::cube())?);
        let texture = GpuTexture::create_cubemap(&mut self.backend, cubemap)?;
        let vertex_program = self.create_program("Sky VS", ShaderStage::Vertex, SKY_VERTEX_SHADER)?;
        let pixel_program = self.create_program("Sky PS", ShaderStage::Pixel, SKY_PIXEL_SHADER)?;

        if let Some(old) = self.scene.sky.take() {
            old.cubemap().destroy(&mut self.backend);
        }
        self.scene.sky = Some(Sky::new(mesh, texture, sampler, vertex_program, pixel_program));
        Ok(())
    }

    /// Advance timing and move the active camera from polled input.
    pub fn update(&mut self, dt: f32, input: &InputState) {
        self.timing.advance(dt);
        self.scene.active_camera_mut().update(dt, input);
    }

    /// Render and present one frame.
    pub fn draw(&mut self, overlay: &mut dyn UiOverlay<B>) -> EngineResult<FrameReport> {
        let report = self.pipeline.execute(&mut self.backend, &self.scene, overlay)?;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Resize the surface and recreate every resolution-dependent target.
    ///
    /// A zero-sized surface (minimized window) is ignored. On failure the
    /// targets are gone and [`Engine::draw`] refuses to run until a later
    /// resize succeeds.
    pub fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.backend.resize(width, height);

        // The surface may be clamped by device limits
        let (actual_width, actual_height) = self.backend.surface_size();
        if (actual_width, actual_height) == (self.width, self.height)
            && self.pipeline.targets().is_valid()
        {
            return Ok(());
        }

        self.pipeline.resize(&mut self.backend, actual_width, actual_height)?;
        self.width = actual_width;
        self.height = actual_height;
        self.scene.update_projections(self.aspect_ratio());

        log::debug!("Resized to {}x{}", actual_width, actual_height);
        Ok(())
    }

    /// Default camera for a surface of the given size
    pub fn default_camera(width: u32, height: u32) -> Camera {
        Camera::new(width as f32 / height.max(1) as f32, Vec3::new(0.0, 0.0, -5.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_averages_recent_frames() {
        let mut timing = FrameTiming::default();
        for _ in 0..100 {
            timing.advance(0.02);
        }
        assert!((timing.fps() - 50.0).abs() < 0.01);
        assert!((timing.total - 2.0).abs() < 1e-3);
        assert_eq!(timing.frame_count, 100);
    }
}
