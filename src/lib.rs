//! Forward Renderer - a small real-time forward renderer with shadow mapping
//!
//! Each frame runs a fixed sequence of passes:
//! - shadow depth from the first directional light
//! - lit opaque geometry and the sky into an offscreen target
//! - a chain of full-screen post-process effects ending on the back buffer
//! - an immediate-mode UI overlay
//! - present
//!
//! The frame talks to the GPU only through [`backend::GraphicsBackend`]. The wgpu
//! backend drives a window surface; the headless backend records every command,
//! which is how the pass ordering and resize behaviour are tested.

pub mod backend;
pub mod egui_integration;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod window;

use glam::Vec3;

pub use egui_integration::{Inspector, WgpuEguiIntegration};
pub use engine::{Engine, FrameTiming};
pub use window::{run, Application};
pub use error::{AssetError, EngineError, EngineResult};
pub use pipeline::{ChannelOffsets, PostEffectSettings};

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

/// Shadow map configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowConfig {
    pub enabled: bool,
    /// Width and height of the square shadow map
    pub map_size: u32,
    /// Distance the light is backed off from the origin
    pub light_distance: f32,
    /// Width and height of the orthographic light volume
    pub projection_extent: f32,
    pub near: f32,
    pub far: f32,
    /// Constant depth bias in depth-buffer units
    pub depth_bias: i32,
    pub slope_scaled_bias: f32,
    /// Used when the scene has no directional light
    pub fallback_direction: Vec3,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map_size: 1024,
            light_distance: 20.0,
            projection_extent: 15.0,
            near: 1.0,
            far: 100.0,
            depth_bias: 1000,
            slope_scaled_bias: 1.0,
            fallback_direction: Vec3::new(1.0, -1.0, 1.0),
        }
    }
}

/// Ordered post-process chain
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessConfig {
    pub effects: Vec<PostEffectSettings>,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            effects: vec![
                PostEffectSettings::Blur { radius: 0 },
                PostEffectSettings::ChromaticAberration(ChannelOffsets::default()),
            ],
        }
    }
}

/// Configuration for initializing the renderer
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Color the main target is cleared to
    pub clear_color: [f32; 4],
    pub shadow: ShadowConfig,
    pub post_process: PostProcessConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Forward Renderer".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            clear_color: [0.4, 0.6, 0.75, 0.0],
            shadow: ShadowConfig::default(),
            post_process: PostProcessConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_post_effects(mut self, effects: Vec<PostEffectSettings>) -> Self {
        self.post_process.effects = effects;
        self
    }
}

/// Install `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
