//! egui UI overlay
//!
//! The overlay pass draws egui straight onto the back buffer after post-processing.

mod inspector;
mod wgpu;

pub use self::inspector::Inspector;
pub use self::wgpu::WgpuEguiIntegration;
