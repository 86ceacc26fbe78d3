//! Backend abstraction layer
//!
//! Provides the device and draw-call boundary shared by the wgpu backend and the
//! headless recording backend.

pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use headless::{HeadlessBackend, RecordedCommand};
pub use traits::*;
pub use types::*;
