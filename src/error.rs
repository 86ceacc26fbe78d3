//! Error types shared across the renderer

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;
use crate::resources::ShaderError;

/// Failure to load a mesh or image from disk
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to load mesh {path}: {message}")]
    Mesh { path: PathBuf, message: String },
    #[error("Failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to decode image '{name}': {source}")]
    ImageBytes {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Cubemap face {face} is {actual:?}, expected {expected:?}")]
    CubemapFaceSize {
        face: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Top-level renderer error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("Render targets are sized {targets:?} but the surface is {surface:?}")]
    StaleTargets {
        targets: (u32, u32),
        surface: (u32, u32),
    },
    #[error("Window error: {0}")]
    Window(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
