//! Resource management
//!
//! Meshes, textures, materials and the shader programs that consume them.

mod material;
mod mesh;
mod shader;
mod texture;
mod uniform_ring;

pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;
pub use uniform_ring::*;
