//! Texture loading and management

use std::path::Path;

use glam::{Vec2, Vec3};
use image::{DynamicImage, GenericImageView};

use crate::backend::{
    BackendResult, GraphicsBackend, TextureDescriptor, TextureFormat, TextureHandle, TextureUsage,
    TextureViewDimension, TextureViewHandle,
};
use crate::error::AssetError;

/// Decoded RGBA8 pixels
#[derive(Debug, Clone)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Load an image file as sRGB color data
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let img = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded image {} ({}x{})", path.display(), img.width(), img.height());
        Ok(Self::from_image(img, &name, TextureFormat::Rgba8UnormSrgb))
    }

    /// Load an image file holding non-color data such as normals or roughness
    pub fn from_file_linear(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let mut texture = Self::from_file(path)?;
        texture.format = TextureFormat::Rgba8Unorm;
        Ok(texture)
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes).map_err(|source| AssetError::ImageBytes {
            name: name.to_string(),
            source,
        })?;
        Ok(Self::from_image(img, name, TextureFormat::Rgba8UnormSrgb))
    }

    fn from_image(img: DynamicImage, name: &str, format: TextureFormat) -> Self {
        let (width, height) = img.dimensions();
        Self {
            name: name.to_string(),
            width,
            height,
            format,
            data: img.to_rgba8().into_raw(),
        }
    }

    /// 1x1 texture of a single color
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
        }
    }

    /// Tangent-space normal map pointing straight out of the surface
    pub fn flat_normals() -> Self {
        Self {
            format: TextureFormat::Rgba8Unorm,
            ..Self::solid_color([128, 128, 255, 255], "flat_normals")
        }
    }

    /// Two-color checkerboard with 8 pixel cells
    pub fn checkerboard(size: u32, even: [u8; 4], odd: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / 8) + (y / 8)) % 2 == 0 { even } else { odd };
                data.extend_from_slice(&color);
            }
        }
        Self {
            name: "checkerboard".to_string(),
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
        }
    }
}

/// Six equally sized faces in +X, -X, +Y, -Y, +Z, -Z order
#[derive(Debug, Clone)]
pub struct CubemapData {
    pub name: String,
    pub faces: [TextureData; 6],
}

impl CubemapData {
    /// Check that every face matches the first one's size
    pub fn new(name: &str, faces: [TextureData; 6]) -> Result<Self, AssetError> {
        let expected = (faces[0].width, faces[0].height);
        for (face, data) in faces.iter().enumerate() {
            let actual = (data.width, data.height);
            if actual != expected {
                return Err(AssetError::CubemapFaceSize {
                    face,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            name: name.to_string(),
            faces,
        })
    }

    /// Load six face images
    pub fn from_files(
        name: &str,
        right: impl AsRef<Path>,
        left: impl AsRef<Path>,
        up: impl AsRef<Path>,
        down: impl AsRef<Path>,
        front: impl AsRef<Path>,
        back: impl AsRef<Path>,
    ) -> Result<Self, AssetError> {
        let faces = [
            TextureData::from_file(right)?,
            TextureData::from_file(left)?,
            TextureData::from_file(up)?,
            TextureData::from_file(down)?,
            TextureData::from_file(front)?,
            TextureData::from_file(back)?,
        ];
        Self::new(name, faces)
    }

    /// Vertical sky gradient: `zenith` above, `horizon` at eye level, `ground` below
    pub fn gradient(size: u32, zenith: Vec3, horizon: Vec3, ground: Vec3) -> Self {
        let size = size.max(1);
        let faces = std::array::from_fn(|face| {
            let mut data = Vec::with_capacity((size * size * 4) as usize);
            for y in 0..size {
                for x in 0..size {
                    let uv = Vec2::new(
                        (x as f32 + 0.5) / size as f32 * 2.0 - 1.0,
                        (y as f32 + 0.5) / size as f32 * 2.0 - 1.0,
                    );
                    let height = cube_face_direction(face, uv).normalize().y;
                    let color = if height >= 0.0 {
                        horizon.lerp(zenith, height)
                    } else {
                        horizon.lerp(ground, -height)
                    };
                    let rgb = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
                    data.extend_from_slice(&[rgb.x as u8, rgb.y as u8, rgb.z as u8, 255]);
                }
            }
            TextureData {
                name: format!("sky_gradient_{face}"),
                width: size,
                height: size,
                format: TextureFormat::Rgba8UnormSrgb,
                data,
            }
        });
        Self {
            name: "Sky Gradient".to_string(),
            faces,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.faces[0].width, self.faces[0].height)
    }
}

/// Direction through texel `uv` (in -1..1) of cube face `face`
fn cube_face_direction(face: usize, uv: Vec2) -> Vec3 {
    let Vec2 { x: u, y: v } = uv;
    match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    }
}

/// Texture uploaded to the GPU with a sampling view
#[derive(Debug)]
pub struct GpuTexture {
    pub name: String,
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl GpuTexture {
    /// Create and upload a 2D texture
    pub fn create<B: GraphicsBackend>(backend: &mut B, data: &TextureData) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            ..Default::default()
        })?;
        backend.write_texture(handle, 0, &data.data, data.width, data.height);
        let view = backend.create_texture_view(handle, TextureViewDimension::D2)?;

        Ok(Self {
            name: data.name.clone(),
            handle,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
        })
    }

    /// Create and upload a cubemap viewed as a cube
    pub fn create_cubemap<B: GraphicsBackend>(
        backend: &mut B,
        cubemap: &CubemapData,
    ) -> BackendResult<Self> {
        let (width, height) = cubemap.size();
        let format = cubemap.faces[0].format;
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(cubemap.name.clone()),
            width,
            height,
            array_layers: 6,
            format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            ..Default::default()
        })?;
        for (layer, face) in cubemap.faces.iter().enumerate() {
            backend.write_texture(handle, layer as u32, &face.data, width, height);
        }
        let view = backend.create_texture_view(handle, TextureViewDimension::Cube)?;

        Ok(Self {
            name: cubemap.name.clone(),
            handle,
            view,
            width,
            height,
            format,
        })
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_cube_faces_are_rejected() {
        let face = TextureData::checkerboard(16, [255; 4], [0, 0, 0, 255]);
        let small = TextureData::checkerboard(8, [255; 4], [0, 0, 0, 255]);
        let faces = [face.clone(), face.clone(), small, face.clone(), face.clone(), face];

        let result = CubemapData::new("bad", faces);
        assert!(matches!(result, Err(AssetError::CubemapFaceSize { face: 2, .. })));
    }

    #[test]
    fn test_gradient_is_brighter_at_zenith() {
        let cubemap = CubemapData::gradient(4, Vec3::ONE, Vec3::splat(0.5), Vec3::ZERO);
        let up = &cubemap.faces[2].data;
        let down = &cubemap.faces[3].data;
        assert_eq!(up.len(), 4 * 4 * 4);
        assert!(up[0] > down[0]);
    }

    #[test]
    fn test_missing_file_is_an_asset_error() {
        let result = TextureData::from_file("does/not/exist.png");
        assert!(matches!(result, Err(AssetError::Image { .. })));
    }
}
