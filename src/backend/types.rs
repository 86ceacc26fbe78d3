//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Declares a bit set over `u32` with `contains`, `bits` and `|`
macro_rules! bit_flags {
    ($(#[$meta:meta])* $name:ident { $($flag:ident = $bit:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: Self = Self(1 << $bit);)+

            pub fn contains(&self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            pub fn bits(&self) -> u32 {
                self.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self::Output {
                Self(self.0 | rhs.0)
            }
        }
    };
}

bit_flags! {
    /// How a texture may be used
    TextureUsage {
        COPY_SRC = 0,
        COPY_DST = 1,
        TEXTURE_BINDING = 2,
        RENDER_ATTACHMENT = 4,
    }
}

bit_flags! {
    /// How a buffer may be used
    BufferUsage {
        COPY_DST = 3,
        INDEX = 4,
        VERTEX = 5,
        UNIFORM = 6,
    }
}

bit_flags! {
    /// Shader stages a binding is visible to
    ShaderStageFlags {
        VERTEX = 0,
        FRAGMENT = 1,
    }
}

impl ShaderStageFlags {
    pub const VERTEX_FRAGMENT: Self = Self(0b11);
}

/// Texture descriptor
///
/// Textures are always two-dimensional; cubemaps are six array layers viewed
/// through [`TextureViewDimension::Cube`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

/// How a texture is interpreted when bound for sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureViewDimension {
    #[default]
    D2,
    Cube,
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
    pub mapped_at_creation: bool,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// Vertex attribute description
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStepMode {
    Vertex,
    Instance,
}

/// Standard vertex with position, normal, UV, and tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

impl Vertex {
    pub fn layout() -> VertexBufferLayout {
        let formats = [
            VertexFormat::Float32x3,
            VertexFormat::Float32x3,
            VertexFormat::Float32x2,
            VertexFormat::Float32x4,
        ];
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    format: *format,
                    offset,
                };
                offset += format.size();
                attribute
            })
            .collect();

        VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes,
        }
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    LineList,
    TriangleList,
    TriangleStrip,
}

/// Front face winding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compare function for depth tests and comparison samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Rasterizer depth bias, applied while writing depth
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant bias in depth buffer units
    pub constant: i32,
    /// Bias scaled by the polygon's depth slope
    pub slope_scale: f32,
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampler descriptor
#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub compare: Option<CompareFunction>,
    /// Maximum anisotropy, 1 disables anisotropic filtering
    pub anisotropy: u16,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            compare: None,
            anisotropy: 1,
        }
    }
}

impl SamplerDescriptor {
    /// Repeating, anisotropic sampler used for material textures
    pub fn wrap(label: &str, anisotropy: u16) -> Self {
        Self {
            label: Some(label.to_string()),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            anisotropy,
            ..Default::default()
        }
    }

    /// Clamped bilinear sampler used by post-processing
    pub fn clamp(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    /// Depth comparison sampler used for shadow lookups
    pub fn shadow_comparison(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            compare: Some(CompareFunction::Less),
            ..Default::default()
        }
    }
}
