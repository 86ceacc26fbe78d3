//! Backend-neutral descriptors to wgpu types

use crate::backend::traits::*;
use crate::backend::types::*;

impl From<TextureFormat> for wgpu::TextureFormat {
    fn from(format: TextureFormat) -> Self {
        match format {
            TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => Self::Rgba16Float,
            TextureFormat::Depth32Float => Self::Depth32Float,
        }
    }
}

impl TryFrom<wgpu::TextureFormat> for TextureFormat {
    type Error = wgpu::TextureFormat;

    fn try_from(format: wgpu::TextureFormat) -> Result<Self, Self::Error> {
        Ok(match format {
            wgpu::TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba16Float => Self::Rgba16Float,
            wgpu::TextureFormat::Depth32Float => Self::Depth32Float,
            other => return Err(other),
        })
    }
}

impl From<BufferUsage> for wgpu::BufferUsages {
    fn from(usage: BufferUsage) -> Self {
        [
            (BufferUsage::COPY_DST, Self::COPY_DST),
            (BufferUsage::INDEX, Self::INDEX),
            (BufferUsage::VERTEX, Self::VERTEX),
            (BufferUsage::UNIFORM, Self::UNIFORM),
        ]
        .into_iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(Self::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl From<TextureUsage> for wgpu::TextureUsages {
    fn from(usage: TextureUsage) -> Self {
        [
            (TextureUsage::COPY_SRC, Self::COPY_SRC),
            (TextureUsage::COPY_DST, Self::COPY_DST),
            (TextureUsage::TEXTURE_BINDING, Self::TEXTURE_BINDING),
            (TextureUsage::RENDER_ATTACHMENT, Self::RENDER_ATTACHMENT),
        ]
        .into_iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(Self::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl From<ShaderStageFlags> for wgpu::ShaderStages {
    fn from(stages: ShaderStageFlags) -> Self {
        let mut result = Self::empty();
        if stages.contains(ShaderStageFlags::VERTEX) {
            result |= Self::VERTEX;
        }
        if stages.contains(ShaderStageFlags::FRAGMENT) {
            result |= Self::FRAGMENT;
        }
        result
    }
}

impl From<VertexFormat> for wgpu::VertexFormat {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float32 => Self::Float32,
            VertexFormat::Float32x2 => Self::Float32x2,
            VertexFormat::Float32x3 => Self::Float32x3,
            VertexFormat::Float32x4 => Self::Float32x4,
        }
    }
}

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(func: CompareFunction) -> Self {
        match func {
            CompareFunction::Never => Self::Never,
            CompareFunction::Less => Self::Less,
            CompareFunction::Equal => Self::Equal,
            CompareFunction::LessEqual => Self::LessEqual,
            CompareFunction::Greater => Self::Greater,
            CompareFunction::NotEqual => Self::NotEqual,
            CompareFunction::GreaterEqual => Self::GreaterEqual,
            CompareFunction::Always => Self::Always,
        }
    }
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::Nearest => Self::Nearest,
            FilterMode::Linear => Self::Linear,
        }
    }
}

impl From<AddressMode> for wgpu::AddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::ClampToEdge => Self::ClampToEdge,
            AddressMode::Repeat => Self::Repeat,
            AddressMode::MirrorRepeat => Self::MirrorRepeat,
        }
    }
}

impl From<TextureViewDimension> for wgpu::TextureViewDimension {
    fn from(dimension: TextureViewDimension) -> Self {
        match dimension {
            TextureViewDimension::D2 => Self::D2,
            TextureViewDimension::Cube => Self::Cube,
        }
    }
}

impl From<IndexFormat> for wgpu::IndexFormat {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Uint16 => Self::Uint16,
            IndexFormat::Uint32 => Self::Uint32,
        }
    }
}

impl From<StoreOp> for wgpu::StoreOp {
    fn from(op: StoreOp) -> Self {
        match op {
            StoreOp::Store => Self::Store,
            StoreOp::Discard => Self::Discard,
        }
    }
}

impl From<BindingType> for wgpu::BindingType {
    fn from(ty: BindingType) -> Self {
        match ty {
            BindingType::UniformBuffer {
                dynamic_offset,
                min_size,
            } => Self::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic_offset,
                min_binding_size: std::num::NonZeroU64::new(min_size),
            },
            BindingType::Texture {
                sample_type,
                view_dimension,
            } => Self::Texture {
                sample_type: match sample_type {
                    TextureSampleType::Float { filterable } => {
                        wgpu::TextureSampleType::Float { filterable }
                    }
                    TextureSampleType::Depth => wgpu::TextureSampleType::Depth,
                },
                view_dimension: view_dimension.into(),
                multisampled: false,
            },
            BindingType::Sampler { comparison: true } => {
                Self::Sampler(wgpu::SamplerBindingType::Comparison)
            }
            BindingType::Sampler { comparison: false } => {
                Self::Sampler(wgpu::SamplerBindingType::Filtering)
            }
        }
    }
}

/// Rasterizer state for a pipeline description
pub(super) fn primitive_state(desc: &RenderPipelineDescriptor) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: match desc.primitive_topology {
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        },
        front_face: match desc.front_face {
            FrontFace::Ccw => wgpu::FrontFace::Ccw,
            FrontFace::Cw => wgpu::FrontFace::Cw,
        },
        cull_mode: match desc.cull_mode {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        ..Default::default()
    }
}

pub(super) fn depth_stencil_state(state: &DepthStencilState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: state.format.into(),
        depth_write_enabled: state.depth_write_enabled,
        depth_compare: state.depth_compare.into(),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState {
            constant: state.bias.constant,
            slope_scale: state.bias.slope_scale,
            clamp: 0.0,
        },
    }
}

pub(super) fn color_ops(load: &LoadOp, store: StoreOp) -> wgpu::Operations<wgpu::Color> {
    wgpu::Operations {
        load: match load {
            LoadOp::Clear([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: *r as f64,
                g: *g as f64,
                b: *b as f64,
                a: *a as f64,
            }),
            LoadOp::Load => wgpu::LoadOp::Load,
        },
        store: store.into(),
    }
}

pub(super) fn depth_ops(attachment: &DepthStencilAttachment) -> wgpu::Operations<f32> {
    wgpu::Operations {
        load: match attachment.depth_load_op {
            LoadOp::Clear(_) => wgpu::LoadOp::Clear(attachment.depth_clear_value),
            LoadOp::Load => wgpu::LoadOp::Load,
        },
        store: attachment.depth_store_op.into(),
    }
}

pub(super) fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags_map_bit_by_bit() {
        let usage: wgpu::BufferUsages = (BufferUsage::UNIFORM | BufferUsage::COPY_DST).into();
        assert_eq!(usage, wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST);

        let usage: wgpu::TextureUsages =
            (TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING).into();
        assert_eq!(
            usage,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        );
    }

    #[test]
    fn test_unknown_surface_format_is_rejected() {
        assert_eq!(
            TextureFormat::try_from(wgpu::TextureFormat::Bgra8UnormSrgb),
            Ok(TextureFormat::Bgra8UnormSrgb)
        );
        assert!(TextureFormat::try_from(wgpu::TextureFormat::R8Unorm).is_err());
    }
}
