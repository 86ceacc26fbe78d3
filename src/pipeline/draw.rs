//! Draw-call issuing shared by every pass.
//!
//! Programs are compiled per stage, so render pipelines are only known once a
//! vertex and pixel program are activated together under a pass's fixed
//! state. [`DrawContext`] tracks that combination and creates the pipeline on
//! first use through the [`PipelineCache`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{
    BackendResult, BindGroupLayoutHandle, ColorTargetState, ColorWrites, CompareFunction,
    CullMode, DepthBias, DepthStencilState, FrontFace, GraphicsBackend, IndexFormat,
    PrimitiveTopology, RenderPipelineDescriptor, RenderPipelineHandle, SamplerDescriptor,
    SamplerHandle, TextureDescriptor, TextureFormat, TextureHandle, TextureSampleType,
    TextureUsage, TextureViewDimension, TextureViewHandle, Vertex,
};
use crate::resources::{GpuMesh, ProgramId, ShaderStage};

/// Depth format used by every depth target
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// The program last activated for a stage
#[derive(Debug, Clone)]
pub struct ActiveProgram {
    pub id: ProgramId,
    pub label: Rc<str>,
    pub source: Rc<str>,
    pub layout: BindGroupLayoutHandle,
}

/// Depth test configuration of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthMode {
    /// No depth attachment
    None,
    /// Less test with depth writes
    Opaque,
    /// LessEqual test without writes, so the sky only fills untouched pixels
    Sky,
    /// Less test with writes and the configured depth bias
    Shadow,
}

/// How geometry reaches the vertex stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInput {
    /// Interleaved [`Vertex`] buffer plus u32 indices
    Mesh,
    /// No buffers; the vertex program synthesizes positions from the vertex index
    Synthesized,
}

/// Fixed-function state of a pass, part of the pipeline key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub color_format: Option<TextureFormat>,
    pub depth: DepthMode,
    pub vertex_input: VertexInput,
}

impl PipelineState {
    pub fn shadow() -> Self {
        Self {
            color_format: None,
            depth: DepthMode::Shadow,
            vertex_input: VertexInput::Mesh,
        }
    }

    pub fn opaque(color_format: TextureFormat) -> Self {
        Self {
            color_format: Some(color_format),
            depth: DepthMode::Opaque,
            vertex_input: VertexInput::Mesh,
        }
    }

    pub fn sky(color_format: TextureFormat) -> Self {
        Self {
            color_format: Some(color_format),
            depth: DepthMode::Sky,
            vertex_input: VertexInput::Mesh,
        }
    }

    pub fn fullscreen(color_format: TextureFormat) -> Self {
        Self {
            color_format: Some(color_format),
            depth: DepthMode::None,
            vertex_input: VertexInput::Synthesized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    vertex: ProgramId,
    pixel: Option<ProgramId>,
    state: PipelineState,
}

/// Render pipelines keyed by program pair and pass state
#[derive(Debug, Default)]
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, RenderPipelineHandle>,
    shadow_bias: DepthBias,
}

impl PipelineCache {
    pub fn new(shadow_bias: DepthBias) -> Self {
        Self {
            pipelines: HashMap::new(),
            shadow_bias,
        }
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn get_or_create<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        vertex: &ActiveProgram,
        pixel: Option<&ActiveProgram>,
        state: PipelineState,
    ) -> BackendResult<RenderPipelineHandle> {
        let key = PipelineKey {
            vertex: vertex.id,
            pixel: pixel.map(|p| p.id),
            state,
        };
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(*pipeline);
        }

        let label = match pixel {
            Some(pixel) => format!("{} + {}", vertex.label, pixel.label),
            None => vertex.label.to_string(),
        };
        log::debug!("Creating pipeline '{}' for {:?}", label, state);

        let depth_stencil = match state.depth {
            DepthMode::None => None,
            DepthMode::Opaque => Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                bias: DepthBias::default(),
            }),
            DepthMode::Sky => Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
                bias: DepthBias::default(),
            }),
            DepthMode::Shadow => Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                bias: self.shadow_bias,
            }),
        };

        let mut bind_group_layouts = vec![vertex.layout];
        if let Some(pixel) = pixel {
            bind_group_layouts.push(pixel.layout);
        }

        let desc = RenderPipelineDescriptor {
            label: Some(label),
            vertex_shader: vertex.source.to_string(),
            fragment_shader: pixel.map(|p| p.source.to_string()),
            vertex_layouts: match state.vertex_input {
                VertexInput::Mesh => vec![Vertex::layout()],
                VertexInput::Synthesized => Vec::new(),
            },
            bind_group_layouts,
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Cw,
            cull_mode: match state.depth {
                DepthMode::Opaque | DepthMode::Shadow => CullMode::Back,
                // The sky is seen from inside and fullscreen triangles have no back
                DepthMode::Sky | DepthMode::None => CullMode::None,
            },
            depth_stencil,
            color_targets: state
                .color_format
                .map(|format| ColorTargetState {
                    format,
                    write_mask: ColorWrites::ALL,
                })
                .into_iter()
                .collect(),
        };

        let pipeline = backend.create_render_pipeline(&desc)?;
        self.pipelines.insert(key, pipeline);
        Ok(pipeline)
    }
}

/// 1x1 resources bound to slots a program declares but nobody set
#[derive(Debug)]
pub struct FallbackBindings {
    textures: Vec<TextureHandle>,
    white_2d: TextureViewHandle,
    white_cube: TextureViewHandle,
    depth: TextureViewHandle,
    sampler: SamplerHandle,
    comparison_sampler: SamplerHandle,
}

impl FallbackBindings {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> BackendResult<Self> {
        let white = [255u8; 4];

        let white_2d_texture = backend.create_texture(&TextureDescriptor {
            label: Some("Fallback White".into()),
            ..Default::default()
        })?;
        backend.write_texture(white_2d_texture, 0, &white, 1, 1);
        let white_2d = backend.create_texture_view(white_2d_texture, TextureViewDimension::D2)?;

        let white_cube_texture = backend.create_texture(&TextureDescriptor {
            label: Some("Fallback White Cube".into()),
            array_layers: 6,
            ..Default::default()
        })?;
        for layer in 0..6 {
            backend.write_texture(white_cube_texture, layer, &white, 1, 1);
        }
        let white_cube =
            backend.create_texture_view(white_cube_texture, TextureViewDimension::Cube)?;

        let depth_texture = backend.create_texture(&TextureDescriptor {
            label: Some("Fallback Depth".into()),
            format: DEPTH_FORMAT,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::RENDER_ATTACHMENT,
            ..Default::default()
        })?;
        let depth = backend.create_texture_view(depth_texture, TextureViewDimension::D2)?;

        let sampler = backend.create_sampler(&SamplerDescriptor::clamp("Fallback Sampler"))?;
        let comparison_sampler =
            backend.create_sampler(&SamplerDescriptor::shadow_comparison("Fallback Comparison Sampler"))?;

        Ok(Self {
            textures: vec![white_2d_texture, white_cube_texture, depth_texture],
            white_2d,
            white_cube,
            depth,
            sampler,
            comparison_sampler,
        })
    }

    pub fn texture(&self, sample_type: TextureSampleType, dimension: TextureViewDimension) -> TextureViewHandle {
        match (sample_type, dimension) {
            (TextureSampleType::Depth, _) => self.depth,
            (_, TextureViewDimension::Cube) => self.white_cube,
            (_, TextureViewDimension::D2) => self.white_2d,
        }
    }

    pub fn sampler(&self, comparison: bool) -> SamplerHandle {
        if comparison {
            self.comparison_sampler
        } else {
            self.sampler
        }
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        for view in [self.white_2d, self.white_cube, self.depth] {
            backend.destroy_texture_view(view);
        }
        for texture in &self.textures {
            backend.destroy_texture(*texture);
        }
    }
}

/// Per-pass drawing state handed to programs and entities
pub struct DrawContext<'a, B: GraphicsBackend> {
    pub backend: &'a mut B,
    pipelines: &'a mut PipelineCache,
    fallback: &'a FallbackBindings,
    frame_index: u64,
    state: PipelineState,
    vertex: Option<ActiveProgram>,
    pixel: Option<ActiveProgram>,
    current_pipeline: Option<RenderPipelineHandle>,
    draw_count: u32,
}

impl<'a, B: GraphicsBackend> DrawContext<'a, B> {
    pub fn new(
        backend: &'a mut B,
        pipelines: &'a mut PipelineCache,
        fallback: &'a FallbackBindings,
        frame_index: u64,
        state: PipelineState,
    ) -> Self {
        Self {
            backend,
            pipelines,
            fallback,
            frame_index,
            state,
            vertex: None,
            pixel: None,
            current_pipeline: None,
            draw_count: 0,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn fallback(&self) -> &'a FallbackBindings {
        self.fallback
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Switch fixed-function state, e.g. from opaque geometry to the sky.
    pub fn set_state(&mut self, state: PipelineState) {
        self.state = state;
    }

    pub fn set_active(&mut self, stage: ShaderStage, program: ActiveProgram) {
        match stage {
            ShaderStage::Vertex => self.vertex = Some(program),
            ShaderStage::Pixel => self.pixel = Some(program),
        }
    }

    /// Number of draw calls issued through this context
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    fn bind_pipeline(&mut self) -> BackendResult<bool> {
        let Some(vertex) = self.vertex.as_ref() else {
            log::warn!("Draw issued without an active vertex program, skipping");
            return Ok(false);
        };
        // Depth-only passes never run a pixel program
        let pixel = match self.state.color_format {
            Some(_) => self.pixel.as_ref(),
            None => None,
        };
        if self.state.color_format.is_some() && pixel.is_none() {
            log::warn!("Color draw issued without an active pixel program, skipping");
            return Ok(false);
        }

        let pipeline = self
            .pipelines
            .get_or_create(self.backend, vertex, pixel, self.state)?;
        if self.current_pipeline != Some(pipeline) {
            self.backend.set_render_pipeline(pipeline);
            self.current_pipeline = Some(pipeline);
        }
        Ok(true)
    }

    /// Draw a mesh with the active programs.
    pub fn draw_mesh(&mut self, mesh: &GpuMesh) -> BackendResult<()> {
        if !self.bind_pipeline()? {
            return Ok(());
        }
        self.backend.set_vertex_buffer(0, mesh.vertex_buffer(), 0);
        self.backend
            .set_index_buffer(mesh.index_buffer(), 0, IndexFormat::Uint32);
        self.backend.draw_indexed(0..mesh.index_count(), 0, 0..1);
        self.draw_count += 1;
        Ok(())
    }

    /// Issue the fixed 3-vertex draw used by full-screen passes.
    pub fn draw_fullscreen_triangle(&mut self) -> BackendResult<()> {
        if !self.bind_pipeline()? {
            return Ok(());
        }
        self.backend.draw(0..3, 0..1);
        self.draw_count += 1;
        Ok(())
    }
}
