//! Headless backend that records commands instead of talking to a GPU.
//!
//! Every call made by the frame pipeline is appended to a command log, which makes
//! pass ordering, target sizes and uniform uploads observable without a device.
//! Resources are tracked only as far as needed to answer those questions.

use std::collections::HashMap;

use crate::backend::traits::*;
use crate::backend::types::*;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    CreateTexture {
        texture: TextureHandle,
        label: Option<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
    },
    DestroyTexture(TextureHandle),
    CreatePipeline {
        label: Option<String>,
        cull_mode: CullMode,
    },
    BeginRenderPass {
        label: Option<String>,
        color: Vec<TextureViewHandle>,
        depth: Option<TextureViewHandle>,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
        offsets: Vec<u32>,
    },
    SetVertexBuffer(BufferHandle),
    SetIndexBuffer(BufferHandle),
    SetViewport { width: f32, height: f32 },
    Draw { vertex_count: u32 },
    DrawIndexed { index_count: u32 },
    WriteBuffer { buffer: BufferHandle, offset: u64, len: usize },
    Present { vsync: bool },
}

#[derive(Debug, Clone, Copy)]
enum ViewSource {
    Texture(TextureHandle),
    Swapchain,
}

/// Command-recording backend for tests and offline runs.
#[derive(Debug)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    vsync: bool,
    format: TextureFormat,
    frame_open: bool,
    swapchain_view: Option<TextureViewHandle>,
    fail_texture_creation: bool,
    next_id: u64,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    views: HashMap<TextureViewHandle, ViewSource>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    bind_groups: HashMap<BindGroupHandle, Vec<(u32, BindGroupEntry)>>,
    commands: Vec<RecordedCommand>,
}

impl HeadlessBackend {
    /// Create a headless backend with a virtual surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            vsync: true,
            format: TextureFormat::Bgra8UnormSrgb,
            frame_open: false,
            swapchain_view: None,
            fail_texture_creation: false,
            next_id: 1,
            textures: HashMap::new(),
            views: HashMap::new(),
            buffers: HashMap::new(),
            bind_groups: HashMap::new(),
            commands: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Make every following texture creation fail, simulating device exhaustion.
    pub fn set_fail_texture_creation(&mut self, fail: bool) {
        self.fail_texture_creation = fail;
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Drain the command log.
    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Extent of the storage behind a view; swapchain views report the surface size.
    pub fn view_extent(&self, view: TextureViewHandle) -> Option<(u32, u32)> {
        match self.views.get(&view)? {
            ViewSource::Swapchain => Some((self.width, self.height)),
            ViewSource::Texture(texture) => {
                self.textures.get(texture).map(|desc| (desc.width, desc.height))
            }
        }
    }

    /// Label of the texture behind a view, `None` for the swapchain.
    pub fn view_label(&self, view: TextureViewHandle) -> Option<&str> {
        match self.views.get(&view)? {
            ViewSource::Swapchain => None,
            ViewSource::Texture(texture) => self.textures.get(texture)?.label.as_deref(),
        }
    }

    /// Whether the view is the back buffer of some frame.
    pub fn is_swapchain_view(&self, view: TextureViewHandle) -> bool {
        matches!(self.views.get(&view), Some(ViewSource::Swapchain))
    }

    /// Whether the view still refers to a live texture.
    pub fn is_view_alive(&self, view: TextureViewHandle) -> bool {
        match self.views.get(&view) {
            Some(ViewSource::Swapchain) => true,
            Some(ViewSource::Texture(texture)) => self.textures.contains_key(texture),
            None => false,
        }
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Entries a bind group was created with.
    pub fn bind_group_entries(&self, bind_group: BindGroupHandle) -> Option<&[(u32, BindGroupEntry)]> {
        self.bind_groups.get(&bind_group).map(Vec::as_slice)
    }

    /// Number of textures currently alive.
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn vsync(&self) -> bool {
        self.vsync
    }

    fn set_vsync(&mut self, vsync: bool) {
        self.vsync = vsync;
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if let Some(previous) = self.swapchain_view.take() {
            self.views.remove(&previous);
        }
        let view = TextureViewHandle(self.next());
        self.views.insert(view, ViewSource::Swapchain);
        self.swapchain_view = Some(view);
        self.frame_open = true;

        Ok(FrameContext {
            swapchain_view: view,
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if self.frame_open {
            self.frame_open = false;
            self.commands.push(RecordedCommand::Present { vsync: self.vsync });
        }
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn uniform_offset_alignment(&self) -> u32 {
        256
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!("HeadlessBackend: creating buffer {:?} (size: {})", desc.label, desc.size);
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, vec![0; desc.size as usize]);
        Ok(handle)
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!("HeadlessBackend: creating buffer {:?} with {} bytes", desc.label, data.len());
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, data.to_vec());
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            let start = offset as usize;
            let end = start + data.len();
            if end > contents.len() {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        }
        self.commands.push(RecordedCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if self.fail_texture_creation {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: headless backend configured to fail",
                desc.label
            )));
        }
        log::trace!(
            "HeadlessBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.array_layers
        );

        let texture = TextureHandle(self.next());
        self.textures.insert(texture, desc.clone());
        self.commands.push(RecordedCommand::CreateTexture {
            texture,
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(texture)
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        _dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let view = TextureViewHandle(self.next());
        self.views.insert(view, ViewSource::Texture(texture));
        Ok(view)
    }

    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8], width: u32, height: u32) {
        log::trace!(
            "HeadlessBackend: writing {} bytes to texture {:?} layer {} ({}x{})",
            data.len(),
            texture,
            layer,
            width,
            height
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("HeadlessBackend: creating sampler {:?}", desc.label);
        Ok(SamplerHandle(self.next()))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        log::trace!("HeadlessBackend: creating bind group layout with {} entries", entries.len());
        Ok(BindGroupLayoutHandle(self.next()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let handle = BindGroupHandle(self.next());
        self.bind_groups.insert(handle, entries.to_vec());
        Ok(handle)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        self.commands.push(RecordedCommand::CreatePipeline {
            label: desc.label.clone(),
            cull_mode: desc.cull_mode,
        });
        Ok(RenderPipelineHandle(self.next()))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: desc.label.clone(),
            color: desc.color_attachments.iter().map(|a| a.view).collect(),
            depth: desc.depth_stencil_attachment.as_ref().map(|a| a.view),
        });
    }

    fn end_render_pass(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle, dynamic_offsets: &[u32]) {
        self.commands.push(RecordedCommand::SetBindGroup {
            index,
            bind_group,
            offsets: dynamic_offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, _slot: u32, buffer: BufferHandle, _offset: u64) {
        self.commands.push(RecordedCommand::SetVertexBuffer(buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, _format: IndexFormat) {
        self.commands.push(RecordedCommand::SetIndexBuffer(buffer));
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.commands.push(RecordedCommand::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, _instances: std::ops::Range<u32>) {
        self.commands.push(RecordedCommand::Draw {
            vertex_count: vertices.len() as u32,
        });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        _instances: std::ops::Range<u32>,
    ) {
        self.commands.push(RecordedCommand::DrawIndexed {
            index_count: indices.len() as u32,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.commands.push(RecordedCommand::DestroyTexture(texture));
        }
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.views.remove(&view);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_view_reports_surface_size() {
        let mut backend = HeadlessBackend::new(800, 600);
        let frame = backend.begin_frame().unwrap();
        assert!(backend.is_swapchain_view(frame.swapchain_view));
        assert_eq!(backend.view_extent(frame.swapchain_view), Some((800, 600)));

        backend.resize(1920, 1080);
        assert_eq!(backend.view_extent(frame.swapchain_view), Some((1920, 1080)));
    }

    #[test]
    fn test_write_buffer_updates_contents() {
        let mut backend = HeadlessBackend::new(4, 4);
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 8,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.buffer_contents(buffer), Some(&[0, 0, 0, 0, 1, 2, 3, 4][..]));
    }

    #[test]
    fn test_injected_texture_failure() {
        let mut backend = HeadlessBackend::new(4, 4);
        backend.set_fail_texture_creation(true);
        let result = backend.create_texture(&TextureDescriptor::default());
        assert!(matches!(result, Err(BackendError::TextureCreationFailed(_))));
    }

    #[test]
    fn test_present_records_vsync_policy() {
        let mut backend = HeadlessBackend::new(4, 4);
        backend.set_vsync(false);
        backend.begin_frame().unwrap();
        backend.end_frame().unwrap();
        assert_eq!(backend.commands().last(), Some(&RecordedCommand::Present { vsync: false }));
    }
}
