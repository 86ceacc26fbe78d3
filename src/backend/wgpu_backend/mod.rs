//! wgpu backend driving a window surface

mod convert;
mod recorder;

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::backend::traits::*;
use crate::backend::types::*;

use recorder::{OpenPass, PassCommand, PassResources};

/// wgpu objects keyed by the id inside their handle
pub(crate) struct Slots<T> {
    items: HashMap<u64, T>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<T> Slots<T> {
    fn insert(&mut self, id: u64, item: T) {
        self.items.insert(id, item);
    }

    pub(crate) fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    fn require(&self, id: u64, what: &str) -> BackendResult<&T> {
        self.get(id)
            .ok_or_else(|| BackendError::PipelineCreationFailed(format!("{what} {id} not found")))
    }
}

/// Swapchain image acquired for the current frame
struct AcquiredFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    handle: TextureViewHandle,
}

/// Look up a view, treating the current swapchain handle specially
fn resolve_view<'a>(
    frame: &'a Option<AcquiredFrame>,
    views: &'a Slots<wgpu::TextureView>,
    handle: TextureViewHandle,
) -> Option<&'a wgpu::TextureView> {
    match frame {
        Some(frame) if frame.handle == handle => Some(&frame.view),
        _ => views.get(handle.0),
    }
}

/// Graphics backend over a wgpu device and a winit window surface
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    vsync: bool,
    frame: Option<AcquiredFrame>,
    next_id: u64,

    buffers: Slots<wgpu::Buffer>,
    textures: Slots<wgpu::Texture>,
    views: Slots<wgpu::TextureView>,
    samplers: Slots<wgpu::Sampler>,
    layouts: Slots<wgpu::BindGroupLayout>,
    bind_groups: Slots<wgpu::BindGroup>,
    pipelines: Slots<wgpu::RenderPipeline>,

    encoder: Option<wgpu::CommandEncoder>,
    /// Extra command buffers that must run before the frame encoder
    prelude: Vec<wgpu::CommandBuffer>,
    open_pass: Option<OpenPass>,
}

impl WgpuBackend {
    /// Create the backend for a window, blocking on adapter and device requests
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?} backend)", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Forward Renderer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        // Post effects write linear values, so the back buffer must encode sRGB
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb() && TextureFormat::try_from(*f).is_ok())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed("Surface reports no supported formats".into())
            })?;

        let max = device.limits().max_texture_dimension_2d;
        let (width, height) = clamp_extent(size.width, size.height, max);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: convert::present_mode(vsync),
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            vsync,
            frame: None,
            next_id: 1,
            buffers: Slots::default(),
            textures: Slots::default(),
            views: Slots::default(),
            samplers: Slots::default(),
            layouts: Slots::default(),
            bind_groups: Slots::default(),
            pipelines: Slots::default(),
            encoder: None,
            prelude: Vec::new(),
            open_pass: None,
        })
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn record(&mut self, command: PassCommand) {
        if let Some(pass) = &mut self.open_pass {
            pass.commands.push(command);
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// wgpu view behind a handle, for renderers that sample it directly
    pub fn texture_view(&self, handle: TextureViewHandle) -> Option<&wgpu::TextureView> {
        resolve_view(&self.frame, &self.views, handle)
    }

    /// Native format of the swapchain, for renderers created outside the backend
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Upload egui textures and geometry and draw the UI over `target`, keeping
    /// its contents.
    pub fn paint_ui(
        &mut self,
        renderer: &mut egui_wgpu::Renderer,
        textures: &egui::TexturesDelta,
        paint_jobs: &[egui::ClippedPrimitive],
        screen: &egui_wgpu::ScreenDescriptor,
        target: TextureViewHandle,
    ) -> BackendResult<()> {
        for (id, delta) in &textures.set {
            renderer.update_texture(&self.device, &self.queue, *id, delta);
        }

        let Some(encoder) = self.encoder.as_mut() else {
            return Err(BackendError::AcquireImageFailed(
                "UI painted outside of a frame".into(),
            ));
        };
        let extra = renderer.update_buffers(&self.device, &self.queue, encoder, paint_jobs, screen);
        self.prelude.extend(extra);

        let view = resolve_view(&self.frame, &self.views, target).ok_or_else(|| {
            BackendError::TextureCreationFailed(format!("UI target {} is not alive", target.0))
        })?;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("UI Overlay"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: convert::color_ops(&LoadOp::Load, StoreOp::Store),
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            renderer.render(&mut pass, paint_jobs, screen);
        }

        for id in &textures.free {
            renderer.free_texture(id);
        }
        Ok(())
    }
}

/// Fit a requested extent inside the device limit, keeping its aspect ratio
fn clamp_extent(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width.max(1), height.max(1));
    }
    let scale = (max as f32 / width as f32).min(max as f32 / height as f32);
    (
        ((width as f32 * scale) as u32).clamp(1, max),
        ((height as f32 * scale) as u32).clamp(1, max),
    )
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let max = self.device.limits().max_texture_dimension_2d;
        let (width, height) = clamp_extent(width, height, max);
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        log::debug!("Surface configured at {width}x{height}");
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn vsync(&self) -> bool {
        self.vsync
    }

    fn set_vsync(&mut self, vsync: bool) {
        if self.vsync == vsync {
            return;
        }
        self.vsync = vsync;
        self.config.present_mode = convert::present_mode(vsync);
        self.reconfigure();
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let texture = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => BackendError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
            other => BackendError::AcquireImageFailed(other.to_string()),
        })?;

        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let handle = TextureViewHandle(self.allocate_id());
        self.frame = Some(AcquiredFrame {
            texture,
            view,
            handle,
        });
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                }),
        );

        Ok(FrameContext {
            swapchain_view: handle,
            width: self.config.width,
            height: self.config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let Some(encoder) = self.encoder.take() {
            let prelude = std::mem::take(&mut self.prelude);
            self.queue
                .submit(prelude.into_iter().chain(std::iter::once(encoder.finish())));
        }

        // Waits for a refresh slot only when the surface is configured with vsync
        if let Some(frame) = self.frame.take() {
            drop(frame.view);
            frame.texture.present();
        }
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::try_from(self.config.format).unwrap_or(TextureFormat::Bgra8UnormSrgb)
    }

    fn uniform_offset_alignment(&self) -> u32 {
        self.device.limits().min_uniform_buffer_offset_alignment
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: desc.usage.into(),
            mapped_at_creation: desc.mapped_at_creation,
        });
        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: desc.label.as_deref(),
                contents: data,
                usage: desc.usage.into(),
            });
        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.buffers.get(buffer.0) {
            Some(target) => self.queue.write_buffer(target, offset, data),
            None => log::warn!("write to destroyed buffer {}", buffer.0),
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}: {}x{} is outside 1..={max}",
                desc.label.as_deref().unwrap_or("texture"),
                desc.width,
                desc.height
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.array_layers,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.into(),
            usage: desc.usage.into(),
            view_formats: &[],
        });
        let id = self.allocate_id();
        self.textures.insert(id, texture);
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        let view = self
            .textures
            .get(texture.0)
            .ok_or_else(|| {
                BackendError::TextureCreationFailed(format!("texture {} not found", texture.0))
            })?
            .create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(dimension.into()),
                ..Default::default()
            });
        let id = self.allocate_id();
        self.views.insert(id, view);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8], width: u32, height: u32) {
        let Some(target) = self.textures.get(texture.0) else {
            log::warn!("write to destroyed texture {}", texture.0);
            return;
        };
        let bytes_per_pixel = TextureFormat::try_from(target.format())
            .map(|format| format.bytes_per_pixel())
            .unwrap_or(4);

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_pixel),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: desc.address_mode_u.into(),
            address_mode_v: desc.address_mode_v.into(),
            address_mode_w: desc.address_mode_w.into(),
            mag_filter: desc.mag_filter.into(),
            min_filter: desc.min_filter.into(),
            mipmap_filter: desc.mipmap_filter.into(),
            compare: desc.compare.map(Into::into),
            anisotropy_clamp: desc.anisotropy.max(1),
            ..Default::default()
        });
        let id = self.allocate_id();
        self.samplers.insert(id, sampler);
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let entries: Vec<_> = entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into(),
                ty: entry.ty.into(),
                count: None,
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            });
        let id = self.allocate_id();
        self.layouts.insert(id, layout);
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout = self.layouts.require(layout.0, "bind group layout")?;

        let resources = entries
            .iter()
            .map(|(binding, entry)| -> BackendResult<wgpu::BindGroupEntry> {
                let resource = match entry {
                    BindGroupEntry::Buffer {
                        buffer,
                        offset,
                        size,
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: self.buffers.require(buffer.0, "buffer")?,
                        offset: *offset,
                        size: size.and_then(std::num::NonZeroU64::new),
                    }),
                    BindGroupEntry::Texture(view) => {
                        wgpu::BindingResource::TextureView(self.views.require(view.0, "texture view")?)
                    }
                    BindGroupEntry::Sampler(sampler) => {
                        wgpu::BindingResource::Sampler(self.samplers.require(sampler.0, "sampler")?)
                    }
                };
                Ok(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &resources,
        });
        let id = self.allocate_id();
        self.bind_groups.insert(id, bind_group);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let module = |source: &str| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: desc.label.as_deref(),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
        };
        let vertex_module = module(&desc.vertex_shader);
        let fragment_module = desc.fragment_shader.as_deref().map(module);

        let layouts = desc
            .bind_group_layouts
            .iter()
            .map(|handle| self.layouts.require(handle.0, "bind group layout"))
            .collect::<BackendResult<Vec<_>>>()?;
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        // Attribute arrays must outlive the layouts that borrow them
        let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format.into(),
                        offset: a.offset,
                        shader_location: a.location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<_> = desc
            .vertex_layouts
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: match layout.step_mode {
                    VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
                    VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
                },
                attributes,
            })
            .collect();

        let color_targets: Vec<_> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::from_bits_truncate(target.write_mask.bits()),
                })
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: "vs_main",
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: fragment_module.as_ref().map(|module| wgpu::FragmentState {
                    module,
                    entry_point: "fs_main",
                    targets: &color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: convert::primitive_state(desc),
                depth_stencil: desc.depth_stencil.as_ref().map(convert::depth_stencil_state),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        let id = self.allocate_id();
        self.pipelines.insert(id, pipeline);
        log::debug!("Created render pipeline {:?}", desc.label);
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        if let Some(previous) = self.open_pass.replace(OpenPass::new(desc)) {
            log::warn!("Render pass {:?} was never ended", previous.descriptor.label);
        }
    }

    fn end_render_pass(&mut self) {
        let Some(open) = self.open_pass.take() else {
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            log::warn!("Render pass {:?} ended outside of a frame", open.descriptor.label);
            return;
        };

        let label = open.descriptor.label.as_deref();
        let colors: Vec<_> = open
            .descriptor
            .color_attachments
            .iter()
            .filter_map(|attachment| {
                let Some(view) = resolve_view(&self.frame, &self.views, attachment.view) else {
                    log::warn!("Render pass {label:?} targets a destroyed view");
                    return None;
                };
                Some(Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: convert::color_ops(&attachment.load_op, attachment.store_op),
                }))
            })
            .collect();
        let depth = open
            .descriptor
            .depth_stencil_attachment
            .as_ref()
            .and_then(|attachment| {
                resolve_view(&self.frame, &self.views, attachment.view).map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(convert::depth_ops(attachment)),
                        stencil_ops: None,
                    }
                })
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label,
            color_attachments: &colors,
            depth_stencil_attachment: depth,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let resources = PassResources {
            pipelines: &self.pipelines,
            bind_groups: &self.bind_groups,
            buffers: &self.buffers,
        };
        recorder::replay(&mut pass, &open.commands, &resources);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(PassCommand::Pipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle, dynamic_offsets: &[u32]) {
        self.record(PassCommand::BindGroup {
            index,
            group: bind_group,
            offsets: dynamic_offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        self.record(PassCommand::VertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        self.record(PassCommand::IndexBuffer {
            buffer,
            offset,
            format,
        });
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        self.record(PassCommand::Viewport([x, y, width, height, min_depth, max_depth]));
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.record(PassCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.record(PassCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(buffer.0) {
            buffer.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(texture) = self.textures.remove(texture.0) {
            texture.destroy();
        }
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.views.remove(view.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_extent_keeps_aspect() {
        assert_eq!(clamp_extent(800, 600, 8192), (800, 600));
        assert_eq!(clamp_extent(0, 600, 8192), (1, 600));
        assert_eq!(clamp_extent(16384, 8192, 8192), (8192, 4096));
    }
}
