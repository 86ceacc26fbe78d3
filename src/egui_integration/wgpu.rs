//! egui overlay drawn onto the wgpu back buffer

use egui::ViewportId;
use egui_wgpu::ScreenDescriptor;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::backend::traits::{BackendResult, TextureViewHandle};
use crate::backend::wgpu_backend::WgpuBackend;
use crate::pipeline::UiOverlay;

/// egui context, winit input state and wgpu renderer for the UI overlay pass
pub struct WgpuEguiIntegration {
    ctx: egui::Context,
    winit_state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    /// Tessellated output of the last finished frame
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    /// Window size / surface size, applied to cursor positions
    input_scale: f32,
}

impl WgpuEguiIntegration {
    pub fn new(backend: &WgpuBackend, window: &Window) -> Self {
        let ctx = egui::Context::default();

        let winit_state = egui_winit::State::new(
            ctx.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );

        let renderer =
            egui_wgpu::Renderer::new(backend.device(), backend.surface_format(), None, 1);

        Self {
            ctx,
            winit_state,
            renderer,
            paint_jobs: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
            input_scale: 1.0,
        }
    }

    /// Account for a surface clamped smaller than the window
    pub fn set_surface_scale(
        &mut self,
        window_width: u32,
        window_height: u32,
        surface_width: u32,
        surface_height: u32,
    ) {
        if window_width == 0 || window_height == 0 {
            return;
        }
        let scale_x = surface_width as f32 / window_width as f32;
        let scale_y = surface_height as f32 / window_height as f32;
        self.input_scale = scale_x.min(scale_y);
    }

    /// Feed a window event to egui. Returns true when egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let scaled = match event {
            WindowEvent::CursorMoved {
                device_id,
                position,
            } if self.input_scale != 1.0 => Some(WindowEvent::CursorMoved {
                device_id: *device_id,
                position: winit::dpi::PhysicalPosition::new(
                    position.x * self.input_scale as f64,
                    position.y * self.input_scale as f64,
                ),
            }),
            _ => None,
        };

        self.winit_state
            .on_window_event(window, scaled.as_ref().unwrap_or(event))
            .consumed
    }

    pub fn begin_frame(&mut self, window: &Window) {
        let mut raw_input = self.winit_state.take_egui_input(window);

        if self.input_scale != 1.0 {
            if let Some(rect) = &mut raw_input.screen_rect {
                rect.max.x *= self.input_scale;
                rect.max.y *= self.input_scale;
            }
        }

        self.ctx.begin_frame(raw_input);
    }

    /// Finish the UI frame and tessellate it for the next overlay pass
    pub fn end_frame(&mut self, window: &Window) {
        let full_output = self.ctx.end_frame();

        self.winit_state
            .handle_platform_output(window, full_output.platform_output);

        self.paint_jobs = self
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        self.textures_delta.append(full_output.textures_delta);
    }

    /// Make a backend view drawable with `egui::Image`
    pub fn register_view(
        &mut self,
        backend: &WgpuBackend,
        view: TextureViewHandle,
    ) -> Option<egui::TextureId> {
        let view = backend.texture_view(view)?;
        Some(self.renderer.register_native_texture(
            backend.device(),
            view,
            egui_wgpu::wgpu::FilterMode::Linear,
        ))
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn wants_keyboard_input(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }

    pub fn wants_pointer_input(&self) -> bool {
        self.ctx.wants_pointer_input()
    }
}

impl UiOverlay<WgpuBackend> for WgpuEguiIntegration {
    fn render(
        &mut self,
        backend: &mut WgpuBackend,
        target: TextureViewHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: self.ctx.pixels_per_point(),
        };

        let textures = std::mem::take(&mut self.textures_delta);
        backend.paint_ui(
            &mut self.renderer,
            &textures,
            &self.paint_jobs,
            &screen_descriptor,
            target,
        )
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_renderer_constructor_signature() {
        let _: fn(
            &egui_wgpu::wgpu::Device,
            egui_wgpu::wgpu::TextureFormat,
            Option<egui_wgpu::wgpu::TextureFormat>,
            u32,
        ) -> egui_wgpu::Renderer = egui_wgpu::Renderer::new;
    }
}
