//! Window and event loop using winit

use std::sync::Arc;
use std::time::Instant;

use winit::{
    dpi::PhysicalSize,
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use crate::backend::wgpu_backend::WgpuBackend;
use crate::backend::{BackendError, GraphicsBackend};
use crate::egui_integration::{Inspector, WgpuEguiIntegration};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::scene::{Camera, CameraKey, InputState};
use crate::EngineConfig;

/// Hooks an application plugs into [`run`]
pub trait Application {
    /// Camera the scene starts with
    fn camera(&self, aspect: f32) -> Camera {
        Camera::new(aspect, glam::Vec3::new(0.0, 0.0, -5.0))
    }

    /// Load assets and populate the scene
    fn setup(&mut self, engine: &mut Engine<WgpuBackend>) -> EngineResult<()>;

    /// Called once per frame after the camera update
    fn update(&mut self, _engine: &mut Engine<WgpuBackend>, _dt: f32) {}

    /// Extra UI drawn next to the inspector
    fn ui(&mut self, _ctx: &egui::Context, _engine: &mut Engine<WgpuBackend>) {}
}

fn camera_key(code: KeyCode) -> Option<CameraKey> {
    match code {
        KeyCode::KeyW => Some(CameraKey::Forward),
        KeyCode::KeyS => Some(CameraKey::Backward),
        KeyCode::KeyA => Some(CameraKey::Left),
        KeyCode::KeyD => Some(CameraKey::Right),
        KeyCode::Space => Some(CameraKey::Up),
        KeyCode::KeyX => Some(CameraKey::Down),
        _ => None,
    }
}

/// Open a window, build the engine and run `app` until the window closes.
///
/// W/S/A/D move, Space/X rise and sink, holding the left mouse button looks
/// around, F1 toggles the inspector and Escape quits.
pub fn run<A: Application>(config: EngineConfig, mut app: A) -> EngineResult<()> {
    let event_loop = EventLoop::new().map_err(|e| EngineError::Window(e.to_string()))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)
            .map_err(|e| EngineError::Window(e.to_string()))?,
    );

    let backend = WgpuBackend::new(window.clone(), config.vsync)?;
    let (width, height) = backend.surface_size();
    let camera = app.camera(width as f32 / height.max(1) as f32);
    let mut engine = Engine::new(backend, config, camera)?;
    app.setup(&mut engine)?;

    engine.set_shadow_preview(true)?;
    let mut egui = WgpuEguiIntegration::new(engine.backend(), &window);
    let mut inspector = Inspector::new();
    inspector.shadow_preview = engine
        .pipeline()
        .shadow_preview_view()
        .and_then(|view| egui.register_view(engine.backend(), view));
    let mut input = InputState::new();
    let mut last_frame = Instant::now();
    let mut fatal: Option<EngineError> = None;

    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, window_id } if window_id == window.id() => {
                    let consumed = egui.on_window_event(&window, &event);

                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(size) => {
                            if let Err(e) = engine.resize(size.width, size.height) {
                                log::error!("Resize failed: {e}");
                                fatal = Some(e);
                                elwt.exit();
                                return;
                            }
                            let (surface_width, surface_height) = engine.dimensions();
                            egui.set_surface_scale(
                                size.width,
                                size.height,
                                surface_width,
                                surface_height,
                            );
                        }
                        WindowEvent::Focused(false) => input.release_all(),
                        WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    physical_key: PhysicalKey::Code(code),
                                    state,
                                    repeat,
                                    ..
                                },
                            ..
                        } => {
                            let pressed = state == ElementState::Pressed;
                            // Releases always go through so keys never stick
                            if let Some(key) = camera_key(code) {
                                if !consumed || !pressed {
                                    input.set_key(key, pressed);
                                }
                            } else if pressed && !repeat && !consumed {
                                match code {
                                    KeyCode::Escape => elwt.exit(),
                                    KeyCode::F1 => inspector.toggle_visibility(),
                                    _ => {}
                                }
                            }
                        }
                        WindowEvent::MouseInput {
                            button: MouseButton::Left,
                            state,
                            ..
                        } => {
                            input.look_active = state == ElementState::Pressed && !consumed;
                        }
                        WindowEvent::RedrawRequested => {
                            let now = Instant::now();
                            let dt = now.duration_since(last_frame).as_secs_f32();
                            last_frame = now;

                            input.captured_by_ui =
                                egui.wants_keyboard_input() || egui.wants_pointer_input();
                            engine.update(dt, &input);
                            app.update(&mut engine, dt);
                            input.reset_deltas();

                            egui.begin_frame(&window);
                            let ctx = egui.context().clone();
                            inspector.show(&ctx, &mut engine);
                            app.ui(&ctx, &mut engine);
                            egui.end_frame(&window);

                            match engine.draw(&mut egui) {
                                Ok(_) => {}
                                Err(EngineError::Backend(BackendError::SurfaceLost)) => {
                                    let (w, h) = engine.dimensions();
                                    engine.backend_mut().resize(w, h);
                                }
                                Err(e @ EngineError::StaleTargets { .. }) => {
                                    log::warn!("{e}, recreating targets");
                                    let size = window.inner_size();
                                    if let Err(e) = engine.resize(size.width, size.height) {
                                        log::error!("Resize failed: {e}");
                                        fatal = Some(e);
                                        elwt.exit();
                                    }
                                }
                                Err(e) => {
                                    log::error!("Frame failed: {e}");
                                    fatal = Some(e);
                                    elwt.exit();
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::DeviceEvent {
                    event: DeviceEvent::MouseMotion { delta },
                    ..
                } => {
                    if input.look_active {
                        input.add_mouse_delta(delta.0 as f32, delta.1 as f32);
                    }
                }
                Event::AboutToWait => window.request_redraw(),
                _ => {}
            }
        })
        .map_err(|e| EngineError::Window(e.to_string()))?;

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
