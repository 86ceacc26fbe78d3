//! Scene inspector window

use glam::Vec3;

use crate::backend::GraphicsBackend;
use crate::engine::Engine;
use crate::pipeline::postprocess::MAX_BLUR_RADIUS;
use crate::pipeline::{PostEffectSettings, SHADOW_PREVIEW_SIZE};
use crate::scene::{Light, Transform};

const MAX_CHROMATIC_OFFSET: f32 = 0.01;

/// Immediate-mode editor for the engine's scene and frame settings
#[derive(Debug, Clone)]
pub struct Inspector {
    pub visible: bool,
    /// Registered texture showing the shadow map preview target
    pub shadow_preview: Option<egui::TextureId>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self {
            visible: true,
            shadow_preview: None,
        }
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_visibility(&mut self) {
        self.visible = !self.visible;
    }

    pub fn show<B: GraphicsBackend>(&mut self, ctx: &egui::Context, engine: &mut Engine<B>) {
        if !self.visible {
            return;
        }

        egui::Window::new("Inspector")
            .default_pos([10.0, 10.0])
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::CollapsingHeader::new("App Details")
                    .default_open(true)
                    .show(ui, |ui| app_details(ui, engine));
                egui::CollapsingHeader::new("Post Processing")
                    .default_open(true)
                    .show(ui, |ui| post_processing(ui, engine));
                if let Some(texture) = self.shadow_preview {
                    egui::CollapsingHeader::new("Shadow Map")
                        .show(ui, |ui| shadow_map(ui, engine, texture));
                }
                egui::CollapsingHeader::new("Meshes").show(ui, |ui| meshes(ui, engine));
                egui::CollapsingHeader::new("Materials").show(ui, |ui| materials(ui, engine));
                egui::CollapsingHeader::new("Entities").show(ui, |ui| entities(ui, engine));
                egui::CollapsingHeader::new("Cameras").show(ui, |ui| cameras(ui, engine));
                egui::CollapsingHeader::new("Lights").show(ui, |ui| lights(ui, engine));
            });
    }
}

fn app_details<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &mut Engine<B>) {
    let (width, height) = engine.dimensions();
    ui.label(format!("Framerate: {:.0} fps", engine.timing().fps()));
    ui.label(format!("Resolution: {width}x{height}"));
    if let Some(report) = engine.last_report() {
        ui.label(format!("Draw calls: {}", report.draw_count));
    }

    let mut vsync = engine.vsync();
    if ui.checkbox(&mut vsync, "VSync").changed() {
        engine.set_vsync(vsync);
    }

    let mut shadows = engine.pipeline().shadows_enabled();
    if ui.checkbox(&mut shadows, "Shadows").changed() {
        engine.pipeline_mut().set_shadows_enabled(shadows);
    }

    let mut clear = engine.pipeline().clear_color();
    let mut rgb = [clear[0], clear[1], clear[2]];
    ui.horizontal(|ui| {
        ui.label("Background:");
        if ui.color_edit_button_rgb(&mut rgb).changed() {
            clear[..3].copy_from_slice(&rgb);
            engine.pipeline_mut().set_clear_color(clear);
        }
    });
}

fn post_processing<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &mut Engine<B>) {
    for (index, effect) in engine
        .pipeline_mut()
        .post_process_mut()
        .effects_mut()
        .iter_mut()
        .enumerate()
    {
        ui.push_id(index, |ui| {
            ui.checkbox(&mut effect.enabled, effect.settings.name());
            match &mut effect.settings {
                PostEffectSettings::Blur { radius } => {
                    ui.add(egui::Slider::new(radius, 0..=MAX_BLUR_RADIUS).text("Radius"));
                }
                PostEffectSettings::ChromaticAberration(offsets) => {
                    let range = -MAX_CHROMATIC_OFFSET..=MAX_CHROMATIC_OFFSET;
                    ui.add(egui::Slider::new(&mut offsets.red, range.clone()).text("Red"));
                    ui.add(egui::Slider::new(&mut offsets.green, range.clone()).text("Green"));
                    ui.add(egui::Slider::new(&mut offsets.blue, range).text("Blue"));
                }
            }
        });
        ui.separator();
    }
}

fn shadow_map<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &Engine<B>, texture: egui::TextureId) {
    if !engine.pipeline().shadows_enabled() {
        ui.label("Shadows are disabled");
        return;
    }
    let size = SHADOW_PREVIEW_SIZE as f32;
    ui.image(egui::load::SizedTexture::new(texture, [size, size]));
}

fn materials<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &Engine<B>) {
    for (index, material) in engine.scene().materials().iter().enumerate() {
        let mut material = material.borrow_mut();
        egui::CollapsingHeader::new(material.name.clone())
            .id_source(("material", index))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Tint:");
                    let mut tint = material.color_tint.to_array();
                    if ui.color_edit_button_rgb(&mut tint).changed() {
                        material.color_tint = Vec3::from_array(tint);
                    }
                });
                let mut roughness = material.roughness();
                if ui
                    .add(egui::Slider::new(&mut roughness, 0.0..=1.0).text("Roughness"))
                    .changed()
                {
                    material.set_roughness(roughness);
                }
            });
    }
}

fn meshes<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &mut Engine<B>) {
    for mesh in engine.scene().meshes() {
        ui.label(format!(
            "{}: {} vertices, {} triangles",
            mesh.name(),
            mesh.vertex_count(),
            mesh.triangle_count()
        ));
    }
}

fn entities<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &mut Engine<B>) {
    for (index, entity) in engine.scene_mut().entities.iter_mut().enumerate() {
        egui::CollapsingHeader::new(format!("{} ({})", entity.name, entity.mesh().name()))
            .id_source(("entity", index))
            .show(ui, |ui| transform_editor(ui, entity.transform_mut()));
    }
}

fn transform_editor(ui: &mut egui::Ui, transform: &mut Transform) {
    let mut position = transform.position();
    if vec3_editor(ui, "Position", &mut position, 0.05) {
        transform.set_position(position);
    }
    let mut rotation = transform.pitch_yaw_roll();
    if vec3_editor(ui, "Rotation", &mut rotation, 0.01) {
        transform.set_rotation(rotation);
    }
    let mut scale = transform.scale();
    if vec3_editor(ui, "Scale", &mut scale, 0.05) {
        transform.set_scale(scale);
    }
}

fn cameras<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &mut Engine<B>) {
    let active = engine.scene().active_camera_index();
    let mut selected = None;
    for (index, camera) in engine.scene().cameras().iter().enumerate() {
        ui.horizontal(|ui| {
            let p = camera.position();
            ui.label(format!(
                "Camera {index}: ({:.1}, {:.1}, {:.1}) fov {:.0}°",
                p.x,
                p.y,
                p.z,
                camera.fov().to_degrees()
            ));
            if index == active {
                ui.label("(active)");
            } else if ui.button("Activate").clicked() {
                selected = Some(index);
            }
        });
    }
    if let Some(index) = selected {
        engine.set_active_camera(index);
    }
}

fn lights<B: GraphicsBackend>(ui: &mut egui::Ui, engine: &mut Engine<B>) {
    let scene = engine.scene_mut();
    ui.horizontal(|ui| {
        ui.label("Ambient:");
        let mut ambient = scene.ambient.to_array();
        if ui.color_edit_button_rgb(&mut ambient).changed() {
            scene.ambient = Vec3::from_array(ambient);
        }
    });

    for (index, light) in scene.lights.iter_mut().enumerate() {
        egui::CollapsingHeader::new(format!("Light {index} ({})", light.kind_name()))
            .id_source(("light", index))
            .show(ui, |ui| match light {
                Light::Directional {
                    direction,
                    color,
                    intensity,
                } => {
                    vec3_editor(ui, "Direction", direction, 0.01);
                    color_and_intensity(ui, color, intensity);
                }
                Light::Point {
                    position,
                    color,
                    intensity,
                    range,
                } => {
                    vec3_editor(ui, "Position", position, 0.05);
                    color_and_intensity(ui, color, intensity);
                    ui.add(egui::Slider::new(range, 0.1..=50.0).text("Range"));
                }
                Light::Spot {
                    position,
                    direction,
                    color,
                    intensity,
                    range,
                    inner_angle,
                    outer_angle,
                } => {
                    vec3_editor(ui, "Position", position, 0.05);
                    vec3_editor(ui, "Direction", direction, 0.01);
                    color_and_intensity(ui, color, intensity);
                    ui.add(egui::Slider::new(range, 0.1..=50.0).text("Range"));
                    ui.add(egui::Slider::new(inner_angle, 0.0..=*outer_angle).text("Inner"));
                    ui.add(
                        egui::Slider::new(outer_angle, 0.0..=std::f32::consts::FRAC_PI_2)
                            .text("Outer"),
                    );
                }
            });
    }
}

fn color_and_intensity(ui: &mut egui::Ui, color: &mut Vec3, intensity: &mut f32) {
    ui.horizontal(|ui| {
        ui.label("Color:");
        let mut rgb = color.to_array();
        if ui.color_edit_button_rgb(&mut rgb).changed() {
            *color = Vec3::from_array(rgb);
        }
    });
    ui.add(egui::Slider::new(intensity, 0.0..=5.0).text("Intensity"));
}

fn vec3_editor(ui: &mut egui::Ui, label: &str, value: &mut Vec3, speed: f32) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let x = ui.add(egui::DragValue::new(&mut value.x).speed(speed)).changed();
        let y = ui.add(egui::DragValue::new(&mut value.y).speed(speed)).changed();
        let z = ui.add(egui::DragValue::new(&mut value.z).speed(speed)).changed();
        x || y || z
    })
    .inner
}
