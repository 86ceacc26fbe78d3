//! Forward renderer demo
//!
//! Run with:
//!   cargo run --example demo
//!   cargo run --example demo -- --no-vsync --blur 4
//!   cargo run --example demo -- --assets path/to/Assets
//!
//! Controls:
//!   WASD         - Move camera
//!   Space / X    - Move up/down
//!   Left Mouse   - Look around (hold)
//!   F1           - Toggle inspector
//!   Escape       - Exit

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use clap::Parser;
use glam::Vec3;

use forward_renderer::{
    backend::SamplerDescriptor,
    pipeline::{LIT_PIXEL_SHADER, LIT_VERTEX_SHADER},
    resources::{CubemapData, Material, Mesh, ShaderStage, SharedMaterial, SharedProgram, TextureData},
    scene::{Camera, Entity, Light},
    Application, ChannelOffsets, Engine, EngineConfig, EngineResult, PostEffectSettings, ShadowConfig,
    WgpuBackend,
};

#[derive(Parser, Debug)]
#[command(name = "Forward Renderer Demo", about = "Shadow-mapped forward rendering with post effects")]
struct Args {
    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Present immediately instead of waiting for vertical sync
    #[arg(long)]
    no_vsync: bool,

    /// Skip the shadow pass
    #[arg(long)]
    no_shadows: bool,

    /// Initial blur radius (0-25)
    #[arg(long, default_value_t = 0)]
    blur: i32,

    /// Directory holding Models/, Textures/ and Skyboxes/; procedural assets otherwise
    #[arg(long)]
    assets: Option<PathBuf>,
}

/// Surface textures of one material
struct MaterialTextures {
    albedo: TextureData,
    normals: TextureData,
    roughness: TextureData,
    metalness: TextureData,
}

impl MaterialTextures {
    fn load(dir: &Path, prefix: &str) -> EngineResult<Self> {
        let textures = dir.join("Textures");
        Ok(Self {
            albedo: TextureData::from_file(textures.join(format!("{prefix}_albedo.png")))?,
            normals: TextureData::from_file_linear(textures.join(format!("{prefix}_normals.png")))?,
            roughness: TextureData::from_file_linear(textures.join(format!("{prefix}_roughness.png")))?,
            metalness: TextureData::from_file_linear(textures.join(format!("{prefix}_metal.png")))?,
        })
    }

    fn procedural(even: [u8; 4], odd: [u8; 4], roughness: u8, metalness: u8) -> Self {
        Self {
            albedo: TextureData::checkerboard(256, even, odd),
            normals: TextureData::flat_normals(),
            roughness: linear(TextureData::solid_color([roughness; 4], "roughness")),
            metalness: linear(TextureData::solid_color([metalness; 4], "metalness")),
        }
    }
}

fn linear(mut data: TextureData) -> TextureData {
    data.format = forward_renderer::backend::TextureFormat::Rgba8Unorm;
    data
}

struct Demo {
    assets: Option<PathBuf>,
}

impl Demo {
    fn material(
        &self,
        engine: &mut Engine<WgpuBackend>,
        name: &str,
        programs: (&SharedProgram, &SharedProgram),
        textures: MaterialTextures,
    ) -> EngineResult<SharedMaterial> {
        let sampler = engine.create_sampler(&SamplerDescriptor::wrap("Basic Sampler", 16))?;
        let albedo = engine.upload_texture(&textures.albedo)?;
        let normals = engine.upload_texture(&textures.normals)?;
        let roughness = engine.upload_texture(&textures.roughness)?;
        let metalness = engine.upload_texture(&textures.metalness)?;

        let material = Material::new(name, programs.0.clone(), programs.1.clone(), Vec3::ONE, 0.5)
            .with_texture("albedo", albedo.view)
            .with_texture("normal_map", normals.view)
            .with_texture("roughness_map", roughness.view)
            .with_texture("metalness_map", metalness.view)
            .with_sampler("basic_sampler", sampler)
            .shared();
        Ok(engine.scene_mut().add_material(material))
    }

    fn mesh(&self, name: &str, file: &str, procedural: impl FnOnce() -> Mesh) -> EngineResult<Mesh> {
        let mut mesh = match &self.assets {
            Some(dir) => Mesh::from_obj(name, dir.join("Models").join(file))?,
            None => procedural(),
        };
        mesh.name = name.to_string();
        Ok(mesh)
    }

    fn sky(&self) -> EngineResult<CubemapData> {
        match &self.assets {
            Some(dir) => {
                let faces = dir.join("Skyboxes").join("Clouds Pink");
                Ok(CubemapData::from_files(
                    "Clouds Pink",
                    faces.join("right.png"),
                    faces.join("left.png"),
                    faces.join("up.png"),
                    faces.join("down.png"),
                    faces.join("front.png"),
                    faces.join("back.png"),
                )?)
            }
            None => Ok(CubemapData::gradient(
                128,
                Vec3::new(0.55, 0.45, 0.75),
                Vec3::new(0.95, 0.7, 0.75),
                Vec3::new(0.25, 0.2, 0.3),
            )),
        }
    }
}

impl Application for Demo {
    fn camera(&self, aspect: f32) -> Camera {
        Camera::new(aspect, Vec3::new(0.0, 2.0, -20.0))
            .with_clip(0.01, 100.0)
            .with_move_speed(7.0)
            .with_look_speed(0.004)
    }

    fn setup(&mut self, engine: &mut Engine<WgpuBackend>) -> EngineResult<()> {
        let aspect = engine.aspect_ratio();
        engine.scene_mut().add_camera(
            Camera::new(aspect, Vec3::new(2.5, 1.5, -2.5))
                .with_rotation(Vec3::new(PI / 8.0, -PI / 4.0, 0.0))
                .with_fov(PI / 2.0)
                .with_move_speed(5.0),
        );

        let lights = &mut engine.scene_mut().lights;
        lights.push(Light::directional(Vec3::new(1.0, -1.0, 1.0), Vec3::new(0.8, 0.8, 0.8), 1.0));
        lights.push(Light::directional(Vec3::X, Vec3::new(0.8, 0.0, 0.0), 1.0));
        lights.push(Light::directional(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 0.8), 1.0));
        lights.push(Light::point(Vec3::new(-1.5, 0.0, 0.0), Vec3::ONE, 0.5, 8.0));
        lights.push(Light::point(Vec3::new(1.5, 0.0, 0.0), Vec3::ONE, 0.3, 12.0));

        let vs = engine.create_program("Lit VS", ShaderStage::Vertex, LIT_VERTEX_SHADER)?;
        let ps = engine.create_program("Lit PS", ShaderStage::Pixel, LIT_PIXEL_SHADER)?;

        let (wood_textures, scratched_textures) = match &self.assets {
            Some(dir) => (
                MaterialTextures::load(dir, "wood")?,
                MaterialTextures::load(dir, "scratched")?,
            ),
            None => (
                MaterialTextures::procedural([150, 100, 60, 255], [120, 75, 40, 255], 200, 0),
                MaterialTextures::procedural([190, 190, 195, 255], [150, 150, 155, 255], 120, 255),
            ),
        };
        let wood = self.material(engine, "Wood", (&vs, &ps), wood_textures)?;
        let scratched = self.material(engine, "Scratched", (&vs, &ps), scratched_textures)?;

        let cube = engine.upload_mesh(&self.mesh("Cube", "cube.obj", Mesh::cube)?)?;
        let helix = engine.upload_mesh(&self.mesh("Helix", "helix.obj", || {
            Mesh::cylinder(0.5, 2.0, 24)
        })?)?;
        let sphere = engine.upload_mesh(&self.mesh("Sphere", "sphere.obj", || Mesh::sphere(32, 16))?)?;
        let torus = engine.upload_mesh(&self.mesh("Torus", "torus.obj", || {
            Mesh::torus(0.75, 0.25, 32, 16)
        })?)?;
        let quad = engine.upload_mesh(&self.mesh("Quad", "quad.obj", || Mesh::quad(false))?)?;
        let double_quad = engine.upload_mesh(&self.mesh(
            "Double-Sided Quad",
            "quad_double_sided.obj",
            || Mesh::quad(true),
        )?)?;

        let placements = [
            ("Floor", &cube, &wood, Vec3::new(0.0, -3.0, 0.0)),
            ("Cube", &cube, &scratched, Vec3::new(-6.0, 0.0, 0.0)),
            ("Helix", &helix, &scratched, Vec3::new(-3.0, 0.0, 0.0)),
            ("Sphere", &sphere, &scratched, Vec3::ZERO),
            ("Torus", &torus, &wood, Vec3::new(3.0, 0.0, 0.0)),
            ("Quad", &quad, &scratched, Vec3::new(6.0, 0.0, 0.0)),
            ("Double-Sided Quad", &double_quad, &scratched, Vec3::new(9.0, 0.0, 0.0)),
        ];
        for (name, mesh, material, position) in placements {
            let mut entity = Entity::new(name, mesh.clone(), material.clone());
            entity.transform_mut().move_absolute(position);
            engine.scene_mut().add_entity(entity);
        }
        if let Some(floor) = engine.scene_mut().entities.first_mut() {
            floor.transform_mut().set_scale(Vec3::new(25.0, 1.0, 25.0));
        }

        let sky = self.sky()?;
        let sky_sampler = engine.create_sampler(&SamplerDescriptor::wrap("Sky Sampler", 16))?;
        engine.set_sky(&sky, sky_sampler)?;

        log::info!(
            "Scene ready: {} entities, {} lights, {} cameras",
            engine.scene().entities.len(),
            engine.scene().lights.len(),
            engine.scene().cameras().len()
        );
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine<WgpuBackend>, _dt: f32) {
        let offset = engine.timing().total.sin() * 2.0;
        let columns = [-4.0, 0.0, 4.0];
        for (entity, x) in engine.scene_mut().entities.iter_mut().skip(1).zip(columns) {
            entity.transform_mut().set_position(Vec3::new(x, offset, 0.0));
        }
    }
}

fn main() {
    forward_renderer::init_logging();
    let args = Args::parse();

    let config = EngineConfig::default()
        .with_title("Forward Renderer Demo")
        .with_size(args.width, args.height)
        .with_vsync(!args.no_vsync)
        .with_shadow(ShadowConfig {
            enabled: !args.no_shadows,
            ..Default::default()
        })
        .with_post_effects(vec![
            PostEffectSettings::Blur { radius: args.blur },
            PostEffectSettings::ChromaticAberration(ChannelOffsets::default()),
        ]);

    log::info!("Starting demo at {}x{} (vsync: {})", args.width, args.height, config.vsync);

    let demo = Demo {
        assets: args.assets,
    };
    if let Err(e) = forward_renderer::run(config, demo) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
