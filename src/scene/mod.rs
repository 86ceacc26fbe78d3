//! Scene management
//!
//! A scene is a flat list of entities lit by a [`LightSet`] and viewed through
//! one of several cameras. There is no hierarchy: every entity transform is
//! relative to the world origin.

mod cache;
mod camera;
mod entity;
mod input;
mod light;
mod sky;
mod transform;

pub use cache::*;
pub use camera::*;
pub use entity::*;
pub use input::*;
pub use light::*;
pub use sky::*;
pub use transform::*;

use std::rc::Rc;

use glam::Vec3;

use crate::resources::{GpuMesh, SharedMaterial};

/// The scene containing all renderable content
#[derive(Debug)]
pub struct Scene {
    pub entities: Vec<Entity>,
    pub lights: LightSet,
    pub ambient: Vec3,
    pub sky: Option<Sky>,
    cameras: Vec<Camera>,
    active_camera: usize,
    meshes: Vec<Rc<GpuMesh>>,
    materials: Vec<SharedMaterial>,
}

impl Scene {
    /// Create a scene viewed through `camera`
    pub fn new(camera: Camera) -> Self {
        Self {
            entities: Vec::new(),
            lights: LightSet::new(),
            ambient: Vec3::splat(0.03),
            sky: None,
            cameras: vec![camera],
            active_camera: 0,
            meshes: Vec::new(),
            materials: Vec::new(),
        }
    }

    /// Register a mesh so tools can list it; returns the shared handle
    pub fn add_mesh(&mut self, mesh: GpuMesh) -> Rc<GpuMesh> {
        let mesh = Rc::new(mesh);
        self.meshes.push(Rc::clone(&mesh));
        mesh
    }

    pub fn meshes(&self) -> &[Rc<GpuMesh>] {
        &self.meshes
    }

    /// Register a material so tools can list it
    pub fn add_material(&mut self, material: SharedMaterial) -> SharedMaterial {
        self.materials.push(Rc::clone(&material));
        material
    }

    pub fn materials(&self) -> &[SharedMaterial] {
        &self.materials
    }

    /// Add an entity and return its index
    pub fn add_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Add a camera and return its index
    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut [Camera] {
        &mut self.cameras
    }

    pub fn active_camera_index(&self) -> usize {
        self.active_camera
    }

    /// Select the camera used for the next update and draw.
    ///
    /// Out-of-range indices leave the selection unchanged.
    pub fn set_active_camera(&mut self, index: usize) -> bool {
        if index >= self.cameras.len() {
            log::trace!(
                "Ignoring camera selection {} ({} cameras)",
                index,
                self.cameras.len()
            );
            return false;
        }
        self.active_camera = index;
        true
    }

    pub fn active_camera(&self) -> &Camera {
        &self.cameras[self.active_camera]
    }

    pub fn active_camera_mut(&mut self) -> &mut Camera {
        &mut self.cameras[self.active_camera]
    }

    /// Rebuild every camera's projection for a new surface aspect ratio
    pub fn update_projections(&mut self, aspect: f32) {
        for camera in &mut self.cameras {
            camera.update_projection_matrix(aspect);
        }
    }

    /// Direction of the light that casts shadows
    pub fn shadow_light_direction(&self) -> Option<Vec3> {
        self.lights.first_directional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_camera_selection_is_ignored() {
        let mut scene = Scene::new(Camera::new(1.0, Vec3::ZERO));
        let second = scene.add_camera(Camera::new(1.0, Vec3::new(0.0, 5.0, 0.0)));

        assert!(scene.set_active_camera(second));
        assert_eq!(scene.active_camera_index(), 1);

        assert!(!scene.set_active_camera(7));
        assert_eq!(scene.active_camera_index(), 1);
        assert_eq!(scene.active_camera().position(), Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_projection_update_reaches_every_camera() {
        let mut scene = Scene::new(Camera::new(1.0, Vec3::ZERO));
        scene.add_camera(Camera::new(1.0, Vec3::ONE));
        scene.update_projections(2.0);

        assert!(scene.cameras().iter().all(|c| c.aspect() == 2.0));
    }
}
