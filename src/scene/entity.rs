//! Renderable entities

use std::rc::Rc;

use crate::backend::{BackendResult, GraphicsBackend};
use crate::pipeline::DrawContext;
use crate::resources::{GpuMesh, SharedMaterial};

use super::camera::Camera;
use super::transform::Transform;

/// A mesh placed in the world with a material.
///
/// Entities are flat: the transform is always relative to the world origin.
/// Meshes and materials are shared handles; the transform is owned.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    mesh: Rc<GpuMesh>,
    material: SharedMaterial,
    transform: Transform,
}

impl Entity {
    pub fn new(name: &str, mesh: Rc<GpuMesh>, material: SharedMaterial) -> Self {
        Self {
            name: name.to_string(),
            mesh,
            material,
            transform: Transform::default(),
        }
    }

    pub fn mesh(&self) -> &Rc<GpuMesh> {
        &self.mesh
    }

    pub fn material(&self) -> &SharedMaterial {
        &self.material
    }

    pub fn set_material(&mut self, material: SharedMaterial) {
        self.material = material;
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// Upload this entity's per-object data and draw it.
    ///
    /// Writes the world, inverse-transpose, view and projection matrices into
    /// the material's vertex program, lets the material fill the pixel
    /// program, commits and activates both, then issues the indexed draw.
    /// Frame-wide data such as lights must already be set on the programs.
    pub fn draw<B: GraphicsBackend>(
        &self,
        ctx: &mut DrawContext<'_, B>,
        camera: &Camera,
    ) -> BackendResult<()> {
        let material = self.material.borrow();

        {
            let mut vs = material.vertex_program().borrow_mut();
            vs.set_matrix4x4("world", self.transform.world_matrix());
            vs.set_matrix4x4(
                "world_inverse_transpose",
                self.transform.world_inverse_transpose_matrix(),
            );
            vs.set_matrix4x4("view", camera.view_matrix());
            vs.set_matrix4x4("projection", camera.projection_matrix());
        }
        material.prepare(camera.position());

        for program in [material.vertex_program(), material.pixel_program()] {
            let mut program = program.borrow_mut();
            program.commit(ctx)?;
            program.activate(ctx)?;
        }

        ctx.draw_mesh(&self.mesh)
    }
}
