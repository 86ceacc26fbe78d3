//! Mesh data, procedural generators and GPU upload

use std::f32::consts::{PI, TAU};
use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend, Vertex,
};
use crate::error::AssetError;

/// CPU-side triangle mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            vertices,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Load the first model of an OBJ file, triangulated with a single index stream.
    pub fn from_obj(name: &str, path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let (models, _) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|e| AssetError::Mesh {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let model = models.into_iter().next().ok_or_else(|| AssetError::Mesh {
            path: path.to_path_buf(),
            message: "file contains no models".into(),
        })?;

        let mesh = model.mesh;
        let vertex_count = mesh.positions.len() / 3;
        let vertices = (0..vertex_count)
            .map(|i| {
                let position = Vec3::from_slice(&mesh.positions[i * 3..i * 3 + 3]);
                let normal = mesh
                    .normals
                    .get(i * 3..i * 3 + 3)
                    .map_or(Vec3::Y, Vec3::from_slice);
                let uv = mesh
                    .texcoords
                    .get(i * 2..i * 2 + 2)
                    // OBJ texture space has v pointing up
                    .map_or(Vec2::ZERO, |t| Vec2::new(t[0], 1.0 - t[1]));
                Vertex {
                    position,
                    normal,
                    uv,
                    tangent: Vec4::ZERO,
                }
            })
            .collect();

        let mut mesh = Self::new(name, vertices, mesh.indices);
        mesh.calculate_tangents();
        log::info!(
            "Loaded mesh '{}' from {}: {} vertices, {} triangles",
            name,
            path.display(),
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Recompute per-vertex tangents from positions and UVs.
    pub fn calculate_tangents(&mut self) {
        let mut accumulated = vec![Vec3::ZERO; self.vertices.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            let (v0, v1, v2) = (&self.vertices[i0], &self.vertices[i1], &self.vertices[i2]);

            let edge1 = v1.position - v0.position;
            let edge2 = v2.position - v0.position;
            let duv1 = v1.uv - v0.uv;
            let duv2 = v2.uv - v0.uv;
            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let tangent = (edge1 * duv2.y - edge2 * duv1.y) / det;
            for index in [i0, i1, i2] {
                accumulated[index] += tangent;
            }
        }

        for (vertex, tangent) in self.vertices.iter_mut().zip(accumulated) {
            // Gram-Schmidt against the normal
            let orthogonal = tangent - vertex.normal * vertex.normal.dot(tangent);
            let fallback = if vertex.normal.y.abs() > 0.9 { Vec3::X } else { Vec3::Y.cross(vertex.normal) };
            let tangent = orthogonal.try_normalize().unwrap_or_else(|| fallback.normalize_or_zero());
            vertex.tangent = tangent.extend(1.0);
        }
    }

    /// Unit cube centered at the origin, one quad per face
    pub fn cube() -> Self {
        let faces = [
            (Vec3::Z, Vec3::Y),
            (-Vec3::Z, Vec3::Y),
            (Vec3::X, Vec3::Y),
            (-Vec3::X, Vec3::Y),
            (Vec3::Y, -Vec3::Z),
            (-Vec3::Y, Vec3::Z),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, up) in faces {
            let right = up.cross(normal);
            let base = vertices.len() as u32;
            for (u, v) in [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)] {
                let position = normal * 0.5 + right * (u - 0.5) + up * (0.5 - v);
                vertices.push(Vertex {
                    position,
                    normal,
                    uv: Vec2::new(u, v),
                    tangent: right.extend(1.0),
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new("Cube", vertices, indices)
    }

    /// UV sphere with diameter 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            for segment in 0..=segments {
                let theta = TAU * segment as f32 / segments as f32;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                vertices.push(Vertex {
                    position: normal * 0.5,
                    normal,
                    uv: Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32),
                    tangent: Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0),
                });
            }
        }

        Self::new("Sphere", vertices, grid_indices(segments, rings))
    }

    /// Flat square on the XZ plane facing +Y
    pub fn plane(size: f32, subdivisions: u32) -> Self {
        let subdivisions = subdivisions.max(1);
        let step = size / subdivisions as f32;
        let mut vertices = Vec::with_capacity(((subdivisions + 1) * (subdivisions + 1)) as usize);

        for row in 0..=subdivisions {
            for column in 0..=subdivisions {
                vertices.push(Vertex {
                    position: Vec3::new(
                        -size / 2.0 + column as f32 * step,
                        0.0,
                        size / 2.0 - row as f32 * step,
                    ),
                    normal: Vec3::Y,
                    uv: Vec2::new(
                        column as f32 / subdivisions as f32,
                        row as f32 / subdivisions as f32,
                    ),
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }
        }

        Self::new("Plane", vertices, grid_indices(subdivisions, subdivisions))
    }

    /// Unit quad facing -Z; `double_sided` adds a back face
    pub fn quad(double_sided: bool) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let sides: &[Vec3] = if double_sided { &[-Vec3::Z, Vec3::Z] } else { &[-Vec3::Z] };

        for normal in sides {
            let right = if normal.z < 0.0 { Vec3::X } else { -Vec3::X };
            let base = vertices.len() as u32;
            for (u, v) in [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)] {
                vertices.push(Vertex {
                    position: right * (u - 0.5) + Vec3::Y * (0.5 - v),
                    normal: *normal,
                    uv: Vec2::new(u, v),
                    tangent: right.extend(1.0),
                });
            }
            indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        }

        let name = if double_sided { "Double-Sided Quad" } else { "Quad" };
        Self::new(name, vertices, indices)
    }

    /// Cylinder along Y with caps
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let half = height / 2.0;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for i in 0..=segments {
            let angle = TAU * i as f32 / segments as f32;
            let normal = Vec3::new(angle.cos(), 0.0, angle.sin());
            let tangent = Vec4::new(-angle.sin(), 0.0, angle.cos(), 1.0);
            let u = i as f32 / segments as f32;
            for (y, v) in [(half, 0.0), (-half, 1.0)] {
                vertices.push(Vertex {
                    position: Vec3::new(normal.x * radius, y, normal.z * radius),
                    normal,
                    uv: Vec2::new(u, v),
                    tangent,
                });
            }
        }
        // Side vertices are interleaved top/bottom per column
        for i in 0..segments {
            let top = i * 2;
            indices.extend_from_slice(&[top, top + 2, top + 1, top + 1, top + 2, top + 3]);
        }

        for (y, normal) in [(half, Vec3::Y), (-half, -Vec3::Y)] {
            let center = vertices.len() as u32;
            vertices.push(Vertex {
                position: Vec3::new(0.0, y, 0.0),
                normal,
                uv: Vec2::splat(0.5),
                tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            });
            for i in 0..=segments {
                let angle = TAU * i as f32 / segments as f32;
                vertices.push(Vertex {
                    position: Vec3::new(angle.cos() * radius, y, angle.sin() * radius),
                    normal,
                    uv: Vec2::new(0.5 + angle.cos() * 0.5, 0.5 + angle.sin() * 0.5),
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }
            for i in 0..segments {
                let (a, b) = (center + 1 + i, center + 2 + i);
                if normal.y > 0.0 {
                    indices.extend_from_slice(&[center, b, a]);
                } else {
                    indices.extend_from_slice(&[center, a, b]);
                }
            }
        }

        Self::new("Cylinder", vertices, indices)
    }

    /// Torus around the Y axis
    pub fn torus(major_radius: f32, minor_radius: f32, segments: u32, sides: u32) -> Self {
        let segments = segments.max(3);
        let sides = sides.max(3);
        let mut vertices = Vec::with_capacity(((segments + 1) * (sides + 1)) as usize);

        for side in 0..=sides {
            let phi = TAU * side as f32 / sides as f32;
            for segment in 0..=segments {
                let theta = TAU * segment as f32 / segments as f32;
                let ring_direction = Vec3::new(theta.cos(), 0.0, theta.sin());
                let normal = ring_direction * phi.cos() + Vec3::Y * phi.sin();
                vertices.push(Vertex {
                    position: ring_direction * major_radius + normal * minor_radius,
                    normal,
                    uv: Vec2::new(segment as f32 / segments as f32, side as f32 / sides as f32),
                    tangent: Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0),
                });
            }
        }

        // The tube angle runs upward, opposite to the sphere's rings
        let mut indices = grid_indices(segments, sides);
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
        Self::new("Torus", vertices, indices)
    }
}

/// Two triangles per cell of a `(columns + 1) x (rows + 1)` vertex grid
fn grid_indices(columns: u32, rows: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity((columns * rows * 6) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let current = row * (columns + 1) + column;
            let below = current + columns + 1;
            indices.extend_from_slice(&[current, current + 1, below, current + 1, below + 1, below]);
        }
    }
    indices
}

/// Mesh uploaded to vertex and index buffers
#[derive(Debug)]
pub struct GpuMesh {
    name: String,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    pub fn upload<B: GraphicsBackend>(backend: &mut B, mesh: &Mesh) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", mesh.name)),
                size: (mesh.vertices.len() * std::mem::size_of::<Vertex>()) as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", mesh.name)),
                size: (mesh.indices.len() * std::mem::size_of::<u32>()) as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&mesh.indices),
        )?;

        Ok(Self {
            name: mesh.name.clone(),
            vertex_buffer,
            index_buffer,
            vertex_count: mesh.vertices.len() as u32,
            index_count: mesh.indices.len() as u32,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_range(mesh: &Mesh) {
        assert_eq!(mesh.indices.len() % 3, 0);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count), "{} has out of range indices", mesh.name);
    }

    #[test]
    fn test_generators_produce_valid_meshes() {
        for mesh in [
            Mesh::cube(),
            Mesh::sphere(16, 8),
            Mesh::plane(2.0, 4),
            Mesh::quad(true),
            Mesh::cylinder(0.5, 1.0, 12),
            Mesh::torus(0.5, 0.2, 16, 8),
        ] {
            assert_indices_in_range(&mesh);
            assert!(mesh.triangle_count() > 0);
        }
    }

    #[test]
    fn test_generators_wind_clockwise_front_faces() {
        for mesh in [
            Mesh::cube(),
            Mesh::sphere(16, 8),
            Mesh::plane(2.0, 4),
            Mesh::quad(true),
            Mesh::cylinder(0.5, 1.0, 12),
            Mesh::torus(0.5, 0.2, 16, 8),
        ] {
            for triangle in mesh.indices.chunks_exact(3) {
                let [a, b, c] = [0, 1, 2].map(|i| &mesh.vertices[triangle[i] as usize]);
                let face = (b.position - a.position).cross(c.position - a.position);
                if face.length_squared() < 1e-10 {
                    continue;
                }
                let normal = a.normal + b.normal + c.normal;
                assert!(
                    face.dot(normal) > 0.0,
                    "{} has a triangle facing inward: {:?}",
                    mesh.name,
                    triangle
                );
            }
        }
    }

    #[test]
    fn test_cube_counts() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for vertex in &cube.vertices {
            assert!((vertex.position.abs().max_element() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tangents_are_orthogonal_to_normals() {
        let mut mesh = Mesh::sphere(12, 6);
        mesh.calculate_tangents();
        for vertex in &mesh.vertices {
            assert!(vertex.tangent.truncate().dot(vertex.normal).abs() < 1e-4);
        }
    }

    #[test]
    fn test_missing_obj_is_an_asset_error() {
        let result = Mesh::from_obj("missing", "does/not/exist.obj");
        assert!(matches!(result, Err(AssetError::Mesh { .. })));
    }
}
