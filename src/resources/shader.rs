//! Shader programs with named uniform and resource slots.
//!
//! A [`ShaderProgram`] wraps one WGSL module for one stage. Vertex programs own
//! bind group 0 and pixel programs own bind group 1; entry points are `vs_main`
//! and `fs_main`. The module is parsed and validated with naga at creation, and
//! its bindings are reflected so callers can address them by name:
//!
//! - the members of the stage's `var<uniform>` struct become uniform fields,
//!   written with the `set_*` methods into a pending CPU block;
//! - `texture_*` and `sampler*` globals become resource slots, bound with
//!   [`ShaderProgram::set_texture`] and [`ShaderProgram::set_sampler`].
//!
//! Unknown names are inert: the setter returns `false` and nothing is bound.
//! Nothing reaches the GPU until [`ShaderProgram::commit`], which copies the
//! pending block into the next slot of the program's uniform ring.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec2, Vec3, Vec4};
use naga::{AddressSpace, ImageClass, ImageDimension, ScalarKind, TypeInner, VectorSize};
use thiserror::Error;

use crate::backend::{
    BackendError, BackendResult, BindGroupEntry, BindGroupHandle, BufferHandle, BindGroupLayoutEntry,
    BindGroupLayoutHandle, BindingType, GraphicsBackend, SamplerHandle, ShaderStageFlags,
    TextureSampleType, TextureViewDimension, TextureViewHandle,
};
use crate::pipeline::{ActiveProgram, DrawContext, FallbackBindings};

use super::uniform_ring::UniformRing;

/// Shader program error type
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("Failed to parse shader '{label}':\n{message}")]
    Parse { label: String, message: String },
    #[error("Shader '{label}' failed validation: {message}")]
    Validation { label: String, message: String },
    #[error("Shader '{label}' has no `{entry_point}` entry point")]
    MissingEntryPoint {
        label: String,
        entry_point: &'static str,
    },
    #[error("Shader '{label}' declares unsupported binding `{name}`: {reason}")]
    UnsupportedBinding {
        label: String,
        name: String,
        reason: String,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Pipeline stage a program is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    /// Bind group index owned by programs of this stage
    pub fn group(self) -> u32 {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Pixel => 1,
        }
    }

    pub fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Pixel => "fs_main",
        }
    }

    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Pixel => naga::ShaderStage::Fragment,
        }
    }

    fn visibility(self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Pixel => ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Value kind of a reflected uniform field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Matrix4x4,
    /// Arrays, nested structs and anything else, writable only with `set_data`
    Raw,
}

/// A named field inside a program's uniform block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub offset: u32,
    pub size: u32,
    pub kind: UniformKind,
}

/// A named texture or sampler binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceSlot {
    Texture {
        binding: u32,
        sample_type: TextureSampleType,
        dimension: TextureViewDimension,
    },
    Sampler { binding: u32, comparison: bool },
}

impl ResourceSlot {
    pub fn binding(&self) -> u32 {
        match self {
            ResourceSlot::Texture { binding, .. } | ResourceSlot::Sampler { binding, .. } => *binding,
        }
    }
}

/// Bindings reflected from a WGSL module
#[derive(Debug, Clone, Default)]
pub struct Reflection {
    /// Binding index and byte size of the uniform block, if any
    pub uniform_block: Option<(u32, u32)>,
    pub fields: HashMap<String, UniformField>,
    pub resources: HashMap<String, ResourceSlot>,
}

/// Parse, validate and reflect a WGSL module for `stage`.
pub fn reflect_wgsl(label: &str, stage: ShaderStage, source: &str) -> Result<Reflection, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|e| ShaderError::Validation {
        label: label.to_string(),
        message: e.to_string(),
    })?;

    let unsupported = |name: &str, reason: String| ShaderError::UnsupportedBinding {
        label: label.to_string(),
        name: name.to_string(),
        reason,
    };

    let mut reflection = Reflection::default();
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        if binding.group != stage.group() {
            return Err(unsupported(
                &name,
                format!("{:?} programs bind group {}, found group {}", stage, stage.group(), binding.group),
            ));
        }

        let inner = &module.types[global.ty].inner;
        match (global.space, inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                if reflection.uniform_block.is_some() {
                    return Err(unsupported(&name, "only one uniform block per program".into()));
                }
                reflection.uniform_block = Some((binding.binding, *span));
                for member in members {
                    let Some(member_name) = &member.name else {
                        continue;
                    };
                    let member_inner = &module.types[member.ty].inner;
                    reflection.fields.insert(
                        member_name.clone(),
                        UniformField {
                            offset: member.offset,
                            size: member_inner.size(module.to_ctx()),
                            kind: uniform_kind(member_inner),
                        },
                    );
                }
            }
            (AddressSpace::Uniform, _) => {
                return Err(unsupported(&name, "uniform blocks must be structs".into()));
            }
            (AddressSpace::Handle, TypeInner::Image { dim, arrayed, class }) => {
                let dimension = match (dim, arrayed) {
                    (ImageDimension::D2, false) => TextureViewDimension::D2,
                    (ImageDimension::Cube, false) => TextureViewDimension::Cube,
                    _ => return Err(unsupported(&name, format!("texture dimension {dim:?}"))),
                };
                let sample_type = match class {
                    ImageClass::Sampled {
                        kind: ScalarKind::Float,
                        multi: false,
                    } => TextureSampleType::Float { filterable: true },
                    ImageClass::Depth { multi: false } => TextureSampleType::Depth,
                    _ => return Err(unsupported(&name, format!("texture class {class:?}"))),
                };
                reflection.resources.insert(
                    name,
                    ResourceSlot::Texture {
                        binding: binding.binding,
                        sample_type,
                        dimension,
                    },
                );
            }
            (AddressSpace::Handle, TypeInner::Sampler { comparison }) => {
                reflection.resources.insert(
                    name,
                    ResourceSlot::Sampler {
                        binding: binding.binding,
                        comparison: *comparison,
                    },
                );
            }
            (space, _) => {
                return Err(unsupported(&name, format!("address space {space:?}")));
            }
        }
    }

    let entry_point = stage.entry_point();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == stage.naga_stage())
    {
        return Err(ShaderError::MissingEntryPoint {
            label: label.to_string(),
            entry_point,
        });
    }

    Ok(reflection)
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    match *inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float if scalar.width == 4 => UniformKind::Float,
            ScalarKind::Sint | ScalarKind::Uint if scalar.width == 4 => UniformKind::Int,
            _ => UniformKind::Raw,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            match size {
                VectorSize::Bi => UniformKind::Float2,
                VectorSize::Tri => UniformKind::Float3,
                VectorSize::Quad => UniformKind::Float4,
            }
        }
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.width == 4 => UniformKind::Matrix4x4,
        _ => UniformKind::Raw,
    }
}

/// Identifier used to key pipelines by the programs they combine
pub type ProgramId = u64;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct UniformBlock {
    binding: u32,
    size: u32,
    fields: HashMap<String, UniformField>,
    pending: Vec<u8>,
    ring: UniformRing,
    committed: BufferHandle,
    committed_offset: u32,
}

/// One compiled stage with reflected bindings, a pending uniform block and a
/// per-program uniform ring.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    label: Rc<str>,
    stage: ShaderStage,
    source: Rc<str>,
    layout: BindGroupLayoutHandle,
    uniforms: Option<UniformBlock>,
    resources: HashMap<String, ResourceSlot>,
    bound: HashMap<u32, BindGroupEntry>,
    bind_groups: HashMap<Vec<(u32, BindGroupEntry)>, BindGroupHandle>,
    reported_unknown: HashSet<String>,
}

/// Program handle shared between materials
pub type SharedProgram = Rc<RefCell<ShaderProgram>>;

impl ShaderProgram {
    /// Compile `source` for `stage` and create its bind group layout and uniform ring.
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self, ShaderError> {
        let reflection = reflect_wgsl(label, stage, source)?;

        let mut layout_entries = Vec::new();
        if let Some((binding, size)) = reflection.uniform_block {
            layout_entries.push(BindGroupLayoutEntry {
                binding,
                visibility: stage.visibility(),
                ty: BindingType::UniformBuffer {
                    dynamic_offset: true,
                    min_size: size as u64,
                },
            });
        }
        let mut slots: Vec<&ResourceSlot> = reflection.resources.values().collect();
        slots.sort_by_key(|slot| slot.binding());
        for slot in slots {
            let ty = match *slot {
                ResourceSlot::Texture {
                    sample_type,
                    dimension,
                    ..
                } => BindingType::Texture {
                    sample_type,
                    view_dimension: dimension,
                },
                ResourceSlot::Sampler { comparison, .. } => BindingType::Sampler { comparison },
            };
            layout_entries.push(BindGroupLayoutEntry {
                binding: slot.binding(),
                visibility: stage.visibility(),
                ty,
            });
        }
        let layout = backend.create_bind_group_layout(&layout_entries)?;

        let uniforms = match reflection.uniform_block {
            Some((binding, size)) => {
                let alignment = backend.uniform_offset_alignment() as u64;
                let ring = UniformRing::new(
                    backend,
                    label,
                    size as u64,
                    alignment,
                    UniformRing::DEFAULT_SLOTS,
                )?;
                Some(UniformBlock {
                    binding,
                    size,
                    fields: reflection.fields,
                    pending: vec![0; size as usize],
                    committed: ring.buffer(),
                    ring,
                    committed_offset: 0,
                })
            }
            None => None,
        };

        log::debug!(
            "Created {:?} program '{}' ({} uniform fields, {} resources)",
            stage,
            label,
            uniforms.as_ref().map_or(0, |u| u.fields.len()),
            reflection.resources.len()
        );

        Ok(Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            label: Rc::from(label),
            stage,
            source: Rc::from(source),
            layout,
            uniforms,
            resources: reflection.resources,
            bound: HashMap::new(),
            bind_groups: HashMap::new(),
            reported_unknown: HashSet::new(),
        })
    }

    /// Wrap into a shared handle
    pub fn shared(self) -> SharedProgram {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn layout(&self) -> BindGroupLayoutHandle {
        self.layout
    }

    pub fn uniform_field(&self, name: &str) -> Option<UniformField> {
        self.uniforms.as_ref()?.fields.get(name).copied()
    }

    pub fn resource_slot(&self, name: &str) -> Option<ResourceSlot> {
        self.resources.get(name).copied()
    }

    /// Bytes that the next commit will upload
    pub fn pending_data(&self) -> &[u8] {
        self.uniforms.as_ref().map_or(&[], |u| u.pending.as_slice())
    }

    /// Dynamic offset of the most recent commit
    pub fn committed_offset(&self) -> u32 {
        self.uniforms.as_ref().map_or(0, |u| u.committed_offset)
    }

    /// Ring page holding the most recent commit
    pub fn committed_buffer(&self) -> Option<BufferHandle> {
        self.uniforms.as_ref().map(|u| u.committed)
    }

    fn report_unknown(&mut self, name: &str) {
        if !self.reported_unknown.contains(name) {
            log::trace!("Program '{}' has no slot named '{}', ignoring", self.label, name);
            self.reported_unknown.insert(name.to_string());
        }
    }

    fn write_field(&mut self, name: &str, kind: Option<UniformKind>, bytes: &[u8]) -> bool {
        let field = self
            .uniforms
            .as_ref()
            .and_then(|u| u.fields.get(name).copied())
            .filter(|field| kind.map_or(true, |kind| field.kind == kind))
            .filter(|field| bytes.len() <= field.size as usize);

        if let (Some(field), Some(uniforms)) = (field, self.uniforms.as_mut()) {
            let start = field.offset as usize;
            uniforms.pending[start..start + bytes.len()].copy_from_slice(bytes);
            return true;
        }
        self.report_unknown(name);
        false
    }

    pub fn set_matrix4x4(&mut self, name: &str, value: Mat4) -> bool {
        self.write_field(name, Some(UniformKind::Matrix4x4), bytemuck::bytes_of(&value))
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        self.write_field(name, Some(UniformKind::Float), bytemuck::bytes_of(&value))
    }

    pub fn set_float2(&mut self, name: &str, value: Vec2) -> bool {
        self.write_field(name, Some(UniformKind::Float2), bytemuck::bytes_of(&value))
    }

    pub fn set_float3(&mut self, name: &str, value: Vec3) -> bool {
        self.write_field(name, Some(UniformKind::Float3), bytemuck::bytes_of(&value))
    }

    pub fn set_float4(&mut self, name: &str, value: Vec4) -> bool {
        self.write_field(name, Some(UniformKind::Float4), bytemuck::bytes_of(&value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> bool {
        self.write_field(name, Some(UniformKind::Int), bytemuck::bytes_of(&value))
    }

    /// Copy raw bytes to the start of a field of any kind; `data` may be shorter
    /// than the field.
    pub fn set_data(&mut self, name: &str, data: &[u8]) -> bool {
        self.write_field(name, None, data)
    }

    pub fn set_texture(&mut self, name: &str, view: TextureViewHandle) -> bool {
        match self.resources.get(name) {
            Some(ResourceSlot::Texture { binding, .. }) => {
                self.bound.insert(*binding, BindGroupEntry::Texture(view));
                true
            }
            _ => {
                self.report_unknown(name);
                false
            }
        }
    }

    pub fn set_sampler(&mut self, name: &str, sampler: SamplerHandle) -> bool {
        match self.resources.get(name) {
            Some(ResourceSlot::Sampler { binding, .. }) => {
                self.bound.insert(*binding, BindGroupEntry::Sampler(sampler));
                true
            }
            _ => {
                self.report_unknown(name);
                false
            }
        }
    }

    /// Upload the pending uniform block into the next ring slot.
    pub fn commit<B: GraphicsBackend>(&mut self, ctx: &mut DrawContext<'_, B>) -> BackendResult<()> {
        let frame = ctx.frame_index();
        if let Some(uniforms) = self.uniforms.as_mut() {
            let allocation = uniforms.ring.allocate(ctx.backend, frame)?;
            ctx.backend.write_buffer(allocation.buffer, allocation.offset, &uniforms.pending);
            uniforms.committed = allocation.buffer;
            uniforms.committed_offset = allocation.offset as u32;
        }
        Ok(())
    }

    fn resolve_entries(&self, fallback: &FallbackBindings) -> Vec<(u32, BindGroupEntry)> {
        let mut entries = Vec::with_capacity(self.resources.len() + 1);
        if let Some(uniforms) = &self.uniforms {
            entries.push((
                uniforms.binding,
                BindGroupEntry::Buffer {
                    buffer: uniforms.committed,
                    offset: 0,
                    size: Some(uniforms.size as u64),
                },
            ));
        }
        for slot in self.resources.values() {
            let binding = slot.binding();
            let entry = match (self.bound.get(&binding), slot) {
                (Some(entry), _) => *entry,
                (
                    None,
                    ResourceSlot::Texture {
                        sample_type,
                        dimension,
                        ..
                    },
                ) => BindGroupEntry::Texture(fallback.texture(*sample_type, *dimension)),
                (None, ResourceSlot::Sampler { comparison, .. }) => {
                    BindGroupEntry::Sampler(fallback.sampler(*comparison))
                }
            };
            entries.push((binding, entry));
        }
        entries.sort_by_key(|(binding, _)| *binding);
        entries
    }

    /// Bind this program's group with the committed offset and mark it active
    /// for the next draw.
    pub fn activate<B: GraphicsBackend>(&mut self, ctx: &mut DrawContext<'_, B>) -> BackendResult<()> {
        let entries = self.resolve_entries(ctx.fallback());
        let bind_group = match self.bind_groups.get(&entries) {
            Some(bind_group) => *bind_group,
            None => {
                let bind_group = ctx.backend.create_bind_group(self.layout, &entries)?;
                self.bind_groups.insert(entries, bind_group);
                bind_group
            }
        };

        match &self.uniforms {
            Some(uniforms) => {
                ctx.backend
                    .set_bind_group(self.stage.group(), bind_group, &[uniforms.committed_offset])
            }
            None => ctx.backend.set_bind_group(self.stage.group(), bind_group, &[]),
        }

        ctx.set_active(
            self.stage,
            ActiveProgram {
                id: self.id,
                label: self.label.clone(),
                source: self.source.clone(),
                layout: self.layout,
            },
        );
        Ok(())
    }

    /// Drop cached bind groups, e.g. after the views they reference were recreated.
    pub fn invalidate_bindings<B: GraphicsBackend>(&mut self, backend: &mut B) {
        for (_, bind_group) in self.bind_groups.drain() {
            backend.destroy_bind_group(bind_group);
        }
    }

    /// Forget every texture and sampler bound by name.
    pub fn clear_resources(&mut self) {
        self.bound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    const TEST_VS: &str = r#"
struct Uniforms {
    world: mat4x4<f32>,
    tint: vec3<f32>,
    roughness: f32,
    count: i32,
}
@group(0) @binding(0) var<uniform> uniforms: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return uniforms.world * vec4<f32>(position * uniforms.tint * uniforms.roughness, f32(uniforms.count));
}
"#;

    const TEST_PS: &str = r#"
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var basic_sampler: sampler;
@group(1) @binding(2) var shadow_map: texture_depth_2d;
@group(1) @binding(3) var shadow_sampler: sampler_comparison;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let lit = textureSampleCompare(shadow_map, shadow_sampler, vec2<f32>(0.5), 0.5);
    return textureSample(albedo, basic_sampler, vec2<f32>(0.5)) * lit;
}
"#;

    #[test]
    fn test_reflects_uniform_fields() {
        let reflection = reflect_wgsl("test", ShaderStage::Vertex, TEST_VS).unwrap();
        assert_eq!(reflection.uniform_block, Some((0, 96)));
        assert_eq!(
            reflection.fields["world"],
            UniformField { offset: 0, size: 64, kind: UniformKind::Matrix4x4 }
        );
        assert_eq!(
            reflection.fields["tint"],
            UniformField { offset: 64, size: 12, kind: UniformKind::Float3 }
        );
        assert_eq!(reflection.fields["roughness"].offset, 76);
        assert_eq!(reflection.fields["count"].kind, UniformKind::Int);
    }

    #[test]
    fn test_reflects_resources() {
        let reflection = reflect_wgsl("test", ShaderStage::Pixel, TEST_PS).unwrap();
        assert_eq!(
            reflection.resources["shadow_map"],
            ResourceSlot::Texture {
                binding: 2,
                sample_type: TextureSampleType::Depth,
                dimension: TextureViewDimension::D2,
            }
        );
        assert_eq!(
            reflection.resources["shadow_sampler"],
            ResourceSlot::Sampler { binding: 3, comparison: true }
        );
    }

    #[test]
    fn test_wrong_group_is_rejected() {
        let result = reflect_wgsl("test", ShaderStage::Pixel, TEST_VS);
        assert!(matches!(result, Err(ShaderError::UnsupportedBinding { .. })));
    }

    #[test]
    fn test_missing_entry_point() {
        let source = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let result = reflect_wgsl("test", ShaderStage::Pixel, source);
        assert!(matches!(result, Err(ShaderError::MissingEntryPoint { entry_point: "fs_main", .. })));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = reflect_wgsl("broken", ShaderStage::Vertex, "fn vs_main( {");
        assert!(matches!(result, Err(ShaderError::Parse { .. })));
    }

    #[test]
    fn test_setters_write_pending_block() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut program = ShaderProgram::new(&mut backend, "test", ShaderStage::Vertex, TEST_VS).unwrap();

        assert!(program.set_float("roughness", 0.25));
        assert!(program.set_int("count", 3));
        let data = program.pending_data();
        assert_eq!(&data[76..80], bytemuck::bytes_of(&0.25f32));
        assert_eq!(&data[80..84], bytemuck::bytes_of(&3i32));
    }

    #[test]
    fn test_unknown_names_are_inert() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut program = ShaderProgram::new(&mut backend, "test", ShaderStage::Vertex, TEST_VS).unwrap();
        let before = program.pending_data().to_vec();

        assert!(!program.set_float("does_not_exist", 1.0));
        assert!(!program.set_float("tint", 1.0));
        assert!(!program.set_texture("albedo", TextureViewHandle(99)));
        assert_eq!(program.pending_data(), before.as_slice());
    }

    #[test]
    fn test_oversized_data_is_rejected() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut program = ShaderProgram::new(&mut backend, "test", ShaderStage::Vertex, TEST_VS).unwrap();
        assert!(program.set_data("tint", &[0u8; 12]));
        assert!(!program.set_data("tint", &[0u8; 16]));
    }
}
