//! Scene-level behaviour: transform caching, shared materials and inert bindings.

mod common;

use std::f32::consts::{FRAC_PI_2, PI};
use std::rc::Rc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use rstest::rstest;

use common::{engine, lit_material, populate};
use forward_renderer::backend::{
    BindGroupEntry, BindGroupHandle, HeadlessBackend, RecordedCommand,
};
use forward_renderer::pipeline::NullOverlay;
use forward_renderer::resources::{Mesh, ShaderProgram, UniformKind};
use forward_renderer::scene::{Camera, Entity, InputState, Transform};
use forward_renderer::EngineConfig;

fn expected_world(position: Vec3, pitch_yaw_roll: Vec3, scale: Vec3) -> Mat4 {
    let rotation = Quat::from_euler(EulerRot::YXZ, pitch_yaw_roll.y, pitch_yaw_roll.x, pitch_yaw_roll.z);
    Mat4::from_translation(position) * Mat4::from_quat(rotation) * Mat4::from_scale(scale)
}

// ============================================================================
// Transform
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    SetPosition(Vec3),
    SetRotation(Vec3),
    SetScale(Vec3),
    MoveAbsolute(Vec3),
    MoveRelative(Vec3),
    Rotate(Vec3),
    ScaleBy(Vec3),
    Read,
}

fn apply(transform: &mut Transform, step: Step) {
    match step {
        Step::SetPosition(v) => transform.set_position(v),
        Step::SetRotation(v) => transform.set_rotation(v),
        Step::SetScale(v) => transform.set_scale(v),
        Step::MoveAbsolute(v) => transform.move_absolute(v),
        Step::MoveRelative(v) => transform.move_relative(v),
        Step::Rotate(v) => transform.rotate(v),
        Step::ScaleBy(v) => transform.scale_by(v),
        Step::Read => {
            transform.world_matrix();
        }
    }
}

#[rstest]
#[case::setters_only(vec![
    Step::SetPosition(Vec3::new(1.0, 2.0, 3.0)),
    Step::SetRotation(Vec3::new(0.3, 0.2, 0.1)),
    Step::SetScale(Vec3::splat(2.0)),
])]
#[case::reads_between_mutations(vec![
    Step::MoveAbsolute(Vec3::X),
    Step::Read,
    Step::Rotate(Vec3::new(0.0, FRAC_PI_2, 0.0)),
    Step::Read,
    Step::MoveRelative(Vec3::new(0.0, 0.0, 2.0)),
    Step::ScaleBy(Vec3::new(1.0, 3.0, 1.0)),
])]
#[case::long_burst((0..50).map(|i| Step::Rotate(Vec3::splat(i as f32 * 0.01))).collect())]
fn test_world_matrix_matches_final_state(#[case] steps: Vec<Step>) {
    let mut transform = Transform::new();
    for step in steps {
        apply(&mut transform, step);
    }

    let expected = expected_world(
        transform.position(),
        transform.pitch_yaw_roll(),
        transform.scale(),
    );
    assert!(transform.world_matrix().abs_diff_eq(expected, 1e-5));
    assert!(!transform.is_dirty());
}

#[test]
fn test_consecutive_reads_are_bit_identical() {
    let mut transform = Transform::from_components(
        Vec3::new(-2.0, 1.0, 7.5),
        Vec3::new(0.7, -1.3, 0.2),
        Vec3::new(1.5, 0.5, 2.0),
    );
    transform.rotate(Vec3::new(0.01, 0.02, 0.03));

    let first = transform.world_matrix();
    let second = transform.world_matrix();

    assert_eq!(first.to_cols_array(), second.to_cols_array());
    assert_eq!(
        transform.world_inverse_transpose_matrix().to_cols_array(),
        transform.world_inverse_transpose_matrix().to_cols_array()
    );
}

#[test]
fn test_quarter_yaw_separates_relative_and_absolute_moves() {
    let mut absolute = Transform::new();
    absolute.rotate(Vec3::new(0.0, FRAC_PI_2, 0.0));
    absolute.move_absolute(Vec3::X);

    let mut relative = Transform::new();
    relative.rotate(Vec3::new(0.0, FRAC_PI_2, 0.0));
    relative.move_relative(Vec3::X);

    assert!(absolute.position().abs_diff_eq(Vec3::X, 1e-6));
    // Local +X points down world -Z after a quarter turn to the right
    assert!(relative.position().abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-6));
}

#[rstest]
#[case::negative_pitch(-1.0)]
#[case::positive_pitch(1.0)]
fn test_look_pitch_stops_at_vertical(#[case] direction: f32) {
    let mut camera = Camera::new(1.0, Vec3::ZERO).with_look_speed(0.01);
    let input = InputState {
        look_active: true,
        ..Default::default()
    };

    for _ in 0..10 {
        let mut frame = input.clone();
        frame.add_mouse_delta(0.0, direction * 100.0);
        camera.update(0.016, &frame);
    }

    assert_eq!(camera.transform().pitch_yaw_roll().x, direction * FRAC_PI_2);
}

#[test]
fn test_identity_components_give_identity_matrix() {
    let transform = Transform::from_components(Vec3::ZERO, Vec3::ZERO, Vec3::ONE);

    assert_eq!(transform.world_matrix(), Mat4::IDENTITY);
    assert_eq!(transform.world_inverse_transpose_matrix(), Mat4::IDENTITY);
}

#[rstest]
#[case::unit_x(Vec3::X, Vec3::new(7.0, 0.0, 0.0))]
#[case::unit_y(Vec3::Y, Vec3::new(5.0, 2.0, 0.0))]
#[case::origin(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0))]
fn test_scale_applies_before_translation(#[case] local: Vec3, #[case] world: Vec3) {
    let mut transform = Transform::new();
    transform.set_scale(Vec3::splat(2.0));
    transform.move_absolute(Vec3::new(5.0, 0.0, 0.0));

    assert!(transform.world_matrix().transform_point3(local).abs_diff_eq(world, 1e-6));
}

#[test]
fn test_half_turn_roll_flips_up() {
    let mut transform = Transform::new();
    transform.set_rotation(Vec3::new(0.0, 0.0, PI));

    assert!(transform.up().abs_diff_eq(-Vec3::Y, 1e-6));
    assert!(transform.forward().abs_diff_eq(Vec3::Z, 1e-6));
}

// ============================================================================
// Per-Entity Uniforms
// ============================================================================

/// Vertex and pixel bind group with dynamic offset for each lit draw
fn main_pass_slots(commands: &[RecordedCommand]) -> Vec<[(BindGroupHandle, u32); 2]> {
    let mut in_main = false;
    let mut groups: [Option<(BindGroupHandle, u32)>; 2] = [None, None];
    let mut slots = Vec::new();
    for command in commands {
        match command {
            RecordedCommand::BeginRenderPass { label, .. } => {
                in_main = label.as_deref() == Some("Main Color Pass");
                groups = [None, None];
            }
            RecordedCommand::SetBindGroup {
                index,
                bind_group,
                offsets,
            } if *index < 2 => {
                groups[*index as usize] = Some((*bind_group, offsets.first().copied().unwrap_or(0)));
            }
            RecordedCommand::DrawIndexed { .. } if in_main => {
                if let [Some(vertex), Some(pixel)] = groups {
                    slots.push([vertex, pixel]);
                }
            }
            _ => {}
        }
    }
    slots
}

/// Uniform bytes a draw sees through `group` at `offset`
fn slot_bytes(backend: &HeadlessBackend, (group, offset): (BindGroupHandle, u32)) -> &[u8] {
    let buffer = backend
        .bind_group_entries(group)
        .unwrap()
        .iter()
        .find_map(|(_, entry)| match entry {
            BindGroupEntry::Buffer { buffer, .. } => Some(*buffer),
            _ => None,
        })
        .unwrap();
    &backend.buffer_contents(buffer).unwrap()[offset as usize..]
}

fn read_matrix(block: &[u8], program: &ShaderProgram, name: &str) -> Mat4 {
    let offset = program.uniform_field(name).unwrap().offset as usize;
    Mat4::from_cols_array(&bytemuck::pod_read_unaligned(&block[offset..offset + 64]))
}

#[test]
fn test_each_draw_reads_its_own_entity_block() {
    let mut engine = engine(320, 240, EngineConfig::default());
    let material = populate(&mut engine, 2);
    engine.scene_mut().entities[1]
        .transform_mut()
        .set_scale(Vec3::new(1.0, 2.0, 3.0));
    engine.backend_mut().take_commands();
    engine.draw(&mut NullOverlay).unwrap();

    let slots = main_pass_slots(engine.backend().commands());
    assert_eq!(slots.len(), 2);
    assert_ne!(slots[0][0], slots[1][0]);

    let camera = engine.scene().active_camera();
    let material = material.borrow();
    let vs = material.vertex_program().borrow();
    let ps = material.pixel_program().borrow();
    for (entity, [vertex_slot, pixel_slot]) in engine.scene().entities.iter().zip(&slots) {
        let block = slot_bytes(engine.backend(), *vertex_slot);
        let transform = entity.transform();
        assert_eq!(read_matrix(block, &vs, "world"), transform.world_matrix());
        assert_eq!(
            read_matrix(block, &vs, "world_inverse_transpose"),
            transform.world_inverse_transpose_matrix()
        );
        assert_eq!(read_matrix(block, &vs, "view"), camera.view_matrix());
        assert_eq!(read_matrix(block, &vs, "projection"), camera.projection_matrix());

        let block = slot_bytes(engine.backend(), *pixel_slot);
        let offset = ps.uniform_field("camera_position").unwrap().offset as usize;
        let position: [f32; 3] = bytemuck::pod_read_unaligned(&block[offset..offset + 12]);
        assert_eq!(Vec3::from_array(position), camera.position());
    }
}

// ============================================================================
// Materials
// ============================================================================

#[test]
fn test_material_edits_reach_every_entity() {
    let mut engine = engine(320, 240, EngineConfig::default());
    let material = populate(&mut engine, 2);

    let (first, second) = {
        let entities = &engine.scene().entities;
        (entities[0].material().clone(), entities[1].material().clone())
    };
    assert!(Rc::ptr_eq(&first, &second));

    first.borrow_mut().color_tint = Vec3::new(1.0, 0.25, 0.0);
    assert_eq!(second.borrow().color_tint, Vec3::new(1.0, 0.25, 0.0));

    engine.draw(&mut NullOverlay).unwrap();

    let material = material.borrow();
    let ps = material.pixel_program().borrow();
    let field = ps.uniform_field("color_tint").unwrap();
    assert_eq!(field.kind, UniformKind::Float3);
    let offset = field.offset as usize;
    let tint: [f32; 3] = bytemuck::pod_read_unaligned(&ps.pending_data()[offset..offset + 12]);
    assert_eq!(tint, [1.0, 0.25, 0.0]);
}

#[test]
fn test_replacing_a_material_leaves_other_entities_alone() {
    let mut engine = engine(320, 240, EngineConfig::default());
    let shared = populate(&mut engine, 2);
    let own = lit_material(&mut engine, "Own");

    engine.scene_mut().entities[0].set_material(own.clone());
    own.borrow_mut().set_roughness(0.9);

    assert!(Rc::ptr_eq(engine.scene().entities[1].material(), &shared));
    assert_eq!(shared.borrow().roughness(), 0.5);
}

#[test]
fn test_unmatched_binding_names_are_inert() {
    let mut engine = engine(320, 240, EngineConfig::default());
    populate(&mut engine, 1);
    let baseline = engine.draw(&mut NullOverlay).unwrap().draw_count;

    let texture = engine
        .upload_texture(&forward_renderer::resources::TextureData::solid_color(
            [255, 0, 0, 255],
            "red",
        ))
        .unwrap();
    let sampler = engine
        .create_sampler(&forward_renderer::backend::SamplerDescriptor::clamp("Unused"))
        .unwrap();
    let material = lit_material(&mut engine, "Mismatched");
    material.borrow_mut().add_texture("Albedo", texture.view);
    material.borrow_mut().add_sampler("BasicSampler", sampler);

    let cube = engine.upload_mesh(&Mesh::cube()).unwrap();
    engine
        .scene_mut()
        .add_entity(Entity::new("Mismatched", cube, material.clone()));

    let report = engine.draw(&mut NullOverlay).unwrap();
    // One more shadow caster and one more lit draw
    assert_eq!(report.draw_count, baseline + 2);

    let material = material.borrow();
    let mut ps = material.pixel_program().borrow_mut();
    assert!(ps.resource_slot("Albedo").is_none());
    assert!(!ps.set_float("not_a_uniform", 1.0));
}
