//! Frame pipeline integration tests against the headless backend.
//!
//! The headless backend records every command, so these tests check pass
//! ordering, target lifetimes across resize and present behaviour without a GPU.

mod common;

use std::collections::HashMap;

use glam::Vec3;
use rstest::rstest;

use common::{draw_calls, engine, pass_targets, populate, RecordingOverlay};
use forward_renderer::backend::{
    BindGroupEntry, BufferHandle, CullMode, GraphicsBackend, RecordedCommand, SamplerDescriptor,
};
use forward_renderer::pipeline::{
    BoundTargets, FrameStage, NullOverlay, TargetRef, SHADOW_PREVIEW_SIZE,
};
use forward_renderer::resources::{CubemapData, UniformRing};
use forward_renderer::{
    ChannelOffsets, EngineConfig, EngineError, PostEffectSettings, ShadowConfig,
};

fn two_effects() -> Vec<PostEffectSettings> {
    vec![
        PostEffectSettings::Blur { radius: 2 },
        PostEffectSettings::ChromaticAberration(ChannelOffsets {
            red: 0.005,
            green: 0.0,
            blue: -0.005,
        }),
    ]
}

// ============================================================================
// Pass Ordering
// ============================================================================

#[test]
fn test_render_targets_bind_in_pass_order() {
    let mut engine = engine(800, 600, EngineConfig::default().with_post_effects(two_effects()));
    populate(&mut engine, 3);
    engine.backend_mut().take_commands();

    let mut overlay = RecordingOverlay::default();
    let report = engine.draw(&mut overlay).unwrap();

    assert_eq!(
        report.target_binds,
        vec![
            TargetRef::ShadowMap,
            TargetRef::IntermediateA,
            TargetRef::IntermediateB,
            TargetRef::BackBuffer,
            TargetRef::BackBuffer,
        ]
    );

    // The same order must be visible in the recorded commands
    let targets = engine.pipeline().targets();
    let shadow = targets.shadow_map().view;
    let a = targets.intermediate_a().unwrap().view;
    let b = targets.intermediate_b().unwrap().view;
    let binds = pass_targets(engine.backend().commands());
    assert_eq!(binds.len(), 5);
    assert_eq!(&binds[..3], &[shadow, a, b]);
    assert!(engine.backend().is_swapchain_view(binds[3]));
    assert_eq!(binds[4], binds[3]);
    assert_eq!(overlay.targets, vec![binds[3]]);
}

#[test]
fn test_shadow_pass_writes_depth_only() {
    let mut engine = engine(800, 600, EngineConfig::default());
    populate(&mut engine, 2);
    engine.backend_mut().take_commands();

    engine.draw(&mut NullOverlay).unwrap();

    let shadow = engine.pipeline().targets().shadow_map().view;
    let first_pass = engine
        .backend()
        .commands()
        .iter()
        .find_map(|command| match command {
            RecordedCommand::BeginRenderPass { color, depth, .. } => Some((color.clone(), *depth)),
            _ => None,
        })
        .unwrap();
    assert!(first_pass.0.is_empty());
    assert_eq!(first_pass.1, Some(shadow));
}

#[test]
fn test_stages_run_in_fixed_order() {
    let mut engine = engine(640, 480, EngineConfig::default().with_post_effects(two_effects()));
    populate(&mut engine, 1);

    let report = engine.draw(&mut NullOverlay).unwrap();

    assert_eq!(
        report.stages,
        vec![
            FrameStage::Clear,
            FrameStage::Shadow,
            FrameStage::MainColor,
            FrameStage::PostProcess("Blur".into()),
            FrameStage::PostProcess("Chromatic Aberration".into()),
            FrameStage::UiOverlay,
            FrameStage::Present { vsync: true },
        ]
    );
}

#[test]
fn test_disabled_shadows_skip_the_shadow_pass() {
    let config = EngineConfig::default().with_shadow(ShadowConfig {
        enabled: false,
        ..Default::default()
    });
    let mut engine = engine(640, 480, config);
    populate(&mut engine, 2);

    let report = engine.draw(&mut NullOverlay).unwrap();

    assert!(!report.ran(&FrameStage::Shadow));
    assert_eq!(report.target_binds.first(), Some(&TargetRef::IntermediateA));
}

#[test]
fn test_draw_count_matches_recorded_draws() {
    let mut engine = engine(640, 480, EngineConfig::default().with_post_effects(two_effects()));
    populate(&mut engine, 3);
    engine.backend_mut().take_commands();

    let report = engine.draw(&mut NullOverlay).unwrap();

    // 3 shadow casters, 3 lit draws, 2 full-screen effects
    assert_eq!(report.draw_count, 8);
    assert_eq!(draw_calls(engine.backend().commands()), report.draw_count);
}

#[test]
fn test_more_entities_than_ring_slots_never_share_a_slot() {
    let count = UniformRing::DEFAULT_SLOTS as usize + 44;
    let mut engine = engine(640, 480, EngineConfig::default().with_post_effects(vec![]));
    populate(&mut engine, count);
    engine.backend_mut().take_commands();

    let report = engine.draw(&mut NullOverlay).unwrap();
    // One shadow caster and one lit draw per entity, plus the passthrough copy
    assert_eq!(report.draw_count as usize, count * 2 + 1);

    let mut writes: HashMap<(BufferHandle, u64), u32> = HashMap::new();
    for command in engine.backend().commands() {
        if let RecordedCommand::WriteBuffer { buffer, offset, .. } = command {
            *writes.entry((*buffer, *offset)).or_default() += 1;
        }
    }
    let reused = writes.values().filter(|&&n| n > 1).count();
    assert_eq!(reused, 0);

    // Later frames reuse the pages the busiest frame created
    engine.backend_mut().take_commands();
    engine.draw(&mut NullOverlay).unwrap();
    for command in engine.backend().commands() {
        if let RecordedCommand::WriteBuffer { buffer, offset, .. } = command {
            assert!(writes.contains_key(&(*buffer, *offset)));
        }
    }
}

#[rstest]
#[case::shadow_casters("Shadow VS", CullMode::Back)]
#[case::lit_geometry("Lit VS + Lit PS", CullMode::Back)]
#[case::sky("Sky VS + Sky PS", CullMode::None)]
#[case::fullscreen_copy("Fullscreen VS + Passthrough PS", CullMode::None)]
fn test_pipelines_cull_by_pass(#[case] label: &str, #[case] expected: CullMode) {
    let mut engine = engine(640, 480, EngineConfig::default().with_post_effects(vec![]));
    populate(&mut engine, 1);
    let sampler = engine.create_sampler(&SamplerDescriptor::clamp("Sky")).unwrap();
    let sky = CubemapData::gradient(4, Vec3::Z, Vec3::ONE, Vec3::ZERO);
    engine.set_sky(&sky, sampler).unwrap();
    engine.backend_mut().take_commands();

    engine.draw(&mut NullOverlay).unwrap();

    let cull_mode = engine
        .backend()
        .commands()
        .iter()
        .find_map(|command| match command {
            RecordedCommand::CreatePipeline {
                label: Some(created),
                cull_mode,
            } if created == label => Some(*cull_mode),
            _ => None,
        });
    assert_eq!(cull_mode, Some(expected));
}

// ============================================================================
// Shadow Preview
// ============================================================================

#[test]
fn test_shadow_preview_copies_the_fresh_shadow_map() {
    let mut engine = engine(640, 480, EngineConfig::default());
    populate(&mut engine, 2);
    engine.set_shadow_preview(true).unwrap();
    engine.backend_mut().take_commands();

    let report = engine.draw(&mut NullOverlay).unwrap();

    assert_eq!(
        &report.stages[..4],
        &[
            FrameStage::Clear,
            FrameStage::Shadow,
            FrameStage::ShadowPreview,
            FrameStage::MainColor,
        ]
    );
    assert_eq!(
        &report.target_binds[..3],
        &[TargetRef::ShadowMap, TargetRef::ShadowPreview, TargetRef::IntermediateA]
    );

    let preview = engine.pipeline().shadow_preview_view().unwrap();
    assert_eq!(
        engine.backend().view_extent(preview),
        Some((SHADOW_PREVIEW_SIZE, SHADOW_PREVIEW_SIZE))
    );

    // The preview pixel program samples the shadow map written just before
    let shadow = engine.pipeline().targets().shadow_map().view;
    let commands = engine.backend().commands();
    let preview_pass = commands
        .iter()
        .position(|command| {
            matches!(command, RecordedCommand::BeginRenderPass { color, .. } if color.as_slice() == [preview])
        })
        .unwrap();
    let pixel_group = commands[preview_pass..]
        .iter()
        .find_map(|command| match command {
            RecordedCommand::SetBindGroup {
                index: 1,
                bind_group,
                ..
            } => Some(*bind_group),
            _ => None,
        })
        .unwrap();
    let entries = engine.backend().bind_group_entries(pixel_group).unwrap();
    assert!(entries.contains(&(0, BindGroupEntry::Texture(shadow))));
}

#[test]
fn test_shadow_preview_follows_shadow_toggle() {
    let mut engine = engine(640, 480, EngineConfig::default());
    populate(&mut engine, 1);
    engine.set_shadow_preview(true).unwrap();
    engine.pipeline_mut().set_shadows_enabled(false);

    let report = engine.draw(&mut NullOverlay).unwrap();
    assert!(!report.ran(&FrameStage::ShadowPreview));

    let view = engine.pipeline().shadow_preview_view().unwrap();
    engine.set_shadow_preview(false).unwrap();
    assert!(engine.pipeline().shadow_preview_view().is_none());
    assert!(!engine.backend().is_view_alive(view));
}

// ============================================================================
// Post Processing
// ============================================================================

#[rstest]
#[case::no_effects_configured(vec![], vec![])]
#[case::all_effects_disabled(two_effects(), vec![0, 1])]
fn test_passthrough_reaches_back_buffer(
    #[case] effects: Vec<PostEffectSettings>,
    #[case] disable: Vec<usize>,
) {
    let mut engine = engine(320, 240, EngineConfig::default().with_post_effects(effects));
    populate(&mut engine, 1);
    for index in disable {
        engine.pipeline_mut().post_process_mut().effects_mut()[index].enabled = false;
    }

    let report = engine.draw(&mut NullOverlay).unwrap();

    assert!(report.ran(&FrameStage::PostProcess("Passthrough".into())));
    assert_eq!(
        report.target_binds,
        vec![
            TargetRef::ShadowMap,
            TargetRef::IntermediateA,
            TargetRef::BackBuffer,
            TargetRef::BackBuffer,
        ]
    );
}

#[test]
fn test_single_enabled_effect_writes_back_buffer() {
    let mut engine = engine(320, 240, EngineConfig::default().with_post_effects(two_effects()));
    populate(&mut engine, 1);
    engine.pipeline_mut().post_process_mut().effects_mut()[0].enabled = false;

    let report = engine.draw(&mut NullOverlay).unwrap();

    assert!(!report.ran(&FrameStage::PostProcess("Blur".into())));
    assert!(report.ran(&FrameStage::PostProcess("Chromatic Aberration".into())));
    assert_eq!(report.target_binds[2], TargetRef::BackBuffer);
}

// ============================================================================
// Present
// ============================================================================

#[rstest]
#[case::synced(true)]
#[case::immediate(false)]
fn test_present_reports_vsync_policy(#[case] vsync: bool) {
    let mut engine = engine(320, 240, EngineConfig::default().with_vsync(vsync));
    populate(&mut engine, 1);

    let report = engine.draw(&mut NullOverlay).unwrap();

    assert_eq!(report.stages.last(), Some(&FrameStage::Present { vsync }));
    assert_eq!(
        engine.backend().commands().last(),
        Some(&RecordedCommand::Present { vsync })
    );
}

#[test]
fn test_vsync_toggle_applies_to_next_present() {
    let mut engine = engine(320, 240, EngineConfig::default());
    populate(&mut engine, 1);
    engine.draw(&mut NullOverlay).unwrap();

    engine.set_vsync(false);
    let report = engine.draw(&mut NullOverlay).unwrap();

    assert!(report.ran(&FrameStage::Present { vsync: false }));
}

#[test]
fn test_default_targets_rebound_after_present() {
    let mut engine = engine(320, 240, EngineConfig::default());
    populate(&mut engine, 1);

    engine.draw(&mut NullOverlay).unwrap();

    assert_eq!(engine.pipeline().bound_targets(), BoundTargets::DEFAULT);
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_recreates_every_sized_target() {
    let mut engine = engine(800, 600, EngineConfig::default().with_post_effects(two_effects()));
    populate(&mut engine, 2);
    engine.draw(&mut NullOverlay).unwrap();

    let old_views: Vec<_> = {
        let targets = engine.pipeline().targets();
        vec![
            targets.scene_depth().unwrap().view,
            targets.intermediate_a().unwrap().view,
            targets.intermediate_b().unwrap().view,
        ]
    };

    engine.resize(1920, 1080).unwrap();
    engine.backend_mut().take_commands();
    engine.draw(&mut RecordingOverlay::default()).unwrap();

    let targets = engine.pipeline().targets();
    assert_eq!(targets.extent(), (1920, 1080));
    for target in [
        targets.scene_depth().unwrap(),
        targets.intermediate_a().unwrap(),
        targets.intermediate_b().unwrap(),
    ] {
        assert_eq!(target.extent(), (1920, 1080), "{}", target.label);
    }
    assert_eq!(targets.shadow_map().extent(), (1024, 1024));

    let backend = engine.backend();
    for view in &old_views {
        assert!(!backend.is_view_alive(*view));
    }

    let shadow = targets.shadow_map().view;
    for command in backend.commands() {
        if let RecordedCommand::BeginRenderPass { color, depth, .. } = command {
            for view in color.iter().chain(depth.iter()) {
                assert!(!old_views.contains(view));
                if *view != shadow {
                    assert_eq!(backend.view_extent(*view), Some((1920, 1080)));
                }
            }
        }
    }
    assert_eq!(engine.last_report().map(|r| (r.width, r.height)), Some((1920, 1080)));
}

#[test]
fn test_resize_updates_camera_aspect() {
    let mut engine = engine(800, 600, EngineConfig::default());

    engine.resize(1920, 1080).unwrap();

    let aspect = engine.scene().active_camera().aspect();
    assert!((aspect - 1920.0 / 1080.0).abs() < 1e-6);
}

#[test]
fn test_zero_sized_resize_is_ignored() {
    let mut engine = engine(800, 600, EngineConfig::default());

    engine.resize(0, 600).unwrap();

    assert_eq!(engine.dimensions(), (800, 600));
    assert!(engine.pipeline().targets().is_valid());
}

#[test]
fn test_failed_resize_blocks_drawing_until_recovered() {
    let mut engine = engine(800, 600, EngineConfig::default());
    populate(&mut engine, 1);

    engine.backend_mut().set_fail_texture_creation(true);
    let err = engine.resize(1024, 768).unwrap_err();
    assert!(matches!(err, EngineError::Backend(_)));

    let err = engine.draw(&mut NullOverlay).unwrap_err();
    assert!(matches!(
        err,
        EngineError::StaleTargets {
            surface: (1024, 768),
            ..
        }
    ));

    engine.backend_mut().set_fail_texture_creation(false);
    engine.resize(1024, 768).unwrap();
    let report = engine.draw(&mut NullOverlay).unwrap();
    assert_eq!((report.width, report.height), (1024, 768));
}

#[test]
fn test_surface_change_without_resize_is_rejected() {
    let mut engine = engine(800, 600, EngineConfig::default());
    populate(&mut engine, 1);

    engine.backend_mut().resize(1280, 720);

    assert!(matches!(
        engine.draw(&mut NullOverlay),
        Err(EngineError::StaleTargets { .. })
    ));
}

// ============================================================================
// Cameras
// ============================================================================

#[test]
fn test_out_of_range_camera_keeps_current_view() {
    let mut engine = engine(800, 600, EngineConfig::default());
    populate(&mut engine, 1);
    let second = engine
        .scene_mut()
        .add_camera(forward_renderer::scene::Camera::new(4.0 / 3.0, Vec3::new(5.0, 5.0, 5.0)));

    assert!(engine.set_active_camera(second));
    assert!(!engine.set_active_camera(99));

    assert_eq!(engine.scene().active_camera_index(), second);
    assert_eq!(engine.scene().active_camera().position(), Vec3::new(5.0, 5.0, 5.0));
    engine.draw(&mut NullOverlay).unwrap();
}
