//! Forward rendering pipeline
//!
//! The frame is a fixed list of passes built by [`FramePipeline::plan`]:
//! 1. Shadow pass - depth from the shadow-casting light, optionally followed
//!    by a copy into the preview target
//! 2. Main color pass - lit entities and the sky into intermediate A
//! 3. Post-processing - enabled effects ping-pong between the intermediates,
//!    the last one writes the back buffer
//! 4. UI overlay - drawn straight onto the back buffer
//! 5. Present

mod draw;
mod main_pass;
mod pass;
pub mod postprocess;
mod shadow_pass;
mod targets;

pub use draw::*;
pub use main_pass::*;
pub use pass::*;
pub use postprocess::{ChannelOffsets, PostEffect, PostEffectSettings, PostProcessChain};
pub use shadow_pass::*;
pub use targets::*;

use crate::backend::{
    BackendResult, ColorAttachment, DepthBias, DepthStencilAttachment, GraphicsBackend, LoadOp,
    RenderPassDescriptor, SamplerDescriptor, SamplerHandle, StoreOp, TextureViewHandle,
};
use crate::error::{EngineError, EngineResult};
use crate::scene::Scene;
use crate::EngineConfig;

/// Draws an immediate-mode UI on top of the finished frame
pub trait UiOverlay<B: GraphicsBackend> {
    /// Render onto `target`, keeping its contents
    fn render(
        &mut self,
        backend: &mut B,
        target: TextureViewHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()>;
}

/// Overlay that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOverlay;

impl<B: GraphicsBackend> UiOverlay<B> for NullOverlay {
    fn render(&mut self, _: &mut B, _: TextureViewHandle, _: u32, _: u32) -> BackendResult<()> {
        Ok(())
    }
}

/// Owns every frame resource and runs the pass list
#[derive(Debug)]
pub struct FramePipeline {
    targets: FrameTargets,
    pipelines: PipelineCache,
    fallback: FallbackBindings,
    shadow: ShadowPass,
    preview: Option<ShadowPreview>,
    post: PostProcessChain,
    shadow_sampler: SamplerHandle,
    shadows_enabled: bool,
    clear_color: [f32; 4],
    frame_index: u64,
    bound: BoundTargets,
}

impl FramePipeline {
    /// Create targets for the current surface size and compile the built-in programs.
    pub fn new<B: GraphicsBackend>(backend: &mut B, config: &EngineConfig) -> EngineResult<Self> {
        let (width, height) = backend.surface_size();
        let targets = FrameTargets::new(backend, width, height, config.shadow.map_size)?;
        let fallback = FallbackBindings::new(backend)?;
        let clamp_sampler = backend.create_sampler(&SamplerDescriptor::clamp("Post Process Sampler"))?;
        let shadow_sampler =
            backend.create_sampler(&SamplerDescriptor::shadow_comparison("Shadow Sampler"))?;

        let shadow = ShadowPass::new(backend, config.shadow.clone())?;
        let post = PostProcessChain::new(backend, &config.post_process.effects, clamp_sampler)?;

        log::info!(
            "Frame pipeline ready at {}x{} (shadow map {}, {} post effects)",
            width,
            height,
            config.shadow.map_size,
            config.post_process.effects.len()
        );

        Ok(Self {
            targets,
            pipelines: PipelineCache::new(DepthBias {
                constant: config.shadow.depth_bias,
                slope_scale: config.shadow.slope_scaled_bias,
            }),
            fallback,
            shadow,
            preview: None,
            post,
            shadow_sampler,
            shadows_enabled: config.shadow.enabled,
            clear_color: config.clear_color,
            frame_index: 0,
            bound: BoundTargets::DEFAULT,
        })
    }

    pub fn targets(&self) -> &FrameTargets {
        &self.targets
    }

    pub fn post_process(&self) -> &PostProcessChain {
        &self.post
    }

    pub fn post_process_mut(&mut self) -> &mut PostProcessChain {
        &mut self.post
    }

    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow
    }

    pub fn shadows_enabled(&self) -> bool {
        self.shadows_enabled
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        self.shadows_enabled = enabled;
    }

    /// Create or drop the shadow map preview target
    pub fn set_shadow_preview<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        enabled: bool,
    ) -> EngineResult<()> {
        match (enabled, self.preview.take()) {
            (true, Some(preview)) => self.preview = Some(preview),
            (true, None) => self.preview = Some(ShadowPreview::new(backend)?),
            (false, Some(preview)) => preview.destroy(backend),
            (false, None) => {}
        }
        Ok(())
    }

    /// View holding the latest shadow map preview
    pub fn shadow_preview_view(&self) -> Option<TextureViewHandle> {
        self.preview.as_ref().map(|p| p.target().view)
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Targets bound for output once the last pass finished
    pub fn bound_targets(&self) -> BoundTargets {
        self.bound
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Number of render pipelines created so far
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// The ordered pass list for the current settings
    pub fn plan(&self) -> Vec<PassDescriptor> {
        let mut passes = Vec::new();

        if self.shadows_enabled {
            passes.push(PassDescriptor {
                kind: PassKind::Shadow,
                label: "Shadow Pass".into(),
                color: None,
                depth: Some(TargetRef::ShadowMap),
                clear: ClearPolicy::ClearDepth,
                input: None,
            });
            if self.preview.is_some() {
                passes.push(PassDescriptor {
                    kind: PassKind::ShadowPreview,
                    label: "Shadow Preview".into(),
                    color: Some(TargetRef::ShadowPreview),
                    depth: None,
                    clear: ClearPolicy::Clear {
                        color: [0.0, 0.0, 0.0, 1.0],
                    },
                    input: Some(TargetRef::ShadowMap),
                });
            }
        }

        passes.push(PassDescriptor {
            kind: PassKind::MainColor,
            label: "Main Color Pass".into(),
            color: Some(TargetRef::IntermediateA),
            depth: Some(TargetRef::SceneDepth),
            clear: ClearPolicy::Clear {
                color: self.clear_color,
            },
            input: None,
        });

        let mut chain: Vec<Option<usize>> = self.post.active().into_iter().map(Some).collect();
        if chain.is_empty() {
            chain.push(None);
        }
        let mut input = TargetRef::IntermediateA;
        let last = chain.len() - 1;
        for (position, effect) in chain.into_iter().enumerate() {
            let output = if position == last {
                TargetRef::BackBuffer
            } else {
                input.swap_intermediate()
            };
            passes.push(PassDescriptor {
                kind: PassKind::PostProcess(effect),
                label: format!("Post Process: {}", self.post.pass_name(effect)),
                color: Some(output),
                depth: None,
                clear: ClearPolicy::Clear {
                    color: [0.0, 0.0, 0.0, 1.0],
                },
                input: Some(input),
            });
            input = output;
        }

        passes.push(PassDescriptor {
            kind: PassKind::UiOverlay,
            label: "UI Overlay".into(),
            color: Some(TargetRef::BackBuffer),
            depth: None,
            clear: ClearPolicy::Load,
            input: None,
        });

        passes
    }

    fn view_of(&self, target: TargetRef, back_buffer: TextureViewHandle) -> Option<TextureViewHandle> {
        match target {
            TargetRef::ShadowMap => Some(self.targets.shadow_map().view),
            TargetRef::ShadowPreview => self.preview.as_ref().map(|p| p.target().view),
            TargetRef::SceneDepth => self.targets.scene_depth().map(|t| t.view),
            TargetRef::IntermediateA => self.targets.intermediate_a().map(|t| t.view),
            TargetRef::IntermediateB => self.targets.intermediate_b().map(|t| t.view),
            TargetRef::BackBuffer => Some(back_buffer),
        }
    }

    fn stale(&self, surface: (u32, u32)) -> EngineError {
        EngineError::StaleTargets {
            targets: self.targets.extent(),
            surface,
        }
    }

    /// Run every planned pass for `scene` and present.
    ///
    /// Fails with [`EngineError::StaleTargets`] if the targets do not match the
    /// surface, which happens only when the last resize failed or was skipped.
    pub fn execute<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        overlay: &mut dyn UiOverlay<B>,
    ) -> EngineResult<FrameReport> {
        let surface = backend.surface_size();
        if !self.targets.is_valid() || self.targets.extent() != surface {
            return Err(self.stale(surface));
        }

        let frame = backend.begin_frame()?;
        self.frame_index += 1;
        let (width, height) = (frame.width, frame.height);
        let swapchain_format = backend.swapchain_format();

        let mut report = FrameReport {
            frame_index: self.frame_index,
            width,
            height,
            ..Default::default()
        };
        report.stages.push(FrameStage::Clear);

        let light_space = self.shadow.scene_light_space(scene);
        let main_inputs = MainPassInputs {
            light_space,
            shadow_map: self.targets.shadow_map().view,
            shadow_sampler: self.shadow_sampler,
            shadows_enabled: self.shadows_enabled,
        };

        for pass in self.plan() {
            let color = match pass.color {
                Some(target) => Some(
                    self.view_of(target, frame.swapchain_view)
                        .ok_or_else(|| self.stale(surface))?,
                ),
                None => None,
            };
            let depth = match pass.depth {
                Some(target) => Some(
                    self.view_of(target, frame.swapchain_view)
                        .ok_or_else(|| self.stale(surface))?,
                ),
                None => None,
            };
            let input = match pass.input {
                Some(target) => self.view_of(target, frame.swapchain_view),
                None => None,
            };

            self.bound = BoundTargets {
                color: pass.color,
                depth: pass.depth,
            };
            if let Some(target) = pass.color.or(pass.depth) {
                report.target_binds.push(target);
            }

            let (state, stage, extent) = match pass.kind {
                PassKind::UiOverlay => {
                    if let Some(target) = color {
                        overlay.render(backend, target, width, height)?;
                    }
                    report.stages.push(FrameStage::UiOverlay);
                    continue;
                }
                PassKind::Shadow => {
                    let size = self.targets.shadow_map().width;
                    (PipelineState::shadow(), FrameStage::Shadow, (size, size))
                }
                PassKind::ShadowPreview => (
                    PipelineState::fullscreen(INTERMEDIATE_FORMAT),
                    FrameStage::ShadowPreview,
                    (SHADOW_PREVIEW_SIZE, SHADOW_PREVIEW_SIZE),
                ),
                PassKind::MainColor => (
                    PipelineState::opaque(INTERMEDIATE_FORMAT),
                    FrameStage::MainColor,
                    (width, height),
                ),
                PassKind::PostProcess(effect) => {
                    let format = if pass.color == Some(TargetRef::BackBuffer) {
                        swapchain_format
                    } else {
                        INTERMEDIATE_FORMAT
                    };
                    (
                        PipelineState::fullscreen(format),
                        FrameStage::PostProcess(self.post.pass_name(effect).to_string()),
                        (width, height),
                    )
                }
            };

            backend.begin_render_pass(&render_pass_descriptor(&pass, color, depth));
            backend.set_viewport(0.0, 0.0, extent.0 as f32, extent.1 as f32, 0.0, 1.0);

            let mut ctx = DrawContext::new(
                backend,
                &mut self.pipelines,
                &self.fallback,
                self.frame_index,
                state,
            );
            let result = match pass.kind {
                PassKind::Shadow => self.shadow.record(&mut ctx, scene, &light_space),
                PassKind::ShadowPreview => match (&self.preview, input) {
                    (Some(preview), Some(input)) => preview.record(&mut ctx, input),
                    _ => Ok(()),
                },
                PassKind::MainColor => record_main_pass(&mut ctx, scene, &main_inputs),
                PassKind::PostProcess(effect) => match input {
                    Some(input) => self.post.record(&mut ctx, effect, input, width, height),
                    None => Ok(()),
                },
                PassKind::UiOverlay => Ok(()),
            };
            report.draw_count += ctx.draw_count();
            backend.end_render_pass();
            result?;

            if matches!(pass.kind, PassKind::Shadow | PassKind::ShadowPreview) {
                // Later passes start from the back buffer and scene depth again
                self.bound = BoundTargets::DEFAULT;
            }
            report.stages.push(stage);
        }

        backend.end_frame()?;
        report.stages.push(FrameStage::Present {
            vsync: backend.vsync(),
        });
        self.bound = BoundTargets::DEFAULT;

        log::trace!(
            "Frame {} finished: {} draws, stages {:?}",
            report.frame_index,
            report.draw_count,
            report.stages
        );
        Ok(report)
    }

    /// Recreate the resolution-dependent targets for a new surface size.
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        self.post.invalidate_bindings(backend);
        self.targets.resize(backend, width, height)
    }

    pub fn destroy<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some(preview) = self.preview.take() {
            preview.destroy(backend);
        }
        self.post.invalidate_bindings(backend);
        self.targets.destroy(backend);
        self.fallback.destroy(backend);
    }
}

fn render_pass_descriptor(
    pass: &PassDescriptor,
    color: Option<TextureViewHandle>,
    depth: Option<TextureViewHandle>,
) -> RenderPassDescriptor {
    let color_load = match pass.clear {
        ClearPolicy::Clear { color } => LoadOp::Clear(color),
        ClearPolicy::ClearDepth | ClearPolicy::Load => LoadOp::Load,
    };
    let depth_load = match pass.clear {
        ClearPolicy::Load => LoadOp::Load,
        ClearPolicy::Clear { .. } | ClearPolicy::ClearDepth => LoadOp::Clear([1.0; 4]),
    };

    RenderPassDescriptor {
        label: Some(pass.label.clone()),
        color_attachments: color
            .map(|view| ColorAttachment {
                view,
                load_op: color_load,
                store_op: StoreOp::Store,
            })
            .into_iter()
            .collect(),
        depth_stencil_attachment: depth.map(|view| DepthStencilAttachment {
            view,
            depth_load_op: depth_load,
            depth_store_op: StoreOp::Store,
            depth_clear_value: 1.0,
        }),
    }
}
