//! Post-processing effects
//!
//! Every effect is a pixel program run over a full-screen triangle that samples
//! the previous pass's output through `pixels` and `clamp_sampler`.

mod blur;
mod chromatic_aberration;

pub use blur::*;
pub use chromatic_aberration::*;

use crate::backend::{BackendResult, GraphicsBackend, SamplerHandle, TextureViewHandle};
use crate::resources::{ShaderError, ShaderProgram, ShaderStage, SharedProgram};

use super::draw::DrawContext;

/// Common fullscreen triangle shader
pub const FULLSCREEN_VERTEX_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    // Generate fullscreen triangle
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);

    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);

    return output;
}
"#;

/// Plain copy, used when no effect is enabled
pub const PASSTHROUGH_PIXEL_SHADER: &str = r#"
@group(1) @binding(0) var pixels: texture_2d<f32>;
@group(1) @binding(1) var clamp_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSampleLevel(pixels, clamp_sampler, uv, 0.0);
}
"#;

/// Effect kind and its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostEffectSettings {
    Blur { radius: i32 },
    ChromaticAberration(ChannelOffsets),
}

impl PostEffectSettings {
    pub fn name(&self) -> &'static str {
        match self {
            PostEffectSettings::Blur { .. } => "Blur",
            PostEffectSettings::ChromaticAberration(_) => "Chromatic Aberration",
        }
    }

    fn pixel_shader(&self) -> &'static str {
        match self {
            PostEffectSettings::Blur { .. } => BLUR_PIXEL_SHADER,
            PostEffectSettings::ChromaticAberration(_) => CHROMATIC_ABERRATION_PIXEL_SHADER,
        }
    }

    fn apply(&self, program: &mut ShaderProgram, width: u32, height: u32) {
        match *self {
            PostEffectSettings::Blur { radius } => apply_blur(program, radius, width, height),
            PostEffectSettings::ChromaticAberration(offsets) => {
                apply_chromatic_aberration(program, offsets, width, height)
            }
        }
    }
}

/// A configured effect with its compiled pixel program
#[derive(Debug)]
pub struct PostEffect {
    pub settings: PostEffectSettings,
    pub enabled: bool,
    program: SharedProgram,
}

impl PostEffect {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        settings: PostEffectSettings,
    ) -> Result<Self, ShaderError> {
        let label = format!("{} PS", settings.name());
        let program = ShaderProgram::new(backend, &label, ShaderStage::Pixel, settings.pixel_shader())?;
        Ok(Self {
            settings,
            enabled: true,
            program: program.shared(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.settings.name()
    }

    pub fn program(&self) -> &SharedProgram {
        &self.program
    }
}

/// Ordered post-process effects sharing the fullscreen vertex program
#[derive(Debug)]
pub struct PostProcessChain {
    vertex_program: SharedProgram,
    passthrough: SharedProgram,
    effects: Vec<PostEffect>,
    sampler: SamplerHandle,
}

impl PostProcessChain {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        settings: &[PostEffectSettings],
        sampler: SamplerHandle,
    ) -> Result<Self, ShaderError> {
        let vertex_program =
            ShaderProgram::new(backend, "Fullscreen VS", ShaderStage::Vertex, FULLSCREEN_VERTEX_SHADER)?
                .shared();
        let passthrough =
            ShaderProgram::new(backend, "Passthrough PS", ShaderStage::Pixel, PASSTHROUGH_PIXEL_SHADER)?
                .shared();
        let effects = settings
            .iter()
            .map(|settings| PostEffect::new(backend, *settings))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vertex_program,
            passthrough,
            effects,
            sampler,
        })
    }

    pub fn effects(&self) -> &[PostEffect] {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut [PostEffect] {
        &mut self.effects
    }

    /// Indices of the effects that run this frame, in chain order
    pub fn active(&self) -> Vec<usize> {
        self.effects
            .iter()
            .enumerate()
            .filter(|(_, effect)| effect.enabled)
            .map(|(index, _)| index)
            .collect()
    }

    /// Name of the pass at `index`, or of the passthrough copy
    pub fn pass_name(&self, index: Option<usize>) -> &'static str {
        index
            .and_then(|i| self.effects.get(i))
            .map_or("Passthrough", PostEffect::name)
    }

    /// Draw one full-screen pass sampling `input`. `None` runs the passthrough copy.
    pub fn record<B: GraphicsBackend>(
        &self,
        ctx: &mut DrawContext<'_, B>,
        effect: Option<usize>,
        input: TextureViewHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        {
            let mut vs = self.vertex_program.borrow_mut();
            vs.commit(ctx)?;
            vs.activate(ctx)?;
        }

        let (program, settings) = match effect.and_then(|i| self.effects.get(i)) {
            Some(effect) => (&effect.program, Some(effect.settings)),
            None => (&self.passthrough, None),
        };
        let mut ps = program.borrow_mut();
        if let Some(settings) = settings {
            settings.apply(&mut ps, width, height);
        }
        ps.set_texture("pixels", input);
        ps.set_sampler("clamp_sampler", self.sampler);
        ps.commit(ctx)?;
        ps.activate(ctx)?;

        ctx.draw_fullscreen_triangle()
    }

    /// Drop cached bind groups that reference the old intermediates
    pub fn invalidate_bindings<B: GraphicsBackend>(&self, backend: &mut B) {
        self.passthrough.borrow_mut().invalidate_bindings(backend);
        for effect in &self.effects {
            effect.program.borrow_mut().invalidate_bindings(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, SamplerDescriptor};

    #[test]
    fn test_effect_programs_expose_their_parameters() {
        let mut backend = HeadlessBackend::new(64, 64);
        let blur = PostEffect::new(&mut backend, PostEffectSettings::Blur { radius: 3 }).unwrap();
        let program = blur.program().borrow();
        for name in ["pixel_width", "pixel_height", "blur_radius"] {
            assert!(program.uniform_field(name).is_some(), "missing {name}");
        }
        assert!(program.resource_slot("pixels").is_some());
        assert!(program.resource_slot("clamp_sampler").is_some());
    }

    #[test]
    fn test_disabled_effects_are_skipped() {
        let mut backend = HeadlessBackend::new(64, 64);
        let sampler = backend
            .create_sampler(&SamplerDescriptor::clamp("Clamp"))
            .unwrap();
        let mut chain = PostProcessChain::new(
            &mut backend,
            &[
                PostEffectSettings::Blur { radius: 1 },
                PostEffectSettings::ChromaticAberration(ChannelOffsets::default()),
            ],
            sampler,
        )
        .unwrap();
        assert_eq!(chain.active(), vec![0, 1]);

        chain.effects_mut()[0].enabled = false;
        assert_eq!(chain.active(), vec![1]);
        assert_eq!(chain.pass_name(Some(1)), "Chromatic Aberration");
        assert_eq!(chain.pass_name(None), "Passthrough");
    }
}
