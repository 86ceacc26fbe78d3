//! Pass descriptors and the per-frame execution report

use std::fmt;

/// A render target referenced by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRef {
    ShadowMap,
    /// Colour copy of the shadow map shown by the inspector
    ShadowPreview,
    SceneDepth,
    IntermediateA,
    IntermediateB,
    BackBuffer,
}

impl TargetRef {
    /// The other intermediate, used to ping-pong post-process passes
    pub fn swap_intermediate(self) -> Self {
        match self {
            TargetRef::IntermediateA => TargetRef::IntermediateB,
            _ => TargetRef::IntermediateA,
        }
    }
}

/// How a pass treats the previous contents of its attachments
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearPolicy {
    /// Clear color to the given value (if there is a color target) and depth to 1
    Clear { color: [f32; 4] },
    /// Clear depth only
    ClearDepth,
    /// Keep whatever is already there
    Load,
}

/// What a pass does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Shadow,
    ShadowPreview,
    MainColor,
    /// Index into the post-process chain, `None` for the passthrough copy
    PostProcess(Option<usize>),
    UiOverlay,
}

/// One entry of the fixed per-frame pass list
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub kind: PassKind,
    pub label: String,
    pub color: Option<TargetRef>,
    pub depth: Option<TargetRef>,
    pub clear: ClearPolicy,
    /// Target sampled by the pass
    pub input: Option<TargetRef>,
}

/// A step that was executed during a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStage {
    Clear,
    Shadow,
    ShadowPreview,
    MainColor,
    PostProcess(String),
    UiOverlay,
    Present { vsync: bool },
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStage::Clear => write!(f, "Clear"),
            FrameStage::Shadow => write!(f, "Shadow"),
            FrameStage::ShadowPreview => write!(f, "Shadow Preview"),
            FrameStage::MainColor => write!(f, "Main Color"),
            FrameStage::PostProcess(name) => write!(f, "Post Process ({name})"),
            FrameStage::UiOverlay => write!(f, "UI Overlay"),
            FrameStage::Present { vsync: true } => write!(f, "Present (vsync)"),
            FrameStage::Present { vsync: false } => write!(f, "Present (immediate)"),
        }
    }
}

/// Targets currently bound for output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundTargets {
    pub color: Option<TargetRef>,
    pub depth: Option<TargetRef>,
}

impl BoundTargets {
    /// Back buffer plus scene depth, the state restored after shadows and present
    pub const DEFAULT: Self = Self {
        color: Some(TargetRef::BackBuffer),
        depth: Some(TargetRef::SceneDepth),
    };
}

/// Summary of one executed frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub stages: Vec<FrameStage>,
    /// Output target of every render pass in the order they were bound
    pub target_binds: Vec<TargetRef>,
    pub draw_count: u32,
    pub width: u32,
    pub height: u32,
}

impl FrameReport {
    pub fn ran(&self, stage: &FrameStage) -> bool {
        self.stages.contains(stage)
    }
}
