//! Offscreen render targets used by the frame

use crate::backend::{
    BackendResult, GraphicsBackend, TextureDescriptor, TextureFormat, TextureHandle, TextureUsage,
    TextureViewDimension, TextureViewHandle,
};

use super::draw::DEPTH_FORMAT;

/// Format of the post-process intermediates
pub const INTERMEDIATE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// A texture that is rendered into and later sampled through the same view
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub label: &'static str,
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl RenderTarget {
    pub fn create<B: GraphicsBackend>(
        backend: &mut B,
        label: &'static str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> BackendResult<Self> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width,
            height,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ..Default::default()
        })?;
        let view = match backend.create_texture_view(texture, TextureViewDimension::D2) {
            Ok(view) => view,
            Err(e) => {
                backend.destroy_texture(texture);
                return Err(e);
            }
        };
        log::trace!("Created render target '{}' {}x{}", label, width, height);

        Ok(Self {
            label,
            texture,
            view,
            width,
            height,
            format,
        })
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.texture);
    }
}

/// Targets whose size follows the surface
#[derive(Debug)]
struct SizedTargets {
    scene_depth: RenderTarget,
    intermediate_a: RenderTarget,
    intermediate_b: RenderTarget,
}

impl SizedTargets {
    fn create<B: GraphicsBackend>(backend: &mut B, width: u32, height: u32) -> BackendResult<Self> {
        let scene_depth = RenderTarget::create(backend, "Scene Depth", width, height, DEPTH_FORMAT)?;
        let intermediate_a =
            match RenderTarget::create(backend, "Post Process A", width, height, INTERMEDIATE_FORMAT) {
                Ok(target) => target,
                Err(e) => {
                    scene_depth.destroy(backend);
                    return Err(e);
                }
            };
        let intermediate_b =
            match RenderTarget::create(backend, "Post Process B", width, height, INTERMEDIATE_FORMAT) {
                Ok(target) => target,
                Err(e) => {
                    scene_depth.destroy(backend);
                    intermediate_a.destroy(backend);
                    return Err(e);
                }
            };

        Ok(Self {
            scene_depth,
            intermediate_a,
            intermediate_b,
        })
    }

    fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        self.scene_depth.destroy(backend);
        self.intermediate_a.destroy(backend);
        self.intermediate_b.destroy(backend);
    }
}

/// Every offscreen target of the frame.
///
/// The shadow map has a fixed resolution. Scene depth and the two post-process
/// intermediates are recreated on every resize; if recreation fails the set is
/// left empty and [`FrameTargets::is_valid`] reports `false` until a later
/// resize succeeds.
#[derive(Debug)]
pub struct FrameTargets {
    shadow_map: RenderTarget,
    sized: Option<SizedTargets>,
    width: u32,
    height: u32,
}

impl FrameTargets {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
        shadow_map_size: u32,
    ) -> BackendResult<Self> {
        let shadow_map = RenderTarget::create(
            backend,
            "Shadow Map",
            shadow_map_size,
            shadow_map_size,
            DEPTH_FORMAT,
        )?;
        let sized = match SizedTargets::create(backend, width, height) {
            Ok(sized) => sized,
            Err(e) => {
                shadow_map.destroy(backend);
                return Err(e);
            }
        };

        Ok(Self {
            shadow_map,
            sized: Some(sized),
            width,
            height,
        })
    }

    /// Destroy the resolution-dependent targets and create them at the new size
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        if let Some(old) = self.sized.take() {
            old.destroy(backend);
        }
        self.width = width;
        self.height = height;
        self.sized = Some(SizedTargets::create(backend, width, height)?);
        log::debug!("Recreated frame targets at {}x{}", width, height);
        Ok(())
    }

    /// Size the resolution-dependent targets were created for
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the resolution-dependent targets exist
    pub fn is_valid(&self) -> bool {
        self.sized.is_some()
    }

    pub fn shadow_map(&self) -> &RenderTarget {
        &self.shadow_map
    }

    pub fn scene_depth(&self) -> Option<&RenderTarget> {
        self.sized.as_ref().map(|s| &s.scene_depth)
    }

    pub fn intermediate_a(&self) -> Option<&RenderTarget> {
        self.sized.as_ref().map(|s| &s.intermediate_a)
    }

    pub fn intermediate_b(&self) -> Option<&RenderTarget> {
        self.sized.as_ref().map(|s| &s.intermediate_b)
    }

    pub fn destroy<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some(sized) = self.sized.take() {
            sized.destroy(backend);
        }
        self.shadow_map.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn test_resize_replaces_sized_targets() {
        let mut backend = HeadlessBackend::new(800, 600);
        let mut targets = FrameTargets::new(&mut backend, 800, 600, 1024).unwrap();
        let old_view = targets.intermediate_a().unwrap().view;

        targets.resize(&mut backend, 1920, 1080).unwrap();

        assert!(!backend.is_view_alive(old_view));
        for target in [
            targets.scene_depth().unwrap(),
            targets.intermediate_a().unwrap(),
            targets.intermediate_b().unwrap(),
        ] {
            assert_eq!(backend.view_extent(target.view), Some((1920, 1080)));
        }
        assert_eq!(targets.shadow_map().extent(), (1024, 1024));
        // Shadow map plus three sized targets
        assert_eq!(backend.live_texture_count(), 4);
    }

    #[test]
    fn test_failed_resize_leaves_targets_invalid() {
        let mut backend = HeadlessBackend::new(800, 600);
        let mut targets = FrameTargets::new(&mut backend, 800, 600, 512).unwrap();

        backend.set_fail_texture_creation(true);
        assert!(targets.resize(&mut backend, 1024, 768).is_err());
        assert!(!targets.is_valid());
        assert!(targets.intermediate_b().is_none());

        backend.set_fail_texture_creation(false);
        targets.resize(&mut backend, 1024, 768).unwrap();
        assert!(targets.is_valid());
    }
}
