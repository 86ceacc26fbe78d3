//! Light types for the scene

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Maximum number of lights uploaded to pixel programs per draw
pub const MAX_LIGHTS: usize = 16;

/// Light type tag stored in `GpuLightData::direction_type.w`
pub const LIGHT_TYPE_POINT: f32 = 0.0;
pub const LIGHT_TYPE_SPOT: f32 = 1.0;
pub const LIGHT_TYPE_DIRECTIONAL: f32 = 2.0;

/// A scene light
#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Directional {
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_angle: f32, // radians
        outer_angle: f32, // radians
    },
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Light::Directional {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Light::Point {
            position,
            color,
            intensity,
            range,
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Light::Spot {
            position,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range,
            inner_angle,
            outer_angle,
        }
    }

    /// Display name used by the inspector
    pub fn kind_name(&self) -> &'static str {
        match self {
            Light::Directional { .. } => "Directional Light",
            Light::Point { .. } => "Point Light",
            Light::Spot { .. } => "Spot Light",
        }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        match *self {
            Light::Directional {
                direction,
                color,
                intensity,
            } => GpuLightData {
                position: Vec4::new(0.0, 0.0, 0.0, f32::MAX),
                color_intensity: color.extend(intensity),
                direction_type: direction.extend(LIGHT_TYPE_DIRECTIONAL),
                spot_params: Vec4::ZERO,
            },
            Light::Point {
                position,
                color,
                intensity,
                range,
            } => GpuLightData {
                position: position.extend(range),
                color_intensity: color.extend(intensity),
                direction_type: Vec4::new(0.0, 0.0, 0.0, LIGHT_TYPE_POINT),
                spot_params: Vec4::ZERO,
            },
            Light::Spot {
                position,
                direction,
                color,
                intensity,
                range,
                inner_angle,
                outer_angle,
            } => GpuLightData {
                position: position.extend(range),
                color_intensity: color.extend(intensity),
                direction_type: direction.extend(LIGHT_TYPE_SPOT),
                spot_params: Vec4::new(inner_angle.cos(), outer_angle.cos(), 0.0, 0.0),
            },
        }
    }
}

/// GPU-friendly light data structure
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = range
    pub position: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// xyz = direction, w = light type (0=point, 1=spot, 2=directional)
    pub direction_type: Vec4,
    /// x = cos(inner_angle), y = cos(outer_angle), zw = unused
    pub spot_params: Vec4,
}

/// Ordered collection of scene lights.
///
/// Upload order is insertion order; lights past [`MAX_LIGHTS`] are kept but not
/// uploaded.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    lights: Vec<Light>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Light> {
        self.lights.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    /// Number of lights that fit in one upload
    pub fn uploaded_count(&self) -> usize {
        self.lights.len().min(MAX_LIGHTS)
    }

    /// Fixed-size light array for the pixel program, unused slots zeroed
    pub fn gpu_array(&self) -> [GpuLightData; MAX_LIGHTS] {
        let mut data = [GpuLightData::zeroed(); MAX_LIGHTS];
        for (slot, light) in data.iter_mut().zip(self.lights.iter()) {
            *slot = light.to_gpu_data();
        }
        data
    }

    /// First directional light, used as the shadow caster
    pub fn first_directional(&self) -> Option<Vec3> {
        self.lights.iter().find_map(|light| match light {
            Light::Directional { direction, .. } => Some(*direction),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_preserves_insertion_order() {
        let mut lights = LightSet::new();
        lights.push(Light::point(Vec3::new(-1.5, 0.0, 0.0), Vec3::ONE, 0.5, 8.0));
        lights.push(Light::directional(Vec3::new(1.0, -1.0, 1.0), Vec3::splat(0.8), 1.0));

        let data = lights.gpu_array();
        assert_eq!(data[0].direction_type.w, LIGHT_TYPE_POINT);
        assert_eq!(data[0].position, Vec4::new(-1.5, 0.0, 0.0, 8.0));
        assert_eq!(data[1].direction_type.w, LIGHT_TYPE_DIRECTIONAL);
        assert_eq!(data[2], GpuLightData::zeroed());
    }

    #[test]
    fn test_upload_is_capped() {
        let mut lights = LightSet::new();
        for i in 0..(MAX_LIGHTS + 4) {
            lights.push(Light::point(Vec3::splat(i as f32), Vec3::ONE, 1.0, 1.0));
        }
        assert_eq!(lights.len(), MAX_LIGHTS + 4);
        assert_eq!(lights.uploaded_count(), MAX_LIGHTS);
    }

    #[test]
    fn test_shadow_caster_is_first_directional() {
        let mut lights = LightSet::new();
        lights.push(Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 5.0));
        lights.push(Light::directional(Vec3::X, Vec3::ONE, 1.0));
        lights.push(Light::directional(Vec3::Y, Vec3::ONE, 1.0));
        assert_eq!(lights.first_directional(), Some(Vec3::X));
    }
}
