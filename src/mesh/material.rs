// material.rs - Canvas and decor materials
//
// The canvas channels are fixed at construction; enhancement only swaps the
// images bound to them through `apply_maps`.

use std::sync::Arc;

use image::{GrayImage, RgbImage, RgbaImage};

use crate::config::MaterialParams;
use crate::maps::{HeightMap, MapSource, SurfaceMapSet};

#[derive(Clone, Debug)]
pub struct SurfaceMaterial {
    /// sRGB painting; `None` when the image could not be loaded
    pub base_color: Option<Arc<RgbaImage>>,
    pub normal_map: Option<Arc<RgbImage>>,
    pub normal_scale: f32,
    pub roughness_map: Option<Arc<GrayImage>>,
    pub roughness: f32,
    pub metalness: f32,
    pub displacement_map: Option<Arc<HeightMap>>,
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    pub source: MapSource,
}

impl SurfaceMaterial {
    pub fn new(base_color: Option<Arc<RgbaImage>>, params: &MaterialParams) -> Self {
        Self {
            base_color,
            normal_map: None,
            normal_scale: params.normal_scale,
            roughness_map: None,
            roughness: params.roughness,
            metalness: params.metalness,
            displacement_map: None,
            displacement_scale: params.displacement_scale,
            displacement_bias: params.displacement_bias,
            source: MapSource::None,
        }
    }

    /// Bind whatever channels `maps` currently holds.
    pub fn apply_maps(&mut self, maps: &SurfaceMapSet) {
        self.normal_map = maps.normal.clone();
        self.roughness_map = maps.roughness.clone();
        self.displacement_map = maps.displacement.clone();
        self.source = maps.source;
    }

    /// Offset along the surface normal at `(u, v)`, in scene units.
    pub fn displacement_at(&self, u: f32, v: f32) -> Option<f32> {
        let map = self.displacement_map.as_ref()?;
        Some(map.sample_nearest(u, v) * self.displacement_scale + self.displacement_bias)
    }
}

/// Untextured PBR surface for stretchers, frame, wall and figure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolidMaterial {
    pub name: &'static str,
    /// Linear RGBA
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
}

impl SolidMaterial {
    pub const STRETCHER: Self = Self::matte("stretcher", [0.62, 0.45, 0.28]);
    pub const BACKING: Self = Self::matte("backing", [0.40, 0.32, 0.24]);
    pub const WALL: Self = Self::matte("wall", [0.86, 0.84, 0.80]);
    pub const FIGURE: Self = Self::matte("figure", [0.45, 0.47, 0.50]);
    pub const FRAME: Self = Self {
        name: "frame",
        color: [0.55, 0.42, 0.20, 1.0],
        roughness: 0.45,
        metalness: 0.6,
    };

    const fn matte(name: &'static str, rgb: [f32; 3]) -> Self {
        Self {
            name,
            color: [rgb[0], rgb[1], rgb[2], 1.0],
            roughness: 0.9,
            metalness: 0.0,
        }
    }
}
