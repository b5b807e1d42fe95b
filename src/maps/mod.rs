// maps/ - Surface maps derived from a painting
//
// Normal, roughness and displacement share the working image's pixel grid
// and the canvas mesh's UVs (u right, v down, image row 0 at v = 0).
// Each channel arrives on its own and is patched into the live material
// as soon as it is ready.

mod synth;

pub use synth::{
    synthesize_all, synthesize_displacement_map, synthesize_normal_map, synthesize_roughness_map,
};

use std::sync::Arc;

use image::{DynamicImage, GrayImage, Rgb, RgbImage, imageops::FilterType};

/// Where a map set's relief came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MapSource {
    Ai,
    Procedural,
    #[default]
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapChannel {
    Normal,
    Roughness,
    Displacement,
}

/// Linear height data, 0 = lowest, 255 = highest.
///
/// Kept apart from color images so nothing downstream treats it as sRGB.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap(GrayImage);

impl HeightMap {
    pub fn from_linear(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Texel whose footprint contains `(u, v)`, normalized to 0..1.
    ///
    /// Texel `x` covers `[x / w, (x + 1) / w)`, the same cell a GPU picks with
    /// nearest filtering. UVs outside 0..1 clamp.
    pub fn sample_nearest(&self, u: f32, v: f32) -> f32 {
        let (w, h) = self.0.dimensions();
        if w == 0 || h == 0 {
            return 0.0;
        }
        let x = ((u.clamp(0.0, 1.0) * w as f32) as u32).min(w - 1);
        let y = ((v.clamp(0.0, 1.0) * h as f32) as u32).min(h - 1);
        self.0.get_pixel(x, y)[0] as f32 / 255.0
    }
}

/// One finished map.
#[derive(Clone, Debug)]
pub enum MapData {
    Normal(Arc<RgbImage>),
    Roughness(Arc<GrayImage>),
    Displacement(Arc<HeightMap>),
}

impl MapData {
    pub fn channel(&self) -> MapChannel {
        match self {
            Self::Normal(_) => MapChannel::Normal,
            Self::Roughness(_) => MapChannel::Roughness,
            Self::Displacement(_) => MapChannel::Displacement,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MapLayer {
    pub data: MapData,
    pub source: MapSource,
}

/// The maps currently bound to a canvas.
///
/// `source` follows the normal channel, the only one the AI path can
/// produce. Until a normal map arrives it reflects whichever channel came
/// first.
#[derive(Clone, Debug, Default)]
pub struct SurfaceMapSet {
    pub normal: Option<Arc<RgbImage>>,
    pub roughness: Option<Arc<GrayImage>>,
    pub displacement: Option<Arc<HeightMap>>,
    pub source: MapSource,
}

impl SurfaceMapSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: MapLayer) {
        match layer.data {
            MapData::Normal(img) => {
                self.normal = Some(img);
                self.source = layer.source;
            }
            MapData::Roughness(img) => {
                self.roughness = Some(img);
                if self.source == MapSource::None {
                    self.source = layer.source;
                }
            }
            MapData::Displacement(map) => {
                self.displacement = Some(map);
                if self.source == MapSource::None {
                    self.source = layer.source;
                }
            }
        }
    }

    pub fn has(&self, channel: MapChannel) -> bool {
        match channel {
            MapChannel::Normal => self.normal.is_some(),
            MapChannel::Roughness => self.roughness.is_some(),
            MapChannel::Displacement => self.displacement.is_some(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.normal.is_some() && self.roughness.is_some() && self.displacement.is_some()
    }
}

/// Rec. 601 luma, 0..255.
#[inline]
pub fn luminance(p: &Rgb<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

/// RGB copy of `img`, downscaled so its longest edge is at most `max_edge`.
pub fn working_image(img: &DynamicImage, max_edge: u32) -> RgbImage {
    let longest = img.width().max(img.height());
    if longest <= max_edge || max_edge == 0 {
        return img.to_rgb8();
    }
    img.resize(max_edge, max_edge, FilterType::Triangle).to_rgb8()
}

/// Stretch or shrink an externally produced normal map onto the working grid.
pub fn fit_normal_map(map: RgbImage, width: u32, height: u32) -> RgbImage {
    if map.dimensions() == (width, height) {
        return map;
    }
    image::imageops::resize(&map, width, height, FilterType::Triangle)
}
