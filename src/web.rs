// web.rs - Browser bindings
//
// Thin wasm-bindgen wrappers: the host decodes the painting itself and
// passes raw RGBA. Everything returned is plain bytes the page can upload
// as textures.

use image::{DynamicImage, RgbaImage};
use js_sys::Uint8Array;
use wasm_bindgen::prelude::*;

use crate::config::SynthParams;
use crate::dimensions;
use crate::error::{Error, Result};
use crate::maps::{
    synthesize_displacement_map, synthesize_normal_map, synthesize_roughness_map, working_image,
};

/// `[width, height, depth]` in scene units, with the default size on failure.
#[wasm_bindgen]
pub fn parse_dimensions(text: &str) -> Vec<f32> {
    let dims = dimensions::parse_or_default(text);
    vec![dims.width_units(), dims.height_units(), dims.depth_units()]
}

/// Normal (RGB), roughness (L) and displacement (L) maps for one painting.
#[wasm_bindgen]
pub struct MapBundle {
    width: u32,
    height: u32,
    normal: Vec<u8>,
    roughness: Vec<u8>,
    displacement: Vec<u8>,
}

#[wasm_bindgen]
impl MapBundle {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter)]
    pub fn normal(&self) -> Uint8Array {
        Uint8Array::from(&self.normal[..])
    }

    #[wasm_bindgen(getter)]
    pub fn roughness(&self) -> Uint8Array {
        Uint8Array::from(&self.roughness[..])
    }

    #[wasm_bindgen(getter)]
    pub fn displacement(&self) -> Uint8Array {
        Uint8Array::from(&self.displacement[..])
    }
}

#[wasm_bindgen]
pub fn synthesize_maps(rgba: &[u8], width: u32, height: u32) -> std::result::Result<MapBundle, JsError> {
    bundle(rgba, width, height, &SynthParams::default()).map_err(|e| JsError::new(&e.to_string()))
}

fn bundle(rgba: &[u8], width: u32, height: u32, params: &SynthParams) -> Result<MapBundle> {
    let image = RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or_else(|| Error::ImageLoad {
        location: "host buffer".into(),
        reason: format!("{} bytes is not a {width}x{height} RGBA image", rgba.len()),
    })?;
    let working = working_image(&DynamicImage::ImageRgba8(image), params.max_resolution);

    Ok(MapBundle {
        width: working.width(),
        height: working.height(),
        normal: synthesize_normal_map(&working, params).into_raw(),
        roughness: synthesize_roughness_map(&working).into_raw(),
        displacement: synthesize_displacement_map(&working, params).as_image().as_raw().clone(),
    })
}
