// synth.rs - Procedural canvas, impasto and brushstroke relief
//
// Deterministic image-to-image transforms driven by pixel luminance.
// None of them can fail for a decoded image.

use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use image::{GrayImage, Luma, Rgb, RgbImage, imageops};
use tracing::debug;

use super::{HeightMap, MapSource, SurfaceMapSet, luminance};
use crate::config::SynthParams;

/// Pixel center in UV space
#[inline]
fn uv(x: u32, y: u32, w: u32, h: u32) -> (f32, f32) {
    ((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32)
}

#[inline]
fn encode_unit(c: f32) -> u8 {
    (128.0 + c * 127.0).round().clamp(0.0, 255.0) as u8
}

/// Canvas weave + luminance-modulated impasto + brushstroke direction.
pub fn synthesize_normal_map(src: &RgbImage, p: &SynthParams) -> RgbImage {
    let (w, h) = src.dimensions();
    let mut out = RgbImage::new(w, h);

    for (x, y, px) in src.enumerate_pixels() {
        let l = luminance(px) / 255.0;
        let (u, v) = uv(x, y, w, h);
        let (su, sv) = (u * PI, v * PI);

        // Weave
        let mut nx = (su * p.weave_freq).sin() * p.canvas_scale;
        let mut ny = (sv * p.weave_freq).sin() * p.canvas_scale;

        // Impasto: thinner in bright regions
        let impasto = p.impasto_strength * (1.0 - 0.5 * l);
        nx += (su * p.impasto_freq + l * TAU).sin() * impasto;
        ny += (sv * p.impasto_freq + l * TAU).sin() * impasto;

        // Brushstroke direction from two perpendicular sine products
        let along = (su * p.brush_freq).sin() * (sv * p.brush_freq).cos();
        let across = (su * p.brush_freq).cos() * (sv * p.brush_freq).sin();
        let angle = along.atan2(across);
        let brush = 0.3 * p.impasto_strength * l;
        nx += angle.cos() * brush;
        ny += angle.sin() * brush;

        let len = (nx * nx + ny * ny + 1.0).sqrt();
        out.put_pixel(x, y, Rgb([encode_unit(nx / len), encode_unit(ny / len), encode_unit(1.0 / len)]));
    }

    debug!(width = w, height = h, sigma = p.normal_blur_sigma, "synthesized normal map");
    soften(out, p.normal_blur_sigma)
}

/// Brighter, thicker paint reads slightly shinier than bare canvas.
pub fn synthesize_roughness_map(src: &RgbImage) -> GrayImage {
    let (w, h) = src.dimensions();
    let mut out = GrayImage::new(w, h);

    for (x, y, px) in src.enumerate_pixels() {
        let r = (150.0 + (luminance(px) - 128.0) * 0.3).clamp(100.0, 200.0);
        out.put_pixel(x, y, Luma([r.round() as u8]));
    }

    out
}

/// Darker paint is treated as thicker. Output is linear height.
pub fn synthesize_displacement_map(src: &RgbImage, p: &SynthParams) -> HeightMap {
    let (w, h) = src.dimensions();
    let mut out = GrayImage::new(w, h);

    for (x, y, px) in src.enumerate_pixels() {
        let inverted = 255.0 - luminance(px);
        let (u, v) = uv(x, y, w, h);
        let (su, sv) = (u * PI, v * PI);

        let weave = (su * p.height_weave_freq).sin() * (sv * p.height_weave_freq).sin() * p.height_weave_amplitude;
        let brush = (su * p.height_brush_freq).sin()
            * (sv * p.height_brush_freq * 0.5).cos()
            * p.height_brush_amplitude;

        let height = 0.8 * inverted
            + 0.5 * (255.0 - inverted)
            + 0.5 * weave
            + 1.2 * brush * (1.0 - inverted / 255.0);
        out.put_pixel(x, y, Luma([height.clamp(0.0, 255.0).round() as u8]));
    }

    debug!(width = w, height = h, sigma = p.displacement_blur_sigma, "synthesized displacement map");
    HeightMap::from_linear(soften(out, p.displacement_blur_sigma))
}

/// All three maps, tagged procedural.
pub fn synthesize_all(src: &RgbImage, p: &SynthParams) -> SurfaceMapSet {
    SurfaceMapSet {
        normal: Some(Arc::new(synthesize_normal_map(src, p))),
        roughness: Some(Arc::new(synthesize_roughness_map(src))),
        displacement: Some(Arc::new(synthesize_displacement_map(src, p))),
        source: MapSource::Procedural,
    }
}

// Gaussian pass against aliasing from the periodic terms
fn soften<P>(img: image::ImageBuffer<P, Vec<u8>>, sigma: f32) -> image::ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    if sigma > 0.0 { imageops::blur(&img, sigma) } else { img }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / (w - 1)) as u8, (y * 255 / (h - 1)) as u8, ((x + y) % 256) as u8])
        })
    }

    fn mean(values: impl Iterator<Item = u8>) -> f32 {
        let (sum, n) = values.fold((0u64, 0u64), |(s, n), v| (s + v as u64, n + 1));
        sum as f32 / n as f32
    }

    #[test]
    fn roughness_stays_in_band() {
        let src = gradient(256, 64);
        let rough = synthesize_roughness_map(&src);
        assert!(rough.pixels().all(|p| (100..=200).contains(&p[0])));

        let black = synthesize_roughness_map(&RgbImage::new(4, 4));
        let white = synthesize_roughness_map(&RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        assert!(white.get_pixel(0, 0)[0] > black.get_pixel(0, 0)[0]);
    }

    #[test]
    fn darker_paint_is_taller() {
        let p = SynthParams::default();
        let dark = synthesize_displacement_map(&RgbImage::from_pixel(32, 32, Rgb([20, 20, 20])), &p);
        let light = synthesize_displacement_map(&RgbImage::from_pixel(32, 32, Rgb([235, 235, 235])), &p);
        let dark_mean = mean(dark.as_image().pixels().map(|p| p[0]));
        let light_mean = mean(light.as_image().pixels().map(|p| p[0]));
        assert!(dark_mean > light_mean);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let src = gradient(64, 48);
        let p = SynthParams::default();
        assert_eq!(synthesize_normal_map(&src, &p), synthesize_normal_map(&src, &p));
        assert_eq!(synthesize_displacement_map(&src, &p), synthesize_displacement_map(&src, &p));
    }

    #[test]
    fn maps_match_source_dimensions() {
        let src = gradient(37, 21);
        let maps = synthesize_all(&src, &SynthParams::default());
        assert_eq!(maps.normal.as_deref().map(|m| m.dimensions()), Some((37, 21)));
        assert_eq!(maps.roughness.as_deref().map(|m| m.dimensions()), Some((37, 21)));
        assert_eq!(maps.displacement.as_deref().map(|m| (m.width(), m.height())), Some((37, 21)));
        assert_eq!(maps.source, MapSource::Procedural);
    }

    #[test]
    fn mid_gray_is_near_flat() {
        let src = RgbImage::from_pixel(1000, 800, Rgb([128, 128, 128]));
        let p = SynthParams::default();

        let normal = synthesize_normal_map(&src, &p);
        assert!((mean(normal.pixels().map(|px| px[0])) - 128.0).abs() < 4.0);
        assert!((mean(normal.pixels().map(|px| px[1])) - 128.0).abs() < 4.0);
        assert!(normal.pixels().all(|px| px[2] >= 245));

        // constant luminance leaves only the fixed 150 roughness
        let rough = synthesize_roughness_map(&src);
        assert!(rough.pixels().all(|px| px[0] == 150));

        // 0.8 * 127 + 0.5 * 128 plus the zero-mean texture terms
        let disp = synthesize_displacement_map(&src, &p);
        let m = mean(disp.as_image().pixels().map(|px| px[0]));
        assert!((m - 165.6).abs() < 5.0, "mean displacement {m}");
        let spread = disp.as_image().pixels().map(|px| (px[0] as f32 - m).abs()).fold(0.0, f32::max);
        assert!(spread > 0.0 && spread < 30.0);
    }
}
