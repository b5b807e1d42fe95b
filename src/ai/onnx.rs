// onnx.rs - Local MiDaS depth model as a normal-map provider
//
// Runs monocular depth estimation on the working image, then turns the
// depth gradient into a tangent-space normal map. The session is loaded on
// first use and kept for later requests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{NormalMapProvider, NormalRequest, ServiceUnavailable};

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

const MIDAS_SIZE: u32 = 256;
/// Slope of a full-range depth ramp across the model grid
const RELIEF_GAIN: f32 = 0.25;

pub struct OnnxDepthProvider {
    model_path: PathBuf,
    session: Arc<Mutex<Option<Session>>>,
}

impl OnnxDepthProvider {
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            session: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl NormalMapProvider for OnnxDepthProvider {
    fn name(&self) -> &'static str {
        "onnx"
    }

    async fn request_normal_map(&self, request: NormalRequest<'_>) -> Result<RgbImage, ServiceUnavailable> {
        if !self.model_path.exists() {
            return Err(ServiceUnavailable::new(format!("depth model not found at {}", self.model_path.display())));
        }

        let pixels = request.pixels.clone();
        let model_path = self.model_path.clone();
        let session = Arc::clone(&self.session);

        tokio::task::spawn_blocking(move || {
            let mut slot = session.lock().map_err(|_| ServiceUnavailable::new("depth session poisoned"))?;
            if slot.is_none() {
                info!(model = %model_path.display(), "loading depth model");
                *slot = Some(load_session(&model_path)?);
            }
            let Some(session) = slot.as_mut() else {
                return Err(ServiceUnavailable::new("depth session missing"));
            };
            let (depth, w, h) = estimate_depth(session, &pixels)?;
            Ok(normals_from_depth(&depth, w, h, w as f32 * RELIEF_GAIN))
        })
        .await
        .map_err(|e| ServiceUnavailable::new(format!("depth task failed: {e}")))?
    }
}

fn load_session(path: &Path) -> Result<Session, ServiceUnavailable> {
    let builder = Session::builder().map_err(|e| ServiceUnavailable::new(e.to_string()))?;
    builder.commit_from_file(path).map_err(|e| ServiceUnavailable::new(e.to_string()))
}

/// Depth normalized to 0..1 (1 = near) on the model's output grid.
fn estimate_depth(session: &mut Session, img: &RgbImage) -> Result<(Vec<f32>, usize, usize), ServiceUnavailable> {
    let resized = DynamicImage::ImageRgb8(img.clone()).resize_exact(MIDAS_SIZE, MIDAS_SIZE, FilterType::Lanczos3).to_rgb8();

    let mut input = Array4::<f32>::zeros((1, 3, MIDAS_SIZE as usize, MIDAS_SIZE as usize));
    for (x, y, p) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    let input_val = Value::from_array(input).map_err(|e| ServiceUnavailable::new(e.to_string()))?;
    let input_name = session.inputs.first().map(|i| i.name.clone()).unwrap_or_else(|| "image".into());
    let outputs = session
        .run(ort::inputs![input_name => input_val])
        .map_err(|e| ServiceUnavailable::new(e.to_string()))?;
    let arr = outputs[0].try_extract_array::<f32>().map_err(|e| ServiceUnavailable::new(e.to_string()))?;

    let shape = arr.shape();
    let (oh, ow) = match shape.len() {
        4 => (shape[2], shape[3]),
        3 => (shape[1], shape[2]),
        2 => (shape[0], shape[1]),
        n => return Err(ServiceUnavailable::new(format!("unexpected depth output rank {n}"))),
    };

    let flat: Vec<f32> = arr.iter().copied().collect();
    let (min_d, max_d) = flat.iter().fold((f32::MAX, f32::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    let range = (max_d - min_d).max(1e-6);
    debug!(width = ow, height = oh, min_d, max_d, "depth estimated");

    Ok((flat.iter().map(|v| (v - min_d) / range).collect(), ow, oh))
}

/// Encoded normals from a row-major height grid using central differences.
fn normals_from_depth(depth: &[f32], w: usize, h: usize, scale: f32) -> RgbImage {
    let at = |x: usize, y: usize| depth.get(y * w + x).copied().unwrap_or(0.0);

    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let (x0, x1) = (x.saturating_sub(1), (x + 1).min(w - 1));
        let (y0, y1) = (y.saturating_sub(1), (y + 1).min(h - 1));

        let dzdx = (at(x1, y) - at(x0, y)) / (x1 - x0).max(1) as f32 * scale;
        // image rows grow downward; tangent-space Y points up
        let dzdy = (at(x, y0) - at(x, y1)) / (y1 - y0).max(1) as f32 * scale;

        let len = (dzdx * dzdx + dzdy * dzdy + 1.0).sqrt();
        let encode = |c: f32| (128.0 + c * 127.0).round().clamp(0.0, 255.0) as u8;
        Rgb([encode(-dzdx / len), encode(-dzdy / len), encode(1.0 / len)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ModelHint;
    use crate::source::ImageRef;

    #[test]
    fn flat_depth_is_flat_normal() {
        let map = normals_from_depth(&vec![0.5; 16], 4, 4, 10.0);
        assert!(map.pixels().all(|p| p.0 == [128, 128, 255]));
    }

    #[test]
    fn ramp_tilts_against_slope() {
        // depth rising to the right
        let depth: Vec<f32> = (0..8 * 8).map(|i| (i % 8) as f32 / 7.0).collect();
        let map = normals_from_depth(&depth, 8, 8, 4.0);
        let p = map.get_pixel(4, 4);
        assert!(p[0] < 128);
        assert_eq!(p[1], 128);
    }

    #[tokio::test]
    async fn missing_model_is_unavailable() {
        let provider = OnnxDepthProvider::new("/nonexistent/midas_small.onnx");
        let image = ImageRef::remote("https://example.org/a.jpg");
        let pixels = RgbImage::new(2, 2);
        let err = provider
            .request_normal_map(NormalRequest { image: &image, pixels: &pixels, hint: ModelHint::default() })
            .await
            .unwrap_err();
        assert!(err.reason.contains("not found"));
    }
}
