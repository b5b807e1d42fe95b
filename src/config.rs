// config.rs - Tunables for synthesis, material, mesh, AI and export
//
// Every constant here was picked for visual plausibility, not derived from a
// physical model of paint. All of them can be overridden from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefConfig {
    pub synth: SynthParams,
    pub material: MaterialParams,
    pub mesh: MeshParams,
    pub ai: AiParams,
    pub source: SourceParams,
    pub export: ExportParams,
}

impl ReliefConfig {
    /// Load a config file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mesh.segments == 0 {
            return Err(Error::Config("mesh.segments must be at least 1".into()));
        }
        if self.synth.max_resolution == 0 {
            return Err(Error::Config("synth.max_resolution must be at least 1".into()));
        }
        if self.export.ar_max_texture_size == 0 {
            return Err(Error::Config("export.ar_max_texture_size must be at least 1".into()));
        }
        if !self.material.displacement_scale.is_finite() || !self.material.displacement_bias.is_finite() {
            return Err(Error::Config("displacement scale and bias must be finite".into()));
        }
        Ok(())
    }
}

/// Procedural map synthesis parameters.
///
/// Frequencies are in half-periods across the full image (the terms are
/// `sin(u * PI * freq)`), amplitudes in normal-vector units for the normal map
/// and in 0..255 height units for the displacement map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthParams {
    pub weave_freq: f32,
    pub canvas_scale: f32,
    pub impasto_freq: f32,
    pub impasto_strength: f32,
    pub brush_freq: f32,
    pub normal_blur_sigma: f32,

    pub height_weave_freq: f32,
    pub height_weave_amplitude: f32,
    pub height_brush_freq: f32,
    pub height_brush_amplitude: f32,
    pub displacement_blur_sigma: f32,

    /// Longest edge of the working image; larger sources are downscaled
    pub max_resolution: u32,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            weave_freq: 120.0,
            canvas_scale: 0.03,
            impasto_freq: 24.0,
            impasto_strength: 0.1,
            brush_freq: 10.0,
            normal_blur_sigma: 1.0,

            height_weave_freq: 60.0,
            height_weave_amplitude: 10.0,
            height_brush_freq: 8.0,
            height_brush_amplitude: 14.0,
            displacement_blur_sigma: 1.5,

            max_resolution: 2048,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialParams {
    /// Normal map intensity, exaggerated past the literal map values
    pub normal_scale: f32,
    /// Height of a full-white displacement texel, in scene units
    pub displacement_scale: f32,
    /// Added to every displacement; half the scale centers the relief
    pub displacement_bias: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            normal_scale: 2.0,
            displacement_scale: 0.05,
            displacement_bias: -0.025,
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshParams {
    /// Subdivisions along each edge of the canvas plane
    pub segments: u32,
    pub frame: bool,
    pub stretchers: bool,
    pub backing: bool,
    pub wall: bool,
    pub scale_figure: bool,
    /// Frame moulding face width, scene units
    pub frame_width: f32,
    /// Height of the canvas center above the floor, scene units
    pub hang_height: f32,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            segments: 256,
            frame: true,
            stretchers: true,
            backing: true,
            wall: false,
            scale_figure: false,
            frame_width: 0.06,
            hang_height: 1.45,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiParams {
    /// Inference endpoint; `None` disables the AI path entirely
    pub endpoint: Option<String>,
    pub num_inference_steps: u32,
    pub seed: Option<u64>,
    /// Generous because the service loads model weights on first call
    pub timeout_secs: u64,
    /// Path to a MiDaS ONNX model, used when built with the `onnx` feature
    pub depth_model: Option<String>,
}

impl Default for AiParams {
    fn default() -> Self {
        Self {
            endpoint: None,
            num_inference_steps: 30,
            seed: None,
            timeout_secs: 180,
            depth_model: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceParams {
    /// Image proxy, called as `<proxy>?url=<source>`
    pub proxy: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    pub ar_max_texture_size: u32,
    pub fallback_title: String,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            ar_max_texture_size: 2048,
            fallback_title: "artwork".into(),
        }
    }
}
