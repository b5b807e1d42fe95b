// ai/ - Learned normal-map providers
//
// A provider either hands back a normal map or says it is unavailable.
// Every failure mode collapses into `ServiceUnavailable`; the caller falls
// back to the procedural map and never sees anything more specific.

#[cfg(feature = "onnx")]
mod onnx;
mod remote;

#[cfg(feature = "onnx")]
pub use onnx::OnnxDepthProvider;
pub use remote::RemoteNormalProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use crate::config::AiParams;
use crate::error::Result;
use crate::source::ImageRef;

/// Fewest diffusion steps the inference service will run
pub const MIN_INFERENCE_STEPS: u32 = 20;

/// The single failure signal of a provider. `reason` is for logs only.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("normal-map service unavailable: {reason}")]
pub struct ServiceUnavailable {
    pub reason: String,
}

impl ServiceUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelHint {
    num_inference_steps: u32,
    seed: Option<u64>,
}

impl ModelHint {
    pub fn new(num_inference_steps: u32, seed: Option<u64>) -> Self {
        Self { num_inference_steps: num_inference_steps.max(MIN_INFERENCE_STEPS), seed }
    }

    pub fn num_inference_steps(&self) -> u32 {
        self.num_inference_steps
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Default for ModelHint {
    fn default() -> Self {
        Self::from(&AiParams::default())
    }
}

impl From<&AiParams> for ModelHint {
    fn from(params: &AiParams) -> Self {
        Self::new(params.num_inference_steps, params.seed)
    }
}

pub struct NormalRequest<'a> {
    pub image: &'a ImageRef,
    /// Working-resolution pixels, for providers that run locally
    pub pixels: &'a RgbImage,
    pub hint: ModelHint,
}

#[async_trait]
pub trait NormalMapProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// A tangent-space normal map for the requested image, at any resolution.
    async fn request_normal_map(&self, request: NormalRequest<'_>) -> std::result::Result<RgbImage, ServiceUnavailable>;
}

/// The provider `params` selects, if any. A remote endpoint wins over a local model.
pub fn provider_from_config(params: &AiParams) -> Result<Option<Arc<dyn NormalMapProvider>>> {
    if let Some(endpoint) = &params.endpoint {
        let provider = RemoteNormalProvider::new(endpoint, Duration::from_secs(params.timeout_secs))?;
        return Ok(Some(Arc::new(provider)));
    }

    Ok(local_provider(params))
}

#[cfg(feature = "onnx")]
fn local_provider(params: &AiParams) -> Option<Arc<dyn NormalMapProvider>> {
    let model = params.depth_model.as_ref()?;
    Some(Arc::new(OnnxDepthProvider::new(model)))
}

#[cfg(not(feature = "onnx"))]
fn local_provider(params: &AiParams) -> Option<Arc<dyn NormalMapProvider>> {
    if let Some(model) = &params.depth_model {
        tracing::warn!(%model, "depth model configured but built without the onnx feature");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_floor_is_enforced() {
        assert_eq!(ModelHint::new(10, None).num_inference_steps(), 20);
        assert_eq!(ModelHint::new(50, Some(7)).num_inference_steps(), 50);
        assert_eq!(ModelHint::default().num_inference_steps(), 30);
    }

    #[test]
    fn no_endpoint_means_no_provider() {
        assert!(provider_from_config(&AiParams::default()).unwrap().is_none());

        let params = AiParams { endpoint: Some("http://127.0.0.1:8000/marigold-normals".into()), ..AiParams::default() };
        let provider = provider_from_config(&params).unwrap().unwrap();
        assert_eq!(provider.name(), "remote");
    }
}
