// remote.rs - HTTP client for the normal-map inference service
//
// POST {image_url, num_inference_steps, seed?} and get back
// {normal_map_base64: "data:image/png;base64,..."}. The service fetches
// the image itself, so only remote images qualify.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{NormalMapProvider, NormalRequest, ServiceUnavailable};
use crate::error::Result;

#[derive(Serialize)]
struct ServiceRequest<'a> {
    image_url: &'a str,
    num_inference_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct ServiceResponse {
    normal_map_base64: String,
}

pub struct RemoteNormalProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteNormalProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }
}

#[async_trait]
impl NormalMapProvider for RemoteNormalProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn request_normal_map(&self, request: NormalRequest<'_>) -> std::result::Result<RgbImage, ServiceUnavailable> {
        let Some(image_url) = request.image.url() else {
            return Err(ServiceUnavailable::new("local images cannot be sent to the service"));
        };

        let body = ServiceRequest {
            image_url,
            num_inference_steps: request.hint.num_inference_steps(),
            seed: request.hint.seed(),
        };
        info!(endpoint = %self.endpoint, steps = body.num_inference_steps, "requesting AI normal map");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceUnavailable::new(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceUnavailable::new(format!("service answered {status}")));
        }

        let payload: ServiceResponse = response
            .json()
            .await
            .map_err(|e| ServiceUnavailable::new(format!("malformed response: {e}")))?;

        let png = decode_data_uri(&payload.normal_map_base64)?;
        debug!(bytes = png.len(), "decoding AI normal map");
        tokio::task::spawn_blocking(move || image::load_from_memory(&png).map(|img| img.to_rgb8()))
            .await
            .map_err(|e| ServiceUnavailable::new(format!("decode task failed: {e}")))?
            .map_err(|e| ServiceUnavailable::new(format!("undecodable normal map: {e}")))
    }
}

/// Bytes of a base64 `data:` URI. A bare base64 string is accepted too.
fn decode_data_uri(uri: &str) -> std::result::Result<Vec<u8>, ServiceUnavailable> {
    let payload = match uri.strip_prefix("data:") {
        Some(rest) => {
            let Some((header, data)) = rest.split_once(',') else {
                return Err(ServiceUnavailable::new("data uri has no payload"));
            };
            if !header.ends_with(";base64") {
                return Err(ServiceUnavailable::new(format!("unsupported data uri encoding: {header}")));
            }
            data
        }
        None => uri,
    };
    if payload.is_empty() {
        return Err(ServiceUnavailable::new("empty normal map payload"));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| ServiceUnavailable::new(format!("invalid base64: {e}")))
}
