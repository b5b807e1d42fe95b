// Enhancement against a throwaway inference server on loopback.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use relief_engine::ai::{NormalMapProvider, RemoteNormalProvider};
use relief_engine::session::{ApplyOutcome, EnhancementState};
use relief_engine::{ImageRef, MapSource, PhysicalDimensions, ReliefConfig, ReliefPreview};
use std::io::Cursor;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Answer exactly one request with `status` and `body`; yields the request body.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/marigold-normals", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&buf[header_end..]).into_owned()
    });

    (url, handle)
}

fn config() -> ReliefConfig {
    let mut config = ReliefConfig::default();
    config.mesh.segments = 8;
    config
}

fn painting() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(24, 16, |x, y| Rgb([(x * 10) as u8, (y * 15) as u8, 120])))
}

fn provider(url: &str) -> Option<Arc<dyn NormalMapProvider>> {
    Some(Arc::new(RemoteNormalProvider::new(url, Duration::from_secs(10)).unwrap()))
}

#[tokio::test]
async fn gone_service_falls_back_to_procedural() {
    let (url, server) = serve_once("410 Gone", r#"{"detail":"gone"}"#.into()).await;

    let mut preview = ReliefPreview::new(&config());
    preview.set_source(ImageRef::remote("https://museum.example/a.jpg"), Some(&painting()), PhysicalDimensions::fallback(""));

    let source = preview.enhance(provider(&url)).await;
    assert_eq!(source, MapSource::Procedural);
    assert_eq!(preview.state(), EnhancementState::Done);
    assert!(preview.maps().is_complete());
    assert_eq!(preview.mesh().material.source, MapSource::Procedural);

    let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(request["image_url"], "https://museum.example/a.jpg");
    assert_eq!(request["num_inference_steps"], 30);
    assert!(request.get("seed").is_none());
}

#[tokio::test]
async fn service_normal_map_is_fitted_and_marked_ai() {
    let mut png = Vec::new();
    RgbImage::from_pixel(4, 4, Rgb([100, 150, 240]))
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    let body = serde_json::json!({ "normal_map_base64": format!("data:image/png;base64,{}", STANDARD.encode(&png)) });
    let (url, server) = serve_once("200 OK", body.to_string()).await;

    let mut preview = ReliefPreview::new(&config());
    preview.set_source(ImageRef::remote("https://museum.example/b.jpg"), Some(&painting()), PhysicalDimensions::fallback(""));

    assert_eq!(preview.enhance(provider(&url)).await, MapSource::Ai);
    let normal = preview.maps().normal.clone().unwrap();
    assert_eq!(normal.dimensions(), (24, 16));
    assert_eq!(*normal.get_pixel(12, 8), Rgb([100, 150, 240]));
    server.await.unwrap();
}

#[tokio::test]
async fn local_image_never_reaches_the_service() {
    // nothing listens here; a request would fail the same way, but the provider must refuse first
    let mut preview = ReliefPreview::new(&config());
    preview.set_source(ImageRef::local("scan.png", vec![1u8, 2, 3]), Some(&painting()), PhysicalDimensions::fallback(""));
    assert_eq!(preview.enhance(provider("http://127.0.0.1:1/x")).await, MapSource::Procedural);
}

#[tokio::test]
async fn results_for_a_replaced_image_are_discarded() {
    let mut preview = ReliefPreview::new(&config());
    preview.set_source(ImageRef::remote("https://museum.example/first.jpg"), Some(&painting()), PhysicalDimensions::fallback(""));
    let job = preview.begin_enhancement(None).unwrap();
    let stale_ticket = job.ticket();

    // user switches paintings while the first job is still in flight
    let current = preview.set_source(
        ImageRef::remote("https://museum.example/second.jpg"),
        Some(&painting()),
        PhysicalDimensions::fallback(""),
    );
    assert_ne!(stale_ticket, current);

    let (tx, mut rx) = mpsc::unbounded_channel();
    job.run(tx).await;

    let mut outcomes = Vec::new();
    while let Some(update) = rx.recv().await {
        outcomes.push(preview.apply(update));
    }
    assert_eq!(outcomes, vec![ApplyOutcome::Stale; 3]);
    assert!(preview.maps().normal.is_none());
    assert!(preview.mesh().material.displacement_map.is_none());

    // the new image still gets its own run
    assert_eq!(preview.enhance(None).await, MapSource::Procedural);
}
