// source.rs - Where a painting's pixels come from
//
// Remote images go through the configured proxy first and are retried once
// directly. Local images are read by the host and handed over as bytes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::config::SourceParams;
use crate::error::{Error, Result};

/// Content identity of an image reference. Enhancement results are keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(blake3::Hash);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is plenty for logs
        f.write_str(&self.0.to_hex()[..12])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    Remote { url: String },
    Local { name: String, bytes: Arc<[u8]> },
}

impl ImageRef {
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }

    pub fn local(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Local { name: name.into(), bytes: bytes.into() }
    }

    pub fn id(&self) -> ImageId {
        let mut hasher = blake3::Hasher::new();
        match self {
            Self::Remote { url } => hasher.update(b"remote\0").update(url.as_bytes()),
            Self::Local { bytes, .. } => hasher.update(b"local\0").update(bytes),
        };
        ImageId(hasher.finalize())
    }

    /// The URL a remote service could fetch, `None` for local images.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Remote { url } => Some(url),
            Self::Local { .. } => None,
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Remote { url } => url,
            Self::Local { name, .. } => name,
        }
    }
}

pub struct ImageLoader {
    client: reqwest::Client,
    proxy: Option<String>,
}

impl ImageLoader {
    pub fn new(params: &SourceParams) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { client, proxy: params.proxy.clone() })
    }

    /// Fetch and decode `source`.
    pub async fn load(&self, source: &ImageRef) -> Result<DynamicImage> {
        let bytes: Arc<[u8]> = match source {
            ImageRef::Local { bytes, .. } => Arc::clone(bytes),
            ImageRef::Remote { url } => self.fetch_remote(url).await?.into(),
        };

        let location = source.describe().to_owned();
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| Error::ImageLoad { location: location.clone(), reason: e.to_string() })?
            .map_err(|e| Error::ImageLoad { location: location.clone(), reason: e.to_string() })?;

        info!(%location, width = decoded.width(), height = decoded.height(), "loaded painting");
        Ok(decoded)
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(proxy) = &self.proxy {
            match proxied_url(proxy, url) {
                Ok(proxied) => match self.fetch(proxied.as_str()).await {
                    Ok(bytes) => return Ok(bytes),
                    Err(reason) => warn!(%url, %reason, "proxied fetch failed; retrying directly"),
                },
                Err(reason) => warn!(%proxy, %reason, "unusable proxy url; fetching directly"),
            }
        }

        self.fetch(url).await.map_err(|reason| Error::ImageLoad { location: url.to_owned(), reason })
    }

    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        debug!(%url, "fetching image");
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

fn proxied_url(proxy: &str, source: &str) -> std::result::Result<reqwest::Url, String> {
    reqwest::Url::parse_with_params(proxy, &[("url", source)]).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one GET with `status` and `body`; yields the request line.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
            }

            let mut response =
                format!("HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n", body.len()).into_bytes();
            response.extend_from_slice(&body);
            // error responses may be dropped unread
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&buf).lines().next().unwrap_or_default().to_owned()
        });

        (base, handle)
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::new(3, 2).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn ids_follow_content() {
        let a = ImageRef::remote("https://example.org/a.jpg");
        assert_eq!(a.id(), ImageRef::remote("https://example.org/a.jpg").id());
        assert_ne!(a.id(), ImageRef::remote("https://example.org/b.jpg").id());

        let local = ImageRef::local("a.png", vec![1u8, 2, 3]);
        assert_eq!(local.id(), ImageRef::local("renamed.png", vec![1u8, 2, 3]).id());
        assert!(local.url().is_none());
    }

    #[test]
    fn proxy_url_encodes_source() {
        let url = proxied_url("https://proxy.example/api/image", "https://museum.example/img?id=4&s=2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://proxy.example/api/image?url=https%3A%2F%2Fmuseum.example%2Fimg%3Fid%3D4%26s%3D2"
        );
    }

    #[tokio::test]
    async fn local_images_decode_without_network() {
        let loader = ImageLoader::new(&SourceParams::default()).unwrap();
        let img = loader.load(&ImageRef::local("tiny.png", png_bytes())).await.unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[tokio::test]
    async fn failed_proxy_is_retried_directly() {
        let (proxy, proxy_server) = serve_once("502 Bad Gateway", b"upstream error".to_vec()).await;
        let (direct, direct_server) = serve_once("200 OK", png_bytes()).await;
        let url = format!("{direct}/paintings/irises.png");

        let params = SourceParams { proxy: Some(format!("{proxy}/api/image")) };
        let img = ImageLoader::new(&params).unwrap().load(&ImageRef::remote(&url)).await.unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));

        let proxied = proxy_server.await.unwrap();
        assert!(proxied.starts_with("GET /api/image?url=http%3A%2F%2F127.0.0.1"), "{proxied}");
        assert_eq!(direct_server.await.unwrap(), "GET /paintings/irises.png HTTP/1.1");
    }

    #[tokio::test]
    async fn proxy_and_direct_failures_are_a_load_error() {
        let (proxy, proxy_server) = serve_once("502 Bad Gateway", Vec::new()).await;
        let (direct, direct_server) = serve_once("404 Not Found", Vec::new()).await;
        let url = format!("{direct}/missing.jpg");

        let params = SourceParams { proxy: Some(format!("{proxy}/api/image")) };
        let err = ImageLoader::new(&params).unwrap().load(&ImageRef::remote(&url)).await.unwrap_err();
        assert!(matches!(&err, Error::ImageLoad { location, .. } if *location == url), "{err}");

        proxy_server.await.unwrap();
        direct_server.await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_bytes_are_a_load_error() {
        let loader = ImageLoader::new(&SourceParams::default()).unwrap();
        let err = loader.load(&ImageRef::local("junk.png", vec![0u8; 16])).await.unwrap_err();
        assert!(matches!(err, Error::ImageLoad { location, .. } if location == "junk.png"));
    }
}
