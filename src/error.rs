// error.rs - Crate-wide error type
//
// Recoverable pipeline signals (unparseable dimensions, an unavailable
// inference service) have their own small types next to the code that
// raises them. Everything here is surfaced to the caller.

use crate::export::ExportFormat;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to load image from {location}: {reason}")]
    ImageLoad { location: String, reason: String },
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error("a {0} export is already in progress for this mesh")]
    ExportInProgress(ExportFormat),
    #[error("export failed: {0}")]
    Export(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("error while encoding or decoding an image: {0}")]
    Image(#[from] image::ImageError),
    #[error("there was an i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("error while writing a zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[cfg(not(target_arch = "wasm32"))]
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}
