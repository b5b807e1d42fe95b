// export/ - Baked scene serialization
//
// Both formats take a `BakedRelief`, never a live mesh. The async
// `Exporter` does the baking itself on a clone, off the caller's task.

mod gltf;
mod usdz;

pub use gltf::{GLB_SIZE_LIMIT, write_gltf};
pub use usdz::write_usdz;

use std::fmt;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, imageops::FilterType};

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Binary glTF
    Glb,
    /// JSON glTF with an embedded data-URI buffer, used when a GLB cannot hold the content
    GltfText,
    /// Zipped USD for mobile AR viewers
    Usdz,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::GltfText => "gltf",
            Self::Usdz => "usdz",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Serialized model ready to hand to a save dialog.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    pub filename: String,
}

impl ExportArtifact {
    pub fn new(bytes: Vec<u8>, format: ExportFormat, title: &str, fallback_title: &str) -> Self {
        let stem = sanitize_title(title).unwrap_or_else(|| sanitize_title(fallback_title).unwrap_or_else(|| "artwork".into()));
        Self {
            filename: format!("{stem}.{}", format.extension()),
            bytes,
            format,
        }
    }
}

/// Filesystem-safe stem from an artwork title, `None` if nothing usable remains.
pub fn sanitize_title(title: &str) -> Option<String> {
    const MAX_LEN: usize = 80;

    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() || c == '-' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed: String = out.trim_matches('_').chars().take(MAX_LEN).collect();
    let trimmed = trimmed.trim_end_matches('_');
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

pub(crate) fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Downscale so neither edge exceeds `max_edge`, keeping aspect.
pub(crate) fn bound_texture(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        return img;
    }
    img.resize(max_edge, max_edge, FilterType::Lanczos3)
}

#[cfg(not(target_arch = "wasm32"))]
mod exporter;
#[cfg(not(target_arch = "wasm32"))]
pub use exporter::Exporter;
