// cli.rs - Command line arguments and their mapping onto the config

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use relief_engine::source::ImageRef;
use relief_engine::{PhysicalDimensions, ReliefConfig, Result, dimensions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Glb,
    Usdz,
    Both,
}

impl Format {
    pub fn glb(self) -> bool {
        matches!(self, Self::Glb | Self::Both)
    }

    pub fn usdz(self) -> bool {
        matches!(self, Self::Usdz | Self::Both)
    }
}

/// Turn a painting into a physically scaled relief model.
#[derive(Debug, Parser)]
#[command(name = "painting2model", version)]
pub struct Args {
    /// Painting image, as a local path or an http(s) URL
    pub image: String,

    /// Catalog dimension text, e.g. "29 1/8 x 36 1/4 in. (73.7 x 92.1 cm)"
    #[arg(long)]
    pub dimensions: Option<String>,

    /// Manual width in cm; overrides --dimensions
    #[arg(long, requires = "height_cm")]
    pub width_cm: Option<f32>,

    /// Manual height in cm; overrides --dimensions
    #[arg(long, requires = "width_cm")]
    pub height_cm: Option<f32>,

    /// Depth in cm; applies to manual or catalog dimensions
    #[arg(long)]
    pub depth_cm: Option<f32>,

    /// Artwork title, used for output file names
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Both)]
    pub format: Format,

    /// JSON config file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Normal-map inference endpoint
    #[arg(long)]
    pub ai_endpoint: Option<String>,

    /// Image proxy, called as <proxy>?url=<image>
    #[arg(long)]
    pub proxy: Option<String>,

    /// Canvas subdivisions per side
    #[arg(long)]
    pub segments: Option<u32>,

    /// Add a wall behind the piece
    #[arg(long)]
    pub wall: bool,

    /// Add a 1.8 m figure for scale
    #[arg(long)]
    pub figure: bool,

    #[arg(long)]
    pub no_frame: bool,
}

impl Args {
    pub fn config(&self) -> Result<ReliefConfig> {
        let mut config = match &self.config {
            Some(path) => ReliefConfig::load(path)?,
            None => ReliefConfig::default(),
        };

        if let Some(endpoint) = &self.ai_endpoint {
            config.ai.endpoint = Some(endpoint.clone());
        }
        if let Some(proxy) = &self.proxy {
            config.source.proxy = Some(proxy.clone());
        }
        if let Some(segments) = self.segments {
            config.mesh.segments = segments;
        }
        config.mesh.wall |= self.wall;
        config.mesh.scale_figure |= self.figure;
        if self.no_frame {
            config.mesh.frame = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn image_ref(&self) -> Result<ImageRef> {
        if self.image.starts_with("http://") || self.image.starts_with("https://") {
            return Ok(ImageRef::remote(&self.image));
        }
        let bytes = std::fs::read(&self.image)?;
        Ok(ImageRef::local(&self.image, bytes))
    }

    /// Manual size first, then catalog text, then the default.
    pub fn dimensions(&self) -> Result<PhysicalDimensions> {
        if let (Some(w), Some(h)) = (self.width_cm, self.height_cm) {
            return PhysicalDimensions::from_centimeters(w, h, self.depth_cm);
        }
        let parsed = dimensions::parse_or_default(self.dimensions.as_deref().unwrap_or(""));
        match self.depth_cm {
            Some(d) => parsed.with_depth_cm(d),
            None => Ok(parsed),
        }
    }

    /// Explicit title, else the image's file stem.
    pub fn title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let path = self.image.split(['?', '#']).next().unwrap_or_default();
        Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
