// painting2model - Build and export a relief model from a painting
//
// Pipeline:
//   1. Load the image (path or URL, via proxy if configured)
//   2. Parse or take manual dimensions
//   3. Build the preview mesh and run enhancement to completion
//   4. Export GLB and/or USDZ into the output directory
//
// Usage: painting2model <image> [--dimensions TEXT] [--format glb|usdz|both] ...
// Logging follows RUST_LOG (default: info).

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use relief_engine::ai::provider_from_config;
use relief_engine::{ExportArtifact, Exporter, ImageLoader, ReliefPreview, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = cli::Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&args)) {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "painting2model failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &cli::Args) -> Result<Vec<PathBuf>> {
    let config = args.config()?;
    let source = args.image_ref()?;
    let dims = args.dimensions()?;
    info!(
        image = source.describe(),
        width = dims.width_units(),
        height = dims.height_units(),
        depth = dims.depth_units(),
        "starting"
    );

    let loader = ImageLoader::new(&config.source)?;
    let pixels = match loader.load(&source).await {
        Ok(pixels) => Some(pixels),
        Err(e) => {
            warn!(error = %e, "painting could not be loaded; exporting an untextured model");
            None
        }
    };

    let mut preview = ReliefPreview::new(&config);
    preview.set_source(source, pixels.as_ref(), dims);

    let provider = provider_from_config(&config.ai)?;
    let provenance = preview.enhance(provider).await;
    info!(?provenance, triangles = preview.mesh().triangle_count(), "preview ready");

    std::fs::create_dir_all(&args.out_dir)?;
    let exporter = Exporter::new(config.export.clone());
    let title = args.title();
    let mut written = Vec::new();

    if args.format.glb() {
        let artifact = exporter.export_binary(preview.mesh(), &title).await?;
        written.push(save(&args.out_dir, &artifact)?);
    }
    if args.format.usdz() {
        let artifact = exporter.export_mobile_ar(preview.mesh(), &title).await?;
        written.push(save(&args.out_dir, &artifact)?);
    }

    Ok(written)
}

fn save(dir: &Path, artifact: &ExportArtifact) -> Result<PathBuf> {
    let path = dir.join(&artifact.filename);
    std::fs::write(&path, &artifact.bytes)?;
    info!(path = %path.display(), bytes = artifact.bytes.len(), format = %artifact.format, "wrote export");
    Ok(path)
}
