// exporter.rs - Async export entry points
//
// Each export clones the mesh, bakes and serializes it on the blocking pool,
// and hands back the bytes. A second request for the same mesh and format
// while one is running is refused rather than queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::info;

use super::{ExportArtifact, ExportFormat, GLB_SIZE_LIMIT, write_gltf, write_usdz};
use crate::bake::bake_owned;
use crate::config::ExportParams;
use crate::error::{Error, Result};
use crate::mesh::{MeshId, ReliefMesh};

type InFlightKey = (MeshId, ExportFormat);

#[derive(Clone, Debug, Default)]
pub struct Exporter {
    params: ExportParams,
    in_flight: Arc<Mutex<HashSet<InFlightKey>>>,
}

impl Exporter {
    pub fn new(params: ExportParams) -> Self {
        Self { params, in_flight: Arc::default() }
    }

    /// Baked binary glTF, or text glTF if the scene is too large for GLB.
    pub async fn export_binary(&self, mesh: &ReliefMesh, title: &str) -> Result<ExportArtifact> {
        let _claim = self.claim(mesh.id(), ExportFormat::Glb)?;
        let snapshot = mesh.clone();

        let (bytes, format) = tokio::task::spawn_blocking(move || write_gltf(&bake_owned(snapshot), GLB_SIZE_LIMIT))
            .await
            .map_err(|e| Error::Export(format!("glTF export task failed: {e}")))??;

        info!(bytes = bytes.len(), %format, "binary export finished");
        Ok(ExportArtifact::new(bytes, format, title, &self.params.fallback_title))
    }

    /// Baked USDZ with textures bounded for mobile AR viewers.
    pub async fn export_mobile_ar(&self, mesh: &ReliefMesh, title: &str) -> Result<ExportArtifact> {
        let _claim = self.claim(mesh.id(), ExportFormat::Usdz)?;
        let snapshot = mesh.clone();
        let max_texture = self.params.ar_max_texture_size;

        let bytes = tokio::task::spawn_blocking(move || write_usdz(&bake_owned(snapshot), max_texture))
            .await
            .map_err(|e| Error::Export(format!("USDZ export task failed: {e}")))??;

        info!(bytes = bytes.len(), max_texture, "mobile AR export finished");
        Ok(ExportArtifact::new(bytes, ExportFormat::Usdz, title, &self.params.fallback_title))
    }

    fn claim(&self, mesh: MeshId, format: ExportFormat) -> Result<Claim> {
        let key = (mesh, format);
        let mut set = self.in_flight.lock().map_err(|_| Error::Export("export registry poisoned".into()))?;
        if !set.insert(key) {
            return Err(Error::ExportInProgress(format));
        }
        Ok(Claim { set: Arc::clone(&self.in_flight), key })
    }
}

/// Releases an in-flight slot when the export finishes, fails or is dropped.
struct Claim {
    set: Arc<Mutex<HashSet<InFlightKey>>>,
    key: InFlightKey,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::PhysicalDimensions;
    use crate::maps::SurfaceMapSet;
    use crate::mesh::{BuildOptions, build};

    fn mesh() -> ReliefMesh {
        let mut options = BuildOptions::default();
        options.mesh.segments = 2;
        build(None, &PhysicalDimensions::fallback(""), &SurfaceMapSet::empty(), &options)
    }

    #[tokio::test]
    async fn concurrent_export_of_same_format_is_refused() {
        let exporter = Exporter::default();
        let mesh = mesh();

        let (first, second) = tokio::join!(exporter.export_binary(&mesh, "a"), exporter.export_binary(&mesh, "a"));
        assert_eq!(first.unwrap().format, ExportFormat::Glb);
        assert!(matches!(second, Err(Error::ExportInProgress(ExportFormat::Glb))));

        // slot is released afterwards
        assert!(exporter.export_binary(&mesh, "a").await.is_ok());
    }

    #[tokio::test]
    async fn different_formats_run_side_by_side() {
        let exporter = Exporter::default();
        let mesh = mesh();

        let (glb, usdz) = tokio::join!(exporter.export_binary(&mesh, "Irises"), exporter.export_mobile_ar(&mesh, "Irises"));
        assert_eq!(glb.unwrap().filename, "Irises.glb");
        assert_eq!(usdz.unwrap().filename, "Irises.usdz");
    }

    #[tokio::test]
    async fn export_leaves_live_mesh_alone() {
        let exporter = Exporter::default();
        let mesh = mesh();
        let before = mesh.canvas.clone();
        exporter.export_binary(&mesh, "").await.unwrap();
        assert_eq!(mesh.canvas, before);
    }
}
