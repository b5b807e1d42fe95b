// ============================================================================
// RELIEF ENGINE - Paintings to physically scaled relief models
// ============================================================================
//
// Pipeline:
//   1. Parse catalog dimensions into scene units (1 unit = 100 cm)
//   2. Build the canvas mesh and its decor at that size
//   3. Derive normal, roughness and displacement maps (AI or procedural)
//      and bind each to the live material as it lands
//   4. On export, bake displacement into a clone and serialize it
//
// The pure pipeline (parsing, synthesis, meshing, baking, serialization)
// builds for wasm32. Networking, the async preview session and the
// exporter's worker pool are native only.

pub mod bake;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod export;
pub mod maps;
pub mod mesh;
pub mod web;

#[cfg(not(target_arch = "wasm32"))]
pub mod ai;
#[cfg(not(target_arch = "wasm32"))]
pub mod session;
#[cfg(not(target_arch = "wasm32"))]
pub mod source;

pub use bake::{BakedRelief, bake};
pub use config::ReliefConfig;
pub use dimensions::{NotParseable, PhysicalDimensions};
pub use error::{Error, Result};
pub use export::{ExportArtifact, ExportFormat};
pub use maps::{MapSource, SurfaceMapSet};
pub use mesh::{BuildOptions, ReliefMesh, build};

#[cfg(not(target_arch = "wasm32"))]
pub use ai::{ModelHint, NormalMapProvider, ServiceUnavailable};
#[cfg(not(target_arch = "wasm32"))]
pub use export::Exporter;
#[cfg(not(target_arch = "wasm32"))]
pub use session::{EnhancementTicket, MapUpdate, ReliefPreview};
#[cfg(not(target_arch = "wasm32"))]
pub use source::{ImageLoader, ImageRef};
