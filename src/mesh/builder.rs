// builder.rs - Canvas mesh sized to the piece's physical dimensions
//
// Axis convention: the canvas's horizontal (X) extent is
// `dims.height_units()` and its vertical (Y) extent is `dims.width_units()`.
// Catalog strings list the vertical measure first, and the parser hands that
// first number out as "width". Swapping here keeps portrait pieces portrait.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, info};

use super::decor::{self, Layout};
use super::{Geometry, MeshId, ReliefMesh, SurfaceMaterial};
use crate::config::{MaterialParams, MeshParams, ReliefConfig};
use crate::dimensions::PhysicalDimensions;
use crate::maps::SurfaceMapSet;

/// Depth the frame lip covers along each canvas edge
pub const CANVAS_RABBET: f32 = 0.005;
/// Minimum stretcher bar depth; deeper catalogued pieces use their own depth
pub const STRETCHER_DEPTH: f32 = 0.02;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildOptions {
    pub mesh: MeshParams,
    pub material: MaterialParams,
}

impl From<&ReliefConfig> for BuildOptions {
    fn from(config: &ReliefConfig) -> Self {
        Self {
            mesh: config.mesh.clone(),
            material: config.material.clone(),
        }
    }
}

/// Build the canvas, bind `maps`, and add the enabled decor.
///
/// `image` is `None` when the painting could not be loaded; the canvas is
/// still built at full physical size, untextured.
pub fn build(
    image: Option<Arc<RgbaImage>>,
    dims: &PhysicalDimensions,
    maps: &SurfaceMapSet,
    options: &BuildOptions,
) -> ReliefMesh {
    let width = dims.height_units();
    let height = dims.width_units();
    let segments = options.mesh.segments.max(1);

    let canvas = Geometry::plane(width, height, segments, segments);

    let mut material = SurfaceMaterial::new(image, &options.material);
    material.apply_maps(maps);

    let layout = Layout {
        width,
        height,
        stretcher_depth: dims.depth_units().max(STRETCHER_DEPTH),
        rabbet: CANVAS_RABBET.min(width.min(height) * 0.25),
        frame_width: options.mesh.frame_width,
        hang_height: options.mesh.hang_height,
        framed: options.mesh.frame,
    };

    let mut groups = Vec::new();
    if options.mesh.stretchers {
        groups.push(decor::stretchers(&layout));
    }
    if options.mesh.backing {
        groups.push(decor::backing(&layout));
    }
    if options.mesh.frame {
        groups.push(decor::frame(&layout));
    }
    if options.mesh.wall {
        groups.push(decor::wall(&layout));
    }
    if options.mesh.scale_figure {
        groups.push(decor::scale_figure(&layout));
    }

    let mesh = ReliefMesh {
        id: MeshId::next(),
        dims: dims.clone(),
        canvas_size: (width, height),
        canvas,
        material,
        decor: groups,
    };

    info!(
        width,
        height,
        segments,
        textured = mesh.material.base_color.is_some(),
        triangles = mesh.triangle_count(),
        "built relief mesh"
    );
    debug!(decor = ?mesh.decor.iter().map(|g| g.kind).collect::<Vec<_>>(), "decor groups");

    mesh
}
