// mesh/ - The relief canvas and its supporting geometry
//
// A `ReliefMesh` owns the subdivided canvas, its material, and the decor
// groups built around it. Decor is always derived from the canvas size.

mod builder;
mod decor;
pub mod geometry;
mod material;

pub use builder::{BuildOptions, CANVAS_RABBET, STRETCHER_DEPTH, build};
pub use geometry::{Geometry, Vec3};
pub use material::{SolidMaterial, SurfaceMaterial};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::dimensions::PhysicalDimensions;

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a built mesh. Clones share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecorKind {
    Stretchers,
    Frame,
    Backing,
    Wall,
    ScaleFigure,
}

impl DecorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stretchers => "stretchers",
            Self::Frame => "frame",
            Self::Backing => "backing",
            Self::Wall => "wall",
            Self::ScaleFigure => "scale_figure",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DecorPart {
    pub name: String,
    pub geometry: Geometry,
    pub material: SolidMaterial,
}

#[derive(Clone, Debug)]
pub struct DecorGroup {
    pub kind: DecorKind,
    pub parts: Vec<DecorPart>,
}

#[derive(Clone, Debug)]
pub struct ReliefMesh {
    id: MeshId,
    pub dims: PhysicalDimensions,
    /// Horizontal and vertical canvas extent in scene units
    pub canvas_size: (f32, f32),
    pub canvas: Geometry,
    pub material: SurfaceMaterial,
    pub decor: Vec<DecorGroup>,
}

impl ReliefMesh {
    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn decor_group(&self, kind: DecorKind) -> Option<&DecorGroup> {
        self.decor.iter().find(|g| g.kind == kind)
    }

    pub fn triangle_count(&self) -> usize {
        self.canvas.triangle_count()
            + self
                .decor
                .iter()
                .flat_map(|g| &g.parts)
                .map(|p| p.geometry.triangle_count())
                .sum::<usize>()
    }
}
