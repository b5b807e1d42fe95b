// bake.rs - Flatten shader displacement into vertex positions
//
// Interchange formats store static geometry only, so the relief has to move
// into the vertices before export. Baking always works on a clone: the live
// preview keeps its flat canvas and shader displacement.

use std::ops::Deref;

use tracing::debug;

use crate::mesh::ReliefMesh;
use crate::mesh::geometry::{add, scale};

/// A clone of a `ReliefMesh` whose canvas carries its relief in geometry.
///
/// Only the exporters accept this type, so the live mesh can never be
/// serialized unbaked.
#[derive(Clone, Debug)]
pub struct BakedRelief {
    mesh: ReliefMesh,
    displaced: bool,
}

impl BakedRelief {
    pub fn mesh(&self) -> &ReliefMesh {
        &self.mesh
    }

    /// False when there was no displacement map to bake.
    pub fn is_displaced(&self) -> bool {
        self.displaced
    }
}

impl Deref for BakedRelief {
    type Target = ReliefMesh;

    fn deref(&self) -> &ReliefMesh {
        &self.mesh
    }
}

/// Displace a fresh clone of `mesh` by its displacement map.
///
/// Each canvas vertex samples the nearest texel at its UV and moves along its
/// pre-bake normal by `texel * scale + bias`. Normals are then recomputed
/// from the displaced triangles. With no map bound this returns an
/// unmodified clone.
pub fn bake(mesh: &ReliefMesh) -> BakedRelief {
    bake_owned(mesh.clone())
}

/// `bake` for a clone the caller already made.
pub fn bake_owned(mut baked: ReliefMesh) -> BakedRelief {
    let Some(map) = baked.material.displacement_map.clone() else {
        debug!("no displacement map bound; baking is a no-op");
        return BakedRelief { mesh: baked, displaced: false };
    };

    let (scale_units, bias) = (baked.material.displacement_scale, baked.material.displacement_bias);
    let canvas = &mut baked.canvas;
    for ((p, n), uv) in canvas.positions.iter_mut().zip(&canvas.normals).zip(&canvas.uvs) {
        let h = map.sample_nearest(uv[0], uv[1]) * scale_units + bias;
        *p = add(*p, scale(*n, h));
    }
    canvas.compute_vertex_normals();

    debug!(
        vertices = canvas.vertex_count(),
        map_width = map.width(),
        map_height = map.height(),
        "baked displacement into canvas"
    );

    BakedRelief { mesh: baked, displaced: true }
}
