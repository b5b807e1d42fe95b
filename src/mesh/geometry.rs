// geometry.rs - Indexed triangle geometry
//
// Right-handed, Y up, +Z toward the viewer. Triangles wind
// counter-clockwise seen from their front. UVs follow image rows:
// v = 0 is the top edge.

pub type Vec3 = [f32; 3];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Subdivided rectangle in the XY plane, centered on the origin, facing +Z.
    pub fn plane(width: f32, height: f32, segments_x: u32, segments_y: u32) -> Self {
        let (sx, sy) = (segments_x.max(1), segments_y.max(1));
        let count = ((sx + 1) * (sy + 1)) as usize;
        let mut g = Self {
            positions: Vec::with_capacity(count),
            normals: Vec::with_capacity(count),
            uvs: Vec::with_capacity(count),
            indices: Vec::with_capacity((sx * sy * 6) as usize),
        };

        for iy in 0..=sy {
            let v = iy as f32 / sy as f32;
            for ix in 0..=sx {
                let u = ix as f32 / sx as f32;
                g.positions.push([(u - 0.5) * width, (0.5 - v) * height, 0.0]);
                g.normals.push([0.0, 0.0, 1.0]);
                g.uvs.push([u, v]);
            }
        }

        let row = sx + 1;
        for iy in 0..sy {
            for ix in 0..sx {
                let a = iy * row + ix;
                let b = a + row;
                let c = b + 1;
                let d = a + 1;
                g.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
        g
    }

    /// Axis-aligned box with flat-shaded faces.
    pub fn cuboid(center: Vec3, size: Vec3) -> Self {
        let [hx, hy, hz] = [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0];
        let mut g = Self::default();
        // (normal, u axis, v axis, half extent along normal, half u, half v)
        let faces: [(Vec3, Vec3, Vec3, f32, f32, f32); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], hx, hz, hy),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], hx, hz, hy),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], hy, hx, hz),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], hy, hx, hz),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], hz, hx, hy),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], hz, hx, hy),
        ];

        for (n, u, v, hn, hu, hv) in faces {
            let base = g.positions.len() as u32;
            let c = add(center, scale(n, hn));
            let corners = [(-1.0, -1.0, [0.0, 1.0]), (1.0, -1.0, [1.0, 1.0]), (1.0, 1.0, [1.0, 0.0]), (-1.0, 1.0, [0.0, 0.0])];
            for (su, sv, uv) in corners {
                g.positions.push(add(c, add(scale(u, su * hu), scale(v, sv * hv))));
                g.normals.push(n);
                g.uvs.push(uv);
            }
            g.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        g
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Area-weighted smooth normals from the current triangles.
    pub fn compute_vertex_normals(&mut self) {
        let mut acc = vec![[0.0f32; 3]; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (pa, pb, pc) = (self.positions[a], self.positions[b], self.positions[c]);
            let face = cross(sub(pb, pa), sub(pc, pa));
            for i in [a, b, c] {
                acc[i] = add(acc[i], face);
            }
        }
        self.normals = acc
            .into_iter()
            .map(|n| normalize(n).unwrap_or([0.0, 0.0, 1.0]))
            .collect();
    }

    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(mut lo, mut hi), p| {
            for k in 0..3 {
                lo[k] = lo[k].min(p[k]);
                hi[k] = hi[k].max(p[k]);
            }
            (lo, hi)
        }))
    }
}

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: Vec3, s: f32) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

#[inline]
pub fn normalize(a: Vec3) -> Option<Vec3> {
    let len = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
    (len > f32::EPSILON).then(|| scale(a, 1.0 / len))
}
