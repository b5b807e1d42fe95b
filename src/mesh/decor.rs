// decor.rs - Stretchers, frame, backing, wall and scale figure
//
// Everything is placed relative to the canvas: front face at z = 0,
// centered on the origin. The floor sits `hang_height` below the canvas
// center.

use super::{DecorGroup, DecorKind, DecorPart, Geometry, SolidMaterial};

const STRETCHER_BAR: f32 = 0.04;
const BACKING_THICKNESS: f32 = 0.003;
/// Frame face stands this far in front of the canvas, clear of the relief
const FRAME_PROUD: f32 = 0.03;
const WALL_THICKNESS: f32 = 0.05;
/// Clearance between stacked layers
const GAP: f32 = 0.0005;

const FIGURE_HEIGHT: f32 = 1.8;
const FIGURE_OFFSET: f32 = 0.5;

pub(super) struct Layout {
    pub width: f32,
    pub height: f32,
    pub stretcher_depth: f32,
    pub rabbet: f32,
    pub frame_width: f32,
    pub hang_height: f32,
    pub framed: bool,
}

impl Layout {
    fn floor(&self) -> f32 {
        -self.hang_height
    }

    /// Half-width of the piece including the frame, if any
    fn outer_half_width(&self) -> f32 {
        let frame = if self.framed { self.frame_width - self.rabbet } else { 0.0 };
        self.width / 2.0 + frame.max(0.0)
    }

    fn back(&self) -> f32 {
        -(GAP + self.stretcher_depth + BACKING_THICKNESS + GAP)
    }
}

fn part(name: impl Into<String>, center: [f32; 3], size: [f32; 3], material: SolidMaterial) -> DecorPart {
    DecorPart {
        name: name.into(),
        geometry: Geometry::cuboid(center, size),
        material,
    }
}

pub(super) fn stretchers(l: &Layout) -> DecorGroup {
    let (w, h, d) = (l.width, l.height, l.stretcher_depth);
    let bar = STRETCHER_BAR.min(w.min(h) * 0.25);
    let z = -(GAP + d / 2.0);
    let m = SolidMaterial::STRETCHER;

    let mut parts = vec![
        part("stretcher_top", [0.0, (h - bar) / 2.0, z], [w, bar, d], m),
        part("stretcher_bottom", [0.0, -(h - bar) / 2.0, z], [w, bar, d], m),
        part("stretcher_left", [-(w - bar) / 2.0, 0.0, z], [bar, h - 2.0 * bar, d], m),
        part("stretcher_right", [(w - bar) / 2.0, 0.0, z], [bar, h - 2.0 * bar, d], m),
    ];
    // Cross braces on large canvases
    if w > 1.0 {
        parts.push(part("stretcher_brace_vertical", [0.0, 0.0, z], [bar, h - 2.0 * bar, d], m));
    }
    if h > 1.0 {
        parts.push(part("stretcher_brace_horizontal", [0.0, 0.0, z], [w - 2.0 * bar, bar, d], m));
    }

    DecorGroup { kind: DecorKind::Stretchers, parts }
}

pub(super) fn backing(l: &Layout) -> DecorGroup {
    let z = -(GAP + l.stretcher_depth + BACKING_THICKNESS / 2.0);
    DecorGroup {
        kind: DecorKind::Backing,
        parts: vec![part("backing", [0.0, 0.0, z], [l.width, l.height, BACKING_THICKNESS], SolidMaterial::BACKING)],
    }
}

/// Four rails whose inner edge overlaps the canvas by the rabbet.
pub(super) fn frame(l: &Layout) -> DecorGroup {
    let fw = l.frame_width;
    let (ow, oh) = (l.width - 2.0 * l.rabbet, l.height - 2.0 * l.rabbet);
    let depth = FRAME_PROUD - l.back();
    let z = FRAME_PROUD - depth / 2.0;
    let m = SolidMaterial::FRAME;

    DecorGroup {
        kind: DecorKind::Frame,
        parts: vec![
            part("frame_top", [0.0, (oh + fw) / 2.0, z], [ow + 2.0 * fw, fw, depth], m),
            part("frame_bottom", [0.0, -(oh + fw) / 2.0, z], [ow + 2.0 * fw, fw, depth], m),
            part("frame_left", [-(ow + fw) / 2.0, 0.0, z], [fw, oh, depth], m),
            part("frame_right", [(ow + fw) / 2.0, 0.0, z], [fw, oh, depth], m),
        ],
    }
}

/// Flush wall behind the piece, standing on the floor.
pub(super) fn wall(l: &Layout) -> DecorGroup {
    let width = (l.outer_half_width() * 2.0 * 3.0).max(4.0);
    let top = (l.height / 2.0 + 0.5).max(3.0 - l.hang_height);
    let height = top - l.floor();
    let z = l.back() - WALL_THICKNESS / 2.0;

    DecorGroup {
        kind: DecorKind::Wall,
        parts: vec![part("wall", [0.0, l.floor() + height / 2.0, z], [width, height, WALL_THICKNESS], SolidMaterial::WALL)],
    }
}

/// A 1.8 m block figure standing on the floor to the right of the piece.
pub(super) fn scale_figure(l: &Layout) -> DecorGroup {
    let floor = l.floor();
    let cx = l.outer_half_width() + FIGURE_OFFSET + 0.25;
    let cz = 0.3;
    let m = SolidMaterial::FIGURE;

    // (name, x offset, bottom, top, width, depth); heights from the floor
    let blocks: [(&str, f32, f32, f32, f32, f32); 7] = [
        ("figure_leg_left", -0.085, 0.0, 0.85, 0.13, 0.15),
        ("figure_leg_right", 0.085, 0.0, 0.85, 0.13, 0.15),
        ("figure_torso", 0.0, 0.85, 1.45, 0.40, 0.22),
        ("figure_arm_left", -0.25, 0.80, 1.43, 0.09, 0.10),
        ("figure_arm_right", 0.25, 0.80, 1.43, 0.09, 0.10),
        ("figure_neck", 0.0, 1.45, 1.55, 0.09, 0.09),
        ("figure_head", 0.0, 1.55, FIGURE_HEIGHT, 0.20, 0.23),
    ];

    let parts = blocks
        .into_iter()
        .map(|(name, dx, bottom, top, w, d)| {
            part(name, [cx + dx, floor + (bottom + top) / 2.0, cz], [w, top - bottom, d], m)
        })
        .collect();

    DecorGroup { kind: DecorKind::ScaleFigure, parts }
}
