//! DXF → SVG rendering.
//!
//! The document is parsed with the `dxf` crate, model-space entities are
//! flattened into a few primitives, and the primitives are fitted onto a
//! fixed 16 × 12 inch canvas with a 0.1 inch padding. Block references
//! (INSERT, and the anonymous blocks behind dimensions) are expanded in
//! place. Drawing coordinates are Y-up, SVG is Y-down, so every point goes
//! through [`Viewport::map`].

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;

use dxf::{Block, Drawing};
use dxf::entities::{Entity, EntityType, Insert};
use thiserror::Error;
use tracing::{debug, warn};

/// Canvas width in inches.
pub const CANVAS_WIDTH_IN: f64 = 16.0;
/// Canvas height in inches.
pub const CANVAS_HEIGHT_IN: f64 = 12.0;
/// Padding around the fitted drawing in inches.
pub const PADDING_IN: f64 = 0.1;

const POINTS_PER_INCH: f64 = 72.0;
const ELLIPSE_SEGMENTS: usize = 64;
const STROKE_WIDTH: f64 = 0.5;
/// Nesting limit for block references; also stops self-referencing blocks.
const MAX_BLOCK_DEPTH: usize = 16;
/// Upper bound on rows and columns of an arrayed INSERT.
const MAX_INSERT_ARRAY: i64 = 256;

/// Rendering stage failures. The pipeline treats every variant the same way.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The DXF document could not be parsed.
    #[error("DXF parse error: {0}")]
    Parse(#[from] dxf::DxfError),

    /// Rendering exceeded its time bound.
    #[error("Rendering exceeded {0}s")]
    Timeout(u64),

    /// The request was abandoned before rendering started.
    #[error("Rendering cancelled")]
    Cancelled,

    /// The blocking render task panicked.
    #[error("Rendering task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Renders DXF model space to SVG.
#[derive(Debug, Clone, Copy)]
pub struct SvgRenderer {
    width: f64,
    height: f64,
    padding: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH_IN * POINTS_PER_INCH,
            height: CANVAS_HEIGHT_IN * POINTS_PER_INCH,
            padding: PADDING_IN * POINTS_PER_INCH,
        }
    }
}

impl SvgRenderer {
    /// Create a renderer with the standard canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the DXF file at `path` and render it. Blocking.
    pub fn render_file(&self, path: &Path) -> Result<Vec<u8>, RenderError> {
        let drawing = Drawing::load_file(path)?;
        Ok(self.render(&drawing).into_bytes())
    }

    /// Render the model space of `drawing` to an SVG document.
    pub fn render(&self, drawing: &Drawing) -> String {
        let blocks = BlockTable::new(drawing);
        let mut shapes = Vec::new();
        for entity in drawing
            .entities()
            .filter(|e| !e.common.is_in_paper_space)
        {
            blocks.collect(entity, &Transform::IDENTITY, BLACK, 0, &mut shapes);
        }

        let mut bounds = Bounds::empty();
        for shape in &shapes {
            shape.primitive.extend_bounds(&mut bounds);
        }

        debug!(shapes = shapes.len(), "Rendering model space");

        let mut out = String::with_capacity(256 + shapes.len() * 96);
        let _ = write!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}in\" height=\"{}in\" viewBox=\"0 0 {} {}\">\n\
             <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n\
             <g fill=\"none\" stroke-width=\"{}\" stroke-linecap=\"round\" stroke-linejoin=\"round\">\n",
            self.width / POINTS_PER_INCH,
            self.height / POINTS_PER_INCH,
            self.width,
            self.height,
            STROKE_WIDTH,
        );

        if let Some(viewport) = Viewport::fit(&bounds, self.width, self.height, self.padding) {
            for shape in &shapes {
                shape.write_svg(&viewport, &mut out);
            }
        }

        out.push_str("</g>\n</svg>\n");
        out
    }
}

/// Block definitions by name. DXF block names compare case-insensitively.
struct BlockTable<'a> {
    blocks: HashMap<String, &'a Block>,
}

impl<'a> BlockTable<'a> {
    fn new(drawing: &'a Drawing) -> Self {
        let blocks = drawing
            .blocks()
            .map(|block| (block.name.to_uppercase(), block))
            .collect();
        Self { blocks }
    }

    fn get(&self, name: &str) -> Option<&'a Block> {
        self.blocks.get(&name.to_uppercase()).copied()
    }

    /// Flatten `entity` into shapes, expanding block references.
    /// `inherited` is the color BYBLOCK entities take.
    fn collect(
        &self,
        entity: &Entity,
        transform: &Transform,
        inherited: &'static str,
        depth: usize,
        out: &mut Vec<Shape>,
    ) {
        let color = if entity.common.color.is_by_block() {
            inherited
        } else {
            aci_color(entity.common.color.index())
        };

        if let Some((name, placements)) = block_reference(entity) {
            if depth >= MAX_BLOCK_DEPTH {
                warn!(block = %name, depth, "Block nesting too deep, reference skipped");
                return;
            }
            let Some(block) = self.get(name) else {
                debug!(block = %name, "Reference to undefined block skipped");
                return;
            };
            for placement in placements {
                let placement = Transform::translate(-block.base_point.x, -block.base_point.y)
                    .then(&placement)
                    .then(transform);
                for child in &block.entities {
                    self.collect(child, &placement, color, depth + 1, out);
                }
            }
            return;
        }

        out.extend(
            Primitive::from_entity(entity)
                .into_iter()
                .map(|primitive| primitive.transformed(transform))
                .filter(Primitive::is_finite)
                .map(|primitive| Shape { primitive, color }),
        );
    }
}

/// Block name and block-to-parent placements of an entity that draws a
/// block: one per array cell for INSERT, identity for dimensions (their
/// anonymous blocks are already in drawing coordinates).
fn block_reference(entity: &Entity) -> Option<(&str, Vec<Transform>)> {
    let dimension = match &entity.specific {
        EntityType::Insert(insert) => {
            return Some((insert.name.as_str(), insert_placements(insert)));
        }
        EntityType::RotatedDimension(d) => &d.dimension_base,
        EntityType::RadialDimension(d) => &d.dimension_base,
        EntityType::DiameterDimension(d) => &d.dimension_base,
        EntityType::AngularThreePointDimension(d) => &d.dimension_base,
        EntityType::OrdinateDimension(d) => &d.dimension_base,
        _ => return None,
    };
    if dimension.block_name.is_empty() {
        return None;
    }
    Some((dimension.block_name.as_str(), vec![Transform::IDENTITY]))
}

fn insert_placements(insert: &Insert) -> Vec<Transform> {
    let columns = (insert.column_count as i64).clamp(1, MAX_INSERT_ARRAY);
    let rows = (insert.row_count as i64).clamp(1, MAX_INSERT_ARRAY);
    let mut placements = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            placements.push(Transform::placement(
                insert.x_scale_factor,
                insert.y_scale_factor,
                column as f64 * insert.column_spacing,
                row as f64 * insert.row_spacing,
                insert.rotation,
                insert.location.x,
                insert.location.y,
            ));
        }
    }
    placements
}

/// 2D affine map `(x, y) -> (a·x + c·y + e, b·x + d·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Transform {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(x: f64, y: f64) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    /// Scale, shift within the array grid, rotate, then move to `(x, y)`.
    fn placement(
        scale_x: f64,
        scale_y: f64,
        grid_x: f64,
        grid_y: f64,
        rotation_deg: f64,
        x: f64,
        y: f64,
    ) -> Self {
        let (sin, cos) = rotation_deg.to_radians().sin_cos();
        let scale = Self {
            a: scale_x,
            d: scale_y,
            ..Self::IDENTITY
        };
        let rotate = Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        };
        scale
            .then(&Self::translate(grid_x, grid_y))
            .then(&rotate)
            .then(&Self::translate(x, y))
    }

    /// `self` followed by `next`.
    fn then(&self, next: &Transform) -> Transform {
        Transform {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            e: next.a * self.e + next.c * self.f + next.e,
            f: next.b * self.e + next.d * self.f + next.f,
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Scale factor when the map is a rotation plus uniform scale without
    /// mirroring; circles and arcs stay circular only then.
    fn uniform_scale(&self) -> Option<f64> {
        let sx = self.a.hypot(self.b);
        let sy = self.c.hypot(self.d);
        let orthogonal = (self.a * self.c + self.b * self.d).abs() <= 1e-9 * sx * sy;
        let equal = (sx - sy).abs() <= 1e-9 * sx.max(sy);
        (orthogonal && equal && self.determinant() > 0.0).then_some(sx)
    }

    fn rotation_deg(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }
}

/// A primitive with its stroke color.
#[derive(Debug, Clone)]
struct Shape {
    primitive: Primitive,
    color: &'static str,
}

/// Geometry in drawing coordinates.
#[derive(Debug, Clone)]
enum Primitive {
    Path {
        vertices: Vec<Vertex>,
        closed: bool,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Arc {
        cx: f64,
        cy: f64,
        r: f64,
        start_deg: f64,
        end_deg: f64,
    },
    Dot {
        x: f64,
        y: f64,
    },
    Text {
        x: f64,
        y: f64,
        height: f64,
        rotation_deg: f64,
        value: String,
    },
}

/// Polyline vertex; `bulge` is the tangent of a quarter of the arc angle
/// to the next vertex, 0 for a straight segment.
#[derive(Debug, Clone, Copy)]
struct Vertex {
    x: f64,
    y: f64,
    bulge: f64,
}

impl Vertex {
    fn straight(x: f64, y: f64) -> Self {
        Self { x, y, bulge: 0.0 }
    }
}

impl Shape {
    fn write_svg(&self, vp: &Viewport, out: &mut String) {
        match &self.primitive {
            Primitive::Path { vertices, closed } => {
                if vertices.len() < 2 {
                    return;
                }
                let (x0, y0) = vp.map(vertices[0].x, vertices[0].y);
                let _ = write!(out, "<path stroke=\"{}\" d=\"M{:.3} {:.3}", self.color, x0, y0);

                let segments = if *closed {
                    vertices.len()
                } else {
                    vertices.len() - 1
                };
                for i in 0..segments {
                    let from = vertices[i];
                    let to = vertices[(i + 1) % vertices.len()];
                    write_segment(vp, from, to, out);
                }
                if *closed {
                    out.push_str(" Z");
                }
                out.push_str("\"/>\n");
            }
            Primitive::Circle { cx, cy, r } => {
                let (x, y) = vp.map(*cx, *cy);
                let _ = writeln!(
                    out,
                    "<circle stroke=\"{}\" cx=\"{:.3}\" cy=\"{:.3}\" r=\"{:.3}\"/>",
                    self.color,
                    x,
                    y,
                    r * vp.scale
                );
            }
            Primitive::Arc {
                cx,
                cy,
                r,
                start_deg,
                end_deg,
            } => {
                let sweep = sweep_degrees(*start_deg, *end_deg);
                if (sweep - 360.0).abs() < 1e-9 {
                    let full = Primitive::Circle {
                        cx: *cx,
                        cy: *cy,
                        r: *r,
                    };
                    Shape {
                        primitive: full,
                        color: self.color,
                    }
                    .write_svg(vp, out);
                    return;
                }
                let (sx, sy) = polar(*cx, *cy, *r, *start_deg);
                let (ex, ey) = polar(*cx, *cy, *r, *end_deg);
                let (sx, sy) = vp.map(sx, sy);
                let (ex, ey) = vp.map(ex, ey);
                let radius = r * vp.scale;
                let large = u8::from(sweep > 180.0);
                // Counter-clockwise in drawing space is sweep-flag 0 once Y is flipped.
                let _ = writeln!(
                    out,
                    "<path stroke=\"{}\" d=\"M{:.3} {:.3} A{:.3} {:.3} 0 {} 0 {:.3} {:.3}\"/>",
                    self.color, sx, sy, radius, radius, large, ex, ey
                );
            }
            Primitive::Dot { x, y } => {
                let (x, y) = vp.map(*x, *y);
                let _ = writeln!(
                    out,
                    "<circle fill=\"{}\" stroke=\"none\" cx=\"{:.3}\" cy=\"{:.3}\" r=\"{:.3}\"/>",
                    self.color, x, y, STROKE_WIDTH
                );
            }
            Primitive::Text {
                x,
                y,
                height,
                rotation_deg,
                value,
            } => {
                if value.trim().is_empty() {
                    return;
                }
                let (x, y) = vp.map(*x, *y);
                let size = (height * vp.scale).max(1.0);
                let _ = write!(
                    out,
                    "<text fill=\"{}\" stroke=\"none\" font-family=\"sans-serif\" font-size=\"{:.3}\" x=\"{:.3}\" y=\"{:.3}\"",
                    self.color, size, x, y
                );
                if rotation_deg.abs() > 1e-9 {
                    let _ = write!(
                        out,
                        " transform=\"rotate({:.3} {:.3} {:.3})\"",
                        -rotation_deg, x, y
                    );
                }
                let _ = writeln!(out, ">{}</text>", escape_xml(value));
            }
        }
    }
}

impl Primitive {
    fn from_entity(entity: &Entity) -> Vec<Primitive> {
        match &entity.specific {
            EntityType::Line(line) => vec![Primitive::Path {
                vertices: vec![
                    Vertex::straight(line.p1.x, line.p1.y),
                    Vertex::straight(line.p2.x, line.p2.y),
                ],
                closed: false,
            }],
            EntityType::Circle(circle) => vec![Primitive::Circle {
                cx: circle.center.x,
                cy: circle.center.y,
                r: circle.radius,
            }],
            EntityType::Arc(arc) => vec![Primitive::Arc {
                cx: arc.center.x,
                cy: arc.center.y,
                r: arc.radius,
                start_deg: arc.start_angle,
                end_deg: arc.end_angle,
            }],
            EntityType::Ellipse(ellipse) => {
                let (mx, my) = (ellipse.major_axis.x, ellipse.major_axis.y);
                let ratio = ellipse.minor_axis_ratio;
                let start = ellipse.start_parameter;
                let mut end = ellipse.end_parameter;
                if end <= start {
                    end += 2.0 * PI;
                }
                let closed = (end - start - 2.0 * PI).abs() < 1e-9;
                let vertices = (0..=ELLIPSE_SEGMENTS)
                    .map(|i| {
                        let t = start + (end - start) * i as f64 / ELLIPSE_SEGMENTS as f64;
                        let (cos, sin) = (t.cos(), t.sin());
                        Vertex::straight(
                            ellipse.center.x + mx * cos - ratio * my * sin,
                            ellipse.center.y + my * cos + ratio * mx * sin,
                        )
                    })
                    .collect();
                vec![Primitive::Path { vertices, closed }]
            }
            EntityType::LwPolyline(poly) => vec![Primitive::Path {
                vertices: poly
                    .vertices
                    .iter()
                    .map(|v| Vertex {
                        x: v.x,
                        y: v.y,
                        bulge: v.bulge,
                    })
                    .collect(),
                closed: poly.flags & 1 != 0,
            }],
            EntityType::Polyline(poly) => vec![Primitive::Path {
                vertices: poly
                    .vertices()
                    .map(|v| Vertex {
                        x: v.location.x,
                        y: v.location.y,
                        bulge: v.bulge,
                    })
                    .collect(),
                closed: poly.flags & 1 != 0,
            }],
            EntityType::ModelPoint(point) => vec![Primitive::Dot {
                x: point.location.x,
                y: point.location.y,
            }],
            EntityType::Text(text) => vec![Primitive::Text {
                x: text.location.x,
                y: text.location.y,
                height: text.text_height,
                rotation_deg: text.rotation,
                value: text.value.clone(),
            }],
            EntityType::MText(mtext) => vec![Primitive::Text {
                x: mtext.insertion_point.x,
                y: mtext.insertion_point.y,
                height: mtext.initial_text_height,
                rotation_deg: 0.0,
                value: strip_mtext_codes(&mtext.text),
            }],
            EntityType::Solid(solid) => vec![quad(
                &solid.first_corner,
                &solid.second_corner,
                &solid.third_corner,
                &solid.fourth_corner,
            )],
            EntityType::Trace(trace) => vec![quad(
                &trace.first_corner,
                &trace.second_corner,
                &trace.third_corner,
                &trace.fourth_corner,
            )],
            EntityType::Spline(spline) => {
                let points = if spline.fit_points.is_empty() {
                    &spline.control_points
                } else {
                    &spline.fit_points
                };
                vec![Primitive::Path {
                    vertices: points.iter().map(|p| Vertex::straight(p.x, p.y)).collect(),
                    closed: false,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// The primitive mapped through `t`. Circles and arcs under a
    /// non-uniform or mirroring map become polylines.
    fn transformed(self, t: &Transform) -> Primitive {
        if *t == Transform::IDENTITY {
            return self;
        }
        let mirrored = t.determinant() < 0.0;
        match self {
            Primitive::Path { vertices, closed } => Primitive::Path {
                vertices: vertices
                    .into_iter()
                    .map(|v| {
                        let (x, y) = t.apply(v.x, v.y);
                        Vertex {
                            x,
                            y,
                            bulge: if mirrored { -v.bulge } else { v.bulge },
                        }
                    })
                    .collect(),
                closed,
            },
            Primitive::Circle { cx, cy, r } => match t.uniform_scale() {
                Some(scale) => {
                    let (cx, cy) = t.apply(cx, cy);
                    Primitive::Circle {
                        cx,
                        cy,
                        r: r * scale,
                    }
                }
                None => arc_path(cx, cy, r, 0.0, 360.0, true).transformed(t),
            },
            Primitive::Arc {
                cx,
                cy,
                r,
                start_deg,
                end_deg,
            } => match t.uniform_scale() {
                Some(scale) => {
                    let (cx, cy) = t.apply(cx, cy);
                    let rotation = t.rotation_deg();
                    Primitive::Arc {
                        cx,
                        cy,
                        r: r * scale,
                        start_deg: start_deg + rotation,
                        end_deg: end_deg + rotation,
                    }
                }
                None => {
                    let end = start_deg + sweep_degrees(start_deg, end_deg);
                    arc_path(cx, cy, r, start_deg, end, false).transformed(t)
                }
            },
            Primitive::Dot { x, y } => {
                let (x, y) = t.apply(x, y);
                Primitive::Dot { x, y }
            }
            Primitive::Text {
                x,
                y,
                height,
                rotation_deg,
                value,
            } => {
                let (x, y) = t.apply(x, y);
                Primitive::Text {
                    x,
                    y,
                    height: height * t.determinant().abs().sqrt(),
                    rotation_deg: rotation_deg + t.rotation_deg(),
                    value,
                }
            }
        }
    }

    /// Whether every coordinate can be written to the SVG.
    fn is_finite(&self) -> bool {
        match self {
            Primitive::Path { vertices, .. } => vertices
                .iter()
                .all(|v| v.x.is_finite() && v.y.is_finite() && v.bulge.is_finite()),
            Primitive::Circle { cx, cy, r } => cx.is_finite() && cy.is_finite() && r.is_finite(),
            Primitive::Arc {
                cx,
                cy,
                r,
                start_deg,
                end_deg,
            } => [cx, cy, r, start_deg, end_deg].iter().all(|v| v.is_finite()),
            Primitive::Dot { x, y } => x.is_finite() && y.is_finite(),
            Primitive::Text {
                x,
                y,
                height,
                rotation_deg,
                ..
            } => [x, y, height, rotation_deg].iter().all(|v| v.is_finite()),
        }
    }

    fn extend_bounds(&self, bounds: &mut Bounds) {
        match self {
            Primitive::Path { vertices, .. } => {
                for v in vertices {
                    bounds.include(v.x, v.y);
                }
            }
            Primitive::Circle { cx, cy, r } | Primitive::Arc { cx, cy, r, .. } => {
                bounds.include(cx - r, cy - r);
                bounds.include(cx + r, cy + r);
            }
            Primitive::Dot { x, y } => bounds.include(*x, *y),
            Primitive::Text {
                x, y, height, value, ..
            } => {
                bounds.include(*x, *y);
                let width = height * 0.6 * value.chars().count() as f64;
                bounds.include(x + width, y + height);
            }
        }
    }
}

/// SOLID and TRACE store their corners in zig-zag order: 1-2-4-3 is the outline.
fn quad(a: &dxf::Point, b: &dxf::Point, c: &dxf::Point, d: &dxf::Point) -> Primitive {
    Primitive::Path {
        vertices: vec![
            Vertex::straight(a.x, a.y),
            Vertex::straight(b.x, b.y),
            Vertex::straight(d.x, d.y),
            Vertex::straight(c.x, c.y),
        ],
        closed: true,
    }
}

/// Polyline through an arc from `start_deg` to `end_deg` (counter-clockwise).
fn arc_path(cx: f64, cy: f64, r: f64, start_deg: f64, end_deg: f64, closed: bool) -> Primitive {
    let vertices = (0..=ELLIPSE_SEGMENTS)
        .map(|i| {
            let deg = start_deg + (end_deg - start_deg) * i as f64 / ELLIPSE_SEGMENTS as f64;
            let (x, y) = polar(cx, cy, r, deg);
            Vertex::straight(x, y)
        })
        .collect();
    Primitive::Path { vertices, closed }
}

fn write_segment(vp: &Viewport, from: Vertex, to: Vertex, out: &mut String) {
    let (x, y) = vp.map(to.x, to.y);
    if from.bulge.abs() < 1e-9 {
        let _ = write!(out, " L{:.3} {:.3}", x, y);
        return;
    }
    let chord = ((to.x - from.x).powi(2) + (to.y - from.y).powi(2)).sqrt();
    let theta = 4.0 * from.bulge.abs().atan();
    let radius = chord / (2.0 * (theta / 2.0).sin()) * vp.scale;
    let large = u8::from(theta > PI);
    let sweep = u8::from(from.bulge < 0.0);
    let _ = write!(
        out,
        " A{:.3} {:.3} 0 {} {} {:.3} {:.3}",
        radius, radius, large, sweep, x, y
    );
}

/// Counter-clockwise sweep from `start` to `end`, in (0, 360].
fn sweep_degrees(start: f64, end: f64) -> f64 {
    let sweep = (end - start).rem_euclid(360.0);
    if sweep < 1e-9 { 360.0 } else { sweep }
}

fn polar(cx: f64, cy: f64, r: f64, deg: f64) -> (f64, f64) {
    let rad = deg.to_radians();
    (cx + r * rad.cos(), cy + r * rad.sin())
}

/// Axis-aligned bounding box in drawing coordinates.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }
}

/// Maps drawing coordinates onto the canvas.
#[derive(Debug, Clone, Copy)]
struct Viewport {
    min_x: f64,
    min_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    height: f64,
}

impl Viewport {
    /// Fit `bounds` into the canvas, centered, aspect preserved. `None` for
    /// an empty drawing.
    fn fit(bounds: &Bounds, width: f64, height: f64, padding: f64) -> Option<Self> {
        if bounds.is_empty() {
            return None;
        }
        let extent_x = bounds.max_x - bounds.min_x;
        let extent_y = bounds.max_y - bounds.min_y;
        let avail_x = width - 2.0 * padding;
        let avail_y = height - 2.0 * padding;

        let scale = match (extent_x > 1e-9, extent_y > 1e-9) {
            (true, true) => (avail_x / extent_x).min(avail_y / extent_y),
            (true, false) => avail_x / extent_x,
            (false, true) => avail_y / extent_y,
            (false, false) => 1.0,
        };

        Some(Self {
            min_x: bounds.min_x,
            min_y: bounds.min_y,
            scale,
            offset_x: padding + (avail_x - extent_x * scale) / 2.0,
            offset_y: padding + (avail_y - extent_y * scale) / 2.0,
            height,
        })
    }

    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.offset_x + (x - self.min_x) * self.scale,
            self.height - (self.offset_y + (y - self.min_y) * self.scale),
        )
    }
}

const BLACK: &str = "#000000";

/// Stroke color for an AutoCAD Color Index. BYLAYER, BYBLOCK and 7 are
/// drawn black on the white background.
fn aci_color(index: Option<u8>) -> &'static str {
    match index {
        Some(1) => "#ff0000",
        Some(2) => "#ffff00",
        Some(3) => "#00ff00",
        Some(4) => "#00ffff",
        Some(5) => "#0000ff",
        Some(6) => "#ff00ff",
        Some(8) => "#808080",
        Some(9) => "#c0c0c0",
        Some(250..=255) => "#4d4d4d",
        _ => BLACK,
    }
}

/// Drop the most common MTEXT inline codes.
fn strip_mtext_codes(text: &str) -> String {
    text.replace("\\P", " ")
        .replace("\\~", " ")
        .replace(['{', '}'], "")
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf::Point;
    use dxf::entities::{Arc, Circle, Line};

    fn block(name: &str, entities: Vec<Entity>) -> Block {
        let mut block = Block::default();
        block.name = name.to_string();
        block.entities = entities;
        block
    }

    fn insert(name: &str, x: f64, y: f64) -> Insert {
        let mut insert = Insert::default();
        insert.name = name.to_string();
        insert.location = Point::new(x, y, 0.0);
        insert
    }

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Entity {
        Entity::new(EntityType::Line(Line::new(
            Point::new(x1, y1, 0.0),
            Point::new(x2, y2, 0.0),
        )))
    }

    #[test]
    fn test_empty_drawing_renders_blank_canvas() {
        let svg = SvgRenderer::new().render(&Drawing::new());
        assert!(svg.contains("width=\"16in\""));
        assert!(svg.contains("height=\"12in\""));
        assert!(svg.contains("viewBox=\"0 0 1152 864\""));
        assert!(!svg.contains("<path"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_square_extent_is_centered_and_flipped() {
        let mut drawing = Drawing::new();
        drawing.add_entity(line(0.0, 0.0, 10.0, 10.0));

        let svg = SvgRenderer::new().render(&drawing);
        // scale = (864 - 14.4) / 10, horizontal slack split evenly.
        assert!(
            svg.contains("d=\"M151.200 856.800 L1000.800 7.200\""),
            "unexpected svg: {svg}"
        );
    }

    #[test]
    fn test_paper_space_is_ignored() {
        let mut drawing = Drawing::new();
        drawing.add_entity(line(0.0, 0.0, 5.0, 0.0));

        let mut sheet = Entity::new(EntityType::Circle(Circle::new(
            Point::new(100.0, 100.0, 0.0),
            3.0,
        )));
        sheet.common.is_in_paper_space = true;
        drawing.add_entity(sheet);

        let svg = SvgRenderer::new().render(&drawing);
        assert!(svg.contains("<path"));
        assert!(!svg.contains("<circle"));
    }

    #[test]
    fn test_arc_uses_svg_arc_command() {
        let mut drawing = Drawing::new();
        drawing.add_entity(Entity::new(EntityType::Arc(Arc::new(
            Point::new(0.0, 0.0, 0.0),
            5.0,
            0.0,
            90.0,
        ))));

        let svg = SvgRenderer::new().render(&drawing);
        assert!(svg.contains(" A"));
        assert!(svg.contains(" 0 0 0 "));
    }

    #[test]
    fn test_insert_expands_block_geometry() {
        let mut drawing = Drawing::new();
        drawing.add_block(block("KVADRAT", vec![line(0.0, 0.0, 1.0, 0.0)]));
        drawing.add_entity(Entity::new(EntityType::Insert(insert("kvadrat", 5.0, 5.0))));

        let svg = SvgRenderer::new().render(&drawing);
        assert!(svg.contains("<path"), "block reference was not drawn: {svg}");
    }

    #[test]
    fn test_insert_to_undefined_block_draws_nothing() {
        let mut drawing = Drawing::new();
        drawing.add_entity(Entity::new(EntityType::Insert(insert("NEPOSTOJI", 0.0, 0.0))));

        let svg = SvgRenderer::new().render(&drawing);
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn test_non_uniform_insert_flattens_circles() {
        let mut drawing = Drawing::new();
        drawing.add_block(block(
            "OTVOR",
            vec![Entity::new(EntityType::Circle(Circle::new(
                Point::new(0.0, 0.0, 0.0),
                1.0,
            )))],
        ));
        let mut stretched = insert("OTVOR", 0.0, 0.0);
        stretched.x_scale_factor = 2.0;
        drawing.add_entity(Entity::new(EntityType::Insert(stretched)));

        let svg = SvgRenderer::new().render(&drawing);
        assert!(!svg.contains("<circle"));
        assert!(svg.contains("<path"));
    }

    #[test]
    fn test_self_referencing_block_stops_at_depth_limit() {
        let mut drawing = Drawing::new();
        drawing.add_block(block(
            "PETLJA",
            vec![
                line(0.0, 0.0, 1.0, 1.0),
                Entity::new(EntityType::Insert(insert("PETLJA", 0.0, 0.0))),
            ],
        ));
        drawing.add_entity(Entity::new(EntityType::Insert(insert("PETLJA", 0.0, 0.0))));

        let svg = SvgRenderer::new().render(&drawing);
        assert_eq!(svg.matches("<path").count(), MAX_BLOCK_DEPTH);
    }

    #[test]
    fn test_placement_scales_rotates_and_moves() {
        let t = Transform::placement(2.0, 2.0, 0.0, 0.0, 90.0, 5.0, 5.0);
        let (x, y) = t.apply(1.0, 0.0);
        assert!((x - 5.0).abs() < 1e-9, "x = {x}");
        assert!((y - 7.0).abs() < 1e-9, "y = {y}");
        assert!((t.uniform_scale().expect("uniform") - 2.0).abs() < 1e-9);
        assert!((t.rotation_deg() - 90.0).abs() < 1e-9);

        let mirrored = Transform::placement(-1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(mirrored.uniform_scale().is_none());
    }

    #[test]
    fn test_non_finite_geometry_is_dropped() {
        let mut drawing = Drawing::new();
        drawing.add_entity(line(0.0, 0.0, 10.0, 10.0));
        drawing.add_entity(line(0.0, 0.0, f64::INFINITY, 5.0));
        drawing.add_entity(Entity::new(EntityType::Circle(Circle::new(
            Point::new(f64::NAN, 0.0, 0.0),
            1.0,
        ))));

        let svg = SvgRenderer::new().render(&drawing);
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(!svg.contains("<circle"));
        assert!(!svg.contains("inf"));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn test_sweep_degrees() {
        assert_eq!(sweep_degrees(0.0, 90.0), 90.0);
        assert_eq!(sweep_degrees(270.0, 90.0), 180.0);
        assert_eq!(sweep_degrees(45.0, 45.0), 360.0);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("A&B <kat>"), "A&amp;B &lt;kat&gt;");
        assert_eq!(escape_xml("Prizemlje š"), "Prizemlje š");
    }

    #[test]
    fn test_render_file_from_minimal_dxf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.dxf");
        std::fs::write(
            &path,
            "0\nSECTION\n2\nENTITIES\n0\nLINE\n8\n0\n10\n0.0\n20\n0.0\n30\n0.0\n11\n4.0\n21\n3.0\n31\n0.0\n0\nENDSEC\n0\nEOF\n",
        )
        .expect("write");

        let svg = SvgRenderer::new().render_file(&path).expect("render");
        let svg = String::from_utf8(svg).expect("utf8");
        assert!(svg.contains("<path"));
    }

    #[test]
    fn test_render_file_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.dxf");
        std::fs::write(&path, "this is not a drawing\nat all\n").expect("write");

        let err = SvgRenderer::new()
            .render_file(&path)
            .expect_err("garbage must not render");
        assert!(matches!(err, RenderError::Parse(_)));
    }

    #[test]
    fn test_render_file_missing() {
        let err = SvgRenderer::new()
            .render_file(Path::new("/nonexistent/ldgradnja/input.dxf"))
            .expect_err("missing file");
        assert!(matches!(err, RenderError::Parse(_)));
    }
}
