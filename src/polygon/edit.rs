//! Vertex-level edits, plane refits, decomposition and triangulation

use super::{Polygon, PolygonFlags, same_point};
use crate::float_types::{Real, tolerance};
use crate::plane::Plane;
use geo::{TriangulateEarcut, Polygon as GeoPolygon};
use nalgebra::{Point3, Vector3};

/// Which loops [`Polygon::separated_polygons`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparateMode {
    /// The outer boundary with holes dropped
    OuterHull,
    /// Every hole as its own polygon, rewound to face along the plane normal
    InnerHull,
}

impl Polygon {
    /// Drop near-zero-length edges and collinear vertices from every loop.
    ///
    /// Returns whether the polygon is still valid; an invalid result must be
    /// removed from its model by the caller.
    pub fn optimize(&mut self) -> bool {
        let closed = !self.is_open();
        let outer = clean_loop(&self.vertices, closed);
        let holes: Vec<_> = self
            .holes
            .iter()
            .map(|h| clean_loop(h, true))
            .filter(|h| h.len() >= 3)
            .collect();
        self.set_vertices(outer);
        self.set_holes(holes);
        self.is_valid()
    }

    /// Best-fit plane of the outer loop.
    ///
    /// Non-planar quads use the average of their two triangle normals
    /// through the centroid. `None` for collinear or degenerate loops.
    pub fn computed_plane(&self) -> Option<Plane> {
        if self.flags.contains(PolygonFlags::NON_PLANAR_QUAD) && self.vertices.len() == 4 {
            let v = &self.vertices;
            let n0 = (v[1] - v[0]).cross(&(v[2] - v[0]));
            let n1 = (v[2] - v[0]).cross(&(v[3] - v[0]));
            let (l0, l1) = (n0.norm(), n1.norm());
            if l0 > tolerance() * tolerance() && l1 > tolerance() * tolerance() {
                let n = n0 / l0 + n1 / l1;
                if n.norm() > tolerance() {
                    return Some(Plane::from_point_normal(&self.centroid(), &n));
                }
            }
        }
        Plane::fit(&self.vertices)
    }

    /// Replace the stored plane with [`Polygon::computed_plane`].
    pub fn refit_plane(&mut self) -> bool {
        match self.computed_plane() {
            Some(plane) => {
                self.plane = plane;
                true
            },
            None => false,
        }
    }

    /// Every vertex lies within tolerance of the stored plane.
    pub fn is_planar(&self) -> bool {
        self.loops()
            .flatten()
            .all(|p| self.plane.distance(p).abs() < tolerance())
    }

    /// Split outer vertex `index` in two: one copy slides `delta` along the
    /// outgoing edge, a new copy is inserted `delta` along the incoming edge.
    ///
    /// With a reference edge, each slide is lengthened by `1/sin` of its angle
    /// to that edge so both copies end up exactly `delta` from the edge's line.
    /// Returns `false` (and leaves the polygon alone) when a slide would
    /// reach the neighbouring vertex.
    pub fn broaden_vertex(
        &mut self,
        delta: Real,
        index: usize,
        reference_edge: Option<(Point3<Real>, Point3<Real>)>,
    ) -> bool {
        let n = self.vertices.len();
        if n < 3 || index >= n {
            return false;
        }
        if delta <= tolerance() {
            return true;
        }
        let v = self.vertices[index];
        let prev = self.vertices[(index + n - 1) % n];
        let next = self.vertices[(index + 1) % n];
        let (to_next, to_prev) = (next - v, prev - v);
        let (len_next, len_prev) = (to_next.norm(), to_prev.norm());
        if len_next < tolerance() || len_prev < tolerance() {
            return false;
        }
        let (dir_next, dir_prev) = (to_next / len_next, to_prev / len_prev);

        let (mut delta_next, mut delta_prev) = (delta, delta);
        if let Some((a, b)) = reference_edge {
            let base = b - a;
            if base.norm() > tolerance() {
                let base = base.normalize();
                let sin_next = dir_next.cross(&base).norm();
                let sin_prev = dir_prev.cross(&base).norm();
                if sin_next > tolerance() {
                    delta_next = delta / sin_next;
                }
                if sin_prev > tolerance() {
                    delta_prev = delta / sin_prev;
                }
            }
        }
        if delta_next >= len_next - tolerance() || delta_prev >= len_prev - tolerance() {
            return false;
        }

        self.vertices[index] = v + dir_next * delta_next;
        self.vertices.insert(index, v + dir_prev * delta_prev);
        self.invalidate_bounding_box();
        true
    }

    /// Decompose a polygon-with-holes into its outer or inner boundaries.
    pub fn separated_polygons(&self, mode: SeparateMode) -> Vec<Polygon> {
        match mode {
            SeparateMode::OuterHull => vec![self.derive(self.vertices.clone(), Vec::new())],
            SeparateMode::InnerHull => self
                .holes
                .iter()
                .map(|h| self.derive(h.iter().rev().copied().collect(), Vec::new()))
                .collect(),
        }
    }

    /// Value equality used to re-identify polygons across model generations:
    /// same loop shape, flags (ignoring HIDDEN), plane and edge set.
    pub fn is_equivalent(&self, other: &Polygon) -> bool {
        let visible = !PolygonFlags::HIDDEN;
        self.vertex_count() == other.vertex_count()
            && self.holes.len() == other.holes.len()
            && (self.flags & visible) == (other.flags & visible)
            && self.plane.is_equivalent(&other.plane)
            && self.edges().iter().all(|(a, b)| other.has_edge(a, b, false))
    }

    /// Triangles covering the polygon region, wound with the plane normal.
    pub fn triangulate(&self) -> Vec<[Point3<Real>; 3]> {
        if self.is_open() || self.vertices.len() < 3 {
            return Vec::new();
        }
        let v = &self.vertices;
        if self.holes.is_empty() {
            if v.len() == 3 {
                return vec![[v[0], v[1], v[2]]];
            }
            if v.len() == 4 && (self.flags.contains(PolygonFlags::NON_PLANAR_QUAD) || !self.is_planar()) {
                return vec![[v[0], v[1], v[2]], [v[0], v[2], v[3]]];
            }
        }

        let frame = self.plane;
        let polygon: GeoPolygon<Real> = self.to_geo(&frame);
        let triangulation = polygon.earcut_triangles_raw();
        let coords = triangulation.vertices;
        let lift = |i: usize| frame.from_2d(&nalgebra::Point2::new(coords[2 * i], coords[2 * i + 1]));
        let refs: Vec<Point3<Real>> = self.loops().flatten().copied().collect();
        let snap = |p: Point3<Real>| refs.iter().find(|r| same_point(r, &p)).copied().unwrap_or(p);

        triangulation
            .triangle_indices
            .chunks_exact(3)
            .map(|tri| {
                let (a, b, c) = (snap(lift(tri[0])), snap(lift(tri[1])), snap(lift(tri[2])));
                if (b - a).cross(&(c - a)).dot(&frame.normal) < 0.0 {
                    [a, c, b]
                } else {
                    [a, b, c]
                }
            })
            .collect()
    }

    /// Face normal, falling back to the fitted plane when the stored one is invalid.
    pub fn normal(&self) -> Vector3<Real> {
        if self.plane.is_valid() {
            self.plane.normal
        } else {
            self.computed_plane().map(|p| p.normal).unwrap_or_else(Vector3::z)
        }
    }
}

/// Remove repeated points and collinear vertices. Endpoints of open loops are kept.
fn clean_loop(points: &[Point3<Real>], closed: bool) -> Vec<Point3<Real>> {
    let mut out: Vec<Point3<Real>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_none_or(|last| !same_point(last, p)) {
            out.push(*p);
        }
    }
    if closed {
        while out.len() > 1 && same_point(&out[0], &out[out.len() - 1]) {
            out.pop();
        }
    }

    loop {
        let n = out.len();
        if n < 3 {
            break;
        }
        let range = if closed { 0..n } else { 1..n - 1 };
        let removable = range.into_iter().find(|&i| {
            let prev = out[(i + n - 1) % n];
            let next = out[(i + 1) % n];
            collinear(&prev, &out[i], &next)
        });
        match removable {
            Some(i) => {
                out.remove(i);
                if closed {
                    while out.len() > 1 && same_point(&out[0], &out[out.len() - 1]) {
                        out.pop();
                    }
                }
            },
            None => break,
        }
    }
    out
}

/// `v` lies on the line through `prev` and `next` (including spikes back along it).
fn collinear(prev: &Point3<Real>, v: &Point3<Real>, next: &Point3<Real>) -> bool {
    let span = next - prev;
    let len = span.norm();
    if len < tolerance() {
        return true;
    }
    (v - prev).cross(&span).norm() / len < tolerance()
}
