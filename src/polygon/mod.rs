//! Planar boundary loops, the atomic unit of a brush model
//!
//! A [`Polygon`] owns an outer loop wound counter-clockwise around its plane
//! normal and any number of hole loops wound the other way. Loops are stored
//! without a repeated closing point. Open polygons (flag [`PolygonFlags::OPEN`])
//! are polylines used as lathe paths and guides.

mod boolean;
mod edit;

pub use boolean::PlaneSplit;
pub use edit::SeparateMode;

use crate::errors::ValidationError;
use crate::float_types::{
    Real,
    parry3d::{
        bounding_volume::Aabb,
        query::{Ray, RayCast},
        shape::Triangle,
    },
    tolerance,
};
use crate::plane::Plane;
use bitflags::bitflags;
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolygonFlags: u8 {
        /// Not drawn or picked
        const HIDDEN = 1 << 0;
        /// Derived from the live half by the model's mirror plane
        const MIRRORED = 1 << 1;
        /// Four vertices that do not share a plane; rendered as two triangles
        const NON_PLANAR_QUAD = 1 << 2;
        /// Polyline rather than a closed loop
        const OPEN = 1 << 3;
    }
}

/// Texture-mapping parameters carried through every edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TexInfo {
    pub shift: [Real; 2],
    pub scale: [Real; 2],
    pub rotate: Real,
}

impl Default for TexInfo {
    fn default() -> Self {
        TexInfo {
            shift: [0.0, 0.0],
            scale: [1.0, 1.0],
            rotate: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<Point3<Real>>,
    holes: Vec<Vec<Point3<Real>>>,
    pub plane: Plane,
    pub flags: PolygonFlags,
    pub material_id: u16,
    pub tex_info: TexInfo,

    /// Lazily‑computed axis‑aligned bounding box of the polygon
    bounding_box: OnceLock<Aabb>,
}

/// Positions closer than the tolerance are the same point.
#[inline]
pub fn same_point(a: &Point3<Real>, b: &Point3<Real>) -> bool {
    (a - b).norm_squared() < tolerance() * tolerance()
}

impl Polygon {
    /// Create a closed polygon; the plane is fitted from the loop.
    pub fn new(vertices: Vec<Point3<Real>>) -> Self {
        let plane = Plane::fit(&vertices).unwrap_or_default();
        Self::with_plane(vertices, plane)
    }

    pub fn with_plane(vertices: Vec<Point3<Real>>, plane: Plane) -> Self {
        Polygon {
            vertices,
            holes: Vec::new(),
            plane,
            flags: PolygonFlags::empty(),
            material_id: 0,
            tex_info: TexInfo::default(),
            bounding_box: OnceLock::new(),
        }
    }

    pub fn with_holes(
        vertices: Vec<Point3<Real>>,
        holes: Vec<Vec<Point3<Real>>>,
        plane: Plane,
    ) -> Self {
        let mut polygon = Self::with_plane(vertices, plane);
        polygon.holes = holes;
        polygon
    }

    /// Create an open polyline lying in `plane`.
    pub fn open(vertices: Vec<Point3<Real>>, plane: Plane) -> Self {
        let mut polygon = Self::with_plane(vertices, plane);
        polygon.flags |= PolygonFlags::OPEN;
        polygon
    }

    /// Build from a loop in `plane`'s 2-D frame.
    pub fn from_2d(outer: &[Point2<Real>], holes: &[Vec<Point2<Real>>], plane: Plane) -> Self {
        let lift = |pts: &[Point2<Real>]| pts.iter().map(|p| plane.from_2d(p)).collect();
        Self::with_holes(lift(outer), holes.iter().map(|h| lift(h)).collect(), plane)
    }

    /// Copy of this polygon's attributes (plane, flags, material, texturing)
    /// around a new boundary.
    pub fn derive(&self, vertices: Vec<Point3<Real>>, holes: Vec<Vec<Point3<Real>>>) -> Polygon {
        Polygon {
            vertices,
            holes,
            plane: self.plane,
            flags: self.flags,
            material_id: self.material_id,
            tex_info: self.tex_info,
            bounding_box: OnceLock::new(),
        }
    }

    pub fn vertices(&self) -> &[Point3<Real>] {
        &self.vertices
    }

    pub fn holes(&self) -> &[Vec<Point3<Real>>] {
        &self.holes
    }

    /// Outer loop followed by every hole loop.
    pub fn loops(&self) -> impl Iterator<Item = &[Point3<Real>]> {
        std::iter::once(self.vertices.as_slice()).chain(self.holes.iter().map(|h| h.as_slice()))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    /// Replace one outer-loop vertex. The plane is left alone; call
    /// [`Polygon::refit_plane`] before further geometric tests.
    pub fn set_vertex(&mut self, index: usize, position: Point3<Real>) {
        if let Some(v) = self.vertices.get_mut(index) {
            *v = position;
            self.invalidate_bounding_box();
        }
    }

    pub fn set_vertices(&mut self, vertices: Vec<Point3<Real>>) {
        self.vertices = vertices;
        self.invalidate_bounding_box();
    }

    pub fn set_holes(&mut self, holes: Vec<Vec<Point3<Real>>>) {
        self.holes = holes;
        self.invalidate_bounding_box();
    }

    pub fn insert_vertex(&mut self, index: usize, position: Point3<Real>) {
        self.vertices.insert(index.min(self.vertices.len()), position);
        self.invalidate_bounding_box();
    }

    /// Apply `f` to every vertex of every loop.
    pub fn map_vertices(&mut self, mut f: impl FnMut(&Point3<Real>) -> Point3<Real>) {
        for v in self.vertices.iter_mut() {
            *v = f(v);
        }
        for hole in self.holes.iter_mut() {
            for v in hole.iter_mut() {
                *v = f(v);
            }
        }
        self.invalidate_bounding_box();
    }

    pub const fn is_open(&self) -> bool {
        self.flags.contains(PolygonFlags::OPEN)
    }

    pub const fn is_mirrored(&self) -> bool {
        self.flags.contains(PolygonFlags::MIRRORED)
    }

    pub const fn is_hidden(&self) -> bool {
        self.flags.contains(PolygonFlags::HIDDEN)
    }

    /// Directed boundary edges of every loop. Open polygons do not wrap.
    pub fn edges(&self) -> Vec<(Point3<Real>, Point3<Real>)> {
        if self.is_open() {
            return self.vertices.windows(2).map(|w| (w[0], w[1])).collect();
        }
        self.loops()
            .flat_map(|lp| {
                lp.iter()
                    .zip(lp.iter().cycle().skip(1))
                    .map(|(a, b)| (*a, *b))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Directed edges of the outer loop only.
    pub fn outer_edges(&self) -> impl Iterator<Item = (Point3<Real>, Point3<Real>)> + '_ {
        let wrap = if self.is_open() { 0 } else { 1 };
        let count = self.vertices.len().saturating_sub(1) + wrap;
        (0..count.min(self.vertices.len()))
            .map(move |i| (self.vertices[i], self.vertices[(i + 1) % self.vertices.len()]))
    }

    pub fn has_vertex(&self, position: &Point3<Real>) -> bool {
        self.exist(position, tolerance()).is_some()
    }

    /// Index of `position` in the outer loop.
    pub fn vertex_index(&self, position: &Point3<Real>) -> Option<usize> {
        self.vertices.iter().position(|v| same_point(v, position))
    }

    /// Locate `position` within `epsilon`, returning `(loop, index)` where
    /// loop 0 is the outer loop and `1..` are holes.
    pub fn exist(&self, position: &Point3<Real>, epsilon: Real) -> Option<(usize, usize)> {
        let eps2 = epsilon * epsilon;
        self.loops().enumerate().find_map(|(li, lp)| {
            lp.iter()
                .position(|v| (v - position).norm_squared() < eps2)
                .map(|vi| (li, vi))
        })
    }

    /// Whether some loop has edge `a`-`b`; `directed` requires the same direction.
    pub fn has_edge(&self, a: &Point3<Real>, b: &Point3<Real>, directed: bool) -> bool {
        self.edges().iter().any(|(p, q)| {
            (same_point(p, a) && same_point(q, b))
                || (!directed && same_point(p, b) && same_point(q, a))
        })
    }

    /// Shoelace area of the outer loop in the plane frame; positive when CCW.
    pub fn signed_area(&self) -> Real {
        signed_area_2d(&self.project_loop(&self.vertices))
    }

    /// Region area: outer loop minus holes.
    pub fn area(&self) -> Real {
        let holes: Real = self
            .holes
            .iter()
            .map(|h| signed_area_2d(&self.project_loop(h)).abs())
            .sum();
        (self.signed_area().abs() - holes).max(0.0)
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Cheap validity check used after every edit.
    pub fn is_valid(&self) -> bool {
        if !self.all_finite() {
            return false;
        }
        if self.is_open() {
            return self.vertices.len() >= 2;
        }
        self.vertices.len() >= 3
            && self.plane.is_valid()
            && self.area() > tolerance() * tolerance()
    }

    /// Detailed validation of a closed polygon.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let first = self.vertices.first().copied().unwrap_or_else(Point3::origin);
        if let Some(bad) = self
            .loops()
            .flatten()
            .find(|p| !p.iter().all(|c| c.is_finite()))
        {
            return Err(ValidationError::InvalidCoordinate(*bad));
        }
        let minimum = if self.is_open() { 2 } else { 3 };
        if self.vertices.len() < minimum {
            return Err(ValidationError::TooFewPoints(first));
        }
        for lp in self.loops() {
            for (a, b) in lp.iter().zip(lp.iter().cycle().skip(1)) {
                if same_point(a, b) {
                    return Err(ValidationError::RepeatedPoint(*a));
                }
            }
        }
        if self.is_open() {
            return Ok(());
        }
        if !self.plane.is_valid() || Plane::fit(&self.vertices).is_none() {
            return Err(ValidationError::DegeneratePlane);
        }
        if !self.is_ccw() {
            return Err(ValidationError::InvertedWinding(first));
        }
        if let Some(i) = self_intersection(&self.project_loop(&self.vertices)) {
            return Err(ValidationError::SelfIntersection(self.vertices[i]));
        }
        Ok(())
    }

    /// No two non-adjacent outer edges cross.
    pub fn is_simple(&self) -> bool {
        self_intersection(&self.project_loop(&self.vertices)).is_none()
    }

    fn all_finite(&self) -> bool {
        self.loops()
            .flatten()
            .all(|p| p.iter().all(|c| c.is_finite()))
    }

    pub fn centroid(&self) -> Point3<Real> {
        if self.vertices.is_empty() {
            return Point3::origin();
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.coords);
        Point3::from(sum / self.vertices.len() as Real)
    }

    /// Axis aligned bounding box of this Polygon (cached after first call)
    pub fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
            let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
            for v in self.loops().flatten() {
                mins.x = mins.x.min(v.x);
                mins.y = mins.y.min(v.y);
                mins.z = mins.z.min(v.z);
                maxs.x = maxs.x.max(v.x);
                maxs.y = maxs.y.max(v.y);
                maxs.z = maxs.z.max(v.z);
            }
            Aabb::new(mins, maxs)
        })
    }

    pub fn invalidate_bounding_box(&mut self) {
        self.bounding_box = OnceLock::new();
    }

    /// Reverse winding and plane orientation.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for hole in self.holes.iter_mut() {
            hole.reverse();
        }
        self.plane.flip();
    }

    pub fn flipped(&self) -> Polygon {
        let mut p = self.clone();
        p.flip();
        p
    }

    /// Reflection across `mirror`: winding is reversed so the result still
    /// faces outward, and the polygon is tagged MIRRORED.
    pub fn mirror(&self, mirror: &Plane) -> Polygon {
        let reflect = |lp: &[Point3<Real>]| -> Vec<Point3<Real>> {
            lp.iter().rev().map(|p| mirror.mirror_point(p)).collect()
        };
        let mut out = self.derive(
            reflect(&self.vertices),
            self.holes.iter().map(|h| reflect(h)).collect(),
        );
        out.plane = mirror.mirror_plane(&self.plane);
        out.flags |= PolygonFlags::MIRRORED;
        out
    }

    pub fn translate(&mut self, offset: &Vector3<Real>) {
        self.map_vertices(|p| p + offset);
        self.plane.w += self.plane.normal.dot(offset);
    }

    /// Apply an affine transform. Reflections reverse the loops so winding
    /// still agrees with the transformed normal.
    pub fn transform(&mut self, matrix: &Matrix4<Real>) {
        self.map_vertices(|p| matrix.transform_point(p));
        if matrix.fixed_view::<3, 3>(0, 0).determinant() < 0.0 {
            self.vertices.reverse();
            for hole in self.holes.iter_mut() {
                hole.reverse();
            }
        }
        self.plane = self.plane.transformed(matrix);
    }

    pub(crate) fn project_loop(&self, lp: &[Point3<Real>]) -> Vec<Point2<Real>> {
        lp.iter().map(|p| self.plane.to_2d(p)).collect()
    }

    /// Ray parameter of the nearest hit on this polygon's triangulation.
    pub fn ray_intersection(&self, ray: &Ray) -> Option<Real> {
        self.triangulate()
            .iter()
            .filter_map(|t| Triangle::new(t[0], t[1], t[2]).cast_local_ray(ray, Real::MAX, true))
            .min_by(|a, b| a.total_cmp(b))
    }
}

pub(crate) fn signed_area_2d(points: &[Point2<Real>]) -> Real {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<Real>()
        * 0.5
}

#[inline]
fn orient_2d(a: &Point2<Real>, b: &Point2<Real>, c: &Point2<Real>) -> Real {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Index of the first edge of `points` that properly crosses a non-adjacent edge.
pub(crate) fn self_intersection(points: &[Point2<Real>]) -> Option<usize> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let eps = tolerance() * tolerance();
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (points[j], points[(j + 1) % n]);
            let d1 = orient_2d(&a, &b, &c);
            let d2 = orient_2d(&a, &b, &d);
            let d3 = orient_2d(&c, &d, &a);
            let d4 = orient_2d(&c, &d, &b);
            if ((d1 > eps && d2 < -eps) || (d1 < -eps && d2 > eps))
                && ((d3 > eps && d4 < -eps) || (d3 < -eps && d4 > eps))
            {
                return Some(i);
            }
        }
    }
    None
}
