//! Spatial query index over the committed shelf
//!
//! Vertices and undirected edges are deduplicated on a grid whose cell is
//! the crate tolerance, and each remembers the polygons that use it.
//! Lookups also search the neighbouring cells, so two points within
//! tolerance always meet even when they round into different cells.

use super::{Model, PolygonId, ShelfId};
use crate::float_types::{Real, parry3d::query::Ray, tolerance};
use crate::plane::Plane;
use crate::polygon::{Polygon, same_point};
use bitflags::bitflags;
use hashbrown::HashMap;
use nalgebra::Point3;
use tracing::debug;

bitflags! {
    /// Parts of the [`ModelDb`] to rebuild.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DbScope: u8 {
        const VERTICES = 1 << 0;
        const EDGES = 1 << 1;
        const ALL = Self::VERTICES.bits() | Self::EDGES.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct QuantizedPoint(i64, i64, i64);

fn quantize(p: &Point3<Real>) -> QuantizedPoint {
    let factor = 1.0 / tolerance();
    QuantizedPoint(
        (p.x * factor).round() as i64,
        (p.y * factor).round() as i64,
        (p.z * factor).round() as i64,
    )
}

/// Values keyed by position, where positions within tolerance are the same
/// key.
///
/// Two points closer than the tolerance differ by less than one cell on
/// every axis, so searching the 27 cells around a key finds them.
#[derive(Debug, Clone)]
pub(crate) struct PointGrid<T> {
    cells: HashMap<QuantizedPoint, Vec<(Point3<Real>, T)>>,
    len: usize,
}

impl<T> Default for PointGrid<T> {
    fn default() -> Self {
        PointGrid {
            cells: HashMap::new(),
            len: 0,
        }
    }
}

impl<T> PointGrid<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    /// Cell and slot of the stored point nearest `p`, within tolerance.
    fn find(&self, p: &Point3<Real>) -> Option<(QuantizedPoint, usize)> {
        let QuantizedPoint(x, y, z) = quantize(p);
        let mut best: Option<(Real, QuantizedPoint, usize)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = QuantizedPoint(x + dx, y + dy, z + dz);
                    let Some(cell) = self.cells.get(&key) else {
                        continue;
                    };
                    for (slot, (q, _)) in cell.iter().enumerate() {
                        if !same_point(p, q) {
                            continue;
                        }
                        let d = (p - q).norm_squared();
                        if best.is_none_or(|(b, _, _)| d < b) {
                            best = Some((d, key, slot));
                        }
                    }
                }
            }
        }
        best.map(|(_, key, slot)| (key, slot))
    }

    pub(crate) fn get(&self, p: &Point3<Real>) -> Option<&T> {
        let (key, slot) = self.find(p)?;
        self.cells.get(&key).map(|cell| &cell[slot].1)
    }

    pub(crate) fn contains(&self, p: &Point3<Real>) -> bool {
        self.find(p).is_some()
    }

    /// Store `value` at `p` unless a point within tolerance is already
    /// stored. Returns whether it was stored.
    pub(crate) fn insert(&mut self, p: Point3<Real>, value: T) -> bool {
        if self.contains(&p) {
            return false;
        }
        self.cells.entry(quantize(&p)).or_default().push((p, value));
        self.len += 1;
        true
    }

    /// The value stored near `p`, inserting `make()` first when there is none.
    pub(crate) fn get_or_insert_with(&mut self, p: &Point3<Real>, make: impl FnOnce() -> T) -> &mut T {
        let (key, slot) = match self.find(p) {
            Some(found) => found,
            None => {
                let key = quantize(p);
                let cell = self.cells.entry(key).or_default();
                cell.push((*p, make()));
                self.len += 1;
                (key, cell.len() - 1)
            },
        };
        let cell = self.cells.entry(key).or_default();
        &mut cell[slot].1
    }
}

impl PointGrid<usize> {
    /// A small integer naming `p`'s position, shared by every point within
    /// tolerance of the first one seen.
    pub(crate) fn intern(&mut self, p: &Point3<Real>) -> usize {
        let next = self.len;
        *self.get_or_insert_with(p, || next)
    }
}

fn edge_key(ids: &mut PointGrid<usize>, a: &Point3<Real>, b: &Point3<Real>) -> (usize, usize) {
    let (ia, ib) = (ids.intern(a), ids.intern(b));
    if ia <= ib { (ia, ib) } else { (ib, ia) }
}

#[derive(Debug, Clone)]
pub struct DbVertex {
    pub position: Point3<Real>,
    pub polygons: Vec<PolygonId>,
}

#[derive(Debug, Clone)]
pub struct DbEdge {
    pub a: Point3<Real>,
    pub b: Point3<Real>,
    pub polygons: Vec<PolygonId>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelDb {
    vertices: Vec<DbVertex>,
    edges: Vec<DbEdge>,
    vertex_lookup: PointGrid<usize>,
    /// Names edge endpoints; rebuilt with the edge table
    edge_points: PointGrid<usize>,
    edge_lookup: HashMap<(usize, usize), usize>,
    stale: bool,
}

impl ModelDb {
    pub(crate) fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Whether the committed shelf changed since the last rebuild.
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn rebuild<'a>(
        &mut self,
        polygons: impl Iterator<Item = (PolygonId, &'a Polygon)>,
        scope: DbScope,
        mirror: Option<&Plane>,
    ) {
        if scope.contains(DbScope::VERTICES) {
            self.vertices.clear();
            self.vertex_lookup.clear();
        }
        if scope.contains(DbScope::EDGES) {
            self.edges.clear();
            self.edge_points.clear();
            self.edge_lookup.clear();
        }
        let on_mirror = |p: &Point3<Real>| mirror.is_some_and(|m| m.distance(p).abs() < tolerance());

        for (id, polygon) in polygons.filter(|(_, p)| !p.is_hidden()) {
            if scope.contains(DbScope::VERTICES) {
                for v in polygon.loops().flatten() {
                    let next = self.vertices.len();
                    let index = *self.vertex_lookup.get_or_insert_with(v, || next);
                    if index == next {
                        self.vertices.push(DbVertex {
                            position: *v,
                            polygons: Vec::new(),
                        });
                    }
                    let entry = &mut self.vertices[index];
                    if !entry.polygons.contains(&id) {
                        entry.polygons.push(id);
                    }
                }
            }
            if scope.contains(DbScope::EDGES) {
                for (a, b) in polygon.edges() {
                    // seam edges on the mirror plane are shared by both halves
                    if on_mirror(&a) && on_mirror(&b) {
                        continue;
                    }
                    let key = edge_key(&mut self.edge_points, &a, &b);
                    let index = *self.edge_lookup.entry(key).or_insert_with(|| {
                        self.edges.push(DbEdge {
                            a,
                            b,
                            polygons: Vec::new(),
                        });
                        self.edges.len() - 1
                    });
                    let entry = &mut self.edges[index];
                    if !entry.polygons.contains(&id) {
                        entry.polygons.push(id);
                    }
                }
            }
        }
        self.stale = false;
        debug!(
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "model db rebuilt"
        );
    }

    pub fn vertices(&self) -> &[DbVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[DbEdge] {
        &self.edges
    }

    pub fn vertex_at(&self, position: &Point3<Real>) -> Option<&DbVertex> {
        self.vertex_lookup.get(position).map(|i| &self.vertices[*i])
    }

    pub fn edge_between(&self, a: &Point3<Real>, b: &Point3<Real>) -> Option<&DbEdge> {
        let (ia, ib) = (*self.edge_points.get(a)?, *self.edge_points.get(b)?);
        let key = if ia <= ib { (ia, ib) } else { (ib, ia) };
        self.edge_lookup.get(&key).map(|i| &self.edges[*i])
    }

    /// Vertex closest to the ray within `radius`, with its ray parameter.
    /// Ties in distance go to the vertex nearer the ray origin. Only vertices
    /// whose polygon list passes `accept` are considered.
    pub fn nearest_vertex(
        &self,
        ray: &Ray,
        radius: Real,
        accept: impl Fn(&[PolygonId]) -> bool,
    ) -> Option<(&DbVertex, Real)> {
        self.vertices
            .iter()
            .filter(|v| accept(&v.polygons))
            .filter_map(|v| {
                let (t, dist) = ray_point_distance(ray, &v.position)?;
                (dist <= radius).then_some((v, t, dist))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2).then(a.1.total_cmp(&b.1)))
            .map(|(v, t, _)| (v, t))
    }

    /// Edge closest to the ray within `radius`, with the ray parameter of the
    /// closest approach.
    pub fn nearest_edge(
        &self,
        ray: &Ray,
        radius: Real,
        accept: impl Fn(&[PolygonId]) -> bool,
    ) -> Option<(&DbEdge, Real)> {
        self.edges
            .iter()
            .filter(|e| accept(&e.polygons))
            .filter_map(|e| {
                let (t, dist) = ray_segment_distance(ray, &e.a, &e.b)?;
                (dist <= radius).then_some((e, t, dist))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2).then(a.1.total_cmp(&b.1)))
            .map(|(e, t, _)| (e, t))
    }
}

/// Ray parameter of the closest approach to `p` and the distance there.
/// `None` when `p` is behind the ray origin.
pub(crate) fn ray_point_distance(ray: &Ray, p: &Point3<Real>) -> Option<(Real, Real)> {
    let len2 = ray.dir.norm_squared();
    if len2 < Real::EPSILON {
        return None;
    }
    let t = (p - ray.origin).dot(&ray.dir) / len2;
    if t < 0.0 {
        return None;
    }
    Some((t, (ray.point_at(t) - p).norm()))
}

/// Closest approach between a ray and segment `a`-`b`.
pub(crate) fn ray_segment_distance(ray: &Ray, a: &Point3<Real>, b: &Point3<Real>) -> Option<(Real, Real)> {
    let d1 = ray.dir;
    let d2 = b - a;
    let r = ray.origin - a;
    let a11 = d1.dot(&d1);
    let a22 = d2.dot(&d2);
    let a12 = d1.dot(&d2);
    let b1 = d1.dot(&r);
    let b2 = d2.dot(&r);
    let denom = a11 * a22 - a12 * a12;
    if a11 < Real::EPSILON {
        return None;
    }
    if a22 < Real::EPSILON {
        return ray_point_distance(ray, a);
    }

    // segment parameter for the closest point, clamped onto the segment
    let mut s = if denom.abs() > Real::EPSILON {
        ((a11 * b2 - a12 * b1) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut t = (a12 * s - b1) / a11;
    if t < 0.0 {
        t = 0.0;
        s = (b2 / a22).clamp(0.0, 1.0);
    }
    let on_ray = ray.point_at(t);
    let on_segment = a + d2 * s;
    if t == 0.0 && (on_segment - ray.origin).dot(&d1) < 0.0 {
        return None;
    }
    Some((t, (on_ray - on_segment).norm()))
}

impl Model {
    /// Every directed edge of `shelf` is matched by the reverse edge of
    /// another polygon, i.e. the surface is closed with consistent winding.
    pub fn is_watertight(&self, shelf: ShelfId) -> bool {
        let mut ids: PointGrid<usize> = PointGrid::new();
        let mut counts: HashMap<(usize, usize), i32> = HashMap::new();
        for (_, polygon) in self.polygons(shelf) {
            for (a, b) in polygon.edges() {
                let (ka, kb) = (ids.intern(&a), ids.intern(&b));
                if ka < kb {
                    *counts.entry((ka, kb)).or_insert(0) += 1;
                } else {
                    *counts.entry((kb, ka)).or_insert(0) -= 1;
                }
            }
        }
        counts.values().all(|&c| c == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn ray_segment_closest_approach() {
        let ray = Ray::new(Point3::new(0.5, 0.2, 5.0), -Vector3::z());
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let (t, dist) = ray_segment_distance(&ray, &a, &b).unwrap();
        assert!((t - 5.0).abs() < 1e-9);
        assert!((dist - 0.2).abs() < 1e-9);
    }

    #[test]
    fn points_straddling_a_cell_boundary_meet() {
        let tol = tolerance();
        let a = Point3::new(0.49999 * tol, 0.0, 0.0);
        let b = Point3::new(0.50001 * tol, 0.0, 0.0);
        assert_ne!(quantize(&a), quantize(&b));

        let mut grid = PointGrid::new();
        assert!(grid.insert(a, 1));
        assert!(!grid.insert(b, 2));
        assert_eq!(grid.get(&b), Some(&1));
        assert_eq!(grid.len(), 1);

        let mut ids = PointGrid::new();
        assert_eq!(ids.intern(&a), ids.intern(&b));
        assert_ne!(ids.intern(&a), ids.intern(&Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn points_behind_the_ray_are_ignored() {
        let ray = Ray::new(Point3::origin(), Vector3::x());
        assert!(ray_point_distance(&ray, &Point3::new(-1.0, 0.0, 0.0)).is_none());
    }
}
