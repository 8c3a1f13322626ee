//! Boolean combination and plane clipping in the polygon's 2-D frame

use super::{Polygon, PolygonFlags, same_point};
use crate::float_types::{Real, chain_tolerance, parry3d::bounding_volume::BoundingVolume, tolerance};
use crate::plane::{BACK, COPLANAR, FRONT, Plane};
use geo::{
    BooleanOps, Coord, Intersects, LineString, MultiPolygon, Orient, Polygon as GeoPolygon,
    orient::Direction,
};
use nalgebra::{Point2, Point3, Vector2};

/// Result of [`Polygon::clip_by_plane`].
#[derive(Debug, Clone, Default)]
pub struct PlaneSplit {
    pub front: Vec<Polygon>,
    pub back: Vec<Polygon>,
    /// Front-side boundary segments lying on the cutting plane
    pub boundary: Vec<(Point3<Real>, Point3<Real>)>,
}

impl Polygon {
    /// This polygon as a `geo` polygon in `frame`'s 2-D coordinates,
    /// exterior counter-clockwise.
    pub(crate) fn to_geo(&self, frame: &Plane) -> GeoPolygon<Real> {
        let ring = |lp: &[Point3<Real>]| {
            LineString::from(
                lp.iter()
                    .map(|p| {
                        let q = frame.to_2d(p);
                        Coord { x: q.x, y: q.y }
                    })
                    .collect::<Vec<_>>(),
            )
        };
        GeoPolygon::new(
            ring(&self.vertices),
            self.holes.iter().map(|h| ring(h)).collect(),
        )
        .orient(Direction::Default)
    }

    /// Lift a `geo` result back into 3-D, inheriting this polygon's attributes.
    pub(crate) fn from_geo(&self, poly: &GeoPolygon<Real>, frame: &Plane) -> Polygon {
        let oriented = poly.orient(Direction::Default);
        let unring = |ls: &LineString<Real>| {
            let mut pts: Vec<Point3<Real>> = ls
                .coords()
                .map(|c| frame.from_2d(&Point2::new(c.x, c.y)))
                .collect();
            if pts.len() > 1 && same_point(&pts[0], &pts[pts.len() - 1]) {
                pts.pop();
            }
            pts
        };
        let mut out = self.derive(
            unring(oriented.exterior()),
            oriented.interiors().iter().map(unring).collect(),
        );
        out.plane = *frame;
        out
    }

    fn lift_all(&self, result: &MultiPolygon<Real>, frame: &Plane, refs: &[Point3<Real>]) -> Vec<Polygon> {
        result
            .0
            .iter()
            .filter_map(|piece| {
                let mut p = self.from_geo(piece, frame);
                p.snap_to(refs);
                p.optimize().then_some(p)
            })
            .collect()
    }

    /// Coplanar, same orientation, and touching or overlapping.
    pub fn touches_or_overlaps(&self, other: &Polygon) -> bool {
        if self.is_open() || other.is_open() || !self.plane.is_equivalent(&other.plane) {
            return false;
        }
        let margin = chain_tolerance();
        if !self
            .bounding_box()
            .loosened(margin)
            .intersects(&other.bounding_box().loosened(margin))
        {
            return false;
        }
        let shares_edge = self
            .edges()
            .iter()
            .any(|(a, b)| other.has_edge(b, a, true));
        shares_edge || self.to_geo(&self.plane).intersects(&other.to_geo(&self.plane))
    }

    /// Merge a coplanar polygon into this one.
    ///
    /// Returns `false` and leaves `self` untouched when the planes differ or
    /// the union does not come out as a single region.
    pub fn union(&mut self, other: &Polygon) -> bool {
        if self.is_open() || other.is_open() || !self.plane.is_equivalent(&other.plane) {
            return false;
        }
        let frame = self.plane;
        let merged = self.to_geo(&frame).union(&other.to_geo(&frame));
        let refs: Vec<Point3<Real>> = self.loops().chain(other.loops()).flatten().copied().collect();
        let mut pieces = self.lift_all(&merged, &frame, &refs);
        if pieces.len() != 1 {
            return false;
        }
        let mut result = pieces.remove(0);
        result.flags.remove(PolygonFlags::NON_PLANAR_QUAD);
        *self = result;
        true
    }

    /// Remove `other`'s region from this polygon.
    ///
    /// Returns the remaining pieces, possibly none. Polygons on a different
    /// supporting plane come back unchanged.
    pub fn subtract(&self, other: &Polygon) -> Vec<Polygon> {
        if self.is_open() || other.is_open() || !self.plane.is_same_or_opposite(&other.plane) {
            return vec![self.clone()];
        }
        let frame = self.plane;
        let rest = self.to_geo(&frame).difference(&other.to_geo(&frame));
        let refs: Vec<Point3<Real>> = self.loops().chain(other.loops()).flatten().copied().collect();
        self.lift_all(&rest, &frame, &refs)
    }

    /// Move every vertex that lies within the chain tolerance of a reference
    /// point onto it, undoing round-off from the 2-D round trip.
    pub fn snap_to(&mut self, refs: &[Point3<Real>]) {
        let eps2 = chain_tolerance() * chain_tolerance();
        self.map_vertices(|p| {
            refs.iter()
                .filter(|r| (*r - p).norm_squared() < eps2)
                .min_by(|a, b| (*a - p).norm_squared().total_cmp(&(*b - p).norm_squared()))
                .copied()
                .unwrap_or(*p)
        });
    }

    /// Split by `plane` into front and back fragments.
    ///
    /// A polygon lying in the plane goes to the side its normal faces.
    /// Concave polygons and polygons with holes may yield several fragments per side.
    pub fn clip_by_plane(&self, plane: &Plane) -> PlaneSplit {
        let mut split = PlaneSplit::default();
        match plane.classify_points(self.loops().flatten()) {
            COPLANAR => {
                if self.plane.normal.dot(&plane.normal) > 0.0 {
                    split.front.push(self.clone());
                } else {
                    split.back.push(self.clone());
                }
                return split;
            },
            FRONT => {
                split.boundary = self.edges_on_plane(plane);
                split.front.push(self.clone());
                return split;
            },
            BACK => {
                split.back.push(self.clone());
                return split;
            },
            _ => {},
        }

        if self.is_open() {
            self.split_polyline(plane, &mut split);
            return split;
        }

        let frame = self.plane;
        let (u, v) = frame.basis();
        let o = frame.origin();
        let a = plane.normal.dot(&u);
        let b = plane.normal.dot(&v);
        let len = (a * a + b * b).sqrt();
        if len < tolerance() {
            // Parallel planes cannot produce a spanning classification beyond noise.
            if plane.distance(&self.centroid()) >= 0.0 {
                split.front.push(self.clone());
            } else {
                split.back.push(self.clone());
            }
            return split;
        }
        let c = plane.w - plane.normal.dot(&o.coords);
        let m = Vector2::new(a, b) / len;
        let d = Vector2::new(-m.y, m.x);
        let q = m * (c / len);
        let radius = self
            .project_loop(&self.vertices)
            .iter()
            .map(|p| (p.coords - q).norm())
            .fold(0.0, Real::max)
            * 2.0
            + 1.0;
        let corner = |p: Vector2<Real>| Coord { x: p.x, y: p.y };
        let half_space = GeoPolygon::new(
            LineString::from(vec![
                corner(q - d * radius),
                corner(q + d * radius),
                corner(q + d * radius + m * radius),
                corner(q - d * radius + m * radius),
            ]),
            vec![],
        )
        .orient(Direction::Default);

        let me = self.to_geo(&frame);
        let refs: Vec<Point3<Real>> = self.loops().flatten().copied().collect();
        split.front = self.lift_all(&me.intersection(&half_space), &frame, &refs);
        split.back = self.lift_all(&me.difference(&half_space), &frame, &refs);
        split.boundary = split
            .front
            .iter()
            .flat_map(|p| p.edges_on_plane(plane))
            .collect();
        split
    }

    /// Segments where `plane` cuts this polygon's region.
    pub fn intersect_plane(&self, plane: &Plane) -> Vec<(Point3<Real>, Point3<Real>)> {
        if self.plane.is_same_or_opposite(plane) {
            return Vec::new();
        }
        self.clip_by_plane(plane).boundary
    }

    fn edges_on_plane(&self, plane: &Plane) -> Vec<(Point3<Real>, Point3<Real>)> {
        let eps = chain_tolerance();
        self.edges()
            .into_iter()
            .filter(|(a, b)| plane.distance(a).abs() < eps && plane.distance(b).abs() < eps)
            .filter(|(a, b)| !same_point(a, b))
            .collect()
    }

    fn split_polyline(&self, plane: &Plane, split: &mut PlaneSplit) {
        let eps = tolerance();
        let mut current: Vec<Point3<Real>> = Vec::new();
        let mut current_front = true;
        for (i, p) in self.vertices.iter().enumerate() {
            let side = plane.distance(p);
            if i == 0 {
                current_front = side >= 0.0;
                current.push(*p);
                continue;
            }
            let crosses = (current_front && side < -eps) || (!current_front && side > eps);
            if crosses {
                if let Some(x) = plane.intersect_segment(&current[current.len() - 1], p) {
                    current.push(x);
                    let piece = self.derive(std::mem::take(&mut current), Vec::new());
                    if current_front {
                        split.front.push(piece);
                    } else {
                        split.back.push(piece);
                    }
                    current.push(x);
                }
                current_front = !current_front;
            }
            current.push(*p);
        }
        if current.len() >= 2 {
            let piece = self.derive(current, Vec::new());
            if current_front {
                split.front.push(piece);
            } else {
                split.back.push(piece);
            }
        }
    }
}
