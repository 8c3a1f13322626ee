//! Oriented planes in Hessian normal form (`n·p = w`)
//!
//! Every polygon carries one. The plane also supplies the 2-D frame that
//! boolean operations, triangulation and winding tests run in.

use crate::float_types::{Real, tolerance};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

// Point/polygon classification against a plane
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal vector of the plane
    pub normal: Vector3<Real>,
    /// Distance from origin along normal (plane equation: n·p = w)
    pub w: Real,
}

impl Default for Plane {
    fn default() -> Self {
        Plane {
            normal: Vector3::z(),
            w: 0.0,
        }
    }
}

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and offset.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        let len = normal.norm();
        if len < Real::EPSILON {
            return Plane::default();
        }
        Plane {
            normal: normal / len,
            w: w / len,
        }
    }

    pub fn from_point_normal(point: &Point3<Real>, normal: &Vector3<Real>) -> Self {
        let n = normal.normalize();
        Plane {
            normal: n,
            w: n.dot(&point.coords),
        }
    }

    /// Create a plane from three points.
    /// The normal direction follows the right-hand rule: (b-a) × (c-a).
    /// Returns `None` for collinear input.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len < tolerance() * tolerance() {
            return None;
        }
        let normal = n / len;
        Some(Plane {
            normal,
            w: normal.dot(&a.coords),
        })
    }

    /// Best-fit plane through a loop using Newell's method, anchored at the centroid.
    ///
    /// The normal follows the loop's winding. Returns `None` when the loop is
    /// collinear or has fewer than three points.
    pub fn fit(points: &[Point3<Real>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let normal = newell_normal(points);
        let len = normal.norm();
        if len < tolerance() * tolerance() {
            return None;
        }
        let normal = normal / len;
        let centroid = points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / points.len() as Real;
        Some(Plane {
            normal,
            w: normal.dot(&centroid),
        })
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            w: -self.w,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.normal.iter().all(|c| c.is_finite())
            && self.w.is_finite()
            && (self.normal.norm() - 1.0).abs() < 1e-3
    }

    /// Signed distance of `point` from the plane, positive on the normal side.
    #[inline]
    pub fn distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify a point relative to the plane using the robust orient3d predicate.
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let p0 = self.origin();
        let (u, v) = self.basis();
        let point_b = p0 + u;
        let point_c = p0 + v;

        // (p0, p0+u, p0+v) winds counter-clockwise seen from the front, so a
        // point in front yields a negative determinant.
        let sign = robust::orient3d(
            robust::Coord3D {
                x: p0.x,
                y: p0.y,
                z: p0.z,
            },
            robust::Coord3D {
                x: point_b.x,
                y: point_b.y,
                z: point_b.z,
            },
            robust::Coord3D {
                x: point_c.x,
                y: point_c.y,
                z: point_c.z,
            },
            robust::Coord3D {
                x: point.x,
                y: point.y,
                z: point.z,
            },
        );

        let eps = tolerance() as f64;
        if sign > eps {
            BACK
        } else if sign < -eps {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Bitmask of the classes of every point (COPLANAR, FRONT, BACK or SPANNING).
    pub fn classify_points<'a>(&self, points: impl IntoIterator<Item = &'a Point3<Real>>) -> i8 {
        points
            .into_iter()
            .fold(COPLANAR, |acc, p| acc | self.orient_point(p))
    }

    /// Same orientation and offset within tolerance.
    pub fn is_equivalent(&self, other: &Plane) -> bool {
        let eps = tolerance();
        self.normal.dot(&other.normal) > 1.0 - eps && (self.w - other.w).abs() < eps
    }

    /// Same supporting plane regardless of orientation.
    pub fn is_same_or_opposite(&self, other: &Plane) -> bool {
        self.is_equivalent(other) || self.is_equivalent(&other.flipped())
    }

    /// The point of the plane closest to the origin.
    pub fn origin(&self) -> Point3<Real> {
        Point3::from(self.normal * self.w)
    }

    /// Orthonormal in-plane basis `(u, v)` with `u × v = normal`.
    ///
    /// Depends only on the normal, so every polygon on the same plane shares
    /// one 2-D frame.
    pub fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let n = self.normal;
        let helper = if n.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = helper.cross(&n).normalize();
        let v = n.cross(&u);
        (u, v)
    }

    /// Project a point into the plane's 2-D frame. Counter-clockwise in 2-D
    /// is counter-clockwise around the normal.
    pub fn to_2d(&self, point: &Point3<Real>) -> Point2<Real> {
        let (u, v) = self.basis();
        let d = point - self.origin();
        Point2::new(d.dot(&u), d.dot(&v))
    }

    /// Lift a 2-D frame point back onto the plane.
    pub fn from_2d(&self, point: &Point2<Real>) -> Point3<Real> {
        let (u, v) = self.basis();
        self.origin() + u * point.x + v * point.y
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project_point(&self, point: &Point3<Real>) -> Point3<Real> {
        point - self.normal * self.distance(point)
    }

    /// Ray parameter `t` where `origin + t * dir` meets the plane.
    pub fn intersect_line(&self, origin: &Point3<Real>, dir: &Vector3<Real>) -> Option<Real> {
        let denom = self.normal.dot(dir);
        if denom.abs() < tolerance() * tolerance() {
            return None;
        }
        Some((self.w - self.normal.dot(&origin.coords)) / denom)
    }

    /// Point where segment `a`-`b` crosses the plane, if it does.
    pub fn intersect_segment(&self, a: &Point3<Real>, b: &Point3<Real>) -> Option<Point3<Real>> {
        let da = self.distance(a);
        let db = self.distance(b);
        if (da > 0.0 && db > 0.0) || (da < 0.0 && db < 0.0) || (da - db).abs() < Real::EPSILON {
            return None;
        }
        let t = da / (da - db);
        Some(a + (b - a) * t)
    }

    /// Reflect a point across the plane.
    pub fn mirror_point(&self, point: &Point3<Real>) -> Point3<Real> {
        point - self.normal * (2.0 * self.distance(point))
    }

    /// Reflect a direction across the plane.
    pub fn mirror_vector(&self, vector: &Vector3<Real>) -> Vector3<Real> {
        vector - self.normal * (2.0 * self.normal.dot(vector))
    }

    /// Reflect another plane across this one.
    pub fn mirror_plane(&self, other: &Plane) -> Plane {
        let normal = self.mirror_vector(&other.normal);
        let anchor = self.mirror_point(&other.origin());
        Plane {
            normal,
            w: normal.dot(&anchor.coords),
        }
    }

    /// Apply an affine transform, keeping the plane oriented with its points.
    pub fn transformed(&self, matrix: &Matrix4<Real>) -> Plane {
        let anchor = matrix.transform_point(&self.origin());
        let normal_matrix = matrix
            .fixed_view::<3, 3>(0, 0)
            .clone_owned()
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or_else(nalgebra::Matrix3::identity);
        Plane::from_point_normal(&anchor, &(normal_matrix * self.normal))
    }
}

/// Newell's polygon normal, unnormalized. Its length is twice the loop area.
pub fn newell_normal(points: &[Point3<Real>]) -> Vector3<Real> {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .fold(Vector3::zeros(), |acc, (curr, next)| {
            acc + curr.coords.cross(&next.coords)
        })
}
