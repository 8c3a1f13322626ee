//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use brushedit::{
    Designer, MainContext, Model, Polygon, PolygonId, ShelfId,
    float_types::{Real, parry3d::query::Ray},
    tools::PointerEvent,
};
use nalgebra::{Point2, Point3, Vector3};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn p(x: Real, y: Real, z: Real) -> Point3<Real> {
    Point3::new(x, y, z)
}

/// Helper to make a simple closed Polygon in 3D with given vertices.
pub fn make_polygon_3d(points: &[[Real; 3]]) -> Polygon {
    Polygon::new(points.iter().map(|q| Point3::new(q[0], q[1], q[2])).collect())
}

pub fn unit_square() -> Polygon {
    make_polygon_3d(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])
}

/// The committed polygon whose normal points along `normal`.
pub fn face_with_normal(model: &Model, normal: Vector3<Real>) -> Option<PolygonId> {
    model
        .polygons(ShelfId::Committed)
        .find(|(_, p)| p.plane.normal.dot(&normal) > 0.999)
        .map(|(id, _)| id)
}

pub fn committed_area(model: &Model) -> Real {
    model.polygons(ShelfId::Committed).map(|(_, p)| p.area()).sum()
}

/// Every committed polygon passes full validation.
pub fn all_valid(model: &Model) -> bool {
    model
        .polygons(ShelfId::Committed)
        .all(|(_, p)| p.validate().is_ok())
}

pub fn designer_with(model: Model) -> Designer {
    Designer::new(MainContext::new(model))
}

/// A pointer event looking down -Z at `(x, y)`, reported at screen pixel `screen`.
pub fn pointer_down_z(x: Real, y: Real, screen: Point2<Real>) -> PointerEvent {
    PointerEvent::new(Ray::new(Point3::new(x, y, 10.0), -Vector3::z()), screen)
}

/// A pointer event whose ray misses everything, used for screen-space drags.
pub fn screen_event(x: Real, y: Real) -> PointerEvent {
    PointerEvent::new(Ray::new(Point3::new(100.0, 100.0, 100.0), Vector3::z()), Point2::new(x, y))
}
