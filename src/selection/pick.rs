//! Ray and marquee picking

use super::{Element, ElementKind, ElementManager, ElementMask, live};
use crate::float_types::{
    Real,
    parry3d::query::{Ray, RayCast},
};
use crate::model::{Model, ModelDb, PolygonId};
use nalgebra::{Matrix4, Point2, Point3};

/// Axis-aligned screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub min: Point2<Real>,
    pub max: Point2<Real>,
}

impl ScreenRect {
    /// Rectangle spanned by two corners in any order.
    pub fn from_corners(a: Point2<Real>, b: Point2<Real>) -> Self {
        ScreenRect {
            min: Point2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: &Point2<Real>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

impl ElementManager {
    /// The single nearest element of an allowed kind under `ray`.
    ///
    /// Vertices win over edges and edges over faces when they lie within
    /// `radius` of the ray and are not hidden behind the nearest face hit.
    /// Mirrored and hidden polygons are never picked.
    pub fn pick(
        model: &Model,
        ray: &Ray,
        mask: ElementMask,
        prefer_bounding_cube_only: bool,
        radius: Real,
    ) -> Option<Element> {
        let len = ray.dir.norm();
        if len < Real::EPSILON {
            return None;
        }
        let ray = Ray::new(ray.origin, ray.dir / len);

        let fresh;
        let db: &ModelDb = if model.db().is_stale() {
            fresh = model.build_db();
            &fresh
        } else {
            model.db()
        };
        let first_live = |ids: &[PolygonId]| ids.iter().copied().find(|id| live(model, *id));
        let any_live = |ids: &[PolygonId]| first_live(ids).is_some();

        let face = nearest_face(model, &ray, prefer_bounding_cube_only);
        let visible = |t: Real| face.is_none_or(|(_, face_t)| t <= face_t + radius);

        if mask.contains(ElementMask::VERTEX) {
            if let Some((v, t)) = db.nearest_vertex(&ray, radius, any_live) {
                if visible(t) {
                    return Some(Element::vertex(v.position, first_live(&v.polygons)));
                }
            }
        }
        if mask.contains(ElementMask::EDGE) {
            if let Some((e, t)) = db.nearest_edge(&ray, radius, any_live) {
                if visible(t) {
                    return Some(Element::edge(e.a, e.b, first_live(&e.polygons)));
                }
            }
        }
        if mask.contains(ElementMask::FACE) {
            if let Some((id, _)) = face {
                return model.polygon(id).map(|p| Element::face(id, p));
            }
        }
        None
    }

    /// Every element of an allowed kind whose vertices all project inside
    /// `rect`. `view` maps world space to screen pixels and `model_tm` places
    /// the model in the world.
    pub fn find_elements_in_rect(
        model: &Model,
        rect: &ScreenRect,
        view: &Matrix4<Real>,
        model_tm: &Matrix4<Real>,
        mask: ElementMask,
    ) -> Vec<Element> {
        let to_screen = view * model_tm;
        let inside = |p: &Point3<Real>| {
            let h = to_screen * p.to_homogeneous();
            h.w > 0.0 && rect.contains(&Point2::new(h.x / h.w, h.y / h.w))
        };

        let mut found = ElementManager::new();
        for (id, polygon) in model.live_polygons().filter(|(_, p)| !p.is_hidden()) {
            if mask.accepts(ElementKind::Vertex) {
                for v in polygon.vertices().iter().filter(|v| inside(*v)) {
                    found.add(Element::vertex(*v, Some(id)));
                }
            }
            if mask.accepts(ElementKind::Edge) {
                for (a, b) in polygon.outer_edges().filter(|(a, b)| inside(a) && inside(b)) {
                    found.add(Element::edge(a, b, Some(id)));
                }
            }
            if mask.accepts(ElementKind::Face) && !polygon.is_open() && polygon.vertices().iter().all(inside) {
                found.add(Element::face(id, polygon));
            }
        }
        found.elements
    }
}

fn nearest_face(model: &Model, ray: &Ray, bounding_cube_only: bool) -> Option<(PolygonId, Real)> {
    model
        .live_polygons()
        .filter(|(_, p)| !p.is_hidden() && !p.is_open())
        .filter_map(|(id, p)| {
            let t = if bounding_cube_only {
                p.bounding_box().cast_local_ray(ray, Real::MAX, true)
            } else {
                p.ray_intersection(ray)
            };
            t.map(|t| (id, t))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
