//! The selection: typed vertex, edge and face elements over a [`Model`]
//!
//! Elements remember their positions as well as the handle of the polygon
//! they were picked on, so they can be re-identified after the model is
//! replaced by an undo snapshot.

mod pick;

pub use pick::ScreenRect;

use crate::float_types::Real;
use crate::model::{Model, PolygonId};
use crate::polygon::{Polygon, same_point};
use bitflags::bitflags;
use nalgebra::Point3;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Vertex,
    Edge,
    Face,
}

bitflags! {
    /// Element kinds accepted by picking.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ElementMask: u8 {
        const VERTEX = 1 << 0;
        const EDGE = 1 << 1;
        const FACE = 1 << 2;
    }
}

impl ElementMask {
    pub const fn accepts(self, kind: ElementKind) -> bool {
        match kind {
            ElementKind::Vertex => self.contains(ElementMask::VERTEX),
            ElementKind::Edge => self.contains(ElementMask::EDGE),
            ElementKind::Face => self.contains(ElementMask::FACE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    /// One point for a vertex, two for an edge, the outer loop for a face
    pub positions: Vec<Point3<Real>>,
    /// Polygon the element was taken from; not owned
    pub polygon: Option<PolygonId>,
}

impl Element {
    pub fn vertex(position: Point3<Real>, polygon: Option<PolygonId>) -> Self {
        Element {
            kind: ElementKind::Vertex,
            positions: vec![position],
            polygon,
        }
    }

    pub fn edge(a: Point3<Real>, b: Point3<Real>, polygon: Option<PolygonId>) -> Self {
        Element {
            kind: ElementKind::Edge,
            positions: vec![a, b],
            polygon,
        }
    }

    pub fn face(id: PolygonId, polygon: &Polygon) -> Self {
        Element {
            kind: ElementKind::Face,
            positions: polygon.vertices().to_vec(),
            polygon: Some(id),
        }
    }

    /// Both elements denote the same physical sub-element: the same point,
    /// the same undirected segment, or the same face.
    pub fn same_as(&self, other: &Element) -> bool {
        if self.kind != other.kind || self.positions.len() != other.positions.len() {
            return false;
        }
        match self.kind {
            ElementKind::Vertex => same_point(&self.positions[0], &other.positions[0]),
            ElementKind::Edge => {
                let (a, b) = (&self.positions[0], &self.positions[1]);
                let (c, d) = (&other.positions[0], &other.positions[1]);
                (same_point(a, c) && same_point(b, d)) || (same_point(a, d) && same_point(b, c))
            },
            ElementKind::Face => match (self.polygon, other.polygon) {
                (Some(x), Some(y)) => x == y,
                _ => self
                    .positions
                    .iter()
                    .all(|p| other.positions.iter().any(|q| same_point(p, q))),
            },
        }
    }
}

/// The set of selected elements.
#[derive(Debug, Clone, Default)]
pub struct ElementManager {
    elements: Vec<Element>,
}

impl ElementManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an equal element is already selected.
    pub fn add(&mut self, element: Element) -> bool {
        if self.contains(&element) {
            return false;
        }
        self.elements.push(element);
        true
    }

    /// Remove the element if selected.
    pub fn erase(&mut self, element: &Element) -> bool {
        let before = self.elements.len();
        self.elements.retain(|e| !e.same_as(element));
        before != self.elements.len()
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.elements.iter().any(|e| e.same_as(element))
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn count(&self, kind: ElementKind) -> usize {
        self.elements.iter().filter(|e| e.kind == kind).count()
    }

    pub fn face_ids(&self) -> Vec<PolygonId> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::Face)
            .filter_map(|e| e.polygon)
            .collect()
    }

    pub fn edges(&self) -> Vec<(Point3<Real>, Point3<Real>)> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::Edge)
            .map(|e| (e.positions[0], e.positions[1]))
            .collect()
    }

    pub fn vertex_positions(&self) -> Vec<Point3<Real>> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::Vertex)
            .map(|e| e.positions[0])
            .collect()
    }

    /// Every distinct position referenced by any element.
    pub fn all_positions(&self) -> Vec<Point3<Real>> {
        let mut out: Vec<Point3<Real>> = Vec::new();
        for p in self.elements.iter().flat_map(|e| e.positions.iter()) {
            if !out.iter().any(|q| same_point(p, q)) {
                out.push(*p);
            }
        }
        out
    }

    /// Drop elements that no longer exist in `model`, remapping handles of
    /// the ones that can be re-identified. Returns how many were dropped.
    pub fn remove_invalid_elements(&mut self, model: &Model) -> usize {
        let before = self.elements.len();
        let elements = std::mem::take(&mut self.elements);
        for element in elements {
            if let Some(resolved) = resolve(model, element) {
                self.add(resolved);
            }
        }
        let dropped = before - self.elements.len();
        if dropped > 0 {
            debug!(dropped, "selection pruned");
        }
        dropped
    }
}

fn live(model: &Model, id: PolygonId) -> bool {
    model
        .polygon(id)
        .is_some_and(|p| !p.is_mirrored() && !p.is_hidden())
}

fn resolve(model: &Model, mut element: Element) -> Option<Element> {
    match element.kind {
        ElementKind::Face => {
            let matches = |p: &Polygon| {
                p.vertices().len() == element.positions.len()
                    && element.positions.iter().all(|q| p.has_vertex(q))
            };
            let by_handle = element
                .polygon
                .filter(|id| live(model, *id))
                .filter(|id| model.polygon(*id).is_some_and(matches));
            let id = match by_handle {
                Some(id) => id,
                None => {
                    let probe = Polygon::new(element.positions.clone());
                    model
                        .query_equivalent_polygon(&probe)
                        .filter(|id| live(model, *id))?
                },
            };
            element.polygon = Some(id);
            Some(element)
        },
        ElementKind::Vertex => {
            let owners = model.query_polygons_with_vertex(&element.positions[0]);
            element.polygon = owners.into_iter().find(|id| live(model, *id));
            element.polygon.map(|_| element)
        },
        ElementKind::Edge => {
            let owners = model.query_polygons_sharing_edge(&element.positions[0], &element.positions[1]);
            element.polygon = owners.into_iter().find(|id| live(model, *id));
            element.polygon.map(|_| element)
        },
    }
}
