//! The editable brush: polygons on two shelves plus the indices that ride along
//!
//! Polygons live in an arena keyed by [`PolygonId`]. Handles are allocated
//! monotonically and never reused within a session, so a handle taken before
//! an undo either still names the same polygon or names nothing.

mod clip;
mod db;
mod mirror;
mod shelf;
mod smoothing;

pub use clip::{ClipOutput, ClipResult};
pub use db::{DbEdge, DbScope, DbVertex, ModelDb};
pub use shelf::{ShelfGuard, ShelfId};
pub use smoothing::SmoothingGroups;

pub(crate) use clip::chain_edges;
pub(crate) use db::PointGrid;

use crate::float_types::{
    Real,
    parry3d::bounding_volume::{Aabb, BoundingVolume},
};
use crate::errors::{DesignerError, ValidationError};
use crate::plane::Plane;
use crate::polygon::{Polygon, same_point};
use hashbrown::HashMap;
use nalgebra::Point3;
use tracing::{debug, warn};

/// Stable handle to a polygon in a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolygonId(u64);

impl PolygonId {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// How [`Model::add_polygon`] treats coplanar neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOp {
    /// Insert unconditionally
    Add,
    /// Merge into touching coplanar polygons on the active shelf first
    Union,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    arena: HashMap<PolygonId, Polygon>,
    shelves: [Vec<PolygonId>; 2],
    active: ShelfId,
    mirror_plane: Option<Plane>,
    smoothing_groups: SmoothingGroups,
    db: ModelDb,
    next_id: u64,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model whose committed shelf holds `polygons`, with a fresh query index.
    pub fn from_polygons(polygons: impl IntoIterator<Item = Polygon>) -> Self {
        let mut model = Model::new();
        for polygon in polygons {
            model.insert(ShelfId::Committed, polygon);
        }
        model.reset_db(DbScope::ALL);
        model
    }

    pub const fn active_shelf(&self) -> ShelfId {
        self.active
    }

    fn allocate_id(&mut self) -> PolygonId {
        let id = PolygonId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert without validation or merging.
    pub(crate) fn insert(&mut self, shelf: ShelfId, polygon: Polygon) -> PolygonId {
        let id = self.allocate_id();
        self.arena.insert(id, polygon);
        self.shelves[shelf.index()].push(id);
        if shelf == ShelfId::Committed {
            self.db.mark_stale();
        }
        id
    }

    pub fn polygon(&self, id: PolygonId) -> Option<&Polygon> {
        self.arena.get(&id)
    }

    /// Mutable access. Callers outside a transaction commit must only touch
    /// scratch polygons.
    pub fn polygon_mut(&mut self, id: PolygonId) -> Option<&mut Polygon> {
        if self.shelf_of(id) == Some(ShelfId::Committed) {
            self.db.mark_stale();
        }
        self.arena.get_mut(&id)
    }

    pub fn contains(&self, id: PolygonId) -> bool {
        self.arena.contains_key(&id)
    }

    pub fn shelf_of(&self, id: PolygonId) -> Option<ShelfId> {
        [ShelfId::Committed, ShelfId::Scratch]
            .into_iter()
            .find(|s| self.shelves[s.index()].contains(&id))
    }

    pub fn polygon_ids(&self, shelf: ShelfId) -> &[PolygonId] {
        &self.shelves[shelf.index()]
    }

    /// Polygons of `shelf` in insertion order.
    pub fn polygons(&self, shelf: ShelfId) -> impl Iterator<Item = (PolygonId, &Polygon)> + '_ {
        self.shelves[shelf.index()]
            .iter()
            .filter_map(|id| self.arena.get(id).map(|p| (*id, p)))
    }

    /// Committed polygons that are not mirror images.
    pub fn live_polygons(&self) -> impl Iterator<Item = (PolygonId, &Polygon)> + '_ {
        self.polygons(ShelfId::Committed).filter(|(_, p)| !p.is_mirrored())
    }

    pub fn polygon_count(&self, shelf: ShelfId) -> usize {
        self.shelves[shelf.index()].len()
    }

    pub fn is_empty(&self, shelf: ShelfId) -> bool {
        self.shelves[shelf.index()].is_empty()
    }

    /// Add to the active shelf.
    ///
    /// Invalid polygons are rejected with the reason [`Polygon::validate`]
    /// gives. With [`AddOp::Union`] the polygon is merged into every touching
    /// coplanar polygon of the same mirror state; the merged result keeps the
    /// first absorbed polygon's handle.
    pub fn add_polygon(&mut self, polygon: Polygon, op: AddOp) -> Result<PolygonId, DesignerError> {
        if !polygon.is_valid() {
            // zero area passes the loop checks but leaves no usable plane
            let reason = polygon.validate().err().unwrap_or(ValidationError::DegeneratePlane);
            warn!(%reason, vertices = polygon.vertex_count(), "rejecting invalid polygon");
            return Err(reason.into());
        }
        let shelf = self.active;
        if op == AddOp::Add {
            return Ok(self.insert(shelf, polygon));
        }

        let mut merged = polygon;
        let mut absorbed = Vec::new();
        for id in self.shelves[shelf.index()].clone() {
            let Some(existing) = self.arena.get(&id) else {
                continue;
            };
            if existing.is_mirrored() != merged.is_mirrored() || !merged.touches_or_overlaps(existing) {
                continue;
            }
            let mut trial = merged.clone();
            if trial.union(existing) {
                merged = trial;
                absorbed.push(id);
            }
        }

        match absorbed.split_first() {
            None => Ok(self.insert(shelf, merged)),
            Some((&keep, rest)) => {
                debug!("union merged {} existing polygons", absorbed.len());
                for id in rest {
                    self.remove_polygon(*id);
                }
                self.replace_polygon(keep, merged);
                Ok(keep)
            },
        }
    }

    /// Remove by handle from whichever shelf holds it; `None` if absent.
    pub fn remove_polygon(&mut self, id: PolygonId) -> Option<Polygon> {
        let polygon = self.arena.remove(&id)?;
        for (index, shelf) in self.shelves.iter_mut().enumerate() {
            if let Some(pos) = shelf.iter().position(|x| *x == id) {
                shelf.remove(pos);
                if index == ShelfId::Committed.index() {
                    self.db.mark_stale();
                }
            }
        }
        self.smoothing_groups.remove_polygon(id);
        Some(polygon)
    }

    /// Swap the geometry behind an existing handle.
    pub fn replace_polygon(&mut self, id: PolygonId, polygon: Polygon) -> bool {
        match self.arena.get_mut(&id) {
            Some(slot) => {
                *slot = polygon;
                self.db.mark_stale();
                true
            },
            None => false,
        }
    }

    /// Value-based lookup on the active shelf: a polygon with the same
    /// vertex set and plane as `polygon`, typically taken from an earlier
    /// model generation.
    pub fn query_equivalent_polygon(&self, polygon: &Polygon) -> Option<PolygonId> {
        self.polygons(self.active)
            .find(|(_, p)| p.is_equivalent(polygon))
            .map(|(id, _)| id)
    }

    /// Move every polygon of `from` onto the end of `to`, keeping handles.
    pub fn move_shelf(&mut self, from: ShelfId, to: ShelfId) {
        if from == to {
            return;
        }
        let moved = std::mem::take(&mut self.shelves[from.index()]);
        self.shelves[to.index()].extend(moved);
        self.db.mark_stale();
    }

    pub fn clear_shelf(&mut self, shelf: ShelfId) {
        for id in std::mem::take(&mut self.shelves[shelf.index()]) {
            self.arena.remove(&id);
            self.smoothing_groups.remove_polygon(id);
        }
        if shelf == ShelfId::Committed {
            self.db.mark_stale();
        }
    }

    /// Optimize every polygon on the active shelf and drop the ones that
    /// become invalid. Returns the number removed.
    pub fn optimize(&mut self) -> usize {
        let ids = self.shelves[self.active.index()].clone();
        let mut removed = 0;
        for id in ids {
            let keep = self.arena.get_mut(&id).is_some_and(|p| p.optimize());
            if !keep {
                self.remove_polygon(id);
                removed += 1;
            }
        }
        self.db.mark_stale();
        removed
    }

    pub fn bounding_box(&self, shelf: ShelfId) -> Option<Aabb> {
        self.polygons(shelf)
            .map(|(_, p)| p.bounding_box())
            .reduce(|a, b| a.merged(&b))
    }

    /// Positions of `shelf`, with points within tolerance counted once.
    pub fn distinct_vertices(&self, shelf: ShelfId) -> Vec<Point3<Real>> {
        let mut seen: PointGrid<()> = PointGrid::new();
        self.polygons(shelf)
            .flat_map(|(_, p)| p.loops().flatten().copied().collect::<Vec<_>>())
            .filter(|v| seen.insert(*v, ()))
            .collect()
    }

    pub fn distinct_vertex_count(&self, shelf: ShelfId) -> usize {
        self.distinct_vertices(shelf).len()
    }

    /// Committed polygons having edge `a`-`b` in either direction.
    pub fn query_polygons_sharing_edge(&self, a: &Point3<Real>, b: &Point3<Real>) -> Vec<PolygonId> {
        self.polygons(ShelfId::Committed)
            .filter(|(_, p)| p.has_edge(a, b, false))
            .map(|(id, _)| id)
            .collect()
    }

    /// Committed polygons with a vertex at `position`.
    pub fn query_polygons_with_vertex(&self, position: &Point3<Real>) -> Vec<PolygonId> {
        self.polygons(ShelfId::Committed)
            .filter(|(_, p)| p.has_vertex(position))
            .map(|(id, _)| id)
            .collect()
    }

    /// The live committed polygon whose outer loop runs `a` → `b`.
    pub fn find_directed_edge(&self, a: &Point3<Real>, b: &Point3<Real>) -> Option<PolygonId> {
        self.live_polygons()
            .find(|(_, p)| {
                p.outer_edges()
                    .any(|(p0, p1)| same_point(&p0, a) && same_point(&p1, b))
            })
            .map(|(id, _)| id)
    }

    /// Replace this model wholesale with `snapshot`. Handle allocation
    /// continues past both generations.
    pub fn restore(&mut self, snapshot: Model) {
        let next_id = self.next_id.max(snapshot.next_id);
        *self = snapshot;
        self.next_id = next_id;
        self.active = ShelfId::Committed;
        self.db.mark_stale();
    }

    pub fn smoothing_groups(&self) -> &SmoothingGroups {
        &self.smoothing_groups
    }

    pub fn smoothing_groups_mut(&mut self) -> &mut SmoothingGroups {
        &mut self.smoothing_groups
    }

    pub fn db(&self) -> &ModelDb {
        &self.db
    }

    /// A freshly built index, for queries against a model whose own index
    /// is stale.
    pub(crate) fn build_db(&self) -> ModelDb {
        let mut db = ModelDb::default();
        db.rebuild(self.polygons(ShelfId::Committed), DbScope::ALL, self.mirror_plane.as_ref());
        db
    }

    /// Rebuild the spatial query index from the committed shelf.
    pub fn reset_db(&mut self, scope: DbScope) {
        let mut db = std::mem::take(&mut self.db);
        db.rebuild(self.polygons(ShelfId::Committed), scope, self.mirror_plane.as_ref());
        self.db = db;
    }
}
