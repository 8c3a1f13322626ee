//! Mirror-symmetry maintenance
//!
//! The live half of the committed shelf is authoritative; the MIRRORED half
//! is thrown away and regenerated from it after every edit.

use super::{DbScope, Model, PolygonId, ShelfId};
use crate::float_types::tolerance;
use crate::plane::{COPLANAR, Plane};
use crate::polygon::Polygon;
use tracing::{debug, instrument};

impl Model {
    pub fn mirror_plane(&self) -> Option<&Plane> {
        self.mirror_plane.as_ref()
    }

    /// Install (or clear) the mirror plane and regenerate the mirrored half.
    pub fn set_mirror_plane(&mut self, plane: Option<Plane>) {
        self.mirror_plane = plane.filter(Plane::is_valid);
        self.update_mirror();
    }

    /// Drop the mirror plane and every mirrored polygon.
    pub fn clear_mirror(&mut self) {
        self.mirror_plane = None;
        self.remove_mirrored();
        self.reset_db(DbScope::ALL);
    }

    fn remove_mirrored(&mut self) -> usize {
        let mirrored: Vec<PolygonId> = self
            .polygons(ShelfId::Committed)
            .filter(|(_, p)| p.is_mirrored())
            .map(|(id, _)| id)
            .collect();
        for id in &mirrored {
            self.remove_polygon(*id);
        }
        mirrored.len()
    }

    /// Rebuild the mirrored half from the live half.
    ///
    /// Live polygons lying in the mirror plane would coincide with their own
    /// reflection and are removed. Seam edges on the plane are left out of
    /// the query index by [`Model::reset_db`].
    #[instrument(skip(self))]
    pub fn update_mirror(&mut self) {
        let removed = self.remove_mirrored();
        let Some(plane) = self.mirror_plane else {
            self.reset_db(DbScope::ALL);
            return;
        };

        let in_plane: Vec<PolygonId> = self
            .live_polygons()
            .filter(|(_, p)| plane.classify_points(p.loops().flatten()) == COPLANAR)
            .map(|(id, _)| id)
            .collect();
        for id in &in_plane {
            self.remove_polygon(*id);
        }

        let reflected: Vec<Polygon> = self
            .live_polygons()
            .map(|(_, p)| p.mirror(&plane))
            .filter(|p| p.area() > tolerance() * tolerance())
            .collect();
        debug!(
            removed,
            stripped = in_plane.len(),
            added = reflected.len(),
            "mirror regenerated"
        );
        for polygon in reflected {
            self.insert(ShelfId::Committed, polygon);
        }
        self.reset_db(DbScope::ALL);
    }
}
