//! Welding clusters of nearby vertices

use super::{DisplayList, EditPlan, MainContext, ParamArchive, Tool, ToolKind, ToolResponse, Transaction, weld};
use crate::errors::DesignerError;
use crate::float_types::Real;
use crate::model::{Model, PointGrid, ShelfId};
use crate::polygon::same_point;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Where each input point goes: greedy nearest-first clustering repeated
/// until no two representatives lie within `distance`.
///
/// In each round the closest unclaimed pair seeds a cluster whose
/// representative is the pair's first point; further points join only
/// while they are within `distance` of that representative.
pub fn cluster_points(points: &[Point3<Real>], distance: Real) -> Vec<Point3<Real>> {
    let mut mapped = points.to_vec();
    loop {
        let mut distinct: Vec<Point3<Real>> = Vec::new();
        for p in &mapped {
            if !distinct.iter().any(|q| same_point(p, q)) {
                distinct.push(*p);
            }
        }

        let mut pairs: Vec<(Real, usize, usize)> = Vec::new();
        for i in 0..distinct.len() {
            for j in (i + 1)..distinct.len() {
                let d = (distinct[i] - distinct[j]).norm();
                if d <= distance {
                    pairs.push((d, i, j));
                }
            }
        }
        if pairs.is_empty() {
            return mapped;
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        // None: unclaimed; Some(r): belongs to representative r
        let mut owner: Vec<Option<usize>> = vec![None; distinct.len()];
        for (_, i, j) in pairs {
            match (owner[i], owner[j]) {
                (None, None) => {
                    owner[i] = Some(i);
                    owner[j] = Some(i);
                },
                (Some(r), None) if r == i => owner[j] = Some(i),
                (None, Some(r)) if r == j => owner[i] = Some(j),
                _ => {},
            }
        }
        for p in mapped.iter_mut() {
            if let Some(k) = distinct.iter().position(|q| same_point(p, q)) {
                if let Some(r) = owner[k] {
                    *p = distinct[r];
                }
            }
        }
    }
}

/// Plan welding every cluster of `candidates` (all live vertices when
/// `None`) onto its representative.
#[instrument(skip(model, candidates))]
pub fn remove_doubles(model: &Model, candidates: Option<&[Point3<Real>]>, distance: Real) -> EditPlan {
    let points = match candidates {
        Some(points) => points.to_vec(),
        None => {
            let mut points = Vec::new();
            for (_, polygon) in model.live_polygons() {
                for v in polygon.loops().flatten() {
                    if !points.iter().any(|q| same_point(v, q)) {
                        points.push(*v);
                    }
                }
            }
            points
        },
    };
    let targets = cluster_points(&points, distance);
    let mut moves: PointGrid<Point3<Real>> = PointGrid::new();
    for (p, t) in points.iter().zip(targets.iter()) {
        if !same_point(p, t) {
            moves.insert(*p, *t);
        }
    }
    debug!(candidates = points.len(), moved = moves.len(), "clusters built");
    if moves.is_empty() {
        return EditPlan::default();
    }
    weld::plan_remap(model, |p| moves.get(p).copied().unwrap_or(*p))
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoveDoublesParams {
    /// Cluster radius; `None` takes the session default
    pub distance: Option<Real>,
}

/// One-shot: welds near-coincident selected vertices (or every vertex when
/// nothing is selected) and commits on enter.
#[derive(Debug, Default)]
pub struct RemoveDoublesTool {
    pub params: RemoveDoublesParams,
}

impl Tool for RemoveDoublesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RemoveDoubles
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        if ctx.model.is_empty(ShelfId::Committed) {
            return Err(DesignerError::EmptyModel);
        }
        let distance = self.params.distance.unwrap_or(ctx.config.remove_doubles_distance);
        let selected = ctx.selection.all_positions();
        let candidates = (!selected.is_empty()).then_some(selected.as_slice());

        let mut tx = Transaction::begin(ctx, "Remove Doubles");
        let plan = remove_doubles(&ctx.model, candidates, distance);
        if plan.is_empty() {
            return Ok(tx.cancel(ctx));
        }
        plan.stage(&mut tx, ctx);
        Ok(tx.commit(ctx))
    }

    fn leave(&mut self, _ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        Ok(ToolResponse::Continue)
    }

    fn cancel(&mut self, _ctx: &mut MainContext) -> ToolResponse {
        ToolResponse::Cancelled
    }

    fn display(&self, _ctx: &MainContext, _out: &mut DisplayList) {}

    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        archive.value(ToolKind::RemoveDoubles.name(), &mut self.params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_of_near_points_keeps_far_end_apart() {
        // 0 -- 0.8 -- 1.6 with distance 1: the closest pair seeds, the far
        // point is out of reach of the representative
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.8, 0.0, 0.0),
            Point3::new(1.6, 0.0, 0.0),
        ];
        let mapped = cluster_points(&points, 1.0);
        assert!(same_point(&mapped[0], &mapped[1]));
        let mut distinct: Vec<Point3<Real>> = Vec::new();
        for p in &mapped {
            if !distinct.iter().any(|q| same_point(p, q)) {
                distinct.push(*p);
            }
        }
        for i in 0..distinct.len() {
            for j in (i + 1)..distinct.len() {
                assert!((distinct[i] - distinct[j]).norm() > 1.0);
            }
        }
    }

    #[test]
    fn copies_in_neighbouring_grid_cells_move_together() {
        use crate::float_types::tolerance;
        use crate::polygon::Polygon;

        let tol = tolerance();
        let a = Point3::new(0.49999 * tol, 0.0, 0.0);
        let b = Point3::new(0.50001 * tol, 0.0, 0.0);
        let model = Model::from_polygons([
            Polygon::new(vec![a, Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)]),
            Polygon::new(vec![b, Point3::new(0.0, -1.0, 0.0), Point3::new(1.0, 0.0, 0.0)]),
        ]);
        let target = Point3::new(0.001, 0.0, 0.0);
        let mut welded = model.clone();
        remove_doubles(&model, Some(&[target, a]), 0.01).apply(&mut welded);

        let near_origin = welded
            .distinct_vertices(ShelfId::Committed)
            .into_iter()
            .filter(|v| v.coords.norm() < 0.01)
            .collect::<Vec<_>>();
        assert_eq!(near_origin.len(), 1);
        assert!(same_point(&near_origin[0], &target));
    }

    #[test]
    fn stable_input_is_untouched() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
        assert_eq!(cluster_points(&points, 1.0), points.to_vec());
    }
}
