//! Merging touching coplanar faces into one

use super::{DisplayList, EditPlan, MainContext, ParamArchive, Tool, ToolKind, ToolResponse, Transaction};
use crate::errors::DesignerError;
use crate::model::{Model, PolygonId};
use crate::polygon::Polygon;
use tracing::debug;

/// Union pairs of same-material, coplanar, touching polygons until no pair
/// is left that merges into a single region.
pub fn merge_polygons(mut polygons: Vec<Polygon>) -> Vec<Polygon> {
    'restart: loop {
        for i in 0..polygons.len() {
            for j in (i + 1)..polygons.len() {
                let (a, b) = (&polygons[i], &polygons[j]);
                if a.material_id != b.material_id || !a.touches_or_overlaps(b) {
                    continue;
                }
                let mut merged = a.clone();
                if merged.union(b) {
                    polygons[i] = merged;
                    polygons.swap_remove(j);
                    continue 'restart;
                }
            }
        }
        return polygons;
    }
}

/// Plan merging the live polygons `ids`. Empty when nothing merges.
pub fn merge(model: &Model, ids: &[PolygonId]) -> EditPlan {
    let inputs: Vec<(PolygonId, Polygon)> = ids
        .iter()
        .filter_map(|id| model.polygon(*id).map(|p| (*id, p.clone())))
        .filter(|(_, p)| !p.is_mirrored() && !p.is_open())
        .collect();
    let count = inputs.len();
    let merged = merge_polygons(inputs.iter().map(|(_, p)| p.clone()).collect());
    debug!(inputs = count, outputs = merged.len(), "merge");
    if merged.len() == count {
        return EditPlan::default();
    }
    EditPlan {
        replaced: inputs.into_iter().map(|(id, _)| id).collect(),
        added: merged,
    }
}

/// One-shot: merges the selected faces on enter.
#[derive(Debug, Default)]
pub struct MergeTool;

impl Tool for MergeTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Merge
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        let faces = ctx.selection.face_ids();
        if faces.len() < 2 {
            return Err(DesignerError::NotEnoughSelection {
                tool: ToolKind::Merge,
                what: "faces",
                required: 2,
                found: faces.len(),
            });
        }
        let mut tx = Transaction::begin(ctx, "Merge");
        let plan = merge(&ctx.model, &faces);
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

    fn serialize(&mut self, _archive: &mut ParamArchive) -> Result<(), DesignerError> {
        Ok(())
    }
}
