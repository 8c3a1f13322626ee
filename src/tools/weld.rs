//! Collapsing one vertex onto another

use super::{
    DisplayList, EditPlan, Key, MainContext, ParamArchive, PointerEvent, Tool, ToolKind, ToolResponse, Transaction,
};
use crate::errors::DesignerError;
use crate::float_types::{Real, tolerance};
use crate::model::Model;
use crate::polygon::{Polygon, PolygonFlags, same_point};
use crate::selection::{ElementKind, ElementManager, ElementMask};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rebuild `polygon` with every vertex passed through `remap`.
///
/// Returns `None` when no vertex moves. Otherwise the replacement pieces:
/// empty when the polygon collapses, one polygon when it stays planar, and
/// triangles when moving the vertex bent it out of its plane.
pub fn remap_polygon(polygon: &Polygon, remap: impl Fn(&Point3<Real>) -> Point3<Real>) -> Option<Vec<Polygon>> {
    let moved = polygon.loops().flatten().any(|v| !same_point(&remap(v), v));
    if !moved {
        return None;
    }

    let outer = dedup_loop(polygon.vertices().iter().map(&remap).collect(), !polygon.is_open());
    let holes: Vec<Vec<Point3<Real>>> = polygon
        .holes()
        .iter()
        .map(|h| dedup_loop(h.iter().map(&remap).collect(), true))
        .filter(|h| h.len() >= 3)
        .collect();
    let minimum = if polygon.is_open() { 2 } else { 3 };
    if outer.len() < minimum {
        return Some(Vec::new());
    }

    let mut result = polygon.derive(outer, holes);
    if result.is_open() {
        return Some(vec![result]);
    }
    result.flags.remove(PolygonFlags::NON_PLANAR_QUAD);
    let Some(fitted) = result.computed_plane() else {
        return Some(Vec::new());
    };
    // a collapse that turns the face around is a degenerate result
    if fitted.normal.dot(&polygon.plane.normal) <= 0.0 {
        return Some(Vec::new());
    }
    result.plane = fitted;
    if result.is_planar() {
        return Some(if result.is_valid() { vec![result] } else { Vec::new() });
    }

    let triangles = result
        .triangulate()
        .into_iter()
        .map(|[a, b, c]| result.derive(vec![a, b, c], Vec::new()))
        .filter_map(|mut t| t.refit_plane().then_some(t))
        .filter(Polygon::is_valid)
        .collect();
    Some(triangles)
}

/// Drop consecutive repeats, including the wrap-around for closed loops.
fn dedup_loop(points: Vec<Point3<Real>>, closed: bool) -> Vec<Point3<Real>> {
    let mut out: Vec<Point3<Real>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_none_or(|last| !same_point(last, &p)) {
            out.push(p);
        }
    }
    if closed {
        while out.len() > 1 && same_point(&out[0], &out[out.len() - 1]) {
            out.pop();
        }
    }
    out
}

/// Plan for moving every live vertex at `source` onto `target`.
pub fn weld(model: &Model, source: &Point3<Real>, target: &Point3<Real>) -> EditPlan {
    if same_point(source, target) {
        return EditPlan::default();
    }
    plan_remap(model, |p| if same_point(p, source) { *target } else { *p })
}

/// Plan rebuilding every live polygon that `remap` moves a vertex of.
pub(crate) fn plan_remap(model: &Model, remap: impl Fn(&Point3<Real>) -> Point3<Real>) -> EditPlan {
    let mut plan = EditPlan::default();
    for (id, polygon) in model.live_polygons() {
        if let Some(pieces) = remap_polygon(polygon, &remap) {
            plan.replaced.push(id);
            plan.added.extend(pieces);
        }
    }
    debug!(
        replaced = plan.replaced.len(),
        added = plan.added.len(),
        "remap planned"
    );
    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeldParams {
    /// Move both vertices to their midpoint instead of onto the target
    pub at_midpoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum WeldPhase {
    #[default]
    PickSource,
    PickTarget,
}

/// Welds two selected vertices on enter, or asks for a source and a target
/// click when fewer are selected.
#[derive(Debug, Default)]
pub struct WeldTool {
    pub params: WeldParams,
    phase: WeldPhase,
    source: Option<Point3<Real>>,
    hover: Option<Point3<Real>>,
    tx: Option<Transaction>,
}

impl WeldTool {
    fn finish(&mut self, ctx: &mut MainContext, source: Point3<Real>, target: Point3<Real>) -> ToolResponse {
        let Some(mut tx) = self.tx.take() else {
            return ToolResponse::Cancelled;
        };
        let plan = if self.params.at_midpoint {
            let mid = nalgebra::center(&source, &target);
            plan_remap(&ctx.model, |p| {
                if same_point(p, &source) || same_point(p, &target) { mid } else { *p }
            })
        } else {
            weld(&ctx.model, &source, &target)
        };
        if plan.is_empty() {
            return tx.cancel(ctx);
        }
        plan.stage(&mut tx, ctx);
        tx.commit(ctx)
    }

    fn pick_vertex(ctx: &MainContext, event: &PointerEvent) -> Option<Point3<Real>> {
        ElementManager::pick(
            &ctx.model,
            &event.ray,
            ElementMask::VERTEX,
            false,
            ctx.config.pick_radius,
        )
        .map(|e| e.positions[0])
    }
}

impl Tool for WeldTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Weld
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        if ctx.model.live_polygons().next().is_none() {
            return Err(DesignerError::EmptyModel);
        }
        self.tx = Some(Transaction::begin(ctx, "Weld"));
        let picked: Vec<Point3<Real>> = ctx
            .selection
            .iter()
            .filter(|e| e.kind == ElementKind::Vertex)
            .map(|e| e.positions[0])
            .collect();
        if let &[source, target] = picked.as_slice() {
            return Ok(self.finish(ctx, source, target));
        }
        self.phase = WeldPhase::PickSource;
        Ok(ToolResponse::Continue)
    }

    fn leave(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        Ok(self.cancel(ctx))
    }

    fn cancel(&mut self, ctx: &mut MainContext) -> ToolResponse {
        self.source = None;
        match self.tx.take() {
            Some(tx) => tx.cancel(ctx),
            None => ToolResponse::Cancelled,
        }
    }

    fn on_pointer_move(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.hover = Self::pick_vertex(ctx, event);
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_down(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        let Some(vertex) = Self::pick_vertex(ctx, event) else {
            return Ok(ToolResponse::Continue);
        };
        match (self.phase, self.source) {
            (WeldPhase::PickTarget, Some(source)) if !same_point(&source, &vertex) => {
                Ok(self.finish(ctx, source, vertex))
            },
            (WeldPhase::PickTarget, _) => Ok(ToolResponse::Continue),
            (WeldPhase::PickSource, _) => {
                self.source = Some(vertex);
                self.phase = WeldPhase::PickTarget;
                Ok(ToolResponse::Continue)
            },
        }
    }

    /// Escape drops a picked source first, then cancels.
    fn on_key_down(&mut self, ctx: &mut MainContext, key: Key) -> Result<ToolResponse, DesignerError> {
        match (key, self.phase) {
            (Key::Escape, WeldPhase::PickTarget) => {
                self.phase = WeldPhase::PickSource;
                self.source = None;
                Ok(ToolResponse::Continue)
            },
            (Key::Escape, WeldPhase::PickSource) => Ok(self.cancel(ctx)),
            _ => Ok(ToolResponse::Continue),
        }
    }

    fn display(&self, _ctx: &MainContext, out: &mut DisplayList) {
        out.points.extend(self.source);
        out.points.extend(self.hover);
        if let (Some(a), Some(b)) = (self.source, self.hover) {
            if (a - b).norm() > tolerance() {
                out.lines.push((a, b));
            }
        }
    }

    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        archive.value(ToolKind::Weld.name(), &mut self.params)?;
        Ok(())
    }
}
