//! Axis-aligned slicing and mirroring
//!
//! Both tools preview the outline the plane cuts through the model. Slice
//! commits through [`Model::clip`] and keeps one or both sides; Mirror keeps
//! the back side and installs the plane so the front is regenerated from it.

use super::{
    DisplayList, Key, MainContext, ParamArchive, PointerEvent, Tool, ToolKind, ToolResponse, Transaction,
};
use crate::errors::DesignerError;
use crate::float_types::{Real, parry3d::query::Ray};
use crate::model::{ClipResult, Model, PolygonId, ShelfId, chain_edges};
use crate::plane::{FRONT, Plane, SPANNING};
use crate::polygon::Polygon;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vector3<Real> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }

    pub const fn from_key(c: char) -> Option<Self> {
        match c {
            'x' | 'X' => Some(Axis::X),
            'y' | 'Y' => Some(Axis::Y),
            'z' | 'Z' => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Which side of the cut survives a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Keep {
    Front,
    #[default]
    Back,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceParams {
    pub axis: Axis,
    /// Plane offset along the axis
    pub offset: Real,
    pub keep: Keep,
    /// Close the cut with cap facets
    pub fill_facet: bool,
}

impl Default for SliceParams {
    fn default() -> Self {
        SliceParams {
            axis: Axis::X,
            offset: 0.0,
            keep: Keep::Back,
            fill_facet: true,
        }
    }
}

impl SliceParams {
    pub fn plane(&self) -> Plane {
        Plane::from_normal(self.axis.unit(), self.offset)
    }
}

/// Segments where `plane` cuts the live polygons of `model`, chained into
/// closed loops so each segment ends where the next one starts. When the
/// cut does not close (an open surface, or a mirrored half) the raw
/// segments are returned unordered.
pub fn slice_outline(model: &Model, plane: &Plane) -> Vec<(Point3<Real>, Point3<Real>)> {
    let segments: Vec<(Point3<Real>, Point3<Real>)> = model
        .live_polygons()
        .flat_map(|(_, p)| p.intersect_plane(plane))
        .collect();
    match chain_edges(&segments) {
        Some(loops) => loops
            .iter()
            .flat_map(|ring| ring.iter().zip(ring.iter().cycle().skip(1)).map(|(a, b)| (*a, *b)))
            .collect(),
        None => {
            debug!(segments = segments.len(), "slice outline does not close");
            segments
        },
    }
}

#[derive(Debug)]
pub struct SliceTool {
    pub params: SliceParams,
    mirror: bool,
    preview: Vec<(Point3<Real>, Point3<Real>)>,
    /// Offset when the drag started, and the axis point under the pointer then
    drag: Option<(Real, Real)>,
    tx: Option<Transaction>,
}

impl SliceTool {
    pub fn slice() -> Self {
        SliceTool {
            params: SliceParams::default(),
            mirror: false,
            preview: Vec::new(),
            drag: None,
            tx: None,
        }
    }

    pub fn mirror() -> Self {
        SliceTool {
            params: SliceParams {
                fill_facet: false,
                ..SliceParams::default()
            },
            mirror: true,
            ..Self::slice()
        }
    }

    pub fn with_params(mut self, params: SliceParams) -> Self {
        self.params = params;
        self
    }

    pub fn preview(&self) -> &[(Point3<Real>, Point3<Real>)] {
        &self.preview
    }

    fn refresh(&mut self, ctx: &MainContext) {
        self.preview = slice_outline(&ctx.model, &self.params.plane());
    }

    /// Coordinate along the axis of the point on the axis line through the
    /// model centre closest to the pointer ray.
    fn axis_coordinate(&self, ctx: &MainContext, ray: &Ray) -> Option<Real> {
        let axis = self.params.axis.unit();
        let centre = ctx
            .model
            .bounding_box(ShelfId::Committed)
            .map(|b| b.center())
            .unwrap_or_else(Point3::origin);
        let w0 = centre - ray.origin;
        let b = axis.dot(&ray.dir);
        let c = ray.dir.norm_squared();
        let denom = c - b * b;
        if denom.abs() < Real::EPSILON {
            return None;
        }
        let d = axis.dot(&w0);
        let e = ray.dir.dot(&w0);
        let s = (b * e - c * d) / denom;
        Some(axis.dot(&(centre + axis * s).coords))
    }

    fn plan(&self, model: &Model) -> Result<(Vec<PolygonId>, Vec<Polygon>), DesignerError> {
        let plane = self.params.plane();
        let replaced: Vec<PolygonId> = model.polygon_ids(ShelfId::Committed).to_vec();
        let fill = self.params.fill_facet && !self.mirror;
        let clipped = model.clip(&plane, fill);
        let strip_mirrored = model.mirror_plane().is_some();
        let keep = |polygons: Option<Model>| -> Vec<Polygon> {
            polygons
                .map(|m| {
                    m.polygons(ShelfId::Committed)
                        .filter(|(_, p)| !(strip_mirrored && p.is_mirrored()))
                        .map(|(_, p)| p.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        if clipped.result == ClipResult::ClipFailed {
            if self.mirror {
                let class = model
                    .live_polygons()
                    .fold(0, |acc, (_, p)| acc | plane.classify_points(p.loops().flatten()));
                if class & (FRONT | SPANNING) == 0 {
                    // already entirely behind the plane
                    return Ok((Vec::new(), Vec::new()));
                }
            }
            return Err(DesignerError::ClipFailed);
        }
        if clipped.result == ClipResult::SuccessButFillFailed {
            warn!("slice caps could not be built");
        }

        let kept = match (self.mirror, self.params.keep) {
            (true, _) | (false, Keep::Back) => keep(clipped.back),
            (false, Keep::Front) => keep(clipped.front),
            (false, Keep::Both) => {
                let mut both = keep(clipped.front);
                both.extend(keep(clipped.back));
                both
            },
        };
        debug!(kept = kept.len(), mirror = self.mirror, "slice planned");
        Ok((replaced, kept))
    }
}

impl Tool for SliceTool {
    fn kind(&self) -> ToolKind {
        if self.mirror { ToolKind::Mirror } else { ToolKind::Slice }
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        if ctx.model.live_polygons().next().is_none() {
            return Err(DesignerError::EmptyModel);
        }
        let description = if self.mirror { "Mirror" } else { "Slice" };
        self.tx = Some(Transaction::begin(ctx, description));
        self.refresh(ctx);
        Ok(ToolResponse::Continue)
    }

    fn leave(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        let Some(mut tx) = self.tx.take() else {
            return Ok(ToolResponse::Cancelled);
        };
        let (replaced, kept) = match self.plan(&ctx.model) {
            Ok(plan) => plan,
            Err(err) => {
                tx.cancel(ctx);
                return Err(err);
            },
        };
        tx.replace(replaced);
        tx.stage(ctx, kept);
        if self.mirror {
            let plane = self.params.plane();
            return Ok(tx.commit_with(ctx, |model| model.set_mirror_plane(Some(plane))));
        }
        Ok(tx.commit(ctx))
    }

    fn cancel(&mut self, ctx: &mut MainContext) -> ToolResponse {
        self.preview.clear();
        match self.tx.take() {
            Some(tx) => tx.cancel(ctx),
            None => ToolResponse::Cancelled,
        }
    }

    fn on_pointer_down(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.drag = self
            .axis_coordinate(ctx, &event.ray)
            .map(|at| (self.params.offset, at));
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_move(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        if let Some((start_offset, start_at)) = self.drag {
            if let Some(at) = self.axis_coordinate(ctx, &event.ray) {
                self.params.offset = start_offset + (at - start_at);
                self.refresh(ctx);
            }
        }
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_up(&mut self, _ctx: &mut MainContext, _event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.drag = None;
        Ok(ToolResponse::Continue)
    }

    /// `x`, `y` and `z` switch the cutting axis.
    fn on_key_down(&mut self, ctx: &mut MainContext, key: Key) -> Result<ToolResponse, DesignerError> {
        match key {
            Key::Escape => Ok(self.cancel(ctx)),
            Key::Enter => self.leave(ctx),
            Key::Char(c) => {
                if let Some(axis) = Axis::from_key(c) {
                    self.params.axis = axis;
                    self.refresh(ctx);
                }
                Ok(ToolResponse::Continue)
            },
        }
    }

    fn display(&self, _ctx: &MainContext, out: &mut DisplayList) {
        out.lines.extend(self.preview.iter().copied());
    }

    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        archive.value(self.kind().name(), &mut self.params)?;
        Ok(())
    }
}
