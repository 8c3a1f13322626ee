//! Sweeping a profile face along a path
//!
//! The profile ring is carried from path vertex to path vertex by
//! projecting it along the segment direction onto the mitre plane that
//! bisects the incoming and outgoing directions. Consecutive rings are
//! joined by quads.

use super::{
    DisplayList, EditPlan, Key, MainContext, ParamArchive, PointerEvent, Tool, ToolKind, ToolResponse, Transaction,
};
use crate::errors::DesignerError;
use crate::float_types::{Real, tolerance};
use crate::model::{Model, PolygonId};
use crate::plane::Plane;
use crate::polygon::{Polygon, PolygonFlags, same_point};
use crate::selection::{ElementManager, ElementMask};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// Result of a lathe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatheOutcome {
    Success,
    /// No usable edge chain or path polygon
    NoPath,
    /// The profile has no usable plane, has holes, or lies along the path
    InappropriateProfileShape,
    /// Some profile vertex would cross the next mitre plane
    ProfileShapeTooBig,
}

impl fmt::Display for LatheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LatheOutcome::Success => "success",
            LatheOutcome::NoPath => "no path to lathe along",
            LatheOutcome::InappropriateProfileShape => "profile shape is not suitable",
            LatheOutcome::ProfileShapeTooBig => "profile is too big for the path curvature",
        };
        f.write_str(text)
    }
}

/// A polyline, optionally closed.
#[derive(Debug, Clone, PartialEq)]
pub struct LathePath {
    pub points: Vec<Point3<Real>>,
    pub closed: bool,
}

impl LathePath {
    /// Chain undirected edges into one polyline. `None` when the edges
    /// branch or fall apart into several pieces.
    pub fn from_edges(edges: &[(Point3<Real>, Point3<Real>)]) -> Option<Self> {
        let mut remaining: Vec<(Point3<Real>, Point3<Real>)> = Vec::new();
        for (a, b) in edges {
            if same_point(a, b) {
                continue;
            }
            let duplicate = remaining
                .iter()
                .any(|(p, q)| (same_point(p, a) && same_point(q, b)) || (same_point(p, b) && same_point(q, a)));
            if !duplicate {
                remaining.push((*a, *b));
            }
        }
        let degree = |p: &Point3<Real>, edges: &[(Point3<Real>, Point3<Real>)]| {
            edges
                .iter()
                .filter(|(a, b)| same_point(a, p) || same_point(b, p))
                .count()
        };
        if remaining.is_empty()
            || remaining
                .iter()
                .any(|(a, b)| degree(a, &remaining) > 2 || degree(b, &remaining) > 2)
        {
            return None;
        }

        // start at a dangling end when there is one
        let start = remaining
            .iter()
            .flat_map(|(a, b)| [*a, *b])
            .find(|p| degree(p, &remaining) == 1)
            .unwrap_or(remaining[0].0);
        let mut points = vec![start];
        let mut current = start;
        while let Some(i) = remaining
            .iter()
            .position(|(a, b)| same_point(a, &current) || same_point(b, &current))
        {
            let (a, b) = remaining.swap_remove(i);
            current = if same_point(&a, &current) { b } else { a };
            points.push(current);
        }
        if !remaining.is_empty() {
            return None;
        }
        let closed = points.len() > 3 && same_point(&points[0], &points[points.len() - 1]);
        if closed {
            points.pop();
        }
        Some(LathePath { points, closed })
    }

    /// The outer loop of a face, or the polyline of an open polygon.
    pub fn from_polygon(polygon: &Polygon) -> Option<Self> {
        let path = LathePath {
            points: polygon.vertices().to_vec(),
            closed: !polygon.is_open(),
        };
        (path.points.len() >= path.minimum_points()).then_some(path)
    }

    const fn minimum_points(&self) -> usize {
        if self.closed { 3 } else { 2 }
    }

    /// Reorder so the path starts at the point nearest `anchor`: open paths
    /// may be reversed, closed ones are rotated.
    fn starting_near(mut self, anchor: &Point3<Real>) -> Self {
        let distance = |p: &Point3<Real>| (p - anchor).norm_squared();
        if self.closed {
            let nearest = (0..self.points.len())
                .min_by(|i, j| distance(&self.points[*i]).total_cmp(&distance(&self.points[*j])))
                .unwrap_or(0);
            self.points.rotate_left(nearest);
        } else if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
            if distance(last) < distance(first) {
                self.points.reverse();
            }
        }
        self
    }

    /// Segment directions; closed paths include the closing segment.
    fn tangents(&self) -> Option<Vec<Vector3<Real>>> {
        let n = self.points.len();
        let count = if self.closed { n } else { n - 1 };
        (0..count)
            .map(|i| (self.points[(i + 1) % n] - self.points[i]).try_normalize(tolerance()))
            .collect()
    }
}

/// Project `ring` along `dir` onto `plane`, failing when any vertex is not
/// strictly behind it.
fn advance(ring: &[Point3<Real>], dir: &Vector3<Real>, plane: &Plane) -> Result<Vec<Point3<Real>>, LatheOutcome> {
    ring.iter()
        .map(|q| {
            if plane.distance(q) > -tolerance() {
                return Err(LatheOutcome::ProfileShapeTooBig);
            }
            let t = plane
                .intersect_line(q, dir)
                .ok_or(LatheOutcome::ProfileShapeTooBig)?;
            Ok(q + dir * t)
        })
        .collect()
}

/// Mitre plane at `point` between directions `incoming` and `outgoing`.
fn mitre(point: &Point3<Real>, incoming: &Vector3<Real>, outgoing: &Vector3<Real>) -> Result<Plane, LatheOutcome> {
    let bisector = (incoming + outgoing)
        .try_normalize(tolerance())
        .ok_or(LatheOutcome::ProfileShapeTooBig)?;
    Ok(Plane::from_point_normal(point, &bisector))
}

fn side_pieces(template: &Polygon, from: &[Point3<Real>], to: &[Point3<Real>], out: &mut Vec<Polygon>) {
    let k = from.len();
    for j in 0..k {
        let quad = vec![from[j], from[(j + 1) % k], to[(j + 1) % k], to[j]];
        let mut side = template.derive(quad, Vec::new());
        side.flags = PolygonFlags::empty();
        if !side.refit_plane() {
            continue;
        }
        if side.is_planar() {
            if side.is_valid() {
                out.push(side);
            }
            continue;
        }
        for [a, b, c] in side.triangulate() {
            let mut triangle = template.derive(vec![a, b, c], Vec::new());
            triangle.flags = PolygonFlags::empty();
            if triangle.refit_plane() && triangle.is_valid() {
                out.push(triangle);
            }
        }
    }
}

/// Sweep `profile` along `path`.
///
/// The profile stays where it is and is swept in the path's segment
/// directions; closed paths first project it onto the mitre plane at the
/// path start. Open paths get end caps when `cap_ends` is set. The model is
/// not touched; failures leave nothing behind.
#[instrument(skip_all, fields(path_points = path.points.len(), closed = path.closed))]
pub fn lathe(profile: &Polygon, path: &LathePath, cap_ends: bool) -> Result<Vec<Polygon>, LatheOutcome> {
    if path.points.len() < path.minimum_points() {
        return Err(LatheOutcome::NoPath);
    }
    if profile.is_open() || !profile.holes().is_empty() || profile.vertices().len() < 3 {
        return Err(LatheOutcome::InappropriateProfileShape);
    }
    let profile_plane = profile
        .computed_plane()
        .ok_or(LatheOutcome::InappropriateProfileShape)?;
    let tangents = path.tangents().ok_or(LatheOutcome::NoPath)?;
    let first = tangents[0];
    let facing = profile_plane.normal.dot(&first);
    if facing.abs() < tolerance() {
        return Err(LatheOutcome::InappropriateProfileShape);
    }

    // ring wound counter-clockwise around the travel direction
    let mut ring: Vec<Point3<Real>> = profile.vertices().to_vec();
    if facing < 0.0 {
        ring.reverse();
    }

    let n = path.points.len();
    if path.closed {
        let start = mitre(&path.points[0], &tangents[n - 1], &first)?;
        ring = ring
            .iter()
            .map(|q| {
                start
                    .intersect_line(q, &first)
                    .map(|t| q + first * t)
                    .ok_or(LatheOutcome::InappropriateProfileShape)
            })
            .collect::<Result<_, _>>()?;
    }

    let mut rings = vec![ring];
    let last_plane = if path.closed { n } else { n - 1 };
    for i in 1..=last_plane {
        let incoming = tangents[i - 1];
        let point = &path.points[i % n];
        let plane = if !path.closed && i == n - 1 {
            Plane::from_point_normal(point, &incoming)
        } else {
            mitre(point, &incoming, &tangents[i % tangents.len()])?
        };
        let previous = rings.last().ok_or(LatheOutcome::NoPath)?;
        let next = advance(previous, &incoming, &plane)?;
        rings.push(next);
    }
    if path.closed {
        // the swept ring arrives back on the start mitre; reuse the start ring
        rings.pop();
        let first_ring = rings[0].clone();
        rings.push(first_ring);
    }

    let mut out = Vec::new();
    for pair in rings.windows(2) {
        side_pieces(profile, &pair[0], &pair[1], &mut out);
    }
    if cap_ends && !path.closed {
        let start_cap: Vec<Point3<Real>> = rings[0].iter().rev().copied().collect();
        let end_cap = rings[rings.len() - 1].clone();
        for cap in [start_cap, end_cap] {
            let mut polygon = profile.derive(cap, Vec::new());
            polygon.flags = PolygonFlags::empty();
            if polygon.refit_plane() && polygon.is_valid() {
                out.push(polygon);
            }
        }
    }
    debug!(rings = rings.len(), polygons = out.len(), "lathe built");
    Ok(out)
}

/// Plan sweeping the committed polygon `profile` along `path`; the profile
/// is consumed.
pub fn lathe_model(
    model: &Model,
    profile: PolygonId,
    path: LathePath,
    cap_ends: bool,
) -> Result<EditPlan, LatheOutcome> {
    let polygon = model
        .polygon(profile)
        .ok_or(LatheOutcome::InappropriateProfileShape)?;
    let path = path.starting_near(&polygon.centroid());
    let added = lathe(polygon, &path, cap_ends)?;
    Ok(EditPlan {
        replaced: vec![profile],
        added,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathSource {
    /// Chain the selected edges
    #[default]
    SelectedEdges,
    /// Use a face picked after entering the tool
    PickedPolygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatheParams {
    pub path: PathSource,
    pub cap_ends: bool,
}

impl Default for LatheParams {
    fn default() -> Self {
        LatheParams {
            path: PathSource::SelectedEdges,
            cap_ends: true,
        }
    }
}

/// Sweeps the selected face along the selected edges, or along a face
/// picked once the tool is running.
#[derive(Debug, Default)]
pub struct LatheTool {
    pub params: LatheParams,
    profile: Option<PolygonId>,
    hover: Option<PolygonId>,
    tx: Option<Transaction>,
}

impl LatheTool {
    pub fn with_params(params: LatheParams) -> Self {
        LatheTool {
            params,
            ..Default::default()
        }
    }

    /// Whether the tool is waiting for a path face to be picked.
    pub const fn awaiting_path(&self) -> bool {
        self.profile.is_some() && self.tx.is_some()
    }

    fn finish(&mut self, ctx: &mut MainContext, path: Option<LathePath>) -> Result<ToolResponse, DesignerError> {
        let (Some(mut tx), Some(profile)) = (self.tx.take(), self.profile.take()) else {
            return Ok(ToolResponse::Cancelled);
        };
        let outcome = path
            .ok_or(LatheOutcome::NoPath)
            .and_then(|path| lathe_model(&ctx.model, profile, path, self.params.cap_ends));
        match outcome {
            Ok(plan) => {
                plan.stage(&mut tx, ctx);
                Ok(tx.commit(ctx))
            },
            Err(outcome) => {
                tx.cancel(ctx);
                Err(DesignerError::Lathe(outcome))
            },
        }
    }

    fn pick_face(&self, ctx: &MainContext, event: &PointerEvent) -> Option<PolygonId> {
        ElementManager::pick(&ctx.model, &event.ray, ElementMask::FACE, false, ctx.config.pick_radius)
            .and_then(|e| e.polygon)
            .filter(|id| Some(*id) != self.profile)
    }
}

impl Tool for LatheTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Lathe
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        let faces = ctx.selection.face_ids();
        let Some(&profile) = faces.first() else {
            return Err(DesignerError::NotEnoughSelection {
                tool: ToolKind::Lathe,
                what: "profile face",
                required: 1,
                found: 0,
            });
        };
        self.profile = Some(profile);
        self.tx = Some(Transaction::begin(ctx, "Lathe"));

        match self.params.path {
            PathSource::SelectedEdges => {
                let edges = ctx.selection.edges();
                if edges.is_empty() {
                    return Ok(ToolResponse::Continue);
                }
                let path = LathePath::from_edges(&edges);
                self.finish(ctx, path)
            },
            PathSource::PickedPolygon => match faces.get(1) {
                Some(id) => {
                    let path = ctx.model.polygon(*id).and_then(LathePath::from_polygon);
                    self.finish(ctx, path)
                },
                None => Ok(ToolResponse::Continue),
            },
        }
    }

    fn leave(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        Ok(self.cancel(ctx))
    }

    fn cancel(&mut self, ctx: &mut MainContext) -> ToolResponse {
        self.profile = None;
        self.hover = None;
        match self.tx.take() {
            Some(tx) => tx.cancel(ctx),
            None => ToolResponse::Cancelled,
        }
    }

    fn on_pointer_move(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.hover = self.pick_face(ctx, event);
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_down(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        let Some(id) = self.pick_face(ctx, event) else {
            return Ok(ToolResponse::Continue);
        };
        let path = ctx.model.polygon(id).and_then(LathePath::from_polygon);
        debug!(path_face = id.raw(), "lathe path picked");
        self.finish(ctx, path)
    }

    fn on_key_down(&mut self, ctx: &mut MainContext, key: Key) -> Result<ToolResponse, DesignerError> {
        match key {
            Key::Escape | Key::Enter => Ok(self.cancel(ctx)),
            Key::Char(_) => Ok(ToolResponse::Continue),
        }
    }

    fn display(&self, ctx: &MainContext, out: &mut DisplayList) {
        for id in self.profile.iter().chain(self.hover.iter()) {
            if let Some(polygon) = ctx.model.polygon(*id) {
                out.polygons.push(polygon.vertices().to_vec());
            }
        }
    }

    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        archive.value(ToolKind::Lathe.name(), &mut self.params)?;
        Ok(())
    }
}
