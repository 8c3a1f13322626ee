//! Edge bevel
//!
//! Every selected edge shared by two faces is replaced by a bridge strip.
//! Faces around the edge endpoints are cut back by `delta`:
//! - both face edges at the endpoint selected: the corner moves to where the
//!   two inward offset lines meet
//! - one selected: the corner slides along the other edge until it is
//!   `delta` away from the selected edge's line
//! - neither selected: the face is notched between its neighbours' slide points
//!
//! Bridge sides follow a rational quadratic arc through the original vertex
//! when subdivided. The hole left around an endpoint where several bridges
//! meet is closed by apex polygons.

use super::{
    DisplayList, Key, MainContext, ParamArchive, PointerEvent, Tool, ToolKind, ToolResponse, Transaction,
};
use crate::errors::DesignerError;
use crate::float_types::{Real, tolerance};
use crate::model::{Model, PointGrid, PolygonId};
use crate::plane::Plane;
use crate::polygon::{Polygon, PolygonFlags, same_point, self_intersection, signed_area_2d};
use hashbrown::HashMap;
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// A selected edge `a`→`b` with the face running `a`→`b` and the face
/// running `b`→`a`.
#[derive(Debug, Clone, Copy)]
pub struct BevelEdge {
    pub a: Point3<Real>,
    pub b: Point3<Real>,
    pub face_a: PolygonId,
    pub face_b: PolygonId,
}

impl BevelEdge {
    fn matches(&self, p: &Point3<Real>, q: &Point3<Real>) -> bool {
        (same_point(&self.a, p) && same_point(&self.b, q)) || (same_point(&self.a, q) && same_point(&self.b, p))
    }
}

/// The part of a bevel that does not depend on `delta`: resolved edges and
/// the faces that will be rebuilt.
#[derive(Debug, Clone, Default)]
pub struct BevelSetup {
    edges: Vec<BevelEdge>,
    endpoints: Vec<Point3<Real>>,
    faces: Vec<PolygonId>,
}

impl BevelSetup {
    /// Resolve `selected` edges against the live committed polygons.
    /// Edges without exactly one face on each side are skipped.
    pub fn new(model: &Model, selected: &[(Point3<Real>, Point3<Real>)]) -> Self {
        let mut edges: Vec<BevelEdge> = Vec::new();
        for (a, b) in selected {
            if edges.iter().any(|e| e.matches(a, b)) {
                continue;
            }
            match (model.find_directed_edge(a, b), model.find_directed_edge(b, a)) {
                (Some(face_a), Some(face_b)) if face_a != face_b => edges.push(BevelEdge {
                    a: *a,
                    b: *b,
                    face_a,
                    face_b,
                }),
                _ => warn!(?a, ?b, "edge is not shared by two faces; skipped"),
            }
        }

        let mut endpoints: Vec<Point3<Real>> = Vec::new();
        for p in edges.iter().flat_map(|e| [e.a, e.b]) {
            if !endpoints.iter().any(|q| same_point(&p, q)) {
                endpoints.push(p);
            }
        }
        let faces = model
            .live_polygons()
            .filter(|(_, p)| !p.is_open() && endpoints.iter().any(|v| p.vertex_index(v).is_some()))
            .map(|(id, _)| id)
            .collect();
        BevelSetup {
            edges,
            endpoints,
            faces,
        }
    }

    pub fn edges(&self) -> &[BevelEdge] {
        &self.edges
    }

    /// Faces replaced by the bevel.
    pub fn faces(&self) -> &[PolygonId] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn is_selected(&self, p: &Point3<Real>, q: &Point3<Real>) -> bool {
        self.edges.iter().any(|e| e.matches(p, q))
    }

    fn is_endpoint(&self, p: &Point3<Real>) -> bool {
        self.endpoints.iter().any(|q| same_point(p, q))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BevelReport {
    pub bridges: usize,
    pub apexes: usize,
    pub notches: usize,
}

#[derive(Debug, Clone)]
pub struct BevelResult {
    pub delta: Real,
    pub subdivisions: usize,
    /// Committed faces the new polygons supersede
    pub replaced: Vec<PolygonId>,
    pub polygons: Vec<Polygon>,
    pub report: BevelReport,
}

impl BevelResult {
    fn unchanged(subdivisions: usize) -> Self {
        BevelResult {
            delta: 0.0,
            subdivisions,
            replaced: Vec::new(),
            polygons: Vec::new(),
            report: BevelReport::default(),
        }
    }
}

/// The points a face contributes at one endpoint, in loop order. Equal
/// unless the face is notched.
#[derive(Debug, Clone, Copy)]
struct Corner {
    p_in: Point3<Real>,
    p_out: Point3<Real>,
}

type FaceCorner = (PolygonId, usize);

struct Spread {
    corners: HashMap<FaceCorner, Corner>,
    notches: usize,
}

/// Arc points of one bridge: `at_a` runs from face A's point to face B's
/// point at `a`, `at_b` likewise at `b`.
struct BridgeArcs {
    at_a: Vec<Point3<Real>>,
    at_b: Vec<Point3<Real>>,
}

fn unit(v: Vector3<Real>) -> Option<(Vector3<Real>, Real)> {
    let len = v.norm();
    (len > tolerance()).then(|| (v / len, len))
}

fn edge_key(ids: &mut PointGrid<usize>, p: &Point3<Real>, q: &Point3<Real>) -> (usize, usize) {
    let (a, b) = (ids.intern(p), ids.intern(q));
    if a <= b { (a, b) } else { (b, a) }
}

/// Points along the rational quadratic arc `p0` → `p2` with control point
/// `control`, both ends included. The weight `sin(β/2)` (β the angle at the
/// control point) makes equal-length legs a circular arc.
pub(crate) fn rational_arc(
    p0: &Point3<Real>,
    control: &Point3<Real>,
    p2: &Point3<Real>,
    interior: usize,
) -> Vec<Point3<Real>> {
    let legs = (p0 - control).try_normalize(Real::EPSILON).zip((p2 - control).try_normalize(Real::EPSILON));
    let weight = match legs {
        Some((u, v)) => (u.dot(&v).clamp(-1.0, 1.0).acos() * 0.5).sin(),
        None => 1.0,
    };
    let steps = interior + 1;
    (0..=steps)
        .map(|i| {
            let t = i as Real / steps as Real;
            let (b0, b1, b2) = ((1.0 - t) * (1.0 - t), 2.0 * weight * t * (1.0 - t), t * t);
            let denom = b0 + b1 + b2;
            Point3::from((p0.coords * b0 + control.coords * b1 + p2.coords * b2) / denom)
        })
        .collect()
}

/// Move the face corners at every endpoint. `None` when some face would
/// turn invalid at this `delta`.
fn spread(model: &Model, setup: &BevelSetup, delta: Real) -> Option<Spread> {
    let tol = tolerance();
    let mut corners: HashMap<FaceCorner, Corner> = HashMap::new();
    // positions named so coincident corners of different faces share keys
    let mut ids: PointGrid<usize> = PointGrid::new();
    // slide point on edge v→w near v, shared by both faces of the edge
    let mut slides: HashMap<(usize, usize), Point3<Real>> = HashMap::new();
    // (consumed length, edge length) per undirected edge
    let mut reach: HashMap<(usize, usize), (Real, Real)> = HashMap::new();
    let mut pending = Vec::new();

    for &id in &setup.faces {
        let Some(face) = model.polygon(id) else {
            continue;
        };
        let n = face.plane.normal;
        let verts = face.vertices();
        let k = verts.len();
        for (i, v) in verts.iter().enumerate() {
            if !setup.is_endpoint(v) {
                continue;
            }
            let prev = verts[(i + k - 1) % k];
            let next = verts[(i + 1) % k];
            let (d_in, len_in) = unit(prev - v)?;
            let (d_out, len_out) = unit(next - v)?;
            let inward_in = n.cross(&(-d_in));
            let inward_out = n.cross(&d_out);

            let mut slide = |w: &Point3<Real>, dir: Vector3<Real>, len: Real, rate: Real| -> Option<Point3<Real>> {
                if rate < tol {
                    return None;
                }
                let key = (ids.intern(v), ids.intern(w));
                if let Some(existing) = slides.get(&key) {
                    return Some(*existing);
                }
                let distance = delta / rate;
                let entry = reach.entry(edge_key(&mut ids, v, w)).or_insert((0.0, len));
                entry.0 += distance;
                if entry.0 >= entry.1 - tol {
                    return None;
                }
                let point = v + dir * distance;
                slides.insert(key, point);
                Some(point)
            };

            let point = match (setup.is_selected(&prev, v), setup.is_selected(v, &next)) {
                (true, true) => {
                    let (along_out, along_in) = (d_out.dot(&inward_in), d_in.dot(&inward_out));
                    if along_out < tol || along_in < tol {
                        return None;
                    }
                    v + d_out * (delta / along_out) + d_in * (delta / along_in)
                },
                (true, false) => slide(&next, d_out, len_out, d_out.dot(&inward_in))?,
                (false, true) => slide(&prev, d_in, len_in, d_in.dot(&inward_out))?,
                (false, false) => {
                    pending.push(((id, i), *v, prev, next));
                    continue;
                },
            };
            corners.insert(
                (id, i),
                Corner {
                    p_in: point,
                    p_out: point,
                },
            );
        }
    }

    let mut notches = 0;
    for (key, v, prev, next) in pending {
        let (iv, iprev, inext) = (ids.intern(&v), ids.intern(&prev), ids.intern(&next));
        let p_in = slides.get(&(iv, iprev)).copied().unwrap_or(v);
        let p_out = slides.get(&(iv, inext)).copied().unwrap_or(v);
        if !same_point(&p_in, &p_out) {
            notches += 1;
        }
        corners.insert(key, Corner { p_in, p_out });
    }
    Some(Spread { corners, notches })
}

/// A closed loop is usable in `frame`: counter-clockwise with area, simple,
/// and without spikes doubling back on themselves.
fn loop_is_sound(points: &[Point3<Real>], frame: &Plane) -> bool {
    if points.len() < 3 {
        return false;
    }
    let flat: Vec<Point2<Real>> = points.iter().map(|p| frame.to_2d(p)).collect();
    if signed_area_2d(&flat) <= tolerance() * tolerance() || self_intersection(&flat).is_some() {
        return false;
    }
    let n = flat.len();
    (0..n).all(|i| {
        let a = flat[(i + n - 1) % n];
        let b = flat[i];
        let c = flat[(i + 1) % n];
        let (u, w) = (b - a, c - b);
        let cross = u.x * w.y - u.y * w.x;
        !(cross.abs() <= tolerance() * u.norm().max(w.norm()) && u.dot(&w) < 0.0)
    })
}

fn dedup_cyclic<T>(items: Vec<(Point3<Real>, T)>) -> Vec<(Point3<Real>, T)> {
    let mut out: Vec<(Point3<Real>, T)> = Vec::with_capacity(items.len());
    for item in items {
        if out.last().is_none_or(|last| !same_point(&last.0, &item.0)) {
            out.push(item);
        }
    }
    while out.len() > 1 && same_point(&out[0].0, &out[out.len() - 1].0) {
        out.pop();
    }
    out
}

struct Builder<'a> {
    model: &'a Model,
    setup: &'a BevelSetup,
    spread: Spread,
    arcs: Vec<BridgeArcs>,
}

impl Builder<'_> {
    fn corner(&self, face: PolygonId, v: &Point3<Real>) -> Option<Corner> {
        let index = self.model.polygon(face)?.vertex_index(v)?;
        self.spread.corners.get(&(face, index)).copied()
    }

    /// The arc at endpoint `v` of the selected edge `v`-`w`, oriented to start at `from`.
    fn arc_from(&self, v: &Point3<Real>, w: &Point3<Real>, from: &Point3<Real>) -> Option<Vec<Point3<Real>>> {
        let (edge, arcs) = self.setup.edges.iter().zip(&self.arcs).find(|(e, _)| e.matches(v, w))?;
        let arc = if same_point(&edge.a, v) { &arcs.at_a } else { &arcs.at_b };
        if same_point(&arc[0], from) {
            Some(arc.clone())
        } else {
            Some(arc.iter().rev().copied().collect())
        }
    }

    /// A notch whose two points are the ends of one bridge side takes over
    /// that side's arc points, from `p_in` to `p_out`.
    fn absorbed_arc(&self, v: &Point3<Real>, corner: &Corner) -> Vec<Point3<Real>> {
        for (edge, arcs) in self.setup.edges.iter().zip(&self.arcs) {
            let arc = if same_point(&edge.a, v) {
                &arcs.at_a
            } else if same_point(&edge.b, v) {
                &arcs.at_b
            } else {
                continue;
            };
            let (first, last) = (&arc[0], &arc[arc.len() - 1]);
            let interior = &arc[1..arc.len() - 1];
            if same_point(first, &corner.p_in) && same_point(last, &corner.p_out) {
                return interior.to_vec();
            }
            if same_point(last, &corner.p_in) && same_point(first, &corner.p_out) {
                return interior.iter().rev().copied().collect();
            }
        }
        Vec::new()
    }

    /// Points face `id` has at its vertex `index` after the bevel.
    fn face_points(&self, id: PolygonId, index: usize, v: &Point3<Real>) -> Vec<Point3<Real>> {
        match self.spread.corners.get(&(id, index)) {
            None => vec![*v],
            Some(c) if same_point(&c.p_in, &c.p_out) => vec![c.p_in],
            Some(c) => {
                let mut points = vec![c.p_in];
                points.extend(self.absorbed_arc(v, c));
                points.push(c.p_out);
                points
            },
        }
    }

    fn rebuilt_faces(&self) -> Option<Vec<Polygon>> {
        let mut out = Vec::with_capacity(self.setup.faces.len());
        for &id in &self.setup.faces {
            let face = self.model.polygon(id)?;
            let points: Vec<(Point3<Real>, ())> = face
                .vertices()
                .iter()
                .enumerate()
                .flat_map(|(i, v)| self.face_points(id, i, v))
                .map(|p| (p, ()))
                .collect();
            let points: Vec<Point3<Real>> = dedup_cyclic(points).into_iter().map(|(p, _)| p).collect();
            if !loop_is_sound(&points, &face.plane) {
                debug!(face = id.raw(), "bevelled face is unsound");
                return None;
            }
            out.push(face.derive(points, face.holes().to_vec()));
        }
        Some(out)
    }

    fn bridges(&self) -> (Vec<Polygon>, usize) {
        let mut out = Vec::new();
        let mut count = 0;
        for (edge, arcs) in self.setup.edges.iter().zip(&self.arcs) {
            let Some(template) = self.model.polygon(edge.face_a) else {
                continue;
            };
            let before = out.len();
            for k in 0..arcs.at_a.len() - 1 {
                let quad = vec![arcs.at_b[k], arcs.at_a[k], arcs.at_a[k + 1], arcs.at_b[k + 1]];
                out.extend(planar_pieces(template, quad));
            }
            if out.len() > before {
                count += 1;
            }
        }
        (out, count)
    }

    /// Walk the faces around endpoint `v` crossing each face's outgoing
    /// edge, collecting the hole boundary. Arc points carry their side.
    fn hole_ring(&self, v: &Point3<Real>) -> Option<Vec<(Point3<Real>, Option<usize>)>> {
        let around: Vec<FaceCorner> = self
            .setup
            .faces
            .iter()
            .filter_map(|id| self.model.polygon(*id)?.vertex_index(v).map(|i| (*id, i)))
            .collect();
        let start = *around.first()?;
        let mut current = start;
        let mut ring = Vec::new();
        let mut side = 0;
        for _ in 0..around.len() {
            let (id, i) = current;
            let verts = self.model.polygon(id)?.vertices();
            let w = verts[(i + 1) % verts.len()];
            ring.extend(self.face_points(id, i, v).into_iter().map(|p| (p, None)));

            let next = around.iter().copied().find(|(g, j)| {
                *g != id
                    && self.model.polygon(*g).is_some_and(|p| {
                        let gv = p.vertices();
                        same_point(&gv[(j + gv.len() - 1) % gv.len()], &w)
                    })
            })?;
            if self.setup.is_selected(v, &w) {
                let from = self.spread.corners.get(&current)?.p_out;
                let arc = self.arc_from(v, &w, &from)?;
                ring.extend(arc[1..arc.len() - 1].iter().map(|p| (*p, Some(side))));
                side += 1;
            }
            if next == start {
                return Some(ring);
            }
            current = next;
        }
        None
    }

    fn apexes(&self, subdivisions: usize) -> (Vec<Polygon>, usize) {
        let mut out = Vec::new();
        let mut count = 0;
        for v in &self.setup.endpoints {
            let Some(ring) = self.hole_ring(v) else {
                warn!(?v, "faces around bevel endpoint do not close; no apex");
                continue;
            };
            let ring = dedup_cyclic(ring);
            if ring.len() < 3 {
                continue;
            }
            let points: Vec<Point3<Real>> = ring.iter().map(|(p, _)| *p).collect();
            let Some(plane) = Plane::fit(&points) else {
                continue;
            };
            let probe = Polygon::with_plane(points.clone(), plane);
            if probe.area() <= tolerance() * tolerance() {
                continue;
            }
            let Some(template) = self.setup.faces.iter().find_map(|id| {
                self.model.polygon(*id).filter(|p| p.vertex_index(v).is_some())
            }) else {
                continue;
            };
            let outward: Vector3<Real> = self
                .setup
                .faces
                .iter()
                .filter_map(|id| self.model.polygon(*id))
                .filter(|p| p.vertex_index(v).is_some())
                .map(|p| p.plane.normal)
                .sum();
            let pieces = apex_pieces(&ring, subdivisions);
            let before = out.len();
            for piece in pieces {
                out.extend(oriented(template, piece, &outward));
            }
            if out.len() > before {
                count += 1;
            }
        }
        (out, count)
    }
}

/// Split a hole ring into apex loops.
///
/// Unsubdivided holes stay one loop. Odd subdivision counts use an inner
/// loop through the middle arc point of every side plus a fan at each
/// corner; even counts fan around the centroid.
fn apex_pieces(ring: &[(Point3<Real>, Option<usize>)], subdivisions: usize) -> Vec<Vec<Point3<Real>>> {
    let points: Vec<Point3<Real>> = ring.iter().map(|(p, _)| *p).collect();
    let sides = ring.iter().filter_map(|(_, s)| *s).max().map_or(0, |s| s + 1);

    if subdivisions == 0 {
        return vec![points];
    }
    if subdivisions % 2 == 1 && sides >= 3 {
        let middle = (subdivisions - 1) / 2;
        let mut mids: Vec<usize> = Vec::new();
        for side in 0..sides {
            let members: Vec<usize> = (0..ring.len()).filter(|i| ring[*i].1 == Some(side)).collect();
            if members.len() != subdivisions {
                return centre_fan(&points);
            }
            mids.push(members[middle]);
        }
        let mut pieces = vec![mids.iter().map(|i| points[*i]).collect::<Vec<_>>()];
        for (s, &from) in mids.iter().enumerate() {
            let to = mids[(s + 1) % mids.len()];
            let mut path = vec![from];
            let mut i = from;
            while i != to {
                i = (i + 1) % points.len();
                path.push(i);
            }
            // fan from the first face point on the path
            let pivot = path
                .iter()
                .position(|i| ring[*i].1.is_none())
                .unwrap_or(path.len() / 2);
            let m = path.len();
            for k in 1..m - 1 {
                let (a, b) = ((pivot + k) % m, (pivot + k + 1) % m);
                pieces.push(vec![points[path[pivot]], points[path[a]], points[path[b]]]);
            }
        }
        return pieces;
    }
    centre_fan(&points)
}

fn centre_fan(points: &[Point3<Real>]) -> Vec<Vec<Point3<Real>>> {
    let centre = Point3::from(points.iter().map(|p| p.coords).sum::<Vector3<Real>>() / points.len() as Real);
    (0..points.len())
        .map(|i| vec![centre, points[i], points[(i + 1) % points.len()]])
        .collect()
}

/// `points` as polygons on their own fitted plane, facing along `outward`.
fn oriented(template: &Polygon, mut points: Vec<Point3<Real>>, outward: &Vector3<Real>) -> Vec<Polygon> {
    if let Some(plane) = Plane::fit(&points) {
        if plane.normal.dot(outward) < 0.0 {
            points.reverse();
        }
    }
    planar_pieces(template, points)
}

/// One polygon when `points` are coplanar, triangles otherwise. Degenerate
/// pieces are dropped.
fn planar_pieces(template: &Polygon, points: Vec<Point3<Real>>) -> Vec<Polygon> {
    let mut polygon = template.derive(points, Vec::new());
    polygon.flags = PolygonFlags::empty();
    if !polygon.refit_plane() {
        return Vec::new();
    }
    if polygon.is_planar() {
        return if polygon.is_valid() { vec![polygon] } else { Vec::new() };
    }
    polygon
        .triangulate()
        .into_iter()
        .filter_map(|[a, b, c]| {
            let mut t = template.derive(vec![a, b, c], Vec::new());
            t.flags = PolygonFlags::empty();
            (t.refit_plane() && t.is_valid()).then_some(t)
        })
        .collect()
}

/// Bevel `setup`'s edges by `delta` with `subdivisions` extra rings per
/// bridge. `None` when the spread is invalid at this `delta`; a `delta`
/// within tolerance yields an empty result.
#[instrument(skip(model, setup), fields(edges = setup.edges.len()))]
pub fn build_bevel(model: &Model, setup: &BevelSetup, delta: Real, subdivisions: usize) -> Option<BevelResult> {
    if delta <= tolerance() || setup.is_empty() {
        return Some(BevelResult::unchanged(subdivisions));
    }
    let spread = spread(model, setup, delta)?;
    let mut builder = Builder {
        model,
        setup,
        spread,
        arcs: Vec::new(),
    };

    let mut arcs = Vec::with_capacity(setup.edges.len());
    for edge in &setup.edges {
        let ends = (
            builder.corner(edge.face_a, &edge.a),
            builder.corner(edge.face_a, &edge.b),
            builder.corner(edge.face_b, &edge.a),
            builder.corner(edge.face_b, &edge.b),
        );
        let (Some(aa), Some(ab), Some(ba), Some(bb)) = ends else {
            warn!("bevel edge endpoint missing from its faces");
            return None;
        };
        arcs.push(BridgeArcs {
            at_a: rational_arc(&aa.p_out, &edge.a, &ba.p_in, subdivisions),
            at_b: rational_arc(&ab.p_in, &edge.b, &bb.p_out, subdivisions),
        });
    }
    builder.arcs = arcs;

    let mut polygons = builder.rebuilt_faces()?;
    let (bridges, bridge_count) = builder.bridges();
    let (apexes, apex_count) = builder.apexes(subdivisions);
    polygons.extend(bridges);
    polygons.extend(apexes);

    let report = BevelReport {
        bridges: bridge_count,
        apexes: apex_count,
        notches: builder.spread.notches,
    };
    debug!(?report, polygons = polygons.len(), "bevel built");
    Some(BevelResult {
        delta,
        subdivisions,
        replaced: setup.faces.clone(),
        polygons,
        report,
    })
}

/// [`build_bevel`] at `requested`, halving back toward `last_valid` while
/// the spread is invalid, at most `max_iterations` times.
pub fn bevel_with_backoff(
    model: &Model,
    setup: &BevelSetup,
    requested: Real,
    last_valid: Real,
    subdivisions: usize,
    max_iterations: usize,
) -> Option<BevelResult> {
    let mut delta = requested;
    for iteration in 0..=max_iterations {
        if let Some(result) = build_bevel(model, setup, delta, subdivisions) {
            if iteration > 0 {
                debug!(requested, applied = delta, iteration, "bevel backed off");
            }
            return Some(result);
        }
        delta = (delta + last_valid) * 0.5;
    }
    warn!(requested, last_valid, "bevel back-off exhausted");
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BevelParams {
    pub delta: Real,
    pub subdivisions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BevelPhase {
    #[default]
    Spread,
    Subdivide,
}

/// Snapshot restored by Escape in the phase after it was taken.
#[derive(Debug, Clone, Copy)]
struct PhaseState {
    phase: BevelPhase,
    params: BevelParams,
}

#[derive(Debug, Default)]
pub struct BevelTool {
    pub params: BevelParams,
    phase: BevelPhase,
    setup: BevelSetup,
    last_valid: Real,
    report: BevelReport,
    history: Vec<PhaseState>,
    drag: Option<(Point2<Real>, BevelParams)>,
    tx: Option<Transaction>,
}

impl BevelTool {
    pub fn with_params(params: BevelParams) -> Self {
        BevelTool {
            params,
            ..Default::default()
        }
    }

    pub const fn phase(&self) -> BevelPhase {
        self.phase
    }

    pub const fn report(&self) -> BevelReport {
        self.report
    }

    /// Apply a new width, backing off while invalid. Returns the width in effect.
    pub fn set_delta(&mut self, ctx: &mut MainContext, delta: Real) -> Real {
        let requested = delta.max(0.0);
        match bevel_with_backoff(
            &ctx.model,
            &self.setup,
            requested,
            self.last_valid,
            self.params.subdivisions,
            ctx.config.max_backoff_iterations,
        ) {
            Some(result) => {
                self.params.delta = result.delta;
                self.last_valid = result.delta;
                self.stage(ctx, result);
            },
            None => self.params.delta = self.last_valid,
        }
        self.params.delta
    }

    pub fn set_subdivisions(&mut self, ctx: &mut MainContext, subdivisions: usize) {
        self.params.subdivisions = subdivisions.min(ctx.config.max_subdivisions);
        if let Some(result) = build_bevel(&ctx.model, &self.setup, self.last_valid, self.params.subdivisions) {
            self.stage(ctx, result);
        }
    }

    fn stage(&mut self, ctx: &mut MainContext, result: BevelResult) {
        let Some(tx) = self.tx.as_mut() else {
            return;
        };
        self.report = result.report;
        if result.polygons.is_empty() {
            tx.reset(ctx);
            return;
        }
        tx.set_replaced(result.replaced);
        tx.stage(ctx, result.polygons);
    }

    fn restage(&mut self, ctx: &mut MainContext) {
        let params = self.params;
        self.last_valid = 0.0;
        self.set_delta(ctx, params.delta);
        self.set_subdivisions(ctx, params.subdivisions);
    }
}

impl Tool for BevelTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Bevel
    }

    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        let selected = ctx.selection.edges();
        if selected.is_empty() {
            return Err(DesignerError::NotEnoughSelection {
                tool: ToolKind::Bevel,
                what: "edges",
                required: 1,
                found: 0,
            });
        }
        self.setup = BevelSetup::new(&ctx.model, &selected);
        if self.setup.is_empty() {
            return Err(DesignerError::NotEnoughSelection {
                tool: ToolKind::Bevel,
                what: "edges shared by two faces",
                required: 1,
                found: 0,
            });
        }
        self.tx = Some(Transaction::begin(ctx, "Bevel"));
        self.phase = BevelPhase::Spread;
        self.history.clear();
        self.restage(ctx);
        Ok(ToolResponse::Continue)
    }

    /// Commit; a width within tolerance leaves the model unchanged.
    fn leave(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError> {
        let Some(tx) = self.tx.take() else {
            return Ok(ToolResponse::Cancelled);
        };
        if self.params.delta <= tolerance() {
            return Ok(tx.cancel(ctx));
        }
        Ok(tx.commit(ctx))
    }

    fn cancel(&mut self, ctx: &mut MainContext) -> ToolResponse {
        self.history.clear();
        match self.tx.take() {
            Some(tx) => tx.cancel(ctx),
            None => ToolResponse::Cancelled,
        }
    }

    fn on_pointer_down(&mut self, _ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.drag = Some((event.screen, self.params));
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_move(&mut self, ctx: &mut MainContext, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        let Some((origin, base)) = self.drag else {
            return Ok(ToolResponse::Continue);
        };
        let dx = event.screen.x - origin.x;
        match self.phase {
            BevelPhase::Spread => {
                self.set_delta(ctx, base.delta + dx * ctx.config.bevel_drag_scale);
            },
            BevelPhase::Subdivide => {
                let steps = (dx / ctx.config.subdivision_drag_pixels.max(1.0)).floor();
                let n = (base.subdivisions as Real + steps).max(0.0) as usize;
                if n != self.params.subdivisions {
                    self.set_subdivisions(ctx, n);
                }
            },
        }
        Ok(ToolResponse::Continue)
    }

    /// Releasing the pointer ends the current phase.
    fn on_pointer_up(&mut self, ctx: &mut MainContext, _event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.drag = None;
        match self.phase {
            BevelPhase::Spread => {
                self.history.push(PhaseState {
                    phase: self.phase,
                    params: self.params,
                });
                self.phase = BevelPhase::Subdivide;
                Ok(ToolResponse::Continue)
            },
            BevelPhase::Subdivide => self.leave(ctx),
        }
    }

    /// Escape returns to the state at the start of the previous phase;
    /// in the first phase it cancels.
    fn on_key_down(&mut self, ctx: &mut MainContext, key: Key) -> Result<ToolResponse, DesignerError> {
        match key {
            Key::Escape => match self.history.pop() {
                Some(state) => {
                    self.phase = state.phase;
                    self.params = BevelParams {
                        subdivisions: 0,
                        ..state.params
                    };
                    self.drag = None;
                    self.restage(ctx);
                    Ok(ToolResponse::Continue)
                },
                None => Ok(self.cancel(ctx)),
            },
            Key::Enter => self.leave(ctx),
            Key::Char(_) => Ok(ToolResponse::Continue),
        }
    }

    fn display(&self, ctx: &MainContext, out: &mut DisplayList) {
        out.add_scratch(ctx);
        out.lines.extend(self.setup.edges.iter().map(|e| (e.a, e.b)));
    }

    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        archive.value(ToolKind::Bevel.name(), &mut self.params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_angle_arc_is_circular() {
        let delta = 0.2;
        let p0 = Point3::new(0.0, delta, 1.0);
        let control = Point3::new(0.0, 0.0, 1.0);
        let p2 = Point3::new(0.0, 0.0, 1.0 - delta);
        let centre = Point3::new(0.0, delta, 1.0 - delta);
        let arc = rational_arc(&p0, &control, &p2, 5);
        assert_eq!(arc.len(), 7);
        assert!((arc[0] - p0).norm() < 1e-12);
        assert!((arc[6] - p2).norm() < 1e-12);
        for p in &arc {
            assert!(((p - centre).norm() - delta).abs() < 1e-9);
        }
    }

    #[test]
    fn spike_makes_loop_unsound() {
        let frame = Plane::default();
        let spike = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert!(!loop_is_sound(&spike, &frame));
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(loop_is_sound(&square, &frame));
    }

    #[test]
    fn odd_subdivision_apex_uses_inner_loop() {
        // three sides of one interior point each around a triangular hole
        let p = |x: Real, y: Real| Point3::new(x, y, 0.0);
        let ring = vec![
            (p(0.0, 0.0), None),
            (p(0.5, -0.1), Some(0)),
            (p(1.0, 0.0), None),
            (p(0.6, 0.5), Some(1)),
            (p(0.5, 1.0), None),
            (p(0.2, 0.5), Some(2)),
        ];
        let pieces = apex_pieces(&ring, 1);
        assert_eq!(pieces[0].len(), 3);
        // inner triangle plus one triangle per corner
        assert_eq!(pieces.len(), 4);
    }
}
