//! Splitting the committed shelf by a plane, with optional cap facets

use super::{Model, ShelfId};
use crate::float_types::{Real, chain_tolerance, tolerance};
use crate::plane::Plane;
use crate::polygon::{Polygon, signed_area_2d};
use nalgebra::{Point2, Point3};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipResult {
    Success,
    /// Both sides were produced but the cut outline could not be closed
    /// into cap facets
    SuccessButFillFailed,
    /// Degenerate plane, or the plane leaves one side empty; no output
    ClipFailed,
}

#[derive(Debug, Clone)]
pub struct ClipOutput {
    pub front: Option<Model>,
    pub back: Option<Model>,
    pub result: ClipResult,
}

impl ClipOutput {
    fn failed() -> Self {
        ClipOutput {
            front: None,
            back: None,
            result: ClipResult::ClipFailed,
        }
    }
}

impl Model {
    /// Split every committed polygon by `plane`.
    ///
    /// The model itself is never modified. With `fill_facet`, the outline the
    /// plane cuts through the model is closed with caps: the cap facing along
    /// the plane normal closes the back part, its flip closes the front part.
    #[instrument(skip(self), fields(polygons = self.polygon_count(ShelfId::Committed)))]
    pub fn clip(&self, plane: &Plane, fill_facet: bool) -> ClipOutput {
        if !plane.is_valid() || self.is_empty(ShelfId::Committed) {
            return ClipOutput::failed();
        }

        let mut front = Vec::new();
        let mut back = Vec::new();
        let mut boundary = Vec::new();
        for (_, polygon) in self.polygons(ShelfId::Committed) {
            let split = polygon.clip_by_plane(plane);
            front.extend(split.front);
            back.extend(split.back);
            if !polygon.is_open() {
                boundary.extend(split.boundary);
            }
        }
        debug!(
            front = front.len(),
            back = back.len(),
            boundary = boundary.len(),
            "clip fragments"
        );
        if front.is_empty() || back.is_empty() {
            return ClipOutput::failed();
        }

        let mut result = ClipResult::Success;
        if fill_facet && !boundary.is_empty() {
            match build_caps(&boundary, plane) {
                Some(caps) => {
                    for cap in caps {
                        front.push(cap.flipped());
                        back.push(cap);
                    }
                },
                None => {
                    warn!("clip outline did not close; caps skipped");
                    result = ClipResult::SuccessButFillFailed;
                },
            }
        }

        ClipOutput {
            front: Some(Model::from_polygons(front)),
            back: Some(Model::from_polygons(back)),
            result,
        }
    }
}

/// Join segments end to end into closed loops.
///
/// Segment direction is ignored. Returns `None` when some chain cannot be
/// closed or a loop comes out with fewer than three points.
pub(crate) fn chain_edges(edges: &[(Point3<Real>, Point3<Real>)]) -> Option<Vec<Vec<Point3<Real>>>> {
    let eps2 = chain_tolerance() * chain_tolerance();
    let near = |a: &Point3<Real>, b: &Point3<Real>| (a - b).norm_squared() < eps2;

    let mut pending: Vec<(Point3<Real>, Point3<Real>)> = Vec::new();
    for (a, b) in edges {
        if near(a, b) {
            continue;
        }
        // the same segment reported by two fragments counts once
        let duplicate = pending
            .iter()
            .any(|(p, q)| (near(p, a) && near(q, b)) || (near(p, b) && near(q, a)));
        if !duplicate {
            pending.push((*a, *b));
        }
    }

    let mut loops = Vec::new();
    while let Some((start, mut end)) = pending.pop() {
        let mut ring = vec![start];
        while !near(&end, &start) {
            let index = pending
                .iter()
                .position(|(p, q)| near(p, &end) || near(q, &end))?;
            let (p, q) = pending.swap_remove(index);
            ring.push(end);
            end = if near(&p, &end) { q } else { p };
        }
        if ring.len() < 3 {
            return None;
        }
        loops.push(ring);
    }
    Some(loops)
}

/// Cap facets for the cut outline, facing along `plane`'s normal.
fn build_caps(boundary: &[(Point3<Real>, Point3<Real>)], plane: &Plane) -> Option<Vec<Polygon>> {
    let loops = chain_edges(boundary)?;
    let flat: Vec<Vec<Point2<Real>>> = loops
        .iter()
        .map(|lp| lp.iter().map(|p| plane.to_2d(p)).collect())
        .collect();

    // nesting depth decides outer loops (even) from holes (odd)
    let depth: Vec<usize> = flat
        .iter()
        .enumerate()
        .map(|(i, lp)| {
            flat.iter()
                .enumerate()
                .filter(|(j, other)| *j != i && point_in_loop(&lp[0], other))
                .count()
        })
        .collect();

    let oriented = |lp: &[Point3<Real>], ccw: bool| -> Vec<Point3<Real>> {
        let area = signed_area_2d(&lp.iter().map(|p| plane.to_2d(p)).collect::<Vec<_>>());
        if (area > 0.0) == ccw {
            lp.to_vec()
        } else {
            lp.iter().rev().copied().collect()
        }
    };

    let mut caps = Vec::new();
    for (i, lp) in loops.iter().enumerate() {
        if depth[i] % 2 == 1 {
            continue;
        }
        let holes: Vec<Vec<Point3<Real>>> = loops
            .iter()
            .enumerate()
            .filter(|(j, _)| depth[*j] == depth[i] + 1 && point_in_loop(&flat[*j][0], &flat[i]))
            .map(|(_, h)| oriented(h, false))
            .collect();
        let mut cap = Polygon::with_holes(oriented(lp, true), holes, *plane);
        if !cap.optimize() {
            continue;
        }
        if cap.area() < tolerance() * tolerance() {
            continue;
        }
        caps.push(cap);
    }
    if caps.is_empty() { None } else { Some(caps) }
}

/// Crossing-number containment test in 2-D.
fn point_in_loop(p: &Point2<Real>, lp: &[Point2<Real>]) -> bool {
    let mut inside = false;
    for (a, b) in lp.iter().zip(lp.iter().cycle().skip(1)) {
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}
