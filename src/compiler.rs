//! Render-mesh compilation after every commit

use crate::float_types::Real;
use crate::model::{Model, PointGrid, PolygonId, ShelfId};
use crate::tools::DesignerObject;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

/// Flat triangle soup with per-corner normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMesh {
    pub positions: Vec<Point3<Real>>,
    pub normals: Vec<Vector3<Real>>,
    pub indices: Vec<u32>,
}

impl RenderMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Hook run after every committed edit.
pub trait MeshCompiler {
    fn compile(&mut self, object: &DesignerObject, model: &Model) -> RenderMesh;
}

/// Triangulates every visible committed polygon.
///
/// Corners of polygons in a smoothing group get the area-weighted average
/// normal of the group's polygons meeting at that position; all other
/// corners use the face normal.
#[derive(Debug, Clone, Default)]
pub struct TriangleCompiler {
    compiled: usize,
}

impl TriangleCompiler {
    /// Number of compiles run so far.
    pub const fn compiled(&self) -> usize {
        self.compiled
    }
}

impl MeshCompiler for TriangleCompiler {
    fn compile(&mut self, _object: &DesignerObject, model: &Model) -> RenderMesh {
        self.compiled += 1;
        let groups = model.smoothing_groups();

        // group name -> position -> accumulated normal
        let mut smooth: HashMap<&str, PointGrid<Vector3<Real>>> = HashMap::new();
        let group_of = |id: PolygonId| groups.group_of(id);
        for (id, polygon) in model.polygons(ShelfId::Committed) {
            if let Some(group) = group_of(id) {
                let weighted = polygon.normal() * polygon.area().max(Real::EPSILON);
                let corners = smooth.entry(group).or_default();
                for v in polygon.vertices() {
                    *corners.get_or_insert_with(v, Vector3::zeros) += weighted;
                }
            }
        }

        let mut mesh = RenderMesh::default();
        for (id, polygon) in model.polygons(ShelfId::Committed) {
            if polygon.is_hidden() || polygon.is_open() {
                continue;
            }
            let face_normal = polygon.normal();
            let group = group_of(id);
            for triangle in polygon.triangulate() {
                for corner in triangle {
                    let normal = group
                        .and_then(|g| smooth.get(g)?.get(&corner))
                        .and_then(|n| n.try_normalize(Real::EPSILON))
                        .unwrap_or(face_normal);
                    mesh.indices.push(mesh.positions.len() as u32);
                    mesh.positions.push(corner);
                    mesh.normals.push(normal);
                }
            }
        }
        mesh
    }
}
