use brushedit::{
    DesignerError, Model, Plane, Polygon, ShelfId,
    float_types::tolerance,
    model::{AddOp, DbScope},
};
use nalgebra::Vector3;

mod support;

use crate::support::{approx_eq, committed_area, make_polygon_3d, p, unit_square};

#[test]
fn add_rejects_invalid_polygons() {
    let mut model = Model::new();
    let collinear = make_polygon_3d(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
    assert!(matches!(
        model.add_polygon(collinear, AddOp::Add),
        Err(DesignerError::InvalidPolygon(_))
    ));
    assert!(model.add_polygon(unit_square(), AddOp::Add).is_ok());
    assert_eq!(model.polygon_count(ShelfId::Committed), 1);
}

#[test]
fn union_merges_touching_coplanar_polygons() {
    let mut model = Model::new();
    let first = model.add_polygon(unit_square(), AddOp::Union).unwrap();
    let mut neighbour = unit_square();
    neighbour.translate(&Vector3::new(1.0, 0.0, 0.0));
    let merged = model.add_polygon(neighbour, AddOp::Union).unwrap();

    assert_eq!(merged, first);
    assert_eq!(model.polygon_count(ShelfId::Committed), 1);
    assert!(approx_eq(committed_area(&model), 2.0, 1e-9));

    // a square far away stays separate
    let mut far = unit_square();
    far.translate(&Vector3::new(5.0, 0.0, 0.0));
    model.add_polygon(far, AddOp::Union).unwrap();
    assert_eq!(model.polygon_count(ShelfId::Committed), 2);
}

#[test]
fn shelf_guard_restores_the_active_shelf() {
    let mut model = Model::cube(1.0);
    {
        let mut scratch = model.use_shelf(ShelfId::Scratch);
        assert_eq!(scratch.active_shelf(), ShelfId::Scratch);
        scratch.add_polygon(unit_square(), AddOp::Add).unwrap();
    }
    assert_eq!(model.active_shelf(), ShelfId::Committed);
    assert_eq!(model.polygon_count(ShelfId::Scratch), 1);
    assert_eq!(model.polygon_count(ShelfId::Committed), 6);

    let scratch_id = model.polygon_ids(ShelfId::Scratch)[0];
    model.move_shelf(ShelfId::Scratch, ShelfId::Committed);
    assert!(model.is_empty(ShelfId::Scratch));
    assert_eq!(model.shelf_of(scratch_id), Some(ShelfId::Committed));

    model.clear_shelf(ShelfId::Committed);
    assert!(model.is_empty(ShelfId::Committed));
    assert!(!model.contains(scratch_id));
}

#[test]
fn handles_are_not_reused_across_restore() {
    let mut model = Model::cube(1.0);
    let snapshot = model.clone();
    let removed = model.polygon_ids(ShelfId::Committed)[0];
    model.remove_polygon(removed).unwrap();
    let added = model.add_polygon(unit_square(), AddOp::Add).unwrap();

    model.restore(snapshot);
    assert!(model.contains(removed));
    assert!(!model.contains(added));
    let next = model.add_polygon(unit_square(), AddOp::Add).unwrap();
    assert!(next.raw() > added.raw());
}

#[test]
fn removing_an_unknown_handle_is_a_no_op() {
    let mut model = Model::cube(1.0);
    let id = model.polygon_ids(ShelfId::Committed)[0];
    assert!(model.remove_polygon(id).is_some());
    assert!(model.remove_polygon(id).is_none());
    assert_eq!(model.polygon_count(ShelfId::Committed), 5);
}

#[test]
fn topology_queries_on_a_cube() {
    let model = Model::cube(1.0);
    let (a, b) = (p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0));
    assert_eq!(model.query_polygons_sharing_edge(&a, &b).len(), 2);
    assert_eq!(model.query_polygons_with_vertex(&a).len(), 3);

    // exactly one face runs each direction of a shared edge
    let forward = model.find_directed_edge(&a, &b).unwrap();
    let backward = model.find_directed_edge(&b, &a).unwrap();
    assert_ne!(forward, backward);

    assert_eq!(model.distinct_vertex_count(ShelfId::Committed), 8);
    let bounds = model.bounding_box(ShelfId::Committed).unwrap();
    assert!(approx_eq(bounds.maxs.z, 1.0, 1e-12));
}

#[test]
fn db_indexes_vertices_and_edges() {
    let mut model = Model::cube(1.0);
    model.reset_db(DbScope::ALL);
    let db = model.db();
    assert!(!db.is_stale());
    assert_eq!(db.vertices().len(), 8);
    assert_eq!(db.edges().len(), 12);
    assert_eq!(db.vertex_at(&p(1.0, 1.0, 1.0)).unwrap().polygons.len(), 3);
    assert_eq!(db.edge_between(&p(1.0, 1.0, 1.0), &p(1.0, 1.0, 0.0)).unwrap().polygons.len(), 2);

    let id = model.polygon_ids(ShelfId::Committed)[0];
    model.remove_polygon(id);
    assert!(model.db().is_stale());
}

#[test]
fn watertight_detects_a_missing_face() {
    let mut model = Model::cube(2.0);
    assert!(model.is_watertight(ShelfId::Committed));
    let id = model.polygon_ids(ShelfId::Committed)[0];
    model.remove_polygon(id);
    assert!(!model.is_watertight(ShelfId::Committed));
}

#[test]
fn query_equivalent_polygon_matches_by_value() {
    let model = Model::cube(1.0);
    let (id, face) = model.polygons(ShelfId::Committed).nth(3).unwrap();
    let copy = Polygon::with_plane(face.vertices().to_vec(), face.plane);
    assert_eq!(model.query_equivalent_polygon(&copy), Some(id));
    assert_eq!(model.query_equivalent_polygon(&unit_square()), None);
}

#[test]
fn mirror_regenerates_the_other_half() {
    let mut model = Model::cube(1.0);
    model.set_mirror_plane(Some(Plane::from_normal(Vector3::x(), 0.0)));

    // the face lying in the mirror plane is stripped
    assert_eq!(model.live_polygons().count(), 5);
    assert_eq!(model.polygon_count(ShelfId::Committed), 10);
    assert!(model.is_watertight(ShelfId::Committed));
    assert!(approx_eq(committed_area(&model), 10.0, 1e-9));
    assert_eq!(model.distinct_vertex_count(ShelfId::Committed), 12);

    // the seam is not indexed as an edge
    assert!(model.db().edge_between(&p(0.0, 0.0, 1.0), &p(0.0, 1.0, 1.0)).is_none());

    model.clear_mirror();
    assert!(model.mirror_plane().is_none());
    assert_eq!(model.polygon_count(ShelfId::Committed), 5);
}

#[test]
fn optimize_drops_collapsed_polygons() {
    let mut model = Model::cube(1.0);
    let id = model.polygon_ids(ShelfId::Committed)[0];
    let sliver = model.polygon(id).unwrap().clone();
    let p0 = sliver.vertices()[0];
    model.polygon_mut(id).unwrap().map_vertices(|_| p0);
    assert_eq!(model.optimize(), 1);
    assert_eq!(model.polygon_count(ShelfId::Committed), 5);
}

#[test]
fn smoothing_groups_follow_removed_polygons() {
    let mut model = Model::cube(1.0);
    let ids = model.polygon_ids(ShelfId::Committed).to_vec();
    model.smoothing_groups_mut().add_polygons("sides", ids[2..4].iter().copied());
    model.smoothing_groups_mut().add_polygons("other", [ids[3]]);
    assert_eq!(model.smoothing_groups().group_of(ids[3]), Some("other"));
    assert_eq!(model.smoothing_groups().group("sides").unwrap().len(), 1);

    model.remove_polygon(ids[2]);
    assert!(model.smoothing_groups().group("sides").is_none());
    assert_eq!(model.smoothing_groups().next_free_name("g"), "g0");
}

#[test]
fn near_copies_count_once_across_grid_cells() {
    let tol = tolerance();
    let a = make_polygon_3d(&[[0.49999 * tol, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let b = make_polygon_3d(&[[0.50001 * tol, 0.0, 0.0], [0.0, -1.0, 0.0], [1.0, 0.0, 0.0]]);
    let model = Model::from_polygons([a, b]);
    assert_eq!(model.distinct_vertex_count(ShelfId::Committed), 4);
    assert!(model.db().vertex_at(&p(0.5 * tol, 0.0, 0.0)).is_some());
    assert_eq!(model.db().vertices().len(), 4);
}
