use brushedit::{
    DesignerError, Element, Model, Polygon, ShelfId, ToolKind, ToolResponse,
    float_types::Real,
    tools::{
        Key,
        merge::merge,
        remove_doubles::{cluster_points, remove_doubles},
        weld::{remap_polygon, weld},
    },
};
use nalgebra::{Point2, Point3, Vector3};
use proptest::prelude::*;

mod support;

use crate::support::{all_valid, approx_eq, committed_area, designer_with, p, pointer_down_z, unit_square};

fn distinct(points: &[Point3<Real>]) -> Vec<Point3<Real>> {
    let mut out: Vec<Point3<Real>> = Vec::new();
    for q in points {
        if !out.iter().any(|r| (q - r).norm() < 1e-9) {
            out.push(*q);
        }
    }
    out
}

/// Two unit squares side by side, the second nudged right by `gap`.
fn nearly_joined(gap: Real) -> Model {
    let mut right = unit_square();
    right.translate(&Vector3::new(1.0 + gap, 0.0, 0.0));
    Model::from_polygons([unit_square(), right])
}

#[test]
fn welding_a_cube_corner_drops_one_vertex() {
    let cube = Model::cube(1.0);
    let plan = weld(&cube, &p(1.0, 1.0, 1.0), &p(0.0, 1.0, 1.0));
    assert_eq!(plan.replaced.len(), 3);

    let mut model = cube.clone();
    plan.apply(&mut model);
    assert_eq!(model.distinct_vertex_count(ShelfId::Committed), 7);
    assert!(model.is_watertight(ShelfId::Committed));
    assert!(all_valid(&model));

    // welding a point onto itself plans nothing
    assert!(weld(&cube, &p(1.0, 1.0, 1.0), &p(1.0, 1.0, 1.0)).is_empty());
}

#[test]
fn bent_faces_are_triangulated() {
    let square = unit_square();
    let pieces = remap_polygon(&square, |v| {
        if (v - p(1.0, 1.0, 0.0)).norm() < 1e-9 { p(1.0, 1.0, 0.5) } else { *v }
    })
    .unwrap();
    assert_eq!(pieces.len(), 2);
    assert!(pieces.iter().all(|t| t.vertices().len() == 3 && t.is_valid()));

    // untouched polygons report no change
    assert!(remap_polygon(&square, |v| *v).is_none());

    // collapsing onto a neighbour leaves a triangle, two collapses nothing
    let triangle = remap_polygon(&square, |v| if v.x > 0.5 && v.y > 0.5 { p(0.0, 1.0, 0.0) } else { *v }).unwrap();
    assert_eq!(triangle.len(), 1);
    assert_eq!(triangle[0].vertices().len(), 3);
    let gone = remap_polygon(&square, |v| if v.x > 0.5 { p(0.0, v.y, 0.0) } else { *v }).unwrap();
    assert!(gone.is_empty());
}

#[test]
fn weld_tool_uses_two_selected_vertices() {
    let mut designer = designer_with(Model::cube(1.0));
    let selection = &mut designer.context_mut().selection;
    selection.add(Element::vertex(p(1.0, 1.0, 1.0), None));
    selection.add(Element::vertex(p(1.0, 1.0, 0.0), None));

    assert_eq!(designer.select_tool(ToolKind::Weld).unwrap(), ToolResponse::Committed);
    assert_eq!(designer.context().model.distinct_vertex_count(ShelfId::Committed), 7);
    designer.undo();
    assert_eq!(designer.context().model.distinct_vertex_count(ShelfId::Committed), 8);
}

#[test]
fn weld_tool_picks_source_then_target() {
    let mut designer = designer_with(Model::cube(1.0));
    assert_eq!(designer.select_tool(ToolKind::Weld).unwrap(), ToolResponse::Continue);

    // escape in the target phase only forgets the source
    designer.pointer_down(&pointer_down_z(1.0, 1.0, Point2::origin())).unwrap();
    assert_eq!(designer.key_down(Key::Escape).unwrap(), ToolResponse::Continue);
    assert_eq!(designer.active_tool(), Some(ToolKind::Weld));

    designer.pointer_down(&pointer_down_z(1.0, 1.0, Point2::origin())).unwrap();
    let response = designer.pointer_down(&pointer_down_z(0.0, 1.0, Point2::origin())).unwrap();
    assert_eq!(response, ToolResponse::Committed);
    let model = &designer.context().model;
    assert_eq!(model.distinct_vertex_count(ShelfId::Committed), 7);
    assert!(model.query_polygons_with_vertex(&p(1.0, 1.0, 1.0)).is_empty());
}

#[test]
fn weld_tool_needs_geometry() {
    let mut designer = designer_with(Model::new());
    assert!(matches!(designer.select_tool(ToolKind::Weld), Err(DesignerError::EmptyModel)));
}

#[test]
fn merge_joins_touching_faces() {
    let model = nearly_joined(0.0);
    let ids = model.polygon_ids(ShelfId::Committed).to_vec();
    let plan = merge(&model, &ids);
    assert_eq!(plan.replaced.len(), 2);
    assert_eq!(plan.added.len(), 1);
    assert!(approx_eq(plan.added[0].area(), 2.0, 1e-9));

    let apart = nearly_joined(0.5);
    let ids = apart.polygon_ids(ShelfId::Committed).to_vec();
    assert!(merge(&apart, &ids).is_empty());
}

#[test]
fn merge_tool_flow() {
    let mut designer = designer_with(nearly_joined(0.0));
    let faces: Vec<Element> = designer
        .context()
        .model
        .polygons(ShelfId::Committed)
        .map(|(id, polygon)| Element::face(id, polygon))
        .collect();

    designer.context_mut().selection.add(faces[0].clone());
    assert!(matches!(
        designer.select_tool(ToolKind::Merge),
        Err(DesignerError::NotEnoughSelection { required: 2, found: 1, .. })
    ));

    designer.context_mut().selection.add(faces[1].clone());
    assert_eq!(designer.select_tool(ToolKind::Merge).unwrap(), ToolResponse::Committed);
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 1);
    assert!(approx_eq(committed_area(&designer.context().model), 2.0, 1e-9));
    // both selected faces are gone
    assert!(designer.context().selection.is_empty());
}

#[test]
fn remove_doubles_closes_a_small_gap() {
    let model = nearly_joined(0.001);
    assert_eq!(model.distinct_vertex_count(ShelfId::Committed), 8);
    let plan = remove_doubles(&model, None, 0.01);
    let mut welded = model.clone();
    plan.apply(&mut welded);
    assert_eq!(welded.distinct_vertex_count(ShelfId::Committed), 6);
    assert!(all_valid(&welded));

    // a second pass finds nothing
    assert!(remove_doubles(&welded, None, 0.01).is_empty());
    // a radius below the gap finds nothing either
    assert!(remove_doubles(&model, None, 0.0005).is_empty());
}

#[test]
fn remove_doubles_tool_commits_or_cancels() {
    let mut designer = designer_with(nearly_joined(0.001));
    assert_eq!(designer.select_tool(ToolKind::RemoveDoubles).unwrap(), ToolResponse::Committed);
    assert_eq!(designer.context().model.distinct_vertex_count(ShelfId::Committed), 6);
    assert_eq!(designer.context().history.undo_len(), 1);

    assert_eq!(designer.select_tool(ToolKind::RemoveDoubles).unwrap(), ToolResponse::Cancelled);
    assert_eq!(designer.context().history.undo_len(), 1);
}

#[test]
fn collapsed_polygons_are_dropped() {
    let sliver = Polygon::new(vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 0.004, 0.0), p(0.0, 0.004, 0.0)]);
    let plan = remove_doubles(&Model::from_polygons([sliver]), None, 0.01);
    assert_eq!(plan.replaced.len(), 1);
    assert!(plan.added.is_empty());
}

proptest! {
    #[test]
    fn clustering_is_idempotent(
        coords in prop::collection::vec((0.0..2.0, 0.0..2.0, 0.0..2.0), 1..24),
        distance in 0.05..0.5,
    ) {
        let points: Vec<Point3<Real>> = coords.iter().map(|(x, y, z)| Point3::new(*x, *y, *z)).collect();
        let once = cluster_points(&points, distance);
        prop_assert_eq!(once.len(), points.len());

        let twice = cluster_points(&once, distance);
        prop_assert_eq!(&twice, &once);

        // representatives end up farther apart than the radius
        let reps = distinct(&once);
        for i in 0..reps.len() {
            for j in (i + 1)..reps.len() {
                prop_assert!((reps[i] - reps[j]).norm() > distance);
            }
        }
    }
}
