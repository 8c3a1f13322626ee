use brushedit::{
    DesignerError, Element, Model, ShelfId, Tool, ToolKind, ToolResponse,
    float_types::Real,
    model::{AddOp, PolygonId},
    tools::{
        Key,
        bevel::{BevelParams, BevelPhase, BevelSetup, BevelTool, bevel_with_backoff, build_bevel},
    },
};
use nalgebra::{Point3, Vector3};

mod support;

use crate::support::{all_valid, approx_eq, designer_with, face_with_normal, p, screen_event, unit_square};

type Edge = (Point3<Real>, Point3<Real>);

fn top_front_edge() -> Edge {
    (p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0))
}

/// Apply a bevel directly to a copy of `model`.
fn bevelled(model: &Model, edges: &[Edge], delta: Real, subdivisions: usize) -> Model {
    let setup = BevelSetup::new(model, edges);
    let result = build_bevel(model, &setup, delta, subdivisions).unwrap();
    let mut out = model.clone();
    for id in &result.replaced {
        out.remove_polygon(*id);
    }
    for polygon in result.polygons {
        out.add_polygon(polygon, AddOp::Add).unwrap();
    }
    out
}

fn area_of(model: &Model, id: Option<PolygonId>) -> Real {
    model.polygon(id.unwrap()).unwrap().area()
}

#[test]
fn single_cube_edge() {
    let cube = Model::cube(1.0);
    let setup = BevelSetup::new(&cube, &[top_front_edge()]);
    assert_eq!(setup.edges().len(), 1);
    assert_eq!(setup.faces().len(), 4);

    let result = build_bevel(&cube, &setup, 0.2, 0).unwrap();
    assert_eq!(result.report.bridges, 1);
    assert_eq!(result.report.notches, 2);
    assert_eq!(result.report.apexes, 0);

    let model = bevelled(&cube, &[top_front_edge()], 0.2, 0);
    assert_eq!(model.polygon_count(ShelfId::Committed), 7);
    assert!(model.is_watertight(ShelfId::Committed));
    assert!(all_valid(&model));

    assert!(approx_eq(area_of(&model, face_with_normal(&model, Vector3::z())), 0.8, 1e-9));
    assert!(approx_eq(area_of(&model, face_with_normal(&model, -Vector3::y())), 0.8, 1e-9));
    // the side faces lose a corner triangle and become pentagons
    let left = model.polygon(face_with_normal(&model, -Vector3::x()).unwrap()).unwrap();
    assert_eq!(left.vertices().len(), 5);
    assert!(approx_eq(left.area(), 1.0 - 0.02, 1e-9));

    let bridge = model
        .polygon(face_with_normal(&model, Vector3::new(0.0, -1.0, 1.0).normalize()).unwrap())
        .unwrap();
    assert!(approx_eq(bridge.area(), 0.2 * (2.0 as Real).sqrt(), 1e-9));
}

#[test]
fn subdivided_bevel_stays_closed() {
    let cube = Model::cube(1.0);
    let model = bevelled(&cube, &[top_front_edge()], 0.25, 3);
    // four strips replace the single bridge
    assert_eq!(model.polygon_count(ShelfId::Committed), 10);
    assert!(model.is_watertight(ShelfId::Committed));
    assert!(all_valid(&model));

    // the side faces pick up the arc points
    let left = model.polygon(face_with_normal(&model, -Vector3::x()).unwrap()).unwrap();
    assert_eq!(left.vertices().len(), 8);
    // interior arc points lie on the quarter circle around (0, 0.25, 0.75)
    let arc: Vec<_> = left.vertices().iter().filter(|v| v.y < 0.25 && v.z > 0.75).collect();
    assert_eq!(arc.len(), 3);
    for v in arc {
        let r = ((v.y - 0.25).powi(2) + (v.z - 0.75).powi(2)).sqrt();
        assert!(approx_eq(r, 0.25, 1e-9));
    }
}

#[test]
fn three_edges_meeting_at_a_corner_get_an_apex() {
    let cube = Model::cube(1.0);
    let corner = p(1.0, 1.0, 1.0);
    let edges = [
        (corner, p(0.0, 1.0, 1.0)),
        (corner, p(1.0, 0.0, 1.0)),
        (corner, p(1.0, 1.0, 0.0)),
    ];
    let setup = BevelSetup::new(&cube, &edges);
    let result = build_bevel(&cube, &setup, 0.2, 0).unwrap();
    assert_eq!(result.report.bridges, 3);
    assert_eq!(result.report.apexes, 1);
    assert_eq!(result.report.notches, 3);

    let model = bevelled(&cube, &edges, 0.2, 0);
    assert_eq!(model.polygon_count(ShelfId::Committed), 10);
    assert!(model.is_watertight(ShelfId::Committed));
    assert!(all_valid(&model));

    let apex = model
        .polygon(face_with_normal(&model, Vector3::new(1.0, 1.0, 1.0).normalize()).unwrap())
        .unwrap();
    assert_eq!(apex.vertices().len(), 3);
    assert!(!apex.vertices().iter().any(|v| (v - corner).norm() < 1e-9));
}

#[test]
fn zero_width_changes_nothing() {
    let cube = Model::cube(1.0);
    let setup = BevelSetup::new(&cube, &[top_front_edge()]);
    let result = build_bevel(&cube, &setup, 0.0, 2).unwrap();
    assert!(result.polygons.is_empty());
    assert!(result.replaced.is_empty());
}

#[test]
fn oversized_width_backs_off() {
    let cube = Model::cube(1.0);
    let setup = BevelSetup::new(&cube, &[top_front_edge()]);
    assert!(build_bevel(&cube, &setup, 1.5, 0).is_none());

    let result = bevel_with_backoff(&cube, &setup, 1.5, 0.2, 0, 100).unwrap();
    assert!(result.delta < 1.0);
    assert!(result.delta >= 0.2);
    assert_eq!(result.report.bridges, 1);

    // no halving allowed and nothing valid to fall back on
    assert!(bevel_with_backoff(&cube, &setup, 1.5, 1.5, 0, 0).is_none());
}

#[test]
fn boundary_edges_are_skipped() {
    let sheet = Model::from_polygons([unit_square()]);
    let setup = BevelSetup::new(&sheet, &[(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0))]);
    assert!(setup.is_empty());
}

#[test]
fn drag_session_commits_one_undo_step() {
    let mut designer = designer_with(Model::cube(1.0));
    let (a, b) = top_front_edge();
    designer.context_mut().selection.add(Element::edge(a, b, None));
    assert_eq!(designer.select_tool(ToolKind::Bevel).unwrap(), ToolResponse::Continue);

    // spread phase: 20 px at 0.01 per px
    designer.pointer_down(&screen_event(0.0, 0.0)).unwrap();
    designer.pointer_move(&screen_event(20.0, 0.0)).unwrap();
    assert_eq!(designer.context().model.polygon_count(ShelfId::Scratch), 5);
    designer.pointer_up(&screen_event(20.0, 0.0)).unwrap();
    assert_eq!(designer.active_tool(), Some(ToolKind::Bevel));

    // subdivide phase: 40 px at 20 px per step
    designer.pointer_down(&screen_event(0.0, 0.0)).unwrap();
    designer.pointer_move(&screen_event(40.0, 0.0)).unwrap();
    let response = designer.pointer_up(&screen_event(40.0, 0.0)).unwrap();
    assert_eq!(response, ToolResponse::Committed);
    assert_eq!(designer.active_tool(), None);

    let model = &designer.context().model;
    assert_eq!(model.polygon_count(ShelfId::Committed), 9);
    assert!(model.is_empty(ShelfId::Scratch));
    assert!(model.is_watertight(ShelfId::Committed));
    assert_eq!(designer.context().history.undo_len(), 1);

    assert_eq!(designer.undo().as_deref(), Some("Bevel"));
    let restored = &designer.context().model;
    assert_eq!(restored.polygon_count(ShelfId::Committed), 6);
    assert!(restored.is_watertight(ShelfId::Committed));
    // the six original quads come back
    let original = Model::cube(1.0);
    for (_, face) in original.polygons(ShelfId::Committed) {
        assert!(restored.query_equivalent_polygon(face).is_some());
    }
}

#[test]
fn escape_steps_back_a_phase_then_cancels() {
    let mut designer = designer_with(Model::cube(1.0));
    let (a, b) = top_front_edge();
    designer.context_mut().selection.add(Element::edge(a, b, None));
    let ctx = designer.context_mut();
    let mut tool = BevelTool::with_params(BevelParams {
        delta: 0.1,
        subdivisions: 0,
    });

    tool.enter(ctx).unwrap();
    tool.on_pointer_up(ctx, &screen_event(0.0, 0.0)).unwrap();
    assert_eq!(tool.phase(), BevelPhase::Subdivide);
    tool.set_subdivisions(ctx, 2);
    assert_eq!(ctx.model.polygon_count(ShelfId::Scratch), 7);

    assert_eq!(tool.on_key_down(ctx, Key::Escape).unwrap(), ToolResponse::Continue);
    assert_eq!(tool.phase(), BevelPhase::Spread);
    assert_eq!(tool.params.subdivisions, 0);
    assert!(approx_eq(tool.params.delta, 0.1, 1e-12));
    assert_eq!(ctx.model.polygon_count(ShelfId::Scratch), 5);

    assert_eq!(tool.on_key_down(ctx, Key::Escape).unwrap(), ToolResponse::Cancelled);
    assert!(ctx.model.is_empty(ShelfId::Scratch));
    assert_eq!(ctx.model.polygon_count(ShelfId::Committed), 6);
    assert!(!ctx.history.can_undo());
}

#[test]
fn zero_width_enter_leaves_no_undo_step() {
    let mut designer = designer_with(Model::cube(1.0));
    let (a, b) = top_front_edge();
    designer.context_mut().selection.add(Element::edge(a, b, None));
    designer.select_tool(ToolKind::Bevel).unwrap();
    assert_eq!(designer.key_down(Key::Enter).unwrap(), ToolResponse::Cancelled);
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 6);
    assert!(!designer.context().history.can_undo());
}

#[test]
fn enter_needs_shared_edges() {
    let mut designer = designer_with(Model::cube(1.0));
    let err = designer.select_tool(ToolKind::Bevel).unwrap_err();
    assert!(matches!(
        err,
        DesignerError::NotEnoughSelection {
            tool: ToolKind::Bevel,
            found: 0,
            ..
        }
    ));

    let mut designer = designer_with(Model::from_polygons([unit_square()]));
    designer
        .context_mut()
        .selection
        .add(Element::edge(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), None));
    let err = designer.select_tool(ToolKind::Bevel).unwrap_err();
    assert!(err.to_string().contains("shared by two faces"));
    assert_eq!(designer.active_tool(), None);
}
