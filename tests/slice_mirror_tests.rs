use brushedit::{
    DesignerError, Model, ShelfId, ToolKind, ToolResponse,
    tools::{
        Key, ParamArchive,
        slice::{Axis, Keep, SliceParams, SliceTool, slice_outline},
    },
};
use nalgebra::Point2;

mod support;

use crate::support::{approx_eq, committed_area, designer_with, pointer_down_z};

fn slice_at(offset: f64, keep: Keep) -> SliceTool {
    SliceTool::slice().with_params(SliceParams {
        axis: Axis::X,
        offset: offset as _,
        keep,
        fill_facet: true,
    })
}

#[test]
fn outline_follows_the_cut() {
    let cube = Model::cube(1.0);
    let params = SliceParams {
        offset: 0.5,
        ..SliceParams::default()
    };
    let outline = slice_outline(&cube, &params.plane());
    assert_eq!(outline.len(), 4);
    assert!(outline.iter().all(|(a, b)| approx_eq(a.x, 0.5, 1e-9) && approx_eq(b.x, 0.5, 1e-9)));
    // one closed loop: every segment ends where the next begins
    for i in 0..outline.len() {
        let next = &outline[(i + 1) % outline.len()];
        assert!((outline[i].1 - next.0).norm() < 1e-9, "segment {i} does not join the next");
    }

    let missed = SliceParams {
        offset: 3.0,
        ..SliceParams::default()
    };
    assert!(slice_outline(&cube, &missed.plane()).is_empty());
}

#[test]
fn slice_keeps_the_back_half_and_caps_it() {
    let mut designer = designer_with(Model::cube(1.0));
    let response = designer.select_configured_tool(Box::new(slice_at(0.5, Keep::Back))).unwrap();
    assert_eq!(response, ToolResponse::Continue);
    assert_eq!(designer.display().lines.len(), 4);

    assert_eq!(designer.key_down(Key::Enter).unwrap(), ToolResponse::Committed);
    assert_eq!(designer.active_tool(), None);

    let model = &designer.context().model;
    assert_eq!(model.polygon_count(ShelfId::Committed), 6);
    assert!(model.is_watertight(ShelfId::Committed));
    let bounds = model.bounding_box(ShelfId::Committed).unwrap();
    assert!(approx_eq(bounds.maxs.x, 0.5, 1e-9));
    assert!(approx_eq(committed_area(model), 4.0, 1e-9));

    assert_eq!(designer.undo().as_deref(), Some("Slice"));
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 6);
    assert!(approx_eq(committed_area(&designer.context().model), 6.0, 1e-9));
}

#[test]
fn slice_can_keep_the_front_or_both_halves() {
    let mut designer = designer_with(Model::cube(1.0));
    designer.select_configured_tool(Box::new(slice_at(0.25, Keep::Front))).unwrap();
    designer.key_down(Key::Enter).unwrap();
    let bounds = designer.context().model.bounding_box(ShelfId::Committed).unwrap();
    assert!(approx_eq(bounds.mins.x, 0.25, 1e-9));
    assert!(approx_eq(bounds.maxs.x, 1.0, 1e-9));

    let mut designer = designer_with(Model::cube(1.0));
    designer.select_configured_tool(Box::new(slice_at(0.5, Keep::Both))).unwrap();
    designer.key_down(Key::Enter).unwrap();
    let model = &designer.context().model;
    assert_eq!(model.polygon_count(ShelfId::Committed), 12);
    assert!(approx_eq(committed_area(model), 8.0, 1e-9));
}

#[test]
fn slice_that_misses_fails_and_leaves_the_model() {
    let mut designer = designer_with(Model::cube(1.0));
    designer.select_configured_tool(Box::new(slice_at(3.0, Keep::Back))).unwrap();
    assert!(designer.display().lines.is_empty());
    assert!(matches!(designer.key_down(Key::Enter), Err(DesignerError::ClipFailed)));

    assert_eq!(designer.active_tool(), None);
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 6);
    assert!(designer.context().model.is_empty(ShelfId::Scratch));
    assert!(!designer.context().history.can_undo());
}

#[test]
fn axis_keys_and_escape() {
    let mut designer = designer_with(Model::cube(1.0));
    designer.select_configured_tool(Box::new(slice_at(0.5, Keep::Back))).unwrap();
    designer.key_down(Key::Char('z')).unwrap();

    let mut archive = ParamArchive::saving();
    designer.serialize_tool(&mut archive).unwrap();
    let saved: SliceParams = serde_json::from_value(archive.get("slice").unwrap().clone()).unwrap();
    assert_eq!(saved.axis, Axis::Z);
    assert_eq!(designer.display().lines.len(), 4);

    assert_eq!(designer.key_down(Key::Escape).unwrap(), ToolResponse::Cancelled);
    assert_eq!(designer.active_tool(), None);
    assert!(!designer.context().history.can_undo());
}

#[test]
fn dragging_moves_the_plane_along_its_axis() {
    let mut designer = designer_with(Model::cube(1.0));
    designer.select_configured_tool(Box::new(slice_at(0.25, Keep::Back))).unwrap();
    designer.pointer_down(&pointer_down_z(0.5, 0.5, Point2::origin())).unwrap();
    designer.pointer_move(&pointer_down_z(0.8, 0.5, Point2::new(30.0, 0.0))).unwrap();
    designer.pointer_up(&pointer_down_z(0.8, 0.5, Point2::new(30.0, 0.0))).unwrap();

    let lines = designer.display().lines;
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|(a, _)| approx_eq(a.x, 0.55, 1e-9)));

    designer.key_down(Key::Enter).unwrap();
    let bounds = designer.context().model.bounding_box(ShelfId::Committed).unwrap();
    assert!(approx_eq(bounds.maxs.x, 0.55, 1e-9));
}

#[test]
fn mirror_regenerates_the_cut_half() {
    let mut designer = designer_with(Model::cube(1.0));
    let mirror = SliceTool::mirror().with_params(SliceParams {
        axis: Axis::X,
        offset: 0.5,
        keep: Keep::Front,
        fill_facet: true,
    });
    designer.select_configured_tool(Box::new(mirror)).unwrap();
    assert_eq!(designer.active_tool(), Some(ToolKind::Mirror));
    assert_eq!(designer.key_down(Key::Enter).unwrap(), ToolResponse::Committed);

    let model = &designer.context().model;
    // the mirror always keeps the back and never caps the seam
    assert_eq!(model.polygon_count(ShelfId::Committed), 10);
    assert_eq!(model.live_polygons().count(), 5);
    assert!(model.is_watertight(ShelfId::Committed));
    assert!(approx_eq(committed_area(model), 6.0, 1e-9));
    assert!(model.mirror_plane().is_some());

    assert_eq!(designer.undo().as_deref(), Some("Mirror"));
    assert!(designer.context().model.mirror_plane().is_none());
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 6);
}

#[test]
fn mirroring_a_model_behind_the_plane_adds_a_copy() {
    let mut designer = designer_with(Model::cube(1.0));
    let mirror = SliceTool::mirror().with_params(SliceParams {
        offset: 2.0,
        ..SliceParams::default()
    });
    designer.select_configured_tool(Box::new(mirror)).unwrap();
    assert_eq!(designer.key_down(Key::Enter).unwrap(), ToolResponse::Committed);

    let model = &designer.context().model;
    assert_eq!(model.live_polygons().count(), 6);
    assert_eq!(model.polygon_count(ShelfId::Committed), 12);
    let bounds = model.bounding_box(ShelfId::Committed).unwrap();
    assert!(approx_eq(bounds.maxs.x, 4.0, 1e-9));
}

#[test]
fn mirror_of_an_empty_model_is_refused() {
    let mut designer = designer_with(Model::new());
    assert!(matches!(
        designer.select_tool(ToolKind::Mirror),
        Err(DesignerError::EmptyModel)
    ));
}
