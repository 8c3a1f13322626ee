use brushedit::{
    DesignerConfig, DesignerError, Element, Model, ShelfId, Tool, ToolKind, ToolResponse,
    compiler::{MeshCompiler, TriangleCompiler},
    float_types::tolerance,
    tools::{
        DesignerObject, ParamArchive,
        bevel::{BevelParams, BevelTool},
        smoothing::{SmoothingGroupTool, SmoothingParams},
    },
};
use hashbrown::HashSet;

mod support;

use crate::support::{approx_eq, designer_with, p};

fn select_top_front_edge(designer: &mut brushedit::Designer) {
    let edge = Element::edge(p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0), None);
    designer.context_mut().selection.add(edge);
}

#[test]
fn params_survive_a_json_round_trip() {
    let mut saved = BevelTool::with_params(BevelParams {
        delta: 0.3,
        subdivisions: 2,
    });
    let mut archive = ParamArchive::saving();
    saved.serialize(&mut archive).unwrap();
    assert!(archive.get("bevel").is_some());

    let mut archive = ParamArchive::from_json(&archive.to_json().unwrap()).unwrap();
    assert!(archive.is_loading());
    let mut loaded = BevelTool::default();
    loaded.serialize(&mut archive).unwrap();
    assert_eq!(loaded.params, saved.params);
}

#[test]
fn loading_leaves_missing_entries_alone() {
    let mut tool = BevelTool::with_params(BevelParams {
        delta: 0.1,
        subdivisions: 4,
    });
    let mut archive = ParamArchive::from_json(r#"{"lathe": {"caps": false}}"#).unwrap();
    tool.serialize(&mut archive).unwrap();
    assert_eq!(tool.params.subdivisions, 4);

    // fields missing from a stored entry fall back to their defaults
    let mut archive = ParamArchive::from_json(r#"{"bevel": {"delta": 0.5}}"#).unwrap();
    tool.serialize(&mut archive).unwrap();
    assert_eq!(tool.params, BevelParams { delta: 0.5, subdivisions: 0 });
}

#[test]
fn malformed_params_are_reported() {
    let mut tool = SmoothingGroupTool::default();
    let mut archive = ParamArchive::from_json(r#"{"smoothing_group": {"auto": "often"}}"#).unwrap();
    assert!(matches!(tool.serialize(&mut archive), Err(DesignerError::Params(_))));
    assert_eq!(tool.params, SmoothingParams::default());
}

#[test]
fn saved_archive_can_be_read_back_in_place() {
    let mut source = SmoothingGroupTool {
        params: SmoothingParams {
            auto: false,
            angle_threshold: Some(45.0),
            group_name: Some("rim".to_string()),
        },
    };
    let mut archive = ParamArchive::saving();
    source.serialize(&mut archive).unwrap();
    let mut archive = archive.into_loading();
    let mut target = SmoothingGroupTool::default();
    target.serialize(&mut archive).unwrap();
    assert_eq!(target.params, source.params);
}

#[test]
fn every_kind_creates_its_own_tool() {
    let mut names = HashSet::new();
    for kind in ToolKind::ALL {
        assert_eq!(kind.create().kind(), kind);
        assert_eq!(kind.to_string(), kind.name());
        assert!(names.insert(kind.name()));
    }
}

#[test]
fn serialize_needs_a_running_tool() {
    let mut designer = designer_with(Model::cube(1.0));
    let mut archive = ParamArchive::saving();
    assert!(matches!(designer.serialize_tool(&mut archive), Err(DesignerError::NoActiveTool)));
    assert!(matches!(designer.key_down(brushedit::tools::Key::Enter), Err(DesignerError::NoActiveTool)));
}

#[test]
fn config_fills_in_missing_fields() {
    let config = DesignerConfig::from_json(r#"{"pick_radius": 0.1, "max_subdivisions": 4}"#).unwrap();
    assert!(approx_eq(config.pick_radius, 0.1, 1e-12));
    assert_eq!(config.max_subdivisions, 4);
    let defaults = DesignerConfig::default();
    assert_eq!(config.smoothing_angle, defaults.smoothing_angle);
    assert_eq!(config.max_backoff_iterations, 100);
    assert!(DesignerConfig::from_json("[1, 2]").is_err());

    // the tolerance already in effect can always be applied again
    assert_eq!(defaults.tolerance, tolerance());
    assert!(defaults.apply());
}

#[test]
fn subdivision_limit_comes_from_the_config() {
    let mut ctx = brushedit::MainContext::with_config(
        Model::cube(1.0),
        DesignerConfig {
            max_subdivisions: 2,
            ..DesignerConfig::default()
        },
    );
    ctx.selection.add(Element::edge(p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0), None));
    let mut tool = BevelTool::with_params(BevelParams {
        delta: 0.2,
        subdivisions: 0,
    });
    assert_eq!(tool.enter(&mut ctx).unwrap(), ToolResponse::Continue);
    tool.set_subdivisions(&mut ctx, 9);
    assert_eq!(tool.params.subdivisions, 2);
    // two arc points on top of the single-edge bevel
    assert_eq!(ctx.model.polygon_count(ShelfId::Scratch), 7);
    assert_eq!(tool.leave(&mut ctx).unwrap(), ToolResponse::Committed);
    assert_eq!(ctx.model.polygon_count(ShelfId::Committed), 9);
}

#[test]
fn switching_tools_commits_the_running_one() {
    let mut designer = designer_with(Model::cube(1.0));
    select_top_front_edge(&mut designer);
    let bevel = BevelTool::with_params(BevelParams {
        delta: 0.2,
        subdivisions: 0,
    });
    assert_eq!(designer.select_configured_tool(Box::new(bevel)).unwrap(), ToolResponse::Continue);
    assert_eq!(designer.active_tool(), Some(ToolKind::Bevel));

    designer.select_tool(ToolKind::SmoothingGroup).unwrap();
    assert_eq!(designer.active_tool(), None);
    let model = &designer.context().model;
    assert_eq!(model.polygon_count(ShelfId::Committed), 7);
    assert!(!model.smoothing_groups().is_empty());
    assert_eq!(designer.context().history.undo_len(), 2);

    assert_eq!(designer.undo().as_deref(), Some("Smoothing Group"));
    assert_eq!(designer.undo().as_deref(), Some("Bevel"));
    assert_eq!(designer.undo(), None);
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 6);

    assert_eq!(designer.redo().as_deref(), Some("Bevel"));
    assert_eq!(designer.context().model.polygon_count(ShelfId::Committed), 7);
    assert!(designer.context().model.smoothing_groups().is_empty());
    assert!(designer.context().history.can_redo());
}

#[test]
fn a_new_commit_drops_the_redo_branch() {
    let mut designer = designer_with(Model::cube(1.0));
    designer.select_tool(ToolKind::SmoothingGroup).unwrap();
    designer.undo();
    assert!(designer.context().history.can_redo());

    designer.select_tool(ToolKind::SmoothingGroup).unwrap();
    assert!(!designer.context().history.can_redo());
    assert_eq!(designer.redo(), None);
}

#[test]
fn cancelling_restores_the_selection() {
    let mut designer = designer_with(Model::cube(1.0));
    select_top_front_edge(&mut designer);
    designer
        .select_configured_tool(Box::new(BevelTool::with_params(BevelParams {
            delta: 0.2,
            subdivisions: 0,
        })))
        .unwrap();
    assert!(!designer.context().model.is_empty(ShelfId::Scratch));

    assert_eq!(designer.cancel_tool(), ToolResponse::Cancelled);
    assert!(designer.context().model.is_empty(ShelfId::Scratch));
    assert_eq!(designer.context().selection.len(), 1);
    assert!(!designer.context().history.can_undo());
}

#[test]
fn commits_recompile_the_render_mesh() {
    let mut designer = designer_with(Model::cube(1.0));
    assert!(designer.context().mesh.is_none());

    let all_in_one = SmoothingGroupTool {
        params: SmoothingParams {
            angle_threshold: Some(100.0),
            ..SmoothingParams::default()
        },
    };
    designer.select_configured_tool(Box::new(all_in_one)).unwrap();
    let mesh = designer.context().mesh.as_ref().unwrap();
    assert_eq!(mesh.triangle_count(), 12);
    // every corner is shared by three faces of the one group
    let third = 1.0 / (3.0 as brushedit::float_types::Real).sqrt();
    assert!(mesh.normals.iter().all(|n| n.iter().all(|c| approx_eq(c.abs(), third, 1e-9))));
}

#[test]
fn flat_compile_uses_face_normals() {
    let mut compiler = TriangleCompiler::default();
    let mesh = compiler.compile(&DesignerObject::new("cube"), &Model::cube(1.0));
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(compiler.compiled(), 1);
    assert!(mesh.normals.iter().all(|n| approx_eq(n.norm(), 1.0, 1e-9) && n.iter().filter(|c| c.abs() > 0.5).count() == 1));
}
