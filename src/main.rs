// main.rs
//
// Walk a unit cube through a few editing sessions and print what changed.
// Set RUST_LOG=debug to see the tool and transaction logs.

use brushedit::model::ShelfId;
use brushedit::selection::Element;
use brushedit::tools::bevel::{BevelParams, BevelTool};
use brushedit::tools::slice::{Axis, SliceParams, SliceTool};
use brushedit::tools::{Key, ParamArchive};
use brushedit::{Designer, MainContext, Model, ToolKind};
use nalgebra::Point3;
use tracing_subscriber::EnvFilter;

fn summary(label: &str, model: &Model) {
    let area: f64 = model
        .polygons(ShelfId::Committed)
        .map(|(_, p)| p.area() as f64)
        .sum();
    println!(
        "{label}: {} polygons, {} vertices, area {area:.4}, watertight {}",
        model.polygon_count(ShelfId::Committed),
        model.distinct_vertex_count(ShelfId::Committed),
        model.is_watertight(ShelfId::Committed),
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut designer = Designer::new(MainContext::new(Model::cube(1.0)));
    summary("cube", &designer.context().model);

    // 1) bevel one top edge
    let a = Point3::new(0.0, 0.0, 1.0);
    let b = Point3::new(1.0, 0.0, 1.0);
    designer.context_mut().selection.add(Element::edge(a, b, None));
    designer.select_configured_tool(Box::new(BevelTool::with_params(BevelParams {
        delta: 0.2,
        subdivisions: 3,
    })))?;
    let mut archive = ParamArchive::saving();
    designer.serialize_tool(&mut archive)?;
    println!("bevel params: {}", archive.to_json()?);
    designer.key_down(Key::Enter)?;
    summary("bevelled", &designer.context().model);

    // 2) undo it
    if let Some(step) = designer.undo() {
        println!("undid {step}");
    }
    summary("restored", &designer.context().model);

    // 3) mirror across x = 0.5 and auto-smooth
    designer.context_mut().selection.clear();
    let mirror = SliceTool::mirror().with_params(SliceParams {
        axis: Axis::X,
        offset: 0.5,
        fill_facet: false,
        ..SliceParams::default()
    });
    designer.select_configured_tool(Box::new(mirror))?;
    designer.key_down(Key::Enter)?;
    summary("mirrored", &designer.context().model);

    designer.select_tool(ToolKind::SmoothingGroup)?;
    let groups = designer.context().model.smoothing_groups().len();
    println!("smoothing groups: {groups}");

    Ok(())
}
