//! Interactive editing tools
//!
//! A tool session runs `enter` → pointer/key driven phases → commit or
//! cancel. All speculative geometry goes on the scratch shelf; only
//! [`Transaction::commit`] touches committed polygons.

pub mod archive;
pub mod bevel;
pub mod context;
pub mod history;
pub mod lathe;
pub mod merge;
pub mod remove_doubles;
pub mod slice;
pub mod smoothing;
pub mod transaction;
pub mod weld;

pub use archive::ParamArchive;
pub use context::{Designer, DesignerObject, MainContext};
pub use history::{UndoHistory, UndoService};
pub use transaction::{Transaction, TransactionStatus};

use crate::errors::DesignerError;
use crate::float_types::{Real, parry3d::query::Ray};
use crate::model::{Model, PolygonId, ShelfId};
use crate::polygon::Polygon;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Bevel,
    Lathe,
    Slice,
    Mirror,
    Weld,
    Merge,
    RemoveDoubles,
    SmoothingGroup,
}

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::Bevel,
        ToolKind::Lathe,
        ToolKind::Slice,
        ToolKind::Mirror,
        ToolKind::Weld,
        ToolKind::Merge,
        ToolKind::RemoveDoubles,
        ToolKind::SmoothingGroup,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ToolKind::Bevel => "bevel",
            ToolKind::Lathe => "lathe",
            ToolKind::Slice => "slice",
            ToolKind::Mirror => "mirror",
            ToolKind::Weld => "weld",
            ToolKind::Merge => "merge",
            ToolKind::RemoveDoubles => "remove_doubles",
            ToolKind::SmoothingGroup => "smoothing_group",
        }
    }

    /// A fresh tool of this kind with default parameters.
    pub fn create(self) -> Box<dyn Tool> {
        match self {
            ToolKind::Bevel => Box::new(bevel::BevelTool::default()),
            ToolKind::Lathe => Box::new(lathe::LatheTool::default()),
            ToolKind::Slice => Box::new(slice::SliceTool::slice()),
            ToolKind::Mirror => Box::new(slice::SliceTool::mirror()),
            ToolKind::Weld => Box::new(weld::WeldTool::default()),
            ToolKind::Merge => Box::new(merge::MergeTool::default()),
            ToolKind::RemoveDoubles => Box::new(remove_doubles::RemoveDoublesTool::default()),
            ToolKind::SmoothingGroup => Box::new(smoothing::SmoothingGroupTool::default()),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pointer input, already turned into a model-space ray by the viewport.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub ray: Ray,
    /// Cursor position in screen pixels
    pub screen: Point2<Real>,
    pub shift: bool,
}

impl PointerEvent {
    pub fn new(ray: Ray, screen: Point2<Real>) -> Self {
        PointerEvent {
            ray,
            screen,
            shift: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Char(char),
}

/// What an event did to the tool session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResponse {
    /// Session still running
    Continue,
    /// Changes folded into the model and the undo history
    Committed,
    /// Model restored to the state at `enter`
    Cancelled,
}

impl ToolResponse {
    pub const fn is_finished(self) -> bool {
        !matches!(self, ToolResponse::Continue)
    }
}

/// Preview overlay produced by [`Tool::display`].
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub lines: Vec<(Point3<Real>, Point3<Real>)>,
    pub polygons: Vec<Vec<Point3<Real>>>,
    pub points: Vec<Point3<Real>>,
}

impl DisplayList {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.polygons.is_empty() && self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.polygons.clear();
        self.points.clear();
    }

    /// Outline every scratch polygon of `ctx`'s model.
    pub fn add_scratch(&mut self, ctx: &MainContext) {
        for (_, polygon) in ctx.model.polygons(ShelfId::Scratch) {
            self.polygons.push(polygon.vertices().to_vec());
        }
    }
}

/// Committed polygons to drop and the polygons that take their place.
///
/// Produced by the pure algorithm entry points so they can run without a
/// tool session.
#[derive(Debug, Clone, Default)]
pub struct EditPlan {
    pub replaced: Vec<PolygonId>,
    pub added: Vec<Polygon>,
}

impl EditPlan {
    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty() && self.added.is_empty()
    }

    /// Apply directly to the committed shelf, outside any transaction.
    pub fn apply(self, model: &mut Model) {
        for id in &self.replaced {
            model.remove_polygon(*id);
        }
        for polygon in self.added {
            model.insert(ShelfId::Committed, polygon);
        }
        model.update_mirror();
    }

    /// Hand the plan to a running transaction.
    pub fn stage(self, tx: &mut Transaction, ctx: &mut MainContext) {
        tx.replace(self.replaced);
        tx.stage(ctx, self.added);
    }
}

/// The event surface every editing tool implements.
///
/// Handlers that return [`ToolResponse::Committed`] or
/// [`ToolResponse::Cancelled`] end the session; the [`Designer`] then drops
/// the tool.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Check preconditions and start the session. One-shot tools do their
    /// work here and return `Committed`. On `Err` the model is untouched.
    fn enter(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError>;

    /// End the session, committing whatever is staged.
    fn leave(&mut self, ctx: &mut MainContext) -> Result<ToolResponse, DesignerError>;

    /// Abandon the session and restore the model.
    fn cancel(&mut self, ctx: &mut MainContext) -> ToolResponse;

    fn on_pointer_down(&mut self, _ctx: &mut MainContext, _event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_move(&mut self, _ctx: &mut MainContext, _event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        Ok(ToolResponse::Continue)
    }

    fn on_pointer_up(&mut self, _ctx: &mut MainContext, _event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        Ok(ToolResponse::Continue)
    }

    /// Escape cancels and Enter commits unless a tool says otherwise.
    fn on_key_down(&mut self, ctx: &mut MainContext, key: Key) -> Result<ToolResponse, DesignerError> {
        match key {
            Key::Escape => Ok(self.cancel(ctx)),
            Key::Enter => self.leave(ctx),
            Key::Char(_) => Ok(ToolResponse::Continue),
        }
    }

    fn display(&self, ctx: &MainContext, out: &mut DisplayList);

    /// Save or load the tool's numeric parameters.
    fn serialize(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError>;
}
