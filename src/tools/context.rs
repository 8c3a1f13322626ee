//! The explicit editing context and the designer that drives tools over it

use super::{DisplayList, Key, ParamArchive, PointerEvent, Tool, ToolKind, ToolResponse, UndoHistory};
use crate::compiler::{MeshCompiler, RenderMesh, TriangleCompiler};
use crate::config::DesignerConfig;
use crate::errors::DesignerError;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::model::{DbScope, Model, ShelfId};
use crate::selection::ElementManager;
use nalgebra::Matrix4;
use tracing::{debug, info, warn};

/// The scene object that owns the edited model.
#[derive(Debug, Clone)]
pub struct DesignerObject {
    pub name: String,
    pub world_tm: Matrix4<Real>,
}

impl Default for DesignerObject {
    fn default() -> Self {
        DesignerObject {
            name: "brush".to_string(),
            world_tm: Matrix4::identity(),
        }
    }
}

impl DesignerObject {
    pub fn new(name: impl Into<String>) -> Self {
        DesignerObject {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Bounding box of the committed geometry in object space.
    pub fn local_bounding_box(&self, model: &Model) -> Option<Aabb> {
        model.bounding_box(ShelfId::Committed)
    }
}

/// Everything an editing operation may read or change, passed explicitly.
pub struct MainContext {
    pub object: DesignerObject,
    pub compiler: Box<dyn MeshCompiler>,
    pub model: Model,
    pub selection: ElementManager,
    pub history: UndoHistory,
    pub config: DesignerConfig,
    /// Output of the last compile
    pub mesh: Option<RenderMesh>,
}

impl MainContext {
    pub fn new(model: Model) -> Self {
        Self::with_config(model, DesignerConfig::default())
    }

    pub fn with_config(mut model: Model, config: DesignerConfig) -> Self {
        model.reset_db(DbScope::ALL);
        MainContext {
            object: DesignerObject::default(),
            compiler: Box::new(TriangleCompiler::default()),
            model,
            selection: ElementManager::new(),
            history: UndoHistory::new(),
            config,
            mesh: None,
        }
    }

    /// Retriangulate the committed model for rendering.
    pub fn compile(&mut self) {
        let mesh = self.compiler.compile(&self.object, &self.model);
        debug!(
            object = %self.object.name,
            triangles = mesh.triangle_count(),
            "model compiled"
        );
        self.mesh = Some(mesh);
    }
}

impl std::fmt::Debug for MainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainContext")
            .field("object", &self.object)
            .field("model", &self.model)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

/// Owns the context and at most one running tool.
pub struct Designer {
    ctx: MainContext,
    active: Option<Box<dyn Tool>>,
}

impl Designer {
    pub fn new(ctx: MainContext) -> Self {
        Designer { ctx, active: None }
    }

    pub const fn context(&self) -> &MainContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut MainContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> MainContext {
        self.ctx
    }

    pub fn active_tool(&self) -> Option<ToolKind> {
        self.active.as_ref().map(|t| t.kind())
    }

    /// Commit any running tool, then start `kind`.
    pub fn select_tool(&mut self, kind: ToolKind) -> Result<ToolResponse, DesignerError> {
        self.select_configured_tool(kind.create())
    }

    /// Start an already configured tool, e.g. one whose parameters were
    /// loaded from an archive.
    pub fn select_configured_tool(&mut self, mut tool: Box<dyn Tool>) -> Result<ToolResponse, DesignerError> {
        self.leave_tool()?;
        let kind = tool.kind();
        let response = tool.enter(&mut self.ctx)?;
        info!(tool = %kind, ?response, "tool entered");
        if !response.is_finished() {
            self.active = Some(tool);
        }
        Ok(response)
    }

    /// Commit and drop the running tool.
    pub fn leave_tool(&mut self) -> Result<ToolResponse, DesignerError> {
        match self.active.take() {
            Some(mut tool) => tool.leave(&mut self.ctx),
            None => Ok(ToolResponse::Continue),
        }
    }

    /// Cancel and drop the running tool.
    pub fn cancel_tool(&mut self) -> ToolResponse {
        match self.active.take() {
            Some(mut tool) => tool.cancel(&mut self.ctx),
            None => ToolResponse::Continue,
        }
    }

    fn dispatch(
        &mut self,
        handler: impl FnOnce(&mut dyn Tool, &mut MainContext) -> Result<ToolResponse, DesignerError>,
    ) -> Result<ToolResponse, DesignerError> {
        let Some(tool) = self.active.as_mut() else {
            return Err(DesignerError::NoActiveTool);
        };
        // a failing handler has already rolled its transaction back
        let response = match handler(tool.as_mut(), &mut self.ctx) {
            Ok(response) => response,
            Err(err) => {
                warn!(tool = %tool.kind(), %err, "tool failed");
                self.active = None;
                return Err(err);
            },
        };
        if response.is_finished() {
            self.active = None;
        }
        Ok(response)
    }

    pub fn pointer_down(&mut self, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.dispatch(|tool, ctx| tool.on_pointer_down(ctx, event))
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.dispatch(|tool, ctx| tool.on_pointer_move(ctx, event))
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) -> Result<ToolResponse, DesignerError> {
        self.dispatch(|tool, ctx| tool.on_pointer_up(ctx, event))
    }

    pub fn key_down(&mut self, key: Key) -> Result<ToolResponse, DesignerError> {
        self.dispatch(|tool, ctx| tool.on_key_down(ctx, key))
    }

    pub fn display(&self) -> DisplayList {
        let mut out = DisplayList::default();
        if let Some(tool) = self.active.as_ref() {
            tool.display(&self.ctx, &mut out);
        }
        out
    }

    /// Save or load the running tool's parameters.
    pub fn serialize_tool(&mut self, archive: &mut ParamArchive) -> Result<(), DesignerError> {
        match self.active.as_mut() {
            Some(tool) => tool.serialize(archive),
            None => Err(DesignerError::NoActiveTool),
        }
    }

    /// Step back one committed transaction. A running tool is cancelled
    /// first. The selection is re-resolved against the restored model.
    pub fn undo(&mut self) -> Option<String> {
        self.cancel_tool();
        let description = self.ctx.history.undo(&mut self.ctx.model)?;
        self.after_history_step();
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.cancel_tool();
        let description = self.ctx.history.redo(&mut self.ctx.model)?;
        self.after_history_step();
        Some(description)
    }

    fn after_history_step(&mut self) {
        self.ctx.model.reset_db(DbScope::ALL);
        self.ctx.selection.remove_invalid_elements(&self.ctx.model);
        self.ctx.compile();
    }
}
