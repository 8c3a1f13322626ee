//! One tool session's hold on the model

use super::{MainContext, ToolResponse, UndoService};
use crate::model::{AddOp, DbScope, Model, PolygonId, ShelfId};
use crate::polygon::Polygon;
use crate::selection::ElementManager;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Snapshot taken, nothing staged yet
    Entered,
    /// Scratch geometry or replacements are pending
    Active,
    Committed,
    Cancelled,
}

/// Entry snapshot plus what commit will do.
///
/// Consumed by [`Transaction::commit`] or [`Transaction::cancel`], so a
/// session cannot end twice.
#[derive(Debug)]
pub struct Transaction {
    description: &'static str,
    snapshot: Model,
    selection: ElementManager,
    replaced: Vec<PolygonId>,
    status: TransactionStatus,
}

impl Transaction {
    /// Snapshot the model and selection and open an undo record.
    pub fn begin(ctx: &mut MainContext, description: &'static str) -> Self {
        ctx.model.clear_shelf(ShelfId::Scratch);
        ctx.history.begin();
        ctx.history.record_undo(description, &ctx.model);
        debug!(description, "transaction begin");
        Transaction {
            description,
            snapshot: ctx.model.clone(),
            selection: ctx.selection.clone(),
            replaced: Vec::new(),
            status: TransactionStatus::Entered,
        }
    }

    pub const fn status(&self) -> TransactionStatus {
        self.status
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// The model as it was at [`Transaction::begin`].
    pub const fn snapshot(&self) -> &Model {
        &self.snapshot
    }

    pub fn replaced(&self) -> &[PolygonId] {
        &self.replaced
    }

    /// Replace the scratch shelf with `polygons`. Invalid polygons are
    /// dropped by [`Model::add_polygon`]; returns how many were staged.
    pub fn stage(&mut self, ctx: &mut MainContext, polygons: impl IntoIterator<Item = Polygon>) -> usize {
        ctx.model.clear_shelf(ShelfId::Scratch);
        let mut scratch = ctx.model.use_shelf(ShelfId::Scratch);
        let staged = polygons
            .into_iter()
            .filter_map(|p| scratch.add_polygon(p, AddOp::Add).ok())
            .count();
        drop(scratch);
        self.status = TransactionStatus::Active;
        staged
    }

    /// Committed polygons that the staged geometry supersedes.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = PolygonId>) {
        for id in ids {
            if !self.replaced.contains(&id) {
                self.replaced.push(id);
            }
        }
        self.status = TransactionStatus::Active;
    }

    pub fn set_replaced(&mut self, ids: Vec<PolygonId>) {
        self.replaced = ids;
        self.status = TransactionStatus::Active;
    }

    /// Mark the transaction as carrying a change that is neither staged
    /// geometry nor a replacement, e.g. a smoothing-group edit.
    pub fn touch(&mut self) {
        self.status = TransactionStatus::Active;
    }

    /// Drop everything staged, keeping the session open.
    pub fn reset(&mut self, ctx: &mut MainContext) {
        ctx.model.clear_shelf(ShelfId::Scratch);
        self.replaced.clear();
        self.status = TransactionStatus::Entered;
    }

    /// Fold the scratch shelf into the committed shelf.
    ///
    /// Replaced polygons are removed first, then the mirror half, query
    /// index and render mesh are regenerated and the undo step closed. A
    /// transaction with nothing staged is cancelled instead.
    pub fn commit(self, ctx: &mut MainContext) -> ToolResponse {
        self.commit_with(ctx, |_| {})
    }

    /// [`Transaction::commit`] with a final edit of the committed model,
    /// applied after the scratch shelf has been merged in.
    pub fn commit_with(mut self, ctx: &mut MainContext, finish: impl FnOnce(&mut Model)) -> ToolResponse {
        if self.status == TransactionStatus::Entered {
            return self.cancel(ctx);
        }
        let replaced = std::mem::take(&mut self.replaced);
        for id in &replaced {
            ctx.model.remove_polygon(*id);
        }
        let added = ctx.model.polygon_count(ShelfId::Scratch);
        ctx.model.move_shelf(ShelfId::Scratch, ShelfId::Committed);
        finish(&mut ctx.model);
        ctx.model.update_mirror();
        ctx.compile();
        ctx.history.accept(&ctx.model);
        ctx.selection.remove_invalid_elements(&ctx.model);
        self.status = TransactionStatus::Committed;
        info!(
            description = self.description,
            removed = replaced.len(),
            added,
            total = ctx.model.polygon_count(ShelfId::Committed),
            "transaction committed"
        );
        ToolResponse::Committed
    }

    /// Put the model and selection back as they were at `begin`.
    pub fn cancel(mut self, ctx: &mut MainContext) -> ToolResponse {
        ctx.model.restore(self.snapshot.clone());
        ctx.model.reset_db(DbScope::ALL);
        ctx.selection = std::mem::take(&mut self.selection);
        ctx.history.cancel();
        self.status = TransactionStatus::Cancelled;
        debug!(description = self.description, "transaction cancelled");
        ToolResponse::Cancelled
    }
}
