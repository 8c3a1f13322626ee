//! Undo/redo of whole-model snapshots

use crate::model::Model;
use tracing::debug;

/// The undo surface the kernel drives at transaction boundaries.
pub trait UndoService {
    fn begin(&mut self);
    /// Remember `before` as the state to return to on undo.
    fn record_undo(&mut self, description: &str, before: &Model);
    /// Close the open transaction with the resulting model.
    fn accept(&mut self, after: &Model);
    fn cancel(&mut self);
}

#[derive(Debug, Clone)]
struct UndoStep {
    description: String,
    before: Model,
    after: Model,
}

#[derive(Debug, Clone, Default)]
pub struct UndoHistory {
    undo: Vec<UndoStep>,
    redo: Vec<UndoStep>,
    pending: Option<(String, Model)>,
    open: bool,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Restore the state before the last accepted step. Returns its description.
    pub fn undo(&mut self, model: &mut Model) -> Option<String> {
        let step = self.undo.pop()?;
        model.restore(step.before.clone());
        let description = step.description.clone();
        self.redo.push(step);
        debug!(%description, "undo");
        Some(description)
    }

    pub fn redo(&mut self, model: &mut Model) -> Option<String> {
        let step = self.redo.pop()?;
        model.restore(step.after.clone());
        let description = step.description.clone();
        self.undo.push(step);
        debug!(%description, "redo");
        Some(description)
    }
}

impl UndoService for UndoHistory {
    fn begin(&mut self) {
        self.open = true;
        self.pending = None;
    }

    fn record_undo(&mut self, description: &str, before: &Model) {
        if self.open && self.pending.is_none() {
            self.pending = Some((description.to_string(), before.clone()));
        }
    }

    fn accept(&mut self, after: &Model) {
        if let Some((description, before)) = self.pending.take() {
            self.undo.push(UndoStep {
                description,
                before,
                after: after.clone(),
            });
            self.redo.clear();
        }
        self.open = false;
    }

    fn cancel(&mut self) {
        self.pending = None;
        self.open = false;
    }
}
