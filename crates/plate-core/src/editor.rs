use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::node::{Document, Node, Point, Selection};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError};
use crate::tree::apply_op;

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

#[derive(Debug, Clone)]
struct UndoRecord {
    inverse_ops: Vec<Op>,
    selection_before: Selection,
    selection_after: Selection,
    source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 200,
            max_normalize_iterations: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionPreview {
    pub doc: Document,
    pub selection: Selection,
}

/// Document, selection and history for one editing surface.
pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        if editor.normalize().is_err() {
            tracing::warn!("initial document did not normalize");
        }
        editor.selection = editor.resolve_selection(&editor.selection);
        editor
    }

    pub fn with_core_plugins() -> Self {
        Self::empty(PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        Self::empty(PluginRegistry::richtext())
    }

    fn empty(registry: PluginRegistry) -> Self {
        let doc = Document::from_blocks(vec![Node::paragraph("")]);
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = self.resolve_selection(&selection);
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Clamps a selection captured against an older document onto text
    /// leaves that exist now.
    pub fn resolve_selection(&self, selection: &Selection) -> Selection {
        self.registry.normalize_selection(&self.doc, selection)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Source tag of the step `undo` would revert.
    pub fn last_source(&self) -> Option<&str> {
        self.undo_stack.last()?.source.as_deref()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let redo_ops = self.replay(&record.inverse_ops);
        self.selection = record.selection_before.clone();
        self.settle_after_history();
        self.redo_stack.push(UndoRecord {
            inverse_ops: redo_ops,
            ..record
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let undo_ops = self.replay(&record.inverse_ops);
        self.selection = record.selection_after.clone();
        self.settle_after_history();
        self.undo_stack.push(UndoRecord {
            inverse_ops: undo_ops,
            ..record
        });
        true
    }

    /// Applies ops until one fails; returns the inverses in replay order.
    fn replay(&mut self, ops: &[Op]) -> Vec<Op> {
        let mut inverses = Vec::with_capacity(ops.len());
        for op in ops.iter().cloned() {
            match apply_op(&mut self.doc, &mut self.selection, op) {
                Ok(inverse) => inverses.push(inverse),
                Err(err) => {
                    tracing::warn!(error = %err, "history replay stopped");
                    break;
                }
            }
        }
        inverses.reverse();
        inverses
    }

    fn settle_after_history(&mut self) {
        if let Err(err) = self.normalize() {
            tracing::warn!(error = %err, "normalize after history step failed");
        }
        self.selection = self.resolve_selection(&self.selection);
    }

    /// Applies a transaction as one atomic step with a single undo record.
    /// On error the document and selection are left as they were.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let selection_before = self.selection.clone();
        let doc_before = self.doc.clone();
        let source = tx.source.clone();

        let mut inverse_ops = match self.apply_ops(tx) {
            Ok(ops) => ops,
            Err(err) => {
                self.doc = doc_before;
                self.selection = selection_before;
                return Err(err);
            }
        };
        inverse_ops.reverse();
        self.selection = self.resolve_selection(&self.selection);

        tracing::trace!(source = ?source, ops = inverse_ops.len(), "transaction applied");
        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after: self.selection.clone(),
            source,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    fn apply_ops(&mut self, tx: Transaction) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops = Vec::with_capacity(tx.ops.len());
        for op in tx.ops {
            let at = op.path().to_vec();
            let inverse = apply_op(&mut self.doc, &mut self.selection, op).inspect_err(|err| {
                tracing::debug!(source = ?tx.source, path = ?at, error = %err, "op rejected");
            })?;
            inverse_ops.push(inverse);
        }
        if let Some(selection) = tx.selection_after {
            self.selection = selection;
        }
        inverse_ops.extend(self.normalize()?);
        Ok(inverse_ops)
    }

    pub fn preview_transaction(&self, tx: &Transaction) -> Result<TransactionPreview, ApplyError> {
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();

        for op in tx.ops.iter().cloned() {
            apply_op(&mut doc, &mut selection, op)?;
        }
        if let Some(sel) = &tx.selection_after {
            selection = sel.clone();
        }
        normalize_doc(
            &self.registry,
            self.config.max_normalize_iterations,
            &mut doc,
            &mut selection,
        )?;
        let selection = self.registry.normalize_selection(&doc, &selection);

        Ok(TransactionPreview { doc, selection })
    }

    pub fn run_command(&mut self, id: &str, args: Option<serde_json::Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<serde_json::Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        let value = (query.handler)(self, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn normalize(&mut self) -> Result<Vec<Op>, ApplyError> {
        normalize_doc(
            &self.registry,
            self.config.max_normalize_iterations,
            &mut self.doc,
            &mut self.selection,
        )
    }
}

fn normalize_doc(
    registry: &PluginRegistry,
    max_iterations: usize,
    doc: &mut Document,
    selection: &mut Selection,
) -> Result<Vec<Op>, ApplyError> {
    let mut inverses = Vec::new();
    for _ in 0..max_iterations {
        let ops = registry.normalize(doc);
        if ops.is_empty() {
            return Ok(inverses);
        }
        for op in ops {
            inverses.push(apply_op(doc, selection, op)?);
        }
    }
    Err(ApplyError::NormalizeDidNotConverge)
}
