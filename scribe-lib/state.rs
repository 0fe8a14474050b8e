//! The editor state: current document, selection, registered plugins, and
//! undo history, advanced exclusively through [`EditorState::dispatch`].
//!
//! A dispatch cycle runs the plugin filter pipeline, commits the
//! transaction's document and selection, records it in history (unless
//! marked as skipped), recomputes decorations, and schedules the table
//! fixing pass when the edit touched a table. A rejected transaction leaves
//! the state untouched.

use std::sync::Arc;

use scribe_core::{
  Tendril,
  node::{
    Attrs,
    Node,
    ValidationError,
  },
  schema::Schema,
};
use thiserror::Error;
use tracing::{
  debug,
  trace,
};

use crate::{
  history::History,
  plugin::{
    Command,
    Decoration,
    FilterResult,
    Plugin,
  },
  selection::Selection,
  step::StepError,
  tables,
  transaction::{
    HISTORY_SKIP,
    META_HISTORY,
    Transaction,
  },
};

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
  #[error("transaction rejected by plugin {plugin:?}: {reason}")]
  Rejected { plugin: Tendril, reason: Tendril },
  #[error("transaction was built against a stale document")]
  StaleTransaction,
  #[error("document root {found:?} does not match schema root {expected:?}")]
  WrongRoot { found: Tendril, expected: Tendril },
  #[error(transparent)]
  Step(#[from] StepError),
  #[error(transparent)]
  Validation(#[from] ValidationError),
}

pub struct EditorState {
  schema:      Arc<Schema>,
  doc:         Arc<Node>,
  selection:   Selection,
  plugins:     Vec<Arc<dyn Plugin>>,
  decorations: Vec<Decoration>,
  history:     History,
}

impl EditorState {
  /// Create a state over `doc` (or an empty document when `None`). Runs the
  /// table fixing pass once so commands always see well-shaped tables.
  pub fn new(
    schema: Arc<Schema>,
    doc: Option<Arc<Node>>,
    plugins: Vec<Arc<dyn Plugin>>,
  ) -> Result<Self> {
    let doc = match doc {
      Some(doc) => {
        if doc.type_name() != schema.root_type().name {
          return Err(StateError::WrongRoot {
            found:    Tendril::from(doc.type_name()),
            expected: schema.root_type().name.clone(),
          });
        }
        doc
      },
      None => {
        // Most root content expressions require at least one block, so the
        // empty document holds a single empty paragraph when the schema has
        // one.
        let blocks = match schema.node_type("paragraph") {
          Some(paragraph) => vec![paragraph.create(Attrs::new(), [])?],
          None => Vec::new(),
        };
        schema.root_type().create(Attrs::new(), blocks)?
      },
    };
    let mut state = EditorState {
      schema,
      doc,
      selection: Selection::caret(0),
      plugins,
      decorations: Vec::new(),
      history: History::new(),
    };
    state.decorations = state.compute_decorations();
    if let Some(fix) = tables::fix_tables(&state) {
      state.dispatch(fix)?;
    }
    Ok(state)
  }

  pub fn schema(&self) -> &Arc<Schema> {
    &self.schema
  }

  pub fn doc(&self) -> &Arc<Node> {
    &self.doc
  }

  pub fn selection(&self) -> Selection {
    self.selection
  }

  pub fn decorations(&self) -> &[Decoration] {
    &self.decorations
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  /// Start a transaction against the current document.
  pub fn tr(&self) -> Transaction {
    Transaction::new(Arc::clone(&self.schema), Arc::clone(&self.doc))
  }

  /// Run one dispatch cycle. On any error the state is left exactly as it
  /// was.
  pub fn dispatch(&mut self, tr: Transaction) -> Result<()> {
    if !Arc::ptr_eq(tr.base_doc(), &self.doc) {
      return Err(StateError::StaleTransaction);
    }

    let mut tr = tr;
    for plugin in &self.plugins {
      match plugin.filter_transaction(&tr, self) {
        FilterResult::Keep => {},
        FilterResult::Replace(replacement) => {
          trace!(plugin = plugin.name(), "plugin replaced transaction");
          if !Arc::ptr_eq(replacement.base_doc(), &self.doc) {
            return Err(StateError::StaleTransaction);
          }
          tr = replacement;
        },
        FilterResult::Reject(reason) => {
          debug!(plugin = plugin.name(), %reason, "transaction rejected");
          return Err(StateError::Rejected {
            plugin: Tendril::from(plugin.name()),
            reason,
          });
        },
      }
    }

    // Everything fallible happens before the first field write.
    let selection_before = self.selection;
    let selection = tr
      .selection()
      .unwrap_or_else(|| selection_before.map(tr.mapping()))
      .clamp(tr.doc());
    let record = tr.doc_changed() && !tr.history_skipped();
    let inverted = if record { tr.inverted_steps()? } else { Vec::new() };

    debug!(
      steps = tr.steps().len(),
      doc_changed = tr.doc_changed(),
      "dispatch"
    );
    self.doc = Arc::clone(tr.doc());
    self.selection = selection;
    if record {
      self
        .history
        .commit(tr.steps().to_vec(), inverted, selection_before, selection);
    }
    self.decorations = self.compute_decorations();

    if tr.doc_changed()
      && !tr.history_skipped()
      && tables::touches_table(&tr)
      && let Some(fix) = tables::fix_tables(self)
    {
      self.dispatch(fix)?;
    }
    Ok(())
  }

  /// Step one revision back. `false` when already at the root.
  pub fn undo(&mut self) -> Result<bool> {
    let Some(jump) = self.history.undo() else {
      return Ok(false);
    };
    let mut tr = self.tr();
    for step in &jump.steps {
      tr.step(step.clone())?;
    }
    tr.set_selection(jump.selection);
    tr.set_meta(META_HISTORY, HISTORY_SKIP);
    self.dispatch(tr)?;
    self.history.apply_jump(&jump);
    Ok(true)
  }

  /// Re-apply the most recently undone revision. `false` when there is
  /// nothing to redo.
  pub fn redo(&mut self) -> Result<bool> {
    let Some(jump) = self.history.redo() else {
      return Ok(false);
    };
    let mut tr = self.tr();
    for step in &jump.steps {
      tr.step(step.clone())?;
    }
    tr.set_selection(jump.selection);
    tr.set_meta(META_HISTORY, HISTORY_SKIP);
    self.dispatch(tr)?;
    self.history.apply_jump(&jump);
    Ok(true)
  }

  /// Route a key through the plugin keymaps, in registration order. The
  /// first binding whose command applies wins. `false` when no binding
  /// handled the key.
  pub fn handle_key(&mut self, key: &str) -> Result<bool> {
    let commands: Vec<Command> = self
      .plugins
      .iter()
      .flat_map(|p| p.keymap().iter())
      .filter(|b| b.key == key)
      .map(|b| b.command)
      .collect();
    for command in commands {
      if let Some(tr) = command(self) {
        trace!(key, "key handled");
        self.dispatch(tr)?;
        return Ok(true);
      }
    }
    Ok(false)
  }

  fn compute_decorations(&self) -> Vec<Decoration> {
    self
      .plugins
      .iter()
      .flat_map(|p| p.decorations(self))
      .collect()
  }
}

#[cfg(test)]
mod test {
  use scribe_core::{
    basic,
    node::MarkSet,
  };

  use super::*;
  use crate::plugin::KeyBinding;

  fn para(schema: &Arc<Schema>, text: &str) -> Arc<Node> {
    let children = if text.is_empty() {
      vec![]
    } else {
      vec![schema.text(text, MarkSet::new()).unwrap()]
    };
    schema
      .node_type("paragraph")
      .unwrap()
      .create(Attrs::new(), children)
      .unwrap()
  }

  fn doc_of(schema: &Arc<Schema>, paragraphs: Vec<Arc<Node>>) -> Arc<Node> {
    schema.root_type().create(Attrs::new(), paragraphs).unwrap()
  }

  fn state_of(text: &str) -> EditorState {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, text)]);
    EditorState::new(schema, Some(doc), Vec::new()).unwrap()
  }

  struct RejectDeletions;

  impl Plugin for RejectDeletions {
    fn name(&self) -> &str {
      "reject-deletions"
    }

    fn filter_transaction(&self, tr: &Transaction, _state: &EditorState) -> FilterResult {
      if tr.doc().content_size() < tr.base_doc().content_size() {
        FilterResult::Reject(Tendril::from("deletions are disabled"))
      } else {
        FilterResult::Keep
      }
    }
  }

  struct UppercaseInserts;

  impl Plugin for UppercaseInserts {
    fn name(&self) -> &str {
      "uppercase-inserts"
    }

    fn filter_transaction(&self, tr: &Transaction, state: &EditorState) -> FilterResult {
      if tr.doc().text_content() == "ab" {
        let mut replacement = state.tr();
        replacement.insert_text(2, "B", MarkSet::new()).unwrap();
        FilterResult::Replace(replacement)
      } else {
        FilterResult::Keep
      }
    }
  }

  fn insert_x(state: &EditorState) -> Option<Transaction> {
    let mut tr = state.tr();
    tr.insert_text(state.selection().head, "x", MarkSet::new()).ok()?;
    Some(tr)
  }

  struct XKey;

  impl Plugin for XKey {
    fn name(&self) -> &str {
      "x-key"
    }

    fn keymap(&self) -> &[KeyBinding] {
      &[KeyBinding {
        key:     "x",
        command: insert_x,
      }]
    }
  }

  #[test]
  fn missing_doc_starts_as_empty_paragraph() {
    let schema = basic::schema().unwrap();
    let state = EditorState::new(schema, None, Vec::new()).unwrap();
    assert_eq!(state.doc().child_count(), 1);
    let first = state.doc().child(0).unwrap();
    assert_eq!(first.type_name(), "paragraph");
    assert_eq!(first.child_count(), 0);
  }

  #[test]
  fn dispatch_commits_doc_and_selection() {
    let mut state = state_of("hi");
    let mut tr = state.tr();
    tr.insert_text(3, "!", MarkSet::new()).unwrap();
    tr.set_selection(Selection::caret(4));
    state.dispatch(tr).unwrap();
    assert_eq!(state.doc().text_content(), "hi!");
    assert_eq!(state.selection(), Selection::caret(4));
  }

  #[test]
  fn selection_follows_mapping_when_not_set() {
    let mut state = state_of("hi");
    let mut tr = state.tr();
    tr.set_selection(Selection::caret(3));
    state.dispatch(tr).unwrap();

    let mut tr = state.tr();
    tr.insert_text(1, "> ", MarkSet::new()).unwrap();
    state.dispatch(tr).unwrap();
    assert_eq!(state.selection(), Selection::caret(5));
  }

  #[test]
  fn rejected_transaction_changes_nothing() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "keep")]);
    let mut state =
      EditorState::new(schema, Some(doc), vec![Arc::new(RejectDeletions)]).unwrap();

    let mut tr = state.tr();
    tr.delete_range(1, 3).unwrap();
    let err = state.dispatch(tr).unwrap_err();
    assert!(matches!(err, StateError::Rejected { .. }));
    assert_eq!(state.doc().text_content(), "keep");
    assert!(state.history().at_root());
  }

  #[test]
  fn replacement_transaction_is_committed() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "a")]);
    let mut state =
      EditorState::new(schema, Some(doc), vec![Arc::new(UppercaseInserts)]).unwrap();

    let mut tr = state.tr();
    tr.insert_text(2, "b", MarkSet::new()).unwrap();
    state.dispatch(tr).unwrap();
    assert_eq!(state.doc().text_content(), "aB");
  }

  #[test]
  fn stale_transaction_is_refused() {
    let mut state = state_of("hi");
    let stale = state.tr();
    let mut tr = state.tr();
    tr.insert_text(3, "!", MarkSet::new()).unwrap();
    state.dispatch(tr).unwrap();
    assert!(matches!(
      state.dispatch(stale),
      Err(StateError::StaleTransaction)
    ));
  }

  #[test]
  fn undo_redo_restore_doc_and_selection() {
    let mut state = state_of("ab");
    let mut tr = state.tr();
    tr.set_selection(Selection::caret(3));
    state.dispatch(tr).unwrap();

    let mut tr = state.tr();
    tr.insert_text(3, "c", MarkSet::new()).unwrap();
    tr.set_selection(Selection::caret(4));
    state.dispatch(tr).unwrap();
    assert_eq!(state.doc().text_content(), "abc");

    assert!(state.undo().unwrap());
    assert_eq!(state.doc().text_content(), "ab");
    assert_eq!(state.selection(), Selection::caret(3));

    assert!(state.redo().unwrap());
    assert_eq!(state.doc().text_content(), "abc");
    assert_eq!(state.selection(), Selection::caret(4));
    assert!(!state.redo().unwrap());
  }

  #[test]
  fn skipped_transactions_stay_out_of_history() {
    let mut state = state_of("ab");
    let mut tr = state.tr();
    tr.insert_text(3, "c", MarkSet::new()).unwrap();
    tr.set_meta(META_HISTORY, HISTORY_SKIP);
    state.dispatch(tr).unwrap();
    assert_eq!(state.doc().text_content(), "abc");
    assert!(state.history().at_root());
    assert!(!state.undo().unwrap());
  }

  #[test]
  fn keymap_routes_to_first_applicable_binding() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "a")]);
    let mut state = EditorState::new(schema, Some(doc), vec![Arc::new(XKey)]).unwrap();
    let mut tr = state.tr();
    tr.set_selection(Selection::caret(2));
    state.dispatch(tr).unwrap();

    assert!(state.handle_key("x").unwrap());
    assert_eq!(state.doc().text_content(), "ax");
    assert!(!state.handle_key("y").unwrap());
  }
}
