//! An ordered batch of steps applied against one base document, with the
//! accumulated position mapping, an optional explicit selection, and
//! plugin-readable metadata.
//!
//! Steps are applied eagerly: [`Transaction::step`] runs the step against
//! the transaction's running document and fails without recording anything
//! when the step does, so a transaction is valid at every point of its
//! construction. A failed build is discarded whole; the editor's committed
//! document is never touched by it.

use std::sync::Arc;

use indexmap::IndexMap;
use scribe_core::{
  Tendril,
  node::{
    Attrs,
    Fragment,
    Mark,
    MarkSet,
    Node,
  },
  replace::Slice,
  schema::Schema,
};
use serde_json::Value;

use crate::{
  map::Mapping,
  selection::Selection,
  step::{
    Result,
    Step,
  },
};

/// Metadata key consulted by the editor state when recording history.
pub const META_HISTORY: &str = "history";
/// Value of [`META_HISTORY`] excluding a transaction from the undo history.
pub const HISTORY_SKIP: &str = "skip";

#[derive(Debug, Clone)]
pub struct Transaction {
  schema:    Arc<Schema>,
  base_doc:  Arc<Node>,
  doc:       Arc<Node>,
  steps:     Vec<Step>,
  /// Document before each step, for inversion.
  docs:      Vec<Arc<Node>>,
  mapping:   Mapping,
  selection: Option<Selection>,
  meta:      IndexMap<Tendril, Value>,
}

impl Transaction {
  pub fn new(schema: Arc<Schema>, doc: Arc<Node>) -> Self {
    Self {
      schema,
      base_doc: Arc::clone(&doc),
      doc,
      steps: Vec::new(),
      docs: Vec::new(),
      mapping: Mapping::new(),
      selection: None,
      meta: IndexMap::new(),
    }
  }

  pub fn doc(&self) -> &Arc<Node> {
    &self.doc
  }

  pub fn base_doc(&self) -> &Arc<Node> {
    &self.base_doc
  }

  pub fn schema(&self) -> &Arc<Schema> {
    &self.schema
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn mapping(&self) -> &Mapping {
    &self.mapping
  }

  pub fn doc_changed(&self) -> bool {
    !self.steps.is_empty()
  }

  pub fn selection(&self) -> Option<Selection> {
    self.selection
  }

  /// Apply a step to the running document and record it. On failure nothing
  /// is recorded and the transaction stays usable as it was.
  pub fn step(&mut self, step: Step) -> Result<()> {
    let result = step.apply(&self.doc)?;
    self.docs.push(Arc::clone(&self.doc));
    self.doc = result.doc;
    self.mapping.push(result.map);
    self.steps.push(step);
    Ok(())
  }

  pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> Result<()> {
    self.step(Step::Replace { from, to, slice })
  }

  pub fn delete_range(&mut self, from: usize, to: usize) -> Result<()> {
    self.replace(from, to, Slice::empty())
  }

  pub fn insert_text(&mut self, pos: usize, text: &str, marks: MarkSet) -> Result<()> {
    let node = self.schema.text(text, marks)?;
    self.replace(pos, pos, Slice::closed(Fragment::new([node])))
  }

  pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<()> {
    self.step(Step::AddMark { from, to, mark })
  }

  pub fn remove_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<()> {
    self.step(Step::RemoveMark { from, to, mark })
  }

  pub fn set_attrs(&mut self, pos: usize, attrs: Attrs) -> Result<()> {
    self.step(Step::SetAttrs { pos, attrs })
  }

  /// Override the default post-commit selection (the pre-transaction
  /// selection mapped through the accumulated mapping).
  pub fn set_selection(&mut self, selection: Selection) {
    self.selection = Some(selection.clamp(&self.doc));
  }

  pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
    self.meta.insert(Tendril::from(key), value.into());
  }

  pub fn meta(&self, key: &str) -> Option<&Value> {
    self.meta.get(key)
  }

  pub fn history_skipped(&self) -> bool {
    self
      .meta(META_HISTORY)
      .and_then(Value::as_str)
      .is_some_and(|v| v == HISTORY_SKIP)
  }

  /// The inverse steps, in the order that undoes this transaction when
  /// applied front to back.
  pub fn inverted_steps(&self) -> Result<Vec<Step>> {
    let mut inverted = Vec::with_capacity(self.steps.len());
    for (step, doc_before) in self.steps.iter().zip(&self.docs).rev() {
      inverted.push(step.invert(doc_before)?);
    }
    Ok(inverted)
  }
}

#[cfg(test)]
mod test {
  use scribe_core::basic;

  use super::*;

  fn para(schema: &Schema, text: &str) -> Arc<Node> {
    schema
      .node_type("paragraph")
      .unwrap()
      .create(Attrs::new(), [schema.text(text, MarkSet::new()).unwrap()])
      .unwrap()
  }

  fn doc_of(schema: &Arc<Schema>, children: Vec<Arc<Node>>) -> Arc<Node> {
    schema.root_type().create(Attrs::new(), children).unwrap()
  }

  #[test]
  fn accumulates_steps_and_mapping() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "ho")]);
    let mut tr = Transaction::new(Arc::clone(&schema), doc);
    tr.insert_text(2, "ell", MarkSet::new()).unwrap();
    tr.delete_range(1, 2).unwrap();
    assert_eq!(tr.doc().text_content(), "ello");
    assert_eq!(tr.steps().len(), 2);
    // Position after the original "h" through both steps.
    assert_eq!(tr.mapping().map(2, crate::map::Assoc::Before), 1);
  }

  #[test]
  fn failed_step_records_nothing() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "ab"), para(&schema, "cd")]);
    let mut tr = Transaction::new(Arc::clone(&schema), Arc::clone(&doc));
    tr.delete_range(4, 8).unwrap();
    // The second step targets positions that no longer exist.
    assert!(tr.delete_range(5, 7).is_err());
    assert_eq!(tr.steps().len(), 1);
    assert_eq!(tr.doc().text_content(), "ab");
    assert_eq!(doc.text_content(), "abcd");
  }

  #[test]
  fn inverted_steps_restore_base_doc() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "ab"), para(&schema, "cd")]);
    let mut tr = Transaction::new(Arc::clone(&schema), Arc::clone(&doc));
    tr.delete_range(2, 6).unwrap();
    tr.insert_text(2, "x", MarkSet::new()).unwrap();

    let mut current = Arc::clone(tr.doc());
    for step in tr.inverted_steps().unwrap() {
      current = step.apply(&current).unwrap().doc;
    }
    assert_eq!(current, doc);
  }

  #[test]
  fn history_skip_meta() {
    let schema = basic::schema().unwrap();
    let doc = doc_of(&schema, vec![para(&schema, "a")]);
    let mut tr = Transaction::new(schema, doc);
    assert!(!tr.history_skipped());
    tr.set_meta(META_HISTORY, HISTORY_SKIP);
    assert!(tr.history_skipped());
  }
}
