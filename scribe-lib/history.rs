//! Undo history.
//!
//! The history is a vector of revisions with at least one element, the
//! empty root. Each non-root revision has a parent, the forward steps that
//! transition the parent document to its own, and the inverse steps that
//! transition back. Each revision except the newest also records a last
//! child, so redo after an undo replays the most recent branch.
//!
//! Navigation is prepare-then-apply: [`History::undo`] and
//! [`History::redo`] return a [`HistoryJump`] without mutating anything;
//! the caller applies the steps and only then calls
//! [`History::apply_jump`], so the history never diverges from the
//! document when an application fails.

use std::num::NonZeroUsize;

use crate::{
  selection::Selection,
  step::Step,
};

/// A pending history navigation that has not been applied yet.
#[derive(Debug, Clone)]
pub struct HistoryJump {
  /// Steps to apply, in order.
  pub steps:     Vec<Step>,
  /// Selection to restore after the steps.
  pub selection: Selection,
  /// Target revision index after the jump.
  pub target:    usize,
}

#[derive(Debug)]
pub struct History {
  revisions: Vec<Revision>,
  current:   usize,
}

#[derive(Debug, Clone)]
struct Revision {
  parent:           usize,
  last_child:       Option<NonZeroUsize>,
  /// Forward steps, replayed on redo.
  steps:            Vec<Step>,
  /// Inverse steps in undo order.
  inverted:         Vec<Step>,
  /// Selection before the revision's steps (restored on undo).
  selection_before: Selection,
  /// Selection after the revision's steps (restored on redo).
  selection_after:  Selection,
}

impl Default for History {
  fn default() -> Self {
    Self {
      revisions: vec![Revision {
        parent:           0,
        last_child:       None,
        steps:            Vec::new(),
        inverted:         Vec::new(),
        selection_before: Selection::caret(0),
        selection_after:  Selection::caret(0),
      }],
      current:   0,
    }
  }
}

impl History {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a committed transaction as a new revision and make it current.
  pub fn commit(
    &mut self,
    steps: Vec<Step>,
    inverted: Vec<Step>,
    selection_before: Selection,
    selection_after: Selection,
  ) {
    let new_current = self.revisions.len();
    self.revisions[self.current].last_child = NonZeroUsize::new(new_current);
    self.revisions.push(Revision {
      parent: self.current,
      last_child: None,
      steps,
      inverted,
      selection_before,
      selection_after,
    });
    self.current = new_current;
  }

  #[inline]
  pub fn current_revision(&self) -> usize {
    self.current
  }

  #[inline]
  pub const fn at_root(&self) -> bool {
    self.current == 0
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.revisions.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.revisions.len() <= 1
  }

  /// Prepare an undo without mutating history state. `None` at the root.
  pub fn undo(&self) -> Option<HistoryJump> {
    if self.at_root() {
      return None;
    }
    let rev = &self.revisions[self.current];
    Some(HistoryJump {
      steps:     rev.inverted.clone(),
      selection: rev.selection_before,
      target:    rev.parent,
    })
  }

  /// Prepare a redo along the latest branch. `None` when there is none.
  pub fn redo(&self) -> Option<HistoryJump> {
    let child = self.revisions[self.current].last_child?;
    let rev = &self.revisions[child.get()];
    Some(HistoryJump {
      steps:     rev.steps.clone(),
      selection: rev.selection_after,
      target:    child.get(),
    })
  }

  /// Move to a jump's target. Call only after its steps applied cleanly.
  pub fn apply_jump(&mut self, jump: &HistoryJump) {
    debug_assert!(jump.target < self.revisions.len());
    self.current = jump.target;
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use scribe_core::{
    basic,
    node::{
      Attrs,
      MarkSet,
      Node,
    },
    schema::Schema,
  };

  use super::*;
  use crate::transaction::Transaction;

  fn para(schema: &Schema, text: &str) -> Arc<Node> {
    schema
      .node_type("paragraph")
      .unwrap()
      .create(Attrs::new(), [schema.text(text, MarkSet::new()).unwrap()])
      .unwrap()
  }

  fn commit_insert(
    history: &mut History,
    schema: &Arc<Schema>,
    doc: &Arc<Node>,
    pos: usize,
    text: &str,
  ) -> Arc<Node> {
    let mut tr = Transaction::new(Arc::clone(schema), Arc::clone(doc));
    tr.insert_text(pos, text, MarkSet::new()).unwrap();
    history.commit(
      tr.steps().to_vec(),
      tr.inverted_steps().unwrap(),
      Selection::caret(pos),
      Selection::caret(pos + text.chars().count()),
    );
    Arc::clone(tr.doc())
  }

  fn apply_jump(doc: &Arc<Node>, history: &mut History, jump: HistoryJump) -> Arc<Node> {
    let mut doc = Arc::clone(doc);
    for step in &jump.steps {
      doc = step.apply(&doc).unwrap().doc;
    }
    history.apply_jump(&jump);
    doc
  }

  #[test]
  fn undo_redo_walks_revisions() {
    let schema = basic::schema().unwrap();
    let d0 = schema
      .root_type()
      .create(Attrs::new(), [para(&schema, "a")])
      .unwrap();

    let mut history = History::new();
    let d1 = commit_insert(&mut history, &schema, &d0, 2, "b");
    let d2 = commit_insert(&mut history, &schema, &d1, 3, "c");
    assert_eq!(d2.text_content(), "abc");
    assert_eq!(history.current_revision(), 2);

    let jump = history.undo().unwrap();
    let back = apply_jump(&d2, &mut history, jump);
    assert_eq!(back, d1);

    let jump = history.redo().unwrap();
    let forward = apply_jump(&back, &mut history, jump);
    assert_eq!(forward, d2);

    // Two undos reach the root; a third is a no-op.
    let jump = history.undo().unwrap();
    let back = apply_jump(&forward, &mut history, jump);
    let jump = history.undo().unwrap();
    let back = apply_jump(&back, &mut history, jump);
    assert_eq!(back, d0);
    assert!(history.undo().is_none());
  }

  #[test]
  fn redo_follows_latest_branch() {
    let schema = basic::schema().unwrap();
    let d0 = schema
      .root_type()
      .create(Attrs::new(), [para(&schema, "a")])
      .unwrap();

    let mut history = History::new();
    let d1 = commit_insert(&mut history, &schema, &d0, 2, "b");
    let _d2 = commit_insert(&mut history, &schema, &d1, 3, "c");

    // Undo to revision 1, then branch off.
    let jump = history.undo().unwrap();
    let back = apply_jump(&_d2, &mut history, jump);
    let d3 = commit_insert(&mut history, &schema, &back, 3, "d");
    assert_eq!(d3.text_content(), "abd");

    let jump = history.undo().unwrap();
    let back = apply_jump(&d3, &mut history, jump);
    let jump = history.redo().unwrap();
    assert_eq!(jump.target, 3);
    let forward = apply_jump(&back, &mut history, jump);
    assert_eq!(forward, d3);
  }

  #[test]
  fn undo_does_not_mutate_before_apply() {
    let schema = basic::schema().unwrap();
    let d0 = schema
      .root_type()
      .create(Attrs::new(), [para(&schema, "a")])
      .unwrap();
    let mut history = History::new();
    let _d1 = commit_insert(&mut history, &schema, &d0, 2, "b");

    let jump = history.undo().unwrap();
    assert_eq!(jump.target, 0);
    assert_eq!(history.current_revision(), 1);
    history.apply_jump(&jump);
    assert_eq!(history.current_revision(), 0);
  }
}
