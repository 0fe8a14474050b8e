//! Anchor/head selection over one document version.
//!
//! A selection is only meaningful against the document it was made in;
//! carrying it across an edit goes through [`Selection::map`] with the
//! transaction's accumulated mapping, never by reusing raw positions.

use std::sync::Arc;

use scribe_core::node::Node;

use crate::map::{
  Assoc,
  Mapping,
};

/// An ordered pair of positions. `anchor` is the fixed end, `head` the
/// moving end; they are equal for a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
  pub anchor: usize,
  pub head:   usize,
}

impl Selection {
  pub fn new(anchor: usize, head: usize) -> Self {
    Self { anchor, head }
  }

  /// A collapsed selection at one position.
  pub fn caret(pos: usize) -> Self {
    Self { anchor: pos, head: pos }
  }

  pub fn from(&self) -> usize {
    self.anchor.min(self.head)
  }

  pub fn to(&self) -> usize {
    self.anchor.max(self.head)
  }

  pub fn is_empty(&self) -> bool {
    self.anchor == self.head
  }

  /// Carry this selection through a mapping. Positions inside deleted
  /// content land on the deletion boundary.
  #[must_use]
  pub fn map(&self, mapping: &Mapping) -> Self {
    Self {
      anchor: mapping.map(self.anchor, Assoc::Before),
      head:   mapping.map(self.head, Assoc::Before),
    }
  }

  /// Clamp both ends into the addressable range of `doc`.
  #[must_use]
  pub fn clamp(&self, doc: &Arc<Node>) -> Self {
    let max = doc.content_size();
    Self {
      anchor: self.anchor.min(max),
      head:   self.head.min(max),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::map::StepMap;

  #[test]
  fn from_to_ordering() {
    let sel = Selection::new(7, 3);
    assert_eq!(sel.from(), 3);
    assert_eq!(sel.to(), 7);
    assert!(!sel.is_empty());
    assert!(Selection::caret(5).is_empty());
  }

  #[test]
  fn maps_through_deletion_to_boundary() {
    let mut mapping = Mapping::new();
    mapping.push(StepMap::new(2, 4, 0));
    let sel = Selection::new(3, 5).map(&mapping);
    assert_eq!(sel, Selection::caret(2));
  }
}
