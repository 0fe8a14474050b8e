//! Position maps: how a flat position in the document before a step
//! corresponds to a position after it.
//!
//! Positions are only meaningful against one document version. Every step
//! carries a [`StepMap`] describing the single span it replaced; a
//! [`Mapping`] folds the maps of a whole transaction so callers can carry
//! selections and stored positions across it.

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
  /// Stay before content inserted at this position.
  Before,
  /// Move past content inserted at this position.
  After,
}

/// The position map of a single step: one replaced span.
///
/// Steps that do not move positions (mark and attribute steps) use
/// [`StepMap::identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepMap {
  start:    usize,
  old_size: usize,
  new_size: usize,
}

/// A mapped position plus whether its original location was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
  pub pos:     usize,
  /// Whether the original position fell strictly inside the replaced span.
  pub deleted: bool,
}

impl StepMap {
  pub fn new(start: usize, old_size: usize, new_size: usize) -> Self {
    Self {
      start,
      old_size,
      new_size,
    }
  }

  pub fn identity() -> Self {
    Self::default()
  }

  pub fn is_identity(&self) -> bool {
    self.old_size == 0 && self.new_size == 0
  }

  /// The same span, seen from the new document. Mapping through the
  /// inverted map takes post-step positions back to pre-step ones.
  pub fn invert(&self) -> Self {
    Self {
      start:    self.start,
      old_size: self.new_size,
      new_size: self.old_size,
    }
  }

  pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
    self.map_result(pos, assoc).pos
  }

  /// A position strictly inside the replaced span maps to the span boundary
  /// on its `assoc` side; deletion never invents a location.
  pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
    let end = self.start + self.old_size;
    if pos < self.start || (pos == self.start && assoc == Assoc::Before) {
      return MapResult {
        pos,
        deleted: false,
      };
    }
    if pos > end || (pos == end && assoc == Assoc::After) {
      return MapResult {
        pos:     pos + self.new_size - self.old_size,
        deleted: false,
      };
    }
    let side = match assoc {
      Assoc::Before => self.start,
      Assoc::After => self.start + self.new_size,
    };
    MapResult {
      pos:     side,
      deleted: pos > self.start && pos < end,
    }
  }
}

/// An ordered sequence of step maps. Mapping folds left, so mapping through
/// a whole mapping equals mapping through each step map in turn.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
  maps: Vec<StepMap>,
}

impl Mapping {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, map: StepMap) {
    self.maps.push(map);
  }

  pub fn append(&mut self, other: &Mapping) {
    self.maps.extend_from_slice(&other.maps);
  }

  pub fn maps(&self) -> &[StepMap] {
    &self.maps
  }

  pub fn is_empty(&self) -> bool {
    self.maps.is_empty()
  }

  pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
    self.maps.iter().fold(pos, |p, m| m.map(p, assoc))
  }

  pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
    let mut deleted = false;
    let mut pos = pos;
    for m in &self.maps {
      let r = m.map_result(pos, assoc);
      pos = r.pos;
      deleted |= r.deleted;
    }
    MapResult { pos, deleted }
  }

  /// The reverse mapping, for carrying positions from the new document back
  /// to the old one.
  pub fn invert(&self) -> Self {
    Self {
      maps: self.maps.iter().rev().map(StepMap::invert).collect(),
    }
  }
}
