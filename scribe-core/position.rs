//! Flat position addressing.
//!
//! A position is an integer in `[0, doc.content_size()]` naming a boundary in
//! the document: the gap before or after a node, or a gap between two
//! characters of a text run. Positions are only meaningful for the document
//! version they were computed against; after an edit they must be carried
//! over through the edit's position map.
//!
//! [`resolve`] turns a position into a [`ResolvedPos`]: the chain of
//! ancestors containing it plus the offset inside the innermost one.

use std::sync::Arc;

use thiserror::Error;

use crate::node::Node;

pub type Result<T> = std::result::Result<T, PositionError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PositionError {
  #[error("position {pos} is out of bounds for document of size {size}")]
  OutOfBounds { pos: usize, size: usize },
  #[error("position {pos} does not point before a node")]
  NoNodeAfter { pos: usize },
}

#[derive(Debug, Clone)]
struct PathEntry {
  node:  Arc<Node>,
  /// Index of the child the position points at (or descends into) within
  /// `node`.
  index: usize,
  /// Absolute position where `node`'s content starts.
  start: usize,
}

/// A position along with the chain of nodes containing it.
///
/// Depth 0 is the document root; `node(depth())` is the innermost node whose
/// content holds the position.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
  pub pos:     usize,
  path:        Vec<PathEntry>,
  /// Offset of `pos` into the innermost node's content.
  parent_offset: usize,
}

impl ResolvedPos {
  pub fn depth(&self) -> usize {
    self.path.len() - 1
  }

  pub fn node(&self, depth: usize) -> &Arc<Node> {
    &self.path[depth].node
  }

  /// The innermost node containing the position.
  pub fn parent(&self) -> &Arc<Node> {
    self.node(self.depth())
  }

  /// The child index the position points at (or into) at `depth`.
  pub fn index(&self, depth: usize) -> usize {
    self.path[depth].index
  }

  /// Absolute position where the content of `node(depth)` starts.
  pub fn start(&self, depth: usize) -> usize {
    self.path[depth].start
  }

  /// Absolute position where the content of `node(depth)` ends.
  pub fn end(&self, depth: usize) -> usize {
    self.start(depth) + self.node(depth).content_size()
  }

  /// Position just before `node(depth)`. Meaningless for the root.
  pub fn before(&self, depth: usize) -> usize {
    self.start(depth) - 1
  }

  /// Position just after `node(depth)`. Meaningless for the root.
  pub fn after(&self, depth: usize) -> usize {
    self.end(depth) + 1
  }

  /// Offset of the position into its innermost node's content.
  pub fn parent_offset(&self) -> usize {
    self.parent_offset
  }

  /// The child of the innermost node directly after the position, if any.
  pub fn node_after(&self) -> Option<&Arc<Node>> {
    let entry = self.path.last().expect("path is never empty");
    let (index, start) = entry
      .node
      .content()
      .map(|c| c.index_at(self.parent_offset))
      .unwrap_or((0, 0));
    if start != self.parent_offset {
      // Inside a text run; no node starts here.
      return None;
    }
    entry.node.child(index)
  }

  /// Offset into the text run the position falls inside, zero at a boundary.
  pub fn text_offset(&self) -> usize {
    let entry = self.path.last().expect("path is never empty");
    match entry.node.content() {
      Some(content) => {
        let (_, start) = content.index_at(self.parent_offset);
        self.parent_offset - start
      },
      None => 0,
    }
  }

  /// The deepest depth at which `self` and `other` sit inside the same node.
  pub fn shared_depth(&self, other: &ResolvedPos) -> usize {
    let mut depth = 0;
    let max = self.depth().min(other.depth());
    while depth < max
      && self.index(depth) == other.index(depth)
      && self.start(depth + 1) == other.start(depth + 1)
    {
      depth += 1;
    }
    depth
  }
}

/// Resolve a flat position against a document root.
pub fn resolve(doc: &Arc<Node>, pos: usize) -> Result<ResolvedPos> {
  if pos > doc.content_size() {
    return Err(PositionError::OutOfBounds {
      pos,
      size: doc.content_size(),
    });
  }

  let mut path = Vec::new();
  let mut node = Arc::clone(doc);
  let mut start = 0;

  loop {
    let offset = pos - start;
    let content = node
      .content()
      .expect("non-leaf nodes are the only ones descended into");
    let (index, child_start) = content.index_at(offset);

    let descend = match content.child(index) {
      // Strictly inside a non-text child: descend.
      Some(child) if !child.is_leaf() && offset > child_start => true,
      _ => false,
    };

    path.push(PathEntry {
      node: Arc::clone(&node),
      index,
      start,
    });

    if !descend {
      return Ok(ResolvedPos {
        pos,
        path,
        parent_offset: offset,
      });
    }

    let child = Arc::clone(content.child(index).expect("checked above"));
    start = start + child_start + 1;
    node = child;
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    node::{
      Attrs,
      MarkSet,
    },
    schema::{
      NodeTypeSpec,
      Schema,
    },
  };

  fn doc() -> Arc<Node> {
    let schema = Schema::define(
      vec![
        NodeTypeSpec::new("doc").content("block+"),
        NodeTypeSpec::new("blockquote").content("block+").group("block"),
        NodeTypeSpec::new("paragraph").content("text*").group("block"),
        NodeTypeSpec::new("text").inline(),
      ],
      vec![],
      "doc",
    )
    .unwrap();
    let para = |text: &str| {
      schema
        .node_type("paragraph")
        .unwrap()
        .create(Attrs::new(), [schema.text(text, MarkSet::new()).unwrap()])
        .unwrap()
    };
    let quote = schema
      .node_type("blockquote")
      .unwrap()
      .create(Attrs::new(), [para("cd")])
      .unwrap();
    schema
      .node_type("doc")
      .unwrap()
      .create(Attrs::new(), [para("ab"), quote])
      .unwrap()
  }

  // Layout: doc( paragraph("ab") blockquote( paragraph("cd") ) )
  // positions: 0 <p> 1 a 2 b 3 </p> 4 <bq> 5 <p> 6 c 7 d 8 </p> 9 </bq> 10

  #[test]
  fn resolve_inside_text() {
    let doc = doc();
    assert_eq!(doc.content_size(), 10);

    let rp = resolve(&doc, 2).unwrap();
    assert_eq!(rp.depth(), 1);
    assert_eq!(rp.parent().type_name(), "paragraph");
    assert_eq!(rp.parent_offset(), 1);
    assert_eq!(rp.text_offset(), 1);
    assert_eq!(rp.start(1), 1);
    assert_eq!(rp.end(1), 3);
  }

  #[test]
  fn resolve_at_boundaries() {
    let doc = doc();

    let rp = resolve(&doc, 0).unwrap();
    assert_eq!(rp.depth(), 0);
    assert_eq!(rp.index(0), 0);
    assert_eq!(rp.node_after().unwrap().type_name(), "paragraph");

    let rp = resolve(&doc, 4).unwrap();
    assert_eq!(rp.depth(), 0);
    assert_eq!(rp.index(0), 1);
    assert_eq!(rp.node_after().unwrap().type_name(), "blockquote");

    let rp = resolve(&doc, 10).unwrap();
    assert_eq!(rp.depth(), 0);
    assert_eq!(rp.index(0), 2);
    assert!(rp.node_after().is_none());
  }

  #[test]
  fn resolve_nested() {
    let doc = doc();
    let rp = resolve(&doc, 7).unwrap();
    assert_eq!(rp.depth(), 2);
    assert_eq!(rp.node(1).type_name(), "blockquote");
    assert_eq!(rp.parent().type_name(), "paragraph");
    assert_eq!(rp.parent_offset(), 1);
    assert_eq!(rp.before(2), 5);
    assert_eq!(rp.after(2), 9);
  }

  #[test]
  fn out_of_bounds() {
    let doc = doc();
    assert!(matches!(
      resolve(&doc, 11),
      Err(PositionError::OutOfBounds { pos: 11, size: 10 })
    ));
  }

  #[test]
  fn shared_depth() {
    let doc = doc();
    let a = resolve(&doc, 2).unwrap();
    let b = resolve(&doc, 7).unwrap();
    assert_eq!(a.shared_depth(&b), 0);

    let c = resolve(&doc, 6).unwrap();
    assert_eq!(b.shared_depth(&c), 2);

    let d = resolve(&doc, 1).unwrap();
    assert_eq!(a.shared_depth(&d), 1);
  }
}
