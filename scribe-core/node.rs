//! The immutable document tree.
//!
//! A [`Node`] is a typed, attributed value. Block nodes own a [`Fragment`] of
//! children, text nodes own a run of characters plus a [`MarkSet`], and leaf
//! nodes own nothing. Nodes are only ever handed out behind `Arc`: edits
//! build new trees that reuse every untouched subtree, they never mutate.
//!
//! # Sizes
//!
//! Every node occupies a fixed span in the flat position space:
//!
//! - text node: its character count
//! - other leaf: 1
//! - any other node: 2 (its boundary tokens) + the size of its content
//!
//! The addressable positions of a document are `0..=doc.content_size()`.
//!
//! # Construction
//!
//! All construction goes through the schema:
//! [`NodeType::create`] validates attributes against the type's attribute
//! specs and the child sequence against its content expression;
//! [`Schema::text`] builds text runs. A violation is a [`ValidationError`] -
//! a malformed tree is never handed back to the caller.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  Tendril,
  schema::{
    AttrSpec,
    MarkType,
    NodeType,
    Schema,
  },
};

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Attribute values of one node or mark.
pub type Attrs = IndexMap<Tendril, Value>;

/// Attempted construction of a node that violates its schema.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
  #[error("unknown attribute {attr:?} on {owner:?}")]
  UnknownAttr { owner: Tendril, attr: Tendril },
  #[error("missing required attribute {attr:?} on {owner:?}")]
  MissingAttr { owner: Tendril, attr: Tendril },
  #[error("invalid value for attribute {attr:?} on {owner:?}")]
  InvalidAttr { owner: Tendril, attr: Tendril },
  #[error("invalid content for node type {owner:?}: [{children}]")]
  InvalidContent { owner: Tendril, children: String },
  #[error("leaf node type {0:?} cannot have children")]
  LeafWithChildren(Tendril),
  #[error("node type {0:?} is not constructed this way")]
  NotText(Tendril),
  #[error("schema declares no \"text\" node type")]
  NoTextType,
}

fn check_attrs(
  owner: &Tendril,
  specs: &IndexMap<Tendril, AttrSpec>,
  given: Attrs,
) -> Result<Attrs> {
  for attr in given.keys() {
    if !specs.contains_key(attr) {
      return Err(ValidationError::UnknownAttr {
        owner: owner.clone(),
        attr:  attr.clone(),
      });
    }
  }

  let mut attrs = Attrs::with_capacity(specs.len());
  for (name, spec) in specs {
    let value = match given.get(name) {
      Some(value) => value.clone(),
      None => match &spec.default {
        Some(default) => default.clone(),
        None => {
          return Err(ValidationError::MissingAttr {
            owner: owner.clone(),
            attr:  name.clone(),
          });
        },
      },
    };
    if let Some(validate) = spec.validate
      && !validate(&value)
    {
      return Err(ValidationError::InvalidAttr {
        owner: owner.clone(),
        attr:  name.clone(),
      });
    }
    attrs.insert(name.clone(), value);
  }
  Ok(attrs)
}

/// A typed, attributed annotation on a run of inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
  pub mark_type: Arc<MarkType>,
  pub attrs:     Attrs,
}

impl Mark {
  pub fn type_name(&self) -> &str {
    &self.mark_type.name
  }
}

impl MarkType {
  /// Instantiate a mark of this type, validating its attributes.
  pub fn create(self: &Arc<Self>, attrs: Attrs) -> Result<Mark> {
    let attrs = check_attrs(&self.name, &self.attrs, attrs)?;
    Ok(Mark {
      mark_type: Arc::clone(self),
      attrs,
    })
  }
}

/// An ordered set of marks, kept sorted by type name. Adding a mark removes
/// any mark its type excludes, so no two mutually-exclusive marks co-occur.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkSet(SmallVec<[Mark; 2]>);

impl MarkSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_marks(marks: impl IntoIterator<Item = Mark>) -> Self {
    let mut set = Self::new();
    for mark in marks {
      set.add(mark);
    }
    set
  }

  pub fn add(&mut self, mark: Mark) {
    self.0.retain(|m| !mark.mark_type.excludes(&m.mark_type));
    let at = self
      .0
      .iter()
      .position(|m| m.type_name() > mark.type_name())
      .unwrap_or(self.0.len());
    self.0.insert(at, mark);
  }

  pub fn remove(&mut self, mark_type: &MarkType) {
    self.0.retain(|m| m.mark_type.name != mark_type.name);
  }

  pub fn contains(&self, mark: &Mark) -> bool {
    self.0.iter().any(|m| m == mark)
  }

  pub fn contains_type(&self, mark_type: &MarkType) -> bool {
    self.0.iter().any(|m| m.mark_type.name == mark_type.name)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Mark> {
    self.0.iter()
  }

  #[must_use]
  pub fn with(&self, mark: Mark) -> Self {
    let mut set = self.clone();
    set.add(mark);
    set
  }

  #[must_use]
  pub fn without(&self, mark_type: &MarkType) -> Self {
    let mut set = self.clone();
    set.remove(mark_type);
    set
  }
}

/// An owned sequence of sibling nodes with a cached total size.
///
/// Construction normalizes the sequence: adjacent text nodes carrying equal
/// mark sets are merged and empty text runs are dropped, so structurally
/// equal content always compares equal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
  children: Vec<Arc<Node>>,
  size:     usize,
}

impl Fragment {
  pub fn new(nodes: impl IntoIterator<Item = Arc<Node>>) -> Self {
    let mut children: Vec<Arc<Node>> = Vec::new();
    for node in nodes {
      if let Some(text) = node.text()
        && text.is_empty()
      {
        continue;
      }
      if let (Some(last), Some(text)) = (children.last(), node.text())
        && let Some(prev) = last.text()
        && last.marks() == node.marks()
      {
        let mut merged = Tendril::from(prev);
        merged.push_str(text);
        let joined = Node {
          node_type: Arc::clone(&node.node_type),
          attrs:     node.attrs.clone(),
          body:      NodeBody::Text {
            text:  merged,
            marks: node.marks().clone(),
          },
        };
        *children.last_mut().unwrap() = Arc::new(joined);
        continue;
      }
      children.push(node);
    }
    let size = children.iter().map(|c| c.size()).sum();
    Self { children, size }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  /// Total span of the children in the position space.
  pub fn size(&self) -> usize {
    self.size
  }

  pub fn child_count(&self) -> usize {
    self.children.len()
  }

  pub fn child(&self, index: usize) -> Option<&Arc<Node>> {
    self.children.get(index)
  }

  pub fn children(&self) -> &[Arc<Node>] {
    &self.children
  }

  pub fn is_empty(&self) -> bool {
    self.children.is_empty()
  }

  /// Locate the child at a local offset: returns `(index, child_start)` of
  /// the child whose span contains `offset`, or `(child_count, size)` when
  /// `offset` sits at the very end.
  pub fn index_at(&self, offset: usize) -> (usize, usize) {
    let mut start = 0;
    for (index, child) in self.children.iter().enumerate() {
      let end = start + child.size();
      if offset < end {
        return (index, start);
      }
      start = end;
    }
    (self.children.len(), self.size)
  }

  /// The types of the children, for content-expression checks.
  pub fn child_types(&self) -> Vec<&NodeType> {
    self.children.iter().map(|c| c.node_type().as_ref()).collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeBody {
  Leaf { marks: MarkSet },
  Text { text: Tendril, marks: MarkSet },
  Block { content: Fragment },
}

/// A single node of the document tree. See the module docs for the size and
/// construction rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  node_type: Arc<NodeType>,
  attrs:     Attrs,
  body:      NodeBody,
}

impl Node {
  pub fn node_type(&self) -> &Arc<NodeType> {
    &self.node_type
  }

  pub fn type_name(&self) -> &str {
    &self.node_type.name
  }

  pub fn attrs(&self) -> &Attrs {
    &self.attrs
  }

  pub fn attr(&self, name: &str) -> Option<&Value> {
    self.attrs.get(name)
  }

  pub fn is_text(&self) -> bool {
    matches!(self.body, NodeBody::Text { .. })
  }

  pub fn is_leaf(&self) -> bool {
    !matches!(self.body, NodeBody::Block { .. })
  }

  pub fn is_textblock(&self) -> bool {
    self.node_type.is_textblock()
  }

  pub fn is_inline(&self) -> bool {
    self.node_type.inline
  }

  pub fn text(&self) -> Option<&str> {
    match &self.body {
      NodeBody::Text { text, .. } => Some(text),
      _ => None,
    }
  }

  pub fn marks(&self) -> &MarkSet {
    static EMPTY: MarkSet = MarkSet(SmallVec::new_const());
    match &self.body {
      NodeBody::Leaf { marks } | NodeBody::Text { marks, .. } => marks,
      NodeBody::Block { .. } => &EMPTY,
    }
  }

  pub fn content(&self) -> Option<&Fragment> {
    match &self.body {
      NodeBody::Block { content } => Some(content),
      _ => None,
    }
  }

  pub fn child(&self, index: usize) -> Option<&Arc<Node>> {
    self.content().and_then(|c| c.child(index))
  }

  pub fn child_count(&self) -> usize {
    self.content().map_or(0, |c| c.child_count())
  }

  /// The full span this node occupies, boundary tokens included.
  pub fn size(&self) -> usize {
    match &self.body {
      NodeBody::Text { text, .. } => text.chars().count(),
      NodeBody::Leaf { .. } => 1,
      NodeBody::Block { content } => 2 + content.size(),
    }
  }

  /// The span of this node's content. For a document root this is the range
  /// of addressable positions.
  pub fn content_size(&self) -> usize {
    match &self.body {
      NodeBody::Block { content } => content.size(),
      _ => 0,
    }
  }

  /// Concatenated text of this subtree.
  pub fn text_content(&self) -> String {
    match &self.body {
      NodeBody::Text { text, .. } => text.to_string(),
      NodeBody::Leaf { .. } => String::new(),
      NodeBody::Block { content } => {
        content.children().iter().map(|c| c.text_content()).collect()
      },
    }
  }

  /// A copy of this node with new content, revalidated against the type's
  /// content expression.
  pub fn copy(&self, content: Fragment) -> Result<Arc<Node>> {
    if !self.node_type.valid_content(&content.child_types()) {
      return Err(invalid_content(&self.node_type, &content));
    }
    Ok(Arc::new(Node {
      node_type: Arc::clone(&self.node_type),
      attrs:     self.attrs.clone(),
      body:      NodeBody::Block { content },
    }))
  }

  /// A copy of this node with one child replaced. The child sequence keeps
  /// its shape, but the content expression is still re-checked in case the
  /// new child changed type.
  pub fn replace_child(&self, index: usize, child: Arc<Node>) -> Result<Arc<Node>> {
    let Some(content) = self.content() else {
      return Err(ValidationError::LeafWithChildren(self.node_type.name.clone()));
    };
    let mut children = content.children().to_vec();
    children[index] = child;
    self.copy(Fragment::new(children))
  }

  /// A copy of this node with new, revalidated attributes.
  pub fn with_attrs(&self, attrs: Attrs) -> Result<Arc<Node>> {
    let attrs = check_attrs(&self.node_type.name, &self.node_type.attrs, attrs)?;
    Ok(Arc::new(Node {
      node_type: Arc::clone(&self.node_type),
      attrs,
      body: self.body.clone(),
    }))
  }

  /// A copy of a text node covering the given character range.
  pub fn cut_text(&self, from: usize, to: usize) -> Result<Arc<Node>> {
    let NodeBody::Text { text, marks } = &self.body else {
      return Err(ValidationError::NotText(self.node_type.name.clone()));
    };
    let sliced: Tendril = text.chars().skip(from).take(to.saturating_sub(from)).collect();
    Ok(Arc::new(Node {
      node_type: Arc::clone(&self.node_type),
      attrs:     self.attrs.clone(),
      body:      NodeBody::Text {
        text:  sliced,
        marks: marks.clone(),
      },
    }))
  }

  /// A copy of a text or inline-leaf node with a different mark set.
  pub fn with_marks(&self, marks: MarkSet) -> Result<Arc<Node>> {
    let body = match &self.body {
      NodeBody::Text { text, .. } => NodeBody::Text {
        text: text.clone(),
        marks,
      },
      NodeBody::Leaf { .. } => NodeBody::Leaf { marks },
      NodeBody::Block { .. } => {
        return Err(ValidationError::NotText(self.node_type.name.clone()));
      },
    };
    Ok(Arc::new(Node {
      node_type: Arc::clone(&self.node_type),
      attrs: self.attrs.clone(),
      body,
    }))
  }
}

fn invalid_content(node_type: &NodeType, content: &Fragment) -> ValidationError {
  let children = content
    .children()
    .iter()
    .map(|c| c.type_name())
    .collect::<Vec<_>>()
    .join(", ");
  ValidationError::InvalidContent {
    owner: node_type.name.clone(),
    children,
  }
}

impl NodeType {
  /// Instantiate a node of this type, validating attributes and the child
  /// sequence. Text nodes are built with [`Schema::text`] instead.
  pub fn create(
    self: &Arc<Self>,
    attrs: Attrs,
    children: impl IntoIterator<Item = Arc<Node>>,
  ) -> Result<Arc<Node>> {
    if self.is_text() {
      return Err(ValidationError::NotText(self.name.clone()));
    }
    let attrs = check_attrs(&self.name, &self.attrs, attrs)?;
    let content = Fragment::new(children);

    if self.is_leaf() {
      if !content.is_empty() {
        return Err(ValidationError::LeafWithChildren(self.name.clone()));
      }
      return Ok(Arc::new(Node {
        node_type: Arc::clone(self),
        attrs,
        body: NodeBody::Leaf {
          marks: MarkSet::new(),
        },
      }));
    }

    if !self.valid_content(&content.child_types()) {
      return Err(invalid_content(self, &content));
    }
    Ok(Arc::new(Node {
      node_type: Arc::clone(self),
      attrs,
      body: NodeBody::Block { content },
    }))
  }

  /// Instantiate an inline leaf carrying marks (a `hard_break` inside a
  /// `strong` run, say).
  pub fn create_marked(self: &Arc<Self>, attrs: Attrs, marks: MarkSet) -> Result<Arc<Node>> {
    if self.is_text() || !self.is_leaf() {
      return Err(ValidationError::NotText(self.name.clone()));
    }
    let attrs = check_attrs(&self.name, &self.attrs, attrs)?;
    Ok(Arc::new(Node {
      node_type: Arc::clone(self),
      attrs,
      body: NodeBody::Leaf { marks },
    }))
  }
}

impl Schema {
  /// Build a text node. Requires the schema to declare a `"text"` type.
  pub fn text(&self, text: &str, marks: MarkSet) -> Result<Arc<Node>> {
    let node_type = self.node_type("text").ok_or(ValidationError::NoTextType)?;
    Ok(Arc::new(Node {
      node_type: Arc::clone(node_type),
      attrs:     Attrs::new(),
      body:      NodeBody::Text {
        text: Tendril::from(text),
        marks,
      },
    }))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::schema::{
    MarkTypeSpec,
    NodeTypeSpec,
  };

  fn schema() -> Arc<Schema> {
    Schema::define(
      vec![
        NodeTypeSpec::new("doc").content("block+"),
        NodeTypeSpec::new("paragraph").content("inline*").group("block"),
        NodeTypeSpec::new("heading")
          .content("inline*")
          .group("block")
          .attr("level", AttrSpec::with_default(1)),
        NodeTypeSpec::new("text").inline().group("inline"),
        NodeTypeSpec::new("hard_break").inline().group("inline"),
      ],
      vec![
        MarkTypeSpec::new("strong").excludes("code"),
        MarkTypeSpec::new("code"),
      ],
      "doc",
    )
    .unwrap()
  }

  #[test]
  fn sizes() {
    let schema = schema();
    let text = schema.text("hello", MarkSet::new()).unwrap();
    assert_eq!(text.size(), 5);

    let para = schema
      .node_type("paragraph")
      .unwrap()
      .create(Attrs::new(), [text])
      .unwrap();
    assert_eq!(para.size(), 7);

    let doc = schema
      .node_type("doc")
      .unwrap()
      .create(Attrs::new(), [para])
      .unwrap();
    assert_eq!(doc.size(), 9);
    assert_eq!(doc.content_size(), 7);
    assert_eq!(doc.text_content(), "hello");
  }

  #[test]
  fn construction_validates_content() {
    let schema = schema();
    let text = schema.text("x", MarkSet::new()).unwrap();
    // A doc may not directly contain inline content.
    let err = schema
      .node_type("doc")
      .unwrap()
      .create(Attrs::new(), [text])
      .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidContent { .. }));
    // And it may not be empty (`block+`).
    let err = schema
      .node_type("doc")
      .unwrap()
      .create(Attrs::new(), [])
      .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidContent { .. }));
  }

  #[test]
  fn construction_validates_attrs() {
    let schema = schema();
    let heading = schema.node_type("heading").unwrap();
    let node = heading.create(Attrs::new(), []).unwrap();
    assert_eq!(node.attr("level"), Some(&Value::from(1)));

    let mut attrs = Attrs::new();
    attrs.insert("bogus".into(), Value::from(true));
    let err = heading.create(attrs, []).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownAttr { .. }));
  }

  #[test]
  fn fragment_merges_adjacent_text() {
    let schema = schema();
    let a = schema.text("ab", MarkSet::new()).unwrap();
    let b = schema.text("cd", MarkSet::new()).unwrap();
    let frag = Fragment::new([a, b]);
    assert_eq!(frag.child_count(), 1);
    assert_eq!(frag.child(0).unwrap().text(), Some("abcd"));
    assert_eq!(frag.size(), 4);

    // Different marks stay separate.
    let strong = schema.mark_type("strong").unwrap().create(Attrs::new()).unwrap();
    let a = schema.text("ab", MarkSet::new()).unwrap();
    let b = schema
      .text("cd", MarkSet::from_marks([strong]))
      .unwrap();
    let frag = Fragment::new([a, b]);
    assert_eq!(frag.child_count(), 2);
  }

  #[test]
  fn mark_exclusion_on_add() {
    let schema = schema();
    let strong = schema.mark_type("strong").unwrap().create(Attrs::new()).unwrap();
    let code = schema.mark_type("code").unwrap().create(Attrs::new()).unwrap();

    let mut marks = MarkSet::new();
    marks.add(code.clone());
    assert!(marks.contains(&code));
    // strong excludes code: adding it evicts the code mark.
    marks.add(strong.clone());
    assert!(marks.contains(&strong));
    assert!(!marks.contains(&code));
  }

  #[test]
  fn index_at() {
    let schema = schema();
    let text = schema.text("ab", MarkSet::new()).unwrap();
    let brk = schema
      .node_type("hard_break")
      .unwrap()
      .create(Attrs::new(), [])
      .unwrap();
    let text2 = schema.text("c", MarkSet::new()).unwrap();
    let frag = Fragment::new([text, brk, text2]);
    assert_eq!(frag.size(), 4);
    assert_eq!(frag.index_at(0), (0, 0));
    assert_eq!(frag.index_at(1), (0, 0));
    assert_eq!(frag.index_at(2), (1, 2));
    assert_eq!(frag.index_at(3), (2, 3));
    assert_eq!(frag.index_at(4), (3, 4));
  }
}
