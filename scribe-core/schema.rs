//! Schema registry: the static description of which node and mark types a
//! document may contain, their attributes, and their nesting constraints.
//!
//! A [`Schema`] is built once from [`NodeTypeSpec`]s and [`MarkTypeSpec`]s via
//! [`Schema::define`] and is immutable afterwards. Editors receive their
//! schema as a constructor argument; two editors with different schemas are
//! fully independent instances, never a merged registry.
//!
//! # Example
//!
//! ```ignore
//! use scribe_core::schema::{Schema, NodeTypeSpec, MarkTypeSpec};
//!
//! let schema = Schema::define(
//!   vec![
//!     NodeTypeSpec::new("doc").content("block+"),
//!     NodeTypeSpec::new("paragraph").content("inline*").group("block"),
//!     NodeTypeSpec::new("text").inline().group("inline"),
//!   ],
//!   vec![MarkTypeSpec::new("strong")],
//!   "doc",
//! )?;
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::{
  Tendril,
  content::{
    ContentExpr,
    ContentExprError,
  },
  dom::{
    ParseRule,
    ToHtml,
  },
};

pub type Result<T> = std::result::Result<T, SchemaError>;

/// Malformed type declarations. Fatal at startup, never recovered.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
  #[error("duplicate node type {0:?}")]
  DuplicateNode(Tendril),
  #[error("duplicate mark type {0:?}")]
  DuplicateMark(Tendril),
  #[error("content expression of {node:?} references undeclared type or group {name:?}")]
  UnknownContentRef { node: Tendril, name: Tendril },
  #[error("root type {0:?} is not declared")]
  UnknownRoot(Tendril),
  #[error("root type {0:?} is inline")]
  InlineRoot(Tendril),
  #[error("root type {0:?} has no content expression")]
  LeafRoot(Tendril),
  #[error("mark type {mark:?} excludes undeclared mark {name:?}")]
  UnknownExclusion { mark: Tendril, name: Tendril },
  #[error("attribute {attr:?} of {owner:?} has a default that fails its own validator")]
  InvalidDefault { owner: Tendril, attr: Tendril },
  #[error(transparent)]
  ContentExpr(#[from] ContentExprError),
}

/// Validates one attribute value. Plain function pointers keep type
/// declarations `Copy` and comparable; schemas are defined in code.
pub type AttrValidator = fn(&Value) -> bool;

#[derive(Debug, Clone, Default)]
pub struct AttrSpec {
  pub default:  Option<Value>,
  pub validate: Option<AttrValidator>,
}

impl AttrSpec {
  pub fn with_default(value: impl Into<Value>) -> Self {
    Self {
      default:  Some(value.into()),
      validate: None,
    }
  }

  pub fn required() -> Self {
    Self::default()
  }

  pub fn validated(mut self, validate: AttrValidator) -> Self {
    self.validate = Some(validate);
    self
  }
}

/// Declaration of one node type, consumed by [`Schema::define`].
#[derive(Debug, Clone, Default)]
pub struct NodeTypeSpec {
  pub name:    Tendril,
  pub content: Option<Tendril>,
  pub groups:  Vec<Tendril>,
  pub inline:  bool,
  pub attrs:   IndexMap<Tendril, AttrSpec>,
  pub parse:   Vec<ParseRule>,
  pub to_html: Option<ToHtml>,
}

impl NodeTypeSpec {
  pub fn new(name: &str) -> Self {
    Self {
      name: Tendril::from(name),
      ..Self::default()
    }
  }

  pub fn content(mut self, expr: &str) -> Self {
    self.content = Some(Tendril::from(expr));
    self
  }

  pub fn group(mut self, group: &str) -> Self {
    self.groups.push(Tendril::from(group));
    self
  }

  pub fn inline(mut self) -> Self {
    self.inline = true;
    self
  }

  pub fn attr(mut self, name: &str, spec: AttrSpec) -> Self {
    self.attrs.insert(Tendril::from(name), spec);
    self
  }

  pub fn parse_rule(mut self, rule: ParseRule) -> Self {
    self.parse.push(rule);
    self
  }

  pub fn to_html(mut self, to_html: ToHtml) -> Self {
    self.to_html = Some(to_html);
    self
  }
}

/// Declaration of one mark type.
#[derive(Debug, Clone, Default)]
pub struct MarkTypeSpec {
  pub name:     Tendril,
  pub attrs:    IndexMap<Tendril, AttrSpec>,
  /// Mark types this one cannot co-occur with. A mark always excludes other
  /// marks of its own type.
  pub excludes: Vec<Tendril>,
  pub parse:    Vec<ParseRule>,
  pub to_html:  Option<ToHtml>,
}

impl MarkTypeSpec {
  pub fn new(name: &str) -> Self {
    Self {
      name: Tendril::from(name),
      ..Self::default()
    }
  }

  pub fn attr(mut self, name: &str, spec: AttrSpec) -> Self {
    self.attrs.insert(Tendril::from(name), spec);
    self
  }

  pub fn excludes(mut self, name: &str) -> Self {
    self.excludes.push(Tendril::from(name));
    self
  }

  pub fn parse_rule(mut self, rule: ParseRule) -> Self {
    self.parse.push(rule);
    self
  }

  pub fn to_html(mut self, to_html: ToHtml) -> Self {
    self.to_html = Some(to_html);
    self
  }
}

/// A resolved node type inside a built schema.
#[derive(Debug)]
pub struct NodeType {
  pub name:    Tendril,
  pub groups:  Vec<Tendril>,
  pub inline:  bool,
  pub attrs:   IndexMap<Tendril, AttrSpec>,
  pub content: ContentExpr,
  pub parse:   Vec<ParseRule>,
  pub to_html: Option<ToHtml>,
  /// Whether this type holds no content at all.
  leaf:           bool,
  /// Whether every type this one's content expression can produce is inline.
  inline_content: bool,
}

impl NodeType {
  pub fn is_leaf(&self) -> bool {
    self.leaf
  }

  pub fn is_text(&self) -> bool {
    self.name == "text"
  }

  /// A non-leaf node whose content is inline (a paragraph-like node).
  pub fn is_textblock(&self) -> bool {
    !self.leaf && self.inline_content
  }

  pub fn inline_content(&self) -> bool {
    self.inline_content
  }

  pub fn in_group(&self, group: &str) -> bool {
    self.groups.iter().any(|g| g == group)
  }

  /// Whether a concrete child type sequence is legal for this type.
  pub fn valid_content(&self, children: &[&NodeType]) -> bool {
    if self.leaf {
      return children.is_empty();
    }
    self.content.matches(children)
  }
}

impl PartialEq for NodeType {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}

impl Eq for NodeType {}

/// A resolved mark type inside a built schema.
#[derive(Debug)]
pub struct MarkType {
  pub name:     Tendril,
  pub attrs:    IndexMap<Tendril, AttrSpec>,
  pub excludes: Vec<Tendril>,
  pub parse:    Vec<ParseRule>,
  pub to_html:  Option<ToHtml>,
}

impl MarkType {
  /// Whether marks of this type may not co-occur with marks of `other`.
  pub fn excludes(&self, other: &MarkType) -> bool {
    self.name == other.name || self.excludes.iter().any(|n| *n == other.name)
  }
}

impl PartialEq for MarkType {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}

impl Eq for MarkType {}

/// An immutable registry of node and mark types with a designated root type.
#[derive(Debug)]
pub struct Schema {
  nodes: IndexMap<Tendril, Arc<NodeType>>,
  marks: IndexMap<Tendril, Arc<MarkType>>,
  root:  Arc<NodeType>,
}

impl Schema {
  /// Build a schema. Fails when a content expression references an
  /// undeclared type, when the root is missing, inline, or a leaf, or when
  /// an attribute default fails its own validator.
  pub fn define(
    node_specs: Vec<NodeTypeSpec>,
    mark_specs: Vec<MarkTypeSpec>,
    root_name: &str,
  ) -> Result<Arc<Self>> {
    let mut nodes: IndexMap<Tendril, Arc<NodeType>> = IndexMap::with_capacity(node_specs.len());

    for spec in &node_specs {
      check_defaults(&spec.name, &spec.attrs)?;
      let content = match &spec.content {
        Some(expr) => ContentExpr::compile(expr)?,
        None => ContentExpr::default(),
      };
      let leaf = spec.content.is_none();
      let node_type = NodeType {
        name: spec.name.clone(),
        groups: spec.groups.clone(),
        inline: spec.inline || spec.name == "text",
        attrs: spec.attrs.clone(),
        content,
        parse: spec.parse.clone(),
        to_html: spec.to_html,
        leaf,
        inline_content: false,
      };
      if nodes.insert(spec.name.clone(), Arc::new(node_type)).is_some() {
        return Err(SchemaError::DuplicateNode(spec.name.clone()));
      }
    }

    // Every content expression may reference only declared types or groups.
    for node_type in nodes.values() {
      for name in node_type.content.referenced_names() {
        let declared = nodes.contains_key(name) || nodes.values().any(|t| t.in_group(name));
        if !declared {
          return Err(SchemaError::UnknownContentRef {
            node: node_type.name.clone(),
            name: name.clone(),
          });
        }
      }
    }

    // Compute `inline_content` now that all referenced types resolve.
    let inline_flags: Vec<bool> = nodes
      .values()
      .map(|t| {
        !t.leaf
          && t.content.referenced_names().count() > 0
          && t.content.referenced_names().all(|name| {
            nodes
              .values()
              .filter(|c| c.name == *name || c.in_group(name))
              .all(|c| c.inline)
          })
      })
      .collect();
    for (node_type, inline_content) in nodes.values_mut().zip(inline_flags) {
      // Nothing else holds a reference yet; the Arc is still unique.
      if let Some(t) = Arc::get_mut(node_type) {
        t.inline_content = inline_content;
      }
    }

    let mut marks: IndexMap<Tendril, Arc<MarkType>> = IndexMap::with_capacity(mark_specs.len());
    for spec in &mark_specs {
      check_defaults(&spec.name, &spec.attrs)?;
      let mark_type = MarkType {
        name:     spec.name.clone(),
        attrs:    spec.attrs.clone(),
        excludes: spec.excludes.clone(),
        parse:    spec.parse.clone(),
        to_html:  spec.to_html,
      };
      if marks.insert(spec.name.clone(), Arc::new(mark_type)).is_some() {
        return Err(SchemaError::DuplicateMark(spec.name.clone()));
      }
    }
    for mark_type in marks.values() {
      for name in &mark_type.excludes {
        if !marks.contains_key(name) {
          return Err(SchemaError::UnknownExclusion {
            mark: mark_type.name.clone(),
            name: name.clone(),
          });
        }
      }
    }

    let root = nodes
      .get(root_name)
      .cloned()
      .ok_or_else(|| SchemaError::UnknownRoot(Tendril::from(root_name)))?;
    if root.inline {
      return Err(SchemaError::InlineRoot(root.name.clone()));
    }
    // Positions are resolved by descending into the root's content, so a
    // contentless root has no position space at all.
    if root.is_leaf() {
      return Err(SchemaError::LeafRoot(root.name.clone()));
    }

    Ok(Arc::new(Self { nodes, marks, root }))
  }

  pub fn node_type(&self, name: &str) -> Option<&Arc<NodeType>> {
    self.nodes.get(name)
  }

  pub fn mark_type(&self, name: &str) -> Option<&Arc<MarkType>> {
    self.marks.get(name)
  }

  pub fn root_type(&self) -> &Arc<NodeType> {
    &self.root
  }

  pub fn node_types(&self) -> impl Iterator<Item = &Arc<NodeType>> {
    self.nodes.values()
  }

  pub fn mark_types(&self) -> impl Iterator<Item = &Arc<MarkType>> {
    self.marks.values()
  }

  /// All concrete types matching a content-expression name (a type name or a
  /// group name).
  pub fn types_in(&self, name: &str) -> impl Iterator<Item = &Arc<NodeType>> {
    self
      .nodes
      .values()
      .filter(move |t| t.name == name || t.in_group(name))
  }
}

fn check_defaults(owner: &Tendril, attrs: &IndexMap<Tendril, AttrSpec>) -> Result<()> {
  for (name, spec) in attrs {
    if let (Some(default), Some(validate)) = (&spec.default, spec.validate)
      && !validate(default)
    {
      return Err(SchemaError::InvalidDefault {
        owner: owner.clone(),
        attr:  name.clone(),
      });
    }
  }
  Ok(())
}
