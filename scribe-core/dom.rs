//! External-representation (HTML) mapping data carried by node and mark
//! types, plus the element tree the import side matches rules against.
//!
//! The actual translators live in `scribe-lib`; this module only defines the
//! shapes a schema declares: [`ParseRule`] for the import direction and
//! [`ExportTag`] (produced by a type's `to_html` function) for the export
//! direction.

use crate::{
  Tendril,
  node::Attrs,
};

/// An element in the parsed external representation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomElem {
  pub tag:      Tendril,
  pub attrs:    Vec<(Tendril, Tendril)>,
  pub children: Vec<DomChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomChild {
  Elem(DomElem),
  Text(Tendril),
}

impl DomElem {
  pub fn attr(&self, name: &str) -> Option<&str> {
    self
      .attrs
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  /// The value of one property inside a `style="…"` attribute.
  pub fn style(&self, prop: &str) -> Option<&str> {
    let style = self.attr("style")?;
    for decl in style.split(';') {
      // Declarations without a colon are malformed; skip them rather than
      // giving up on the rest.
      let Some((name, value)) = decl.split_once(':') else {
        continue;
      };
      if name.trim() == prop {
        return Some(value.trim());
      }
    }
    None
  }
}

/// Extracts attribute values from a matched element. Returning `None` means
/// the rule does not apply after all and matching continues.
pub type GetAttrs = fn(&DomElem) -> Option<Attrs>;

/// One import-side matching rule. A rule matches an element when its `tag`
/// (if set) equals the element's tag name and its `style` property (if set)
/// is present in the element's style attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseRule {
  pub tag:       Option<&'static str>,
  pub style:     Option<&'static str>,
  pub get_attrs: Option<GetAttrs>,
}

impl ParseRule {
  pub fn tag(tag: &'static str) -> Self {
    Self {
      tag: Some(tag),
      ..Self::default()
    }
  }

  pub fn style(tag: &'static str, style: &'static str) -> Self {
    Self {
      tag: Some(tag),
      style: Some(style),
      ..Self::default()
    }
  }

  pub fn with_attrs(mut self, get_attrs: GetAttrs) -> Self {
    self.get_attrs = Some(get_attrs);
    self
  }

  pub fn matches(&self, elem: &DomElem) -> bool {
    if let Some(tag) = self.tag
      && elem.tag != tag
    {
      return false;
    }
    if let Some(style) = self.style
      && elem.style(style).is_none()
    {
      return false;
    }
    self.tag.is_some() || self.style.is_some()
  }
}

/// The export-side rendering of one node or mark: a tag name plus rendered
/// attributes. Child content (or marked text) goes inside; leaf nodes render
/// as void elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTag {
  pub name:  Tendril,
  pub attrs: Vec<(Tendril, Tendril)>,
}

impl ExportTag {
  pub fn new(name: &str) -> Self {
    Self {
      name:  Tendril::from(name),
      attrs: Vec::new(),
    }
  }

  pub fn with_attr(mut self, name: &str, value: impl Into<Tendril>) -> Self {
    self.attrs.push((Tendril::from(name), value.into()));
    self
  }
}

/// Renders a node's or mark's attributes into its export tag.
pub type ToHtml = fn(&Attrs) -> ExportTag;
