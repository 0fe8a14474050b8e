//! HTML import and export, driven entirely by the schema's [`ParseRule`]s
//! and `to_html` templates.
//!
//! Export walks the tree and renders each node through its type's template,
//! nesting mark tags in mark-set order. Import runs a tolerant tokenizer
//! (mismatched and unclosed tags are repaired, unknown entities pass
//! through) and matches the resulting element tree against the schema's
//! parse rules, first match wins. What happens to elements no rule matches
//! is chosen per importer via [`UnmatchedPolicy`].

use std::sync::Arc;

use scribe_core::{
  Tendril,
  dom::{
    DomChild,
    DomElem,
    ExportTag,
  },
  node::{
    Attrs,
    MarkSet,
    Node,
    ValidationError,
  },
  schema::{
    NodeType,
    Schema,
  },
};
use thiserror::Error;
use tracing::warn;

pub type Result<T> = std::result::Result<T, HtmlError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HtmlError {
  #[error("node type {0:?} has no export template")]
  NoNodeTemplate(Tendril),
  #[error("mark type {0:?} has no export template")]
  NoMarkTemplate(Tendril),
  #[error("schema has no paragraph type to wrap inline content")]
  NoParagraphType,
  #[error(transparent)]
  Validation(#[from] ValidationError),
}

/// Serialize a document's content to an HTML string. The root node itself
/// renders no tag, only its children.
pub fn to_html(doc: &Node) -> Result<String> {
  let mut out = String::new();
  if let Some(content) = doc.content() {
    for child in content.children() {
      serialize(child, &mut out)?;
    }
  }
  Ok(out)
}

fn serialize(node: &Node, out: &mut String) -> Result<()> {
  let mut close: Vec<Tendril> = Vec::new();
  for mark in node.marks().iter() {
    let template = mark
      .mark_type
      .to_html
      .ok_or_else(|| HtmlError::NoMarkTemplate(mark.mark_type.name.clone()))?;
    let tag = template(&mark.attrs);
    open_tag(&tag, out);
    close.push(tag.name);
  }

  if let Some(text) = node.text() {
    escape_into(text, out);
  } else {
    let node_type = node.node_type();
    let template = node_type
      .to_html
      .ok_or_else(|| HtmlError::NoNodeTemplate(node_type.name.clone()))?;
    let tag = template(node.attrs());
    open_tag(&tag, out);
    if !node.is_leaf() {
      if let Some(content) = node.content() {
        for child in content.children() {
          serialize(child, out)?;
        }
      }
      out.push_str("</");
      out.push_str(&tag.name);
      out.push('>');
    }
  }

  for name in close.iter().rev() {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
  }
  Ok(())
}

fn open_tag(tag: &ExportTag, out: &mut String) {
  out.push('<');
  out.push_str(&tag.name);
  for (name, value) in &tag.attrs {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for c in value.chars() {
      match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        c => out.push(c),
      }
    }
    out.push('"');
  }
  out.push('>');
}

fn escape_into(text: &str, out: &mut String) {
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      c => out.push(c),
    }
  }
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "col", "meta", "link"];

/// Tokenize loose HTML into an element tree under a synthetic root element
/// with an empty tag name. Never fails: comments and doctypes are dropped,
/// a close tag with no matching open tag is ignored, and tags still open at
/// the end of input are closed.
pub fn parse_dom(html: &str) -> DomElem {
  let mut stack: Vec<DomElem> = vec![DomElem::default()];
  let mut rest = html;

  while !rest.is_empty() {
    let Some(lt) = rest.find('<') else {
      push_text(&mut stack, rest);
      break;
    };
    if lt > 0 {
      push_text(&mut stack, &rest[..lt]);
    }
    rest = &rest[lt + 1..];

    if let Some(after) = rest.strip_prefix("!--") {
      rest = after.find("-->").map(|end| &after[end + 3..]).unwrap_or("");
      continue;
    }
    if rest.starts_with('!') || rest.starts_with('?') {
      rest = rest.find('>').map(|end| &rest[end + 1..]).unwrap_or("");
      continue;
    }
    let Some(end) = rest.find('>') else {
      // A stray '<' at the end of input is literal text.
      push_text(&mut stack, "<");
      push_text(&mut stack, rest);
      break;
    };
    let inner = &rest[..end];
    rest = &rest[end + 1..];

    if let Some(name) = inner.strip_prefix('/') {
      close_tag(&mut stack, &name.trim().to_ascii_lowercase());
    } else {
      let (elem, self_closing) = parse_open(inner);
      if elem.tag.is_empty() {
        continue;
      }
      if self_closing || VOID_TAGS.contains(&elem.tag.as_str()) {
        attach(&mut stack, elem);
      } else {
        stack.push(elem);
      }
    }
  }

  while stack.len() > 1 {
    let elem = stack.pop().expect("stack holds the root");
    attach(&mut stack, elem);
  }
  stack.pop().unwrap_or_default()
}

fn push_text(stack: &mut [DomElem], text: &str) {
  if let Some(top) = stack.last_mut() {
    top.children.push(DomChild::Text(unescape(text)));
  }
}

fn attach(stack: &mut [DomElem], elem: DomElem) {
  if let Some(top) = stack.last_mut() {
    top.children.push(DomChild::Elem(elem));
  }
}

fn close_tag(stack: &mut Vec<DomElem>, name: &str) {
  let Some(open) = stack.iter().rposition(|e| e.tag == name) else {
    return;
  };
  if open == 0 {
    return;
  }
  while stack.len() > open {
    let elem = stack.pop().expect("stack holds the root");
    attach(stack, elem);
  }
}

fn parse_open(inner: &str) -> (DomElem, bool) {
  let inner = inner.trim();
  let (inner, self_closing) = match inner.strip_suffix('/') {
    Some(stripped) => (stripped.trim_end(), true),
    None => (inner, false),
  };

  let mut elem = DomElem::default();
  let name_end = inner
    .find(|c: char| c.is_whitespace())
    .unwrap_or(inner.len());
  elem.tag = Tendril::from(inner[..name_end].to_ascii_lowercase().as_str());

  let mut rest = inner[name_end..].trim_start();
  while !rest.is_empty() {
    let name_end = rest
      .find(|c: char| c.is_whitespace() || c == '=')
      .unwrap_or(rest.len());
    let name = rest[..name_end].to_ascii_lowercase();
    rest = rest[name_end..].trim_start();

    let value = if let Some(after) = rest.strip_prefix('=') {
      let after = after.trim_start();
      if let Some(quoted) = after.strip_prefix('"') {
        let end = quoted.find('"').unwrap_or(quoted.len());
        rest = quoted.get(end + 1..).unwrap_or("").trim_start();
        unescape(&quoted[..end])
      } else if let Some(quoted) = after.strip_prefix('\'') {
        let end = quoted.find('\'').unwrap_or(quoted.len());
        rest = quoted.get(end + 1..).unwrap_or("").trim_start();
        unescape(&quoted[..end])
      } else {
        let end = after
          .find(|c: char| c.is_whitespace())
          .unwrap_or(after.len());
        rest = after[end..].trim_start();
        unescape(&after[..end])
      }
    } else {
      Tendril::new()
    };
    if !name.is_empty() {
      elem.attrs.push((Tendril::from(name.as_str()), value));
    }
  }
  (elem, self_closing)
}

fn unescape(text: &str) -> Tendril {
  let mut out = Tendril::new();
  let mut rest = text;
  while let Some(amp) = rest.find('&') {
    out.push_str(&rest[..amp]);
    rest = &rest[amp..];
    // Entity names are short; give up past ten characters.
    let semi = rest
      .char_indices()
      .take(10)
      .find(|(_, c)| *c == ';')
      .map(|(i, _)| i);
    let decoded = semi.and_then(|semi| {
      let entity = &rest[1..semi];
      let c = match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => entity
          .strip_prefix("#x")
          .or_else(|| entity.strip_prefix("#X"))
          .and_then(|hex| u32::from_str_radix(hex, 16).ok())
          .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
          .and_then(char::from_u32),
      };
      c.map(|c| (c, semi))
    });
    match decoded {
      Some((c, semi)) => {
        out.push(c);
        rest = &rest[semi + 1..];
      },
      None => {
        out.push('&');
        rest = &rest[1..];
      },
    }
  }
  out.push_str(rest);
  out
}

/// What the importer does with an element no parse rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedPolicy {
  /// Drop the element but keep matching its children.
  #[default]
  Skip,
  /// Replace the whole element with its plain text content.
  AsText,
}

pub struct Importer {
  schema: Arc<Schema>,
  policy: UnmatchedPolicy,
}

impl Importer {
  pub fn new(schema: Arc<Schema>, policy: UnmatchedPolicy) -> Self {
    Self { schema, policy }
  }

  /// Parse an HTML string into a document. Inline content with no block
  /// parent is wrapped in paragraphs; an empty input produces a document
  /// with one empty paragraph.
  pub fn import(&self, html: &str) -> Result<Arc<Node>> {
    let dom = parse_dom(html);
    let nodes = self.import_children(&dom, &MarkSet::new())?;
    let mut blocks = self.wrap_inline(nodes)?;
    if blocks.is_empty()
      && let Some(paragraph) = self.schema.node_type("paragraph")
    {
      blocks.push(paragraph.create(Attrs::new(), [])?);
    }
    Ok(self.schema.root_type().create(Attrs::new(), blocks)?)
  }

  fn import_children(&self, elem: &DomElem, marks: &MarkSet) -> Result<Vec<Arc<Node>>> {
    let mut out = Vec::new();
    for child in &elem.children {
      match child {
        DomChild::Text(text) => {
          // Inter-tag whitespace is layout, not content.
          if !text.trim().is_empty() {
            out.push(self.schema.text(text, marks.clone())?);
          }
        },
        DomChild::Elem(child) => out.extend(self.import_elem(child, marks)?),
      }
    }
    Ok(out)
  }

  fn import_elem(&self, elem: &DomElem, marks: &MarkSet) -> Result<Vec<Arc<Node>>> {
    for node_type in self.schema.node_types() {
      for rule in &node_type.parse {
        if !rule.matches(elem) {
          continue;
        }
        let attrs = match rule.get_attrs {
          Some(get_attrs) => match get_attrs(elem) {
            Some(attrs) => attrs,
            // The rule backed out; keep matching.
            None => continue,
          },
          None => Attrs::new(),
        };
        return self.import_node(node_type, attrs, elem, marks);
      }
    }

    for mark_type in self.schema.mark_types() {
      for rule in &mark_type.parse {
        if !rule.matches(elem) {
          continue;
        }
        let attrs = match rule.get_attrs {
          Some(get_attrs) => match get_attrs(elem) {
            Some(attrs) => attrs,
            None => continue,
          },
          None => Attrs::new(),
        };
        match mark_type.create(attrs) {
          Ok(mark) => return self.import_children(elem, &marks.with(mark)),
          Err(err) => {
            warn!(tag = %elem.tag, %err, "mark attrs failed validation, ignoring mark");
            return self.import_children(elem, marks);
          },
        }
      }
    }

    match self.policy {
      UnmatchedPolicy::Skip => self.import_children(elem, marks),
      UnmatchedPolicy::AsText => {
        let mut text = String::new();
        collect_text(elem, &mut text);
        if text.trim().is_empty() {
          Ok(Vec::new())
        } else {
          Ok(vec![self.schema.text(&text, marks.clone())?])
        }
      },
    }
  }

  fn import_node(
    &self,
    node_type: &Arc<NodeType>,
    attrs: Attrs,
    elem: &DomElem,
    marks: &MarkSet,
  ) -> Result<Vec<Arc<Node>>> {
    if node_type.is_leaf() {
      return Ok(vec![node_type.create_marked(attrs, marks.clone())?]);
    }
    let children = self.import_children(elem, marks)?;

    if node_type.is_textblock() {
      // Block children inside a textblock split it, so mis-nested input
      // like an unclosed <p> before another <p> still yields both blocks.
      let mut out = Vec::new();
      let mut run: Vec<Arc<Node>> = Vec::new();
      for child in children {
        if child.is_inline() {
          run.push(child);
        } else {
          if !run.is_empty() {
            out.push(node_type.create(attrs.clone(), std::mem::take(&mut run))?);
          }
          out.push(child);
        }
      }
      if !run.is_empty() || out.is_empty() {
        out.push(node_type.create(attrs, run)?);
      }
      return Ok(out);
    }

    let content = self.wrap_inline(children)?;
    match node_type.create(attrs, content.clone()) {
      Ok(node) => Ok(vec![node]),
      Err(err) => {
        // Children that do not fit the wrapper survive without it.
        warn!(tag = %elem.tag, %err, "dropping wrapper with invalid content");
        Ok(content)
      },
    }
  }

  fn wrap_inline(&self, nodes: Vec<Arc<Node>>) -> Result<Vec<Arc<Node>>> {
    let mut out = Vec::new();
    let mut run: Vec<Arc<Node>> = Vec::new();
    for node in nodes {
      if node.is_inline() {
        run.push(node);
      } else {
        if !run.is_empty() {
          out.push(self.paragraph(std::mem::take(&mut run))?);
        }
        out.push(node);
      }
    }
    if !run.is_empty() {
      out.push(self.paragraph(run)?);
    }
    Ok(out)
  }

  fn paragraph(&self, inline: Vec<Arc<Node>>) -> Result<Arc<Node>> {
    let paragraph = self
      .schema
      .node_type("paragraph")
      .ok_or(HtmlError::NoParagraphType)?;
    Ok(paragraph.create(Attrs::new(), inline)?)
  }
}

fn collect_text(elem: &DomElem, out: &mut String) {
  for child in &elem.children {
    match child {
      DomChild::Text(text) => out.push_str(text),
      DomChild::Elem(child) => collect_text(child, out),
    }
  }
}

#[cfg(test)]
mod test {
  use scribe_core::basic;
  use serde_json::Value;

  use super::*;
  use crate::state::EditorState;

  fn schema() -> Arc<Schema> {
    basic::schema().unwrap()
  }

  fn text(schema: &Arc<Schema>, s: &str, marks: MarkSet) -> Arc<Node> {
    schema.text(s, marks).unwrap()
  }

  fn para(schema: &Arc<Schema>, children: Vec<Arc<Node>>) -> Arc<Node> {
    schema
      .node_type("paragraph")
      .unwrap()
      .create(Attrs::new(), children)
      .unwrap()
  }

  fn doc_of(schema: &Arc<Schema>, blocks: Vec<Arc<Node>>) -> Arc<Node> {
    schema.root_type().create(Attrs::new(), blocks).unwrap()
  }

  fn strong(schema: &Arc<Schema>) -> MarkSet {
    let mark = schema
      .mark_type("strong")
      .unwrap()
      .create(Attrs::new())
      .unwrap();
    MarkSet::from_marks([mark])
  }

  #[test]
  fn exports_marked_text_inside_paragraph() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, vec![
      text(&schema, "h", MarkSet::new()),
      text(&schema, "el", strong(&schema)),
      text(&schema, "lo", MarkSet::new()),
    ])]);
    assert_eq!(to_html(&doc).unwrap(), "<p>h<strong>el</strong>lo</p>");
  }

  #[test]
  fn typing_then_bolding_exports_as_expected() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, vec![])]);
    let mut state = EditorState::new(Arc::clone(&schema), Some(doc), Vec::new()).unwrap();

    let mut tr = state.tr();
    tr.insert_text(1, "hello", MarkSet::new()).unwrap();
    state.dispatch(tr).unwrap();
    assert_eq!(state.doc().content_size(), 7);

    let mark = schema
      .mark_type("strong")
      .unwrap()
      .create(Attrs::new())
      .unwrap();
    let mut tr = state.tr();
    tr.add_mark(2, 4, mark).unwrap();
    state.dispatch(tr).unwrap();

    assert_eq!(to_html(state.doc()).unwrap(), "<p>h<strong>el</strong>lo</p>");
  }

  #[test]
  fn escapes_reserved_characters() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, vec![text(
      &schema,
      "a<b&c>d",
      MarkSet::new(),
    )])]);
    assert_eq!(to_html(&doc).unwrap(), "<p>a&lt;b&amp;c&gt;d</p>");
  }

  #[test]
  fn exports_heading_with_level() {
    let schema = schema();
    let mut attrs = Attrs::new();
    attrs.insert(Tendril::from("level"), Value::from(2));
    let heading = schema
      .node_type("heading")
      .unwrap()
      .create(attrs, [text(&schema, "Title", MarkSet::new())])
      .unwrap();
    let doc = doc_of(&schema, vec![heading]);
    assert_eq!(to_html(&doc).unwrap(), "<h2>Title</h2>");
  }

  #[test]
  fn imports_nested_marks() {
    let importer = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = importer.import("<p><em>a<strong>b</strong></em>c</p>").unwrap();
    let para = doc.child(0).unwrap();
    assert_eq!(para.child_count(), 3);
    let b = para.child(1).unwrap();
    assert_eq!(b.text(), Some("b"));
    assert_eq!(b.marks().iter().count(), 2);
  }

  #[test]
  fn import_skips_unknown_wrappers() {
    let importer = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = importer
      .import("<div class=\"wrap\"><p>x</p></div>")
      .unwrap();
    assert_eq!(doc.child_count(), 1);
    assert_eq!(doc.child(0).unwrap().type_name(), "paragraph");
    assert_eq!(doc.text_content(), "x");
  }

  #[test]
  fn unmatched_policies_differ_on_nested_structure() {
    let html = "<p><fancy><strong>b</strong></fancy></p>";

    let skip = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = skip.import(html).unwrap();
    let node = doc.child(0).unwrap().child(0).unwrap();
    assert!(!node.marks().is_empty());

    let as_text = Importer::new(schema(), UnmatchedPolicy::AsText);
    let doc = as_text.import(html).unwrap();
    let node = doc.child(0).unwrap().child(0).unwrap();
    assert_eq!(node.text(), Some("b"));
    assert!(node.marks().is_empty());
  }

  #[test]
  fn stray_inline_content_gets_a_paragraph() {
    let importer = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = importer.import("hello<p>world</p>").unwrap();
    assert_eq!(doc.child_count(), 2);
    assert_eq!(doc.child(0).unwrap().type_name(), "paragraph");
    assert_eq!(doc.child(0).unwrap().text_content(), "hello");
  }

  #[test]
  fn tolerates_unclosed_and_misnested_tags() {
    let importer = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = importer.import("<p>one<p>two").unwrap();
    assert_eq!(doc.child_count(), 2);
    assert_eq!(doc.child(0).unwrap().text_content(), "one");
    assert_eq!(doc.child(1).unwrap().text_content(), "two");

    let doc = importer.import("<p><em>a</p></em>").unwrap();
    assert_eq!(doc.text_content(), "a");
  }

  #[test]
  fn decodes_entities_and_void_elements() {
    let importer = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = importer.import("<p>a&amp;b<br>c&#33;</p>").unwrap();
    let para = doc.child(0).unwrap();
    assert_eq!(para.child(0).unwrap().text(), Some("a&b"));
    assert_eq!(para.child(1).unwrap().type_name(), "hard_break");
    assert_eq!(para.child(2).unwrap().text(), Some("c!"));
  }

  #[test]
  fn empty_input_yields_empty_paragraph() {
    let importer = Importer::new(schema(), UnmatchedPolicy::Skip);
    let doc = importer.import("").unwrap();
    assert_eq!(doc.child_count(), 1);
    assert_eq!(doc.child(0).unwrap().content_size(), 0);
  }

  #[test]
  fn rich_document_roundtrips() {
    let schema = schema();
    let mut level = Attrs::new();
    level.insert(Tendril::from("level"), Value::from(3));
    let heading = schema
      .node_type("heading")
      .unwrap()
      .create(level, [text(&schema, "Head", MarkSet::new())])
      .unwrap();

    let mut href = Attrs::new();
    href.insert(Tendril::from("href"), Value::from("https://example.com/?a=1&b=2"));
    let link = schema.mark_type("link").unwrap().create(href).unwrap();
    let br = schema
      .node_type("hard_break")
      .unwrap()
      .create_marked(Attrs::new(), MarkSet::new())
      .unwrap();
    let body = para(&schema, vec![
      text(&schema, "see ", MarkSet::new()),
      text(&schema, "here", MarkSet::from_marks([link])),
      br,
      text(&schema, "next line", strong(&schema)),
    ]);

    let item = schema
      .node_type("list_item")
      .unwrap()
      .create(Attrs::new(), [para(&schema, vec![text(
        &schema,
        "item",
        MarkSet::new(),
      )])])
      .unwrap();
    let list = schema
      .node_type("bullet_list")
      .unwrap()
      .create(Attrs::new(), [item])
      .unwrap();

    let doc = doc_of(&schema, vec![heading, body, list]);
    let html = to_html(&doc).unwrap();
    let importer = Importer::new(Arc::clone(&schema), UnmatchedPolicy::Skip);
    assert_eq!(importer.import(&html).unwrap(), doc);
  }

  quickcheck::quickcheck! {
    fn escaped_text_roundtrips(s: String) -> bool {
      if s.trim().is_empty() {
        return true;
      }
      let schema = basic::schema().unwrap();
      let doc = schema
        .root_type()
        .create(Attrs::new(), [schema
          .node_type("paragraph")
          .unwrap()
          .create(Attrs::new(), [schema.text(&s, MarkSet::new()).unwrap()])
          .unwrap()])
        .unwrap();
      let html = to_html(&doc).unwrap();
      let importer = Importer::new(schema, UnmatchedPolicy::Skip);
      importer.import(&html).unwrap().text_content() == s
    }
  }
}
