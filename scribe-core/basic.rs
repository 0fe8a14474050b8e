//! The built-in document schema: paragraphs, headings, blockquotes, lists,
//! hard breaks, and the standard inline marks, each wired to its HTML parse
//! rules and export tag.
//!
//! Editors that need a different vocabulary build their own [`Schema`] with
//! [`Schema::define`]; this preset is what the stock editor and most tests
//! use.

use std::sync::Arc;

use serde_json::Value;

use crate::{
  Tendril,
  dom::{
    DomElem,
    ExportTag,
    ParseRule,
  },
  node::Attrs,
  schema::{
    AttrSpec,
    MarkTypeSpec,
    NodeTypeSpec,
    Result,
    Schema,
  },
};

pub const DEFAULT_FONT_SIZE: i64 = 16;
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Build the preset schema with `doc` as root.
pub fn schema() -> Result<Arc<Schema>> {
  Schema::define(node_specs(), mark_specs(), "doc")
}

pub fn node_specs() -> Vec<NodeTypeSpec> {
  vec![
    NodeTypeSpec::new("doc").content("block+"),
    NodeTypeSpec::new("paragraph")
      .content("inline*")
      .group("block")
      .parse_rule(ParseRule::tag("p"))
      .to_html(paragraph_tag),
    NodeTypeSpec::new("heading")
      .content("inline*")
      .group("block")
      .attr("level", AttrSpec::with_default(1).validated(valid_level))
      .parse_rule(ParseRule::tag("h1").with_attrs(heading_attrs))
      .parse_rule(ParseRule::tag("h2").with_attrs(heading_attrs))
      .parse_rule(ParseRule::tag("h3").with_attrs(heading_attrs))
      .parse_rule(ParseRule::tag("h4").with_attrs(heading_attrs))
      .parse_rule(ParseRule::tag("h5").with_attrs(heading_attrs))
      .parse_rule(ParseRule::tag("h6").with_attrs(heading_attrs))
      .to_html(heading_tag),
    NodeTypeSpec::new("blockquote")
      .content("block+")
      .group("block")
      .parse_rule(ParseRule::tag("blockquote"))
      .to_html(|_| ExportTag::new("blockquote")),
    NodeTypeSpec::new("bullet_list")
      .content("list_item+")
      .group("block")
      .parse_rule(ParseRule::tag("ul"))
      .to_html(|_| ExportTag::new("ul")),
    NodeTypeSpec::new("ordered_list")
      .content("list_item+")
      .group("block")
      .parse_rule(ParseRule::tag("ol"))
      .to_html(|_| ExportTag::new("ol")),
    NodeTypeSpec::new("list_item")
      .content("block+")
      .parse_rule(ParseRule::tag("li"))
      .to_html(|_| ExportTag::new("li")),
    NodeTypeSpec::new("text").inline().group("inline"),
    NodeTypeSpec::new("hard_break")
      .inline()
      .group("inline")
      .parse_rule(ParseRule::tag("br"))
      .to_html(|_| ExportTag::new("br")),
  ]
}

pub fn mark_specs() -> Vec<MarkTypeSpec> {
  vec![
    MarkTypeSpec::new("strong")
      .parse_rule(ParseRule::tag("strong"))
      .parse_rule(ParseRule::tag("b"))
      .to_html(|_| ExportTag::new("strong")),
    MarkTypeSpec::new("em")
      .parse_rule(ParseRule::tag("em"))
      .parse_rule(ParseRule::tag("i"))
      .to_html(|_| ExportTag::new("em")),
    MarkTypeSpec::new("code")
      .parse_rule(ParseRule::tag("code"))
      .to_html(|_| ExportTag::new("code")),
    MarkTypeSpec::new("link")
      .attr("href", AttrSpec::required().validated(|v| v.is_string()))
      .parse_rule(ParseRule::tag("a").with_attrs(link_attrs))
      .to_html(link_tag),
    MarkTypeSpec::new("font_size")
      .attr(
        "size",
        AttrSpec::with_default(DEFAULT_FONT_SIZE).validated(valid_size),
      )
      .parse_rule(ParseRule::style("span", "font-size").with_attrs(font_size_attrs))
      .to_html(font_size_tag),
    MarkTypeSpec::new("font_family")
      .attr(
        "family",
        AttrSpec::with_default(DEFAULT_FONT_FAMILY).validated(|v| v.is_string()),
      )
      .parse_rule(ParseRule::style("span", "font-family").with_attrs(font_family_attrs))
      .to_html(font_family_tag),
  ]
}

fn valid_level(v: &Value) -> bool {
  v.as_i64().is_some_and(|n| (1..=6).contains(&n))
}

fn valid_size(v: &Value) -> bool {
  v.as_i64().is_some_and(|n| n > 0)
}

fn paragraph_tag(_: &Attrs) -> ExportTag {
  ExportTag::new("p")
}

fn heading_tag(attrs: &Attrs) -> ExportTag {
  let level = attrs.get("level").and_then(Value::as_i64).unwrap_or(1);
  ExportTag::new(&format!("h{level}"))
}

fn heading_attrs(elem: &DomElem) -> Option<Attrs> {
  let level: i64 = elem.tag.strip_prefix('h')?.parse().ok()?;
  let mut attrs = Attrs::new();
  attrs.insert(Tendril::from("level"), Value::from(level));
  Some(attrs)
}

fn link_tag(attrs: &Attrs) -> ExportTag {
  let href = attrs.get("href").and_then(Value::as_str).unwrap_or("");
  ExportTag::new("a").with_attr("href", href)
}

fn link_attrs(elem: &DomElem) -> Option<Attrs> {
  let href = elem.attr("href")?;
  let mut attrs = Attrs::new();
  attrs.insert(Tendril::from("href"), Value::from(href));
  Some(attrs)
}

fn font_size_tag(attrs: &Attrs) -> ExportTag {
  let size = attrs
    .get("size")
    .and_then(Value::as_i64)
    .unwrap_or(DEFAULT_FONT_SIZE);
  ExportTag::new("span").with_attr("style", format!("font-size: {size}px"))
}

fn font_size_attrs(elem: &DomElem) -> Option<Attrs> {
  let value = elem.style("font-size")?;
  let size: i64 = value.trim_end_matches("px").trim().parse().ok()?;
  let mut attrs = Attrs::new();
  attrs.insert(Tendril::from("size"), Value::from(size));
  Some(attrs)
}

fn font_family_tag(attrs: &Attrs) -> ExportTag {
  let family = attrs
    .get("family")
    .and_then(Value::as_str)
    .unwrap_or(DEFAULT_FONT_FAMILY);
  ExportTag::new("span").with_attr("style", format!("font-family: {family}"))
}

fn font_family_attrs(elem: &DomElem) -> Option<Attrs> {
  let family = elem.style("font-family")?;
  let mut attrs = Attrs::new();
  attrs.insert(Tendril::from("family"), Value::from(family));
  Some(attrs)
}
