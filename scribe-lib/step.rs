//! Atomic, invertible edit primitives.
//!
//! A [`Step`] is a pure function from one document to the next: it either
//! produces a new document plus the [`StepMap`] describing how positions
//! moved, or fails without touching anything. Every step can compute its
//! inverse against the document it was applied to, which is what undo
//! replays.

use std::sync::Arc;

use scribe_core::{
  node::{
    Attrs,
    Fragment,
    Mark,
    MarkSet,
    Node,
    ValidationError,
  },
  position::{
    self,
    PositionError,
  },
  replace::{
    self,
    ReplaceError,
    Slice,
  },
};
use thiserror::Error;

use crate::map::StepMap;

pub type Result<T> = std::result::Result<T, StepError>;

/// A step's preconditions were unmet against the document it targets. The
/// enclosing transaction aborts; the document is unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
  #[error("no node starts at position {0}")]
  NoNodeAt(usize),
  #[error(transparent)]
  Replace(#[from] ReplaceError),
  #[error(transparent)]
  Position(#[from] PositionError),
  #[error(transparent)]
  Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
  /// Delete `[from, to)` and splice in a slice, revalidating every
  /// structurally touched ancestor.
  Replace {
    from:  usize,
    to:    usize,
    slice: Slice,
  },
  /// Add a mark to the inline content in `[from, to)`.
  AddMark { from: usize, to: usize, mark: Mark },
  /// Remove a mark from the inline content in `[from, to)`. Carries the
  /// full mark so the inverse can restore it.
  RemoveMark { from: usize, to: usize, mark: Mark },
  /// Replace the attributes of the node starting at `pos`.
  SetAttrs { pos: usize, attrs: Attrs },
}

#[derive(Debug, Clone)]
pub struct StepResult {
  pub doc: Arc<Node>,
  pub map: StepMap,
}

impl Step {
  pub fn apply(&self, doc: &Arc<Node>) -> Result<StepResult> {
    match self {
      Step::Replace { from, to, slice } => {
        let new_doc = replace::replace(doc, *from, *to, slice)?;
        Ok(StepResult {
          doc: new_doc,
          map: StepMap::new(*from, to - from, slice.size()),
        })
      },
      Step::AddMark { from, to, mark } => {
        check_range(doc, *from, *to)?;
        let new_doc = mark_range(doc, *from, *to, &|marks| marks.with(mark.clone()))?;
        Ok(StepResult {
          doc: new_doc,
          map: StepMap::identity(),
        })
      },
      Step::RemoveMark { from, to, mark } => {
        check_range(doc, *from, *to)?;
        let new_doc = mark_range(doc, *from, *to, &|marks| marks.without(&mark.mark_type))?;
        Ok(StepResult {
          doc: new_doc,
          map: StepMap::identity(),
        })
      },
      Step::SetAttrs { pos, attrs } => {
        let rp = position::resolve(doc, *pos)?;
        let target = rp.node_after().ok_or(StepError::NoNodeAt(*pos))?;
        let new_target = target.with_attrs(attrs.clone())?;
        let mut node = rp.node(rp.depth()).replace_child(rp.index(rp.depth()), new_target)?;
        for d in (0..rp.depth()).rev() {
          node = rp.node(d).replace_child(rp.index(d), node)?;
        }
        Ok(StepResult {
          doc: node,
          map: StepMap::identity(),
        })
      },
    }
  }

  /// The step that undoes this one, computed against the document this step
  /// was applied to.
  pub fn invert(&self, doc_before: &Arc<Node>) -> Result<Step> {
    match self {
      Step::Replace { from, to, slice } => Ok(Step::Replace {
        from:  *from,
        to:    from + slice.size(),
        slice: replace::slice_between(doc_before, *from, *to)?,
      }),
      Step::AddMark { from, to, mark } => Ok(Step::RemoveMark {
        from: *from,
        to:   *to,
        mark: mark.clone(),
      }),
      Step::RemoveMark { from, to, mark } => Ok(Step::AddMark {
        from: *from,
        to:   *to,
        mark: mark.clone(),
      }),
      Step::SetAttrs { pos, .. } => {
        let rp = position::resolve(doc_before, *pos)?;
        let target = rp.node_after().ok_or(StepError::NoNodeAt(*pos))?;
        Ok(Step::SetAttrs {
          pos:   *pos,
          attrs: target.attrs().clone(),
        })
      },
    }
  }
}

fn check_range(doc: &Arc<Node>, from: usize, to: usize) -> Result<()> {
  if from > to || to > doc.content_size() {
    return Err(
      PositionError::OutOfBounds {
        pos:  to,
        size: doc.content_size(),
      }
      .into(),
    );
  }
  Ok(())
}

/// Rewrite the mark sets of all inline content overlapping `[from, to)`,
/// where the range is given in the coordinates of `node`'s content. Text
/// runs partially covered are split; block structure is untouched.
fn mark_range(
  node: &Arc<Node>,
  from: usize,
  to: usize,
  f: &dyn Fn(&MarkSet) -> MarkSet,
) -> Result<Arc<Node>> {
  let content = node
    .content()
    .ok_or_else(|| StepError::Validation(ValidationError::NotText(node.node_type().name.clone())))?;

  let mut out: Vec<Arc<Node>> = Vec::with_capacity(content.child_count());
  let mut start = 0;
  for child in content.children() {
    let end = start + child.size();
    if end <= from || start >= to {
      out.push(Arc::clone(child));
      start = end;
      continue;
    }
    if child.is_text() {
      let lo = from.saturating_sub(start);
      let hi = to.min(end) - start;
      if lo > 0 {
        out.push(child.cut_text(0, lo)?);
      }
      let middle = child.cut_text(lo, hi)?;
      out.push(middle.with_marks(f(middle.marks()))?);
      if hi < end - start {
        out.push(child.cut_text(hi, end - start)?);
      }
    } else if child.is_leaf() {
      if child.is_inline() {
        out.push(child.with_marks(f(child.marks()))?);
      } else {
        out.push(Arc::clone(child));
      }
    } else {
      let inner_start = start + 1;
      let inner_from = from.saturating_sub(inner_start);
      let inner_to = (to - inner_start).min(child.content_size());
      out.push(mark_range(child, inner_from, inner_to, f)?);
    }
    start = end;
  }
  node.copy(Fragment::new(out)).map_err(Into::into)
}

#[cfg(test)]
mod test {
  use scribe_core::{
    basic,
    schema::Schema,
  };
  use serde_json::Value;

  use super::*;

  fn schema() -> Arc<Schema> {
    basic::schema().unwrap()
  }

  fn para(schema: &Schema, text: &str) -> Arc<Node> {
    schema
      .node_type("paragraph")
      .unwrap()
      .create(Attrs::new(), [schema.text(text, MarkSet::new()).unwrap()])
      .unwrap()
  }

  fn doc_of(schema: &Schema, children: Vec<Arc<Node>>) -> Arc<Node> {
    schema.root_type().create(Attrs::new(), children).unwrap()
  }

  fn strong(schema: &Schema) -> Mark {
    schema.mark_type("strong").unwrap().create(Attrs::new()).unwrap()
  }

  #[test]
  fn replace_step_maps_positions() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, "hello")]);
    let step = Step::Replace {
      from:  2,
      to:    4,
      slice: Slice::empty(),
    };
    let result = step.apply(&doc).unwrap();
    assert_eq!(result.doc.text_content(), "hlo");
    assert_eq!(result.map.map(6, crate::map::Assoc::Before), 4);
  }

  #[test]
  fn add_mark_splits_text_run() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, "hello")]);
    let step = Step::AddMark {
      from: 2,
      to:   4,
      mark: strong(&schema),
    };
    let result = step.apply(&doc).unwrap();
    let para = result.doc.child(0).unwrap();
    let runs = para.content().unwrap().children();
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].text(), Some("h"));
    assert_eq!(runs[1].text(), Some("el"));
    assert!(runs[1].marks().contains(&strong(&schema)));
    assert!(runs[0].marks().is_empty());
    assert!(runs[2].marks().is_empty());
  }

  #[test]
  fn add_then_remove_mark_restores_doc() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, "hello")]);
    let add = Step::AddMark {
      from: 2,
      to:   4,
      mark: strong(&schema),
    };
    let marked = add.apply(&doc).unwrap().doc;
    let remove = add.invert(&doc).unwrap();
    let restored = remove.apply(&marked).unwrap().doc;
    assert_eq!(restored, doc);
  }

  #[test]
  fn mark_range_descends_into_blocks() {
    let schema = schema();
    let quote = schema
      .node_type("blockquote")
      .unwrap()
      .create(Attrs::new(), [para(&schema, "deep")])
      .unwrap();
    let doc = doc_of(&schema, vec![quote]);
    // Whole document range: 0 .. content_size.
    let step = Step::AddMark {
      from: 0,
      to:   doc.content_size(),
      mark: strong(&schema),
    };
    let result = step.apply(&doc).unwrap();
    let inner = result.doc.child(0).unwrap().child(0).unwrap();
    assert!(
      inner
        .content()
        .unwrap()
        .child(0)
        .unwrap()
        .marks()
        .contains(&strong(&schema))
    );
  }

  #[test]
  fn set_attrs_revalidates() {
    let schema = schema();
    let heading = schema
      .node_type("heading")
      .unwrap()
      .create(Attrs::new(), [schema.text("t", MarkSet::new()).unwrap()])
      .unwrap();
    let doc = doc_of(&schema, vec![heading]);

    let mut attrs = Attrs::new();
    attrs.insert("level".into(), Value::from(3));
    let step = Step::SetAttrs { pos: 0, attrs };
    let result = step.apply(&doc).unwrap();
    assert_eq!(
      result.doc.child(0).unwrap().attrs().get("level"),
      Some(&Value::from(3))
    );

    let mut bad = Attrs::new();
    bad.insert("level".into(), Value::from(9));
    let step = Step::SetAttrs { pos: 0, attrs: bad };
    assert!(step.apply(&doc).is_err());
  }

  #[test]
  fn set_attrs_inverts_to_previous_attrs() {
    let schema = schema();
    let heading = schema
      .node_type("heading")
      .unwrap()
      .create(Attrs::new(), [schema.text("t", MarkSet::new()).unwrap()])
      .unwrap();
    let doc = doc_of(&schema, vec![heading]);

    let mut attrs = Attrs::new();
    attrs.insert("level".into(), Value::from(2));
    let step = Step::SetAttrs { pos: 0, attrs };
    let changed = step.apply(&doc).unwrap().doc;
    let inverse = step.invert(&doc).unwrap();
    let restored = inverse.apply(&changed).unwrap().doc;
    assert_eq!(restored, doc);
  }

  #[test]
  fn replace_invert_restores_doc() {
    let schema = schema();
    let doc = doc_of(&schema, vec![para(&schema, "ab"), para(&schema, "cd")]);
    let step = Step::Replace {
      from:  2,
      to:    6,
      slice: Slice::empty(),
    };
    let inverse = step.invert(&doc).unwrap();
    let deleted = step.apply(&doc).unwrap().doc;
    let restored = inverse.apply(&deleted).unwrap().doc;
    assert_eq!(restored, doc);
  }
}
