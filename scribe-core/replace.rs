//! Structural replacement: delete a flat range and splice a [`Slice`] in.
//!
//! This is the primitive every structural edit reduces to. A replacement
//! either fails, or produces a new document in which every structurally
//! touched ancestor still satisfies its content expression; it never
//! partially applies.
//!
//! # Slices and open ends
//!
//! The content removed between two positions does not always line up with
//! node boundaries: deleting from the middle of one paragraph to the middle
//! of the next cuts both paragraphs open. A [`Slice`] records this with open
//! depths: `open_start == 1` means the first child is such a cut node - its
//! missing boundary token is not counted in [`Slice::size`] - and splicing it
//! back in merges its content into the node cut open at the insertion point
//! instead of inserting it whole.
//!
//! A replacement is only well-formed when the open depths line up with the
//! depths of the range ends: `from_depth - open_start == to_depth - open_end`.
//! This keeps the position arithmetic linear - a legal replace always removes
//! exactly `to - from` positions and inserts exactly `slice.size()`. Open
//! depths are limited to one level; range ends nested deeper than one level
//! below the splice point are rejected with [`ReplaceError::CannotJoin`].
//!
//! [`slice_between`] and [`replace`] are exact duals: replacing a range with
//! the slice cut from it reproduces the original document, which is what
//! makes replacement steps invertible.

use std::sync::Arc;

use thiserror::Error;

use crate::{
  node::{
    Fragment,
    Node,
    ValidationError,
  },
  position::{
    self,
    PositionError,
    ResolvedPos,
  },
};

pub type Result<T> = std::result::Result<T, ReplaceError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplaceError {
  #[error("invalid replace range: start {from} is after end {to}")]
  InvalidRange { from: usize, to: usize },
  #[error("range ends between {from} and {to} are nested too deeply to join")]
  CannotJoin { from: usize, to: usize },
  #[error(
    "inconsistent open depths: ends at depths {from_depth}/{to_depth} with slice open {open_start}/{open_end}"
  )]
  InconsistentOpenDepths {
    from_depth: usize,
    to_depth:   usize,
    open_start: usize,
    open_end:   usize,
  },
  #[error("cannot cut through a {0:?} node")]
  CutThroughBlock(crate::Tendril),
  #[error("slice open depth {0} exceeds the supported depth of 1")]
  OpenTooDeep(usize),
  #[error("open slice end is not a cuttable node")]
  BadOpenEnd,
  #[error(transparent)]
  Position(#[from] PositionError),
  #[error(transparent)]
  Validation(#[from] ValidationError),
}

/// A piece of document content, possibly with cut-open end nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
  pub content:    Fragment,
  pub open_start: usize,
  pub open_end:   usize,
}

impl Slice {
  /// A slice with fully closed ends.
  pub fn closed(content: Fragment) -> Self {
    Self {
      content,
      open_start: 0,
      open_end: 0,
    }
  }

  pub fn empty() -> Self {
    Self::closed(Fragment::empty())
  }

  pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Result<Self> {
    if open_start > 1 || open_end > 1 {
      return Err(ReplaceError::OpenTooDeep(open_start.max(open_end)));
    }
    if open_start == 1 && content.child(0).is_none_or(|c| c.is_leaf()) {
      return Err(ReplaceError::BadOpenEnd);
    }
    if open_end == 1
      && content
        .child_count()
        .checked_sub(1)
        .and_then(|last| content.child(last))
        .is_none_or(|c| c.is_leaf())
    {
      return Err(ReplaceError::BadOpenEnd);
    }
    Ok(Self {
      content,
      open_start,
      open_end,
    })
  }

  pub fn is_empty(&self) -> bool {
    self.content.is_empty()
  }

  /// The flat span this slice occupies once spliced in. Each open side
  /// removes one boundary token of its end child.
  pub fn size(&self) -> usize {
    self.content.size() - self.open_start - self.open_end
  }

  fn all_inline(&self) -> bool {
    self.content.children().iter().all(|c| c.is_inline())
  }
}

/// Cut a fragment between two local offsets, splitting text runs at the
/// ends. Offsets falling strictly inside a non-text child are an error; the
/// callers align them to child boundaries beforehand.
pub fn fragment_cut(frag: &Fragment, from: usize, to: usize) -> Result<Fragment> {
  if from > to || to > frag.size() {
    return Err(ReplaceError::InvalidRange { from, to });
  }
  let mut out = Vec::new();
  let mut start = 0;
  for child in frag.children() {
    let end = start + child.size();
    if end <= from || start >= to {
      start = end;
      continue;
    }
    if from <= start && end <= to {
      out.push(Arc::clone(child));
    } else if child.is_text() {
      let rel_from = from.saturating_sub(start);
      let rel_to = to.min(end) - start;
      out.push(child.cut_text(rel_from, rel_to)?);
    } else {
      return Err(ReplaceError::CutThroughBlock(
        child.node_type().name.clone(),
      ));
    }
    start = end;
  }
  Ok(Fragment::new(out))
}

/// Extract the content between two positions as a [`Slice`], with open ends
/// where the range cuts into nodes one level below the shared ancestor.
pub fn slice_between(doc: &Arc<Node>, from: usize, to: usize) -> Result<Slice> {
  if from > to {
    return Err(ReplaceError::InvalidRange { from, to });
  }
  let rf = position::resolve(doc, from)?;
  let rt = position::resolve(doc, to)?;
  let depth = rf.shared_depth(&rt);
  if rf.depth() > depth + 1 || rt.depth() > depth + 1 {
    return Err(ReplaceError::CannotJoin { from, to });
  }

  let parent = rf.node(depth);
  let content = parent.content().expect("shared ancestor is not a leaf");

  if rf.depth() == depth && rt.depth() == depth {
    let local_from = from - rf.start(depth);
    let local_to = to - rt.start(depth);
    return Ok(Slice::closed(fragment_cut(content, local_from, local_to)?));
  }

  let from_inside = rf.depth() > depth;
  let to_inside = rt.depth() > depth;
  let i = rf.index(depth);
  let j = rt.index(depth);

  let mut out: Vec<Arc<Node>> = Vec::new();
  if from_inside {
    let a = rf.node(depth + 1);
    let a_content = a.content().ok_or(ReplaceError::BadOpenEnd)?;
    let suffix = fragment_cut(a_content, rf.parent_offset(), a_content.size())?;
    out.push(a.copy(suffix)?);
  }
  let mid_start = if from_inside { i + 1 } else { i };
  for child in &content.children()[mid_start..j] {
    out.push(Arc::clone(child));
  }
  if to_inside {
    let b = rt.node(depth + 1);
    let b_content = b.content().ok_or(ReplaceError::BadOpenEnd)?;
    let prefix = fragment_cut(b_content, 0, rt.parent_offset())?;
    out.push(b.copy(prefix)?);
  }

  Slice::new(
    Fragment::new(out),
    from_inside as usize,
    to_inside as usize,
  )
}

/// Replace `[from, to)` with a slice, producing the new document root.
pub fn replace(doc: &Arc<Node>, from: usize, to: usize, slice: &Slice) -> Result<Arc<Node>> {
  if from > to {
    return Err(ReplaceError::InvalidRange { from, to });
  }
  let rf = position::resolve(doc, from)?;
  let rt = position::resolve(doc, to)?;

  if slice.open_start > rf.depth()
    || rf.depth() - slice.open_start != rt.depth().wrapping_sub(slice.open_end)
  {
    return Err(ReplaceError::InconsistentOpenDepths {
      from_depth: rf.depth(),
      to_depth:   rt.depth(),
      open_start: slice.open_start,
      open_end:   slice.open_end,
    });
  }

  // The splice happens `open_start` levels above the start point, or at the
  // shared ancestor when the two ends diverge before that.
  let depth = rf.shared_depth(&rt).min(rf.depth() - slice.open_start);
  if rf.depth() > depth + 1 || rt.depth() > depth + 1 {
    return Err(ReplaceError::CannotJoin { from, to });
  }

  let new_parent = splice(&rf, &rt, depth, slice, from, to)?;

  // Rebuild the spine above the splice point, revalidating each ancestor.
  let mut node = new_parent;
  for d in (0..depth).rev() {
    node = rf.node(d).replace_child(rf.index(d), node)?;
  }
  Ok(node)
}

fn splice(
  rf: &ResolvedPos,
  rt: &ResolvedPos,
  depth: usize,
  slice: &Slice,
  from: usize,
  to: usize,
) -> Result<Arc<Node>> {
  let parent = rf.node(depth);
  let content = parent.content().expect("splice parent is not a leaf");

  let from_inside = rf.depth() > depth;
  let to_inside = rt.depth() > depth;

  // Both ends sit directly in the splice parent: a flat splice, with text
  // runs split at the ends. The open-depth check already forced the slice
  // closed here.
  if !from_inside && !to_inside {
    let local_from = from - rf.start(depth);
    let local_to = to - rt.start(depth);
    let mut out: Vec<Arc<Node>> = fragment_cut(content, 0, local_from)?.children().to_vec();
    out.extend(slice.content.children().iter().cloned());
    out.extend(
      fragment_cut(content, local_to, content.size())?
        .children()
        .iter()
        .cloned(),
    );
    return parent.copy(Fragment::new(out)).map_err(Into::into);
  }

  // At least one end is cut one level deep. The open-depth equation leaves
  // exactly these shapes:
  //   - both ends cut, slice closed: deletion-style bridge of the two halves
  //   - both ends cut, slice open on both sides: front and back merges
  //   - start cut only, slice open at start: front merge, closed tail
  //   - end cut only, slice open at end: closed head, back merge
  let front_cut = from_inside.then(|| -> Result<(Arc<Node>, Fragment)> {
    let a = rf.node(depth + 1);
    let a_content = a.content().ok_or(ReplaceError::CannotJoin { from, to })?;
    Ok((
      Arc::clone(a),
      fragment_cut(a_content, 0, rf.parent_offset())?,
    ))
  });
  let back_cut = to_inside.then(|| -> Result<(Arc<Node>, Fragment)> {
    let b = rt.node(depth + 1);
    let b_content = b.content().ok_or(ReplaceError::CannotJoin { from, to })?;
    Ok((
      Arc::clone(b),
      fragment_cut(b_content, rt.parent_offset(), b_content.size())?,
    ))
  });
  let front_cut = front_cut.transpose()?;
  let back_cut = back_cut.transpose()?;

  let i = rf.index(depth);
  let j = rt.index(depth);
  let mut out: Vec<Arc<Node>> = if from_inside {
    content.children()[..i].to_vec()
  } else {
    fragment_cut(content, 0, from - rf.start(depth))?
      .children()
      .to_vec()
  };
  let tail: Vec<Arc<Node>> = if to_inside {
    content.children()[j + 1..].to_vec()
  } else {
    fragment_cut(content, to - rt.start(depth), content.size())?
      .children()
      .to_vec()
  };

  let mut mid: Vec<Arc<Node>> = slice.content.children().to_vec();

  match (front_cut, back_cut, slice.open_start, slice.open_end) {
    // Deletion-style bridge: the kept halves of the two cut nodes (plus any
    // inline slice content) join into a single node of the front type.
    (Some((front, front_kept)), Some((back, back_kept)), 0, 0) => {
      if slice.all_inline() {
        let merged = chain(&front_kept, &Fragment::new(mid), &back_kept);
        out.push(front.copy(merged)?);
      } else {
        out.push(front.copy(front_kept)?);
        out.append(&mut mid);
        out.push(back.copy(back_kept)?);
      }
    },
    // Open on both sides: first merges into the front cut, last closes over
    // the back cut, middles land whole. A single doubly-open node does both.
    (Some((front, front_kept)), Some((back, back_kept)), 1, 1) => {
      if mid.len() == 1 {
        let only = mid.pop().expect("len checked");
        let inner = only.content().ok_or(ReplaceError::BadOpenEnd)?;
        out.push(front.copy(chain(&front_kept, inner, &back_kept))?);
      } else {
        let first = mid.remove(0);
        let last = mid.pop().ok_or(ReplaceError::BadOpenEnd)?;
        let first_inner = first.content().ok_or(ReplaceError::BadOpenEnd)?;
        let last_inner = last.content().ok_or(ReplaceError::BadOpenEnd)?;
        out.push(front.copy(chain(&front_kept, first_inner, &Fragment::empty()))?);
        out.append(&mut mid);
        out.push(last.copy(chain(last_inner, &back_kept, &Fragment::empty()))?);
      }
    },
    // Start cut only: merge the open first node into the front cut.
    (Some((front, front_kept)), None, 1, 0) => {
      if mid.is_empty() {
        return Err(ReplaceError::BadOpenEnd);
      }
      let first = mid.remove(0);
      let inner = first.content().ok_or(ReplaceError::BadOpenEnd)?;
      out.push(front.copy(chain(&front_kept, inner, &Fragment::empty()))?);
      out.append(&mut mid);
    },
    // End cut only: close the open last node over the back cut.
    (None, Some((back, back_kept)), 0, 1) => {
      let last = mid.pop().ok_or(ReplaceError::BadOpenEnd)?;
      let inner = last.content().ok_or(ReplaceError::BadOpenEnd)?;
      out.append(&mut mid);
      out.push(last.copy(chain(inner, &back_kept, &Fragment::empty()))?);
    },
    _ => return Err(ReplaceError::CannotJoin { from, to }),
  }

  out.extend(tail);
  parent.copy(Fragment::new(out)).map_err(Into::into)
}

fn chain(a: &Fragment, b: &Fragment, c: &Fragment) -> Fragment {
  Fragment::new(
    a.children()
      .iter()
      .chain(b.children())
      .chain(c.children())
      .cloned()
      .collect::<Vec<_>>(),
  )
}
