//! Editing commands: pure functions from an editor state to a transaction,
//! `None` when the command does not apply to the current selection.
//!
//! Commands never dispatch; the caller decides what to do with the
//! transaction. Structural table commands live in [`crate::tables`].

use std::sync::Arc;

use scribe_core::{
  node::{
    Attrs,
    Fragment,
    Mark,
    MarkSet,
    Node,
  },
  position,
  replace::Slice,
};

use crate::{
  selection::Selection,
  state::EditorState,
  transaction::Transaction,
};

/// Insert text at the selection, replacing it when non-empty. The new text
/// inherits the marks in effect at the insertion point, so typing inside a
/// bold run stays bold.
pub fn insert_text(state: &EditorState, text: &str) -> Option<Transaction> {
  if text.is_empty() {
    return None;
  }
  let sel = state.selection();
  let marks = marks_at(state.doc(), sel.from());
  let mut tr = state.tr();
  if sel.is_empty() {
    tr.insert_text(sel.head, text, marks).ok()?;
  } else {
    let run = state.schema().text(text, marks).ok()?;
    tr.replace(sel.from(), sel.to(), Slice::closed(Fragment::new([run])))
      .ok()?;
  }
  tr.set_selection(Selection::caret(sel.from() + text.chars().count()));
  Some(tr)
}

/// Delete the selected range. Not applicable to a caret.
pub fn delete_selection(state: &EditorState) -> Option<Transaction> {
  let sel = state.selection();
  if sel.is_empty() {
    return None;
  }
  let mut tr = state.tr();
  tr.delete_range(sel.from(), sel.to()).ok()?;
  tr.set_selection(Selection::caret(sel.from()));
  Some(tr)
}

/// Add the mark over the selection, or remove it when every piece of text
/// in the selection already carries it.
pub fn toggle_mark(state: &EditorState, mark: Mark) -> Option<Transaction> {
  let sel = state.selection();
  if sel.is_empty() {
    return None;
  }
  let mut tr = state.tr();
  if all_marked(state.doc(), sel.from(), sel.to(), &mark) {
    tr.remove_mark(sel.from(), sel.to(), mark).ok()?;
  } else {
    tr.add_mark(sel.from(), sel.to(), mark).ok()?;
  }
  Some(tr)
}

/// Convert every textblock touched by the selection to the given type,
/// keeping its inline content. `None` when nothing would change.
pub fn set_block_type(state: &EditorState, name: &str, attrs: Attrs) -> Option<Transaction> {
  let target = Arc::clone(state.schema().node_type(name)?);
  if !target.is_textblock() {
    return None;
  }
  let sel = state.selection();
  let mut blocks: Vec<(usize, Arc<Node>)> = Vec::new();
  collect_textblocks(state.doc(), 0, sel.from(), sel.to(), &mut blocks);

  let mut edits: Vec<(usize, usize, Arc<Node>)> = Vec::new();
  for (pos, node) in blocks {
    if node.type_name() == name && node.attrs() == &attrs {
      continue;
    }
    let inline = node.content()?.children().to_vec();
    let replacement = target.create(attrs.clone(), inline).ok()?;
    edits.push((pos, pos + node.size(), replacement));
  }
  if edits.is_empty() {
    return None;
  }
  edits.sort_by(|a, b| b.0.cmp(&a.0));
  let mut tr = state.tr();
  for (from, to, node) in edits {
    tr.replace(from, to, Slice::closed(Fragment::new([node]))).ok()?;
  }
  Some(tr)
}

/// Wrap the selected blocks in a list of the given type, one item per
/// block. When the selection already sits inside a list of that type, lift
/// its blocks back out instead.
pub fn wrap_in_list(state: &EditorState, list_name: &str) -> Option<Transaction> {
  let schema = state.schema();
  let list_type = schema.node_type(list_name)?;
  let item_type = schema.node_type("list_item")?;
  let sel = state.selection();
  let rf = position::resolve(state.doc(), sel.from()).ok()?;
  let rt = position::resolve(state.doc(), sel.to()).ok()?;

  for d in (1..=rf.depth()).rev() {
    if rf.node(d).type_name() == list_name {
      // Already listed: replace the whole list with its items' blocks.
      let mut blocks: Vec<Arc<Node>> = Vec::new();
      for item in rf.node(d).content()?.children() {
        blocks.extend(item.content()?.children().iter().cloned());
      }
      let mut tr = state.tr();
      tr.replace(
        rf.before(d),
        rf.after(d),
        Slice::closed(Fragment::new(blocks)),
      )
      .ok()?;
      return Some(tr);
    }
  }

  // Step out of textblocks so the indices below address whole blocks.
  let mut depth = rf.shared_depth(&rt);
  while depth > 0 && rf.node(depth).node_type().is_textblock() {
    depth -= 1;
  }
  let parent = rf.node(depth);
  let children = parent.content()?.children();
  let i0 = rf.index(depth).min(children.len().checked_sub(1)?);
  let i1 = rt.index(depth).min(children.len() - 1).max(i0);

  let start = rf.start(depth) + children[..i0].iter().map(|c| c.size()).sum::<usize>();
  let end = start + children[i0..=i1].iter().map(|c| c.size()).sum::<usize>();

  let mut items: Vec<Arc<Node>> = Vec::new();
  for child in &children[i0..=i1] {
    items.push(item_type.create(Attrs::new(), [Arc::clone(child)]).ok()?);
  }
  let list = list_type.create(Attrs::new(), items).ok()?;
  let mut tr = state.tr();
  tr.replace(start, end, Slice::closed(Fragment::new([list]))).ok()?;
  Some(tr)
}

/// Marks in effect at a position: those of the text run the position falls
/// inside, or of the text run just before it.
fn marks_at(doc: &Arc<Node>, pos: usize) -> MarkSet {
  let Ok(rp) = position::resolve(doc, pos) else {
    return MarkSet::new();
  };
  let parent = rp.parent();
  let index = rp.index(rp.depth());
  if rp.text_offset() > 0 {
    return parent
      .child(index)
      .map(|n| n.marks().clone())
      .unwrap_or_default();
  }
  if index > 0
    && let Some(prev) = parent.child(index - 1)
    && prev.is_text()
  {
    return prev.marks().clone();
  }
  MarkSet::new()
}

/// Whether every text run intersecting `[from, to)` of the node's content
/// carries the mark. Vacuously true for mark-free ranges.
fn all_marked(node: &Node, from: usize, to: usize, mark: &Mark) -> bool {
  let Some(content) = node.content() else {
    return true;
  };
  let mut pos = 0;
  for child in content.children() {
    let end = pos + child.size();
    if end > from && pos < to {
      if child.is_text() {
        if !child.marks().contains(mark) {
          return false;
        }
      } else if !child.is_leaf() {
        let inner_from = from.saturating_sub(pos + 1);
        let inner_to = to.saturating_sub(pos + 1).min(child.content_size());
        if !all_marked(child, inner_from, inner_to, mark) {
          return false;
        }
      }
    }
    pos = end;
  }
  true
}

fn collect_textblocks(
  node: &Node,
  pos: usize,
  from: usize,
  to: usize,
  out: &mut Vec<(usize, Arc<Node>)>,
) {
  let Some(content) = node.content() else {
    return;
  };
  let mut child_pos = pos;
  for child in content.children() {
    let end = child_pos + child.size();
    if end > from && child_pos < to {
      if child.node_type().is_textblock() {
        out.push((child_pos, Arc::clone(child)));
      } else if !child.is_leaf() && !child.is_text() {
        collect_textblocks(child, child_pos + 1, from, to, out);
      }
    }
    child_pos = end;
  }
}
