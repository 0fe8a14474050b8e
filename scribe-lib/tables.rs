//! Table extension: schema fragment, the cell grid map, structural
//! row/column commands, and the table-fixing pass.
//!
//! Tables have a fixed two-level shape: a `table` of `table_row`s of
//! `table_cell`s, each cell carrying `colspan`/`rowspan`/`header`
//! attributes. All structural operations are expressed as replace and
//! attribute steps through the generic engine, so they are undoable and
//! position-mappable like any other edit; nothing mutates a row or cell in
//! place.
//!
//! Commands return `None` when the current selection shape makes them not
//! applicable (no table around the selection, a non-rectangular merge
//! target, splitting a 1x1 cell). A rejected command is a no-op.

use std::sync::Arc;

use scribe_core::{
  Tendril,
  dom::{
    DomElem,
    ExportTag,
    ParseRule,
  },
  node::{
    Attrs,
    Fragment,
    Node,
  },
  position,
  replace::Slice,
  schema::{
    AttrSpec,
    NodeTypeSpec,
    Schema,
    SchemaError,
  },
};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{
  state::EditorState,
  transaction::{
    HISTORY_SKIP,
    META_HISTORY,
    Transaction,
  },
};

pub type Result<T> = std::result::Result<T, TableShapeError>;

/// A structurally impossible table operation. Surfaced to command callers
/// as "not applicable"; never partially executed.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableShapeError {
  #[error("selection is not inside a table")]
  NotInTable,
  #[error("table row {0} does not contain cells")]
  MalformedRow(usize),
  #[error("table slot ({row}, {col}) is covered by two cells")]
  Overlap { row: usize, col: usize },
  #[error("table slot ({row}, {col}) is not covered by any cell")]
  Gap { row: usize, col: usize },
  #[error("selected cells do not form a contiguous rectangle")]
  NotRectangular,
}

/// Node specs for the table fragment, to be combined with a base schema's
/// specs. Cells hold block content, so any block vocabulary nests inside.
pub fn node_specs() -> Vec<NodeTypeSpec> {
  vec![
    NodeTypeSpec::new("table")
      .content("table_row+")
      .group("block")
      .parse_rule(ParseRule::tag("table"))
      .to_html(|_| ExportTag::new("table")),
    NodeTypeSpec::new("table_row")
      .content("table_cell+")
      .parse_rule(ParseRule::tag("tr"))
      .to_html(|_| ExportTag::new("tr")),
    NodeTypeSpec::new("table_cell")
      .content("block+")
      .attr("colspan", AttrSpec::with_default(1).validated(positive))
      .attr("rowspan", AttrSpec::with_default(1).validated(positive))
      .attr("header", AttrSpec::with_default(false).validated(|v| v.is_boolean()))
      .parse_rule(ParseRule::tag("td").with_attrs(cell_attrs))
      .parse_rule(ParseRule::tag("th").with_attrs(cell_attrs))
      .to_html(cell_tag),
  ]
}

/// The basic schema extended with the table fragment.
pub fn schema_with_tables() -> std::result::Result<Arc<Schema>, SchemaError> {
  let mut nodes = scribe_core::basic::node_specs();
  nodes.extend(node_specs());
  Schema::define(nodes, scribe_core::basic::mark_specs(), "doc")
}

fn positive(v: &Value) -> bool {
  v.as_i64().is_some_and(|n| n > 0)
}

fn cell_attrs(elem: &DomElem) -> Option<Attrs> {
  let mut attrs = Attrs::new();
  if let Some(n) = elem.attr("colspan").and_then(|v| v.parse::<i64>().ok()) {
    attrs.insert(Tendril::from("colspan"), Value::from(n));
  }
  if let Some(n) = elem.attr("rowspan").and_then(|v| v.parse::<i64>().ok()) {
    attrs.insert(Tendril::from("rowspan"), Value::from(n));
  }
  attrs.insert(Tendril::from("header"), Value::from(elem.tag == "th"));
  Some(attrs)
}

fn cell_tag(attrs: &Attrs) -> ExportTag {
  let header = attrs.get("header").and_then(Value::as_bool).unwrap_or(false);
  let mut tag = ExportTag::new(if header { "th" } else { "td" });
  for name in ["colspan", "rowspan"] {
    if let Some(n) = attrs.get(name).and_then(Value::as_i64)
      && n > 1
    {
      tag = tag.with_attr(name, format!("{n}"));
    }
  }
  tag
}

fn int_attr(node: &Node, name: &str) -> usize {
  node
    .attrs()
    .get(name)
    .and_then(Value::as_i64)
    .map(|n| n.max(1) as usize)
    .unwrap_or(1)
}

/// One cell's place in the grid. `pos` is the absolute position before the
/// cell node.
#[derive(Debug, Clone)]
pub struct CellRect {
  pub node:    Arc<Node>,
  pub pos:     usize,
  pub row:     usize,
  pub col:     usize,
  pub colspan: usize,
  pub rowspan: usize,
}

impl CellRect {
  fn right(&self) -> usize {
    self.col + self.colspan
  }

  fn bottom(&self) -> usize {
    self.row + self.rowspan
  }
}

/// The resolved rectangular grid of one table node: which cell covers each
/// slot, with spans expanded.
#[derive(Debug)]
pub struct TableMap {
  pub width:  usize,
  pub height: usize,
  /// Per slot, an index into `cells`; row-major.
  grid:       Vec<Option<usize>>,
  cells:      Vec<CellRect>,
}

impl TableMap {
  /// Build the map for a table node starting at `table_pos`. Fails when the
  /// grid has gaps or overlapping spans; run the fixing pass first for
  /// documents of unknown provenance.
  pub fn build(table: &Arc<Node>, table_pos: usize) -> Result<TableMap> {
    let rows = table.content().ok_or(TableShapeError::MalformedRow(0))?;
    let height = rows.child_count();
    let mut cells: Vec<CellRect> = Vec::new();
    // Grown to the real width as cells are placed.
    let mut grid: Vec<Vec<Option<usize>>> = vec![Vec::new(); height];

    let mut row_pos = table_pos + 1;
    for (r, row) in rows.children().iter().enumerate() {
      let row_content = row.content().ok_or(TableShapeError::MalformedRow(r))?;
      let mut cell_pos = row_pos + 1;
      for cell in row_content.children() {
        let colspan = int_attr(cell, "colspan");
        let rowspan = int_attr(cell, "rowspan");
        let mut col = 0;
        while grid[r].get(col).copied().flatten().is_some() {
          col += 1;
        }
        let idx = cells.len();
        cells.push(CellRect {
          node: Arc::clone(cell),
          pos: cell_pos,
          row: r,
          col,
          colspan,
          rowspan,
        });
        for rr in r..(r + rowspan).min(height) {
          for cc in col..col + colspan {
            if grid[rr].len() <= cc {
              grid[rr].resize(cc + 1, None);
            }
            if grid[rr][cc].is_some() {
              return Err(TableShapeError::Overlap { row: rr, col: cc });
            }
            grid[rr][cc] = Some(idx);
          }
        }
        cell_pos += cell.size();
      }
      row_pos += row.size();
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut flat = Vec::with_capacity(width * height);
    for (r, row) in grid.iter().enumerate() {
      for c in 0..width {
        let slot = row.get(c).copied().flatten();
        if slot.is_none() {
          return Err(TableShapeError::Gap { row: r, col: c });
        }
        flat.push(slot);
      }
    }

    Ok(TableMap {
      width,
      height,
      grid: flat,
      cells,
    })
  }

  pub fn cell_at(&self, row: usize, col: usize) -> Option<&CellRect> {
    let idx = *self.grid.get(row * self.width + col)?;
    idx.map(|i| &self.cells[i])
  }

  pub fn cells(&self) -> &[CellRect] {
    &self.cells
  }

  /// The cell whose node span contains the given absolute position.
  pub fn cell_containing(&self, pos: usize) -> Option<&CellRect> {
    self
      .cells
      .iter()
      .find(|c| c.pos < pos && pos < c.pos + c.node.size())
  }

  /// Own cells of one row, in document order.
  fn row_cells(&self, row: usize) -> impl Iterator<Item = &CellRect> {
    self.cells.iter().filter(move |c| c.row == row)
  }
}

/// A table around the current selection.
struct TableContext {
  table:     Arc<Node>,
  /// Absolute position before the table node.
  table_pos: usize,
  map:       TableMap,
  /// Cell containing the selection head.
  cell:      CellRect,
}

fn find_table(state: &EditorState) -> Option<TableContext> {
  let head = state.selection().head;
  let rp = position::resolve(state.doc(), head).ok()?;
  for depth in (1..=rp.depth()).rev() {
    if rp.node(depth).type_name() == "table" {
      let table = Arc::clone(rp.node(depth));
      let table_pos = rp.before(depth);
      let map = TableMap::build(&table, table_pos).ok()?;
      let cell = map.cell_containing(head)?.clone();
      return Some(TableContext {
        table,
        table_pos,
        map,
        cell,
      });
    }
  }
  None
}

/// Absolute position before row `r` of the table at `table_pos`.
fn row_start(table: &Node, table_pos: usize, r: usize) -> usize {
  let mut pos = table_pos + 1;
  for row in &table.content().expect("table holds rows").children()[..r] {
    pos += row.size();
  }
  pos
}

/// Absolute position of the content end of row `r`.
fn row_content_end(table: &Node, table_pos: usize, r: usize) -> usize {
  let row = &table.content().expect("table holds rows").children()[r];
  row_start(table, table_pos, r) + row.size() - 1
}

fn empty_cell(schema: &Arc<Schema>) -> Option<Arc<Node>> {
  let paragraph = schema
    .node_type("paragraph")?
    .create(Attrs::new(), [])
    .ok()?;
  schema
    .node_type("table_cell")?
    .create(Attrs::new(), [paragraph])
    .ok()
}

fn with_int_attr(node: &Node, name: &str, value: usize) -> Attrs {
  let mut attrs = node.attrs().clone();
  attrs.insert(Tendril::from(name), Value::from(value as i64));
  attrs
}

/// Where a new cell for column `col` goes inside row `r`: before the first
/// own cell at or past that column, or at the row's content end.
fn insert_pos_in_row(ctx: &TableContext, r: usize, col: usize) -> usize {
  ctx
    .map
    .row_cells(r)
    .find(|c| c.col >= col)
    .map(|c| c.pos)
    .unwrap_or_else(|| row_content_end(&ctx.table, ctx.table_pos, r))
}

pub fn insert_row_before(state: &EditorState) -> Option<Transaction> {
  insert_row(state, false)
}

pub fn insert_row_after(state: &EditorState) -> Option<Transaction> {
  insert_row(state, true)
}

fn insert_row(state: &EditorState, after: bool) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let boundary = if after { ctx.cell.bottom() } else { ctx.cell.row };
  let mut tr = state.tr();

  // Cells spanning across the boundary grow by a row instead of being cut.
  let mut covered = vec![false; ctx.map.width];
  if boundary > 0 && boundary < ctx.map.height {
    let mut seen: Vec<usize> = Vec::new();
    for c in 0..ctx.map.width {
      let cell = ctx.map.cell_at(boundary - 1, c)?;
      if cell.bottom() > boundary {
        for cc in cell.col..cell.right() {
          covered[cc] = true;
        }
        if !seen.contains(&cell.pos) {
          seen.push(cell.pos);
          tr.set_attrs(cell.pos, with_int_attr(&cell.node, "rowspan", cell.rowspan + 1))
            .ok()?;
        }
      }
    }
  }

  let new_cells = covered.iter().filter(|c| !**c).count();
  if new_cells > 0 {
    let cell = empty_cell(state.schema())?;
    let row = state
      .schema()
      .node_type("table_row")?
      .create(Attrs::new(), std::iter::repeat_with(|| Arc::clone(&cell)).take(new_cells))
      .ok()?;
    let pos = row_start(&ctx.table, ctx.table_pos, boundary);
    tr.replace(pos, pos, Slice::closed(Fragment::new([row]))).ok()?;
  }
  Some(tr)
}

pub fn delete_row(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let r = ctx.cell.row;
  let mut tr = state.tr();

  if ctx.map.height == 1 {
    // Removing the only row removes the table.
    let end = ctx.table_pos + ctx.table.size();
    tr.delete_range(ctx.table_pos, end).ok()?;
    return Some(tr);
  }

  // Cells from earlier rows spanning into the deleted row shrink.
  let mut seen: Vec<usize> = Vec::new();
  for c in 0..ctx.map.width {
    let cell = ctx.map.cell_at(r, c)?;
    if cell.row < r && !seen.contains(&cell.pos) {
      seen.push(cell.pos);
      tr.set_attrs(cell.pos, with_int_attr(&cell.node, "rowspan", cell.rowspan - 1))
        .ok()?;
    }
  }

  // Cells starting here but spanning further down move their remainder into
  // the next row. Inserted in descending position order so earlier
  // insertion points stay valid.
  let mut moves: Vec<(usize, Arc<Node>)> = Vec::new();
  for cell in ctx.map.row_cells(r) {
    if cell.rowspan > 1 {
      let remainder = cell
        .node
        .with_attrs(with_int_attr(&cell.node, "rowspan", cell.rowspan - 1))
        .ok()?;
      moves.push((insert_pos_in_row(&ctx, r + 1, cell.col), remainder));
    }
  }
  moves.sort_by(|a, b| b.0.cmp(&a.0));
  for (pos, node) in moves {
    tr.replace(pos, pos, Slice::closed(Fragment::new([node]))).ok()?;
  }

  let start = row_start(&ctx.table, ctx.table_pos, r);
  let size = ctx.table.content()?.child(r)?.size();
  tr.delete_range(start, start + size).ok()?;
  Some(tr)
}

pub fn insert_column_before(state: &EditorState) -> Option<Transaction> {
  insert_column(state, false)
}

pub fn insert_column_after(state: &EditorState) -> Option<Transaction> {
  insert_column(state, true)
}

fn insert_column(state: &EditorState, after: bool) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let boundary = if after { ctx.cell.right() } else { ctx.cell.col };
  let mut tr = state.tr();

  // Cells spanning across the vertical boundary widen; their rows get no
  // new cell.
  let mut covered = vec![false; ctx.map.height];
  let mut widened: Vec<usize> = Vec::new();
  if boundary > 0 && boundary < ctx.map.width {
    for r in 0..ctx.map.height {
      let cell = ctx.map.cell_at(r, boundary - 1)?;
      if cell.right() > boundary {
        for rr in cell.row..cell.bottom() {
          covered[rr] = true;
        }
        if !widened.contains(&cell.pos) {
          widened.push(cell.pos);
          tr.set_attrs(cell.pos, with_int_attr(&cell.node, "colspan", cell.colspan + 1))
            .ok()?;
        }
      }
    }
  }

  let cell = empty_cell(state.schema())?;
  let mut inserts: Vec<usize> = (0..ctx.map.height)
    .filter(|r| !covered[*r])
    .map(|r| insert_pos_in_row(&ctx, r, boundary))
    .collect();
  inserts.sort_by(|a, b| b.cmp(a));
  for pos in inserts {
    tr.replace(pos, pos, Slice::closed(Fragment::new([Arc::clone(&cell)])))
      .ok()?;
  }
  Some(tr)
}

pub fn delete_column(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let col = ctx.cell.col;
  let mut tr = state.tr();

  if ctx.map.width == 1 {
    let end = ctx.table_pos + ctx.table.size();
    tr.delete_range(ctx.table_pos, end).ok()?;
    return Some(tr);
  }

  // Spanning cells shrink, single-column cells are deleted. Deletions run
  // in descending position order.
  let mut narrowed: Vec<usize> = Vec::new();
  let mut deletions: Vec<(usize, usize)> = Vec::new();
  for r in 0..ctx.map.height {
    let cell = ctx.map.cell_at(r, col)?;
    if narrowed.contains(&cell.pos) {
      continue;
    }
    narrowed.push(cell.pos);
    if cell.colspan > 1 {
      tr.set_attrs(cell.pos, with_int_attr(&cell.node, "colspan", cell.colspan - 1))
        .ok()?;
    } else {
      deletions.push((cell.pos, cell.pos + cell.node.size()));
    }
  }
  deletions.sort_by(|a, b| b.0.cmp(&a.0));
  for (from, to) in deletions {
    tr.delete_range(from, to).ok()?;
  }
  Some(tr)
}

pub fn merge_cells(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let anchor = state.selection().anchor;
  let anchor_cell = ctx.map.cell_containing(anchor)?.clone();
  if anchor_cell.pos == ctx.cell.pos {
    return None;
  }

  // Bounding rectangle of the two selected cells.
  let top = anchor_cell.row.min(ctx.cell.row);
  let left = anchor_cell.col.min(ctx.cell.col);
  let bottom = anchor_cell.bottom().max(ctx.cell.bottom());
  let right = anchor_cell.right().max(ctx.cell.right());

  // Every covered cell must lie entirely inside the rectangle.
  let mut members: Vec<CellRect> = Vec::new();
  for r in top..bottom {
    for c in left..right {
      let cell = ctx.map.cell_at(r, c)?;
      if cell.row < top || cell.bottom() > bottom || cell.col < left || cell.right() > right {
        return None;
      }
      if !members.iter().any(|m| m.pos == cell.pos) {
        members.push(cell.clone());
      }
    }
  }
  let target = members
    .iter()
    .find(|m| m.row == top && m.col == left)?
    .clone();

  let mut tr = state.tr();
  let mut attrs = with_int_attr(&target.node, "colspan", right - left);
  attrs.insert(Tendril::from("rowspan"), Value::from((bottom - top) as i64));
  tr.set_attrs(target.pos, attrs).ok()?;

  // Non-placeholder content of the absorbed cells moves into the target.
  let mut absorbed: Vec<Arc<Node>> = Vec::new();
  for member in &members {
    if member.pos == target.pos {
      continue;
    }
    let content = member.node.content()?;
    let placeholder = content.child_count() == 1
      && content.child(0).is_some_and(|c| c.type_name() == "paragraph" && c.content_size() == 0);
    if !placeholder {
      absorbed.extend(content.children().iter().cloned());
    }
  }

  let mut edits: Vec<(usize, usize, Slice)> = members
    .iter()
    .filter(|m| m.pos != target.pos)
    .map(|m| (m.pos, m.pos + m.node.size(), Slice::empty()))
    .collect();
  if !absorbed.is_empty() {
    let end = target.pos + target.node.size() - 1;
    edits.push((end, end, Slice::closed(Fragment::new(absorbed))));
  }
  edits.sort_by(|a, b| b.0.cmp(&a.0));
  for (from, to, slice) in edits {
    tr.replace(from, to, slice).ok()?;
  }
  Some(tr)
}

pub fn split_cell(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let cell = &ctx.cell;
  if cell.colspan == 1 && cell.rowspan == 1 {
    return None;
  }

  let mut tr = state.tr();
  let mut attrs = with_int_attr(&cell.node, "colspan", 1);
  attrs.insert(Tendril::from("rowspan"), Value::from(1));
  tr.set_attrs(cell.pos, attrs).ok()?;

  let empty = empty_cell(state.schema())?;
  // One insert per affected row, in descending position order. The origin
  // row refills colspan - 1 slots; every other spanned row refills colspan.
  let mut inserts: Vec<(usize, usize)> = Vec::new();
  if cell.colspan > 1 {
    inserts.push((cell.pos + cell.node.size(), cell.colspan - 1));
  }
  for r in cell.row + 1..cell.bottom() {
    inserts.push((insert_pos_in_row(&ctx, r, cell.col), cell.colspan));
  }
  inserts.sort_by(|a, b| b.0.cmp(&a.0));
  for (pos, count) in inserts {
    let cells: Vec<Arc<Node>> = (0..count).map(|_| Arc::clone(&empty)).collect();
    tr.replace(pos, pos, Slice::closed(Fragment::new(cells))).ok()?;
  }
  Some(tr)
}

pub fn toggle_header_row(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let cells: Vec<CellRect> = ctx.map.row_cells(0).cloned().collect();
  toggle_header(state, cells)
}

pub fn toggle_header_column(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  let mut cells: Vec<CellRect> = Vec::new();
  for r in 0..ctx.map.height {
    let cell = ctx.map.cell_at(r, 0)?;
    if !cells.iter().any(|c| c.pos == cell.pos) {
      cells.push(cell.clone());
    }
  }
  toggle_header(state, cells)
}

pub fn toggle_header_cell(state: &EditorState) -> Option<Transaction> {
  let ctx = find_table(state)?;
  toggle_header(state, vec![ctx.cell.clone()])
}

fn toggle_header(state: &EditorState, cells: Vec<CellRect>) -> Option<Transaction> {
  if cells.is_empty() {
    return None;
  }
  let all_header = cells.iter().all(|c| {
    c.node
      .attrs()
      .get("header")
      .and_then(Value::as_bool)
      .unwrap_or(false)
  });
  let mut tr = state.tr();
  for cell in &cells {
    let mut attrs = cell.node.attrs().clone();
    attrs.insert(Tendril::from("header"), Value::from(!all_header));
    tr.set_attrs(cell.pos, attrs).ok()?;
  }
  Some(tr)
}

/// Normalize every table in the document: rows narrower than the table's
/// width (the widest effective row) are padded with empty cells, and
/// rowspans overhanging the bottom are clamped. The produced transaction is
/// excluded from undo history. `None` when every table is already sound.
pub fn fix_tables(state: &EditorState) -> Option<Transaction> {
  let mut tables: Vec<(Arc<Node>, usize)> = Vec::new();
  collect_tables(state.doc(), 0, &mut tables);
  if tables.is_empty() {
    return None;
  }

  // (pos, pad count) inserts and (pos, attrs) clamps, gathered doc-wide.
  let mut pads: Vec<(usize, usize)> = Vec::new();
  let mut clamps: Vec<(usize, Attrs)> = Vec::new();
  for (table, table_pos) in &tables {
    let rows = table.content()?;
    let height = rows.child_count();
    // Effective width per row: own colspans plus carry from rowspans above.
    let mut carry: Vec<usize> = vec![0; height + 1];
    let mut eff: Vec<usize> = vec![0; height];
    let mut row_pos = table_pos + 1;
    for (r, row) in rows.children().iter().enumerate() {
      let mut width = carry[r];
      let mut cell_pos = row_pos + 1;
      for cell in row.content()?.children() {
        let colspan = int_attr(cell, "colspan");
        let rowspan = int_attr(cell, "rowspan");
        width += colspan;
        if r + rowspan > height {
          clamps.push((cell_pos, with_int_attr(cell, "rowspan", height - r)));
        }
        for rr in r + 1..(r + rowspan).min(height) {
          carry[rr] += colspan;
        }
        cell_pos += cell.size();
      }
      eff[r] = width;
      row_pos += row.size();
    }
    let table_width = eff.iter().copied().max().unwrap_or(0);
    for (r, width) in eff.iter().enumerate() {
      if *width < table_width {
        warn!(
          row = r,
          width, table_width, "padding short table row"
        );
        pads.push((row_content_end(table, *table_pos, r), table_width - width));
      }
    }
  }

  if pads.is_empty() && clamps.is_empty() {
    return None;
  }

  let empty = empty_cell(state.schema())?;
  let mut tr = state.tr();
  for (pos, attrs) in clamps {
    tr.set_attrs(pos, attrs).ok()?;
  }
  pads.sort_by(|a, b| b.0.cmp(&a.0));
  for (pos, count) in pads {
    let cells: Vec<Arc<Node>> = (0..count).map(|_| Arc::clone(&empty)).collect();
    tr.replace(pos, pos, Slice::closed(Fragment::new(cells))).ok()?;
  }
  tr.set_meta(META_HISTORY, HISTORY_SKIP);
  Some(tr)
}

fn collect_tables(node: &Arc<Node>, pos: usize, out: &mut Vec<(Arc<Node>, usize)>) {
  let Some(content) = node.content() else {
    return;
  };
  let mut child_pos = pos;
  for child in content.children() {
    if child.type_name() == "table" {
      out.push((Arc::clone(child), child_pos));
    } else if !child.is_leaf() && !child.is_text() {
      collect_tables(child, child_pos + 1, out);
    }
    child_pos += child.size();
  }
}

/// Whether any step of the transaction touched a table node. Used by the
/// editor state to decide when to schedule the fixing pass.
pub fn touches_table(tr: &Transaction) -> bool {
  let mut tables = Vec::new();
  collect_tables(tr.base_doc(), 0, &mut tables);
  if !tables.is_empty() {
    return true;
  }
  collect_tables(tr.doc(), 0, &mut tables);
  !tables.is_empty()
}
