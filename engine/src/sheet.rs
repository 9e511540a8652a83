//! FILENAME: engine/src/sheet.rs
//! PURPOSE: Owns the cell arena, the dependency graph, and the printable
//! region; the only type in this crate that may mutate cells, since it is
//! the only thing holding every cell's `Position` and the graph relating them.
//! CONTEXT: Uses a sparse storage strategy (`HashMap<Position, Cell>`) so
//! spreadsheets sized up to `MAX_POS` x `MAX_POS` cost memory proportional to
//! the number of non-empty cells, not the declared bounds.

use std::collections::HashSet;
use std::io::{self, Write};

use parser::{Position, Size};

use crate::cell::{Cell, CellValue};
use crate::dependency_graph::DependencyGraph;
use crate::error::{SheetError, SheetResult};

/// A sparse, dependency-tracked grid of cells.
pub struct Sheet {
    /// Sparse storage: absent keys behave as `Cell::empty()`.
    cells: std::collections::HashMap<Position, Cell>,
    /// The storage extent. Monotonically non-decreasing; never shrinks.
    sheet_size: Size,
    /// The smallest bounding box covering all non-empty cells.
    printable_size: Size,
    graph: DependencyGraph,
}

impl Sheet {
    /// An empty sheet with size `(0, 0)`.
    pub fn new() -> Self {
        Sheet {
            cells: std::collections::HashMap::new(),
            sheet_size: Size::ZERO,
            printable_size: Size::ZERO,
            graph: DependencyGraph::new(),
        }
    }

    /// The current printable region: the minimum rectangle covering all
    /// non-empty-text cells, or `{0,0}` if the sheet has none.
    pub fn printable_size(&self) -> Size {
        self.printable_size
    }

    /// The current storage extent.
    pub fn sheet_size(&self) -> Size {
        self.sheet_size
    }

    /// Returns a borrow of the cell at `pos`, or `None` if it is outside the
    /// storage extent, absent, or has empty text.
    pub fn get_cell(&self, pos: Position) -> SheetResult<Option<&Cell>> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        if !self.in_sheet_bounds(pos) {
            return Ok(None);
        }
        Ok(self.cells.get(&pos).filter(|c| !c.text().is_empty()))
    }

    /// Computes `pos`'s value, resolving any formula references against this
    /// sheet. Positions outside `[0, MAX_POS)` are rejected by the AST
    /// evaluator's resolver closure with `FormulaError::Ref`; absent or empty
    /// cells resolve as `0.0`.
    pub fn get_value(&self, pos: Position) -> SheetResult<CellValue> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        Ok(self.value_at(pos))
    }

    fn value_at(&self, pos: Position) -> CellValue {
        match self.cells.get(&pos) {
            Some(cell) => cell.value(&|p| self.resolve(p)),
            None => CellValue::Empty,
        }
    }

    /// The closure passed to `Expression::evaluate`: resolves a referenced
    /// position to a number, or the typed error that should propagate.
    fn resolve(&self, pos: Position) -> Result<f64, parser::FormulaError> {
        if !pos.is_valid() {
            return Err(parser::FormulaError::Ref);
        }
        match self.cells.get(&pos) {
            None => Ok(0.0),
            Some(cell) => match cell.value(&|p| self.resolve(p)) {
                CellValue::Empty => Ok(0.0),
                CellValue::Number(n) => Ok(n),
                CellValue::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| parser::FormulaError::Value),
                CellValue::Error(e) => Err(e),
            },
        }
    }

    /// Sets `pos`'s content from raw text. See module docs for the full
    /// parse/cycle-check/commit/invalidate sequence.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> SheetResult<()> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }

        if let Some(existing) = self.cells.get(&pos) {
            if existing.text() == text {
                return Ok(());
            }
        } else if text.is_empty() {
            return Ok(());
        }

        self.grow_to_contain(pos);

        let candidate = Cell::from_text(text)?;
        let referenced: HashSet<Position> = candidate.referenced_cells().iter().copied().collect();

        if self.graph.would_create_cycle(pos, &referenced) {
            return Err(SheetError::CircularDependency);
        }

        self.invalidate_dependents(pos);
        self.graph.set_dependencies(pos, referenced);
        self.cells.insert(pos, candidate);

        self.recompute_printable_size();
        Ok(())
    }

    /// Resets `pos` to Empty. Incoming edges from other formulas that still
    /// reference `pos` are preserved — they will see it resolve to `0.0`.
    pub fn clear_cell(&mut self, pos: Position) -> SheetResult<()> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        if !self.in_sheet_bounds(pos) || !self.cells.contains_key(&pos) {
            return Ok(());
        }

        self.invalidate_dependents(pos);
        self.graph.clear_dependencies(pos);
        self.cells.remove(&pos);

        self.recompute_printable_size();
        Ok(())
    }

    /// Writes `printable_size.rows` tab-separated, newline-terminated lines
    /// of raw cell text (as `get_text` would return it).
    pub fn print_texts(&self, sink: &mut impl Write) -> io::Result<()> {
        self.print_rows(sink, |cell| cell.map(|c| c.text()).unwrap_or_default())
    }

    /// Writes `printable_size.rows` tab-separated, newline-terminated lines
    /// of rendered cell values.
    pub fn print_values(&self, sink: &mut impl Write) -> io::Result<()> {
        self.print_rows(sink, |cell| {
            cell.map(|c| c.value(&|p| self.resolve(p)).render()).unwrap_or_default()
        })
    }

    fn print_rows(&self, sink: &mut impl Write, render: impl Fn(Option<&Cell>) -> String) -> io::Result<()> {
        for row in 0..self.printable_size.rows {
            for col in 0..self.printable_size.cols {
                if col > 0 {
                    write!(sink, "\t")?;
                }
                let cell = self.cells.get(&Position::new(row, col));
                write!(sink, "{}", render(cell))?;
            }
            writeln!(sink)?;
        }
        Ok(())
    }

    fn in_sheet_bounds(&self, pos: Position) -> bool {
        pos.row < self.sheet_size.rows && pos.col < self.sheet_size.cols
    }

    fn grow_to_contain(&mut self, pos: Position) {
        self.sheet_size.rows = self.sheet_size.rows.max(pos.row + 1);
        self.sheet_size.cols = self.sheet_size.cols.max(pos.col + 1);
    }

    /// Clears the memoized result of every transitive dependent of `pos`.
    fn invalidate_dependents(&mut self, pos: Position) {
        for dependent in self.graph.transitive_dependents(pos) {
            if let Some(cell) = self.cells.get(&dependent) {
                cell.invalidate_cache();
            }
        }
    }

    /// Recomputes `printable_size` as the bounding box of all cells with
    /// non-empty text within `sheet_size`. O(live cells).
    fn recompute_printable_size(&mut self) {
        let mut max_row = -1i32;
        let mut max_col = -1i32;

        for (pos, cell) in &self.cells {
            if pos.row >= self.sheet_size.rows || pos.col >= self.sheet_size.cols {
                continue;
            }
            if cell.text().is_empty() {
                continue;
            }
            max_row = max_row.max(pos.row);
            max_col = max_col.max(pos.col);
        }

        self.printable_size = if max_row < 0 {
            Size::ZERO
        } else {
            Size::new(max_row + 1, max_col + 1)
        };
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: i32, col: i32) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn text_and_formula_basics() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "Hello").unwrap();
        sheet.set_cell(pos(1, 0), "=1+2").unwrap();

        assert_eq!(sheet.get_value(pos(0, 0)).unwrap(), CellValue::Text("Hello".to_string()));
        assert_eq!(sheet.get_value(pos(1, 0)).unwrap(), CellValue::Number(3.0));
        assert_eq!(sheet.get_cell(pos(1, 0)).unwrap().unwrap().text(), "=1+2");
        assert_eq!(sheet.printable_size(), Size::new(2, 1));
    }

    #[test]
    fn reference_and_invalidation() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "=2").unwrap();
        sheet.set_cell(pos(0, 1), "=A1*3").unwrap();

        assert_eq!(sheet.get_value(pos(0, 1)).unwrap(), CellValue::Number(6.0));

        sheet.set_cell(pos(0, 0), "=5").unwrap();
        assert_eq!(sheet.get_value(pos(0, 1)).unwrap(), CellValue::Number(15.0));
    }

    #[test]
    fn circular_rejection_preserves_existing_values() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "=B1+1").unwrap(); // A1
        sheet.set_cell(pos(0, 1), "=C1+1").unwrap(); // B1

        let result = sheet.set_cell(pos(0, 2), "=A1+1"); // C1, would close the cycle
        assert_eq!(result, Err(SheetError::CircularDependency));

        // C1 was never committed, so it resolves as empty (0.0): B1 = 0+1 = 1, A1 = 1+1 = 2.
        assert_eq!(sheet.get_value(pos(0, 1)).unwrap(), CellValue::Number(1.0));
        assert_eq!(sheet.get_value(pos(0, 0)).unwrap(), CellValue::Number(2.0));
    }

    #[test]
    fn error_propagation_then_recovery() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "oops").unwrap();
        sheet.set_cell(pos(0, 1), "=A1+1").unwrap();

        assert_eq!(
            sheet.get_value(pos(0, 1)).unwrap(),
            CellValue::Error(parser::FormulaError::Value)
        );

        sheet.set_cell(pos(0, 0), "3.5").unwrap();
        assert_eq!(sheet.get_value(pos(0, 1)).unwrap(), CellValue::Number(4.5));
    }

    #[test]
    fn division_by_zero() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "=1/0").unwrap();
        assert_eq!(
            sheet.get_value(pos(0, 0)).unwrap(),
            CellValue::Error(parser::FormulaError::Div0)
        );
    }

    #[test]
    fn escape_sign_forces_text() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "'=1+1").unwrap();

        assert_eq!(sheet.get_cell(pos(0, 0)).unwrap().unwrap().text(), "'=1+1");
        assert_eq!(sheet.get_value(pos(0, 0)).unwrap(), CellValue::Text("=1+1".to_string()));
    }

    #[test]
    fn printable_size_shrinks_after_clear() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(2, 2), "x").unwrap();
        assert_eq!(sheet.printable_size(), Size::new(3, 3));

        sheet.clear_cell(pos(2, 2)).unwrap();
        assert_eq!(sheet.printable_size(), Size::ZERO);
    }

    #[test]
    fn idempotent_write_is_a_no_op() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 1), "=A1*3").unwrap();
        sheet.set_cell(pos(0, 0), "=2").unwrap();
        assert_eq!(sheet.get_value(pos(0, 1)).unwrap(), CellValue::Number(6.0));

        // Re-setting A1 with its own text must not invalidate B1's cache
        // (no mutation occurs), so reading B1 again returns the same value.
        let text = sheet.get_cell(pos(0, 0)).unwrap().unwrap().text();
        sheet.set_cell(pos(0, 0), &text).unwrap();
        assert_eq!(sheet.get_value(pos(0, 1)).unwrap(), CellValue::Number(6.0));
    }

    #[test]
    fn invalid_position_is_rejected() {
        let mut sheet = Sheet::new();
        let bad = Position::new(-1, 0);
        assert_eq!(sheet.set_cell(bad, "1").unwrap_err(), SheetError::InvalidPosition);
        assert_eq!(sheet.get_value(bad).unwrap_err(), SheetError::InvalidPosition);
    }

    #[test]
    fn formula_parse_error_does_not_mutate() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "=1").unwrap();

        let result = sheet.set_cell(pos(0, 0), "=1+");
        assert!(matches!(result, Err(SheetError::FormulaParse(_))));
        assert_eq!(sheet.get_value(pos(0, 0)).unwrap(), CellValue::Number(1.0));
    }

    #[test]
    fn print_texts_and_values() {
        let mut sheet = Sheet::new();
        sheet.set_cell(pos(0, 0), "1").unwrap();
        sheet.set_cell(pos(0, 1), "=1/0").unwrap();

        let mut texts = Vec::new();
        sheet.print_texts(&mut texts).unwrap();
        assert_eq!(String::from_utf8(texts).unwrap(), "1\t=1/0\n");

        let mut values = Vec::new();
        sheet.print_values(&mut values).unwrap();
        assert_eq!(String::from_utf8(values).unwrap(), "1\t#DIV/0!\n");
    }
}
