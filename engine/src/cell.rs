//! FILENAME: engine/src/cell.rs
//! PURPOSE: Defines the fundamental data structures for a single spreadsheet cell.
//! CONTEXT: A cell is a tagged variant: Empty, Text, or Formula. It separates the
//! user's raw input (`text`) from the calculated result (`value`), and — for
//! formulas — memoizes the result in a single-slot cache until the owning sheet
//! invalidates it.

use std::cell::RefCell;

use parser::{parse, Expression, FormulaError, ParseError, Position, Resolver, ESCAPE_SIGN, FORMULA_SIGN};
use serde::{Deserialize, Serialize};

/// The calculated result or raw data a cell can expose through `GetValue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Error(FormulaError),
}

impl CellValue {
    /// Renders this value the way `Sheet::print_values` does: raw text, the
    /// shortest round-trip decimal for numbers, and the `#…!` spelling for errors.
    pub fn render(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format!("{}", n),
            CellValue::Text(s) => s.clone(),
            CellValue::Error(e) => e.to_string(),
        }
    }
}

/// The tagged content of a cell. `Formula` carries its own single-slot lazy
/// cache so `Cell::value` can populate it without requiring `&mut self`.
#[derive(Debug)]
enum Body {
    Empty,
    Text(String),
    Formula {
        ast: Expression,
        text: String,
        referenced: Vec<Position>,
        cache: RefCell<Option<Result<f64, FormulaError>>>,
    },
}

/// The atomic unit of the spreadsheet.
#[derive(Debug)]
pub struct Cell {
    body: Body,
}

impl Cell {
    /// An empty cell, as returned for any position never written to.
    pub fn empty() -> Self {
        Cell { body: Body::Empty }
    }

    /// Builds a cell from raw input text, mirroring the teacher's `Cell::Set`.
    /// `""` becomes Empty; a leading `=` (with more than one character) is
    /// parsed as a formula; anything else is stored verbatim as text.
    ///
    /// This constructor does not touch any dependency graph or cache — that
    /// orchestration belongs to `Sheet::set_cell`, which is the only thing
    /// that knows this cell's `Position` and has access to every other cell.
    pub fn from_text(text: &str) -> Result<Self, ParseError> {
        if text.is_empty() {
            return Ok(Cell { body: Body::Empty });
        }

        if text.len() > 1 && text.starts_with(FORMULA_SIGN) {
            let ast = parse(&text[1..])?;
            let referenced = ast.referenced_cells();
            let canonical = format!("{}{}", FORMULA_SIGN, ast.to_canonical());
            return Ok(Cell {
                body: Body::Formula {
                    ast,
                    text: canonical,
                    referenced,
                    cache: RefCell::new(None),
                },
            });
        }

        Ok(Cell {
            body: Body::Text(text.to_string()),
        })
    }

    /// True iff this cell holds a formula.
    pub fn is_formula(&self) -> bool {
        matches!(self.body, Body::Formula { .. })
    }

    /// The raw text a user would see if they edited this cell: `""` for
    /// Empty, the verbatim string for Text (escape sign preserved), or
    /// `"=" + canonical(ast)` for Formula.
    pub fn text(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Text(s) => s.clone(),
            Body::Formula { text, .. } => text.clone(),
        }
    }

    /// The positions this cell's formula references directly (empty for
    /// Empty/Text cells).
    pub fn referenced_cells(&self) -> &[Position] {
        match &self.body {
            Body::Formula { referenced, .. } => referenced,
            _ => &[],
        }
    }

    /// Computes this cell's value. Formula cells consult their cache first,
    /// falling back to evaluation against `resolver` and memoizing the result.
    pub fn value(&self, resolver: &Resolver<'_>) -> CellValue {
        match &self.body {
            Body::Empty => CellValue::Empty,
            Body::Text(s) => {
                // A leading apostrophe suppresses formula interpretation when displayed.
                match s.strip_prefix(ESCAPE_SIGN) {
                    Some(rest) => CellValue::Text(rest.to_string()),
                    None => CellValue::Text(s.clone()),
                }
            }
            Body::Formula { ast, cache, .. } => {
                if let Some(cached) = cache.borrow().as_ref() {
                    return Self::result_to_value(cached.clone());
                }
                let result = ast.evaluate(resolver);
                *cache.borrow_mut() = Some(result.clone());
                Self::result_to_value(result)
            }
        }
    }

    fn result_to_value(result: Result<f64, FormulaError>) -> CellValue {
        match result {
            Ok(n) => CellValue::Number(n),
            Err(e) => CellValue::Error(e),
        }
    }

    /// Resets this cell's memoized formula result. A no-op for Empty/Text.
    /// Called by the sheet while walking the transitive-dependents graph.
    pub fn invalidate_cache(&self) {
        if let Body::Formula { cache, .. } = &self.body {
            *cache.borrow_mut() = None;
        }
    }
}
