//! FILENAME: engine/src/error.rs
//! PURPOSE: Structural errors raised by `Sheet`'s mutators and readers.
//! CONTEXT: Distinct from `parser::FormulaError`, which is a value-level
//! result cached like any other cell value. These errors abort the mutation
//! that raised them and leave the sheet unchanged.

use parser::ParseError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum SheetError {
    #[error("position out of range")]
    InvalidPosition,

    #[error("formula parse error: {0}")]
    FormulaParse(#[from] ParseError),

    #[error("setting this cell would create a circular dependency")]
    CircularDependency,
}

pub type SheetResult<T> = Result<T, SheetError>;
