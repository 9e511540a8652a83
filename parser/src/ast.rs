//! FILENAME: parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for formula expressions.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure. `Sheet` then traverses this tree
//! (via `Expression::evaluate`) to compute a cell's numeric value.
//!
//! SUPPORTED EXPRESSIONS:
//! - Numeric literals
//! - Cell references: A1, AB12
//! - Binary operations: +, -, *, /
//! - Unary operations: - (negation), + (identity)

use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value-level error produced by formula evaluation. Not an exception: it is
/// a first-class member of a cell's value domain, cached just like a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaError {
    /// A referenced position was out of range.
    Ref,
    /// A referenced cell's text could not be coerced to a number.
    Value,
    /// Division by zero, or a division whose result is not finite.
    Div0,
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Div0 => "#DIV/0!",
        };
        write!(f, "{}", s)
    }
}

impl std::error::Error for FormulaError {}

/// A resolver supplied by the sheet: given a referenced position, produces
/// the number to use in arithmetic, or the typed error that should propagate.
pub type Resolver<'a> = dyn Fn(Position) -> Result<f64, FormulaError> + 'a;

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    CellRef(Position),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperator {
    /// Higher binds tighter. `*`/`/` bind tighter than `+`/`-`.
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Subtract => 1,
            BinaryOperator::Multiply | BinaryOperator::Divide => 2,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}

impl Expression {
    /// Evaluates this expression against the given cell resolver, returning
    /// either a number or the `FormulaError` that aborted evaluation.
    pub fn evaluate(&self, resolver: &Resolver<'_>) -> Result<f64, FormulaError> {
        match self {
            Expression::Number(n) => Ok(*n),
            Expression::CellRef(pos) => resolver(*pos),
            Expression::Unary { op, operand } => {
                let v = operand.evaluate(resolver)?;
                Ok(match op {
                    UnaryOperator::Plus => v,
                    UnaryOperator::Negate => -v,
                })
            }
            Expression::Binary { left, op, right } => {
                let l = left.evaluate(resolver)?;
                let r = right.evaluate(resolver)?;
                match op {
                    BinaryOperator::Add => Ok(l + r),
                    BinaryOperator::Subtract => Ok(l - r),
                    BinaryOperator::Multiply => Ok(l * r),
                    BinaryOperator::Divide => {
                        let result = l / r;
                        if r == 0.0 || !result.is_finite() {
                            Err(FormulaError::Div0)
                        } else {
                            Ok(result)
                        }
                    }
                }
            }
        }
    }

    /// Returns the sorted, deduplicated list of positions referenced anywhere
    /// in this expression tree.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_refs(&self, out: &mut Vec<Position>) {
        match self {
            Expression::Number(_) => {}
            Expression::CellRef(pos) => out.push(*pos),
            Expression::Unary { operand, .. } => operand.collect_refs(out),
            Expression::Binary { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
        }
    }

    /// Prints this expression in canonical infix form, with the minimum
    /// parentheses needed to preserve its structure on re-parse.
    pub fn to_canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out, 0, false);
        out
    }

    /// `parent_precedence` is the precedence of the enclosing binary op (0 if
    /// none); `is_right_of_noncommutative` marks a right child of `-` or `/`,
    /// which needs parens even at equal precedence since `a-(b-c) != a-b-c`.
    fn write_canonical(&self, out: &mut String, parent_precedence: u8, is_right_of_noncommutative: bool) {
        match self {
            Expression::Number(n) => out.push_str(&format!("{}", n)),
            Expression::CellRef(pos) => out.push_str(&pos.label()),
            Expression::Unary { op, operand } => {
                out.push_str(&op.to_string());
                let needs_parens = matches!(operand.as_ref(), Expression::Binary { .. });
                if needs_parens {
                    out.push('(');
                    operand.write_canonical(out, 0, false);
                    out.push(')');
                } else {
                    operand.write_canonical(out, 3, false);
                }
            }
            Expression::Binary { left, op, right } => {
                let prec = op.precedence();
                let needs_parens =
                    prec < parent_precedence || (prec == parent_precedence && is_right_of_noncommutative);

                if needs_parens {
                    out.push('(');
                }
                left.write_canonical(out, prec, false);
                out.push_str(&op.to_string());
                let right_is_noncommutative = matches!(op, BinaryOperator::Subtract | BinaryOperator::Divide);
                right.write_canonical(out, prec, right_is_noncommutative);
                if needs_parens {
                    out.push(')');
                }
            }
        }
    }
}
