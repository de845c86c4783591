//! Formula engine for the tally workbook engine.
//!
//! Formulas are built as a typed [`Expr`] tree whose leaves are concrete
//! [`CellAddress`](tally_core::CellAddress)es. The tree renders to
//! direct-coordinate spreadsheet text (no named ranges) and can be evaluated
//! against any [`CellLookup`], which is how generated documents are checked
//! without a spreadsheet application.

pub mod eval;
pub mod expr;

pub use eval::{CellLookup, EvalError, Evaluator, LookupValue};
pub use expr::{BinOp, Expr, Func};
