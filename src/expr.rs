//! Boolean equations over named single-bit variables.
#![allow(clippy::module_inception)]

mod expr;
mod parser;
mod regroup;

pub use expr::{Expr, Op};
pub use parser::parse;
pub use regroup::{bracketings, regroupings};
