//! # declift-analysis
//!
//! Expression trees and the term rewriting engine for declift.
//!
//! This crate provides:
//! - The expression tree with structural, wildcard aware equality and a
//!   total order for canonicalization
//! - Infix printing, pattern search and search/replace
//! - Peephole simplification to a fixed point, `+`/`-` chain normalization
//!   and address simplification
//! - A forward-skippable binary encoding of expressions
//! - Graphviz export for debugging
//! - Liveness helpers for assignment statements
//!
//! # Example
//!
//! ```
//! use declift_analysis::{Exp, Oper};
//!
//! // (r[24] << 2) + 0
//! let e = Exp::plus(Exp::binary(Oper::ShiftL, Exp::reg_of(24), Exp::int(2)), Exp::int(0));
//! assert_eq!(e.simplify().to_string(), "r[24] * 4");
//! ```

pub mod exp;

pub use exp::{accumulate, decode_exp, encode_exp, may_alias, read_exp, write_exp};
pub use exp::{ConstValue, Exp, ExpKind, Oper, Rtl, SimplifyConfig, Statement, Terms};
