//! Output format utilities for declift.
//!
//! Debug exporters (expression trees, interval maps) share the DOT helpers
//! defined here.

pub mod dot;

pub use dot::{escape_dot_string, DotConfig};
