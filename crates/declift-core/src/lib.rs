//! # declift-core
//!
//! Shared primitives for the declift decompiler core. This crate holds the
//! error types, the framed LEB128 record codec used to persist types and
//! expressions, and the Graphviz helpers used by debug exporters.

pub mod codec;
pub mod error;
pub mod output;

pub use codec::{Record, RecordReader, RecordWriter, FID_EXP_END};
pub use error::{CodecError, Error};
pub use output::{escape_dot_string, DotConfig};
