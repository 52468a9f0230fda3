//! # declift-types
//!
//! Type lattice for the declift decompiler core.
//!
//! This crate provides:
//! - Types with partial knowledge (unknown width or signedness, size-only
//!   placeholders, unions of unreconciled alternatives)
//! - The meet/merge lattice used to refine types to a fixed point
//! - A named type environment with lazy alias resolution
//! - Data interval maps recording typed items per address space
//! - A forward-skippable binary encoding of types
//!
//! # Example
//!
//! ```
//! use declift_types::SharedType;
//!
//! let observed = SharedType::size_only(16);
//! let mut changed = false;
//! let refined = observed.meet_with(&SharedType::integer(0, -1), &mut changed, false);
//! assert!(changed);
//! assert_eq!(refined.ctype(true), "unsigned short");
//! ```

pub mod codec;
mod compat;
pub mod compound;
pub mod env;
pub mod error;
pub mod interval;
mod lattice;
pub mod types;

pub use codec::{decode_type, encode_type, read_type, write_type, TYPE_TAG};
pub use compound::{CompoundType, Field, PADDING_NAME};
pub use env::TypeEnv;
pub use error::IntervalError;
pub use interval::{ComponentStep, DataInterval, DataIntervalMap};
pub use types::*;
