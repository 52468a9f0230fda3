//! Error types for declift-types.

use thiserror::Error;

/// Reasons a [`DataIntervalMap`](crate::DataIntervalMap) rejected an
/// insertion or expansion. The map is unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    /// The new item starts inside an existing one but runs past its end.
    #[error("{name} at {addr:#x} weaves with the item at {existing:#x}")]
    Weave {
        addr: u64,
        existing: u64,
        name: String,
    },

    /// The new type cannot describe the storage already typed there.
    #[error("type {new} at {addr:#x} is not compatible with existing type {existing}")]
    Incompatible {
        addr: u64,
        new: String,
        existing: String,
    },

    /// A smaller item was placed inside a scalar.
    #[error("existing item at {addr:#x} is neither a struct nor an array")]
    NotAggregate { addr: u64 },

    /// The range is already (partly) occupied.
    #[error("{addr:#x}..{end:#x} overlaps an existing item")]
    Overlap { addr: u64, end: u64 },

    /// No item starts at the address.
    #[error("no item at {0:#x}")]
    NotFound(u64),
}
