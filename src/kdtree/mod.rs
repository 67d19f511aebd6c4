//! K-D trees answering nearest-neighbor and radius queries.
//!
//! [`KdTree`] is built once over a fixed point set. [`DynamicKdTree`] accepts insertions and
//! removals. Both are queried through the [`KdTreeIndex`] trait.

#![warn(missing_docs)]

mod arena;
mod builder;
pub(crate) mod constants;
mod dynamic;
mod index;
mod io;
mod r#trait;
mod traversal;
mod tree;

pub use builder::KdTreeBuilder;
pub use constants::DEFAULT_LEAF_MAX_SIZE;
pub use dynamic::{DynamicKdTree, DynamicKdTreeRef};
pub use index::KdTree;
pub use r#trait::KdTreeIndex;
pub use traversal::NodeRef;

#[cfg(test)]
mod test;
