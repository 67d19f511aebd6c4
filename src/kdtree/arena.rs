//! Chunked node storage for a single tree.
//!
//! Nodes are handed out from fixed-size chunks and referenced by [`NodeId`]. Chunks are never
//! reallocated or freed individually; the whole arena is released when its tree is dropped.

use std::mem::size_of;

use crate::error::{KdIndexError, Result};
use crate::kdtree::constants::ARENA_BLOCK_SIZE;
use crate::r#type::IndexableNum;

/// A handle to a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Node<N: IndexableNum> {
    /// Points `permutation[first..last]`.
    Leaf { first: u32, last: u32 },
    /// Points with `coord < split` on `dim` are under `left`, `>= split` under `right`.
    Internal {
        dim: u16,
        split: N,
        left: NodeId,
        right: NodeId,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct NodeArena<N: IndexableNum> {
    chunks: Vec<Vec<Node<N>>>,
    chunk_len: usize,
    len: usize,
    max_nodes: Option<usize>,
}

impl<N: IndexableNum> NodeArena<N> {
    pub(crate) fn new(max_nodes: Option<usize>) -> Self {
        let chunk_len = (ARENA_BLOCK_SIZE / size_of::<Node<N>>()).max(1);
        Self {
            chunks: vec![],
            chunk_len,
            len: 0,
            max_nodes,
        }
    }

    /// Store a node and return its handle.
    pub(crate) fn alloc(&mut self, node: Node<N>) -> Result<NodeId> {
        if self.max_nodes.is_some_and(|max| self.len >= max) || self.len >= u32::MAX as usize {
            return Err(KdIndexError::Allocation(format!(
                "Node arena is full after {} nodes.",
                self.len
            )));
        }

        if self.len == self.chunks.len() * self.chunk_len {
            self.chunks.push(Vec::with_capacity(self.chunk_len));
        }
        // The last chunk has room: either it was just pushed or len is not a chunk boundary.
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.push(node);
        }

        let id = NodeId(self.len as u32);
        self.len += 1;
        Ok(id)
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &Node<N> {
        let index = id.index();
        &self.chunks[index / self.chunk_len][index % self.chunk_len]
    }

    #[inline]
    pub(crate) fn set(&mut self, id: NodeId, node: Node<N>) {
        let index = id.index();
        self.chunks[index / self.chunk_len][index % self.chunk_len] = node;
    }

    /// The number of nodes allocated.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Bytes reserved by all chunks.
    pub(crate) fn memory_usage(&self) -> usize {
        self.chunks.len() * self.chunk_len * size_of::<Node<N>>()
    }
}
