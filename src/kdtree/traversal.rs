//! Manual traversal of a built tree.

use geo_traits::{Dimensions, RectTrait};

use crate::bbox::{dimensions, BoundingBox, Corner};
use crate::kdtree::arena::{Node, NodeId};
use crate::kdtree::tree::TreeCore;
use crate::r#type::IndexableNum;

/// A node in a built tree, together with the region of space it covers.
///
/// The region of the root is the bounding box of all points. A child's region is its parent's,
/// cut at the split value, so it contains every point below the child but need not be tight.
#[derive(Debug, Clone)]
pub struct NodeRef<'a, N: IndexableNum> {
    tree: &'a TreeCore<N>,
    id: NodeId,
    bbox: BoundingBox<N>,
}

impl<'a, N: IndexableNum> NodeRef<'a, N> {
    pub(crate) fn root(tree: &'a TreeCore<N>) -> Self {
        Self {
            tree,
            id: tree.root,
            bbox: tree.bbox.clone(),
        }
    }

    /// Returns `true` if this is a leaf node without children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.tree.node(self.id), Node::Leaf { .. })
    }

    /// Returns `true` if this is an internal node with two children.
    #[inline]
    pub fn is_parent(&self) -> bool {
        !self.is_leaf()
    }

    /// The indices of the points stored in this leaf, or `None` for an internal node.
    pub fn point_indices(&self) -> Option<&'a [u32]> {
        match *self.tree.node(self.id) {
            Node::Leaf { first, last } => Some(self.tree.leaf_indices(first, last)),
            Node::Internal { .. } => None,
        }
    }

    /// The split dimension and value of an internal node.
    pub fn split(&self) -> Option<(usize, N)> {
        match *self.tree.node(self.id) {
            Node::Internal { dim, split, .. } => Some((dim as usize, split)),
            Node::Leaf { .. } => None,
        }
    }

    /// The region covered by this node.
    pub fn bounding_box(&self) -> &BoundingBox<N> {
        &self.bbox
    }

    /// The child holding points below the split value.
    pub fn left_child(&self) -> Option<NodeRef<'a, N>> {
        match *self.tree.node(self.id) {
            Node::Internal {
                dim, split, left, ..
            } => {
                let mut bbox = self.bbox.clone();
                bbox.high_mut()[dim as usize] = split;
                Some(Self {
                    tree: self.tree,
                    id: left,
                    bbox,
                })
            }
            Node::Leaf { .. } => None,
        }
    }

    /// The child holding points at or above the split value.
    pub fn right_child(&self) -> Option<NodeRef<'a, N>> {
        match *self.tree.node(self.id) {
            Node::Internal {
                dim, split, right, ..
            } => {
                let mut bbox = self.bbox.clone();
                bbox.low_mut()[dim as usize] = split;
                Some(Self {
                    tree: self.tree,
                    id: right,
                    bbox,
                })
            }
            Node::Leaf { .. } => None,
        }
    }
}

impl<N: IndexableNum> RectTrait for NodeRef<'_, N> {
    type T = N;
    type CoordType<'b>
        = Corner<'b, N>
    where
        Self: 'b;

    fn dim(&self) -> Dimensions {
        dimensions(self.bbox.dims())
    }

    fn min(&self) -> Self::CoordType<'_> {
        self.bbox.min()
    }

    fn max(&self) -> Self::CoordType<'_> {
        self.bbox.max()
    }
}
