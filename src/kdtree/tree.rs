//! Construction and search shared by the static and dynamic trees.

use num_traits::NumCast;
use tinyvec::TinyVec;

use crate::bbox::BoundingBox;
use crate::error::{KdIndexError, Result};
use crate::kdtree::arena::{Node, NodeArena, NodeId};
use crate::metric::DistanceMetric;
use crate::params::{KdTreeParams, SearchParams};
use crate::r#type::IndexableNum;
use crate::result::ResultSet;
use crate::source::PointSource;

/// Per-axis lower bounds, kept inline for up to 8 dimensions.
type AxisDists = TinyVec<[f64; 8]>;

/// A built tree: the node arena plus the permutation of point indices its leaves refer to.
#[derive(Debug, Clone)]
pub(crate) struct TreeCore<N: IndexableNum> {
    pub(crate) dims: usize,
    pub(crate) leaf_max_size: usize,
    pub(crate) permutation: Vec<u32>,
    pub(crate) bbox: BoundingBox<N>,
    pub(crate) arena: NodeArena<N>,
    pub(crate) root: NodeId,
}

struct BuildTask<N: IndexableNum> {
    node: NodeId,
    first: usize,
    last: usize,
    bbox: BoundingBox<N>,
}

struct Frame {
    node: NodeId,
    mindist: f64,
    dists: AxisDists,
}

/// Caps the number of leaves a query may visit, across every tree it touches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeafBudget {
    remaining: Option<usize>,
}

impl LeafBudget {
    pub(crate) fn new(checks: Option<usize>) -> Self {
        Self { remaining: checks }
    }

    /// Spend one leaf visit. Returns `false` once the budget is exhausted.
    #[inline]
    fn take(&mut self) -> bool {
        match self.remaining.as_mut() {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

impl<N: IndexableNum> TreeCore<N> {
    /// Build a tree over the points named by `permutation`.
    ///
    /// `bbox` may be supplied when the bounds of those points are already known; it must contain
    /// every one of them.
    pub(crate) fn build<S>(
        source: &S,
        mut permutation: Vec<u32>,
        params: &KdTreeParams,
        bbox: Option<BoundingBox<N>>,
    ) -> Result<Self>
    where
        S: PointSource<N> + ?Sized,
    {
        params.validate()?;
        let dims = source.dims();
        if dims == 0 {
            return Err(KdIndexError::Construction(
                "Dimensionality must be at least 1.".to_string(),
            ));
        }
        if dims > u16::MAX as usize {
            return Err(KdIndexError::Construction(format!(
                "Dimensionality {} does not fit in u16.",
                dims
            )));
        }
        if permutation.is_empty() {
            return Err(KdIndexError::Construction(
                "Cannot build a tree over zero points.".to_string(),
            ));
        }

        let bbox = match bbox {
            Some(bbox) if bbox.dims() == dims => bbox,
            Some(bbox) => {
                return Err(KdIndexError::Construction(format!(
                    "Bounding box has {} dimensions, points have {}.",
                    bbox.dims(),
                    dims
                )))
            }
            None => BoundingBox::from_indices(source, &permutation, dims),
        };

        let mut arena = NodeArena::new(params.max_nodes);
        let root = arena.alloc(Node::Leaf { first: 0, last: 0 })?;

        let mut stack = vec![BuildTask {
            node: root,
            first: 0,
            last: permutation.len(),
            bbox: bbox.clone(),
        }];

        while let Some(task) = stack.pop() {
            let BuildTask {
                node,
                first,
                last,
                bbox: task_bbox,
            } = task;

            if last - first <= params.leaf_max_size {
                arena.set(
                    node,
                    Node::Leaf {
                        first: first as u32,
                        last: last as u32,
                    },
                );
                continue;
            }

            let (dim, split, offset) =
                split_range(source, &mut permutation[first..last], &task_bbox);
            let mid = first + offset;

            let left = arena.alloc(Node::Leaf { first: 0, last: 0 })?;
            let right = arena.alloc(Node::Leaf { first: 0, last: 0 })?;
            arena.set(
                node,
                Node::Internal {
                    dim: dim as u16,
                    split,
                    left,
                    right,
                },
            );

            let left_bbox = BoundingBox::from_indices(source, &permutation[first..mid], dims);
            let right_bbox = BoundingBox::from_indices(source, &permutation[mid..last], dims);

            // Left is popped first, so nodes are finished in depth-first, left-to-right order.
            stack.push(BuildTask {
                node: right,
                first: mid,
                last,
                bbox: right_bbox,
            });
            stack.push(BuildTask {
                node: left,
                first,
                last: mid,
                bbox: left_bbox,
            });
        }

        tracing::debug!(
            num_points = permutation.len(),
            num_nodes = arena.len(),
            leaf_max_size = params.leaf_max_size,
            "built kd-tree"
        );

        Ok(Self {
            dims,
            leaf_max_size: params.leaf_max_size,
            permutation,
            bbox,
            arena,
            root,
        })
    }

    /// The number of points referenced by this tree.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.permutation.len()
    }

    pub(crate) fn num_nodes(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node<N> {
        self.arena.get(id)
    }

    /// The point indices stored under a leaf.
    #[inline]
    pub(crate) fn leaf_indices(&self, first: u32, last: u32) -> &[u32] {
        &self.permutation[first as usize..last as usize]
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
            + self.permutation.capacity() * std::mem::size_of::<u32>()
            + 2 * self.dims * N::BYTES_PER_ELEMENT
    }

    /// Branch-and-bound search feeding `result`.
    ///
    /// Points for which `is_live` returns `false` are skipped. Returns `false` when the search was
    /// cut short, either by the leaf budget or by the result set.
    pub(crate) fn search<S, M, R, F>(
        &self,
        source: &S,
        metric: &M,
        query: &[N],
        result: &mut R,
        params: &SearchParams,
        budget: &mut LeafBudget,
        is_live: F,
    ) -> bool
    where
        S: PointSource<N> + ?Sized,
        M: DistanceMetric<N>,
        R: ResultSet,
        F: Fn(usize) -> bool,
    {
        let eps_factor = 1.0 + params.eps;
        let low = self.bbox.low();
        let high = self.bbox.high();

        let mut dists = AxisDists::with_capacity(self.dims);
        for dim in 0..self.dims {
            dists.push(metric.interval_dist(query[dim], low[dim], high[dim], dim));
        }
        let mindist: f64 = dists.iter().sum();

        let mut stack = vec![Frame {
            node: self.root,
            mindist,
            dists,
        }];

        while let Some(frame) = stack.pop() {
            if frame.mindist * eps_factor > result.worst_dist() {
                continue;
            }

            match *self.arena.get(frame.node) {
                Node::Leaf { first, last } => {
                    if !budget.take() {
                        return false;
                    }
                    for &index in self.leaf_indices(first, last) {
                        let index = index as usize;
                        if !is_live(index) {
                            continue;
                        }
                        let worst = result.worst_dist();
                        let dist = metric.distance_to_point(query, source, index, worst);
                        if dist <= worst && !result.add_point(dist, index) {
                            return false;
                        }
                    }
                }
                Node::Internal {
                    dim,
                    split,
                    left,
                    right,
                } => {
                    let dim = dim as usize;
                    let value = query[dim];

                    // The far child is bounded by the split plane on one side and by the root box
                    // on the other, which is never tighter than its own box.
                    let (near, far, cut) = if value < split {
                        let cut = metric.interval_dist(value, split, high[dim], dim);
                        (left, right, cut)
                    } else {
                        let cut = metric.interval_dist(value, low[dim], split, dim);
                        (right, left, cut)
                    };

                    let mut far_dists = frame.dists.clone();
                    far_dists[dim] = cut;
                    let far_mindist: f64 = far_dists.iter().sum();
                    if far_mindist * eps_factor <= result.worst_dist() {
                        stack.push(Frame {
                            node: far,
                            mindist: far_mindist,
                            dists: far_dists,
                        });
                    }

                    stack.push(Frame {
                        node: near,
                        mindist: frame.mindist,
                        dists: frame.dists,
                    });
                }
            }
        }

        true
    }
}

/// Choose a split for `indices` and partition them in place.
///
/// Returns the split dimension, the split value, and the number of points that went left.
/// Points with a coordinate below the split value go left, all others go right.
fn split_range<N, S>(source: &S, indices: &mut [u32], bbox: &BoundingBox<N>) -> (usize, N, usize)
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    let dim = bbox.widest_dim();
    if let Some(split) = sliding_midpoint(source, indices, dim, bbox.low()[dim], bbox.high()[dim]) {
        return split;
    }

    // A precomputed box can be looser than the points it covers.
    let tight = BoundingBox::from_indices(source, indices, bbox.dims());
    let dim = tight.widest_dim();
    if let Some(split) = sliding_midpoint(source, indices, dim, tight.low()[dim], tight.high()[dim])
    {
        return split;
    }

    // Every point is identical: split by count, both halves hold the same coordinate.
    let value = source.coord(indices[0] as usize, 0);
    (0, value, indices.len() / 2)
}

/// Split at the middle of `[low, high]` on `dim`, sliding the split value onto a point
/// coordinate when one side would be empty. Returns `None` if all points share the coordinate.
fn sliding_midpoint<N, S>(
    source: &S,
    indices: &mut [u32],
    dim: usize,
    low: N,
    high: N,
) -> Option<(usize, N, usize)>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    if !(low < high) {
        return None;
    }

    let middle = (low.as_f64() + high.as_f64()) / 2.0;
    let mut split = <N as NumCast>::from(middle).unwrap_or(low);
    let mut count = partition(source, indices, dim, split);

    if count == 0 {
        // Everything is at or above the midpoint: slide up to the second-smallest coordinate so
        // that the minimum goes left.
        let min = min_coord(source, indices, dim);
        split = next_coord_above(source, indices, dim, min)?;
        count = partition(source, indices, dim, split);
    } else if count == indices.len() {
        // Everything is below the midpoint: slide down so that the maximum goes right.
        split = max_coord(source, indices, dim);
        count = partition(source, indices, dim, split);
        if count == 0 {
            return None;
        }
    }

    Some((dim, split, count))
}

/// Move every index whose coordinate is below `split` to the front. Returns how many moved.
fn partition<N, S>(source: &S, indices: &mut [u32], dim: usize, split: N) -> usize
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    let mut i = 0;
    let mut j = indices.len();
    while i < j {
        if source.coord(indices[i] as usize, dim) < split {
            i += 1;
        } else {
            j -= 1;
            indices.swap(i, j);
        }
    }
    i
}

fn min_coord<N, S>(source: &S, indices: &[u32], dim: usize) -> N
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    let mut min = N::max_value();
    for &index in indices {
        let value = source.coord(index as usize, dim);
        if value < min {
            min = value;
        }
    }
    min
}

fn max_coord<N, S>(source: &S, indices: &[u32], dim: usize) -> N
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    let mut max = N::min_value();
    for &index in indices {
        let value = source.coord(index as usize, dim);
        if value > max {
            max = value;
        }
    }
    max
}

fn next_coord_above<N, S>(source: &S, indices: &[u32], dim: usize, floor: N) -> Option<N>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    let mut next: Option<N> = None;
    for &index in indices {
        let value = source.coord(index as usize, dim);
        if value > floor && next.map_or(true, |current| value < current) {
            next = Some(value);
        }
    }
    next
}
