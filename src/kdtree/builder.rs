use crate::error::Result;
use crate::kdtree::{DynamicKdTree, KdTree};
use crate::metric::{DistanceMetric, SquaredEuclidean};
use crate::params::KdTreeParams;
use crate::r#type::IndexableNum;
use crate::source::PointSource;

/// A builder to create static and dynamic K-D trees.
///
/// ```
/// use kd_index::kdtree::{KdTreeBuilder, KdTreeIndex};
/// use kd_index::Manhattan;
///
/// let points = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]];
/// let tree = KdTreeBuilder::new()
///     .leaf_max_size(2)
///     .metric(Manhattan)
///     .finish(&points)
///     .unwrap();
/// let nearest = tree.knn(&[4.0, 4.0], 1).unwrap();
/// assert_eq!(nearest[0].index, 3);
/// assert_eq!(nearest[0].distance, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct KdTreeBuilder<M = SquaredEuclidean> {
    params: KdTreeParams,
    metric: M,
}

impl KdTreeBuilder {
    /// Create a builder with the default parameters and the squared Euclidean metric.
    pub fn new() -> Self {
        Self {
            params: KdTreeParams::default(),
            metric: SquaredEuclidean,
        }
    }
}

impl Default for KdTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> KdTreeBuilder<M> {
    /// Set the maximum number of points in a leaf.
    pub fn leaf_max_size(mut self, leaf_max_size: usize) -> Self {
        self.params.leaf_max_size = leaf_max_size;
        self
    }

    /// Cap the number of nodes a single tree may allocate.
    pub fn max_nodes(mut self, max_nodes: usize) -> Self {
        self.params.max_nodes = Some(max_nodes);
        self
    }

    /// Replace all build parameters at once.
    pub fn params(mut self, params: KdTreeParams) -> Self {
        self.params = params;
        self
    }

    /// Use a different distance metric.
    pub fn metric<M2>(self, metric: M2) -> KdTreeBuilder<M2> {
        KdTreeBuilder {
            params: self.params,
            metric,
        }
    }

    /// Build a static tree over every point of `source`.
    pub fn finish<'a, N, S>(self, source: &'a S) -> Result<KdTree<'a, N, S, M>>
    where
        N: IndexableNum,
        S: PointSource<N> + ?Sized,
        M: DistanceMetric<N>,
    {
        KdTree::build_with(source, self.params, self.metric)
    }

    /// Create an empty dynamic tree for points of `dims` dimensions.
    pub fn finish_dynamic<N>(self, dims: usize) -> Result<DynamicKdTree<N, M>>
    where
        N: IndexableNum,
        M: DistanceMetric<N>,
    {
        DynamicKdTree::with_params(dims, self.params, self.metric)
    }
}
