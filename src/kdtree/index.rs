use std::io::{Read, Write};

use crate::bbox::BoundingBox;
use crate::error::{KdIndexError, Result};
use crate::kdtree::r#trait::check_query;
use crate::kdtree::traversal::NodeRef;
use crate::kdtree::tree::{LeafBudget, TreeCore};
use crate::kdtree::KdTreeIndex;
use crate::metric::{DistanceMetric, SquaredEuclidean};
use crate::params::{KdTreeParams, SearchParams};
use crate::r#type::IndexableNum;
use crate::result::ResultSet;
use crate::source::PointSource;

/// An immutable K-D tree over a borrowed [`PointSource`].
///
/// The tree stores only point indices. Coordinates are read back from `source` whenever a query
/// needs them, so the source must not change while the tree is alive.
#[derive(Debug, Clone)]
pub struct KdTree<'a, N, S, M = SquaredEuclidean>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    source: &'a S,
    core: TreeCore<N>,
    metric: M,
}

impl<'a, N, S> KdTree<'a, N, S>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    /// Build a tree with the default parameters and the squared Euclidean metric.
    pub fn build(source: &'a S) -> Result<Self> {
        Self::build_with(source, KdTreeParams::default(), SquaredEuclidean)
    }
}

impl<'a, N, S, M> KdTree<'a, N, S, M>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
    M: DistanceMetric<N>,
{
    /// Build a tree with explicit parameters and metric.
    pub fn build_with(source: &'a S, params: KdTreeParams, metric: M) -> Result<Self> {
        let num_points = source.num_points();
        if num_points > u32::MAX as usize {
            return Err(KdIndexError::Construction(format!(
                "{} points exceed the u32 index range.",
                num_points
            )));
        }

        let permutation = (0..num_points as u32).collect();
        let core = TreeCore::build(source, permutation, &params, source.bounding_box())?;
        Ok(Self {
            source,
            core,
            metric,
        })
    }

    /// Read a tree written by [`save`][Self::save] and attach it to `source`.
    ///
    /// Fails unless `source` has the same number of points and dimensions as the source the tree
    /// was saved from.
    pub fn load<R: Read + ?Sized>(reader: &mut R, source: &'a S, metric: M) -> Result<Self> {
        let (core, num_points) = TreeCore::read(reader)?;
        if num_points != source.num_points() {
            return Err(KdIndexError::Serialization(format!(
                "Saved tree was built over {} points, source has {}.",
                num_points,
                source.num_points()
            )));
        }
        if core.len() != num_points {
            return Err(KdIndexError::Serialization(format!(
                "Saved tree covers {} of its {} points.",
                core.len(),
                num_points
            )));
        }
        if core.dims != source.dims() {
            return Err(KdIndexError::Serialization(format!(
                "Saved tree has {} dimensions, source has {}.",
                core.dims,
                source.dims()
            )));
        }

        tracing::debug!(num_points, num_nodes = core.num_nodes(), "loaded kd-tree");
        Ok(Self {
            source,
            core,
            metric,
        })
    }

    /// Write this tree to `writer`. Coordinates are not included.
    pub fn save<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        self.core.write(writer, self.source.num_points())?;
        tracing::debug!(
            num_points = self.core.len(),
            num_nodes = self.core.num_nodes(),
            "saved kd-tree"
        );
        Ok(())
    }

    /// The serialized form of this tree, as written by [`save`][Self::save].
    pub fn to_bytes(&self) -> Vec<u8> {
        self.core.to_bytes(self.source.num_points())
    }

    /// The point source this tree reads coordinates from.
    pub fn source(&self) -> &'a S {
        self.source
    }

    /// The bounding box of all points.
    pub fn bounding_box(&self) -> &BoundingBox<N> {
        &self.core.bbox
    }

    /// The maximum number of points in a leaf.
    pub fn leaf_max_size(&self) -> usize {
        self.core.leaf_max_size
    }

    /// The number of nodes in the tree.
    pub fn num_nodes(&self) -> usize {
        self.core.num_nodes()
    }

    /// Approximate heap bytes held by the tree, excluding the source.
    pub fn memory_usage(&self) -> usize {
        self.core.memory_usage()
    }

    /// The root node, for manual traversal.
    pub fn root(&self) -> NodeRef<'_, N> {
        NodeRef::root(&self.core)
    }
}

impl<N, S, M> KdTreeIndex<N> for KdTree<'_, N, S, M>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
    M: DistanceMetric<N>,
{
    type Metric = M;

    fn dims(&self) -> usize {
        self.core.dims
    }

    fn num_points(&self) -> usize {
        self.core.len()
    }

    fn metric(&self) -> &M {
        &self.metric
    }

    fn find_neighbors<R: ResultSet>(
        &self,
        result: &mut R,
        query: &[N],
        params: &SearchParams,
    ) -> Result<()> {
        check_query(query, self.core.dims)?;
        params.validate()?;
        let mut budget = LeafBudget::new(params.checks);
        self.core.search(
            self.source,
            &self.metric,
            query,
            result,
            params,
            &mut budget,
            |_| true,
        );
        Ok(())
    }
}
