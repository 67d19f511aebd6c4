//! A K-D tree that supports insertion and removal.
//!
//! Points live in a family of static sub-trees. Slot `i` is occupied exactly when bit `i` of the
//! insertion counter is set, and was built from at most `2^i` insertions. Inserting a point
//! increments the counter: the slots whose bits carry are merged, together with the new point,
//! into the first empty slot. Each point therefore takes part in `O(log n)` rebuilds.
//!
//! Removal only marks a point as dead in its sub-tree. Dead points are skipped by queries and
//! dropped the next time their sub-tree is merged.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::mem::size_of;
use std::ops::Range;

use crate::bbox::BoundingBox;
use crate::error::{KdIndexError, Result};
use crate::kdtree::constants::{DYNAMIC_HEADER_SIZE, DYNAMIC_MAGIC, KDTREE_VERSION};
use crate::kdtree::io::{read_error, read_pod};
use crate::kdtree::r#trait::check_query;
use crate::kdtree::tree::{LeafBudget, TreeCore};
use crate::kdtree::KdTreeIndex;
use crate::metric::{DistanceMetric, SquaredEuclidean};
use crate::params::{KdTreeParams, SearchParams};
use crate::r#type::IndexableNum;
use crate::result::ResultSet;
use crate::source::PointSource;

/// The counter is a `u64`, so there are never more slots than bits.
const MAX_SLOTS: usize = 64;

#[derive(Debug, Clone)]
struct SubTree<N: IndexableNum> {
    core: TreeCore<N>,
    removed: HashSet<u32>,
}

impl<N: IndexableNum> SubTree<N> {
    fn live_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.core
            .permutation
            .iter()
            .copied()
            .filter(|index| !self.removed.contains(index))
    }

    fn live_len(&self) -> usize {
        self.core.len() - self.removed.len()
    }
}

/// A K-D tree over a growing subset of a [`PointSource`].
///
/// The tree does not borrow its source. Every mutating call and every query takes the source
/// explicitly, and it must be the same collection each time, possibly grown at the end. Queries
/// go through [`with_source`][Self::with_source].
#[derive(Debug, Clone)]
pub struct DynamicKdTree<N: IndexableNum, M = SquaredEuclidean> {
    dims: usize,
    params: KdTreeParams,
    metric: M,
    slots: Vec<Option<SubTree<N>>>,
    counter: u64,
    /// The slot holding each live point, indexed by point index.
    locations: Vec<Option<u8>>,
    len: usize,
}

impl<N: IndexableNum> DynamicKdTree<N> {
    /// An empty tree with the default parameters and the squared Euclidean metric.
    pub fn new(dims: usize) -> Result<Self> {
        Self::with_params(dims, KdTreeParams::default(), SquaredEuclidean)
    }
}

impl<N: IndexableNum, M: DistanceMetric<N>> DynamicKdTree<N, M> {
    /// An empty tree with explicit parameters and metric.
    pub fn with_params(dims: usize, params: KdTreeParams, metric: M) -> Result<Self> {
        params.validate()?;
        if dims == 0 || dims > u16::MAX as usize {
            return Err(KdIndexError::Construction(format!(
                "Dimensionality {} is outside 1..={}.",
                dims,
                u16::MAX
            )));
        }
        Ok(Self {
            dims,
            params,
            metric,
            slots: vec![],
            counter: 0,
            locations: vec![],
            len: 0,
        })
    }

    /// Add point `index` of `source` to the tree.
    ///
    /// Fails if the point is already in the tree or `source` has no such point. A point that was
    /// removed may be inserted again.
    pub fn insert<S>(&mut self, source: &S, index: usize) -> Result<()>
    where
        S: PointSource<N> + ?Sized,
    {
        self.check_source(source)?;
        if index >= source.num_points() || index > u32::MAX as usize {
            return Err(KdIndexError::Construction(format!(
                "Point {} is out of range for a source of {} points.",
                index,
                source.num_points()
            )));
        }
        if self.contains(index) {
            return Err(KdIndexError::Construction(format!(
                "Point {} is already in the tree.",
                index
            )));
        }
        if self.counter == u64::MAX {
            return Err(KdIndexError::Allocation(
                "Insertion counter overflow.".to_string(),
            ));
        }

        // The carry chain: every occupied slot below the first empty one is merged.
        let position = self.counter.trailing_ones() as usize;
        let mut indices = Vec::with_capacity(1 << position.min(20));
        let mut dropped = 0;
        for tree in self.slots.iter().take(position).flatten() {
            indices.extend(tree.live_indices());
            dropped += tree.removed.len();
        }
        indices.push(index as u32);

        let core = TreeCore::build(source, indices, &self.params, None)?;
        for slot in self.slots.iter_mut().take(position) {
            *slot = None;
        }
        for &point in &core.permutation {
            self.set_location(point as usize, Some(position as u8));
        }
        if self.slots.len() <= position {
            self.slots.resize_with(position + 1, || None);
        }
        tracing::trace!(
            slot = position,
            points = core.len(),
            dropped,
            counter = self.counter + 1,
            "merged dynamic sub-trees"
        );
        self.slots[position] = Some(SubTree {
            core,
            removed: HashSet::new(),
        });

        self.counter += 1;
        self.len += 1;
        Ok(())
    }

    /// Insert each point of `range` in order.
    pub fn insert_range<S>(&mut self, source: &S, range: Range<usize>) -> Result<()>
    where
        S: PointSource<N> + ?Sized,
    {
        for index in range {
            self.insert(source, index)?;
        }
        Ok(())
    }

    /// Remove point `index`. Returns `false` if it was not in the tree.
    pub fn remove(&mut self, index: usize) -> bool {
        let Some(slot) = self.locations.get(index).copied().flatten() else {
            return false;
        };
        let Some(tree) = self.slots.get_mut(slot as usize).and_then(Option::as_mut) else {
            return false;
        };
        tree.removed.insert(index as u32);
        self.locations[index] = None;
        self.len -= 1;
        true
    }

    /// Returns `true` if point `index` is in the tree.
    pub fn contains(&self, index: usize) -> bool {
        self.locations.get(index).copied().flatten().is_some()
    }

    /// The number of points in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no live points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The dimensionality of the indexed points.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// The number of occupied sub-trees.
    pub fn num_trees(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// The number of live points in each slot, empty slots included.
    pub fn tree_sizes(&self) -> Vec<usize> {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map_or(0, SubTree::live_len))
            .collect()
    }

    /// Approximate heap bytes held by all sub-trees and the bookkeeping, excluding the source.
    pub fn memory_usage(&self) -> usize {
        let trees: usize = self
            .slots
            .iter()
            .flatten()
            .map(|tree| tree.core.memory_usage() + tree.removed.capacity() * size_of::<u32>())
            .sum();
        trees + self.locations.capacity() * size_of::<Option<u8>>()
    }

    /// Attach `source` for querying and saving.
    pub fn with_source<'a, S>(&'a self, source: &'a S) -> Result<DynamicKdTreeRef<'a, N, S, M>>
    where
        S: PointSource<N> + ?Sized,
    {
        self.check_source(source)?;
        if self.locations.len() > source.num_points() {
            return Err(KdIndexError::Query(format!(
                "Tree references point {} but the source has {} points.",
                self.locations.len() - 1,
                source.num_points()
            )));
        }
        Ok(DynamicKdTreeRef { tree: self, source })
    }

    /// Read a tree written by [`DynamicKdTreeRef::save`].
    ///
    /// Fails unless `source` has the same number of points and dimensions as the source the tree
    /// was saved with. The loaded tree has no node cap; use
    /// [`load_with_max_nodes`][Self::load_with_max_nodes] to restore one.
    pub fn load<R, S>(reader: &mut R, source: &S, metric: M) -> Result<Self>
    where
        R: Read + ?Sized,
        S: PointSource<N> + ?Sized,
    {
        Self::load_with_max_nodes(reader, source, None, metric)
    }

    /// Read a tree written by [`DynamicKdTreeRef::save`] and cap every later rebuild at
    /// `max_nodes` nodes.
    ///
    /// The cap is not part of the saved data. A stored sub-tree that already exceeds it is an
    /// [`Allocation`][KdIndexError::Allocation] error.
    pub fn load_with_max_nodes<R, S>(
        reader: &mut R,
        source: &S,
        max_nodes: Option<usize>,
        metric: M,
    ) -> Result<Self>
    where
        R: Read + ?Sized,
        S: PointSource<N> + ?Sized,
    {
        let mut header = [0u8; DYNAMIC_HEADER_SIZE];
        reader.read_exact(&mut header).map_err(read_error)?;

        if header[0] != DYNAMIC_MAGIC {
            return Err(KdIndexError::Serialization(
                "Data not in kd-index dynamic tree format.".to_string(),
            ));
        }
        let version = header[1] >> 4;
        if version != KDTREE_VERSION {
            return Err(KdIndexError::Serialization(format!(
                "Got v{} data when expected v{}.",
                version, KDTREE_VERSION
            )));
        }
        let type_ = header[1] & 0x0f;
        if type_ != N::TYPE_INDEX {
            return Err(KdIndexError::Serialization(format!(
                "Got type {} data when expected type {}.",
                type_,
                N::TYPE_INDEX
            )));
        }

        let dims = bytemuck::pod_read_unaligned::<u16>(&header[2..4]) as usize;
        let leaf_max_size = bytemuck::pod_read_unaligned::<u32>(&header[4..8]) as usize;
        let num_points = bytemuck::pod_read_unaligned::<u32>(&header[8..12]) as usize;
        let counter = bytemuck::pod_read_unaligned::<u64>(&header[12..20]);
        let num_slots = header[20] as usize;

        if dims != source.dims() {
            return Err(KdIndexError::Serialization(format!(
                "Saved tree has {} dimensions, source has {}.",
                dims,
                source.dims()
            )));
        }
        if num_points != source.num_points() {
            return Err(KdIndexError::Serialization(format!(
                "Saved tree was built over {} points, source has {}.",
                num_points,
                source.num_points()
            )));
        }
        if num_slots > MAX_SLOTS || (num_slots < MAX_SLOTS && counter >> num_slots != 0) {
            return Err(KdIndexError::Serialization(format!(
                "Counter {} does not fit in {} slots.",
                counter, num_slots
            )));
        }

        let params = KdTreeParams {
            leaf_max_size,
            max_nodes,
        };
        let mut tree = Self::with_params(dims, params, metric)
            .map_err(|err| KdIndexError::Serialization(err.to_string()))?;
        tree.counter = counter;
        tree.slots = Vec::with_capacity(num_slots);

        for slot in 0..num_slots {
            let present: u8 = read_pod(reader)?;
            if present == 0 {
                tree.slots.push(None);
                continue;
            }
            if counter & (1 << slot) == 0 {
                return Err(KdIndexError::Serialization(format!(
                    "Slot {} is stored but empty according to the counter.",
                    slot
                )));
            }

            let (core, slot_points) = TreeCore::read(reader)?;
            if slot_points != num_points || core.dims != dims {
                return Err(KdIndexError::Serialization(format!(
                    "Sub-tree {} does not match the dynamic tree header.",
                    slot
                )));
            }
            if max_nodes.is_some_and(|max| core.num_nodes() > max) {
                return Err(KdIndexError::Allocation(format!(
                    "Sub-tree {} has {} nodes, more than the cap of {:?}.",
                    slot,
                    core.num_nodes(),
                    max_nodes
                )));
            }
            for &point in &core.permutation {
                if tree.contains(point as usize) {
                    return Err(KdIndexError::Serialization(format!(
                        "Point {} is stored twice.",
                        point
                    )));
                }
                tree.set_location(point as usize, Some(slot as u8));
            }
            tree.len += core.len();
            tree.slots.push(Some(SubTree {
                core,
                removed: HashSet::new(),
            }));
        }

        tracing::debug!(
            num_points = tree.len,
            num_trees = tree.num_trees(),
            "loaded dynamic kd-tree"
        );
        Ok(tree)
    }

    fn check_source<S>(&self, source: &S) -> Result<()>
    where
        S: PointSource<N> + ?Sized,
    {
        if source.dims() != self.dims {
            return Err(KdIndexError::Query(format!(
                "Source has {} dimensions, tree has {}.",
                source.dims(),
                self.dims
            )));
        }
        Ok(())
    }

    fn set_location(&mut self, index: usize, slot: Option<u8>) {
        if self.locations.len() <= index {
            self.locations.resize(index + 1, None);
        }
        self.locations[index] = slot;
    }
}

/// A [`DynamicKdTree`] paired with the source its points come from.
#[derive(Debug)]
pub struct DynamicKdTreeRef<'a, N, S, M = SquaredEuclidean>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    tree: &'a DynamicKdTree<N, M>,
    source: &'a S,
}

impl<N, S, M> Clone for DynamicKdTreeRef<'_, N, S, M>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<N, S, M> Copy for DynamicKdTreeRef<'_, N, S, M>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
{
}

impl<N, S, M> DynamicKdTreeRef<'_, N, S, M>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
    M: DistanceMetric<N>,
{
    /// Write the tree to `writer`.
    ///
    /// Sub-trees holding removed points are rebuilt over their live points first, so removed
    /// points never reach the stream.
    pub fn save<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let tree = self.tree;
        let num_points = self.source.num_points();

        let mut data = Vec::with_capacity(DYNAMIC_HEADER_SIZE);
        data.push(DYNAMIC_MAGIC);
        data.push((KDTREE_VERSION << 4) + N::TYPE_INDEX);
        data.extend_from_slice(bytemuck::bytes_of(&(tree.dims as u16)));
        data.extend_from_slice(bytemuck::bytes_of(&(tree.params.leaf_max_size as u32)));
        data.extend_from_slice(bytemuck::bytes_of(&(num_points as u32)));
        data.extend_from_slice(bytemuck::bytes_of(&tree.counter));
        data.push(tree.slots.len() as u8);
        writer.write_all(&data)?;

        for slot in &tree.slots {
            let Some(subtree) = slot else {
                writer.write_all(&[0])?;
                continue;
            };
            if subtree.removed.is_empty() {
                writer.write_all(&[1])?;
                subtree.core.write(writer, num_points)?;
                continue;
            }

            let live: Vec<u32> = subtree.live_indices().collect();
            if live.is_empty() {
                writer.write_all(&[0])?;
                continue;
            }
            let compacted = TreeCore::build(self.source, live, &tree.params, None)?;
            writer.write_all(&[1])?;
            compacted.write(writer, num_points)?;
        }

        tracing::debug!(
            num_points = tree.len,
            num_trees = tree.num_trees(),
            "saved dynamic kd-tree"
        );
        Ok(())
    }

    /// The serialized form of the tree, as written by [`save`][Self::save].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = vec![];
        self.save(&mut data)?;
        Ok(data)
    }

    /// The bounding box of every sub-tree, including removed points. `None` when empty.
    pub fn bounding_box(&self) -> Option<BoundingBox<N>> {
        let mut trees = self.tree.slots.iter().flatten();
        let mut bbox = trees.next()?.core.bbox.clone();
        for subtree in trees {
            for dim in 0..bbox.dims() {
                if subtree.core.bbox.low()[dim] < bbox.low()[dim] {
                    bbox.low_mut()[dim] = subtree.core.bbox.low()[dim];
                }
                if subtree.core.bbox.high()[dim] > bbox.high()[dim] {
                    bbox.high_mut()[dim] = subtree.core.bbox.high()[dim];
                }
            }
        }
        Some(bbox)
    }
}

impl<N, S, M> KdTreeIndex<N> for DynamicKdTreeRef<'_, N, S, M>
where
    N: IndexableNum,
    S: PointSource<N> + ?Sized,
    M: DistanceMetric<N>,
{
    type Metric = M;

    fn dims(&self) -> usize {
        self.tree.dims
    }

    fn num_points(&self) -> usize {
        self.tree.len
    }

    fn metric(&self) -> &M {
        &self.tree.metric
    }

    fn find_neighbors<R: ResultSet>(
        &self,
        result: &mut R,
        query: &[N],
        params: &SearchParams,
    ) -> Result<()> {
        check_query(query, self.tree.dims)?;
        params.validate()?;

        // One budget for the whole query, shared by every sub-tree.
        let mut budget = LeafBudget::new(params.checks);
        for subtree in self.tree.slots.iter().flatten() {
            let removed = &subtree.removed;
            let finished = subtree.core.search(
                self.source,
                &self.tree.metric,
                query,
                result,
                params,
                &mut budget,
                |index| removed.is_empty() || !removed.contains(&(index as u32)),
            );
            if !finished {
                break;
            }
        }
        Ok(())
    }
}
