//! Axis-aligned, N-dimensional bounding boxes.

use geo_traits::{CoordTrait, Dimensions, RectTrait};

use crate::error::{KdIndexError, Result};
use crate::r#type::IndexableNum;
use crate::source::PointSource;

/// An axis-aligned bounding box with one `(low, high)` interval per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox<N: IndexableNum> {
    low: Vec<N>,
    high: Vec<N>,
}

impl<N: IndexableNum> BoundingBox<N> {
    /// Create a box from its lower and upper corners.
    pub fn try_new(low: Vec<N>, high: Vec<N>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(KdIndexError::Construction(format!(
                "Bounding box corners have {} and {} dimensions.",
                low.len(),
                high.len()
            )));
        }
        if low.iter().zip(high.iter()).any(|(l, h)| l > h) {
            return Err(KdIndexError::Construction(
                "Bounding box low corner exceeds high corner.".to_string(),
            ));
        }
        Ok(Self { low, high })
    }

    /// An "inverted" box that any point will expand.
    pub(crate) fn empty(dims: usize) -> Self {
        Self {
            low: vec![N::max_value(); dims],
            high: vec![N::min_value(); dims],
        }
    }

    /// The tight box around the points named by `indices`.
    pub(crate) fn from_indices<S>(source: &S, indices: &[u32], dims: usize) -> Self
    where
        S: PointSource<N> + ?Sized,
    {
        let mut bbox = Self::empty(dims);
        for &index in indices {
            bbox.expand(source, index as usize);
        }
        bbox
    }

    #[inline]
    pub(crate) fn expand<S>(&mut self, source: &S, index: usize)
    where
        S: PointSource<N> + ?Sized,
    {
        for dim in 0..self.low.len() {
            let value = source.coord(index, dim);
            if value < self.low[dim] {
                self.low[dim] = value;
            }
            if value > self.high[dim] {
                self.high[dim] = value;
            }
        }
    }

    /// The number of dimensions of this box.
    pub fn dims(&self) -> usize {
        self.low.len()
    }

    /// The lower corner.
    pub fn low(&self) -> &[N] {
        &self.low
    }

    /// The upper corner.
    pub fn high(&self) -> &[N] {
        &self.high
    }

    #[inline]
    pub(crate) fn low_mut(&mut self) -> &mut [N] {
        &mut self.low
    }

    #[inline]
    pub(crate) fn high_mut(&mut self) -> &mut [N] {
        &mut self.high
    }

    /// The extent of the box along `dim`, widened to `f64`.
    #[inline]
    pub fn extent(&self, dim: usize) -> f64 {
        self.high[dim].as_f64() - self.low[dim].as_f64()
    }

    /// The dimension with the largest extent. Ties resolve to the lowest dimension.
    pub fn widest_dim(&self) -> usize {
        let mut best = 0;
        let mut best_extent = f64::NEG_INFINITY;
        for dim in 0..self.dims() {
            let extent = self.extent(dim);
            if extent > best_extent {
                best = dim;
                best_extent = extent;
            }
        }
        best
    }

    /// Returns `true` if `other` lies completely inside this box.
    pub fn contains_box(&self, other: &BoundingBox<N>) -> bool {
        self.dims() == other.dims()
            && (0..self.dims())
                .all(|d| self.low[d] <= other.low[d] && other.high[d] <= self.high[d])
    }

    /// Returns `true` if `point` lies inside this box (boundaries included).
    pub fn contains_point(&self, point: &[N]) -> bool {
        point.len() == self.dims()
            && point
                .iter()
                .enumerate()
                .all(|(d, v)| self.low[d] <= *v && *v <= self.high[d])
    }
}

/// One corner of a [`BoundingBox`], exposed as a [`CoordTrait`].
#[derive(Debug, Clone, Copy)]
pub struct Corner<'a, N: IndexableNum> {
    values: &'a [N],
}

pub(crate) fn dimensions(dims: usize) -> Dimensions {
    match dims {
        2 => Dimensions::Xy,
        3 => Dimensions::Xyz,
        n => Dimensions::Unknown(n),
    }
}

impl<N: IndexableNum> CoordTrait for Corner<'_, N> {
    type T = N;

    fn dim(&self) -> Dimensions {
        dimensions(self.values.len())
    }

    fn x(&self) -> Self::T {
        self.values[0]
    }

    fn y(&self) -> Self::T {
        self.values[1]
    }

    fn nth_or_panic(&self, n: usize) -> Self::T {
        self.values[n]
    }
}

impl<N: IndexableNum> RectTrait for BoundingBox<N> {
    type T = N;
    type CoordType<'a>
        = Corner<'a, N>
    where
        Self: 'a;

    fn dim(&self) -> Dimensions {
        dimensions(self.dims())
    }

    fn min(&self) -> Self::CoordType<'_> {
        Corner { values: &self.low }
    }

    fn max(&self) -> Self::CoordType<'_> {
        Corner { values: &self.high }
    }
}
