//! Read-only access to externally owned point storage.
//!
//! The index never copies coordinates. It only stores point indices and reads coordinates back
//! through a [`PointSource`] whenever it needs them.

use geo_traits::{CoordTrait, Dimensions};

use crate::bbox::BoundingBox;
use crate::error::{KdIndexError, Result};
use crate::r#type::IndexableNum;

/// A read-only view of a point collection.
pub trait PointSource<N: IndexableNum> {
    /// The number of points in the collection.
    fn num_points(&self) -> usize;

    /// The dimensionality of every point.
    fn dims(&self) -> usize;

    /// The coordinate of point `index` along `dim`.
    fn coord(&self, index: usize, dim: usize) -> N;

    /// A precomputed bounding box of all points, if one is cheaply available.
    ///
    /// Returning `Some` skips one pass over the data when a static tree is built.
    fn bounding_box(&self) -> Option<BoundingBox<N>> {
        None
    }
}

impl<N: IndexableNum, S: PointSource<N> + ?Sized> PointSource<N> for &S {
    #[inline]
    fn num_points(&self) -> usize {
        (**self).num_points()
    }

    #[inline]
    fn dims(&self) -> usize {
        (**self).dims()
    }

    #[inline]
    fn coord(&self, index: usize, dim: usize) -> N {
        (**self).coord(index, dim)
    }

    fn bounding_box(&self) -> Option<BoundingBox<N>> {
        (**self).bounding_box()
    }
}

impl<N: IndexableNum, const D: usize> PointSource<N> for [[N; D]] {
    #[inline]
    fn num_points(&self) -> usize {
        self.len()
    }

    #[inline]
    fn dims(&self) -> usize {
        D
    }

    #[inline]
    fn coord(&self, index: usize, dim: usize) -> N {
        self[index][dim]
    }
}

impl<N: IndexableNum, const D: usize> PointSource<N> for Vec<[N; D]> {
    #[inline]
    fn num_points(&self) -> usize {
        self.len()
    }

    #[inline]
    fn dims(&self) -> usize {
        D
    }

    #[inline]
    fn coord(&self, index: usize, dim: usize) -> N {
        self[index][dim]
    }
}

/// Vector-of-vectors storage. The dimensionality is taken from the first point.
impl<N: IndexableNum> PointSource<N> for Vec<Vec<N>> {
    #[inline]
    fn num_points(&self) -> usize {
        self.len()
    }

    #[inline]
    fn dims(&self) -> usize {
        self.first().map_or(0, Vec::len)
    }

    #[inline]
    fn coord(&self, index: usize, dim: usize) -> N {
        self[index][dim]
    }
}

/// Points stored in one interleaved buffer, `[x0, y0, x1, y1, ...]` for two dimensions.
#[derive(Debug, Clone)]
pub struct FlatPoints<'a, N: IndexableNum> {
    coords: &'a [N],
    dims: usize,
    bbox: Option<BoundingBox<N>>,
}

impl<'a, N: IndexableNum> FlatPoints<'a, N> {
    /// Wrap an interleaved coordinate buffer.
    pub fn try_new(coords: &'a [N], dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(KdIndexError::Construction(
                "Dimensionality must be at least 1.".to_string(),
            ));
        }
        if coords.len() % dims != 0 {
            return Err(KdIndexError::Construction(format!(
                "Buffer of {} values is not a multiple of {} dimensions.",
                coords.len(),
                dims
            )));
        }
        Ok(Self {
            coords,
            dims,
            bbox: None,
        })
    }

    /// Attach a precomputed bounding box covering every point in the buffer.
    pub fn with_bounding_box(mut self, bbox: BoundingBox<N>) -> Result<Self> {
        if bbox.dims() != self.dims {
            return Err(KdIndexError::Construction(format!(
                "Bounding box has {} dimensions, points have {}.",
                bbox.dims(),
                self.dims
            )));
        }
        self.bbox = Some(bbox);
        Ok(self)
    }

    /// The coordinates of one point.
    pub fn point(&self, index: usize) -> &'a [N] {
        &self.coords[index * self.dims..(index + 1) * self.dims]
    }
}

impl<N: IndexableNum> PointSource<N> for FlatPoints<'_, N> {
    #[inline]
    fn num_points(&self) -> usize {
        self.coords.len() / self.dims
    }

    #[inline]
    fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    fn coord(&self, index: usize, dim: usize) -> N {
        self.coords[index * self.dims + dim]
    }

    fn bounding_box(&self) -> Option<BoundingBox<N>> {
        self.bbox.clone()
    }
}

/// Points given as any slice of [`CoordTrait`] values.
#[derive(Debug, Clone, Copy)]
pub struct CoordSource<'a, C> {
    coords: &'a [C],
}

impl<'a, C> CoordSource<'a, C> {
    /// Wrap a slice of coordinates.
    pub fn new(coords: &'a [C]) -> Self {
        Self { coords }
    }
}

pub(crate) fn dimensions_size(dim: Dimensions) -> usize {
    match dim {
        Dimensions::Xy => 2,
        Dimensions::Xyz | Dimensions::Xym => 3,
        Dimensions::Xyzm => 4,
        Dimensions::Unknown(n) => n,
    }
}

impl<N: IndexableNum, C: CoordTrait<T = N>> PointSource<N> for CoordSource<'_, C> {
    #[inline]
    fn num_points(&self) -> usize {
        self.coords.len()
    }

    fn dims(&self) -> usize {
        self.coords
            .first()
            .map_or(0, |coord| dimensions_size(coord.dim()))
    }

    #[inline]
    fn coord(&self, index: usize, dim: usize) -> N {
        self.coords[index].nth_or_panic(dim)
    }
}
