use geo_traits::CoordTrait;

use crate::error::{KdIndexError, Result};
use crate::metric::DistanceMetric;
use crate::params::SearchParams;
use crate::r#type::IndexableNum;
use crate::result::{KnnResultSet, Neighbor, RadiusResultSet, ResultSet};
use crate::source::{dimensions_size, PointSource};

#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Nearest-neighbor queries over a K-D tree.
///
/// Implementors only provide [`find_neighbors`][Self::find_neighbors]; every other query is built
/// on top of it.
pub trait KdTreeIndex<N: IndexableNum> {
    /// The distance metric used by this index.
    type Metric: DistanceMetric<N>;

    /// The dimensionality of the indexed points.
    fn dims(&self) -> usize;

    /// The number of points a query can return.
    fn num_points(&self) -> usize;

    /// The distance metric used by this index.
    fn metric(&self) -> &Self::Metric;

    /// Feed every candidate point for `query` into `result`.
    ///
    /// This is the primitive behind all other queries and accepts any [`ResultSet`]. Results are
    /// left in whatever order the set keeps them.
    fn find_neighbors<R: ResultSet>(
        &self,
        result: &mut R,
        query: &[N],
        params: &SearchParams,
    ) -> Result<()>;

    /// The `k` nearest neighbors of `query`, closest first.
    fn knn(&self, query: &[N], k: usize) -> Result<Vec<Neighbor>> {
        self.knn_with_params(query, k, &SearchParams::default())
    }

    /// The `k` nearest neighbors of `query`.
    ///
    /// With `params.eps > 0` the search is approximate: every returned distance is within a factor
    /// `1 + eps` of the true `k`-th nearest distance.
    fn knn_with_params(
        &self,
        query: &[N],
        k: usize,
        params: &SearchParams,
    ) -> Result<Vec<Neighbor>> {
        check_k(k)?;
        let mut result = KnnResultSet::new(k);
        self.find_neighbors(&mut result, query, params)?;
        Ok(result.finish(params.sorted))
    }

    /// Up to `k` nearest neighbors of `query` that lie within `radius`.
    ///
    /// `radius` is a plain distance and is converted with
    /// [`DistanceMetric::radius_to_dist`] before searching.
    fn knn_within(
        &self,
        query: &[N],
        k: usize,
        radius: f64,
        params: &SearchParams,
    ) -> Result<Vec<Neighbor>> {
        check_k(k)?;
        check_radius(radius)?;
        let max_dist = self.metric().radius_to_dist(radius);
        let mut result = KnnResultSet::with_max_dist(k, max_dist);
        self.find_neighbors(&mut result, query, params)?;
        Ok(result.finish(params.sorted))
    }

    /// Every point within `radius` of `query`.
    ///
    /// `radius` is a plain distance; returned distances are in metric units. For
    /// [`SquaredEuclidean`][crate::SquaredEuclidean] a radius of `1.5` keeps points with a squared
    /// distance up to `2.25`.
    fn radius_search(
        &self,
        query: &[N],
        radius: f64,
        params: &SearchParams,
    ) -> Result<Vec<Neighbor>> {
        check_radius(radius)?;
        let mut result = RadiusResultSet::new(self.metric().radius_to_dist(radius));
        self.find_neighbors(&mut result, query, params)?;
        Ok(result.finish(params.sorted))
    }

    /// The `k` nearest neighbors of a [`CoordTrait`] value.
    fn knn_coord(&self, coord: &impl CoordTrait<T = N>, k: usize) -> Result<Vec<Neighbor>> {
        let query: Vec<N> = (0..dimensions_size(coord.dim()))
            .map(|n| coord.nth_or_panic(n))
            .collect();
        self.knn(&query, k)
    }

    /// The `k` nearest neighbors of every point in `queries`, in query order.
    ///
    /// With the `rayon` feature the queries run in parallel.
    fn knn_batch<Q>(
        &self,
        queries: &Q,
        k: usize,
        params: &SearchParams,
    ) -> Result<Vec<Vec<Neighbor>>>
    where
        Self: Sync,
        Q: PointSource<N> + Sync + ?Sized,
    {
        check_k(k)?;
        let dims = queries.dims();
        let run = |index: usize| {
            let query: Vec<N> = (0..dims).map(|dim| queries.coord(index, dim)).collect();
            self.knn_with_params(&query, k, params)
        };

        #[cfg(feature = "rayon")]
        let results: Result<Vec<Vec<Neighbor>>> = (0..queries.num_points())
            .into_par_iter()
            .map(run)
            .collect();

        #[cfg(not(feature = "rayon"))]
        let results: Result<Vec<Vec<Neighbor>>> = (0..queries.num_points()).map(run).collect();

        results
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(KdIndexError::Query("k must be at least 1.".to_string()));
    }
    Ok(())
}

fn check_radius(radius: f64) -> Result<()> {
    if radius.is_nan() || radius < 0.0 {
        return Err(KdIndexError::Query(format!(
            "Radius must be non-negative, got {}.",
            radius
        )));
    }
    Ok(())
}

/// Reject queries whose dimensionality does not match the index.
pub(crate) fn check_query<N>(query: &[N], dims: usize) -> Result<()> {
    if query.len() != dims {
        return Err(KdIndexError::Query(format!(
            "Query has {} dimensions, index has {}.",
            query.len(),
            dims
        )));
    }
    Ok(())
}
