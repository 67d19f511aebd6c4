//! Distance metrics for tree construction and search.
//!
//! Every metric accumulates a distance one axis at a time. The per-axis contribution is what the
//! search uses as a lower bound for pruning, so each metric must make the accumulated sum
//! monotonic: adding another axis never decreases it.
//!
//! Distances are reported in *metric units*. For the squared metrics that is the squared distance;
//! use [`DistanceMetric::radius_to_dist`] to turn a plain radius into metric units.

use std::f64::consts::TAU;

use crate::r#type::IndexableNum;
use crate::source::PointSource;

/// A distance function usable by the K-D tree.
pub trait DistanceMetric<N: IndexableNum> {
    /// The contribution of a single axis to the distance between `a` and `b`.
    fn accum_dist(&self, a: N, b: N, dim: usize) -> f64;

    /// A lower bound of [`accum_dist`][Self::accum_dist] from `value` to any coordinate in
    /// `[low, high]` on axis `dim`.
    #[inline]
    fn interval_dist(&self, value: N, low: N, high: N, dim: usize) -> f64 {
        if value < low {
            self.accum_dist(value, low, dim)
        } else if value > high {
            self.accum_dist(value, high, dim)
        } else {
            0.0
        }
    }

    /// The full distance between two points.
    fn distance(&self, a: &[N], b: &[N]) -> f64 {
        let mut result = 0.0;
        for (dim, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            result += self.accum_dist(*x, *y, dim);
        }
        result
    }

    /// The distance between `query` and point `index` of `source`.
    ///
    /// Accumulation may stop as soon as the partial sum exceeds `worst`; the partial sum is then
    /// returned, which is enough for the caller to reject the point.
    #[inline]
    fn distance_to_point<S>(&self, query: &[N], source: &S, index: usize, worst: f64) -> f64
    where
        S: PointSource<N> + ?Sized,
    {
        let mut result = 0.0;
        for (dim, value) in query.iter().enumerate() {
            result += self.accum_dist(*value, source.coord(index, dim), dim);
            if result > worst {
                return result;
            }
        }
        result
    }

    /// Convert a search radius into metric units.
    #[inline]
    fn radius_to_dist(&self, radius: f64) -> f64 {
        radius
    }
}

/// Manhattan distance: the sum of absolute differences.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Manhattan;

impl<N: IndexableNum> DistanceMetric<N> for Manhattan {
    #[inline]
    fn accum_dist(&self, a: N, b: N, _dim: usize) -> f64 {
        (a.as_f64() - b.as_f64()).abs()
    }
}

/// Squared Euclidean distance, the default metric.
///
/// No square root is taken; the ordering of neighbors is the same as for Euclidean distance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SquaredEuclidean;

impl<N: IndexableNum> DistanceMetric<N> for SquaredEuclidean {
    #[inline]
    fn accum_dist(&self, a: N, b: N, _dim: usize) -> f64 {
        let d = a.as_f64() - b.as_f64();
        d * d
    }

    #[inline]
    fn radius_to_dist(&self, radius: f64) -> f64 {
        radius * radius
    }
}

/// Squared Euclidean distance for low-dimensional data.
///
/// Identical results to [`SquaredEuclidean`], but point distances are computed in a single
/// unrolled expression for two and three dimensions instead of an early-exit loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimpleSquaredEuclidean;

impl<N: IndexableNum> DistanceMetric<N> for SimpleSquaredEuclidean {
    #[inline]
    fn accum_dist(&self, a: N, b: N, _dim: usize) -> f64 {
        let d = a.as_f64() - b.as_f64();
        d * d
    }

    #[inline]
    fn distance_to_point<S>(&self, query: &[N], source: &S, index: usize, _worst: f64) -> f64
    where
        S: PointSource<N> + ?Sized,
    {
        match query.len() {
            2 => {
                let d0 = query[0].as_f64() - source.coord(index, 0).as_f64();
                let d1 = query[1].as_f64() - source.coord(index, 1).as_f64();
                d0 * d0 + d1 * d1
            }
            3 => {
                let d0 = query[0].as_f64() - source.coord(index, 0).as_f64();
                let d1 = query[1].as_f64() - source.coord(index, 1).as_f64();
                let d2 = query[2].as_f64() - source.coord(index, 2).as_f64();
                d0 * d0 + d1 * d1 + d2 * d2
            }
            _ => {
                let mut result = 0.0;
                for (dim, value) in query.iter().enumerate() {
                    let d = value.as_f64() - source.coord(index, dim).as_f64();
                    result += d * d;
                }
                result
            }
        }
    }

    #[inline]
    fn radius_to_dist(&self, radius: f64) -> f64 {
        radius * radius
    }
}

/// Geodesic distance on a circle, applied independently to every axis.
///
/// Each coordinate is an angle with the given period; differences wrap around so that `0` and
/// `period` are the same place. Squared wrapped differences are accumulated, and radii are
/// interpreted as angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodesicCircle {
    /// The length of one full turn. Defaults to `2π`.
    pub period: f64,
}

impl Default for GeodesicCircle {
    fn default() -> Self {
        Self { period: TAU }
    }
}

impl GeodesicCircle {
    /// Create a circle metric with a custom period, e.g. `360.0` for degrees.
    pub fn with_period(period: f64) -> Self {
        Self { period }
    }

    /// The shortest angular difference between `a` and `b`, in `[0, period / 2]`.
    #[inline]
    pub fn wrapped_diff(&self, a: f64, b: f64) -> f64 {
        let d = (a - b).abs() % self.period;
        if d > self.period / 2.0 {
            self.period - d
        } else {
            d
        }
    }
}

impl<N: IndexableNum> DistanceMetric<N> for GeodesicCircle {
    #[inline]
    fn accum_dist(&self, a: N, b: N, _dim: usize) -> f64 {
        let d = self.wrapped_diff(a.as_f64(), b.as_f64());
        d * d
    }

    fn interval_dist(&self, value: N, low: N, high: N, dim: usize) -> f64 {
        // Angles are not confined to one period, so a turned copy of `value` may still fall
        // inside `[low, high]`.
        let width = high.as_f64() - low.as_f64();
        let offset = (value.as_f64() - low.as_f64()).rem_euclid(self.period);
        if width >= self.period || offset <= width {
            return 0.0;
        }
        // Otherwise the closest point of the arc is one of its ends.
        let to_low = self.accum_dist(value, low, dim);
        let to_high = self.accum_dist(value, high, dim);
        to_low.min(to_high)
    }

    #[inline]
    fn radius_to_dist(&self, radius: f64) -> f64 {
        radius * radius
    }
}

/// Geodesic distance between unit vectors on a sphere.
///
/// Points are expected to be normalized. The accumulated distance is the squared chord length,
/// which orders points the same way as the great-circle angle does. With `antipodal` set, `v`
/// and `-v` are the same point, which is the right model for unit quaternions describing
/// rotations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeodesicSphere {
    /// Treat antipodal points as identical.
    pub antipodal: bool,
}

impl GeodesicSphere {
    /// A sphere metric for unit quaternions, where `q` and `-q` describe the same rotation.
    pub fn quaternion() -> Self {
        Self { antipodal: true }
    }

    /// Convert a squared chord length back into the angle between the two unit vectors.
    pub fn angle(&self, dist: f64) -> f64 {
        2.0 * (dist.max(0.0).sqrt() / 2.0).min(1.0).asin()
    }

    #[inline]
    fn gap(value: f64, low: f64, high: f64) -> f64 {
        if value < low {
            low - value
        } else if value > high {
            value - high
        } else {
            0.0
        }
    }
}

impl<N: IndexableNum> DistanceMetric<N> for GeodesicSphere {
    #[inline]
    fn accum_dist(&self, a: N, b: N, _dim: usize) -> f64 {
        let (a, b) = (a.as_f64(), b.as_f64());
        let direct = (a - b) * (a - b);
        if self.antipodal {
            direct.min((a + b) * (a + b))
        } else {
            direct
        }
    }

    fn interval_dist(&self, value: N, low: N, high: N, _dim: usize) -> f64 {
        let (value, low, high) = (value.as_f64(), low.as_f64(), high.as_f64());
        let direct = Self::gap(value, low, high);
        if self.antipodal {
            let mirrored = Self::gap(value, -high, -low);
            let gap = direct.min(mirrored);
            gap * gap
        } else {
            direct * direct
        }
    }

    fn distance(&self, a: &[N], b: &[N]) -> f64 {
        let mut direct = 0.0;
        let mut mirrored = 0.0;
        for (x, y) in a.iter().zip(b.iter()) {
            let (x, y) = (x.as_f64(), y.as_f64());
            direct += (x - y) * (x - y);
            mirrored += (x + y) * (x + y);
        }
        if self.antipodal {
            direct.min(mirrored)
        } else {
            direct
        }
    }

    fn distance_to_point<S>(&self, query: &[N], source: &S, index: usize, worst: f64) -> f64
    where
        S: PointSource<N> + ?Sized,
    {
        let mut direct = 0.0;
        let mut mirrored = 0.0;
        for (dim, value) in query.iter().enumerate() {
            let (x, y) = (value.as_f64(), source.coord(index, dim).as_f64());
            direct += (x - y) * (x - y);
            if self.antipodal {
                mirrored += (x + y) * (x + y);
                if direct > worst && mirrored > worst {
                    return direct.min(mirrored);
                }
            } else if direct > worst {
                return direct;
            }
        }
        if self.antipodal {
            direct.min(mirrored)
        } else {
            direct
        }
    }

    /// The radius is an angle in radians.
    fn radius_to_dist(&self, radius: f64) -> f64 {
        let chord = 2.0 * (radius / 2.0).sin();
        chord * chord
    }
}
