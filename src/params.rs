//! Build-time and query-time configuration.

use crate::error::{KdIndexError, Result};
use crate::kdtree::constants::DEFAULT_LEAF_MAX_SIZE;

/// Parameters controlling how a tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdTreeParams {
    /// The maximum number of points in a leaf.
    pub leaf_max_size: usize,

    /// An upper bound on the number of nodes the arena may hold. `None` is unbounded.
    pub max_nodes: Option<usize>,
}

impl Default for KdTreeParams {
    fn default() -> Self {
        Self {
            leaf_max_size: DEFAULT_LEAF_MAX_SIZE,
            max_nodes: None,
        }
    }
}

impl KdTreeParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.leaf_max_size == 0 {
            return Err(KdIndexError::Construction(
                "leaf_max_size must be at least 1.".to_string(),
            ));
        }
        if self.leaf_max_size > u32::MAX as usize {
            return Err(KdIndexError::Construction(format!(
                "leaf_max_size {} does not fit in u32.",
                self.leaf_max_size
            )));
        }
        Ok(())
    }
}

/// Parameters for a single query.
///
/// ```
/// use kd_index::SearchParams;
///
/// let params = SearchParams::default().with_eps(0.5).with_checks(32);
/// assert!(params.sorted);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Approximation slack. A subtree is skipped when its lower bound times `1 + eps` exceeds the
    /// worst accepted distance. `0` gives exact results.
    pub eps: f64,

    /// Return results in ascending distance order.
    pub sorted: bool,

    /// Maximum number of leaves visited. `None` is unlimited.
    pub checks: Option<usize>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            eps: 0.0,
            sorted: true,
            checks: None,
        }
    }
}

impl SearchParams {
    /// Set the approximation slack.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set whether results are sorted.
    pub fn with_sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    /// Cap the number of leaves visited.
    pub fn with_checks(mut self, checks: usize) -> Self {
        self.checks = Some(checks);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.eps.is_nan() || self.eps < 0.0 {
            return Err(KdIndexError::Query(format!(
                "eps must be non-negative, got {}.",
                self.eps
            )));
        }
        Ok(())
    }
}
