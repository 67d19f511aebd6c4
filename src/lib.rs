#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod bbox;
mod error;
pub mod kdtree;
pub mod metric;
mod params;
mod result;
mod source;
mod r#type;

pub use bbox::{BoundingBox, Corner};
pub use error::{KdIndexError, Result};
pub use metric::{
    DistanceMetric, GeodesicCircle, GeodesicSphere, Manhattan, SimpleSquaredEuclidean,
    SquaredEuclidean,
};
pub use params::{KdTreeParams, SearchParams};
pub use r#type::{CoordType, IndexableNum};
pub use result::{KnnResultSet, Neighbor, RadiusResultSet, ResultSet};
pub use source::{CoordSource, FlatPoints, PointSource};
