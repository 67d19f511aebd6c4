use std::fmt::Debug;

use num_traits::{Bounded, Num, NumCast, ToPrimitive};

use crate::kdtree::constants::{DYNAMIC_MAGIC, KDTREE_MAGIC};
use crate::KdIndexError;

/// A trait for types that can be used for indexed coordinates.
///
/// This trait is sealed and cannot be implemented for external types. Every implementation has a
/// fixed type index that is written into the header of a serialized tree, so that a buffer saved
/// with one coordinate type is never reinterpreted as another.
pub trait IndexableNum:
    private::Sealed
    + Num
    + NumCast
    + ToPrimitive
    + PartialOrd
    + Debug
    + Send
    + Sync
    + bytemuck::Pod
    + Bounded
{
    /// The type index stored in the low nibble of the version byte.
    const TYPE_INDEX: u8;
    /// The number of bytes per element
    const BYTES_PER_ELEMENT: usize;

    /// Widen to `f64`, which is the type distances are accumulated in.
    #[inline]
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl IndexableNum for i8 {
    const TYPE_INDEX: u8 = 0;
    const BYTES_PER_ELEMENT: usize = 1;
}

impl IndexableNum for u8 {
    const TYPE_INDEX: u8 = 1;
    const BYTES_PER_ELEMENT: usize = 1;
}

impl IndexableNum for i16 {
    const TYPE_INDEX: u8 = 3;
    const BYTES_PER_ELEMENT: usize = 2;
}

impl IndexableNum for u16 {
    const TYPE_INDEX: u8 = 4;
    const BYTES_PER_ELEMENT: usize = 2;
}

impl IndexableNum for i32 {
    const TYPE_INDEX: u8 = 5;
    const BYTES_PER_ELEMENT: usize = 4;
}

impl IndexableNum for u32 {
    const TYPE_INDEX: u8 = 6;
    const BYTES_PER_ELEMENT: usize = 4;
}

impl IndexableNum for f32 {
    const TYPE_INDEX: u8 = 7;
    const BYTES_PER_ELEMENT: usize = 4;
}

impl IndexableNum for f64 {
    const TYPE_INDEX: u8 = 8;
    const BYTES_PER_ELEMENT: usize = 8;
}

/// An enum over the allowed coordinate types in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordType {
    /// `i8` coordinates.
    Int8,
    /// `u8` coordinates.
    UInt8,
    /// `i16` coordinates.
    Int16,
    /// `u16` coordinates.
    UInt16,
    /// `i32` coordinates.
    Int32,
    /// `u32` coordinates.
    UInt32,
    /// `f32` coordinates.
    Float32,
    /// `f64` coordinates.
    Float64,
}

impl CoordType {
    /// Infer the CoordType from the first two bytes of a saved index.
    ///
    /// This can be used to discern the generic type to use when loading a static or dynamic tree
    /// from a stream of unknown origin.
    pub fn from_header(header: &[u8]) -> Result<Self, KdIndexError> {
        if header.len() < 2 {
            return Err(KdIndexError::Serialization(
                "Header shorter than two bytes.".to_string(),
            ));
        }

        let magic = header[0];
        if magic != KDTREE_MAGIC && magic != DYNAMIC_MAGIC {
            return Err(KdIndexError::Serialization(
                "Data not in kd-index format.".to_string(),
            ));
        }

        let version_and_type = header[1];
        let type_ = version_and_type & 0x0f;
        let result = match type_ {
            i8::TYPE_INDEX => CoordType::Int8,
            u8::TYPE_INDEX => CoordType::UInt8,
            i16::TYPE_INDEX => CoordType::Int16,
            u16::TYPE_INDEX => CoordType::UInt16,
            i32::TYPE_INDEX => CoordType::Int32,
            u32::TYPE_INDEX => CoordType::UInt32,
            f32::TYPE_INDEX => CoordType::Float32,
            f64::TYPE_INDEX => CoordType::Float64,
            t => {
                return Err(KdIndexError::Serialization(format!(
                    "Unexpected type {}.",
                    t
                )))
            }
        };
        Ok(result)
    }
}

// https://rust-lang.github.io/api-guidelines/future-proofing.html#sealed-traits-protect-against-downstream-implementations-c-sealed
mod private {
    pub trait Sealed {}

    impl Sealed for i8 {}
    impl Sealed for u8 {}
    impl Sealed for i16 {}
    impl Sealed for u16 {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}
