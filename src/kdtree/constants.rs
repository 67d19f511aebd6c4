/// First byte of a serialized static tree.
pub(crate) const KDTREE_MAGIC: u8 = 0xdf;

/// First byte of a serialized dynamic index.
pub(crate) const DYNAMIC_MAGIC: u8 = 0xde;

/// Format version, stored in the high nibble of the second byte.
pub(crate) const KDTREE_VERSION: u8 = 1;

/// magic, version/type, u16 dims, u32 leaf size, u32 point count, u32 permutation length,
/// u32 node count
pub(crate) const KDTREE_HEADER_SIZE: usize = 20;

/// magic, version/type, u16 dims, u32 leaf size, u32 point count, u64 counter, u8 slot count
pub(crate) const DYNAMIC_HEADER_SIZE: usize = 21;

/// Target byte size of one arena chunk.
pub(crate) const ARENA_BLOCK_SIZE: usize = 8192;

/// Default maximum number of points stored in a leaf.
pub const DEFAULT_LEAF_MAX_SIZE: usize = 10;
