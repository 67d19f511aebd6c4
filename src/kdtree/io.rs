//! Binary encoding of a [`TreeCore`].
//!
//! Layout, all values in native endianness:
//!
//! | bytes       | content                                                      |
//! |-------------|--------------------------------------------------------------|
//! | 0           | magic `0xdf`                                                 |
//! | 1           | `(version << 4) + type index` of the coordinate type         |
//! | 2..4        | `u16` dimensionality                                         |
//! | 4..8        | `u32` leaf max size                                          |
//! | 8..12       | `u32` number of points in the source                         |
//! | 12..16      | `u32` length of the permutation                              |
//! | 16..20      | `u32` number of nodes                                        |
//!
//! followed by the root box (`low, high` per dimension), the permutation (`u16` entries when the
//! source has fewer than 65536 points, `u32` otherwise) and the nodes in pre-order. A node is a
//! tag byte, then `u32 first, u32 last` for a leaf or `u16 dim, N split` for an internal node.

use std::io::{self, Read, Write};

use bytemuck::{bytes_of, bytes_of_mut, cast_slice, Pod, Zeroable};

use crate::bbox::BoundingBox;
use crate::error::{KdIndexError, Result};
use crate::kdtree::arena::{Node, NodeArena};
use crate::kdtree::constants::{KDTREE_HEADER_SIZE, KDTREE_MAGIC, KDTREE_VERSION};
use crate::kdtree::tree::TreeCore;
use crate::r#type::IndexableNum;

const LEAF_TAG: u8 = 0;
const INTERNAL_TAG: u8 = 1;

/// Entries of the permutation read per `read_exact` call.
const READ_CHUNK: usize = 4096;

pub(crate) fn read_error(err: io::Error) -> KdIndexError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        KdIndexError::Serialization("Stream ended before the index was complete.".to_string())
    } else {
        KdIndexError::Io(err)
    }
}

pub(crate) fn read_pod<T: Pod, R: Read + ?Sized>(reader: &mut R) -> Result<T> {
    let mut value: T = Zeroable::zeroed();
    reader
        .read_exact(bytes_of_mut(&mut value))
        .map_err(read_error)?;
    Ok(value)
}

#[inline]
fn push_pod<T: Pod>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(bytes_of(&value));
}

impl<N: IndexableNum> TreeCore<N> {
    /// Encode this tree. `num_points` is the size of the source it was built against.
    pub(crate) fn to_bytes(&self, num_points: usize) -> Vec<u8> {
        let wide_indices = num_points >= 65536;
        let index_bytes = if wide_indices { 4 } else { 2 };
        let mut data = Vec::with_capacity(
            KDTREE_HEADER_SIZE
                + 2 * self.dims * N::BYTES_PER_ELEMENT
                + self.permutation.len() * index_bytes
                + self.num_nodes() * (3 + N::BYTES_PER_ELEMENT),
        );

        data.push(KDTREE_MAGIC);
        data.push((KDTREE_VERSION << 4) + N::TYPE_INDEX);
        push_pod(&mut data, self.dims as u16);
        push_pod(&mut data, self.leaf_max_size as u32);
        push_pod(&mut data, num_points as u32);
        push_pod(&mut data, self.permutation.len() as u32);
        push_pod(&mut data, self.num_nodes() as u32);
        debug_assert_eq!(data.len(), KDTREE_HEADER_SIZE);

        for dim in 0..self.dims {
            push_pod(&mut data, self.bbox.low()[dim]);
            push_pod(&mut data, self.bbox.high()[dim]);
        }

        if wide_indices {
            data.extend_from_slice(cast_slice(&self.permutation));
        } else {
            for &index in &self.permutation {
                push_pod(&mut data, index as u16);
            }
        }

        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match *self.node(id) {
                Node::Leaf { first, last } => {
                    data.push(LEAF_TAG);
                    push_pod(&mut data, first);
                    push_pod(&mut data, last);
                }
                Node::Internal {
                    dim,
                    split,
                    left,
                    right,
                } => {
                    data.push(INTERNAL_TAG);
                    push_pod(&mut data, dim);
                    push_pod(&mut data, split);
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        data
    }

    pub(crate) fn write<W: Write + ?Sized>(&self, writer: &mut W, num_points: usize) -> Result<()> {
        writer.write_all(&self.to_bytes(num_points))?;
        Ok(())
    }

    /// Decode a tree. Returns it with the source point count recorded in its header.
    pub(crate) fn read<R: Read + ?Sized>(reader: &mut R) -> Result<(Self, usize)> {
        let mut header = [0u8; KDTREE_HEADER_SIZE];
        reader.read_exact(&mut header).map_err(read_error)?;

        if header[0] != KDTREE_MAGIC {
            return Err(KdIndexError::Serialization(
                "Data not in kd-index tree format.".to_string(),
            ));
        }

        let version_and_type = header[1];
        let version = version_and_type >> 4;
        if version != KDTREE_VERSION {
            return Err(KdIndexError::Serialization(format!(
                "Got v{} data when expected v{}.",
                version, KDTREE_VERSION
            )));
        }

        let type_ = version_and_type & 0x0f;
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
        let num_indices = bytemuck::pod_read_unaligned::<u32>(&header[12..16]) as usize;
        let num_nodes = bytemuck::pod_read_unaligned::<u32>(&header[16..20]) as usize;

        if dims == 0 || leaf_max_size == 0 || num_indices == 0 {
            return Err(KdIndexError::Serialization(format!(
                "Invalid header: {} dimensions, leaf size {}, {} points.",
                dims, leaf_max_size, num_indices
            )));
        }
        if num_indices > num_points {
            return Err(KdIndexError::Serialization(format!(
                "Tree references {} points but its source had {}.",
                num_indices, num_points
            )));
        }
        if num_nodes == 0 || num_nodes > 2 * num_indices {
            return Err(KdIndexError::Serialization(format!(
                "{} nodes is impossible for {} points.",
                num_nodes, num_indices
            )));
        }

        let mut low = Vec::with_capacity(dims);
        let mut high = Vec::with_capacity(dims);
        for _ in 0..dims {
            low.push(read_pod::<N, _>(reader)?);
            high.push(read_pod::<N, _>(reader)?);
        }
        let bbox = BoundingBox::try_new(low, high)
            .map_err(|err| KdIndexError::Serialization(err.to_string()))?;

        let permutation = read_permutation(reader, num_indices, num_points)?;

        let mut arena = NodeArena::new(None);
        let root = arena.alloc(Node::Leaf { first: 0, last: 0 })?;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let tag: u8 = read_pod(reader)?;
            match tag {
                LEAF_TAG => {
                    let first: u32 = read_pod(reader)?;
                    let last: u32 = read_pod(reader)?;
                    if first > last || last as usize > num_indices {
                        return Err(KdIndexError::Serialization(format!(
                            "Leaf range {}..{} is outside 0..{}.",
                            first, last, num_indices
                        )));
                    }
                    arena.set(id, Node::Leaf { first, last });
                }
                INTERNAL_TAG => {
                    let dim: u16 = read_pod(reader)?;
                    let split: N = read_pod(reader)?;
                    if dim as usize >= dims {
                        return Err(KdIndexError::Serialization(format!(
                            "Split dimension {} out of {}.",
                            dim, dims
                        )));
                    }
                    if arena.len() + 2 > num_nodes {
                        return Err(KdIndexError::Serialization(format!(
                            "More than the {} nodes announced in the header.",
                            num_nodes
                        )));
                    }
                    let left = arena.alloc(Node::Leaf { first: 0, last: 0 })?;
                    let right = arena.alloc(Node::Leaf { first: 0, last: 0 })?;
                    arena.set(
                        id,
                        Node::Internal {
                            dim,
                            split,
                            left,
                            right,
                        },
                    );
                    stack.push(right);
                    stack.push(left);
                }
                t => {
                    return Err(KdIndexError::Serialization(format!(
                        "Unexpected node tag {}.",
                        t
                    )))
                }
            }
        }

        if arena.len() != num_nodes {
            return Err(KdIndexError::Serialization(format!(
                "Read {} nodes when the header announced {}.",
                arena.len(),
                num_nodes
            )));
        }

        let tree = Self {
            dims,
            leaf_max_size,
            permutation,
            bbox,
            arena,
            root,
        };
        Ok((tree, num_points))
    }
}

fn read_permutation<R: Read + ?Sized>(
    reader: &mut R,
    num_indices: usize,
    num_points: usize,
) -> Result<Vec<u32>> {
    let wide_indices = num_points >= 65536;
    let mut permutation: Vec<u32> = Vec::with_capacity(num_indices.min(READ_CHUNK));

    while permutation.len() < num_indices {
        let count = (num_indices - permutation.len()).min(READ_CHUNK);
        if wide_indices {
            let mut chunk = vec![0u32; count];
            reader
                .read_exact(bytemuck::cast_slice_mut(&mut chunk))
                .map_err(read_error)?;
            permutation.extend_from_slice(&chunk);
        } else {
            let mut chunk = vec![0u16; count];
            reader
                .read_exact(bytemuck::cast_slice_mut(&mut chunk))
                .map_err(read_error)?;
            permutation.extend(chunk.into_iter().map(u32::from));
        }
    }

    if let Some(bad) = permutation.iter().find(|&&i| i as usize >= num_points) {
        return Err(KdIndexError::Serialization(format!(
            "Point index {} out of {}.",
            bad, num_points
        )));
    }
    Ok(permutation)
}
