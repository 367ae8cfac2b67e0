//! Binary codec
//!
//! An index file is a fixed size header followed by the tree in pre-order:
//!
//! ```text
//! File     := Header Body
//! Header   := magic:[u8; 4] ("AVLX") body_len:u64
//! Body     := Node
//! Node     := Sentinel | key:i32 bucket_len:u64 id:i32{bucket_len} height:i32 Node(left) Node(right)
//! Sentinel := key:i32 == -1
//! ```
//!
//! All integers are little-endian. The header is written with bincode (fixint encoding), so it
//! is always `HEADER_SIZE` bytes and `body_len` is the exact number of bytes after it.
//!
//! Both directions walk the tree with an explicit stack.

use anyhow::Result;
use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::node::Link;
use crate::tree::node::Node;
use crate::tree::AttendanceTree;
use crate::Attendance;
use crate::BINCODER;

/// Marks an index file.
pub const MAGIC: [u8; 4] = *b"AVLX";

/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 12;

/// Key value marking an absent subtree.
pub const SENTINEL: Attendance = -1;

/// Deepest tree the decoder accepts. A valid AVL tree over every possible i32 key is shallower.
pub const MAX_DEPTH: usize = 64;

const ID_SIZE: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFileHeader {
    magic: [u8; 4],
    body_len: u64,
}

/// Encoding and decoding failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The data does not start with the index magic
    #[error("not an attendance index, magic: {0:?}")]
    BadMagic([u8; 4]),

    /// Header body length disagrees with the data
    #[error("header declares {declared} body bytes, found: {actual}")]
    LengthMismatch {
        /// Length recorded in the header
        declared: u64,
        /// Bytes actually present
        actual: usize,
    },

    /// Data ended in the middle of a field
    #[error("data truncated at offset: {0}")]
    Truncated(usize),

    /// A bucket length that cannot fit in the remaining data
    #[error("bucket of {len} ids at offset: {offset} overruns the data")]
    BucketOverflow {
        /// Offset of the node holding the bucket
        offset: usize,
        /// Declared bucket length
        len: u64,
    },

    /// The tree ended before the data did
    #[error("{0} unexpected bytes after the tree")]
    TrailingBytes(usize),

    /// Nesting deeper than `MAX_DEPTH`
    #[error("tree deeper than {0} levels")]
    TooDeep(usize),

    /// A node uses the sentinel as its key
    #[error("key: {0} is reserved for empty subtrees")]
    ReservedKey(Attendance),
}

impl AttendanceTree {
    /// Serialize the tree, header included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Deserialize a tree produced by [`AttendanceTree::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

/// Serialize a tree, header included.
pub fn encode(tree: &AttendanceTree) -> Result<Vec<u8>> {
    let mut body = vec![];
    let mut stack = vec![tree.root()];
    while let Some(link) = stack.pop() {
        match link {
            None => body.extend_from_slice(&SENTINEL.to_le_bytes()),
            Some(node) => {
                if node.key == SENTINEL {
                    return Err(CodecError::ReservedKey(node.key).into());
                }
                body.extend_from_slice(&node.key.to_le_bytes());
                body.extend_from_slice(&(node.bucket.len() as u64).to_le_bytes());
                for id in &node.bucket {
                    body.extend_from_slice(&id.to_le_bytes());
                }
                body.extend_from_slice(&node.height.to_le_bytes());
                // Right first, so the left subtree is written first.
                stack.push(node.right.as_deref());
                stack.push(node.left.as_deref());
            }
        }
    }

    let header = IndexFileHeader {
        magic: MAGIC,
        body_len: body.len() as u64,
    };
    let mut bytes = BINCODER.serialize(&header)?;
    bytes.extend_from_slice(&body);
    tracing::debug!(bytes = bytes.len(), "encoded index");
    Ok(bytes)
}

/// Deserialize a tree, checking the header first.
pub fn decode(bytes: &[u8]) -> Result<AttendanceTree> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::Truncated(bytes.len()).into());
    }
    let header: IndexFileHeader = BINCODER.deserialize(&bytes[..HEADER_SIZE])?;
    if header.magic != MAGIC {
        return Err(CodecError::BadMagic(header.magic).into());
    }
    let actual = bytes.len() - HEADER_SIZE;
    if header.body_len != actual as u64 {
        return Err(CodecError::LengthMismatch {
            declared: header.body_len,
            actual,
        }
        .into());
    }

    let mut reader = Reader {
        buf: bytes,
        pos: HEADER_SIZE,
    };
    let root = decode_body(&mut reader)?;
    if reader.remaining() != 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()).into());
    }
    Ok(AttendanceTree::from_root(root))
}

enum Pending {
    Left,
    Right,
}

fn decode_body(reader: &mut Reader<'_>) -> Result<Link, CodecError> {
    // Each entry is a node still waiting for one of its children.
    let mut stack: Vec<(Box<Node>, Pending)> = vec![];
    loop {
        match reader.read_node()? {
            Some(node) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(CodecError::TooDeep(MAX_DEPTH));
                }
                stack.push((node, Pending::Left));
            }
            None => {
                // A subtree is complete. Hand it upwards until some parent still needs its
                // right child.
                let mut done: Link = None;
                loop {
                    match stack.pop() {
                        None => return Ok(done),
                        Some((mut parent, Pending::Left)) => {
                            parent.left = done;
                            stack.push((parent, Pending::Right));
                            break;
                        }
                        Some((mut parent, Pending::Right)) => {
                            parent.right = done;
                            done = Some(parent);
                        }
                    }
                }
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        if self.remaining() < N {
            return Err(CodecError::Truncated(self.pos));
        }
        let mut out = [0; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    /// Read one node without its children, or `None` for a sentinel.
    fn read_node(&mut self) -> Result<Option<Box<Node>>, CodecError> {
        let offset = self.pos;
        let key = self.read_i32()?;
        if key == SENTINEL {
            return Ok(None);
        }
        let len = self.read_u64()?;
        if len > (self.remaining() / ID_SIZE) as u64 {
            return Err(CodecError::BucketOverflow { offset, len });
        }
        let mut bucket = Vec::with_capacity(len as usize);
        for _ in 0..len {
            bucket.push(self.read_i32()?);
        }
        let height = self.read_i32()?;
        Ok(Some(Box::new(Node::with_bucket(key, bucket, height))))
    }
}
