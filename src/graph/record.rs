//! Node records and their binary encoding
//!
//! One record exists per graph vertex. On disk a record is laid out as
//!
//! ```text
//! nodeId:i32 | distance:i32 | adjacencyCount:i32 | adjacency:i32[adjacencyCount]
//! ```
//!
//! with every integer big-endian. A distance of `i32::MAX` marks a node that
//! no proposal has reached yet.

use super::codec::{put_i32, ByteReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Vertex identifier as stored in the record format
pub type NodeId = i32;

/// Size of the fixed record header (id, distance, adjacency count)
pub const RECORD_HEADER_LEN: usize = 12;

/// Structural violations found while decoding records or proposals.
///
/// Every variant is fatal to the task that hit it: dropping a node would
/// silently corrupt the distances of everything downstream of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("corrupt record: input ends at byte {offset}, {needed} more byte(s) required")]
    Truncated { offset: usize, needed: usize },

    #[error("corrupt record for node {node}: negative adjacency count {count}")]
    NegativeAdjacencyCount { node: NodeId, count: i32 },

    #[error(
        "corrupt record for node {node}: adjacency count {count} needs more than the {available} byte(s) left"
    )]
    AdjacencyOverrun {
        node: NodeId,
        count: i32,
        available: usize,
    },

    #[error("corrupt record for node {node}: illegal distance {distance}")]
    IllegalDistance { node: NodeId, distance: i32 },

    #[error("corrupt record: {count} trailing byte(s) after a complete record")]
    TrailingBytes { count: usize },

    #[error("corrupt proposal: unknown tag {tag:#04x} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },
}

/// Hop count from the source set, or the unreached sentinel.
///
/// The sentinel is the largest representable value, so taking the minimum of
/// two distances is always the right merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(i32);

impl Distance {
    pub const ZERO: Distance = Distance(0);
    pub const UNREACHED: Distance = Distance(i32::MAX);

    /// Wrap a raw wire value; negative values are not distances.
    pub fn from_raw(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(Distance(raw))
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_reached(self) -> bool {
        self != Self::UNREACHED
    }

    /// Distance one hop further out.
    ///
    /// Saturates into the sentinel: a path longer than `i32::MAX - 1` hops is
    /// indistinguishable from no path at all in this encoding.
    pub fn next_hop(self) -> Self {
        Distance(self.0.saturating_add(1))
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reached() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "unreached")
        }
    }
}

/// State of one vertex for one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub distance: Distance,
    /// Out-neighbors in load order; duplicates are kept.
    pub adjacency: Vec<NodeId>,
}

impl NodeRecord {
    pub fn new(id: NodeId, distance: Distance, adjacency: Vec<NodeId>) -> Self {
        Self {
            id,
            distance,
            adjacency,
        }
    }

    /// A member of the source set
    pub fn source(id: NodeId, adjacency: Vec<NodeId>) -> Self {
        Self::new(id, Distance::ZERO, adjacency)
    }

    /// Any vertex not in the source set at round 0
    pub fn unreached(id: NodeId, adjacency: Vec<NodeId>) -> Self {
        Self::new(id, Distance::UNREACHED, adjacency)
    }

    pub fn is_reached(&self) -> bool {
        self.distance.is_reached()
    }

    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + 4 * self.adjacency.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoded record to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_i32(buf, self.id);
        put_i32(buf, self.distance.raw());
        // Vec lengths beyond i32::MAX cannot be produced by decode.
        put_i32(buf, self.adjacency.len() as i32);
        for neighbor in &self.adjacency {
            put_i32(buf, *neighbor);
        }
    }

    /// Decode exactly one record; any bytes left over are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut reader = ByteReader::new(bytes);
        let record = Self::read_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(RecordError::TrailingBytes {
                count: reader.remaining(),
            });
        }
        Ok(record)
    }

    /// Decode the next record from a stream of concatenated records.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, RecordError> {
        let id = reader.read_i32()?;
        let raw_distance = reader.read_i32()?;
        let distance = Distance::from_raw(raw_distance).ok_or(RecordError::IllegalDistance {
            node: id,
            distance: raw_distance,
        })?;

        let count = reader.read_i32()?;
        if count < 0 {
            return Err(RecordError::NegativeAdjacencyCount { node: id, count });
        }
        let available = reader.remaining();
        if (count as usize).saturating_mul(4) > available {
            return Err(RecordError::AdjacencyOverrun {
                node: id,
                count,
                available,
            });
        }

        let mut adjacency = Vec::with_capacity(count as usize);
        for _ in 0..count {
            adjacency.push(reader.read_i32()?);
        }

        Ok(Self {
            id,
            distance,
            adjacency,
        })
    }
}

/// `{distance, [n1, n2, ...]}`, the text form used by extractor output.
impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, [", self.distance)?;
        for (i, neighbor) in self.adjacency.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", neighbor)?;
        }
        write!(f, "]}}")
    }
}

/// Iterator over a buffer of concatenated records
pub struct RecordReader<'a> {
    reader: ByteReader<'a>,
    failed: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(buf),
            failed: false,
        }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = Result<NodeRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = NodeRecord::read_from(&mut self.reader);
        // Offsets after a corrupt record are meaningless.
        self.failed = result.is_err();
        Some(result)
    }
}
