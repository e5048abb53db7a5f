//! Messages exchanged between the map and reduce sides of a round
//!
//! Spill files carry a flat sequence of tagged proposals:
//!
//! ```text
//! 0x00 | target:i32 | distance:i32      candidate distance for `target`
//! 0x01 | <node record>                  the target's own record
//! ```

use crate::graph::codec::{put_i32, ByteReader};
use crate::graph::{Distance, NodeId, NodeRecord, RecordError};

const TAG_CANDIDATE: u8 = 0x00;
const TAG_STRUCTURE: u8 = 0x01;

/// One message addressed to a node for the current round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// A distance the node could adopt
    Candidate(Distance),
    /// The node's own record from the previous round. Carries the adjacency
    /// forward and stands in for the self-proposal of its current distance.
    Structure(NodeRecord),
}

impl Proposal {
    pub fn distance(&self) -> Distance {
        match self {
            Proposal::Candidate(distance) => *distance,
            Proposal::Structure(record) => record.distance,
        }
    }

    pub fn encode_into(&self, target: NodeId, buf: &mut Vec<u8>) {
        match self {
            Proposal::Candidate(distance) => {
                buf.push(TAG_CANDIDATE);
                put_i32(buf, target);
                put_i32(buf, distance.raw());
            }
            Proposal::Structure(record) => {
                buf.push(TAG_STRUCTURE);
                record.encode_into(buf);
            }
        }
    }
}

/// Iterator over a spill buffer, yielding `(target, proposal)` pairs
pub struct ProposalReader<'a> {
    reader: ByteReader<'a>,
    failed: bool,
}

impl<'a> ProposalReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(buf),
            failed: false,
        }
    }

    fn read_next(&mut self) -> Result<(NodeId, Proposal), RecordError> {
        let offset = self.reader.offset();
        match self.reader.read_u8()? {
            TAG_CANDIDATE => {
                let target = self.reader.read_i32()?;
                let raw = self.reader.read_i32()?;
                let distance = Distance::from_raw(raw).ok_or(RecordError::IllegalDistance {
                    node: target,
                    distance: raw,
                })?;
                Ok((target, Proposal::Candidate(distance)))
            }
            TAG_STRUCTURE => {
                let record = NodeRecord::read_from(&mut self.reader)?;
                Ok((record.id, Proposal::Structure(record)))
            }
            tag => Err(RecordError::UnknownTag { tag, offset }),
        }
    }
}

impl Iterator for ProposalReader<'_> {
    type Item = Result<(NodeId, Proposal), RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = self.read_next();
        self.failed = result.is_err();
        Some(result)
    }
}
