//! Graph vertices as stored between rounds
//!
//! - `record` - `NodeRecord`, `Distance`, and the binary record format
//! - `codec` - big-endian primitives shared with the shuffle format
//! - `encoder` - text adjacency lists to the round-0 snapshot

pub mod codec;
pub mod encoder;
pub mod record;

pub use encoder::{encode_graph, parse_adjacency_list, write_initial_round, GraphError};
pub use record::{Distance, NodeId, NodeRecord, RecordError, RecordReader};
