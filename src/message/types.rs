//! Floodcast protocol message types.
//!
//! Bodies are deliberately tiny: the protocol moves single `u64` values and
//! full-snapshot read replies, so every field has a fixed-width encoding and
//! the only variable-length structures (read replies, topology mappings) are
//! length-prefixed with decode-side bounds.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::envelope::{decode_wire_id, encode_wire_id, wire_id_len, IdCodec};

/// Maximum number of values accepted in a single read reply.
pub const MAX_READ_BATCH: usize = 1 << 20;

/// Maximum number of node entries (and neighbors per entry) accepted in a
/// topology mapping.
pub const MAX_TOPOLOGY_ENTRIES: usize = 4096;

/// Protocol message bodies.
///
/// `Submit`, `ReadRequest`, and `TopologyUpdate` expect a correlated reply;
/// `Gossip` and proactively issued read-requests are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloodcastMessage<I> {
    /// Client submission of a new value.
    Submit {
        /// The submitted value.
        value: u64,
    },

    /// Acknowledgment of a `Submit`.
    SubmitOk,

    /// One value flooded to a topology neighbor.
    ///
    /// `known` is the sender's total value count taken atomically with the
    /// insert that triggered this fan-out; the receiver compares it against
    /// its own count to decide whether to pull a repair snapshot.
    Gossip {
        /// The propagated value.
        value: u64,
        /// Sender's total value count at send time.
        known: u64,
    },

    /// Request for the receiver's full value snapshot.
    ///
    /// Serves both anti-entropy pulls between nodes and client-facing reads.
    ReadRequest,

    /// Full snapshot of the sender's value set, in arbitrary order.
    ReadReply {
        /// The sender's complete value set.
        values: Vec<u64>,
    },

    /// Cluster-wide neighbor assignment from the controller.
    ///
    /// Carries the full mapping; each node extracts only its own entry. A
    /// node absent from the mapping treats its neighbor list as empty.
    TopologyUpdate {
        /// node id → ordered neighbor list, for every node in the cluster.
        topology: Vec<(I, Vec<I>)>,
    },

    /// Acknowledgment of a `TopologyUpdate`.
    TopologyOk,
}

/// Message type tags for encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    /// Submit message tag.
    Submit = 1,
    /// SubmitOk message tag.
    SubmitOk = 2,
    /// Gossip message tag.
    Gossip = 3,
    /// ReadRequest message tag.
    ReadRequest = 4,
    /// ReadReply message tag.
    ReadReply = 5,
    /// TopologyUpdate message tag.
    TopologyUpdate = 6,
    /// TopologyOk message tag.
    TopologyOk = 7,
}

impl TryFrom<u8> for MessageTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageTag::Submit),
            2 => Ok(MessageTag::SubmitOk),
            3 => Ok(MessageTag::Gossip),
            4 => Ok(MessageTag::ReadRequest),
            5 => Ok(MessageTag::ReadReply),
            6 => Ok(MessageTag::TopologyUpdate),
            7 => Ok(MessageTag::TopologyOk),
            _ => Err(value),
        }
    }
}

impl<I: IdCodec> FloodcastMessage<I> {
    /// Encode the message body into bytes.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            FloodcastMessage::Submit { value } => {
                buf.put_u8(MessageTag::Submit as u8);
                buf.put_u64(*value);
            }
            FloodcastMessage::SubmitOk => {
                buf.put_u8(MessageTag::SubmitOk as u8);
            }
            FloodcastMessage::Gossip { value, known } => {
                buf.put_u8(MessageTag::Gossip as u8);
                buf.put_u64(*value);
                buf.put_u64(*known);
            }
            FloodcastMessage::ReadRequest => {
                buf.put_u8(MessageTag::ReadRequest as u8);
            }
            FloodcastMessage::ReadReply { values } => {
                buf.put_u8(MessageTag::ReadReply as u8);
                buf.put_u32(values.len() as u32);
                for value in values {
                    buf.put_u64(*value);
                }
            }
            FloodcastMessage::TopologyUpdate { topology } => {
                buf.put_u8(MessageTag::TopologyUpdate as u8);
                buf.put_u16(topology.len() as u16);
                for (id, neighbors) in topology {
                    encode_wire_id(buf, id);
                    buf.put_u16(neighbors.len() as u16);
                    for neighbor in neighbors {
                        encode_wire_id(buf, neighbor);
                    }
                }
            }
            FloodcastMessage::TopologyOk => {
                buf.put_u8(MessageTag::TopologyOk as u8);
            }
        }
    }

    /// Encode the message body into a new `Bytes` buffer.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Calculate the encoded length of the message body.
    pub fn encoded_len(&self) -> usize {
        match self {
            FloodcastMessage::Submit { .. } => 1 + 8,
            FloodcastMessage::SubmitOk => 1,
            FloodcastMessage::Gossip { .. } => 1 + 8 + 8,
            FloodcastMessage::ReadRequest => 1,
            FloodcastMessage::ReadReply { values } => 1 + 4 + values.len() * 8,
            FloodcastMessage::TopologyUpdate { topology } => {
                let mut len = 1 + 2;
                for (id, neighbors) in topology {
                    len += wire_id_len(id) + 2;
                    for neighbor in neighbors {
                        len += wire_id_len(neighbor);
                    }
                }
                len
            }
            FloodcastMessage::TopologyOk => 1,
        }
    }

    /// Decode a message body from bytes.
    ///
    /// Returns `None` on truncation, an unknown tag, or a count exceeding
    /// the decode bounds.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < 1 {
            return None;
        }

        let tag = MessageTag::try_from(buf.get_u8()).ok()?;

        match tag {
            MessageTag::Submit => {
                if buf.remaining() < 8 {
                    return None;
                }
                Some(FloodcastMessage::Submit {
                    value: buf.get_u64(),
                })
            }
            MessageTag::SubmitOk => Some(FloodcastMessage::SubmitOk),
            MessageTag::Gossip => {
                if buf.remaining() < 16 {
                    return None;
                }
                let value = buf.get_u64();
                let known = buf.get_u64();
                Some(FloodcastMessage::Gossip { value, known })
            }
            MessageTag::ReadRequest => Some(FloodcastMessage::ReadRequest),
            MessageTag::ReadReply => {
                if buf.remaining() < 4 {
                    return None;
                }
                let count = buf.get_u32() as usize;
                if count > MAX_READ_BATCH || buf.remaining() < count * 8 {
                    return None;
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(buf.get_u64());
                }
                Some(FloodcastMessage::ReadReply { values })
            }
            MessageTag::TopologyUpdate => {
                if buf.remaining() < 2 {
                    return None;
                }
                let entries = buf.get_u16() as usize;
                if entries > MAX_TOPOLOGY_ENTRIES {
                    return None;
                }
                let mut topology = Vec::with_capacity(entries);
                for _ in 0..entries {
                    let id = decode_wire_id(buf)?;
                    if buf.remaining() < 2 {
                        return None;
                    }
                    let neighbor_count = buf.get_u16() as usize;
                    if neighbor_count > MAX_TOPOLOGY_ENTRIES {
                        return None;
                    }
                    let mut neighbors = Vec::with_capacity(neighbor_count);
                    for _ in 0..neighbor_count {
                        neighbors.push(decode_wire_id(buf)?);
                    }
                    topology.push((id, neighbors));
                }
                Some(FloodcastMessage::TopologyUpdate { topology })
            }
            MessageTag::TopologyOk => Some(FloodcastMessage::TopologyOk),
        }
    }

    /// Decode a message body from a byte slice.
    pub fn decode_from_slice(data: &[u8]) -> Option<Self> {
        let mut cursor = std::io::Cursor::new(data);
        Self::decode(&mut cursor)
    }
}

impl<I> FloodcastMessage<I> {
    /// Check if this is a Gossip message.
    pub const fn is_gossip(&self) -> bool {
        matches!(self, FloodcastMessage::Gossip { .. })
    }

    /// Check if this is a Submit message.
    pub const fn is_submit(&self) -> bool {
        matches!(self, FloodcastMessage::Submit { .. })
    }

    /// Check if this is a ReadRequest message.
    pub const fn is_read_request(&self) -> bool {
        matches!(self, FloodcastMessage::ReadRequest)
    }

    /// Check if this is a ReadReply message.
    pub const fn is_read_reply(&self) -> bool {
        matches!(self, FloodcastMessage::ReadReply { .. })
    }

    /// Check whether this message is a terminal acknowledgment.
    pub const fn is_ack(&self) -> bool {
        matches!(self, FloodcastMessage::SubmitOk | FloodcastMessage::TopologyOk)
    }

    /// Check whether the sender of this message expects a correlated reply.
    pub const fn expects_reply(&self) -> bool {
        matches!(
            self,
            FloodcastMessage::Submit { .. }
                | FloodcastMessage::ReadRequest
                | FloodcastMessage::TopologyUpdate { .. }
        )
    }

    /// Get the message tag.
    pub const fn tag(&self) -> MessageTag {
        match self {
            FloodcastMessage::Submit { .. } => MessageTag::Submit,
            FloodcastMessage::SubmitOk => MessageTag::SubmitOk,
            FloodcastMessage::Gossip { .. } => MessageTag::Gossip,
            FloodcastMessage::ReadRequest => MessageTag::ReadRequest,
            FloodcastMessage::ReadReply { .. } => MessageTag::ReadReply,
            FloodcastMessage::TopologyUpdate { .. } => MessageTag::TopologyUpdate,
            FloodcastMessage::TopologyOk => MessageTag::TopologyOk,
        }
    }

    /// Get a human-readable type name for tracing/logging.
    pub const fn type_name(&self) -> &'static str {
        match self {
            FloodcastMessage::Submit { .. } => "Submit",
            FloodcastMessage::SubmitOk => "SubmitOk",
            FloodcastMessage::Gossip { .. } => "Gossip",
            FloodcastMessage::ReadRequest => "ReadRequest",
            FloodcastMessage::ReadReply { .. } => "ReadReply",
            FloodcastMessage::TopologyUpdate { .. } => "TopologyUpdate",
            FloodcastMessage::TopologyOk => "TopologyOk",
        }
    }
}
