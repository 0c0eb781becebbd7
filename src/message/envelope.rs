//! Wire envelope: the frame around every protocol message.
//!
//! Layout (integers big-endian):
//!
//! ```text
//! [MAGIC "FLC" (3)][VERSION (1)][SENDER_LEN (2)][SENDER (n)]
//! [SEQ (8)][REPLY_FLAG (1)][REPLY_TO (8, iff flag != 0)][BODY]
//! ```
//!
//! The sender id travels in every envelope because the substrate hands the
//! receiver a bare payload: gossip needs the sender for repair pulls, and
//! replies need it for addressing. `seq` is a per-node monotonic counter;
//! a reply carries the request's `seq` in `reply_to`, fire-and-forget sends
//! carry none.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::types::FloodcastMessage;

/// Magic header for floodcast envelopes: "FLC" (3 bytes).
pub const FLOODCAST_MAGIC: &[u8] = b"FLC";

/// Current protocol version.
pub const FLOODCAST_VERSION: u8 = 0x01;

/// Maximum encoded node id length accepted on decode.
pub const MAX_WIRE_ID_LEN: usize = 256;

/// Minimum envelope size: magic (3) + version (1) + sender_len (2) +
/// seq (8) + reply flag (1) + body tag (1) = 16 bytes.
const MIN_ENVELOPE_SIZE: usize = 16;

/// Trait for encoding and decoding node ids to/from bytes.
///
/// Implement this for your node id type to put it on the wire. Ids are
/// length-prefixed wherever they appear; decode rejects ids longer than
/// [`MAX_WIRE_ID_LEN`].
///
/// # Example
///
/// ```ignore
/// use floodcast::IdCodec;
///
/// #[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// struct NodeName(String);
///
/// impl IdCodec for NodeName {
///     fn encode_id(&self) -> Bytes {
///         Bytes::copy_from_slice(self.0.as_bytes())
///     }
///
///     fn decode_id(bytes: &[u8]) -> Option<Self> {
///         std::str::from_utf8(bytes).ok().map(|s| NodeName(s.to_string()))
///     }
/// }
/// ```
pub trait IdCodec: Sized {
    /// Encode the id to bytes for wire transmission.
    fn encode_id(&self) -> Bytes;

    /// Decode an id from bytes. Returns `None` if the bytes are invalid.
    fn decode_id(bytes: &[u8]) -> Option<Self>;
}

/// Write `id` with a u16 length prefix.
pub(crate) fn encode_wire_id<I: IdCodec>(buf: &mut impl BufMut, id: &I) {
    let bytes = id.encode_id();
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(&bytes);
}

/// Read a u16-length-prefixed id. Rejects lengths above [`MAX_WIRE_ID_LEN`].
pub(crate) fn decode_wire_id<I: IdCodec>(buf: &mut impl Buf) -> Option<I> {
    if buf.remaining() < 2 {
        return None;
    }
    let len = buf.get_u16() as usize;
    if len > MAX_WIRE_ID_LEN || buf.remaining() < len {
        return None;
    }
    let bytes = buf.copy_to_bytes(len);
    I::decode_id(&bytes)
}

/// Encoded length of `id` including its length prefix.
pub(crate) fn wire_id_len<I: IdCodec>(id: &I) -> usize {
    2 + id.encode_id().len()
}

/// A framed protocol message: sender, correlation, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<I> {
    /// Node that produced this envelope.
    pub sender: I,
    /// Sender-local monotonic sequence number.
    pub seq: u64,
    /// `seq` of the request this envelope answers, if it is a reply.
    pub reply_to: Option<u64>,
    /// The protocol message body.
    pub message: FloodcastMessage<I>,
}

impl<I> Envelope<I> {
    /// Create a fire-and-forget envelope (no reply correlation).
    pub fn new(sender: I, seq: u64, message: FloodcastMessage<I>) -> Self {
        Self {
            sender,
            seq,
            reply_to: None,
            message,
        }
    }

    /// Create a reply envelope correlated to `request_seq`.
    pub fn reply(sender: I, seq: u64, request_seq: u64, message: FloodcastMessage<I>) -> Self {
        Self {
            sender,
            seq,
            reply_to: Some(request_seq),
            message,
        }
    }

    /// Whether this envelope answers a specific request.
    pub const fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

impl<I: IdCodec> Envelope<I> {
    /// Encode the envelope for transmission.
    pub fn encode_to_bytes(&self) -> Bytes {
        let sender_bytes = self.sender.encode_id();
        let body_len = self.message.encoded_len();
        let reply_len = if self.reply_to.is_some() { 8 } else { 0 };
        let total_len =
            FLOODCAST_MAGIC.len() + 1 + 2 + sender_bytes.len() + 8 + 1 + reply_len + body_len;

        let mut buf = BytesMut::with_capacity(total_len);
        buf.put_slice(FLOODCAST_MAGIC);
        buf.put_u8(FLOODCAST_VERSION);
        buf.put_u16(sender_bytes.len() as u16);
        buf.put_slice(&sender_bytes);
        buf.put_u64(self.seq);
        match self.reply_to {
            Some(request_seq) => {
                buf.put_u8(1);
                buf.put_u64(request_seq);
            }
            None => buf.put_u8(0),
        }
        self.message.encode(&mut buf);
        buf.freeze()
    }

    /// Decode an envelope from received bytes.
    pub fn decode(data: &[u8]) -> DecodeResult<I> {
        if data.len() < FLOODCAST_MAGIC.len() || &data[..FLOODCAST_MAGIC.len()] != FLOODCAST_MAGIC {
            return DecodeResult::NotFloodcast;
        }

        // Magic matched: anything wrong from here on is malformed traffic.
        if data.len() < MIN_ENVELOPE_SIZE {
            return DecodeResult::Malformed;
        }

        let version = data[3];
        if version != FLOODCAST_VERSION {
            return DecodeResult::IncompatibleVersion(version);
        }

        let mut cursor = &data[4..];
        let sender = match decode_wire_id::<I>(&mut cursor) {
            Some(sender) => sender,
            None => return DecodeResult::Malformed,
        };

        if cursor.remaining() < 9 {
            return DecodeResult::Malformed;
        }
        let seq = cursor.get_u64();
        let reply_to = if cursor.get_u8() != 0 {
            if cursor.remaining() < 8 {
                return DecodeResult::Malformed;
            }
            Some(cursor.get_u64())
        } else {
            None
        };

        let message = match FloodcastMessage::decode(&mut cursor) {
            Some(message) => message,
            None => return DecodeResult::Malformed,
        };

        DecodeResult::Ok(Envelope {
            sender,
            seq,
            reply_to,
            message,
        })
    }
}

/// Result of decoding an envelope.
#[derive(Debug)]
pub enum DecodeResult<I> {
    /// Successfully decoded.
    Ok(Envelope<I>),
    /// Data does not start with the floodcast magic header (foreign traffic
    /// on a shared substrate).
    NotFloodcast,
    /// Protocol version is incompatible.
    IncompatibleVersion(u8),
    /// Magic matched but the envelope is malformed (truncated, oversized id,
    /// undecodable sender, bad body).
    Malformed,
}

/// Check if data carries a floodcast envelope (magic header only).
pub fn is_floodcast_payload(data: &[u8]) -> bool {
    data.len() >= FLOODCAST_MAGIC.len() && &data[..FLOODCAST_MAGIC.len()] == FLOODCAST_MAGIC
}

// IdCodec implementations for common id types

impl IdCodec for u64 {
    fn encode_id(&self) -> Bytes {
        Bytes::copy_from_slice(&self.to_be_bytes())
    }

    fn decode_id(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(u64::from_be_bytes(arr))
    }
}

impl IdCodec for u32 {
    fn encode_id(&self) -> Bytes {
        Bytes::copy_from_slice(&self.to_be_bytes())
    }

    fn decode_id(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 4] = bytes.try_into().ok()?;
        Some(u32::from_be_bytes(arr))
    }
}

impl IdCodec for String {
    fn encode_id(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    fn decode_id(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().map(|s| s.to_string())
    }
}

impl IdCodec for Bytes {
    fn encode_id(&self) -> Bytes {
        self.clone()
    }

    fn decode_id(bytes: &[u8]) -> Option<Self> {
        Some(Bytes::copy_from_slice(bytes))
    }
}
