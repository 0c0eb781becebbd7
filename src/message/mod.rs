//! Message types and wire codec for the floodcast protocol.
//!
//! This module contains:
//! - [`FloodcastMessage`] - Protocol message bodies
//! - [`Envelope`] - The wire frame (magic, version, sender, correlation)
//! - [`IdCodec`] - Node id encoding for transmission

mod envelope;
mod types;

pub use envelope::{
    is_floodcast_payload, DecodeResult, Envelope, IdCodec, FLOODCAST_MAGIC, FLOODCAST_VERSION,
    MAX_WIRE_ID_LEN,
};
pub use types::{FloodcastMessage, MessageTag, MAX_READ_BATCH, MAX_TOPOLOGY_ENTRIES};
