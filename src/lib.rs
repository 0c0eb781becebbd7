//! # floodcast
//!
//! Best-effort gossip broadcast over a static neighbor topology.
//!
//! Every node floods newly learned values to its configured neighbors and
//! tags each gossip envelope with the size of its own value set. A receiver
//! holding fewer values than the sender advertises pulls a full snapshot
//! from it. Flooding makes propagation fast; the count-triggered pull makes
//! the cluster converge even when the network drops, reorders, or
//! duplicates messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Application                           │
//! │              submit() / values() / contains()                │
//! └────────────────────────────┬─────────────────────────────────┘
//! ┌────────────────────────────▼─────────────────────────────────┐
//! │                      FloodcastRunner                         │
//! │   (drives sends through a Transport, one future per send)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │                         Floodcast                            │
//! │   (core protocol - flood, dedup, count-gated snapshot pull)  │
//! ├──────────────┬───────────────────┬───────────────────────────┤
//! │  ValueStore  │   TopologyTable   │         Envelope          │
//! │ (grow-only)  │ (static neighbors)│   (wire frame + codec)    │
//! └──────────────┴───────────────────┴───────────────────────────┘
//! ```
//!
//! ## API Entry Points
//!
//! | API | Use Case |
//! |-----|----------|
//! | [`FloodcastRunner`] | Production - node wired to a [`Transport`] |
//! | [`Floodcast`] | Core protocol only, drain the handle yourself |
//!
//! ## How It Works
//!
//! - **Flood**: a value seen for the first time is sent to every neighbor,
//!   tagged with the local set size at that moment
//! - **Dedup**: a value already present is absorbed silently, which is what
//!   stops the flood from echoing forever
//! - **Repair**: a receiver behind the advertised count asks the sender for
//!   its full set and merges the reply, closing gaps left by lost traffic
//!
//! ## Example
//!
//! ```ignore
//! use floodcast::{ChannelTransport, Floodcast, FloodcastConfig, FloodcastRunner};
//!
//! let (node, handle) = Floodcast::new(node_id, FloodcastConfig::default());
//! let incoming = handle.clone();
//!
//! // Install the neighbor list (or let a TopologyUpdate message do it).
//! node.set_neighbors(neighbors);
//!
//! let (transport, outgoing) = ChannelTransport::bounded(1024);
//! tokio::spawn(FloodcastRunner::new(node.clone(), handle, transport).run());
//!
//! // Broadcast a value to the cluster.
//! node.submit(42).await?;
//!
//! // Feed payloads received from the network.
//! incoming.submit_incoming(payload).await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

mod config;
mod error;
mod floodcast;
mod message;
mod runner;
mod store;
mod topology;
mod transport;

pub mod testing;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

// Re-export config types
pub use config::FloodcastConfig;

// Re-export error types
pub use error::{Error, Result};

// Re-export core floodcast types
pub use floodcast::{Floodcast, FloodcastHandle, Outbound, StatsSnapshot};

// Re-export message types
pub use message::{
    is_floodcast_payload, DecodeResult, Envelope, FloodcastMessage, IdCodec, MessageTag,
    FLOODCAST_MAGIC, FLOODCAST_VERSION, MAX_READ_BATCH, MAX_TOPOLOGY_ENTRIES, MAX_WIRE_ID_LEN,
};

// Re-export runner types
pub use runner::FloodcastRunner;

// Re-export store types
pub use store::{InsertOutcome, MergeOutcome, ValueStore};

// Re-export topology types
pub use topology::{NeighborList, TopologyTable};

// Re-export transport types
pub use transport::{ChannelTransport, ChannelTransportError, NoopTransport, Transport};
