//! Transport abstraction for floodcast message delivery.
//!
//! This module provides the `Transport` trait that must be implemented
//! to carry encoded envelopes between nodes.
//!
//! # Important
//!
//! Floodcast requires **unicast** (point-to-point) delivery:
//! - **Gossip**: Sent to each neighbor individually
//! - **ReadRequest**: Sent to the specific node believed to be ahead
//! - **Replies**: Sent back to the requesting node
//!
//! Delivery is best-effort. A transport may drop, reorder, or duplicate
//! messages; the protocol's dedup and read-repair absorb all three. A
//! transport must never corrupt a payload it does deliver.
//!
//! # Available Transports
//!
//! - [`ChannelTransport`]: Channel-based transport for testing and embedding
//! - [`NoopTransport`]: Discards messages (a maximally lossy network)
//!
//! # Example
//!
//! ```ignore
//! use floodcast::Transport;
//!
//! struct UdpTransport {
//!     socket: Arc<UdpSocket>,
//!     addrs: HashMap<u64, SocketAddr>,
//! }
//!
//! impl Transport<u64> for UdpTransport {
//!     type Error = std::io::Error;
//!
//!     async fn send_to(&self, target: &u64, data: Bytes) -> Result<(), Self::Error> {
//!         let addr = self.addrs[target];
//!         self.socket.send_to(&data, addr).await.map(|_| ())
//!     }
//! }
//! ```

use bytes::Bytes;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

/// Transport trait for sending encoded envelopes to peers.
///
/// Implementations provide unicast delivery to a specific target node.
/// Failures are reported per-send; the caller treats them as loss, not
/// as fatal errors.
#[auto_impl::auto_impl(Box, Arc)]
pub trait Transport<I>: Send + Sync + 'static
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a payload to a specific peer (unicast).
    ///
    /// This must attempt delivery to the named target only. Returning `Ok`
    /// means the payload was handed to the network, not that it arrived.
    fn send_to(
        &self,
        target: &I,
        data: Bytes,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A channel-based transport that emits (target, data) pairs.
///
/// Useful for tests and for embedders that route delivery themselves:
/// drain the receiver and hand each payload to the addressed node.
#[derive(Debug, Clone)]
pub struct ChannelTransport<I> {
    tx: async_channel::Sender<(I, Bytes)>,
}

impl<I> ChannelTransport<I> {
    /// Create a transport over an existing sender.
    pub fn new(tx: async_channel::Sender<(I, Bytes)>) -> Self {
        Self { tx }
    }

    /// Create a transport with a new bounded channel.
    ///
    /// Returns the transport and the receiver for (target, data) pairs.
    pub fn bounded(capacity: usize) -> (Self, async_channel::Receiver<(I, Bytes)>) {
        let (tx, rx) = async_channel::bounded(capacity);
        (Self { tx }, rx)
    }

    /// Create a transport with a new unbounded channel.
    pub fn unbounded() -> (Self, async_channel::Receiver<(I, Bytes)>) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx }, rx)
    }
}

/// Error type for channel transport.
#[derive(Debug, Clone)]
pub struct ChannelTransportError(pub String);

impl std::fmt::Display for ChannelTransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel transport error: {}", self.0)
    }
}

impl std::error::Error for ChannelTransportError {}

impl<I> Transport<I> for ChannelTransport<I>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    type Error = ChannelTransportError;

    async fn send_to(&self, target: &I, data: Bytes) -> Result<(), Self::Error> {
        self.tx
            .send((target.clone(), data))
            .await
            .map_err(|e| ChannelTransportError(e.to_string()))
    }
}

/// A transport that discards every payload.
///
/// Behaves like a network with 100% loss, which the protocol must survive
/// without erroring. Useful in tests that only exercise local state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

impl<I> Transport<I> for NoopTransport
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    type Error = std::convert::Infallible;

    async fn send_to(&self, _target: &I, _data: Bytes) -> Result<(), Self::Error> {
        Ok(())
    }
}
