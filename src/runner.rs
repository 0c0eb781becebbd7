//! Background task runner wiring a floodcast node to a transport.
//!
//! The runner drains the node's outgoing queue and pushes each envelope
//! through a [`Transport`], and drives the incoming payload processor.
//!
//! # Important: independent sends
//!
//! Each envelope is sent as its own in-flight future. A neighbor with a
//! slow or stalled link delays only its own envelope; gossip to the other
//! neighbors proceeds. Send failures are logged, counted, and otherwise
//! ignored, lost gossip is repaired by the protocol's snapshot pulls.

use futures::{stream::FuturesUnordered, FutureExt, StreamExt};
use std::{fmt::Debug, hash::Hash, sync::Arc};

use crate::{
    floodcast::{Floodcast, FloodcastHandle, Outbound},
    message::IdCodec,
    transport::Transport,
};

/// Runs a floodcast node's background tasks over a unicast transport.
///
/// # Example
///
/// ```ignore
/// use floodcast::{Floodcast, FloodcastConfig, FloodcastRunner, ChannelTransport};
///
/// let (node, handle) = Floodcast::new(local_id, FloodcastConfig::default());
/// let incoming = handle.clone();
/// let (transport, rx) = ChannelTransport::bounded(1024);
///
/// tokio::spawn(FloodcastRunner::new(node.clone(), handle, transport).run());
///
/// // Feed received payloads in via the retained handle clone:
/// incoming.submit_incoming(payload).await?;
///
/// // Deliver (target, data) pairs from rx however your network does.
/// ```
pub struct FloodcastRunner<I, T> {
    floodcast: Floodcast<I>,
    handle: FloodcastHandle<I>,
    transport: Arc<T>,
}

impl<I, T> FloodcastRunner<I, T>
where
    I: IdCodec + Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Transport<I>,
{
    /// Create a new runner with the given transport.
    pub fn new(floodcast: Floodcast<I>, handle: FloodcastHandle<I>, transport: T) -> Self {
        Self {
            floodcast,
            handle,
            transport: Arc::new(transport),
        }
    }

    /// Run all background tasks until the node shuts down.
    pub async fn run(self) {
        futures::future::join(
            self.run_incoming_processor(),
            self.run_outgoing_processor(),
        )
        .await;
    }

    /// Run only the incoming payload processor.
    pub async fn run_incoming_processor(&self) {
        self.floodcast.run_incoming_processor().await;
    }

    /// Run the outgoing envelope processor.
    ///
    /// Every dequeued envelope becomes an independently polled send. The
    /// processor keeps accepting new envelopes while earlier sends are
    /// still in flight, and finishes the in-flight set before returning
    /// once the queue closes.
    pub async fn run_outgoing_processor(&self) {
        let mut in_flight = FuturesUnordered::new();

        loop {
            if in_flight.is_empty() {
                match self.handle.next_outgoing().await {
                    Some(outbound) => in_flight.push(self.dispatch(outbound)),
                    None => break,
                }
            } else {
                let next_outgoing = self.handle.next_outgoing().fuse();
                futures::pin_mut!(next_outgoing);

                futures::select! {
                    outgoing = next_outgoing => match outgoing {
                        Some(outbound) => in_flight.push(self.dispatch(outbound)),
                        None => break,
                    },
                    _ = in_flight.next() => {}
                }
            }
        }

        // Queue closed: let sends already in flight finish.
        while in_flight.next().await.is_some() {}
    }

    /// Encode and send one envelope.
    async fn dispatch(&self, outbound: Outbound<I>) {
        let Outbound { target, envelope } = outbound;
        let data = envelope.encode_to_bytes();
        if let Err(e) = self.transport.send_to(&target, data).await {
            self.floodcast.note_send_failure();
            tracing::warn!(
                "failed to send {} to {:?}: {}",
                envelope.message.type_name(),
                target,
                e
            );
        }
    }

    /// Get a reference to the floodcast node.
    pub fn floodcast(&self) -> &Floodcast<I> {
        &self.floodcast
    }

    /// Get a reference to the handle.
    pub fn handle(&self) -> &FloodcastHandle<I> {
        &self.handle
    }

    /// Shut the node down; both processors return once drained.
    pub fn shutdown(&self) {
        self.floodcast.shutdown();
    }
}
