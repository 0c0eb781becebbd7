//! Core floodcast protocol implementation.
//!
//! This module provides the main `Floodcast` struct that combines
//! count-tagged flooding with pull-based read repair for best-effort
//! broadcast over a fixed topology.

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use std::{
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    config::FloodcastConfig,
    error::{Error, Result},
    message::{DecodeResult, Envelope, FloodcastMessage, IdCodec},
    store::{InsertOutcome, ValueStore},
    topology::{NeighborList, TopologyTable},
};

#[cfg(feature = "metrics")]
use crate::metrics;

/// Core floodcast broadcast implementation.
///
/// Every value accepted locally is flooded to all configured neighbors,
/// tagged with the size of the local value set at send time. A receiver
/// whose set is smaller than the advertised count pulls a full snapshot
/// from the sender, which repairs any gap left by lost messages.
///
/// The struct is cheap to clone; clones share state.
///
/// # Type Parameters
///
/// - `I`: Node identifier type (must be clonable, hashable, and wire-encodable)
pub struct Floodcast<I> {
    /// Inner state.
    inner: Arc<FloodcastInner<I>>,
}

struct FloodcastInner<I> {
    /// Local node ID.
    local_id: I,

    /// Configuration.
    config: FloodcastConfig,

    /// The grow-only value set.
    store: ValueStore,

    /// Static neighbor topology.
    topology: TopologyTable<I>,

    /// Sequence counter for outgoing envelopes.
    next_seq: AtomicU64,

    /// Shutdown flag.
    shutdown: AtomicBool,

    /// Channel for outgoing envelopes.
    outgoing_tx: Sender<Outbound<I>>,

    /// Channel for submitting raw inbound payloads.
    incoming_tx: Sender<Bytes>,

    /// Channel for draining raw inbound payloads.
    incoming_rx: Receiver<Bytes>,

    /// Protocol counters.
    stats: FloodcastStats,
}

/// An envelope addressed to a specific peer, awaiting transmission.
#[derive(Debug)]
pub struct Outbound<I> {
    /// Target peer.
    pub target: I,
    /// Envelope to send.
    pub envelope: Envelope<I>,
}

#[derive(Default)]
struct FloodcastStats {
    gossip_sent: AtomicU64,
    duplicates: AtomicU64,
    read_requests_sent: AtomicU64,
    read_replies_sent: AtomicU64,
    values_merged: AtomicU64,
    malformed: AtomicU64,
    send_failures: AtomicU64,
}

/// Point-in-time view of protocol counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Gossip envelopes queued for sending.
    pub gossip_sent: u64,
    /// Values received that were already present.
    pub duplicates: u64,
    /// Snapshot pulls issued after a count mismatch.
    pub read_requests_sent: u64,
    /// Snapshot replies served to peers.
    pub read_replies_sent: u64,
    /// Values learned from merged snapshots.
    pub values_merged: u64,
    /// Inbound payloads rejected as malformed.
    pub malformed: u64,
    /// Transport sends that reported failure.
    pub send_failures: u64,
    /// Current size of the value set.
    pub values_stored: usize,
}

impl<I> Floodcast<I>
where
    I: IdCodec + Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create a new floodcast node.
    ///
    /// Returns the node and a [`FloodcastHandle`] for wiring it to a
    /// network layer. The node starts with an unconfigured topology;
    /// gossip goes nowhere until neighbors are installed via
    /// [`set_neighbors`](Self::set_neighbors) or a `TopologyUpdate`.
    ///
    /// # Arguments
    ///
    /// - `local_id`: This node's identifier
    /// - `config`: Queue sizing configuration
    pub fn new(local_id: I, config: FloodcastConfig) -> (Self, FloodcastHandle<I>) {
        let (outgoing_tx, outgoing_rx) =
            async_channel::bounded(config.outgoing_queue_capacity.max(1));
        let (incoming_tx, incoming_rx) =
            async_channel::bounded(config.incoming_queue_capacity.max(1));

        let inner = Arc::new(FloodcastInner {
            local_id,
            config,
            store: ValueStore::new(),
            topology: TopologyTable::new(),
            next_seq: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            outgoing_tx,
            incoming_tx,
            incoming_rx,
            stats: FloodcastStats::default(),
        });

        let floodcast = Self {
            inner: inner.clone(),
        };

        let handle = FloodcastHandle {
            outgoing_rx,
            incoming_rx: floodcast.inner.incoming_rx.clone(),
            incoming_tx: floodcast.inner.incoming_tx.clone(),
        };

        (floodcast, handle)
    }

    /// Get the local node ID.
    pub fn local_id(&self) -> &I {
        &self.inner.local_id
    }

    /// Get the configuration.
    pub fn config(&self) -> &FloodcastConfig {
        &self.inner.config
    }

    /// Install this node's neighbor list.
    ///
    /// Replaces any previous list. Gossip fan-out uses exactly these
    /// neighbors from the next send on; in-flight sends are unaffected.
    pub fn set_neighbors(&self, neighbors: Vec<I>) {
        tracing::debug!(count = neighbors.len(), "installing neighbor list");
        #[cfg(feature = "metrics")]
        metrics::set_neighbor_count(neighbors.len());
        self.inner.topology.set_neighbors(neighbors);
    }

    /// Current neighbor list (empty if unconfigured).
    pub fn neighbors(&self) -> NeighborList<I> {
        self.inner.topology.neighbors()
    }

    /// Whether `value` is present in the local set.
    pub fn contains(&self, value: u64) -> bool {
        self.inner.store.contains(value)
    }

    /// All values currently held, in unspecified order.
    pub fn values(&self) -> Vec<u64> {
        self.inner.store.snapshot()
    }

    /// Number of values currently held.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Whether the value set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Submit a value originated by the local application.
    ///
    /// Stores the value and, if it is new, queues one gossip envelope per
    /// neighbor. Returns whether the value was newly added.
    pub async fn submit(&self, value: u64) -> Result<bool> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }

        #[cfg(feature = "metrics")]
        metrics::record_submit();

        let outcome = self.accept(value).await;
        Ok(outcome.added)
    }

    /// Handle a raw payload received from the network.
    ///
    /// Payloads without the floodcast magic header are ignored (foreign
    /// traffic on a shared substrate). Payloads that carry the header but
    /// fail to decode are counted, logged, and reported as
    /// [`Error::Decode`]; local state is never touched by them.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<()> {
        match Envelope::decode(payload) {
            DecodeResult::Ok(envelope) => self.handle_envelope(envelope).await,
            DecodeResult::NotFloodcast => {
                tracing::trace!(len = payload.len(), "ignoring non-floodcast payload");
                Ok(())
            }
            DecodeResult::IncompatibleVersion(version) => {
                self.inner.stats.malformed.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                metrics::record_malformed();
                tracing::warn!(version, "dropping envelope with incompatible version");
                Err(Error::Decode(format!(
                    "incompatible protocol version {}",
                    version
                )))
            }
            DecodeResult::Malformed => {
                self.inner.stats.malformed.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                metrics::record_malformed();
                tracing::warn!(len = payload.len(), "dropping malformed envelope");
                Err(Error::Decode("malformed envelope".to_string()))
            }
        }
    }

    /// Handle a decoded envelope.
    ///
    /// This is the full per-message protocol step. It never blocks on the
    /// network: sends are queued on the outgoing channel and performed by
    /// whatever drains the handle.
    pub async fn handle_envelope(&self, envelope: Envelope<I>) -> Result<()> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }

        let Envelope {
            sender,
            seq,
            reply_to,
            message,
        } = envelope;

        match message {
            FloodcastMessage::Submit { value } => {
                self.accept(value).await;
                self.send_reply(sender, seq, FloodcastMessage::SubmitOk)
                    .await;
                Ok(())
            }
            FloodcastMessage::Gossip { value, known } => {
                let outcome = self.accept(value).await;

                // The sender advertises more values than we hold after this
                // insert: we are behind, pull a full snapshot from them. The
                // reverse mismatch needs no action here, the gossip we just
                // forwarded carries our larger count to them.
                if known > outcome.total as u64 {
                    tracing::debug!(
                        known,
                        local = outcome.total,
                        "behind peer {:?}, requesting snapshot",
                        sender
                    );
                    let request = self.next_envelope(FloodcastMessage::ReadRequest);
                    if self
                        .inner
                        .outgoing_tx
                        .send(Outbound {
                            target: sender.clone(),
                            envelope: request,
                        })
                        .await
                        .is_err()
                    {
                        tracing::warn!(
                            "outgoing queue closed while requesting snapshot from {:?}",
                            sender
                        );
                    } else {
                        self.inner
                            .stats
                            .read_requests_sent
                            .fetch_add(1, Ordering::Relaxed);
                        #[cfg(feature = "metrics")]
                        metrics::record_read_request();
                    }
                }
                Ok(())
            }
            FloodcastMessage::ReadRequest => {
                let values = self.inner.store.snapshot();
                #[cfg(feature = "metrics")]
                let snapshot_size = values.len();
                if self
                    .send_reply(sender, seq, FloodcastMessage::ReadReply { values })
                    .await
                {
                    self.inner
                        .stats
                        .read_replies_sent
                        .fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    {
                        metrics::record_read_reply();
                        metrics::record_snapshot_size(snapshot_size);
                    }
                }
                Ok(())
            }
            FloodcastMessage::ReadReply { values } => {
                let outcome = self.inner.store.merge(values);
                if outcome.added > 0 {
                    self.inner
                        .stats
                        .values_merged
                        .fetch_add(outcome.added as u64, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    {
                        metrics::record_values_merged(outcome.added);
                        metrics::set_values_stored(outcome.total);
                    }
                    tracing::debug!(
                        added = outcome.added,
                        total = outcome.total,
                        "merged snapshot from {:?}",
                        sender
                    );
                }
                Ok(())
            }
            FloodcastMessage::TopologyUpdate { topology } => {
                let neighbors = match topology
                    .into_iter()
                    .find(|(node, _)| *node == self.inner.local_id)
                {
                    Some((_, neighbors)) => neighbors,
                    None => {
                        tracing::debug!("topology update carries no entry for this node");
                        Vec::new()
                    }
                };
                tracing::info!(count = neighbors.len(), "topology update installed");
                self.set_neighbors(neighbors);
                self.send_reply(sender, seq, FloodcastMessage::TopologyOk)
                    .await;
                Ok(())
            }
            FloodcastMessage::SubmitOk | FloodcastMessage::TopologyOk => {
                tracing::trace!(?reply_to, "ack from {:?}", sender);
                Ok(())
            }
        }
    }

    /// Run the incoming payload processor.
    ///
    /// Drains payloads fed through [`FloodcastHandle::submit_incoming`] and
    /// runs the protocol step for each. Returns when the node shuts down or
    /// the incoming channel closes. Spawn this as a background task.
    pub async fn run_incoming_processor(&self) {
        while let Ok(payload) = self.inner.incoming_rx.recv().await {
            if self.inner.shutdown.load(Ordering::Acquire) {
                break;
            }
            if let Err(error) = self.handle_payload(&payload).await {
                tracing::debug!(%error, "inbound payload dropped");
            }
        }
    }

    /// Snapshot the protocol counters.
    pub fn stats(&self) -> StatsSnapshot {
        let stats = &self.inner.stats;
        StatsSnapshot {
            gossip_sent: stats.gossip_sent.load(Ordering::Relaxed),
            duplicates: stats.duplicates.load(Ordering::Relaxed),
            read_requests_sent: stats.read_requests_sent.load(Ordering::Relaxed),
            read_replies_sent: stats.read_replies_sent.load(Ordering::Relaxed),
            values_merged: stats.values_merged.load(Ordering::Relaxed),
            malformed: stats.malformed.load(Ordering::Relaxed),
            send_failures: stats.send_failures.load(Ordering::Relaxed),
            values_stored: self.inner.store.len(),
        }
    }

    /// Shut the node down.
    ///
    /// Closes both channels; pending `submit` and `handle_envelope` calls
    /// fail with [`Error::Shutdown`] from this point on.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.outgoing_tx.close();
        self.inner.incoming_tx.close();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Record a transport-level send failure observed by the driver.
    pub(crate) fn note_send_failure(&self) {
        self.inner.stats.send_failures.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::record_send_failure();
    }

    /// Store `value`; on first sight, queue gossip for every neighbor.
    async fn accept(&self, value: u64) -> InsertOutcome {
        let outcome = self.inner.store.insert(value);
        if outcome.added {
            #[cfg(feature = "metrics")]
            metrics::set_values_stored(outcome.total);
            self.fan_out(value, outcome.total as u64).await;
        } else {
            self.inner.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::record_duplicate();
        }
        outcome
    }

    /// Queue one gossip envelope per neighbor.
    ///
    /// `known` is the set size observed by the insert that triggered this
    /// fan-out, so the advertised count and the stored value are consistent
    /// even under concurrent inserts.
    async fn fan_out(&self, value: u64, known: u64) {
        let neighbors = self.inner.topology.neighbors();
        if neighbors.is_empty() {
            tracing::debug!("no neighbors configured, keeping value {} local", value);
            return;
        }
        for neighbor in neighbors {
            let envelope = self.next_envelope(FloodcastMessage::Gossip { value, known });
            if self
                .inner
                .outgoing_tx
                .send(Outbound {
                    target: neighbor.clone(),
                    envelope,
                })
                .await
                .is_err()
            {
                tracing::warn!("outgoing queue closed while gossiping to {:?}", neighbor);
                break;
            }
            self.inner.stats.gossip_sent.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::record_gossip_sent();
        }
    }

    /// Queue a reply correlated to `request_seq`. Returns whether it was
    /// accepted by the outgoing queue.
    async fn send_reply(&self, target: I, request_seq: u64, message: FloodcastMessage<I>) -> bool {
        let kind = message.type_name();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope::reply(self.inner.local_id.clone(), seq, request_seq, message);
        if self
            .inner
            .outgoing_tx
            .send(Outbound {
                target: target.clone(),
                envelope,
            })
            .await
            .is_err()
        {
            tracing::warn!("outgoing queue closed while replying {} to {:?}", kind, target);
            false
        } else {
            true
        }
    }

    fn next_envelope(&self, message: FloodcastMessage<I>) -> Envelope<I> {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        Envelope::new(self.inner.local_id.clone(), seq, message)
    }
}

impl<I> Clone for Floodcast<I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Handle for wiring a [`Floodcast`] node to the network layer.
///
/// Provides channels for draining outgoing envelopes and feeding in raw
/// received payloads. Clones share the same queues, so one clone can be
/// given to a runner while another keeps submitting payloads.
#[derive(Clone)]
pub struct FloodcastHandle<I> {
    /// Channel for receiving outgoing envelopes to send.
    outgoing_rx: Receiver<Outbound<I>>,
    /// Channel for draining submitted payloads (for custom pipelines).
    incoming_rx: Receiver<Bytes>,
    /// Channel for submitting received payloads.
    incoming_tx: Sender<Bytes>,
}

impl<I> FloodcastHandle<I> {
    /// Get the next outgoing envelope to send.
    ///
    /// Returns `None` once the node has shut down and the queue is drained.
    pub async fn next_outgoing(&self) -> Option<Outbound<I>> {
        self.outgoing_rx.recv().await.ok()
    }

    /// Submit a raw received payload for processing.
    pub async fn submit_incoming(&self, payload: Bytes) -> Result<()> {
        self.incoming_tx
            .send(payload)
            .await
            .map_err(|e| Error::Channel(e.to_string()))
    }

    /// Get a stream of outgoing envelopes.
    pub fn outgoing_stream(&self) -> impl futures::Stream<Item = Outbound<I>> + '_ {
        self.outgoing_rx.clone()
    }

    /// Get the next submitted payload.
    ///
    /// Use this instead of [`Floodcast::run_incoming_processor`] when
    /// processing payloads through a custom pipeline.
    pub async fn next_incoming(&self) -> Option<Bytes> {
        self.incoming_rx.recv().await.ok()
    }

    /// Check if the handle is closed.
    pub fn is_closed(&self) -> bool {
        self.outgoing_rx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, neighbors: &[&str]) -> (Floodcast<String>, FloodcastHandle<String>) {
        let (floodcast, handle) = Floodcast::new(id.to_string(), FloodcastConfig::default());
        floodcast.set_neighbors(neighbors.iter().map(|n| n.to_string()).collect());
        (floodcast, handle)
    }

    async fn drain(handle: &FloodcastHandle<String>, n: usize) -> Vec<Outbound<String>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(handle.next_outgoing().await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_submit_gossips_to_all_neighbors() {
        let (floodcast, handle) = node("n1", &["n2", "n3"]);

        assert!(floodcast.submit(7).await.unwrap());
        assert!(floodcast.contains(7));

        let sent = drain(&handle, 2).await;
        let targets: Vec<_> = sent.iter().map(|o| o.target.clone()).collect();
        assert_eq!(targets, vec!["n2".to_string(), "n3".to_string()]);

        for outbound in &sent {
            assert_eq!(outbound.envelope.sender, "n1");
            assert!(!outbound.envelope.is_reply());
            assert_eq!(
                outbound.envelope.message,
                FloodcastMessage::Gossip { value: 7, known: 1 }
            );
        }
        // Each neighbor gets its own envelope with a fresh sequence number.
        assert_ne!(sent[0].envelope.seq, sent[1].envelope.seq);
        assert_eq!(floodcast.stats().gossip_sent, 2);
    }

    #[tokio::test]
    async fn test_duplicate_submit_is_suppressed() {
        let (floodcast, _handle) = node("n1", &["n2", "n3"]);

        assert!(floodcast.submit(7).await.unwrap());
        assert!(!floodcast.submit(7).await.unwrap());

        let stats = floodcast.stats();
        assert_eq!(stats.gossip_sent, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.values_stored, 1);
    }

    #[tokio::test]
    async fn test_submit_before_topology_stores_without_fanout() {
        let (floodcast, handle) = Floodcast::new("n1".to_string(), FloodcastConfig::default());

        // No neighbors yet: the value is kept locally and nothing goes out.
        assert!(floodcast.submit(7).await.unwrap());
        assert!(floodcast.contains(7));
        assert_eq!(floodcast.stats().gossip_sent, 0);

        // Once a topology arrives, later submissions gossip as usual.
        floodcast.set_neighbors(vec!["n2".to_string()]);
        assert!(floodcast.submit(8).await.unwrap());

        let sent = drain(&handle, 1).await;
        assert_eq!(sent[0].target, "n2");
        assert_eq!(
            sent[0].envelope.message,
            FloodcastMessage::Gossip { value: 8, known: 2 }
        );
    }

    #[tokio::test]
    async fn test_gossip_is_forwarded_to_every_neighbor_including_sender() {
        let (floodcast, handle) = node("n1", &["n2", "n3"]);

        floodcast
            .handle_envelope(Envelope::new(
                "n2".to_string(),
                1,
                FloodcastMessage::Gossip { value: 9, known: 1 },
            ))
            .await
            .unwrap();

        assert!(floodcast.contains(9));

        // No sender exclusion: the echo back to n2 is absorbed by its dedup.
        let sent = drain(&handle, 2).await;
        let targets: Vec<_> = sent.iter().map(|o| o.target.clone()).collect();
        assert_eq!(targets, vec!["n2".to_string(), "n3".to_string()]);
        assert_eq!(floodcast.stats().read_requests_sent, 0);
    }

    #[tokio::test]
    async fn test_duplicate_gossip_is_not_reforwarded() {
        let (floodcast, handle) = node("n1", &["n2"]);

        let gossip = FloodcastMessage::Gossip { value: 9, known: 1 };
        floodcast
            .handle_envelope(Envelope::new("n2".to_string(), 1, gossip.clone()))
            .await
            .unwrap();
        floodcast
            .handle_envelope(Envelope::new("n2".to_string(), 2, gossip))
            .await
            .unwrap();

        drain(&handle, 1).await;
        let stats = floodcast.stats();
        assert_eq!(stats.gossip_sent, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[tokio::test]
    async fn test_behind_receiver_requests_snapshot() {
        let (floodcast, handle) = node("n1", &["n2"]);

        // n2 advertises 3 known values; we only reach 1 after this insert.
        floodcast
            .handle_envelope(Envelope::new(
                "n2".to_string(),
                5,
                FloodcastMessage::Gossip { value: 5, known: 3 },
            ))
            .await
            .unwrap();

        let sent = drain(&handle, 2).await;
        assert!(sent[0].envelope.message.is_gossip());
        assert_eq!(sent[1].target, "n2");
        assert_eq!(sent[1].envelope.message, FloodcastMessage::ReadRequest);
        assert!(!sent[1].envelope.is_reply());
        assert_eq!(floodcast.stats().read_requests_sent, 1);
    }

    #[tokio::test]
    async fn test_behind_sender_is_not_repaired_from_here() {
        let (floodcast, handle) = Floodcast::new("n1".to_string(), FloodcastConfig::default());

        // Seed while unconfigured so nothing is queued.
        for value in [1, 2, 3] {
            floodcast.submit(value).await.unwrap();
        }
        floodcast.set_neighbors(vec!["n2".to_string()]);

        // n2 is behind (knows 1, we now hold 4). Our forwarded gossip
        // carries known=4, which is what makes n2 pull from us; nothing
        // to request from our side.
        floodcast
            .handle_envelope(Envelope::new(
                "n2".to_string(),
                1,
                FloodcastMessage::Gossip { value: 9, known: 1 },
            ))
            .await
            .unwrap();

        let sent = drain(&handle, 1).await;
        assert_eq!(
            sent[0].envelope.message,
            FloodcastMessage::Gossip { value: 9, known: 4 }
        );
        assert_eq!(floodcast.stats().read_requests_sent, 0);
    }

    #[tokio::test]
    async fn test_read_request_serves_full_snapshot() {
        let (floodcast, handle) = Floodcast::new("n1".to_string(), FloodcastConfig::default());
        floodcast.submit(1).await.unwrap();
        floodcast.submit(2).await.unwrap();

        floodcast
            .handle_envelope(Envelope::new(
                "n2".to_string(),
                41,
                FloodcastMessage::ReadRequest,
            ))
            .await
            .unwrap();

        let sent = drain(&handle, 1).await;
        assert_eq!(sent[0].target, "n2");
        assert_eq!(sent[0].envelope.reply_to, Some(41));
        match &sent[0].envelope.message {
            FloodcastMessage::ReadReply { values } => {
                let mut values = values.clone();
                values.sort_unstable();
                assert_eq!(values, vec![1, 2]);
            }
            other => panic!("expected ReadReply, got {:?}", other),
        }
        assert_eq!(floodcast.stats().read_replies_sent, 1);
    }

    #[tokio::test]
    async fn test_read_reply_merges_without_regossip() {
        let (floodcast, _handle) = node("n1", &["n2", "n3"]);
        floodcast.submit(1).await.unwrap();

        floodcast
            .handle_envelope(Envelope::reply(
                "n2".to_string(),
                9,
                3,
                FloodcastMessage::ReadReply {
                    values: vec![1, 5, 9],
                },
            ))
            .await
            .unwrap();

        let mut values = floodcast.values();
        values.sort_unstable();
        assert_eq!(values, vec![1, 5, 9]);

        // Merged values ride on future count mismatches, they are not
        // themselves flooded.
        let stats = floodcast.stats();
        assert_eq!(stats.gossip_sent, 2);
        assert_eq!(stats.values_merged, 2);
    }

    #[tokio::test]
    async fn test_submit_envelope_is_stored_and_acked() {
        let (floodcast, handle) = Floodcast::new("n1".to_string(), FloodcastConfig::default());

        floodcast
            .handle_envelope(Envelope::new(
                "c1".to_string(),
                7,
                FloodcastMessage::Submit { value: 11 },
            ))
            .await
            .unwrap();

        assert!(floodcast.contains(11));
        let sent = drain(&handle, 1).await;
        assert_eq!(sent[0].target, "c1");
        assert_eq!(sent[0].envelope.message, FloodcastMessage::SubmitOk);
        assert_eq!(sent[0].envelope.reply_to, Some(7));
    }

    #[tokio::test]
    async fn test_topology_update_installs_own_row() {
        let (floodcast, handle) = Floodcast::new("n1".to_string(), FloodcastConfig::default());

        floodcast
            .handle_envelope(Envelope::new(
                "ctl".to_string(),
                3,
                FloodcastMessage::TopologyUpdate {
                    topology: vec![
                        ("n1".to_string(), vec!["n2".to_string(), "n3".to_string()]),
                        ("n2".to_string(), vec!["n1".to_string()]),
                    ],
                },
            ))
            .await
            .unwrap();

        let neighbors: Vec<_> = floodcast.neighbors().into_iter().collect();
        assert_eq!(neighbors, vec!["n2".to_string(), "n3".to_string()]);

        let sent = drain(&handle, 1).await;
        assert_eq!(sent[0].target, "ctl");
        assert_eq!(sent[0].envelope.message, FloodcastMessage::TopologyOk);
        assert_eq!(sent[0].envelope.reply_to, Some(3));
    }

    #[tokio::test]
    async fn test_topology_update_without_own_row_clears_neighbors() {
        let (floodcast, handle) = node("n1", &["n2"]);

        floodcast
            .handle_envelope(Envelope::new(
                "ctl".to_string(),
                4,
                FloodcastMessage::TopologyUpdate {
                    topology: vec![("n9".to_string(), vec!["n1".to_string()])],
                },
            ))
            .await
            .unwrap();

        assert!(floodcast.neighbors().is_empty());
        let sent = drain(&handle, 1).await;
        assert_eq!(sent[0].envelope.message, FloodcastMessage::TopologyOk);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_counted_and_leaves_state_alone() {
        let (floodcast, _handle) = node("n1", &["n2"]);

        let mut garbage = b"FLC".to_vec();
        garbage.extend_from_slice(&[0xFF; 4]);
        assert!(matches!(
            floodcast.handle_payload(&garbage).await,
            Err(Error::Decode(_))
        ));

        // Foreign traffic is skipped silently, not an error.
        floodcast.handle_payload(b"other protocol").await.unwrap();

        let stats = floodcast.stats();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.values_stored, 0);
        assert_eq!(stats.gossip_sent, 0);
    }

    #[tokio::test]
    async fn test_wire_roundtrip_through_handle_payload() {
        let (floodcast, handle) = node("n1", &["n2"]);

        let envelope = Envelope::new(
            "n2".to_string(),
            0,
            FloodcastMessage::Gossip { value: 3, known: 1 },
        );
        floodcast
            .handle_payload(&envelope.encode_to_bytes())
            .await
            .unwrap();

        assert!(floodcast.contains(3));
        let sent = drain(&handle, 1).await;
        assert!(sent[0].envelope.message.is_gossip());
    }

    #[tokio::test]
    async fn test_acks_are_ignored() {
        let (floodcast, _handle) = node("n1", &["n2"]);

        floodcast
            .handle_envelope(Envelope::reply(
                "n2".to_string(),
                1,
                0,
                FloodcastMessage::SubmitOk,
            ))
            .await
            .unwrap();
        floodcast
            .handle_envelope(Envelope::reply(
                "n2".to_string(),
                2,
                0,
                FloodcastMessage::TopologyOk,
            ))
            .await
            .unwrap();

        assert_eq!(floodcast.stats(), StatsSnapshot::default());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_further_work() {
        let (floodcast, handle) = node("n1", &["n2"]);
        floodcast.submit(1).await.unwrap();
        drain(&handle, 1).await;

        floodcast.shutdown();
        assert!(floodcast.is_shutdown());

        assert!(matches!(floodcast.submit(2).await, Err(Error::Shutdown)));
        assert!(matches!(
            floodcast
                .handle_envelope(Envelope::new(
                    "n2".to_string(),
                    1,
                    FloodcastMessage::ReadRequest,
                ))
                .await,
            Err(Error::Shutdown)
        ));
        assert!(handle.next_outgoing().await.is_none());
    }

    #[tokio::test]
    async fn test_incoming_processor_drives_protocol() {
        let (floodcast, handle) = node("n1", &["n2"]);

        let worker = floodcast.clone();
        let task = tokio::spawn(async move { worker.run_incoming_processor().await });

        let envelope = Envelope::new(
            "n2".to_string(),
            0,
            FloodcastMessage::Gossip { value: 8, known: 1 },
        );
        handle
            .submit_incoming(envelope.encode_to_bytes())
            .await
            .unwrap();

        let sent = handle.next_outgoing().await.unwrap();
        assert!(sent.envelope.message.is_gossip());
        assert!(floodcast.contains(8));

        floodcast.shutdown();
        task.await.unwrap();
    }
}
