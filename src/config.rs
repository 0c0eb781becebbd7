//! Configuration for the floodcast protocol.

/// Configuration options for a floodcast node.
///
/// The protocol itself has no tunable timers or fanout limits: every new
/// value is gossiped to every configured neighbor exactly once, and repair
/// is driven entirely by count mismatches on inbound gossip. What remains
/// configurable is the sizing of the queues between the protocol core and
/// the transport pump.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FloodcastConfig {
    /// Capacity of the inbound payload queue.
    ///
    /// Raw payloads handed over by the messaging substrate wait here until
    /// the incoming processor dispatches them. When the queue is full the
    /// submitting side observes backpressure (or drops, if it elects to
    /// `try_send`).
    ///
    /// Default: 1024
    pub incoming_queue_capacity: usize,

    /// Capacity of the outbound envelope queue.
    ///
    /// Gossip fan-out, repair requests, and replies are staged here until
    /// the runner pushes them through the transport. A full queue applies
    /// backpressure to the handler that is fanning out.
    ///
    /// Default: 1024
    pub outgoing_queue_capacity: usize,
}

impl Default for FloodcastConfig {
    fn default() -> Self {
        Self {
            incoming_queue_capacity: 1024,
            outgoing_queue_capacity: 1024,
        }
    }
}

impl FloodcastConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with small queues for memory-constrained or
    /// single-purpose embeddings (test harnesses, sidecar processes).
    pub const fn compact() -> Self {
        Self {
            incoming_queue_capacity: 64,
            outgoing_queue_capacity: 64,
        }
    }

    /// Set the inbound queue capacity (builder pattern).
    pub const fn with_incoming_queue_capacity(mut self, capacity: usize) -> Self {
        self.incoming_queue_capacity = capacity;
        self
    }

    /// Set the outbound queue capacity (builder pattern).
    pub const fn with_outgoing_queue_capacity(mut self, capacity: usize) -> Self {
        self.outgoing_queue_capacity = capacity;
        self
    }
}
