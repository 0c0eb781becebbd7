//! Metrics for the floodcast protocol.
//!
//! Provides counters and gauges for monitoring dissemination and repair.
//!
//! ## Available Metrics
//!
//! ### Counters
//! - `floodcast_submits_total` - Total values submitted by the local application
//! - `floodcast_gossip_sent_total` - Total Gossip envelopes queued for sending
//! - `floodcast_messages_duplicate_total` - Total values received that were already present
//! - `floodcast_read_requests_sent_total` - Total snapshot pulls issued after a count mismatch
//! - `floodcast_read_replies_sent_total` - Total snapshot replies served to peers
//! - `floodcast_values_merged_total` - Total values learned from merged snapshots
//! - `floodcast_messages_malformed_total` - Total inbound payloads rejected as malformed
//! - `floodcast_send_failures_total` - Total transport sends that reported failure
//!
//! ### Histograms
//! - `floodcast_snapshot_size` - Number of values in served snapshot replies
//!
//! ### Gauges
//! - `floodcast_values_stored` - Current size of the value set
//! - `floodcast_neighbor_count` - Current number of configured neighbors

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize metric descriptions.
///
/// Call this once at application startup to register all metric descriptions.
/// This makes metrics more discoverable in monitoring systems.
pub fn init_metrics() {
    // Counters
    describe_counter!(
        "floodcast_submits_total",
        "Total number of values submitted by the local application"
    );
    describe_counter!(
        "floodcast_gossip_sent_total",
        "Total number of Gossip envelopes queued for sending"
    );
    describe_counter!(
        "floodcast_messages_duplicate_total",
        "Total number of values received that were already present"
    );
    describe_counter!(
        "floodcast_read_requests_sent_total",
        "Total number of snapshot pulls issued after a count mismatch"
    );
    describe_counter!(
        "floodcast_read_replies_sent_total",
        "Total number of snapshot replies served to peers"
    );
    describe_counter!(
        "floodcast_values_merged_total",
        "Total number of values learned from merged snapshots"
    );
    describe_counter!(
        "floodcast_messages_malformed_total",
        "Total number of inbound payloads rejected as malformed"
    );
    describe_counter!(
        "floodcast_send_failures_total",
        "Total number of transport sends that reported failure"
    );

    // Histograms
    describe_histogram!(
        "floodcast_snapshot_size",
        "Number of values in served snapshot replies"
    );

    // Gauges
    describe_gauge!("floodcast_values_stored", "Current size of the value set");
    describe_gauge!(
        "floodcast_neighbor_count",
        "Current number of configured neighbors"
    );
}

/// Record a locally submitted value.
pub fn record_submit() {
    counter!("floodcast_submits_total").increment(1);
}

/// Record a Gossip envelope queued for sending.
pub fn record_gossip_sent() {
    counter!("floodcast_gossip_sent_total").increment(1);
}

/// Record a duplicate value.
pub fn record_duplicate() {
    counter!("floodcast_messages_duplicate_total").increment(1);
}

/// Record a snapshot pull issued after a count mismatch.
pub fn record_read_request() {
    counter!("floodcast_read_requests_sent_total").increment(1);
}

/// Record a snapshot reply served to a peer.
pub fn record_read_reply() {
    counter!("floodcast_read_replies_sent_total").increment(1);
}

/// Record values learned from a merged snapshot.
pub fn record_values_merged(count: usize) {
    counter!("floodcast_values_merged_total").increment(count as u64);
}

/// Record a malformed inbound payload.
pub fn record_malformed() {
    counter!("floodcast_messages_malformed_total").increment(1);
}

/// Record a transport send failure.
pub fn record_send_failure() {
    counter!("floodcast_send_failures_total").increment(1);
}

/// Record the size of a served snapshot reply.
pub fn record_snapshot_size(size: usize) {
    histogram!("floodcast_snapshot_size").record(size as f64);
}

/// Update the value set size gauge.
pub fn set_values_stored(count: usize) {
    gauge!("floodcast_values_stored").set(count as f64);
}

/// Update the neighbor count gauge.
pub fn set_neighbor_count(count: usize) {
    gauge!("floodcast_neighbor_count").set(count as f64);
}
