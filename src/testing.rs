//! Chaos testing utilities for the floodcast protocol.
//!
//! This module provides tools for injecting failures and testing that
//! dissemination plus read repair really converges under adverse
//! conditions.
//!
//! ## Features
//!
//! - **Message Loss**: Randomly drop envelopes with configurable probability
//! - **Network Partitions**: Block links between node pairs or groups
//! - **Latency Injection**: Add artificial delays to envelope delivery
//!
//! ## Example
//!
//! ```ignore
//! use floodcast::testing::{ChaosController, ChaosConfig, ChaosTransport};
//!
//! let controller = ChaosController::with_config(
//!     ChaosConfig::new().with_message_loss_rate(0.1), // 10% loss
//! );
//!
//! let transport = ChaosTransport::new(base_transport, local_id, controller.clone());
//! ```

use std::{
    collections::HashSet,
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use futures_timer::Delay;
use parking_lot::RwLock;
use rand::Rng;

use crate::transport::Transport;

/// Configuration for chaos testing.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Probability of dropping an envelope (0.0 to 1.0).
    pub message_loss_rate: f64,

    /// Additional latency to add to all envelopes.
    pub base_latency: Duration,

    /// Random jitter added to latency (0 to this value).
    pub latency_jitter: Duration,

    /// Whether to enable chaos testing.
    pub enabled: bool,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            message_loss_rate: 0.0,
            base_latency: Duration::ZERO,
            latency_jitter: Duration::ZERO,
            enabled: false,
        }
    }
}

impl ChaosConfig {
    /// Create a new chaos configuration with defaults (no chaos).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chaos configuration for moderate failure testing.
    ///
    /// - 5% message loss
    /// - 5ms base latency with 10ms jitter
    pub fn moderate() -> Self {
        Self {
            message_loss_rate: 0.05,
            base_latency: Duration::from_millis(5),
            latency_jitter: Duration::from_millis(10),
            enabled: true,
        }
    }

    /// Create a chaos configuration for aggressive failure testing.
    ///
    /// - 25% message loss
    /// - 10ms base latency with 30ms jitter
    pub fn aggressive() -> Self {
        Self {
            message_loss_rate: 0.25,
            base_latency: Duration::from_millis(10),
            latency_jitter: Duration::from_millis(30),
            enabled: true,
        }
    }

    /// Set the message loss rate (0.0 to 1.0).
    pub fn with_message_loss_rate(mut self, rate: f64) -> Self {
        self.message_loss_rate = rate.clamp(0.0, 1.0);
        self.enabled = true;
        self
    }

    /// Set the base latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.base_latency = latency;
        self.enabled = true;
        self
    }

    /// Set the latency jitter (random additional delay).
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.latency_jitter = jitter;
        self.enabled = true;
        self
    }

    /// Enable or disable chaos testing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check if an envelope should be dropped based on loss rate.
    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.message_loss_rate == 0.0 {
            return false;
        }
        rand::rng().random::<f64>() < self.message_loss_rate
    }

    /// Get the latency to apply to an envelope (base + random jitter).
    pub fn get_latency(&self) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let jitter = if self.latency_jitter > Duration::ZERO {
            let jitter_ms = rand::rng().random_range(0..=self.latency_jitter.as_millis() as u64);
            Duration::from_millis(jitter_ms)
        } else {
            Duration::ZERO
        };
        self.base_latency + jitter
    }
}

/// Network partition simulator.
///
/// Blocks artificial links between node pairs; a blocked link behaves
/// like a network that drops every envelope on it.
#[derive(Debug)]
pub struct NetworkPartition<I> {
    /// Pairs of nodes that cannot communicate.
    partitioned: RwLock<HashSet<(I, I)>>,
    /// Whether any partition is active.
    active: AtomicBool,
}

impl<I: Clone + Eq + Hash> NetworkPartition<I> {
    /// Create a new network partition controller.
    pub fn new() -> Self {
        Self {
            partitioned: RwLock::new(HashSet::new()),
            active: AtomicBool::new(false),
        }
    }

    /// Create a partition between two nodes (bidirectional).
    pub fn partition(&self, node_a: I, node_b: I) {
        let mut partitioned = self.partitioned.write();
        partitioned.insert((node_a.clone(), node_b.clone()));
        partitioned.insert((node_b, node_a));
        self.active.store(true, Ordering::Release);
    }

    /// Heal a partition between two nodes.
    pub fn heal(&self, node_a: &I, node_b: &I) {
        let mut partitioned = self.partitioned.write();
        partitioned.remove(&(node_a.clone(), node_b.clone()));
        partitioned.remove(&(node_b.clone(), node_a.clone()));
        if partitioned.is_empty() {
            self.active.store(false, Ordering::Release);
        }
    }

    /// Heal all partitions.
    pub fn heal_all(&self) {
        let mut partitioned = self.partitioned.write();
        partitioned.clear();
        self.active.store(false, Ordering::Release);
    }

    /// Check if two nodes are partitioned.
    pub fn is_partitioned(&self, from: &I, to: &I) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        let partitioned = self.partitioned.read();
        partitioned.contains(&(from.clone(), to.clone()))
    }

    /// Create a partition isolating one node from all others.
    pub fn isolate(&self, node: I, others: impl IntoIterator<Item = I>) {
        for other in others {
            self.partition(node.clone(), other);
        }
    }

    /// Split the network into two groups that cannot reach each other.
    ///
    /// Nodes within a group keep communicating; every cross-group link
    /// is blocked.
    pub fn split(&self, group_a: &[I], group_b: &[I]) {
        for a in group_a {
            for b in group_b {
                self.partition(a.clone(), b.clone());
            }
        }
    }
}

impl<I: Clone + Eq + Hash> Default for NetworkPartition<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics collected during chaos testing.
#[derive(Debug, Default)]
pub struct ChaosStats {
    /// Total envelopes processed.
    pub messages_total: AtomicU64,
    /// Envelopes dropped due to configured loss rate.
    pub messages_dropped: AtomicU64,
    /// Envelopes blocked due to partition.
    pub messages_partitioned: AtomicU64,
    /// Envelopes delayed.
    pub messages_delayed: AtomicU64,
}

impl ChaosStats {
    /// Create new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an envelope being processed.
    pub fn record_message(&self) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an envelope being dropped.
    pub fn record_drop(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an envelope blocked by partition.
    pub fn record_partition_block(&self) {
        self.messages_partitioned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an envelope being delayed.
    pub fn record_delay(&self) {
        self.messages_delayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the drop rate (dropped / total).
    pub fn drop_rate(&self) -> f64 {
        let total = self.messages_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.messages_dropped.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Get a snapshot of stats.
    pub fn snapshot(&self) -> ChaosStatsSnapshot {
        ChaosStatsSnapshot {
            messages_total: self.messages_total.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_partitioned: self.messages_partitioned.load(Ordering::Relaxed),
            messages_delayed: self.messages_delayed.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.messages_total.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.messages_partitioned.store(0, Ordering::Relaxed);
        self.messages_delayed.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of chaos statistics at a point in time.
#[derive(Debug, Clone)]
pub struct ChaosStatsSnapshot {
    /// Total envelopes processed.
    pub messages_total: u64,
    /// Envelopes dropped.
    pub messages_dropped: u64,
    /// Envelopes blocked by partition.
    pub messages_partitioned: u64,
    /// Envelopes delayed.
    pub messages_delayed: u64,
}

impl ChaosStatsSnapshot {
    /// Get the effective delivery rate (1.0 - drop rate - partition rate).
    pub fn delivery_rate(&self) -> f64 {
        if self.messages_total == 0 {
            return 1.0;
        }
        let failed = self.messages_dropped + self.messages_partitioned;
        1.0 - (failed as f64 / self.messages_total as f64)
    }
}

/// Controller for chaos testing a floodcast cluster.
///
/// Cheap to clone; clones share configuration, partitions, and stats, so
/// a test can hold one clone while each node's [`ChaosTransport`] holds
/// another.
#[derive(Debug)]
pub struct ChaosController<I> {
    /// Chaos configuration.
    pub config: Arc<RwLock<ChaosConfig>>,
    /// Network partition controller.
    pub partition: Arc<NetworkPartition<I>>,
    /// Statistics.
    pub stats: Arc<ChaosStats>,
}

impl<I: Clone + Eq + Hash> ChaosController<I> {
    /// Create a new chaos controller with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(ChaosConfig::default())),
            partition: Arc::new(NetworkPartition::new()),
            stats: Arc::new(ChaosStats::new()),
        }
    }

    /// Create a chaos controller with specific configuration.
    pub fn with_config(config: ChaosConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            partition: Arc::new(NetworkPartition::new()),
            stats: Arc::new(ChaosStats::new()),
        }
    }

    /// Update the chaos configuration.
    pub fn set_config(&self, config: ChaosConfig) {
        *self.config.write() = config;
    }

    /// Enable chaos testing with moderate settings.
    pub fn enable_moderate(&self) {
        self.set_config(ChaosConfig::moderate());
    }

    /// Enable chaos testing with aggressive settings.
    pub fn enable_aggressive(&self) {
        self.set_config(ChaosConfig::aggressive());
    }

    /// Disable all chaos testing.
    pub fn disable(&self) {
        self.set_config(ChaosConfig::default());
        self.partition.heal_all();
    }

    /// Check if an envelope from `from` to `to` should be delivered.
    ///
    /// Returns `Some(latency)` if it should be delivered (possibly delayed),
    /// or `None` if it should be dropped.
    pub fn should_deliver(&self, from: &I, to: &I) -> Option<Duration> {
        self.stats.record_message();

        // Check partition first
        if self.partition.is_partitioned(from, to) {
            self.stats.record_partition_block();
            return None;
        }

        let config = self.config.read();

        // Check random drop
        if config.should_drop() {
            self.stats.record_drop();
            return None;
        }

        let latency = config.get_latency();
        if latency > Duration::ZERO {
            self.stats.record_delay();
        }

        Some(latency)
    }

    /// Get current statistics.
    pub fn stats(&self) -> ChaosStatsSnapshot {
        self.stats.snapshot()
    }

    /// Reset statistics.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl<I: Clone + Eq + Hash> Default for ChaosController<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Clone + Eq + Hash> Clone for ChaosController<I> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            partition: self.partition.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// A [`Transport`] wrapper that injects loss, partitions, and latency.
///
/// Dropped envelopes report success to the sender, the way real
/// best-effort networks lose traffic without telling anyone. The wrapped
/// transport only sees envelopes the chaos controller lets through.
#[derive(Debug)]
pub struct ChaosTransport<I, T> {
    inner: T,
    local_id: I,
    controller: ChaosController<I>,
}

impl<I: Clone + Eq + Hash, T: Clone> Clone for ChaosTransport<I, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            local_id: self.local_id.clone(),
            controller: self.controller.clone(),
        }
    }
}

impl<I: Clone + Eq + Hash, T> ChaosTransport<I, T> {
    /// Wrap `inner`, filtering sends from `local_id` through `controller`.
    pub fn new(inner: T, local_id: I, controller: ChaosController<I>) -> Self {
        Self {
            inner,
            local_id,
            controller,
        }
    }

    /// Get the chaos controller.
    pub fn controller(&self) -> &ChaosController<I> {
        &self.controller
    }
}

impl<I, T> Transport<I> for ChaosTransport<I, T>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Transport<I>,
{
    type Error = T::Error;

    async fn send_to(&self, target: &I, data: Bytes) -> Result<(), Self::Error> {
        match self.controller.should_deliver(&self.local_id, target) {
            Some(latency) => {
                if latency > Duration::ZERO {
                    Delay::new(latency).await;
                }
                self.inner.send_to(target, data).await
            }
            // Lost on the wire: the sender never learns.
            None => Ok(()),
        }
    }
}

/// Wait for a condition to become true, with timeout.
///
/// This is useful for tests that need to wait for asynchronous conditions
/// without using fixed sleeps which can be flaky in CI environments.
///
/// # Arguments
///
/// * `condition` - A closure that returns `true` when the condition is met
/// * `timeout` - Maximum time to wait for the condition
/// * `poll_interval` - How often to check the condition
///
/// # Returns
///
/// `Ok(())` if the condition was met, `Err(message)` if timeout occurred.
///
/// # Example
///
/// ```ignore
/// use floodcast::testing::wait_for;
/// use std::time::Duration;
///
/// wait_for(
///     || node.len() >= 5,
///     Duration::from_secs(1),
///     Duration::from_millis(10),
/// ).expect("node should hold 5 values");
/// ```
pub fn wait_for<F>(
    mut condition: F,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), String>
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            return Err(format!("Timeout after {:?} waiting for condition", timeout));
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Wait for a condition with default poll interval (10ms).
///
/// Convenience wrapper around [`wait_for`] with a sensible default poll interval.
pub fn wait_for_condition<F>(condition: F, timeout: Duration) -> Result<(), String>
where
    F: FnMut() -> bool,
{
    wait_for(condition, timeout, Duration::from_millis(10))
}

/// Assert that a condition becomes true within a timeout.
///
/// This macro provides a convenient way to assert conditions that may take
/// time to become true, without using flaky fixed sleeps.
///
/// # Example
///
/// ```ignore
/// use floodcast::assert_eventually;
///
/// assert_eventually!(
///     node.contains(42),
///     timeout = Duration::from_secs(1),
///     "gossip should reach the node"
/// );
/// ```
#[macro_export]
macro_rules! assert_eventually {
    ($condition:expr, timeout = $timeout:expr) => {
        $crate::testing::wait_for_condition(|| $condition, $timeout)
            .expect(concat!("Condition not met: ", stringify!($condition)));
    };
    ($condition:expr, timeout = $timeout:expr, $msg:expr) => {
        $crate::testing::wait_for_condition(|| $condition, $timeout).expect($msg);
    };
    ($condition:expr, timeout = $timeout:expr, poll = $poll:expr) => {
        $crate::testing::wait_for(|| $condition, $timeout, $poll)
            .expect(concat!("Condition not met: ", stringify!($condition)));
    };
    ($condition:expr, timeout = $timeout:expr, poll = $poll:expr, $msg:expr) => {
        $crate::testing::wait_for(|| $condition, $timeout, $poll).expect($msg);
    };
}
