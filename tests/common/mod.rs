//! Shared harness for multi-node floodcast tests.
//!
//! Builds clusters of runner-driven nodes wired through an in-memory
//! routing transport, with wait helpers for convergence assertions.

// Each test binary uses its own subset of the harness.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use floodcast::testing::{ChaosController, ChaosTransport};
use floodcast::{
    DecodeResult, Envelope, Floodcast, FloodcastConfig, FloodcastHandle, FloodcastRunner,
    Transport,
};
use parking_lot::RwLock;

/// Error returned by [`RouterTransport`] for unroutable targets or
/// closed inbound queues.
#[derive(Debug)]
pub struct RouterError(pub String);

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RouterError {}

/// Shared routing table mapping node ids to their inbound payload queues.
pub type RoutingTable = Arc<RwLock<HashMap<String, FloodcastHandle<String>>>>;

/// In-memory transport delivering payload bytes straight into the
/// target node's inbound queue.
#[derive(Clone)]
pub struct RouterTransport {
    routes: RoutingTable,
}

impl RouterTransport {
    pub fn new(routes: RoutingTable) -> Self {
        Self { routes }
    }
}

impl Transport<String> for RouterTransport {
    type Error = RouterError;

    async fn send_to(&self, target: &String, data: Bytes) -> Result<(), Self::Error> {
        let handle = self.routes.read().get(target).cloned();
        match handle {
            Some(handle) => handle
                .submit_incoming(data)
                .await
                .map_err(|e| RouterError(e.to_string())),
            None => Err(RouterError(format!("no route to {}", target))),
        }
    }
}

/// A cluster node with its runner task already spawned.
pub struct TestNode {
    /// Node id (`n1`, `n2`, ...).
    pub id: String,
    /// The protocol instance.
    pub node: Floodcast<String>,
}

/// A multi-node cluster wired through a [`RouterTransport`].
pub struct TestCluster {
    /// Nodes in creation order: `n1..nN`.
    pub nodes: Vec<TestNode>,
    /// Shared routing table.
    pub routes: RoutingTable,
}

impl TestCluster {
    /// Create `count` nodes named `n1..n{count}` with runners spawned
    /// and no topology configured yet.
    pub fn new(count: usize) -> Self {
        Self::with_config(count, FloodcastConfig::default())
    }

    /// Create a cluster with a specific node configuration.
    pub fn with_config(count: usize, config: FloodcastConfig) -> Self {
        let routes: RoutingTable = Arc::new(RwLock::new(HashMap::new()));
        let nodes = (1..=count)
            .map(|i| {
                let id = format!("n{}", i);
                let transport = RouterTransport::new(routes.clone());
                spawn_node(id, config.clone(), &routes, transport)
            })
            .collect();
        Self { nodes, routes }
    }

    /// Create a cluster whose transports all route through one shared
    /// chaos controller.
    pub fn with_chaos(count: usize, controller: &ChaosController<String>) -> Self {
        let routes: RoutingTable = Arc::new(RwLock::new(HashMap::new()));
        let nodes = (1..=count)
            .map(|i| {
                let id = format!("n{}", i);
                let transport = ChaosTransport::new(
                    RouterTransport::new(routes.clone()),
                    id.clone(),
                    controller.clone(),
                );
                spawn_node(id, FloodcastConfig::default(), &routes, transport)
            })
            .collect();
        Self { nodes, routes }
    }

    /// Get a node's protocol instance by id.
    pub fn node(&self, id: &str) -> &Floodcast<String> {
        &self
            .nodes
            .iter()
            .find(|n| n.id == id)
            .unwrap_or_else(|| panic!("unknown node {}", id))
            .node
    }

    /// Install a chain topology: n1 <-> n2 <-> ... <-> nN.
    pub fn chain_topology(&self) {
        let count = self.nodes.len();
        for (i, entry) in self.nodes.iter().enumerate() {
            let mut neighbors = Vec::new();
            if i > 0 {
                neighbors.push(self.nodes[i - 1].id.clone());
            }
            if i + 1 < count {
                neighbors.push(self.nodes[i + 1].id.clone());
            }
            entry.node.set_neighbors(neighbors);
        }
    }

    /// Install a star topology with n1 as the hub.
    pub fn star_topology(&self) {
        let hub = self.nodes[0].id.clone();
        let leaves: Vec<String> = self.nodes[1..].iter().map(|n| n.id.clone()).collect();
        self.nodes[0].node.set_neighbors(leaves);
        for leaf in &self.nodes[1..] {
            leaf.node.set_neighbors(vec![hub.clone()]);
        }
    }

    /// Install a full mesh: every node neighbors every other node.
    pub fn mesh_topology(&self) {
        for entry in &self.nodes {
            let neighbors = self
                .nodes
                .iter()
                .filter(|n| n.id != entry.id)
                .map(|n| n.id.clone())
                .collect();
            entry.node.set_neighbors(neighbors);
        }
    }

    /// Register a bare mailbox in the routing table and return its
    /// handle. Anything the cluster sends to `id` lands there without
    /// protocol processing, so tests can play controller or client and
    /// inspect replies as raw envelopes.
    pub fn add_mailbox(&self, id: &str) -> FloodcastHandle<String> {
        let (_node, handle) = Floodcast::new(id.to_string(), FloodcastConfig::default());
        self.routes.write().insert(id.to_string(), handle.clone());
        handle
    }

    /// Wait until every node holds `value`.
    pub async fn wait_for_value(&self, value: u64, timeout: Duration) {
        let start = std::time::Instant::now();
        loop {
            if self.nodes.iter().all(|n| n.node.contains(value)) {
                return;
            }
            if start.elapsed() > timeout {
                let status: Vec<_> = self
                    .nodes
                    .iter()
                    .map(|n| (n.id.clone(), n.node.contains(value)))
                    .collect();
                panic!("timeout waiting for value {}. Status: {:?}", value, status);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until each of the named nodes holds `value`.
    pub async fn wait_for_value_on(&self, ids: &[&str], value: u64, timeout: Duration) {
        let start = std::time::Instant::now();
        loop {
            if ids.iter().all(|id| self.node(id).contains(value)) {
                return;
            }
            if start.elapsed() > timeout {
                let status: Vec<_> = ids
                    .iter()
                    .map(|id| (*id, self.node(id).contains(value)))
                    .collect();
                panic!(
                    "timeout waiting for value {} on {:?}. Status: {:?}",
                    value, ids, status
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until every node's value set equals `expected` (sorted).
    pub async fn wait_for_convergence(&self, expected: &[u64], timeout: Duration) {
        let start = std::time::Instant::now();
        loop {
            if self
                .nodes
                .iter()
                .all(|n| sorted_values(&n.node) == expected)
            {
                return;
            }
            if start.elapsed() > timeout {
                panic!(
                    "timeout waiting for convergence to {} values. Sizes: {:?}",
                    expected.len(),
                    self.sizes()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until every node reports an identical value set, whatever
    /// it is.
    pub async fn wait_for_agreement(&self, timeout: Duration) {
        let start = std::time::Instant::now();
        loop {
            let reference = sorted_values(&self.nodes[0].node);
            if self
                .nodes
                .iter()
                .all(|n| sorted_values(&n.node) == reference)
            {
                return;
            }
            if start.elapsed() > timeout {
                panic!("timeout waiting for agreement. Sizes: {:?}", self.sizes());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Per-node `(id, value count)` pairs for timeout diagnostics.
    pub fn sizes(&self) -> Vec<(String, usize)> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.node.len()))
            .collect()
    }

    /// Shut down every node.
    pub fn shutdown(&self) {
        for entry in &self.nodes {
            entry.node.shutdown();
        }
    }
}

fn spawn_node<T: Transport<String>>(
    id: String,
    config: FloodcastConfig,
    routes: &RoutingTable,
    transport: T,
) -> TestNode {
    let (node, handle) = Floodcast::new(id.clone(), config);
    routes.write().insert(id.clone(), handle.clone());
    tokio::spawn(FloodcastRunner::new(node.clone(), handle, transport).run());
    TestNode { id, node }
}

/// A node's value set, sorted for comparison.
pub fn sorted_values(node: &Floodcast<String>) -> Vec<u64> {
    let mut values = node.values();
    values.sort_unstable();
    values
}

/// Receive the next envelope delivered to `mailbox`, with timeout.
pub async fn recv_envelope(
    mailbox: &FloodcastHandle<String>,
    timeout: Duration,
) -> Envelope<String> {
    let payload = tokio::time::timeout(timeout, mailbox.next_incoming())
        .await
        .expect("timed out waiting for envelope")
        .expect("mailbox closed");
    match Envelope::decode(&payload) {
        DecodeResult::Ok(envelope) => envelope,
        other => panic!("undecodable envelope: {:?}", other),
    }
}
