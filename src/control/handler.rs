//! Command handler for control API
//!
//! This module executes API commands against the fleet store. Allocation
//! reads a snapshot, picks the smallest free block and inserts the tunnel
//! while holding one lock, so concurrent requests never share a block.

use crate::config::validation::{validate_endpoint_host, validate_node_name};
use crate::control::{ApiError, ApiRequest, ApiResponse, ControlAction, FleetStore};
use crate::error::{MeshError, Result};
use crate::fleet::{Agent, Gateway, NodeKind, NodeStatus, Tunnel};
use crate::ipam::{AllocationPolicy, MAX_BLOCK, MIN_BLOCK};
use crate::monitoring::{MetricType, MetricsCollector};
use crate::wireguard::{NodeTopology, PublicKey, TopologyBuilder, TopologyOptions};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Executes control actions against a [`FleetStore`]
pub struct CommandHandler {
    store: Arc<dyn FleetStore>,
    policy: AllocationPolicy,
    builder: TopologyBuilder,
    metrics: MetricsCollector,
    /// Held across snapshot, allocate and insert
    allocation_lock: Mutex<()>,
}

impl CommandHandler {
    /// Create a new command handler
    pub fn new(
        store: Arc<dyn FleetStore>,
        policy: AllocationPolicy,
        options: TopologyOptions,
    ) -> Self {
        Self {
            store,
            policy,
            builder: TopologyBuilder::new(options),
            metrics: MetricsCollector::new(),
            allocation_lock: Mutex::new(()),
        }
    }

    /// Share an existing metrics collector
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics updated by this handler
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Handle an API request
    pub async fn handle_request(&self, request: ApiRequest) -> ApiResponse {
        debug!("Handling request {}: {}", request.id, request.action.name());

        let result = match request.action.clone() {
            ControlAction::AllocateTunnel {
                agent_id,
                gateway_id,
            } => self
                .allocate_tunnel(&agent_id, &gateway_id)
                .await
                .and_then(|tunnel| to_data(&tunnel)),
            ControlAction::DeleteTunnel { tunnel_id } => self
                .delete_tunnel(&tunnel_id)
                .await
                .and_then(|tunnel| to_data(&tunnel)),
            ControlAction::Topology { node_kind, node_id } => self
                .topology(node_kind, &node_id)
                .and_then(|topology| to_data(&topology)),
            ControlAction::RenderConfig { node_kind, node_id } => self
                .render_config(node_kind, &node_id)
                .map(|config| json!({ "config": config })),
            ControlAction::RegisterAgent { name } => {
                self.register_agent(&name).and_then(|agent| to_data(&agent))
            }
            ControlAction::RegisterGateway {
                name,
                public_ip,
                region,
            } => self
                .register_gateway(&name, public_ip, region)
                .and_then(|gateway| to_data(&gateway)),
            ControlAction::Heartbeat {
                node_kind,
                node_id,
                status,
            } => self
                .heartbeat(node_kind, &node_id, status)
                .map(|()| json!({ "status": status })),
            ControlAction::UpdatePublicKey {
                node_kind,
                node_id,
                public_key,
            } => self
                .update_public_key(node_kind, &node_id, &public_key)
                .map(|key| json!({ "publicKey": key })),
            ControlAction::Status => self.status(),
        };

        match result {
            Ok(data) => {
                info!(
                    "Request {} completed successfully: {}",
                    request.id,
                    request.action.name()
                );
                ApiResponse::success(request.id, Some(data))
            }
            Err(e) => {
                error!("Request {} failed: {}", request.id, e);
                ApiResponse::error(request.id, ApiError::from(e))
            }
        }
    }

    /// Create a tunnel between two registered nodes with the next free block
    pub async fn allocate_tunnel(&self, agent_id: &str, gateway_id: &str) -> Result<Tunnel> {
        let _guard = self.allocation_lock.lock().await;

        let fleet = self.store.snapshot()?;
        if fleet.agent(agent_id).is_none() {
            return Err(MeshError::NotFound(format!("agent '{}'", agent_id)));
        }
        if fleet.gateway(gateway_id).is_none() {
            return Err(MeshError::NotFound(format!("gateway '{}'", gateway_id)));
        }

        let allocation = match self.policy.allocate_tunnel(&fleet) {
            Ok(allocation) => allocation,
            Err(e) => {
                if matches!(e, MeshError::Exhausted(_)) {
                    self.metrics.increment(MetricType::AllocationExhausted);
                }
                return Err(e);
            }
        };

        let tunnel = Tunnel::from_allocation(agent_id, gateway_id, &allocation);
        self.store.insert_tunnel(tunnel.clone())?;

        info!(
            "Allocated {} to tunnel {} (agent {}, gateway {})",
            allocation.subnet, tunnel.id, agent_id, gateway_id
        );
        self.metrics.increment(MetricType::TunnelsAllocated);
        self.refresh_block_gauge();

        Ok(tunnel)
    }

    /// Delete a tunnel; its block becomes free for the next allocation
    pub async fn delete_tunnel(&self, tunnel_id: &str) -> Result<Tunnel> {
        let _guard = self.allocation_lock.lock().await;

        let tunnel = self.store.remove_tunnel(tunnel_id)?;
        info!(
            "Deleted tunnel {} (released {})",
            tunnel.id,
            tunnel.subnet.as_deref().unwrap_or("no block")
        );
        self.metrics.increment(MetricType::TunnelsReleased);
        self.refresh_block_gauge();

        Ok(tunnel)
    }

    /// Structured topology of one node from a fresh snapshot
    pub fn topology(&self, kind: NodeKind, node_id: &str) -> Result<NodeTopology> {
        let fleet = self.store.snapshot()?;
        let topology = self.builder.build(kind, node_id, &fleet)?;
        self.metrics.increment(MetricType::ConfigsRendered);
        Ok(topology)
    }

    /// Rendered WireGuard config of one node
    pub fn render_config(&self, kind: NodeKind, node_id: &str) -> Result<String> {
        Ok(self.topology(kind, node_id)?.render())
    }

    /// Register a new agent
    pub fn register_agent(&self, name: &str) -> Result<Agent> {
        validate_node_name(name)?;

        let agent = Agent::register(name);
        self.store.insert_agent(agent.clone())?;
        info!("Registered agent {} ({})", agent.name, agent.id);
        Ok(agent)
    }

    /// Register a new gateway
    pub fn register_gateway(
        &self,
        name: &str,
        public_ip: Option<String>,
        region: Option<String>,
    ) -> Result<Gateway> {
        validate_node_name(name)?;
        if let Some(host) = public_ip.as_deref() {
            validate_endpoint_host(host)?;
        }

        let gateway = Gateway::register(name, public_ip, region);
        self.store.insert_gateway(gateway.clone())?;
        info!("Registered gateway {} ({})", gateway.name, gateway.id);
        Ok(gateway)
    }

    /// Record a node heartbeat
    pub fn heartbeat(&self, kind: NodeKind, node_id: &str, status: NodeStatus) -> Result<()> {
        self.store.update_status(kind, node_id, status)?;
        debug!("{} {} reported {}", kind, node_id, status);
        Ok(())
    }

    /// Validate and store a node's public key, returning its canonical form
    pub fn update_public_key(
        &self,
        kind: NodeKind,
        node_id: &str,
        public_key: &str,
    ) -> Result<String> {
        let key = PublicKey::from_base64(public_key)?.to_base64();
        self.store.update_public_key(kind, node_id, &key)?;
        info!("Updated public key of {} {}", kind, node_id);
        Ok(key)
    }

    /// Fleet and address-space summary
    pub fn status(&self) -> Result<serde_json::Value> {
        let fleet = self.store.snapshot()?;
        let used = self.policy.used_block_numbers(&fleet);
        let capacity = usize::from(MAX_BLOCK - MIN_BLOCK) + 1;

        let online = |status: NodeStatus| status == NodeStatus::Online;

        Ok(json!({
            "agents": {
                "total": fleet.agents.len(),
                "online": fleet.agents.iter().filter(|a| online(a.status)).count(),
            },
            "gateways": {
                "total": fleet.gateways.len(),
                "online": fleet.gateways.iter().filter(|g| online(g.status)).count(),
            },
            "tunnels": fleet.tunnels.len(),
            "blocks": {
                "used": used.len(),
                "free": capacity.saturating_sub(used.len()),
            },
        }))
    }

    fn refresh_block_gauge(&self) {
        match self.store.snapshot() {
            Ok(fleet) => {
                let used = self.policy.used_block_numbers(&fleet);
                self.metrics.record(MetricType::BlocksInUse, used.len() as f64);
            }
            Err(e) => warn!("Could not refresh block gauge: {}", e),
        }
    }
}

fn to_data<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{MemoryFleetStore, MockFleetStore};
    use crate::fleet::Fleet;
    use crate::ipam::TunnelAllocation;
    use crate::wireguard::AGENT_PRIVATE_KEY_PLACEHOLDER;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn handler_for(store: Arc<dyn FleetStore>) -> CommandHandler {
        CommandHandler::new(store, AllocationPolicy::default(), TopologyOptions::default())
    }

    fn seeded_store() -> (Arc<MemoryFleetStore>, String, String) {
        let mut agent = Agent::register("edge-1");
        agent.wireguard_public_key = Some(BASE64.encode([1u8; 32]));
        let mut gateway = Gateway::register("gw-1", Some("203.0.113.5".to_string()), None);
        gateway.wireguard_public_key = Some(BASE64.encode([2u8; 32]));

        let (agent_id, gateway_id) = (agent.id.clone(), gateway.id.clone());
        let fleet = Fleet {
            agents: vec![agent],
            gateways: vec![gateway],
            tunnels: Vec::new(),
        };
        (
            Arc::new(MemoryFleetStore::in_memory(fleet)),
            agent_id,
            gateway_id,
        )
    }

    #[tokio::test]
    async fn test_allocate_assigns_smallest_free_block() {
        let (store, agent_id, gateway_id) = seeded_store();
        let handler = handler_for(store.clone());

        let first = handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();
        let second = handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();

        assert_eq!(first.subnet.as_deref(), Some("10.1.0.0/24"));
        assert_eq!(first.gateway_ip.as_deref(), Some("10.1.0.1"));
        assert_eq!(first.agent_ip.as_deref(), Some("10.1.0.100"));
        assert_eq!(second.subnet.as_deref(), Some("10.2.0.0/24"));
        assert_eq!(store.snapshot().unwrap().tunnels.len(), 2);
        assert_eq!(handler.metrics().get(MetricType::TunnelsAllocated), Some(2.0));
        assert_eq!(handler.metrics().get(MetricType::BlocksInUse), Some(2.0));
    }

    #[tokio::test]
    async fn test_deleted_block_is_reused() {
        let (store, agent_id, gateway_id) = seeded_store();
        let handler = handler_for(store);

        let first = handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();
        handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();
        handler.delete_tunnel(&first.id).await.unwrap();

        let third = handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();
        assert_eq!(third.subnet.as_deref(), Some("10.1.0.0/24"));
        assert_eq!(handler.metrics().get(MetricType::TunnelsReleased), Some(1.0));
    }

    #[tokio::test]
    async fn test_concurrent_allocations_get_distinct_blocks() {
        let (store, agent_id, gateway_id) = seeded_store();
        let handler = Arc::new(handler_for(store));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handler = handler.clone();
            let (agent_id, gateway_id) = (agent_id.clone(), gateway_id.clone());
            tasks.push(tokio::spawn(async move {
                handler.allocate_tunnel(&agent_id, &gateway_id).await
            }));
        }

        let mut subnets = std::collections::BTreeSet::new();
        for task in tasks {
            let tunnel = task.await.unwrap().unwrap();
            subnets.insert(tunnel.subnet.unwrap());
        }
        assert_eq!(subnets.len(), 16);
    }

    #[tokio::test]
    async fn test_allocate_unknown_agent() {
        let (store, _, gateway_id) = seeded_store();
        let handler = handler_for(store);

        let result = handler.allocate_tunnel("missing", &gateway_id).await;
        assert!(matches!(result, Err(MeshError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_allocate_exhausted_does_not_insert() {
        let agent = Agent::register("edge-1");
        let gateway = Gateway::register("gw-1", None, None);
        let (agent_id, gateway_id) = (agent.id.clone(), gateway.id.clone());

        let mut fleet = Fleet {
            agents: vec![agent],
            gateways: vec![gateway],
            tunnels: Vec::new(),
        };
        for n in MIN_BLOCK..=MAX_BLOCK {
            let block = crate::ipam::AddressBlock::new(n).unwrap();
            fleet.tunnels.push(Tunnel::from_allocation(
                &agent_id,
                &gateway_id,
                &TunnelAllocation::for_block(block),
            ));
        }

        let mut store = MockFleetStore::new();
        store.expect_snapshot().returning(move || Ok(fleet.clone()));
        store.expect_insert_tunnel().never();

        let handler = handler_for(Arc::new(store));
        let result = handler.allocate_tunnel(&agent_id, &gateway_id).await;

        assert!(matches!(result, Err(MeshError::Exhausted(_))));
        assert_eq!(
            handler.metrics().get(MetricType::AllocationExhausted),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let mut store = MockFleetStore::new();
        store
            .expect_snapshot()
            .returning(|| Err(MeshError::Store("unavailable".to_string())));

        let handler = handler_for(Arc::new(store));
        let response = handler
            .handle_request(ApiRequest::new("r1", ControlAction::Status))
            .await;

        assert!(!response.success);
        assert_eq!(
            response.error,
            Some(ApiError::StoreError("unavailable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_render_config_request() {
        let (store, agent_id, gateway_id) = seeded_store();
        let handler = handler_for(store);
        handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();

        let response = handler
            .handle_request(ApiRequest::new(
                "r1",
                ControlAction::RenderConfig {
                    node_kind: NodeKind::Agent,
                    node_id: agent_id,
                },
            ))
            .await;

        assert!(response.success);
        let config = response.data.unwrap()["config"].as_str().unwrap().to_string();
        assert!(config.contains(AGENT_PRIVATE_KEY_PLACEHOLDER));
        assert!(config.contains("Address = 10.1.0.100/24"));
        assert!(config.contains("Endpoint = 203.0.113.5:51820"));
        assert!(config.contains("AllowedIPs = 10.1.0.1/32"));
    }

    #[tokio::test]
    async fn test_topology_unknown_node() {
        let (store, _, _) = seeded_store();
        let handler = handler_for(store);

        let response = handler
            .handle_request(ApiRequest::new(
                "r1",
                ControlAction::Topology {
                    node_kind: NodeKind::Gateway,
                    node_id: "missing".to_string(),
                },
            ))
            .await;

        assert!(!response.success);
        assert!(matches!(response.error, Some(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_register_and_heartbeat() {
        let store = Arc::new(MemoryFleetStore::in_memory(Fleet::new()));
        let handler = handler_for(store.clone());

        let gateway = handler
            .register_gateway("gw-1", Some("gw1.example.com".to_string()), None)
            .unwrap();
        assert!(gateway.api_key.starts_with("gtw_"));

        handler
            .heartbeat(NodeKind::Gateway, &gateway.id, NodeStatus::Online)
            .unwrap();
        let fleet = store.snapshot().unwrap();
        assert_eq!(fleet.gateway(&gateway.id).unwrap().status, NodeStatus::Online);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let mut store = MockFleetStore::new();
        store.expect_insert_agent().never();
        store.expect_insert_gateway().never();
        let handler = handler_for(Arc::new(store));

        assert!(matches!(
            handler.register_agent("bad name"),
            Err(MeshError::Validation(_))
        ));
        assert!(matches!(
            handler.register_gateway("gw-1", Some("not a host".to_string()), None),
            Err(MeshError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_public_key_validates() {
        let mut store = MockFleetStore::new();
        store
            .expect_update_public_key()
            .withf(|kind, id, key| {
                *kind == NodeKind::Agent && id == "a1" && key == BASE64.encode([7u8; 32])
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let handler = handler_for(Arc::new(store));

        let key = handler
            .update_public_key(NodeKind::Agent, "a1", &BASE64.encode([7u8; 32]))
            .unwrap();
        assert_eq!(key, BASE64.encode([7u8; 32]));

        assert!(matches!(
            handler.update_public_key(NodeKind::Agent, "a1", "short"),
            Err(MeshError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_status_summary() {
        let (store, agent_id, gateway_id) = seeded_store();
        let handler = handler_for(store);
        handler.allocate_tunnel(&agent_id, &gateway_id).await.unwrap();

        let status = handler.status().unwrap();
        assert_eq!(status["agents"]["total"], 1);
        assert_eq!(status["tunnels"], 1);
        assert_eq!(status["blocks"]["used"], 1);
        assert_eq!(status["blocks"]["free"], 253);
    }
}
