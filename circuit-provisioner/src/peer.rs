/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Peer networks: discovery-document registry and the delegation seam.
//!
//! The registry holds read-mostly summaries of what each peer NSA
//! advertises; `refresh` swaps the whole summary set atomically, the
//! same discipline as topology reload. Stale entries are tolerated.

use crate::error::{ProvisionError, TopologyError};
use crate::topology::{LabelCapacity, LabelSet, Network, Port, RemoteLink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::observability::events;

const COMPONENT: &str = "peer_registry";

/// A peer's discovery document, as published.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PeerDiscoveryDocument {
    pub peers: Vec<PeerDescription>,
}

/// One peer NSA and the topology it advertises.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PeerDescription {
    /// NSA identity.
    pub name: String,
    /// Provider endpoint address.
    pub address: String,
    pub networks: Vec<PeerNetworkDescription>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PeerNetworkDescription {
    pub name: String,
    pub ports: Vec<PeerPortDescription>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PeerPortDescription {
    pub name: String,
    /// `network#port` remote link, when the port leads onward.
    #[serde(default)]
    pub remote: Option<String>,
    /// Advertised VLAN ranges, e.g. `1780-1789`; absent means trunk.
    #[serde(default)]
    pub vlans: Option<String>,
}

/// Reachability summary for one remote network.
#[derive(Debug, Clone)]
pub struct PeerSummary {
    /// Owning peer NSA identity.
    pub peer: String,
    /// Peer provider address.
    pub address: String,
    /// Summarized network model; ports carry no security attributes.
    pub network: Network,
}

type SummaryMap = HashMap<String, Arc<PeerSummary>>;

/// Read-mostly registry of known peers, keyed by network name.
#[derive(Default)]
pub struct PeerRegistry {
    inner: RwLock<Arc<SummaryMap>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One consistent view of every known remote network.
    pub fn snapshot(&self) -> Arc<SummaryMap> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Summary for one network; `None` means unknown, which path
    /// finding treats as a dead branch, never a request failure.
    pub fn summary_for(&self, network: &str) -> Option<Arc<PeerSummary>> {
        self.snapshot().get(network).cloned()
    }

    /// Replaces the summary set from a discovery document, atomically
    /// with respect to readers.
    pub fn refresh(&self, document: &PeerDiscoveryDocument) -> Result<(), TopologyError> {
        let mut summaries: SummaryMap = HashMap::new();

        for peer in &document.peers {
            for described in &peer.networks {
                let network = build_network(described)?;
                summaries.insert(
                    described.name.clone(),
                    Arc::new(PeerSummary {
                        peer: peer.name.clone(),
                        address: peer.address.clone(),
                        network,
                    }),
                );
            }
        }

        let networks = summaries.len();
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(summaries);
        info!(
            event = events::PEER_REFRESH,
            component = COMPONENT,
            peers = document.peers.len(),
            networks,
            "peer summaries refreshed"
        );
        Ok(())
    }
}

fn build_network(described: &PeerNetworkDescription) -> Result<Network, TopologyError> {
    let mut network = Network::new(&described.name);
    for port in &described.ports {
        let remote = match &port.remote {
            None => None,
            Some(spec) => {
                let (network, port_name) =
                    spec.split_once('#')
                        .ok_or_else(|| TopologyError::MalformedLine {
                            line: 0,
                            reason: format!("peer remote '{spec}' must be 'network#port'"),
                        })?;
                Some(RemoteLink {
                    network: network.to_string(),
                    port: port_name.to_string(),
                    prefixed: false,
                })
            }
        };
        let label = match &port.vlans {
            None => LabelCapacity::Trunk,
            Some(ranges) => LabelCapacity::Vlan(LabelSet::parse(ranges).map_err(|e| {
                TopologyError::MalformedLine {
                    line: 0,
                    reason: e.to_string(),
                }
            })?),
        };
        network.add_port(Port {
            name: port.name.clone(),
            remote,
            label,
            bandwidth: 0,
            interface: String::new(),
            attributes: Vec::new(),
        })?;
    }
    Ok(network)
}

/// A delegated provisioning request for one peer-owned segment.
#[derive(Debug, Clone)]
pub struct PeerSubRequest {
    /// Peer NSA identity the request goes to.
    pub peer: String,
    pub network: String,
    pub ingress_port: String,
    pub egress_port: String,
    /// Label constraint, already narrowed by the aggregator.
    pub labels: Option<LabelSet>,
    /// Owning local service id, for correlation.
    pub service_id: u64,
}

/// Asynchronous confirmation from a peer sub-request.
#[derive(Debug, Clone)]
pub struct PeerConfirmation {
    /// Connection id assigned by the peer, used for later release.
    pub peer_connection_id: String,
}

/// Boundary to peer NSAs. Implementations deliver the peer's
/// asynchronous confirm/fail as the completion of these futures; the
/// engine bounds them with timeouts, cancels confirmed delegations via
/// `release`, and abandons unconfirmed ones via `cancel`.
#[async_trait]
pub trait PeerProvider: Send + Sync {
    async fn provision(&self, request: PeerSubRequest) -> Result<PeerConfirmation, ProvisionError>;

    /// Tells a peer to release a delegated reservation. Idempotent.
    async fn release(&self, peer: &str, peer_connection_id: &str) -> Result<(), ProvisionError>;

    /// Abandons a sub-request whose confirmation never arrived, keyed
    /// by the originating service id carried in the request. A peer
    /// that confirmed after the caller's deadline must drop the
    /// reservation; a peer that never saw the request treats this as
    /// a no-op.
    async fn cancel(&self, peer: &str, service_id: u64) -> Result<(), ProvisionError>;
}

/// Provider used when no peering is configured: any delegation fails.
pub struct NoPeerProvider;

#[async_trait]
impl PeerProvider for NoPeerProvider {
    async fn provision(&self, request: PeerSubRequest) -> Result<PeerConfirmation, ProvisionError> {
        Err(ProvisionError::PeerFailure {
            peer: request.peer,
            reason: "no peer provider configured".to_string(),
        })
    }

    async fn release(&self, _peer: &str, _peer_connection_id: &str) -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn cancel(&self, _peer: &str, _service_id: u64) -> Result<(), ProvisionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> PeerDiscoveryDocument {
        PeerDiscoveryDocument {
            peers: vec![PeerDescription {
                name: "bonaire-nsa".to_string(),
                address: "https://bonaire.example.net/nsi".to_string(),
                networks: vec![PeerNetworkDescription {
                    name: "bonaire.net".to_string(),
                    ports: vec![
                        PeerPortDescription {
                            name: "arb".to_string(),
                            remote: Some("aruba.net#bon".to_string()),
                            vlans: Some("1780-1789".to_string()),
                        },
                        PeerPortDescription {
                            name: "ps".to_string(),
                            remote: None,
                            vlans: Some("1780-1789".to_string()),
                        },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn refresh_replaces_summaries_atomically() {
        let registry = PeerRegistry::new();
        assert!(registry.summary_for("bonaire.net").is_none());

        registry.refresh(&document()).unwrap();
        let summary = registry.summary_for("bonaire.net").unwrap();
        assert_eq!(summary.peer, "bonaire-nsa");
        assert!(summary.network.port("arb").is_some());

        let old = registry.snapshot();
        registry
            .refresh(&PeerDiscoveryDocument { peers: vec![] })
            .unwrap();
        assert!(registry.summary_for("bonaire.net").is_none());
        // snapshot taken before the refresh still resolves
        assert!(old.contains_key("bonaire.net"));
    }

    #[test]
    fn malformed_peer_documents_are_rejected() {
        let mut doc = document();
        doc.peers[0].networks[0].ports[0].remote = Some("no-separator".to_string());
        let registry = PeerRegistry::new();
        assert!(registry.refresh(&doc).is_err());
    }
}
