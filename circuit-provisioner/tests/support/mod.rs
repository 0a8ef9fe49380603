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

use async_trait::async_trait;
use circuit_provisioner::{
    parse_nrm, Backend, BackendRegistry, EngineConfig, EngineContext, PeerConfirmation,
    PeerDescription, PeerDiscoveryDocument, PeerNetworkDescription, PeerPortDescription,
    PeerProvider, PeerRegistry, PeerSubRequest, ProvisionError, ReservationManager, Segment,
    Topology, TopologyStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const ARUBA_NRM: &str = "
ethernet  ps   -                           vlan:1780-1789  1000  em0
ethernet  dom  dominica.net#arb-(in|out)   vlan:1780-1789  1000  em1
ethernet  bon  bonaire.net#arb-(in|out)    vlan:1780-1789  1000  em2
";

pub(crate) const DOMINICA_NRM: &str = "
ethernet  arb  aruba.net#dom-(in|out)      vlan:1780-1789  1000  em0
ethernet  bon  bonaire.net#dom-(in|out)    vlan:1780-1789  1000  em2
ethernet  ps   -                           vlan:1780-1789  1000  \"em 1\"
";

/// Backend that counts operations and can be told to fail activation
/// on one network.
#[allow(dead_code)]
pub(crate) struct CountingBackend {
    pub(crate) activated: AtomicUsize,
    pub(crate) deactivated: AtomicUsize,
    fail_on: Option<String>,
}

impl CountingBackend {
    #[allow(dead_code)]
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            activated: AtomicUsize::new(0),
            deactivated: AtomicUsize::new(0),
            fail_on: None,
        })
    }

    #[allow(dead_code)]
    pub(crate) fn failing_on(network: &str) -> Arc<Self> {
        Arc::new(Self {
            activated: AtomicUsize::new(0),
            deactivated: AtomicUsize::new(0),
            fail_on: Some(network.to_string()),
        })
    }
}

#[async_trait]
impl Backend for CountingBackend {
    fn kind(&self) -> &str {
        "counting"
    }

    async fn activate(&self, segment: &Segment) -> Result<(), ProvisionError> {
        if self.fail_on.as_deref() == Some(segment.network.as_str()) {
            return Err(ProvisionError::BackendFailure {
                segment: segment.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.activated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deactivate(&self, _segment: &Segment) -> Result<(), ProvisionError> {
        self.deactivated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Peer provider that records traffic and confirms every sub-request.
#[allow(dead_code)]
pub(crate) struct RecordingPeerProvider {
    pub(crate) requests: Mutex<Vec<PeerSubRequest>>,
    pub(crate) released: Mutex<Vec<(String, String)>>,
    pub(crate) cancelled: Mutex<Vec<(String, u64)>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingPeerProvider {
    fn with(fail: bool, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            fail,
            delay,
        })
    }

    #[allow(dead_code)]
    pub(crate) fn new() -> Arc<Self> {
        Self::with(false, None)
    }

    #[allow(dead_code)]
    pub(crate) fn failing() -> Arc<Self> {
        Self::with(true, None)
    }

    /// Confirms only after `delay`, to drive the caller past its
    /// sub-request deadline.
    #[allow(dead_code)]
    pub(crate) fn confirming_after(delay: Duration) -> Arc<Self> {
        Self::with(false, Some(delay))
    }
}

#[async_trait]
impl PeerProvider for RecordingPeerProvider {
    async fn provision(&self, request: PeerSubRequest) -> Result<PeerConfirmation, ProvisionError> {
        let peer = request.peer.clone();
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(ProvisionError::PeerFailure {
                peer,
                reason: "injected refusal".to_string(),
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let count = self.requests.lock().unwrap().len();
        Ok(PeerConfirmation {
            peer_connection_id: format!("{peer}-c{count}"),
        })
    }

    async fn release(&self, peer: &str, peer_connection_id: &str) -> Result<(), ProvisionError> {
        self.released
            .lock()
            .unwrap()
            .push((peer.to_string(), peer_connection_id.to_string()));
        Ok(())
    }

    async fn cancel(&self, peer: &str, service_id: u64) -> Result<(), ProvisionError> {
        self.cancelled
            .lock()
            .unwrap()
            .push((peer.to_string(), service_id));
        Ok(())
    }
}

/// aruba.net and dominica.net, both locally owned and linked.
pub(crate) fn dual_network_topology() -> Topology {
    let mut topology = Topology::new();
    topology
        .add_network(parse_nrm("aruba.net", ARUBA_NRM).unwrap())
        .unwrap();
    topology
        .add_network(parse_nrm("dominica.net", DOMINICA_NRM).unwrap())
        .unwrap();
    topology
}

/// Discovery document announcing bonaire.net behind a single peer.
pub(crate) fn bonaire_discovery() -> PeerDiscoveryDocument {
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

/// Manager over the dual-network topology with one counting backend
/// assigned to both networks.
#[allow(dead_code)]
pub(crate) fn manager_with(
    backend: Arc<CountingBackend>,
    peer_provider: Arc<dyn PeerProvider>,
    peers: PeerRegistry,
    config: EngineConfig,
) -> ReservationManager {
    let mut backends = BackendRegistry::new();
    backends.register(backend);
    backends.assign("aruba.net", "counting").unwrap();
    backends.assign("dominica.net", "counting").unwrap();
    let engine = EngineContext::new(
        TopologyStore::new(dual_network_topology()),
        peers,
        backends,
        peer_provider,
        config,
    );
    ReservationManager::new(engine)
}
