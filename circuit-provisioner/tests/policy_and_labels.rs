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

mod support;

use circuit_provisioner::{
    parse_nrm, BackendRegistry, DudBackend, EngineConfig, EngineContext, LabelSet, NoPeerProvider,
    PeerRegistry, PolicyRule, PolicyToggle, PortKey, ProvisionError, RequestContext,
    ReservationManager, ReserveRequest, Topology, TopologyStore,
};
use std::sync::Arc;
use support::{manager_with, CountingBackend, RecordingPeerProvider};

fn request(source: (&str, &str), dest: (&str, &str)) -> ReserveRequest {
    ReserveRequest {
        source: PortKey::new(source.0, source.1),
        dest: PortKey::new(dest.0, dest.1),
        labels: None,
        schedule: None,
        ctx: RequestContext::default(),
    }
}

fn dud_manager(nrm: &str, config: EngineConfig) -> ReservationManager {
    let mut topology = Topology::new();
    topology
        .add_network(parse_nrm("aruba.net", nrm).unwrap())
        .unwrap();
    let mut backends = BackendRegistry::new();
    backends.register(Arc::new(DudBackend));
    backends.assign("aruba.net", "dud").unwrap();
    let engine = EngineContext::new(
        TopologyStore::new(topology),
        PeerRegistry::new(),
        backends,
        Arc::new(NoPeerProvider),
        config,
    );
    ReservationManager::new(engine)
}

#[tokio::test]
async fn a_requested_label_is_honored_end_to_end() {
    let manager = manager_with(
        CountingBackend::new(),
        Arc::new(NoPeerProvider),
        PeerRegistry::new(),
        EngineConfig::default(),
    );

    let mut req = request(("aruba.net", "ps"), ("dominica.net", "ps"));
    req.labels = Some(LabelSet::single(1785));
    let confirmation = manager.reserve(req).await.unwrap();
    assert_eq!(confirmation.label, Some(1785));
}

#[tokio::test]
async fn label_exhaustion_is_reported_and_nothing_leaks() {
    const NARROW_NRM: &str = "
ethernet  ps   -  vlan:1780  1000  em0
ethernet  ps2  -  vlan:1780  1000  em1
";
    let manager = dud_manager(NARROW_NRM, EngineConfig::default());

    let held = manager
        .reserve(request(("aruba.net", "ps"), ("aruba.net", "ps2")))
        .await
        .unwrap();
    assert_eq!(held.label, Some(1780));

    let error = manager
        .reserve(request(("aruba.net", "ps"), ("aruba.net", "ps2")))
        .await
        .unwrap_err();
    assert!(matches!(error, ProvisionError::LabelExhausted { .. }));

    // freeing the first reservation makes the label available again
    manager.abort(held.service_id).await.unwrap();
    let again = manager
        .reserve(request(("aruba.net", "ps"), ("aruba.net", "ps2")))
        .await
        .unwrap();
    assert_eq!(again.label, Some(1780));
}

#[tokio::test]
async fn transit_restricted_ports_cannot_be_bridged() {
    const RESTRICTED_NRM: &str = "
ethernet  bon  bonaire.net#arb-(in|out)  vlan:1780-1789  1000  em0  restricttransit
ethernet  cur  curacao.net#arb-(in|out)  vlan:1780-1789  1000  em1  restricttransit
ethernet  ps   -                         vlan:1780-1789  1000  em2
";
    let manager = dud_manager(RESTRICTED_NRM, EngineConfig::default());

    assert_eq!(
        manager
            .reserve(request(("aruba.net", "bon"), ("aruba.net", "cur")))
            .await
            .unwrap_err(),
        ProvisionError::PolicyViolation(PolicyRule::RestrictTransit)
    );

    // one restricted end is fine
    assert!(manager
        .reserve(request(("aruba.net", "ps"), ("aruba.net", "bon")))
        .await
        .is_ok());
}

#[tokio::test]
async fn required_user_attribute_gates_reserve() {
    let manager = dud_manager(
        support::ARUBA_NRM,
        EngineConfig {
            policies: [PolicyToggle::RequireUser].into_iter().collect(),
            ..EngineConfig::default()
        },
    );

    assert_eq!(
        manager
            .reserve(request(("aruba.net", "ps"), ("aruba.net", "dom")))
            .await
            .unwrap_err(),
        ProvisionError::PolicyViolation(PolicyRule::RequireUser)
    );

    let mut req = request(("aruba.net", "ps"), ("aruba.net", "dom"));
    req.ctx.user = Some("alice".to_string());
    let confirmation = manager.reserve(req).await.unwrap();

    // checked rules land in the connection's audit record
    let connection = manager.connection(confirmation.service_id).unwrap();
    assert_eq!(connection.audit().await, vec![PolicyRule::RequireUser]);
}

#[tokio::test]
async fn delegation_without_the_aggregator_toggle_is_denied() {
    let provider = RecordingPeerProvider::new();
    let peers = PeerRegistry::new();
    peers.refresh(&support::bonaire_discovery()).unwrap();
    let manager = manager_with(
        CountingBackend::new(),
        provider,
        peers,
        EngineConfig::default(),
    );

    assert_eq!(
        manager
            .reserve(request(("aruba.net", "ps"), ("bonaire.net", "ps")))
            .await
            .unwrap_err(),
        ProvisionError::PolicyViolation(PolicyRule::Aggregator)
    );
}
