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

mod config;

use crate::config::Config;
use circuit_provisioner::{
    parse_nrm, BackendRegistry, DudBackend, EngineContext, NoPeerProvider, PeerDiscoveryDocument,
    PeerRegistry, ReservationManager, Topology, TopologyStore,
};
use clap::Parser;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Multi-domain circuit provisioning daemon")]
struct ProvisionerArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = ProvisionerArgs::parse();
    let contents = fs::read_to_string(&args.config)
        .map_err(|e| format!("unable to read config file {}: {e}", args.config))?;
    let config: Config = json5::from_str(&contents)
        .map_err(|e| format!("unable to parse config file {}: {e}", args.config))?;

    let mut topology = Topology::new();
    let mut backends = BackendRegistry::new();
    backends.register(Arc::new(DudBackend));
    for network_config in &config.networks {
        let nrm = fs::read_to_string(&network_config.nrm_file)
            .map_err(|e| format!("unable to read {}: {e}", network_config.nrm_file))?;
        let network = parse_nrm(&network_config.name, &nrm)
            .map_err(|e| format!("{}: {e}", network_config.nrm_file))?;
        topology.add_network(network)?;
        backends.assign(&network_config.name, network_config.backend.name())?;
        info!(
            network = %network_config.name,
            nrm_file = %network_config.nrm_file,
            backend = network_config.backend.name(),
            "network loaded"
        );
    }

    let peers = PeerRegistry::new();
    if let Some(peering) = &config.peering {
        let contents = fs::read_to_string(&peering.discovery_file)
            .map_err(|e| format!("unable to read {}: {e}", peering.discovery_file))?;
        let document: PeerDiscoveryDocument = json5::from_str(&contents)
            .map_err(|e| format!("unable to parse {}: {e}", peering.discovery_file))?;
        peers.refresh(&document)?;
    }

    let engine = EngineContext::new(
        TopologyStore::new(topology),
        peers,
        backends,
        Arc::new(NoPeerProvider),
        config.engine.clone(),
    );
    let manager = ReservationManager::new(engine);
    info!(
        networks = config.networks.len(),
        service_id_start = config.engine.service_id_start,
        "circuit-provisionerd running"
    );

    tokio::signal::ctrl_c().await?;
    info!(
        live_connections = manager.service_ids().len(),
        "shutdown requested"
    );
    Ok(())
}
