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

//! # circuit-provisioner
//!
//! `circuit-provisioner` is the provisioning engine of a multi-domain
//! network-circuit control plane: it models Ethernet/VLAN topologies,
//! computes paths across local and peer-provided networks, binds VLAN
//! labels, and drives point-to-point connections through a
//! reserve/commit/release lifecycle against pluggable equipment
//! backends.
//!
//! Typical usage is API-first and centered on [`EngineContext`] and
//! [`ReservationManager`]: load a topology from NRM descriptions,
//! register backends for the networks you own, then reserve, commit,
//! and release connections by service id.
//!
//! ```
//! use std::sync::Arc;
//! use circuit_provisioner::{
//!     BackendRegistry, DudBackend, EngineConfig, EngineContext, NoPeerProvider, PeerRegistry,
//!     PortKey, RequestContext, ReservationManager, ReserveRequest, Topology, TopologyStore,
//!     parse_nrm,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut topology = Topology::new();
//! topology.add_network(parse_nrm(
//!     "aruba.net",
//!     "ethernet ps  - vlan:1780-1789 1000 em0\n\
//!      ethernet ps2 - vlan:1780-1789 1000 em1\n",
//! )?)?;
//!
//! let mut backends = BackendRegistry::new();
//! backends.register(Arc::new(DudBackend));
//! backends.assign("aruba.net", "dud")?;
//!
//! let engine = EngineContext::new(
//!     TopologyStore::new(topology),
//!     PeerRegistry::new(),
//!     backends,
//!     Arc::new(NoPeerProvider),
//!     EngineConfig::default(),
//! );
//! let manager = ReservationManager::new(engine);
//!
//! let confirmation = manager
//!     .reserve(ReserveRequest {
//!         source: PortKey::new("aruba.net", "ps"),
//!         dest: PortKey::new("aruba.net", "ps2"),
//!         labels: None,
//!         schedule: None,
//!         ctx: RequestContext::default(),
//!     })
//!     .await?;
//! manager.commit(confirmation.service_id).await?;
//! manager.release(confirmation.service_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod backend;
pub mod config;
pub mod error;
pub mod observability;
pub mod pathfinder;
pub mod peer;
pub mod policy;
pub mod reservation;
pub mod topology;

pub use allocator::{LabelAllocation, LabelAllocator};
pub use backend::{Backend, BackendRegistry, DudBackend, Segment};
pub use config::EngineConfig;
pub use error::{ProvisionError, TopologyError};
pub use pathfinder::{Path, PathFinder, SegmentOwner, SegmentPlan};
pub use peer::{
    NoPeerProvider, PeerConfirmation, PeerDescription, PeerDiscoveryDocument,
    PeerNetworkDescription, PeerPortDescription, PeerProvider, PeerRegistry, PeerSubRequest,
    PeerSummary,
};
pub use policy::{PolicyEngine, PolicyRule, PolicyToggle, RequestContext};
pub use reservation::{
    Connection, ConnectionOperation, EngineContext, ReservationManager, ReservationState,
    ReserveConfirmation, ReserveRequest, ScheduleWindow, SegmentStatus,
};
pub use topology::{
    parse_nrm, LabelCapacity, LabelParseError, LabelSet, Network, Port, PortAttribute, PortKey,
    RemoteLink, Topology, TopologyStore,
};
