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

//! Topology data model: networks, ports, remote links, and label capacity.

use crate::error::{ProvisionError, TopologyError};
use crate::topology::label_set::LabelSet;
use std::collections::BTreeMap;
use std::fmt;

/// Stable identity of one port: `network:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortKey {
    pub network: String,
    pub port: String,
}

impl PortKey {
    pub fn new(network: &str, port: &str) -> Self {
        Self {
            network: network.to_string(),
            port: port.to_string(),
        }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.port)
    }
}

/// Allocatable labels a port carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelCapacity {
    /// Trunk port: no label is applied, allocation always succeeds.
    Trunk,
    /// VLAN-labelled port with a declared set of allocatable ids.
    Vlan(LabelSet),
}

impl LabelCapacity {
    pub fn label_set(&self) -> Option<&LabelSet> {
        match self {
            LabelCapacity::Trunk => None,
            LabelCapacity::Vlan(set) => Some(set),
        }
    }
}

/// Security attribute or policy tag on a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortAttribute {
    /// Two ports both carrying this tag may never be bridged.
    RestrictTransit,
    /// Caller identity must match this distinguished name.
    HostDn(String),
    /// Arbitrary `key=value` security attribute.
    KeyValue(String, String),
}

/// Link from a local port into a remote network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLink {
    pub network: String,
    pub port: String,
    /// Whether the remote port names carry the `-(in|out)` prefixing
    /// convention on the wire. Does not affect label selection.
    pub prefixed: bool,
}

/// One bidirectional Ethernet port of a network.
#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    /// `None` for a local termination port.
    pub remote: Option<RemoteLink>,
    pub label: LabelCapacity,
    /// Nominal capacity in Mbps; informational, never mutated by reservations.
    pub bandwidth: u64,
    /// Device interface the port maps to, from the NRM interface column.
    pub interface: String,
    pub attributes: Vec<PortAttribute>,
}

impl Port {
    pub fn is_termination(&self) -> bool {
        self.remote.is_none()
    }

    pub fn restrict_transit(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, PortAttribute::RestrictTransit))
    }

    pub fn host_dn(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            PortAttribute::HostDn(dn) => Some(dn.as_str()),
            _ => None,
        })
    }
}

/// A named network and its ports.
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    ports: BTreeMap<String, Port>,
}

impl Network {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ports: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_port(&mut self, port: Port) -> Result<(), TopologyError> {
        if self.ports.contains_key(&port.name) {
            return Err(TopologyError::DuplicatePort {
                network: self.name.clone(),
                port: port.name,
            });
        }
        self.ports.insert(port.name.clone(), port);
        Ok(())
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    /// Ports in deterministic (name) order.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }
}

/// The set of locally modeled networks.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    networks: BTreeMap<String, Network>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&mut self, network: Network) -> Result<(), TopologyError> {
        if self.networks.contains_key(network.name()) {
            return Err(TopologyError::DuplicateNetwork(network.name().to_string()));
        }
        self.networks.insert(network.name().to_string(), network);
        Ok(())
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Resolves a port reference, reporting which part was unknown.
    pub fn port(&self, key: &PortKey) -> Result<&Port, ProvisionError> {
        let network = self
            .networks
            .get(&key.network)
            .ok_or_else(|| ProvisionError::NetworkNotFound(key.network.clone()))?;
        network.port(&key.port).ok_or_else(|| ProvisionError::PortNotFound {
            network: key.network.clone(),
            port: key.port.clone(),
        })
    }
}
