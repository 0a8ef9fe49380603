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

//! Backend seam: how a committed segment becomes (and stops being) a
//! live cross-connect on equipment owned by this provisioner.
//!
//! The engine only ever talks to [`Backend`] through the registry, so
//! hardware drivers, emulators, and test doubles all plug in the same
//! way. [`DudBackend`] is the shipped emulator: it logs and succeeds.

use crate::error::ProvisionError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::observability::events;

const COMPONENT: &str = "backend";

/// One concrete cross-connect a backend is asked to realize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Service id of the owning connection.
    pub service_id: u64,
    pub network: String,
    pub ingress: String,
    pub egress: String,
    /// Label applied on both ports, `None` on trunk-only segments.
    pub label: Option<u16>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(
                f,
                "{}:{}-{} vlan {}",
                self.network, self.ingress, self.egress, label
            ),
            None => write!(f, "{}:{}-{}", self.network, self.ingress, self.egress),
        }
    }
}

/// Driver for one class of network equipment.
///
/// Both operations must be idempotent: the engine retries cleanup paths
/// and a double deactivate must not fail.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend type name, as referenced from configuration.
    fn kind(&self) -> &str;

    async fn activate(&self, segment: &Segment) -> Result<(), ProvisionError>;

    async fn deactivate(&self, segment: &Segment) -> Result<(), ProvisionError>;
}

/// Maps networks to the backend driver that provisions them.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
    networks: HashMap<String, String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver under its own `kind()` name. Replaces any
    /// previous driver of the same kind.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.kind().to_string(), backend);
    }

    /// Assigns a network to a registered backend kind.
    pub fn assign(&mut self, network: &str, kind: &str) -> Result<(), ProvisionError> {
        if !self.backends.contains_key(kind) {
            return Err(ProvisionError::BackendFailure {
                segment: network.to_string(),
                reason: format!("no backend of kind {kind} registered"),
            });
        }
        self.networks.insert(network.to_string(), kind.to_string());
        Ok(())
    }

    /// Resolves the driver for a network.
    pub fn backend_for(&self, network: &str) -> Result<Arc<dyn Backend>, ProvisionError> {
        self.networks
            .get(network)
            .and_then(|kind| self.backends.get(kind))
            .cloned()
            .ok_or_else(|| ProvisionError::BackendFailure {
                segment: network.to_string(),
                reason: "no backend assigned to network".to_string(),
            })
    }
}

/// Log-only emulator backend. Every operation succeeds.
#[derive(Debug, Default)]
pub struct DudBackend;

#[async_trait]
impl Backend for DudBackend {
    fn kind(&self) -> &str {
        "dud"
    }

    async fn activate(&self, segment: &Segment) -> Result<(), ProvisionError> {
        info!(
            event = events::SEGMENT_ACTIVATE_OK,
            component = COMPONENT,
            backend = self.kind(),
            service_id = segment.service_id,
            segment = %segment,
            "segment activated"
        );
        Ok(())
    }

    async fn deactivate(&self, segment: &Segment) -> Result<(), ProvisionError> {
        info!(
            event = events::SEGMENT_DEACTIVATE_OK,
            component = COMPONENT,
            backend = self.kind(),
            service_id = segment.service_id,
            segment = %segment,
            "segment deactivated"
        );
        Ok(())
    }
}
