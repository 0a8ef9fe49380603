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

//! Engine context and the reservation manager.

use crate::allocator::LabelAllocator;
use crate::backend::BackendRegistry;
use crate::config::EngineConfig;
use crate::error::ProvisionError;
use crate::peer::{PeerProvider, PeerRegistry};
use crate::policy::PolicyEngine;
use crate::reservation::connection::{Connection, ReserveConfirmation, ReserveRequest};
use crate::reservation::state::ReservationState;
use crate::topology::TopologyStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything one engine instance shares across connections.
pub struct EngineContext {
    pub topology: TopologyStore,
    pub peers: PeerRegistry,
    pub allocator: LabelAllocator,
    pub policy: PolicyEngine,
    pub backends: BackendRegistry,
    pub peer_provider: Arc<dyn PeerProvider>,
    pub config: EngineConfig,
    service_ids: AtomicU64,
}

impl EngineContext {
    pub fn new(
        topology: TopologyStore,
        peers: PeerRegistry,
        backends: BackendRegistry,
        peer_provider: Arc<dyn PeerProvider>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            policy: PolicyEngine::new(config.policies.clone()),
            service_ids: AtomicU64::new(config.service_id_start),
            allocator: LabelAllocator::new(),
            topology,
            peers,
            backends,
            peer_provider,
            config,
        })
    }

    /// Monotonically increasing, never reused within a process.
    pub fn next_service_id(&self) -> u64 {
        self.service_ids.fetch_add(1, Ordering::Relaxed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of all live connections, keyed by service id.
pub struct ReservationManager {
    engine: Arc<EngineContext>,
    connections: Mutex<HashMap<u64, Arc<Connection>>>,
}

impl ReservationManager {
    pub fn new(engine: Arc<EngineContext>) -> Self {
        Self {
            engine,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a connection and runs the reserve operation. A failed
    /// reserve never held resources, so the connection is dropped from
    /// the table again.
    pub async fn reserve(
        &self,
        request: ReserveRequest,
    ) -> Result<ReserveConfirmation, ProvisionError> {
        let service_id = self.engine.next_service_id();
        let connection = Connection::new(service_id, Arc::clone(&self.engine));
        lock(&self.connections).insert(service_id, Arc::clone(&connection));

        match connection.reserve(request).await {
            Ok(confirmation) => Ok(confirmation),
            Err(error) => {
                lock(&self.connections).remove(&service_id);
                Err(error)
            }
        }
    }

    pub async fn commit(&self, service_id: u64) -> Result<(), ProvisionError> {
        self.connection(service_id)?.commit().await
    }

    pub async fn release(&self, service_id: u64) -> Result<(), ProvisionError> {
        self.connection(service_id)?.release().await
    }

    pub async fn abort(&self, service_id: u64) -> Result<(), ProvisionError> {
        self.connection(service_id)?.abort().await
    }

    pub async fn state(&self, service_id: u64) -> Result<ReservationState, ProvisionError> {
        Ok(self.connection(service_id)?.state().await)
    }

    pub fn connection(&self, service_id: u64) -> Result<Arc<Connection>, ProvisionError> {
        lock(&self.connections)
            .get(&service_id)
            .cloned()
            .ok_or(ProvisionError::ConnectionNotFound(service_id))
    }

    /// Live service ids in ascending order.
    pub fn service_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = lock(&self.connections).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drops connections that reached a terminal state. Returns how
    /// many were removed.
    pub async fn purge_terminated(&self) -> usize {
        let connections: Vec<Arc<Connection>> =
            lock(&self.connections).values().cloned().collect();
        let mut dead = Vec::new();
        for connection in connections {
            if connection.state().await.is_terminal() {
                dead.push(connection.service_id());
            }
        }
        let mut table = lock(&self.connections);
        for service_id in &dead {
            table.remove(service_id);
        }
        dead.len()
    }
}
