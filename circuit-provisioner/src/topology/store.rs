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

//! Storage owner for the process-wide topology with atomic reload.

use crate::topology::model::Topology;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::observability::events;

const COMPONENT: &str = "topology_store";

/// Read-mostly holder of the authoritative topology.
///
/// Readers take a cheap `Arc` snapshot and never see a partially loaded
/// topology; `reload` swaps the whole snapshot in one step, so in-flight
/// path computations finish against whichever version they started with.
pub struct TopologyStore {
    inner: RwLock<Arc<Topology>>,
}

impl TopologyStore {
    pub fn new(topology: Topology) -> Self {
        Self {
            inner: RwLock::new(Arc::new(topology)),
        }
    }

    /// One consistent topology version.
    pub fn snapshot(&self) -> Arc<Topology> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the topology atomically with respect to readers.
    pub fn reload(&self, topology: Topology) {
        let networks = topology.networks().count();
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(topology);
        info!(
            event = events::TOPOLOGY_RELOAD,
            component = COMPONENT,
            networks,
            "topology reloaded"
        );
    }
}
