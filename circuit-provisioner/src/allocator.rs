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

//! Per-port VLAN label allocation.
//!
//! The single most safety-critical invariant in the engine: a label
//! value is bound to at most one active allocation per port at any
//! instant. Allocation state is scoped per port, so allocate/release on
//! different ports never contend.

use crate::error::ProvisionError;
use crate::topology::{LabelCapacity, LabelSet, PortKey};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::observability::events;

const COMPONENT: &str = "allocator";

/// One label binding on one port, held by exactly one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelAllocation {
    pub port: PortKey,
    /// `None` is the sentinel for trunk (no-label) ports.
    pub value: Option<u16>,
}

type PortState = Arc<Mutex<BTreeSet<u16>>>;

/// Owner of all per-port allocation state.
#[derive(Default)]
pub struct LabelAllocator {
    ports: Mutex<HashMap<PortKey, PortState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn port_state(&self, key: &PortKey) -> PortState {
        lock(&self.ports).entry(key.clone()).or_default().clone()
    }

    /// Allocates the lowest free label in `capacity ∩ constraint` on one
    /// port. Trunk ports always succeed with the no-label sentinel.
    pub fn allocate(
        &self,
        port: &PortKey,
        capacity: &LabelCapacity,
        constraint: Option<&LabelSet>,
    ) -> Result<LabelAllocation, ProvisionError> {
        let declared = match capacity.label_set() {
            None => {
                return Ok(LabelAllocation {
                    port: port.clone(),
                    value: None,
                })
            }
            Some(set) => set,
        };

        let mut candidates = match constraint {
            Some(requested) => declared.intersect(requested),
            None => Some(declared.clone()),
        }
        .ok_or_else(|| exhausted(port, constraint, declared))?;

        let state = self.port_state(port);
        let mut bound = lock(&state);
        for taken in bound.iter() {
            candidates.remove(*taken);
        }
        let value = candidates
            .lowest()
            .ok_or_else(|| exhausted(port, constraint, declared))?;
        bound.insert(value);

        debug!(
            event = events::LABEL_ALLOCATED,
            component = COMPONENT,
            port = %port,
            value,
            "label allocated"
        );
        Ok(LabelAllocation {
            port: port.clone(),
            value: Some(value),
        })
    }

    /// Binds one common value on every labelled port, or nothing.
    ///
    /// Used for no-swap paths, where all segment endpoints must carry
    /// the same VLAN id. Port locks are taken in key order. Returns the
    /// chosen value (if any port is labelled) and the allocations,
    /// including no-label sentinels for the trunk ports.
    pub fn allocate_common(
        &self,
        ports: &[(PortKey, LabelCapacity)],
        constraint: Option<&LabelSet>,
    ) -> Result<(Option<u16>, Vec<LabelAllocation>), ProvisionError> {
        let mut labelled: Vec<(PortKey, &LabelSet)> = Vec::new();
        for (key, capacity) in ports {
            if let Some(set) = capacity.label_set() {
                labelled.push((key.clone(), set));
            }
        }

        if labelled.is_empty() {
            let allocations = ports
                .iter()
                .map(|(key, _)| LabelAllocation {
                    port: key.clone(),
                    value: None,
                })
                .collect();
            return Ok((None, allocations));
        }

        // candidate values must lie within every port's declared capacity
        let mut candidates = match constraint {
            Some(set) => set.clone(),
            None => labelled[0].1.clone(),
        };
        for (key, declared) in &labelled {
            candidates = candidates
                .intersect(declared)
                .ok_or_else(|| exhausted(key, constraint, declared))?;
        }

        labelled.sort_by(|a, b| a.0.cmp(&b.0));
        labelled.dedup_by(|a, b| a.0 == b.0);

        let states: Vec<(PortKey, PortState)> = labelled
            .iter()
            .map(|(key, _)| (key.clone(), self.port_state(key)))
            .collect();
        let mut guards: Vec<MutexGuard<'_, BTreeSet<u16>>> =
            states.iter().map(|(_, state)| lock(state)).collect();

        let mut free = candidates.clone();
        for bound in &guards {
            for taken in bound.iter() {
                free.remove(*taken);
            }
        }
        let value = free.lowest().ok_or_else(|| {
            let (key, _) = &labelled[0];
            exhausted(key, constraint, &candidates)
        })?;

        for bound in guards.iter_mut() {
            bound.insert(value);
        }
        drop(guards);

        debug!(
            event = events::LABEL_ALLOCATED,
            component = COMPONENT,
            ports = labelled.len(),
            value,
            "common label allocated"
        );

        let allocations = ports
            .iter()
            .map(|(key, capacity)| LabelAllocation {
                port: key.clone(),
                value: capacity.label_set().map(|_| value),
            })
            .collect();
        Ok((Some(value), allocations))
    }

    /// Returns a label to its port. Releasing an already-released or
    /// trunk allocation is a no-op, not an error.
    pub fn release(&self, allocation: &LabelAllocation) {
        let Some(value) = allocation.value else {
            return;
        };
        let state = self.port_state(&allocation.port);
        if lock(&state).remove(&value) {
            debug!(
                event = events::LABEL_RELEASED,
                component = COMPONENT,
                port = %allocation.port,
                value,
                "label released"
            );
        }
    }

    /// Currently bound values on one port, ascending.
    pub fn bound_labels(&self, port: &PortKey) -> Vec<u16> {
        let state = self.port_state(port);
        let bound = lock(&state);
        bound.iter().copied().collect()
    }
}

fn exhausted(port: &PortKey, constraint: Option<&LabelSet>, declared: &LabelSet) -> ProvisionError {
    let constraint = match constraint {
        Some(set) => set.to_string(),
        None => declared.to_string(),
    };
    debug!(
        event = events::LABEL_EXHAUSTED,
        component = COMPONENT,
        port = %port,
        constraint = constraint.as_str(),
        "no label available"
    );
    ProvisionError::LabelExhausted {
        port: port.to_string(),
        constraint,
    }
}
