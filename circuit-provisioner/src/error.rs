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

//! Error surface for the provisioning engine.
//!
//! `ProvisionError` covers every failure a caller can see from a
//! reservation operation; `TopologyError` covers load-time rejection of
//! topology descriptions. Resource-affecting failures are only returned
//! after any partially acquired labels have been unwound.

use crate::policy::PolicyRule;
use crate::reservation::{ConnectionOperation, ReservationState};
use thiserror::Error;

/// Failures visible from provisioning operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    /// Reference to a network not present locally or in any peer summary.
    #[error("no network named {0}")]
    NetworkNotFound(String),

    /// Reference to a port the named network does not carry.
    #[error("no port named {port} in network {network}")]
    PortNotFound { network: String, port: String },

    /// Reference to a service id with no live connection.
    #[error("no connection with service id {0}")]
    ConnectionNotFound(u64),

    /// No free label satisfies the constraint on the port.
    #[error("no label available on port {port} satisfying {constraint}")]
    LabelExhausted { port: String, constraint: String },

    /// A policy rule denied the request; always names the rule.
    #[error("policy violation: {0}")]
    PolicyViolation(PolicyRule),

    /// Path computation found no viable route.
    #[error("no path found from {from} to {dest}")]
    NoPathFound { from: String, dest: String },

    /// Operation attempted from a state that does not define it.
    #[error("operation {operation} is invalid in state {state}")]
    InvalidTransition {
        state: ReservationState,
        operation: ConnectionOperation,
    },

    /// Local backend activation failed for one segment.
    #[error("backend failure on segment {segment}: {reason}")]
    BackendFailure { segment: String, reason: String },

    /// A peer rejected or failed a delegated sub-request.
    #[error("peer {peer} sub-request failed: {reason}")]
    PeerFailure { peer: String, reason: String },

    /// Hold-timer or sub-request deadline passed.
    #[error("{what} timed out after {seconds}s")]
    Timeout { what: String, seconds: u64 },
}

/// Load-time rejection of an NRM or peer-discovery description.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A line that does not parse; reported with its 1-based line number.
    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    /// Two ports with the same name within one network.
    #[error("duplicate port name {port} in network {network}")]
    DuplicatePort { network: String, port: String },

    /// Two networks with the same name.
    #[error("duplicate network name {0}")]
    DuplicateNetwork(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
