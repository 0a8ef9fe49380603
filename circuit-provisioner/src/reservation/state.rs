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

//! Reservation lifecycle states and the operation admission table.

use std::fmt;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationState {
    /// Created, nothing resolved yet.
    Initial,
    /// Path computation and label binding in flight.
    Reserving,
    /// Resources held, hold timer armed, awaiting commit.
    Reserved,
    /// Segment activation in flight.
    Provisioning,
    /// Data plane active.
    Provisioned,
    /// Segment deactivation in flight.
    Releasing,
    /// Data plane torn down, labels returned.
    Released,
    /// Failure cleanup in flight.
    Aborting,
    /// Final resting state after failure or timeout.
    Terminated,
}

impl ReservationState {
    /// True when the state never transitions again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationState::Released | ReservationState::Terminated)
    }

    /// Whether `operation` may start from this state.
    pub fn admits(self, operation: ConnectionOperation) -> bool {
        use ConnectionOperation::*;
        use ReservationState::*;
        match operation {
            Reserve => self == Initial,
            Commit => self == Reserved,
            Release => self == Provisioned,
            // abort is valid from any holding state; terminal states
            // make it a no-op at the connection layer instead
            Abort => matches!(self, Reserved | Provisioning | Provisioned),
        }
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReservationState::Initial => "initial",
            ReservationState::Reserving => "reserving",
            ReservationState::Reserved => "reserved",
            ReservationState::Provisioning => "provisioning",
            ReservationState::Provisioned => "provisioned",
            ReservationState::Releasing => "releasing",
            ReservationState::Released => "released",
            ReservationState::Aborting => "aborting",
            ReservationState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Externally requestable connection operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionOperation {
    Reserve,
    Commit,
    Release,
    Abort,
}

impl fmt::Display for ConnectionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionOperation::Reserve => "reserve",
            ConnectionOperation::Commit => "commit",
            ConnectionOperation::Release => "release",
            ConnectionOperation::Abort => "abort",
        };
        f.write_str(name)
    }
}
