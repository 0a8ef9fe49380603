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

//! Reservation lifecycle: connection state, per-connection operations,
//! and the manager that owns them.

mod connection;
mod manager;
mod state;

pub use connection::{
    Connection, ReserveConfirmation, ReserveRequest, ScheduleWindow, SegmentStatus,
};
pub use manager::{EngineContext, ReservationManager};
pub use state::{ConnectionOperation, ReservationState};
