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

//! Canonical structured event names used across `circuit-provisioner`.

// Reservation lifecycle events.
pub const RESERVE_START: &str = "reserve_start";
pub const RESERVE_OK: &str = "reserve_ok";
pub const RESERVE_FAILED: &str = "reserve_failed";
pub const COMMIT_START: &str = "commit_start";
pub const PROVISION_OK: &str = "provision_ok";
pub const PROVISION_FAILED: &str = "provision_failed";
pub const RELEASE_START: &str = "release_start";
pub const RELEASE_OK: &str = "release_ok";
pub const ABORT_START: &str = "abort_start";
pub const CLEANUP_OK: &str = "cleanup_ok";
pub const HOLD_TIMER_EXPIRED: &str = "hold_timer_expired";
pub const STATE_TRANSITION: &str = "state_transition";

// Path computation events.
pub const PATH_SELECTED: &str = "path_selected";
pub const PATH_NOT_FOUND: &str = "path_not_found";

// Label allocator events.
pub const LABEL_ALLOCATED: &str = "label_allocated";
pub const LABEL_RELEASED: &str = "label_released";
pub const LABEL_EXHAUSTED: &str = "label_exhausted";

// Policy events.
pub const POLICY_DENIED: &str = "policy_denied";

// Segment activation events.
pub const SEGMENT_ACTIVATE_OK: &str = "segment_activate_ok";
pub const SEGMENT_ACTIVATE_FAILED: &str = "segment_activate_failed";
pub const SEGMENT_DEACTIVATE_OK: &str = "segment_deactivate_ok";
pub const SEGMENT_DEACTIVATE_FAILED: &str = "segment_deactivate_failed";

// Topology and peer registry events.
pub const TOPOLOGY_RELOAD: &str = "topology_reload";
pub const PEER_REFRESH: &str = "peer_refresh";
pub const PEER_SUBREQUEST_SENT: &str = "peer_subrequest_sent";
pub const PEER_SUBREQUEST_CONFIRMED: &str = "peer_subrequest_confirmed";
pub const PEER_SUBREQUEST_FAILED: &str = "peer_subrequest_failed";
pub const PEER_RELEASE_SENT: &str = "peer_release_sent";
pub const PEER_CANCEL_SENT: &str = "peer_cancel_sent";
