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

//! One connection: path, labels, segments, and lifecycle transitions.
//!
//! All mutable state lives behind one async mutex per connection, so
//! operations on the same connection serialize while different
//! connections proceed independently. Cross-state work (label binding)
//! goes through the shared allocator, which does its own locking.

use crate::allocator::LabelAllocation;
use crate::backend::Segment;
use crate::error::ProvisionError;
use crate::pathfinder::{Path, PathFinder, SegmentOwner, SegmentPlan};
use crate::peer::PeerSubRequest;
use crate::policy::{PolicyRule, RequestContext};
use crate::reservation::manager::EngineContext;
use crate::reservation::state::{ConnectionOperation, ReservationState};
use crate::topology::{LabelCapacity, LabelSet, PortKey};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::observability::events;

const COMPONENT: &str = "reservation";

/// A connection request as submitted by a caller.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    /// Source port; must belong to a locally modeled network.
    pub source: PortKey,
    /// Destination port, local or behind a peer.
    pub dest: PortKey,
    /// Requested label constraint, `None` for any label.
    pub labels: Option<LabelSet>,
    /// Requested service window. Recorded and logged, not enforced.
    pub schedule: Option<ScheduleWindow>,
    pub ctx: RequestContext,
}

/// Requested start/end of service, in seconds since the epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start_epoch_secs: Option<u64>,
    pub end_epoch_secs: Option<u64>,
}

/// What a successful reserve hands back.
#[derive(Debug, Clone)]
pub struct ReserveConfirmation {
    pub service_id: u64,
    /// Label bound across the whole path, `None` on trunk-only paths.
    pub label: Option<u16>,
    pub segments: Vec<SegmentPlan>,
}

/// Where one segment of the path currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// Reserved but not yet pushed to a backend or peer.
    Planned,
    /// Activation confirmed.
    Active,
    /// Activation failed or timed out.
    Failed,
    /// Torn down after having been active.
    Deactivated,
}

/// A successfully activated segment, remembered for teardown.
enum Activation {
    Local(Segment),
    Peer {
        peer: String,
        peer_connection_id: String,
    },
}

struct ConnectionInner {
    state: ReservationState,
    path: Option<Path>,
    /// Label committed across the path once reserved.
    label: Option<u16>,
    allocations: Vec<LabelAllocation>,
    /// One status per path segment, in path order.
    segments: Vec<SegmentStatus>,
    /// Peer connection ids from confirmed sub-requests.
    peer_connections: Vec<(String, String)>,
    hold_timer: Option<JoinHandle<()>>,
    audit: Vec<PolicyRule>,
    schedule: Option<ScheduleWindow>,
}

/// One reservation and its lifecycle.
pub struct Connection {
    service_id: u64,
    engine: Arc<EngineContext>,
    inner: Mutex<ConnectionInner>,
}

impl Connection {
    pub(crate) fn new(service_id: u64, engine: Arc<EngineContext>) -> Arc<Self> {
        Arc::new(Self {
            service_id,
            engine,
            inner: Mutex::new(ConnectionInner {
                state: ReservationState::Initial,
                path: None,
                label: None,
                allocations: Vec::new(),
                segments: Vec::new(),
                peer_connections: Vec::new(),
                hold_timer: None,
                audit: Vec::new(),
                schedule: None,
            }),
        })
    }

    pub fn service_id(&self) -> u64 {
        self.service_id
    }

    pub async fn state(&self) -> ReservationState {
        self.inner.lock().await.state
    }

    pub async fn label(&self) -> Option<u16> {
        self.inner.lock().await.label
    }

    /// Policy rules that were checked and satisfied at reserve time.
    pub async fn audit(&self) -> Vec<PolicyRule> {
        self.inner.lock().await.audit.clone()
    }

    pub async fn schedule(&self) -> Option<ScheduleWindow> {
        self.inner.lock().await.schedule
    }

    /// Per-segment status, in the same order as the reserved path.
    pub async fn segment_statuses(&self) -> Vec<SegmentStatus> {
        self.inner.lock().await.segments.clone()
    }

    /// Computes a path, checks policy, and binds labels. On success the
    /// connection is `Reserved` with the hold timer armed; any failure
    /// leaves it `Terminated` with nothing held.
    pub(crate) async fn reserve(
        self: &Arc<Self>,
        request: ReserveRequest,
    ) -> Result<ReserveConfirmation, ProvisionError> {
        let mut inner = self.inner.lock().await;
        self.admit(&inner, ConnectionOperation::Reserve)?;
        self.transition(&mut inner, ReservationState::Reserving);
        info!(
            event = events::RESERVE_START,
            component = COMPONENT,
            service_id = self.service_id,
            source = %request.source,
            dest = %request.dest,
            "reserve started"
        );
        if let Some(window) = &request.schedule {
            debug!(
                component = COMPONENT,
                service_id = self.service_id,
                start = ?window.start_epoch_secs,
                end = ?window.end_epoch_secs,
                "service window recorded"
            );
        }

        match self.resolve(&request) {
            Ok((path, label, allocations, audit)) => {
                let segments = path.segments.clone();
                inner.path = Some(path);
                inner.label = label;
                inner.allocations = allocations;
                inner.segments = vec![SegmentStatus::Planned; segments.len()];
                inner.audit = audit;
                inner.schedule = request.schedule;
                self.transition(&mut inner, ReservationState::Reserved);
                inner.hold_timer = Some(self.arm_hold_timer());
                info!(
                    event = events::RESERVE_OK,
                    component = COMPONENT,
                    service_id = self.service_id,
                    label = ?inner.label,
                    segments = segments.len(),
                    "reserved"
                );
                Ok(ReserveConfirmation {
                    service_id: self.service_id,
                    label,
                    segments,
                })
            }
            Err(error) => {
                self.transition(&mut inner, ReservationState::Terminated);
                warn!(
                    event = events::RESERVE_FAILED,
                    component = COMPONENT,
                    service_id = self.service_id,
                    error = %error,
                    "reserve failed"
                );
                Err(error)
            }
        }
    }

    /// Path computation and all-or-nothing label binding.
    fn resolve(
        &self,
        request: &ReserveRequest,
    ) -> Result<(Path, Option<u16>, Vec<LabelAllocation>, Vec<PolicyRule>), ProvisionError> {
        let topology = self.engine.topology.snapshot();
        let peers = self.engine.peers.snapshot();
        let finder = PathFinder::new(
            &topology,
            &peers,
            &self.engine.policy,
            self.engine.config.max_path_depth,
        );
        let path = finder.find(
            &request.source,
            &request.dest,
            request.labels.as_ref(),
            &request.ctx,
        )?;
        let audit = self
            .engine
            .policy
            .check_request(&request.ctx, path.uses_peers())?;

        // labels bind only on locally owned ports; peers bind their own
        let mut local_ports: Vec<(PortKey, LabelCapacity)> = Vec::new();
        for plan in &path.segments {
            if plan.owner != SegmentOwner::Local {
                continue;
            }
            for key in [plan.ingress_key(), plan.egress_key()] {
                let port = topology.port(&key)?;
                local_ports.push((key, port.label.clone()));
            }
        }
        let (label, allocations) = self
            .engine
            .allocator
            .allocate_common(&local_ports, path.labels.as_ref())?;
        Ok((path, label, allocations, audit))
    }

    fn arm_hold_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let timeout = self.engine.config.hold_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(connection) = weak.upgrade() {
                connection.hold_expired().await;
            }
        })
    }

    /// Hold timer fired. A race with commit is resolved by the state
    /// check under the lock; anything past `Reserved` is left alone.
    async fn hold_expired(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != ReservationState::Reserved {
            return;
        }
        warn!(
            event = events::HOLD_TIMER_EXPIRED,
            component = COMPONENT,
            service_id = self.service_id,
            "uncommitted reservation expired"
        );
        inner.hold_timer = None;
        self.transition(&mut inner, ReservationState::Aborting);
        self.release_labels(&mut inner);
        self.transition(&mut inner, ReservationState::Terminated);
    }

    /// Activates every segment concurrently. Full success lands in
    /// `Provisioned`; any failure tears down the segments that did
    /// come up, returns the labels, and terminates.
    pub(crate) async fn commit(&self) -> Result<(), ProvisionError> {
        let mut inner = self.inner.lock().await;
        self.admit(&inner, ConnectionOperation::Commit)?;
        let Some(path) = inner.path.clone() else {
            return Err(ProvisionError::InvalidTransition {
                state: inner.state,
                operation: ConnectionOperation::Commit,
            });
        };
        if let Some(timer) = inner.hold_timer.take() {
            timer.abort();
        }
        self.transition(&mut inner, ReservationState::Provisioning);
        info!(
            event = events::COMMIT_START,
            component = COMPONENT,
            service_id = self.service_id,
            segments = path.segments.len(),
            "commit started"
        );

        let label = inner.label;
        let jobs = path
            .segments
            .iter()
            .map(|plan| self.activate_segment(plan, label));
        let results = join_all(jobs).await;

        let mut active = Vec::new();
        let mut timed_out = Vec::new();
        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(activation) => {
                    inner.segments[index] = SegmentStatus::Active;
                    active.push((index, activation));
                }
                Err(error) => {
                    inner.segments[index] = SegmentStatus::Failed;
                    // a dropped in-flight activation may still land on
                    // the device or peer; remember it for cleanup
                    if matches!(error, ProvisionError::Timeout { .. }) {
                        timed_out.push(index);
                    }
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        match first_error {
            None => {
                inner.peer_connections = active
                    .into_iter()
                    .filter_map(|(_, activation)| match activation {
                        Activation::Peer {
                            peer,
                            peer_connection_id,
                        } => Some((peer, peer_connection_id)),
                        Activation::Local(_) => None,
                    })
                    .collect();
                self.transition(&mut inner, ReservationState::Provisioned);
                info!(
                    event = events::PROVISION_OK,
                    component = COMPONENT,
                    service_id = self.service_id,
                    label = ?label,
                    "provisioned"
                );
                Ok(())
            }
            Some(error) => {
                self.transition(&mut inner, ReservationState::Aborting);
                warn!(
                    event = events::PROVISION_FAILED,
                    component = COMPONENT,
                    service_id = self.service_id,
                    error = %error,
                    "provision failed, cleaning up"
                );
                for (index, activation) in active {
                    match activation {
                        Activation::Local(segment) => self.deactivate_local(&segment).await,
                        Activation::Peer {
                            peer,
                            peer_connection_id,
                        } => self.release_peer(&peer, &peer_connection_id).await,
                    }
                    inner.segments[index] = SegmentStatus::Deactivated;
                }
                for index in timed_out {
                    let plan = &path.segments[index];
                    match &plan.owner {
                        SegmentOwner::Local => self.deactivate_local_plan(plan, label).await,
                        SegmentOwner::Peer(peer) => self.cancel_peer(peer).await,
                    }
                    inner.segments[index] = SegmentStatus::Deactivated;
                }
                self.release_labels(&mut inner);
                self.transition(&mut inner, ReservationState::Terminated);
                debug!(
                    event = events::CLEANUP_OK,
                    component = COMPONENT,
                    service_id = self.service_id,
                    "cleanup complete"
                );
                Err(error)
            }
        }
    }

    async fn activate_segment(
        &self,
        plan: &SegmentPlan,
        label: Option<u16>,
    ) -> Result<Activation, ProvisionError> {
        let deadline = self.engine.config.segment_timeout();
        let seconds = self.engine.config.segment_timeout_secs;
        match &plan.owner {
            SegmentOwner::Local => {
                let backend = self.engine.backends.backend_for(&plan.network)?;
                let segment = Segment {
                    service_id: self.service_id,
                    network: plan.network.clone(),
                    ingress: plan.ingress.clone(),
                    egress: plan.egress.clone(),
                    label,
                };
                let outcome = tokio::time::timeout(deadline, backend.activate(&segment))
                    .await
                    .map_err(|_| ProvisionError::Timeout {
                        what: format!("activation of {segment}"),
                        seconds,
                    })?;
                if let Err(error) = outcome {
                    warn!(
                        event = events::SEGMENT_ACTIVATE_FAILED,
                        component = COMPONENT,
                        service_id = self.service_id,
                        segment = %segment,
                        error = %error,
                        "segment activation failed"
                    );
                    return Err(error);
                }
                Ok(Activation::Local(segment))
            }
            SegmentOwner::Peer(peer) => {
                let request = PeerSubRequest {
                    peer: peer.clone(),
                    network: plan.network.clone(),
                    ingress_port: plan.ingress.clone(),
                    egress_port: plan.egress.clone(),
                    labels: label.map(LabelSet::single),
                    service_id: self.service_id,
                };
                info!(
                    event = events::PEER_SUBREQUEST_SENT,
                    component = COMPONENT,
                    service_id = self.service_id,
                    peer = %peer,
                    network = %plan.network,
                    "sub-request sent"
                );
                let confirmation =
                    tokio::time::timeout(deadline, self.engine.peer_provider.provision(request))
                        .await
                        .map_err(|_| ProvisionError::Timeout {
                            what: format!("sub-request to {peer}"),
                            seconds,
                        })?
                        .map_err(|error| {
                            warn!(
                                event = events::PEER_SUBREQUEST_FAILED,
                                component = COMPONENT,
                                service_id = self.service_id,
                                peer = %peer,
                                error = %error,
                                "sub-request failed"
                            );
                            error
                        })?;
                info!(
                    event = events::PEER_SUBREQUEST_CONFIRMED,
                    component = COMPONENT,
                    service_id = self.service_id,
                    peer = %peer,
                    peer_connection_id = %confirmation.peer_connection_id,
                    "sub-request confirmed"
                );
                Ok(Activation::Peer {
                    peer: peer.clone(),
                    peer_connection_id: confirmation.peer_connection_id,
                })
            }
        }
    }

    async fn deactivate_local(&self, segment: &Segment) {
        let backend = match self.engine.backends.backend_for(&segment.network) {
            Ok(backend) => backend,
            Err(error) => {
                warn!(
                    event = events::SEGMENT_DEACTIVATE_FAILED,
                    component = COMPONENT,
                    service_id = self.service_id,
                    segment = %segment,
                    error = %error,
                    "no backend for teardown"
                );
                return;
            }
        };
        let deadline = self.engine.config.segment_timeout();
        match tokio::time::timeout(deadline, backend.deactivate(segment)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(
                    event = events::SEGMENT_DEACTIVATE_FAILED,
                    component = COMPONENT,
                    service_id = self.service_id,
                    segment = %segment,
                    error = %error,
                    "segment deactivation failed"
                );
            }
            Err(_) => {
                warn!(
                    event = events::SEGMENT_DEACTIVATE_FAILED,
                    component = COMPONENT,
                    service_id = self.service_id,
                    segment = %segment,
                    "segment deactivation timed out"
                );
            }
        }
    }

    async fn release_peer(&self, peer: &str, peer_connection_id: &str) {
        info!(
            event = events::PEER_RELEASE_SENT,
            component = COMPONENT,
            service_id = self.service_id,
            peer = %peer,
            peer_connection_id = %peer_connection_id,
            "peer release sent"
        );
        if let Err(error) = self
            .engine
            .peer_provider
            .release(peer, peer_connection_id)
            .await
        {
            warn!(
                component = COMPONENT,
                service_id = self.service_id,
                peer = %peer,
                error = %error,
                "peer release failed"
            );
        }
    }

    /// Abandons a sub-request that never confirmed, so a peer that
    /// confirmed after our deadline does not hold its reservation.
    async fn cancel_peer(&self, peer: &str) {
        info!(
            event = events::PEER_CANCEL_SENT,
            component = COMPONENT,
            service_id = self.service_id,
            peer = %peer,
            "peer cancel sent"
        );
        if let Err(error) = self
            .engine
            .peer_provider
            .cancel(peer, self.service_id)
            .await
        {
            warn!(
                component = COMPONENT,
                service_id = self.service_id,
                peer = %peer,
                error = %error,
                "peer cancel failed"
            );
        }
    }

    /// Tears the data plane down and returns every held label. A
    /// no-op on terminal states; invalid before the connection is
    /// provisioned.
    pub(crate) async fn release(&self) -> Result<(), ProvisionError> {
        let mut inner = self.inner.lock().await;
        if inner.state.is_terminal() {
            return Ok(());
        }
        self.admit(&inner, ConnectionOperation::Release)?;
        let path = inner.path.clone();
        self.transition(&mut inner, ReservationState::Releasing);
        info!(
            event = events::RELEASE_START,
            component = COMPONENT,
            service_id = self.service_id,
            "release started"
        );

        let label = inner.label;
        let peer_connections = std::mem::take(&mut inner.peer_connections);
        if let Some(path) = path {
            let jobs = path
                .segments
                .iter()
                .filter(|plan| plan.owner == SegmentOwner::Local)
                .map(|plan| {
                    self.deactivate_local_plan(plan, label)
                });
            join_all(jobs).await;
        }
        for (peer, peer_connection_id) in peer_connections {
            self.release_peer(&peer, &peer_connection_id).await;
        }

        // labels come back even when a teardown leg misbehaved
        Self::mark_deactivated(&mut inner);
        self.release_labels(&mut inner);
        self.transition(&mut inner, ReservationState::Released);
        info!(
            event = events::RELEASE_OK,
            component = COMPONENT,
            service_id = self.service_id,
            "released"
        );
        Ok(())
    }

    async fn deactivate_local_plan(&self, plan: &SegmentPlan, label: Option<u16>) {
        let segment = Segment {
            service_id: self.service_id,
            network: plan.network.clone(),
            ingress: plan.ingress.clone(),
            egress: plan.egress.clone(),
            label,
        };
        self.deactivate_local(&segment).await;
    }

    /// Failure path out of any holding state: tear down whatever is
    /// active, return labels, terminate. No-op on terminal states.
    pub(crate) async fn abort(&self) -> Result<(), ProvisionError> {
        let mut inner = self.inner.lock().await;
        if inner.state.is_terminal() {
            return Ok(());
        }
        self.admit(&inner, ConnectionOperation::Abort)?;
        if let Some(timer) = inner.hold_timer.take() {
            timer.abort();
        }
        let was_provisioned = inner.state == ReservationState::Provisioned;
        let path = inner.path.clone();
        self.transition(&mut inner, ReservationState::Aborting);
        info!(
            event = events::ABORT_START,
            component = COMPONENT,
            service_id = self.service_id,
            "abort started"
        );

        if was_provisioned {
            let label = inner.label;
            if let Some(path) = path {
                let jobs = path
                    .segments
                    .iter()
                    .filter(|plan| plan.owner == SegmentOwner::Local)
                    .map(|plan| self.deactivate_local_plan(plan, label));
                join_all(jobs).await;
            }
        }
        let peer_connections = std::mem::take(&mut inner.peer_connections);
        for (peer, peer_connection_id) in peer_connections {
            self.release_peer(&peer, &peer_connection_id).await;
        }

        Self::mark_deactivated(&mut inner);
        self.release_labels(&mut inner);
        self.transition(&mut inner, ReservationState::Terminated);
        debug!(
            event = events::CLEANUP_OK,
            component = COMPONENT,
            service_id = self.service_id,
            "cleanup complete"
        );
        Ok(())
    }

    fn admit(
        &self,
        inner: &MutexGuard<'_, ConnectionInner>,
        operation: ConnectionOperation,
    ) -> Result<(), ProvisionError> {
        if inner.state.admits(operation) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidTransition {
                state: inner.state,
                operation,
            })
        }
    }

    fn mark_deactivated(inner: &mut MutexGuard<'_, ConnectionInner>) {
        for status in inner.segments.iter_mut() {
            if *status == SegmentStatus::Active {
                *status = SegmentStatus::Deactivated;
            }
        }
    }

    /// Drains held allocations exactly once.
    fn release_labels(&self, inner: &mut MutexGuard<'_, ConnectionInner>) {
        for allocation in inner.allocations.drain(..) {
            self.engine.allocator.release(&allocation);
        }
    }

    fn transition(&self, inner: &mut MutexGuard<'_, ConnectionInner>, to: ReservationState) {
        debug!(
            event = events::STATE_TRANSITION,
            component = COMPONENT,
            service_id = self.service_id,
            from = %inner.state,
            to = %to,
            "state transition"
        );
        inner.state = to;
    }
}
